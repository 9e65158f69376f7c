//! Bounded path search between tables and the K-best paths index.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde::Serialize;
use tracing::{debug, instrument};

use crate::config::ResolverConfig;
use crate::graph::{EdgeId, SchemaGraph, TableId};
use crate::schema::Cardinality;

/// A simple route between two tables.
#[derive(Debug, Clone, PartialEq)]
pub struct Path {
    pub nodes: Vec<TableId>,
    pub edges: Vec<EdgeId>,
    pub cost: f64,
    pub label: String,
}

/// Named form of a [`Path`] for output.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PathView {
    pub nodes: Vec<String>,
    pub edges: Vec<String>,
    pub cost: f64,
    pub label: String,
}

impl Path {
    pub fn end(&self) -> TableId {
        self.nodes[self.nodes.len() - 1]
    }

    pub fn hops(&self) -> usize {
        self.edges.len()
    }

    /// Table reached by the first step.
    pub fn first_hop(&self) -> Option<TableId> {
        self.nodes.get(1).copied()
    }

    /// True when this node sequence is a proper prefix of `other`'s.
    pub fn is_strict_prefix_of(&self, other: &Path) -> bool {
        self.nodes.len() < other.nodes.len() && other.nodes.starts_with(&self.nodes)
    }

    pub fn view(&self, graph: &SchemaGraph) -> PathView {
        PathView {
            nodes: self.nodes.iter().map(|&t| graph.table_name(t).to_string()).collect(),
            edges: self.edges.iter().map(|&e| graph.edge(e).id.clone()).collect(),
            cost: self.cost,
            label: self.label.clone(),
        }
    }
}

/// Order in which competing paths are preferred: cost, then label, then
/// edge ids. Total, so every choice built on it is deterministic.
pub fn compare_paths(a: &Path, b: &Path) -> Ordering {
    a.cost
        .total_cmp(&b.cost)
        .then_with(|| a.label.cmp(&b.label))
        .then_with(|| a.edges.cmp(&b.edges))
}

pub fn path_label(graph: &SchemaGraph, nodes: &[TableId]) -> String {
    nodes
        .iter()
        .map(|&t| graph.table_name(t))
        .collect::<Vec<_>>()
        .join(" -> ")
}

fn cost_of(hops: usize, many_to_many: usize, config: &ResolverConfig) -> f64 {
    hops as f64 * config.hop_cost + many_to_many as f64 * config.many_to_many_penalty
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Visit {
    Descend,
    Prune,
}

/// Depth-first walker over simple paths starting at one table.
struct Walker<'a> {
    graph: &'a SchemaGraph,
    config: &'a ResolverConfig,
    on_path: Vec<bool>,
    nodes: Vec<TableId>,
    edges: Vec<EdgeId>,
    many_to_many: usize,
}

impl<'a> Walker<'a> {
    fn new(graph: &'a SchemaGraph, config: &'a ResolverConfig, start: TableId) -> Self {
        let mut on_path = vec![false; graph.table_count()];
        on_path[start.index()] = true;
        Self {
            graph,
            config,
            on_path,
            nodes: vec![start],
            edges: Vec::with_capacity(config.max_depth),
            many_to_many: 0,
        }
    }

    fn current(&self) -> TableId {
        self.nodes[self.nodes.len() - 1]
    }

    fn cost(&self) -> f64 {
        cost_of(self.edges.len(), self.many_to_many, self.config)
    }

    fn snapshot(&self) -> Path {
        Path {
            nodes: self.nodes.clone(),
            edges: self.edges.clone(),
            cost: self.cost(),
            label: path_label(self.graph, &self.nodes),
        }
    }

    /// Visit every simple path of 1..=max_depth hops leaving `at`.
    fn walk<F>(&mut self, at: TableId, visit: &mut F)
    where
        F: FnMut(&Walker<'a>) -> Visit,
    {
        if self.edges.len() >= self.config.max_depth {
            return;
        }
        let graph = self.graph;
        for &edge_id in graph.outgoing(at) {
            let edge = graph.edge(edge_id);
            if self.on_path[edge.to.index()] {
                continue;
            }
            let many_to_many = edge.cardinality == Cardinality::ManyToMany;

            self.on_path[edge.to.index()] = true;
            self.nodes.push(edge.to);
            self.edges.push(edge_id);
            self.many_to_many += many_to_many as usize;

            if visit(&*self) == Visit::Descend {
                self.walk(edge.to, visit);
            }

            self.many_to_many -= many_to_many as usize;
            self.edges.pop();
            self.nodes.pop();
            self.on_path[edge.to.index()] = false;
        }
    }
}

/// All simple paths from `start` to `target` within the depth bound,
/// best first. Empty when the tables are disconnected or identical.
pub fn enumerate_paths(
    graph: &SchemaGraph,
    start: TableId,
    target: TableId,
    config: &ResolverConfig,
) -> Vec<Path> {
    let mut found = Vec::new();
    if start == target {
        return found;
    }

    let mut walker = Walker::new(graph, config, start);
    walker.walk(start, &mut |w| {
        if w.current() == target {
            found.push(w.snapshot());
            Visit::Prune
        } else {
            Visit::Descend
        }
    });

    found.sort_by(compare_paths);
    found
}

/// Insert into a list kept sorted by [`compare_paths`] and capped at `k`.
fn offer(list: &mut Vec<Path>, walker: &Walker<'_>, k: usize) {
    if list.len() >= k && list.last().is_some_and(|worst| walker.cost() > worst.cost) {
        return;
    }
    let path = walker.snapshot();
    let pos = list.partition_point(|p| compare_paths(p, &path) != Ordering::Greater);
    if pos < k {
        list.insert(pos, path);
        list.truncate(k);
    }
}

/// Best paths from `start` to every reachable table (or only to tables
/// flagged in `targets`).
fn best_paths_from(
    graph: &SchemaGraph,
    start: TableId,
    targets: Option<&[bool]>,
    config: &ResolverConfig,
) -> BTreeMap<TableId, Vec<Path>> {
    let mut best: Vec<Vec<Path>> = vec![Vec::new(); graph.table_count()];
    let mut walker = Walker::new(graph, config, start);
    walker.walk(start, &mut |w| {
        let at = w.current();
        if targets.is_none_or(|t| t[at.index()]) {
            offer(&mut best[at.index()], w, config.k_shortest);
        }
        Visit::Descend
    });

    best.into_iter()
        .filter(|paths| !paths.is_empty())
        .map(|paths| (paths[0].end(), paths))
        .collect()
}

/// Cached best routes: start -> target -> up to K paths, cheapest first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PathsIndex {
    entries: BTreeMap<TableId, BTreeMap<TableId, Vec<Path>>>,
}

impl PathsIndex {
    /// Index every ordered pair of tables in the graph.
    #[instrument(level = "debug", skip_all, fields(tables = graph.table_count()))]
    pub fn compute(graph: &SchemaGraph, config: &ResolverConfig) -> Self {
        let entries = graph
            .table_ids()
            .map(|start| (start, best_paths_from(graph, start, None, config)))
            .collect();
        let index = Self { entries };
        debug!(pairs = index.pair_count(), "paths index computed");
        index
    }

    /// Index only the pairs among `tables`.
    #[instrument(level = "debug", skip_all, fields(tables = tables.len()))]
    pub fn for_tables(graph: &SchemaGraph, tables: &[TableId], config: &ResolverConfig) -> Self {
        let mut wanted = vec![false; graph.table_count()];
        for &t in tables {
            wanted[t.index()] = true;
        }

        let mut entries = BTreeMap::new();
        for &start in tables {
            if entries.contains_key(&start) {
                continue;
            }
            entries.insert(start, best_paths_from(graph, start, Some(&wanted), config));
        }
        let index = Self { entries };
        debug!(pairs = index.pair_count(), "subset paths index computed");
        index
    }

    pub fn paths(&self, start: TableId, target: TableId) -> &[Path] {
        self.entries
            .get(&start)
            .and_then(|targets| targets.get(&target))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn best(&self, start: TableId, target: TableId) -> Option<&Path> {
        self.paths(start, target).first()
    }

    pub fn starts(&self) -> impl Iterator<Item = TableId> + '_ {
        self.entries.keys().copied()
    }

    pub fn targets(&self, start: TableId) -> impl Iterator<Item = (TableId, &[Path])> {
        self.entries
            .get(&start)
            .into_iter()
            .flat_map(|targets| targets.iter().map(|(&t, paths)| (t, paths.as_slice())))
    }

    /// Number of (start, target) pairs with at least one path.
    pub fn pair_count(&self) -> usize {
        self.entries.values().map(BTreeMap::len).sum()
    }

    /// Named form keyed by table names.
    pub fn view(&self, graph: &SchemaGraph) -> BTreeMap<String, BTreeMap<String, Vec<PathView>>> {
        self.entries
            .iter()
            .map(|(&start, targets)| {
                let named = targets
                    .iter()
                    .map(|(&target, paths)| {
                        (
                            graph.table_name(target).to_string(),
                            paths.iter().map(|p| p.view(graph)).collect(),
                        )
                    })
                    .collect();
                (graph.table_name(start).to_string(), named)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::tests::{chain_schema, fk, table};
    use crate::schema::SchemaDescription;

    fn build(schema: &SchemaDescription) -> SchemaGraph {
        SchemaGraph::build(schema, &ResolverConfig::default()).unwrap()
    }

    fn id(graph: &SchemaGraph, name: &str) -> TableId {
        graph.table_id(name).unwrap()
    }

    #[test]
    fn test_cost_grows_with_hops() {
        let graph = build(&chain_schema(&["a", "b", "c", "d"], &[("a", "b"), ("b", "c"), ("c", "d")]));
        let index = PathsIndex::compute(&graph, &ResolverConfig::default());

        let a = id(&graph, "a");
        let costs: Vec<f64> = ["b", "c", "d"]
            .iter()
            .map(|t| index.best(a, id(&graph, t)).unwrap().cost)
            .collect();
        assert_eq!(costs, vec![1.0, 2.0, 3.0]);
        assert_eq!(index.best(a, id(&graph, "d")).unwrap().label, "a -> b -> c -> d");
    }

    #[test]
    fn test_many_to_many_penalty() {
        let mut link = fk("fk_tag_post", "tag", "post", &[("post_id", "post_id")]);
        link.cardinality = Some(Cardinality::ManyToMany);
        let schema = SchemaDescription {
            tables: vec![table("tag", "tag_id", vec![link]), table("post", "post_id", vec![])],
        };
        let graph = build(&schema);
        let paths = enumerate_paths(&graph, id(&graph, "tag"), id(&graph, "post"), &ResolverConfig::default());

        assert_eq!(paths.len(), 1);
        assert_eq!(paths[0].cost, 1.5);
    }

    #[test]
    fn test_enumerate_all_simple_paths_sorted() {
        let graph = build(&chain_schema(
            &["a", "b", "c", "d"],
            &[("a", "b"), ("b", "d"), ("a", "c"), ("c", "d")],
        ));
        let paths = enumerate_paths(&graph, id(&graph, "a"), id(&graph, "d"), &ResolverConfig::default());

        let labels: Vec<&str> = paths.iter().map(|p| p.label.as_str()).collect();
        assert_eq!(labels, vec!["a -> b -> d", "a -> c -> d"]);
        for path in &paths {
            let mut seen = path.nodes.clone();
            seen.sort();
            seen.dedup();
            assert_eq!(seen.len(), path.nodes.len());
        }
    }

    #[test]
    fn test_same_table_has_no_path() {
        let graph = build(&chain_schema(&["a", "b"], &[("a", "b")]));
        let a = id(&graph, "a");
        assert!(enumerate_paths(&graph, a, a, &ResolverConfig::default()).is_empty());
    }

    #[test]
    fn test_depth_bound() {
        let names: Vec<String> = (0..10).map(|i| format!("t{i}")).collect();
        let refs: Vec<&str> = names.iter().map(String::as_str).collect();
        let links: Vec<(&str, &str)> = refs.windows(2).map(|w| (w[0], w[1])).collect();
        let graph = build(&chain_schema(&refs, &links));
        let config = ResolverConfig::default();

        let t0 = id(&graph, "t0");
        assert_eq!(enumerate_paths(&graph, t0, id(&graph, "t8"), &config).len(), 1);
        assert!(enumerate_paths(&graph, t0, id(&graph, "t9"), &config).is_empty());

        let index = PathsIndex::compute(&graph, &config);
        assert!(index.paths(t0, id(&graph, "t9")).is_empty());
        assert_eq!(index.best(t0, id(&graph, "t8")).unwrap().hops(), 8);
    }

    #[test]
    fn test_index_bounded_and_sorted() {
        let names = ["a", "b", "c", "d", "e"];
        let mut links = Vec::new();
        for (i, x) in names.iter().enumerate() {
            for y in &names[i + 1..] {
                links.push((*x, *y));
            }
        }
        let graph = build(&chain_schema(&names, &links));
        let index = PathsIndex::compute(&graph, &ResolverConfig::default());

        assert_eq!(index.pair_count(), 20);
        for start in index.starts() {
            for (_, paths) in index.targets(start) {
                assert!(!paths.is_empty() && paths.len() <= 3);
                assert!(paths.windows(2).all(|w| w[0].cost <= w[1].cost));
                assert_eq!(paths[0].hops(), 1);
            }
        }
    }

    #[test]
    fn test_reachability_is_symmetric() {
        let graph = build(&chain_schema(
            &["a", "b", "c", "x", "y"],
            &[("a", "b"), ("c", "b"), ("x", "y")],
        ));
        let index = PathsIndex::compute(&graph, &ResolverConfig::default());

        for s in graph.table_ids() {
            for t in graph.table_ids() {
                assert_eq!(index.paths(s, t).is_empty(), index.paths(t, s).is_empty());
            }
        }
        assert!(index.paths(id(&graph, "a"), id(&graph, "x")).is_empty());
        assert!(!index.paths(id(&graph, "a"), id(&graph, "c")).is_empty());
    }

    #[test]
    fn test_subset_index_matches_full_index() {
        let graph = build(&chain_schema(
            &["payment", "rental", "inventory", "film", "customer", "store"],
            &[
                ("payment", "rental"),
                ("payment", "customer"),
                ("rental", "inventory"),
                ("rental", "customer"),
                ("inventory", "film"),
                ("inventory", "store"),
                ("customer", "store"),
            ],
        ));
        let config = ResolverConfig::default();
        let full = PathsIndex::compute(&graph, &config);
        let subset_tables = [id(&graph, "payment"), id(&graph, "film"), id(&graph, "store")];
        let subset = PathsIndex::for_tables(&graph, &subset_tables, &config);

        assert_eq!(subset.pair_count(), 6);
        for &s in &subset_tables {
            for &t in &subset_tables {
                assert_eq!(subset.paths(s, t), full.paths(s, t));
            }
        }
        assert!(subset.paths(id(&graph, "payment"), id(&graph, "rental")).is_empty());
    }

    #[test]
    fn test_index_agrees_with_enumerator() {
        let graph = build(&chain_schema(
            &["a", "b", "c", "d", "e"],
            &[("a", "b"), ("b", "c"), ("c", "d"), ("a", "e"), ("e", "d"), ("b", "d")],
        ));
        let config = ResolverConfig::default();
        let index = PathsIndex::compute(&graph, &config);
        for s in graph.table_ids() {
            for t in graph.table_ids() {
                let mut all = enumerate_paths(&graph, s, t, &config);
                all.truncate(config.k_shortest);
                assert_eq!(index.paths(s, t), all.as_slice());
            }
        }
    }
}
