//! Greedy approximate Steiner tree over the requested tables.

use std::collections::BTreeSet;

use tracing::debug;

use crate::graph::{EdgeId, SchemaGraph, TableId};
use crate::paths::{Path, PathsIndex, compare_paths};

/// A step where another route to the same table was exactly as cheap.
#[derive(Debug, Clone, PartialEq)]
pub struct AmbiguousStep {
    pub chosen: Path,
    pub rivals: Vec<Path>,
}

/// Tables and edges connecting the requested subset.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JoinTree {
    pub seed: Option<TableId>,
    pub nodes: BTreeSet<TableId>,
    /// Edges in the order they were added.
    pub edges: Vec<EdgeId>,
    /// Requested tables no path could reach.
    pub unreachable: Vec<TableId>,
    pub ambiguous: Vec<AmbiguousStep>,
}

impl JoinTree {
    pub fn is_connected(&self) -> bool {
        self.unreachable.is_empty()
    }

    /// Relationships already joined, each edge and its reverse counted once.
    fn relationships<'g>(&self, graph: &'g SchemaGraph) -> BTreeSet<&'g str> {
        self.edges.iter().map(|&e| graph.edge(e).relationship()).collect()
    }

    fn add_path(&mut self, graph: &SchemaGraph, path: &Path) {
        self.nodes.extend(path.nodes.iter().copied());
        for &edge in &path.edges {
            let relationship = graph.edge(edge).relationship();
            if !self.edges.iter().any(|&e| graph.edge(e).relationship() == relationship) {
                self.edges.push(edge);
            }
        }
    }
}

/// Relationships `path` would add on top of `joined`.
fn added_relationships<'g>(
    graph: &'g SchemaGraph,
    path: &Path,
    joined: &BTreeSet<&'g str>,
) -> BTreeSet<&'g str> {
    path.edges
        .iter()
        .map(|&e| graph.edge(e).relationship())
        .filter(|r| !joined.contains(r))
        .collect()
}

fn dedup_preserving_order(tables: &[TableId]) -> Vec<TableId> {
    let mut seen = BTreeSet::new();
    tables.iter().copied().filter(|t| seen.insert(*t)).collect()
}

/// Connect `requested` using paths from `index`.
///
/// Starting from the first requested table, repeatedly take the cheapest
/// indexed path from any covered requested table to any uncovered one.
/// Every requested table the path passes through becomes covered. Stops
/// early when nothing else is reachable; those tables are reported in
/// [`JoinTree::unreachable`].
pub fn select_join_tree(graph: &SchemaGraph, requested: &[TableId], index: &PathsIndex) -> JoinTree {
    let requested = dedup_preserving_order(requested);
    let mut tree = JoinTree::default();
    let Some(&seed) = requested.first() else {
        return tree;
    };
    tree.seed = Some(seed);
    tree.nodes.insert(seed);

    let mut covered: BTreeSet<TableId> = BTreeSet::from([seed]);

    while covered.len() < requested.len() {
        let mut best: Option<&Path> = None;
        for &from in requested.iter().filter(|t| covered.contains(t)) {
            for &to in requested.iter().filter(|t| !covered.contains(t)) {
                if let Some(candidate) = index.best(from, to) {
                    if best.is_none_or(|b| compare_paths(candidate, b).is_lt()) {
                        best = Some(candidate);
                    }
                }
            }
        }

        let Some(chosen) = best else {
            tree.unreachable = requested
                .iter()
                .copied()
                .filter(|t| !covered.contains(t))
                .collect();
            for &table in &tree.unreachable {
                debug!(table = graph.table_name(table), "no join path to requested table");
            }
            break;
        };

        let rivals = rivals_of(graph, &tree, chosen, &requested, &covered, index);
        if !rivals.is_empty() {
            debug!(path = %chosen.label, rivals = rivals.len(), "equally cheap alternatives");
            tree.ambiguous.push(AmbiguousStep {
                chosen: chosen.clone(),
                rivals,
            });
        }

        debug!(path = %chosen.label, cost = chosen.cost, "join path selected");
        tree.add_path(graph, chosen);
        for &table in &chosen.nodes {
            if requested.contains(&table) {
                covered.insert(table);
            }
        }
    }

    tree
}

/// Paths to the same target, from any covered table, with the same cost
/// that would join a different set of new relationships. Routes that differ
/// only inside the part already joined are the same join.
fn rivals_of(
    graph: &SchemaGraph,
    tree: &JoinTree,
    chosen: &Path,
    requested: &[TableId],
    covered: &BTreeSet<TableId>,
    index: &PathsIndex,
) -> Vec<Path> {
    let joined = tree.relationships(graph);
    let chosen_adds = added_relationships(graph, chosen, &joined);
    requested
        .iter()
        .filter(|t| covered.contains(t))
        .flat_map(|&from| index.paths(from, chosen.end()))
        .filter(|p| p.cost == chosen.cost && added_relationships(graph, p, &joined) != chosen_adds)
        .cloned()
        .collect()
}
