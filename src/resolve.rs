//! Table list in, join graph and SQL out.

use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::config::ResolverConfig;
use crate::graph::{JoinColumns, SchemaGraph, TableId};
use crate::join_sql::{JoinPlan, JoinRef, plan_joins};
use crate::join_tree::{JoinTree, select_join_tree};
use crate::paths::{Path, PathsIndex};
use crate::schema::Cardinality;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResolutionStatus {
    Ok,
    Disconnected,
    Ambiguous,
}

/// Edge of the resolved join graph, as stored in the schema graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinEdge {
    pub id: String,
    pub source_table: String,
    pub target_table: String,
    pub constraint_name: String,
    pub column_pairs: Vec<JoinColumns>,
    pub cardinality: Cardinality,
    pub is_custom: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinResolution {
    pub status: ResolutionStatus,
    pub join_graph: Vec<JoinEdge>,
    pub sql: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinRefsResolution {
    pub status: ResolutionStatus,
    pub joins: Vec<JoinRef>,
    pub message: String,
}

/// Outcome shared by both output shapes.
struct Resolved {
    status: ResolutionStatus,
    plan: JoinPlan,
    message: String,
}

impl Resolved {
    fn disconnected(message: String) -> Self {
        Self {
            status: ResolutionStatus::Disconnected,
            plan: JoinPlan::default(),
            message,
        }
    }
}

/// Resolves table subsets against one graph.
///
/// Without a precomputed index, each call indexes only the requested
/// tables. A supplied index is trusted as is; rebuilding it after a schema
/// change is up to the caller.
#[derive(Debug, Clone, Copy)]
pub struct JoinResolver<'a> {
    graph: &'a SchemaGraph,
    index: Option<&'a PathsIndex>,
    config: &'a ResolverConfig,
}

impl<'a> JoinResolver<'a> {
    pub fn new(graph: &'a SchemaGraph, config: &'a ResolverConfig) -> Self {
        Self {
            graph,
            index: None,
            config,
        }
    }

    pub fn with_index(mut self, index: &'a PathsIndex) -> Self {
        self.index = Some(index);
        self
    }

    /// Join graph and SQL connecting `tables`.
    pub fn resolve<S: AsRef<str>>(&self, tables: &[S]) -> JoinResolution {
        let resolved = self.run(tables);
        let join_graph = resolved
            .plan
            .joins
            .iter()
            .map(|join| {
                let edge = self.graph.edge(join.edge);
                JoinEdge {
                    id: edge.id.clone(),
                    source_table: self.graph.table_name(edge.from).to_string(),
                    target_table: self.graph.table_name(edge.to).to_string(),
                    constraint_name: edge.constraint_name.clone(),
                    column_pairs: edge.column_pairs.clone(),
                    cardinality: edge.cardinality,
                    is_custom: edge.is_custom,
                }
            })
            .collect();
        let sql = resolved
            .plan
            .to_sql(self.graph, self.config.dialect, self.config.join_type);

        JoinResolution {
            status: resolved.status,
            join_graph,
            sql,
            message: resolved.message,
        }
    }

    /// Structured joins connecting `tables`, for editing.
    pub fn resolve_refs<S: AsRef<str>>(&self, tables: &[S]) -> JoinRefsResolution {
        let resolved = self.run(tables);
        JoinRefsResolution {
            status: resolved.status,
            joins: resolved.plan.join_refs(self.graph, self.config.join_type),
            message: resolved.message,
        }
    }

    #[instrument(level = "debug", skip_all, fields(tables = tables.len()))]
    fn run<S: AsRef<str>>(&self, tables: &[S]) -> Resolved {
        if tables.is_empty() {
            return Resolved::disconnected("no tables requested".to_string());
        }

        let mut ids = Vec::with_capacity(tables.len());
        let mut missing = Vec::new();
        for name in tables {
            let name = name.as_ref();
            match self.graph.table_id(name) {
                Some(id) => ids.push(id),
                None => missing.push(name),
            }
        }
        if !missing.is_empty() {
            return Resolved::disconnected(format!("unknown tables: {}", missing.join(", ")));
        }

        let local;
        let index = match self.index {
            Some(index) => index,
            None => {
                local = PathsIndex::for_tables(self.graph, &ids, self.config);
                &local
            }
        };

        let tree = select_join_tree(self.graph, &ids, index);
        let plan = plan_joins(self.graph, &ids, &tree);
        let (status, message) = self.classify(&tree, &plan);
        info!(status = ?status, joins = plan.joins.len(), "tables resolved");

        Resolved {
            status,
            plan,
            message,
        }
    }

    fn classify(&self, tree: &JoinTree, plan: &JoinPlan) -> (ResolutionStatus, String) {
        if !tree.is_connected() {
            return (
                ResolutionStatus::Disconnected,
                format!("no join path to: {}", self.names(&tree.unreachable)),
            );
        }

        if !tree.ambiguous.is_empty() {
            let steps: Vec<String> = tree
                .ambiguous
                .iter()
                .map(|step| {
                    let rivals: Vec<String> = step.rivals.iter().map(|p| self.describe(p)).collect();
                    format!("{} over {}", self.describe(&step.chosen), rivals.join(" | "))
                })
                .collect();
            return (
                ResolutionStatus::Ambiguous,
                format!("equally cheap join paths, chose {}", steps.join("; ")),
            );
        }

        let message = match plan.root {
            Some(root) if plan.joins.is_empty() => format!("single table {}", self.graph.table_name(root)),
            _ => format!("{} tables joined", tree.nodes.len()),
        };
        (ResolutionStatus::Ok, message)
    }

    fn names(&self, tables: &[TableId]) -> String {
        tables
            .iter()
            .map(|&t| self.graph.table_name(t))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Label plus the constraints walked, so parallel FKs are told apart.
    fn describe(&self, path: &Path) -> String {
        let constraints: Vec<&str> = path
            .edges
            .iter()
            .map(|&e| self.graph.edge(e).constraint_name.as_str())
            .collect();
        format!("{} ({})", path.label, constraints.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ParallelEdges;
    use crate::graph::tests::chain_schema;
    use crate::join_sql::JoinType;
    use crate::sql::{Dialect, parse_sql};
    use pretty_assertions::assert_eq;

    const SAKILA: &str = r#"
        CREATE TABLE language (language_id INT PRIMARY KEY, name CHAR(20));
        CREATE TABLE actor (actor_id INT PRIMARY KEY, first_name VARCHAR(45));
        CREATE TABLE category (category_id INT PRIMARY KEY, name VARCHAR(25));
        CREATE TABLE film (
            film_id INT PRIMARY KEY,
            title VARCHAR(255),
            language_id INT NOT NULL REFERENCES language,
            original_language_id INT REFERENCES language (language_id)
        );
        CREATE TABLE film_actor (
            actor_id INT NOT NULL REFERENCES actor,
            film_id INT NOT NULL REFERENCES film,
            PRIMARY KEY (actor_id, film_id)
        );
        CREATE TABLE film_category (
            film_id INT NOT NULL REFERENCES film,
            category_id INT NOT NULL REFERENCES category,
            PRIMARY KEY (film_id, category_id)
        );
        CREATE TABLE store (store_id INT PRIMARY KEY);
        CREATE TABLE customer (customer_id INT PRIMARY KEY, store_id INT REFERENCES store);
        CREATE TABLE inventory (
            inventory_id INT PRIMARY KEY,
            film_id INT NOT NULL REFERENCES film,
            store_id INT NOT NULL REFERENCES store
        );
        CREATE TABLE rental (
            rental_id INT PRIMARY KEY,
            inventory_id INT NOT NULL REFERENCES inventory,
            customer_id INT NOT NULL REFERENCES customer
        );
        CREATE TABLE payment (
            payment_id INT PRIMARY KEY,
            customer_id INT NOT NULL REFERENCES customer,
            rental_id INT REFERENCES rental
        );
        CREATE TABLE audit_log (entry_id INT PRIMARY KEY, detail TEXT);
    "#;

    fn sakila(config: &ResolverConfig) -> SchemaGraph {
        let schema = parse_sql(SAKILA, Dialect::Generic).unwrap();
        SchemaGraph::build(&schema, config).unwrap()
    }

    fn edge_tables(resolution: &JoinResolution) -> Vec<(&str, &str)> {
        resolution
            .join_graph
            .iter()
            .map(|e| (e.source_table.as_str(), e.target_table.as_str()))
            .collect()
    }

    #[test]
    fn test_empty_request() {
        let config = ResolverConfig::default();
        let graph = sakila(&config);
        let empty: [&str; 0] = [];
        let res = JoinResolver::new(&graph, &config).resolve(&empty);

        assert_eq!(res.status, ResolutionStatus::Disconnected);
        assert!(res.join_graph.is_empty());
        assert_eq!(res.sql, "");
        assert_eq!(res.message, "no tables requested");
    }

    #[test]
    fn test_unknown_tables_listed() {
        let config = ResolverConfig::default();
        let graph = sakila(&config);
        let res = JoinResolver::new(&graph, &config).resolve(&["actor", "nope", "ghost"]);

        assert_eq!(res.status, ResolutionStatus::Disconnected);
        assert_eq!(res.message, "unknown tables: nope, ghost");
        assert!(res.join_graph.is_empty());
    }

    #[test]
    fn test_single_table() {
        let config = ResolverConfig::default();
        let graph = sakila(&config);
        let res = JoinResolver::new(&graph, &config).resolve(&["film"]);

        assert_eq!(res.status, ResolutionStatus::Ok);
        assert!(res.join_graph.is_empty());
        assert_eq!(res.sql, "FROM film");
    }

    #[test]
    fn test_actor_film_category() {
        let config = ResolverConfig::default();
        let graph = sakila(&config);
        let res = JoinResolver::new(&graph, &config).resolve(&["actor", "film", "category"]);

        assert_eq!(res.status, ResolutionStatus::Ok);
        assert_eq!(res.join_graph.len(), 4);
        let touched = edge_tables(&res);
        let links = |a: &str, b: &str| touched.iter().any(|&(s, t)| (s, t) == (a, b) || (s, t) == (b, a));
        assert!(links("film_actor", "actor"));
        assert!(links("film_actor", "film"));
        assert!(links("film_category", "film"));
        assert!(links("film_category", "category"));
        assert_eq!(
            res.sql,
            "FROM actor\n\
             JOIN film_actor ON actor.actor_id = film_actor.actor_id\n\
             JOIN film ON film_actor.film_id = film.film_id\n\
             JOIN film_category ON film.film_id = film_category.film_id\n\
             JOIN category ON film_category.category_id = category.category_id"
        );
    }

    #[test]
    fn test_payment_to_film() {
        let config = ResolverConfig::default();
        let graph = sakila(&config);
        let res = JoinResolver::new(&graph, &config).resolve(&["payment", "film"]);

        assert_eq!(res.status, ResolutionStatus::Ok);
        assert!(res.join_graph.len() <= 3);
        assert_eq!(
            edge_tables(&res),
            vec![("payment", "rental"), ("rental", "inventory"), ("inventory", "film")]
        );
    }

    #[test]
    fn test_unreachable_table() {
        let config = ResolverConfig::default();
        let graph = sakila(&config);
        let res = JoinResolver::new(&graph, &config).resolve(&["actor", "audit_log"]);

        assert_eq!(res.status, ResolutionStatus::Disconnected);
        assert_eq!(res.message, "no join path to: audit_log");
        assert_eq!(res.sql, "FROM actor");
    }

    #[test]
    fn test_parallel_language_keys() {
        let config = ResolverConfig::default();
        let graph = sakila(&config);
        let res = JoinResolver::new(&graph, &config).resolve(&["film", "language"]);

        assert_eq!(res.status, ResolutionStatus::Ambiguous);
        assert_eq!(res.join_graph[0].constraint_name, "film_language_id_fkey");
        assert!(res.message.contains("film_original_language_id_fkey"));
        assert_eq!(
            res.sql,
            "FROM film\nJOIN language ON film.language_id = language.language_id"
        );

        let first_wins = ResolverConfig {
            parallel_edges: ParallelEdges::FirstWins,
            ..ResolverConfig::default()
        };
        let graph = sakila(&first_wins);
        let res = JoinResolver::new(&graph, &first_wins).resolve(&["film", "language"]);
        assert_eq!(res.status, ResolutionStatus::Ok);
    }

    #[test]
    fn test_spokes_of_film() {
        let config = ResolverConfig::default();
        let graph = sakila(&config);
        let res = JoinResolver::new(&graph, &config).resolve(&["film_actor", "film_category", "inventory"]);

        assert_eq!(res.status, ResolutionStatus::Ok);
        assert_eq!(res.join_graph.len(), 3);
        assert_eq!(
            res.sql,
            "FROM film_actor\n\
             JOIN film ON film_actor.film_id = film.film_id\n\
             JOIN film_category ON film.film_id = film_category.film_id\n\
             JOIN inventory ON film.film_id = inventory.film_id"
        );
    }

    #[test]
    fn test_depth_bound_end_to_end() {
        let names: Vec<String> = (0..10).map(|i| format!("t{i}")).collect();
        let tables: Vec<&str> = names.iter().map(String::as_str).collect();
        let links: Vec<(&str, &str)> = tables.windows(2).map(|w| (w[0], w[1])).collect();
        let config = ResolverConfig::default();
        let graph = SchemaGraph::build(&chain_schema(&tables, &links), &config).unwrap();
        let resolver = JoinResolver::new(&graph, &config);

        // t0 -> t8 is eight hops, t0 -> t9 one too many.
        let within = resolver.resolve(&["t0", "t8"]);
        assert_eq!(within.status, ResolutionStatus::Ok);
        assert_eq!(within.join_graph.len(), 8);

        let beyond = resolver.resolve(&["t0", "t9"]);
        assert_eq!(beyond.status, ResolutionStatus::Disconnected);
        assert_eq!(beyond.message, "no join path to: t9");
        assert_eq!(beyond.sql, "FROM t0");
    }

    #[test]
    fn test_precomputed_index_agrees() {
        let config = ResolverConfig::default();
        let graph = sakila(&config);
        let index = PathsIndex::compute(&graph, &config);
        let tables = ["category", "store", "actor"];

        let on_demand = JoinResolver::new(&graph, &config).resolve(&tables);
        let precomputed = JoinResolver::new(&graph, &config)
            .with_index(&index)
            .resolve(&tables);
        assert_eq!(on_demand, precomputed);
    }

    #[test]
    fn test_refs_output() {
        let config = ResolverConfig {
            join_type: JoinType::Left,
            ..ResolverConfig::default()
        };
        let graph = sakila(&config);
        let res = JoinResolver::new(&graph, &config).resolve_refs(&["inventory", "film"]);

        assert_eq!(res.status, ResolutionStatus::Ok);
        assert_eq!(res.joins.len(), 1);
        assert_eq!(res.joins[0].source_table, "inventory");
        assert_eq!(res.joins[0].join_type, JoinType::Left);
        assert_eq!(res.joins[0].cardinality, Cardinality::ManyToOne);

        let json = serde_json::to_value(&res).unwrap();
        assert_eq!(json["status"], "ok");
        assert_eq!(json["joins"][0]["constraintName"], "inventory_film_id_fkey");
    }
}
