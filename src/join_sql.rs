//! Linearize a selected edge set into joins.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::graph::{EdgeId, JoinColumns, SchemaGraph, TableId};
use crate::join_tree::JoinTree;
use crate::schema::Cardinality;
use crate::sql::Dialect;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum JoinType {
    #[default]
    Inner,
    Left,
}

impl JoinType {
    pub fn keyword(self) -> &'static str {
        match self {
            Self::Inner => "JOIN",
            Self::Left => "LEFT JOIN",
        }
    }
}

/// One emitted join, oriented from the already joined table to the new one.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedJoin {
    pub edge: EdgeId,
    pub from: TableId,
    pub to: TableId,
    pub column_pairs: Vec<JoinColumns>,
    pub cardinality: Cardinality,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct JoinPlan {
    pub root: Option<TableId>,
    pub joins: Vec<PlannedJoin>,
    /// Selected edges that could not be placed.
    pub dropped: Vec<EdgeId>,
}

/// Structured join for UI editing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinRef {
    pub source_table: String,
    pub target_table: String,
    pub join_type: JoinType,
    pub column_pairs: Vec<JoinColumns>,
    pub cardinality: Cardinality,
    pub constraint_name: String,
}

/// Order the tree's edges so every join attaches to a table already in
/// the FROM clause.
///
/// The root is the first requested table inside the tree with no inbound
/// selected edge, falling back to the tree seed. Edges are scanned
/// repeatedly until a pass adds nothing; an edge is usable in either
/// direction as long as exactly one end is already joined.
pub fn plan_joins(graph: &SchemaGraph, requested: &[TableId], tree: &JoinTree) -> JoinPlan {
    let root = requested
        .iter()
        .copied()
        .filter(|t| tree.nodes.contains(t))
        .find(|&t| !tree.edges.iter().any(|&e| graph.edge(e).to == t))
        .or(tree.seed);

    let Some(root) = root else {
        return JoinPlan::default();
    };

    let mut included: BTreeSet<TableId> = BTreeSet::from([root]);
    let mut remaining: Vec<EdgeId> = tree.edges.clone();
    let mut joins = Vec::new();

    loop {
        let before = remaining.len();
        remaining.retain(|&id| {
            let edge = graph.edge(id);
            let from_in = included.contains(&edge.from);
            let to_in = included.contains(&edge.to);
            let join = match (from_in, to_in) {
                (true, false) => PlannedJoin {
                    edge: id,
                    from: edge.from,
                    to: edge.to,
                    column_pairs: edge.column_pairs.clone(),
                    cardinality: edge.cardinality,
                },
                (false, true) => PlannedJoin {
                    edge: id,
                    from: edge.to,
                    to: edge.from,
                    column_pairs: edge.column_pairs.iter().map(JoinColumns::swapped).collect(),
                    cardinality: edge.cardinality.inverse(),
                },
                _ => return true,
            };
            included.insert(join.to);
            joins.push(join);
            false
        });
        if remaining.len() == before {
            break;
        }
    }

    for &id in &remaining {
        let edge = graph.edge(id);
        if included.contains(&edge.from) && included.contains(&edge.to) {
            debug!(edge = %edge.id, "redundant edge dropped");
        } else {
            warn!(edge = %edge.id, "edge not connected to the join root, dropped");
        }
    }

    JoinPlan {
        root: Some(root),
        joins,
        dropped: remaining,
    }
}

impl JoinPlan {
    /// `FROM root` followed by one join line per planned join.
    pub fn to_sql(&self, graph: &SchemaGraph, dialect: Dialect, join_type: JoinType) -> String {
        let Some(root) = self.root else {
            return String::new();
        };

        let mut lines = vec![format!("FROM {}", dialect.quote(graph.table_name(root)))];
        for join in &self.joins {
            let from = dialect.quote(graph.table_name(join.from));
            let to = dialect.quote(graph.table_name(join.to));
            let conditions: Vec<String> = join
                .column_pairs
                .iter()
                .map(|c| {
                    format!(
                        "{from}.{} = {to}.{}",
                        dialect.quote(&c.from_column),
                        dialect.quote(&c.to_column)
                    )
                })
                .collect();
            lines.push(format!("{} {to} ON {}", join_type.keyword(), conditions.join(" AND ")));
        }
        lines.join("\n")
    }

    pub fn join_refs(&self, graph: &SchemaGraph, join_type: JoinType) -> Vec<JoinRef> {
        self.joins
            .iter()
            .map(|join| JoinRef {
                source_table: graph.table_name(join.from).to_string(),
                target_table: graph.table_name(join.to).to_string(),
                join_type,
                column_pairs: join.column_pairs.clone(),
                cardinality: join.cardinality,
                constraint_name: graph.edge(join.edge).constraint_name.clone(),
            })
            .collect()
    }
}
