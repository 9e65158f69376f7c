use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::config::{ParallelEdges, ResolverConfig};
use crate::error::{Error, Result};
use crate::schema::{Cardinality, ColumnSchema, ForeignKey, SchemaDescription, TableSchema};

/// Appended to a forward edge id to name its reverse.
pub const REVERSE_MARKER: &str = "#reverse";

/// Dense index of a table in a [`SchemaGraph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TableId(u32);

/// Dense index of an edge in a [`SchemaGraph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EdgeId(u32);

impl TableId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl EdgeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Metadata carried by each table node.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeMeta {
    pub primary_key: Vec<String>,
    pub columns: Vec<ColumnSchema>,
    pub foreign_keys: Vec<ForeignKey>,
}

impl NodeMeta {
    /// Table description carrying this metadata.
    pub fn to_table(&self, name: &str) -> TableSchema {
        TableSchema {
            table_name: name.to_string(),
            primary_key: self.primary_key.clone(),
            columns: self.columns.clone(),
            foreign_keys: self.foreign_keys.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableNode {
    pub name: String,
    pub meta: NodeMeta,
}

/// Column equality oriented along an edge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinColumns {
    pub from_column: String,
    pub to_column: String,
}

impl JoinColumns {
    pub fn swapped(&self) -> Self {
        Self {
            from_column: self.to_column.clone(),
            to_column: self.from_column.clone(),
        }
    }
}

/// One traversal step between two tables.
#[derive(Debug, Clone, PartialEq)]
pub struct Edge {
    pub id: String,
    pub from: TableId,
    pub to: TableId,
    pub constraint_name: String,
    pub column_pairs: Vec<JoinColumns>,
    pub cardinality: Cardinality,
    /// Walks the FK from parent to child.
    pub reversed: bool,
    pub is_custom: bool,
}

impl Edge {
    /// Forward edge id, shared by an edge and its reverse partner.
    pub fn relationship(&self) -> &str {
        self.id.strip_suffix(REVERSE_MARKER).unwrap_or(&self.id)
    }
}

/// Relationship graph over one schema.
///
/// Tables live in a dense array indexed by [`TableId`]; adjacency lists hold
/// [`EdgeId`]s into a shared edge array. The graph is never patched: any
/// schema or custom reference change means building a new one.
#[derive(Debug, Clone, Default)]
pub struct SchemaGraph {
    tables: Vec<TableNode>,
    by_name: HashMap<String, TableId>,
    edges: Vec<Edge>,
    adjacency: Vec<Vec<EdgeId>>,
}

impl SchemaGraph {
    /// Build the graph from table and FK metadata.
    #[instrument(level = "debug", skip_all, fields(tables = schema.tables.len()))]
    pub fn build(schema: &SchemaDescription, config: &ResolverConfig) -> Result<Self> {
        schema.validate()?;

        let mut graph = Self::default();
        for table in &schema.tables {
            graph.add_table(
                table.table_name.clone(),
                NodeMeta {
                    primary_key: table.primary_key.clone(),
                    columns: table.columns.clone(),
                    foreign_keys: table.foreign_keys.clone(),
                },
            )?;
        }

        let mut seen_pairs: HashSet<(TableId, TableId)> = HashSet::new();
        let mut seen_constraints: HashSet<(TableId, &str, TableId)> = HashSet::new();

        for fk in schema.foreign_keys() {
            let (Some(source), Some(target)) =
                (graph.table_id(&fk.source_table), graph.table_id(&fk.target_table))
            else {
                warn!(
                    constraint = %fk.constraint_name,
                    source = %fk.source_table,
                    target = %fk.target_table,
                    "foreign key references an unknown table, skipped"
                );
                continue;
            };

            if source == target {
                debug!(constraint = %fk.constraint_name, table = %fk.source_table, "self reference, no edge");
                continue;
            }

            if fk.column_pairs.is_empty() {
                warn!(constraint = %fk.constraint_name, "foreign key without columns, skipped");
                continue;
            }

            let fresh = match config.parallel_edges {
                ParallelEdges::FirstWins => seen_pairs.insert((source, target)),
                ParallelEdges::KeepAll => {
                    seen_constraints.insert((source, fk.constraint_name.as_str(), target))
                }
            };
            if !fresh {
                debug!(constraint = %fk.constraint_name, "duplicate relationship dropped");
                continue;
            }

            let source_pk = &graph.tables[source.index()].meta.primary_key;
            let cardinality = fk.forward_cardinality(source_pk);
            let columns: Vec<JoinColumns> = fk
                .ordered_pairs()
                .into_iter()
                .map(|p| JoinColumns {
                    from_column: p.source_column.clone(),
                    to_column: p.target_column.clone(),
                })
                .collect();
            let reverse_columns = columns.iter().map(JoinColumns::swapped).collect();
            let id = forward_edge_id(&fk.source_table, &fk.constraint_name, &fk.target_table);
            let reverse_id = format!("{id}{REVERSE_MARKER}");

            graph.push_edge(Edge {
                id,
                from: source,
                to: target,
                constraint_name: fk.constraint_name.clone(),
                column_pairs: columns,
                cardinality,
                reversed: false,
                is_custom: fk.is_custom,
            });
            graph.push_edge(Edge {
                id: reverse_id,
                from: target,
                to: source,
                constraint_name: fk.constraint_name.clone(),
                column_pairs: reverse_columns,
                cardinality: cardinality.inverse(),
                reversed: true,
                is_custom: fk.is_custom,
            });
        }

        debug!(tables = graph.table_count(), edges = graph.edge_count(), "graph built");
        Ok(graph)
    }

    pub(crate) fn add_table(&mut self, name: String, meta: NodeMeta) -> Result<TableId> {
        if self.by_name.contains_key(&name) {
            return Err(Error::DuplicateTable(name));
        }
        let id = TableId(self.tables.len() as u32);
        self.by_name.insert(name.clone(), id);
        self.tables.push(TableNode { name, meta });
        self.adjacency.push(Vec::new());
        Ok(id)
    }

    pub(crate) fn push_edge(&mut self, edge: Edge) -> EdgeId {
        let id = EdgeId(self.edges.len() as u32);
        self.adjacency[edge.from.index()].push(id);
        self.edges.push(edge);
        id
    }

    pub fn table_id(&self, name: &str) -> Option<TableId> {
        self.by_name.get(name).copied()
    }

    pub fn table(&self, id: TableId) -> &TableNode {
        &self.tables[id.index()]
    }

    pub fn table_name(&self, id: TableId) -> &str {
        &self.tables[id.index()].name
    }

    pub fn edge(&self, id: EdgeId) -> &Edge {
        &self.edges[id.index()]
    }

    pub fn table_count(&self) -> usize {
        self.tables.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// All table ids in declaration order.
    pub fn table_ids(&self) -> impl Iterator<Item = TableId> + '_ {
        (0..self.tables.len() as u32).map(TableId)
    }

    pub fn tables(&self) -> impl Iterator<Item = (TableId, &TableNode)> {
        self.tables
            .iter()
            .enumerate()
            .map(|(i, t)| (TableId(i as u32), t))
    }

    pub fn edges(&self) -> impl Iterator<Item = (EdgeId, &Edge)> {
        self.edges
            .iter()
            .enumerate()
            .map(|(i, e)| (EdgeId(i as u32), e))
    }

    /// Edges leaving `table`.
    pub fn outgoing(&self, table: TableId) -> &[EdgeId] {
        &self.adjacency[table.index()]
    }

    /// Rebuild the schema description the graph was built from.
    pub fn schema(&self) -> SchemaDescription {
        SchemaDescription {
            tables: self
                .tables
                .iter()
                .map(|t| t.meta.to_table(&t.name))
                .collect(),
        }
    }
}

pub fn forward_edge_id(source: &str, constraint: &str, target: &str) -> String {
    format!("{source}/{constraint}/{target}")
}
