//! Storage form of a [`SchemaGraph`]: plain node and adjacency entry lists.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::graph::{Edge, JoinColumns, NodeMeta, SchemaGraph};
use crate::schema::{Cardinality, SchemaDescription};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeRecord {
    pub id: String,
    pub from: String,
    pub to: String,
    pub constraint_name: String,
    pub column_pairs: Vec<JoinColumns>,
    pub cardinality: Cardinality,
    pub reversed: bool,
    #[serde(default)]
    pub is_custom: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PersistedGraph {
    pub nodes: Vec<(String, NodeMeta)>,
    pub edges: Vec<(String, Vec<EdgeRecord>)>,
}

impl PersistedGraph {
    pub fn from_json(input: &str) -> Result<Self> {
        Ok(serde_json::from_str(input)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Schema description recovered from node metadata.
    pub fn schema(&self) -> SchemaDescription {
        SchemaDescription {
            tables: self
                .nodes
                .iter()
                .map(|(name, meta)| meta.to_table(name))
                .collect(),
        }
    }
}

impl SchemaGraph {
    pub fn to_persisted(&self) -> PersistedGraph {
        let nodes = self
            .tables()
            .map(|(_, t)| (t.name.clone(), t.meta.clone()))
            .collect();

        let edges = self
            .tables()
            .map(|(id, t)| {
                let records = self
                    .outgoing(id)
                    .iter()
                    .map(|&e| {
                        let edge = self.edge(e);
                        EdgeRecord {
                            id: edge.id.clone(),
                            from: self.table_name(edge.from).to_string(),
                            to: self.table_name(edge.to).to_string(),
                            constraint_name: edge.constraint_name.clone(),
                            column_pairs: edge.column_pairs.clone(),
                            cardinality: edge.cardinality,
                            reversed: edge.reversed,
                            is_custom: edge.is_custom,
                        }
                    })
                    .collect();
                (t.name.clone(), records)
            })
            .collect();

        PersistedGraph { nodes, edges }
    }

    /// Restore the arena form. Every node needs exactly one adjacency entry;
    /// edges must have unique ids, connect known distinct tables and sit
    /// under the adjacency entry of their `from` table.
    pub fn from_persisted(persisted: &PersistedGraph) -> Result<Self> {
        let mut graph = SchemaGraph::default();
        for (name, meta) in &persisted.nodes {
            graph.add_table(name.clone(), meta.clone())?;
        }

        let mut seen_keys = HashSet::new();
        let mut seen_ids = HashSet::new();
        for (key, records) in &persisted.edges {
            let Some(from) = graph.table_id(key) else {
                return Err(Error::InvalidGraph(format!("adjacency for unknown table {key}")));
            };
            if !seen_keys.insert(key.as_str()) {
                return Err(Error::InvalidGraph(format!("adjacency for {key} listed twice")));
            }
            for record in records {
                if !seen_ids.insert(record.id.as_str()) {
                    return Err(Error::InvalidGraph(format!("edge id {} listed twice", record.id)));
                }
                if record.from != *key {
                    return Err(Error::InvalidGraph(format!(
                        "edge {} starts at {} but is listed under {key}",
                        record.id, record.from
                    )));
                }
                let Some(to) = graph.table_id(&record.to) else {
                    return Err(Error::InvalidGraph(format!(
                        "edge {} points to unknown table {}",
                        record.id, record.to
                    )));
                };
                if from == to {
                    return Err(Error::InvalidGraph(format!("edge {} is a self loop", record.id)));
                }
                graph.push_edge(Edge {
                    id: record.id.clone(),
                    from,
                    to,
                    constraint_name: record.constraint_name.clone(),
                    column_pairs: record.column_pairs.clone(),
                    cardinality: record.cardinality,
                    reversed: record.reversed,
                    is_custom: record.is_custom,
                });
            }
        }

        if let Some((name, _)) = persisted
            .nodes
            .iter()
            .find(|(name, _)| !seen_keys.contains(name.as_str()))
        {
            return Err(Error::InvalidGraph(format!("no adjacency entry for {name}")));
        }

        Ok(graph)
    }
}
