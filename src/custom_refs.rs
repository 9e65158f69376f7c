//! User-declared relationships layered over the introspected schema.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::ResolverConfig;
use crate::error::Result;
use crate::graph::SchemaGraph;
use crate::schema::{Cardinality, ColumnPair, ForeignKey, SchemaDescription};

/// Prefix of the constraint name given to an overlaid reference.
pub const CUSTOM_PREFIX: &str = "custom_";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomReference {
    pub id: String,
    pub source_table: String,
    pub source_column: String,
    pub target_table: String,
    pub target_column: String,
}

impl CustomReference {
    pub fn constraint_name(&self) -> String {
        format!("{CUSTOM_PREFIX}{}", self.id)
    }

    pub fn to_foreign_key(&self) -> ForeignKey {
        ForeignKey {
            constraint_name: self.constraint_name(),
            source_table: self.source_table.clone(),
            target_table: self.target_table.clone(),
            column_pairs: vec![ColumnPair {
                position: 1,
                source_column: self.source_column.clone(),
                target_column: self.target_column.clone(),
            }],
            cardinality: Some(Cardinality::OneToMany),
            is_custom: true,
        }
    }
}

/// Custom references keyed by id, in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CustomReferenceSet {
    refs: Vec<CustomReference>,
}

impl CustomReferenceSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode a JSON array of references; later duplicates replace earlier ones.
    pub fn from_json(input: &str) -> Result<Self> {
        let refs: Vec<CustomReference> = serde_json::from_str(input)?;
        let mut set = Self::new();
        for r in refs {
            set.add(r);
        }
        Ok(set)
    }

    /// Insert `reference`, returning the entry it replaced.
    pub fn add(&mut self, reference: CustomReference) -> Option<CustomReference> {
        match self.refs.iter_mut().find(|r| r.id == reference.id) {
            Some(slot) => Some(std::mem::replace(slot, reference)),
            None => {
                self.refs.push(reference);
                None
            }
        }
    }

    pub fn remove(&mut self, id: &str) -> Option<CustomReference> {
        let pos = self.refs.iter().position(|r| r.id == id)?;
        Some(self.refs.remove(pos))
    }

    pub fn get(&self, id: &str) -> Option<&CustomReference> {
        self.refs.iter().find(|r| r.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &CustomReference> {
        self.refs.iter()
    }

    pub fn len(&self) -> usize {
        self.refs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.refs.is_empty()
    }
}

/// Copy of `schema` with previously overlaid FKs stripped and `refs`
/// appended to their source tables.
pub fn apply_overlay(schema: &SchemaDescription, refs: &CustomReferenceSet) -> SchemaDescription {
    let mut overlaid = schema.clone();
    for table in &mut overlaid.tables {
        table.foreign_keys.retain(|fk| !fk.is_custom);
    }

    for reference in refs.iter() {
        let Some(table) = overlaid
            .tables
            .iter_mut()
            .find(|t| t.table_name == reference.source_table)
        else {
            warn!(id = %reference.id, table = %reference.source_table, "custom reference on unknown table, skipped");
            continue;
        };
        debug!(constraint = %reference.constraint_name(), "custom reference applied");
        table.foreign_keys.push(reference.to_foreign_key());
    }
    overlaid
}

/// Build a fresh graph for `schema` with `refs` overlaid.
pub fn rebuild_graph(
    schema: &SchemaDescription,
    refs: &CustomReferenceSet,
    config: &ResolverConfig,
) -> Result<SchemaGraph> {
    SchemaGraph::build(&apply_overlay(schema, refs), config)
}
