use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Table and key metadata for one database connection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaDescription {
    pub tables: Vec<TableSchema>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableSchema {
    pub table_name: String,
    pub primary_key: Vec<String>,
    pub columns: Vec<ColumnSchema>,
    pub foreign_keys: Vec<ForeignKey>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnSchema {
    pub name: String,
    #[serde(rename = "type")]
    pub typ: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForeignKey {
    pub constraint_name: String,
    pub source_table: String,
    pub target_table: String,
    pub column_pairs: Vec<ColumnPair>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cardinality: Option<Cardinality>,
    #[serde(default)]
    pub is_custom: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnPair {
    pub position: u32,
    pub source_column: String,
    pub target_column: String,
}

/// Relationship multiplicity, read from the source side of a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Cardinality {
    #[serde(rename = "1:1")]
    OneToOne,
    #[serde(rename = "1:N")]
    OneToMany,
    #[serde(rename = "N:1")]
    ManyToOne,
    #[serde(rename = "N:N")]
    ManyToMany,
    #[serde(rename = "unknown")]
    Unknown,
}

impl Cardinality {
    /// Multiplicity seen when walking the relationship the other way.
    pub fn inverse(self) -> Self {
        match self {
            Self::OneToMany => Self::ManyToOne,
            Self::ManyToOne => Self::OneToMany,
            other => other,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::OneToOne => "1:1",
            Self::OneToMany => "1:N",
            Self::ManyToOne => "N:1",
            Self::ManyToMany => "N:N",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Cardinality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl SchemaDescription {
    /// Decode and validate a schema description.
    pub fn from_json(input: &str) -> Result<Self> {
        let schema: Self = serde_json::from_str(input)?;
        schema.validate()?;
        Ok(schema)
    }

    /// Table names must be unique.
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for table in &self.tables {
            if !seen.insert(table.table_name.as_str()) {
                return Err(Error::DuplicateTable(table.table_name.clone()));
            }
        }
        Ok(())
    }

    pub fn table(&self, name: &str) -> Option<&TableSchema> {
        self.tables.iter().find(|t| t.table_name == name)
    }

    pub fn foreign_keys(&self) -> impl Iterator<Item = &ForeignKey> {
        self.tables.iter().flat_map(|t| t.foreign_keys.iter())
    }
}

impl TableSchema {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            table_name: name.into(),
            primary_key: vec![],
            columns: vec![],
            foreign_keys: vec![],
        }
    }
}

impl ForeignKey {
    /// Column pairs sorted by position.
    pub fn ordered_pairs(&self) -> Vec<&ColumnPair> {
        let mut pairs: Vec<&ColumnPair> = self.column_pairs.iter().collect();
        pairs.sort_by_key(|p| p.position);
        pairs
    }

    /// Cardinality of the child-to-parent step.
    ///
    /// Without a hint, an FK whose columns are exactly the source primary
    /// key is 1:1, anything else N:1.
    pub fn forward_cardinality(&self, source_primary_key: &[String]) -> Cardinality {
        if let Some(hint) = self.cardinality {
            return hint;
        }
        let fk_columns: HashSet<&str> = self
            .column_pairs
            .iter()
            .map(|p| p.source_column.as_str())
            .collect();
        let pk_columns: HashSet<&str> = source_primary_key.iter().map(|c| c.as_str()).collect();
        if !pk_columns.is_empty() && fk_columns == pk_columns {
            Cardinality::OneToOne
        } else {
            Cardinality::ManyToOne
        }
    }
}
