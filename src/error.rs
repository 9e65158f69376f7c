//! Hard failures. "No path" outcomes are statuses, not errors.

use thiserror::Error;

use crate::sql::SqlParseError;

#[derive(Debug, Error)]
pub enum Error {
    /// Input or persisted JSON could not be decoded.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// SQL dump could not be parsed.
    #[error("sql error: {0}")]
    Sql(#[from] SqlParseError),

    /// Two tables share a name.
    #[error("duplicate table: {0}")]
    DuplicateTable(String),

    /// Persisted graph entries are inconsistent.
    #[error("invalid graph: {0}")]
    InvalidGraph(String),

    #[error("invalid config: {0}")]
    InvalidConfig(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
