//! Resolver tuning.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::join_sql::JoinType;
use crate::sql::Dialect;

/// Deepest path the enumerator will follow, in hops.
pub const MAX_DEPTH: usize = 8;
/// Paths kept per (start, target) pair.
pub const K_SHORTEST: usize = 3;

/// How FKs connecting the same pair of tables are turned into edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ParallelEdges {
    /// One edge pair per ordered (source, target); later FKs are dropped.
    FirstWins,
    /// One edge pair per constraint.
    #[default]
    KeepAll,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ResolverConfig {
    pub max_depth: usize,
    pub k_shortest: usize,
    pub hop_cost: f64,
    /// Extra cost for each N:N edge on a path.
    pub many_to_many_penalty: f64,
    pub parallel_edges: ParallelEdges,
    pub join_type: JoinType,
    pub dialect: Dialect,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            max_depth: MAX_DEPTH,
            k_shortest: K_SHORTEST,
            hop_cost: 1.0,
            many_to_many_penalty: 0.5,
            parallel_edges: ParallelEdges::default(),
            join_type: JoinType::default(),
            dialect: Dialect::Generic,
        }
    }
}

impl ResolverConfig {
    pub fn from_json(input: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(input)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_depth == 0 {
            return Err(Error::InvalidConfig("maxDepth must be at least 1".into()));
        }
        if self.k_shortest == 0 {
            return Err(Error::InvalidConfig("kShortest must be at least 1".into()));
        }
        if !(self.hop_cost > 0.0) {
            return Err(Error::InvalidConfig("hopCost must be positive".into()));
        }
        if !(self.many_to_many_penalty >= 0.0) {
            return Err(Error::InvalidConfig(
                "manyToManyPenalty must not be negative".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ResolverConfig::default();
        assert_eq!(config.max_depth, 8);
        assert_eq!(config.k_shortest, 3);
        assert_eq!(config.parallel_edges, ParallelEdges::KeepAll);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config =
            ResolverConfig::from_json(r#"{"maxDepth": 4, "parallelEdges": "first-wins"}"#).unwrap();
        assert_eq!(config.max_depth, 4);
        assert_eq!(config.k_shortest, 3);
        assert_eq!(config.parallel_edges, ParallelEdges::FirstWins);
        assert_eq!(config.hop_cost, 1.0);
    }

    #[test]
    fn test_rejects_zero_depth() {
        assert!(matches!(
            ResolverConfig::from_json(r#"{"maxDepth": 0}"#),
            Err(Error::InvalidConfig(_))
        ));
        assert!(matches!(
            ResolverConfig::from_json(r#"{"hopCost": 0.0}"#),
            Err(Error::InvalidConfig(_))
        ));
    }
}
