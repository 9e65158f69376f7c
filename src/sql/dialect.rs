//! SQL dialect detection and identifier quoting.

use serde::{Deserialize, Serialize};

/// SQL dialect variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    /// Auto-detect from dump content
    #[default]
    Auto,
    /// Standard SQL, identifiers emitted bare
    Generic,
    /// PostgreSQL
    #[serde(alias = "postgres")]
    PostgreSQL,
    /// MySQL
    MySQL,
}

impl Dialect {
    /// Parse dialect from string.
    pub fn from_name(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "auto" => Some(Self::Auto),
            "generic" => Some(Self::Generic),
            "postgres" | "postgresql" => Some(Self::PostgreSQL),
            "mysql" => Some(Self::MySQL),
            _ => None,
        }
    }

    /// Guess the dialect of a dump from its header and type keywords.
    pub fn detect(content: &str) -> Self {
        let lower = content.to_lowercase();

        let postgres_markers = ["postgresql database dump", "pg_dump", "serial", "timestamptz", "::"];
        let mysql_markers = ["mysql dump", "mysqldump", "auto_increment", "engine=", "`"];

        if postgres_markers.iter().any(|m| lower.contains(m)) {
            return Self::PostgreSQL;
        }
        if mysql_markers.iter().any(|m| lower.contains(m)) {
            return Self::MySQL;
        }
        Self::Generic
    }

    /// Resolve Auto to a concrete dialect.
    pub fn resolve(self, content: &str) -> Self {
        match self {
            Self::Auto => Self::detect(content),
            other => other,
        }
    }

    /// Quote an identifier for emitted SQL.
    pub fn quote(self, ident: &str) -> String {
        match self {
            Self::PostgreSQL => format!("\"{}\"", ident.replace('"', "\"\"")),
            Self::MySQL => format!("`{}`", ident.replace('`', "``")),
            Self::Auto | Self::Generic => ident.to_string(),
        }
    }

    /// Whether unquoted identifiers fold to lower case.
    pub fn folds_to_lowercase(self) -> bool {
        matches!(self, Self::PostgreSQL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_postgres() {
        let sql = "-- PostgreSQL database dump\nCREATE TABLE users (id SERIAL);";
        assert_eq!(Dialect::detect(sql), Dialect::PostgreSQL);
    }

    #[test]
    fn test_detect_mysql() {
        let sql = "-- MySQL dump\nCREATE TABLE `users` (id INT AUTO_INCREMENT);";
        assert_eq!(Dialect::detect(sql), Dialect::MySQL);
    }

    #[test]
    fn test_detect_generic() {
        let sql = "CREATE TABLE users (id INTEGER PRIMARY KEY);";
        assert_eq!(Dialect::detect(sql), Dialect::Generic);
        assert_eq!(Dialect::Auto.resolve(sql), Dialect::Generic);
        assert_eq!(Dialect::MySQL.resolve(sql), Dialect::MySQL);
    }

    #[test]
    fn test_quote() {
        assert_eq!(Dialect::Generic.quote("film"), "film");
        assert_eq!(Dialect::PostgreSQL.quote("my\"table"), "\"my\"\"table\"");
        assert_eq!(Dialect::MySQL.quote("film"), "`film`");
    }

    #[test]
    fn test_from_name() {
        assert_eq!(Dialect::from_name("Postgres"), Some(Dialect::PostgreSQL));
        assert_eq!(Dialect::from_name("oracle"), None);
    }
}
