pub mod config;
pub mod custom_refs;
pub mod error;
pub mod exits;
pub mod graph;
pub mod join_sql;
pub mod join_tree;
pub mod measure;
pub mod paths;
pub mod persist;
pub mod report;
pub mod resolve;
pub mod schema;
pub mod sql;

use wasm_bindgen::prelude::*;

pub use config::ResolverConfig;
pub use error::{Error, Result};
pub use graph::SchemaGraph;
pub use paths::PathsIndex;
pub use resolve::{JoinResolution, JoinResolver, ResolutionStatus};
pub use schema::SchemaDescription;

/// Initialize panic hook for better error messages in WASM
#[wasm_bindgen(start)]
pub fn init() {
    #[cfg(target_arch = "wasm32")]
    console_error_panic_hook::set_once();
}

/// Resolve joins for `tables` against a schema description, returning the
/// resolution as JSON.
#[wasm_bindgen(js_name = "resolveJoins")]
pub fn resolve_joins(
    schema_json: &str,
    tables: js_sys::Array,
    config_json: Option<String>,
) -> Result<String, String> {
    let config = match config_json.as_deref() {
        Some(json) => ResolverConfig::from_json(json).map_err(|e| e.to_string())?,
        None => ResolverConfig::default(),
    };
    let names: Vec<String> = tables.iter().filter_map(|v| v.as_string()).collect();
    resolve_json(schema_json, &names, &config).map_err(|e| e.to_string())
}

/// Convert a DDL dump to schema description JSON.
#[wasm_bindgen(js_name = "importSql")]
pub fn import_sql(source: &str, dialect: Option<String>) -> Result<String, String> {
    let dialect = dialect
        .as_deref()
        .and_then(sql::Dialect::from_name)
        .unwrap_or_default();
    let schema = sql::parse_sql(source, dialect).map_err(|e| e.to_string())?;
    serde_json::to_string(&schema).map_err(|e| e.to_string())
}

fn resolve_json(schema_json: &str, tables: &[String], config: &ResolverConfig) -> Result<String> {
    let schema = SchemaDescription::from_json(schema_json)?;
    let graph = SchemaGraph::build(&schema, config)?;
    let resolution = JoinResolver::new(&graph, config).resolve(tables);
    Ok(serde_json::to_string(&resolution)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_json() {
        let schema = r#"{"tables": [
            {"tableName": "rental", "primaryKey": ["rental_id"], "columns": [], "foreignKeys": [
                {"constraintName": "fk_rental_inventory", "sourceTable": "rental", "targetTable": "inventory",
                 "columnPairs": [{"position": 1, "sourceColumn": "inventory_id", "targetColumn": "inventory_id"}]}
            ]},
            {"tableName": "inventory", "primaryKey": ["inventory_id"], "columns": [], "foreignKeys": []}
        ]}"#;
        let tables = vec!["rental".to_string(), "inventory".to_string()];
        let json = resolve_json(schema, &tables, &ResolverConfig::default()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["status"], "ok");
        assert_eq!(value["joinGraph"][0]["id"], "rental/fk_rental_inventory/inventory");
        assert_eq!(
            value["sql"],
            "FROM rental\nJOIN inventory ON rental.inventory_id = inventory.inventory_id"
        );
    }

    #[test]
    fn test_missing_arrays_are_errors() {
        let err = resolve_json(r#"{"tables": [{"tableName": "t"}]}"#, &[], &ResolverConfig::default());
        assert!(matches!(err, Err(Error::Json(_))));
    }
}
