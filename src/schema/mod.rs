pub mod types;
pub mod validator;

pub use types::{
    is_valid_identifier, parse_indexes, parse_tables, ColumnDefinition, IndexDefinition, SchemaEntry,
    TableDefinition,
};
pub use validator::{validate_entries, validate_schema};

use crate::error::{RegistryError, Result};
use serde_json::Value;
use std::fs;
use std::path::Path;

/// Read a JSON schema file without validating its content.
pub fn load_schema_file(path: &Path) -> Result<Value> {
    let content = fs::read_to_string(path).map_err(|e| RegistryError::SchemaLoadFailed {
        path: path.to_path_buf(),
        cause: e.to_string(),
    })?;

    serde_json::from_str(&content).map_err(|e| RegistryError::SchemaLoadFailed {
        path: path.to_path_buf(),
        cause: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_schema_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("schema.json");
        fs::write(&path, r#"[{ "type": "leveldb", "name": "kv", "key": "kv" }]"#).unwrap();

        let value = load_schema_file(&path).unwrap();
        assert_eq!(validate_schema(Some(&value)).unwrap().len(), 1);
    }

    #[test]
    fn test_load_schema_file_errors() {
        let temp_dir = TempDir::new().unwrap();

        let missing = load_schema_file(&temp_dir.path().join("missing.json")).unwrap_err();
        assert!(matches!(missing, RegistryError::SchemaLoadFailed { .. }));

        let path = temp_dir.path().join("broken.json");
        fs::write(&path, "[{").unwrap();
        let broken = load_schema_file(&path).unwrap_err();
        assert!(matches!(broken, RegistryError::SchemaLoadFailed { .. }));
    }
}
