//! Schema list validation
//!
//! Checks run in list order and the first failure wins. Nothing here touches
//! the filesystem or an adapter.

use crate::error::{RegistryError, Result};
use crate::schema::types::SchemaEntry;
use serde_json::Value;
use std::collections::HashSet;

pub const SCHEMA_MISSING: &str = "database schema is missing";
pub const SCHEMA_NOT_ARRAY: &str = "invalid database schema, schema must be an array";
pub const TYPE_REQUIRED: &str = "invalid database schema item, type is required";
pub const NAME_REQUIRED: &str = "invalid database schema item, name is required";
pub const KEY_REQUIRED: &str = "invalid database schema item, key is required";
pub const KEY_NOT_UNIQUE: &str = "invalid database schema item, key must be unique";

/// Validate an untyped schema list and convert it into typed entries.
///
/// A required field that is absent, empty, or not a string is reported as
/// missing.
pub fn validate_schema(schema: Option<&Value>) -> Result<Vec<SchemaEntry>> {
    let items = match schema {
        None | Some(Value::Null) => return Err(RegistryError::invalid_schema(SCHEMA_MISSING)),
        Some(Value::Array(items)) => items,
        Some(_) => return Err(RegistryError::invalid_schema(SCHEMA_NOT_ARRAY)),
    };

    let mut keys = HashSet::with_capacity(items.len());
    let mut entries = Vec::with_capacity(items.len());

    for item in items {
        required_str(item, "type", TYPE_REQUIRED)?;
        required_str(item, "name", NAME_REQUIRED)?;
        let key = required_str(item, "key", KEY_REQUIRED)?;

        if !keys.insert(key.to_string()) {
            return Err(RegistryError::invalid_schema(KEY_NOT_UNIQUE));
        }

        let entry: SchemaEntry = serde_json::from_value(item.clone()).map_err(|e| RegistryError::InvalidSchema {
            message: format!("invalid database schema item: {}", e),
        })?;
        entries.push(entry);
    }

    Ok(entries)
}

/// Same checks as [`validate_schema`] for entries that are already typed.
pub fn validate_entries(entries: &[SchemaEntry]) -> Result<()> {
    let mut keys = HashSet::with_capacity(entries.len());

    for entry in entries {
        if entry.db_type.is_empty() {
            return Err(RegistryError::invalid_schema(TYPE_REQUIRED));
        }
        if entry.name.is_empty() {
            return Err(RegistryError::invalid_schema(NAME_REQUIRED));
        }
        if entry.key.is_empty() {
            return Err(RegistryError::invalid_schema(KEY_REQUIRED));
        }
        if !keys.insert(entry.key.as_str()) {
            return Err(RegistryError::invalid_schema(KEY_NOT_UNIQUE));
        }
    }

    Ok(())
}

fn required_str<'a>(item: &'a Value, field: &str, message: &str) -> Result<&'a str> {
    item.get(field)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| RegistryError::invalid_schema(message))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn message(result: Result<Vec<SchemaEntry>>) -> String {
        result.unwrap_err().to_string()
    }

    #[test]
    fn test_missing_schema() {
        assert_eq!(message(validate_schema(None)), SCHEMA_MISSING);
        assert_eq!(message(validate_schema(Some(&Value::Null))), SCHEMA_MISSING);
    }

    #[test]
    fn test_schema_must_be_array() {
        let schema = json!({ "type": "leveldb", "name": "kv", "key": "kv" });
        assert!(message(validate_schema(Some(&schema))).contains("schema must be an array"));
        assert!(message(validate_schema(Some(&json!("leveldb")))).contains("schema must be an array"));
    }

    #[test]
    fn test_required_fields() {
        let no_type = json!([{ "name": "kv", "key": "kv" }]);
        assert!(message(validate_schema(Some(&no_type))).contains("type is required"));

        let no_name = json!([{ "type": "leveldb", "key": "kv" }]);
        assert!(message(validate_schema(Some(&no_name))).contains("name is required"));

        let no_key = json!([{ "type": "leveldb", "name": "kv" }]);
        assert!(message(validate_schema(Some(&no_key))).contains("key is required"));

        let empty_key = json!([{ "type": "leveldb", "name": "kv", "key": "" }]);
        assert!(message(validate_schema(Some(&empty_key))).contains("key is required"));

        let not_object = json!([42]);
        assert!(message(validate_schema(Some(&not_object))).contains("type is required"));
    }

    #[test]
    fn test_first_failure_wins() {
        let schema = json!([
            { "type": "leveldb", "key": "a" },
            { "name": "b", "key": "b" }
        ]);
        assert!(message(validate_schema(Some(&schema))).contains("name is required"));
    }

    #[test]
    fn test_duplicate_keys() {
        let schema = json!([
            { "type": "leveldb", "name": "one", "key": "shared" },
            { "type": "sqlite", "name": "two", "key": "shared" }
        ]);
        assert!(message(validate_schema(Some(&schema))).contains("key must be unique"));
    }

    #[test]
    fn test_valid_schema_preserves_order_and_definitions() {
        let schema = json!([
            { "type": "leveldb", "name": "streembitkv", "key": "kv", "tables": ["contacts"] },
            { "type": "sqlite", "name": "streembitsql", "key": "sql" }
        ]);
        let entries = validate_schema(Some(&schema)).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].key, "kv");
        assert_eq!(entries[0].tables, Some(json!(["contacts"])));
        assert_eq!(entries[1].db_type, "sqlite");
        assert!(entries[1].indexes.is_none());
    }

    #[test]
    fn test_empty_list_is_valid() {
        assert!(validate_schema(Some(&json!([]))).unwrap().is_empty());
    }

    #[test]
    fn test_validate_typed_entries() {
        let entries = vec![
            SchemaEntry::new("leveldb", "one", "a"),
            SchemaEntry::new("sqlite", "two", "a"),
        ];
        let err = validate_entries(&entries).unwrap_err();
        assert!(err.to_string().contains("key must be unique"));

        let entries = vec![SchemaEntry::new("", "one", "a")];
        assert!(validate_entries(&entries).unwrap_err().to_string().contains("type is required"));

        let entries = vec![SchemaEntry::new("leveldb", "one", "a"), SchemaEntry::new("sqlite", "two", "b")];
        assert!(validate_entries(&entries).is_ok());
    }
}
