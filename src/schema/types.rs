//! Declarative schema types
//!
//! A schema list is an array of [`SchemaEntry`] objects. The registry only
//! looks at `type`, `name` and `key`; `tables` and `indexes` are carried as raw
//! JSON and parsed by the adapter that owns the backend.

use crate::error::{RegistryError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One database declared in a schema list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaEntry {
    #[serde(rename = "type")]
    pub db_type: String,
    pub name: String,
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tables: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub indexes: Option<Value>,
}

impl SchemaEntry {
    pub fn new(db_type: &str, name: &str, key: &str) -> Self {
        Self {
            db_type: db_type.to_string(),
            name: name.to_string(),
            key: key.to_string(),
            tables: None,
            indexes: None,
        }
    }

    pub fn with_tables(mut self, tables: Value) -> Self {
        self.tables = Some(tables);
        self
    }

    pub fn with_indexes(mut self, indexes: Value) -> Self {
        self.indexes = Some(indexes);
        self
    }
}

/// A table declared for a database
#[derive(Debug, Clone, PartialEq)]
pub struct TableDefinition {
    pub name: String,
    pub columns: Vec<ColumnDefinition>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ColumnDefinition {
    pub name: String,
    #[serde(rename = "type")]
    pub column_type: String,
    #[serde(default)]
    pub primary_key: bool,
    #[serde(default)]
    pub not_null: bool,
    #[serde(default)]
    pub unique: bool,
    #[serde(default)]
    pub default: Option<Value>,
}

/// An index over one or more columns of a declared table
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct IndexDefinition {
    pub name: String,
    pub table: String,
    pub columns: Vec<String>,
    #[serde(default)]
    pub unique: bool,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawTable {
    Name(String),
    Full {
        name: String,
        #[serde(default)]
        columns: Vec<ColumnDefinition>,
    },
}

/// Parse the `tables` member of a schema entry.
///
/// Accepts an array whose elements are either bare table names or objects with
/// a `name` and optional `columns`. `None` and JSON `null` mean no tables.
pub fn parse_tables(database: &str, tables: Option<&Value>) -> Result<Vec<TableDefinition>> {
    let items = match as_array(database, "tables", tables)? {
        Some(items) => items,
        None => return Ok(Vec::new()),
    };

    let mut parsed = Vec::with_capacity(items.len());
    for item in items {
        let raw: RawTable = serde_json::from_value(item.clone()).map_err(|e| {
            RegistryError::definition(database, format!("invalid table definition {}: {}", item, e))
        })?;
        let table = match raw {
            RawTable::Name(name) => TableDefinition {
                name,
                columns: Vec::new(),
            },
            RawTable::Full { name, columns } => TableDefinition { name, columns },
        };
        check_identifier(database, "table", &table.name)?;
        for column in &table.columns {
            check_identifier(database, "column", &column.name)?;
        }
        if parsed.iter().any(|t: &TableDefinition| t.name == table.name) {
            return Err(RegistryError::definition(
                database,
                format!("table '{}' is declared more than once", table.name),
            ));
        }
        parsed.push(table);
    }

    Ok(parsed)
}

/// Parse the `indexes` member of a schema entry.
pub fn parse_indexes(database: &str, indexes: Option<&Value>) -> Result<Vec<IndexDefinition>> {
    let items = match as_array(database, "indexes", indexes)? {
        Some(items) => items,
        None => return Ok(Vec::new()),
    };

    let mut parsed = Vec::with_capacity(items.len());
    for item in items {
        let index: IndexDefinition = serde_json::from_value(item.clone()).map_err(|e| {
            RegistryError::definition(database, format!("invalid index definition {}: {}", item, e))
        })?;
        check_identifier(database, "index", &index.name)?;
        check_identifier(database, "table", &index.table)?;
        if index.columns.is_empty() {
            return Err(RegistryError::definition(
                database,
                format!("index '{}' has no columns", index.name),
            ));
        }
        for column in &index.columns {
            check_identifier(database, "column", column)?;
        }
        parsed.push(index);
    }

    Ok(parsed)
}

fn as_array<'a>(database: &str, member: &str, value: Option<&'a Value>) -> Result<Option<&'a Vec<Value>>> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Array(items)) => Ok(Some(items)),
        Some(other) => Err(RegistryError::definition(
            database,
            format!("{} must be an array, got {}", member, other),
        )),
    }
}

fn check_identifier(database: &str, kind: &str, name: &str) -> Result<()> {
    if is_valid_identifier(name) {
        Ok(())
    } else {
        Err(RegistryError::definition(
            database,
            format!("invalid {} name: '{}'", kind, name),
        ))
    }
}

/// Identifiers are interpolated into DDL, so only `[A-Za-z_][A-Za-z0-9_]*`
/// up to 63 characters is accepted.
pub fn is_valid_identifier(name: &str) -> bool {
    if name.is_empty() || name.len() > 63 {
        return false;
    }

    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }

    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
