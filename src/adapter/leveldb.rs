//! Key-value adapter backed by sled.
//!
//! Each declared table becomes a tree named after the table, each declared
//! index a tree named `index:{name}`. Column definitions are ignored.

use super::{type_dir, DatabaseAdapter, DatabaseHandle};
use crate::error::{RegistryError, Result};
use crate::schema::{parse_indexes, parse_tables, IndexDefinition, TableDefinition};
use async_trait::async_trait;
use serde_json::Value;
use std::fs;
use std::path::Path;
use tracing::{debug, info};

#[derive(Debug, Default)]
pub struct LevelDbAdapter;

impl LevelDbAdapter {
    pub fn new() -> Self {
        Self
    }

    pub fn index_tree_name(index: &str) -> String {
        format!("index:{}", index)
    }
}

#[async_trait]
impl DatabaseAdapter for LevelDbAdapter {
    async fn create(
        &self,
        root_dir: &Path,
        db_type: &str,
        name: &str,
        tables: Option<&Value>,
        indexes: Option<&Value>,
    ) -> Result<DatabaseHandle> {
        let tables = parse_tables(name, tables)?;
        let indexes = parse_indexes(name, indexes)?;

        for index in &indexes {
            if !tables.iter().any(|t| t.name == index.table) {
                return Err(RegistryError::definition(
                    name,
                    format!("index '{}' references undeclared table '{}'", index.name, index.table),
                ));
            }
        }

        let path = type_dir(root_dir, db_type, name)?.join(name);
        let db_name = name.to_string();

        let db = tokio::task::spawn_blocking(move || open_database(&path, &db_name, &tables, &indexes)).await??;

        Ok(DatabaseHandle::KeyValue(db))
    }
}

fn open_database(
    path: &Path,
    name: &str,
    tables: &[TableDefinition],
    indexes: &[IndexDefinition],
) -> Result<sled::Db> {
    fs::create_dir_all(path).map_err(|e| RegistryError::storage(name, format!("Failed to create directory {:?}: {}", path, e)))?;

    let db = sled::open(path).map_err(|e| RegistryError::storage(name, e))?;

    for table in tables {
        db.open_tree(table.name.as_bytes())
            .map_err(|e| RegistryError::storage(name, format!("Failed to open tree {}: {}", table.name, e)))?;
        debug!("Opened tree {} in {}", table.name, name);
    }

    for index in indexes {
        let tree = LevelDbAdapter::index_tree_name(&index.name);
        db.open_tree(tree.as_bytes())
            .map_err(|e| RegistryError::storage(name, format!("Failed to open tree {}: {}", tree, e)))?;
        debug!("Opened tree {} in {}", tree, name);
    }

    db.flush().map_err(|e| RegistryError::storage(name, e))?;

    info!(
        "Opened key-value database {} at {:?} ({} tables, {} indexes)",
        name,
        path,
        tables.len(),
        indexes.len()
    );

    Ok(db)
}
