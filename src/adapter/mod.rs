//! Database adapters
//!
//! An adapter physically creates (or reopens) one database from its declared
//! tables and indexes and hands back a live [`DatabaseHandle`]. Adapters are
//! looked up by the schema entry's `type` string through an [`AdapterSet`].
//!
//! Layout on disk, relative to the registry root:
//! ```text
//! {root_dir}/db/
//!   ├── leveldb/
//!   │   └── {name}/        # sled database directory
//!   └── sqlite/
//!       └── {name}.db      # SQLite database file
//! ```

mod leveldb;
mod sqlite;

pub use leveldb::LevelDbAdapter;
pub use sqlite::{SqlDatabase, SqliteAdapter, TRACKING_TABLE};

use crate::config::Config;
use crate::error::{RegistryError, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub const LEVELDB: &str = "leveldb";
pub const SQLITE: &str = "sqlite";

/// Backend-specific creation routine for one database type
#[async_trait]
pub trait DatabaseAdapter: Send + Sync {
    async fn create(
        &self,
        root_dir: &Path,
        db_type: &str,
        name: &str,
        tables: Option<&Value>,
        indexes: Option<&Value>,
    ) -> Result<DatabaseHandle>;
}

/// Live reference to an opened database
#[derive(Debug, Clone)]
pub enum DatabaseHandle {
    KeyValue(sled::Db),
    Sql(SqlDatabase),
}

impl DatabaseHandle {
    pub fn kind(&self) -> &'static str {
        match self {
            DatabaseHandle::KeyValue(_) => "key-value",
            DatabaseHandle::Sql(_) => "sql",
        }
    }

    pub fn as_key_value(&self) -> Option<&sled::Db> {
        match self {
            DatabaseHandle::KeyValue(db) => Some(db),
            _ => None,
        }
    }

    pub fn as_sql(&self) -> Option<&SqlDatabase> {
        match self {
            DatabaseHandle::Sql(db) => Some(db),
            _ => None,
        }
    }
}

/// Adapters keyed by database type, populated once before `init`
#[derive(Clone, Default)]
pub struct AdapterSet {
    adapters: HashMap<String, Arc<dyn DatabaseAdapter>>,
}

impl AdapterSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// `leveldb` and `sqlite`, configured from `config`.
    pub fn with_defaults(config: &Config) -> Self {
        Self::new()
            .with(LEVELDB, Arc::new(LevelDbAdapter::new()))
            .with(SQLITE, Arc::new(SqliteAdapter::new(config.sqlite_busy_timeout)))
    }

    pub fn with(mut self, db_type: &str, adapter: Arc<dyn DatabaseAdapter>) -> Self {
        self.register(db_type, adapter);
        self
    }

    /// Returns the adapter previously registered for `db_type`, if any.
    pub fn register(&mut self, db_type: &str, adapter: Arc<dyn DatabaseAdapter>) -> Option<Arc<dyn DatabaseAdapter>> {
        self.adapters.insert(db_type.to_string(), adapter)
    }

    pub fn get(&self, db_type: &str) -> Result<Arc<dyn DatabaseAdapter>> {
        self.adapters
            .get(db_type)
            .cloned()
            .ok_or_else(|| RegistryError::AdapterNotFound {
                db_type: db_type.to_string(),
            })
    }

    pub fn types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.adapters.keys().map(String::as_str).collect();
        types.sort_unstable();
        types
    }
}

/// `{root_dir}/db/{db_type}`, after checking both components are plain names.
pub(crate) fn type_dir(root_dir: &Path, db_type: &str, name: &str) -> Result<PathBuf> {
    check_path_component(name, db_type)?;
    check_path_component(name, name)?;
    Ok(root_dir.join("db").join(db_type))
}

fn check_path_component(database: &str, component: &str) -> Result<()> {
    let bad = component.is_empty()
        || component == "."
        || component == ".."
        || component.contains(['/', '\\', '\0']);
    if bad {
        return Err(RegistryError::definition(
            database,
            format!("'{}' cannot be used as a path component", component),
        ));
    }
    Ok(())
}
