//! Database Registry
//!
//! Holds every database created from a schema list under its logical key.
//! Entries are created strictly one after another, in list order; the first
//! failure stops processing and is returned as-is. Keys that already hold a
//! handle are skipped, so calling `init` again never reopens a database.
//!
//! A process-wide instance is available through [`Registry::instance`].
//! Standalone registries (own root directory, own adapters) can be built with
//! [`Registry::new`] or [`Registry::from_config`].

use crate::adapter::{AdapterSet, DatabaseHandle};
use crate::config::Config;
use crate::error::{RegistryError, Result};
use crate::schema::{load_schema_file, validate_entries, validate_schema, SchemaEntry};
use dashmap::DashMap;
use once_cell::sync::OnceCell;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

static INSTANCE: OnceCell<Registry> = OnceCell::new();

pub struct Registry {
    databases: DashMap<String, Arc<DatabaseHandle>>,
    adapters: AdapterSet,
    root_dir: Option<PathBuf>,
}

impl Registry {
    /// The process-wide registry, created with the default adapters on first use.
    pub fn instance() -> &'static Registry {
        INSTANCE.get_or_init(|| Registry::new(AdapterSet::with_defaults(&Config::default())))
    }

    /// Make `registry` the process-wide instance. Fails if one already exists.
    pub fn install(registry: Registry) -> Result<&'static Registry> {
        INSTANCE
            .set(registry)
            .map_err(|_| RegistryError::Internal("Database registry has already been initialized".to_string()))?;
        INSTANCE
            .get()
            .ok_or_else(|| RegistryError::Internal("Database registry missing after install".to_string()))
    }

    pub fn new(adapters: AdapterSet) -> Self {
        Self {
            databases: DashMap::new(),
            adapters,
            root_dir: None,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        let registry = Self::new(AdapterSet::with_defaults(config));
        match &config.root_dir {
            Some(root_dir) => registry.with_root_dir(root_dir),
            None => registry,
        }
    }

    /// Pin the base directory instead of following the working directory.
    pub fn with_root_dir(mut self, root_dir: &Path) -> Self {
        self.root_dir = Some(root_dir.to_path_buf());
        self
    }

    /// Base path handed to every adapter: the pinned root, or the process
    /// working directory at call time.
    pub fn root_dir(&self) -> Result<PathBuf> {
        match &self.root_dir {
            Some(dir) => Ok(dir.clone()),
            None => std::env::current_dir()
                .map_err(|e| RegistryError::Internal(format!("Cannot resolve working directory: {}", e))),
        }
    }

    pub fn getdb(&self, key: &str) -> Option<Arc<DatabaseHandle>> {
        self.databases.get(key).map(|entry| entry.value().clone())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.databases.contains_key(key)
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.databases.iter().map(|entry| entry.key().clone()).collect();
        keys.sort();
        keys
    }

    pub fn len(&self) -> usize {
        self.databases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.databases.is_empty()
    }

    /// Validate `schema` and create every database it declares.
    ///
    /// JSON `null` is treated as a missing schema.
    pub async fn init(&self, schema: &Value) -> Result<()> {
        let entries = validate_schema(Some(schema))?;
        self.create_all(&entries).await
    }

    pub async fn init_entries(&self, entries: &[SchemaEntry]) -> Result<()> {
        validate_entries(entries)?;
        self.create_all(entries).await
    }

    pub async fn init_from_file(&self, path: &Path) -> Result<()> {
        let schema = load_schema_file(path)?;
        self.init(&schema).await
    }

    /// Run `init` on the schema file named by `config.schema_path`.
    ///
    /// Does nothing when no schema path is configured.
    pub async fn init_from_config(&self, config: &Config) -> Result<()> {
        match &config.schema_path {
            Some(path) => self.init_from_file(path).await,
            None => {
                debug!("No schema path configured, nothing to initialize");
                Ok(())
            }
        }
    }

    /// Callback form of [`Registry::init`].
    ///
    /// Fails immediately with [`RegistryError::MissingCallback`] when no
    /// callback is given. Otherwise the work runs on the current Tokio runtime
    /// and `callback` is invoked exactly once, with `None` on success. A panic
    /// during creation is reported to the callback as `Internal`.
    pub fn init_with_callback<F>(&'static self, schema: Value, callback: Option<F>) -> Result<JoinHandle<()>>
    where
        F: FnOnce(Option<RegistryError>) + Send + 'static,
    {
        let callback = callback.ok_or(RegistryError::MissingCallback)?;
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| RegistryError::Internal(format!("No Tokio runtime available: {}", e)))?;

        let worker = runtime.clone();
        Ok(runtime.spawn(async move {
            let outcome = match worker.spawn(async move { self.init(&schema).await }).await {
                Ok(result) => result.err(),
                Err(e) => Some(RegistryError::from(e)),
            };
            callback(outcome);
        }))
    }

    async fn create_all(&self, entries: &[SchemaEntry]) -> Result<()> {
        info!("Initializing {} databases", entries.len());

        for entry in entries {
            self.create_database(entry).await?;
        }

        Ok(())
    }

    async fn create_database(&self, entry: &SchemaEntry) -> Result<()> {
        if self.databases.contains_key(&entry.key) {
            debug!("Database {} already registered under key {}, skipping", entry.name, entry.key);
            return Ok(());
        }

        let adapter = self.adapters.get(&entry.db_type)?;
        let root_dir = self.root_dir()?;

        let handle = adapter
            .create(
                &root_dir,
                &entry.db_type,
                &entry.name,
                entry.tables.as_ref(),
                entry.indexes.as_ref(),
            )
            .await?;

        // A handle stored by an overlapping init wins; ours is dropped.
        self.databases
            .entry(entry.key.clone())
            .or_insert_with(|| Arc::new(handle));

        info!("Added {} database {} under key {}", entry.db_type, entry.name, entry.key);
        Ok(())
    }
}
