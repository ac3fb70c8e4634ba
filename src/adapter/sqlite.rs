//! Relational adapter backed by SQLite
//!
//! Tables are deployed declaratively with `CREATE TABLE IF NOT EXISTS`:
//! 1. Parse and check table/index definitions
//! 2. Open `{root_dir}/db/{type}/{name}.db` and apply pragmas
//! 3. Ensure the tracking table exists
//! 4. Create each table whose DDL checksum is not yet recorded
//! 5. Create indexes, after checking their columns exist in the live table
//!
//! Steps 3-5 run in a single transaction.

use super::{type_dir, DatabaseAdapter, DatabaseHandle};
use crate::error::{RegistryError, Result};
use crate::schema::{parse_indexes, parse_tables, ColumnDefinition, IndexDefinition, TableDefinition};
use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Records every table this adapter created, with the checksum of its DDL.
pub const TRACKING_TABLE: &str = "_registry_tables";

const COLUMN_TYPES: [&str; 5] = ["INTEGER", "TEXT", "REAL", "BLOB", "NUMERIC"];

#[derive(Debug)]
pub struct SqliteAdapter {
    busy_timeout: Duration,
}

impl Default for SqliteAdapter {
    fn default() -> Self {
        Self::new(Duration::from_millis(5000))
    }
}

impl SqliteAdapter {
    pub fn new(busy_timeout: Duration) -> Self {
        Self { busy_timeout }
    }
}

#[async_trait]
impl DatabaseAdapter for SqliteAdapter {
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
        check_definitions(name, &tables, &indexes)?;

        let path = type_dir(root_dir, db_type, name)?.join(format!("{}.db", name));
        let db_path = path.clone();
        let db_name = name.to_string();
        let busy_timeout = self.busy_timeout;

        let (connection, result) = tokio::task::spawn_blocking(move || {
            let mut connection = open_connection(&db_path, &db_name, busy_timeout)?;
            let result = deploy(&mut connection, &db_name, &tables, &indexes)?;
            Ok::<_, RegistryError>((connection, result))
        })
        .await??;

        info!(
            "Deployed sqlite database {}: {} tables created, {} skipped, {} indexes",
            name, result.tables_created, result.tables_skipped, result.indexes_created
        );

        Ok(DatabaseHandle::Sql(SqlDatabase {
            path,
            connection: Arc::new(Mutex::new(connection)),
        }))
    }
}

/// Open SQLite database owned by the registry
#[derive(Debug, Clone)]
pub struct SqlDatabase {
    path: PathBuf,
    connection: Arc<Mutex<Connection>>,
}

impl SqlDatabase {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Run `f` with exclusive access to the connection.
    pub fn with_connection<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> rusqlite::Result<T>,
    {
        let connection = self
            .connection
            .lock()
            .map_err(|_| RegistryError::Internal(format!("Connection lock poisoned for {:?}", self.path)))?;
        f(&connection).map_err(|e| RegistryError::storage(&self.path.display().to_string(), e))
    }

    /// Names of tables recorded in the tracking table, sorted.
    pub fn deployed_tables(&self) -> Result<Vec<String>> {
        self.with_connection(|conn| {
            let mut stmt = conn.prepare(&format!("SELECT table_name FROM {} ORDER BY table_name", TRACKING_TABLE))?;
            let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
            let names: rusqlite::Result<Vec<String>> = rows.collect();
            names
        })
    }
}

#[derive(Debug, Default)]
struct DeployResult {
    tables_created: usize,
    tables_skipped: usize,
    indexes_created: usize,
}

fn check_definitions(database: &str, tables: &[TableDefinition], indexes: &[IndexDefinition]) -> Result<()> {
    for table in tables {
        if table.columns.is_empty() {
            return Err(RegistryError::definition(
                database,
                format!("table '{}' declares no columns", table.name),
            ));
        }
        for column in &table.columns {
            if !COLUMN_TYPES.contains(&column.column_type.to_ascii_uppercase().as_str()) {
                return Err(RegistryError::definition(
                    database,
                    format!(
                        "column '{}.{}' has unsupported type '{}'",
                        table.name, column.name, column.column_type
                    ),
                ));
            }
        }
    }

    for index in indexes {
        let table = tables.iter().find(|t| t.name == index.table).ok_or_else(|| {
            RegistryError::definition(
                database,
                format!("index '{}' references undeclared table '{}'", index.name, index.table),
            )
        })?;
        for column in &index.columns {
            if !table.columns.iter().any(|c| &c.name == column) {
                return Err(RegistryError::definition(
                    database,
                    format!("index '{}' references unknown column '{}.{}'", index.name, index.table, column),
                ));
            }
        }
    }

    Ok(())
}

fn open_connection(path: &Path, name: &str, busy_timeout: Duration) -> Result<Connection> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| RegistryError::storage(name, format!("Failed to create directory {:?}: {}", parent, e)))?;
    }

    let connection = Connection::open(path).map_err(|e| RegistryError::storage(name, e))?;

    connection
        .busy_timeout(busy_timeout)
        .map_err(|e| RegistryError::storage(name, e))?;
    connection
        .execute_batch("PRAGMA foreign_keys = ON;")
        .map_err(|e| RegistryError::storage(name, e))?;
    // journal_mode returns a row, so it cannot go through execute_batch.
    connection
        .query_row("PRAGMA journal_mode = WAL;", [], |row| row.get::<_, String>(0))
        .map_err(|e| RegistryError::storage(name, e))?;

    debug!("Opened sqlite connection to {:?}", path);
    Ok(connection)
}

fn deploy(
    connection: &mut Connection,
    name: &str,
    tables: &[TableDefinition],
    indexes: &[IndexDefinition],
) -> Result<DeployResult> {
    let tx = connection.transaction().map_err(|e| RegistryError::storage(name, e))?;
    let mut result = DeployResult::default();

    tx.execute_batch(&format!(
        "CREATE TABLE IF NOT EXISTS {} (
            table_name TEXT PRIMARY KEY,
            checksum TEXT NOT NULL,
            deployed_at TEXT NOT NULL
        );",
        TRACKING_TABLE
    ))
    .map_err(|e| RegistryError::storage(name, format!("Failed to create {}: {}", TRACKING_TABLE, e)))?;

    for table in tables {
        let sql = create_table_sql(name, table)?;
        let checksum = compute_checksum(&sql);

        let recorded: Option<String> = tx
            .query_row(
                &format!("SELECT checksum FROM {} WHERE table_name = ?1", TRACKING_TABLE),
                params![table.name],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| RegistryError::storage(name, e))?;

        match recorded {
            Some(existing) if existing == checksum => {
                debug!("Table {} unchanged in {}, skipping", table.name, name);
                result.tables_skipped += 1;
            }
            Some(_) => {
                warn!(
                    "Table {} in {} differs from its recorded definition; keeping the existing table",
                    table.name, name
                );
                result.tables_skipped += 1;
            }
            None => {
                tx.execute_batch(&sql)
                    .map_err(|e| RegistryError::storage(name, format!("Failed to create table {}: {}", table.name, e)))?;
                tx.execute(
                    &format!(
                        "INSERT INTO {} (table_name, checksum, deployed_at) VALUES (?1, ?2, ?3)",
                        TRACKING_TABLE
                    ),
                    params![table.name, checksum, Utc::now().to_rfc3339()],
                )
                .map_err(|e| RegistryError::storage(name, e))?;
                debug!("Created table {} in {}", table.name, name);
                result.tables_created += 1;
            }
        }
    }

    // A kept table may lack columns its new definition declares; an index on a
    // missing column would silently index the quoted name as a constant.
    for index in indexes {
        let live_columns = table_columns(&tx, name, &index.table)?;
        if let Some(missing) = index.columns.iter().find(|c| !live_columns.contains(*c)) {
            return Err(RegistryError::definition(
                name,
                format!(
                    "index '{}' references column '{}.{}' which does not exist in the deployed table",
                    index.name, index.table, missing
                ),
            ));
        }

        tx.execute_batch(&create_index_sql(index))
            .map_err(|e| RegistryError::storage(name, format!("Failed to create index {}: {}", index.name, e)))?;
        result.indexes_created += 1;
    }

    tx.commit().map_err(|e| RegistryError::storage(name, e))?;
    Ok(result)
}

fn table_columns(connection: &Connection, database: &str, table: &str) -> Result<Vec<String>> {
    let mut stmt = connection
        .prepare("SELECT name FROM pragma_table_info(?1)")
        .map_err(|e| RegistryError::storage(database, e))?;
    let rows = stmt
        .query_map(params![table], |row| row.get::<_, String>(0))
        .map_err(|e| RegistryError::storage(database, e))?;
    let columns: rusqlite::Result<Vec<String>> = rows.collect();
    columns.map_err(|e| RegistryError::storage(database, e))
}

fn create_table_sql(database: &str, table: &TableDefinition) -> Result<String> {
    let primary_keys: Vec<&str> = table
        .columns
        .iter()
        .filter(|c| c.primary_key)
        .map(|c| c.name.as_str())
        .collect();
    let composite_key = primary_keys.len() > 1;

    let mut parts = Vec::with_capacity(table.columns.len() + 1);
    for column in &table.columns {
        parts.push(column_sql(database, column, !composite_key)?);
    }
    if composite_key {
        let keys: Vec<String> = primary_keys.iter().map(|k| format!("\"{}\"", k)).collect();
        parts.push(format!("PRIMARY KEY ({})", keys.join(", ")));
    }

    Ok(format!(
        "CREATE TABLE IF NOT EXISTS \"{}\" ({});",
        table.name,
        parts.join(", ")
    ))
}

fn column_sql(database: &str, column: &ColumnDefinition, inline_primary_key: bool) -> Result<String> {
    let mut sql = format!("\"{}\" {}", column.name, column.column_type.to_ascii_uppercase());
    if column.primary_key && inline_primary_key {
        sql.push_str(" PRIMARY KEY");
    }
    if column.not_null {
        sql.push_str(" NOT NULL");
    }
    if column.unique {
        sql.push_str(" UNIQUE");
    }
    if let Some(default) = &column.default {
        sql.push_str(" DEFAULT ");
        sql.push_str(&default_literal(database, column, default)?);
    }
    Ok(sql)
}

fn default_literal(database: &str, column: &ColumnDefinition, value: &Value) -> Result<String> {
    match value {
        Value::Null => Ok("NULL".to_string()),
        Value::Bool(b) => Ok(if *b { "1" } else { "0" }.to_string()),
        Value::Number(n) => Ok(n.to_string()),
        Value::String(s) => Ok(format!("'{}'", s.replace('\'', "''"))),
        _ => Err(RegistryError::definition(
            database,
            format!("column '{}' has an unsupported default {}", column.name, value),
        )),
    }
}

fn create_index_sql(index: &IndexDefinition) -> String {
    let columns: Vec<String> = index.columns.iter().map(|c| format!("\"{}\"", c)).collect();
    format!(
        "CREATE {}INDEX IF NOT EXISTS \"{}\" ON \"{}\" ({});",
        if index.unique { "UNIQUE " } else { "" },
        index.name,
        index.table,
        columns.join(", ")
    )
}

fn compute_checksum(sql: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(sql.as_bytes());
    hex::encode(hasher.finalize())
}
