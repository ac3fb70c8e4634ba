use multidb_registry::{Config, Registry, RegistryError};
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures").join(name)
}

fn registry(temp_dir: &TempDir) -> Registry {
    Registry::from_config(&Config::default()).with_root_dir(temp_dir.path())
}

async fn init_error(file: &str) -> String {
    let temp_dir = TempDir::new().unwrap();
    let registry = registry(&temp_dir);
    let err = registry.init_from_file(&fixture(file)).await.unwrap_err();
    assert!(registry.is_empty());
    assert!(!temp_dir.path().join("db").exists());
    err.to_string()
}

#[tokio::test]
async fn test_schema_must_be_array() {
    assert!(init_error("schema_with_noarray.json").await.contains("schema must be an array"));
}

#[tokio::test]
async fn test_schema_item_requires_type() {
    assert!(init_error("schema_with_invalid_type.json").await.contains("type is required"));
}

#[tokio::test]
async fn test_schema_item_requires_name() {
    assert!(init_error("schema_with_invalid_name.json").await.contains("name is required"));
}

#[tokio::test]
async fn test_schema_item_requires_key() {
    assert!(init_error("schema_with_invalid_key.json").await.contains("key is required"));
}

#[tokio::test]
async fn test_schema_keys_must_be_unique() {
    assert!(init_error("schema_with_notuniquekeys.json").await.contains("key must be unique"));
}

#[tokio::test]
async fn test_missing_schema() {
    let temp_dir = TempDir::new().unwrap();
    let err = registry(&temp_dir).init(&serde_json::Value::Null).await.unwrap_err();
    assert!(err.to_string().contains("schema is missing"));
}

#[tokio::test]
async fn test_leveldb_schema_creates_database() {
    let temp_dir = TempDir::new().unwrap();
    let registry = registry(&temp_dir);

    registry.init_from_file(&fixture("schema_for_leveldb.json")).await.unwrap();

    assert!(temp_dir.path().join("db/leveldb/streembitkv").is_dir());
    let handle = registry.getdb("streembitkv").unwrap();
    let db = handle.as_key_value().unwrap();

    let contacts = db.open_tree("contacts").unwrap();
    contacts.insert("bob", "02a1").unwrap();
    assert!(contacts.contains_key("bob").unwrap());
}

#[tokio::test]
async fn test_sqlite_schema_creates_database() {
    let temp_dir = TempDir::new().unwrap();
    let registry = registry(&temp_dir);

    registry.init_from_file(&fixture("schema_for_sqlite.json")).await.unwrap();

    let handle = registry.getdb("streembitsql").unwrap();
    let db = handle.as_sql().unwrap();
    assert!(temp_dir.path().join("db/sqlite/streembitsql.db").is_file());
    assert_eq!(db.deployed_tables().unwrap(), vec!["accounts".to_string(), "contacts".to_string()]);

    let lastseen: i64 = db
        .with_connection(|conn| {
            conn.execute(
                "INSERT INTO contacts (accountid, name, publickey) VALUES (1, 'alice', '03bb')",
                [],
            )?;
            conn.query_row("SELECT lastseen FROM contacts WHERE name = 'alice'", [], |row| row.get(0))
        })
        .unwrap();
    assert_eq!(lastseen, 0);
}

#[tokio::test]
async fn test_mixed_backends_in_one_schema() {
    let temp_dir = TempDir::new().unwrap();
    let registry = registry(&temp_dir);

    registry
        .init(&json!([
            { "type": "leveldb", "name": "kvstore", "key": "kv1" },
            {
                "type": "sqlite",
                "name": "relational",
                "key": "sql1",
                "tables": [{ "name": "events", "columns": [{ "name": "id", "type": "INTEGER", "primary_key": true }] }]
            }
        ]))
        .await
        .unwrap();

    assert_eq!(registry.keys(), vec!["kv1".to_string(), "sql1".to_string()]);
    assert_eq!(registry.getdb("kv1").unwrap().kind(), "key-value");
    assert_eq!(registry.getdb("sql1").unwrap().kind(), "sql");
}

#[tokio::test]
async fn test_second_init_keeps_existing_handles() {
    let temp_dir = TempDir::new().unwrap();
    let registry = registry(&temp_dir);
    let schema = fixture("schema_for_sqlite.json");

    registry.init_from_file(&schema).await.unwrap();
    let first = registry.getdb("streembitsql").unwrap();

    registry.init_from_file(&schema).await.unwrap();
    let second = registry.getdb("streembitsql").unwrap();

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(registry.len(), 1);
}

#[tokio::test]
async fn test_invalid_table_definition_is_reported() {
    let temp_dir = TempDir::new().unwrap();
    let registry = registry(&temp_dir);

    let err = registry
        .init(&json!([
            { "type": "sqlite", "name": "relational", "key": "sql1", "tables": ["no_columns"] }
        ]))
        .await
        .unwrap_err();

    assert!(matches!(err, RegistryError::InvalidDefinition { .. }));
    assert!(registry.getdb("sql1").is_none());
}

#[test]
fn test_missing_schema_file() {
    let temp_dir = TempDir::new().unwrap();
    let registry = registry(&temp_dir);
    let result = tokio_test::block_on(registry.init_from_file(&temp_dir.path().join("nope.json")));
    let err = tokio_test::assert_err!(result);
    assert!(matches!(err, RegistryError::SchemaLoadFailed { .. }));
}

#[test]
fn test_callback_is_required() {
    let result = Registry::instance().init_with_callback(json!([]), None::<fn(Option<RegistryError>)>);
    assert!(matches!(result, Err(RegistryError::MissingCallback)));
}

#[tokio::test]
async fn test_callback_receives_none_on_success() {
    let (tx, rx) = tokio::sync::oneshot::channel();

    Registry::instance()
        .init_with_callback(json!([]), Some(move |err: Option<RegistryError>| {
            let _ = tx.send(err.is_none());
        }))
        .unwrap();

    assert!(rx.await.unwrap());
}
