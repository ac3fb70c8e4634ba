//! Multidb Registry
//!
//! Creates heterogeneous embedded databases (sled key-value stores, SQLite)
//! from a declarative schema list and keeps them in a process-wide registry
//! addressed by logical key.

pub mod adapter;
pub mod config;
pub mod error;
pub mod logging;
pub mod registry;
pub mod schema;

pub use adapter::{AdapterSet, DatabaseAdapter, DatabaseHandle, SqlDatabase};
pub use config::Config;
pub use error::{RegistryError, Result};
pub use registry::Registry;
pub use schema::SchemaEntry;
