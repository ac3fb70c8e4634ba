use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("callback is required")]
    MissingCallback,

    #[error("{message}")]
    InvalidSchema { message: String },

    #[error("Failed to load database schema from {path:?}: {cause}")]
    SchemaLoadFailed { path: PathBuf, cause: String },

    #[error("No adapter registered for database type '{db_type}'")]
    AdapterNotFound { db_type: String },

    #[error("Invalid definition for database {database}: {message}")]
    InvalidDefinition { database: String, message: String },

    #[error("Storage failure in {database}: {cause}")]
    StorageFailed { database: String, cause: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl RegistryError {
    pub(crate) fn invalid_schema(message: &str) -> Self {
        RegistryError::InvalidSchema {
            message: message.to_string(),
        }
    }

    pub(crate) fn storage(database: &str, cause: impl std::fmt::Display) -> Self {
        RegistryError::StorageFailed {
            database: database.to_string(),
            cause: cause.to_string(),
        }
    }

    pub(crate) fn definition(database: &str, message: impl Into<String>) -> Self {
        RegistryError::InvalidDefinition {
            database: database.to_string(),
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for RegistryError {
    fn from(err: std::io::Error) -> Self {
        RegistryError::Internal(format!("IO error: {}", err))
    }
}

impl From<serde_json::Error> for RegistryError {
    fn from(err: serde_json::Error) -> Self {
        RegistryError::Internal(format!("JSON error: {}", err))
    }
}

impl From<tokio::task::JoinError> for RegistryError {
    fn from(err: tokio::task::JoinError) -> Self {
        RegistryError::Internal(format!("Background task failed: {}", err))
    }
}

pub type Result<T> = std::result::Result<T, RegistryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_schema_displays_message_verbatim() {
        let err = RegistryError::invalid_schema("invalid database schema, schema must be an array");
        assert_eq!(err.to_string(), "invalid database schema, schema must be an array");
    }

    #[test]
    fn test_missing_callback_message() {
        assert_eq!(RegistryError::MissingCallback.to_string(), "callback is required");
    }
}
