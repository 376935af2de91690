use thiserror::Error;

use crate::key::Key;

#[derive(Error, Debug)]
pub enum ArborError {
    #[error("Configuration error: {0}")]
    Configuration(String),
    #[error("Broken reference: {from} points at parent {missing}, which was not fetched ({} ancestors resolved)", resolved.len())]
    BrokenReference {
        from: Key,
        missing: Key,
        // keys of the partial chain, nearest ancestor first
        resolved: Vec<Key>,
    },
    #[error("Unsupported operation: {table} records do not respond to '{capability}'")]
    Unsupported { table: String, capability: String },
    #[error("Invalid key in column {column}: {message}")]
    InvalidKey { column: String, message: String },
    #[error("Hydration error in column {column}: {message}")]
    Hydration { column: String, message: String },
    #[error("Persistence error: {0}")]
    Persistence(#[from] rusqlite::Error),
    #[error("Settings error: {0}")]
    Settings(#[from] config::ConfigError),
    #[error("Internal invariant violated: {0}")]
    Invariant(String),
}

pub type Result<T> = std::result::Result<T, ArborError>;

impl ArborError {
    pub(crate) fn missing_column(table: &str, column: &str) -> Self {
        Self::Configuration(format!("column '{column}' does not exist on table '{table}'"))
    }
}
