use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    #[error("The provided sort key does not match any columns of the {table} table! Key: {key}")]
    InvalidSortKey { table: &'static str, key: String },

    #[error("Invalid input for {0}: {1}")]
    InvalidInput(String, String),
}
