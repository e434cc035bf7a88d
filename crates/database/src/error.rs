use configuration::error::ConfigError;
use core_types::CoreError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Failed to load the database configuration: {0}")]
    Configuration(#[from] ConfigError),

    #[error("Failed to connect to the database: {0}")]
    Connection(#[source] sqlx::Error),

    #[error("Invalid request: {0}")]
    Validation(#[from] CoreError),

    #[error("User '{username}' is not authorized: {reason}")]
    Authorization { username: String, reason: String },

    #[error("Database query failed: {0}")]
    Query(#[from] sqlx::Error),

    #[error("The requested {0} was not found in the database.")]
    NotFound(String),

    #[error("Cannot modify {what}: {reason}")]
    Conflict { what: String, reason: String },

    #[error("The gateway holds no open database connection.")]
    Closed,

    #[error("Failed to hash the password: {0}")]
    PasswordHash(#[from] bcrypt::BcryptError),
}
