pub mod config;
pub mod store;
pub mod workflow;

use thiserror::Error;

pub use workflow::ValidationError;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Database migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
    #[error("SQLx error: {0}")]
    Sqlx(#[from] sqlx::Error),
    #[error("JSON error: {0}")]
    SerdeJson(#[from] serde_json::Error),
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
    #[error("Persistence error: {0}")]
    Persistence(String),
    #[error("{0}")]
    Conflict(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Workflow {workflow_id} was created but its steps could not be seeded: {reason}")]
    PartialCreation { workflow_id: i64, reason: String },
    #[error("A save is already in progress")]
    SaveInProgress,
    #[error("No workflow selected")]
    NoSelection,
}

impl Error {
    /// True for failures of the persistence collaborator itself, which the
    /// caller may retry unchanged.
    pub fn is_persistence(&self) -> bool {
        matches!(
            self,
            Error::Persistence(_) | Error::Sqlx(_) | Error::Migrate(_) | Error::Io(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
