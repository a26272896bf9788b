mod config;
mod factory;
mod memory;
mod models;
mod sqlite;

pub use config::{DatabaseConfig, DatabaseType};
pub use factory::create_store;
pub use memory::MemoryStore;
pub use models::*;
pub use sqlite::SqliteStore;

use async_trait::async_trait;

pub(crate) const DEFAULT_WORKFLOW_PROTECTED: &str = "Cannot delete the default workflow.";
pub(crate) const LAST_WORKFLOW_PROTECTED: &str =
    "Cannot delete the last remaining workflow. At least one workflow is required.";

/// Persistence collaborator behind the workflow editor.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Store: Send + Sync {
    // Initialize storage schema
    async fn init(&self) -> crate::Result<()>;

    async fn list_workflows(&self) -> crate::Result<Vec<WorkflowRecord>>;

    /// Creates a workflow with no steps and `is_default = false`.
    async fn create_workflow(&self, workflow: NewWorkflow) -> crate::Result<WorkflowRecord>;

    /// Replaces every step of the workflow with `steps`, atomically.
    async fn replace_steps(&self, workflow_id: i64, steps: Vec<StepPayload>) -> crate::Result<()>;

    /// Makes `workflow_id` the only default workflow.
    async fn set_default(&self, workflow_id: i64) -> crate::Result<()>;

    /// Fails with `Error::Conflict` for the default or the last workflow.
    async fn delete_workflow(&self, workflow_id: i64) -> crate::Result<()>;
}
