pub mod catalog;
pub mod editor;
pub mod reorder;
pub mod state;
pub mod steps;

use thiserror::Error;

pub use catalog::{StepConfig, StepType, StepTypeDef};
pub use editor::{EditSession, Workflow, WorkflowEditor, DEFAULT_WORKFLOW_NAME};
pub use reorder::move_step;
pub use state::EditorState;
pub use steps::{Step, StepId, StepList, LOCKED_PREFIX};

/// Rejected edits. Raised before anything is sent to the store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("invalid value for `{field}`: {reason}")]
    InvalidConfig { field: String, reason: String },
    #[error("no step at position {index} (workflow has {len} steps)")]
    StepOutOfRange { index: usize, len: usize },
    #[error("unknown step type: {0}")]
    UnknownStepType(String),
    #[error("workflow name must not be empty")]
    EmptyName,
}
