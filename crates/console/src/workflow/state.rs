use serde::Serialize;
use std::fmt;

/// Where the selected workflow's local step list stands relative to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EditorState {
    /// Local list matches what was last loaded.
    Idle,
    /// Local list has diverged and has not been saved.
    Editing,
    /// A save is in flight; further saves are refused.
    Saving,
}

impl EditorState {
    pub fn can_save(&self) -> bool {
        !matches!(self, EditorState::Saving)
    }
}

impl fmt::Display for EditorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EditorState::Idle => write!(f, "Idle"),
            EditorState::Editing => write!(f, "Editing"),
            EditorState::Saving => write!(f, "Saving"),
        }
    }
}
