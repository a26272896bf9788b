use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::workflow::{StepConfig, StepType};

// Workflow as stored, steps included
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowRecord {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub is_default: bool,
    pub steps: Vec<StepRecord>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
    pub id: i64,
    pub name: String,
    pub step_type: StepType,
    pub order: u32,
    #[serde(default)]
    pub config: StepConfig,
}

// Step as sent on a full replace; the store assigns the id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepPayload {
    pub name: String,
    pub step_type: StepType,
    pub order: u32,
    #[serde(default)]
    pub config: StepConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewWorkflow {
    pub name: String,
    #[serde(default)]
    pub description: String,
}
