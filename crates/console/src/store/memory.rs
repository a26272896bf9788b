use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use tracing::debug;

use crate::{
    store::{
        NewWorkflow, StepPayload, StepRecord, Store, WorkflowRecord, DEFAULT_WORKFLOW_PROTECTED,
        LAST_WORKFLOW_PROTECTED,
    },
    Error, Result,
};

/// Process-local store. Applies the same rules as the SQLite store.
#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
}

#[derive(Default)]
struct MemoryState {
    next_workflow_id: i64,
    next_step_id: i64,
    workflows: Vec<WorkflowRecord>,
}

impl MemoryState {
    fn workflow_mut(&mut self, id: i64) -> Result<&mut WorkflowRecord> {
        self.workflows
            .iter_mut()
            .find(|w| w.id == id)
            .ok_or_else(|| Error::NotFound(format!("workflow {}", id)))
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn init(&self) -> Result<()> {
        Ok(())
    }

    async fn list_workflows(&self) -> Result<Vec<WorkflowRecord>> {
        let state = self.state.read().await;
        let mut workflows = state.workflows.clone();
        workflows.sort_by_key(|w| w.id);
        for workflow in &mut workflows {
            workflow.steps.sort_by_key(|s| s.order);
        }
        Ok(workflows)
    }

    async fn create_workflow(&self, workflow: NewWorkflow) -> Result<WorkflowRecord> {
        let mut state = self.state.write().await;
        state.next_workflow_id += 1;
        let now = Utc::now();
        let record = WorkflowRecord {
            id: state.next_workflow_id,
            name: workflow.name,
            description: workflow.description,
            is_default: false,
            steps: Vec::new(),
            created_at: now,
            updated_at: now,
        };
        debug!("Created workflow {} in memory", record.id);
        state.workflows.push(record.clone());
        Ok(record)
    }

    async fn replace_steps(&self, workflow_id: i64, steps: Vec<StepPayload>) -> Result<()> {
        let mut state = self.state.write().await;
        // Resolve the workflow before allocating ids so a miss changes nothing
        state.workflow_mut(workflow_id)?;

        let first_id = state.next_step_id + 1;
        state.next_step_id += steps.len() as i64;
        let records = steps
            .into_iter()
            .enumerate()
            .map(|(i, s)| StepRecord {
                id: first_id + i as i64,
                name: s.name,
                step_type: s.step_type,
                order: s.order,
                config: s.config,
            })
            .collect();

        let workflow = state.workflow_mut(workflow_id)?;
        workflow.steps = records;
        workflow.updated_at = Utc::now();
        Ok(())
    }

    async fn set_default(&self, workflow_id: i64) -> Result<()> {
        let mut state = self.state.write().await;
        state.workflow_mut(workflow_id)?;
        for workflow in &mut state.workflows {
            workflow.is_default = workflow.id == workflow_id;
        }
        Ok(())
    }

    async fn delete_workflow(&self, workflow_id: i64) -> Result<()> {
        let mut state = self.state.write().await;
        if state.workflow_mut(workflow_id)?.is_default {
            return Err(Error::Conflict(DEFAULT_WORKFLOW_PROTECTED.to_string()));
        }
        if state.workflows.len() <= 1 {
            return Err(Error::Conflict(LAST_WORKFLOW_PROTECTED.to_string()));
        }
        state.workflows.retain(|w| w.id != workflow_id);
        Ok(())
    }
}
