//! Editing service for upgrade workflows.
//!
//! Holds the workflows last loaded from the store and, for the selected one,
//! a local step list that diverges until it is saved. Step edits are
//! synchronous and never touch the store; create, save, delete and
//! set-default each go to the store exactly once per call (create twice).

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value as JsonValue;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::catalog::{StepType, CONTINUE_ON_FAILURE};
use super::reorder;
use super::state::EditorState;
use super::steps::{StepList, LOCKED_PREFIX};
use super::ValidationError;
use crate::{
    store::{NewWorkflow, Store, WorkflowRecord, DEFAULT_WORKFLOW_PROTECTED},
    Error, Result,
};

pub const DEFAULT_WORKFLOW_NAME: &str = "Default Upgrade Workflow";
const DEFAULT_WORKFLOW_DESCRIPTION: &str =
    "Standard upgrade: Readiness -> Distribution -> Pre-Checks -> Activation -> Post-Checks";

#[derive(Debug, Clone, Serialize)]
pub struct Workflow {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub is_default: bool,
    pub steps: StepList,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// The stored steps did not form a valid list and were repaired on load.
    pub needs_repair: bool,
}

impl Workflow {
    pub fn from_record(record: WorkflowRecord) -> Self {
        let (steps, needs_repair) = StepList::restore(record.steps);
        if needs_repair {
            warn!(
                "Workflow {} ({}) has an invalid step list; it will be repaired on next save",
                record.id, record.name
            );
        }
        Self {
            id: record.id,
            name: record.name,
            description: record.description,
            is_default: record.is_default,
            steps,
            created_at: record.created_at,
            updated_at: record.updated_at,
            needs_repair,
        }
    }
}

/// Local editing state of the selected workflow.
#[derive(Debug, Clone)]
pub struct EditSession {
    workflow_id: i64,
    steps: StepList,
    state: EditorState,
    error: Option<String>,
}

impl EditSession {
    pub fn workflow_id(&self) -> i64 {
        self.workflow_id
    }

    pub fn steps(&self) -> &StepList {
        &self.steps
    }

    pub fn state(&self) -> EditorState {
        self.state
    }

    /// Last save failure, kept until dismissed or the next save.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    fn apply(&mut self, next: StepList) -> bool {
        if next == self.steps {
            return false;
        }
        self.steps = next;
        if self.state == EditorState::Idle {
            self.state = EditorState::Editing;
        }
        true
    }
}

/// Holds the session while a save is in flight. A save future dropped before
/// the store answers leaves the session in `Editing` with its edits intact.
struct SaveGuard<'a> {
    session: &'a mut Option<EditSession>,
}

impl SaveGuard<'_> {
    fn settle(&mut self, outcome: &Result<()>) {
        if let Some(session) = self.session.as_mut() {
            match outcome {
                Ok(()) => session.state = EditorState::Idle,
                Err(e) => {
                    session.state = EditorState::Editing;
                    session.error = Some(e.to_string());
                }
            }
        }
    }
}

impl Drop for SaveGuard<'_> {
    fn drop(&mut self) {
        if let Some(session) = self.session.as_mut() {
            if session.state == EditorState::Saving {
                warn!("Save of workflow {} was interrupted", session.workflow_id);
                session.state = EditorState::Editing;
                session.error = Some("save interrupted before the store answered".to_string());
            }
        }
    }
}

async fn replace_steps(store: &dyn Store, workflow_id: i64, steps: &StepList) -> Result<()> {
    info!("Saving workflow {} with {} steps", workflow_id, steps.len());
    store
        .replace_steps(workflow_id, steps.to_payload())
        .await
        .map_err(|e| {
            warn!("Failed to save workflow {}: {}", workflow_id, e);
            e
        })
}

pub struct WorkflowEditor {
    store: Arc<dyn Store>,
    workflows: Vec<Workflow>,
    session: Option<EditSession>,
}

impl WorkflowEditor {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            store,
            workflows: Vec::new(),
            session: None,
        }
    }

    /// Refreshes the workflow list from the store. The current session keeps
    /// its local steps.
    pub async fn load(&mut self) -> Result<&[Workflow]> {
        let records = self.store.list_workflows().await?;
        self.workflows = records.into_iter().map(Workflow::from_record).collect();
        debug!("Loaded {} workflows", self.workflows.len());

        let selected = self.session.as_ref().map(|s| s.workflow_id);
        if let Some(id) = selected {
            if self.workflow(id).is_none() {
                self.session = None;
            }
        }
        Ok(&self.workflows)
    }

    pub fn workflows(&self) -> &[Workflow] {
        &self.workflows
    }

    pub fn workflow(&self, id: i64) -> Option<&Workflow> {
        self.workflows.iter().find(|w| w.id == id)
    }

    pub fn default_workflow(&self) -> Option<&Workflow> {
        self.workflows.iter().find(|w| w.is_default)
    }

    pub fn session(&self) -> Option<&EditSession> {
        self.session.as_ref()
    }

    /// Starts editing a loaded workflow, discarding any unsaved local edits.
    pub fn select(&mut self, id: i64) -> Result<&EditSession> {
        let workflow = self
            .workflow(id)
            .ok_or_else(|| Error::NotFound(format!("workflow {}", id)))?;
        let session = EditSession {
            workflow_id: id,
            steps: workflow.steps.clone(),
            state: if workflow.needs_repair {
                EditorState::Editing
            } else {
                EditorState::Idle
            },
            error: None,
        };
        Ok(&*self.session.insert(session))
    }

    fn session_mut(&mut self) -> Result<&mut EditSession> {
        self.session.as_mut().ok_or(Error::NoSelection)
    }

    pub fn add_step(&mut self, step_type: StepType) -> Result<&StepList> {
        let session = self.session_mut()?;
        let next = session.steps.append(step_type);
        session.apply(next);
        Ok(&session.steps)
    }

    /// Returns false when the removal was refused (locked or missing step).
    pub fn remove_step(&mut self, index: usize) -> Result<bool> {
        let session = self.session_mut()?;
        let next = session.steps.remove_at(index);
        Ok(session.apply(next))
    }

    /// Returns false when the move was refused and the list is unchanged.
    pub fn move_step(&mut self, source: usize, dest: usize) -> Result<bool> {
        let session = self.session_mut()?;
        let next = reorder::move_step(&session.steps, source, dest);
        Ok(session.apply(next))
    }

    pub fn set_config_field(&mut self, index: usize, key: &str, value: JsonValue) -> Result<()> {
        let session = self.session_mut()?;
        let next = session.steps.set_config_field(index, key, value)?;
        session.apply(next);
        Ok(())
    }

    pub fn dismiss_error(&mut self) {
        if let Some(session) = self.session.as_mut() {
            session.error = None;
        }
    }

    /// Saves the selected workflow's local steps.
    ///
    /// On failure the session returns to `Editing` with its edits intact and
    /// the error recorded, so the same save can be retried.
    pub async fn save(&mut self) -> Result<()> {
        let (workflow_id, steps) = {
            let session = self.session_mut()?;
            if !session.state.can_save() {
                return Err(Error::SaveInProgress);
            }
            session.state = EditorState::Saving;
            session.error = None;
            (session.workflow_id, session.steps.clone())
        };

        let outcome = {
            let mut guard = SaveGuard {
                session: &mut self.session,
            };
            let outcome = replace_steps(self.store.as_ref(), workflow_id, &steps).await;
            guard.settle(&outcome);
            outcome
        };
        outcome?;

        let reloaded = self.load().await.map(|_| ());
        match reloaded {
            Ok(()) if self.workflow(workflow_id).is_some() => {
                self.select(workflow_id)?;
            }
            Ok(()) => {
                warn!("Saved workflow {} but it is no longer listed", workflow_id);
            }
            Err(e) => {
                warn!("Saved workflow {} but could not reload: {}", workflow_id, e);
            }
        }
        Ok(())
    }

    /// Sends the whole list to the store as a full replace.
    pub async fn save_workflow(&self, workflow_id: i64, steps: &StepList) -> Result<()> {
        replace_steps(self.store.as_ref(), workflow_id, steps).await
    }

    /// Creates a workflow and seeds it with the locked steps.
    ///
    /// Creation and seeding are separate store calls. If seeding fails the
    /// empty workflow is kept in the local list and `Error::PartialCreation`
    /// is returned; selecting and saving it completes the seeding.
    pub async fn create_workflow(&mut self, name: &str, description: &str) -> Result<Workflow> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ValidationError::EmptyName.into());
        }

        info!("Creating workflow: {}", name);
        let record = self
            .store
            .create_workflow(NewWorkflow {
                name: name.to_string(),
                description: description.to_string(),
            })
            .await?;
        let workflow_id = record.id;

        if let Err(e) = self.save_workflow(workflow_id, &StepList::create()).await {
            warn!("Workflow {} created without steps: {}", workflow_id, e);
            self.workflows.push(Workflow::from_record(record));
            return Err(Error::PartialCreation {
                workflow_id,
                reason: e.to_string(),
            });
        }

        self.load().await?;
        self.workflow(workflow_id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("workflow {}", workflow_id)))
    }

    /// Deletes a non-default workflow.
    pub async fn delete_workflow(&mut self, workflow_id: i64) -> Result<()> {
        if self.workflow(workflow_id).map_or(false, |w| w.is_default) {
            return Err(Error::Conflict(DEFAULT_WORKFLOW_PROTECTED.to_string()));
        }

        info!("Deleting workflow {}", workflow_id);
        self.store.delete_workflow(workflow_id).await.map_err(|e| {
            warn!("Failed to delete workflow {}: {}", workflow_id, e);
            e
        })?;

        self.workflows.retain(|w| w.id != workflow_id);
        if self.session.as_ref().map(|s| s.workflow_id) == Some(workflow_id) {
            self.session = None;
        }
        Ok(())
    }

    /// Makes `workflow_id` the default and clears the flag on every other
    /// loaded workflow.
    pub async fn set_default(&mut self, workflow_id: i64) -> Result<()> {
        info!("Setting default workflow {}", workflow_id);
        self.store.set_default(workflow_id).await?;
        for workflow in &mut self.workflows {
            workflow.is_default = workflow.id == workflow_id;
        }
        Ok(())
    }

    /// Creates and marks the standard upgrade workflow when no default
    /// exists. Returns the seeded workflow, or `None` if a default was present.
    ///
    /// A workflow already named `DEFAULT_WORKFLOW_NAME` (left by an earlier
    /// run that failed part way) is completed and reused instead of creating
    /// another one.
    pub async fn ensure_default_workflow(&mut self) -> Result<Option<Workflow>> {
        self.load().await?;
        if let Some(existing) = self.default_workflow() {
            debug!("Default workflow already present: {}", existing.name);
            return Ok(None);
        }

        let existing = self
            .workflows
            .iter()
            .find(|w| w.name == DEFAULT_WORKFLOW_NAME)
            .cloned();
        let workflow = match existing {
            Some(workflow) => {
                info!("Resuming seed of workflow {}", workflow.id);
                workflow
            }
            None => {
                self.create_workflow(DEFAULT_WORKFLOW_NAME, DEFAULT_WORKFLOW_DESCRIPTION)
                    .await?
            }
        };

        if workflow.steps.len() <= LOCKED_PREFIX {
            let steps = standard_steps(&workflow.steps)?;
            self.save_workflow(workflow.id, &steps).await?;
        } else if workflow.needs_repair {
            self.save_workflow(workflow.id, &workflow.steps).await?;
        }
        self.set_default(workflow.id).await?;
        self.load().await?;

        info!("Seeded default workflow {}", workflow.id);
        self.workflow(workflow.id)
            .cloned()
            .map(Some)
            .ok_or_else(|| Error::NotFound(format!("workflow {}", workflow.id)))
    }
}

fn standard_steps(locked: &StepList) -> std::result::Result<StepList, ValidationError> {
    locked
        .append(StepType::Precheck)
        .append(StepType::Activation)
        .append(StepType::Postcheck)
        .set_config_field(2, CONTINUE_ON_FAILURE, JsonValue::Bool(true))?
        .set_config_field(4, CONTINUE_ON_FAILURE, JsonValue::Bool(true))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryStore, MockStore, StepPayload, StepRecord};
    use crate::workflow::steps::tests::assert_invariants;
    use crate::workflow::{catalog, StepId};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    fn memory_editor() -> WorkflowEditor {
        WorkflowEditor::new(Arc::new(MemoryStore::new()))
    }

    /// Memory store whose `replace_steps` can be made to hang.
    #[derive(Default)]
    struct StallingStore {
        inner: MemoryStore,
        stall: AtomicBool,
    }

    #[async_trait]
    impl Store for StallingStore {
        async fn init(&self) -> Result<()> {
            self.inner.init().await
        }

        async fn list_workflows(&self) -> Result<Vec<WorkflowRecord>> {
            self.inner.list_workflows().await
        }

        async fn create_workflow(&self, workflow: NewWorkflow) -> Result<WorkflowRecord> {
            self.inner.create_workflow(workflow).await
        }

        async fn replace_steps(&self, workflow_id: i64, steps: Vec<StepPayload>) -> Result<()> {
            if self.stall.load(Ordering::SeqCst) {
                std::future::pending::<()>().await;
            }
            self.inner.replace_steps(workflow_id, steps).await
        }

        async fn set_default(&self, workflow_id: i64) -> Result<()> {
            self.inner.set_default(workflow_id).await
        }

        async fn delete_workflow(&self, workflow_id: i64) -> Result<()> {
            self.inner.delete_workflow(workflow_id).await
        }
    }

    fn record(id: i64, is_default: bool, steps: Vec<StepRecord>) -> WorkflowRecord {
        WorkflowRecord {
            id,
            name: format!("wf-{}", id),
            description: String::new(),
            is_default,
            steps,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn locked_records() -> Vec<StepRecord> {
        [StepType::Readiness, StepType::Distribution]
            .iter()
            .enumerate()
            .map(|(i, t)| StepRecord {
                id: i as i64 + 1,
                name: catalog::lookup(*t).display_name.to_string(),
                step_type: *t,
                order: i as u32 + 1,
                config: Default::default(),
            })
            .collect()
    }

    #[tokio::test]
    async fn create_workflow_seeds_locked_steps() {
        let mut editor = memory_editor();
        let workflow = editor.create_workflow("Patch-Tuesday", "").await.unwrap();

        assert_eq!(workflow.name, "Patch-Tuesday");
        assert!(!workflow.is_default);
        assert!(!workflow.needs_repair);
        let names: Vec<_> = workflow.steps.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["Readiness Check", "Software Distribution"]);
        assert!(workflow.steps.iter().all(|s| !s.id.is_draft()));
        assert_eq!(editor.workflows().len(), 1);
    }

    #[tokio::test]
    async fn create_workflow_rejects_blank_name_before_calling_the_store() {
        // No expectations: any store call panics.
        let mut editor = WorkflowEditor::new(Arc::new(MockStore::new()));
        let err = editor.create_workflow("   ", "").await.unwrap_err();
        assert!(matches!(err, Error::Validation(ValidationError::EmptyName)));
    }

    #[tokio::test]
    async fn failed_seeding_leaves_a_repairable_workflow() {
        let mut store = MockStore::new();
        store
            .expect_create_workflow()
            .times(1)
            .returning(|new| {
                let mut created = record(7, false, Vec::new());
                created.name = new.name;
                Ok(created)
            });
        store
            .expect_replace_steps()
            .times(1)
            .returning(|_, _| Err(Error::Persistence("connection reset".into())));
        store.expect_list_workflows().never();

        let mut editor = WorkflowEditor::new(Arc::new(store));
        match editor.create_workflow("Patch-Tuesday", "").await {
            Err(Error::PartialCreation { workflow_id, .. }) => assert_eq!(workflow_id, 7),
            other => panic!("unexpected result: {:?}", other),
        }

        let workflow = editor.workflow(7).unwrap();
        assert!(workflow.needs_repair);

        let session = editor.select(7).unwrap();
        assert_eq!(session.state(), EditorState::Editing);
        assert_invariants(session.steps());
        assert!(session.steps().has_drafts());
    }

    #[tokio::test]
    async fn edit_and_save_round_trip() {
        let mut editor = memory_editor();
        let workflow = editor.create_workflow("Patch-Tuesday", "").await.unwrap();

        assert_eq!(editor.select(workflow.id).unwrap().state(), EditorState::Idle);

        editor.add_step(StepType::Precheck).unwrap();
        editor.add_step(StepType::Wait).unwrap();
        assert!(editor.move_step(3, 2).unwrap());
        editor.set_config_field(2, "duration", json!(90)).unwrap();
        assert_eq!(editor.session().unwrap().state(), EditorState::Editing);

        editor.save().await.unwrap();

        let session = editor.session().unwrap();
        assert_eq!(session.state(), EditorState::Idle);
        assert!(session.error().is_none());
        assert!(!session.steps().has_drafts());
        assert_invariants(session.steps());

        let saved = editor.workflow(workflow.id).unwrap();
        let types: Vec<_> = saved.steps.iter().map(|s| s.step_type).collect();
        assert_eq!(
            types,
            vec![StepType::Readiness, StepType::Distribution, StepType::Wait, StepType::Precheck]
        );
        assert_eq!(saved.steps.steps()[2].config["duration"], json!(90));
    }

    #[tokio::test]
    async fn refused_structural_edits_leave_the_session_idle() {
        let mut editor = memory_editor();
        let workflow = editor.create_workflow("Patch-Tuesday", "").await.unwrap();
        editor.select(workflow.id).unwrap();

        assert!(!editor.remove_step(0).unwrap());
        assert!(!editor.remove_step(1).unwrap());
        assert!(!editor.move_step(1, 0).unwrap());
        assert_eq!(editor.session().unwrap().state(), EditorState::Idle);
    }

    #[tokio::test]
    async fn invalid_config_is_rejected_without_state_change() {
        let mut editor = memory_editor();
        let workflow = editor.create_workflow("Patch-Tuesday", "").await.unwrap();
        editor.select(workflow.id).unwrap();
        editor.add_step(StepType::Ping).unwrap();
        editor.save().await.unwrap();

        let err = editor.set_config_field(2, "retries", json!(-1)).unwrap_err();
        match err {
            Error::Validation(ValidationError::InvalidConfig { field, .. }) => assert_eq!(field, "retries"),
            other => panic!("unexpected error: {:?}", other),
        }
        let session = editor.session().unwrap();
        assert_eq!(session.state(), EditorState::Idle);
        assert_eq!(session.steps().steps()[2].config["retries"], json!(3));
    }

    #[tokio::test]
    async fn failed_save_keeps_local_edits() {
        let mut store = MockStore::new();
        store
            .expect_list_workflows()
            .returning(|| Ok(vec![record(1, true, locked_records())]));
        store
            .expect_replace_steps()
            .times(1)
            .returning(|_, _| Err(Error::Persistence("gateway timeout".into())));

        let mut editor = WorkflowEditor::new(Arc::new(store));
        editor.load().await.unwrap();
        editor.select(1).unwrap();
        editor.add_step(StepType::Activation).unwrap();

        let err = editor.save().await.unwrap_err();
        assert!(err.is_persistence());

        let session = editor.session().unwrap();
        assert_eq!(session.state(), EditorState::Editing);
        assert!(session.error().unwrap().contains("gateway timeout"));
        assert_eq!(session.steps().len(), 3);
        assert_eq!(session.steps().steps()[0].id, StepId::Persisted(1));

        editor.dismiss_error();
        assert!(editor.session().unwrap().error().is_none());
    }

    #[tokio::test]
    async fn abandoned_save_can_be_retried() {
        let store = Arc::new(StallingStore::default());
        let mut editor = WorkflowEditor::new(store.clone());
        let workflow = editor.create_workflow("Patch-Tuesday", "").await.unwrap();
        editor.select(workflow.id).unwrap();
        editor.add_step(StepType::Wait).unwrap();

        store.stall.store(true, Ordering::SeqCst);
        let timed_out = tokio::time::timeout(Duration::from_millis(50), editor.save()).await;
        assert!(timed_out.is_err());

        let session = editor.session().unwrap();
        assert_eq!(session.state(), EditorState::Editing);
        assert!(session.error().is_some());
        assert_eq!(session.steps().len(), 3);
        assert!(session.steps().has_drafts());

        store.stall.store(false, Ordering::SeqCst);
        editor.save().await.unwrap();
        let session = editor.session().unwrap();
        assert_eq!(session.state(), EditorState::Idle);
        assert!(session.error().is_none());
        assert_eq!(editor.workflow(workflow.id).unwrap().steps.len(), 3);
    }

    #[tokio::test]
    async fn save_is_refused_while_another_is_in_flight() {
        // No expectations: a store call would panic.
        let mut editor = WorkflowEditor::new(Arc::new(MockStore::new()));
        editor.workflows.push(Workflow::from_record(record(1, true, locked_records())));
        editor.select(1).unwrap();
        editor.session.as_mut().unwrap().state = EditorState::Saving;

        assert!(matches!(editor.save().await, Err(Error::SaveInProgress)));
        assert_eq!(editor.session().unwrap().state(), EditorState::Saving);
    }

    #[tokio::test]
    async fn save_succeeds_when_the_workflow_vanishes_from_the_reload() {
        let mut store = MockStore::new();
        let mut listed = 0;
        store.expect_list_workflows().times(2).returning(move || {
            listed += 1;
            if listed == 1 {
                Ok(vec![record(1, true, locked_records())])
            } else {
                Ok(Vec::new())
            }
        });
        store.expect_replace_steps().times(1).returning(|_, _| Ok(()));

        let mut editor = WorkflowEditor::new(Arc::new(store));
        editor.load().await.unwrap();
        editor.select(1).unwrap();
        editor.add_step(StepType::Activation).unwrap();

        editor.save().await.unwrap();
        assert!(editor.workflows().is_empty());
        assert!(editor.session().is_none());
    }

    #[tokio::test]
    async fn editing_requires_a_selection() {
        let mut editor = memory_editor();
        assert!(matches!(editor.add_step(StepType::Wait), Err(Error::NoSelection)));
        assert!(matches!(editor.save().await, Err(Error::NoSelection)));
    }

    #[tokio::test]
    async fn set_default_is_exclusive_locally() {
        let mut editor = memory_editor();
        let a = editor.create_workflow("a", "").await.unwrap();
        let b = editor.create_workflow("b", "").await.unwrap();

        editor.set_default(a.id).await.unwrap();
        editor.set_default(b.id).await.unwrap();

        let flags: Vec<_> = editor.workflows().iter().map(|w| (w.id, w.is_default)).collect();
        assert_eq!(flags, vec![(a.id, false), (b.id, true)]);
        assert_eq!(editor.default_workflow().unwrap().id, b.id);

        editor.load().await.unwrap();
        assert_eq!(editor.default_workflow().unwrap().id, b.id);
    }

    #[tokio::test]
    async fn default_workflow_cannot_be_deleted() {
        let mut store = MockStore::new();
        store
            .expect_list_workflows()
            .returning(|| Ok(vec![record(1, true, locked_records()), record(2, false, locked_records())]));
        store.expect_delete_workflow().never();

        let mut editor = WorkflowEditor::new(Arc::new(store));
        editor.load().await.unwrap();
        assert!(matches!(editor.delete_workflow(1).await, Err(Error::Conflict(_))));
        assert_eq!(editor.workflows().len(), 2);
    }

    #[tokio::test]
    async fn store_refusal_is_surfaced() {
        let mut editor = memory_editor();
        let only = editor.create_workflow("only", "").await.unwrap();

        match editor.delete_workflow(only.id).await {
            Err(Error::Conflict(reason)) => assert!(reason.contains("last remaining")),
            other => panic!("unexpected result: {:?}", other),
        }
        assert_eq!(editor.workflows().len(), 1);
    }

    #[tokio::test]
    async fn deleting_the_selected_workflow_ends_the_session() {
        let mut editor = memory_editor();
        let a = editor.create_workflow("a", "").await.unwrap();
        let b = editor.create_workflow("b", "").await.unwrap();
        editor.set_default(a.id).await.unwrap();

        editor.select(b.id).unwrap();
        editor.delete_workflow(b.id).await.unwrap();
        assert!(editor.session().is_none());
        assert!(editor.workflow(b.id).is_none());
    }

    #[tokio::test]
    async fn ensure_default_workflow_seeds_once() {
        let mut editor = memory_editor();
        let seeded = editor.ensure_default_workflow().await.unwrap().unwrap();

        assert_eq!(seeded.name, DEFAULT_WORKFLOW_NAME);
        assert!(seeded.is_default);
        assert_invariants(&seeded.steps);
        let types: Vec<_> = seeded.steps.iter().map(|s| s.step_type).collect();
        assert_eq!(
            types,
            vec![
                StepType::Readiness,
                StepType::Distribution,
                StepType::Precheck,
                StepType::Activation,
                StepType::Postcheck,
            ]
        );
        assert_eq!(seeded.steps.steps()[2].config[CONTINUE_ON_FAILURE], json!(true));

        assert!(editor.ensure_default_workflow().await.unwrap().is_none());
        assert_eq!(editor.workflows().len(), 1);
    }

    #[tokio::test]
    async fn reseeding_reuses_the_workflow_left_by_a_failed_run() {
        fn seed_record(is_default: bool, steps: Vec<StepRecord>) -> WorkflowRecord {
            let mut seeded = record(1, is_default, steps);
            seeded.name = DEFAULT_WORKFLOW_NAME.to_string();
            seeded
        }

        fn standard_records() -> Vec<StepRecord> {
            let mut steps = locked_records();
            for (i, t) in [StepType::Precheck, StepType::Activation, StepType::Postcheck]
                .iter()
                .enumerate()
            {
                steps.push(StepRecord {
                    id: i as i64 + 3,
                    name: catalog::lookup(*t).display_name.to_string(),
                    step_type: *t,
                    order: i as u32 + 3,
                    config: Default::default(),
                });
            }
            steps
        }

        let mut store = MockStore::new();
        let mut listed = 0;
        store.expect_list_workflows().returning(move || {
            listed += 1;
            Ok(match listed {
                1 => Vec::new(),
                2 => vec![seed_record(false, locked_records())],
                3 => vec![seed_record(false, standard_records())],
                _ => vec![seed_record(true, standard_records())],
            })
        });
        store.expect_create_workflow().times(1).returning(|new| {
            let mut created = record(1, false, Vec::new());
            created.name = new.name;
            Ok(created)
        });
        store.expect_replace_steps().times(2).returning(|_, _| Ok(()));
        let mut defaults = 0;
        store.expect_set_default().times(2).returning(move |_| {
            defaults += 1;
            if defaults == 1 {
                Err(Error::Persistence("timeout".into()))
            } else {
                Ok(())
            }
        });

        let mut editor = WorkflowEditor::new(Arc::new(store));
        let err = editor.ensure_default_workflow().await.unwrap_err();
        assert!(err.is_persistence());

        let seeded = editor.ensure_default_workflow().await.unwrap().unwrap();
        assert_eq!(seeded.id, 1);
        assert!(seeded.is_default);
        assert_eq!(seeded.steps.len(), 5);
        assert_eq!(editor.workflows().len(), 1);
    }

    #[tokio::test]
    async fn reseeding_completes_a_partially_created_workflow() {
        let store = Arc::new(MemoryStore::new());
        let stale = store
            .create_workflow(NewWorkflow {
                name: DEFAULT_WORKFLOW_NAME.to_string(),
                description: String::new(),
            })
            .await
            .unwrap();

        let mut editor = WorkflowEditor::new(store);
        let seeded = editor.ensure_default_workflow().await.unwrap().unwrap();
        assert_eq!(seeded.id, stale.id);
        assert!(seeded.is_default);
        assert!(!seeded.needs_repair);
        assert_invariants(&seeded.steps);
        assert_eq!(seeded.steps.len(), 5);
        assert_eq!(editor.workflows().len(), 1);
    }
}
