use serde::Serialize;
use serde_json::Value as JsonValue;
use tracing::debug;
use uuid::Uuid;

use super::catalog::{self, StepConfig, StepType};
use super::ValidationError;
use crate::store::{StepPayload, StepRecord};

/// Number of leading steps that can never be removed or displaced.
pub const LOCKED_PREFIX: usize = 2;

const LOCKED_TYPES: [StepType; LOCKED_PREFIX] = [StepType::Readiness, StepType::Distribution];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StepId {
    /// Id assigned by the store.
    Persisted(i64),
    /// Client-side token for a step that has not been saved yet.
    Draft(Uuid),
}

impl StepId {
    pub fn draft() -> Self {
        StepId::Draft(Uuid::new_v4())
    }

    pub fn is_draft(&self) -> bool {
        matches!(self, StepId::Draft(_))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Step {
    pub id: StepId,
    pub name: String,
    pub step_type: StepType,
    pub order: u32,
    pub config: StepConfig,
}

impl Step {
    fn draft(step_type: StepType, order: u32) -> Self {
        let def = catalog::lookup(step_type);
        Self {
            id: StepId::draft(),
            name: def.display_name.to_string(),
            step_type,
            order,
            config: def.default_config(),
        }
    }

    fn to_payload(&self) -> StepPayload {
        StepPayload {
            name: self.name.clone(),
            step_type: self.step_type,
            order: self.order,
            config: self.config.clone(),
        }
    }
}

/// Ordered steps of one workflow.
///
/// Every value satisfies the structural invariants: `order` runs `1..=N` by
/// position, and the list opens with Readiness then Distribution. All
/// operations return a new list and leave `self` untouched; requests that
/// would break the locked prefix return an unchanged copy.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct StepList {
    steps: Vec<Step>,
}

impl StepList {
    /// The two locked steps every new workflow starts with.
    pub fn create() -> Self {
        Self {
            steps: LOCKED_TYPES
                .iter()
                .enumerate()
                .map(|(i, step_type)| Step::draft(*step_type, i as u32 + 1))
                .collect(),
        }
    }

    /// Builds a list from stored steps, repairing anything that violates the
    /// invariants. The flag is true when the result differs from what is
    /// stored, so the caller knows a save is needed.
    pub fn restore(records: Vec<StepRecord>) -> (Self, bool) {
        let mut records = records;
        let stored_len = records.len();
        let in_order = records
            .iter()
            .enumerate()
            .all(|(i, r)| r.order == i as u32 + 1);
        records.sort_by_key(|r| r.order);

        let mut repaired = !in_order;
        let mut steps: Vec<Step> = records
            .into_iter()
            .map(|r| {
                let config = catalog::complete_config(r.step_type, r.config.clone());
                if config != r.config {
                    repaired = true;
                }
                Step {
                    id: StepId::Persisted(r.id),
                    name: r.name,
                    step_type: r.step_type,
                    order: r.order,
                    config,
                }
            })
            .collect();

        for (slot, step_type) in LOCKED_TYPES.iter().enumerate() {
            let found = steps
                .iter()
                .skip(slot)
                .position(|s| s.step_type == *step_type)
                .map(|p| p + slot);
            match found {
                Some(pos) if pos == slot => {}
                Some(pos) => {
                    let step = steps.remove(pos);
                    steps.insert(slot, step);
                    repaired = true;
                }
                None => {
                    steps.insert(slot, Step::draft(*step_type, 0));
                    repaired = true;
                }
            }
        }

        if repaired {
            debug!(
                "Repaired stored step list ({} stored, {} after repair)",
                stored_len,
                steps.len()
            );
        }

        (Self { steps }.with_normalized_order(), repaired)
    }

    /// Appends a draft step with the catalog defaults for its type.
    pub fn append(&self, step_type: StepType) -> Self {
        let mut steps = self.steps.clone();
        steps.push(Step::draft(step_type, steps.len() as u32 + 1));
        Self { steps }
    }

    /// Removes the step at `index`. Locked and out-of-range positions are
    /// ignored.
    pub fn remove_at(&self, index: usize) -> Self {
        if Self::is_locked(index) || index >= self.steps.len() {
            debug!("Ignoring removal of step at position {}", index);
            return self.clone();
        }
        let mut steps = self.steps.clone();
        steps.remove(index);
        Self { steps }.with_normalized_order()
    }

    /// Replaces one config value. Allowed on locked steps too.
    pub fn set_config_field(
        &self,
        index: usize,
        key: &str,
        value: JsonValue,
    ) -> Result<Self, ValidationError> {
        let step = self.steps.get(index).ok_or(ValidationError::StepOutOfRange {
            index,
            len: self.steps.len(),
        })?;
        catalog::validate_field(step.step_type, key, &value)?;

        let mut steps = self.steps.clone();
        steps[index].config.insert(key.to_string(), value);
        Ok(Self { steps })
    }

    pub fn with_normalized_order(&self) -> Self {
        let mut list = self.clone();
        list.normalize_order();
        list
    }

    pub(crate) fn normalize_order(&mut self) {
        for (i, step) in self.steps.iter_mut().enumerate() {
            step.order = i as u32 + 1;
        }
    }

    pub(crate) fn from_steps_unchecked(steps: Vec<Step>) -> Self {
        Self { steps }
    }

    pub(crate) fn into_steps(self) -> Vec<Step> {
        self.steps
    }

    /// Data sent to the store on save. Ids are dropped; the store assigns new
    /// ones to every step.
    pub fn to_payload(&self) -> Vec<StepPayload> {
        self.steps.iter().map(Step::to_payload).collect()
    }

    pub fn is_locked(index: usize) -> bool {
        index < LOCKED_PREFIX
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn get(&self, index: usize) -> Option<&Step> {
        self.steps.get(index)
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Step> {
        self.steps.iter()
    }

    pub fn has_drafts(&self) -> bool {
        self.steps.iter().any(|s| s.id.is_draft())
    }
}

impl Default for StepList {
    fn default() -> Self {
        Self::create()
    }
}

impl<'a> IntoIterator for &'a StepList {
    type Item = &'a Step;
    type IntoIter = std::slice::Iter<'a, Step>;

    fn into_iter(self) -> Self::IntoIter {
        self.steps.iter()
    }
}
