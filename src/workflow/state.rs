//! Workflow state store
//!
//! Per-step status and accumulated output/error, keyed by step id. The map
//! is rebuilt wholesale from each new plan; only initialization and the step
//! executor write to it.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::workflow::context::WorkflowError;
use crate::workflow::types::WorkflowDefinition;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Pending,
    Active,
    Completed,
    Error,
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            StepStatus::Pending => write!(f, "pending"),
            StepStatus::Active => write!(f, "active"),
            StepStatus::Completed => write!(f, "completed"),
            StepStatus::Error => write!(f, "error"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowStepState {
    pub status: StepStatus,
    /// Text generated so far; `None` until a run starts
    pub output: Option<String>,
    /// Failure message; only set in the `error` status
    pub error: Option<String>,
}

impl WorkflowStepState {
    fn with_status(status: StepStatus) -> Self {
        Self {
            status,
            output: None,
            error: None,
        }
    }
}

/// Partial update for one step. `Some(None)` clears output or error.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StepPatch {
    pub status: Option<StepStatus>,
    pub output: Option<Option<String>>,
    pub error: Option<Option<String>>,
}

impl StepPatch {
    pub fn status(mut self, status: StepStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn output(mut self, output: Option<String>) -> Self {
        self.output = Some(output);
        self
    }

    pub fn error(mut self, error: Option<String>) -> Self {
        self.error = Some(error);
        self
    }

    fn apply(self, state: &mut WorkflowStepState) {
        if let Some(status) = self.status {
            state.status = status;
        }
        if let Some(output) = self.output {
            state.output = output;
        }
        if let Some(error) = self.error {
            state.error = error;
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorkflowState {
    steps: BTreeMap<u32, WorkflowStepState>,
}

impl WorkflowState {
    pub fn from_definition(definition: &WorkflowDefinition) -> Self {
        let mut state = Self::default();
        state.initialize(Some(definition));
        state
    }

    /// Rebuild from a plan: the first step by id is active, the rest pending.
    /// `None` clears everything.
    pub fn initialize(&mut self, definition: Option<&WorkflowDefinition>) {
        self.steps.clear();
        let Some(definition) = definition else {
            return;
        };

        let first = definition.steps.iter().map(|step| step.id).min();
        for step in &definition.steps {
            let status = if Some(step.id) == first {
                StepStatus::Active
            } else {
                StepStatus::Pending
            };
            self.steps.insert(step.id, WorkflowStepState::with_status(status));
        }
    }

    /// Apply `patch` to exactly one step
    pub fn transition(&mut self, step_id: u32, patch: StepPatch) -> Result<(), WorkflowError> {
        let state = self
            .steps
            .get_mut(&step_id)
            .ok_or(WorkflowError::UnknownStep(step_id))?;
        patch.apply(state);
        Ok(())
    }

    /// Append a streamed chunk; the step is active while text arrives
    pub fn append_output(&mut self, step_id: u32, chunk: &str) -> Result<(), WorkflowError> {
        let state = self
            .steps
            .get_mut(&step_id)
            .ok_or(WorkflowError::UnknownStep(step_id))?;
        state.output.get_or_insert_with(String::new).push_str(chunk);
        state.status = StepStatus::Active;
        Ok(())
    }

    /// Mark a step completed and activate its immediate successor in `order`
    /// if that successor is still pending. Returns the activated step.
    pub fn complete(&mut self, step_id: u32, output: String, order: &[u32]) -> Result<Option<u32>, WorkflowError> {
        self.transition(
            step_id,
            StepPatch::default()
                .status(StepStatus::Completed)
                .output(Some(output))
                .error(None),
        )?;

        let successor = order
            .iter()
            .position(|id| *id == step_id)
            .and_then(|index| order.get(index + 1))
            .copied();

        match successor {
            Some(next) if self.get(next).map(|s| s.status) == Some(StepStatus::Pending) => {
                self.transition(next, StepPatch::default().status(StepStatus::Active))?;
                Ok(Some(next))
            }
            _ => Ok(None),
        }
    }

    /// Mark a step failed; other steps are untouched
    pub fn fail(&mut self, step_id: u32, message: String) -> Result<(), WorkflowError> {
        self.transition(
            step_id,
            StepPatch::default().status(StepStatus::Error).error(Some(message)),
        )
    }

    pub fn get(&self, step_id: u32) -> Option<&WorkflowStepState> {
        self.steps.get(&step_id)
    }

    /// Steps in ascending id order
    pub fn iter(&self) -> impl Iterator<Item = (u32, &WorkflowStepState)> {
        self.steps.iter().map(|(id, state)| (*id, state))
    }

    /// The current actionable step (lowest id with status `active`)
    pub fn active_step(&self) -> Option<u32> {
        self.iter()
            .find(|(_, state)| state.status == StepStatus::Active)
            .map(|(id, _)| id)
    }

    /// Non-empty outputs of completed steps, ascending id
    pub fn completed_outputs(&self) -> Vec<(u32, &str)> {
        self.iter()
            .filter(|(_, state)| state.status == StepStatus::Completed)
            .filter_map(|(id, state)| {
                state
                    .output
                    .as_deref()
                    .filter(|output| !output.is_empty())
                    .map(|output| (id, output))
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}
