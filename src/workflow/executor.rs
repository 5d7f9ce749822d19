//! Executor for workflow steps
//!
//! Runs one step: builds the step-scoped request, streams it, and folds the
//! resulting events into the shared run state one lock per event.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc;

use crate::composer::with_supervisor;
use crate::llm::{GenerationRequest, StreamEvent, StreamingClient};
use crate::workflow::context::{build_context, build_persona, build_task_prompt, WorkflowError};
use crate::workflow::parser::PlanIssue;
use crate::workflow::state::{StepPatch, WorkflowState};
use crate::workflow::types::WorkflowDefinition;

/// Default sampling temperature for step runs
pub const STEP_TEMPERATURE: f32 = 0.7;

/// Everything the workflow surface shows, shared between planner and executor
#[derive(Debug, Clone, Default)]
pub struct RunState {
    pub definition: Option<Arc<WorkflowDefinition>>,
    pub steps: WorkflowState,
    /// Step currently streaming, if any
    pub executing: Option<u32>,
    /// Bumped whenever the plan is replaced; stale step events are dropped
    pub generation: u64,
    pub plan_text: String,
    pub plan_issue: Option<PlanIssue>,
    /// Terminal error of the last planning stream
    pub plan_error: Option<String>,
    pub planning: bool,
}

impl RunState {
    /// Replace the plan wholesale, resetting all step state
    pub fn load_plan(&mut self, definition: Option<WorkflowDefinition>) {
        self.definition = definition.map(Arc::new);
        self.steps.initialize(self.definition.as_deref());
        self.executing = None;
        self.generation += 1;
    }

    /// `load_plan` for a plan that is known to exist
    pub fn install(&mut self, definition: WorkflowDefinition) -> Arc<WorkflowDefinition> {
        let definition = Arc::new(definition);
        self.definition = Some(definition.clone());
        self.steps.initialize(Some(&definition));
        self.executing = None;
        self.generation += 1;
        definition
    }
}

pub type SharedRunState = Arc<Mutex<RunState>>;

pub(crate) fn lock_run(state: &SharedRunState) -> MutexGuard<'_, RunState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Live notifications for a front end
#[derive(Debug, Clone, PartialEq)]
pub enum WorkflowEvent {
    PlanChunk(String),
    PlanCleared,
    PlanReady(Arc<WorkflowDefinition>),
    PlanFinished { ready: bool },
    StepStarted(u32),
    StepChunk(u32, String),
    StepCleared(u32),
    StepCompleted { step_id: u32, activated: Option<u32> },
    StepFailed { step_id: u32, message: String },
}

pub type Observer = Arc<dyn Fn(&WorkflowEvent) + Send + Sync>;

/// How a step run ended
#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome {
    Completed { output: String, activated: Option<u32> },
    Failed(String),
    /// The plan was replaced while the step was streaming
    Superseded,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StepRun {
    pub step_id: u32,
    pub outcome: StepOutcome,
    pub full_prompt: String,
}

/// Executor for workflow steps
#[derive(Clone)]
pub struct StepExecutor {
    client: StreamingClient,
    state: SharedRunState,
    supervisor: String,
    exclusive: bool,
    observer: Option<Observer>,
}

impl StepExecutor {
    pub fn new(client: StreamingClient, state: SharedRunState) -> Self {
        Self {
            client,
            state,
            supervisor: String::new(),
            exclusive: false,
            observer: None,
        }
    }

    /// Directive prefixed to every step persona
    pub fn with_supervisor(mut self, supervisor: impl Into<String>) -> Self {
        self.supervisor = supervisor.into();
        self
    }

    /// Refuse to start while another step is streaming
    pub fn exclusive(mut self, exclusive: bool) -> Self {
        self.exclusive = exclusive;
        self
    }

    pub fn with_observer(mut self, observer: Observer) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn set_supervisor(&mut self, supervisor: impl Into<String>) {
        self.supervisor = supervisor.into();
    }

    fn notify(&self, event: WorkflowEvent) {
        if let Some(observer) = &self.observer {
            observer(&event);
        }
    }

    /// Execute `step_id` with a free-text instruction.
    ///
    /// Any existing step may be executed regardless of its status; a rerun
    /// overwrites the previous output.
    pub async fn execute(&self, step_id: u32, instruction: &str) -> Result<StepRun, WorkflowError> {
        let (request, generation) = self.begin(step_id, instruction)?;
        bprintln!(step: step_id, "Executing step {}: {}", step_id, instruction);
        self.notify(WorkflowEvent::StepStarted(step_id));

        let (tx, mut rx) = mpsc::unbounded_channel();
        let client = self.client.clone();
        let producer = async move {
            let record = client.stream(&request, &tx).await;
            drop(tx);
            record
        };
        let consumer = async {
            let mut outcome = StepOutcome::Superseded;
            while let Some(event) = rx.recv().await {
                if let Some(terminal) = self.fold(step_id, generation, event) {
                    outcome = terminal;
                }
            }
            outcome
        };

        let (record, outcome) = tokio::join!(producer, consumer);
        Ok(StepRun {
            step_id,
            outcome,
            full_prompt: record.full_prompt,
        })
    }

    fn begin(&self, step_id: u32, instruction: &str) -> Result<(GenerationRequest, u64), WorkflowError> {
        let mut run = lock_run(&self.state);
        let definition = run.definition.clone().ok_or(WorkflowError::NoPlan)?;
        let step = definition.step(step_id).ok_or(WorkflowError::UnknownStep(step_id))?;

        if self.exclusive {
            if let Some(busy) = run.executing {
                return Err(WorkflowError::Busy(busy));
            }
        }

        // Context is taken before this step's own output is reset
        let context = build_context(&definition, &run.steps);
        run.steps.transition(
            step_id,
            StepPatch::default().output(Some(String::new())).error(None),
        )?;
        run.executing = Some(step_id);

        let persona = build_persona(&definition, step);
        let request = GenerationRequest::new(
            build_task_prompt(step, &context, instruction),
            with_supervisor(&self.supervisor, &persona),
            STEP_TEMPERATURE,
        );
        Ok((request, run.generation))
    }

    /// Fold one event into the run state; returns the outcome for terminal events
    fn fold(&self, step_id: u32, generation: u64, event: StreamEvent) -> Option<StepOutcome> {
        let (outcome, notice) = {
            let mut run = lock_run(&self.state);
            if run.generation != generation {
                return None;
            }

            match event {
                StreamEvent::Chunk(text) => {
                    run.steps.append_output(step_id, &text).ok()?;
                    (None, WorkflowEvent::StepChunk(step_id, text))
                }
                StreamEvent::Clear => {
                    run.steps
                        .transition(step_id, StepPatch::default().output(Some(String::new())))
                        .ok()?;
                    (None, WorkflowEvent::StepCleared(step_id))
                }
                StreamEvent::Complete(output) => {
                    let order = run.definition.as_ref().map(|d| d.step_ids()).unwrap_or_default();
                    let activated = run.steps.complete(step_id, output.clone(), &order).ok()?;
                    finish(&mut run, step_id);
                    bprintln!(step: step_id, "Step {} completed.", step_id);
                    (
                        Some(StepOutcome::Completed { output, activated }),
                        WorkflowEvent::StepCompleted { step_id, activated },
                    )
                }
                StreamEvent::Error(message) => {
                    run.steps.fail(step_id, message.clone()).ok()?;
                    finish(&mut run, step_id);
                    bprintln!(error: "Error on step {}: {}", step_id, message);
                    (
                        Some(StepOutcome::Failed(message.clone())),
                        WorkflowEvent::StepFailed { step_id, message },
                    )
                }
            }
        };

        self.notify(notice);
        outcome
    }
}

fn finish(run: &mut RunState, step_id: u32) {
    if run.executing == Some(step_id) {
        run.executing = None;
    }
}
