//! Orchestration surface
//!
//! Ties the planner and the step executor to one shared run state: a goal is
//! streamed into a plan (re-parsed on every update), then steps are executed
//! one at a time on user request.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::composer::with_supervisor;
use crate::llm::{GenerationRequest, StreamEvent, StreamingClient};
use crate::workflow::context::WorkflowError;
use crate::workflow::executor::{
    lock_run, Observer, RunState, SharedRunState, StepExecutor, StepRun, WorkflowEvent, STEP_TEMPERATURE,
};
use crate::workflow::parser::{parse_plan, PlanIssue, PlanParse};
use crate::workflow::state::StepStatus;
use crate::workflow::types::WorkflowDefinition;

/// Result of a planning run
#[derive(Debug, Clone, PartialEq)]
pub struct PlanReport {
    pub definition: Option<Arc<WorkflowDefinition>>,
    pub issue: Option<PlanIssue>,
    pub error: Option<String>,
    pub full_prompt: String,
}

pub struct WorkflowSession {
    client: StreamingClient,
    state: SharedRunState,
    executor: StepExecutor,
    orchestrator: String,
    supervisor: String,
    observer: Option<Observer>,
    planning_run: AtomicU64,
}

impl WorkflowSession {
    pub fn new(client: StreamingClient, orchestrator: impl Into<String>, supervisor: impl Into<String>) -> Self {
        let supervisor = supervisor.into();
        let state = SharedRunState::default();
        let executor = StepExecutor::new(client.clone(), state.clone())
            .with_supervisor(supervisor.clone())
            .exclusive(true);

        Self {
            client,
            state,
            executor,
            orchestrator: orchestrator.into(),
            supervisor,
            observer: None,
            planning_run: AtomicU64::new(0),
        }
    }

    pub fn with_observer(mut self, observer: Observer) -> Self {
        self.executor = self.executor.with_observer(observer.clone());
        self.observer = Some(observer);
        self
    }

    pub fn set_instructions(&mut self, orchestrator: impl Into<String>, supervisor: impl Into<String>) {
        self.orchestrator = orchestrator.into();
        self.supervisor = supervisor.into();
        self.executor.set_supervisor(self.supervisor.clone());
    }

    fn notify(&self, event: WorkflowEvent) {
        if let Some(observer) = &self.observer {
            observer(&event);
        }
    }

    /// Snapshot of the whole run state
    pub fn snapshot(&self) -> RunState {
        lock_run(&self.state).clone()
    }

    pub fn definition(&self) -> Option<Arc<WorkflowDefinition>> {
        lock_run(&self.state).definition.clone()
    }

    pub fn executing_step(&self) -> Option<u32> {
        lock_run(&self.state).executing
    }

    pub fn active_step(&self) -> Option<u32> {
        lock_run(&self.state).steps.active_step()
    }

    /// A plan is loaded and every one of its steps has completed
    pub fn is_finished(&self) -> bool {
        let run = lock_run(&self.state);
        run.definition.is_some()
            && !run.steps.is_empty()
            && run.steps.iter().all(|(_, step)| step.status == StepStatus::Completed)
    }

    pub fn plan_text(&self) -> String {
        lock_run(&self.state).plan_text.clone()
    }

    /// Stream a plan for `goal`, replacing any previous plan.
    ///
    /// A newer planning run supersedes an older one still in flight; the
    /// older run's events are ignored from then on.
    pub async fn generate_plan(&self, goal: &str) -> Result<PlanReport, WorkflowError> {
        if goal.trim().is_empty() {
            return Err(WorkflowError::EmptyInstruction);
        }

        let run_id = self.planning_run.fetch_add(1, Ordering::SeqCst) + 1;
        {
            let mut run = lock_run(&self.state);
            run.planning = true;
            run.plan_text.clear();
            run.plan_issue = None;
            run.plan_error = None;
            run.load_plan(None);
        }
        bprintln!(info: "Generating plan for: {}", goal);

        let request = GenerationRequest::new(
            goal,
            with_supervisor(&self.supervisor, &self.orchestrator),
            STEP_TEMPERATURE,
        );

        let (tx, mut rx) = mpsc::unbounded_channel();
        let client = self.client.clone();
        let producer = async move {
            let record = client.stream(&request, &tx).await;
            drop(tx);
            record
        };
        let consumer = async {
            while let Some(event) = rx.recv().await {
                if !self.is_current(run_id) {
                    continue;
                }
                self.fold_plan_event(event);
            }
        };
        let (record, ()) = tokio::join!(producer, consumer);

        let run = lock_run(&self.state);
        Ok(PlanReport {
            definition: run.definition.clone(),
            issue: run.plan_issue.clone(),
            error: run.plan_error.clone(),
            full_prompt: record.full_prompt,
        })
    }

    /// Install an already written plan without generating one
    pub fn load_plan_text(&self, text: &str) -> Result<Arc<WorkflowDefinition>, PlanIssue> {
        // Any planning run still streaming is superseded
        self.planning_run.fetch_add(1, Ordering::SeqCst);
        let loaded = {
            let mut run = lock_run(&self.state);
            run.planning = false;
            run.plan_error = None;
            run.plan_text = text.to_string();
            match parse_plan(text).into_result() {
                Ok(definition) => {
                    run.plan_issue = None;
                    Ok(run.install(definition))
                }
                Err(issue) => {
                    run.plan_issue = Some(issue.clone());
                    run.load_plan(None);
                    Err(issue)
                }
            }
        };

        if let Ok(definition) = &loaded {
            self.notify(WorkflowEvent::PlanReady(definition.clone()));
        }
        loaded
    }

    fn is_current(&self, run_id: u64) -> bool {
        self.planning_run.load(Ordering::SeqCst) == run_id
    }

    fn fold_plan_event(&self, event: StreamEvent) {
        let mut notices = Vec::new();
        {
            let mut run = lock_run(&self.state);
            match event {
                StreamEvent::Chunk(text) => {
                    run.plan_text.push_str(&text);
                    notices.push(WorkflowEvent::PlanChunk(text));
                    reparse(&mut run, &mut notices);
                }
                StreamEvent::Clear => {
                    run.plan_text.clear();
                    notices.push(WorkflowEvent::PlanCleared);
                    reparse(&mut run, &mut notices);
                }
                StreamEvent::Complete(text) => {
                    run.plan_text = text;
                    reparse(&mut run, &mut notices);
                    run.planning = false;
                    notices.push(WorkflowEvent::PlanFinished {
                        ready: run.definition.is_some(),
                    });
                }
                StreamEvent::Error(message) => {
                    bprintln!(error: "Plan generation failed: {}", message);
                    run.plan_error = Some(message);
                    run.planning = false;
                    notices.push(WorkflowEvent::PlanFinished {
                        ready: run.definition.is_some(),
                    });
                }
            }
        }
        for notice in notices {
            self.notify(notice);
        }
    }

    /// Execute the currently active step
    pub async fn execute_active(&self, instruction: &str) -> Result<StepRun, WorkflowError> {
        let active = {
            let run = lock_run(&self.state);
            if run.definition.is_none() {
                return Err(WorkflowError::NoPlan);
            }
            run.steps.active_step().ok_or(WorkflowError::NoActiveStep)?
        };
        self.execute_step(active, instruction).await
    }

    /// Execute any step of the current plan (re-execution is allowed)
    pub async fn execute_step(&self, step_id: u32, instruction: &str) -> Result<StepRun, WorkflowError> {
        if instruction.trim().is_empty() {
            return Err(WorkflowError::EmptyInstruction);
        }
        if lock_run(&self.state).planning {
            return Err(WorkflowError::PlanningInProgress);
        }
        self.executor.execute(step_id, instruction).await
    }
}

// Re-parse the accumulated text, replacing the plan only when it changed
fn reparse(run: &mut RunState, notices: &mut Vec<WorkflowEvent>) {
    match parse_plan(&run.plan_text) {
        PlanParse::Ready(definition) => {
            run.plan_issue = None;
            if run.definition.as_deref() != Some(&definition) {
                let ready = run.install(definition);
                bprintln!(dev: "Plan '{}' ready with {} steps", ready.meta.flow_name, ready.steps.len());
                notices.push(WorkflowEvent::PlanReady(ready));
            }
        }
        PlanParse::NotReady(issue) => {
            run.plan_issue = Some(issue);
            if run.definition.is_some() {
                run.load_plan(None);
            }
        }
    }
}
