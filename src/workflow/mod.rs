//! Multi-agent plans
//!
//! A plan is YAML written by the orchestrator model: agents, then numbered
//! steps each assigned to an agent. Plans are parsed while they stream in,
//! and their steps are executed one at a time with the outputs of completed
//! steps fed forward as context.

pub mod context;
pub mod executor;
pub mod loader;
pub mod parser;
pub mod session;
pub mod state;
pub mod types;

pub use context::WorkflowError;
pub use parser::{parse_plan, PlanIssue, PlanParse};
pub use session::{PlanReport, WorkflowSession};
pub use state::{StepStatus, WorkflowState};
pub use types::WorkflowDefinition;
