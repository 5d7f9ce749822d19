//! Context for workflow execution
//!
//! Builds the per-step persona and task prompt, feeding the outputs of
//! completed steps forward to later ones.

use crate::workflow::state::WorkflowState;
use crate::workflow::types::{StepDefinition, WorkflowDefinition};

/// Error types for workflow operations
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum WorkflowError {
    #[error("No plan is loaded")]
    NoPlan,

    #[error("Unknown step: {0}")]
    UnknownStep(u32),

    #[error("No step is active")]
    NoActiveStep,

    #[error("Step {0} is already executing")]
    Busy(u32),

    #[error("A plan is still being generated")]
    PlanningInProgress,

    #[error("Instruction must not be empty")]
    EmptyInstruction,
}

/// Context block listing the outputs of completed steps in natural order
pub fn build_context(definition: &WorkflowDefinition, state: &WorkflowState) -> String {
    let lines: Vec<String> = state
        .completed_outputs()
        .into_iter()
        .map(|(id, output)| {
            let name = definition.step(id).map(|s| s.name.as_str()).unwrap_or_default();
            format!("- Step {} ({}) output: \"{}\"", id, name, output)
        })
        .collect();

    if lines.is_empty() {
        "No previous steps have been completed.".to_string()
    } else {
        format!("Context from previous completed steps:\n{}", lines.join("\n"))
    }
}

/// System persona for the agent a step is assigned to
pub fn build_persona(definition: &WorkflowDefinition, step: &StepDefinition) -> String {
    match definition.agent(&step.agent) {
        Some(agent) => format!(
            "You are {}, a {}. Your capabilities are: {}.",
            step.agent,
            agent.role,
            agent.verbs.join(", ")
        ),
        // Plans often hand over to the orchestrator itself without declaring it
        None => format!("You are {}.", step.agent),
    }
}

pub fn build_task_prompt(step: &StepDefinition, context: &str, instruction: &str) -> String {
    format!(
        "Your current task is \"{}\".\n{}\n\nBased on that context, follow these instructions precisely:\n---\n{}\n---",
        step.name, context, instruction
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::parser::parse_plan;
    use crate::workflow::state::StepStatus;

    fn plan() -> WorkflowDefinition {
        parse_plan(
            "meta: {flow_name: Blog}\n\
             agents:\n  Lyra: {role: Creative Writer, verbs: [write, edit]}\n\
             steps:\n  - {id: 1, name: Draft, agent: Lyra}\n  - {id: 2, name: Polish, agent: Lyra}\n  - {id: 3, name: Review, agent: ANDIE}",
        )
        .into_result()
        .unwrap()
    }

    #[test]
    fn test_context_without_completed_steps() {
        let def = plan();
        let state = WorkflowState::from_definition(&def);
        assert_eq!(build_context(&def, &state), "No previous steps have been completed.");
    }

    #[test]
    fn test_context_lists_completed_outputs() {
        let def = plan();
        let mut state = WorkflowState::from_definition(&def);
        state.complete(1, "first draft".into(), &def.step_ids()).unwrap();
        state.complete(2, "".into(), &def.step_ids()).unwrap();

        assert_eq!(state.get(2).unwrap().status, StepStatus::Completed);
        assert_eq!(
            build_context(&def, &state),
            "Context from previous completed steps:\n- Step 1 (Draft) output: \"first draft\""
        );
    }

    #[test]
    fn test_persona_and_task() {
        let def = plan();
        assert_eq!(
            build_persona(&def, def.step(1).unwrap()),
            "You are Lyra, a Creative Writer. Your capabilities are: write, edit."
        );
        assert_eq!(build_persona(&def, def.step(3).unwrap()), "You are ANDIE.");

        let task = build_task_prompt(def.step(2).unwrap(), "CTX", "make it shine");
        assert_eq!(
            task,
            "Your current task is \"Polish\".\nCTX\n\nBased on that context, follow these instructions precisely:\n---\nmake it shine\n---"
        );
    }
}
