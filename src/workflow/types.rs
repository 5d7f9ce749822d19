//! Type definitions for the workflow system
//!
//! A plan is a set of named agents plus an ordered list of steps. Scalars
//! are read leniently because plans are written by a model: `output: 42`
//! is accepted where text is expected.

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};

use crate::serde_utils::scalar::{number, text};

/// A complete workflow definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowDefinition {
    /// Descriptive header
    pub meta: WorkflowMeta,

    /// Agents by name, in declaration order
    pub agents: IndexMap<String, AgentDefinition>,

    /// Optional scheduling hint, never acted upon
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schedule: Option<Schedule>,

    /// Steps in execution order (ascending id)
    pub steps: Vec<StepDefinition>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowMeta {
    #[serde(with = "text")]
    pub flow_name: String,

    #[serde(default, with = "text")]
    pub owner: String,

    #[serde(default, with = "text")]
    pub description: String,

    #[serde(
        default,
        deserialize_with = "text::deserialize_optional",
        skip_serializing_if = "Option::is_none"
    )]
    pub flow_id: Option<String>,
}

/// Capability descriptor used to build a step's persona
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AgentDefinition {
    #[serde(default, with = "text")]
    pub role: String,

    #[serde(default, deserialize_with = "text::deserialize_list")]
    pub verbs: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schedule {
    #[serde(default, with = "text")]
    pub trigger: String,

    #[serde(
        default,
        deserialize_with = "text::deserialize_optional",
        skip_serializing_if = "Option::is_none"
    )]
    pub fallback_cron: Option<String>,
}

/// One unit of work assigned to one agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepDefinition {
    #[serde(deserialize_with = "deserialize_step_id")]
    pub id: u32,

    #[serde(with = "text")]
    pub name: String,

    #[serde(with = "text")]
    pub agent: String,

    #[serde(default, with = "text")]
    pub verb: String,

    #[serde(default, with = "text")]
    pub input: String,

    #[serde(default, with = "text")]
    pub output: String,

    #[serde(default, with = "text")]
    pub handover_to: String,
}

fn deserialize_step_id<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let value = number::deserialize(deserializer)?;
    if value.fract() != 0.0 || value < 0.0 || value > u32::MAX as f64 {
        return Err(serde::de::Error::custom(format!(
            "step id must be a non-negative integer, got {}",
            value
        )));
    }
    Ok(value as u32)
}

impl WorkflowDefinition {
    pub fn step(&self, id: u32) -> Option<&StepDefinition> {
        self.steps.iter().find(|step| step.id == id)
    }

    pub fn agent(&self, name: &str) -> Option<&AgentDefinition> {
        self.agents.get(name)
    }

    /// Index of a step in execution order
    pub fn position(&self, id: u32) -> Option<usize> {
        self.steps.iter().position(|step| step.id == id)
    }

    /// The step immediately after `id` in execution order
    pub fn successor_of(&self, id: u32) -> Option<u32> {
        let index = self.position(id)?;
        self.steps.get(index + 1).map(|step| step.id)
    }

    pub fn step_ids(&self) -> Vec<u32> {
        self.steps.iter().map(|step| step.id).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PLAN: &str = r#"
meta:
  flow_name: Review
  owner: team
  flow_id: 12
agents:
  Lyra:
    role: Writer
    verbs: [draft, revise]
  Sophia:
    role: Editor
steps:
  - id: 1
    name: Draft
    agent: Lyra
    output: 42
  - id: "2"
    name: Edit
    agent: Sophia
    handover_to: Lyra
"#;

    #[test]
    fn test_lenient_decode() {
        let def: WorkflowDefinition = serde_yaml::from_str(PLAN).unwrap();
        assert_eq!(def.meta.flow_id.as_deref(), Some("12"));
        assert_eq!(def.meta.description, "");
        assert_eq!(def.agents.keys().collect::<Vec<_>>(), vec!["Lyra", "Sophia"]);
        assert!(def.agent("Sophia").unwrap().verbs.is_empty());
        assert_eq!(def.steps[0].output, "42");
        assert_eq!(def.steps[1].id, 2);
        assert!(def.schedule.is_none());
    }

    #[test]
    fn test_navigation_helpers() {
        let def: WorkflowDefinition = serde_yaml::from_str(PLAN).unwrap();
        assert_eq!(def.step_ids(), vec![1, 2]);
        assert_eq!(def.successor_of(1), Some(2));
        assert_eq!(def.successor_of(2), None);
        assert_eq!(def.successor_of(9), None);
        assert_eq!(def.position(2), Some(1));
        assert_eq!(def.step(2).unwrap().name, "Edit");
    }

    #[test]
    fn test_bad_step_id() {
        let text = "meta: {flow_name: X}\nagents: {}\nsteps: [{id: 1.5, name: a, agent: b}]";
        assert!(serde_yaml::from_str::<WorkflowDefinition>(text).is_err());
        let text = "meta: {flow_name: X}\nagents: {}\nsteps: [{id: -1, name: a, agent: b}]";
        assert!(serde_yaml::from_str::<WorkflowDefinition>(text).is_err());
    }
}
