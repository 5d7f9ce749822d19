//! Plan parser
//!
//! Turns model-written plan text into a `WorkflowDefinition`. The text is
//! usually still streaming in, so every failure is a non-fatal "not ready"
//! outcome rather than an error; callers simply re-parse on each update.

use serde_yaml::{Mapping, Value};
use std::collections::HashSet;
use std::fmt;

use crate::markdown::extract_fenced_block;
use crate::workflow::types::WorkflowDefinition;

/// Shown in place of a parse error while the plan is still streaming
pub const WAITING_MESSAGE: &str = "Waiting for valid YAML structure...";

const REQUIRED_KEYS: [&str; 3] = ["meta", "agents", "steps"];

/// Result of one parse attempt
#[derive(Debug, Clone, PartialEq)]
pub enum PlanParse {
    Ready(WorkflowDefinition),
    NotReady(PlanIssue),
}

impl PlanParse {
    pub fn definition(&self) -> Option<&WorkflowDefinition> {
        match self {
            PlanParse::Ready(definition) => Some(definition),
            PlanParse::NotReady(_) => None,
        }
    }

    pub fn into_result(self) -> Result<WorkflowDefinition, PlanIssue> {
        match self {
            PlanParse::Ready(definition) => Ok(definition),
            PlanParse::NotReady(issue) => Err(issue),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanIssueKind {
    /// Nothing to parse yet
    Empty,
    /// The payload is not valid YAML
    Syntax,
    /// Valid YAML, but `meta`, `agents` or `steps` is absent
    MissingKeys,
    /// All keys present, but the shape does not decode
    Invalid,
}

/// Why a plan is not (yet) usable
#[derive(Debug, Clone, PartialEq)]
pub struct PlanIssue {
    pub kind: PlanIssueKind,
    pub message: String,
}

impl PlanIssue {
    fn new(kind: PlanIssueKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// User-facing text: a waiting notice mid-stream, the error once done
    pub fn display(&self, streaming_finished: bool) -> &str {
        if streaming_finished {
            &self.message
        } else {
            WAITING_MESSAGE
        }
    }
}

impl fmt::Display for PlanIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// The YAML payload: the first fenced yaml block, or the whole text
pub fn extract_payload(text: &str) -> &str {
    extract_fenced_block(text, &["yaml", "yml"]).unwrap_or(text)
}

/// Parse plan text. Never panics; idempotent.
pub fn parse_plan(text: &str) -> PlanParse {
    match try_parse(text) {
        Ok(definition) => PlanParse::Ready(definition),
        Err(issue) => PlanParse::NotReady(issue),
    }
}

fn try_parse(text: &str) -> Result<WorkflowDefinition, PlanIssue> {
    let payload = extract_payload(text);
    if payload.trim().is_empty() {
        return Err(PlanIssue::new(PlanIssueKind::Empty, "Plan text is empty."));
    }

    let value = load_yaml(payload)?;
    let value = repair_adjacent_values(value);

    let Value::Mapping(root) = &value else {
        return Err(PlanIssue::new(
            PlanIssueKind::MissingKeys,
            "Invalid plan structure: expected a mapping with 'meta', 'agents', and 'steps'.",
        ));
    };

    let missing: Vec<&str> = REQUIRED_KEYS
        .iter()
        .copied()
        .filter(|key| root.get(*key).map_or(true, Value::is_null))
        .collect();
    if !missing.is_empty() {
        return Err(PlanIssue::new(
            PlanIssueKind::MissingKeys,
            format!(
                "Invalid plan structure: missing required key(s) {}.",
                missing.join(", ")
            ),
        ));
    }

    let mut definition: WorkflowDefinition = serde_yaml::from_value(value)
        .map_err(|e| PlanIssue::new(PlanIssueKind::Invalid, format!("Invalid plan: {}", e)))?;

    if definition.steps.is_empty() {
        return Err(PlanIssue::new(PlanIssueKind::Invalid, "Invalid plan: no steps."));
    }

    let mut seen = HashSet::new();
    if let Some(step) = definition.steps.iter().find(|step| !seen.insert(step.id)) {
        return Err(PlanIssue::new(
            PlanIssueKind::Invalid,
            format!("Invalid plan: duplicate step id {}.", step.id),
        ));
    }

    definition.steps.sort_by_key(|step| step.id);
    Ok(definition)
}

/// Load the payload, retrying once with flow-style key colons spaced out.
///
/// The error of the raw load is reported when both attempts fail.
fn load_yaml(payload: &str) -> Result<Value, PlanIssue> {
    serde_yaml::from_str(payload).or_else(|raw_error| {
        let spaced = space_flow_colons(payload);
        if spaced == payload {
            return Err(raw_error);
        }
        serde_yaml::from_str(&spaced).map_err(|_| raw_error)
    })
    .map_err(|e| PlanIssue::new(PlanIssueKind::Syntax, format!("YAML syntax error: {}", e)))
}

/// Insert a space after `key:` inside `{...}`/`[...]` where the value follows
/// the colon directly, as in `{meta:{flow_name: X}}` or `verbs:[v1]`.
///
/// Only a colon ending a plain key (the entry so far has no whitespace and
/// no other colon) is touched, so `{url: http://x}` keeps its value intact.
/// Quoted scalars and text outside flow collections are copied unchanged.
fn space_flow_colons(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 16);
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut entry = String::new();
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        out.push(c);
        if let Some(q) = quote {
            if c == q {
                quote = None;
            }
            entry.push(c);
            continue;
        }
        match c {
            '{' | '[' => {
                depth += 1;
                entry.clear();
            }
            '}' | ']' => {
                depth = depth.saturating_sub(1);
                entry.clear();
            }
            ',' if depth > 0 => entry.clear(),
            '"' | '\'' if depth > 0 => {
                quote = Some(c);
                entry.push(c);
            }
            ':' if depth > 0 => {
                let key = entry.trim();
                let plain_key = !key.is_empty() && !key.contains(char::is_whitespace) && !key.contains(':');
                let glued = chars.peek().is_some_and(|next| !next.is_whitespace());
                if plain_key && glued {
                    out.push(' ');
                }
                entry.push(c);
            }
            _ => entry.push(c),
        }
    }
    out
}

/// Split flow-style `key:value` scalars that YAML reads as a single key.
///
/// Inside `{...}` a colon only separates key and value when followed by a
/// space, so `{id:1}` loads as `{"id:1": null}`. Such entries are rewritten
/// to `{id: 1}` unless the bare key already exists.
fn repair_adjacent_values(value: Value) -> Value {
    match value {
        Value::Mapping(map) => {
            let mut repaired = Mapping::with_capacity(map.len());
            for (key, val) in map {
                let val = repair_adjacent_values(val);
                let split = match (&key, &val) {
                    (Value::String(raw), Value::Null) => split_adjacent(raw),
                    _ => None,
                };
                match split {
                    Some((bare, inner)) if !repaired.contains_key(bare.as_str()) => {
                        repaired.insert(Value::String(bare), inner);
                    }
                    _ => {
                        repaired.insert(key, val);
                    }
                }
            }
            Value::Mapping(repaired)
        }
        Value::Sequence(items) => Value::Sequence(items.into_iter().map(repair_adjacent_values).collect()),
        other => other,
    }
}

fn split_adjacent(raw: &str) -> Option<(String, Value)> {
    let (key, rest) = raw.split_once(':')?;
    let key = key.trim();
    let rest = rest.trim();
    if key.is_empty() || rest.is_empty() || key.contains(char::is_whitespace) {
        return None;
    }
    let inner = serde_yaml::from_str::<Value>(rest).unwrap_or_else(|_| Value::String(rest.to_string()));
    Some((key.to_string(), inner))
}

#[cfg(test)]
mod tests {
    use super::*;

    const FLOW_PLAN: &str = "```yaml\n{meta:{flow_name: X, owner: O, description: D}, agents:{A:{role:R, verbs:[v1]}}, steps:[{id:1, name:n, agent:A, verb:v1, input:i, output:o, handover_to:A}]}\n```";

    fn issue(text: &str) -> PlanIssue {
        match parse_plan(text) {
            PlanParse::NotReady(issue) => issue,
            PlanParse::Ready(def) => panic!("unexpectedly parsed: {:?}", def),
        }
    }

    #[test]
    fn test_fenced_flow_style_plan() {
        let def = parse_plan(FLOW_PLAN).into_result().unwrap();
        assert_eq!(def.meta.flow_name, "X");
        assert_eq!(def.meta.owner, "O");
        assert_eq!(def.steps.len(), 1);

        let step = &def.steps[0];
        assert_eq!(step.id, 1);
        assert_eq!(step.name, "n");
        assert_eq!(step.handover_to, "A");
        assert_eq!(def.agent("A").unwrap().role, "R");
        assert_eq!(def.agent("A").unwrap().verbs, vec!["v1"]);
    }

    #[test]
    fn test_glued_flow_colons_are_spaced() {
        assert_eq!(
            space_flow_colons("{meta:{flow_name: X}, agents:{A:{verbs:[v1]}}}"),
            "{meta: {flow_name: X}, agents: {A: {verbs: [v1]}}}"
        );
        assert_eq!(space_flow_colons("{url: http://x, 'k:v': 1}"), "{url: http://x, 'k:v': 1}");
        assert_eq!(space_flow_colons("url: http://x"), "url: http://x");
    }

    #[test]
    fn test_block_style_url_is_untouched() {
        let text = "meta:\n  flow_name: Site\n  description: see http://example.com/a:b\nagents: {A: {role: r}}\nsteps: [{id: 1, name: n, agent: A}]";
        let def = parse_plan(text).into_result().unwrap();
        assert_eq!(def.meta.description, "see http://example.com/a:b");
    }

    #[test]
    fn test_block_style_with_surrounding_prose() {
        let text = "Here is the plan:\n\n```yaml\nmeta:\n  flow_name: Blog\nagents:\n  Lyra:\n    role: Writer\n    verbs: [write]\nsteps:\n  - id: 2\n    name: Publish\n    agent: Lyra\n  - id: 1\n    name: Draft\n    agent: Lyra\n```\nLet me know!";
        let def = parse_plan(text).into_result().unwrap();
        assert_eq!(def.step_ids(), vec![1, 2]);
    }

    #[test]
    fn test_unfenced_text_is_the_payload() {
        let text = "meta: {flow_name: Raw}\nagents: {A: {role: r}}\nsteps: [{id: 1, name: n, agent: A}]";
        assert!(matches!(parse_plan(text), PlanParse::Ready(_)));
    }

    #[test]
    fn test_empty_and_missing_keys_are_not_ready() {
        assert_eq!(issue("").kind, PlanIssueKind::Empty);
        assert_eq!(issue("   \n").kind, PlanIssueKind::Empty);

        let missing = issue("meta: {flow_name: X}\nagents: {A: {role: r}}");
        assert_eq!(missing.kind, PlanIssueKind::MissingKeys);
        assert!(missing.message.contains("steps"));

        let null_steps = issue("meta: {flow_name: X}\nagents: {}\nsteps:");
        assert_eq!(null_steps.kind, PlanIssueKind::MissingKeys);

        assert_eq!(issue("- just\n- a list").kind, PlanIssueKind::MissingKeys);
    }

    #[test]
    fn test_partial_stream_is_not_ready() {
        // Unterminated fence: the whole text is tried and fails
        let partial = &FLOW_PLAN[..FLOW_PLAN.len() / 2];
        let issue = issue(partial);
        assert_ne!(issue.kind, PlanIssueKind::Empty);
        assert_eq!(issue.display(false), WAITING_MESSAGE);
        assert_eq!(issue.display(true), issue.message);
    }

    #[test]
    fn test_invalid_shapes() {
        let no_name = issue("meta: {owner: O}\nagents: {}\nsteps: [{id: 1, name: n, agent: A}]");
        assert_eq!(no_name.kind, PlanIssueKind::Invalid);

        let dup = issue("meta: {flow_name: X}\nagents: {}\nsteps: [{id: 1, name: a, agent: A}, {id: 1, name: b, agent: A}]");
        assert_eq!(dup.kind, PlanIssueKind::Invalid);
        assert!(dup.message.contains("duplicate step id 1"));

        let empty = issue("meta: {flow_name: X}\nagents: {}\nsteps: []");
        assert_eq!(empty.kind, PlanIssueKind::Invalid);

        assert_eq!(issue("meta: [unclosed").kind, PlanIssueKind::Syntax);
    }

    #[test]
    fn test_repair_keeps_existing_keys() {
        let value: Value = serde_yaml::from_str("{url: keep, url:x}").unwrap();
        let repaired = repair_adjacent_values(value);
        assert_eq!(repaired["url"], Value::String("keep".into()));
        assert!(repaired.get("url:x").is_some());
    }
}
