//! AI suggestions for the composer
//!
//! Each kind has a meta-prompt built from the current setup and, for the
//! structured kinds, a response schema and a typed decoder. A failed call or
//! a malformed reply leaves the composer untouched.

use serde::Deserialize;
use serde_json::Value;

use crate::composer::{Composer, Conciseness, Formality, Variable};
use crate::llm::suggest::{is_error_response, suggest_with_retry};
use crate::llm::retry_utils::RetryConfig;
use crate::llm::{Backend, ResponseSchema, SuggestOptions};
use crate::serde_utils::scalar::number;

const JSON_ONLY: &str =
    "Respond with ONLY a valid JSON object matching the specified schema. Do not include any other text or markdown.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum SuggestionKind {
    Prompt,
    System,
    Examples,
    Vibe,
    Variables,
}

impl SuggestionKind {
    fn label(self) -> &'static str {
        match self {
            Self::Prompt => "prompt",
            Self::System => "system",
            Self::Examples => "few-shot example",
            Self::Vibe => "vibe & tone",
            Self::Variables => "contextual variables",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SuggestionError {
    /// The call itself failed; carries the `Error:` text
    #[error("{0}")]
    Request(String),

    #[error("Error processing suggestion: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Error processing suggestion: {0}")]
    Shape(String),
}

/// A decoded suggestion, ready to apply
#[derive(Debug, Clone, PartialEq)]
pub enum Suggestion {
    Prompt(String),
    System(String),
    Examples { user: String, model: String },
    Vibe {
        temperature: Option<f32>,
        formality: Option<Formality>,
        conciseness: Option<Conciseness>,
    },
    Variables(Vec<Variable>),
}

impl Suggestion {
    /// Fields the suggestion did not settle keep their current values
    pub fn apply(self, composer: &mut Composer) {
        match self {
            Suggestion::Prompt(text) => composer.prompt = text,
            Suggestion::System(text) => composer.settings.system_instruction = text,
            Suggestion::Examples { user, model } => {
                composer.user_example = user;
                composer.model_example = model;
            }
            Suggestion::Vibe {
                temperature,
                formality,
                conciseness,
            } => {
                let settings = &mut composer.settings;
                settings.temperature = temperature.unwrap_or(settings.temperature);
                settings.formality = formality.unwrap_or(settings.formality);
                settings.conciseness = conciseness.unwrap_or(settings.conciseness);
            }
            Suggestion::Variables(variables) => composer.variables = variables,
        }
    }
}

pub fn meta_prompt(kind: SuggestionKind, composer: &Composer) -> String {
    let system = &composer.settings.system_instruction;
    let prompt = &composer.prompt;
    match kind {
        SuggestionKind::Prompt => format!(
            "Based on the system instruction \"{}\", generate a creative and interesting one-paragraph prompt for a generative AI. The current project is related to: {}.",
            system, composer.template_name
        ),
        SuggestionKind::System => format!(
            "Generate a concise but powerful system instruction for an AI persona related to: {}. The instruction should be a single paragraph.",
            composer.template_name
        ),
        SuggestionKind::Examples => format!(
            "Based on the system instruction \"{}\" and the user prompt \"{}\", generate a concise and effective few-shot example. This example should guide the AI on how to respond. Provide a simple 'userExample' and a corresponding ideal 'modelExample'.\n{}",
            system, prompt, JSON_ONLY
        ),
        SuggestionKind::Vibe => format!(
            "Based on the system instruction \"{}\" and the user prompt \"{}\", suggest optimal settings for 'temperature', 'formality', and 'conciseness'.\n\
             - 'temperature' is a float between 0.0 (deterministic) and 1.0 (creative).\n\
             - 'formality' is one of 'default', 'casual', 'formal'.\n\
             - 'conciseness' is one of 'default', 'brief', 'detailed'.\n{}",
            system, prompt, JSON_ONLY
        ),
        SuggestionKind::Variables => format!(
            "Analyze the following user prompt and identify placeholders for dynamic content. These placeholders are typically enclosed in double curly braces, like {{{{placeholder}}}}.\n\
             Based on the prompt, suggest 2-3 relevant key-value pairs that could be used as variables.\n\
             Respond with ONLY a valid JSON array of objects, where each object has a 'key' (the name of the variable without braces) and a 'value' (a realistic example value). Do not include any other text or markdown.\n\n\
             User Prompt: \"{}\"",
            prompt
        ),
    }
}

/// JSON mode and schema for the structured kinds
pub fn options(kind: SuggestionKind) -> Option<SuggestOptions> {
    let schema = match kind {
        SuggestionKind::Prompt | SuggestionKind::System => return None,
        SuggestionKind::Examples => ResponseSchema::object()
            .property("userExample", ResponseSchema::string("A sample input from a user."))
            .property(
                "modelExample",
                ResponseSchema::string("The ideal AI response to the user's sample input."),
            )
            .require(&["userExample", "modelExample"]),
        SuggestionKind::Vibe => ResponseSchema::object()
            .property(
                "temperature",
                ResponseSchema::number("A value between 0.0 and 1.0 for creativity."),
            )
            .property(
                "formality",
                ResponseSchema::string("The tone of the response.").one_of(&["default", "casual", "formal"]),
            )
            .property(
                "conciseness",
                ResponseSchema::string("The level of detail in the response.")
                    .one_of(&["default", "brief", "detailed"]),
            )
            .require(&["temperature", "formality", "conciseness"]),
        SuggestionKind::Variables => ResponseSchema::array(
            ResponseSchema::object()
                .property("key", ResponseSchema::string("The variable name (without curly braces)."))
                .property("value", ResponseSchema::string("An example value for the variable."))
                .require(&["key", "value"]),
        ),
    };
    Some(SuggestOptions::json(schema))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExamplesReply {
    #[serde(default)]
    user_example: String,
    #[serde(default)]
    model_example: String,
}

#[derive(Deserialize)]
struct VibeReply {
    #[serde(default)]
    temperature: Value,
    #[serde(default)]
    formality: Value,
    #[serde(default)]
    conciseness: Value,
}

#[derive(Deserialize)]
struct VariableReply {
    key: String,
    value: String,
}

/// Decode the text of a successful suggestion call
pub fn decode(kind: SuggestionKind, text: &str) -> Result<Suggestion, SuggestionError> {
    match kind {
        SuggestionKind::Prompt => Ok(Suggestion::Prompt(text.to_string())),
        SuggestionKind::System => Ok(Suggestion::System(text.to_string())),
        SuggestionKind::Examples => {
            let reply: ExamplesReply = serde_json::from_str(text)?;
            if reply.user_example.is_empty() || reply.model_example.is_empty() {
                return Err(SuggestionError::Shape("Invalid JSON structure received.".into()));
            }
            Ok(Suggestion::Examples {
                user: reply.user_example,
                model: reply.model_example,
            })
        }
        SuggestionKind::Vibe => {
            let reply: VibeReply = serde_json::from_str(text)?;
            Ok(Suggestion::Vibe {
                temperature: number::deserialize(reply.temperature).ok().map(|t| t as f32),
                formality: reply.formality.as_str().and_then(Formality::parse),
                conciseness: reply.conciseness.as_str().and_then(Conciseness::parse),
            })
        }
        SuggestionKind::Variables => {
            let value: Value = serde_json::from_str(text)?;
            if !value.is_array() {
                return Err(SuggestionError::Shape(
                    "Invalid JSON structure received. Expected an array.".into(),
                ));
            }
            let replies: Vec<VariableReply> = serde_json::from_value(value)?;
            Ok(Suggestion::Variables(
                replies
                    .into_iter()
                    .map(|reply| Variable::new(reply.key, reply.value))
                    .collect(),
            ))
        }
    }
}

/// Ask for a suggestion of `kind` and apply it to the composer
pub async fn request_suggestion(
    backend: &dyn Backend,
    kind: SuggestionKind,
    composer: &mut Composer,
    retry: &RetryConfig,
) -> Result<Suggestion, SuggestionError> {
    bprintln!(info: "Requesting {} suggestion...", kind.label());
    let meta = meta_prompt(kind, composer);
    let options = options(kind);
    let text = suggest_with_retry(backend, &meta, options.as_ref(), retry).await;

    if is_error_response(&text) {
        bprintln!(error: "{}", text);
        return Err(SuggestionError::Request(text));
    }

    let suggestion = decode(kind, &text).inspect_err(|e| bprintln!(error: "{}", e))?;
    suggestion.clone().apply(composer);
    bprintln!(info: "AI suggestion for {} received and applied.", kind.label());
    Ok(suggestion)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::mock::{Failure, MockBackend};
    use crate::llm::SchemaType;

    fn composer() -> Composer {
        let mut composer = Composer::default();
        composer.template_name = "Poetry".into();
        composer.prompt = "Write about {{topic}}".into();
        composer.settings.system_instruction = "You are a poet.".into();
        composer
    }

    #[test]
    fn test_meta_prompts_mention_context() {
        let c = composer();
        assert!(meta_prompt(SuggestionKind::Prompt, &c).contains("related to: Poetry."));
        assert!(meta_prompt(SuggestionKind::Vibe, &c).contains("\"You are a poet.\""));
        let vars = meta_prompt(SuggestionKind::Variables, &c);
        assert!(vars.contains("like {{placeholder}}."));
        assert!(vars.ends_with("User Prompt: \"Write about {{topic}}\""));
    }

    #[test]
    fn test_structured_kinds_use_json_mode() {
        assert!(options(SuggestionKind::Prompt).is_none());
        let vibe = options(SuggestionKind::Vibe).unwrap();
        assert!(vibe.json_mode);
        let schema = vibe.schema.unwrap();
        assert_eq!(schema.required.unwrap().len(), 3);

        let vars = options(SuggestionKind::Variables).unwrap().schema.unwrap();
        assert_eq!(vars.kind, SchemaType::Array);
    }

    #[test]
    fn test_vibe_keeps_current_on_invalid_values() {
        let mut c = composer();
        c.settings.temperature = 0.4;
        decode(
            SuggestionKind::Vibe,
            r#"{"temperature": "warm", "formality": "formal", "conciseness": "rambling"}"#,
        )
        .unwrap()
        .apply(&mut c);

        assert!((c.settings.temperature - 0.4).abs() < f32::EPSILON);
        assert_eq!(c.settings.formality, Formality::Formal);
        assert_eq!(c.settings.conciseness, Conciseness::Default);

        decode(SuggestionKind::Vibe, r#"{"temperature": "0.9"}"#)
            .unwrap()
            .apply(&mut c);
        assert!((c.settings.temperature - 0.9).abs() < 1e-6);
    }

    #[test]
    fn test_examples_require_both_halves() {
        assert!(matches!(
            decode(SuggestionKind::Examples, r#"{"userExample": "hi"}"#),
            Err(SuggestionError::Shape(_))
        ));
        assert!(matches!(
            decode(SuggestionKind::Examples, "not json"),
            Err(SuggestionError::Decode(_))
        ));
    }

    #[test]
    fn test_variables_get_fresh_ids() {
        let Suggestion::Variables(vars) = decode(
            SuggestionKind::Variables,
            r#"[{"key": "topic", "value": "rain"}, {"key": "mood", "value": "calm"}]"#,
        )
        .unwrap() else {
            panic!("expected variables");
        };
        assert_eq!(vars.len(), 2);
        assert_ne!(vars[0].id, vars[1].id);
        assert!(matches!(
            decode(SuggestionKind::Variables, r#"{"key": "x"}"#),
            Err(SuggestionError::Shape(_))
        ));
    }

    #[tokio::test]
    async fn test_request_applies_on_success() {
        let backend = MockBackend::replying(vec![Ok(r#"{"userExample": "Q", "modelExample": "A"}"#.into())]);
        let mut c = composer();
        request_suggestion(&backend, SuggestionKind::Examples, &mut c, &RetryConfig::default())
            .await
            .unwrap();
        assert_eq!((c.user_example.as_str(), c.model_example.as_str()), ("Q", "A"));
    }

    #[tokio::test]
    async fn test_failures_leave_composer_unchanged() {
        let backend = MockBackend::replying(vec![
            Err(Failure::Api("quota".into())),
            Ok("[oops".into()),
        ]);
        let mut c = composer();
        let before = c.clone();

        let err = request_suggestion(&backend, SuggestionKind::Prompt, &mut c, &RetryConfig::default())
            .await
            .unwrap_err();
        assert!(err.to_string().starts_with("Error:"));

        let err = request_suggestion(&backend, SuggestionKind::Variables, &mut c, &RetryConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, SuggestionError::Decode(_)));
        assert_eq!(c, before);
    }
}
