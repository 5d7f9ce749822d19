//! Common types for LLM interactions
//!
//! These types describe what is sent to a text or image model and what
//! comes back from a streamed generation.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt;
use std::str::FromStr;

use crate::llm::LlmError;

/// Speaker of a conversation turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Model,
}

/// A text part of a turn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Part {
    pub text: String,
}

/// One conversation turn, shaped like the backend's `Content` object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub parts: Vec<Part>,
}

impl Turn {
    pub fn text(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            parts: vec![Part { text: text.into() }],
        }
    }
}

/// A user/model example pair prepended before the real prompt
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FewShot {
    pub user: String,
    pub model: String,
}

/// Everything needed for one text-generation request
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    /// The real prompt, always the last user turn
    pub prompt: String,
    /// Optional one-shot example pair
    pub few_shot: Option<FewShot>,
    /// Fully assembled system instruction
    pub system_instruction: String,
    /// Sampling temperature
    pub temperature: f32,
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>, system_instruction: impl Into<String>, temperature: f32) -> Self {
        Self {
            prompt: prompt.into(),
            few_shot: None,
            system_instruction: system_instruction.into(),
            temperature,
        }
    }

    pub fn with_few_shot(mut self, user: impl Into<String>, model: impl Into<String>) -> Self {
        self.few_shot = Some(FewShot {
            user: user.into(),
            model: model.into(),
        });
        self
    }

    /// Ordered turns sent to the backend.
    ///
    /// The example pair is only used when both halves are non-empty.
    pub fn contents(&self) -> Vec<Turn> {
        let mut contents = Vec::with_capacity(3);
        if let Some(example) = &self.few_shot {
            if !example.user.is_empty() && !example.model.is_empty() {
                contents.push(Turn::text(Role::User, example.user.clone()));
                contents.push(Turn::text(Role::Model, example.model.clone()));
            }
        }
        contents.push(Turn::text(Role::User, self.prompt.clone()));
        contents
    }

    /// Pretty JSON of the request as sent, kept for audit and display
    pub fn serialize_full_prompt(&self) -> String {
        let document = json!({
            "systemInstruction": self.system_instruction,
            "contents": self.contents(),
        });
        serde_json::to_string_pretty(&document).unwrap_or_else(|_| document.to_string())
    }
}

/// Events delivered to a streaming consumer
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// Incremental text in arrival order
    Chunk(String),
    /// Discard everything accumulated so far for this response
    Clear,
    /// Terminal success with the full text
    Complete(String),
    /// Terminal failure with a descriptive message
    Error(String),
}

impl StreamEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamEvent::Complete(_) | StreamEvent::Error(_))
    }
}

/// Record of what a streaming call actually sent
#[derive(Debug, Clone, PartialEq)]
pub struct StreamRecord {
    pub full_prompt: String,
}

/// Field types understood by the structured-output schema
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SchemaType {
    Object,
    Array,
    String,
    Number,
}

/// Shape description for structured (JSON) output
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResponseSchema {
    #[serde(rename = "type")]
    pub kind: SchemaType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "enum", skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties: Option<IndexMap<String, ResponseSchema>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<ResponseSchema>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required: Option<Vec<String>>,
}

impl ResponseSchema {
    fn of(kind: SchemaType) -> Self {
        Self {
            kind,
            description: None,
            enum_values: None,
            properties: None,
            items: None,
            required: None,
        }
    }

    pub fn object() -> Self {
        Self::of(SchemaType::Object)
    }

    pub fn array(items: ResponseSchema) -> Self {
        let mut schema = Self::of(SchemaType::Array);
        schema.items = Some(Box::new(items));
        schema
    }

    pub fn string(description: &str) -> Self {
        Self::of(SchemaType::String).describe(description)
    }

    pub fn number(description: &str) -> Self {
        Self::of(SchemaType::Number).describe(description)
    }

    pub fn describe(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    pub fn one_of(mut self, values: &[&str]) -> Self {
        self.enum_values = Some(values.iter().map(|v| v.to_string()).collect());
        self
    }

    pub fn property(mut self, name: &str, schema: ResponseSchema) -> Self {
        self.properties
            .get_or_insert_with(IndexMap::new)
            .insert(name.to_string(), schema);
        self
    }

    pub fn require(mut self, names: &[&str]) -> Self {
        self.required = Some(names.iter().map(|n| n.to_string()).collect());
        self
    }
}

/// Options for one-shot suggestion calls
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SuggestOptions {
    /// Ask for machine-parseable JSON output
    pub json_mode: bool,
    /// Optional shape of the JSON document
    pub schema: Option<ResponseSchema>,
}

impl SuggestOptions {
    pub fn json(schema: ResponseSchema) -> Self {
        Self {
            json_mode: true,
            schema: Some(schema),
        }
    }
}

/// Aspect ratios accepted by the image model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AspectRatio {
    #[default]
    #[serde(rename = "1:1")]
    Square,
    #[serde(rename = "16:9")]
    Landscape,
    #[serde(rename = "9:16")]
    Portrait,
    #[serde(rename = "4:3")]
    Classic,
    #[serde(rename = "3:4")]
    ClassicPortrait,
}

impl AspectRatio {
    pub const ALL: [AspectRatio; 5] = [
        AspectRatio::Square,
        AspectRatio::Landscape,
        AspectRatio::Portrait,
        AspectRatio::Classic,
        AspectRatio::ClassicPortrait,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AspectRatio::Square => "1:1",
            AspectRatio::Landscape => "16:9",
            AspectRatio::Portrait => "9:16",
            AspectRatio::Classic => "4:3",
            AspectRatio::ClassicPortrait => "3:4",
        }
    }
}

impl fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AspectRatio {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AspectRatio::ALL
            .iter()
            .copied()
            .find(|ratio| ratio.as_str() == s.trim())
            .ok_or_else(|| {
                format!(
                    "Unknown aspect ratio: {}. Valid options: 1:1, 16:9, 9:16, 4:3, 3:4",
                    s
                )
            })
    }
}

/// Maximum number of images per request
pub const MAX_IMAGES_PER_REQUEST: u8 = 4;

/// A validated image-generation request
#[derive(Debug, Clone, PartialEq)]
pub struct ImageRequest {
    pub prompt: String,
    pub count: u8,
    pub aspect_ratio: AspectRatio,
}

impl ImageRequest {
    pub fn new(prompt: impl Into<String>, count: u8, aspect_ratio: AspectRatio) -> Result<Self, LlmError> {
        if !(1..=MAX_IMAGES_PER_REQUEST).contains(&count) {
            return Err(LlmError::ConfigError(format!(
                "Image count must be between 1 and {}, got {}",
                MAX_IMAGES_PER_REQUEST, count
            )));
        }
        let prompt = prompt.into();
        if prompt.trim().is_empty() {
            return Err(LlmError::ConfigError("Image prompt must not be empty".into()));
        }
        Ok(Self {
            prompt,
            count,
            aspect_ratio,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contents_with_and_without_example() {
        let plain = GenerationRequest::new("real prompt", "system", 0.7);
        assert_eq!(plain.contents(), vec![Turn::text(Role::User, "real prompt")]);

        let seeded = plain.clone().with_few_shot("hi", "hello");
        let contents = seeded.contents();
        assert_eq!(contents.len(), 3);
        assert_eq!(contents[0].role, Role::User);
        assert_eq!(contents[1].role, Role::Model);
        assert_eq!(contents[2].parts[0].text, "real prompt");

        // Half an example is ignored
        let half = plain.with_few_shot("hi", "");
        assert_eq!(half.contents().len(), 1);
    }

    #[test]
    fn test_full_prompt_serialization() {
        let request = GenerationRequest::new("Write a haiku", "Be brief.", 0.2).with_few_shot("a", "b");
        let value: serde_json::Value = serde_json::from_str(&request.serialize_full_prompt()).unwrap();
        assert_eq!(value["systemInstruction"], "Be brief.");
        assert_eq!(value["contents"][1]["role"], "model");
        assert_eq!(value["contents"][2]["parts"][0]["text"], "Write a haiku");
    }

    #[test]
    fn test_schema_serialization() {
        let schema = ResponseSchema::object()
            .property("formality", ResponseSchema::string("tone").one_of(&["default", "casual"]))
            .property("temperature", ResponseSchema::number("creativity"))
            .require(&["formality"]);
        let value = serde_json::to_value(&schema).unwrap();
        assert_eq!(value["type"], "OBJECT");
        assert_eq!(value["properties"]["formality"]["enum"][1], "casual");
        assert_eq!(value["properties"]["temperature"]["type"], "NUMBER");
        assert_eq!(value["required"][0], "formality");
        assert!(value.get("items").is_none());
    }

    #[test]
    fn test_image_request_validation() {
        assert!(ImageRequest::new("a cat", 0, AspectRatio::Square).is_err());
        assert!(ImageRequest::new("a cat", 5, AspectRatio::Square).is_err());
        assert!(ImageRequest::new("  ", 1, AspectRatio::Square).is_err());
        let request = ImageRequest::new("a cat", 4, "16:9".parse().unwrap()).unwrap();
        assert_eq!(request.aspect_ratio, AspectRatio::Landscape);
        assert!("2:1".parse::<AspectRatio>().is_err());
    }
}
