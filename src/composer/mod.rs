//! Prompt composer
//!
//! Holds the editable prompt setup (prompt, few-shot pair, variables and
//! settings), turns it into a `GenerationRequest`, and records every
//! completed run as an `Iteration`.

pub mod suggestions;

use regex::{NoExpand, Regex};
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::mpsc;

use crate::llm::{GenerationRequest, StreamEvent, StreamingClient};
use crate::store::{FileContent, Iteration, Store, StoreError, VirtualFile};
use crate::templates::PromptTemplate;

const SUPERVISOR_HEADER: &str = "[AI SUPERVISOR DIRECTIVE]:";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Formality {
    Default,
    #[default]
    Casual,
    Formal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Conciseness {
    #[default]
    Default,
    Brief,
    Detailed,
}

impl Formality {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "default" => Some(Self::Default),
            "casual" => Some(Self::Casual),
            "formal" => Some(Self::Formal),
            _ => None,
        }
    }

    fn sentence(self) -> &'static str {
        match self {
            Self::Default => "",
            Self::Casual => " Respond in a casual and friendly tone.",
            Self::Formal => " Respond in a formal and professional tone.",
        }
    }
}

impl Conciseness {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "default" => Some(Self::Default),
            "brief" => Some(Self::Brief),
            "detailed" => Some(Self::Detailed),
            _ => None,
        }
    }

    fn sentence(self) -> &'static str {
        match self {
            Self::Default => "",
            Self::Brief => " Be brief and to the point.",
            Self::Detailed => " Provide detailed and comprehensive explanations.",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptSettings {
    pub system_instruction: String,
    pub temperature: f32,
    pub conciseness: Conciseness,
    pub formality: Formality,
}

impl Default for PromptSettings {
    fn default() -> Self {
        Self {
            system_instruction: String::new(),
            temperature: 0.7,
            conciseness: Conciseness::default(),
            formality: Formality::default(),
        }
    }
}

/// A `{{ key }}` substitution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variable {
    pub id: String,
    pub key: String,
    pub value: String,
}

impl Variable {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Prefix `instruction` with the supervisor directive when there is one
pub fn with_supervisor(supervisor: &str, instruction: &str) -> String {
    let supervisor = supervisor.trim();
    if supervisor.is_empty() {
        return instruction.trim().to_string();
    }
    format!("{}\n{}\n\n---\n\n{}", SUPERVISOR_HEADER, supervisor, instruction)
        .trim()
        .to_string()
}

/// Full system instruction for a composer run
pub fn build_system_instruction(settings: &PromptSettings, supervisor: &str) -> String {
    let mut instruction = settings.system_instruction.trim().to_string();
    instruction.push_str(settings.formality.sentence());
    instruction.push_str(settings.conciseness.sentence());
    with_supervisor(supervisor, instruction.trim())
}

/// Replace every `{{ key }}` placeholder, variables applied in order.
///
/// Whitespace inside the braces is ignored; empty keys and unknown
/// placeholders are left alone.
pub fn apply_variables(text: &str, variables: &[Variable]) -> String {
    variables
        .iter()
        .filter(|variable| !variable.key.is_empty())
        .fold(text.to_string(), |current, variable| {
            replace_placeholder(&current, &variable.key, &variable.value)
        })
}

fn replace_placeholder(text: &str, key: &str, value: &str) -> String {
    let pattern = format!(r"\{{\{{\s*{}\s*\}}\}}", regex::escape(key));
    match Regex::new(&pattern) {
        Ok(placeholder) => placeholder.replace_all(text, NoExpand(value)).into_owned(),
        Err(_) => text.to_string(),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ComposerError {
    #[error("{0}")]
    Generation(String),

    #[error("Error saving iteration: {0}")]
    Store(#[from] StoreError),
}

/// The editable prompt setup
#[derive(Debug, Clone, PartialEq)]
pub struct Composer {
    pub template_name: String,
    pub prompt: String,
    pub user_example: String,
    pub model_example: String,
    pub variables: Vec<Variable>,
    pub settings: PromptSettings,
}

impl Default for Composer {
    fn default() -> Self {
        Self::from_template(crate::templates::default_template())
    }
}

impl Composer {
    pub fn from_template(template: &PromptTemplate) -> Self {
        let mut composer = Self {
            template_name: String::new(),
            prompt: String::new(),
            user_example: String::new(),
            model_example: String::new(),
            variables: Vec::new(),
            settings: PromptSettings::default(),
        };
        composer.load_template(template);
        composer
    }

    /// Reset prompt, examples and system instruction from a template.
    /// Variables and the remaining settings are kept.
    pub fn load_template(&mut self, template: &PromptTemplate) {
        self.template_name = template.name.to_string();
        self.prompt = template.prompt.to_string();
        self.user_example = template.user_example.to_string();
        self.model_example = template.model_example.to_string();
        self.settings.system_instruction = template.system.to_string();
    }

    /// Request for the current setup, variables applied everywhere
    pub fn to_request(&self, supervisor: &str) -> GenerationRequest {
        GenerationRequest::new(
            apply_variables(&self.prompt, &self.variables),
            build_system_instruction(&self.settings, supervisor),
            self.settings.temperature,
        )
        .with_few_shot(
            apply_variables(&self.user_example, &self.variables),
            apply_variables(&self.model_example, &self.variables),
        )
    }

    pub fn snapshot(&self) -> FileContent {
        FileContent {
            prompt: self.prompt.clone(),
            user_example: self.user_example.clone(),
            model_example: self.model_example.clone(),
            variables: self.variables.clone(),
            settings: self.settings.clone(),
        }
    }

    pub fn restore(&mut self, file: &VirtualFile) {
        let content = file.content.clone();
        self.template_name = file.name.clone();
        self.prompt = content.prompt;
        self.user_example = content.user_example;
        self.model_example = content.model_example;
        self.variables = content.variables;
        self.settings = content.settings;
    }

    /// Stream the current setup, forwarding every event to `events`, and
    /// save the completed run as a new iteration
    pub async fn run_prompt(
        &self,
        client: &StreamingClient,
        store: &Store,
        supervisor: &str,
        events: &mpsc::UnboundedSender<StreamEvent>,
    ) -> Result<Iteration, ComposerError> {
        bprintln!(info: "Initiating AI stream...");
        let request = self.to_request(supervisor);

        let (tx, mut rx) = mpsc::unbounded_channel();
        let producer = async {
            let record = client.stream(&request, &tx).await;
            drop(tx);
            record
        };
        let consumer = async {
            let mut terminal = None;
            while let Some(event) = rx.recv().await {
                if event.is_terminal() {
                    terminal = Some(event.clone());
                }
                let _ = events.send(event);
            }
            terminal
        };
        let (record, terminal) = tokio::join!(producer, consumer);

        let response = match terminal {
            Some(StreamEvent::Complete(text)) => text,
            Some(StreamEvent::Error(message)) => {
                bprintln!(error: "{}", message);
                return Err(ComposerError::Generation(message));
            }
            _ => return Err(ComposerError::Generation("Stream ended without a result".into())),
        };

        let iteration = Iteration {
            id: uuid::Uuid::new_v4().to_string(),
            prompt: self.prompt.clone(),
            user_example: self.user_example.clone(),
            model_example: self.model_example.clone(),
            full_prompt: record.full_prompt,
            response,
            settings: self.settings.clone(),
            variables: self.variables.clone(),
            timestamp: chrono::Utc::now(),
            bookmarked: false,
        };
        store.add_iteration(&iteration)?;
        bprintln!(info: "Stream complete. Iteration saved.");
        Ok(iteration)
    }
}

impl fmt::Display for Composer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Template:    {}", self.template_name)?;
        writeln!(f, "System:      {}", self.settings.system_instruction)?;
        writeln!(
            f,
            "Settings:    temperature {:.2}, formality {:?}, conciseness {:?}",
            self.settings.temperature, self.settings.formality, self.settings.conciseness
        )?;
        for variable in &self.variables {
            writeln!(f, "Variable:    {{{{{}}}}} = {}", variable.key, variable.value)?;
        }
        if !self.user_example.is_empty() {
            writeln!(f, "User ex.:    {}", self.user_example)?;
            writeln!(f, "Model ex.:   {}", self.model_example)?;
        }
        write!(f, "Prompt:      {}", self.prompt)
    }
}
