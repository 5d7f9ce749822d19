//! Command-line interface definition and argument parsing
//!
//! This module uses clap to define and parse command-line arguments.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::composer::suggestions::SuggestionKind;
use crate::composer::{Conciseness, Formality};
use crate::config::Config;
use crate::llm::AspectRatio;

/// Command-line arguments for promptbench
#[derive(Parser, Debug)]
#[command(
    name = "promptbench",
    about = "Prompt-engineering workbench with streamed generation and multi-agent plans",
    version,
    long_about = "promptbench composes prompts from templates, variables and few-shot examples, streams them through Gemini, keeps every run, and turns goals into executable multi-agent plans."
)]
pub struct Cli {
    /// Text model to use (overrides PROMPTBENCH_MODEL)
    #[arg(long, global = true)]
    pub model: Option<String>,

    /// Image model to use (overrides PROMPTBENCH_IMAGE_MODEL)
    #[arg(long, global = true)]
    pub image_model: Option<String>,

    /// Directory for iterations, saved setups and plans
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Instructions file (orchestrator and supervisor directive)
    #[arg(long, global = true)]
    pub instructions: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Where the composer setup for a command comes from
#[derive(Args, Debug, Clone, Default)]
pub struct SetupArgs {
    /// Start from a built-in template (see `templates`)
    #[arg(long, short = 't')]
    pub template: Option<String>,

    /// Start from a saved setup (see `console`)
    #[arg(long, short = 'f', conflicts_with = "template")]
    pub file: Option<String>,

    /// Replace the prompt text
    #[arg(long, short = 'p')]
    pub prompt: Option<String>,

    /// Replace the system instruction
    #[arg(long, short = 's')]
    pub system: Option<String>,

    /// Few-shot user example
    #[arg(long)]
    pub user_example: Option<String>,

    /// Few-shot model example
    #[arg(long)]
    pub model_example: Option<String>,

    /// Variable substitution for `{{key}}` placeholders
    #[arg(long = "var", short = 'v', value_name = "KEY=VALUE", value_parser = parse_variable)]
    pub variables: Vec<(String, String)>,

    #[arg(long)]
    pub temperature: Option<f32>,

    #[arg(long, value_enum)]
    pub formality: Option<Formality>,

    #[arg(long, value_enum)]
    pub conciseness: Option<Conciseness>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Stream a prompt and save the run as an iteration
    Run {
        #[command(flatten)]
        setup: SetupArgs,

        /// Also extract a component preview into this directory
        #[arg(long)]
        preview: Option<PathBuf>,
    },

    /// Generate a multi-agent plan and execute its steps interactively
    Plan {
        /// Goal for the orchestrator
        goal: Option<String>,

        /// Load an existing plan (path or saved plan name) instead of generating one
        #[arg(long, short = 'f', conflicts_with = "goal")]
        file: Option<String>,

        /// Save the plan text under this name once it is ready
        #[arg(long)]
        save: Option<String>,
    },

    /// Ask the model to improve part of a prompt setup
    Suggest {
        #[arg(value_enum)]
        kind: SuggestionKind,

        #[command(flatten)]
        setup: SetupArgs,

        /// Save the updated setup under this name
        #[arg(long)]
        save: Option<String>,
    },

    /// Generate images from a text prompt
    Image {
        prompt: String,

        /// Number of images (1-4)
        #[arg(long, short = 'n', default_value_t = 1)]
        count: u8,

        /// One of 1:1, 16:9, 9:16, 4:3, 3:4
        #[arg(long, default_value = "1:1")]
        aspect_ratio: AspectRatio,

        /// Output directory
        #[arg(long, short = 'o', default_value = ".")]
        out: PathBuf,
    },

    /// Interactive console over saved prompt setups
    Console,

    /// List recorded iterations
    Iterations {
        /// Only bookmarked iterations
        #[arg(long)]
        bookmarked: bool,

        /// Print one iteration in full
        #[arg(long, conflicts_with = "bookmark")]
        show: Option<String>,

        /// Toggle the bookmark on an iteration
        #[arg(long)]
        bookmark: Option<String>,
    },

    /// Extract a component preview from a recorded iteration
    Preview {
        iteration: String,

        #[arg(long, short = 'o', default_value = "preview")]
        out: PathBuf,
    },

    /// List built-in templates
    Templates,

    /// Show or change the orchestrator and supervisor instructions
    Instructions {
        #[arg(long)]
        orchestrator: Option<String>,

        #[arg(long)]
        supervisor: Option<String>,

        /// Restore both defaults
        #[arg(long, conflicts_with_all = ["orchestrator", "supervisor"])]
        reset: bool,
    },
}

/// Parse `key=value`
fn parse_variable(arg: &str) -> Result<(String, String), String> {
    match arg.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => Ok((key.trim().to_string(), value.to_string())),
        _ => Err(format!("Invalid variable '{}'. Expected KEY=VALUE", arg)),
    }
}

/// Apply command-line overrides on top of an environment-derived config
pub fn cli_to_config(cli: &Cli, mut config: Config) -> Config {
    if let Some(model) = &cli.model {
        config.model = model.clone();
    }
    if let Some(image_model) = &cli.image_model {
        config.image_model = image_model.clone();
    }
    if let Some(dir) = &cli.data_dir {
        config.data_dir = dir.clone();
    }
    config
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overrides() {
        let cli = Cli::parse_from(["promptbench", "--model", "gemini-2.0-flash", "templates"]);
        let config = cli_to_config(&cli, Config::new());
        assert_eq!(config.model, "gemini-2.0-flash");
        assert_eq!(config.image_model, Config::new().image_model);
    }

    #[test]
    fn test_run_setup_args() {
        let cli = Cli::parse_from([
            "promptbench",
            "run",
            "-t",
            "SQL: Complex Query",
            "--var",
            "table=sales",
            "--formality",
            "formal",
        ]);
        let Commands::Run { setup, preview } = cli.command else {
            panic!("expected run");
        };
        assert_eq!(setup.template.as_deref(), Some("SQL: Complex Query"));
        assert_eq!(setup.variables, vec![("table".to_string(), "sales".to_string())]);
        assert_eq!(setup.formality, Some(Formality::Formal));
        assert!(preview.is_none());
    }

    #[test]
    fn test_image_and_suggest() {
        let cli = Cli::parse_from(["promptbench", "image", "a cat", "-n", "3", "--aspect-ratio", "16:9"]);
        let Commands::Image { count, aspect_ratio, .. } = cli.command else {
            panic!("expected image");
        };
        assert_eq!(count, 3);
        assert_eq!(aspect_ratio, AspectRatio::Landscape);

        let cli = Cli::parse_from(["promptbench", "suggest", "vibe"]);
        assert!(matches!(cli.command, Commands::Suggest { kind: SuggestionKind::Vibe, .. }));
    }

    #[test]
    fn test_bad_variable() {
        assert!(parse_variable("novalue").is_err());
        assert!(parse_variable("=x").is_err());
        assert_eq!(parse_variable("k= v ").unwrap(), ("k".into(), " v ".into()));
    }
}
