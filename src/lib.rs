//! promptbench: prompt-engineering workbench
//!
//! Composes prompts (templates, variables, few-shot examples, tone
//! settings), streams them through a text-generation backend with a
//! rate-limit retry envelope, records every run, and turns goals into
//! multi-agent plans whose steps execute one at a time.

#[macro_use]
mod macros;

pub mod cli;
pub mod composer;
pub mod config;
pub mod console;
pub mod constants;
pub mod llm;
pub mod markdown;
pub mod output;
pub mod preview;
pub mod serde_utils;
pub mod store;
pub mod templates;
pub mod workflow;
