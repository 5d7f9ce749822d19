//! Console command handling
//!
//! A small shell over the store and the composer: list, save, load, remove
//! and print saved prompt setups. Every result is written to the activity
//! log as plain lines.

use crate::composer::Composer;
use crate::constants::{CONSOLE_HELP, CONSOLE_WELCOME};
use crate::store::{Store, StoreError, VirtualFile};

/// Parsed console input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    Empty,
    Help,
    Clear,
    List,
    Save(Option<String>),
    Load(Option<String>),
    Remove(Option<String>),
    Cat(Option<String>),
    Exit,
    Unknown(String),
}

impl ConsoleCommand {
    pub fn parse(input: &str) -> Self {
        let mut parts = input.split_whitespace();
        let Some(command) = parts.next() else {
            return ConsoleCommand::Empty;
        };
        let name = parts.next().map(str::to_string);

        match command.to_lowercase().as_str() {
            "help" => ConsoleCommand::Help,
            "clear" => ConsoleCommand::Clear,
            "ls" => ConsoleCommand::List,
            "save" => ConsoleCommand::Save(name),
            "load" => ConsoleCommand::Load(name),
            "rm" => ConsoleCommand::Remove(name),
            "cat" => ConsoleCommand::Cat(name),
            "exit" | "quit" => ConsoleCommand::Exit,
            _ => ConsoleCommand::Unknown(command.to_string()),
        }
    }
}

/// Lines shown in the console, oldest first
#[derive(Debug, Clone)]
pub struct ActivityLog {
    lines: Vec<String>,
}

impl Default for ActivityLog {
    fn default() -> Self {
        Self {
            lines: vec![CONSOLE_WELCOME.to_string()],
        }
    }
}

impl ActivityLog {
    pub fn push(&mut self, line: impl Into<String>) {
        let line = line.into();
        bprintln!("{}", line);
        self.lines.push(line);
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn last(&self) -> Option<&str> {
        self.lines.last().map(String::as_str)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleOutcome {
    Continue,
    Exit,
}

/// Run one line of console input
pub fn handle_command(input: &str, composer: &mut Composer, store: &Store, log: &mut ActivityLog) -> ConsoleOutcome {
    let input = input.trim();
    let command = ConsoleCommand::parse(input);
    if command == ConsoleCommand::Empty {
        return ConsoleOutcome::Continue;
    }
    log.push(format!("> {}", input));

    match run(command, composer, store, log) {
        Ok(outcome) => outcome,
        Err(e) => {
            log.push(format!("Error executing command: {}", e));
            ConsoleOutcome::Continue
        }
    }
}

fn run(
    command: ConsoleCommand,
    composer: &mut Composer,
    store: &Store,
    log: &mut ActivityLog,
) -> Result<ConsoleOutcome, StoreError> {
    match command {
        ConsoleCommand::Empty => {}
        ConsoleCommand::Help => log.push(CONSOLE_HELP),
        ConsoleCommand::Clear => log.clear(),
        ConsoleCommand::Exit => return Ok(ConsoleOutcome::Exit),
        ConsoleCommand::List => {
            let files = store.all_files()?;
            if files.is_empty() {
                log.push("No files saved.");
            } else {
                let listing: Vec<String> = files.iter().map(|f| format!("  - {}", f.name)).collect();
                log.push(format!("Saved files:\n{}", listing.join("\n")));
            }
        }
        ConsoleCommand::Save(None) => log.push("Usage: save <filename>"),
        ConsoleCommand::Save(Some(name)) => {
            store.save_file(&VirtualFile {
                name: name.clone(),
                content: composer.snapshot(),
            })?;
            log.push(format!("File \"{}\" saved.", name));
        }
        ConsoleCommand::Load(None) => log.push("Usage: load <filename>"),
        ConsoleCommand::Load(Some(name)) => match store.get_file(&name)? {
            Some(file) => {
                composer.restore(&file);
                log.push(format!("File \"{}\" loaded.", name));
            }
            None => log.push(format!("File not found: {}", name)),
        },
        ConsoleCommand::Remove(None) => log.push("Usage: rm <filename>"),
        ConsoleCommand::Remove(Some(name)) => {
            if store.delete_file(&name)? {
                log.push(format!("File \"{}\" removed.", name));
            } else {
                log.push(format!("File not found: {}", name));
            }
        }
        ConsoleCommand::Cat(None) => log.push("Usage: cat <filename>"),
        ConsoleCommand::Cat(Some(name)) => match store.get_file(&name)? {
            Some(file) => log.push(file.render()),
            None => log.push(format!("File not found: {}", name)),
        },
        ConsoleCommand::Unknown(cmd) => log.push(format!(
            "Command not found: {}. Type 'help' for a list of commands.",
            cmd
        )),
    }
    Ok(ConsoleOutcome::Continue)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn setup(name: &str) -> (Composer, Store, ActivityLog) {
        let root = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("target")
            .join("test-scratch")
            .join(format!("{}-{}", name, uuid::Uuid::new_v4()));
        (Composer::default(), Store::open(root).unwrap(), ActivityLog::default())
    }

    #[test]
    fn test_parse() {
        assert_eq!(ConsoleCommand::parse("   "), ConsoleCommand::Empty);
        assert_eq!(ConsoleCommand::parse("LS"), ConsoleCommand::List);
        assert_eq!(ConsoleCommand::parse("save  draft extra"), ConsoleCommand::Save(Some("draft".into())));
        assert_eq!(ConsoleCommand::parse("cat"), ConsoleCommand::Cat(None));
        assert_eq!(ConsoleCommand::parse("rmdir x"), ConsoleCommand::Unknown("rmdir".into()));
    }

    #[test]
    fn test_missing_name_prints_usage() {
        let (mut composer, store, mut log) = setup("console-usage");
        for (input, usage) in [
            ("save", "Usage: save <filename>"),
            ("load", "Usage: load <filename>"),
            ("rm", "Usage: rm <filename>"),
            ("cat", "Usage: cat <filename>"),
        ] {
            handle_command(input, &mut composer, &store, &mut log);
            assert_eq!(log.last(), Some(usage));
        }
    }

    #[test]
    fn test_unknown_command() {
        let (mut composer, store, mut log) = setup("console-unknown");
        handle_command("frobnicate now", &mut composer, &store, &mut log);
        assert_eq!(
            log.lines()[log.lines().len() - 2..],
            [
                "> frobnicate now".to_string(),
                "Command not found: frobnicate. Type 'help' for a list of commands.".to_string()
            ]
        );
    }

    #[test]
    fn test_save_load_rm_cycle() {
        let (mut composer, store, mut log) = setup("console-cycle");
        composer.prompt = "saved prompt".into();

        handle_command("save mine", &mut composer, &store, &mut log);
        assert_eq!(log.last(), Some("File \"mine\" saved."));

        handle_command("ls", &mut composer, &store, &mut log);
        assert_eq!(log.last(), Some("Saved files:\n  - mine"));

        composer.prompt = "changed".into();
        handle_command("load mine", &mut composer, &store, &mut log);
        assert_eq!(composer.prompt, "saved prompt");
        assert_eq!(composer.template_name, "mine");

        handle_command("cat mine", &mut composer, &store, &mut log);
        assert!(log.last().unwrap().starts_with("---- BEGIN mine ----"));

        handle_command("rm mine", &mut composer, &store, &mut log);
        assert_eq!(log.last(), Some("File \"mine\" removed."));
        handle_command("load mine", &mut composer, &store, &mut log);
        assert_eq!(log.last(), Some("File not found: mine"));

        handle_command("ls", &mut composer, &store, &mut log);
        assert_eq!(log.last(), Some("No files saved."));
    }

    #[test]
    fn test_invalid_name_reports_error_and_clear_empties_log() {
        let (mut composer, store, mut log) = setup("console-invalid");
        handle_command("save ..", &mut composer, &store, &mut log);
        assert_eq!(log.last(), Some("Error executing command: Invalid file name: '..'"));

        handle_command("clear", &mut composer, &store, &mut log);
        assert!(log.lines().is_empty());
        assert_eq!(
            handle_command("exit", &mut composer, &store, &mut log),
            ConsoleOutcome::Exit
        );
    }
}
