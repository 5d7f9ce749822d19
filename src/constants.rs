//! Defaults, fixed texts and ANSI styles for log labels

pub const FORMAT_RESET: &str = "\x1b[0m";
pub const FORMAT_BOLD: &str = "\x1b[1m";
pub const FORMAT_RED: &str = "\x1b[31m";
pub const FORMAT_YELLOW: &str = "\x1b[33m";
pub const FORMAT_MAGENTA: &str = "\x1b[35m";
pub const FORMAT_CYAN: &str = "\x1b[36m";

/// Text model used when nothing else is configured
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

/// Image model used when nothing else is configured
pub const DEFAULT_IMAGE_MODEL: &str = "imagen-3.0-generate-002";

/// Temperature for one-shot suggestion calls
pub const SUGGESTION_TEMPERATURE: f32 = 0.8;

/// Directory name used under the platform config/data directories
pub const APP_DIR_NAME: &str = "promptbench";

/// Default system persona for plan generation
pub const DEFAULT_ORCHESTRATOR_INSTRUCTION: &str = "You are ANDIE, a master AI orchestrator. Your sole purpose is to create flawless, efficient YAML execution plans for a family of specialized AI agents. Analyze the user request and generate a plan. Be precise. Be perfect.";

/// Default directive prefixed to every system instruction
pub const DEFAULT_SUPERVISOR_INSTRUCTION: &str = "Your responses must be professional, accurate, and tailored to a senior engineering audience. Adhere strictly to the requested format. Double-check your work for clarity and correctness before finalizing the output.";

/// First line shown in the console log
pub const CONSOLE_WELCOME: &str = "Welcome to promptbench! Type `help` for a list of commands.";

// Templates for help and usage
pub const CONSOLE_HELP: &str = "Available commands:
  help          - Show this help message
  clear         - Clear the console
  ls            - List saved prompt files
  save <name>   - Save the current prompt setup
  load <name>   - Load a prompt setup
  rm <name>     - Remove a prompt setup
  cat <name>    - Display the contents of a saved prompt
  exit          - Leave the console";

pub const PLAN_HELP: &str = "Plan commands:
  <text>             - Delegate the active step with <text> as the instruction
  :run <id> <text>   - Execute a specific step (re-execution is allowed)
  :status            - Show the state of every step
  :plan              - Print the raw plan text
  :quit              - Leave the plan session";
