//! promptbench - prompt-engineering workbench
//!
//! Command-line front end over the `promptbench` library: single prompt runs,
//! interactive plan sessions, suggestions, image generation and a small
//! console over saved setups.

use std::io::{self, Write};
use std::sync::Arc;

use anyhow::{anyhow, bail, Context};
use clap::Parser;
use crossterm::{
    cursor, execute,
    style::{Color, Print, ResetColor, SetForegroundColor},
    terminal::{Clear, ClearType},
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

use promptbench::cli::{cli_to_config, Cli, Commands, SetupArgs};
use promptbench::composer::suggestions::{request_suggestion, SuggestionKind};
use promptbench::composer::{Composer, Variable};
use promptbench::config::{default_instructions_path, Config, Instructions};
use promptbench::console::{handle_command, ActivityLog, ConsoleOutcome};
use promptbench::constants::PLAN_HELP;
use promptbench::llm::image::{generate_images, write_images};
use promptbench::llm::retry_utils::RetryConfig;
use promptbench::llm::{create_backend, ImageRequest, StreamEvent, StreamingClient};
use promptbench::output::{OutputType, SharedBuffer, CURRENT_BUFFER};
use promptbench::preview::extract_preview;
use promptbench::store::{Iteration, Store, VirtualFile};
use promptbench::templates;
use promptbench::workflow::executor::{Observer, StepOutcome, WorkflowEvent};
use promptbench::workflow::{loader, WorkflowSession};

#[tokio::main]
async fn main() {
    // Load environment variables from .env file
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let config = cli_to_config(&cli, Config::from_env());

    let buffer = SharedBuffer::new(256);
    let result = CURRENT_BUFFER.scope(buffer.clone(), run(cli, config, buffer.clone())).await;
    flush_log(&buffer);

    if let Err(e) = result {
        let _ = execute!(
            io::stderr(),
            SetForegroundColor(Color::Red),
            Print(format!("Error: {:#}", e)),
            ResetColor,
            cursor::MoveToNextLine(1),
        );
        std::process::exit(1);
    }
}

async fn run(cli: Cli, config: Config, buffer: SharedBuffer) -> anyhow::Result<()> {
    let instructions_path = match &cli.instructions {
        Some(path) => path.clone(),
        None => default_instructions_path()?,
    };

    match cli.command {
        Commands::Run { setup, preview } => {
            let store = open_store(&config)?;
            let instructions = Instructions::load_or_default(instructions_path)?;
            let composer = build_composer(&setup, &store)?;
            let client = StreamingClient::new(create_backend(&config)?);
            install_interrupt_handler()?;

            let iteration = run_prompt(&composer, &client, &store, &instructions.supervisor, &buffer).await?;
            println!("Saved iteration {}", iteration.id);

            if let Some(dir) = preview {
                let state = extract_preview(&iteration.response)?;
                for path in state.write_to(&dir)? {
                    println!("Wrote {}", path.display());
                }
            }
        }
        Commands::Plan { goal, file, save } => {
            let instructions = Instructions::load_or_default(instructions_path)?;
            let client = StreamingClient::new(create_backend(&config)?);
            install_interrupt_handler()?;
            run_plan_session(&config, &instructions, client, goal, file, save, &buffer).await?;
        }
        Commands::Suggest { kind, setup, save } => {
            let store = open_store(&config)?;
            let mut composer = build_composer(&setup, &store)?;
            let backend = create_backend(&config)?;
            let suggestion = request_suggestion(backend.as_ref(), kind, &mut composer, &RetryConfig::default()).await;
            flush_log(&buffer);
            suggestion?;

            println!("{}", composer);
            if kind == SuggestionKind::Variables && composer.variables.is_empty() {
                println!("(no variables suggested)");
            }
            if let Some(name) = save {
                store.save_file(&VirtualFile {
                    name: name.clone(),
                    content: composer.snapshot(),
                })?;
                println!("File \"{}\" saved.", name);
            }
        }
        Commands::Image {
            prompt,
            count,
            aspect_ratio,
            out,
        } => {
            let backend = create_backend(&config)?;
            let request = ImageRequest::new(prompt, count, aspect_ratio)?;
            let images = generate_images(backend.as_ref(), &request).await?;
            flush_log(&buffer);
            for path in write_images(&images, &out)? {
                println!("Wrote {}", path.display());
            }
        }
        Commands::Console => {
            let store = open_store(&config)?;
            run_console(&store, &buffer).await?;
        }
        Commands::Iterations {
            bookmarked,
            show,
            bookmark,
        } => {
            let store = open_store(&config)?;
            if let Some(id) = bookmark {
                let iteration = store.toggle_bookmark(&id)?;
                let state = if iteration.bookmarked { "bookmarked" } else { "unbookmarked" };
                println!("Iteration {} {}", iteration.id, state);
            } else if let Some(id) = show {
                let iteration = store
                    .get_iteration(&id)?
                    .ok_or_else(|| anyhow!("Iteration not found: {}", id))?;
                print_iteration(&iteration);
            } else {
                let iterations = store.all_iterations()?;
                let shown: Vec<&Iteration> = iterations.iter().filter(|it| !bookmarked || it.bookmarked).collect();
                if shown.is_empty() {
                    println!("No iterations recorded.");
                }
                for iteration in shown {
                    println!(
                        "{} {} {} {}",
                        iteration.id,
                        iteration.timestamp.format("%Y-%m-%d %H:%M"),
                        if iteration.bookmarked { "*" } else { " " },
                        first_line(&iteration.prompt, 60)
                    );
                }
            }
        }
        Commands::Preview { iteration, out } => {
            let store = open_store(&config)?;
            let iteration = store
                .get_iteration(&iteration)?
                .ok_or_else(|| anyhow!("Iteration not found: {}", iteration))?;
            let state = extract_preview(&iteration.response)?;
            for path in state.write_to(&out)? {
                println!("Wrote {}", path.display());
            }
        }
        Commands::Templates => {
            for category in templates::categories() {
                println!("{}", category);
                for template in templates::TEMPLATES.iter().filter(|t| t.category == category) {
                    println!("  {}", template.name);
                }
            }
        }
        Commands::Instructions {
            orchestrator,
            supervisor,
            reset,
        } => {
            let mut instructions = Instructions::load_or_default(instructions_path)?;
            if reset {
                instructions.reset()?;
            }
            if let Some(text) = orchestrator {
                instructions.set_orchestrator(text)?;
            }
            if let Some(text) = supervisor {
                instructions.set_supervisor(text)?;
            }
            println!("File: {}", instructions.path().display());
            println!("\n[Orchestrator]\n{}", instructions.orchestrator);
            println!("\n[Supervisor]\n{}", instructions.supervisor);
        }
    }

    Ok(())
}

fn open_store(config: &Config) -> anyhow::Result<Store> {
    Store::open(&config.data_dir).with_context(|| format!("Failed to open store at {}", config.data_dir.display()))
}

fn install_interrupt_handler() -> anyhow::Result<()> {
    ctrlc::set_handler(move || {
        eprintln!("\nOperation interrupted by user");
        std::process::exit(130);
    })
    .context("Failed to set Ctrl+C handler")
}

/// Composer from a template or saved setup, with command-line overrides on top
fn build_composer(setup: &SetupArgs, store: &Store) -> anyhow::Result<Composer> {
    let mut composer = if let Some(name) = &setup.template {
        let template = templates::find(name).ok_or_else(|| anyhow!("Unknown template: {}", name))?;
        Composer::from_template(template)
    } else if let Some(name) = &setup.file {
        let file = store.get_file(name)?.ok_or_else(|| anyhow!("File not found: {}", name))?;
        let mut composer = Composer::default();
        composer.restore(&file);
        composer
    } else {
        Composer::default()
    };

    if let Some(prompt) = &setup.prompt {
        composer.prompt = prompt.clone();
    }
    if let Some(system) = &setup.system {
        composer.settings.system_instruction = system.clone();
    }
    if let Some(example) = &setup.user_example {
        composer.user_example = example.clone();
    }
    if let Some(example) = &setup.model_example {
        composer.model_example = example.clone();
    }
    if let Some(temperature) = setup.temperature {
        composer.settings.temperature = temperature;
    }
    if let Some(formality) = setup.formality {
        composer.settings.formality = formality;
    }
    if let Some(conciseness) = setup.conciseness {
        composer.settings.conciseness = conciseness;
    }
    for (key, value) in &setup.variables {
        match composer.variables.iter_mut().find(|v| &v.key == key) {
            Some(variable) => variable.value = value.clone(),
            None => composer.variables.push(Variable::new(key.clone(), value.clone())),
        }
    }
    Ok(composer)
}

async fn run_prompt(
    composer: &Composer,
    client: &StreamingClient,
    store: &Store,
    supervisor: &str,
    buffer: &SharedBuffer,
) -> anyhow::Result<Iteration> {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let producer = async move {
        let result = composer.run_prompt(client, store, supervisor, &tx).await;
        drop(tx);
        result
    };
    let renderer = async {
        let mut mid_line = false;
        while let Some(event) = rx.recv().await {
            flush_log(buffer);
            match event {
                StreamEvent::Chunk(text) => {
                    print_raw(&text);
                    mid_line = !text.ends_with('\n');
                }
                StreamEvent::Clear | StreamEvent::Complete(_) | StreamEvent::Error(_) => {
                    if mid_line {
                        print_raw("\n");
                        mid_line = false;
                    }
                }
            }
        }
    };
    let (result, ()) = tokio::join!(producer, renderer);
    flush_log(buffer);
    Ok(result?)
}

async fn run_plan_session(
    config: &Config,
    instructions: &Instructions,
    client: StreamingClient,
    goal: Option<String>,
    file: Option<String>,
    save: Option<String>,
    buffer: &SharedBuffer,
) -> anyhow::Result<()> {
    let printer = buffer.clone();
    let observer: Observer = Arc::new(move |event: &WorkflowEvent| render_workflow_event(&printer, event));
    let session = WorkflowSession::new(client, &instructions.orchestrator, &instructions.supervisor)
        .with_observer(observer);
    let plans_dir = loader::plans_dir(&config.data_dir);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    if let Some(name) = file {
        let (text, _) = loader::load_plan(&name, &plans_dir)?;
        session
            .load_plan_text(&text)
            .map_err(|issue| anyhow!("Plan is not usable: {}", issue))?;
    } else {
        let goal = match goal {
            Some(goal) => goal,
            None => {
                prompt_marker("goal> ")?;
                lines.next_line().await?.unwrap_or_default()
            }
        };
        let report = session.generate_plan(&goal).await?;
        flush_log(buffer);
        if let Some(error) = report.error {
            bail!("Plan generation failed: {}", error);
        }
        if report.definition.is_none() {
            let issue = report
                .issue
                .map(|issue| issue.display(true).to_string())
                .unwrap_or_else(|| "The response did not contain a plan".to_string());
            bail!("Plan is not usable: {}", issue);
        }
    }

    if let Some(name) = save {
        let path = loader::save_plan(&name, &session.plan_text(), &plans_dir)?;
        println!("Plan saved to {}", path.display());
    }

    print_plan_summary(&session);
    print_colored(Color::DarkGrey, PLAN_HELP);

    loop {
        prompt_marker(&match session.active_step() {
            Some(id) => format!("step {}> ", id),
            None => "plan> ".to_string(),
        })?;
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();

        let result = if line.is_empty() {
            continue;
        } else if line == ":quit" || line == ":q" {
            break;
        } else if line == ":help" {
            print_colored(Color::DarkGrey, PLAN_HELP);
            continue;
        } else if line == ":status" {
            print_plan_summary(&session);
            continue;
        } else if line == ":plan" {
            println!("{}", session.plan_text());
            continue;
        } else if let Some(rest) = line.strip_prefix(":run") {
            let rest = rest.trim();
            let (id, instruction) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
            match id.parse::<u32>() {
                Ok(id) => session.execute_step(id, instruction.trim()).await,
                Err(_) => {
                    print_colored(Color::Red, "Usage: :run <id> <text>");
                    continue;
                }
            }
        } else if line.starts_with(':') {
            print_colored(Color::Red, &format!("Unknown command: {}", line));
            continue;
        } else {
            session.execute_active(line).await
        };

        flush_log(buffer);
        match result {
            Ok(run) => match run.outcome {
                StepOutcome::Completed { .. } if session.is_finished() => {
                    print_colored(Color::Green, "All steps completed.");
                }
                StepOutcome::Completed { .. } | StepOutcome::Failed(_) => {}
                StepOutcome::Superseded => print_colored(Color::Yellow, "Step run was superseded by a new plan."),
            },
            Err(e) => print_colored(Color::Red, &e.to_string()),
        }
    }

    Ok(())
}

fn render_workflow_event(buffer: &SharedBuffer, event: &WorkflowEvent) {
    match event {
        WorkflowEvent::PlanChunk(text) | WorkflowEvent::StepChunk(_, text) => {
            flush_log(buffer);
            print_raw(text);
        }
        WorkflowEvent::PlanCleared | WorkflowEvent::StepCleared(_) => print_raw("\n"),
        WorkflowEvent::StepStarted(_) | WorkflowEvent::PlanReady(_) => flush_log(buffer),
        WorkflowEvent::PlanFinished { .. } | WorkflowEvent::StepCompleted { .. } | WorkflowEvent::StepFailed { .. } => {
            print_raw("\n");
            flush_log(buffer);
        }
    }
}

fn print_plan_summary(session: &WorkflowSession) {
    let Some(definition) = session.definition() else {
        print_colored(Color::Yellow, "No plan is loaded");
        return;
    };
    let snapshot = session.snapshot();

    print_colored(Color::Cyan, &format!("Plan: {}", definition.meta.flow_name));
    for step in &definition.steps {
        let status = snapshot
            .steps
            .get(step.id)
            .map(|s| s.status.to_string())
            .unwrap_or_default();
        println!("  {:>3}. [{:<9}] {} ({})", step.id, status, step.name, step.agent);
        if let Some(error) = snapshot.steps.get(step.id).and_then(|s| s.error.as_deref()) {
            print_colored(Color::Red, &format!("       {}", error));
        }
    }
}

async fn run_console(store: &Store, buffer: &SharedBuffer) -> anyhow::Result<()> {
    let mut composer = Composer::default();
    let mut log = ActivityLog::default();
    for line in log.lines() {
        println!("{}", line);
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        prompt_marker("$ ")?;
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let outcome = handle_command(&line, &mut composer, store, &mut log);
        if log.lines().is_empty() {
            buffer.drain();
            execute!(io::stdout(), Clear(ClearType::All), cursor::MoveTo(0, 0))?;
        }
        flush_log(buffer);
        if outcome == ConsoleOutcome::Exit {
            break;
        }
    }
    Ok(())
}

fn print_iteration(iteration: &Iteration) {
    print_colored(Color::Cyan, &format!("Iteration {}", iteration.id));
    println!("Timestamp:  {}", iteration.timestamp.to_rfc3339());
    println!("Bookmarked: {}", iteration.bookmarked);
    println!("Temperature: {:.2}", iteration.settings.temperature);
    for variable in &iteration.variables {
        println!("Variable:   {{{{{}}}}} = {}", variable.key, variable.value);
    }
    print_colored(Color::DarkGrey, "\n[Full prompt]");
    println!("{}", iteration.full_prompt);
    print_colored(Color::DarkGrey, "\n[Response]");
    println!("{}", iteration.response);
}

fn first_line(text: &str, max: usize) -> String {
    let line = text.lines().next().unwrap_or_default();
    if line.chars().count() > max {
        format!("{}...", line.chars().take(max).collect::<String>())
    } else {
        line.to_string()
    }
}

/// Only shown on an interactive terminal
fn prompt_marker(marker: &str) -> io::Result<()> {
    if atty::is(atty::Stream::Stdin) {
        execute!(
            io::stdout(),
            SetForegroundColor(Color::Green),
            Print(marker),
            ResetColor
        )?;
    }
    Ok(())
}

fn print_raw(text: &str) {
    let mut stdout = io::stdout();
    let _ = stdout.write_all(text.as_bytes());
    let _ = stdout.flush();
}

fn print_colored(color: Color, text: &str) {
    let _ = execute!(
        io::stdout(),
        SetForegroundColor(color),
        Print(text),
        ResetColor,
        Print("\n")
    );
}

/// Print queued log lines
fn flush_log(buffer: &SharedBuffer) {
    for line in buffer.drain() {
        let _ = match line.output_type {
            OutputType::Error => execute!(
                io::stderr(),
                SetForegroundColor(Color::Red),
                Print(&line.content),
                ResetColor,
                Print("\n")
            ),
            OutputType::Step(id) => execute!(
                io::stderr(),
                SetForegroundColor(Color::Cyan),
                Print(format!("[step {}] ", id)),
                ResetColor,
                Print(&line.content),
                Print("\n")
            ),
            OutputType::System => execute!(
                io::stderr(),
                SetForegroundColor(Color::Yellow),
                Print(&line.content),
                ResetColor,
                Print("\n")
            ),
            OutputType::Debug => execute!(
                io::stderr(),
                SetForegroundColor(Color::DarkGrey),
                Print(&line.content),
                ResetColor,
                Print("\n")
            ),
            OutputType::Standard => execute!(io::stdout(), Print(&line.content), Print("\n")),
        };
    }
}
