//! TaskChat - conversational task and calendar assistant
//!
//! CLI entry point: interactive chat, one-shot classification and task listing.

use std::fs;
use std::sync::Arc;

use clap::Parser;
use colored::Colorize;
use eyre::{Context, Result};
use tracing::{debug, info, warn};

use taskchat::assistant::{Assistant, Collaborators};
use taskchat::cli::{Cli, Command, OutputFormat, get_log_path};
use taskchat::clock::SystemClock;
use taskchat::config::Config;
use taskchat::llm::create_client;
use taskchat::nlu::{LlmNlu, OfflineNlu, RemoteNlu};
use taskchat::repl;
use taskchat::services::{ConsoleTransport, LoggingReminderScheduler, OfflineCalendarService};
use taskstore::{SqliteStore, TaskFilter, TaskOrder, TaskStore};

fn setup_logging(cli_log_level: Option<&str>, config_log_level: Option<&str>) -> Result<()> {
    // Logging isn't initialized yet, so nothing can be traced here
    let log_path = get_log_path();
    if let Some(log_dir) = log_path.parent() {
        fs::create_dir_all(log_dir).context("Failed to create log directory")?;
    }

    // Priority: CLI --log-level > config file > default (INFO)
    let level = match cli_log_level.or(config_log_level) {
        Some(s) => match s.to_uppercase().as_str() {
            "TRACE" => tracing::Level::TRACE,
            "DEBUG" => tracing::Level::DEBUG,
            "INFO" => tracing::Level::INFO,
            "WARN" | "WARNING" => tracing::Level::WARN,
            "ERROR" => tracing::Level::ERROR,
            _ => {
                eprintln!("Warning: Unknown log-level '{}', defaulting to INFO", s);
                tracing::Level::INFO
            }
        },
        None => tracing::Level::INFO,
    };

    let log_file = fs::File::create(&log_path).context("Failed to create log file")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Logging initialized (level: {:?})", level);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_log_level = Config::load_log_level(cli.config.as_ref());
    setup_logging(cli.log_level.as_deref(), config_log_level.as_deref()).context("Failed to setup logging")?;

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;

    debug!(command = ?cli.command, "main: dispatching command");
    match cli.command {
        Some(Command::Chat { user }) => cmd_chat(&config, &user).await,
        Some(Command::Classify { text, format }) => cmd_classify(&config, &text, format).await,
        Some(Command::Tasks { user, all }) => cmd_tasks(&config, &user, all),
        Some(Command::Config) => cmd_config(&config),
        None => {
            debug!("main: no command specified, starting chat");
            cmd_chat(&config, "local").await
        }
    }
}

/// Remote NLU when an LLM is configured, otherwise local rules only
fn build_nlu(config: &Config) -> Arc<dyn RemoteNlu> {
    match create_client(&config.llm) {
        Ok(client) => {
            info!(model = %config.llm.model, "build_nlu: remote NLU enabled");
            Arc::new(LlmNlu::new(client))
        }
        Err(e) => {
            warn!(error = %e, "build_nlu: remote NLU unavailable, using local rules only");
            Arc::new(OfflineNlu)
        }
    }
}

fn open_store(config: &Config) -> Result<SqliteStore> {
    SqliteStore::open(&config.storage.db_path)
        .with_context(|| format!("Failed to open task database {}", config.storage.db_path.display()))
}

fn build_assistant(config: &Config) -> Result<Assistant> {
    let deps = Collaborators {
        nlu: build_nlu(config),
        store: Arc::new(open_store(config)?),
        calendar: Arc::new(OfflineCalendarService::from_config(&config.services)),
        reminders: Arc::new(LoggingReminderScheduler::new()),
        transport: Arc::new(ConsoleTransport),
        clock: Arc::new(SystemClock),
    };
    Ok(Assistant::new(config, deps))
}

async fn cmd_chat(config: &Config, user: &str) -> Result<()> {
    debug!(%user, "cmd_chat: called");
    let assistant = Arc::new(build_assistant(config)?);
    repl::run_interactive(assistant, user).await
}

async fn cmd_classify(config: &Config, text: &str, format: OutputFormat) -> Result<()> {
    debug!(%text, ?format, "cmd_classify: called");
    let assistant = build_assistant(config)?;
    let outcome = assistant.classifier().classify(text, "cli", &[]).await;

    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
        return Ok(());
    }

    let result = &outcome.result;
    println!("{:<12} {:?}", "intent:".bold(), result.intent);
    println!("{:<12} {}", "source:".bold(), result.source);
    println!("{:<12} {:.2}", "confidence:".bold(), result.confidence());
    if !result.fields.is_empty() {
        println!("{:<12} {}", "fields:".bold(), serde_json::to_string(&result.fields)?);
    }
    if !result.reasoning.is_empty() {
        println!("{:<12} {}", "reasoning:".bold(), result.reasoning.dimmed());
    }
    let stages: Vec<String> = outcome.diagnostics.stages.iter().map(|s| format!("{:?}", s)).collect();
    println!("{:<12} {} ({} ms)", "stages:".bold(), stages.join(" → "), outcome.diagnostics.elapsed_ms);
    if let Some(reply) = &outcome.canned_reply {
        println!("{:<12} {}", "reply:".bold(), reply);
    }
    Ok(())
}

fn cmd_tasks(config: &Config, user: &str, all: bool) -> Result<()> {
    debug!(%user, all, "cmd_tasks: called");
    let store = open_store(config)?;
    let filter = if all {
        TaskFilter::for_user(user)
    } else {
        TaskFilter::open_for_user(user)
    };
    let tasks = store.query_tasks(&filter, TaskOrder::Due)?;
    if tasks.is_empty() {
        println!("{}", "No tasks.".dimmed());
        return Ok(());
    }
    for (i, task) in tasks.iter().enumerate() {
        let when = match (task.due_date, task.effective_start()) {
            (Some(d), Some(t)) => format!("{} {}", d.format("%Y-%m-%d"), t.format("%H:%M")),
            (Some(d), None) => d.format("%Y-%m-%d").to_string(),
            (None, _) => "-".to_string(),
        };
        let mark = if task.completed { "✓".green() } else { " ".normal() };
        println!(
            "{:>3}. {} {:<16} {:<9} {}",
            i + 1,
            mark,
            when,
            task.task_type.as_str().cyan(),
            task.title
        );
    }
    Ok(())
}

fn cmd_config(config: &Config) -> Result<()> {
    println!("{}", serde_yaml::to_string(config)?);
    println!("{} {}", "Logs:".dimmed(), get_log_path().display());
    Ok(())
}
