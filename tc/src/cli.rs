//! CLI command definitions and subcommands

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::debug;

/// TaskChat - conversational task and calendar assistant
#[derive(Parser)]
#[command(
    name = "tc",
    about = "Turn chat messages into tasks and calendar entries",
    version = env!("CARGO_PKG_VERSION"),
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[arg(
        short = 'l',
        long = "log-level",
        global = true,
        help = "Log level (TRACE, DEBUG, INFO, WARN, ERROR)"
    )]
    pub log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// CLI subcommands
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Chat with the assistant interactively (default)
    Chat {
        /// User id the conversation belongs to
        #[arg(short, long, default_value = "local")]
        user: String,
    },

    /// Classify one message and show how it was understood
    Classify {
        /// Message text
        text: String,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// List stored tasks
    Tasks {
        /// User id whose tasks to show
        #[arg(short, long, default_value = "local")]
        user: String,

        /// Include completed tasks
        #[arg(short, long)]
        all: bool,
    },

    /// Print the effective configuration
    Config,
}

/// Where logs are written
pub fn get_log_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("taskchat")
        .join("logs")
        .join("taskchat.log")
}

/// Output format for the classify command
#[derive(Clone, Debug, Default, PartialEq)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        debug!(%s, "OutputFormat::from_str: called");
        match s.to_lowercase().as_str() {
            "text" | "plain" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => Err(format!("Unknown format: {}. Use: text or json", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_classify_json() {
        let cli = Cli::try_parse_from(["tc", "-l", "debug", "classify", "họp lúc 9h", "--format", "json"]).unwrap();
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
        match cli.command {
            Some(Command::Classify { text, format }) => {
                assert_eq!(text, "họp lúc 9h");
                assert_eq!(format, OutputFormat::Json);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_no_subcommand_is_allowed() {
        let cli = Cli::try_parse_from(["tc"]).unwrap();
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_unknown_format_rejected() {
        assert!("yaml".parse::<OutputFormat>().is_err());
    }
}
