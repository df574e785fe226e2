//! REPL session management

use std::sync::Arc;

use colored::Colorize;
use eyre::Result;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tracing::debug;

use crate::assistant::Assistant;

/// What to do after a REPL-local slash command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlashResult {
    Continue,
    Quit,
    /// Not a REPL command; send it to the assistant
    Forward,
}

/// Interactive chat session
pub struct ReplSession {
    assistant: Arc<Assistant>,
    user_id: String,
}

impl ReplSession {
    pub fn new(assistant: Arc<Assistant>, user_id: impl Into<String>) -> Self {
        Self {
            assistant,
            user_id: user_id.into(),
        }
    }

    /// Run the REPL main loop
    pub async fn run(&mut self) -> Result<()> {
        self.print_welcome();

        let mut rl = DefaultEditor::new().map_err(|e| eyre::eyre!("Failed to initialize readline: {}", e))?;

        loop {
            let readline = rl.readline(&format!("{} ", "you>".bright_cyan()));

            match readline {
                Ok(line) => {
                    let input = line.trim();
                    if input.is_empty() {
                        continue;
                    }
                    let _ = rl.add_history_entry(input);

                    match self.handle_slash_command(input) {
                        SlashResult::Continue => continue,
                        SlashResult::Quit => break,
                        SlashResult::Forward => {
                            debug!(user_id = %self.user_id, %input, "ReplSession: forwarding");
                            self.assistant.handle_and_send(&self.user_id, input).await;
                        }
                    }
                }
                Err(ReadlineError::Interrupted) => {
                    println!("^C");
                    continue;
                }
                Err(ReadlineError::Eof) => {
                    println!();
                    break;
                }
                Err(err) => {
                    return Err(eyre::eyre!("Readline error: {}", err));
                }
            }
        }

        println!("Tạm biệt!");
        Ok(())
    }

    fn print_welcome(&self) {
        println!();
        println!("{}", "TaskChat".bright_cyan().bold());
        println!("Chatting as {}", self.user_id.yellow());
        println!("Type {} for help, {} to quit", "/help".yellow(), "/quit".yellow());
        println!();
    }

    /// Handle commands that belong to the REPL itself
    pub fn handle_slash_command(&self, input: &str) -> SlashResult {
        let cmd = input.split_whitespace().next().unwrap_or("");
        match cmd {
            "/quit" | "/q" | "/exit" => SlashResult::Quit,
            "/whoami" => {
                println!("{}", self.user_id.dimmed());
                SlashResult::Continue
            }
            _ => SlashResult::Forward,
        }
    }
}
