//! Interactive chat REPL
//!
//! Reads lines with rustyline and feeds them to the assistant as if they
//! arrived over a chat channel; replies go out through the transport.

mod session;

pub use session::{ReplSession, SlashResult};

use std::sync::Arc;

use eyre::Result;

use crate::assistant::Assistant;

/// Run the interactive chat for one user
pub async fn run_interactive(assistant: Arc<Assistant>, user_id: &str) -> Result<()> {
    let mut session = ReplSession::new(assistant, user_id);
    session.run().await
}
