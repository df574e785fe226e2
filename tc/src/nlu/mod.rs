//! Remote natural-language understanding
//!
//! The classifier only calls out here when local rules are not confident
//! enough. Every call runs under the caller's timeout and every error is
//! absorbed by the classifier's fallback chain.

use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use thiserror::Error;

use crate::domain::{ParseResult, TaskField, TaskInfo};
use crate::llm::LlmError;

mod llm_nlu;
pub mod prompts;

pub use llm_nlu::{LlmNlu, parse_json_object};

#[derive(Debug, Error)]
pub enum NluError {
    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Remote NLU timed out after {0:?}")]
    Timeout(Duration),

    #[error("Could not parse NLU response: {0}")]
    Parse(String),

    #[error("Prompt error: {0}")]
    Prompt(String),

    #[error("Remote NLU is not configured")]
    Unavailable,
}

/// Remote collaborator that understands free text
#[async_trait]
pub trait RemoteNlu: Send + Sync {
    /// Classify a whole message and extract task fields
    async fn extract_task(&self, text: &str, history: &[String], today: NaiveDate) -> Result<ParseResult, NluError>;

    /// Interpret a reply to a question about one field
    async fn parse_field(
        &self,
        text: &str,
        field: TaskField,
        context: &TaskInfo,
        today: NaiveDate,
    ) -> Result<ParseResult, NluError>;
}

/// Stand-in used when no remote NLU is configured
#[derive(Debug, Default, Clone, Copy)]
pub struct OfflineNlu;

#[async_trait]
impl RemoteNlu for OfflineNlu {
    async fn extract_task(&self, _text: &str, _history: &[String], _today: NaiveDate) -> Result<ParseResult, NluError> {
        Err(NluError::Unavailable)
    }

    async fn parse_field(
        &self,
        _text: &str,
        _field: TaskField,
        _context: &TaskInfo,
        _today: NaiveDate,
    ) -> Result<ParseResult, NluError> {
        Err(NluError::Unavailable)
    }
}
