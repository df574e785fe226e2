//! Classification results

use serde::{Deserialize, Serialize};

use super::{CommandRequest, ExtractedFields};

/// Which pipeline stage produced a result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParseSource {
    Pattern,
    Cache,
    Remote,
    Fallback,
}

impl std::fmt::Display for ParseSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pattern => "pattern",
            Self::Cache => "cache",
            Self::Remote => "remote",
            Self::Fallback => "fallback",
        };
        write!(f, "{}", s)
    }
}

/// What the message asks for
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Intent {
    /// Create a task or calendar entry
    CreateTask,
    /// Explicit or natural-language command
    Command(CommandRequest),
    /// Field-mode reply carrying a value
    Provide,
    /// Field-mode reply declining to give a value
    Skip,
    /// Chit-chat, greeting or question
    NotTask,
    Unclear,
}

impl Intent {
    pub fn is_task(&self) -> bool {
        matches!(self, Self::CreateTask)
    }
}

/// Extracted fields plus how much to trust them
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParseResult {
    pub intent: Intent,
    pub fields: ExtractedFields,
    confidence: f64,
    pub source: ParseSource,
    pub reasoning: String,
}

impl ParseResult {
    pub fn new(
        intent: Intent,
        fields: ExtractedFields,
        confidence: f64,
        source: ParseSource,
        reasoning: impl Into<String>,
    ) -> Self {
        Self {
            intent,
            fields,
            confidence: clamp_confidence(confidence),
            source,
            reasoning: reasoning.into(),
        }
    }

    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    pub fn set_confidence(&mut self, confidence: f64) {
        self.confidence = clamp_confidence(confidence);
    }

    pub fn with_source(mut self, source: ParseSource) -> Self {
        self.source = source;
        self
    }
}

/// Clamp into [0, 1]; NaN becomes 0
pub fn clamp_confidence(value: f64) -> f64 {
    if value.is_nan() { 0.0 } else { value.clamp(0.0, 1.0) }
}
