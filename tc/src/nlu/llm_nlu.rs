//! RemoteNlu backed by an LlmClient

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime};
use serde::Deserialize;
use taskstore::TaskType;
use tracing::{debug, warn};

use super::prompts::{ExtractContext, FieldContext, PromptRenderer};
use super::{NluError, RemoteNlu};
use crate::domain::{ExtractedFields, Intent, ParseResult, ParseSource, TaskField, TaskInfo};
use crate::llm::{CompletionRequest, LlmClient, Message};

const EXTRACT_MAX_TOKENS: u32 = 400;
const FIELD_MAX_TOKENS: u32 = 300;

/// Fields the model may return; every key is optional
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RemoteExtraction {
    is_task: Option<bool>,
    skip: bool,
    task_type: Option<String>,
    title: Option<String>,
    description: Option<String>,
    date: Option<String>,
    start_time: Option<String>,
    end_time: Option<String>,
    location: Option<String>,
    attendees: Vec<String>,
    confidence: Option<f64>,
    reasoning: Option<String>,
}

impl RemoteExtraction {
    /// Convert loosely typed model output, dropping values that do not parse
    fn into_fields(self) -> ExtractedFields {
        ExtractedFields {
            title: non_empty(self.title),
            description: non_empty(self.description),
            date: self
                .date
                .as_deref()
                .and_then(|d| NaiveDate::parse_from_str(d.trim(), "%Y-%m-%d").ok()),
            start_time: self.start_time.as_deref().and_then(parse_hhmm),
            end_time: self.end_time.as_deref().and_then(parse_hhmm),
            location: non_empty(self.location),
            attendees: self
                .attendees
                .into_iter()
                .map(|a| a.trim().to_string())
                .filter(|a| !a.is_empty())
                .collect(),
            task_type: self.task_type.as_deref().and_then(|t| t.parse::<TaskType>().ok()),
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn parse_hhmm(value: &str) -> Option<NaiveTime> {
    let value = value.trim();
    NaiveTime::parse_from_str(value, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M:%S"))
        .ok()
}

/// Pull the first JSON object out of a model reply
///
/// Models sometimes wrap JSON in prose or code fences; take the span between
/// the first '{' and the last '}'.
pub fn parse_json_object<T: for<'de> Deserialize<'de>>(text: &str) -> Result<T, NluError> {
    let start = text.find('{');
    let end = text.rfind('}');
    match (start, end) {
        (Some(s), Some(e)) if s < e => {
            serde_json::from_str(&text[s..=e]).map_err(|err| NluError::Parse(format!("invalid JSON: {}", err)))
        }
        _ => Err(NluError::Parse("no JSON object in response".to_string())),
    }
}

/// LLM-backed NLU
pub struct LlmNlu {
    client: Arc<dyn LlmClient>,
    renderer: PromptRenderer,
}

impl LlmNlu {
    pub fn new(client: Arc<dyn LlmClient>) -> Self {
        Self {
            client,
            renderer: PromptRenderer::new(),
        }
    }

    async fn ask(&self, system_prompt: String, messages: Vec<Message>, max_tokens: u32) -> Result<RemoteExtraction, NluError> {
        let request = CompletionRequest {
            system_prompt,
            messages,
            max_tokens,
            json_mode: true,
        };
        let response = self.client.complete(request).await?;
        let content = response
            .content
            .ok_or_else(|| NluError::Parse("empty response".to_string()))?;
        debug!(len = content.len(), tokens = response.usage.total(), "LlmNlu::ask: got response");
        parse_json_object(&content)
    }
}

#[async_trait]
impl RemoteNlu for LlmNlu {
    async fn extract_task(&self, text: &str, history: &[String], today: NaiveDate) -> Result<ParseResult, NluError> {
        debug!(%text, history = history.len(), "LlmNlu::extract_task: called");
        let ctx = ExtractContext {
            today: today.format("%Y-%m-%d").to_string(),
            weekday: today.format("%A").to_string(),
            history: history.to_vec(),
        };
        let prompt = self.renderer.render("extract", &ctx)?;
        let raw = self.ask(prompt, vec![Message::user(text)], EXTRACT_MAX_TOKENS).await?;

        let is_task = raw.is_task.unwrap_or(false);
        let confidence = raw.confidence.unwrap_or(if is_task { 0.7 } else { 0.5 });
        let reasoning = raw.reasoning.clone().unwrap_or_else(|| "remote extraction".to_string());
        let mut fields = raw.into_fields();

        let intent = if is_task {
            if fields.title.is_none() {
                warn!("LlmNlu::extract_task: task without title, using message text");
                fields.title = Some(text.trim().to_string());
            }
            Intent::CreateTask
        } else {
            Intent::NotTask
        };

        Ok(ParseResult::new(intent, fields, confidence, ParseSource::Remote, reasoning))
    }

    async fn parse_field(
        &self,
        text: &str,
        field: TaskField,
        context: &TaskInfo,
        today: NaiveDate,
    ) -> Result<ParseResult, NluError> {
        debug!(%text, %field, "LlmNlu::parse_field: called");
        let ctx = FieldContext {
            today: today.format("%Y-%m-%d").to_string(),
            weekday: today.format("%A").to_string(),
            field: field.to_string(),
            task_type: context.task_type.to_string(),
            title: context.title.clone(),
        };
        let prompt = self.renderer.render("field", &ctx)?;
        let raw = self.ask(prompt, vec![Message::user(text)], FIELD_MAX_TOKENS).await?;

        let skip = raw.skip;
        let confidence = raw.confidence.unwrap_or(0.6);
        let reasoning = raw.reasoning.clone().unwrap_or_else(|| "remote field parse".to_string());
        let fields = raw.into_fields();

        let intent = if skip {
            Intent::Skip
        } else if fields.provides(field) {
            Intent::Provide
        } else {
            Intent::Unclear
        };

        Ok(ParseResult::new(intent, fields, confidence, ParseSource::Remote, reasoning))
    }
}
