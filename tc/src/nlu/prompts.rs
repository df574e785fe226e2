//! Embedded prompt templates
//!
//! Compiled into the binary from `.pmt` files and rendered with Handlebars.

use handlebars::Handlebars;
use serde::Serialize;
use tracing::debug;

use super::NluError;

/// Task extraction prompt
pub const EXTRACT: &str = include_str!("../../prompts/extract.pmt");

/// Single-field follow-up prompt
pub const FIELD: &str = include_str!("../../prompts/field.pmt");

/// Get the embedded prompt by name
pub fn get_embedded(name: &str) -> Option<&'static str> {
    debug!(%name, "get_embedded: called");
    match name {
        "extract" => Some(EXTRACT),
        "field" => Some(FIELD),
        _ => {
            debug!("get_embedded: no match found");
            None
        }
    }
}

/// Variables for the extraction prompt
#[derive(Debug, Serialize)]
pub struct ExtractContext {
    pub today: String,
    pub weekday: String,
    pub history: Vec<String>,
}

/// Variables for the field prompt
#[derive(Debug, Serialize)]
pub struct FieldContext {
    pub today: String,
    pub weekday: String,
    pub field: String,
    pub task_type: String,
    pub title: String,
}

/// Renders embedded templates
pub struct PromptRenderer {
    hbs: Handlebars<'static>,
}

impl Default for PromptRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl PromptRenderer {
    pub fn new() -> Self {
        let mut hbs = Handlebars::new();
        // Prompts are plain text, not HTML
        hbs.register_escape_fn(handlebars::no_escape);
        Self { hbs }
    }

    pub fn render<T: Serialize>(&self, name: &str, context: &T) -> Result<String, NluError> {
        debug!(%name, "PromptRenderer::render: called");
        let template = get_embedded(name).ok_or_else(|| NluError::Prompt(format!("template not found: {}", name)))?;
        self.hbs
            .render_template(template, context)
            .map_err(|e| NluError::Prompt(format!("failed to render {}: {}", name, e)))
    }
}
