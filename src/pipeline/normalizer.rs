use crate::completion::{CompletionClient, CompletionError, CompletionRequest, PromptTemplate};
use regex::Regex;
use std::sync::{Arc, LazyLock};

static PARAGRAPH_BREAK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n\s*\n").expect("valid paragraph regex"));

/// Cleans raw OCR output with one completion call per page.
#[derive(Clone)]
pub struct TextNormalizer {
    completion: Arc<dyn CompletionClient>,
}

impl TextNormalizer {
    /// Normalizer backed by `completion`.
    pub fn new(completion: Arc<dyn CompletionClient>) -> Self {
        Self { completion }
    }

    /// Return the cleaned text; blank input short-circuits to an empty string.
    pub async fn normalize(&self, raw_text: &str) -> Result<String, CompletionError> {
        if raw_text.trim().is_empty() {
            return Ok(String::new());
        }
        let cleaned = self
            .completion
            .complete(CompletionRequest::new(PromptTemplate::CleanOcrText).with("text", raw_text))
            .await?;
        tracing::debug!(
            raw_chars = raw_text.len(),
            cleaned_chars = cleaned.len(),
            "Normalized OCR text"
        );
        Ok(cleaned)
    }
}

/// Split text on blank lines, trimming each paragraph and dropping empty ones.
pub fn split_paragraphs(text: &str) -> Vec<String> {
    PARAGRAPH_BREAK
        .split(text)
        .map(str::trim)
        .filter(|paragraph| !paragraph.is_empty())
        .map(str::to_string)
        .collect()
}
