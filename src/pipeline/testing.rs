//! In-process collaborators shared by pipeline unit tests.

use crate::completion::{CompletionClient, CompletionError, CompletionRequest, PromptTemplate};
use crate::ocr::{OcrEngine, OcrError};
use async_trait::async_trait;
use serde_json::{Value, json};
use std::time::Duration;
use tokio::sync::Mutex;

type Script = Box<dyn Fn(&CompletionRequest) -> Result<String, CompletionError> + Send + Sync>;
type Delay = Box<dyn Fn(&CompletionRequest) -> Duration + Send + Sync>;

/// Completion client answering from a closure and recording every request.
pub(crate) struct ScriptedCompletion {
    script: Script,
    delay: Option<Delay>,
    log: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedCompletion {
    pub(crate) fn new(
        script: impl Fn(&CompletionRequest) -> Result<String, CompletionError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            script: Box::new(script),
            delay: None,
            log: Mutex::new(Vec::new()),
        }
    }

    /// Returns the value of the template's first variable.
    pub(crate) fn echo() -> Self {
        Self::new(|request| {
            let first = request.template.variables()[0];
            Ok(request.variable(first).unwrap_or_default().to_string())
        })
    }

    pub(crate) fn constant(text: &str) -> Self {
        let text = text.to_string();
        Self::new(move |_| Ok(text.clone()))
    }

    pub(crate) fn failing() -> Self {
        Self::new(|_| Self::outage())
    }

    /// The error every failing script returns.
    pub(crate) fn outage() -> Result<String, CompletionError> {
        Err(CompletionError::ProviderUnavailable("scripted outage".into()))
    }

    pub(crate) fn with_delay(
        mut self,
        delay: impl Fn(&CompletionRequest) -> Duration + Send + Sync + 'static,
    ) -> Self {
        self.delay = Some(Box::new(delay));
        self
    }

    pub(crate) async fn calls(&self) -> usize {
        self.log.lock().await.len()
    }

    pub(crate) async fn templates(&self) -> Vec<PromptTemplate> {
        self.log.lock().await.iter().map(|request| request.template).collect()
    }

    pub(crate) async fn requests(&self) -> Vec<CompletionRequest> {
        self.log.lock().await.clone()
    }
}

#[async_trait]
impl CompletionClient for ScriptedCompletion {
    async fn complete(&self, request: CompletionRequest) -> Result<String, CompletionError> {
        request.render()?;
        self.log.lock().await.push(request.clone());
        if let Some(delay) = &self.delay {
            tokio::time::sleep(delay(&request)).await;
        }
        (self.script)(&request)
    }
}

/// Plausible model output for every template.
///
/// Stage outputs include wrong page numbers, unknown page references, a fenced
/// document reply, an unknown title, and a single-document theme.
pub(crate) fn theme_script(request: &CompletionRequest) -> Result<String, CompletionError> {
    let output = match request.template {
        PromptTemplate::CleanOcrText => request.variable("text").unwrap_or_default().to_string(),
        PromptTemplate::RefineQuery => request.variable("question").unwrap_or_default().to_string(),
        PromptTemplate::GroundedAnswer => "I don't know.".to_string(),
        PromptTemplate::PageThemes => json!({
            "page_number": 99,
            "themes": [{
                "title": format!("Theme of page {}", request.variable("page_number").unwrap_or("?")),
                "summary": "summary",
                "evidence": [request.variable("page_text").unwrap_or_default()]
            }]
        })
        .to_string(),
        PromptTemplate::DocumentThemes => format!(
            "```json\n{}\n```",
            json!({
                "document_title": "ignored",
                "document_themes": [{
                    "title": "Merged",
                    "summary": "merged summary",
                    "page_references": [2, 1, 42, 1]
                }]
            })
        ),
        PromptTemplate::CrossDocumentThemes => {
            let keyed: Value = serde_json::from_str(request.variable("document_themes").unwrap_or("{}"))
                .map_err(|error| CompletionError::InvalidResponse(error.to_string()))?;
            let mut titles: Vec<Value> = keyed
                .as_object()
                .map(|map| {
                    map.values()
                        .map(|themes| themes["document_title"].clone())
                        .collect()
                })
                .unwrap_or_default();
            let first = titles.first().cloned().unwrap_or(Value::Null);
            titles.push(json!("ghost.pdf"));
            json!({
                "cross_document_themes": [
                    { "title": "Shared", "summary": "shared summary", "document_references": titles },
                    { "title": "Lonely", "summary": "one document", "document_references": [first] }
                ]
            })
            .to_string()
        }
    };
    Ok(output)
}

/// OCR engine that fails on images containing `marker` and reads the rest as UTF-8.
pub(crate) struct FailingOcr {
    marker: &'static str,
}

impl FailingOcr {
    pub(crate) fn on(marker: &'static str) -> Self {
        Self { marker }
    }
}

#[async_trait]
impl OcrEngine for FailingOcr {
    async fn recognize(&self, image: &[u8]) -> Result<String, OcrError> {
        let text = String::from_utf8_lossy(image).into_owned();
        if text.contains(self.marker) {
            return Err(OcrError::Failed {
                program: "scripted-ocr".into(),
                status: "exit status: 1".into(),
                stderr: "unreadable image".into(),
            });
        }
        Ok(text)
    }
}
