//! Three-stage theme synthesis: per page, per document, and across documents.
//!
//! Every stage output is parsed into its typed record before the next stage sees it. Stage A
//! fans out over pages with bounded concurrency and keeps input page order. Stage C runs only
//! when at least two documents resolved.

use super::types::ThemeError;
use crate::completion::{CompletionClient, CompletionRequest, PromptTemplate};
use crate::model::{Document, Page};
use futures_util::future::BoxFuture;
use futures_util::{FutureExt, StreamExt, TryStreamExt, stream};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// One theme found on a page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageTheme {
    /// Short theme name.
    pub title: String,
    /// One or two sentence description.
    pub summary: String,
    /// Quotes from the page supporting the theme.
    #[serde(default)]
    pub evidence: Vec<String>,
}

/// Stage A output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageThemes {
    /// Page the themes were extracted from.
    #[serde(default)]
    pub page_number: u32,
    /// Themes on the page.
    pub themes: Vec<PageTheme>,
}

/// One theme merged across a document's pages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentTheme {
    /// Short theme name.
    pub title: String,
    /// Merged description.
    pub summary: String,
    /// Pages contributing evidence.
    #[serde(default, deserialize_with = "page_numbers")]
    pub page_references: Vec<u32>,
}

/// Stage B output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentThemes {
    /// Document filename.
    #[serde(default)]
    pub document_title: String,
    /// Themes of the document.
    pub document_themes: Vec<DocumentTheme>,
}

/// One theme shared by several documents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrossDocumentTheme {
    /// Short theme name.
    pub title: String,
    /// Description of the shared theme.
    pub summary: String,
    /// Titles of the supporting documents.
    #[serde(default)]
    pub document_references: Vec<String>,
}

/// Stage C output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrossDocumentThemes {
    /// Themes supported by two or more documents.
    pub cross_document_themes: Vec<CrossDocumentTheme>,
}

/// Final report: document themes for a single document, shared themes otherwise.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ThemeReport {
    /// Exactly one document resolved.
    Document(DocumentThemes),
    /// Two or more documents resolved.
    CrossDocument(CrossDocumentThemes),
}

/// Accept page references as numbers or numeric strings; anything else is dropped.
fn page_numbers<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u32>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum PageRef {
        Number(u32),
        Text(String),
        Other(Value),
    }

    Ok(Vec::<PageRef>::deserialize(deserializer)?
        .into_iter()
        .filter_map(|reference| match reference {
            PageRef::Number(number) => Some(number),
            PageRef::Text(text) => text.trim().parse().ok(),
            PageRef::Other(_) => None,
        })
        .collect())
}

/// Remove a Markdown code fence (with optional language tag) around the payload.
fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let body = rest.split_once('\n').map_or("", |(_, body)| body);
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

fn parse_stage<T: DeserializeOwned>(template: PromptTemplate, raw: &str) -> Result<T, ThemeError> {
    let body = strip_code_fence(raw);
    serde_json::from_str(body)
        .or_else(|error| match (body.find('{'), body.rfind('}')) {
            (Some(start), Some(end)) if start < end => serde_json::from_str(&body[start..=end]),
            _ => Err(error),
        })
        .map_err(|error| ThemeError::MalformedStageOutput {
            stage: template.id(),
            reason: error.to_string(),
        })
}

/// Runs the staged prompt chain over stored documents.
pub struct ThemeSynthesizer {
    completion: Arc<dyn CompletionClient>,
    page_concurrency: usize,
}

impl ThemeSynthesizer {
    /// Synthesizer allowing `page_concurrency` Stage A calls in flight per document.
    pub fn new(completion: Arc<dyn CompletionClient>, page_concurrency: usize) -> Self {
        Self {
            completion,
            page_concurrency: page_concurrency.max(1),
        }
    }

    /// Report for already-resolved documents; fails with [`ThemeError::NotFound`] when empty.
    pub async fn synthesize(&self, documents: &[Document]) -> Result<ThemeReport, ThemeError> {
        let mut per_document = Vec::with_capacity(documents.len());
        for document in documents {
            let themes = self.document_themes(document).await?;
            per_document.push((document.document_id.clone(), themes));
        }

        if per_document.len() > 1 {
            let shared = self.cross_document_themes(&per_document).await?;
            return Ok(ThemeReport::CrossDocument(shared));
        }
        per_document
            .pop()
            .map(|(_, themes)| ThemeReport::Document(themes))
            .ok_or(ThemeError::NotFound)
    }

    /// Stage A for one page.
    pub async fn page_themes(&self, page: &Page) -> Result<PageThemes, ThemeError> {
        let raw = self
            .completion
            .complete(
                CompletionRequest::new(PromptTemplate::PageThemes)
                    .with("page_number", page.page_number.to_string())
                    .with("page_text", page.refined_text.as_str()),
            )
            .await?;
        let mut themes: PageThemes = parse_stage(PromptTemplate::PageThemes, &raw)?;
        themes.page_number = page.page_number;
        Ok(themes)
    }

    /// Stage A over every page, then Stage B for the document.
    pub async fn document_themes(&self, document: &Document) -> Result<DocumentThemes, ThemeError> {
        let calls: Vec<BoxFuture<'_, Result<PageThemes, ThemeError>>> = document
            .pages
            .iter()
            .map(|page| self.page_themes(page).boxed())
            .collect();
        let pages: Vec<PageThemes> = stream::iter(calls)
            .buffered(self.page_concurrency)
            .try_collect()
            .await?;

        let raw = self
            .completion
            .complete(
                CompletionRequest::new(PromptTemplate::DocumentThemes)
                    .with("document_title", document.filename.as_str())
                    .with("page_themes", serde_json::to_string(&pages)?),
            )
            .await?;
        let mut themes: DocumentThemes = parse_stage(PromptTemplate::DocumentThemes, &raw)?;
        themes.document_title = document.filename.clone();

        let known: HashSet<u32> = document.pages.iter().map(|page| page.page_number).collect();
        for theme in &mut themes.document_themes {
            theme.page_references.retain(|page| known.contains(page));
            theme.page_references.sort_unstable();
            theme.page_references.dedup();
        }

        tracing::debug!(
            document_id = %document.document_id,
            pages = pages.len(),
            themes = themes.document_themes.len(),
            "Document themes synthesized"
        );
        Ok(themes)
    }

    /// Stage C over `(document_id, Stage B output)` pairs.
    ///
    /// Documents sharing a filename are titled `"{filename} ({document_id})"` for this stage so
    /// every reference names exactly one document.
    pub async fn cross_document_themes(
        &self,
        documents: &[(String, DocumentThemes)],
    ) -> Result<CrossDocumentThemes, ThemeError> {
        let mut filename_counts: HashMap<&str, usize> = HashMap::new();
        for (_, themes) in documents {
            *filename_counts.entry(themes.document_title.as_str()).or_default() += 1;
        }

        let mut keyed = Map::new();
        let mut titles = HashSet::new();
        for (document_id, themes) in documents {
            let mut themes = themes.clone();
            if filename_counts[themes.document_title.as_str()] > 1 {
                themes.document_title = format!("{} ({document_id})", themes.document_title);
            }
            titles.insert(themes.document_title.clone());
            keyed.insert(document_id.clone(), serde_json::to_value(&themes)?);
        }

        let raw = self
            .completion
            .complete(
                CompletionRequest::new(PromptTemplate::CrossDocumentThemes)
                    .with("document_themes", Value::Object(keyed).to_string()),
            )
            .await?;
        let mut themes: CrossDocumentThemes =
            parse_stage(PromptTemplate::CrossDocumentThemes, &raw)?;

        for theme in &mut themes.cross_document_themes {
            let mut seen = HashSet::new();
            theme
                .document_references
                .retain(|title| titles.contains(title) && seen.insert(title.clone()));
        }
        themes
            .cross_document_themes
            .retain(|theme| theme.document_references.len() >= 2);

        tracing::debug!(
            documents = documents.len(),
            themes = themes.cross_document_themes.len(),
            "Cross-document themes synthesized"
        );
        Ok(themes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Paragraph, TenantKey};
    use crate::pipeline::testing::{ScriptedCompletion, theme_script};
    use std::time::Duration;

    fn document(id: &str, filename: &str, pages: u32) -> Document {
        Document {
            document_id: id.into(),
            filename: filename.into(),
            owner: TenantKey::new("alice").unwrap(),
            uploaded_at: String::new(),
            pages: (1..=pages)
                .map(|number| Page {
                    page_number: number,
                    original_text: String::new(),
                    refined_text: format!("text of page {number}"),
                    paragraphs: vec![Paragraph {
                        paragraph_number: 1,
                        refined_text: format!("text of page {number}"),
                    }],
                })
                .collect(),
        }
    }

    #[test]
    fn code_fences_are_tolerated() {
        let parsed: PageThemes = parse_stage(
            PromptTemplate::PageThemes,
            "```json\n{\"page_number\": 1, \"themes\": []}\n```",
        )
        .unwrap();
        assert!(parsed.themes.is_empty());

        let parsed: PageThemes = parse_stage(
            PromptTemplate::PageThemes,
            "Here you go: {\"themes\": [{\"title\": \"t\", \"summary\": \"s\"}]} Thanks!",
        )
        .unwrap();
        assert_eq!(parsed.themes[0].evidence, Vec::<String>::new());
    }

    #[test]
    fn malformed_output_names_the_stage() {
        let error = parse_stage::<DocumentThemes>(PromptTemplate::DocumentThemes, "no json here")
            .expect_err("malformed");
        assert!(matches!(
            error,
            ThemeError::MalformedStageOutput { stage: "document_themes", .. }
        ));
    }

    #[test]
    fn page_references_accept_numeric_strings() {
        let parsed: DocumentTheme = serde_json::from_str(
            r#"{"title": "t", "summary": "s", "page_references": [1, "2", "page x", null]}"#,
        )
        .unwrap();
        assert_eq!(parsed.page_references, [1, 2]);
    }

    #[tokio::test]
    async fn single_document_skips_cross_document_stage() {
        let completion = Arc::new(ScriptedCompletion::new(theme_script));
        let synthesizer = ThemeSynthesizer::new(completion.clone(), 4);

        let report = synthesizer.synthesize(&[document("d1", "one.pdf", 2)]).await.unwrap();

        let ThemeReport::Document(themes) = report else {
            panic!("expected a document report");
        };
        assert_eq!(themes.document_title, "one.pdf");
        assert_eq!(themes.document_themes[0].page_references, [1, 2]);
        let templates = completion.templates().await;
        assert!(!templates.contains(&PromptTemplate::CrossDocumentThemes));
        assert_eq!(templates.len(), 3);
    }

    #[tokio::test]
    async fn multiple_documents_produce_shared_themes() {
        let completion = Arc::new(ScriptedCompletion::new(theme_script));
        let synthesizer = ThemeSynthesizer::new(completion.clone(), 2);

        let report = synthesizer
            .synthesize(&[document("d1", "one.pdf", 1), document("d2", "two.pdf", 1)])
            .await
            .unwrap();

        let ThemeReport::CrossDocument(shared) = report else {
            panic!("expected a cross-document report");
        };
        assert_eq!(shared.cross_document_themes.len(), 1);
        assert_eq!(
            shared.cross_document_themes[0].document_references,
            ["one.pdf", "two.pdf"]
        );
        let cross_calls = completion
            .templates()
            .await
            .into_iter()
            .filter(|template| *template == PromptTemplate::CrossDocumentThemes)
            .count();
        assert_eq!(cross_calls, 1);
    }

    #[tokio::test]
    async fn documents_sharing_a_filename_stay_distinct() {
        let completion = Arc::new(ScriptedCompletion::new(theme_script));
        let synthesizer = ThemeSynthesizer::new(completion.clone(), 2);

        let report = synthesizer
            .synthesize(&[
                document("d1", "report.pdf", 1),
                document("d2", "report.pdf", 1),
                document("d3", "notes.pdf", 1),
            ])
            .await
            .unwrap();

        let ThemeReport::CrossDocument(shared) = report else {
            panic!("expected a cross-document report");
        };
        assert_eq!(shared.cross_document_themes.len(), 1);
        let mut references = shared.cross_document_themes[0].document_references.clone();
        references.sort();
        assert_eq!(references, ["notes.pdf", "report.pdf (d1)", "report.pdf (d2)"]);
    }

    #[tokio::test]
    async fn failing_stage_aborts_the_report() {
        for failing in [
            PromptTemplate::PageThemes,
            PromptTemplate::DocumentThemes,
            PromptTemplate::CrossDocumentThemes,
        ] {
            let completion = Arc::new(ScriptedCompletion::new(move |request| {
                if request.template == failing {
                    ScriptedCompletion::outage()
                } else {
                    theme_script(request)
                }
            }));
            let synthesizer = ThemeSynthesizer::new(completion.clone(), 2);

            let error = synthesizer
                .synthesize(&[document("d1", "one.pdf", 2), document("d2", "two.pdf", 1)])
                .await
                .expect_err("stage failure must abort");

            assert!(matches!(error, ThemeError::Completion(_)), "{failing:?}: {error:?}");
        }
    }

    #[tokio::test]
    async fn page_stage_keeps_input_order_regardless_of_timing() {
        let completion = Arc::new(ScriptedCompletion::new(theme_script).with_delay(|request| {
            let page: u64 = request
                .variable("page_number")
                .and_then(|value| value.parse().ok())
                .unwrap_or(0);
            Duration::from_millis(60u64.saturating_sub(page * 10))
        }));
        let synthesizer = ThemeSynthesizer::new(completion.clone(), 5);

        synthesizer.document_themes(&document("d1", "one.pdf", 5)).await.unwrap();

        let stage_b = completion
            .requests()
            .await
            .into_iter()
            .find(|request| request.template == PromptTemplate::DocumentThemes)
            .expect("stage b request");
        let pages: Vec<PageThemes> =
            serde_json::from_str(stage_b.variable("page_themes").unwrap()).unwrap();
        let numbers: Vec<u32> = pages.iter().map(|page| page.page_number).collect();
        assert_eq!(numbers, [1, 2, 3, 4, 5]);
    }

    #[test]
    fn report_serializes_untagged() {
        let report = ThemeReport::CrossDocument(CrossDocumentThemes {
            cross_document_themes: Vec::new(),
        });
        assert_eq!(
            serde_json::to_value(&report).unwrap(),
            serde_json::json!({ "cross_document_themes": [] })
        );
    }
}
