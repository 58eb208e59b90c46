//! Prompt templates addressed by id and filled from named variables.
//!
//! Pipeline code only picks a [`PromptTemplate`] and supplies variables; wording lives here.

use std::collections::BTreeMap;

use super::CompletionError;

/// Identifies one fixed instruction template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PromptTemplate {
    /// Clean OCR output for one page or image.
    CleanOcrText,
    /// Rewrite a user question into a retrieval query.
    RefineQuery,
    /// Answer a question from retrieved passages.
    GroundedAnswer,
    /// Extract themes from a single page.
    PageThemes,
    /// Merge page-level themes for one document.
    DocumentThemes,
    /// Find themes shared across documents.
    CrossDocumentThemes,
}

impl PromptTemplate {
    /// Stable identifier used in logs.
    pub const fn id(self) -> &'static str {
        match self {
            Self::CleanOcrText => "clean_ocr_text",
            Self::RefineQuery => "refine_query",
            Self::GroundedAnswer => "grounded_answer",
            Self::PageThemes => "page_themes",
            Self::DocumentThemes => "document_themes",
            Self::CrossDocumentThemes => "cross_document_themes",
        }
    }

    /// Variables that must be supplied before rendering.
    pub const fn variables(self) -> &'static [&'static str] {
        match self {
            Self::CleanOcrText => &["text"],
            Self::RefineQuery => &["question"],
            Self::GroundedAnswer => &["context", "question"],
            Self::PageThemes => &["page_number", "page_text"],
            Self::DocumentThemes => &["document_title", "page_themes"],
            Self::CrossDocumentThemes => &["document_themes"],
        }
    }

    const fn system(self) -> &'static str {
        match self {
            Self::CleanOcrText => CLEAN_OCR_SYSTEM,
            Self::RefineQuery => REFINE_QUERY_SYSTEM,
            Self::GroundedAnswer => GROUNDED_ANSWER_SYSTEM,
            Self::PageThemes => PAGE_THEMES_SYSTEM,
            Self::DocumentThemes => DOCUMENT_THEMES_SYSTEM,
            Self::CrossDocumentThemes => CROSS_DOCUMENT_THEMES_SYSTEM,
        }
    }

    const fn user(self) -> &'static str {
        match self {
            Self::CleanOcrText => "{text}",
            Self::RefineQuery => "User question: {question}",
            Self::GroundedAnswer => GROUNDED_ANSWER_USER,
            Self::PageThemes => PAGE_THEMES_USER,
            Self::DocumentThemes => DOCUMENT_THEMES_USER,
            Self::CrossDocumentThemes => CROSS_DOCUMENT_THEMES_USER,
        }
    }
}

/// A template selection plus the variables it is rendered with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionRequest {
    /// Template to render.
    pub template: PromptTemplate,
    /// Named variable values.
    pub variables: BTreeMap<&'static str, String>,
}

/// System and user messages produced from a [`CompletionRequest`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedPrompt {
    /// Instruction message.
    pub system: String,
    /// Content message.
    pub user: String,
}

impl CompletionRequest {
    /// Start a request for `template` with no variables.
    pub fn new(template: PromptTemplate) -> Self {
        Self {
            template,
            variables: BTreeMap::new(),
        }
    }

    /// Attach a variable value.
    pub fn with(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.variables.insert(name, value.into());
        self
    }

    /// Look up a supplied variable.
    pub fn variable(&self, name: &str) -> Option<&str> {
        self.variables.get(name).map(String::as_str)
    }

    /// Fill the template, failing when a required variable is absent.
    pub fn render(&self) -> Result<RenderedPrompt, CompletionError> {
        for variable in self.template.variables() {
            if !self.variables.contains_key(variable) {
                return Err(CompletionError::MissingVariable {
                    template: self.template.id(),
                    variable,
                });
            }
        }

        Ok(RenderedPrompt {
            system: fill(self.template.system(), &self.variables),
            user: fill(self.template.user(), &self.variables),
        })
    }
}

/// Single-pass `{name}` substitution; braces that are not known placeholders stay literal.
fn fill(template: &str, variables: &BTreeMap<&'static str, String>) -> String {
    let mut rendered = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        rendered.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let placeholder = after
            .find('}')
            .map(|close| (close, &after[..close]))
            .filter(|(_, name)| is_identifier(name));

        if let Some((close, name)) = placeholder
            && let Some(value) = variables.get(name)
        {
            rendered.push_str(value);
            rest = &after[close + 1..];
        } else {
            rendered.push('{');
            rest = after;
        }
    }

    rendered.push_str(rest);
    rendered
}

fn is_identifier(candidate: &str) -> bool {
    !candidate.is_empty()
        && candidate
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
}

const CLEAN_OCR_SYSTEM: &str = "You clean up OCR-scanned text from documents. \
Correct spelling, repair words and lines broken by the scan, and remove scanning artifacts \
while preserving the original meaning. Do not change names or factual content. \
Merge each heading into the paragraph that follows it. Separate paragraphs with a blank line. \
Return only the cleaned text and nothing else.";

const REFINE_QUERY_SYSTEM: &str = "You convert a user's natural language question into a query \
for a semantic search index. Strip greetings, filler, and anything irrelevant to retrieval. \
Return only the search query on a single line, with no explanation.";

const GROUNDED_ANSWER_SYSTEM: &str = "Answer the question using only the provided context. \
If the context does not contain the answer, say that you don't know; do not make one up. \
Use three sentences at most and keep the answer as concise as possible.";

const GROUNDED_ANSWER_USER: &str = "Context:\n{context}\n\nQuestion: {question}\n\nAnswer:";

const PAGE_THEMES_SYSTEM: &str = "You are an expert document analyst extracting themes from a \
single page. Identify the themes and subthemes present, summarize each concisely, and quote \
supporting evidence from the page. Respond with JSON only, shaped as \
{\"page_number\": <number>, \"themes\": [{\"title\": \"...\", \"summary\": \"...\", \
\"evidence\": [\"...\"]}]}.";

const PAGE_THEMES_USER: &str = "Page number: {page_number}\nPage content:\n{page_text}";

const DOCUMENT_THEMES_SYSTEM: &str = "You synthesize themes across an entire document from \
page-level analyses. Merge overlapping or similar themes, write a concise summary for each, \
and list the page numbers that contribute evidence. Respond with JSON only, shaped as \
{\"document_title\": \"...\", \"document_themes\": [{\"title\": \"...\", \"summary\": \"...\", \
\"page_references\": [<page numbers>]}]}.";

const DOCUMENT_THEMES_USER: &str = "Document title: {document_title}\nPage-level themes:\n{page_themes}";

const CROSS_DOCUMENT_THEMES_SYSTEM: &str = "You find themes shared across multiple documents. \
Keep only themes supported by two or more documents, group them coherently, and name the \
supporting documents by their exact document_title. Respond with JSON only, shaped as \
{\"cross_document_themes\": [{\"title\": \"...\", \"summary\": \"...\", \
\"document_references\": [\"<document title>\"]}]}.";

const CROSS_DOCUMENT_THEMES_USER: &str = "Document-level themes keyed by document id:\n{document_themes}";
