//! Document pipeline: OCR ingestion, retrieval-augmented answering, and theme synthesis.
//!
//! Components are small structs over shared collaborator traits; [`DocumentService`] wires them
//! together per tenant and is what the HTTP surface and the admin CLI talk to.

mod ingest;
mod normalizer;
mod query;
mod service;
mod themes;
mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use ingest::{BatchOutcome, Ingestor};
pub use normalizer::{TextNormalizer, split_paragraphs};
pub use query::{QueryRefiner, Responder, render_context};
pub use service::{DocumentApi, DocumentService, ServiceParts, ServiceSettings, StartupError};
pub use themes::{
    CrossDocumentTheme, CrossDocumentThemes, DocumentTheme, DocumentThemes, PageTheme,
    PageThemes, ThemeReport, ThemeSynthesizer,
};
pub use types::{
    IngestError, IngestedDocument, QueryAnswer, RetrievedChunk, ServiceError, SourceFile,
    SourceKind, ThemeError,
};
