//! Qdrant vector store integration.

pub mod client;
pub mod filters;
mod index;
pub mod types;

pub use client::QdrantService;
pub use filters::{build_document_filter, build_scope_filter, build_tenant_filter};
pub use index::QdrantIndex;
pub use types::{CollectionInfo, QdrantError, ScoredPoint};
