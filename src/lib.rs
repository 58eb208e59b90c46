#![deny(missing_docs)]

//! Core library for the doclens document question-answering server.

/// HTTP routing and REST handlers.
pub mod api;
/// Account registration, login, and bearer tokens.
pub mod auth;
/// Prompt templates and chat-completion clients.
pub mod completion;
/// Environment-driven configuration management.
pub mod config;
/// Embedding client abstraction and adapters.
pub mod embedding;
/// Tenant-partitioned paragraph index.
pub mod index;
/// Structured logging and tracing setup.
pub mod logging;
/// Ingestion and retrieval counters.
pub mod metrics;
/// Documents, pages, paragraphs, and tenant keys.
pub mod model;
/// Text recognition and PDF rasterization.
pub mod ocr;
/// Ingestion, query, and theme pipelines.
pub mod pipeline;
/// Qdrant vector store integration.
pub mod qdrant;
/// Document and account persistence.
pub mod storage;
