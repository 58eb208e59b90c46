use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters describing ingestion and retrieval activity.
#[derive(Default)]
pub struct ServiceMetrics {
    documents_ingested: AtomicU64,
    chunks_indexed: AtomicU64,
    files_rejected: AtomicU64,
    queries_answered: AtomicU64,
    theme_reports: AtomicU64,
}

impl ServiceMetrics {
    /// Create an empty metrics accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an ingested document.
    pub fn record_document(&self) {
        self.documents_ingested.fetch_add(1, Ordering::Relaxed);
    }

    /// Record paragraph chunks written to the index.
    pub fn record_chunks(&self, chunk_count: u64) {
        self.chunks_indexed.fetch_add(chunk_count, Ordering::Relaxed);
    }

    /// Record a file that was skipped inside an upload batch.
    pub fn record_rejected_file(&self) {
        self.files_rejected.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a completed question-answering request.
    pub fn record_query(&self) {
        self.queries_answered.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a completed theme report.
    pub fn record_theme_report(&self) {
        self.theme_reports.fetch_add(1, Ordering::Relaxed);
    }

    /// Return a snapshot of the current counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            documents_ingested: self.documents_ingested.load(Ordering::Relaxed),
            chunks_indexed: self.chunks_indexed.load(Ordering::Relaxed),
            files_rejected: self.files_rejected.load(Ordering::Relaxed),
            queries_answered: self.queries_answered.load(Ordering::Relaxed),
            theme_reports: self.theme_reports.load(Ordering::Relaxed),
        }
    }
}

/// Immutable view of service counters used for reporting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct MetricsSnapshot {
    /// Number of documents ingested since startup.
    pub documents_ingested: u64,
    /// Total paragraph chunks written to the index.
    pub chunks_indexed: u64,
    /// Files skipped inside upload batches.
    pub files_rejected: u64,
    /// Question-answering requests served.
    pub queries_answered: u64,
    /// Theme reports produced.
    pub theme_reports: u64,
}
