use super::normalizer::{TextNormalizer, split_paragraphs};
use super::types::{IngestError, IngestedDocument, SourceFile, SourceKind};
use crate::model::{Document, Page, Paragraph, TenantKey, current_timestamp_rfc3339};
use crate::ocr::{OcrEngine, PageRenderer};
use crate::storage::DocumentStore;
use std::sync::Arc;
use uuid::Uuid;

/// Files that made it through a best-effort batch, plus the names of those that did not.
#[derive(Debug, Default)]
pub struct BatchOutcome {
    /// Persisted documents in upload order.
    pub ingested: Vec<Document>,
    /// Filenames skipped because their pipeline failed.
    pub failed: Vec<String>,
}

/// Turns uploaded files into persisted [`Document`]s.
pub struct Ingestor {
    ocr: Arc<dyn OcrEngine>,
    renderer: Arc<dyn PageRenderer>,
    normalizer: TextNormalizer,
    documents: Arc<dyn DocumentStore>,
}

impl Ingestor {
    /// Ingestor wired to its collaborators.
    pub fn new(
        ocr: Arc<dyn OcrEngine>,
        renderer: Arc<dyn PageRenderer>,
        normalizer: TextNormalizer,
        documents: Arc<dyn DocumentStore>,
    ) -> Self {
        Self {
            ocr,
            renderer,
            normalizer,
            documents,
        }
    }

    /// OCR, normalize, and split every page of `file`, then persist the document for `tenant`.
    pub async fn ingest(
        &self,
        file: SourceFile,
        tenant: &TenantKey,
    ) -> Result<IngestedDocument, IngestError> {
        let kind = file
            .kind()
            .ok_or_else(|| IngestError::UnsupportedInputKind(file.filename.clone()))?;

        let images = match kind {
            SourceKind::Pdf => self.renderer.render(&file.bytes).await?,
            SourceKind::Image => vec![file.bytes],
        };

        let mut pages = Vec::with_capacity(images.len());
        for (index, image) in images.iter().enumerate() {
            let page_number = index as u32 + 1;
            pages.push(self.process_page(page_number, image).await?);
        }

        let document = Document {
            document_id: Uuid::new_v4().to_string(),
            filename: file.filename,
            owner: tenant.clone(),
            uploaded_at: current_timestamp_rfc3339(),
            pages,
        };
        let page_count = document.pages.len();
        self.documents.insert(document.clone()).await?;

        tracing::info!(
            tenant = %tenant,
            document_id = %document.document_id,
            filename = %document.filename,
            pages = page_count,
            paragraphs = document.paragraph_count(),
            "Ingested document"
        );
        Ok(IngestedDocument {
            document,
            page_count,
        })
    }

    /// Ingest each file independently; a failing file is logged and skipped.
    pub async fn ingest_batch(&self, files: Vec<SourceFile>, tenant: &TenantKey) -> BatchOutcome {
        let mut outcome = BatchOutcome::default();
        for file in files {
            let filename = file.filename.clone();
            match self.ingest(file, tenant).await {
                Ok(ingested) => outcome.ingested.push(ingested.document),
                Err(error) => {
                    tracing::warn!(tenant = %tenant, filename = %filename, error = %error, "Skipping file that failed ingestion");
                    outcome.failed.push(filename);
                }
            }
        }
        outcome
    }

    async fn process_page(&self, page_number: u32, image: &[u8]) -> Result<Page, IngestError> {
        let original_text = self.ocr.recognize(image).await?;
        let refined_text = self.normalizer.normalize(&original_text).await?;
        let paragraphs = split_paragraphs(&refined_text)
            .into_iter()
            .enumerate()
            .map(|(index, text)| Paragraph {
                paragraph_number: index as u32 + 1,
                refined_text: text,
            })
            .collect();

        Ok(Page {
            page_number,
            original_text,
            refined_text,
            paragraphs,
        })
    }
}
