//! Service façade coordinating ingestion, retrieval, and theme synthesis per tenant.

use super::ingest::Ingestor;
use super::normalizer::TextNormalizer;
use super::query::{QueryRefiner, Responder};
use super::themes::{ThemeReport, ThemeSynthesizer};
use super::types::{QueryAnswer, RetrievedChunk, ServiceError, SourceFile};
use crate::auth::{AuthService, Token};
use crate::completion::{CompletionClient, CompletionError, build_completion_client};
use crate::config::{Config, VectorBackend};
use crate::embedding::{EmbeddingClient, EmbeddingClientError, build_embedding_client};
use crate::index::{IndexError, MemoryIndex, PartitionedIndex, SearchScope, VectorIndex};
use crate::metrics::{MetricsSnapshot, ServiceMetrics};
use crate::model::{Document, TenantKey};
use crate::ocr::{OcrEngine, PageRenderer, build_ocr};
use crate::qdrant::{QdrantError, QdrantIndex, QdrantService};
use crate::storage::{
    DocumentStore, LocalDocumentStore, LocalUserStore, StorageError, UserStore,
};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Errors raised while wiring the service at startup.
#[derive(Debug, Error)]
pub enum StartupError {
    /// Embedding client could not be built.
    #[error("failed to build embedding client: {0}")]
    Embedding(#[from] EmbeddingClientError),
    /// Completion client could not be built.
    #[error("failed to build completion client: {0}")]
    Completion(#[from] CompletionError),
    /// Qdrant transport could not be built.
    #[error("failed to build Qdrant client: {0}")]
    Qdrant(#[from] QdrantError),
    /// Index initialization failed.
    #[error("failed to prepare the index: {0}")]
    Index(#[from] IndexError),
    /// Snapshot stores could not be opened.
    #[error("failed to open storage: {0}")]
    Storage(#[from] StorageError),
}

/// Collaborators the service is assembled from.
pub struct ServiceParts {
    /// Image text recognition.
    pub ocr: Arc<dyn OcrEngine>,
    /// PDF rasterization.
    pub renderer: Arc<dyn PageRenderer>,
    /// Prompt completion shared by every stage.
    pub completion: Arc<dyn CompletionClient>,
    /// Paragraph and query embeddings.
    pub embedder: Arc<dyn EmbeddingClient>,
    /// Vector storage backend.
    pub vectors: Arc<dyn VectorIndex>,
    /// Document persistence.
    pub documents: Arc<dyn DocumentStore>,
    /// Account persistence.
    pub users: Arc<dyn UserStore>,
}

/// Tunables the service reads once at construction.
#[derive(Debug, Clone)]
pub struct ServiceSettings {
    /// Vector length produced by the embedder.
    pub embedding_dimension: usize,
    /// Texts per embedding request.
    pub embedding_batch_size: usize,
    /// Chunks retrieved per question.
    pub search_limit: usize,
    /// Stage A calls in flight per document.
    pub theme_page_concurrency: usize,
    /// Token signing secret.
    pub jwt_secret: String,
    /// Token lifetime.
    pub token_lifetime_minutes: i64,
    /// bcrypt cost factor for new passwords.
    pub password_hash_cost: u32,
}

impl ServiceSettings {
    /// Settings taken from `config` with the default bcrypt cost.
    pub fn from_config(config: &Config) -> Self {
        Self {
            embedding_dimension: config.embedding_dimension,
            embedding_batch_size: config.embedding_batch_size,
            search_limit: config.search_limit,
            theme_page_concurrency: config.theme_page_concurrency,
            jwt_secret: config.jwt_secret.clone(),
            token_lifetime_minutes: config.access_token_expire_minutes,
            password_hash_cost: bcrypt::DEFAULT_COST,
        }
    }
}

/// Operations exposed to the HTTP surface.
#[async_trait]
pub trait DocumentApi: Send + Sync {
    /// Ingest and index a batch of uploads; returns the filenames that made it through.
    async fn upload_files(
        &self,
        tenant: &TenantKey,
        files: Vec<SourceFile>,
    ) -> Result<Vec<String>, ServiceError>;

    /// Create an account.
    async fn register(&self, username: &str, password: &str) -> Result<Token, ServiceError>;

    /// Exchange credentials for a bearer token.
    async fn login(&self, username: &str, password: &str) -> Result<Token, ServiceError>;

    /// Resolve a bearer token to its tenant.
    fn authenticate(&self, token: &str) -> Result<TenantKey, ServiceError>;

    /// The caller's stored documents among `document_ids`.
    async fn add_documents(
        &self,
        tenant: &TenantKey,
        document_ids: Vec<String>,
    ) -> Result<Vec<Document>, ServiceError>;

    /// Every stored document of the caller.
    async fn list_documents(&self, tenant: &TenantKey) -> Result<Vec<Document>, ServiceError>;

    /// Refine, retrieve, and answer within the caller's corpus.
    async fn query(
        &self,
        tenant: &TenantKey,
        question: &str,
        document_ids: Option<Vec<String>>,
    ) -> Result<QueryAnswer, ServiceError>;

    /// Remove one document from the index and storage.
    async fn delete_document(
        &self,
        tenant: &TenantKey,
        document_id: &str,
    ) -> Result<(), ServiceError>;

    /// Theme report over the caller's documents among `document_ids`.
    async fn themes(
        &self,
        tenant: &TenantKey,
        document_ids: Vec<String>,
    ) -> Result<ThemeReport, ServiceError>;

    /// Current counters.
    fn metrics(&self) -> MetricsSnapshot;
}

/// Owns every pipeline component and the shared collaborators behind them.
///
/// Build it once with [`DocumentService::connect`] (or [`DocumentService::new`] for explicit
/// collaborators), share it through an `Arc`, and call [`DocumentService::shutdown`] on exit.
pub struct DocumentService {
    ingestor: Ingestor,
    index: PartitionedIndex,
    refiner: QueryRefiner,
    responder: Responder,
    themes: ThemeSynthesizer,
    documents: Arc<dyn DocumentStore>,
    users: Arc<dyn UserStore>,
    auth: AuthService,
    metrics: ServiceMetrics,
    search_limit: usize,
}

impl DocumentService {
    /// Assemble the service from explicit collaborators. Call [`DocumentService::ensure_ready`]
    /// before serving.
    pub fn new(parts: ServiceParts, settings: ServiceSettings) -> Self {
        let ServiceParts {
            ocr,
            renderer,
            completion,
            embedder,
            vectors,
            documents,
            users,
        } = parts;

        let auth = AuthService::new(
            users.clone(),
            &settings.jwt_secret,
            settings.token_lifetime_minutes,
        )
        .with_hash_cost(settings.password_hash_cost);

        Self {
            ingestor: Ingestor::new(
                ocr,
                renderer,
                TextNormalizer::new(completion.clone()),
                documents.clone(),
            ),
            index: PartitionedIndex::new(
                vectors,
                embedder,
                settings.embedding_dimension,
                settings.embedding_batch_size,
            ),
            refiner: QueryRefiner::new(completion.clone()),
            responder: Responder::new(completion.clone()),
            themes: ThemeSynthesizer::new(completion, settings.theme_page_concurrency),
            documents,
            users,
            auth,
            metrics: ServiceMetrics::new(),
            search_limit: settings.search_limit,
        }
    }

    /// Build every collaborator described by `config` and prepare the index.
    pub async fn connect(config: &Config) -> Result<Self, StartupError> {
        tracing::info!(
            backend = ?config.vector_backend,
            embedding = ?config.embedding_provider,
            completion = ?config.completion_provider,
            "Initializing document service"
        );

        let embedder: Arc<dyn EmbeddingClient> = Arc::from(build_embedding_client(config)?);
        let completion: Arc<dyn CompletionClient> = Arc::from(build_completion_client(config)?);
        let (ocr, renderer) = build_ocr(config);

        let vectors: Arc<dyn VectorIndex> = match config.vector_backend {
            VectorBackend::Qdrant => Arc::new(QdrantIndex::new(
                QdrantService::new(config)?,
                config.qdrant_collection_name.clone(),
            )),
            VectorBackend::Memory => Arc::new(MemoryIndex::new()),
        };

        let (documents, users) = match &config.data_dir {
            Some(dir) => {
                tracing::info!(data_dir = %dir.display(), "Opening snapshot stores");
                (
                    LocalDocumentStore::open(dir.join("documents.json"))?,
                    LocalUserStore::open(dir.join("users.json"))?,
                )
            }
            None => {
                tracing::warn!("DATA_DIR not set; documents and accounts are kept in memory only");
                (LocalDocumentStore::in_memory(), LocalUserStore::in_memory())
            }
        };

        let service = Self::new(
            ServiceParts {
                ocr: Arc::new(ocr),
                renderer: Arc::new(renderer),
                completion,
                embedder,
                vectors,
                documents: Arc::new(documents),
                users: Arc::new(users),
            },
            ServiceSettings::from_config(config),
        );
        service.ensure_ready().await?;
        tracing::info!("Document service ready");
        Ok(service)
    }

    /// Idempotently prepare the index backend.
    pub async fn ensure_ready(&self) -> Result<(), IndexError> {
        self.index.ensure_ready().await
    }

    /// Remove every indexed chunk and stored document of `tenant`; returns the document count.
    pub async fn purge_tenant(&self, tenant: &TenantKey) -> Result<usize, ServiceError> {
        self.index
            .delete_by_tenant(tenant)
            .await
            .map_err(|error| ServiceError::from_index("Tenant purge failed", error))?;
        let removed = self
            .documents
            .delete_tenant(tenant)
            .await
            .map_err(|error| ServiceError::upstream("Tenant purge failed", error))?;
        tracing::info!(tenant = %tenant, documents = removed, "Purged tenant");
        Ok(removed)
    }

    /// Flush store snapshots.
    pub async fn shutdown(&self) -> Result<(), StorageError> {
        self.documents.flush().await?;
        self.users.flush().await?;
        tracing::info!("Document service stopped");
        Ok(())
    }

    async fn roll_back_batch(&self, tenant: &TenantKey, documents: &[Document]) {
        for document in documents {
            if let Err(error) = self.index.delete_by_document(tenant, &document.document_id).await
            {
                tracing::warn!(document_id = %document.document_id, error = %error, "Rollback left indexed chunks behind");
            }
            if let Err(error) = self.documents.delete(tenant, &document.document_id).await {
                tracing::warn!(document_id = %document.document_id, error = %error, "Rollback left a stored document behind");
            }
        }
    }
}

#[async_trait]
impl DocumentApi for DocumentService {
    async fn upload_files(
        &self,
        tenant: &TenantKey,
        files: Vec<SourceFile>,
    ) -> Result<Vec<String>, ServiceError> {
        if let Some(file) = files.iter().find(|file| file.kind().is_none()) {
            return Err(ServiceError::UnsupportedInput(format!(
                "Unsupported file type: {}",
                file.filename
            )));
        }

        let outcome = self.ingestor.ingest_batch(files, tenant).await;
        for _ in &outcome.failed {
            self.metrics.record_rejected_file();
        }
        if outcome.ingested.is_empty() {
            return Ok(Vec::new());
        }

        let chunks = match self.index.insert_documents(&outcome.ingested).await {
            Ok(chunks) => chunks,
            Err(error) => {
                self.roll_back_batch(tenant, &outcome.ingested).await;
                return Err(ServiceError::from_index("Error inserting into vector store", error));
            }
        };

        for _ in &outcome.ingested {
            self.metrics.record_document();
        }
        self.metrics.record_chunks(chunks as u64);
        tracing::info!(
            tenant = %tenant,
            documents = outcome.ingested.len(),
            skipped = outcome.failed.len(),
            chunks,
            "Upload batch indexed"
        );
        Ok(outcome
            .ingested
            .into_iter()
            .map(|document| document.filename)
            .collect())
    }

    async fn register(&self, username: &str, password: &str) -> Result<Token, ServiceError> {
        self.auth
            .register(username, password)
            .await
            .map_err(|error| ServiceError::upstream("Registration failed", error))
    }

    async fn login(&self, username: &str, password: &str) -> Result<Token, ServiceError> {
        self.auth
            .login(username, password)
            .await
            .map_err(|error| ServiceError::from_auth("Login failed", error))
    }

    fn authenticate(&self, token: &str) -> Result<TenantKey, ServiceError> {
        self.auth
            .verify(token)
            .map_err(|error| ServiceError::from_auth("Authentication failed", error))
    }

    async fn add_documents(
        &self,
        tenant: &TenantKey,
        document_ids: Vec<String>,
    ) -> Result<Vec<Document>, ServiceError> {
        self.documents
            .find(tenant, &document_ids)
            .await
            .map_err(|error| ServiceError::upstream("Error retrieving documents", error))
    }

    async fn list_documents(&self, tenant: &TenantKey) -> Result<Vec<Document>, ServiceError> {
        self.documents
            .list(tenant)
            .await
            .map_err(|error| ServiceError::upstream("Failed to get documents", error))
    }

    async fn query(
        &self,
        tenant: &TenantKey,
        question: &str,
        document_ids: Option<Vec<String>>,
    ) -> Result<QueryAnswer, ServiceError> {
        if question.trim().is_empty() {
            return Err(ServiceError::UnsupportedInput("Query must not be empty".into()));
        }

        let refined = self
            .refiner
            .refine(question)
            .await
            .map_err(|error| ServiceError::upstream("Query failed", error))?;
        let scope = SearchScope::documents(tenant.clone(), document_ids.unwrap_or_default());
        let hits = self
            .index
            .search(&refined, &scope, self.search_limit)
            .await
            .map_err(|error| ServiceError::from_index("Query failed", error))?;
        let chunks: Vec<RetrievedChunk> = hits.into_iter().map(RetrievedChunk::from).collect();
        let response = self
            .responder
            .answer(&refined, &chunks)
            .await
            .map_err(|error| ServiceError::upstream("Query failed", error))?;

        self.metrics.record_query();
        tracing::info!(
            tenant = %tenant,
            documents = scope.document_ids().len(),
            chunks = chunks.len(),
            "Answered query"
        );
        Ok(QueryAnswer {
            documents: chunks,
            response,
        })
    }

    async fn delete_document(
        &self,
        tenant: &TenantKey,
        document_id: &str,
    ) -> Result<(), ServiceError> {
        let document_id = document_id.trim();
        if document_id.is_empty() {
            return Err(ServiceError::UnsupportedInput(
                "document_id must not be blank".into(),
            ));
        }

        self.index
            .delete_by_document(tenant, document_id)
            .await
            .map_err(|error| ServiceError::from_index("Deletion failed", error))?;
        let existed = self
            .documents
            .delete(tenant, document_id)
            .await
            .map_err(|error| ServiceError::upstream("Deletion failed", error))?;
        tracing::info!(tenant = %tenant, document_id, existed, "Deleted document");
        Ok(())
    }

    async fn themes(
        &self,
        tenant: &TenantKey,
        document_ids: Vec<String>,
    ) -> Result<ThemeReport, ServiceError> {
        let documents = self
            .documents
            .find(tenant, &document_ids)
            .await
            .map_err(|error| ServiceError::upstream("Theme extraction failed", error))?;
        tracing::debug!(
            tenant = %tenant,
            requested = document_ids.len(),
            resolved = documents.len(),
            "Resolved theme documents"
        );

        let report = self
            .themes
            .synthesize(&documents)
            .await
            .map_err(ServiceError::from_themes)?;
        self.metrics.record_theme_report();
        Ok(report)
    }

    fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }
}
