use serde::Deserialize;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::OnceLock;
use thiserror::Error;

/// Errors encountered while loading configuration from environment variables.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Required environment variable was not provided.
    #[error("Missing environment variable: {0}")]
    MissingVariable(String),
    /// Environment variable contained a value that could not be parsed.
    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),
}

/// Runtime configuration for the doclens server and admin tooling.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Optional override for the HTTP server port.
    pub server_port: Option<u16>,
    /// Origin allowed by the CORS layer; permissive when absent.
    pub cors_origin: Option<String>,
    /// Directory holding the document and user snapshots; in-memory only when absent.
    pub data_dir: Option<PathBuf>,
    /// Secret used to sign bearer tokens.
    pub jwt_secret: String,
    /// Lifetime of issued bearer tokens.
    pub access_token_expire_minutes: i64,
    /// Backend used for the similarity index.
    pub vector_backend: VectorBackend,
    /// Base URL of the Qdrant instance that stores paragraph vectors.
    pub qdrant_url: String,
    /// Name of the Qdrant collection shared by all tenants.
    pub qdrant_collection_name: String,
    /// Optional API key required to access Qdrant.
    pub qdrant_api_key: Option<String>,
    /// Per-request timeout for Qdrant calls, in seconds.
    pub qdrant_timeout_secs: u64,
    /// Embedding provider used to generate vector representations.
    pub embedding_provider: EmbeddingProvider,
    /// Embedding model identifier passed to the provider.
    pub embedding_model: String,
    /// Dimensionality of the produced vectors.
    pub embedding_dimension: usize,
    /// Optional base URL override for the embedding provider.
    pub embedding_url: Option<String>,
    /// Optional API key for the embedding provider.
    pub embedding_api_key: Option<String>,
    /// Number of texts sent per embedding request.
    pub embedding_batch_size: usize,
    /// Chat-completion provider used by every prompt stage.
    pub completion_provider: CompletionProvider,
    /// Completion model identifier.
    pub completion_model: String,
    /// Optional base URL override for the completion provider.
    pub completion_url: Option<String>,
    /// Optional API key for the completion provider.
    pub completion_api_key: Option<String>,
    /// Retries attempted after the first failed completion call.
    pub completion_max_retries: u32,
    /// Per-request timeout applied to completion calls.
    pub completion_timeout_secs: u64,
    /// Path or name of the `tesseract` executable.
    pub tesseract_bin: String,
    /// Language pack passed to tesseract.
    pub tesseract_lang: String,
    /// Path or name of the `pdftoppm` executable.
    pub pdftoppm_bin: String,
    /// Resolution used when rasterizing PDF pages.
    pub pdf_render_dpi: u32,
    /// Upper bound for a single OCR or render subprocess.
    pub ocr_timeout_secs: u64,
    /// Number of chunks returned by the query pipeline.
    pub search_limit: usize,
    /// Maximum number of page-level theme calls in flight per document.
    pub theme_page_concurrency: usize,
    /// Request body limit for uploads.
    pub max_upload_bytes: usize,
}

/// Supported similarity index backends.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum VectorBackend {
    /// Remote Qdrant collection partitioned by a tenant payload key.
    Qdrant,
    /// Process-local brute-force index, useful for development and tests.
    Memory,
}

/// Supported embedding backends for the indexing pipeline.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProvider {
    /// Local Ollama runtime.
    Ollama,
    /// Hosted OpenAI-compatible embeddings API.
    OpenAI,
    /// Deterministic byte-hashing embedder with no network dependency.
    Hash,
}

/// Supported chat-completion backends.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CompletionProvider {
    /// Any OpenAI-compatible `/chat/completions` endpoint (OpenAI, Groq, vLLM).
    OpenAI,
    /// Local Ollama runtime via `/api/chat`.
    Ollama,
}

impl Config {
    /// Load configuration from environment variables, performing validation along the way.
    pub fn from_env() -> Result<Self, ConfigError> {
        let vector_backend: VectorBackend = load_parsed_or("VECTOR_BACKEND", VectorBackend::Qdrant)?;
        let qdrant_url = match vector_backend {
            VectorBackend::Qdrant => load_env("QDRANT_URL")?,
            VectorBackend::Memory => {
                load_env_optional("QDRANT_URL").unwrap_or_else(|| "http://127.0.0.1:6333".into())
            }
        };

        Ok(Self {
            server_port: load_parsed_optional("SERVER_PORT")?,
            cors_origin: load_env_optional("CORS_ORIGIN"),
            data_dir: load_env_optional("DATA_DIR").map(PathBuf::from),
            jwt_secret: load_env("JWT_SECRET")?,
            access_token_expire_minutes: load_parsed_or("ACCESS_TOKEN_EXPIRE_MINUTES", 30)?,
            vector_backend,
            qdrant_url,
            qdrant_collection_name: load_env_optional("QDRANT_COLLECTION_NAME")
                .unwrap_or_else(|| "doclens".into()),
            qdrant_api_key: load_env_optional("QDRANT_API_KEY"),
            qdrant_timeout_secs: load_parsed_or("QDRANT_TIMEOUT_SECS", 30)?,
            embedding_provider: load_env("EMBEDDING_PROVIDER")?
                .parse()
                .map_err(|()| ConfigError::InvalidValue("EMBEDDING_PROVIDER".to_string()))?,
            embedding_model: load_env("EMBEDDING_MODEL")?,
            embedding_dimension: load_env("EMBEDDING_DIMENSION")?
                .parse()
                .map_err(|_| ConfigError::InvalidValue("EMBEDDING_DIMENSION".to_string()))?,
            embedding_url: load_env_optional("EMBEDDING_URL"),
            embedding_api_key: load_env_optional("EMBEDDING_API_KEY"),
            embedding_batch_size: load_parsed_or("EMBEDDING_BATCH_SIZE", 64)?,
            completion_provider: load_env("COMPLETION_PROVIDER")?
                .parse()
                .map_err(|()| ConfigError::InvalidValue("COMPLETION_PROVIDER".to_string()))?,
            completion_model: load_env("COMPLETION_MODEL")?,
            completion_url: load_env_optional("COMPLETION_URL"),
            completion_api_key: load_env_optional("COMPLETION_API_KEY"),
            completion_max_retries: load_parsed_or("COMPLETION_MAX_RETRIES", 2)?,
            completion_timeout_secs: load_parsed_or("COMPLETION_TIMEOUT_SECS", 60)?,
            tesseract_bin: load_env_optional("TESSERACT_BIN").unwrap_or_else(|| "tesseract".into()),
            tesseract_lang: load_env_optional("TESSERACT_LANG").unwrap_or_else(|| "eng".into()),
            pdftoppm_bin: load_env_optional("PDFTOPPM_BIN").unwrap_or_else(|| "pdftoppm".into()),
            pdf_render_dpi: load_parsed_or("PDF_RENDER_DPI", 150)?,
            ocr_timeout_secs: load_parsed_or("OCR_TIMEOUT_SECS", 120)?,
            search_limit: load_parsed_or("SEARCH_LIMIT", 5)?,
            theme_page_concurrency: load_parsed_or("THEME_PAGE_CONCURRENCY", 4)?,
            max_upload_bytes: load_parsed_or("MAX_UPLOAD_BYTES", 50 * 1024 * 1024)?,
        })
    }
}

fn load_env(key: &str) -> Result<String, ConfigError> {
    load_env_optional(key).ok_or_else(|| ConfigError::MissingVariable(key.to_string()))
}

fn load_env_optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn load_parsed_optional<T: FromStr>(key: &str) -> Result<Option<T>, ConfigError> {
    load_env_optional(key)
        .map(|value| {
            value
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidValue(key.to_string()))
        })
        .transpose()
}

fn load_parsed_or<T: FromStr>(key: &str, default: T) -> Result<T, ConfigError> {
    Ok(load_parsed_optional(key)?.unwrap_or(default))
}

impl FromStr for VectorBackend {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "qdrant" => Ok(Self::Qdrant),
            "memory" => Ok(Self::Memory),
            _ => Err(()),
        }
    }
}

impl FromStr for EmbeddingProvider {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "ollama" => Ok(Self::Ollama),
            "openai" => Ok(Self::OpenAI),
            "hash" => Ok(Self::Hash),
            _ => Err(()),
        }
    }
}

impl FromStr for CompletionProvider {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "openai" | "groq" => Ok(Self::OpenAI),
            "ollama" => Ok(Self::Ollama),
            _ => Err(()),
        }
    }
}

/// Global configuration cache populated during process start.
pub static CONFIG: OnceLock<Config> = OnceLock::new();

/// Retrieve the loaded configuration, panicking if initialization has not occurred.
pub fn get_config() -> &'static Config {
    CONFIG.get().expect("Config not initialized")
}

/// Load configuration from the environment and install it in the global cache.
pub fn init_config() -> Result<&'static Config, ConfigError> {
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;
    tracing::debug!(
        vector_backend = ?config.vector_backend,
        qdrant_url = %config.qdrant_url,
        collection = %config.qdrant_collection_name,
        server_port = ?config.server_port,
        embedding_provider = ?config.embedding_provider,
        completion_provider = ?config.completion_provider,
        completion_model = %config.completion_model,
        persistent = config.data_dir.is_some(),
        "Loaded configuration"
    );
    Ok(CONFIG.get_or_init(|| config))
}
