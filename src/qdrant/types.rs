//! Shared types used by the Qdrant client and helpers.

use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;

/// Errors returned while interacting with Qdrant.
#[derive(Debug, Error)]
pub enum QdrantError {
    /// Base URL failed to parse or normalize.
    #[error("Invalid Qdrant URL: {0}")]
    InvalidUrl(String),
    /// HTTP layer failed before receiving a response.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// Qdrant responded with an unexpected status code.
    #[error("Unexpected Qdrant response ({status}): {body}")]
    UnexpectedStatus {
        /// HTTP status returned from Qdrant.
        status: StatusCode,
        /// Body payload associated with the failing response.
        body: String,
    },
    /// A payload could not be serialized for upload.
    #[error("Failed to encode payload: {0}")]
    Encode(#[from] serde_json::Error),
    /// The collection exists with a vector size other than the embedder's.
    #[error("Collection {collection} stores {actual}-dimensional vectors, expected {expected}")]
    DimensionMismatch {
        /// Collection name.
        collection: String,
        /// Size produced by the configured embedder.
        expected: u64,
        /// Size the collection was created with.
        actual: u64,
    },
}

/// Point ready for upload.
#[derive(Debug, Clone)]
pub struct PointStruct {
    /// UUID point identifier.
    pub id: String,
    /// Dense vector.
    pub vector: Vec<f32>,
    /// JSON payload object.
    pub payload: Value,
}

/// Scored payload returned by Qdrant queries.
#[derive(Debug, Clone)]
pub struct ScoredPoint {
    /// Identifier assigned to the vector.
    pub id: String,
    /// Similarity score computed by Qdrant.
    pub score: f32,
    /// Optional payload associated with the vector.
    pub payload: Option<Map<String, Value>>,
}

/// Parts of `GET /collections/{name}` the client inspects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollectionInfo {
    /// Size of the unnamed vector; `None` for named-vector collections.
    pub vector_size: Option<u64>,
}

#[derive(Deserialize)]
pub(crate) struct CollectionResponse {
    #[serde(default)]
    pub(crate) result: CollectionResult,
}

#[derive(Deserialize, Default)]
pub(crate) struct CollectionResult {
    #[serde(default)]
    pub(crate) config: Option<CollectionConfig>,
}

#[derive(Deserialize)]
pub(crate) struct CollectionConfig {
    #[serde(default)]
    pub(crate) params: Option<CollectionParams>,
}

#[derive(Deserialize)]
pub(crate) struct CollectionParams {
    #[serde(default)]
    pub(crate) vectors: Option<Value>,
}

impl From<CollectionResponse> for CollectionInfo {
    fn from(response: CollectionResponse) -> Self {
        let vector_size = response
            .result
            .config
            .and_then(|config| config.params)
            .and_then(|params| params.vectors)
            .and_then(|vectors| vectors.get("size").and_then(Value::as_u64));
        Self { vector_size }
    }
}

#[derive(Deserialize)]
pub(crate) struct QueryResponse {
    pub(crate) result: QueryResponseResult,
}

#[derive(Deserialize)]
#[serde(untagged)]
pub(crate) enum QueryResponseResult {
    Points(Vec<QueryPoint>),
    Object {
        #[serde(default)]
        points: Vec<QueryPoint>,
    },
}

#[derive(Deserialize)]
pub(crate) struct QueryPoint {
    pub(crate) id: Value,
    pub(crate) score: f32,
    #[serde(default)]
    pub(crate) payload: Option<Map<String, Value>>,
}
