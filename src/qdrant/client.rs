//! HTTP client wrapper for interacting with Qdrant.

use crate::config::Config;
use crate::qdrant::types::{
    CollectionInfo, CollectionResponse, PointStruct, QdrantError, QueryResponse,
    QueryResponseResult, ScoredPoint,
};
use reqwest::{Client, Method, StatusCode};
use serde_json::{Value, json};
use std::time::Duration;

/// Lightweight HTTP client for Qdrant operations.
pub struct QdrantService {
    pub(crate) client: Client,
    pub(crate) base_url: String,
    pub(crate) api_key: Option<String>,
}

impl QdrantService {
    /// Construct a new client from the Qdrant settings in `config`.
    pub fn new(config: &Config) -> Result<Self, QdrantError> {
        let client = http_client(Duration::from_secs(config.qdrant_timeout_secs))?;

        let base_url = normalize_base_url(&config.qdrant_url).map_err(QdrantError::InvalidUrl)?;
        tracing::debug!(
            url = %base_url,
            has_api_key = config
                .qdrant_api_key
                .as_deref()
                .is_some_and(|value| !value.is_empty()),
            "Initialized Qdrant HTTP client"
        );

        Ok(Self {
            client,
            base_url,
            api_key: config.qdrant_api_key.clone(),
        })
    }

    /// Create the collection when missing; an existing one must match `vector_size`.
    pub async fn ensure_collection(
        &self,
        collection_name: &str,
        vector_size: u64,
    ) -> Result<(), QdrantError> {
        let Some(info) = self.describe_collection(collection_name).await? else {
            tracing::info!(
                collection = collection_name,
                vector_size,
                "Creating collection"
            );
            return self.create_collection(collection_name, vector_size).await;
        };

        match info.vector_size {
            Some(actual) if actual != vector_size => Err(QdrantError::DimensionMismatch {
                collection: collection_name.to_string(),
                expected: vector_size,
                actual,
            }),
            Some(_) => Ok(()),
            None => {
                tracing::warn!(
                    collection = collection_name,
                    "Collection vector size unknown; assuming it matches"
                );
                Ok(())
            }
        }
    }

    /// Create a collection with the specified vector size and cosine distance.
    pub async fn create_collection(
        &self,
        collection_name: &str,
        vector_size: u64,
    ) -> Result<(), QdrantError> {
        let body = json!({
            "vectors": {
                "size": vector_size,
                "distance": "Cosine"
            }
        });

        let response = self
            .request(Method::PUT, &format!("collections/{collection_name}"))
            .json(&body)
            .send()
            .await?;

        self.ensure_success(response, || {
            tracing::debug!(collection = collection_name, "Collection created");
        })
        .await
    }

    /// Ensure keyword indexes for the tenant partition and the document/chunk identifiers.
    pub async fn ensure_payload_indexes(&self, collection_name: &str) -> Result<(), QdrantError> {
        let fields = [
            ("tenant", json!({ "type": "keyword", "is_tenant": true })),
            ("document_id", json!("keyword")),
            ("chunk_id", json!("keyword")),
        ];

        for (field, schema) in fields {
            let body = json!({
                "field_name": field,
                "field_schema": schema,
            });

            let response = self
                .request(Method::PUT, &format!("collections/{collection_name}/index"))
                .query(&[("wait", true)])
                .json(&body)
                .send()
                .await?;

            if response.status().is_success() {
                tracing::debug!(collection = collection_name, field, "Payload index ensured");
            } else if response.status() == StatusCode::CONFLICT {
                tracing::debug!(
                    collection = collection_name,
                    field,
                    "Payload index already exists"
                );
            } else {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                tracing::error!(
                    collection = collection_name,
                    field,
                    %status,
                    "Failed to ensure payload index"
                );
                return Err(QdrantError::UnexpectedStatus { status, body });
            }
        }

        Ok(())
    }

    /// Insert or overwrite points keyed by their id.
    pub async fn upsert_points(
        &self,
        collection_name: &str,
        points: Vec<PointStruct>,
    ) -> Result<usize, QdrantError> {
        if points.is_empty() {
            return Ok(0);
        }

        let point_count = points.len();
        let serialized: Vec<Value> = points
            .into_iter()
            .map(|point| {
                json!({
                    "id": point.id,
                    "vector": point.vector,
                    "payload": point.payload,
                })
            })
            .collect();

        let response = self
            .request(
                Method::PUT,
                &format!("collections/{collection_name}/points"),
            )
            .query(&[("wait", true)])
            .json(&json!({ "points": serialized }))
            .send()
            .await?;

        self.ensure_success(response, || {
            tracing::debug!(
                collection = collection_name,
                points = point_count,
                "Points upserted"
            );
        })
        .await?;

        Ok(point_count)
    }

    /// Perform a filtered similarity search, returning scored payloads best first.
    pub async fn query_points(
        &self,
        collection_name: &str,
        vector: Vec<f32>,
        filter: Value,
        limit: usize,
    ) -> Result<Vec<ScoredPoint>, QdrantError> {
        let body = json!({
            "query": vector,
            "limit": limit,
            "with_payload": true,
            "filter": filter,
        });

        let response = self
            .request(
                Method::POST,
                &format!("collections/{collection_name}/points/query"),
            )
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let error = QdrantError::UnexpectedStatus { status, body };
            tracing::error!(collection = collection_name, error = %error, "Qdrant search failed");
            return Err(error);
        }

        let payload: QueryResponse = response.json().await?;
        let points = match payload.result {
            QueryResponseResult::Points(points) => points,
            QueryResponseResult::Object { points } => points,
        };

        Ok(points
            .into_iter()
            .map(|point| ScoredPoint {
                id: stringify_point_id(point.id),
                score: point.score,
                payload: point.payload,
            })
            .collect())
    }

    /// Delete every point matching `filter`.
    pub async fn delete_points(
        &self,
        collection_name: &str,
        filter: Value,
    ) -> Result<(), QdrantError> {
        let response = self
            .request(
                Method::POST,
                &format!("collections/{collection_name}/points/delete"),
            )
            .query(&[("wait", true)])
            .json(&json!({ "filter": filter }))
            .send()
            .await?;

        self.ensure_success(response, || {
            tracing::debug!(collection = collection_name, "Points deleted by filter");
        })
        .await
    }

    /// Collection details, or `None` when the collection does not exist.
    pub async fn describe_collection(
        &self,
        collection_name: &str,
    ) -> Result<Option<CollectionInfo>, QdrantError> {
        let response = self
            .request(Method::GET, &format!("collections/{collection_name}"))
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => {
                let body: CollectionResponse = response.json().await?;
                Ok(Some(body.into()))
            }
            StatusCode::NOT_FOUND => Ok(None),
            status => {
                let body = response.text().await.unwrap_or_default();
                let error = QdrantError::UnexpectedStatus { status, body };
                tracing::error!(collection = collection_name, error = %error, "Collection lookup failed");
                Err(error)
            }
        }
    }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let url = format_endpoint(&self.base_url, path);
        let mut req = self.client.request(method, url);
        if let Some(api_key) = &self.api_key
            && !api_key.is_empty()
        {
            req = req.header("api-key", api_key);
        }
        req
    }

    async fn ensure_success<F>(
        &self,
        response: reqwest::Response,
        on_success: F,
    ) -> Result<(), QdrantError>
    where
        F: FnOnce(),
    {
        if response.status().is_success() {
            on_success();
            Ok(())
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let error = QdrantError::UnexpectedStatus { status, body };
            tracing::error!(error = %error, "Qdrant request failed");
            Err(error)
        }
    }
}

fn normalize_base_url(url: &str) -> Result<String, String> {
    let mut parsed = reqwest::Url::parse(url).map_err(|err| err.to_string())?;
    let path = parsed.path().trim_end_matches('/').to_string();
    parsed.set_path(&path);
    Ok(parsed.to_string())
}

fn format_endpoint(base: &str, path: &str) -> String {
    let base = base.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    format!("{base}/{path}")
}

fn http_client(timeout: Duration) -> Result<Client, QdrantError> {
    Ok(Client::builder()
        .user_agent("doclens/0.1")
        .timeout(timeout)
        .build()?)
}

fn stringify_point_id(id: Value) -> String {
    match id {
        Value::String(text) => text,
        Value::Number(number) => number.to_string(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
