//! HTTP surface for doclens.
//!
//! This module exposes an Axum router over a [`DocumentApi`]:
//!
//! - `GET /` – Liveness probe.
//! - `POST /register`, `POST /login` – Form credentials in, bearer token out.
//! - `POST /uploadfiles` – Multipart PDFs/images; OCR, normalize, store, and index each file.
//! - `POST /vectorstore/add-documents` – The caller's stored documents among the given ids.
//! - `GET /vectorstore/get_documents` – Every stored document of the caller.
//! - `DELETE /vectorstore/delete_document?document_id=` – Remove a document everywhere.
//! - `POST /query` – Refine, retrieve, and answer within the caller's corpus.
//! - `POST /get_themes` – Page, document, and cross-document theme synthesis.
//! - `GET /metrics` – Ingestion and retrieval counters.
//!
//! Every route except `/`, `/register`, `/login`, and `/metrics` requires
//! `Authorization: Bearer <token>`. Errors are rendered as `{"detail": "..."}`.

mod error;
mod extract;

pub use error::ApiError;
pub use extract::Caller;

use crate::auth::Token;
use crate::config::Config;
use crate::metrics::MetricsSnapshot;
use crate::model::Document;
use crate::pipeline::{DocumentApi, QueryAnswer, ServiceError, SourceFile, ThemeReport};
use axum::{
    Form, Json, Router,
    extract::{DefaultBodyLimit, Multipart, Query, State},
    extract::multipart::MultipartRejection,
    extract::rejection::{FormRejection, JsonRejection, QueryRejection},
    http::{HeaderValue, StatusCode},
    routing::{delete, get, post},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Router-level options.
#[derive(Debug, Clone)]
pub struct RouterSettings {
    /// Single allowed CORS origin; any origin when absent.
    pub cors_origin: Option<String>,
    /// Request body limit, sized for multipart uploads.
    pub max_upload_bytes: usize,
}

impl RouterSettings {
    /// Options taken from `config`.
    pub fn from_config(config: &Config) -> Self {
        Self {
            cors_origin: config.cors_origin.clone(),
            max_upload_bytes: config.max_upload_bytes,
        }
    }
}

/// Build the HTTP router exposing the document API surface.
pub fn create_router<S>(service: Arc<S>, settings: &RouterSettings) -> Router
where
    S: DocumentApi + 'static,
{
    Router::new()
        .route("/", get(root))
        .route("/register", post(register::<S>))
        .route("/register/", post(register::<S>))
        .route("/login", post(login::<S>))
        .route("/uploadfiles", post(upload_files::<S>))
        .route("/uploadfiles/", post(upload_files::<S>))
        .route("/vectorstore/add-documents", post(add_documents::<S>))
        .route("/vectorstore/get_documents", get(get_documents::<S>))
        .route("/vectorstore/delete_document", delete(delete_document::<S>))
        .route("/query", post(query::<S>))
        .route("/get_themes", post(get_themes::<S>))
        .route("/metrics", get(get_metrics::<S>))
        .layer(DefaultBodyLimit::max(settings.max_upload_bytes))
        .layer(cors_layer(settings.cors_origin.as_deref()))
        .layer(TraceLayer::new_for_http())
        .with_state(service)
}

fn cors_layer(origin: Option<&str>) -> CorsLayer {
    let Some(origin) = origin else {
        return CorsLayer::permissive();
    };
    match origin.parse::<HeaderValue>() {
        Ok(origin) => CorsLayer::new()
            .allow_origin(origin)
            .allow_methods(Any)
            .allow_headers(Any),
        Err(error) => {
            tracing::warn!(origin, error = %error, "Ignoring unparsable CORS origin; cross-origin requests are refused");
            CorsLayer::new()
        }
    }
}

#[derive(Serialize)]
struct MessageResponse {
    message: &'static str,
}

async fn root() -> Json<MessageResponse> {
    Json(MessageResponse {
        message: "Hello World",
    })
}

/// Form body shared by `/login` and `/register`.
#[derive(Deserialize)]
struct Credentials {
    username: String,
    password: String,
}

async fn register<S>(
    State(service): State<Arc<S>>,
    form: Result<Form<Credentials>, FormRejection>,
) -> Result<(StatusCode, Json<Token>), ApiError>
where
    S: DocumentApi,
{
    let Form(credentials) = form?;
    let token = service
        .register(&credentials.username, &credentials.password)
        .await?;
    tracing::info!(username = %credentials.username, "Registered account");
    Ok((StatusCode::CREATED, Json(token)))
}

async fn login<S>(
    State(service): State<Arc<S>>,
    form: Result<Form<Credentials>, FormRejection>,
) -> Result<Json<Token>, ApiError>
where
    S: DocumentApi,
{
    let Form(credentials) = form?;
    let token = service
        .login(&credentials.username, &credentials.password)
        .await?;
    Ok(Json(token))
}

#[derive(Serialize)]
struct UploadResponse {
    filenames: Vec<String>,
}

/// Accept every multipart field that carries a filename; other fields are ignored.
async fn upload_files<S>(
    State(service): State<Arc<S>>,
    Caller(tenant): Caller,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<UploadResponse>, ApiError>
where
    S: DocumentApi + 'static,
{
    let mut multipart = multipart?;
    let mut files = Vec::new();
    while let Some(field) = multipart.next_field().await? {
        let Some(filename) = field.file_name().map(str::to_string) else {
            continue;
        };
        let bytes = field.bytes().await?;
        files.push(SourceFile::new(filename, bytes.to_vec()));
    }
    if files.is_empty() {
        return Err(ApiError::bad_request("No files uploaded"));
    }

    tracing::info!(tenant = %tenant, files = files.len(), "Upload received");
    let filenames = service.upload_files(&tenant, files).await?;
    Ok(Json(UploadResponse { filenames }))
}

/// `{"document_ids": [...]}` or a bare JSON array of ids.
#[derive(Deserialize)]
#[serde(untagged)]
enum DocumentIdsBody {
    Wrapped { document_ids: Vec<String> },
    Bare(Vec<String>),
}

impl DocumentIdsBody {
    fn into_ids(self) -> Vec<String> {
        match self {
            Self::Wrapped { document_ids } | Self::Bare(document_ids) => document_ids,
        }
    }
}

async fn add_documents<S>(
    State(service): State<Arc<S>>,
    Caller(tenant): Caller,
    body: Result<Json<DocumentIdsBody>, JsonRejection>,
) -> Result<Json<Vec<Document>>, ApiError>
where
    S: DocumentApi + 'static,
{
    let Json(body) = body?;
    let documents = service.add_documents(&tenant, body.into_ids()).await?;
    Ok(Json(documents))
}

#[derive(Serialize)]
struct DocumentsResponse {
    documents: Vec<Document>,
}

async fn get_documents<S>(
    State(service): State<Arc<S>>,
    Caller(tenant): Caller,
) -> Result<Json<DocumentsResponse>, ApiError>
where
    S: DocumentApi + 'static,
{
    let documents = service.list_documents(&tenant).await?;
    Ok(Json(DocumentsResponse { documents }))
}

#[derive(Deserialize)]
struct DeleteParams {
    document_id: String,
}

#[derive(Serialize)]
struct StatusResponse {
    status: &'static str,
}

async fn delete_document<S>(
    State(service): State<Arc<S>>,
    Caller(tenant): Caller,
    params: Result<Query<DeleteParams>, QueryRejection>,
) -> Result<Json<StatusResponse>, ApiError>
where
    S: DocumentApi + 'static,
{
    let Query(params) = params?;
    service.delete_document(&tenant, &params.document_id).await?;
    Ok(Json(StatusResponse {
        status: "Document deleted successfully",
    }))
}

#[derive(Deserialize)]
struct QueryRequest {
    query: String,
    #[serde(default)]
    document_ids: Option<Vec<String>>,
}

async fn query<S>(
    State(service): State<Arc<S>>,
    Caller(tenant): Caller,
    body: Result<Json<QueryRequest>, JsonRejection>,
) -> Result<Json<QueryAnswer>, ApiError>
where
    S: DocumentApi + 'static,
{
    let Json(request) = body?;
    let answer = service
        .query(&tenant, &request.query, request.document_ids)
        .await?;
    Ok(Json(answer))
}

#[derive(Deserialize)]
struct ThemesRequest {
    document_ids: Vec<String>,
}

#[derive(Serialize)]
struct ThemesResponse {
    themes: ThemeReport,
}

async fn get_themes<S>(
    State(service): State<Arc<S>>,
    Caller(tenant): Caller,
    body: Result<Json<ThemesRequest>, JsonRejection>,
) -> Result<Json<ThemesResponse>, ApiError>
where
    S: DocumentApi + 'static,
{
    let Json(request) = body?;
    if request.document_ids.is_empty() {
        return Err(ServiceError::UnsupportedInput("document_ids must not be empty".into()).into());
    }
    let themes = service.themes(&tenant, request.document_ids).await?;
    Ok(Json(ThemesResponse { themes }))
}

async fn get_metrics<S>(State(service): State<Arc<S>>) -> Json<MetricsSnapshot>
where
    S: DocumentApi,
{
    Json(service.metrics())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TenantKey;
    use crate::pipeline::{DocumentTheme, DocumentThemes, RetrievedChunk};
    use async_trait::async_trait;
    use axum::{
        body::{Body, to_bytes},
        http::{Method, Request, header},
    };
    use serde_json::{Value, json};
    use tokio::sync::Mutex;
    use tower::ServiceExt;

    const BOUNDARY: &str = "doclens-test-boundary";

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        Upload(String, Vec<(String, Vec<u8>)>),
        AddDocuments(String, Vec<String>),
        Query(String, String, Option<Vec<String>>),
        Delete(String, String),
        Themes(String, Vec<String>),
    }

    #[derive(Default)]
    struct StubApi {
        calls: Mutex<Vec<Call>>,
    }

    impl StubApi {
        async fn calls(&self) -> Vec<Call> {
            self.calls.lock().await.clone()
        }

        async fn record(&self, call: Call) {
            self.calls.lock().await.push(call);
        }
    }

    fn token_for(username: &str) -> Token {
        Token {
            access_token: format!("token-{username}"),
            token_type: "bearer".into(),
        }
    }

    #[async_trait]
    impl DocumentApi for StubApi {
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
            let names = files.iter().map(|file| file.filename.clone()).collect();
            self.record(Call::Upload(
                tenant.to_string(),
                files.into_iter().map(|file| (file.filename, file.bytes)).collect(),
            ))
            .await;
            Ok(names)
        }

        async fn register(&self, username: &str, _password: &str) -> Result<Token, ServiceError> {
            if username == "taken" {
                return Err(ServiceError::upstream(
                    "Registration failed",
                    "record already exists: taken",
                ));
            }
            Ok(token_for(username))
        }

        async fn login(&self, username: &str, password: &str) -> Result<Token, ServiceError> {
            if password != "hunter2" {
                return Err(ServiceError::AuthenticationFailure(
                    "Incorrect username or password".into(),
                ));
            }
            Ok(token_for(username))
        }

        fn authenticate(&self, token: &str) -> Result<TenantKey, ServiceError> {
            token
                .strip_prefix("token-")
                .and_then(|name| TenantKey::new(name).ok())
                .ok_or_else(|| {
                    ServiceError::AuthenticationFailure("Could not validate credentials".into())
                })
        }

        async fn add_documents(
            &self,
            tenant: &TenantKey,
            document_ids: Vec<String>,
        ) -> Result<Vec<Document>, ServiceError> {
            self.record(Call::AddDocuments(tenant.to_string(), document_ids))
                .await;
            Ok(Vec::new())
        }

        async fn list_documents(
            &self,
            tenant: &TenantKey,
        ) -> Result<Vec<Document>, ServiceError> {
            Ok(vec![Document {
                document_id: "doc-1".into(),
                filename: "report.pdf".into(),
                owner: tenant.clone(),
                uploaded_at: "2026-01-01T00:00:00Z".into(),
                pages: Vec::new(),
            }])
        }

        async fn query(
            &self,
            tenant: &TenantKey,
            question: &str,
            document_ids: Option<Vec<String>>,
        ) -> Result<QueryAnswer, ServiceError> {
            self.record(Call::Query(
                tenant.to_string(),
                question.to_string(),
                document_ids,
            ))
            .await;
            if question == "explode" {
                return Err(ServiceError::upstream("Query failed", "model at 10.1.1.1 timed out"));
            }
            Ok(QueryAnswer {
                documents: vec![RetrievedChunk {
                    text: "Paris is the capital.".into(),
                    score: 0.9,
                    document_id: "doc-1".into(),
                    filename: "atlas.pdf".into(),
                    page: 1,
                    paragraph: 2,
                }],
                response: "Paris.".into(),
            })
        }

        async fn delete_document(
            &self,
            tenant: &TenantKey,
            document_id: &str,
        ) -> Result<(), ServiceError> {
            self.record(Call::Delete(tenant.to_string(), document_id.to_string()))
                .await;
            Ok(())
        }

        async fn themes(
            &self,
            tenant: &TenantKey,
            document_ids: Vec<String>,
        ) -> Result<ThemeReport, ServiceError> {
            self.record(Call::Themes(tenant.to_string(), document_ids.clone()))
                .await;
            if document_ids.iter().any(|id| id == "foreign") {
                return Err(ServiceError::NotFound("No matching documents found".into()));
            }
            Ok(ThemeReport::Document(DocumentThemes {
                document_title: "report.pdf".into(),
                document_themes: vec![DocumentTheme {
                    title: "Budget".into(),
                    summary: "Spending plans".into(),
                    page_references: vec![1, 3],
                }],
            }))
        }

        fn metrics(&self) -> MetricsSnapshot {
            MetricsSnapshot {
                documents_ingested: 4,
                ..MetricsSnapshot::default()
            }
        }
    }

    fn app() -> (Router, Arc<StubApi>) {
        let service = Arc::new(StubApi::default());
        let settings = RouterSettings {
            cors_origin: None,
            max_upload_bytes: 1024 * 1024,
        };
        (create_router(service.clone(), &settings), service)
    }

    async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.oneshot(request).await.expect("router response");
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body bytes");
        let json = if body.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body).expect("json body")
        };
        (status, json)
    }

    fn authed(method: Method, uri: &str) -> axum::http::request::Builder {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::AUTHORIZATION, "Bearer token-alice")
    }

    fn json_request(method: Method, uri: &str, body: Value) -> Request<Body> {
        authed(method, uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .expect("request")
    }

    fn form_request(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body.to_string()))
            .expect("request")
    }

    fn multipart_body(files: &[(&str, &str)]) -> String {
        let mut body = String::new();
        for (filename, contents) in files {
            body.push_str(&format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"files\"; filename=\"{filename}\"\r\nContent-Type: application/octet-stream\r\n\r\n{contents}\r\n"
            ));
        }
        body.push_str(&format!("--{BOUNDARY}--\r\n"));
        body
    }

    fn upload_request(files: &[(&str, &str)]) -> Request<Body> {
        authed(Method::POST, "/uploadfiles")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(multipart_body(files)))
            .expect("request")
    }

    #[tokio::test]
    async fn root_reports_liveness() {
        let (app, _) = app();
        let (status, body) = send(
            app,
            Request::builder().uri("/").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "message": "Hello World" }));
    }

    #[tokio::test]
    async fn protected_routes_require_a_bearer_token() {
        let (app, service) = app();
        let (status, body) = send(
            app.clone(),
            Request::builder()
                .uri("/vectorstore/get_documents")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["detail"], "Not authenticated");

        let (status, body) = send(
            app,
            Request::builder()
                .method(Method::POST)
                .uri("/query")
                .header(header::AUTHORIZATION, "Bearer forged")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json!({ "query": "hi" }).to_string()))
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["detail"], "Could not validate credentials");
        assert!(service.calls().await.is_empty());
    }

    #[tokio::test]
    async fn register_returns_created_on_both_paths() {
        let (app, _) = app();
        let (status, body) = send(app.clone(), form_request("/register", "username=alice&password=pw")).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body, json!({ "access_token": "token-alice", "token_type": "bearer" }));

        let (status, _) = send(app.clone(), form_request("/register/", "username=bob&password=pw")).await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, body) = send(app, form_request("/register", "username=taken&password=pw")).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["detail"], "Registration failed");
    }

    #[tokio::test]
    async fn login_rejects_bad_credentials() {
        let (app, _) = app();
        let (status, body) = send(app.clone(), form_request("/login", "username=alice&password=hunter2")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["access_token"], "token-alice");

        let (status, body) = send(app, form_request("/login", "username=alice&password=nope")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["detail"], "Incorrect username or password");
    }

    #[tokio::test]
    async fn upload_forwards_every_file_for_the_caller() {
        let (app, service) = app();
        let (status, body) = send(
            app,
            upload_request(&[("scan.png", "first image"), ("report.pdf", "pdf bytes")]),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "filenames": ["scan.png", "report.pdf"] }));
        assert_eq!(
            service.calls().await,
            vec![Call::Upload(
                "alice".into(),
                vec![
                    ("scan.png".into(), b"first image".to_vec()),
                    ("report.pdf".into(), b"pdf bytes".to_vec()),
                ],
            )]
        );
    }

    #[tokio::test]
    async fn upload_with_unsupported_file_is_a_bad_request() {
        let (app, _) = app();
        let (status, body) = send(app, upload_request(&[("notes.txt", "plain")])).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["detail"], "Unsupported file type: notes.txt");
    }

    #[tokio::test]
    async fn add_documents_accepts_wrapped_and_bare_ids() {
        let (app, service) = app();
        let (status, body) = send(
            app.clone(),
            json_request(
                Method::POST,
                "/vectorstore/add-documents",
                json!({ "document_ids": ["a", "b"] }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!([]));

        let (status, _) = send(
            app,
            json_request(Method::POST, "/vectorstore/add-documents", json!(["c"])),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        assert_eq!(
            service.calls().await,
            vec![
                Call::AddDocuments("alice".into(), vec!["a".into(), "b".into()]),
                Call::AddDocuments("alice".into(), vec!["c".into()]),
            ]
        );
    }

    #[tokio::test]
    async fn get_documents_wraps_the_list() {
        let (app, _) = app();
        let (status, body) = send(
            app,
            authed(Method::GET, "/vectorstore/get_documents")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["documents"][0]["document_id"], "doc-1");
        assert_eq!(body["documents"][0]["username"], "alice");
    }

    #[tokio::test]
    async fn query_passes_optional_document_filter() {
        let (app, service) = app();
        let (status, body) = send(
            app.clone(),
            json_request(Method::POST, "/query", json!({ "query": "capital?" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["response"], "Paris.");
        assert_eq!(body["documents"][0]["filename"], "atlas.pdf");
        assert_eq!(body["documents"][0]["paragraph"], 2);

        send(
            app,
            json_request(
                Method::POST,
                "/query",
                json!({ "query": "capital?", "document_ids": ["doc-1"] }),
            ),
        )
        .await;

        assert_eq!(
            service.calls().await,
            vec![
                Call::Query("alice".into(), "capital?".into(), None),
                Call::Query("alice".into(), "capital?".into(), Some(vec!["doc-1".into()])),
            ]
        );
    }

    #[tokio::test]
    async fn upstream_failure_hides_internal_detail() {
        let (app, _) = app();
        let (status, body) = send(
            app,
            json_request(Method::POST, "/query", json!({ "query": "explode" })),
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, json!({ "detail": "Query failed" }));
    }

    #[tokio::test]
    async fn malformed_json_is_a_client_error() {
        let (app, _) = app();
        let (status, body) = send(
            app,
            authed(Method::POST, "/query")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from("{\"question\": 1}"))
                .unwrap(),
        )
        .await;
        assert!(status.is_client_error());
        assert!(body["detail"].is_string());
    }

    #[tokio::test]
    async fn delete_reads_the_document_id_from_the_query_string() {
        let (app, service) = app();
        let (status, body) = send(
            app.clone(),
            authed(Method::DELETE, "/vectorstore/delete_document?document_id=doc-9")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "status": "Document deleted successfully" }));
        assert_eq!(
            service.calls().await,
            vec![Call::Delete("alice".into(), "doc-9".into())]
        );

        let (status, _) = send(
            app,
            authed(Method::DELETE, "/vectorstore/delete_document")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn themes_render_report_and_not_found() {
        let (app, _) = app();
        let (status, body) = send(
            app.clone(),
            json_request(Method::POST, "/get_themes", json!({ "document_ids": ["doc-1"] })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["themes"]["document_title"], "report.pdf");
        assert_eq!(body["themes"]["document_themes"][0]["page_references"], json!([1, 3]));

        let (status, body) = send(
            app.clone(),
            json_request(Method::POST, "/get_themes", json!({ "document_ids": ["foreign"] })),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["detail"], "No matching documents found");

        let (status, _) = send(
            app,
            json_request(Method::POST, "/get_themes", json!({ "document_ids": [] })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn metrics_are_public() {
        let (app, _) = app();
        let (status, body) = send(
            app,
            Request::builder().uri("/metrics").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["documents_ingested"], 4);
    }
}
