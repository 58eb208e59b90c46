use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Method, Request, StatusCode, header},
};
use doclens::api::{RouterSettings, create_router};
use doclens::completion::{CompletionClient, CompletionError, CompletionRequest, PromptTemplate};
use doclens::embedding::HashingEmbeddingClient;
use doclens::index::MemoryIndex;
use doclens::model::TenantKey;
use doclens::ocr::{FormFeedRenderer, PlainTextOcr};
use doclens::pipeline::{
    DocumentApi, DocumentService, ServiceError, ServiceParts, ServiceSettings, SourceFile,
    ThemeReport,
};
use doclens::storage::{DocumentStore, LocalDocumentStore, LocalUserStore};
use serde_json::{Value, json};
use tower::ServiceExt;

const DIMENSION: usize = 48;

/// Completion double: echoes cleanup and refinement input, answers with the first context
/// label, and returns well-formed stage records for the theme prompts.
struct OfflineCompletion;

#[async_trait]
impl CompletionClient for OfflineCompletion {
    async fn complete(&self, request: CompletionRequest) -> Result<String, CompletionError> {
        request.render()?;
        let text = |name: &str| request.variable(name).unwrap_or_default().to_string();
        Ok(match request.template {
            PromptTemplate::CleanOcrText => text("text"),
            PromptTemplate::RefineQuery => text("question"),
            PromptTemplate::GroundedAnswer => {
                let context = text("context");
                context.lines().next().unwrap_or("I don't know.").to_string()
            }
            PromptTemplate::PageThemes => json!({
                "page_number": 0,
                "themes": [{ "title": "Topic", "summary": text("page_text"), "evidence": [] }]
            })
            .to_string(),
            PromptTemplate::DocumentThemes => json!({
                "document_title": "",
                "document_themes": [{ "title": "Topic", "summary": "s", "page_references": [1, 2, 3] }]
            })
            .to_string(),
            PromptTemplate::CrossDocumentThemes => {
                let keyed: Value = serde_json::from_str(&text("document_themes"))
                    .map_err(|error| CompletionError::InvalidResponse(error.to_string()))?;
                let titles: Vec<Value> = keyed
                    .as_object()
                    .map(|map| map.values().map(|v| v["document_title"].clone()).collect())
                    .unwrap_or_default();
                json!({
                    "cross_document_themes": [
                        { "title": "Shared", "summary": "s", "document_references": titles }
                    ]
                })
                .to_string()
            }
        })
    }
}

struct Fixture {
    service: Arc<DocumentService>,
    vectors: Arc<MemoryIndex>,
    documents: Arc<LocalDocumentStore>,
}

async fn fixture() -> Fixture {
    let vectors = Arc::new(MemoryIndex::new());
    let documents = Arc::new(LocalDocumentStore::in_memory());
    let service = DocumentService::new(
        ServiceParts {
            ocr: Arc::new(PlainTextOcr),
            renderer: Arc::new(FormFeedRenderer),
            completion: Arc::new(OfflineCompletion),
            embedder: Arc::new(HashingEmbeddingClient::new(DIMENSION)),
            vectors: vectors.clone(),
            documents: documents.clone(),
            users: Arc::new(LocalUserStore::in_memory()),
        },
        ServiceSettings {
            embedding_dimension: DIMENSION,
            embedding_batch_size: 3,
            search_limit: 10,
            theme_page_concurrency: 3,
            jwt_secret: "integration-secret".into(),
            token_lifetime_minutes: 5,
            password_hash_cost: 4,
        },
    );
    service.ensure_ready().await.expect("index ready");
    Fixture {
        service: Arc::new(service),
        vectors,
        documents,
    }
}

fn tenant(name: &str) -> TenantKey {
    TenantKey::new(name).expect("tenant")
}

async fn ingest(fixture: &Fixture, owner: &TenantKey, name: &str, body: &str) -> String {
    fixture
        .service
        .upload_files(owner, vec![SourceFile::new(name, body)])
        .await
        .expect("upload");
    let stored = fixture.documents.list(owner).await.expect("list");
    stored
        .iter()
        .rev()
        .find(|document| document.filename == name)
        .expect("stored document")
        .document_id
        .clone()
}

#[tokio::test]
async fn tenants_never_see_each_others_chunks() {
    let fixture = fixture().await;
    let alice = tenant("alice");
    let bob = tenant("bob");
    let alice_doc = ingest(&fixture, &alice, "alice.pdf", "glacier melt rates\n\nalpine huts").await;
    ingest(&fixture, &bob, "bob.pdf", "glacier melt rates").await;

    let answer = fixture
        .service
        .query(&alice, "glacier melt rates", None)
        .await
        .unwrap();
    assert_eq!(answer.documents.len(), 2);
    assert!(answer.documents.iter().all(|chunk| chunk.document_id == alice_doc));

    // bob filtering on alice's id sees nothing rather than alice's chunks
    let leaked = fixture
        .service
        .query(&bob, "glacier melt rates", Some(vec![alice_doc.clone()]))
        .await
        .unwrap();
    assert!(leaked.documents.is_empty());

    assert!(fixture.service.add_documents(&bob, vec![alice_doc]).await.unwrap().is_empty());
}

#[tokio::test]
async fn paragraphs_keep_page_and_position() {
    let fixture = fixture().await;
    let alice = tenant("alice");
    let document_id = ingest(
        &fixture,
        &alice,
        "report.pdf",
        "intro\n\nscope\x0cfindings\n \nrisks\n\n\nnext steps",
    )
    .await;

    let stored = fixture
        .service
        .add_documents(&alice, vec![document_id.clone()])
        .await
        .unwrap();
    let coordinates: Vec<(u32, u32, &str)> = stored[0]
        .pages
        .iter()
        .flat_map(|page| {
            page.paragraphs
                .iter()
                .map(move |p| (page.page_number, p.paragraph_number, p.refined_text.as_str()))
        })
        .collect();
    assert_eq!(
        coordinates,
        [
            (1, 1, "intro"),
            (1, 2, "scope"),
            (2, 1, "findings"),
            (2, 2, "risks"),
            (2, 3, "next steps"),
        ]
    );
    assert_eq!(fixture.vectors.len().await, 5);

    let answer = fixture
        .service
        .query(&alice, "risks", Some(vec![document_id]))
        .await
        .unwrap();
    let top = &answer.documents[0];
    assert_eq!((top.page, top.paragraph, top.text.as_str()), (2, 2, "risks"));
    assert_eq!(answer.response, "[report.pdf, page 2, paragraph 2]");
}

#[tokio::test]
async fn scoped_delete_leaves_other_documents_indexed() {
    let fixture = fixture().await;
    let alice = tenant("alice");
    let keep = ingest(&fixture, &alice, "keep.png", "kept paragraph").await;
    let drop = ingest(&fixture, &alice, "drop.png", "dropped paragraph\n\nanother").await;
    assert_eq!(fixture.vectors.len().await, 3);

    fixture.service.delete_document(&alice, &drop).await.unwrap();
    assert_eq!(fixture.vectors.len().await, 1);

    let answer = fixture.service.query(&alice, "paragraph", None).await.unwrap();
    assert!(answer.documents.iter().all(|chunk| chunk.document_id == keep));
    let remaining = fixture.service.list_documents(&alice).await.unwrap();
    assert_eq!(remaining.len(), 1);
}

#[tokio::test]
async fn one_bad_file_does_not_sink_the_batch() {
    let fixture = fixture().await;
    let alice = tenant("alice");
    let uploaded = fixture
        .service
        .upload_files(
            &alice,
            vec![
                SourceFile::new("good.png", "readable"),
                SourceFile::new("empty.pdf", ""),
                SourceFile::new("also-good.jpg", "also readable"),
            ],
        )
        .await
        .unwrap();

    assert_eq!(uploaded, ["good.png", "also-good.jpg"]);
    assert_eq!(fixture.service.metrics().files_rejected, 1);
    assert_eq!(fixture.service.metrics().documents_ingested, 2);
}

#[tokio::test]
async fn theme_report_shape_follows_resolved_document_count() {
    let fixture = fixture().await;
    let alice = tenant("alice");
    let first = ingest(&fixture, &alice, "first.pdf", "one\x0ctwo").await;
    let second = ingest(&fixture, &alice, "second.pdf", "three").await;

    let single = fixture
        .service
        .themes(&alice, vec![first.clone(), "unknown".into()])
        .await
        .unwrap();
    match single {
        ThemeReport::Document(themes) => {
            assert_eq!(themes.document_title, "first.pdf");
            assert_eq!(themes.document_themes[0].page_references, [1, 2]);
        }
        other => panic!("expected document themes, got {other:?}"),
    }

    let multi = fixture.service.themes(&alice, vec![first, second]).await.unwrap();
    match multi {
        ThemeReport::CrossDocument(themes) => {
            let mut refs = themes.cross_document_themes[0].document_references.clone();
            refs.sort();
            assert_eq!(refs, ["first.pdf", "second.pdf"]);
        }
        other => panic!("expected cross-document themes, got {other:?}"),
    }

    let missing = fixture.service.themes(&alice, vec!["nope".into()]).await;
    assert!(matches!(missing, Err(ServiceError::NotFound(_))));
}

async fn call(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.expect("response");
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.expect("body");
    (status, serde_json::from_slice(&body).unwrap_or(Value::Null))
}

#[tokio::test]
async fn http_round_trip_from_registration_to_deletion() {
    let fixture = fixture().await;
    let app = create_router(
        fixture.service.clone(),
        &RouterSettings {
            cors_origin: Some("http://localhost:3000".into()),
            max_upload_bytes: 1 << 20,
        },
    );

    let (status, token) = call(
        &app,
        Request::builder()
            .method(Method::POST)
            .uri("/register/")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from("username=dana&password=s3cret"))
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let bearer = format!("Bearer {}", token["access_token"].as_str().expect("token"));

    let boundary = "integration-boundary";
    let multipart = format!(
        "--{boundary}\r\nContent-Disposition: form-data; name=\"files\"; filename=\"notes.png\"\r\n\r\nquarterly revenue grew\r\n--{boundary}--\r\n"
    );
    let (status, body) = call(
        &app,
        Request::builder()
            .method(Method::POST)
            .uri("/uploadfiles/")
            .header(header::AUTHORIZATION, &bearer)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={boundary}"),
            )
            .body(Body::from(multipart))
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "filenames": ["notes.png"] }));

    let (status, body) = call(
        &app,
        Request::builder()
            .uri("/vectorstore/get_documents")
            .header(header::AUTHORIZATION, &bearer)
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let document_id = body["documents"][0]["document_id"]
        .as_str()
        .expect("document id")
        .to_string();

    let (status, body) = call(
        &app,
        Request::builder()
            .method(Method::POST)
            .uri("/query")
            .header(header::AUTHORIZATION, &bearer)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json!({ "query": "revenue" }).to_string()))
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["documents"][0]["text"], "quarterly revenue grew");
    assert_eq!(body["response"], "[notes.png, page 1, paragraph 1]");

    let (status, _) = call(
        &app,
        Request::builder()
            .method(Method::DELETE)
            .uri(format!("/vectorstore/delete_document?document_id={document_id}"))
            .header(header::AUTHORIZATION, &bearer)
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(fixture.vectors.is_empty().await);

    let (status, body) = call(
        &app,
        Request::builder()
            .method(Method::POST)
            .uri("/get_themes")
            .header(header::AUTHORIZATION, &bearer)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json!({ "document_ids": [document_id] }).to_string()))
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["detail"], "No matching documents found");

    let (_, metrics) = call(
        &app,
        Request::builder().uri("/metrics").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(metrics["documents_ingested"], 1);
    assert_eq!(metrics["queries_answered"], 1);
}
