use crate::pipeline::ServiceError;
use axum::{
    Json,
    extract::multipart::{MultipartError, MultipartRejection},
    extract::rejection::{FormRejection, JsonRejection, QueryRejection},
    http::{HeaderValue, StatusCode, header::WWW_AUTHENTICATE},
    response::{IntoResponse, Response},
};
use serde_json::json;

/// Error returned by every handler; renders as `{"detail": ...}`.
#[derive(Debug)]
pub enum ApiError {
    /// A service operation failed.
    Service(ServiceError),
    /// The request could not be decoded.
    Request {
        /// Status chosen by the failing extractor.
        status: StatusCode,
        /// Human-readable reason.
        detail: String,
    },
}

impl ApiError {
    /// Rejection for requests that carry no usable bearer token.
    pub fn unauthenticated() -> Self {
        Self::Service(ServiceError::AuthenticationFailure(
            "Not authenticated".into(),
        ))
    }

    /// Rejection for a malformed request.
    pub fn bad_request(detail: impl Into<String>) -> Self {
        Self::Request {
            status: StatusCode::BAD_REQUEST,
            detail: detail.into(),
        }
    }
}

impl From<ServiceError> for ApiError {
    fn from(error: ServiceError) -> Self {
        Self::Service(error)
    }
}

macro_rules! rejection_into_api_error {
    ($($rejection:ty),+ $(,)?) => {
        $(
            impl From<$rejection> for ApiError {
                fn from(rejection: $rejection) -> Self {
                    Self::Request {
                        status: rejection.status(),
                        detail: rejection.body_text(),
                    }
                }
            }
        )+
    };
}

rejection_into_api_error!(
    FormRejection,
    JsonRejection,
    QueryRejection,
    MultipartRejection,
    MultipartError,
);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, detail) = match self {
            Self::Request { status, detail } => (status, detail),
            Self::Service(error) => {
                let status = match &error {
                    ServiceError::UnsupportedInput(_) => StatusCode::BAD_REQUEST,
                    ServiceError::AuthenticationFailure(_) => StatusCode::UNAUTHORIZED,
                    ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
                    ServiceError::Upstream { context, source } => {
                        tracing::error!(context, error = %source, "Request failed");
                        StatusCode::INTERNAL_SERVER_ERROR
                    }
                };
                (status, error.to_string())
            }
        };

        let mut response = (status, Json(json!({ "detail": detail }))).into_response();
        if status == StatusCode::UNAUTHORIZED {
            response
                .headers_mut()
                .insert(WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn render(error: ApiError) -> (StatusCode, serde_json::Value, Option<HeaderValue>) {
        let response = error.into_response();
        let status = response.status();
        let challenge = response.headers().get(WWW_AUTHENTICATE).cloned();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&body).unwrap(), challenge)
    }

    #[tokio::test]
    async fn upstream_detail_is_the_context_only() {
        let error = ServiceError::upstream("Query failed", "qdrant at 10.0.0.7 refused");
        let (status, body, _) = render(error.into()).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, json!({ "detail": "Query failed" }));
    }

    #[tokio::test]
    async fn authentication_failure_carries_bearer_challenge() {
        let (status, body, challenge) = render(ApiError::unauthenticated()).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["detail"], "Not authenticated");
        assert_eq!(challenge, Some(HeaderValue::from_static("Bearer")));
    }

    #[tokio::test]
    async fn client_errors_map_to_their_status() {
        let (status, _, _) =
            render(ServiceError::UnsupportedInput("Unsupported file type: a.txt".into()).into())
                .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let (status, _, challenge) =
            render(ServiceError::NotFound("No matching documents found".into()).into()).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(challenge.is_none());
    }
}
