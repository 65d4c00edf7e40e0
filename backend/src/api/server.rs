//! HTTP Server for the bulk registration API.
//!
//! # API Endpoints
//!
//! | Method | Path                                | Description                     |
//! |--------|-------------------------------------|---------------------------------|
//! | GET    | `/`                                 | Service info                    |
//! | GET    | `/health`                           | Registry reachability           |
//! | POST   | `/entities/bulk`                    | Upload CSV and run a batch      |
//! | GET    | `/entities/batch/{batch_id}/status` | Batch progress snapshot         |
//! | POST   | `/entities/validate-csv`            | Validate CSV without submitting |
//! | GET    | `/api/logs[?batch_id=]`             | SSE stream of processing logs   |

use std::{convert::Infallible, net::SocketAddr, sync::Arc, time::Duration};

use axum::{
    extract::{Multipart, Path, Query, State},
    http::{header, Method, StatusCode},
    response::{sse::Event, IntoResponse, Json, Sse},
    routing::{get, post},
    Router,
};
use futures::stream::Stream;
use serde_json::json;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt as _;
use tower_http::cors::CorsLayer;

use super::logs::{LogFilter, LOG_BROADCASTER};
use super::types::{read_csv_upload, ServiceInfo};
use crate::config::Config;
use crate::error::{ServerError, ServerResult};
use crate::models::{BatchSummary, HealthReport, StatusSnapshot, ValidationReport};
use crate::processor::BatchProcessor;
use crate::registry::RegistryClient;
use crate::store::BatchStore;

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub processor: BatchProcessor,
}

/// Build the router over an existing processor
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .expose_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/", get(home))
        .route("/health", get(health))
        .route("/entities/bulk", post(bulk_create))
        .route("/entities/batch/{batch_id}/status", get(batch_status))
        .route("/entities/validate-csv", post(validate_csv))
        .route("/api/logs", get(sse_logs))
        .fallback(not_found)
        .layer(cors)
        .with_state(state)
}

/// Start the HTTP server
pub async fn start_server(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let store = Arc::new(BatchStore::new());
    let registry = Arc::new(RegistryClient::from_config(&config));
    let processor = BatchProcessor::new(store, registry).with_max_rows(config.max_rows);

    let app = router(AppState { processor });

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("🚀 Bulkload server running on http://localhost:{}", config.port);
    tracing::info!("   Registry: {}", config.registry_url);
    tracing::info!("   Row limit: {}", config.max_rows);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn home(State(state): State<AppState>) -> Json<ServiceInfo> {
    Json(ServiceInfo::new(state.processor.max_rows()))
}

async fn health(State(state): State<AppState>) -> Json<HealthReport> {
    Json(state.processor.health().await)
}

/// Upload a CSV and process it as one batch.
///
/// The batch runs on its own task so a dropped connection cannot cut it
/// short.
async fn bulk_create(
    State(state): State<AppState>,
    multipart: Multipart,
) -> ServerResult<Json<BatchSummary>> {
    let upload = read_csv_upload(multipart).await?;
    if upload.bytes.is_empty() {
        return Err(ServerError::BadRequest("File is empty".into()));
    }

    tracing::info!(
        file = upload.file_name.as_deref().unwrap_or("unknown"),
        bytes = upload.bytes.len(),
        "new bulk upload"
    );

    let processor = state.processor.clone();
    let summary = tokio::spawn(async move { processor.submit(&upload.bytes).await })
        .await
        .map_err(|e| ServerError::Internal(e.to_string()))??;

    Ok(Json(summary))
}

async fn batch_status(
    State(state): State<AppState>,
    Path(batch_id): Path<String>,
) -> ServerResult<Json<StatusSnapshot>> {
    Ok(Json(state.processor.store().get_status(&batch_id)?))
}

/// Validation problems are reported in the body, not as HTTP errors.
async fn validate_csv(
    State(state): State<AppState>,
    multipart: Multipart,
) -> ServerResult<Json<ValidationReport>> {
    let upload = read_csv_upload(multipart).await?;
    Ok(Json(state.processor.validate_only(&upload.bytes)))
}

async fn not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, Json(json!({ "error": "Endpoint not found" })))
}

/// Live processing logs. `?batch_id=` narrows the stream to one batch.
async fn sse_logs(
    Query(filter): Query<LogFilter>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = LOG_BROADCASTER.subscribe();

    // Lagged receivers skip the entries they missed.
    let stream = BroadcastStream::new(rx).filter_map(move |result| {
        let entry = result.ok().filter(|entry| filter.accepts(entry))?;
        let json = serde_json::to_string(&entry).ok()?;
        Some(Ok(Event::default().data(json)))
    });

    Sse::new(stream).keep_alive(
        axum::response::sse::KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::logs::{emit, LogEntry, LogLevel};
    use crate::error::RegistryResult;
    use crate::models::{BatchState, EntityRecord};
    use crate::registry::RegistryApi;
    use async_trait::async_trait;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use serde_json::Value;
    use tokio_stream::StreamExt as _;
    use tower::ServiceExt;

    const BOUNDARY: &str = "XBOUNDARYX";

    struct OkRegistry;

    #[async_trait]
    impl RegistryApi for OkRegistry {
        async fn create(&self, record: &EntityRecord, _batch_id: &str) -> RegistryResult<i64> {
            Ok(100 + record.source_row as i64)
        }

        async fn activate(&self, _batch_id: &str) -> bool {
            true
        }

        async fn ping(&self) -> bool {
            true
        }
    }

    fn app() -> (Router, Arc<BatchStore>) {
        let store = Arc::new(BatchStore::new());
        let processor = BatchProcessor::new(store.clone(), Arc::new(OkRegistry));
        (router(AppState { processor }), store)
    }

    fn upload(uri: &str, file_name: &str, content: &str) -> Request<Body> {
        let body = format!(
            "--{b}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{f}\"\r\nContent-Type: text/csv\r\n\r\n{c}\r\n--{b}--\r\n",
            b = BOUNDARY,
            f = file_name,
            c = content
        );
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(Body::from(body))
            .unwrap()
    }

    async fn json_body(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_bulk_create() {
        let (app, store) = app();
        let response = app
            .oneshot(upload("/entities/bulk", "e.csv", "name,address,phone\nA,X,\nB,Y,555"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["total"], 2);
        assert_eq!(body["processed"], 2);
        assert_eq!(body["activated"], true);
        assert_eq!(body["outcomes"][0]["remote_id"], 101);
        assert_eq!(body["outcomes"][1]["status"], "created_and_activated");

        let batch_id = body["batch_id"].as_str().unwrap();
        assert!(store.contains(batch_id));
    }

    #[tokio::test]
    async fn test_bulk_create_rejects_invalid_row() {
        let (app, store) = app();
        let response = app
            .oneshot(upload("/entities/bulk", "e.csv", "name,address\nA,X\n,Y"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["error"], "Row 2: Name is required");
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_bulk_create_rejects_non_csv() {
        let (app, _) = app();
        let response = app
            .oneshot(upload("/entities/bulk", "e.txt", "name,address\nA,X"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["error"], "Only CSV files are allowed");
    }

    #[tokio::test]
    async fn test_bulk_create_rejects_empty_file() {
        let (app, _) = app();
        let response = app
            .oneshot(upload("/entities/bulk", "e.csv", ""))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["error"], "File is empty");
    }

    #[tokio::test]
    async fn test_validate_csv_reports_in_body() {
        let (app, store) = app();
        let response = app
            .clone()
            .oneshot(upload("/entities/validate-csv", "e.csv", "name,address\nA,X"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["valid"], true);
        assert_eq!(body["total"], 1);
        assert_eq!(body["limit"], 20);

        let response = app
            .oneshot(upload("/entities/validate-csv", "e.csv", "title\nA"))
            .await
            .unwrap();
        let body = json_body(response).await;
        assert_eq!(body["valid"], false);
        assert_eq!(body["error"], "Missing required headers: address, name");
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_batch_status() {
        let (app, store) = app();
        store.insert(BatchState::new("known", 2)).unwrap();

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/entities/batch/known/status")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["status"], "processing");
        assert_eq!(body["progress"], 0.0);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/entities/batch/unknown/status")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_health() {
        let (app, _) = app();
        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let body = json_body(response).await;
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["active_batches"], 0);
    }

    #[tokio::test]
    async fn test_unknown_route() {
        let (app, _) = app();
        let response = app
            .oneshot(Request::builder().uri("/nope").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(json_body(response).await["error"], "Endpoint not found");
    }

    #[tokio::test]
    async fn test_log_stream_filters_by_batch() {
        let (app, _) = app();
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/logs?batch_id=stream-mine")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "text/event-stream");

        emit(LogEntry::new(LogLevel::Info, "elsewhere").for_batch("stream-other"));
        emit(LogEntry::new(LogLevel::Error, "unscoped"));
        emit(
            LogEntry::new(LogLevel::Success, "mine")
                .for_batch("stream-mine")
                .for_row(1),
        );

        let mut body = response.into_body().into_data_stream();
        let frame = body.next().await.unwrap().unwrap();
        let text = String::from_utf8(frame.to_vec()).unwrap();
        let entry: LogEntry =
            serde_json::from_str(text.trim().strip_prefix("data: ").unwrap()).unwrap();
        assert_eq!(entry.message, "mine");
        assert_eq!(entry.batch_id.as_deref(), Some("stream-mine"));
        assert_eq!(entry.row, Some(1));
    }
}
