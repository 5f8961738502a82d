//! HTTP surface for the blob store.
//!
//! `GET {mount}/{name}` streams a stored blob back, `POST {mount}/{name}`
//! stores the raw request body under `name`. Other methods on a blob route
//! get 405 from the router.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    body::Body,
    extract::{ConnectInfo, DefaultBodyLimit, Path, Request, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use blobstore::{ErrorClass, FileStore, StoreError};
use futures::TryStreamExt;
use tokio_util::io::{ReaderStream, StreamReader};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

/// Shared state for web handlers
#[derive(Clone)]
pub struct WebState {
    pub store: Arc<FileStore>,
    pub start_time: Instant,
}

impl WebState {
    pub fn new(store: FileStore) -> Self {
        Self {
            store: Arc::new(store),
            start_time: Instant::now(),
        }
    }
}

/// Build the application router with blob routes under `mount`.
///
/// `{mount}/` is routed too, so an empty name reaches the store and is
/// rejected there like any other invalid name.
pub fn router(state: WebState, mount: &str) -> Router {
    let mount = normalize_mount(mount);
    let blobs = Router::new()
        .route(
            &format!("{}/{{*name}}", mount),
            get(download_blob).post(upload_blob),
        )
        .route(
            &format!("{}/", mount),
            get(download_unnamed).post(upload_unnamed),
        )
        .layer(DefaultBodyLimit::disable());

    Router::new()
        .route("/health", get(handle_health))
        .merge(blobs)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// `"data/"` becomes `"/data"`; `"/"` and `""` become `""`.
fn normalize_mount(mount: &str) -> String {
    let trimmed = mount.trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{}", trimmed)
    }
}

/// Health check endpoint
pub async fn handle_health(State(state): State<WebState>) -> Json<serde_json::Value> {
    let uptime = state.start_time.elapsed();

    Json(serde_json::json!({
        "status": "healthy",
        "uptime_secs": uptime.as_secs(),
        "version": env!("CARGO_PKG_VERSION"),
        "uploads_in_flight": state.store.registry().in_flight(),
        "upload_capacity": state.store.registry().capacity(),
    }))
}

async fn download_blob(
    State(state): State<WebState>,
    Path(name): Path<String>,
) -> Result<Response, ApiError> {
    fetch_blob(&state, &name).await
}

async fn download_unnamed(State(state): State<WebState>) -> Result<Response, ApiError> {
    fetch_blob(&state, "").await
}

async fn fetch_blob(state: &WebState, name: &str) -> Result<Response, ApiError> {
    let blob = state.store.open(name).await?;

    let body = Body::from_stream(ReaderStream::new(blob.file));

    Ok(Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/octet-stream")
        .header(header::CONTENT_LENGTH, blob.size.to_string())
        .body(body)
        .map_err(|e| {
            error!("Failed to build response: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })
        .unwrap_or_else(|status| status.into_response()))
}

async fn upload_blob(
    State(state): State<WebState>,
    Path(name): Path<String>,
    request: Request,
) -> Result<StatusCode, ApiError> {
    store_blob(&state, name, request).await
}

async fn upload_unnamed(
    State(state): State<WebState>,
    request: Request,
) -> Result<StatusCode, ApiError> {
    store_blob(&state, String::new(), request).await
}

async fn store_blob(
    state: &WebState,
    name: String,
    request: Request,
) -> Result<StatusCode, ApiError> {
    let remote = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.to_string())
        .unwrap_or_else(|| "-".to_string());

    let declared_len = request
        .headers()
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok());

    info!(%name, %remote, declared_len, "upload started");

    let body = request.into_body().into_data_stream().map_err(io::Error::other);
    let reader = StreamReader::new(body);

    match state.store.upload(&name, declared_len, reader).await {
        Ok(receipt) => {
            info!(name = %receipt.name, bytes = receipt.size_bytes, %remote, "upload stored");
            Ok(StatusCode::OK)
        }
        Err(e) => {
            match e.class() {
                ErrorClass::Malformed | ErrorClass::Conflict => {
                    warn!(%name, %remote, error = %e, "upload rejected");
                }
                ErrorClass::Transfer => {
                    warn!(%name, %remote, error = %e, "upload aborted");
                }
                ErrorClass::Internal | ErrorClass::NotFound => {
                    error!(%name, %remote, error = %e, "upload failed");
                }
            }
            Err(ApiError(e))
        }
    }
}

/// A [`StoreError`] rendered as a plain-text HTTP response.
#[derive(Debug)]
pub struct ApiError(pub StoreError);

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        Self(e)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self.0.class() {
            ErrorClass::Malformed | ErrorClass::Conflict => StatusCode::BAD_REQUEST,
            ErrorClass::NotFound => StatusCode::NOT_FOUND,
            ErrorClass::Internal | ErrorClass::Transfer => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), self.0.to_string()).into_response()
    }
}
