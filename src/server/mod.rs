//! HTTP surface: health check and multipart prediction.

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::inference::InferenceService;

const HEALTH_MESSAGE: &str = "Emotion recognition API is running";
const MAX_UPLOAD_BYTES: usize = 32 * 1024 * 1024;

#[derive(Serialize)]
struct HealthResponse {
    message: &'static str,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

fn bad_request(error: impl Into<String>) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse {
            error: error.into(),
        }),
    )
        .into_response()
}

pub fn router(service: Arc<InferenceService>) -> Router {
    Router::new()
        .route("/", get(health))
        .route("/predict", post(predict))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .with_state(service)
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        message: HEALTH_MESSAGE,
    })
}

/// POST /predict - one audio file in the `file` field (multipart/form-data)
async fn predict(
    State(service): State<Arc<InferenceService>>,
    mut multipart: Multipart,
) -> Response {
    let mut data: Option<Vec<u8>> = None;
    let mut extension: Option<String> = None;

    while let Ok(Some(field)) = multipart.next_field().await {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field.file_name().map(|s| s.to_string());
        match field.bytes().await {
            Ok(bytes) => {
                debug!(?filename, bytes = bytes.len(), "received upload");
                extension = filename.as_deref().and_then(upload_extension);
                data = Some(bytes.to_vec());
            }
            Err(e) => {
                warn!("Failed to read upload: {}", e);
                return bad_request("Failed to read file");
            }
        }
    }

    let data = match data {
        Some(d) if !d.is_empty() => d,
        _ => return bad_request("No file data provided"),
    };

    let result =
        tokio::task::spawn_blocking(move || service.predict_upload(data, extension.as_deref()))
            .await;
    match result {
        Ok(Ok(prediction)) => {
            info!(label = %prediction.label, "prediction served");
            Json(prediction).into_response()
        }
        Ok(Err(e)) => {
            warn!("Prediction failed: {}", e);
            bad_request(e.to_string())
        }
        Err(e) => {
            warn!("Prediction task failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: "Prediction task failed".to_string(),
                }),
            )
                .into_response()
        }
    }
}

/// Lower-cased extension of an uploaded file name, if it has one.
fn upload_extension(filename: &str) -> Option<String> {
    Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty())
        .map(str::to_ascii_lowercase)
}

pub async fn run_server(addr: SocketAddr, service: InferenceService) -> Result<()> {
    let app = router(Arc::new(service));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("Listening on {}", addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}
