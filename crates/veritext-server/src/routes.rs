//! HTTP routes and handlers

use crate::service::{AnalysisResponse, ServiceError, Upload};
use crate::state::AppState;
use crate::static_files;
use axum::{
    extract::{
        multipart::{MultipartError, MultipartRejection},
        rejection::JsonRejection,
        DefaultBodyLimit, Multipart, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use std::any::Any;
use tower_http::{catch_panic::CatchPanicLayer, trace::TraceLayer};
use tracing::{debug, error, warn};
use veritext_models::model_loader::panic_message;

pub fn build_router(state: AppState) -> Router {
    let body_limit = state.max_upload_bytes;

    Router::new()
        .route("/", get(static_files::index))
        .route("/upload", post(upload))
        .route("/analyze_text", post(analyze_text))
        .route("/health", get(health_check))
        .route("/metrics", get(metrics))
        .fallback(static_files::serve_static)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Last-resort 500 for a handler that panicked
fn handle_panic(payload: Box<dyn Any + Send + 'static>) -> Response {
    error!("Request handler panicked: {}", panic_message(payload.as_ref()));
    ServiceError::Unexpected.into_response()
}

async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "models": state.service.model_status(),
    }))
}

async fn metrics(State(state): State<AppState>) -> String {
    state.metrics.render()
}

/// Multipart upload: a `file` part and an optional `ocr_model_type` field
async fn upload(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<AnalysisResponse>, ServiceError> {
    metrics::counter!("veritext_requests_total", "route" => "upload").increment(1);

    let mut multipart = multipart.map_err(|e| {
        warn!("Upload is not a multipart request: {}", e);
        ServiceError::BadRequest("No file part".to_string())
    })?;

    let mut file = None;
    let mut ocr_model_type = None;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("file") => {
                let filename = field.file_name().unwrap_or_default().to_string();
                let data = field.bytes().await.map_err(multipart_error)?;
                file = Some((filename, data));
            }
            Some("ocr_model_type") => {
                ocr_model_type = Some(field.text().await.map_err(multipart_error)?);
            }
            other => debug!("Ignoring multipart field {:?}", other),
        }
    }

    let (filename, data) = file.ok_or_else(|| ServiceError::BadRequest("No file part".to_string()))?;
    if filename.is_empty() {
        return Err(ServiceError::BadRequest("No selected file".to_string()));
    }

    let response = state
        .service
        .analyze_upload(Upload {
            filename,
            data,
            ocr_model_type,
        })
        .await?;

    Ok(Json(response))
}

fn multipart_error(err: MultipartError) -> ServiceError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ServiceError::PayloadTooLarge("File exceeds the maximum upload size".to_string())
    } else {
        warn!("Malformed multipart body: {}", err);
        ServiceError::BadRequest(err.body_text())
    }
}

#[derive(Debug, Deserialize)]
struct AnalyzeTextRequest {
    text: Option<String>,
}

/// Direct text analysis: `{"text": "..."}`
async fn analyze_text(
    State(state): State<AppState>,
    payload: Result<Json<AnalyzeTextRequest>, JsonRejection>,
) -> Result<Json<AnalysisResponse>, ServiceError> {
    metrics::counter!("veritext_requests_total", "route" => "analyze_text").increment(1);

    let text = match payload {
        Ok(Json(AnalyzeTextRequest { text: Some(text) })) => text,
        Ok(_) => return Err(ServiceError::BadRequest("No text provided".to_string())),
        Err(JsonRejection::BytesRejection(e)) if e.status() == StatusCode::PAYLOAD_TOO_LARGE => {
            return Err(ServiceError::PayloadTooLarge(
                "Request exceeds the maximum upload size".to_string(),
            ))
        }
        Err(e) => {
            debug!("Rejected analyze_text body: {}", e);
            return Err(ServiceError::BadRequest("No text provided".to_string()));
        }
    };

    let response = state.service.analyze_text(&text).await?;
    Ok(Json(response))
}
