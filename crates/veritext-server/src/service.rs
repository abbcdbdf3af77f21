//! Request orchestration: stage, extract, OCR, classify

use crate::staging::{sanitize_filename, Staging};
use axum::{
    body::Bytes,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use veritext_core::{DetectionResult, Error, OcrVariant};
use veritext_extract::{extension_of, Extraction, Extractor};
use veritext_models::{AiDetector, TextRecognizer};

const NO_TEXT_MESSAGE: &str = "No text content found or extracted to analyze.";
const DETECTOR_UNAVAILABLE_MESSAGE: &str =
    "AI detection model is currently unavailable. Please try again later.";
const SUCCESS_MESSAGE: &str = "Content analyzed successfully.";

/// Errors surfaced to HTTP clients
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// Caller input problem (400)
    #[error("{0}")]
    BadRequest(String),

    /// Request body over the configured limit (413)
    #[error("{0}")]
    PayloadTooLarge(String),

    /// A model could not be loaded (503)
    #[error("{0}")]
    Unavailable(String),

    /// A processing stage failed (500)
    #[error("{0}")]
    Processing(String),

    /// Anything else (500); details are only logged
    #[error("An unexpected error occurred during file processing.")]
    Unexpected,
}

impl ServiceError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Processing(_) | Self::Unexpected => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "bad_request",
            Self::PayloadTooLarge(_) => "payload_too_large",
            Self::Unavailable(_) => "unavailable",
            Self::Processing(_) => "processing",
            Self::Unexpected => "unexpected",
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        metrics::counter!("veritext_errors_total", "kind" => self.kind()).increment(1);

        let body = json!({ "error": self.to_string() });
        (self.status(), Json(body)).into_response()
    }
}

/// Successful analysis response
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisResponse {
    pub message: &'static str,
    pub analysis: DetectionResult,
}

impl AnalysisResponse {
    fn new(analysis: DetectionResult) -> Self {
        Self {
            message: SUCCESS_MESSAGE,
            analysis,
        }
    }
}

/// A file received through the upload form
#[derive(Debug, Clone)]
pub struct Upload {
    /// Filename as sent by the client
    pub filename: String,
    pub data: Bytes,
    /// Raw `ocr_model_type` form value
    pub ocr_model_type: Option<String>,
}

/// Model residency, reported by `/health`
#[derive(Debug, Clone, Serialize)]
pub struct ModelStatus {
    pub detector: DetectorStatus,
    pub ocr_loaded: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DetectorStatus {
    pub model: String,
    pub loaded: bool,
}

/// Runs uploads and pasted text through extraction, OCR and detection
pub struct DetectionService {
    extractor: Extractor,
    recognizer: Arc<dyn TextRecognizer>,
    detector: Arc<dyn AiDetector>,
    staging: Staging,
    default_ocr_variant: OcrVariant,
}

impl DetectionService {
    pub fn new(
        extractor: Extractor,
        recognizer: Arc<dyn TextRecognizer>,
        detector: Arc<dyn AiDetector>,
        staging: Staging,
        default_ocr_variant: OcrVariant,
    ) -> Self {
        Self {
            extractor,
            recognizer,
            detector,
            staging,
            default_ocr_variant,
        }
    }

    pub fn staging(&self) -> &Staging {
        &self.staging
    }

    /// Extract text from an uploaded file and classify it
    #[instrument(skip(self, upload), fields(filename = %upload.filename, bytes = upload.data.len()))]
    pub async fn analyze_upload(&self, upload: Upload) -> Result<AnalysisResponse, ServiceError> {
        let filename = sanitize_filename(&upload.filename);
        let extension = extension_of(&filename).map(str::to_ascii_lowercase);

        if self.extractor.file_kind(extension.as_deref()).is_none() {
            warn!("Rejected upload {:?}: file type not allowed", upload.filename);
            return Err(ServiceError::BadRequest(Error::UnsupportedFileType.to_string()));
        }
        let extension = extension.unwrap_or_default();

        let staged = self
            .staging
            .stage(&extension, &upload.data)
            .await
            .map_err(|e| {
                error!("Failed to stage upload {}: {}", filename, e);
                ServiceError::Unexpected
            })?;
        info!("File saved temporarily to {}", staged.path().display());

        let extraction = match self.extractor.extract(staged.path(), Some(&extension)).await {
            Ok(extraction) => extraction,
            Err(e) if e.is_client_error() => {
                warn!("Extraction failed for {}: {}", filename, e);
                return Err(ServiceError::BadRequest(e.to_string()));
            }
            Err(e) => {
                error!("Unexpected extraction failure for {}: {}", filename, e);
                return Err(ServiceError::Unexpected);
            }
        };

        let text = match extraction {
            Extraction::Text(text) => text,
            Extraction::Image(path) => {
                let variant = self.ocr_variant(upload.ocr_model_type.as_deref())?;
                info!("Performing {} OCR on {}", variant.as_str(), filename);

                match self.recognizer.recognize(&path, variant).await {
                    Ok(text) => text,
                    Err(e @ Error::Internal(_)) => {
                        error!("Unexpected OCR failure for {}: {}", filename, e);
                        return Err(ServiceError::Unexpected);
                    }
                    Err(e) => {
                        error!("OCR failed for {}: {}", filename, e);
                        return Err(ServiceError::Processing(format!("OCR failed: {}", e)));
                    }
                }
            }
        };

        staged.remove().await;
        self.analyze_text(&text).await
    }

    /// Classify text that is already in hand
    #[instrument(skip(self, text), fields(chars = text.len()))]
    pub async fn analyze_text(&self, text: &str) -> Result<AnalysisResponse, ServiceError> {
        if text.trim().is_empty() {
            return Err(ServiceError::BadRequest(NO_TEXT_MESSAGE.to_string()));
        }

        match self.detector.detect(text).await {
            Ok(result) => {
                info!(
                    "Analysis complete: {} (AI {:.4})",
                    result.prediction, result.ai_probability
                );
                Ok(AnalysisResponse::new(result))
            }
            Err(e @ Error::ModelUnavailable { .. }) => {
                error!("AI detector unavailable: {}", e);
                Err(ServiceError::Unavailable(DETECTOR_UNAVAILABLE_MESSAGE.to_string()))
            }
            Err(e @ Error::Internal(_)) => {
                error!("Unexpected AI detection failure: {}", e);
                Err(ServiceError::Unexpected)
            }
            Err(e) => {
                error!("AI detection failed: {}", e);
                Err(ServiceError::Processing(format!("AI detection failed: {}", e)))
            }
        }
    }

    /// Current model residency
    pub fn model_status(&self) -> ModelStatus {
        ModelStatus {
            detector: DetectorStatus {
                model: self.detector.model_id().to_string(),
                loaded: self.detector.is_loaded(),
            },
            ocr_loaded: self.recognizer.loaded_models(),
        }
    }

    /// Warm every model. Failures are logged and retried lazily on the next
    /// request.
    pub async fn preload(&self) {
        info!("Preloading models");

        if let Err(e) = self.detector.preload().await {
            warn!("Detector preload failed, will retry on first request: {}", e);
        }

        for variant in OcrVariant::all() {
            if let Err(e) = self.recognizer.preload(variant).await {
                warn!(
                    "{} OCR preload failed, will retry on first request: {}",
                    variant.as_str(),
                    e
                );
            }
        }
    }

    /// Variant for an image upload. Only an absent field falls back to the
    /// default; anything unrecognized, blank included, fails the OCR stage.
    fn ocr_variant(&self, requested: Option<&str>) -> Result<OcrVariant, ServiceError> {
        match requested {
            None => Ok(self.default_ocr_variant),
            Some(value) => value.parse().map_err(|e: Error| {
                warn!("Rejected ocr_model_type {:?}: {}", value, e);
                ServiceError::Processing(format!("OCR failed: {}", e))
            }),
        }
    }
}
