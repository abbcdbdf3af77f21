//! Error types for Veritext

use crate::types::ModelKind;

/// Result type alias using Veritext's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for Veritext operations
///
/// The `Display` output of every variant is safe to return to API clients;
/// internal detail that should only reach the logs lives in separate fields.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Caller supplied input the pipeline cannot work with
    #[error("{0}")]
    InvalidInput(String),

    /// File extension is missing or outside the allow-list
    #[error("File type not allowed")]
    UnsupportedFileType,

    /// Text extraction failed for an allowed file type
    #[error("{0}")]
    Extraction(String),

    /// A required command-line tool is not installed on the host
    #[error("{tool} is not installed; install {package} to process this file type")]
    ToolNotInstalled {
        tool: String,
        package: String,
    },

    /// A pretrained model could not be fetched or initialized
    #[error("Failed to load {kind} model: {model}")]
    ModelUnavailable {
        kind: ModelKind,
        model: String,
        reason: String,
    },

    /// OCR inference failure
    #[error("An error occurred during OCR: {0}")]
    Ocr(String),

    /// Classifier inference failure
    #[error("An error occurred during AI detection: {0}")]
    Classification(String),

    /// Configuration errors
    #[error("configuration error: {0}")]
    Config(String),

    /// Filesystem errors
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Generic internal errors
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a new invalid-input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create a new extraction error
    pub fn extraction(msg: impl Into<String>) -> Self {
        Self::Extraction(msg.into())
    }

    /// Create a new model-unavailable error
    pub fn model_unavailable(
        kind: ModelKind,
        model: impl Into<String>,
        reason: impl std::fmt::Display,
    ) -> Self {
        Self::ModelUnavailable {
            kind,
            model: model.into(),
            reason: reason.to_string(),
        }
    }

    /// Create a new OCR error
    pub fn ocr(msg: impl Into<String>) -> Self {
        Self::Ocr(msg.into())
    }

    /// Create a new classification error
    pub fn classification(msg: impl Into<String>) -> Self {
        Self::Classification(msg.into())
    }

    /// Create a new configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a new internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// True when the error was caused by the caller's input rather than by
    /// the server or a model.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidInput(_)
                | Self::UnsupportedFileType
                | Self::Extraction(_)
                | Self::ToolNotInstalled { .. }
        )
    }

    /// Short machine-readable tag, used as a metrics label
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "invalid_input",
            Self::UnsupportedFileType => "unsupported_file_type",
            Self::Extraction(_) => "extraction",
            Self::ToolNotInstalled { .. } => "tool_not_installed",
            Self::ModelUnavailable { .. } => "model_unavailable",
            Self::Ocr(_) => "ocr",
            Self::Classification(_) => "classification",
            Self::Config(_) => "config",
            Self::Io(_) => "io",
            Self::Serialization(_) => "serialization",
            Self::Internal(_) => "internal",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_unavailable_hides_reason() {
        let err = Error::model_unavailable(
            ModelKind::AiDetector,
            "openai-community/roberta-large-openai-detector",
            "connection refused",
        );

        assert_eq!(
            err.to_string(),
            "Failed to load AI detector model: openai-community/roberta-large-openai-detector"
        );
        assert_eq!(err.kind(), "model_unavailable");
    }

    #[test]
    fn test_ocr_model_message() {
        let err = Error::model_unavailable(ModelKind::Ocr, "microsoft/trocr-large-printed", "404");
        assert_eq!(
            err.to_string(),
            "Failed to load OCR model: microsoft/trocr-large-printed"
        );
    }

    #[test]
    fn test_client_error_classification() {
        assert!(Error::UnsupportedFileType.is_client_error());
        assert!(Error::extraction("bad docx").is_client_error());
        assert!(!Error::classification("nan logits").is_client_error());
        assert!(!Error::internal("boom").is_client_error());
    }
}
