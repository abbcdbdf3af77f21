//! Veritext Core
//!
//! Types and error handling shared across Veritext components.
//!
//! This crate provides:
//! - The error type and `Result` alias every adapter returns
//! - Detection results and the AI/Human prediction label
//! - OCR variants, upload file kinds and model kinds

pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::{DetectionResult, FileKind, ModelKind, OcrVariant, Prediction, KNOWN_EXTENSIONS};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::error::{Error, Result};
    pub use crate::types::{DetectionResult, FileKind, ModelKind, OcrVariant, Prediction};
}
