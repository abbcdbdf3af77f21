//! Veritext Models
//!
//! Pretrained-model adapters used by the analysis pipeline:
//! - [`RobertaDetector`]: binary AI-generated vs. human-written classifier
//! - [`TrOcrRecognizer`]: printed and handwritten text recognition
//!
//! Models are fetched from the Hugging Face Hub (or a local directory) on
//! first use, kept in a process-wide [`ModelCache`], and run with Candle on
//! tokio's blocking pool.

pub mod cache;
pub mod detector;
pub mod model_config;
pub mod model_loader;
pub mod ocr;

pub use cache::ModelCache;
pub use detector::{AiDetector, LabelMapping, LoadedDetector, RobertaDetector};
pub use model_config::{
    DetectorConfig, DeviceSpec, ModelSource, OcrConfig, OcrModelSpec, DEFAULT_DETECTOR_REPO,
    DEFAULT_HANDWRITTEN_OCR_REPO, DEFAULT_PRINTED_OCR_REPO, MAX_DETECTOR_TOKENS,
};
pub use ocr::{LoadedRecognizer, TextRecognizer, TrOcrRecognizer};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::detector::{AiDetector, RobertaDetector};
    pub use crate::model_config::{DetectorConfig, OcrConfig};
    pub use crate::ocr::{TextRecognizer, TrOcrRecognizer};
}
