//! Mock model adapters for testing
//!
//! Configurable stand-ins for the detector and OCR traits, used to drive
//! the HTTP layer without downloading weights.

#![allow(dead_code)]

use async_trait::async_trait;
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use veritext_core::{DetectionResult, Error, ModelKind, OcrVariant, Result};
use veritext_models::model_loader::run_blocking;
use veritext_models::{AiDetector, TextRecognizer};

/// Detector returning a fixed AI probability
pub struct MockDetector {
    ai_probability: f32,
    call_count: AtomicU32,
    last_text: Mutex<Option<String>>,
}

impl MockDetector {
    pub fn new(ai_probability: f32) -> Self {
        Self {
            ai_probability,
            call_count: AtomicU32::new(0),
            last_text: Mutex::new(None),
        }
    }

    pub fn call_count(&self) -> u32 {
        self.call_count.load(Ordering::Relaxed)
    }

    pub fn last_text(&self) -> Option<String> {
        self.last_text.lock().unwrap().clone()
    }
}

#[async_trait]
impl AiDetector for MockDetector {
    async fn detect(&self, text: &str) -> Result<DetectionResult> {
        self.call_count.fetch_add(1, Ordering::Relaxed);
        *self.last_text.lock().unwrap() = Some(text.to_string());

        Ok(DetectionResult::from_probabilities(
            1.0 - self.ai_probability,
            self.ai_probability,
        ))
    }

    fn model_id(&self) -> &str {
        "mock-detector"
    }

    fn is_loaded(&self) -> bool {
        true
    }

    async fn preload(&self) -> Result<()> {
        Ok(())
    }
}

/// How a [`FailingDetector`] fails
#[derive(Debug, Clone, Copy)]
pub enum DetectorFailure {
    Unavailable,
    Inference,
    /// Model code panics on the blocking pool
    BlockingPanic,
    /// The handler future itself panics
    HandlerPanic,
}

/// Detector that always fails
pub struct FailingDetector {
    failure: DetectorFailure,
}

impl FailingDetector {
    pub fn new(failure: DetectorFailure) -> Self {
        Self { failure }
    }
}

#[async_trait]
impl AiDetector for FailingDetector {
    async fn detect(&self, _text: &str) -> Result<DetectionResult> {
        match self.failure {
            DetectorFailure::BlockingPanic => {
                return run_blocking(|| -> Result<DetectionResult> {
                    panic!("index out of bounds in attention mask")
                })
                .await;
            }
            DetectorFailure::HandlerPanic => panic!("detector state poisoned"),
            _ => {}
        }

        Err(match self.failure {
            DetectorFailure::Unavailable => Error::model_unavailable(
                ModelKind::AiDetector,
                "openai-community/roberta-large-openai-detector",
                "connection refused",
            ),
            _ => Error::classification("logits contained NaN"),
        })
    }

    fn model_id(&self) -> &str {
        "failing-detector"
    }

    fn is_loaded(&self) -> bool {
        false
    }

    async fn preload(&self) -> Result<()> {
        self.detect("warmup").await.map(|_| ())
    }
}

/// Recognizer returning fixed text, or failing to load its model
pub struct MockRecognizer {
    text: Option<String>,
    call_count: AtomicU32,
    last_variant: Mutex<Option<OcrVariant>>,
}

impl MockRecognizer {
    /// Recognizer that "reads" `text` from every image
    pub fn reading(text: &str) -> Self {
        Self {
            text: Some(text.to_string()),
            call_count: AtomicU32::new(0),
            last_variant: Mutex::new(None),
        }
    }

    /// Recognizer whose model never loads
    pub fn unavailable() -> Self {
        Self {
            text: None,
            call_count: AtomicU32::new(0),
            last_variant: Mutex::new(None),
        }
    }

    pub fn call_count(&self) -> u32 {
        self.call_count.load(Ordering::Relaxed)
    }

    pub fn last_variant(&self) -> Option<OcrVariant> {
        *self.last_variant.lock().unwrap()
    }
}

#[async_trait]
impl TextRecognizer for MockRecognizer {
    async fn recognize(&self, image: &Path, variant: OcrVariant) -> Result<String> {
        self.call_count.fetch_add(1, Ordering::Relaxed);
        *self.last_variant.lock().unwrap() = Some(variant);

        if !image.exists() {
            return Err(Error::ocr(format!("Image file not found: {}", image.display())));
        }

        match &self.text {
            Some(text) => Ok(text.clone()),
            None => Err(Error::model_unavailable(
                ModelKind::Ocr,
                "microsoft/trocr-large-printed",
                "404 Not Found",
            )),
        }
    }

    fn loaded_models(&self) -> Vec<String> {
        match self.text {
            Some(_) => vec!["microsoft/trocr-large-printed".to_string()],
            None => Vec::new(),
        }
    }

    async fn preload(&self, _variant: OcrVariant) -> Result<()> {
        Ok(())
    }
}
