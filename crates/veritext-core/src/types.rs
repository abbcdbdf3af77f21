//! Core types for Veritext

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Extensions accepted by the extraction pipeline
pub const KNOWN_EXTENSIONS: &[&str] = &["txt", "pdf", "png", "jpg", "jpeg", "docx"];

/// Verdict of the AI-content classifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Prediction {
    #[serde(rename = "AI")]
    Ai,
    Human,
}

impl fmt::Display for Prediction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ai => f.write_str("AI"),
            Self::Human => f.write_str("Human"),
        }
    }
}

/// Outcome of classifying a piece of text
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DetectionResult {
    /// Argmax of the two class probabilities
    pub prediction: Prediction,

    /// Probability that the text is machine-generated
    pub ai_probability: f32,

    /// Probability that the text is human-written
    pub human_probability: f32,
}

impl DetectionResult {
    /// Build a result from softmax outputs.
    ///
    /// Ties resolve to `Human`, matching an argmax that returns the first
    /// maximal index.
    pub fn from_probabilities(human_probability: f32, ai_probability: f32) -> Self {
        let prediction = if ai_probability > human_probability {
            Prediction::Ai
        } else {
            Prediction::Human
        };

        Self {
            prediction,
            ai_probability,
            human_probability,
        }
    }
}

/// OCR model family selected by the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OcrVariant {
    #[default]
    Printed,
    Handwritten,
}

impl OcrVariant {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Printed => "printed",
            Self::Handwritten => "handwritten",
        }
    }

    pub fn all() -> [OcrVariant; 2] {
        [Self::Printed, Self::Handwritten]
    }
}

impl fmt::Display for OcrVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OcrVariant {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "printed" => Ok(Self::Printed),
            "handwritten" => Ok(Self::Handwritten),
            _ => Err(Error::invalid_input(
                "Invalid model type specified. Choose \"printed\" or \"handwritten\".",
            )),
        }
    }
}

/// Supported upload formats, keyed by extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    PlainText,
    Docx,
    Pdf,
    Image,
}

impl FileKind {
    /// Map a file extension (without the dot, any case) to a kind
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "txt" => Some(Self::PlainText),
            "docx" => Some(Self::Docx),
            "pdf" => Some(Self::Pdf),
            "png" | "jpg" | "jpeg" => Some(Self::Image),
            _ => None,
        }
    }

    pub fn is_image(&self) -> bool {
        matches!(self, Self::Image)
    }
}

/// Which adapter a model belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelKind {
    AiDetector,
    Ocr,
}

impl ModelKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AiDetector => "detector",
            Self::Ocr => "ocr",
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AiDetector => f.write_str("AI detector"),
            Self::Ocr => f.write_str("OCR"),
        }
    }
}
