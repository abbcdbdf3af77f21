//! Model configuration structures

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use veritext_core::{Error, OcrVariant};

/// Default Hugging Face repository of the AI-text detector
pub const DEFAULT_DETECTOR_REPO: &str = "openai-community/roberta-large-openai-detector";

/// Default Hugging Face repository of the printed-text OCR model
pub const DEFAULT_PRINTED_OCR_REPO: &str = "microsoft/trocr-large-printed";

/// Default Hugging Face repository of the handwriting OCR model
pub const DEFAULT_HANDWRITTEN_OCR_REPO: &str = "microsoft/trocr-large-handwritten";

/// Largest input the RoBERTa detector accepts, special tokens included
pub const MAX_DETECTOR_TOKENS: usize = 512;

/// Where model files come from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ModelSource {
    /// Directory on the local filesystem holding `config.json`, weights and
    /// tokenizer files
    Local {
        path: PathBuf,
    },

    /// Download from (or reuse the local cache of) the Hugging Face Hub
    HuggingFace {
        repo: String,
        #[serde(default = "default_revision")]
        revision: String,
    },
}

fn default_revision() -> String {
    "main".to_string()
}

impl ModelSource {
    /// Hugging Face source on the `main` revision
    pub fn hub(repo: impl Into<String>) -> Self {
        Self::HuggingFace {
            repo: repo.into(),
            revision: default_revision(),
        }
    }

    /// Stable identifier used for caching and error messages
    pub fn id(&self) -> String {
        match self {
            Self::Local { path } => path.display().to_string(),
            Self::HuggingFace { repo, revision } if revision == "main" => repo.clone(),
            Self::HuggingFace { repo, revision } => format!("{}@{}", repo, revision),
        }
    }
}

/// Device to run inference on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum DeviceSpec {
    #[default]
    Cpu,
    Cuda(usize),
    Metal(usize),
}

impl FromStr for DeviceSpec {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_ascii_lowercase();
        let (name, index) = match s.split_once(':') {
            Some((name, index)) => {
                let index = index
                    .parse::<usize>()
                    .map_err(|_| Error::config(format!("invalid device index in '{}'", s)))?;
                (name.to_string(), index)
            }
            None => (s.clone(), 0),
        };

        match name.as_str() {
            "cpu" => Ok(Self::Cpu),
            "cuda" | "gpu" => Ok(Self::Cuda(index)),
            "metal" | "mps" => Ok(Self::Metal(index)),
            _ => Err(Error::config(format!(
                "unknown device '{}' (expected cpu, cuda[:N] or metal[:N])",
                s
            ))),
        }
    }
}

impl TryFrom<String> for DeviceSpec {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<DeviceSpec> for String {
    fn from(value: DeviceSpec) -> Self {
        value.to_string()
    }
}

impl fmt::Display for DeviceSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cpu => f.write_str("cpu"),
            Self::Cuda(idx) => write!(f, "cuda:{}", idx),
            Self::Metal(idx) => write!(f, "metal:{}", idx),
        }
    }
}

/// AI-text detector settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectorConfig {
    /// Where to load the sequence classifier from
    #[serde(default = "default_detector_source")]
    pub source: ModelSource,

    /// Inference device
    #[serde(default)]
    pub device: DeviceSpec,

    /// Inputs are truncated to this many tokens
    #[serde(default = "default_max_length")]
    pub max_length: usize,

    /// Output index holding the AI-generated class. When unset it is derived
    /// from the model's `id2label`; when set it must agree with it.
    #[serde(default)]
    pub ai_label_index: Option<usize>,
}

fn default_detector_source() -> ModelSource {
    ModelSource::hub(DEFAULT_DETECTOR_REPO)
}

fn default_max_length() -> usize {
    MAX_DETECTOR_TOKENS
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            source: default_detector_source(),
            device: DeviceSpec::default(),
            max_length: default_max_length(),
            ai_label_index: None,
        }
    }
}

impl DetectorConfig {
    pub fn validate(&self) -> veritext_core::Result<()> {
        if self.max_length == 0 || self.max_length > MAX_DETECTOR_TOKENS {
            return Err(Error::config(format!(
                "detector.max_length must be between 1 and {}, got {}",
                MAX_DETECTOR_TOKENS, self.max_length
            )));
        }
        if let Some(idx) = self.ai_label_index {
            if idx > 1 {
                return Err(Error::config(format!(
                    "detector.ai_label_index must be 0 or 1, got {}",
                    idx
                )));
            }
        }
        Ok(())
    }
}

/// One TrOCR checkpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OcrModelSpec {
    /// Encoder/decoder weights and `config.json`
    pub source: ModelSource,

    /// Separate tokenizer location, for checkpoints that ship without one
    #[serde(default)]
    pub tokenizer: Option<ModelSource>,
}

impl OcrModelSpec {
    pub fn hub(repo: impl Into<String>) -> Self {
        Self {
            source: ModelSource::hub(repo),
            tokenizer: None,
        }
    }
}

/// OCR settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OcrConfig {
    #[serde(default = "default_printed")]
    pub printed: OcrModelSpec,

    #[serde(default = "default_handwritten")]
    pub handwritten: OcrModelSpec,

    /// Inference device
    #[serde(default)]
    pub device: DeviceSpec,

    /// Upper bound on generated tokens per image
    #[serde(default = "default_max_new_tokens")]
    pub max_new_tokens: usize,
}

fn default_printed() -> OcrModelSpec {
    OcrModelSpec::hub(DEFAULT_PRINTED_OCR_REPO)
}

fn default_handwritten() -> OcrModelSpec {
    OcrModelSpec::hub(DEFAULT_HANDWRITTEN_OCR_REPO)
}

fn default_max_new_tokens() -> usize {
    512
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            printed: default_printed(),
            handwritten: default_handwritten(),
            device: DeviceSpec::default(),
            max_new_tokens: default_max_new_tokens(),
        }
    }
}

impl OcrConfig {
    /// Checkpoint serving a variant
    pub fn model_for(&self, variant: OcrVariant) -> &OcrModelSpec {
        match variant {
            OcrVariant::Printed => &self.printed,
            OcrVariant::Handwritten => &self.handwritten,
        }
    }

    pub fn validate(&self) -> veritext_core::Result<()> {
        if self.max_new_tokens == 0 {
            return Err(Error::config("ocr.max_new_tokens must be greater than 0"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_detector_config() {
        let yaml = r#"
source:
  type: huggingface
  repo: "openai-community/roberta-base-openai-detector"
device: "cuda:1"
max_length: 256
ai_label_index: 0
"#;

        let config: DetectorConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(
            config.source,
            ModelSource::HuggingFace {
                repo: "openai-community/roberta-base-openai-detector".to_string(),
                revision: "main".to_string(),
            }
        );
        assert_eq!(config.device, DeviceSpec::Cuda(1));
        assert_eq!(config.max_length, 256);
        assert_eq!(config.ai_label_index, Some(0));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_detector_defaults() {
        let config: DetectorConfig = serde_yaml::from_str("{}").unwrap();
        assert_eq!(config.source.id(), DEFAULT_DETECTOR_REPO);
        assert_eq!(config.max_length, 512);
        assert_eq!(config.device, DeviceSpec::Cpu);
        assert!(config.ai_label_index.is_none());
    }

    #[test]
    fn test_detector_validation() {
        let config = DetectorConfig {
            max_length: 1024,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = DetectorConfig {
            ai_label_index: Some(2),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_local_ocr_source_with_tokenizer_override() {
        let yaml = r#"
printed:
  source:
    type: local
    path: "./models/trocr-printed"
  tokenizer:
    type: huggingface
    repo: "ToluClassics/candle-trocr-tokenizer"
max_new_tokens: 128
"#;

        let config: OcrConfig = serde_yaml::from_str(yaml).unwrap();
        match &config.printed.source {
            ModelSource::Local { path } => assert_eq!(path.to_str().unwrap(), "./models/trocr-printed"),
            _ => panic!("Expected local source"),
        }
        assert!(config.printed.tokenizer.is_some());
        assert_eq!(
            config.model_for(OcrVariant::Handwritten).source.id(),
            DEFAULT_HANDWRITTEN_OCR_REPO
        );
        assert_eq!(config.max_new_tokens, 128);
    }

    #[test]
    fn test_source_id_includes_non_main_revision() {
        let source = ModelSource::HuggingFace {
            repo: "microsoft/trocr-base-handwritten".to_string(),
            revision: "refs/pr/3".to_string(),
        };
        assert_eq!(source.id(), "microsoft/trocr-base-handwritten@refs/pr/3");
    }

    #[test]
    fn test_device_spec_parsing() {
        assert_eq!("cpu".parse::<DeviceSpec>().unwrap(), DeviceSpec::Cpu);
        assert_eq!("CUDA".parse::<DeviceSpec>().unwrap(), DeviceSpec::Cuda(0));
        assert_eq!("mps".parse::<DeviceSpec>().unwrap(), DeviceSpec::Metal(0));
        assert_eq!("cuda:2".parse::<DeviceSpec>().unwrap(), DeviceSpec::Cuda(2));
        assert!("tpu".parse::<DeviceSpec>().is_err());
        assert!("cuda:x".parse::<DeviceSpec>().is_err());
    }
}
