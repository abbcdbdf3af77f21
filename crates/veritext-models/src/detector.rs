//! RoBERTa-based AI-text detector

use crate::cache::ModelCache;
use crate::model_config::DetectorConfig;
use crate::model_loader::{
    create_device, load_tokenizer, load_var_builder, parse_json_config, run_blocking, ModelRepo,
};
use async_trait::async_trait;
use candle_core::{Device, Tensor, D};
use candle_transformers::models::xlm_roberta::{
    Config as RobertaConfig, XLMRobertaForSequenceClassification,
};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokenizers::{Tokenizer, TruncationParams};
use tracing::{debug, error, info};
use veritext_core::{DetectionResult, Error, ModelKind, Result};

/// Classifies text as AI-generated or human-written
#[async_trait]
pub trait AiDetector: Send + Sync {
    /// Classify `text`. Empty or whitespace-only input is rejected before
    /// the model is touched.
    async fn detect(&self, text: &str) -> Result<DetectionResult>;

    /// Identifier of the underlying model
    fn model_id(&self) -> &str;

    /// True once the model is resident in memory
    fn is_loaded(&self) -> bool;

    /// Load the model ahead of the first request
    async fn preload(&self) -> Result<()>;
}

/// Which classifier output belongs to which class
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LabelMapping {
    pub human: usize,
    pub ai: usize,
}

/// Index used for the AI class when neither the model nor the
/// configuration says otherwise
const DEFAULT_AI_INDEX: usize = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LabelClass {
    Ai,
    Human,
}

fn classify_label(label: &str) -> Option<LabelClass> {
    match label.trim().to_ascii_lowercase().as_str() {
        "fake" | "ai" | "machine" | "generated" | "ai-generated" | "machine-generated" => {
            Some(LabelClass::Ai)
        }
        "real" | "human" | "human-written" => Some(LabelClass::Human),
        _ => None,
    }
}

impl LabelMapping {
    fn with_ai(ai: usize) -> Self {
        Self { human: 1 - ai, ai }
    }

    /// Work out the AI/Human indices of a binary classifier.
    ///
    /// Recognizable `id2label` entries win. A configured index must agree
    /// with them; otherwise the configured index is used, falling back to 1.
    pub fn resolve(
        id2label: Option<&HashMap<String, String>>,
        configured: Option<usize>,
    ) -> Result<Self> {
        let from_model = id2label.and_then(Self::from_id2label);

        match (from_model, configured) {
            (Some(mapping), Some(idx)) if mapping.ai != idx => Err(Error::config(format!(
                "ai_label_index {} contradicts the model's id2label, which puts the AI class at {}",
                idx, mapping.ai
            ))),
            (Some(mapping), _) => Ok(mapping),
            (None, Some(idx)) if idx <= 1 => Ok(Self::with_ai(idx)),
            (None, Some(idx)) => Err(Error::config(format!(
                "ai_label_index must be 0 or 1, got {}",
                idx
            ))),
            (None, None) => Ok(Self::with_ai(DEFAULT_AI_INDEX)),
        }
    }

    fn from_id2label(id2label: &HashMap<String, String>) -> Option<Self> {
        if id2label.len() != 2 {
            return None;
        }

        let mut ai = None;
        let mut human = None;
        for (id, label) in id2label {
            let idx: usize = id.trim().parse().ok()?;
            match classify_label(label)? {
                LabelClass::Ai => ai = Some(idx),
                LabelClass::Human => human = Some(idx),
            }
        }

        match (ai?, human?) {
            (ai, human) if ai <= 1 && human <= 1 && ai != human => Some(Self { human, ai }),
            _ => None,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ClassifierHead {
    #[serde(default)]
    id2label: Option<HashMap<String, String>>,
}

/// Loaded detector weights and tokenizer
pub struct LoadedDetector {
    model: XLMRobertaForSequenceClassification,
    tokenizer: Tokenizer,
    device: Device,
    labels: LabelMapping,
}

impl LoadedDetector {
    /// Fetch and initialize the model. Blocking.
    pub fn load(config: &DetectorConfig) -> Result<Self> {
        let repo = ModelRepo::open(&config.source)?;
        let config_path = repo.get("config.json")?;
        let roberta_config: RobertaConfig = parse_json_config(&config_path)?;
        let head: ClassifierHead = parse_json_config(&config_path)?;
        let labels = LabelMapping::resolve(head.id2label.as_ref(), config.ai_label_index)?;

        let device = create_device(config.device)?;
        let vb = load_var_builder(&repo, &device)?;
        let model = XLMRobertaForSequenceClassification::new(2, &roberta_config, vb.clone())
            .or_else(|root_err| {
                XLMRobertaForSequenceClassification::new(2, &roberta_config, vb.pp("model"))
                    .map_err(|_| root_err)
            })
            .map_err(|e| Error::config(format!("Failed to build RoBERTa classifier: {}", e)))?;

        let mut tokenizer = load_tokenizer(&repo)?;
        tokenizer
            .with_truncation(Some(TruncationParams {
                max_length: config.max_length,
                ..Default::default()
            }))
            .map_err(|e| Error::config(format!("Failed to configure truncation: {}", e)))?;
        tokenizer.with_padding(None);

        info!(
            "Loaded AI detector {} (AI index {}, human index {})",
            config.source.id(),
            labels.ai,
            labels.human
        );

        Ok(Self {
            model,
            tokenizer,
            device,
            labels,
        })
    }

    pub fn labels(&self) -> LabelMapping {
        self.labels
    }

    /// Run the classifier on one input. Blocking.
    pub fn infer(&self, text: &str) -> Result<DetectionResult> {
        let encoding = self
            .tokenizer
            .encode(text, true)
            .map_err(|e| Error::classification(format!("Tokenization failed: {}", e)))?;
        debug!("Detector input is {} tokens", encoding.len());

        let input_ids = Tensor::new(encoding.get_ids(), &self.device)
            .and_then(|t| t.unsqueeze(0))
            .map_err(|e| Error::classification(format!("Failed to create input tensor: {}", e)))?;
        let attention_mask = Tensor::new(encoding.get_attention_mask(), &self.device)
            .and_then(|t| t.unsqueeze(0))
            .map_err(|e| Error::classification(format!("Failed to create attention mask: {}", e)))?;
        let token_type_ids = input_ids
            .zeros_like()
            .map_err(|e| Error::classification(format!("Failed to create token types: {}", e)))?;

        let logits = self
            .model
            .forward(&input_ids, &attention_mask, &token_type_ids)
            .map_err(|e| Error::classification(format!("Model forward pass failed: {}", e)))?;

        let probs = candle_nn::ops::softmax(&logits, D::Minus1)
            .and_then(|p| p.squeeze(0))
            .and_then(|p| p.to_vec1::<f32>())
            .map_err(|e| Error::classification(format!("Failed to compute probabilities: {}", e)))?;

        if probs.len() != 2 {
            return Err(Error::classification(format!(
                "expected 2 class probabilities, got {}",
                probs.len()
            )));
        }

        Ok(DetectionResult::from_probabilities(
            probs[self.labels.human],
            probs[self.labels.ai],
        ))
    }
}

/// [`AiDetector`] backed by a RoBERTa sequence classifier, loaded on first
/// use and kept for the life of the process
pub struct RobertaDetector {
    config: DetectorConfig,
    model_id: String,
    cache: ModelCache<LoadedDetector>,
}

impl RobertaDetector {
    pub fn new(config: DetectorConfig) -> Self {
        let model_id = config.source.id();
        Self {
            config,
            model_id,
            cache: ModelCache::new(),
        }
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    async fn model(&self) -> Result<Arc<LoadedDetector>> {
        self.cache
            .get_or_try_load(&self.model_id, || async {
                info!("Loading AI detector model {}", self.model_id);
                let config = self.config.clone();
                let start = Instant::now();

                match run_blocking(move || LoadedDetector::load(&config)).await {
                    Ok(model) => {
                        metrics::counter!(
                            "veritext_model_loads_total",
                            "kind" => ModelKind::AiDetector.as_str(),
                            "outcome" => "success"
                        )
                        .increment(1);
                        info!(
                            "AI detector {} ready in {:?}",
                            self.model_id,
                            start.elapsed()
                        );
                        Ok(model)
                    }
                    Err(e) => {
                        metrics::counter!(
                            "veritext_model_loads_total",
                            "kind" => ModelKind::AiDetector.as_str(),
                            "outcome" => "failure"
                        )
                        .increment(1);
                        error!("Error loading AI detection model {}: {}", self.model_id, e);
                        Err(Error::model_unavailable(
                            ModelKind::AiDetector,
                            self.model_id.clone(),
                            e,
                        ))
                    }
                }
            })
            .await
    }
}

#[async_trait]
impl AiDetector for RobertaDetector {
    async fn detect(&self, text: &str) -> Result<DetectionResult> {
        if text.trim().is_empty() {
            return Err(Error::invalid_input("Input text cannot be empty."));
        }

        let model = self.model().await?;
        let text = text.to_string();
        let start = Instant::now();

        let result = run_blocking(move || model.infer(&text)).await?;

        metrics::histogram!("veritext_inference_latency_us", "stage" => "detect")
            .record(start.elapsed().as_micros() as f64);
        debug!(
            "Detection: {} (AI {:.4}, human {:.4})",
            result.prediction, result.ai_probability, result.human_probability
        );

        Ok(result)
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn is_loaded(&self) -> bool {
        self.cache.is_loaded(&self.model_id)
    }

    async fn preload(&self) -> Result<()> {
        self.model().await.map(|_| ())
    }
}
