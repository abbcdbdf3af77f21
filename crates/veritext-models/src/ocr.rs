//! TrOCR-based text recognition for uploaded images

use crate::cache::ModelCache;
use crate::model_config::{OcrConfig, OcrModelSpec};
use crate::model_loader::{
    create_device, load_tokenizer, load_var_builder, parse_json_config, run_blocking, ModelRepo,
};
use async_trait::async_trait;
use candle_core::{DType, Device, Tensor, D};
use candle_nn::Module;
use candle_transformers::models::{trocr, vit};
use image::imageops::FilterType;
use image::ImageReader;
use parking_lot::Mutex;
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tokenizers::Tokenizer;
use tracing::{debug, error, info};
use veritext_core::{Error, ModelKind, OcrVariant, Result};

/// Extracts text from an image file
#[async_trait]
pub trait TextRecognizer: Send + Sync {
    /// Recognize the text in the image at `image` with the model for
    /// `variant`. A missing file fails before any model is loaded.
    async fn recognize(&self, image: &Path, variant: OcrVariant) -> Result<String>;

    /// Identifiers of the OCR models resident in memory
    fn loaded_models(&self) -> Vec<String>;

    /// Load a variant's model ahead of the first request
    async fn preload(&self, variant: OcrVariant) -> Result<()>;
}

#[derive(Debug, Deserialize)]
struct VisionEncoderDecoderConfig {
    encoder: vit::Config,
    decoder: trocr::TrOCRConfig,
}

/// Loaded TrOCR checkpoint
pub struct LoadedRecognizer {
    // decoding mutates the KV cache
    model: Mutex<trocr::TrOCRModel>,
    tokenizer: Tokenizer,
    device: Device,
    image_size: usize,
    decoder_start_token_id: u32,
    eos_token_id: u32,
    max_new_tokens: usize,
}

impl LoadedRecognizer {
    /// Fetch and initialize a checkpoint. Blocking.
    pub fn load(spec: &OcrModelSpec, config: &OcrConfig) -> Result<Self> {
        let repo = ModelRepo::open(&spec.source)?;
        let model_config: VisionEncoderDecoderConfig =
            parse_json_config(&repo.get("config.json")?)?;

        let device = create_device(config.device)?;
        let vb = load_var_builder(&repo, &device)?;
        let model = trocr::TrOCRModel::new(&model_config.encoder, &model_config.decoder, vb)
            .map_err(|e| Error::config(format!("Failed to build TrOCR model: {}", e)))?;

        let tokenizer = match &spec.tokenizer {
            Some(source) => load_tokenizer(&ModelRepo::open(source)?)?,
            None => load_tokenizer(&repo)?,
        };

        info!(
            "Loaded TrOCR model {} (image size {})",
            spec.source.id(),
            model_config.encoder.image_size
        );

        Ok(Self {
            model: Mutex::new(model),
            tokenizer,
            device,
            image_size: model_config.encoder.image_size,
            decoder_start_token_id: model_config.decoder.decoder_start_token_id,
            eos_token_id: model_config.decoder.eos_token_id,
            max_new_tokens: config.max_new_tokens,
        })
    }

    /// Recognize the text in one image. Blocking.
    pub fn infer(&self, image: &Path) -> Result<String> {
        let pixels = preprocess_image(image, self.image_size, &self.device)?;
        let token_ids = self.generate(&pixels)?;

        let content: Vec<u32> = token_ids
            .into_iter()
            .filter(|&id| id != self.decoder_start_token_id && id != self.eos_token_id)
            .collect();

        let text = self
            .tokenizer
            .decode(&content, true)
            .map_err(|e| Error::ocr(format!("Failed to decode tokens: {}", e)))?;

        Ok(text.trim().to_string())
    }

    /// Greedy decoding from the decoder start token until EOS or the token
    /// limit
    fn generate(&self, pixels: &Tensor) -> Result<Vec<u32>> {
        let mut model = self.model.lock();
        model.reset_kv_cache();

        let encoder_xs = model
            .encoder()
            .forward(pixels)
            .map_err(|e| Error::ocr(format!("Image encoder failed: {}", e)))?;

        let mut token_ids = vec![self.decoder_start_token_id];
        for step in 0..self.max_new_tokens {
            let context_size = if step > 0 { 1 } else { token_ids.len() };
            let start_pos = token_ids.len().saturating_sub(context_size);

            let next = Tensor::new(&token_ids[start_pos..], &self.device)
                .and_then(|t| t.unsqueeze(0))
                .and_then(|input| model.decode(&input, &encoder_xs, start_pos))
                .and_then(|logits| logits.squeeze(0))
                .and_then(|logits| {
                    let last = logits.dim(0)? - 1;
                    logits.get(last)
                })
                .and_then(|logits| logits.argmax(D::Minus1))
                .and_then(|token| token.to_scalar::<u32>())
                .map_err(|e| Error::ocr(format!("Text decoder failed: {}", e)))?;

            token_ids.push(next);
            if next == self.eos_token_id {
                break;
            }
        }

        debug!("Generated {} tokens", token_ids.len());
        Ok(token_ids)
    }
}

/// Decode an image and turn it into a `(1, 3, size, size)` tensor scaled to
/// `[-1, 1]`
pub fn preprocess_image(path: &Path, size: usize, device: &Device) -> Result<Tensor> {
    let img = ImageReader::open(path)
        .map_err(|e| Error::ocr(format!("Could not open image {}: {}", path.display(), e)))?
        .with_guessed_format()
        .map_err(|e| Error::ocr(format!("Could not read image {}: {}", path.display(), e)))?
        .decode()
        .map_err(|e| Error::ocr(format!("Could not decode image {}: {}", path.display(), e)))?;

    let side = u32::try_from(size)
        .map_err(|_| Error::config(format!("image size {} is out of range", size)))?;
    let rgb = img.resize_exact(side, side, FilterType::Triangle).to_rgb8();
    let data = rgb.into_raw();

    Tensor::from_vec(data, (size, size, 3), &Device::Cpu)
        .and_then(|t| t.permute((2, 0, 1)))
        .and_then(|t| t.to_dtype(DType::F32))
        .and_then(|t| t.affine(1.0 / 127.5, -1.0))
        .and_then(|t| t.unsqueeze(0))
        .and_then(|t| t.to_device(device))
        .map_err(|e| Error::ocr(format!("Failed to build image tensor: {}", e)))
}

/// [`TextRecognizer`] running TrOCR checkpoints, loaded on first use and
/// cached by model identifier
pub struct TrOcrRecognizer {
    config: OcrConfig,
    cache: ModelCache<LoadedRecognizer>,
}

impl TrOcrRecognizer {
    pub fn new(config: OcrConfig) -> Self {
        Self {
            config,
            cache: ModelCache::new(),
        }
    }

    pub fn config(&self) -> &OcrConfig {
        &self.config
    }

    async fn model(&self, variant: OcrVariant) -> Result<Arc<LoadedRecognizer>> {
        let spec = self.config.model_for(variant);
        let model_id = spec.source.id();

        self.cache
            .get_or_try_load(&model_id, || async {
                info!("Loading {} OCR model {}", variant.as_str(), model_id);
                let spec = spec.clone();
                let config = self.config.clone();
                let start = Instant::now();

                match run_blocking(move || LoadedRecognizer::load(&spec, &config)).await {
                    Ok(model) => {
                        metrics::counter!(
                            "veritext_model_loads_total",
                            "kind" => ModelKind::Ocr.as_str(),
                            "outcome" => "success"
                        )
                        .increment(1);
                        info!("OCR model {} ready in {:?}", model_id, start.elapsed());
                        Ok(model)
                    }
                    Err(e) => {
                        metrics::counter!(
                            "veritext_model_loads_total",
                            "kind" => ModelKind::Ocr.as_str(),
                            "outcome" => "failure"
                        )
                        .increment(1);
                        error!("Error loading OCR model {}: {}", model_id, e);
                        Err(Error::model_unavailable(ModelKind::Ocr, model_id.clone(), e))
                    }
                }
            })
            .await
    }
}

#[async_trait]
impl TextRecognizer for TrOcrRecognizer {
    async fn recognize(&self, image: &Path, variant: OcrVariant) -> Result<String> {
        let exists = tokio::fs::try_exists(image).await.unwrap_or(false);
        if !exists {
            return Err(Error::ocr(format!(
                "Image file not found: {}",
                image.display()
            )));
        }

        let model = self.model(variant).await?;
        let path = image.to_path_buf();
        let start = Instant::now();

        let text = run_blocking(move || model.infer(&path)).await?;

        metrics::histogram!("veritext_inference_latency_us", "stage" => "ocr")
            .record(start.elapsed().as_micros() as f64);
        info!(
            "OCR ({}) produced {} chars from {}",
            variant.as_str(),
            text.len(),
            image.display()
        );

        Ok(text)
    }

    fn loaded_models(&self) -> Vec<String> {
        self.cache.loaded_keys()
    }

    async fn preload(&self, variant: OcrVariant) -> Result<()> {
        self.model(variant).await.map(|_| ())
    }
}
