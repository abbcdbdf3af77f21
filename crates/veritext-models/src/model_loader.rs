//! Model file resolution and loading helpers shared by the adapters

use crate::model_config::{DeviceSpec, ModelSource};
use candle_core::{DType, Device};
use candle_nn::VarBuilder;
use hf_hub::api::sync::{Api, ApiRepo};
use hf_hub::{Repo, RepoType};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use tokenizers::models::bpe::BPE;
use tokenizers::pre_tokenizers::byte_level::ByteLevel;
use tokenizers::processors::roberta::RobertaProcessing;
use tokenizers::{Model, Tokenizer};
use tracing::{debug, info};
use veritext_core::{Error, Result};

/// A place model files can be fetched from
pub enum ModelRepo {
    Local(PathBuf),
    Hub { id: String, repo: ApiRepo },
}

impl ModelRepo {
    /// Open a source. Hub repositories are not contacted until a file is
    /// requested.
    pub fn open(source: &ModelSource) -> Result<Self> {
        match source {
            ModelSource::Local { path } => {
                if !path.is_dir() {
                    return Err(Error::config(format!(
                        "Model directory does not exist: {}",
                        path.display()
                    )));
                }
                Ok(Self::Local(path.clone()))
            }
            ModelSource::HuggingFace { repo, revision } => {
                let api = Api::new().map_err(|e| {
                    Error::config(format!("Failed to initialize HuggingFace API: {}", e))
                })?;
                let repo_obj = api.repo(Repo::with_revision(
                    repo.clone(),
                    RepoType::Model,
                    revision.clone(),
                ));
                Ok(Self::Hub {
                    id: source.id(),
                    repo: repo_obj,
                })
            }
        }
    }

    /// Resolve one file, downloading it if needed
    pub fn get(&self, filename: &str) -> Result<PathBuf> {
        match self {
            Self::Local(dir) => {
                let path = dir.join(filename);
                if path.is_file() {
                    Ok(path)
                } else {
                    Err(Error::config(format!("{} not found in {}", filename, dir.display())))
                }
            }
            Self::Hub { id, repo } => repo
                .get(filename)
                .map_err(|e| Error::config(format!("Failed to fetch {} from {}: {}", filename, id, e))),
        }
    }

    /// Resolve the first file of `candidates` that exists
    pub fn get_first(&self, candidates: &[&str]) -> Result<PathBuf> {
        let mut errors = Vec::new();
        for filename in candidates {
            match self.get(filename) {
                Ok(path) => {
                    debug!("Resolved {} -> {}", filename, path.display());
                    return Ok(path);
                }
                Err(e) => errors.push(e.to_string()),
            }
        }
        Err(Error::config(format!(
            "none of [{}] could be resolved: {}",
            candidates.join(", "),
            errors.join(" | ")
        )))
    }
}

/// Run blocking model work on tokio's blocking pool.
///
/// A panic in `f` comes back as [`Error::Internal`] carrying the panic message.
pub async fn run_blocking<F, T>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    match tokio::task::spawn_blocking(f).await {
        Ok(result) => result,
        Err(e) if e.is_panic() => {
            let message = panic_message(e.into_panic().as_ref());
            tracing::error!("Blocking model task panicked: {}", message);
            Err(Error::internal(format!("blocking task panicked: {}", message)))
        }
        Err(e) => Err(Error::internal(format!("blocking task failed: {}", e))),
    }
}

/// Best-effort text of a panic payload
pub fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Create a Candle device
pub fn create_device(spec: DeviceSpec) -> Result<Device> {
    match spec {
        DeviceSpec::Cpu => Ok(Device::Cpu),
        DeviceSpec::Cuda(idx) => Device::new_cuda(idx)
            .map_err(|e| Error::config(format!("Failed to create CUDA device: {}", e))),
        DeviceSpec::Metal(idx) => Device::new_metal(idx)
            .map_err(|e| Error::config(format!("Failed to create Metal device: {}", e))),
    }
}

/// Read and deserialize a JSON config file
pub fn parse_json_config<T: DeserializeOwned>(config_path: &Path) -> Result<T> {
    let config_str = std::fs::read_to_string(config_path).map_err(|e| {
        Error::config(format!("Failed to read config {}: {}", config_path.display(), e))
    })?;

    serde_json::from_str(&config_str).map_err(|e| {
        Error::config(format!("Failed to parse config {}: {}", config_path.display(), e))
    })
}

/// Load model weights, preferring SafeTensors and falling back to a PyTorch
/// checkpoint.
pub fn load_var_builder(repo: &ModelRepo, device: &Device) -> Result<VarBuilder<'static>> {
    if let Ok(weights_path) = repo.get("model.safetensors") {
        info!("Loading SafeTensors weights from {}", weights_path.display());
        // SAFETY: the weights file is not modified while it stays mapped
        return unsafe {
            VarBuilder::from_mmaped_safetensors(&[weights_path], DType::F32, device)
                .map_err(|e| Error::config(format!("Failed to load SafeTensors: {}", e)))
        };
    }

    let weights_path = repo.get("pytorch_model.bin").map_err(|e| {
        Error::config(format!(
            "No model weights found (tried model.safetensors, pytorch_model.bin): {}",
            e
        ))
    })?;
    info!("Loading PyTorch weights from {}", weights_path.display());

    VarBuilder::from_pth(&weights_path, DType::F32, device)
        .map_err(|e| Error::config(format!("Failed to load PyTorch weights: {}", e)))
}

/// Load a RoBERTa-style tokenizer, from `tokenizer.json` when present,
/// otherwise built from `vocab.json` + `merges.txt`.
pub fn load_tokenizer(repo: &ModelRepo) -> Result<Tokenizer> {
    if let Ok(path) = repo.get("tokenizer.json") {
        debug!("Loading tokenizer from tokenizer.json");
        return Tokenizer::from_file(&path)
            .map_err(|e| Error::config(format!("Failed to load tokenizer.json: {}", e)));
    }

    let vocab = repo.get("vocab.json")?;
    let merges = repo.get("merges.txt")?;
    debug!("Building byte-level BPE tokenizer from vocab.json + merges.txt");

    build_bpe_tokenizer(&vocab, &merges)
}

fn build_bpe_tokenizer(vocab: &Path, merges: &Path) -> Result<Tokenizer> {
    let bpe = BPE::from_file(&vocab.to_string_lossy(), &merges.to_string_lossy())
        .build()
        .map_err(|e| Error::config(format!("Failed to build BPE model: {}", e)))?;

    let cls_id = bpe.token_to_id("<s>").unwrap_or(0);
    let sep_id = bpe.token_to_id("</s>").unwrap_or(2);

    let mut tokenizer = Tokenizer::new(bpe);
    tokenizer.with_pre_tokenizer(Some(ByteLevel::new(false, true, true)));
    tokenizer.with_decoder(Some(ByteLevel::default()));
    tokenizer.with_post_processor(Some(RobertaProcessing::new(
        ("</s>".to_string(), sep_id),
        ("<s>".to_string(), cls_id),
    )));

    Ok(tokenizer)
}
