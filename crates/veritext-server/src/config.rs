//! Server configuration

use crate::cli::Cli;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use veritext_core::OcrVariant;
use veritext_extract::ExtractConfig;
use veritext_models::{DetectorConfig, OcrConfig};

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Listen address
    #[serde(default = "default_listen")]
    pub listen: String,

    /// Listen port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Largest accepted request body
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,

    /// Directory uploads are staged in
    #[serde(default = "default_upload_dir")]
    pub upload_dir: PathBuf,

    /// Allowed extensions and the `pdftotext` binary
    #[serde(flatten)]
    pub extract: ExtractConfig,

    /// OCR variant used when an upload does not name one
    #[serde(default)]
    pub default_ocr_variant: OcrVariant,

    /// Load all models before serving
    #[serde(default)]
    pub preload: bool,

    #[serde(default)]
    pub detector: DetectorConfig,

    #[serde(default)]
    pub ocr: OcrConfig,
}

fn default_listen() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5001
}

fn default_max_upload_bytes() -> usize {
    16 * 1024 * 1024
}

fn default_upload_dir() -> PathBuf {
    PathBuf::from("uploads")
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            port: default_port(),
            max_upload_bytes: default_max_upload_bytes(),
            upload_dir: default_upload_dir(),
            extract: ExtractConfig::default(),
            default_ocr_variant: OcrVariant::default(),
            preload: false,
            detector: DetectorConfig::default(),
            ocr: OcrConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from file and CLI overrides
    pub fn load(cli: &Cli) -> anyhow::Result<Self> {
        let mut config = if cli.config.exists() {
            Self::from_file(&cli.config)?
        } else {
            tracing::info!(
                "No config file at {}, using defaults",
                cli.config.display()
            );
            Self::default()
        };

        config.apply_overrides(cli);
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    fn apply_overrides(&mut self, cli: &Cli) {
        if let Some(listen) = &cli.listen {
            self.listen = listen.clone();
        }

        if let Some(port) = cli.port {
            self.port = port;
        }

        if let Some(dir) = &cli.upload_dir {
            self.upload_dir = dir.clone();
        }

        if let Some(device) = cli.device {
            self.detector.device = device;
            self.ocr.device = device;
        }

        if cli.preload {
            self.preload = true;
        }
    }

    /// Reject settings the server cannot run with
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.max_upload_bytes == 0 {
            anyhow::bail!("max_upload_bytes must be greater than 0");
        }
        self.extract.validate()?;
        self.detector.validate()?;
        self.ocr.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use veritext_models::{DeviceSpec, ModelSource};

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: ServerConfig = serde_yaml::from_str("{}").unwrap();

        assert_eq!(config.port, 5001);
        assert_eq!(config.max_upload_bytes, 16 * 1024 * 1024);
        assert_eq!(config.default_ocr_variant, OcrVariant::Printed);
        assert_eq!(config.extract.allowed_extensions.len(), 6);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_full_config() {
        let yaml = r#"
listen: "127.0.0.1"
port: 9000
max_upload_bytes: 1048576
upload_dir: "/tmp/veritext"
allowed_extensions: ["txt", "docx"]
pdftotext_bin: "/usr/local/bin/pdftotext"
default_ocr_variant: handwritten
preload: true
detector:
  source:
    type: local
    path: "./models/detector"
  ai_label_index: 0
ocr:
  device: "cuda"
  max_new_tokens: 64
"#;

        let config: ServerConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.listen, "127.0.0.1");
        assert_eq!(config.port, 9000);
        assert_eq!(config.extract.allowed_extensions, vec!["txt", "docx"]);
        assert_eq!(
            config.extract.pdftotext_bin,
            PathBuf::from("/usr/local/bin/pdftotext")
        );
        assert_eq!(config.default_ocr_variant, OcrVariant::Handwritten);
        assert!(config.preload);
        assert!(matches!(config.detector.source, ModelSource::Local { .. }));
        assert_eq!(config.ocr.device, DeviceSpec::Cuda(0));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_failures() {
        let config = ServerConfig {
            max_upload_bytes: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config: ServerConfig =
            serde_yaml::from_str("allowed_extensions: [\"exe\"]").unwrap();
        assert!(config.validate().is_err());

        let config: ServerConfig = serde_yaml::from_str("detector:\n  max_length: 4096").unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_cli_overrides_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("veritext.yaml");
        std::fs::write(&path, "port: 7000\nupload_dir: \"/srv/uploads\"\n").unwrap();

        let cli = Cli::try_parse_from([
            "veritext-server",
            "--config",
            path.to_str().unwrap(),
            "-P",
            "7100",
            "--device",
            "metal",
        ])
        .unwrap();

        let config = ServerConfig::load(&cli).unwrap();
        assert_eq!(config.port, 7100);
        assert_eq!(config.upload_dir, PathBuf::from("/srv/uploads"));
        assert_eq!(config.detector.device, DeviceSpec::Metal(0));
        assert_eq!(config.ocr.device, DeviceSpec::Metal(0));
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let cli = Cli::try_parse_from([
            "veritext-server",
            "--config",
            "/nonexistent/veritext.yaml",
        ])
        .unwrap();

        let config = ServerConfig::load(&cli).unwrap();
        assert_eq!(config.port, 5001);
    }
}
