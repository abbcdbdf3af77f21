//! Command-line interface

use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use veritext_models::DeviceSpec;

#[derive(Parser, Debug, Clone)]
#[command(name = "veritext-server")]
#[command(about = "Detect AI-generated text in documents, images and pasted text", long_about = None)]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "VERITEXT_CONFIG", default_value = "veritext.yaml")]
    pub config: PathBuf,

    /// Listen address
    #[arg(short = 'l', long, env = "VERITEXT_LISTEN")]
    pub listen: Option<String>,

    /// Listen port
    #[arg(short = 'P', long, env = "VERITEXT_PORT")]
    pub port: Option<u16>,

    /// Directory uploads are staged in while they are processed
    #[arg(long, env = "VERITEXT_UPLOAD_DIR")]
    pub upload_dir: Option<PathBuf>,

    /// Load the detector and both OCR models before serving
    #[arg(long)]
    pub preload: bool,

    /// Inference device for all models (cpu, cuda[:N], metal[:N])
    #[arg(long, env = "VERITEXT_DEVICE")]
    pub device: Option<DeviceSpec>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["veritext-server"]).unwrap();
        assert_eq!(cli.config, PathBuf::from("veritext.yaml"));
        assert!(cli.port.is_none());
        assert!(!cli.preload);
        assert_eq!(cli.log_format, LogFormat::Text);
    }

    #[test]
    fn test_overrides() {
        let cli = Cli::try_parse_from([
            "veritext-server",
            "-P",
            "8080",
            "--device",
            "cuda:1",
            "--preload",
            "--log-format",
            "json",
        ])
        .unwrap();

        assert_eq!(cli.port, Some(8080));
        assert_eq!(cli.device, Some(DeviceSpec::Cuda(1)));
        assert!(cli.preload);
        assert_eq!(cli.log_format, LogFormat::Json);
    }
}
