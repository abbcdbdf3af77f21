//! Veritext Server
//!
//! Serves the upload page and the `/upload` and `/analyze_text` endpoints.

use anyhow::Result;
use clap::Parser;
use metrics_exporter_prometheus::PrometheusHandle;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info, warn};
use veritext_extract::Extractor;
use veritext_models::{RobertaDetector, TrOcrRecognizer};
use veritext_server::cli::{Cli, LogFormat};
use veritext_server::{build_router, AppState, DetectionService, ServerConfig, Staging};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_tracing(cli.verbose, cli.log_format);

    info!("Starting Veritext server");

    let config = ServerConfig::load(&cli)?;
    info!("Configuration loaded successfully");
    info!("Detector model: {}", config.detector.source.id());
    info!("Printed OCR model: {}", config.ocr.printed.source.id());
    info!("Handwritten OCR model: {}", config.ocr.handwritten.source.id());
    info!("Allowed extensions: {}", config.extract.allowed_extensions.join(", "));

    let metrics_handle = init_metrics()?;

    let staging = Staging::new(&config.upload_dir);
    staging.ensure_dir().await?;
    info!("Staging uploads in {}", config.upload_dir.display());

    let service = DetectionService::new(
        Extractor::new(config.extract.clone()),
        Arc::new(TrOcrRecognizer::new(config.ocr.clone())),
        Arc::new(RobertaDetector::new(config.detector.clone())),
        staging,
        config.default_ocr_variant,
    );

    if config.preload {
        service.preload().await;
    }

    let state = AppState::new(service, metrics_handle, config.max_upload_bytes);
    let app = build_router(state);

    let addr: SocketAddr = format!("{}:{}", config.listen, config.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Veritext listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            shutdown_signal().await;
            warn!("Shutdown signal received, stopping server...");
        })
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

/// Listen for shutdown signals (SIGTERM, SIGINT)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Initialize tracing/logging
fn init_tracing(verbose: bool, format: LogFormat) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = if verbose {
        EnvFilter::new("veritext=debug,tower_http=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("veritext=info"))
    };

    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
    }
}

/// Initialize metrics exporter and return handle for rendering
fn init_metrics() -> Result<PrometheusHandle> {
    use metrics_exporter_prometheus::PrometheusBuilder;

    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| anyhow::anyhow!("Failed to install metrics: {}", e))?;

    metrics::describe_counter!(
        "veritext_requests_total",
        "Total number of analysis requests by route"
    );
    metrics::describe_counter!(
        "veritext_errors_total",
        "Total number of error responses by kind"
    );
    metrics::describe_counter!(
        "veritext_model_loads_total",
        "Model load attempts by model kind and outcome"
    );
    metrics::describe_histogram!(
        "veritext_inference_latency_us",
        metrics::Unit::Microseconds,
        "Model inference latency in microseconds by stage"
    );

    info!("Metrics exporter initialized");
    Ok(handle)
}
