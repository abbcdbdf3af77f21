//! Shared application state

use crate::service::DetectionService;
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;

/// State shared by every handler
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<DetectionService>,
    pub metrics: PrometheusHandle,
    pub max_upload_bytes: usize,
}

impl AppState {
    pub fn new(service: DetectionService, metrics: PrometheusHandle, max_upload_bytes: usize) -> Self {
        Self {
            service: Arc::new(service),
            metrics,
            max_upload_bytes,
        }
    }
}
