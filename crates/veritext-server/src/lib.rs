//! Veritext Server
//!
//! HTTP front end of the Veritext pipeline. Uploaded documents are staged,
//! converted to text (or OCR'd when they are images), and scored by the
//! AI-text detector; pasted text goes straight to the detector.

pub mod cli;
pub mod config;
pub mod routes;
pub mod service;
pub mod staging;
pub mod state;
pub mod static_files;

pub use config::ServerConfig;
pub use routes::build_router;
pub use service::{AnalysisResponse, DetectionService, ServiceError, Upload};
pub use staging::Staging;
pub use state::AppState;
