//! Veritext Extract
//!
//! Routes an uploaded file to the right text extractor based on its
//! extension:
//! - `.txt` is read as UTF-8
//! - `.docx` is parsed with `docx-rs`
//! - `.pdf` is converted by the external `pdftotext` tool
//! - `.png`/`.jpg`/`.jpeg` are handed back untouched for OCR

pub mod docx;
pub mod extractor;
pub mod pdf;

pub use extractor::{extension_of, ExtractConfig, Extraction, Extractor};
