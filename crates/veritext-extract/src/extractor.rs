//! Extension-based dispatch to the individual extractors

use crate::{docx, pdf};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use veritext_core::{Error, FileKind, Result, KNOWN_EXTENSIONS};

/// Extraction settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractConfig {
    /// Lowercase extensions (without the dot) that uploads may use
    #[serde(default = "default_allowed_extensions")]
    pub allowed_extensions: Vec<String>,

    /// `pdftotext` binary name or path
    #[serde(default = "default_pdftotext_bin")]
    pub pdftotext_bin: PathBuf,
}

fn default_allowed_extensions() -> Vec<String> {
    KNOWN_EXTENSIONS.iter().map(|ext| ext.to_string()).collect()
}

fn default_pdftotext_bin() -> PathBuf {
    PathBuf::from("pdftotext")
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            allowed_extensions: default_allowed_extensions(),
            pdftotext_bin: default_pdftotext_bin(),
        }
    }
}

impl ExtractConfig {
    /// Reject allow-list entries the dispatcher has no extractor for
    pub fn validate(&self) -> Result<()> {
        if self.allowed_extensions.is_empty() {
            return Err(Error::config("allowed_extensions must not be empty"));
        }
        for ext in &self.allowed_extensions {
            if FileKind::from_extension(ext).is_none() {
                return Err(Error::config(format!(
                    "unsupported extension '{}' in allowed_extensions (known: {})",
                    ext,
                    KNOWN_EXTENSIONS.join(", ")
                )));
            }
        }
        Ok(())
    }
}

/// What the dispatcher produced for a file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extraction {
    /// Text read directly from the document
    Text(String),

    /// The file is an image; text must come from OCR
    Image(PathBuf),
}

/// Text extraction dispatcher
#[derive(Debug, Clone, Default)]
pub struct Extractor {
    config: ExtractConfig,
}

impl Extractor {
    pub fn new(config: ExtractConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ExtractConfig {
        &self.config
    }

    /// Resolve an extension against the allow-list
    pub fn file_kind(&self, extension: Option<&str>) -> Option<FileKind> {
        let ext = extension?.trim_start_matches('.').to_ascii_lowercase();
        if !self.config.allowed_extensions.iter().any(|allowed| allowed.eq_ignore_ascii_case(&ext)) {
            return None;
        }
        FileKind::from_extension(&ext)
    }

    /// True if a file with this name would be accepted
    pub fn is_allowed(&self, filename: &str) -> bool {
        self.file_kind(extension_of(filename)).is_some()
    }

    /// Extract text from the file at `path`.
    ///
    /// Disallowed or missing extensions are rejected before the file is
    /// touched. A successful result is never empty.
    pub async fn extract(&self, path: &Path, extension: Option<&str>) -> Result<Extraction> {
        let kind = self.file_kind(extension).ok_or(Error::UnsupportedFileType)?;
        let filename = display_name(path);

        debug!("Extracting {} as {:?}", path.display(), kind);

        let text = match kind {
            FileKind::PlainText => read_text(path, &filename).await?,
            FileKind::Docx => docx::extract_text(path, &filename).await?,
            FileKind::Pdf => pdf::extract_text(&self.config.pdftotext_bin, path, &filename).await?,
            FileKind::Image => return Ok(Extraction::Image(path.to_path_buf())),
        };

        if text.trim().is_empty() {
            return Err(Error::extraction(format!(
                "Could not extract text from {}",
                filename
            )));
        }

        info!("Extracted {} chars from {}", text.len(), filename);
        Ok(Extraction::Text(text))
    }
}

/// Extension of a filename, without the dot
pub fn extension_of(filename: &str) -> Option<&str> {
    let (_, ext) = filename.rsplit_once('.')?;
    (!ext.is_empty()).then_some(ext)
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

async fn read_text(path: &Path, filename: &str) -> Result<String> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| Error::extraction(format!("Could not read {}: {}", filename, e)))?;

    String::from_utf8(bytes)
        .map_err(|e| Error::extraction(format!("Could not decode {} as UTF-8 text: {}", filename, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_file(dir: &TempDir, name: &str, contents: &[u8]) -> PathBuf {
        let path = dir.path().join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(contents).unwrap();
        path
    }

    #[tokio::test]
    async fn test_plain_text() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "note.txt", b"Hello world.");

        let extraction = Extractor::default().extract(&path, Some("txt")).await.unwrap();
        assert_eq!(extraction, Extraction::Text("Hello world.".to_string()));
    }

    #[tokio::test]
    async fn test_extension_is_case_insensitive() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "NOTE.TXT", b"Shouting filenames");

        let extraction = Extractor::default().extract(&path, Some("TXT")).await.unwrap();
        assert!(matches!(extraction, Extraction::Text(_)));
    }

    #[tokio::test]
    async fn test_invalid_utf8_names_file() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "latin1.txt", &[0x66, 0x6f, 0xff, 0xfe]);

        let err = Extractor::default().extract(&path, Some("txt")).await.unwrap_err();
        assert!(matches!(err, Error::Extraction(_)));
        assert!(err.to_string().contains("latin1.txt"));
    }

    #[tokio::test]
    async fn test_empty_text_synthesizes_error() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "blank.txt", b"  \n\t ");

        let err = Extractor::default().extract(&path, Some("txt")).await.unwrap_err();
        assert_eq!(err.to_string(), "Could not extract text from blank.txt");
    }

    #[tokio::test]
    async fn test_image_is_routed_to_ocr() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "scan.png", b"\x89PNG\r\n\x1a\n");

        let extraction = Extractor::default().extract(&path, Some("png")).await.unwrap();
        assert_eq!(extraction, Extraction::Image(path));
    }

    #[tokio::test]
    async fn test_disallowed_extension_never_touches_disk() {
        // The file does not exist: rejection must happen before any read.
        let path = Path::new("/nonexistent/veritext/payload.exe");

        let err = Extractor::default().extract(path, Some("exe")).await.unwrap_err();
        assert!(matches!(err, Error::UnsupportedFileType));

        let err = Extractor::default().extract(path, None).await.unwrap_err();
        assert!(matches!(err, Error::UnsupportedFileType));
    }

    #[tokio::test]
    async fn test_allow_list_restricts_known_types() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "note.txt", b"text");

        let extractor = Extractor::new(ExtractConfig {
            allowed_extensions: vec!["pdf".to_string()],
            ..Default::default()
        });

        let err = extractor.extract(&path, Some("txt")).await.unwrap_err();
        assert!(matches!(err, Error::UnsupportedFileType));
    }

    #[tokio::test]
    async fn test_missing_text_file_is_extraction_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("gone.txt");

        let err = Extractor::default().extract(&path, Some("txt")).await.unwrap_err();
        assert!(matches!(err, Error::Extraction(_)));
        assert!(err.to_string().contains("gone.txt"));
    }

    #[test]
    fn test_extension_of() {
        assert_eq!(extension_of("report.final.PDF"), Some("PDF"));
        assert_eq!(extension_of("archive."), None);
        assert_eq!(extension_of("README"), None);
        assert_eq!(extension_of(".txt"), Some("txt"));
    }

    #[test]
    fn test_is_allowed() {
        let extractor = Extractor::default();
        assert!(extractor.is_allowed("essay.docx"));
        assert!(extractor.is_allowed("photo.JPG"));
        assert!(!extractor.is_allowed("setup.exe"));
        assert!(!extractor.is_allowed("no_extension"));
    }

    #[test]
    fn test_config_validation() {
        assert!(ExtractConfig::default().validate().is_ok());

        let config = ExtractConfig {
            allowed_extensions: vec!["txt".to_string(), "exe".to_string()],
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        let config = ExtractConfig {
            allowed_extensions: vec![],
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
