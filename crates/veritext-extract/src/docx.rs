//! DOCX text extraction via `docx-rs`

use docx_rs::{DocumentChild, Paragraph, ParagraphChild, Run, RunChild};
use std::path::Path;
use tracing::debug;
use veritext_core::{Error, Result};

/// Extract the text of every top-level paragraph, one paragraph per line
pub async fn extract_text(path: &Path, filename: &str) -> Result<String> {
    debug!("Extracting DOCX: {}", path.display());

    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| Error::extraction(format!("Could not read {}: {}", filename, e)))?;

    paragraphs_from_bytes(&bytes)
        .map(|paragraphs| paragraphs.join("\n"))
        .map_err(|e| Error::extraction(format!("Could not parse DOCX file {}: {}", filename, e)))
}

fn paragraphs_from_bytes(bytes: &[u8]) -> std::result::Result<Vec<String>, docx_rs::ReaderError> {
    let doc = docx_rs::read_docx(bytes)?;

    Ok(doc
        .document
        .children
        .iter()
        .filter_map(|child| match child {
            DocumentChild::Paragraph(para) => Some(paragraph_text(para)),
            _ => None,
        })
        .collect())
}

fn paragraph_text(para: &Paragraph) -> String {
    let mut text = String::new();
    for child in &para.children {
        match child {
            ParagraphChild::Run(run) => push_run(run, &mut text),
            ParagraphChild::Hyperlink(link) => {
                for inner in &link.children {
                    if let ParagraphChild::Run(run) = inner {
                        push_run(run, &mut text);
                    }
                }
            }
            _ => {}
        }
    }
    text
}

fn push_run(run: &Run, output: &mut String) {
    for child in &run.children {
        match child {
            RunChild::Text(t) => output.push_str(&t.text),
            RunChild::Tab(_) => output.push('\t'),
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docx_rs::Docx;
    use tempfile::TempDir;

    fn write_docx(dir: &TempDir, name: &str, paragraphs: &[&str]) -> std::path::PathBuf {
        let path = dir.path().join(name);
        let mut doc = Docx::new();
        for text in paragraphs {
            doc = doc.add_paragraph(Paragraph::new().add_run(Run::new().add_text(*text)));
        }
        let file = std::fs::File::create(&path).unwrap();
        doc.build().pack(file).unwrap();
        path
    }

    #[tokio::test]
    async fn test_paragraphs_joined_by_newline() {
        let dir = TempDir::new().unwrap();
        let path = write_docx(&dir, "essay.docx", &["First paragraph.", "Second paragraph."]);

        let text = extract_text(&path, "essay.docx").await.unwrap();
        assert_eq!(text, "First paragraph.\nSecond paragraph.");
    }

    #[tokio::test]
    async fn test_runs_are_concatenated() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("runs.docx");
        let para = Paragraph::new()
            .add_run(Run::new().add_text("Split "))
            .add_run(Run::new().add_text("across runs"));
        let file = std::fs::File::create(&path).unwrap();
        Docx::new().add_paragraph(para).build().pack(file).unwrap();

        let text = extract_text(&path, "runs.docx").await.unwrap();
        assert_eq!(text, "Split across runs");
    }

    #[tokio::test]
    async fn test_corrupt_docx_is_extraction_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.docx");
        std::fs::write(&path, b"this is not a zip archive").unwrap();

        let err = extract_text(&path, "broken.docx").await.unwrap_err();
        assert!(matches!(err, Error::Extraction(_)));
        assert!(err.to_string().contains("broken.docx"));
    }
}
