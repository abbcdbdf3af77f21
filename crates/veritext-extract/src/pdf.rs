//! PDF text extraction through the `pdftotext` CLI from `poppler-utils`

use std::io::ErrorKind;
use std::path::Path;
use tokio::process::Command;
use tracing::{debug, warn};
use veritext_core::{Error, Result};

/// Run `pdftotext` on `path` and return its standard output.
///
/// A missing binary is reported as [`Error::ToolNotInstalled`]; a non-zero
/// exit carries the tool's stderr.
pub async fn extract_text(pdftotext_bin: &Path, path: &Path, filename: &str) -> Result<String> {
    debug!("Running {} on {}", pdftotext_bin.display(), path.display());

    let output = Command::new(pdftotext_bin)
        .arg("-enc")
        .arg("UTF-8")
        .arg(path)
        .arg("-")
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|e| match e.kind() {
            ErrorKind::NotFound => Error::ToolNotInstalled {
                tool: pdftotext_bin.display().to_string(),
                package: "poppler-utils".to_string(),
            },
            _ => Error::extraction(format!("Could not run pdftotext on {}: {}", filename, e)),
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let stderr = stderr.trim();
        warn!("pdftotext failed on {} ({}): {}", filename, output.status, stderr);

        return Err(Error::extraction(if stderr.is_empty() {
            format!("pdftotext failed on {} ({})", filename, output.status)
        } else {
            format!("pdftotext failed on {}: {}", filename, stderr)
        }));
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_binary_is_reported() {
        let bin = Path::new("veritext-no-such-pdftotext");
        let err = extract_text(bin, Path::new("doc.pdf"), "doc.pdf")
            .await
            .unwrap_err();

        assert!(matches!(err, Error::ToolNotInstalled { .. }));
        assert!(err.to_string().contains("poppler-utils"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_non_zero_exit_is_extraction_error() {
        // `false` ignores its arguments and exits 1
        let err = extract_text(Path::new("false"), Path::new("doc.pdf"), "doc.pdf")
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Extraction(_)));
        assert!(err.to_string().contains("doc.pdf"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_stdout_is_captured() {
        // `echo` prints its arguments, standing in for a converter
        let text = extract_text(Path::new("echo"), Path::new("doc.pdf"), "doc.pdf")
            .await
            .unwrap();

        assert_eq!(text.trim(), "-enc UTF-8 doc.pdf -");
    }
}
