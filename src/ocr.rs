//! Pluggable OCR backends for image documents.
//!
//! The default backend shells out to the `tesseract` CLI when it is installed;
//! a disabled backend is available for deployments without OCR. Callers treat
//! an unavailable or failing backend as "no text", never as a fatal error.

use std::io::Write;
use std::process::Command;

use anyhow::{bail, Context, Result};

use crate::config::OcrConfig;

/// A single OCR engine.
pub trait OcrBackend: Send + Sync {
    fn name(&self) -> &str;

    /// Whether the engine can run in this environment (binary present, etc.).
    fn is_available(&self) -> bool;

    /// Recognize text in an image. `ext` is the lowercased file extension
    /// (including the dot) used to pick the scratch-file suffix.
    fn recognize(&self, bytes: &[u8], ext: &str) -> Result<String>;
}

/// Tesseract via its command-line interface.
pub struct TesseractCli {
    binary: String,
}

impl TesseractCli {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

impl OcrBackend for TesseractCli {
    fn name(&self) -> &str {
        "tesseract"
    }

    fn is_available(&self) -> bool {
        Command::new(&self.binary)
            .arg("--version")
            .output()
            .map(|out| out.status.success())
            .unwrap_or(false)
    }

    fn recognize(&self, bytes: &[u8], ext: &str) -> Result<String> {
        let suffix = if ext.starts_with('.') {
            ext.to_string()
        } else {
            format!(".{ext}")
        };
        let mut scratch = tempfile::Builder::new()
            .prefix("docsense-ocr-")
            .suffix(&suffix)
            .tempfile()
            .context("failed to create OCR scratch file")?;
        scratch
            .write_all(bytes)
            .context("failed to write OCR scratch file")?;

        let output = Command::new(&self.binary)
            .arg(scratch.path())
            .arg("stdout")
            .output()
            .with_context(|| format!("failed to run {}", self.binary))?;

        if !output.status.success() {
            bail!(
                "{} exited with {}: {}",
                self.binary,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// Backend used when OCR is switched off in configuration.
pub struct DisabledOcr;

impl OcrBackend for DisabledOcr {
    fn name(&self) -> &str {
        "disabled"
    }

    fn is_available(&self) -> bool {
        false
    }

    fn recognize(&self, _bytes: &[u8], _ext: &str) -> Result<String> {
        bail!("OCR backend is disabled")
    }
}

/// Instantiate the backend selected in `[extraction.ocr]`.
pub fn create_backend(config: &OcrConfig) -> Box<dyn OcrBackend> {
    match config.backend.as_str() {
        "tesseract" => Box::new(TesseractCli::new(config.binary.clone())),
        _ => Box::new(DisabledOcr),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_backend_is_never_available() {
        let backend = DisabledOcr;
        assert!(!backend.is_available());
        assert!(backend.recognize(b"png bytes", ".png").is_err());
    }

    #[test]
    fn missing_binary_reports_unavailable() {
        let backend = TesseractCli::new("definitely-not-a-real-ocr-binary");
        assert!(!backend.is_available());
    }
}
