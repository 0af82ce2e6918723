//! Multi-format text extraction and content fingerprinting.
//!
//! Intake supplies raw bytes plus a file-extension hint; this module returns
//! plain UTF-8 text. Extraction never raises to its caller: a corrupt file,
//! an unsupported format, or a missing OCR backend degrades to an empty
//! string and downstream stages must tolerate that.

use std::io::Read;

use sha2::{Digest, Sha256};
use tracing::warn;

use crate::ocr::OcrBackend;

/// Maximum decompressed bytes to read from a single ZIP entry (zip-bomb protection).
const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;

/// Extensions routed through the OCR backend.
const IMAGE_EXTENSIONS: &[&str] = &[".jpg", ".jpeg", ".png"];

/// Extensions the extractor has format-specific logic for. Anything else
/// still ingests, just with empty text.
pub fn is_supported_extension(ext: &str) -> bool {
    let ext = ext.to_ascii_lowercase();
    matches!(ext.as_str(), ".pdf" | ".docx" | ".txt" | ".md")
        || IMAGE_EXTENSIONS.contains(&ext.as_str())
}

/// Knobs for a single extraction call.
pub struct ExtractOptions<'a> {
    /// PDF pages are read up to this cap; later pages are ignored.
    pub max_pdf_pages: usize,
    pub ocr: &'a dyn OcrBackend,
}

/// Extract plain text from document bytes, dispatching on the extension.
///
/// Per-format failures are logged and collapse to `""`.
pub fn extract_text(bytes: &[u8], ext: &str, opts: &ExtractOptions) -> String {
    let ext = ext.to_ascii_lowercase();
    let result = match ext.as_str() {
        ".pdf" => extract_pdf(bytes, opts.max_pdf_pages),
        ".docx" => extract_docx(bytes),
        ".txt" | ".md" => Ok(String::from_utf8_lossy(bytes).into_owned()),
        _ if IMAGE_EXTENSIONS.contains(&ext.as_str()) => extract_image(bytes, &ext, opts.ocr),
        _ => Ok(String::new()),
    };

    match result {
        Ok(text) => text,
        Err(e) => {
            warn!(ext = %ext, error = %e, "extraction degraded to empty text");
            String::new()
        }
    }
}

/// SHA-256 of the raw byte sequence, lowercase hex.
///
/// Deterministic and stable across processes; the sole deduplication key.
pub fn fingerprint(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

fn extract_pdf(bytes: &[u8], max_pages: usize) -> anyhow::Result<String> {
    let pages = pdf_extract::extract_text_from_mem_by_pages(bytes)?;
    Ok(pages
        .into_iter()
        .take(max_pages)
        .collect::<Vec<_>>()
        .join("\n"))
}

fn extract_image(bytes: &[u8], ext: &str, ocr: &dyn OcrBackend) -> anyhow::Result<String> {
    if !ocr.is_available() {
        return Ok(String::new());
    }
    ocr.recognize(bytes, ext)
}

fn extract_docx(bytes: &[u8]) -> anyhow::Result<String> {
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes))?;
    let entry = archive.by_name("word/document.xml")?;
    let mut doc_xml = Vec::new();
    entry.take(MAX_XML_ENTRY_BYTES).read_to_end(&mut doc_xml)?;
    if doc_xml.len() as u64 >= MAX_XML_ENTRY_BYTES {
        anyhow::bail!("word/document.xml exceeds size limit");
    }
    extract_paragraph_text(&doc_xml)
}

/// Walk `word/document.xml`, collecting `w:t` runs and emitting one line per
/// `w:p` paragraph, in document order.
fn extract_paragraph_text(xml: &[u8]) -> anyhow::Result<String> {
    let mut out = String::new();
    let mut reader = quick_xml::Reader::from_reader(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(quick_xml::events::Event::Start(e)) => {
                if e.local_name().as_ref() == b"t" {
                    if let Ok(quick_xml::events::Event::Text(te)) = reader.read_event_into(&mut buf)
                    {
                        out.push_str(te.unescape().unwrap_or_default().as_ref());
                    }
                }
            }
            Ok(quick_xml::events::Event::End(e)) => {
                if e.local_name().as_ref() == b"p" && !out.ends_with('\n') {
                    out.push('\n');
                }
            }
            Ok(quick_xml::events::Event::Eof) => break,
            Err(e) => return Err(e.into()),
            _ => {}
        }
        buf.clear();
    }
    Ok(out.trim_end().to_string())
}
