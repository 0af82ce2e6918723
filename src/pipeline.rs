//! Intake orchestration.
//!
//! Wires the full flow for one document: extract → fingerprint →
//! classify/skim → compliance rules → store.save (dedup) → search index →
//! recipient links. Runs end-to-end for one document at a time from the
//! caller's perspective; independent documents may be ingested concurrently
//! because the store serializes its fingerprint upsert internally.

use std::path::Path;

use anyhow::Result;
use tracing::info;

use crate::classify;
use crate::config::Config;
use crate::extract::{self, ExtractOptions};
use crate::models::{ExternalAnalysis, IntakeOutcome, Metadata, SearchHit, SearchMode};
use crate::ocr::{self, OcrBackend};
use crate::rules::RuleSet;
use crate::search::{self, SearchIndex};
use crate::skim;
use crate::store::DocumentStore;

pub struct Intake {
    store: DocumentStore,
    index: SearchIndex,
    rules: RuleSet,
    ocr: Box<dyn OcrBackend>,
    max_pdf_pages: usize,
    default_limit: usize,
}

impl Intake {
    /// Open both persistence substrates and load the rule table.
    pub async fn open(config: &Config) -> Result<Self> {
        let store = DocumentStore::open(&config.store.path).await?;
        let index = SearchIndex::open(&config.search.path, config.embedding.clone()).await?;
        let rules = match &config.rules.path {
            Some(path) => RuleSet::load(path)?,
            None => RuleSet::default(),
        };
        let ocr = ocr::create_backend(&config.extraction.ocr);
        Ok(Self {
            store,
            index,
            rules,
            ocr,
            max_pdf_pages: config.extraction.max_pdf_pages,
            default_limit: config.search.default_limit,
        })
    }

    pub fn store(&self) -> &DocumentStore {
        &self.store
    }

    pub fn index(&self) -> &SearchIndex {
        &self.index
    }

    /// Ingest one document. The intake entry point.
    ///
    /// `external` is the optional collaborator analysis blob, accepted as
    /// arbitrary JSON and parsed tolerantly. Extraction failures degrade to
    /// empty text and still produce a stored record; only storage faults
    /// surface as errors.
    pub async fn ingest(
        &self,
        filename: &str,
        bytes: &[u8],
        external: Option<serde_json::Value>,
        recipients: &[i64],
    ) -> Result<IntakeOutcome> {
        let filename = basename(filename);
        let ext = extension_of(filename);
        let opts = ExtractOptions {
            max_pdf_pages: self.max_pdf_pages,
            ocr: self.ocr.as_ref(),
        };
        let text = extract::extract_text(bytes, &ext, &opts);
        let content_hash = extract::fingerprint(bytes);

        let metadata = classify::classify(&ext, &text);
        let quick = skim::quick_skim(&text);
        let external = external.map(ExternalAnalysis::from_value);
        let flags = self.rules.evaluate(&quick, external.as_ref());

        let saved = self
            .store
            .save(
                filename,
                &content_hash,
                &metadata,
                &quick,
                external.as_ref(),
                &flags,
                &text,
            )
            .await?;

        // The index layer is append-only and does not dedup; identical bytes
        // mean identical content, so a dedup hit skips re-indexing.
        if !saved.deduplicated {
            self.index
                .index(saved.document_id, filename, &text, &search_metadata(&metadata))
                .await?;
        }

        if !recipients.is_empty() {
            self.store
                .link_recipients(saved.document_id, recipients)
                .await?;
        }

        info!(
            doc_id = saved.document_id,
            deduplicated = saved.deduplicated,
            doc_type = %metadata.doc_type,
            flags = flags.len(),
            "document ingested"
        );

        Ok(IntakeOutcome {
            document_id: saved.document_id,
            deduplicated: saved.deduplicated,
            metadata,
            quick_view: quick,
            compliance_flags: flags,
        })
    }

    /// Query entry point: dispatch on mode, then apply the metadata filter.
    pub async fn search(
        &self,
        query: &str,
        mode: SearchMode,
        limit: Option<usize>,
        filters: Option<&serde_json::Map<String, serde_json::Value>>,
    ) -> Result<Vec<SearchHit>> {
        let limit = limit.unwrap_or(self.default_limit);
        let hits = match mode {
            SearchMode::FullText => self.index.full_text_search(query, limit).await?,
            SearchMode::Semantic => self.index.semantic_search(query, limit).await?,
            SearchMode::Hybrid => self.index.hybrid_search(query, limit).await?,
        };
        Ok(match filters {
            Some(filters) if !filters.is_empty() => search::filter_by_metadata(filters, &hits),
            _ => hits,
        })
    }
}

/// Subset of [`Metadata`] stored alongside each search record and matched by
/// `filter_by_metadata`.
pub fn search_metadata(metadata: &Metadata) -> serde_json::Map<String, serde_json::Value> {
    let mut map = serde_json::Map::new();
    map.insert("ext".into(), metadata.ext.clone().into());
    map.insert("language".into(), metadata.language.clone().into());
    map.insert("doc_type".into(), metadata.doc_type.clone().into());
    map.insert(
        "suggested_role".into(),
        metadata.suggested_role.clone().into(),
    );
    map
}

/// Lowercased extension including the dot; `""` when there is none.
pub fn extension_of(filename: &str) -> String {
    Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{}", e.to_ascii_lowercase()))
        .unwrap_or_default()
}

fn basename(filename: &str) -> &str {
    Path::new(filename)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(filename)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_is_lowercased_with_dot() {
        assert_eq!(extension_of("Report.PDF"), ".pdf");
        assert_eq!(extension_of("notes.txt"), ".txt");
        assert_eq!(extension_of("noext"), "");
    }

    #[test]
    fn basename_strips_directories() {
        assert_eq!(basename("uploads/2024/scan.png"), "scan.png");
        assert_eq!(basename("scan.png"), "scan.png");
    }

    #[test]
    fn search_metadata_carries_filterable_fields() {
        let meta = classify::classify(".txt", "Tender notice for vendor supply.");
        let map = search_metadata(&meta);
        assert_eq!(map["doc_type"], "Procurement");
        assert_eq!(map["ext"], ".txt");
        assert!(map.get("char_count").is_none());
    }
}
