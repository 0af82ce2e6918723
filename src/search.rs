//! The ranked search engine: lexical, semantic, and hybrid retrieval.
//!
//! Holds its own append-only record table in a database separate from the
//! document store. There is no dedup at this layer — indexing the same
//! `doc_id` twice appends two records; the intake pipeline only re-indexes
//! when content actually changed. This asymmetry with the store's
//! fingerprint dedup is deliberate.
//!
//! Both retrieval strategies are linear scans over the record table. That is
//! the scaling ceiling of this engine: query cost is O(n) in corpus size,
//! acceptable for a single-node corpus of thousands of documents. An
//! approximate-nearest-neighbor index could replace the semantic scan behind
//! the same interface without changing the fusion contract.

use std::collections::HashMap;
use std::path::Path;

use anyhow::Result;
use sqlx::{Row, SqlitePool};

use crate::config::EmbeddingConfig;
use crate::db;
use crate::embedding::{self, tokenize};
use crate::migrate;
use crate::models::SearchHit;

const BM25_K1: f64 = 1.2;
const BM25_B: f64 = 0.75;
/// Hybrid runs both strategies at this multiple of the requested limit
/// before merging.
const OVERSAMPLE: usize = 2;

pub struct SearchIndex {
    pool: SqlitePool,
    embedding: EmbeddingConfig,
}

struct StoredRecord {
    doc_id: i64,
    filename: String,
    content: String,
    metadata: serde_json::Map<String, serde_json::Value>,
    embedding: Vec<f32>,
}

impl SearchIndex {
    /// Open the search-index database, running migrations.
    pub async fn open(path: &Path, embedding: EmbeddingConfig) -> Result<Self> {
        let pool = db::connect(path).await?;
        migrate::run_search_migrations(&pool).await?;
        Ok(Self { pool, embedding })
    }

    /// Embed `content` once and append a search record.
    pub async fn index(
        &self,
        doc_id: i64,
        filename: &str,
        content: &str,
        metadata: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<()> {
        let vector = embedding::embed_query(&self.embedding, content).await?;
        let indexed_at = chrono::Utc::now().timestamp();

        sqlx::query(
            r#"
            INSERT INTO search_records (doc_id, filename, content, metadata_json, embedding, indexed_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(doc_id)
        .bind(filename)
        .bind(content)
        .bind(serde_json::to_string(metadata)?)
        .bind(embedding::vec_to_blob(&vector))
        .bind(indexed_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Lexical retrieval: BM25 (term frequency with document-length
    /// normalization) over the record table, descending score.
    pub async fn full_text_search(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>> {
        let query_terms = tokenize(query);
        if query_terms.is_empty() {
            return Ok(Vec::new());
        }

        let records = self.load_records().await?;
        let token_lists: Vec<Vec<String>> =
            records.iter().map(|r| tokenize(&r.content)).collect();

        let scores = bm25_scores(&query_terms, &token_lists);

        let mut hits: Vec<SearchHit> = records
            .iter()
            .zip(scores)
            .filter(|(_, score)| *score > 0.0)
            .map(|(record, score)| SearchHit {
                doc_id: record.doc_id,
                filename: record.filename.clone(),
                score,
                metadata: record.metadata.clone(),
            })
            .collect();

        sort_descending(&mut hits);
        hits.truncate(limit);
        Ok(hits)
    }

    /// Semantic retrieval: embed the query, cosine similarity against every
    /// record embedding, descending similarity.
    pub async fn semantic_search(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>> {
        let query_vec = embedding::embed_query(&self.embedding, query).await?;
        let records = self.load_records().await?;

        let mut hits: Vec<SearchHit> = records
            .iter()
            .map(|record| SearchHit {
                doc_id: record.doc_id,
                filename: record.filename.clone(),
                score: embedding::cosine_similarity(&query_vec, &record.embedding) as f64,
                metadata: record.metadata.clone(),
            })
            .collect();

        sort_descending(&mut hits);
        hits.truncate(limit);
        Ok(hits)
    }

    /// Fused retrieval: run both strategies independently at 2× oversampling
    /// and merge by `doc_id`. A document in both sets scores the arithmetic
    /// mean of its lexical score and its similarity; a document in one set
    /// keeps that score unmodified — the absent axis contributes nothing.
    pub async fn hybrid_search(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>> {
        let lexical = self.full_text_search(query, limit * OVERSAMPLE).await?;
        let semantic = self.semantic_search(query, limit * OVERSAMPLE).await?;

        let mut fused = fuse(lexical, semantic);
        fused.truncate(limit);
        Ok(fused)
    }

    async fn load_records(&self) -> Result<Vec<StoredRecord>> {
        let rows = sqlx::query(
            "SELECT doc_id, filename, content, metadata_json, embedding FROM search_records ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| {
                let metadata_json: String = row.get("metadata_json");
                let blob: Vec<u8> = row.get("embedding");
                StoredRecord {
                    doc_id: row.get("doc_id"),
                    filename: row.get("filename"),
                    content: row.get("content"),
                    metadata: serde_json::from_str(&metadata_json).unwrap_or_default(),
                    embedding: embedding::blob_to_vec(&blob),
                }
            })
            .collect())
    }
}

/// BM25 over tokenized documents, one score per document.
fn bm25_scores(query_terms: &[String], docs: &[Vec<String>]) -> Vec<f64> {
    let n = docs.len() as f64;
    if docs.is_empty() {
        return Vec::new();
    }
    let avgdl = docs.iter().map(|d| d.len() as f64).sum::<f64>() / n;

    // Document frequency per query term.
    let df: HashMap<&str, f64> = query_terms
        .iter()
        .map(|term| {
            let count = docs
                .iter()
                .filter(|tokens| tokens.iter().any(|t| t == term))
                .count() as f64;
            (term.as_str(), count)
        })
        .collect();

    docs.iter()
        .map(|tokens| {
            let dl = tokens.len() as f64;
            query_terms
                .iter()
                .map(|term| {
                    let tf = tokens.iter().filter(|t| *t == term).count() as f64;
                    if tf == 0.0 {
                        return 0.0;
                    }
                    let df = df.get(term.as_str()).copied().unwrap_or(0.0);
                    let idf = ((n - df + 0.5) / (df + 0.5) + 1.0).ln();
                    let norm = if avgdl > 0.0 {
                        1.0 - BM25_B + BM25_B * dl / avgdl
                    } else {
                        1.0
                    };
                    idf * tf * (BM25_K1 + 1.0) / (tf + BM25_K1 * norm)
                })
                .sum()
        })
        .collect()
}

/// Merge two ranked lists by `doc_id` under the mean-fusion rule.
///
/// Within one list, the first (highest-scoring) entry per `doc_id` wins.
pub fn fuse(lexical: Vec<SearchHit>, semantic: Vec<SearchHit>) -> Vec<SearchHit> {
    struct Axes {
        hit: SearchHit,
        lexical: Option<f64>,
        semantic: Option<f64>,
    }

    let mut merged: HashMap<i64, Axes> = HashMap::new();

    for hit in lexical {
        let score = hit.score;
        merged
            .entry(hit.doc_id)
            .or_insert(Axes {
                hit,
                lexical: None,
                semantic: None,
            })
            .lexical
            .get_or_insert(score);
    }
    for hit in semantic {
        let score = hit.score;
        merged
            .entry(hit.doc_id)
            .or_insert(Axes {
                hit,
                lexical: None,
                semantic: None,
            })
            .semantic
            .get_or_insert(score);
    }

    let mut fused: Vec<SearchHit> = merged
        .into_values()
        .map(|axes| {
            let score = match (axes.lexical, axes.semantic) {
                (Some(l), Some(s)) => (l + s) / 2.0,
                (Some(l), None) => l,
                (None, Some(s)) => s,
                (None, None) => 0.0,
            };
            SearchHit {
                score,
                ..axes.hit
            }
        })
        .collect();

    sort_descending(&mut fused);
    fused
}

/// Keep only results whose stored metadata exactly matches every filter
/// entry (strict AND; no range or partial matching).
pub fn filter_by_metadata(
    filters: &serde_json::Map<String, serde_json::Value>,
    results: &[SearchHit],
) -> Vec<SearchHit> {
    results
        .iter()
        .filter(|hit| filters.iter().all(|(k, v)| hit.metadata.get(k) == Some(v)))
        .cloned()
        .collect()
}

/// Score descending, doc_id ascending on ties (deterministic ordering).
fn sort_descending(hits: &mut [SearchHit]) {
    hits.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.doc_id.cmp(&b.doc_id))
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(doc_id: i64, score: f64) -> SearchHit {
        SearchHit {
            doc_id,
            filename: format!("doc{doc_id}.txt"),
            score,
            metadata: serde_json::Map::new(),
        }
    }

    #[test]
    fn fusion_averages_when_present_in_both() {
        let fused = fuse(vec![hit(1, 0.8)], vec![hit(1, 0.6)]);
        assert_eq!(fused.len(), 1);
        assert!((fused[0].score - 0.7).abs() < 1e-12);
    }

    #[test]
    fn fusion_keeps_single_axis_score_unmodified() {
        let fused = fuse(vec![hit(1, 0.8)], vec![hit(2, 0.3)]);
        let by_id: HashMap<i64, f64> = fused.iter().map(|h| (h.doc_id, h.score)).collect();
        assert_eq!(by_id[&1], 0.8);
        assert_eq!(by_id[&2], 0.3);
    }

    #[test]
    fn fusion_orders_by_combined_score() {
        let fused = fuse(
            vec![hit(1, 0.2), hit(2, 0.9)],
            vec![hit(1, 0.9), hit(2, 0.1)],
        );
        // doc 1: (0.2+0.9)/2 = 0.55, doc 2: (0.9+0.1)/2 = 0.5
        assert_eq!(fused[0].doc_id, 1);
        assert_eq!(fused[1].doc_id, 2);
    }

    #[test]
    fn bm25_prefers_documents_with_more_matches() {
        let query = tokenize("signal failure");
        let docs = vec![
            tokenize("signal failure reported at the junction signal cabin"),
            tokenize("routine cleaning of the concourse"),
            tokenize("signal inspection log"),
        ];
        let scores = bm25_scores(&query, &docs);
        assert!(scores[0] > scores[2]);
        assert_eq!(scores[1], 0.0);
    }

    #[test]
    fn bm25_length_normalization_favors_shorter_docs() {
        let query = tokenize("tender");
        let padding = "unrelated words ".repeat(50);
        let docs = vec![
            tokenize("tender notice"),
            tokenize(&format!("tender notice {padding}")),
        ];
        let scores = bm25_scores(&query, &docs);
        assert!(scores[0] > scores[1]);
    }

    #[test]
    fn metadata_filter_is_strict_and() {
        let mut meta_a = serde_json::Map::new();
        meta_a.insert("doc_type".into(), "Safety".into());
        meta_a.insert("language".into(), "eng".into());
        let mut meta_b = serde_json::Map::new();
        meta_b.insert("doc_type".into(), "Safety".into());
        meta_b.insert("language".into(), "malayalam".into());

        let results = vec![
            SearchHit {
                doc_id: 1,
                filename: "a.pdf".into(),
                score: 1.0,
                metadata: meta_a,
            },
            SearchHit {
                doc_id: 2,
                filename: "b.pdf".into(),
                score: 0.9,
                metadata: meta_b,
            },
        ];

        let mut filters = serde_json::Map::new();
        filters.insert("doc_type".into(), "Safety".into());
        filters.insert("language".into(), "eng".into());

        let filtered = filter_by_metadata(&filters, &results);
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].doc_id, 1);
    }

    #[test]
    fn missing_filter_key_excludes_result() {
        let results = vec![hit(1, 1.0)];
        let mut filters = serde_json::Map::new();
        filters.insert("doc_type".into(), "Safety".into());
        assert!(filter_by_metadata(&filters, &results).is_empty());
    }
}
