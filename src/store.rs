//! Fingerprint-deduplicated document persistence.
//!
//! One SQLite database holds documents (keyed by unique content hash),
//! their latest analysis, users, and recipient links, plus a lightweight
//! lexical substrate for `basic_search`. This substrate is deliberately
//! separate from the ranked search engine in [`crate::search`]: one is a
//! recency/browse fallback inside the store, the other is the primary
//! ranked index. They are not to be merged.

use std::path::Path;

use anyhow::Result;
use sqlx::{Row, SqlitePool};
use tokio::sync::Mutex;
use tracing::debug;

use crate::db;
use crate::migrate;
use crate::models::{
    BasicSearchHit, ComplianceFlag, DocumentRecord, ExternalAnalysis, Metadata, QuickView,
    SaveOutcome, User,
};

pub struct DocumentStore {
    pool: SqlitePool,
    fts_enabled: bool,
    /// Serializes save() so the lookup-then-insert/replace sequence cannot
    /// interleave across concurrent uploads of identical bytes.
    write_lock: Mutex<()>,
}

impl DocumentStore {
    /// Open the store database, running migrations.
    pub async fn open(path: &Path) -> Result<Self> {
        let pool = db::connect(path).await?;
        let fts_enabled = migrate::run_store_migrations(&pool).await?;
        Ok(Self {
            pool,
            fts_enabled,
            write_lock: Mutex::new(()),
        })
    }

    /// Whether `basic_search` is FTS5-backed (vs. the substring fallback).
    pub fn fts_enabled(&self) -> bool {
        self.fts_enabled
    }

    /// Persist one document. The single mutation path.
    ///
    /// Lookup by fingerprint: a hit deletes the prior analysis, updates the
    /// filename to this upload's, and reuses the id; a miss inserts a new
    /// document row. Both paths then insert a fresh analysis row and a fresh
    /// lexical row. Unique-key violations outside this dedup path and I/O
    /// faults surface as errors; there is no automatic retry.
    #[allow(clippy::too_many_arguments)]
    pub async fn save(
        &self,
        filename: &str,
        content_hash: &str,
        metadata: &Metadata,
        quick: &QuickView,
        external: Option<&ExternalAnalysis>,
        flags: &[ComplianceFlag],
        fulltext: &str,
    ) -> Result<SaveOutcome> {
        let quick_json = serde_json::to_string(quick)?;
        let external_json = external.map(serde_json::to_string).transpose()?;
        let flags_json = serde_json::to_string(flags)?;
        let created_at = chrono::Utc::now().timestamp();

        let _guard = self.write_lock.lock().await;
        let mut tx = self.pool.begin().await?;

        let existing: Option<i64> =
            sqlx::query_scalar("SELECT id FROM documents WHERE content_hash = ?")
                .bind(content_hash)
                .fetch_optional(&mut *tx)
                .await?;

        let (doc_id, deduplicated) = match existing {
            Some(id) => {
                debug!(doc_id = id, "fingerprint already known; replacing analysis");
                sqlx::query("DELETE FROM analyses WHERE doc_id = ?")
                    .bind(id)
                    .execute(&mut *tx)
                    .await?;
                // Fingerprint is the sole identity; the newest filename wins.
                sqlx::query("UPDATE documents SET filename = ? WHERE id = ?")
                    .bind(filename)
                    .bind(id)
                    .execute(&mut *tx)
                    .await?;
                (id, true)
            }
            None => {
                let result = sqlx::query(
                    r#"
                    INSERT INTO documents
                        (filename, content_hash, ext, language, is_bilingual, doc_type,
                         suggested_role, char_count, created_at)
                    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                    "#,
                )
                .bind(filename)
                .bind(content_hash)
                .bind(&metadata.ext)
                .bind(&metadata.language)
                .bind(metadata.is_bilingual)
                .bind(&metadata.doc_type)
                .bind(&metadata.suggested_role)
                .bind(metadata.char_count as i64)
                .bind(created_at)
                .execute(&mut *tx)
                .await?;
                (result.last_insert_rowid(), false)
            }
        };

        sqlx::query(
            "INSERT INTO analyses (doc_id, quick_json, external_json, flags_json) VALUES (?, ?, ?, ?)",
        )
        .bind(doc_id)
        .bind(&quick_json)
        .bind(&external_json)
        .bind(&flags_json)
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM docs_fts WHERE doc_id = ?")
            .bind(doc_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query(
            "INSERT INTO docs_fts (doc_id, content, filename, doc_type, language) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(doc_id)
        .bind(fulltext)
        .bind(filename)
        .bind(&metadata.doc_type)
        .bind(&metadata.language)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(SaveOutcome {
            document_id: doc_id,
            deduplicated,
        })
    }

    /// Most-recent-first by id.
    pub async fn recent(&self, limit: i64) -> Result<Vec<DocumentRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT d.id, d.filename, d.content_hash, d.ext, d.language, d.is_bilingual,
                   d.doc_type, d.suggested_role, d.char_count, d.created_at,
                   a.quick_json, a.external_json, a.flags_json
            FROM documents d
            JOIN analyses a ON a.doc_id = d.id
            ORDER BY d.id DESC
            LIMIT ?
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(row_to_record).collect())
    }

    /// Documents linked to a recipient, most-recent-first by id.
    pub async fn documents_for_recipient(&self, user_id: i64) -> Result<Vec<DocumentRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT d.id, d.filename, d.content_hash, d.ext, d.language, d.is_bilingual,
                   d.doc_type, d.suggested_role, d.char_count, d.created_at,
                   a.quick_json, a.external_json, a.flags_json
            FROM documents d
            JOIN analyses a ON a.doc_id = d.id
            JOIN document_recipients dr ON dr.doc_id = d.id
            WHERE dr.user_id = ?
            ORDER BY d.id DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(row_to_record).collect())
    }

    /// Lightweight lexical search over stored fulltext.
    ///
    /// Prefers FTS5 match + snippet. Without FTS5 this is a case-sensitive
    /// substring scan returning a fixed-length prefix as the snippet — no
    /// ranking, no highlighting; strictly lower quality than the FTS5 path.
    pub async fn basic_search(&self, query: &str, limit: i64) -> Result<Vec<BasicSearchHit>> {
        if query.is_empty() {
            return Ok(Vec::new());
        }

        let rows = if self.fts_enabled {
            sqlx::query(
                r#"
                SELECT doc_id, filename, doc_type, language,
                       snippet(docs_fts, 1, '[', ']', '…', 10) AS snippet
                FROM docs_fts
                WHERE docs_fts MATCH ?
                LIMIT ?
                "#,
            )
            .bind(query)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?
        } else {
            sqlx::query(
                r#"
                SELECT doc_id, filename, doc_type, language,
                       substr(content, 1, 200) AS snippet
                FROM docs_fts
                WHERE instr(content, ?) > 0
                LIMIT ?
                "#,
            )
            .bind(query)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?
        };

        Ok(rows
            .iter()
            .map(|row| BasicSearchHit {
                doc_id: row.get("doc_id"),
                filename: row.get("filename"),
                doc_type: row.get("doc_type"),
                language: row.get("language"),
                snippet: row.get("snippet"),
            })
            .collect())
    }

    /// Create a user. The password hash is computed by the caller; this store
    /// never sees plaintext credentials.
    pub async fn create_user(
        &self,
        username: &str,
        email: &str,
        password_hash: &str,
        role: &str,
    ) -> Result<i64> {
        let created_at = chrono::Utc::now().timestamp();
        let result = sqlx::query(
            "INSERT INTO users (username, email, password_hash, role, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(username)
        .bind(email)
        .bind(password_hash)
        .bind(role)
        .bind(created_at)
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    /// Exact match on username + stored hash. Hash comparison semantics
    /// (algorithm, salting) belong to the caller.
    pub async fn authenticate_user(
        &self,
        username: &str,
        password_hash: &str,
    ) -> Result<Option<User>> {
        let row = sqlx::query(
            "SELECT id, username, email, role FROM users WHERE username = ? AND password_hash = ?",
        )
        .bind(username)
        .bind(password_hash)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| User {
            id: r.get("id"),
            username: r.get("username"),
            email: r.get("email"),
            role: r.get("role"),
        }))
    }

    pub async fn list_users(&self) -> Result<Vec<User>> {
        let rows = sqlx::query("SELECT id, username, email, role FROM users ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows
            .iter()
            .map(|r| User {
                id: r.get("id"),
                username: r.get("username"),
                email: r.get("email"),
                role: r.get("role"),
            })
            .collect())
    }

    /// Append recipient links. Append-only; links survive re-uploads.
    pub async fn link_recipients(&self, doc_id: i64, user_ids: &[i64]) -> Result<()> {
        let sent_at = chrono::Utc::now().timestamp();
        for user_id in user_ids {
            sqlx::query(
                "INSERT INTO document_recipients (doc_id, user_id, sent_at) VALUES (?, ?, ?)",
            )
            .bind(doc_id)
            .bind(user_id)
            .bind(sent_at)
            .execute(&self.pool)
            .await?;
        }
        Ok(())
    }
}

fn row_to_record(row: &sqlx::sqlite::SqliteRow) -> DocumentRecord {
    let quick_json: String = row.get("quick_json");
    let external_json: Option<String> = row.get("external_json");
    let flags_json: String = row.get("flags_json");

    DocumentRecord {
        id: row.get("id"),
        filename: row.get("filename"),
        content_hash: row.get("content_hash"),
        metadata: Metadata {
            ext: row.get("ext"),
            language: row.get("language"),
            is_bilingual: row.get("is_bilingual"),
            doc_type: row.get("doc_type"),
            suggested_role: row.get("suggested_role"),
            char_count: row.get::<i64, _>("char_count") as usize,
        },
        quick_view: serde_json::from_str(&quick_json).unwrap_or_default(),
        external_analysis: external_json.and_then(|s| serde_json::from_str(&s).ok()),
        compliance_flags: serde_json::from_str(&flags_json).unwrap_or_default(),
        created_at: row.get("created_at"),
    }
}
