use anyhow::Result;
use sqlx::SqlitePool;
use tracing::warn;

/// Create the document-store schema. Idempotent.
///
/// Returns whether the lexical substrate is FTS5-backed. When the SQLite
/// build lacks FTS5, a plain table of the same shape is created instead and
/// `basic_search` runs its documented lower-quality substring fallback.
pub async fn run_store_migrations(pool: &SqlitePool) -> Result<bool> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS documents (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            filename TEXT NOT NULL,
            content_hash TEXT NOT NULL UNIQUE,
            ext TEXT NOT NULL,
            language TEXT NOT NULL,
            is_bilingual INTEGER NOT NULL DEFAULT 0,
            doc_type TEXT NOT NULL,
            suggested_role TEXT NOT NULL,
            char_count INTEGER NOT NULL DEFAULT 0,
            created_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Latest-wins: save() deletes the prior row before inserting.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS analyses (
            doc_id INTEGER NOT NULL,
            quick_json TEXT NOT NULL,
            external_json TEXT,
            flags_json TEXT NOT NULL,
            FOREIGN KEY (doc_id) REFERENCES documents(id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            username TEXT UNIQUE,
            email TEXT UNIQUE,
            password_hash TEXT NOT NULL,
            role TEXT NOT NULL,
            created_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS document_recipients (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            doc_id INTEGER NOT NULL,
            user_id INTEGER NOT NULL,
            sent_at INTEGER NOT NULL,
            FOREIGN KEY (doc_id) REFERENCES documents(id),
            FOREIGN KEY (user_id) REFERENCES users(id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_analyses_doc_id ON analyses(doc_id)")
        .execute(pool)
        .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_recipients_user_id ON document_recipients(user_id)",
    )
    .execute(pool)
    .await?;

    // FTS5 CREATE is not idempotent natively, so inspect sqlite_master first;
    // an existing table also tells us which substrate a previous run created.
    let existing_sql: Option<String> = sqlx::query_scalar(
        "SELECT sql FROM sqlite_master WHERE type='table' AND name='docs_fts'",
    )
    .fetch_optional(pool)
    .await?;

    if let Some(sql) = existing_sql {
        return Ok(sql.to_lowercase().contains("fts5"));
    }

    let created = sqlx::query(
        r#"
        CREATE VIRTUAL TABLE docs_fts USING fts5(
            doc_id UNINDEXED,
            content,
            filename,
            doc_type,
            language
        )
        "#,
    )
    .execute(pool)
    .await;

    match created {
        Ok(_) => Ok(true),
        Err(e) => {
            warn!(error = %e, "FTS5 unavailable; basic_search falls back to substring scan");
            sqlx::query(
                r#"
                CREATE TABLE docs_fts (
                    doc_id INTEGER NOT NULL,
                    content TEXT,
                    filename TEXT,
                    doc_type TEXT,
                    language TEXT
                )
                "#,
            )
            .execute(pool)
            .await?;
            Ok(false)
        }
    }
}

/// Create the search-index schema. Idempotent.
///
/// Append-only: re-indexing the same `doc_id` adds a second record by design;
/// callers only index when content changed.
pub async fn run_search_migrations(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS search_records (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            doc_id INTEGER NOT NULL,
            filename TEXT NOT NULL,
            content TEXT NOT NULL,
            metadata_json TEXT NOT NULL DEFAULT '{}',
            embedding BLOB NOT NULL,
            indexed_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_search_records_doc_id ON search_records(doc_id)")
        .execute(pool)
        .await?;

    Ok(())
}
