//! # DocSense CLI
//!
//! The `docsense` binary is the primary interface for the pipeline. It
//! provides commands for database initialization, document ingestion, search,
//! recency browsing, user management, and starting the HTTP shell.
//!
//! ## Usage
//!
//! ```bash
//! docsense --config ./config/docsense.toml <command>
//! ```
//!
//! | Command | Description |
//! |---------|-------------|
//! | `docsense init` | Create both SQLite databases and run migrations |
//! | `docsense ingest <path>` | Ingest a file, or every supported file under a directory |
//! | `docsense search "<query>"` | Search with `--mode full-text`, `semantic`, or `hybrid` |
//! | `docsense recent` | List the most recently stored documents |
//! | `docsense user add` | Create a user (password hash supplied by the caller) |
//! | `docsense serve` | Start the JSON HTTP shell |

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use docsense::config;
use docsense::extract;
use docsense::models::SearchMode;
use docsense::pipeline::{extension_of, Intake};
use docsense::server;

/// DocSense — document intelligence and retrieval pipeline.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/docsense.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "docsense",
    about = "DocSense — document intelligence and retrieval pipeline",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/docsense.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize both databases (document store + search index).
    ///
    /// Idempotent — running it multiple times is safe.
    Init,

    /// Ingest a document, or every supported document under a directory.
    Ingest {
        /// File or directory to ingest.
        path: PathBuf,

        /// Recipient user id to link; repeatable.
        #[arg(long = "recipient")]
        recipients: Vec<i64>,

        /// Path to a JSON file holding an external analysis blob to attach.
        #[arg(long)]
        external: Option<PathBuf>,
    },

    /// Search indexed documents.
    Search {
        /// The search query string.
        query: String,

        /// Retrieval strategy.
        #[arg(long, value_enum, default_value = "hybrid")]
        mode: SearchMode,

        /// Maximum number of results to return.
        #[arg(long)]
        limit: Option<usize>,
    },

    /// List the most recently stored documents.
    Recent {
        #[arg(long, default_value_t = 20)]
        limit: i64,
    },

    /// Manage users.
    User {
        #[command(subcommand)]
        action: UserAction,
    },

    /// Start the JSON HTTP shell.
    Serve,
}

#[derive(Subcommand)]
enum UserAction {
    /// Create a user. The password hash is computed by the caller — this
    /// tool never sees plaintext credentials.
    Add {
        #[arg(long)]
        username: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        password_hash: String,
        #[arg(long, default_value = "employee")]
        role: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            let _intake = Intake::open(&cfg).await?;
            println!("Databases initialized successfully.");
        }
        Commands::Ingest {
            path,
            recipients,
            external,
        } => {
            let intake = Intake::open(&cfg).await?;
            let external_value = match external {
                Some(path) => {
                    let content = std::fs::read_to_string(&path)?;
                    Some(serde_json::from_str(&content)?)
                }
                None => None,
            };
            let files = collect_files(&path)?;
            if files.is_empty() {
                println!("No supported documents found under {}.", path.display());
                return Ok(());
            }
            for file in files {
                let bytes = std::fs::read(&file)?;
                let name = file.to_string_lossy();
                let outcome = intake
                    .ingest(&name, &bytes, external_value.clone(), &recipients)
                    .await?;
                let status = if outcome.deduplicated {
                    "replaced analysis"
                } else {
                    "stored"
                };
                println!(
                    "{} — id {} ({}, {}, {} flags)",
                    file.display(),
                    outcome.document_id,
                    status,
                    outcome.metadata.doc_type,
                    outcome.compliance_flags.len()
                );
            }
        }
        Commands::Search { query, mode, limit } => {
            let intake = Intake::open(&cfg).await?;
            let hits = intake.search(&query, mode, limit, None).await?;
            if hits.is_empty() {
                println!("No results.");
                return Ok(());
            }
            for (i, hit) in hits.iter().enumerate() {
                let doc_type = hit
                    .metadata
                    .get("doc_type")
                    .and_then(|v| v.as_str())
                    .unwrap_or("?");
                println!(
                    "{}. [{:.3}] {} (doc {}, {})",
                    i + 1,
                    hit.score,
                    hit.filename,
                    hit.doc_id,
                    doc_type
                );
            }
        }
        Commands::Recent { limit } => {
            let intake = Intake::open(&cfg).await?;
            let records = intake.store().recent(limit).await?;
            if records.is_empty() {
                println!("No documents stored yet.");
                return Ok(());
            }
            for record in records {
                println!(
                    "{}  {}  {}  {} flags",
                    record.id,
                    record.filename,
                    record.metadata.doc_type,
                    record.compliance_flags.len()
                );
            }
        }
        Commands::User { action } => match action {
            UserAction::Add {
                username,
                email,
                password_hash,
                role,
            } => {
                let intake = Intake::open(&cfg).await?;
                let id = intake
                    .store()
                    .create_user(&username, &email, &password_hash, &role)
                    .await?;
                println!("Created user {} with id {}.", username, id);
            }
        },
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}

/// A single file, or every supported file under a directory (recursive).
fn collect_files(path: &PathBuf) -> Result<Vec<PathBuf>> {
    if path.is_file() {
        return Ok(vec![path.clone()]);
    }
    let mut files = Vec::new();
    for entry in walkdir::WalkDir::new(path).follow_links(false) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let name = entry.path().to_string_lossy();
        if extract::is_supported_extension(&extension_of(&name)) {
            files.push(entry.path().to_path_buf());
        }
    }
    files.sort();
    Ok(files)
}
