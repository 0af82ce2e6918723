//! # DocSense
//!
//! A document intelligence and retrieval pipeline for heterogeneous office
//! documents (PDF, DOCX, images, plain text).
//!
//! DocSense ingests raw document bytes, extracts normalized text and a
//! content fingerprint, classifies language and document type, mines
//! actionable snippets, evaluates a compliance rule table, persists
//! everything with fingerprint deduplication, and answers full-text,
//! semantic, and hybrid (score-fused) search queries.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌───────────────────┐   ┌────────────────┐
//! │ Raw document │──▶│ Extract + Classify │──▶│ Rules + Store   │
//! │ bytes + name │   │ + Quick-skim       │   │ SQLite (dedup)  │
//! └──────────────┘   └───────────────────┘   └───────┬────────┘
//!                                                    │
//!                                  ┌─────────────────┤
//!                                  ▼                 ▼
//!                           ┌────────────┐    ┌────────────┐
//!                           │ Search idx │    │  CLI/HTTP   │
//!                           │ FTS + vec  │    │   shell     │
//!                           └────────────┘    └────────────┘
//! ```
//!
//! The document store and the search index are two deliberately separate
//! SQLite databases: the store carries a lightweight lexical fallback for
//! recency/browse, while the search index is the primary ranked engine.
//!
//! ## Quick Start
//!
//! ```bash
//! docsense init                          # create both databases
//! docsense ingest ./inbox                # ingest a file or directory
//! docsense search "near miss" --mode hybrid
//! docsense recent --limit 10
//! docsense serve                         # start the JSON HTTP shell
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`extract`] | Multi-format text extraction + fingerprinting |
//! | [`ocr`] | Pluggable OCR backends |
//! | [`classify`] | Language / doc-type / role classification |
//! | [`skim`] | Quick-skim heuristics (bullets, dates, amounts, risks) |
//! | [`rules`] | Compliance rule table and evaluation |
//! | [`store`] | Fingerprint-deduplicated document store |
//! | [`search`] | Ranked search engine (lexical + semantic + hybrid) |
//! | [`embedding`] | Embedding providers and vector utilities |
//! | [`pipeline`] | Intake orchestration |
//! | [`server`] | JSON HTTP shell |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |

pub mod classify;
pub mod config;
pub mod db;
pub mod embedding;
pub mod extract;
pub mod migrate;
pub mod models;
pub mod ocr;
pub mod pipeline;
pub mod rules;
pub mod search;
pub mod server;
pub mod skim;
pub mod store;
