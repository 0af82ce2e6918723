//! End-to-end intake and retrieval tests over temporary databases.
//!
//! Exercises the full pipeline (extract → classify → skim → rules → store →
//! index) with the deterministic hashed embedding provider, so everything
//! runs offline.

use std::sync::Arc;

use tempfile::TempDir;

use docsense::config::{
    Config, EmbeddingConfig, ExtractionConfig, OcrConfig, RulesConfig, SearchConfig, ServerConfig,
    StoreConfig,
};
use docsense::models::SearchMode;
use docsense::pipeline::Intake;

fn test_config(dir: &TempDir) -> Config {
    Config {
        store: StoreConfig {
            path: dir.path().join("store.db"),
        },
        search: SearchConfig {
            path: dir.path().join("search.db"),
            default_limit: 10,
        },
        extraction: ExtractionConfig {
            max_pdf_pages: 5,
            ocr: OcrConfig {
                backend: "disabled".to_string(),
                binary: "tesseract".to_string(),
            },
        },
        embedding: EmbeddingConfig::default(),
        server: ServerConfig {
            bind: "127.0.0.1:0".to_string(),
        },
        rules: RulesConfig::default(),
    }
}

async fn open_intake(dir: &TempDir) -> Arc<Intake> {
    Arc::new(Intake::open(&test_config(dir)).await.unwrap())
}

/// Minimal DOCX (ZIP with word/document.xml) containing the given paragraphs.
fn minimal_docx(paragraphs: &[&str]) -> Vec<u8> {
    use std::io::Write;
    let mut buf = Vec::new();
    {
        let mut zip = zip::ZipWriter::new(std::io::Cursor::new(&mut buf));
        zip.start_file("word/document.xml", zip::write::SimpleFileOptions::default())
            .unwrap();
        let body: String = paragraphs
            .iter()
            .map(|p| format!("<w:p><w:r><w:t>{p}</w:t></w:r></w:p>"))
            .collect();
        let xml = format!(
            "<?xml version=\"1.0\"?><w:document xmlns:w=\"http://schemas.openxmlformats.org/wordprocessingml/2006/main\"><w:body>{body}</w:body></w:document>"
        );
        zip.write_all(xml.as_bytes()).unwrap();
        zip.finish().unwrap();
    }
    buf
}

/// One-page PDF containing the given phrase, built with lopdf.
fn minimal_pdf(phrase: &str) -> Vec<u8> {
    use lopdf::content::{Content, Operation};
    use lopdf::{dictionary, Document, Object, Stream};

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });
    let content = Content {
        operations: vec![
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec!["F1".into(), 24.into()]),
            Operation::new("Td", vec![100.into(), 600.into()]),
            Operation::new("Tj", vec![Object::string_literal(phrase)]),
            Operation::new("ET", vec![]),
        ],
    };
    let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "Contents" => content_id,
    });
    let pages = dictionary! {
        "Type" => "Pages",
        "Kids" => vec![page_id.into()],
        "Count" => 1,
        "Resources" => resources_id,
        "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
    };
    doc.objects.insert(pages_id, Object::Dictionary(pages));
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).unwrap();
    bytes
}

#[tokio::test]
async fn dedup_reuses_id_and_replaces_analysis() {
    let dir = TempDir::new().unwrap();
    let intake = open_intake(&dir).await;

    let bytes = b"Quarterly tender notice for vendor supply of rail fasteners.";
    let external = serde_json::json!({ "risks": ["work order backlog"] });

    let first = intake
        .ingest("original.txt", bytes, Some(external), &[])
        .await
        .unwrap();
    assert!(!first.deduplicated);
    assert!(first
        .compliance_flags
        .iter()
        .any(|f| f.rule_id == "maintenance"));

    let second = intake.ingest("renamed.txt", bytes, None, &[]).await.unwrap();
    assert!(second.deduplicated);
    assert_eq!(first.document_id, second.document_id);

    let records = intake.store().recent(10).await.unwrap();
    assert_eq!(records.len(), 1, "identical bytes must not duplicate rows");
    let record = &records[0];
    // The newest upload's filename wins; the old analysis is gone.
    assert_eq!(record.filename, "renamed.txt");
    assert!(record.external_analysis.is_none());
    assert!(!record
        .compliance_flags
        .iter()
        .any(|f| f.rule_id == "maintenance"));
}

#[tokio::test]
async fn dedup_does_not_reindex() {
    let dir = TempDir::new().unwrap();
    let intake = open_intake(&dir).await;

    let bytes = b"Tender notice for vendor supply.";
    intake.ingest("a.txt", bytes, None, &[]).await.unwrap();
    intake.ingest("b.txt", bytes, None, &[]).await.unwrap();

    let hits = intake
        .search("tender", SearchMode::FullText, Some(10), None)
        .await
        .unwrap();
    assert_eq!(hits.len(), 1, "a dedup hit must not append a second record");
}

#[tokio::test]
async fn safety_scenario_flags_and_classification() {
    let dir = TempDir::new().unwrap();
    let intake = open_intake(&dir).await;

    let outcome = intake
        .ingest(
            "incident.txt",
            b"Incident: near miss at platform. CMRS directive attached.",
            None,
            &[],
        )
        .await
        .unwrap();

    assert_eq!(outcome.metadata.doc_type, "Safety");
    assert_eq!(outcome.metadata.suggested_role, "safety_officer");
    let ids: Vec<&str> = outcome
        .compliance_flags
        .iter()
        .map(|f| f.rule_id.as_str())
        .collect();
    assert!(ids.contains(&"cmrs-directive"));
    assert!(ids.contains(&"incident-report"));
}

#[tokio::test]
async fn empty_input_is_safe() {
    let dir = TempDir::new().unwrap();
    let intake = open_intake(&dir).await;

    let outcome = intake.ingest("empty.txt", b"", None, &[]).await.unwrap();
    assert_eq!(outcome.metadata.doc_type, "Unknown");
    assert_eq!(outcome.metadata.language, "unknown");
    assert!(outcome.compliance_flags.is_empty());
    assert!(outcome.quick_view.bullets.is_empty());
    assert!(outcome.quick_view.risks.is_empty());
}

#[tokio::test]
async fn search_modes_and_metadata_filter() {
    let dir = TempDir::new().unwrap();
    let intake = open_intake(&dir).await;

    intake
        .ingest(
            "tender.txt",
            b"Tender notice for vendor supply of rail fasteners. Tender closes Friday.",
            None,
            &[],
        )
        .await
        .unwrap();
    let safety = intake
        .ingest(
            "bulletin.txt",
            b"Safety bulletin: incident near miss at platform two.",
            None,
            &[],
        )
        .await
        .unwrap();
    intake
        .ingest(
            "picnic.txt",
            b"A note about the annual office picnic in the park.",
            None,
            &[],
        )
        .await
        .unwrap();

    let lexical = intake
        .search("tender", SearchMode::FullText, Some(10), None)
        .await
        .unwrap();
    assert_eq!(lexical.len(), 1);
    assert_eq!(lexical[0].filename, "tender.txt");
    assert!(lexical[0].score > 0.0);

    let semantic = intake
        .search("near miss at platform", SearchMode::Semantic, Some(10), None)
        .await
        .unwrap();
    assert_eq!(semantic[0].doc_id, safety.document_id);

    let hybrid = intake
        .search("incident near miss", SearchMode::Hybrid, Some(10), None)
        .await
        .unwrap();
    assert!(!hybrid.is_empty());
    assert_eq!(hybrid[0].doc_id, safety.document_id);

    let mut filters = serde_json::Map::new();
    filters.insert("doc_type".into(), "Safety".into());
    let filtered = intake
        .search("platform", SearchMode::Hybrid, Some(10), Some(&filters))
        .await
        .unwrap();
    assert!(filtered.iter().all(|h| h.metadata["doc_type"] == "Safety"));
    assert!(filtered.iter().any(|h| h.doc_id == safety.document_id));
}

#[tokio::test]
async fn recipients_link_and_listing() {
    let dir = TempDir::new().unwrap();
    let intake = open_intake(&dir).await;

    let user_id = intake
        .store()
        .create_user("asha", "asha@example.com", "hash-abc", "engineer")
        .await
        .unwrap();

    let outcome = intake
        .ingest(
            "workorder.txt",
            b"Work order for escalator maintenance at the depot.",
            None,
            &[user_id],
        )
        .await
        .unwrap();

    let docs = intake
        .store()
        .documents_for_recipient(user_id)
        .await
        .unwrap();
    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0].id, outcome.document_id);

    let none = intake
        .store()
        .documents_for_recipient(user_id + 1)
        .await
        .unwrap();
    assert!(none.is_empty());
}

#[tokio::test]
async fn authentication_is_exact_match() {
    let dir = TempDir::new().unwrap();
    let intake = open_intake(&dir).await;

    intake
        .store()
        .create_user("ravi", "ravi@example.com", "hash-xyz", "admin")
        .await
        .unwrap();

    let user = intake
        .store()
        .authenticate_user("ravi", "hash-xyz")
        .await
        .unwrap();
    assert_eq!(user.unwrap().role, "admin");

    let wrong = intake
        .store()
        .authenticate_user("ravi", "hash-other")
        .await
        .unwrap();
    assert!(wrong.is_none());
}

#[tokio::test]
async fn basic_search_returns_snippets() {
    let dir = TempDir::new().unwrap();
    let intake = open_intake(&dir).await;

    intake
        .ingest(
            "notice.txt",
            b"Tender notice for vendor supply of rail fasteners.",
            None,
            &[],
        )
        .await
        .unwrap();

    let hits = intake.store().basic_search("tender", 10).await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].filename, "notice.txt");
    assert!(!hits[0].snippet.is_empty());

    let empty = intake.store().basic_search("", 10).await.unwrap();
    assert!(empty.is_empty());
}

#[tokio::test]
async fn docx_ingestion_extracts_paragraphs() {
    let dir = TempDir::new().unwrap();
    let intake = open_intake(&dir).await;

    let bytes = minimal_docx(&[
        "Safety bulletin for station staff.",
        "Report any incident to the control room.",
    ]);
    let outcome = intake
        .ingest("bulletin.docx", &bytes, None, &[])
        .await
        .unwrap();

    assert_eq!(outcome.metadata.ext, ".docx");
    assert_eq!(outcome.metadata.doc_type, "Safety");
    assert!(outcome.metadata.char_count > 0);
}

#[tokio::test]
async fn pdf_ingestion_extracts_text() {
    let dir = TempDir::new().unwrap();
    let intake = open_intake(&dir).await;

    let bytes = minimal_pdf("tender notice for vendor supply");
    let outcome = intake.ingest("notice.pdf", &bytes, None, &[]).await.unwrap();

    assert_eq!(outcome.metadata.ext, ".pdf");
    assert!(outcome.metadata.char_count > 0);

    let hits = intake
        .search("tender", SearchMode::FullText, Some(10), None)
        .await
        .unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].filename, "notice.pdf");
}

#[tokio::test]
async fn corrupt_upload_still_stores_a_record() {
    let dir = TempDir::new().unwrap();
    let intake = open_intake(&dir).await;

    let outcome = intake
        .ingest("broken.pdf", b"definitely not a pdf", None, &[])
        .await
        .unwrap();
    assert_eq!(outcome.metadata.doc_type, "Unknown");
    assert_eq!(outcome.metadata.char_count, 0);

    let records = intake.store().recent(10).await.unwrap();
    assert_eq!(records.len(), 1);
}

#[tokio::test]
async fn quick_view_bounds_hold_for_large_documents() {
    let dir = TempDir::new().unwrap();
    let intake = open_intake(&dir).await;

    let mut text = String::new();
    for i in 0..200 {
        text.push_str(&format!("- bullet {i} with a risk of delay on 0{}/01/2024 costing 1,00{}\n", i % 9 + 1, i % 9));
    }
    let outcome = intake
        .ingest("big.txt", text.as_bytes(), None, &[])
        .await
        .unwrap();

    assert!(outcome.quick_view.bullets.len() <= 10);
    assert!(outcome.quick_view.dates.len() <= 10);
    assert!(outcome.quick_view.amounts.len() <= 10);
    assert!(outcome.quick_view.risks.len() <= 5);
}
