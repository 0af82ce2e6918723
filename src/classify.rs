//! Metadata classification: language, document category, suggested recipient role.
//!
//! Language detection handles the bilingual English/Malayalam documents common
//! in this corpus: whole-sample detection first, then a sentence-level vote
//! when the detector has no answer. Document-type classification is a
//! first-match lookup over an ordered keyword table — categories overlap on
//! keywords, so order is part of the semantics.

use whatlang::Lang;

use crate::models::Metadata;

/// Texts shorter than this after trimming carry no usable signal.
const MIN_TEXT_CHARS: usize = 10;
/// Whole-sample detection runs on a bounded prefix.
const LANG_SAMPLE_CHARS: usize = 2000;
const SENTENCE_VOTE_LIMIT: usize = 5;
const MIN_SENTENCE_CHARS: usize = 20;

/// Ordered category table; the first category with a keyword hit wins.
const DOC_TYPE_KEYWORDS: &[(&str, &[&str])] = &[
    (
        "Procurement",
        &["purchase", "order", "invoice", "tender", "vendor", "procurement"],
    ),
    (
        "Maintenance",
        &["maintenance", "work order", "job card", "asset", "repair", "inspection"],
    ),
    (
        "Safety",
        &["safety", "incident", "near miss", "cmrs", "bulletin", "emergency", "evacuation"],
    ),
    (
        "Engineering",
        &["drawing", "specification", "design", "engineering", "technical"],
    ),
    (
        "HR",
        &["policy", "hr", "human resource", "leave", "recruitment", "staff"],
    ),
    (
        "Regulatory",
        &["directive", "regulation", "ministry", "compliance", "regulatory"],
    ),
    (
        "Operations",
        &["announcement", "passenger", "train", "station", "platform"],
    ),
];

/// Derive [`Metadata`] from extracted text. Pure; never fails.
pub fn classify(ext: &str, text: &str) -> Metadata {
    let (language, is_bilingual) = detect_language(text);
    let doc_type = classify_doc_type(text);
    let suggested_role = suggest_role(&doc_type).to_string();
    Metadata {
        ext: ext.to_ascii_lowercase(),
        language,
        is_bilingual,
        doc_type: doc_type.to_string(),
        suggested_role,
        char_count: text.chars().count(),
    }
}

fn detect_language(text: &str) -> (String, bool) {
    let trimmed = text.trim();
    if trimmed.chars().count() < MIN_TEXT_CHARS {
        return ("unknown".to_string(), false);
    }

    let sample: String = trimmed
        .replace('\n', " ")
        .chars()
        .take(LANG_SAMPLE_CHARS)
        .collect();

    match whatlang::detect_lang(&sample) {
        Some(primary) => {
            if has_malayalam_marker(&sample) {
                if primary == Lang::Eng {
                    ("bilingual_en_ml".to_string(), true)
                } else {
                    ("malayalam".to_string(), false)
                }
            } else {
                (primary.code().to_string(), false)
            }
        }
        None => sentence_vote(&sample),
    }
}

/// Malayalam script codepoints, or the language named in running text.
fn has_malayalam_marker(sample: &str) -> bool {
    sample.chars().any(|c| ('\u{0D00}'..='\u{0D7F}').contains(&c))
        || sample.to_lowercase().contains("malayalam")
}

/// Per-sentence vote over the first few sufficiently long sentences.
fn sentence_vote(sample: &str) -> (String, bool) {
    let langs: Vec<Lang> = sample
        .split(['.', '!', '?'])
        .map(str::trim)
        .filter(|s| s.chars().count() > MIN_SENTENCE_CHARS)
        .take(SENTENCE_VOTE_LIMIT)
        .filter_map(whatlang::detect_lang)
        .collect();

    if langs.is_empty() {
        return ("unknown".to_string(), false);
    }

    let has_english = langs.contains(&Lang::Eng);
    let has_malayalam = langs.contains(&Lang::Mal);
    if has_english && has_malayalam {
        ("bilingual_en_ml".to_string(), true)
    } else if has_malayalam {
        ("malayalam".to_string(), false)
    } else if has_english {
        ("english".to_string(), false)
    } else {
        (langs[0].code().to_string(), false)
    }
}

fn classify_doc_type(text: &str) -> &'static str {
    if text.is_empty() {
        return "Unknown";
    }
    let lower = text.to_lowercase();
    for (category, keywords) in DOC_TYPE_KEYWORDS {
        if keywords.iter().any(|k| lower.contains(k)) {
            return category;
        }
    }
    "General"
}

/// Pure lookup from document type to the role that should triage it.
fn suggest_role(doc_type: &str) -> &'static str {
    match doc_type {
        "Safety" | "Regulatory" => "safety_officer",
        "Engineering" | "Maintenance" => "engineer",
        "Procurement" | "Finance" => "finance_officer",
        _ => "manager",
    }
}
