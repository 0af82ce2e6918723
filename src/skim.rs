//! Quick-skim heuristics: actionable snippets without any model.
//!
//! Line-oriented mining of bullets, dates, monetary amounts, and risk lines.
//! Every list is hard-capped and every line truncated, so cost and memory stay
//! bounded no matter how large the input document is. The caps are not
//! call-time configurable.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::models::QuickView;

const MAX_BULLETS: usize = 10;
const MAX_DATES: usize = 10;
const MAX_AMOUNTS: usize = 10;
const MAX_RISKS: usize = 5;
const MAX_LINE_CHARS: usize = 200;

/// A line containing any of these (case-insensitive) is a risk line.
/// `incident` and `near miss` are included so incident reports reach the
/// compliance blob even when no explicit "risk" wording is present.
const RISK_INDICATORS: &[&str] = &[
    "risk",
    "hazard",
    "non-conform",
    "delay",
    "penalty",
    "incident",
    "near miss",
];

/// `D[-/]M[-/]Y` variants and ISO `YYYY-MM-DD`.
static DATE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(\d{1,2}[-/]\d{1,2}[-/]\d{2,4}|\d{4}-\d{2}-\d{2})\b").expect("date pattern")
});

/// Currency-agnostic amounts: optional symbol, thousands separators, optional
/// decimals. Four-digit runs like years do not match (the date list owns those).
static AMOUNT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:[₹$€£]\s?)?\b\d{1,3}(?:,\d{3})*(?:\.\d+)?\b").expect("amount pattern")
});

/// Mine a [`QuickView`] from extracted text. Pure; tolerates empty input.
pub fn quick_skim(text: &str) -> QuickView {
    let mut bullets = Vec::new();
    let mut risks = Vec::new();

    for line in text.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if bullets.len() < MAX_BULLETS && is_bullet(trimmed) {
            bullets.push(truncate_chars(trimmed, MAX_LINE_CHARS));
        }
        if risks.len() < MAX_RISKS {
            let lower = trimmed.to_lowercase();
            if RISK_INDICATORS.iter().any(|k| lower.contains(k)) {
                risks.push(truncate_chars(trimmed, MAX_LINE_CHARS));
            }
        }
    }

    let dates = DATE_RE
        .find_iter(text)
        .take(MAX_DATES)
        .map(|m| m.as_str().to_string())
        .collect();
    let amounts = AMOUNT_RE
        .find_iter(text)
        .take(MAX_AMOUNTS)
        .map(|m| m.as_str().to_string())
        .collect();

    QuickView {
        bullets,
        dates,
        amounts,
        risks,
    }
}

fn is_bullet(line: &str) -> bool {
    matches!(line.chars().next(), Some('-') | Some('•') | Some('*')) || line.starts_with("=>")
}

fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}
