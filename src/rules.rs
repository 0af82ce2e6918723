//! Keyword-presence compliance rules.
//!
//! Rules are a data table, not code: each rule maps an identifier to a keyword
//! set, a message, and a severity, and the evaluator just walks the table in
//! declaration order. New rules are added by editing the table (or pointing
//! `[rules] path` at a TOML file), never by touching evaluation logic.
//!
//! This is pure presence detection with no contextual logic; absence of a
//! flag does not imply absence of the underlying condition.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::models::{ComplianceFlag, ExternalAnalysis, QuickView, Severity};

/// One compliance rule: fires at most once per document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rule {
    pub id: String,
    pub keywords: Vec<String>,
    pub message: String,
    pub severity: Severity,
}

/// Ordered rule table. Flag order follows declaration order, not severity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleSet {
    pub rules: Vec<Rule>,
}

impl Default for RuleSet {
    fn default() -> Self {
        let rule = |id: &str, keywords: &[&str], message: &str, severity: Severity| Rule {
            id: id.to_string(),
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
            message: message.to_string(),
            severity,
        };
        Self {
            rules: vec![
                rule(
                    "cmrs-directive",
                    &["cmrs", "commissioner of metro rail safety", "directive", "circular"],
                    "Potential regulatory directive detected. Ensure actions are logged and acknowledged within 48 hours.",
                    Severity::High,
                ),
                rule(
                    "incident-report",
                    &["incident", "accident", "near miss", "safety"],
                    "Incident-related content. Verify entry in the safety log and corrective actions.",
                    Severity::High,
                ),
                rule(
                    "procurement",
                    &["purchase order", "invoice", "tender", "bid", "vendor"],
                    "Procurement document. Check approvals and budget alignment.",
                    Severity::Medium,
                ),
                rule(
                    "maintenance",
                    &["maintenance", "work order", "job card", "asset"],
                    "Maintenance content. Ensure job closure and MTBF tracking.",
                    Severity::Medium,
                ),
            ],
        }
    }
}

impl RuleSet {
    /// Load a replacement rule table from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read rules file: {}", path.display()))?;
        toml::from_str(&content).with_context(|| "failed to parse rules file")
    }

    /// Evaluate the table against a document's quick-skim output and the
    /// optional collaborator analysis.
    pub fn evaluate(
        &self,
        quick: &QuickView,
        external: Option<&ExternalAnalysis>,
    ) -> Vec<ComplianceFlag> {
        let mut parts: Vec<&str> = Vec::new();
        parts.extend(quick.bullets.iter().map(String::as_str));
        parts.extend(quick.risks.iter().map(String::as_str));
        if let Some(external) = external {
            parts.extend(external.risks.iter().map(String::as_str));
            parts.extend(external.summary.iter().map(String::as_str));
        }
        let blob = parts.join("\n").to_lowercase();

        self.rules
            .iter()
            .filter(|rule| rule.keywords.iter().any(|k| blob.contains(k.as_str())))
            .map(|rule| ComplianceFlag {
                rule_id: rule.id.clone(),
                message: rule.message.clone(),
                severity: rule.severity,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::skim::quick_skim;

    #[test]
    fn empty_inputs_produce_no_flags() {
        let flags = RuleSet::default().evaluate(&QuickView::default(), None);
        assert!(flags.is_empty());
    }

    #[test]
    fn rule_fires_once_regardless_of_keyword_count() {
        let quick = QuickView {
            risks: vec!["tender and invoice from the vendor carry a delay penalty".to_string()],
            ..Default::default()
        };
        let flags = RuleSet::default().evaluate(&quick, None);
        let procurement: Vec<_> = flags.iter().filter(|f| f.rule_id == "procurement").collect();
        assert_eq!(procurement.len(), 1);
        assert_eq!(procurement[0].severity, Severity::Medium);
    }

    #[test]
    fn incident_scenario_raises_both_high_flags() {
        let quick = quick_skim("Incident: near miss at platform. CMRS directive attached.");
        let flags = RuleSet::default().evaluate(&quick, None);
        let ids: Vec<&str> = flags.iter().map(|f| f.rule_id.as_str()).collect();
        assert!(ids.contains(&"cmrs-directive"));
        assert!(ids.contains(&"incident-report"));
        assert!(flags
            .iter()
            .filter(|f| f.rule_id == "cmrs-directive" || f.rule_id == "incident-report")
            .all(|f| f.severity == Severity::High));
    }

    #[test]
    fn external_analysis_contributes_to_the_blob() {
        let external = ExternalAnalysis {
            risks: vec!["pending work order backlog on escalators".to_string()],
            ..Default::default()
        };
        let flags = RuleSet::default().evaluate(&QuickView::default(), Some(&external));
        assert_eq!(flags.len(), 1);
        assert_eq!(flags[0].rule_id, "maintenance");
    }

    #[test]
    fn flag_order_follows_declaration_order() {
        let quick = QuickView {
            risks: vec!["maintenance delay after the incident".to_string()],
            ..Default::default()
        };
        let flags = RuleSet::default().evaluate(&quick, None);
        let ids: Vec<&str> = flags.iter().map(|f| f.rule_id.as_str()).collect();
        assert_eq!(ids, vec!["incident-report", "maintenance"]);
    }
}
