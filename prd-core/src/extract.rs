//! Pattern based fragment extraction over the whole document text.
//!
//! Fragments are noisy free text. Nothing here checks that a "metric" is a
//! real KPI or that a "stakeholder" names an actual audience.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;
use tracing::debug;

use crate::models::StructuredData;
use crate::sections::parse_sections;

fn compile(patterns: &[&str]) -> Vec<Regex> {
    patterns
        .iter()
        .map(|p| Regex::new(p).expect("Invalid extraction pattern"))
        .collect()
}

static METRIC_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    compile(&[
        r"(?i)\d+(?:\.\d+)?\s*%\s*(?:increase|decrease|growth|reduction|improvement|decline|drop)",
        r"(?i)\d{1,3}(?:,\d{3})+\s*(?:users|customers|revenue|conversions)|\d+\s*(?:users|customers|revenue|conversions)",
        r"(?i)\b(?:target|goal|objective)s?\b[^.\n]*?\d+(?:[.,]\d+)*\s*%?",
    ])
});

static STAKEHOLDER_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    compile(&[
        r"\b(?i:stakeholders?|users?|customers?|target\s+audience)\b:?[ \t]*[A-Z][a-z]+(?:[ \t]+[A-Z][a-z]+)*",
        r"\b(?i:for|targeting)[ \t]+[A-Z][a-z]+(?:[ \t]+[A-Z][a-z]+)*",
    ])
});

static FEATURE_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    compile(&[
        r"(?i)\b(?:feature|functionality|capability):[ \t]*[^\n.]+",
        r"(?i)\b(?:will|should|must)\s+(?:support|provide|enable|allow)\s+[^\n.]+",
    ])
});

static RISK_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    compile(&[
        r"(?i)\b(?:risk|challenge|concern|threat):[ \t]*[^\n.]+",
        r"(?i)\b(?:potential|possible|likely)\s+(?:risk|issue|problem)s?\b[^\n.]*",
    ])
});

/// Collect every match of every pattern, trimmed and de-duplicated.
fn collect_matches(text: &str, patterns: &[Regex]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut fragments = Vec::new();

    for pattern in patterns {
        for m in pattern.find_iter(text) {
            let fragment = m.as_str().trim();
            if fragment.is_empty() {
                continue;
            }
            if seen.insert(fragment.to_string()) {
                fragments.push(fragment.to_string());
            }
        }
    }

    fragments
}

pub fn extract_metrics(text: &str) -> Vec<String> {
    collect_matches(text, &METRIC_PATTERNS)
}

pub fn extract_stakeholders(text: &str) -> Vec<String> {
    collect_matches(text, &STAKEHOLDER_PATTERNS)
}

pub fn extract_features(text: &str) -> Vec<String> {
    collect_matches(text, &FEATURE_PATTERNS)
}

pub fn extract_risks(text: &str) -> Vec<String> {
    collect_matches(text, &RISK_PATTERNS)
}

/// Build the structured view of a PRD from its plain text.
pub fn parse(text: &str) -> StructuredData {
    let data = StructuredData {
        sections: parse_sections(text),
        metrics: extract_metrics(text),
        stakeholders: extract_stakeholders(text),
        features: extract_features(text),
        risks: extract_risks(text),
        timeline: None,
    };

    debug!(
        sections = data.sections.len(),
        metrics = data.metrics.len(),
        stakeholders = data.stakeholders.len(),
        features = data.features.len(),
        risks = data.risks.len(),
        "extracted structured data"
    );

    data
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sections::SectionName;

    #[test]
    fn test_metrics() {
        let text = "We expect a 25% increase in retention and 10,000 users by March.\n\
                    Our goal is to reach 40% adoption. Also 500 conversions per week.";
        let metrics = extract_metrics(text);

        assert!(metrics.contains(&"25% increase".to_string()));
        assert!(metrics.contains(&"10,000 users".to_string()));
        assert!(metrics.contains(&"500 conversions".to_string()));
        assert!(metrics.iter().any(|m| m.starts_with("goal is to reach 40")));
    }

    #[test]
    fn test_stakeholders() {
        let text = "Primary users: Product Managers and engineers.\n\
                    Built for Enterprise Sales teams.";
        let stakeholders = extract_stakeholders(text);

        assert!(stakeholders.contains(&"users: Product Managers".to_string()));
        assert!(stakeholders.contains(&"for Enterprise Sales".to_string()));
    }

    #[test]
    fn test_stakeholders_require_capitalized_names() {
        assert!(extract_stakeholders("built for everyone, used by customers daily").is_empty());
    }

    #[test]
    fn test_features() {
        let text = "Feature: Bulk CSV import\n\
                    The app must support offline editing. It should allow sharing links.";
        let features = extract_features(text);

        assert!(features.contains(&"Feature: Bulk CSV import".to_string()));
        assert!(features.contains(&"must support offline editing".to_string()));
        assert!(features.contains(&"should allow sharing links".to_string()));
    }

    #[test]
    fn test_risks() {
        let text = "Risk: vendor pricing changes\nThere is a potential issue with GDPR consent.";
        let risks = extract_risks(text);

        assert!(risks.contains(&"Risk: vendor pricing changes".to_string()));
        assert!(risks.contains(&"potential issue with GDPR consent".to_string()));
    }

    #[test]
    fn test_duplicates_collapse() {
        let text = "Risk: churn\nRisk: churn\nRisk: churn";
        assert_eq!(extract_risks(text), vec!["Risk: churn".to_string()]);
    }

    #[test]
    fn test_no_matches_is_empty() {
        let data = parse("");
        assert!(data.sections.is_empty());
        assert!(data.metrics.is_empty());
        assert!(data.stakeholders.is_empty());
        assert!(data.features.is_empty());
        assert!(data.risks.is_empty());
        assert!(data.timeline.is_none());
    }

    #[test]
    fn test_parse_populates_sections_and_lists() {
        let text = "Problem Statement\nTeams lose track of feedback.\n\
                    Timeline\nBeta in Q2, GA in Q4.\n\
                    Risks\nRisk: low adoption";
        let data = parse(text);

        assert!(data.has_section(SectionName::ProblemStatement));
        assert_eq!(data.section_text(SectionName::Timeline), Some("Beta in Q2, GA in Q4."));
        assert_eq!(data.risks, vec!["Risk: low adoption".to_string()]);
        assert!(data.timeline.is_none());
    }
}
