//! Header-driven partitioning of PRD text into named sections.
//!
//! Every line is tested against an ordered list of header patterns; the first
//! pattern that matches opens a new section. The order of [`SECTION_PATTERNS`]
//! is therefore significant: a line such as "Proposed Solution for Target
//! Users" opens `solution`, never `userPersonas`.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tracing::debug;

/// The nine topic headers a PRD is expected to contain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SectionName {
    ProblemStatement,
    Solution,
    TargetMarket,
    UserPersonas,
    Features,
    SuccessMetrics,
    Timeline,
    Risks,
    CompetitiveAnalysis,
}

impl SectionName {
    pub const ALL: [SectionName; 9] = [
        SectionName::ProblemStatement,
        SectionName::Solution,
        SectionName::TargetMarket,
        SectionName::UserPersonas,
        SectionName::Features,
        SectionName::SuccessMetrics,
        SectionName::Timeline,
        SectionName::Risks,
        SectionName::CompetitiveAnalysis,
    ];

    /// Key used in serialized structured data.
    pub fn key(&self) -> &'static str {
        match self {
            SectionName::ProblemStatement => "problemStatement",
            SectionName::Solution => "solution",
            SectionName::TargetMarket => "targetMarket",
            SectionName::UserPersonas => "userPersonas",
            SectionName::Features => "features",
            SectionName::SuccessMetrics => "successMetrics",
            SectionName::Timeline => "timeline",
            SectionName::Risks => "risks",
            SectionName::CompetitiveAnalysis => "competitiveAnalysis",
        }
    }

    /// Human readable heading, also used when re-rendering a document.
    pub fn title(&self) -> &'static str {
        match self {
            SectionName::ProblemStatement => "Problem Statement",
            SectionName::Solution => "Solution",
            SectionName::TargetMarket => "Target Market",
            SectionName::UserPersonas => "User Personas",
            SectionName::Features => "Features",
            SectionName::SuccessMetrics => "Success Metrics",
            SectionName::Timeline => "Timeline",
            SectionName::Risks => "Risks",
            SectionName::CompetitiveAnalysis => "Competitive Analysis",
        }
    }

    /// Header pattern for this section.
    pub fn pattern(&self) -> &'static Regex {
        // SECTION_PATTERNS is declared in variant order.
        &SECTION_PATTERNS[*self as usize].1
    }

    /// True when `line` would open this section.
    pub fn matches_header(&self, line: &str) -> bool {
        self.pattern().is_match(line)
    }
}

impl fmt::Display for SectionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.title())
    }
}

fn header(pattern: &str) -> Regex {
    Regex::new(&format!("(?i){pattern}")).expect("Invalid section header pattern")
}

/// Header patterns in evaluation order. First match wins.
pub static SECTION_PATTERNS: Lazy<Vec<(SectionName, Regex)>> = Lazy::new(|| {
    vec![
        (
            SectionName::ProblemStatement,
            header(r"problem\s+statement|problem\s+definition"),
        ),
        (SectionName::Solution, header(r"solution|proposed\s+solution")),
        (
            SectionName::TargetMarket,
            header(r"target\s+market|market\s+analysis"),
        ),
        (
            SectionName::UserPersonas,
            header(r"user\s+personas|target\s+users"),
        ),
        (
            SectionName::Features,
            header(r"features|functional\s+requirements"),
        ),
        (
            SectionName::SuccessMetrics,
            header(r"success\s+metrics|kpis|key\s+performance\s+indicators"),
        ),
        (SectionName::Timeline, header(r"timeline|roadmap|milestones")),
        (SectionName::Risks, header(r"risks|challenges|assumptions")),
        (
            SectionName::CompetitiveAnalysis,
            header(r"competitive\s+analysis|competitors"),
        ),
    ]
});

/// Returns the section a line opens, if any.
pub fn detect_header(line: &str) -> Option<SectionName> {
    SECTION_PATTERNS
        .iter()
        .find(|(_, re)| re.is_match(line))
        .map(|(name, _)| *name)
}

/// Split `text` into named sections.
///
/// Lines before the first recognized header are dropped. When a header
/// appears twice the later block replaces the earlier one.
pub fn parse_sections(text: &str) -> BTreeMap<SectionName, String> {
    let mut sections = BTreeMap::new();
    let mut current: Option<SectionName> = None;
    let mut buffer: Vec<&str> = Vec::new();

    for raw_line in text.split('\n') {
        let line = raw_line.trim();

        if let Some(name) = detect_header(line) {
            if let Some(open) = current.take() {
                flush(&mut sections, open, &mut buffer);
            }
            current = Some(name);
            continue;
        }

        if !line.is_empty() && current.is_some() {
            buffer.push(line);
        }
    }

    if let Some(open) = current {
        flush(&mut sections, open, &mut buffer);
    }

    debug!(sections = sections.len(), "parsed document sections");
    sections
}

fn flush(sections: &mut BTreeMap<SectionName, String>, name: SectionName, buffer: &mut Vec<&str>) {
    if sections.contains_key(&name) {
        debug!(section = name.key(), "repeated header replaces earlier block");
    }
    sections.insert(name, buffer.join("\n"));
    buffer.clear();
}

/// Render sections back into header-delimited text.
pub fn render_sections(sections: &BTreeMap<SectionName, String>) -> String {
    let mut out = String::new();
    for (name, body) in sections {
        out.push_str(name.title());
        out.push('\n');
        if !body.is_empty() {
            out.push_str(body);
            out.push('\n');
        }
    }
    out
}
