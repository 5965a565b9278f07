use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::sections::SectionName;

/// Sections and extracted fragments of a single PRD.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StructuredData {
    #[serde(default)]
    pub sections: BTreeMap<SectionName, String>,
    #[serde(default)]
    pub metrics: Vec<String>,
    #[serde(default)]
    pub stakeholders: Vec<String>,
    #[serde(default)]
    pub features: Vec<String>,
    #[serde(default)]
    pub risks: Vec<String>,
    /// Never populated by the extractor; timeline text lives in `sections`.
    #[serde(default)]
    pub timeline: Option<String>,
}

impl StructuredData {
    /// Text of a section when it was detected and is not blank.
    pub fn section_text(&self, name: SectionName) -> Option<&str> {
        self.sections
            .get(&name)
            .map(String::as_str)
            .filter(|text| !text.trim().is_empty())
    }

    pub fn has_section(&self, name: SectionName) -> bool {
        self.section_text(name).is_some()
    }
}

/// Outcome of structure validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    pub overall_score: u32,
    pub scores: StructureScores,
    pub sections: Vec<SectionReport>,
    pub missing_required: Vec<SectionName>,
    pub missing_optional: Vec<SectionName>,
    pub strengths: Vec<String>,
    pub areas_for_improvement: Vec<String>,
    pub recommendations: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StructureScores {
    /// Same value as the overall score.
    pub completeness: u32,
    pub required_coverage: u32,
    pub optional_coverage: u32,
    /// Mean completeness of the present sections. Informational only.
    pub content_quality: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionReport {
    pub section: SectionName,
    pub required: bool,
    pub present: bool,
    pub points: u32,
    pub max_points: u32,
    pub completeness: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuickScore {
    pub overall: u32,
    pub breakdown: QuickScoreBreakdown,
}

/// Display split of the final overall score (40/30/30), not the raw
/// component sums.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuickScoreBreakdown {
    pub sections: u32,
    pub content: u32,
    pub metrics: u32,
}
