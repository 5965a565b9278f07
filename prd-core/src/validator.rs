//! Structure validation: which sections a PRD has and how much each is worth.
//!
//! The overall score only counts presence points. The per-section
//! completeness sub-score is reported next to it but never feeds it.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use crate::error::{CoreError, Result};
use crate::models::{SectionReport, StructureScores, StructuredData, ValidationResult};
use crate::sections::SectionName;

pub const REQUIRED_SECTIONS: [SectionName; 5] = [
    SectionName::ProblemStatement,
    SectionName::Solution,
    SectionName::TargetMarket,
    SectionName::SuccessMetrics,
    SectionName::Features,
];

pub const OPTIONAL_SECTIONS: [SectionName; 4] = [
    SectionName::UserPersonas,
    SectionName::Timeline,
    SectionName::Risks,
    SectionName::CompetitiveAnalysis,
];

pub const REQUIRED_POINTS: u32 = 20;
pub const OPTIONAL_POINTS: u32 = 10;
pub const MAX_POINTS: u32 =
    REQUIRED_SECTIONS.len() as u32 * REQUIRED_POINTS + OPTIONAL_SECTIONS.len() as u32 * OPTIONAL_POINTS;

/// Sections scoring below this get an improvement note.
const LOW_COMPLETENESS: u32 = 50;

static AUDIENCE_WORD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:user|customer|stakeholder|target)\b").expect("Invalid regex pattern")
});

/// Percentage rounded half away from zero.
pub(crate) fn percent(part: u32, whole: u32) -> u32 {
    if whole == 0 {
        return 0;
    }
    (100.0 * f64::from(part) / f64::from(whole)).round() as u32
}

/// Heuristic 0-100 quality score for a block of text.
pub fn assess_completeness(text: Option<&str>) -> u32 {
    let Some(text) = text else {
        return 0;
    };

    let length = text.chars().count();
    if length < 50 {
        return 0;
    }

    let words = text.split_whitespace().count();
    let mut score = 0;

    if words > 100 {
        score += 30;
    } else if words > 50 {
        score += 20;
    }
    if text.contains(':') {
        score += 10;
    }
    if text.chars().any(|c| c.is_ascii_digit()) {
        score += 10;
    }
    if length > 200 {
        score += 20;
    }
    if text.split('\n').count() > 3 {
        score += 10;
    }
    if text.trim_end().ends_with(['.', '!', '?']) {
        score += 10;
    }
    if AUDIENCE_WORD.is_match(text) {
        score += 10;
    }

    score.min(100)
}

/// Validate the section structure of a PRD.
///
/// At least one of `structured` and `content` must be given. A section counts
/// as present when its extracted text is non-blank or, failing that, when its
/// header pattern occurs anywhere in `content`.
pub fn validate_structure(
    structured: Option<&StructuredData>,
    content: Option<&str>,
) -> Result<ValidationResult> {
    if structured.is_none() && content.is_none() {
        return Err(CoreError::MissingInput);
    }

    let required = REQUIRED_SECTIONS.iter().map(|name| (*name, true));
    let optional = OPTIONAL_SECTIONS.iter().map(|name| (*name, false));

    let mut reports = Vec::with_capacity(REQUIRED_SECTIONS.len() + OPTIONAL_SECTIONS.len());
    for (name, is_required) in required.chain(optional) {
        reports.push(assess_section(name, is_required, structured, content));
    }

    let earned: u32 = reports.iter().map(|r| r.points).sum();
    let required_earned: u32 = reports.iter().filter(|r| r.required).map(|r| r.points).sum();
    let optional_earned = earned - required_earned;

    let overall_score = percent(earned, MAX_POINTS);

    let present: Vec<&SectionReport> = reports.iter().filter(|r| r.present).collect();
    let content_quality = if present.is_empty() {
        0
    } else {
        let total: u32 = present.iter().map(|r| r.completeness).sum();
        (f64::from(total) / present.len() as f64).round() as u32
    };

    let scores = StructureScores {
        completeness: overall_score,
        required_coverage: percent(required_earned, REQUIRED_SECTIONS.len() as u32 * REQUIRED_POINTS),
        optional_coverage: percent(optional_earned, OPTIONAL_SECTIONS.len() as u32 * OPTIONAL_POINTS),
        content_quality,
    };

    let missing_required: Vec<SectionName> = reports
        .iter()
        .filter(|r| r.required && !r.present)
        .map(|r| r.section)
        .collect();
    let missing_optional: Vec<SectionName> = reports
        .iter()
        .filter(|r| !r.required && !r.present)
        .map(|r| r.section)
        .collect();

    let strengths = present
        .iter()
        .map(|r| format!("{} section is present", r.section))
        .collect();

    let mut areas_for_improvement: Vec<String> = missing_required
        .iter()
        .map(|name| format!("Missing required section: {name}"))
        .collect();
    areas_for_improvement.extend(
        present
            .iter()
            .filter(|r| r.completeness < LOW_COMPLETENESS)
            .map(|r| format!("{} section needs more detail", r.section)),
    );

    let recommendations = recommend(&missing_required, &missing_optional, overall_score);

    debug!(
        overall_score,
        missing_required = missing_required.len(),
        missing_optional = missing_optional.len(),
        "validated document structure"
    );

    Ok(ValidationResult {
        overall_score,
        scores,
        sections: reports,
        missing_required,
        missing_optional,
        strengths,
        areas_for_improvement,
        recommendations,
    })
}

fn assess_section(
    name: SectionName,
    required: bool,
    structured: Option<&StructuredData>,
    content: Option<&str>,
) -> SectionReport {
    let extracted = structured.and_then(|data| data.section_text(name));
    let header_found = content.is_some_and(|text| name.pattern().is_match(text));
    let present = extracted.is_some() || header_found;

    let max_points = if required { REQUIRED_POINTS } else { OPTIONAL_POINTS };
    let completeness = if present {
        assess_completeness(extracted.or(content))
    } else {
        0
    };

    SectionReport {
        section: name,
        required,
        present,
        points: if present { max_points } else { 0 },
        max_points,
        completeness,
    }
}

fn recommend(missing_required: &[SectionName], missing_optional: &[SectionName], score: u32) -> Vec<String> {
    let mut recommendations: Vec<String> = missing_required
        .iter()
        .map(|name| format!("Add a {name} section; it is required for a complete PRD"))
        .collect();

    recommendations.extend(
        missing_optional
            .iter()
            .map(|name| format!("Consider adding a {name} section to strengthen the document")),
    );

    let general = if score < 60 {
        "Focus on completing the required sections before refining details"
    } else if score < 80 {
        "Good foundation; adding the optional sections would make the PRD more comprehensive"
    } else {
        "Well-structured PRD; deepen each section with more specific detail"
    };
    recommendations.push(general.to_string());

    recommendations
}
