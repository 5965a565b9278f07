//! Local approximate scoring that needs no analysis provider.

use tracing::debug;

use crate::models::{QuickScore, QuickScoreBreakdown, StructuredData};
use crate::validator::REQUIRED_SECTIONS;

const SECTION_POINTS_TOTAL: f64 = 40.0;
const MIN_SECTION_CHARS: usize = 100;

const CONTENT_SMALL_THRESHOLD: usize = 5_000;
const CONTENT_SMALL_POINTS: f64 = 18.0;
const CONTENT_LARGE_THRESHOLD: usize = 10_000;
const CONTENT_LARGE_POINTS: f64 = 12.0;

const METRICS_POINTS: f64 = 15.0;
const STAKEHOLDER_POINTS: f64 = 15.0;

pub fn quick_score(data: &StructuredData) -> QuickScore {
    let per_section = SECTION_POINTS_TOTAL / REQUIRED_SECTIONS.len() as f64;
    let section_points: f64 = REQUIRED_SECTIONS
        .iter()
        .filter(|name| {
            data.sections
                .get(name)
                .is_some_and(|text| text.chars().count() > MIN_SECTION_CHARS)
        })
        .map(|_| per_section)
        .sum();

    let serialized_len = serde_json::to_string(data).map(|s| s.len()).unwrap_or(0);
    let mut content_points = 0.0;
    if serialized_len > CONTENT_SMALL_THRESHOLD {
        content_points += CONTENT_SMALL_POINTS;
    }
    if serialized_len > CONTENT_LARGE_THRESHOLD {
        content_points += CONTENT_LARGE_POINTS;
    }

    let mut signal_points = 0.0;
    if !data.metrics.is_empty() {
        signal_points += METRICS_POINTS;
    }
    if !data.stakeholders.is_empty() {
        signal_points += STAKEHOLDER_POINTS;
    }

    let overall = (section_points + content_points + signal_points).round().clamp(0.0, 100.0) as u32;

    debug!(
        section_points,
        content_points,
        signal_points,
        serialized_len,
        overall,
        "computed quick score"
    );

    // Display split of the final score, not the component sums above.
    let breakdown = QuickScoreBreakdown {
        sections: share(overall, 40),
        content: share(overall, 30),
        metrics: share(overall, 30),
    };

    QuickScore { overall, breakdown }
}

fn share(overall: u32, percent: u32) -> u32 {
    (f64::from(overall * percent) / 100.0).round() as u32
}
