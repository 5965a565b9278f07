//! Extraction and heuristic scoring for product requirements documents.
//!
//! Everything in this crate is synchronous and side-effect free: callers hand
//! in decoded text (or already-extracted [`StructuredData`]) and get plain
//! values back.
//!
//! ```
//! let text = "Problem Statement\nSupport tickets take 3 days to triage.\n\
//!             Solution\nAuto-route tickets using the product taxonomy.";
//! let data = prd_core::parse(text);
//! let result = prd_core::validate_structure(Some(&data), Some(text)).unwrap();
//! assert_eq!(result.overall_score, 29);
//! ```

pub mod combiner;
pub mod error;
pub mod extract;
pub mod format;
pub mod models;
pub mod quick_score;
pub mod sections;
pub mod validator;

// Re-export commonly used types
pub use combiner::{Dimension, DimensionScores, combine};
pub use error::{CoreError, Result};
pub use extract::{extract_features, extract_metrics, extract_risks, extract_stakeholders, parse};
pub use format::{DocumentFormat, DocumentMetadata, ParsedContent, RawDocument};
pub use models::{
    QuickScore, QuickScoreBreakdown, SectionReport, StructureScores, StructuredData,
    ValidationResult,
};
pub use quick_score::quick_score;
pub use sections::{SectionName, parse_sections, render_sections};
pub use validator::{OPTIONAL_SECTIONS, REQUIRED_SECTIONS, assess_completeness, validate_structure};
