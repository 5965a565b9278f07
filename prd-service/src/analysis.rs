//! AI dimension analysis: one provider call per dimension, run concurrently,
//! each resolving into its own [`DimensionOutcome`].

use async_trait::async_trait;
use chrono::Utc;
use prd_core::{
    CoreError, Dimension, DimensionScores, StructuredData, combine, quick_score, render_sections,
    validate_structure,
};
use rig::completion::Prompt;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::llm::{get_llm_agent, strip_code_fence};
use crate::models::{AnalysisReport, DimensionOutcome};

#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("OPENROUTER_API_KEY not set")]
    MissingApiKey,

    #[error("LLM request failed: {0}")]
    Provider(String),

    #[error(transparent)]
    Malformed(#[from] CoreError),
}

/// A scored dimension as returned by the provider.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DimensionAnalysis {
    pub score: u32,
    #[serde(default)]
    pub feedback: String,
    #[serde(default)]
    pub suggestions: Vec<String>,
}

/// Scores a single dimension of a PRD.
#[async_trait]
pub trait DimensionAnalyzer: Send + Sync {
    async fn analyze(
        &self,
        dimension: Dimension,
        data: &StructuredData,
    ) -> Result<DimensionAnalysis, AnalysisError>;
}

pub struct LlmDimensionAnalyzer {
    api_key: Option<String>,
    model: String,
}

impl LlmDimensionAnalyzer {
    pub fn new(api_key: Option<String>, model: impl Into<String>) -> Self {
        Self {
            api_key,
            model: model.into(),
        }
    }
}

const ANALYST_PREAMBLE: &str = "You are a senior product manager reviewing product requirements documents. \
You score documents strictly and respond with JSON only.";

fn dimension_instructions(dimension: Dimension) -> &'static str {
    match dimension {
        Dimension::Completeness => {
            "Evaluate COMPLETENESS: are problem, solution, target market, features, success metrics, \
             timeline, risks and competition all covered with enough depth to start building?"
        }
        Dimension::Clarity => {
            "Evaluate CLARITY: is the document unambiguous, are requirements testable, is terminology \
             consistent and could an engineer implement it without follow-up questions?"
        }
        Dimension::MarketFit => {
            "Evaluate MARKET FIT: is the target market well defined, is the problem validated for \
             those users, and do the success metrics reflect real customer value?"
        }
        Dimension::CompetitivePositioning => {
            "Evaluate COMPETITIVE POSITIONING: are competitors identified, is differentiation \
             explicit, and is there a credible reason users would switch?"
        }
    }
}

pub fn build_dimension_prompt(dimension: Dimension, data: &StructuredData) -> String {
    let list = |items: &[String]| {
        if items.is_empty() {
            "(none found)".to_string()
        } else {
            items.join("; ")
        }
    };

    format!(
        r#"{instructions}

Respond **only** with JSON of the form
{{ "score": <integer 0-100>, "feedback": "...", "suggestions": ["...", "..."] }}

Document sections:
{sections}

Extracted metrics: {metrics}
Extracted stakeholders: {stakeholders}
Extracted features: {features}
Extracted risks: {risks}"#,
        instructions = dimension_instructions(dimension),
        sections = render_sections(&data.sections),
        metrics = list(&data.metrics),
        stakeholders = list(&data.stakeholders),
        features = list(&data.features),
        risks = list(&data.risks),
    )
}

/// Parse a provider reply, tolerating a surrounding code fence.
pub fn parse_dimension_response(
    dimension: Dimension,
    raw: &str,
) -> Result<DimensionAnalysis, CoreError> {
    let analysis: DimensionAnalysis = serde_json::from_str(strip_code_fence(raw)).map_err(|e| {
        CoreError::MalformedUpstreamResponse {
            dimension,
            details: format!("{}. Raw response: {}", e, raw),
        }
    })?;

    if analysis.score > 100 {
        return Err(CoreError::MalformedUpstreamResponse {
            dimension,
            details: format!("score {} is out of range", analysis.score),
        });
    }
    Ok(analysis)
}

#[async_trait]
impl DimensionAnalyzer for LlmDimensionAnalyzer {
    async fn analyze(
        &self,
        dimension: Dimension,
        data: &StructuredData,
    ) -> Result<DimensionAnalysis, AnalysisError> {
        let api_key = self.api_key.as_deref().ok_or(AnalysisError::MissingApiKey)?;

        let agent = get_llm_agent(api_key, &self.model, ANALYST_PREAMBLE);
        let prompt = build_dimension_prompt(dimension, data);

        let raw = agent
            .prompt(&prompt)
            .await
            .map_err(|e| AnalysisError::Provider(e.to_string()))?;

        Ok(parse_dimension_response(dimension, &raw)?)
    }
}

/// Run every dimension concurrently, each bounded by `timeout`.
///
/// A failure, timeout or panic in one dimension only affects its own entry.
pub async fn run_dimensions(
    analyzer: Arc<dyn DimensionAnalyzer>,
    data: Arc<StructuredData>,
    timeout: Duration,
) -> BTreeMap<Dimension, DimensionOutcome> {
    let handles: Vec<_> = Dimension::ALL
        .into_iter()
        .map(|dimension| {
            let analyzer = analyzer.clone();
            let data = data.clone();
            let handle = tokio::spawn(async move {
                tokio::time::timeout(timeout, analyzer.analyze(dimension, &data)).await
            });
            (dimension, handle)
        })
        .collect();

    let mut outcomes = BTreeMap::new();
    for (dimension, handle) in handles {
        let outcome = match handle.await {
            Ok(Ok(Ok(analysis))) => {
                info!(dimension = %dimension, score = analysis.score, "Dimension scored");
                DimensionOutcome::Scored {
                    score: analysis.score,
                    feedback: analysis.feedback,
                    suggestions: analysis.suggestions,
                }
            }
            Ok(Ok(Err(e))) => {
                warn!(dimension = %dimension, error = %e, "Dimension analysis failed");
                DimensionOutcome::Failed {
                    reason: e.to_string(),
                }
            }
            Ok(Err(_elapsed)) => {
                warn!(dimension = %dimension, timeout_secs = timeout.as_secs_f64(), "Dimension analysis timed out");
                DimensionOutcome::TimedOut
            }
            Err(e) => {
                error!(dimension = %dimension, error = %e, "Dimension task aborted");
                DimensionOutcome::Failed {
                    reason: format!("analysis task aborted: {}", e),
                }
            }
        };
        outcomes.insert(dimension, outcome);
    }

    outcomes
}

/// Validate, quick-score and AI-score a PRD into a single report.
pub async fn analyze_document(
    analyzer: Arc<dyn DimensionAnalyzer>,
    data: StructuredData,
    content: Option<&str>,
    project_id: Option<Uuid>,
    timeout: Duration,
) -> Result<AnalysisReport, CoreError> {
    let structure = validate_structure(Some(&data), content)?;
    let quick = quick_score(&data);

    let data = Arc::new(data);
    let dimensions = run_dimensions(analyzer, data.clone(), timeout).await;

    let dimension_scores: DimensionScores = dimensions
        .iter()
        .filter_map(|(dimension, outcome)| outcome.score().map(|score| (*dimension, score)))
        .collect();
    let overall_score = combine(&dimension_scores);

    info!(
        overall_score,
        scored = dimension_scores.present().count(),
        structure_score = structure.overall_score,
        "Analysis completed"
    );

    Ok(AnalysisReport {
        id: Uuid::new_v4(),
        project_id,
        created_at: Utc::now(),
        overall_score,
        dimension_scores,
        dimensions,
        structure,
        quick_score: quick,
        structured_data: Arc::unwrap_or_clone(data),
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::HashMap;

    /// Analyzer with a canned behaviour per dimension.
    pub(crate) struct StubAnalyzer {
        pub scores: HashMap<Dimension, u32>,
        pub slow: Option<Dimension>,
        pub panics: Option<Dimension>,
    }

    impl StubAnalyzer {
        pub(crate) fn scoring(scores: &[(Dimension, u32)]) -> Self {
            Self {
                scores: scores.iter().copied().collect(),
                slow: None,
                panics: None,
            }
        }
    }

    #[async_trait]
    impl DimensionAnalyzer for StubAnalyzer {
        async fn analyze(
            &self,
            dimension: Dimension,
            _data: &StructuredData,
        ) -> Result<DimensionAnalysis, AnalysisError> {
            if self.slow == Some(dimension) {
                tokio::time::sleep(Duration::from_secs(30)).await;
            }
            if self.panics == Some(dimension) {
                panic!("stub panic");
            }
            match self.scores.get(&dimension) {
                Some(score) => Ok(DimensionAnalysis {
                    score: *score,
                    feedback: format!("{} looks fine", dimension),
                    suggestions: vec![],
                }),
                None => Err(AnalysisError::Provider("stub failure".to_string())),
            }
        }
    }

    #[test]
    fn test_parse_dimension_response() {
        let raw = "```json\n{\"score\": 72, \"feedback\": \"Solid\", \"suggestions\": [\"Add KPIs\"]}\n```";
        let analysis = parse_dimension_response(Dimension::Clarity, raw).unwrap();
        assert_eq!(analysis.score, 72);
        assert_eq!(analysis.suggestions, vec!["Add KPIs".to_string()]);
    }

    #[test]
    fn test_malformed_response() {
        let err = parse_dimension_response(Dimension::MarketFit, "I think it's about 70").unwrap_err();
        assert!(matches!(
            err,
            CoreError::MalformedUpstreamResponse {
                dimension: Dimension::MarketFit,
                ..
            }
        ));

        let err = parse_dimension_response(Dimension::MarketFit, "{\"score\": 140}").unwrap_err();
        assert!(err.to_string().contains("out of range"));
    }

    #[test]
    fn test_prompt_mentions_extracted_data() {
        let data = prd_core::parse("Solution\nA shared inbox.\nRisk: slow adoption");
        let prompt = build_dimension_prompt(Dimension::Completeness, &data);
        assert!(prompt.contains("COMPLETENESS"));
        assert!(prompt.contains("A shared inbox."));
        assert!(prompt.contains("Extracted risks: Risk: slow adoption"));
        assert!(prompt.contains("Extracted metrics: (none found)"));
    }

    #[tokio::test]
    async fn test_partial_failures_are_isolated() {
        let analyzer = StubAnalyzer {
            scores: [(Dimension::Completeness, 80), (Dimension::Clarity, 60), (Dimension::MarketFit, 10)]
                .into_iter()
                .collect(),
            slow: Some(Dimension::MarketFit),
            panics: None,
        };

        let outcomes = run_dimensions(
            Arc::new(analyzer),
            Arc::new(StructuredData::default()),
            Duration::from_millis(100),
        )
        .await;

        assert_eq!(outcomes.len(), 4);
        assert_eq!(outcomes[&Dimension::Completeness].score(), Some(80));
        assert_eq!(outcomes[&Dimension::Clarity].score(), Some(60));
        assert_eq!(outcomes[&Dimension::MarketFit], DimensionOutcome::TimedOut);
        assert!(matches!(
            outcomes[&Dimension::CompetitivePositioning],
            DimensionOutcome::Failed { .. }
        ));
    }

    #[tokio::test]
    async fn test_panicking_dimension_is_reported_as_failed() {
        let mut analyzer = StubAnalyzer::scoring(&[(Dimension::Completeness, 90), (Dimension::Clarity, 50)]);
        analyzer.panics = Some(Dimension::Clarity);

        let outcomes = run_dimensions(
            Arc::new(analyzer),
            Arc::new(StructuredData::default()),
            Duration::from_secs(5),
        )
        .await;

        assert_eq!(outcomes[&Dimension::Completeness].score(), Some(90));
        assert!(matches!(outcomes[&Dimension::Clarity], DimensionOutcome::Failed { .. }));
    }

    #[tokio::test]
    async fn test_analyze_document_combines_successful_dimensions() {
        let analyzer = StubAnalyzer::scoring(&[(Dimension::Completeness, 80), (Dimension::Clarity, 60)]);
        let text = "Problem Statement\nInvoices are reconciled by hand.\nSolution\nMatch invoices automatically.";
        let data = prd_core::parse(text);

        let report = analyze_document(
            Arc::new(analyzer),
            data,
            Some(text),
            None,
            Duration::from_secs(5),
        )
        .await
        .unwrap();

        assert_eq!(report.overall_score, 70);
        assert_eq!(report.dimension_scores.market_fit, None);
        assert_eq!(report.structure.overall_score, 29);
        assert!(report.project_id.is_none());
    }

    #[tokio::test]
    async fn test_unconfigured_llm_analyzer_fails_every_dimension() {
        let analyzer = LlmDimensionAnalyzer::new(None, "openai/gpt-4.1-mini");
        let outcomes = run_dimensions(
            Arc::new(analyzer),
            Arc::new(StructuredData::default()),
            Duration::from_secs(5),
        )
        .await;

        assert!(
            outcomes
                .values()
                .all(|o| matches!(o, DimensionOutcome::Failed { reason } if reason.contains("OPENROUTER_API_KEY")))
        );
    }
}
