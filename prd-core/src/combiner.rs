use serde::{Deserialize, Serialize};
use std::fmt;

/// A scored aspect of a PRD returned by the analysis provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Dimension {
    Completeness,
    Clarity,
    MarketFit,
    CompetitivePositioning,
}

impl Dimension {
    pub const ALL: [Dimension; 4] = [
        Dimension::Completeness,
        Dimension::Clarity,
        Dimension::MarketFit,
        Dimension::CompetitivePositioning,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Dimension::Completeness => "completeness",
            Dimension::Clarity => "clarity",
            Dimension::MarketFit => "market fit",
            Dimension::CompetitivePositioning => "competitive positioning",
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Scores that came back from the provider. `None` means the dimension
/// failed, timed out or was never requested.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DimensionScores {
    pub completeness: Option<u32>,
    pub clarity: Option<u32>,
    pub market_fit: Option<u32>,
    pub competitive_positioning: Option<u32>,
}

impl DimensionScores {
    pub fn get(&self, dimension: Dimension) -> Option<u32> {
        match dimension {
            Dimension::Completeness => self.completeness,
            Dimension::Clarity => self.clarity,
            Dimension::MarketFit => self.market_fit,
            Dimension::CompetitivePositioning => self.competitive_positioning,
        }
    }

    pub fn set(&mut self, dimension: Dimension, score: Option<u32>) {
        let slot = match dimension {
            Dimension::Completeness => &mut self.completeness,
            Dimension::Clarity => &mut self.clarity,
            Dimension::MarketFit => &mut self.market_fit,
            Dimension::CompetitivePositioning => &mut self.competitive_positioning,
        };
        *slot = score;
    }

    pub fn present(&self) -> impl Iterator<Item = (Dimension, u32)> + '_ {
        Dimension::ALL
            .into_iter()
            .filter_map(|d| self.get(d).map(|score| (d, score)))
    }
}

impl FromIterator<(Dimension, u32)> for DimensionScores {
    fn from_iter<I: IntoIterator<Item = (Dimension, u32)>>(iter: I) -> Self {
        let mut scores = DimensionScores::default();
        for (dimension, score) in iter {
            scores.set(dimension, Some(score));
        }
        scores
    }
}

/// Unweighted mean of the present dimensions, rounded; 0 when none are present.
pub fn combine(scores: &DimensionScores) -> u32 {
    let (count, total) = scores
        .present()
        .fold((0u32, 0u32), |(count, total), (_, score)| (count + 1, total + score));

    if count == 0 {
        return 0;
    }
    (f64::from(total) / f64::from(count)).round() as u32
}
