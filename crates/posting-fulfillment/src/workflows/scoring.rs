//! Compatibility scoring used by the discovery and ranking path.
//!
//! Four independently computed sub-scores are folded into one number with fixed weights.
//! The sub-scores themselves come from elsewhere; this module only combines them.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use super::fulfillment::domain::UserId;

pub const SEMANTIC_WEIGHT: f64 = 0.3;
pub const AVAILABILITY_WEIGHT: f64 = 0.3;
pub const SKILL_LEVEL_WEIGHT: f64 = 0.2;
pub const LOCATION_WEIGHT: f64 = 0.2;

const ROUNDING_SCALE: f64 = 1_000_000.0;

/// Raw sub-scores for a (user, posting) pair. `None` means the signal is unknown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    #[serde(default)]
    pub semantic: Option<f64>,
    #[serde(default)]
    pub availability: Option<f64>,
    #[serde(default)]
    pub skill_level: Option<f64>,
    #[serde(default)]
    pub location: Option<f64>,
}

/// What to do with a sub-score nobody could compute.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnknownScorePolicy {
    /// Missing signals contribute nothing; weights are not redistributed.
    #[default]
    TreatAsZero,
    /// Weights of the known signals are scaled up to sum to one.
    Renormalize,
}

impl UnknownScorePolicy {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "zero" | "treat_as_zero" => Some(Self::TreatAsZero),
            "renormalize" | "renormalise" => Some(Self::Renormalize),
            _ => None,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            UnknownScorePolicy::TreatAsZero => "treat_as_zero",
            UnknownScorePolicy::Renormalize => "renormalize",
        }
    }
}

/// Candidate handed in by the ranking caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredCandidate {
    pub user_id: UserId,
    pub breakdown: ScoreBreakdown,
}

/// Candidate annotated with the combined score, in ranked order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedCandidate {
    pub user_id: UserId,
    pub score: f64,
    pub breakdown: ScoreBreakdown,
}

/// Pure combiner; cheap to copy into any caller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScoreCombiner {
    policy: UnknownScorePolicy,
}

impl ScoreCombiner {
    pub fn new(policy: UnknownScorePolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> UnknownScorePolicy {
        self.policy
    }

    /// Weighted sum in `[0, 1]`, rounded to six decimal places.
    pub fn combine(&self, breakdown: &ScoreBreakdown) -> f64 {
        let weighted = [
            (sanitize(breakdown.semantic), SEMANTIC_WEIGHT),
            (sanitize(breakdown.availability), AVAILABILITY_WEIGHT),
            (sanitize(breakdown.skill_level), SKILL_LEVEL_WEIGHT),
            (sanitize(breakdown.location), LOCATION_WEIGHT),
        ];

        let mut total = 0.0;
        let mut known_weight = 0.0;
        for (value, weight) in weighted {
            if let Some(value) = value {
                total += value * weight;
                known_weight += weight;
            }
        }

        let combined = match self.policy {
            UnknownScorePolicy::TreatAsZero => total,
            UnknownScorePolicy::Renormalize if known_weight > 0.0 => total / known_weight,
            UnknownScorePolicy::Renormalize => 0.0,
        };

        round(combined.clamp(0.0, 1.0))
    }

    /// Highest score first; equal scores fall back to user id so output is stable.
    pub fn rank(&self, candidates: Vec<ScoredCandidate>) -> Vec<RankedCandidate> {
        let mut ranked: Vec<RankedCandidate> = candidates
            .into_iter()
            .map(|candidate| RankedCandidate {
                score: self.combine(&candidate.breakdown),
                user_id: candidate.user_id,
                breakdown: candidate.breakdown,
            })
            .collect();

        ranked.sort_by(|left, right| {
            right
                .score
                .partial_cmp(&left.score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| left.user_id.cmp(&right.user_id))
        });
        ranked
    }
}

/// Clamp into range; NaN counts as unknown.
fn sanitize(value: Option<f64>) -> Option<f64> {
    value
        .filter(|raw| !raw.is_nan())
        .map(|raw| raw.clamp(0.0, 1.0))
}

fn round(value: f64) -> f64 {
    (value * ROUNDING_SCALE).round() / ROUNDING_SCALE
}
