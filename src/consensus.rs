use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ModelError, Result};
use crate::models::ModelResult;
use crate::probs::{Outcome, Prob3};
use crate::tiers::Tier;

pub const ZERO_WEIGHT: &str = "zero_weight";

/// Per-model voting weights. Models not listed get `default_weight`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsensusWeights {
    pub default_weight: f64,
    pub per_model: HashMap<String, f64>,
}

impl Default for ConsensusWeights {
    fn default() -> Self {
        Self {
            default_weight: 1.0,
            per_model: HashMap::new(),
        }
    }
}

impl ConsensusWeights {
    pub fn weight_for(&self, model_id: &str) -> f64 {
        self.per_model
            .get(model_id)
            .copied()
            .unwrap_or(self.default_weight)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedModel {
    pub model_id: String,
    pub reason: String,
}

impl SkippedModel {
    pub fn new(model_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            model_id: model_id.into(),
            reason: reason.into(),
        }
    }
}

/// Probability and fair (margin-free) decimal price of one selection.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MarketPrice {
    pub probability: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fair_odds: Option<f64>,
}

impl MarketPrice {
    pub fn new(probability: f64) -> Self {
        Self {
            probability,
            fair_odds: (probability > 0.0).then(|| 1.0 / probability),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DerivedMarkets {
    pub home_win: MarketPrice,
    pub draw: MarketPrice,
    pub away_win: MarketPrice,
    /// 1X
    pub home_or_draw: MarketPrice,
    /// X2
    pub draw_or_away: MarketPrice,
    /// 12
    pub home_or_away: MarketPrice,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub draw_no_bet_home: Option<MarketPrice>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub draw_no_bet_away: Option<MarketPrice>,
}

impl DerivedMarkets {
    pub fn from_probs(p: Prob3) -> Self {
        let decisive = p.home + p.away;
        Self {
            home_win: MarketPrice::new(p.home),
            draw: MarketPrice::new(p.draw),
            away_win: MarketPrice::new(p.away),
            home_or_draw: MarketPrice::new(p.home + p.draw),
            draw_or_away: MarketPrice::new(p.draw + p.away),
            home_or_away: MarketPrice::new(decisive),
            // Undefined when only a draw is possible.
            draw_no_bet_home: (decisive > 0.0).then(|| MarketPrice::new(p.home / decisive)),
            draw_no_bet_away: (decisive > 0.0).then(|| MarketPrice::new(p.away / decisive)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsensusResult {
    #[serde(flatten)]
    pub outcome_probabilities: Prob3,
    pub recommendation: Outcome,
    pub confidence: f64,
    pub contributing_models: Vec<String>,
    pub skipped_models: Vec<SkippedModel>,
    pub markets: DerivedMarkets,
}

#[derive(Debug, Clone, Default)]
pub struct ConsensusAggregator {
    weights: ConsensusWeights,
}

impl ConsensusAggregator {
    pub fn new(weights: ConsensusWeights) -> Self {
        Self { weights }
    }

    /// Weighted mean of the successful results. Models whose weight is not a positive finite
    /// number join the skipped list; nothing left to average is `NoModelsAvailable`.
    pub fn aggregate(
        &self,
        tier: Tier,
        results: &[ModelResult],
        mut skipped: Vec<SkippedModel>,
    ) -> Result<ConsensusResult> {
        let mut voters: Vec<(&ModelResult, f64)> = Vec::with_capacity(results.len());
        for r in results {
            let w = self.weights.weight_for(&r.model_id);
            if w.is_finite() && w > 0.0 {
                voters.push((r, w));
            } else {
                debug!(model = %r.model_id, weight = w, "model excluded from consensus");
                skipped.push(SkippedModel::new(r.model_id.clone(), ZERO_WEIGHT));
            }
        }

        let probs = match voters.as_slice() {
            [] => {
                return Err(ModelError::NoModelsAvailable {
                    tier: tier.to_string(),
                });
            }
            [(only, _)] => only.outcome_probabilities,
            many => {
                let total: f64 = many.iter().map(|(_, w)| w).sum();
                let mut acc = Prob3::new(0.0, 0.0, 0.0);
                for (r, w) in many {
                    let p = r.outcome_probabilities;
                    acc.home += w * p.home;
                    acc.draw += w * p.draw;
                    acc.away += w * p.away;
                }
                Prob3::new(acc.home / total, acc.draw / total, acc.away / total).normalized()?
            }
        };

        debug!(
            contributors = voters.len(),
            skipped = skipped.len(),
            "consensus built"
        );
        Ok(ConsensusResult {
            outcome_probabilities: probs,
            recommendation: probs.argmax(),
            confidence: probs.max(),
            contributing_models: voters.iter().map(|(r, _)| r.model_id.clone()).collect(),
            skipped_models: skipped,
            markets: DerivedMarkets::from_probs(probs),
        })
    }
}
