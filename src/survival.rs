//! Proportional-hazards goal timing.
//!
//! Each side scores as a Poisson process whose per-minute rate is its expected goals spread over
//! 90 minutes, scaled by a relative-strength term and by a piecewise-constant period profile
//! (six 15-minute periods, mean weight 1). Windows, interval probabilities and the final-result
//! forecast all come from the integrated hazard between two minutes.

use serde::{Deserialize, Serialize};

use crate::error::{Result, require_positive};
use crate::inputs::{ExpectedGoals, MATCH_MINUTES, MatchContext, Score};
use crate::models::{ModelKind, ModelResult, OutcomeModel};
use crate::poisson::{outcome_probs_poisson, poisson_pmf};
use crate::scoregrid::ScoreMatrix;

pub const PERIOD_MINUTES: u32 = 15;
pub const PERIODS: usize = 6;

// exp(±10) already moves a rate by four orders of magnitude.
const MAX_LOG_RATIO: f64 = 10.0;

/// Fitted proportional-hazards coefficients.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CoxCoefficients {
    /// Per 400 Elo points of home-minus-away rating.
    pub rating_gap: f64,
    /// Per unit of ln(home_attack / away_attack).
    pub attack_gap: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GoalWindow {
    pub minutes: u32,
    pub any_goal: f64,
    pub home_goal: f64,
    pub away_goal: f64,
}

/// Probability that the next goal falls in [start, end).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IntervalProb {
    pub start: u32,
    pub end: u32,
    pub probability: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NextGoalForecast {
    pub minute: u32,
    pub remaining_minutes: u32,
    pub hazard_home: f64,
    pub hazard_away: f64,
    pub windows: Vec<GoalWindow>,
    pub intervals: Vec<IntervalProb>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_minutes_to_next_goal: Option<f64>,
    pub remaining_expected_goals: ExpectedGoals,
}

/// Per-minute base rates for both sides, before the period profile.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hazards {
    pub home: f64,
    pub away: f64,
}

impl Hazards {
    pub fn total(&self) -> f64 {
        self.home + self.away
    }
}

#[derive(Debug, Clone)]
pub struct CoxSurvivalModel {
    coefficients: CoxCoefficients,
    period_weights: [f64; PERIODS],
    windows: Vec<u32>,
    max_goals: usize,
}

impl CoxSurvivalModel {
    pub fn new(
        coefficients: CoxCoefficients,
        period_weights: [f64; PERIODS],
        windows: Vec<u32>,
        max_goals: usize,
    ) -> std::result::Result<Self, String> {
        if !coefficients.rating_gap.is_finite() || !coefficients.attack_gap.is_finite() {
            return Err(format!("cox coefficients must be finite, got {coefficients:?}"));
        }
        if period_weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(format!("period weights must be finite and >= 0, got {period_weights:?}"));
        }
        let sum: f64 = period_weights.iter().sum();
        if sum <= 0.0 {
            return Err("period weights must not all be zero".to_string());
        }

        let mean = sum / PERIODS as f64;
        let period_weights = period_weights.map(|w| w / mean);
        Ok(Self {
            coefficients,
            period_weights,
            windows,
            max_goals,
        })
    }

    pub fn period_weights(&self) -> &[f64; PERIODS] {
        &self.period_weights
    }

    /// Base per-minute rates: λ/90 scaled by exp(+x) for home and exp(−x) for away.
    pub fn hazards(&self, ctx: &MatchContext) -> Result<Hazards> {
        let xg = ctx.expected_goals()?;
        let (home_elo, away_elo) = ctx.ratings()?;
        let attack_ratio = require_positive("home_attack", ctx.home.attack)?
            / require_positive("away_attack", ctx.away.attack)?;

        let x = (self.coefficients.rating_gap * (home_elo - away_elo) / 400.0
            + self.coefficients.attack_gap * attack_ratio.ln())
        .clamp(-MAX_LOG_RATIO, MAX_LOG_RATIO);

        let minutes = MATCH_MINUTES as f64;
        Ok(Hazards {
            home: xg.home / minutes * x.exp(),
            away: xg.away / minutes * (-x).exp(),
        })
    }

    fn weight_at(&self, minute: u32) -> f64 {
        if minute >= MATCH_MINUTES {
            return 0.0;
        }
        let period = ((minute / PERIOD_MINUTES) as usize).min(PERIODS - 1);
        self.period_weights[period]
    }

    /// ∫ weight(t) dt over [from, to], both clamped into the match.
    pub fn integrated_weight(&self, from: f64, to: f64) -> f64 {
        let end = MATCH_MINUTES as f64;
        let from = from.clamp(0.0, end);
        let to = to.clamp(0.0, end);
        if to <= from {
            return 0.0;
        }
        let len = PERIOD_MINUTES as f64;
        self.period_weights
            .iter()
            .enumerate()
            .map(|(i, w)| {
                let lo = from.max(i as f64 * len);
                let hi = to.min((i + 1) as f64 * len);
                (hi - lo).max(0.0) * w
            })
            .sum()
    }

    pub fn next_goal(&self, hazards: Hazards, minute: u32) -> NextGoalForecast {
        let m = minute.min(MATCH_MINUTES);
        let mf = m as f64;
        let remaining = self.integrated_weight(mf, MATCH_MINUTES as f64);

        let windows = self
            .windows
            .iter()
            .map(|&minutes| {
                let w = self.integrated_weight(mf, mf + minutes as f64);
                let home = hazards.home * w;
                let away = hazards.away * w;
                GoalWindow {
                    minutes,
                    any_goal: -(-(home + away)).exp_m1(),
                    home_goal: -(-home).exp_m1(),
                    away_goal: -(-away).exp_m1(),
                }
            })
            .collect();

        let total = hazards.total();
        let intervals = (0..PERIODS as u32)
            .map(|i| (i * PERIOD_MINUTES, (i + 1) * PERIOD_MINUTES))
            .filter(|&(_, end)| end > m)
            .map(|(start, end)| {
                let to_start = total * self.integrated_weight(mf, start.max(m) as f64);
                let to_end = total * self.integrated_weight(mf, end as f64);
                IntervalProb {
                    start,
                    end,
                    probability: (-to_start).exp() - (-to_end).exp(),
                }
            })
            .collect();

        let rate_now = total * self.weight_at(m);
        NextGoalForecast {
            minute: m,
            remaining_minutes: MATCH_MINUTES - m,
            hazard_home: hazards.home * self.weight_at(m),
            hazard_away: hazards.away * self.weight_at(m),
            windows,
            intervals,
            expected_minutes_to_next_goal: (rate_now > 0.0).then(|| 1.0 / rate_now),
            remaining_expected_goals: ExpectedGoals {
                home: hazards.home * remaining,
                away: hazards.away * remaining,
            },
        }
    }
}

impl OutcomeModel for CoxSurvivalModel {
    fn kind(&self) -> ModelKind {
        ModelKind::CoxSurvival
    }

    fn predict(&self, ctx: &MatchContext) -> Result<ModelResult> {
        let xg = ctx.expected_goals()?;
        let hazards = self.hazards(ctx)?;
        let next = self.next_goal(hazards, ctx.minute());
        let score = ctx.score();
        let rem = next.remaining_expected_goals;

        let probs = outcome_probs_poisson(
            score.home.into(),
            score.away.into(),
            rem.home,
            rem.away,
            self.max_goals,
        )?;

        let remaining = ScoreMatrix::independent(
            &poisson_pmf(rem.home, self.max_goals),
            &poisson_pmf(rem.away, self.max_goals),
        )
        .normalized()?
        .most_likely_score();

        let mut out = ModelResult::from_probs(self.kind().as_str(), probs)?;
        out.expected_goals = Some(xg);
        out.most_likely_score = Some(Score::new(
            score.home.saturating_add(remaining.home),
            score.away.saturating_add(remaining.away),
        ));
        out.hazard = Some(next.hazard_home + next.hazard_away);
        out.next_goal = Some(next);
        Ok(out)
    }
}
