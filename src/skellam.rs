use serde::{Deserialize, Serialize};

use crate::error::{ModelError, Result, require_positive};
use crate::inputs::MatchContext;
use crate::models::{ModelKind, ModelResult, OutcomeModel};
use crate::probs::Prob3;
use crate::special::ln_bessel_i;

// Support half-width in standard deviations beyond the mean difference.
const SUPPORT_SIGMAS: f64 = 12.0;

/// Goal-difference model: D = home − away ~ Skellam(λ_home, λ_away).
#[derive(Debug, Clone)]
pub struct SkellamModel {
    max_diff: i32,
    handicap_lines: Vec<i32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HandicapProb {
    /// Goals added to the home side.
    pub handicap: i32,
    pub home_covers: f64,
    pub push: f64,
    pub away_covers: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoalDifferenceSummary {
    pub expected: f64,
    pub most_likely: i32,
    pub handicaps: Vec<HandicapProb>,
}

/// Skellam PMF over a finite support wide enough that the truncated tails are negligible.
#[derive(Debug, Clone)]
pub struct GoalDifferenceDistribution {
    min_diff: i32,
    pmf: Vec<f64>,
    mean: f64,
}

/// P(D = k) = exp(−(λ1+λ2)) (λ1/λ2)^{k/2} I_|k|(2√(λ1λ2)), evaluated in log space.
pub fn skellam_pmf(k: i32, lambda_home: f64, lambda_away: f64) -> f64 {
    let x = 2.0 * (lambda_home * lambda_away).sqrt();
    let ln_p = -(lambda_home + lambda_away)
        + 0.5 * k as f64 * (lambda_home.ln() - lambda_away.ln())
        + ln_bessel_i(k, x);
    ln_p.exp()
}

impl GoalDifferenceDistribution {
    pub fn new(lambda_home: f64, lambda_away: f64, max_diff: i32) -> Result<Self> {
        let lambda_home = require_positive("lambda_home", lambda_home)?;
        let lambda_away = require_positive("lambda_away", lambda_away)?;

        let mean = lambda_home - lambda_away;
        let spread = mean.abs() + SUPPORT_SIGMAS * (lambda_home + lambda_away).sqrt();
        let width = max_diff.max(1).max(spread.ceil() as i32);

        let mut pmf: Vec<f64> = (-width..=width)
            .map(|k| skellam_pmf(k, lambda_home, lambda_away))
            .collect();
        let sum: f64 = pmf.iter().sum();
        if !(sum.is_finite() && sum > 0.0) {
            return Err(ModelError::invalid(format!(
                "goal difference distribution underflowed (sum = {sum:e})"
            )));
        }
        for p in &mut pmf {
            *p /= sum;
        }

        Ok(Self {
            min_diff: -width,
            pmf,
            mean,
        })
    }

    pub fn support(&self) -> std::ops::RangeInclusive<i32> {
        self.min_diff..=self.min_diff + self.pmf.len() as i32 - 1
    }

    /// Offset of `k` into the PMF; widened so any `i32` line is safe.
    fn offset(&self, k: i64) -> i64 {
        k - i64::from(self.min_diff)
    }

    fn equals_at(&self, k: i64) -> f64 {
        usize::try_from(self.offset(k))
            .ok()
            .and_then(|i| self.pmf.get(i))
            .copied()
            .unwrap_or(0.0)
    }

    fn exceeds_at(&self, k: i64) -> f64 {
        let start = (self.offset(k) + 1).clamp(0, self.pmf.len() as i64) as usize;
        self.pmf[start..].iter().sum::<f64>().clamp(0.0, 1.0)
    }

    fn below_at(&self, k: i64) -> f64 {
        let end = self.offset(k).clamp(0, self.pmf.len() as i64) as usize;
        self.pmf[..end].iter().sum::<f64>().clamp(0.0, 1.0)
    }

    pub fn prob_equals(&self, k: i32) -> f64 {
        self.equals_at(k.into())
    }

    /// P(D > k) for any integer k.
    pub fn prob_exceeds(&self, k: i32) -> f64 {
        self.exceeds_at(k.into())
    }

    pub fn prob_below(&self, k: i32) -> f64 {
        self.below_at(k.into())
    }

    pub fn outcome_probs(&self) -> Prob3 {
        Prob3::new(self.prob_exceeds(0), self.prob_equals(0), self.prob_below(0))
    }

    pub fn mean(&self) -> f64 {
        self.mean
    }

    pub fn most_likely(&self) -> i32 {
        self.pmf
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| self.min_diff + i as i32)
            .unwrap_or(0)
    }

    pub fn handicap(&self, handicap: i32) -> HandicapProb {
        let line = -i64::from(handicap);
        HandicapProb {
            handicap,
            home_covers: self.exceeds_at(line),
            push: self.equals_at(line),
            away_covers: self.below_at(line),
        }
    }
}

impl SkellamModel {
    pub fn new(max_diff: i32, handicap_lines: Vec<i32>) -> Self {
        Self {
            max_diff,
            handicap_lines,
        }
    }

    pub fn distribution(&self, ctx: &MatchContext) -> Result<GoalDifferenceDistribution> {
        let xg = ctx.expected_goals()?;
        GoalDifferenceDistribution::new(xg.home, xg.away, self.max_diff)
    }
}

impl OutcomeModel for SkellamModel {
    fn kind(&self) -> ModelKind {
        ModelKind::Skellam
    }

    fn predict(&self, ctx: &MatchContext) -> Result<ModelResult> {
        let xg = ctx.expected_goals()?;
        let dist = GoalDifferenceDistribution::new(xg.home, xg.away, self.max_diff)?;

        let mut out = ModelResult::from_probs(ModelKind::Skellam.as_str(), dist.outcome_probs())?;
        out.expected_goals = Some(xg);
        out.goal_difference = Some(GoalDifferenceSummary {
            expected: dist.mean(),
            most_likely: dist.most_likely(),
            handicaps: self
                .handicap_lines
                .iter()
                .map(|h| dist.handicap(*h))
                .collect(),
        });
        Ok(out)
    }
}
