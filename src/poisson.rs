use crate::error::{Result, require_positive};
use crate::inputs::{ExpectedGoals, MatchContext};
use crate::models::{ModelKind, ModelResult, OutcomeModel, ScoreModel, predict_from_scores};
use crate::probs::Prob3;
use crate::scoregrid::{GridSpec, ScoreMatrix};

/// Independent Poisson goals for each side.
#[derive(Debug, Clone)]
pub struct PoissonModel {
    grid: GridSpec,
}

impl PoissonModel {
    pub fn new(grid: GridSpec) -> Self {
        Self { grid }
    }
}

impl ScoreModel for PoissonModel {
    fn kind(&self) -> ModelKind {
        ModelKind::Poisson
    }

    fn grid(&self) -> &GridSpec {
        &self.grid
    }

    fn score_matrix(&self, xg: ExpectedGoals) -> Result<ScoreMatrix> {
        independent_matrix(xg, self.grid.max_goals)
    }
}

impl OutcomeModel for PoissonModel {
    fn kind(&self) -> ModelKind {
        ModelKind::Poisson
    }

    fn predict(&self, ctx: &MatchContext) -> Result<ModelResult> {
        predict_from_scores(self, ctx)
    }
}

/// Normalised outer product of the two Poisson marginals. Shared by the models that adjust it.
pub fn independent_matrix(xg: ExpectedGoals, max_goals: usize) -> Result<ScoreMatrix> {
    let lambda_home = require_positive("lambda_home", xg.home)?;
    let lambda_away = require_positive("lambda_away", xg.away)?;
    let pmf_h = poisson_pmf(lambda_home, max_goals);
    let pmf_a = poisson_pmf(lambda_away, max_goals);
    ScoreMatrix::independent(&pmf_h, &pmf_a).normalized()
}

/// P(X = k) for k in 0..=max_k, built by the ratio recurrence (no tail mass folded in).
pub fn poisson_pmf(lambda: f64, max_k: usize) -> Vec<f64> {
    let mut out = vec![0.0; max_k + 1];
    let lambda = lambda.max(0.0);

    out[0] = (-lambda).exp();
    for k in 1..=max_k {
        out[k] = out[k - 1] * lambda / k as f64;
    }
    out
}

/// Final-result probabilities given goals already scored and the expected goals still to come.
pub fn outcome_probs_poisson(
    goals_home: u32,
    goals_away: u32,
    lambda_home_rem: f64,
    lambda_away_rem: f64,
    max_goals: usize,
) -> Result<Prob3> {
    let pmf_h = poisson_pmf(lambda_home_rem, max_goals);
    let pmf_a = poisson_pmf(lambda_away_rem, max_goals);

    let mut p_home = 0.0;
    let mut p_draw = 0.0;
    let mut p_away = 0.0;

    for (i, p_i) in pmf_h.iter().enumerate() {
        for (j, p_j) in pmf_a.iter().enumerate() {
            let p = p_i * p_j;
            let fh = goals_home + i as u32;
            let fa = goals_away + j as u32;
            if fh > fa {
                p_home += p;
            } else if fh < fa {
                p_away += p;
            } else {
                p_draw += p;
            }
        }
    }

    Prob3::new(p_home, p_draw, p_away).normalized()
}
