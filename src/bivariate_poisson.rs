use tracing::debug;

use crate::error::{Result, require_positive};
use crate::inputs::{ExpectedGoals, MatchContext};
use crate::models::{ModelKind, ModelResult, OutcomeModel, ScoreModel, predict_from_scores};
use crate::poisson::poisson_pmf;
use crate::scoregrid::{GridSpec, ScoreMatrix};

// Shared component may take at most this share of the weaker side's rate.
const COVARIANCE_CAP: f64 = 0.9;

/// Bivariate Poisson: home = W1 + W3, away = W2 + W3 with a shared Poisson(λ3) component, so
/// marginals keep their means while goals become positively correlated.
#[derive(Debug, Clone)]
pub struct BivariatePoissonModel {
    grid: GridSpec,
    covariance: f64,
}

impl BivariatePoissonModel {
    pub fn new(grid: GridSpec, covariance: f64) -> std::result::Result<Self, String> {
        if !covariance.is_finite() || covariance < 0.0 {
            return Err(format!("covariance must be finite and >= 0, got {covariance}"));
        }
        Ok(Self { grid, covariance })
    }

    /// λ3 actually used for these rates: the configured covariance, capped below min(λ_home,
    /// λ_away) so both residual rates stay positive.
    pub fn effective_covariance(&self, xg: ExpectedGoals) -> f64 {
        let cap = COVARIANCE_CAP * xg.home.min(xg.away);
        if self.covariance > cap {
            debug!(
                configured = self.covariance,
                cap, "bivariate covariance capped for low-scoring match"
            );
            cap
        } else {
            self.covariance
        }
    }
}

impl ScoreModel for BivariatePoissonModel {
    fn kind(&self) -> ModelKind {
        ModelKind::BivariatePoisson
    }

    fn grid(&self) -> &GridSpec {
        &self.grid
    }

    fn score_matrix(&self, xg: ExpectedGoals) -> Result<ScoreMatrix> {
        require_positive("lambda_home", xg.home)?;
        require_positive("lambda_away", xg.away)?;
        let lambda3 = self.effective_covariance(xg);
        let lambda1 = xg.home - lambda3;
        let lambda2 = xg.away - lambda3;

        let n = self.grid.max_goals;
        // Each factor already carries its exp(-λ), so the product carries exp(-(λ1+λ2+λ3)).
        let p1 = poisson_pmf(lambda1, n);
        let p2 = poisson_pmf(lambda2, n);
        let p3 = poisson_pmf(lambda3, n);

        ScoreMatrix::from_fn(n, |h, a| {
            (0..=h.min(a))
                .map(|k| p1[h - k] * p2[a - k] * p3[k])
                .sum()
        })
        .normalized()
    }
}

impl OutcomeModel for BivariatePoissonModel {
    fn kind(&self) -> ModelKind {
        ModelKind::BivariatePoisson
    }

    fn predict(&self, ctx: &MatchContext) -> Result<ModelResult> {
        predict_from_scores(self, ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::poisson::independent_matrix;

    fn xg() -> ExpectedGoals {
        ExpectedGoals {
            home: 1.485,
            away: 1.2,
        }
    }

    #[test]
    fn zero_covariance_reduces_to_independent_poisson() {
        let bp = BivariatePoissonModel::new(GridSpec::default(), 0.0).unwrap();
        let m = bp.score_matrix(xg()).unwrap();
        let base = independent_matrix(xg(), 10).unwrap();
        for h in 0..=10 {
            for a in 0..=10 {
                assert!((m.get(h, a) - base.get(h, a)).abs() < 1e-14);
            }
        }
    }

    #[test]
    fn covariance_keeps_marginal_means() {
        let bp = BivariatePoissonModel::new(GridSpec::default(), 0.15).unwrap();
        let m = bp.score_matrix(xg()).unwrap();
        let means = m.expected_goals();
        assert!((means.home - 1.485).abs() < 1e-4);
        assert!((means.away - 1.2).abs() < 1e-4);
        assert!((m.total() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn covariance_is_capped_below_weaker_rate() {
        let bp = BivariatePoissonModel::new(GridSpec::default(), 0.5).unwrap();
        let low = ExpectedGoals {
            home: 1.0,
            away: 0.2,
        };
        let c = bp.effective_covariance(low);
        assert!(c < 0.2);
        assert!(bp.score_matrix(low).is_ok());
    }

    #[test]
    fn negative_covariance_is_rejected() {
        assert!(BivariatePoissonModel::new(GridSpec::default(), -0.1).is_err());
    }
}
