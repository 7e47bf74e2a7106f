use crate::error::{Result, require_positive};
use crate::inputs::MatchContext;
use crate::models::{ModelKind, ModelResult, OutcomeModel};
use crate::scoregrid::{ScoreMatrix, TotalsDistribution, totals_from_pmf};

/// Negative binomial (NB2) totals: mean μ, variance μ + αμ².
#[derive(Debug, Clone)]
pub struct NegativeBinomialModel {
    alpha: f64,
    max_goals: usize,
    max_total_goals: usize,
    totals_lines: Vec<f64>,
}

impl NegativeBinomialModel {
    pub fn new(
        alpha: f64,
        max_goals: usize,
        max_total_goals: usize,
        totals_lines: Vec<f64>,
    ) -> std::result::Result<Self, String> {
        if !(alpha.is_finite() && alpha > 0.0) {
            return Err(format!("dispersion must be finite and > 0, got {alpha}"));
        }
        Ok(Self {
            alpha,
            max_goals,
            max_total_goals,
            totals_lines,
        })
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    /// Distribution of total goals with mean `mean`. The PMF is not renormalised, so the
    /// over/under lines stay exact whatever the cut-off.
    pub fn totals(&self, mean: f64) -> Result<TotalsDistribution> {
        let mean = require_positive("mean_total", mean)?;
        let pmf = nb_pmf(mean, self.alpha, self.max_total_goals);
        let mut out = totals_from_pmf(&pmf, &self.totals_lines);
        out.expected_total = mean;
        out.variance = mean + self.alpha * mean * mean;
        Ok(out)
    }
}

impl OutcomeModel for NegativeBinomialModel {
    fn kind(&self) -> ModelKind {
        ModelKind::NegativeBinomial
    }

    fn predict(&self, ctx: &MatchContext) -> Result<ModelResult> {
        let xg = ctx.expected_goals()?;
        let totals = self.totals(xg.total())?;

        let home = nb_pmf(xg.home, self.alpha, self.max_goals);
        let away = nb_pmf(xg.away, self.alpha, self.max_goals);
        let matrix = ScoreMatrix::independent(&home, &away).normalized()?;

        let mut out = ModelResult::from_probs(self.kind().as_str(), matrix.outcome_probs())?;
        out.expected_goals = Some(xg);
        out.most_likely_score = Some(matrix.most_likely_score());
        out.totals = Some(totals);
        Ok(out)
    }
}

/// NB2 PMF for k in 0..=max_k with r = 1/α, p(0) = (1 + αμ)^(−1/α).
pub fn nb_pmf(mean: f64, alpha: f64, max_k: usize) -> Vec<f64> {
    let mut out = vec![0.0; max_k + 1];
    let mean = mean.max(0.0);
    let r = 1.0 / alpha;
    let q = alpha * mean / (1.0 + alpha * mean);

    out[0] = (-(alpha * mean).ln_1p() / alpha).exp();
    for k in 1..=max_k {
        let kf = k as f64;
        out[k] = out[k - 1] * (r + kf - 1.0) / kf * q;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::poisson::poisson_pmf;

    fn model(alpha: f64) -> NegativeBinomialModel {
        NegativeBinomialModel::new(alpha, 10, 15, vec![0.5, 1.5, 2.5, 3.5, 4.5]).unwrap()
    }

    #[test]
    fn moments_match_nb2() {
        let (mu, alpha) = (2.685, 0.2);
        let pmf = nb_pmf(mu, alpha, 200);
        let mean: f64 = pmf.iter().enumerate().map(|(k, p)| k as f64 * p).sum();
        let var: f64 = pmf
            .iter()
            .enumerate()
            .map(|(k, p)| (k as f64 - mean).powi(2) * p)
            .sum();
        assert!((pmf.iter().sum::<f64>() - 1.0).abs() < 1e-10);
        assert!((mean - mu).abs() < 1e-8);
        assert!((var - (mu + alpha * mu * mu)).abs() < 1e-6);
    }

    #[test]
    fn small_dispersion_recovers_poisson() {
        let nb = nb_pmf(2.5, 1e-7, 12);
        let po = poisson_pmf(2.5, 12);
        for (a, b) in nb.iter().zip(&po) {
            assert!((a - b).abs() < 1e-5);
        }
    }

    #[test]
    fn overdispersion_lifts_goalless_mass() {
        let t = model(0.3).totals(2.685).unwrap();
        assert!(t.pmf[0] > (-2.685_f64).exp());
        assert!((t.variance - (2.685 + 0.3 * 2.685 * 2.685)).abs() < 1e-12);
        for line in &t.lines {
            assert!((line.over + line.under - 1.0).abs() < 1e-12);
        }
        assert!(t.lines[0].over > t.lines[4].over);
    }

    #[test]
    fn zero_dispersion_is_rejected() {
        assert!(NegativeBinomialModel::new(0.0, 10, 15, vec![2.5]).is_err());
        assert!(NegativeBinomialModel::new(f64::NAN, 10, 15, vec![2.5]).is_err());
    }
}
