//! The closed set of statistical models, their common result shape and the factory that turns
//! configuration into ready-to-run instances.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::bivariate_poisson::BivariatePoissonModel;
use crate::config::EngineConfig;
use crate::dixon_coles::DixonColesModel;
use crate::elo::EloModel;
use crate::error::{ModelError, NotReadyReason, Result};
use crate::inputs::{ExpectedGoals, MatchContext, Score};
use crate::negative_binomial::NegativeBinomialModel;
use crate::poisson::PoissonModel;
use crate::probs::Prob3;
use crate::scoregrid::{GridSpec, ScoreMatrix, ScoreProb, TotalsDistribution};
use crate::skellam::{GoalDifferenceSummary, SkellamModel};
use crate::survival::{CoxSurvivalModel, NextGoalForecast};
use crate::zero_inflated::ZeroInflatedModel;

const TOP_SCORES: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    Poisson,
    DixonColes,
    BivariatePoisson,
    ZeroInflatedPoisson,
    Skellam,
    Elo,
    NegativeBinomial,
    CoxSurvival,
}

impl ModelKind {
    pub const ALL: [ModelKind; 8] = [
        ModelKind::Poisson,
        ModelKind::DixonColes,
        ModelKind::BivariatePoisson,
        ModelKind::ZeroInflatedPoisson,
        ModelKind::Skellam,
        ModelKind::Elo,
        ModelKind::NegativeBinomial,
        ModelKind::CoxSurvival,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ModelKind::Poisson => "poisson",
            ModelKind::DixonColes => "dixon_coles",
            ModelKind::BivariatePoisson => "bivariate_poisson",
            ModelKind::ZeroInflatedPoisson => "zero_inflated_poisson",
            ModelKind::Skellam => "skellam",
            ModelKind::Elo => "elo",
            ModelKind::NegativeBinomial => "negative_binomial",
            ModelKind::CoxSurvival => "cox_survival",
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let key = s.trim().to_ascii_lowercase();
        ModelKind::ALL
            .into_iter()
            .find(|k| k.as_str() == key)
            .ok_or_else(|| format!("unknown model {s:?}"))
    }
}

/// One model's output for one request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelResult {
    pub model_id: String,
    pub outcome_probabilities: Prob3,
    pub confidence: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_goals: Option<ExpectedGoals>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub most_likely_score: Option<Score>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub top_scores: Vec<ScoreProb>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scoreline_matrix: Option<ScoreMatrix>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub totals: Option<TotalsDistribution>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub goal_difference: Option<GoalDifferenceSummary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hazard: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_goal: Option<NextGoalForecast>,
}

impl ModelResult {
    /// Result carrying only 1X2 probabilities. The triple is renormalised; anything that cannot
    /// be (NaN, negative, all zero) is rejected as invalid input.
    pub fn from_probs(model_id: impl Into<String>, probs: Prob3) -> Result<Self> {
        let probs = probs.normalized()?;
        Ok(Self {
            model_id: model_id.into(),
            outcome_probabilities: probs,
            confidence: probs.max(),
            expected_goals: None,
            most_likely_score: None,
            top_scores: Vec::new(),
            scoreline_matrix: None,
            totals: None,
            goal_difference: None,
            hazard: None,
            next_goal: None,
        })
    }

    pub fn from_score_matrix(
        kind: ModelKind,
        xg: ExpectedGoals,
        matrix: ScoreMatrix,
        totals_lines: &[f64],
    ) -> Result<Self> {
        let mut out = Self::from_probs(kind.as_str(), matrix.outcome_probs())?;
        out.expected_goals = Some(xg);
        out.most_likely_score = Some(matrix.most_likely_score());
        out.top_scores = matrix.top_scores(TOP_SCORES);
        out.totals = Some(matrix.totals(totals_lines));
        out.scoreline_matrix = Some(matrix);
        Ok(out)
    }
}

/// Models that produce a joint home/away goal matrix.
pub trait ScoreModel {
    fn kind(&self) -> ModelKind;

    fn grid(&self) -> &GridSpec;

    /// Normalised joint PMF for the given rates.
    fn score_matrix(&self, xg: ExpectedGoals) -> Result<ScoreMatrix>;
}

/// Anything that turns a match context into a result.
pub trait OutcomeModel {
    fn kind(&self) -> ModelKind;

    fn predict(&self, ctx: &MatchContext) -> Result<ModelResult>;
}

pub fn predict_from_scores<M: ScoreModel + ?Sized>(
    model: &M,
    ctx: &MatchContext,
) -> Result<ModelResult> {
    let xg = ctx.expected_goals()?;
    let matrix = model.score_matrix(xg)?;
    ModelResult::from_score_matrix(model.kind(), xg, matrix, &model.grid().totals_lines)
}

/// A ready-to-run statistical model.
#[derive(Debug, Clone)]
pub enum Model {
    Poisson(PoissonModel),
    DixonColes(DixonColesModel),
    BivariatePoisson(BivariatePoissonModel),
    ZeroInflated(ZeroInflatedModel),
    Skellam(SkellamModel),
    Elo(EloModel),
    NegativeBinomial(NegativeBinomialModel),
    CoxSurvival(CoxSurvivalModel),
}

impl Model {
    pub fn kind(&self) -> ModelKind {
        self.as_outcome_model().kind()
    }

    pub fn predict(&self, ctx: &MatchContext) -> Result<ModelResult> {
        self.as_outcome_model().predict(ctx)
    }

    fn as_outcome_model(&self) -> &dyn OutcomeModel {
        match self {
            Model::Poisson(m) => m,
            Model::DixonColes(m) => m,
            Model::BivariatePoisson(m) => m,
            Model::ZeroInflated(m) => m,
            Model::Skellam(m) => m,
            Model::Elo(m) => m,
            Model::NegativeBinomial(m) => m,
            Model::CoxSurvival(m) => m,
        }
    }
}

/// Builds a model from configuration. Missing fitted constants come back as `NotReady` so the
/// caller can record a skip instead of failing the request.
pub fn build(kind: ModelKind, cfg: &EngineConfig) -> Result<Model> {
    let grid = cfg.grid();
    let model = match kind {
        ModelKind::Poisson => Model::Poisson(PoissonModel::new(grid)),
        ModelKind::DixonColes => {
            let rho = fitted(kind, cfg.dixon_coles_rho)?;
            Model::DixonColes(DixonColesModel::new(grid, rho).map_err(|e| unfit(kind, e))?)
        }
        ModelKind::BivariatePoisson => {
            let cov = fitted(kind, cfg.bivariate_covariance)?;
            Model::BivariatePoisson(
                BivariatePoissonModel::new(grid, cov).map_err(|e| unfit(kind, e))?,
            )
        }
        ModelKind::ZeroInflatedPoisson => {
            let pi = fitted(kind, cfg.zero_inflation)?;
            Model::ZeroInflated(ZeroInflatedModel::new(grid, pi).map_err(|e| unfit(kind, e))?)
        }
        ModelKind::Skellam => Model::Skellam(SkellamModel::new(
            cfg.skellam_max_diff,
            cfg.handicap_lines.clone(),
        )),
        ModelKind::Elo => Model::Elo(EloModel::new(cfg.elo).map_err(|e| unfit(kind, e))?),
        ModelKind::NegativeBinomial => {
            let alpha = fitted(kind, cfg.nb_dispersion)?;
            Model::NegativeBinomial(
                NegativeBinomialModel::new(
                    alpha,
                    cfg.max_goals,
                    cfg.max_total_goals,
                    grid.totals_lines,
                )
                .map_err(|e| unfit(kind, e))?,
            )
        }
        ModelKind::CoxSurvival => {
            let coefficients = fitted(kind, cfg.cox)?;
            Model::CoxSurvival(
                CoxSurvivalModel::new(
                    coefficients,
                    cfg.period_weights,
                    cfg.next_goal_windows.clone(),
                    cfg.max_goals,
                )
                .map_err(|e| unfit(kind, e))?,
            )
        }
    };
    Ok(model)
}

fn fitted<T>(kind: ModelKind, value: Option<T>) -> Result<T> {
    value.ok_or_else(|| ModelError::not_ready(kind.as_str(), NotReadyReason::NotTrained))
}

fn unfit(kind: ModelKind, err: String) -> ModelError {
    ModelError::not_ready(kind.as_str(), NotReadyReason::InvalidParameters(err))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_round_trip_through_names() {
        for kind in ModelKind::ALL {
            assert_eq!(kind.as_str().parse::<ModelKind>().unwrap(), kind);
        }
        assert!("glicko".parse::<ModelKind>().is_err());
    }

    #[test]
    fn missing_dispersion_is_not_trained() {
        let cfg = EngineConfig {
            nb_dispersion: None,
            ..EngineConfig::default()
        };
        let err = build(ModelKind::NegativeBinomial, &cfg).unwrap_err();
        assert_eq!(err.skip_reason(), "not_trained");
    }

    #[test]
    fn out_of_domain_constant_is_invalid_parameters() {
        let cfg = EngineConfig {
            zero_inflation: Some(1.2),
            ..EngineConfig::default()
        };
        let err = build(ModelKind::ZeroInflatedPoisson, &cfg).unwrap_err();
        assert!(err.skip_reason().starts_with("invalid_parameters"));
    }

    #[test]
    fn default_config_builds_parameter_free_models() {
        let cfg = EngineConfig::default();
        for kind in [ModelKind::Poisson, ModelKind::Skellam, ModelKind::Elo] {
            assert_eq!(build(kind, &cfg).unwrap().kind(), kind);
        }
    }
}
