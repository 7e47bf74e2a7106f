use crate::error::Result;
use crate::inputs::{ExpectedGoals, MatchContext};
use crate::models::{ModelKind, ModelResult, OutcomeModel, ScoreModel, predict_from_scores};
use crate::poisson::independent_matrix;
use crate::scoregrid::{GridSpec, ScoreMatrix};

/// Poisson with the Dixon-Coles low-score dependence correction.
#[derive(Debug, Clone)]
pub struct DixonColesModel {
    grid: GridSpec,
    // Typically negative, which lifts 0-0 and 1-1.
    rho: f64,
}

impl DixonColesModel {
    pub fn new(grid: GridSpec, rho: f64) -> std::result::Result<Self, String> {
        if !rho.is_finite() {
            return Err(format!("rho must be finite, got {rho}"));
        }
        Ok(Self { grid, rho })
    }

    pub fn rho(&self) -> f64 {
        self.rho
    }
}

impl ScoreModel for DixonColesModel {
    fn kind(&self) -> ModelKind {
        ModelKind::DixonColes
    }

    fn grid(&self) -> &GridSpec {
        &self.grid
    }

    fn score_matrix(&self, xg: ExpectedGoals) -> Result<ScoreMatrix> {
        let mut matrix = independent_matrix(xg, self.grid.max_goals)?;
        // tau can turn negative for extreme rho/lambda; such cells get no mass.
        matrix.map_cells(|h, a, p| (p * dc_tau(h, a, xg.home, xg.away, self.rho)).max(0.0));
        matrix.normalized()
    }
}

impl OutcomeModel for DixonColesModel {
    fn kind(&self) -> ModelKind {
        ModelKind::DixonColes
    }

    fn predict(&self, ctx: &MatchContext) -> Result<ModelResult> {
        predict_from_scores(self, ctx)
    }
}

pub fn dc_tau(
    home_goals: usize,
    away_goals: usize,
    lambda_home: f64,
    lambda_away: f64,
    rho: f64,
) -> f64 {
    match (home_goals, away_goals) {
        (0, 0) => 1.0 - lambda_home * lambda_away * rho,
        (0, 1) => 1.0 + lambda_home * rho,
        (1, 0) => 1.0 + lambda_away * rho,
        (1, 1) => 1.0 - rho,
        _ => 1.0,
    }
}
