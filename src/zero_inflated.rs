use crate::error::Result;
use crate::inputs::{ExpectedGoals, MatchContext};
use crate::models::{ModelKind, ModelResult, OutcomeModel, ScoreModel, predict_from_scores};
use crate::poisson::independent_matrix;
use crate::scoregrid::{GridSpec, ScoreMatrix};

/// Independent Poisson mixed with a point mass on 0-0.
///
/// With probability π the match is a structural goalless draw; otherwise goals follow the
/// Poisson grid. Every other cell is scaled by (1 − π).
#[derive(Debug, Clone)]
pub struct ZeroInflatedModel {
    grid: GridSpec,
    pi: f64,
}

impl ZeroInflatedModel {
    pub fn new(grid: GridSpec, pi: f64) -> std::result::Result<Self, String> {
        if !(pi.is_finite() && (0.0..1.0).contains(&pi)) {
            return Err(format!("zero inflation must lie in [0, 1), got {pi}"));
        }
        Ok(Self { grid, pi })
    }
}

impl ScoreModel for ZeroInflatedModel {
    fn kind(&self) -> ModelKind {
        ModelKind::ZeroInflatedPoisson
    }

    fn grid(&self) -> &GridSpec {
        &self.grid
    }

    fn score_matrix(&self, xg: ExpectedGoals) -> Result<ScoreMatrix> {
        let mut matrix = independent_matrix(xg, self.grid.max_goals)?;
        let pi = self.pi;
        matrix.map_cells(|h, a, p| {
            if h == 0 && a == 0 {
                pi + (1.0 - pi) * p
            } else {
                (1.0 - pi) * p
            }
        });
        matrix.normalized()
    }
}

impl OutcomeModel for ZeroInflatedModel {
    fn kind(&self) -> ModelKind {
        ModelKind::ZeroInflatedPoisson
    }

    fn predict(&self, ctx: &MatchContext) -> Result<ModelResult> {
        predict_from_scores(self, ctx)
    }
}
