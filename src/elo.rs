use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::fixtures::{FixtureResult, rated_in_order};
use crate::inputs::MatchContext;
use crate::models::{ModelKind, ModelResult, OutcomeModel};
use crate::probs::{Prob3, classify_outcome};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EloConfig {
    pub k_factor: f64,
    /// Rating points added to the home side.
    pub home_bonus: f64,
    pub initial_rating: f64,
    pub base_draw: f64,
    /// Draw probability lost per rating point of (bonus-adjusted) difference.
    pub draw_slope: f64,
    pub min_draw: f64,
    pub max_draw: f64,
    pub goal_margin_scaling: bool,
}

impl Default for EloConfig {
    fn default() -> Self {
        Self {
            k_factor: 20.0,
            home_bonus: 60.0,
            initial_rating: 1500.0,
            base_draw: 0.30,
            draw_slope: 0.001,
            min_draw: 0.15,
            max_draw: 0.30,
            goal_margin_scaling: false,
        }
    }
}

impl EloConfig {
    pub fn validate(&self) -> std::result::Result<(), String> {
        let all_finite = [
            self.k_factor,
            self.home_bonus,
            self.initial_rating,
            self.base_draw,
            self.draw_slope,
            self.min_draw,
            self.max_draw,
        ]
        .iter()
        .all(|v| v.is_finite());
        if !all_finite {
            return Err("elo parameters must be finite".to_string());
        }
        if self.k_factor <= 0.0 {
            return Err(format!("k_factor must be > 0, got {}", self.k_factor));
        }
        if self.draw_slope < 0.0 {
            return Err(format!("draw_slope must be >= 0, got {}", self.draw_slope));
        }
        if !(0.0 <= self.min_draw && self.min_draw <= self.max_draw && self.max_draw < 1.0) {
            return Err(format!(
                "draw bounds must satisfy 0 <= min <= max < 1, got [{}, {}]",
                self.min_draw, self.max_draw
            ));
        }
        Ok(())
    }

    pub fn draw_probability(&self, rating_diff: f64) -> f64 {
        (self.base_draw - self.draw_slope * rating_diff.abs()).clamp(self.min_draw, self.max_draw)
    }
}

pub fn expected_score(r_a: f64, r_b: f64) -> f64 {
    1.0 / (1.0 + 10.0_f64.powf(-(r_a - r_b) / 400.0))
}

/// Rating-based 1X2 model.
#[derive(Debug, Clone)]
pub struct EloModel {
    cfg: EloConfig,
}

impl EloModel {
    pub fn new(cfg: EloConfig) -> std::result::Result<Self, String> {
        cfg.validate()?;
        Ok(Self { cfg })
    }

    pub fn outcome_probs(&self, home: f64, away: f64) -> Prob3 {
        let adjusted_home = home + self.cfg.home_bonus;
        let expected_home = expected_score(adjusted_home, away);
        let draw = self.cfg.draw_probability(adjusted_home - away);
        Prob3::new(
            expected_home * (1.0 - draw),
            draw,
            (1.0 - expected_home) * (1.0 - draw),
        )
    }
}

impl OutcomeModel for EloModel {
    fn kind(&self) -> ModelKind {
        ModelKind::Elo
    }

    fn predict(&self, ctx: &MatchContext) -> Result<ModelResult> {
        let (home, away) = ctx.ratings()?;
        ModelResult::from_probs(self.kind().as_str(), self.outcome_probs(home, away))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RatingUpdate {
    pub home: f64,
    pub away: f64,
    /// Points moved from away to home (negative when home lost ground).
    pub delta: f64,
}

/// One completed match: R' = R + K·m·(S − E), with the same delta taken from the opponent.
pub fn update_ratings(
    cfg: &EloConfig,
    home: f64,
    away: f64,
    home_goals: u8,
    away_goals: u8,
) -> RatingUpdate {
    let expected_home = expected_score(home + cfg.home_bonus, away);
    let actual_home = classify_outcome(home_goals.into(), away_goals.into()).home_score();

    let multiplier = if cfg.goal_margin_scaling {
        let margin = (i32::from(home_goals) - i32::from(away_goals)).unsigned_abs().max(1);
        (margin as f64 + 1.0).ln()
    } else {
        1.0
    };

    let delta = cfg.k_factor * multiplier * (actual_home - expected_home);
    RatingUpdate {
        home: home + delta,
        away: away - delta,
        delta,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RatingKey {
    pub team_id: u32,
    pub league_id: u32,
    pub season: u16,
}

/// Read-only rating lookup injected per request.
pub trait RatingStore {
    fn rating(&self, key: &RatingKey) -> Option<f64>;

    fn rating_or(&self, key: &RatingKey, initial: f64) -> f64 {
        self.rating(key).unwrap_or(initial)
    }
}

impl RatingStore for HashMap<RatingKey, f64> {
    fn rating(&self, key: &RatingKey) -> Option<f64> {
        self.get(key).copied()
    }
}

/// Rebuilds the rating table from scratch by folding rated fixtures in kickoff order.
pub fn replay_ratings(fixtures: &[FixtureResult], cfg: &EloConfig) -> HashMap<RatingKey, f64> {
    let mut table: HashMap<RatingKey, f64> = HashMap::new();
    for m in rated_in_order(fixtures) {
        let home_key = RatingKey {
            team_id: m.home_id,
            league_id: m.league_id,
            season: m.season,
        };
        let away_key = RatingKey {
            team_id: m.away_id,
            ..home_key
        };
        let home = table.rating_or(&home_key, cfg.initial_rating);
        let away = table.rating_or(&away_key, cfg.initial_rating);

        let up = update_ratings(cfg, home, away, m.home_goals, m.away_goals);
        table.insert(home_key, up.home);
        table.insert(away_key, up.away);
    }
    table
}

/// Rating lookup for a match between two teams, defaulting unseen teams to the initial rating.
pub fn match_ratings<S: RatingStore + ?Sized>(
    store: &S,
    cfg: &EloConfig,
    league_id: u32,
    season: u16,
    home_id: u32,
    away_id: u32,
) -> (f64, f64) {
    let key = |team_id| RatingKey {
        team_id,
        league_id,
        season,
    };
    (
        store.rating_or(&key(home_id), cfg.initial_rating),
        store.rating_or(&key(away_id), cfg.initial_rating),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_ratings_without_bonus_are_even() {
        assert_eq!(expected_score(1500.0, 1500.0), 0.5);
        let cfg = EloConfig {
            home_bonus: 0.0,
            ..EloConfig::default()
        };
        let p = EloModel::new(cfg).unwrap().outcome_probs(1500.0, 1500.0);
        assert!((p.home - p.away).abs() < 1e-15);
        assert!((p.draw - 0.30).abs() < 1e-15);
    }

    #[test]
    fn bonus_of_fifty_on_a_hundred_point_edge() {
        let e = expected_score(1600.0 + 50.0, 1500.0);
        assert!((e - 0.703_385_003_471_828_6).abs() < 1e-12);
    }

    #[test]
    fn draw_probability_is_clamped() {
        let cfg = EloConfig::default();
        assert_eq!(cfg.draw_probability(0.0), 0.30);
        assert_eq!(cfg.draw_probability(1000.0), 0.15);
        let p = EloModel::new(cfg).unwrap().outcome_probs(1900.0, 1400.0);
        assert!((p.sum() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn winner_gains_exactly_what_loser_drops() {
        for scaling in [false, true] {
            let cfg = EloConfig {
                goal_margin_scaling: scaling,
                ..EloConfig::default()
            };
            let up = update_ratings(&cfg, 1500.0, 1550.0, 3, 0);
            assert!(up.home > 1500.0);
            assert!(((up.home - 1500.0) + (up.away - 1550.0)).abs() < 1e-12);
        }
    }

    #[test]
    fn margin_scaling_amplifies_big_wins() {
        let plain = update_ratings(&EloConfig::default(), 1500.0, 1500.0, 4, 0);
        let cfg = EloConfig {
            goal_margin_scaling: true,
            ..EloConfig::default()
        };
        let scaled = update_ratings(&cfg, 1500.0, 1500.0, 4, 0);
        assert!(scaled.delta > plain.delta);
    }

    #[test]
    fn invalid_config_is_rejected() {
        let cfg = EloConfig {
            min_draw: 0.4,
            ..EloConfig::default()
        };
        assert!(EloModel::new(cfg).is_err());
        let cfg = EloConfig {
            k_factor: f64::NAN,
            ..EloConfig::default()
        };
        assert!(EloModel::new(cfg).is_err());
    }
}
