use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;
use crate::error::{Result, require_finite, require_positive};

pub const MATCH_MINUTES: u32 = 90;

/// One team's strength for a single request, computed upstream from a rolling window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TeamStrength {
    pub attack: f64,
    pub defense: f64,
    pub elo_rating: f64,
    pub home_advantage: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Score {
    pub home: u8,
    pub away: u8,
}

impl Score {
    pub fn new(home: u8, away: u8) -> Self {
        Self { home, away }
    }
}

/// Everything a model sees for one match. Built once per request and copied into each model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MatchContext {
    pub home: TeamStrength,
    pub away: TeamStrength,
    pub league_average_goals: f64,
    #[serde(default)]
    pub current_minute: Option<u32>,
    #[serde(default)]
    pub current_score: Option<Score>,
}

/// Poisson rates for one match.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExpectedGoals {
    pub home: f64,
    pub away: f64,
}

impl ExpectedGoals {
    pub fn total(&self) -> f64 {
        self.home + self.away
    }
}

impl MatchContext {
    /// λ_home = home_attack·away_defense·home_advantage, λ_away = away_attack·home_defense.
    pub fn expected_goals(&self) -> Result<ExpectedGoals> {
        let home_attack = require_positive("home_attack", self.home.attack)?;
        let home_defense = require_positive("home_defense", self.home.defense)?;
        let away_attack = require_positive("away_attack", self.away.attack)?;
        let away_defense = require_positive("away_defense", self.away.defense)?;
        let advantage = require_positive("home_advantage", self.home.home_advantage)?;

        let home = require_positive("lambda_home", home_attack * away_defense * advantage)?;
        let away = require_positive("lambda_away", away_attack * home_defense)?;
        Ok(ExpectedGoals { home, away })
    }

    pub fn ratings(&self) -> Result<(f64, f64)> {
        Ok((
            require_finite("home_elo", self.home.elo_rating)?,
            require_finite("away_elo", self.away.elo_rating)?,
        ))
    }

    /// Match minute clamped into [0, 90]; kickoff when absent.
    pub fn minute(&self) -> u32 {
        self.current_minute.unwrap_or(0).min(MATCH_MINUTES)
    }

    pub fn score(&self) -> Score {
        self.current_score.unwrap_or(Score::new(0, 0))
    }
}

/// Flat request shape accepted from the enclosing service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastRequest {
    pub home_attack: f64,
    pub home_defense: f64,
    pub away_attack: f64,
    pub away_defense: f64,
    pub home_elo: f64,
    pub away_elo: f64,
    pub league_avg_goals: f64,
    #[serde(default)]
    pub current_minute: Option<u32>,
    #[serde(default)]
    pub home_advantage: Option<f64>,
    #[serde(default)]
    pub current_score: Option<Score>,
}

impl ForecastRequest {
    pub fn to_context(&self, config: &EngineConfig) -> MatchContext {
        let home_advantage = self.home_advantage.unwrap_or(config.home_advantage);
        MatchContext {
            home: TeamStrength {
                attack: self.home_attack,
                defense: self.home_defense,
                elo_rating: self.home_elo,
                home_advantage,
            },
            away: TeamStrength {
                attack: self.away_attack,
                defense: self.away_defense,
                elo_rating: self.away_elo,
                home_advantage,
            },
            league_average_goals: self.league_avg_goals,
            current_minute: self.current_minute,
            current_score: self.current_score,
        }
    }
}
