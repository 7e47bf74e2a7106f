use std::collections::HashMap;

use crate::elo::{EloConfig, RatingKey, RatingStore};
use crate::fixtures::{FixtureResult, rated_in_order};
use crate::inputs::{MatchContext, TeamStrength};

pub const DEFAULT_LEAGUE_AVERAGE: f64 = 1.4;
pub const DEFAULT_WINDOW: usize = 10;

// Matches before a league average is trusted fully.
const MIN_LEAGUE_MATCHES: f64 = 100.0;
const STRENGTH_FLOOR: f64 = 0.2;

/// Supplies the numeric inputs of a request. Implementations read history; models never do.
pub trait TeamStrengthProvider {
    /// Goals per team per match.
    fn league_average_goals(&self, league_id: u32, season: u16) -> f64;

    fn team_strength(
        &self,
        team_id: u32,
        league_id: u32,
        season: u16,
        home_advantage: f64,
    ) -> TeamStrength;

    fn match_context(
        &self,
        league_id: u32,
        season: u16,
        home_id: u32,
        away_id: u32,
        home_advantage: f64,
    ) -> MatchContext {
        MatchContext {
            home: self.team_strength(home_id, league_id, season, home_advantage),
            away: self.team_strength(away_id, league_id, season, home_advantage),
            league_average_goals: self.league_average_goals(league_id, season),
            current_minute: None,
            current_score: None,
        }
    }
}

/// Strengths from a rolling window of completed fixtures, ratings from an injected store.
#[derive(Debug, Clone)]
pub struct HistoryStrengthProvider<S = HashMap<RatingKey, f64>> {
    fixtures: Vec<FixtureResult>,
    ratings: S,
    elo: EloConfig,
    window: usize,
}

impl<S: RatingStore> HistoryStrengthProvider<S> {
    pub fn new(fixtures: Vec<FixtureResult>, ratings: S, elo: EloConfig) -> Self {
        Self {
            fixtures,
            ratings,
            elo,
            window: DEFAULT_WINDOW,
        }
    }

    pub fn with_window(mut self, window: usize) -> Self {
        self.window = window.max(1);
        self
    }

    fn in_season<'a>(
        &'a self,
        league_id: u32,
        season: u16,
    ) -> impl Iterator<Item = &'a FixtureResult> + 'a {
        rated_in_order(&self.fixtures)
            .into_iter()
            .filter(move |f| f.league_id == league_id && f.season == season)
    }
}

impl<S: RatingStore> TeamStrengthProvider for HistoryStrengthProvider<S> {
    fn league_average_goals(&self, league_id: u32, season: u16) -> f64 {
        let mut goals = 0.0;
        let mut n = 0usize;
        for f in self.in_season(league_id, season) {
            goals += f64::from(f.home_goals) + f64::from(f.away_goals);
            n += 1;
        }
        if n == 0 {
            return DEFAULT_LEAGUE_AVERAGE;
        }
        let observed = goals / (2.0 * n as f64);
        let w = (n as f64 / MIN_LEAGUE_MATCHES).clamp(0.0, 1.0);
        (1.0 - w) * DEFAULT_LEAGUE_AVERAGE + w * observed
    }

    fn team_strength(
        &self,
        team_id: u32,
        league_id: u32,
        season: u16,
        home_advantage: f64,
    ) -> TeamStrength {
        let league_avg = self.league_average_goals(league_id, season);
        let recent: Vec<(u8, u8)> = self
            .in_season(league_id, season)
            .filter_map(|f| f.goals_for_against(team_id))
            .collect();
        let recent = &recent[recent.len().saturating_sub(self.window)..];

        let (mut attack, mut defense) = (1.0, 1.0);
        if !recent.is_empty() {
            let n = recent.len() as f64;
            let scored: f64 = recent.iter().map(|(gf, _)| f64::from(*gf)).sum();
            let conceded: f64 = recent.iter().map(|(_, ga)| f64::from(*ga)).sum();
            // Thin windows lean on the league-average team.
            let w = (n / self.window as f64).clamp(0.0, 1.0);
            attack = (1.0 - w) + w * scored / n / league_avg;
            defense = (1.0 - w) + w * conceded / n / league_avg;
        }

        let key = RatingKey {
            team_id,
            league_id,
            season,
        };
        TeamStrength {
            attack: attack.max(STRENGTH_FLOOR),
            defense: defense.max(STRENGTH_FLOOR),
            elo_rating: self.ratings.rating_or(&key, self.elo.initial_rating),
            home_advantage,
        }
    }
}
