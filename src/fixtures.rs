use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A played (or abandoned) league fixture as supplied by the data layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixtureResult {
    pub id: u32,
    pub played_at: DateTime<Utc>,
    pub league_id: u32,
    pub season: u16,
    pub home_id: u32,
    pub away_id: u32,
    pub home_goals: u8,
    pub away_goals: u8,
    #[serde(default = "finished_default")]
    pub finished: bool,
    #[serde(default)]
    pub cancelled: bool,
    #[serde(default)]
    pub awarded: bool,
    #[serde(default)]
    pub reason_long_key: Option<String>,
}

fn finished_default() -> bool {
    true
}

impl FixtureResult {
    pub fn is_penalty_decided(&self) -> bool {
        let Some(key) = self.reason_long_key.as_deref() else {
            return false;
        };
        // "afterpenalties", "pen", ...
        key.to_ascii_lowercase().contains("pen")
    }

    /// Completed on the pitch and decided in normal or extra time.
    pub fn is_rated(&self) -> bool {
        self.finished && !self.cancelled && !self.awarded && !self.is_penalty_decided()
    }

    pub fn involves(&self, team_id: u32) -> bool {
        self.home_id == team_id || self.away_id == team_id
    }

    /// (goals for, goals against) from `team_id`'s side, if it played.
    pub fn goals_for_against(&self, team_id: u32) -> Option<(u8, u8)> {
        if self.home_id == team_id {
            Some((self.home_goals, self.away_goals))
        } else if self.away_id == team_id {
            Some((self.away_goals, self.home_goals))
        } else {
            None
        }
    }
}

/// Rated fixtures in replay order: kickoff time, then id.
pub fn rated_in_order(fixtures: &[FixtureResult]) -> Vec<&FixtureResult> {
    let mut out: Vec<&FixtureResult> = fixtures.iter().filter(|f| f.is_rated()).collect();
    out.sort_by(|a, b| a.played_at.cmp(&b.played_at).then(a.id.cmp(&b.id)));
    out
}
