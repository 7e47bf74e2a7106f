//! Opaque probability classifiers supplied by the host application.
//!
//! Training happens elsewhere; the engine only asks a registered component for a 1X2 triple on a
//! fixed feature vector and treats whatever comes back like any other model result.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::error::{ModelError, NotReadyReason, Result};
use crate::inputs::MatchContext;
use crate::models::ModelResult;
use crate::probs::Prob3;

/// Feature vector handed to classifiers, in `FEATURE_NAMES` order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MatchFeatures {
    pub home_attack: f64,
    pub home_defense: f64,
    pub away_attack: f64,
    pub away_defense: f64,
    pub home_elo: f64,
    pub away_elo: f64,
    pub elo_diff: f64,
    pub home_advantage: f64,
    pub league_average_goals: f64,
    pub minute: f64,
}

impl MatchFeatures {
    pub const FEATURE_NAMES: [&'static str; 10] = [
        "home_attack",
        "home_defense",
        "away_attack",
        "away_defense",
        "home_elo",
        "away_elo",
        "elo_diff",
        "home_advantage",
        "league_average_goals",
        "minute",
    ];

    pub fn from_context(ctx: &MatchContext) -> Self {
        Self {
            home_attack: ctx.home.attack,
            home_defense: ctx.home.defense,
            away_attack: ctx.away.attack,
            away_defense: ctx.away.defense,
            home_elo: ctx.home.elo_rating,
            away_elo: ctx.away.elo_rating,
            elo_diff: ctx.home.elo_rating - ctx.away.elo_rating,
            home_advantage: ctx.home.home_advantage,
            league_average_goals: ctx.league_average_goals,
            minute: f64::from(ctx.minute()),
        }
    }

    pub fn as_array(&self) -> [f64; 10] {
        [
            self.home_attack,
            self.home_defense,
            self.away_attack,
            self.away_defense,
            self.home_elo,
            self.away_elo,
            self.elo_diff,
            self.home_advantage,
            self.league_average_goals,
            self.minute,
        ]
    }
}

pub trait OutcomeClassifier: Send + Sync {
    fn is_trained(&self) -> bool {
        true
    }

    fn predict_proba(&self, features: &MatchFeatures) -> anyhow::Result<Prob3>;
}

/// Named classifiers available to tier slots.
#[derive(Clone, Default)]
pub struct ClassifierRegistry {
    entries: HashMap<String, Arc<dyn OutcomeClassifier>>,
}

impl fmt::Debug for ClassifierRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names = self.names();
        names.sort_unstable();
        f.debug_struct("ClassifierRegistry")
            .field("entries", &names)
            .finish()
    }
}

impl ClassifierRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        name: impl Into<String>,
        classifier: impl OutcomeClassifier + 'static,
    ) {
        self.entries.insert(name.into(), Arc::new(classifier));
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn OutcomeClassifier>> {
        self.entries.get(name).cloned()
    }

    pub fn names(&self) -> Vec<&str> {
        self.entries.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Runs one classifier. Untrained components are not ready; errors and malformed triples are
/// invalid input for that slot only.
pub fn run_classifier(
    name: &str,
    classifier: &dyn OutcomeClassifier,
    ctx: &MatchContext,
) -> Result<ModelResult> {
    if !classifier.is_trained() {
        return Err(ModelError::not_ready(name, NotReadyReason::NotTrained));
    }
    let features = MatchFeatures::from_context(ctx);
    let probs = classifier
        .predict_proba(&features)
        .map_err(|e| ModelError::invalid(format!("{name}: {e:#}")))?;
    ModelResult::from_probs(name, probs)
}
