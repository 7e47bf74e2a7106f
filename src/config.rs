use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::consensus::ConsensusWeights;
use crate::elo::EloConfig;
use crate::scoregrid::GridSpec;
use crate::survival::{CoxCoefficients, PERIODS};
use crate::tiers::{ModelId, Tier};

pub const ENV_PREFIX: &str = "FORECAST_";

/// Every tunable and fitted constant the engine reads. Fitted constants are optional: `None`
/// leaves the dependent model uncalibrated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub home_advantage: f64,
    pub max_goals: usize,
    pub dixon_coles_rho: Option<f64>,
    pub bivariate_covariance: Option<f64>,
    pub zero_inflation: Option<f64>,
    pub nb_dispersion: Option<f64>,
    pub cox: Option<CoxCoefficients>,
    /// Goal-rate multipliers for the six 15-minute periods.
    pub period_weights: [f64; PERIODS],
    pub next_goal_windows: Vec<u32>,
    pub totals_lines: Vec<f64>,
    pub max_total_goals: usize,
    pub skellam_max_diff: i32,
    pub handicap_lines: Vec<i32>,
    pub elo: EloConfig,
    pub weights: ConsensusWeights,
    /// Replaces the standard tier policy when set and valid.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub policy: Option<BTreeMap<Tier, Vec<ModelId>>>,
    pub workers: usize,
    /// Threads reserved for host classifiers, separate from `workers`.
    pub classifier_workers: usize,
    /// Per-model budget, counted from the moment the model starts.
    pub model_timeout_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            home_advantage: 1.3,
            max_goals: 10,
            dixon_coles_rho: Some(-0.13),
            bivariate_covariance: Some(0.10),
            zero_inflation: Some(0.10),
            nb_dispersion: None,
            cox: None,
            period_weights: [0.85, 0.95, 1.05, 0.95, 1.05, 1.15],
            next_goal_windows: vec![5, 10, 15, 30],
            totals_lines: vec![0.5, 1.5, 2.5, 3.5, 4.5],
            max_total_goals: 15,
            skellam_max_diff: 20,
            handicap_lines: vec![-2, -1, 0, 1, 2],
            elo: EloConfig::default(),
            weights: ConsensusWeights::default(),
            policy: None,
            workers: 4,
            classifier_workers: 4,
            model_timeout_ms: 200,
        }
    }
}

impl EngineConfig {
    pub fn grid(&self) -> GridSpec {
        GridSpec {
            max_goals: self.max_goals,
            totals_lines: self.totals_lines.clone(),
        }
    }

    pub fn model_timeout(&self) -> Duration {
        Duration::from_millis(self.model_timeout_ms)
    }

    /// Reads a JSON config; missing fields keep their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)
            .with_context(|| format!("read config {}", path.display()))?;
        serde_json::from_str(&raw).with_context(|| format!("parse config {}", path.display()))
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("create {}", parent.display()))?;
        }
        let tmp = path.with_extension("json.tmp");
        let json = serde_json::to_string_pretty(self).context("serialize config")?;
        fs::write(&tmp, json).context("write config")?;
        fs::rename(&tmp, path).context("swap config")?;
        Ok(())
    }

    /// Defaults overridden by `FORECAST_*` environment variables.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        cfg.apply_env();
        cfg
    }

    pub fn apply_env(&mut self) {
        self.apply_lookup(|key| env::var(key).ok());
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut cfg = Self::default();
        cfg.apply_lookup(lookup);
        cfg
    }

    /// Applies overrides from `lookup`. Values that do not parse are ignored; numeric values are
    /// clamped into a sane range.
    pub fn apply_lookup(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |name: &str| lookup(&format!("{ENV_PREFIX}{name}"));

        if let Some(v) = parse_f64(get("HOME_ADVANTAGE")) {
            self.home_advantage = v.clamp(0.5, 3.0);
        }
        if let Some(v) = parse::<usize>(get("MAX_GOALS")) {
            self.max_goals = v.clamp(4, 30);
        }
        if let Some(v) = parse::<usize>(get("MAX_TOTAL_GOALS")) {
            self.max_total_goals = v.clamp(4, 60);
        }
        if let Some(v) = parse_f64(get("DC_RHO")) {
            self.dixon_coles_rho = Some(v.clamp(-0.5, 0.5));
        }
        if let Some(v) = parse_f64(get("BIVARIATE_COVARIANCE")) {
            self.bivariate_covariance = Some(v.clamp(0.0, 2.0));
        }
        if let Some(v) = parse_f64(get("ZERO_INFLATION")) {
            self.zero_inflation = Some(v.clamp(0.0, 0.99));
        }
        if let Some(v) = parse_f64(get("NB_DISPERSION")) {
            self.nb_dispersion = Some(v.clamp(1e-6, 5.0));
        }

        let rating_gap = parse_f64(get("COX_RATING_GAP"));
        let attack_gap = parse_f64(get("COX_ATTACK_GAP"));
        if rating_gap.is_some() || attack_gap.is_some() {
            let base = self.cox.unwrap_or(CoxCoefficients {
                rating_gap: 0.0,
                attack_gap: 0.0,
            });
            self.cox = Some(CoxCoefficients {
                rating_gap: rating_gap.unwrap_or(base.rating_gap),
                attack_gap: attack_gap.unwrap_or(base.attack_gap),
            });
        }

        if let Some(v) = parse_f64(get("ELO_K")) {
            self.elo.k_factor = v.clamp(1.0, 100.0);
        }
        if let Some(v) = parse_f64(get("ELO_HOME_BONUS")) {
            self.elo.home_bonus = v.clamp(0.0, 400.0);
        }
        if let Some(v) = parse::<usize>(get("WORKERS")) {
            self.workers = v.clamp(1, 64);
        }
        if let Some(v) = parse::<usize>(get("CLASSIFIER_WORKERS")) {
            self.classifier_workers = v.clamp(1, 64);
        }
        if let Some(v) = parse::<u64>(get("MODEL_TIMEOUT_MS")) {
            self.model_timeout_ms = v.clamp(10, 60_000);
        }
    }
}

fn parse<T: FromStr>(raw: Option<String>) -> Option<T> {
    raw.and_then(|val| val.trim().parse::<T>().ok())
}

fn parse_f64(raw: Option<String>) -> Option<f64> {
    parse::<f64>(raw).filter(|v| v.is_finite())
}
