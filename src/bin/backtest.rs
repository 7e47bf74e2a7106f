use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use tracing::warn;

use match_forecast::config::EngineConfig;
use match_forecast::engine::ForecastEngine;
use match_forecast::inputs::{ForecastRequest, Score};
use match_forecast::probs::{self, Metrics, Outcome, Prob3, classify_outcome};

#[derive(Debug, Deserialize)]
struct BacktestCase {
    #[serde(default)]
    id: Option<String>,
    request: ForecastRequest,
    final_score: Score,
}

#[derive(Default)]
struct Track {
    predictions: Vec<Prob3>,
    outcomes: Vec<Outcome>,
}

impl Track {
    fn push(&mut self, p: Prob3, outcome: Outcome) {
        self.predictions.push(p);
        self.outcomes.push(outcome);
    }

    fn metrics(&self) -> Metrics {
        probs::evaluate_probs(&self.predictions, &self.outcomes)
    }
}

fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let path = std::env::args()
        .skip(1)
        .find(|a| !a.starts_with("--"))
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("tests/fixtures/backtest_cases.json"));
    let tier = parse_str_arg("--tier").unwrap_or_else(|| "ultimate".to_string());

    let raw = fs::read_to_string(&path).with_context(|| format!("read {}", path.display()))?;
    let cases: Vec<BacktestCase> = serde_json::from_str(&raw).context("invalid backtest json")?;
    if cases.is_empty() {
        return Err(anyhow!("no backtest cases in {}", path.display()));
    }

    let mut config = match parse_str_arg("--config") {
        Some(file) => EngineConfig::load(file)?,
        None => EngineConfig::default(),
    };
    config.apply_env();
    let engine = ForecastEngine::new(config);

    let mut per_model: BTreeMap<String, Track> = BTreeMap::new();
    let mut consensus = Track::default();
    let mut failed = 0usize;

    for (idx, case) in cases.iter().enumerate() {
        let outcome = classify_outcome(case.final_score.home.into(), case.final_score.away.into());
        let forecast = match engine.forecast_request(&case.request, &tier) {
            Ok(f) => f,
            Err(err) => {
                let id = case.id.clone().unwrap_or_else(|| format!("#{idx}"));
                warn!(case = %id, error = %err, "case skipped");
                failed += 1;
                continue;
            }
        };
        for r in &forecast.model_results {
            per_model
                .entry(r.model_id.clone())
                .or_default()
                .push(r.outcome_probabilities, outcome);
        }
        consensus.push(forecast.consensus.outcome_probabilities, outcome);
    }

    println!("Forecast backtest");
    println!("Cases: {} (failed {})", cases.len(), failed);
    println!("Tier: {tier}");
    println!();
    for (model, track) in &per_model {
        print_metrics(model, track.metrics());
    }
    println!();
    print_metrics("Consensus", consensus.metrics());
    print_metrics("Uniform baseline", uniform_baseline(&consensus.outcomes));

    Ok(())
}

fn uniform_baseline(outcomes: &[Outcome]) -> Metrics {
    let uniform = vec![Prob3::uniform(); outcomes.len()];
    probs::evaluate_probs(&uniform, outcomes)
}

fn print_metrics(label: &str, metrics: Metrics) {
    println!("{label}:");
    println!(
        "  samples={} brier={:.4} log_loss={:.4} accuracy={:.3}",
        metrics.samples, metrics.brier, metrics.log_loss, metrics.accuracy
    );
}

fn parse_str_arg(name: &str) -> Option<String> {
    let prefix = format!("{name}=");
    std::env::args()
        .skip(1)
        .find_map(|arg| arg.strip_prefix(&prefix).map(|raw| String::from(raw.trim())))
}
