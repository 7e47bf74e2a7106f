use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::info;

use match_forecast::config::EngineConfig;
use match_forecast::engine::ForecastEngine;
use match_forecast::inputs::ForecastRequest;

#[derive(Debug, Deserialize)]
struct ForecastCase {
    request: ForecastRequest,
    #[serde(default = "default_tier")]
    tier: String,
    #[serde(default)]
    config: Option<EngineConfig>,
}

fn default_tier() -> String {
    "free".to_string()
}

fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let path = std::env::args()
        .skip(1)
        .find(|a| !a.starts_with("--"))
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("tests/fixtures/forecast_case.json"));
    let raw = fs::read_to_string(&path).with_context(|| format!("read {}", path.display()))?;
    let case: ForecastCase = serde_json::from_str(&raw).context("invalid forecast case json")?;

    let mut config = match (parse_path_arg("--config"), case.config) {
        (Some(file), _) => EngineConfig::load(file)?,
        (None, Some(inline)) => inline,
        (None, None) => EngineConfig::default(),
    };
    config.apply_env();

    let engine = ForecastEngine::new(config);
    let forecast = engine
        .forecast_request(&case.request, &case.tier)
        .context("forecast failed")?;
    info!(
        tier = %forecast.tier,
        contributing = forecast.consensus.contributing_models.len(),
        skipped = forecast.consensus.skipped_models.len(),
        "forecast complete"
    );

    println!("{}", serde_json::to_string_pretty(&forecast)?);
    Ok(())
}

fn parse_path_arg(name: &str) -> Option<PathBuf> {
    let prefix = format!("{name}=");
    std::env::args()
        .skip(1)
        .find_map(|arg| arg.strip_prefix(&prefix).map(|raw| PathBuf::from(raw.trim())))
}
