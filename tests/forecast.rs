use std::collections::BTreeMap;
use std::thread;
use std::time::{Duration, Instant};

use match_forecast::classifier::{ClassifierRegistry, MatchFeatures, OutcomeClassifier};
use match_forecast::config::EngineConfig;
use match_forecast::engine::ForecastEngine;
use match_forecast::error::ModelError;
use match_forecast::inputs::{ForecastRequest, MatchContext, TeamStrength};
use match_forecast::models::ModelKind;
use match_forecast::probs::Prob3;
use match_forecast::tiers::{ModelId, Tier};

struct Trained(Prob3);

impl OutcomeClassifier for Trained {
    fn predict_proba(&self, _: &MatchFeatures) -> anyhow::Result<Prob3> {
        Ok(self.0)
    }
}

struct Untrained;

impl OutcomeClassifier for Untrained {
    fn is_trained(&self) -> bool {
        false
    }

    fn predict_proba(&self, _: &MatchFeatures) -> anyhow::Result<Prob3> {
        anyhow::bail!("no weights loaded")
    }
}

struct Panicking;

impl OutcomeClassifier for Panicking {
    fn predict_proba(&self, _: &MatchFeatures) -> anyhow::Result<Prob3> {
        panic!("tree index out of range")
    }
}

struct Slow;

impl OutcomeClassifier for Slow {
    fn predict_proba(&self, _: &MatchFeatures) -> anyhow::Result<Prob3> {
        thread::sleep(Duration::from_millis(1000));
        Ok(Prob3::uniform())
    }
}

fn ctx() -> MatchContext {
    MatchContext {
        home: TeamStrength {
            attack: 1.5,
            defense: 1.0,
            elo_rating: 1600.0,
            home_advantage: 1.1,
        },
        away: TeamStrength {
            attack: 1.2,
            defense: 0.9,
            elo_rating: 1500.0,
            home_advantage: 1.1,
        },
        league_average_goals: 1.4,
        current_minute: None,
        current_score: None,
    }
}

fn reason<'a>(skipped: &'a [match_forecast::consensus::SkippedModel], id: &str) -> &'a str {
    skipped
        .iter()
        .find(|s| s.model_id == id)
        .map(|s| s.reason.as_str())
        .unwrap_or("")
}

#[test]
fn misbehaving_classifiers_only_lose_their_own_slot() {
    let mut registry = ClassifierRegistry::new();
    registry.register("logistic_regression", Trained(Prob3::new(0.5, 0.3, 0.2)));
    registry.register("decision_tree", Panicking);
    registry.register("naive_bayes", Untrained);
    registry.register("ridge", Slow);

    let cfg = EngineConfig {
        model_timeout_ms: 150,
        ..EngineConfig::default()
    };
    let engine = ForecastEngine::new(cfg).with_classifiers(registry);
    let f = engine.forecast(&ctx(), "free").unwrap();

    let ids: Vec<&str> = f.model_results.iter().map(|r| r.model_id.as_str()).collect();
    assert_eq!(ids, vec!["poisson", "dixon_coles", "elo", "logistic_regression"]);

    let skipped = &f.consensus.skipped_models;
    assert_eq!(skipped.len(), 3);
    assert_eq!(reason(skipped, "decision_tree"), "panicked");
    assert_eq!(reason(skipped, "naive_bayes"), "not_trained");
    assert_eq!(reason(skipped, "ridge"), "timeout");

    assert_eq!(f.consensus.contributing_models.len(), 4);
    assert!((f.consensus.outcome_probabilities.sum() - 1.0).abs() < 1e-9);
}

#[test]
fn hung_classifiers_do_not_starve_the_next_request() {
    let mut registry = ClassifierRegistry::new();
    for name in ["logistic_regression", "decision_tree", "naive_bayes", "ridge"] {
        registry.register(name, Slow);
    }
    let cfg = EngineConfig {
        model_timeout_ms: 150,
        ..EngineConfig::default()
    };
    let engine = ForecastEngine::new(cfg).with_classifiers(registry);

    for round in 0..2 {
        let started = Instant::now();
        let f = engine.forecast(&ctx(), "free").unwrap();
        let ids: Vec<&str> = f.model_results.iter().map(|r| r.model_id.as_str()).collect();
        assert_eq!(ids, vec!["poisson", "dixon_coles", "elo"], "round {round}");
        assert_eq!(f.consensus.skipped_models.len(), 4);
        assert!(
            f.consensus
                .skipped_models
                .iter()
                .all(|s| s.reason == "timeout")
        );
        // Returns on the per-model budget, not when the sleeping classifiers wake.
        assert!(started.elapsed() < Duration::from_millis(900), "round {round}");
    }
}

#[test]
fn bad_rating_skips_only_elo() {
    let mut c = ctx();
    c.away.elo_rating = f64::NAN;
    let f = ForecastEngine::new(EngineConfig::default())
        .forecast(&c, "free")
        .unwrap();
    assert!(f.result("elo").is_none());
    assert!(f.result("poisson").is_some());
    assert!(reason(&f.consensus.skipped_models, "elo").starts_with("invalid_input"));
}

#[test]
fn nothing_usable_is_an_error_naming_the_tier() {
    let mut c = ctx();
    c.home.attack = -1.0;
    c.home.elo_rating = f64::NAN;
    let err = ForecastEngine::new(EngineConfig::default())
        .forecast(&c, "free")
        .unwrap_err();
    assert_eq!(
        err,
        ModelError::NoModelsAvailable {
            tier: "free".into()
        }
    );
}

#[test]
fn unknown_tier_runs_the_free_models() {
    let f = ForecastEngine::new(EngineConfig::default())
        .forecast(&ctx(), "platinum")
        .unwrap();
    assert_eq!(f.tier, Tier::Free);
    assert_eq!(f.model_results.len(), 3);
}

#[test]
fn single_model_policy_passes_its_result_through() {
    let only_poisson = vec![ModelId::Statistical(ModelKind::Poisson)];
    let policy: BTreeMap<Tier, Vec<ModelId>> = Tier::ALL
        .into_iter()
        .map(|t| (t, only_poisson.clone()))
        .collect();
    let cfg = EngineConfig {
        policy: Some(policy),
        ..EngineConfig::default()
    };
    let f = ForecastEngine::new(cfg).forecast(&ctx(), "ultimate").unwrap();
    assert_eq!(f.model_results.len(), 1);
    assert_eq!(
        f.consensus.outcome_probabilities,
        f.model_results[0].outcome_probabilities
    );
    assert!(f.consensus.skipped_models.is_empty());
}

#[test]
fn invalid_custom_policy_falls_back_to_standard_tiers() {
    let mut policy = BTreeMap::new();
    policy.insert(Tier::Free, vec![ModelId::Statistical(ModelKind::Poisson)]);
    let cfg = EngineConfig {
        policy: Some(policy),
        ..EngineConfig::default()
    };
    let engine = ForecastEngine::new(cfg);
    assert_eq!(engine.policy().enabled_models(Tier::Ultimate).len(), 31);
}

#[test]
fn calibrated_pro_forecast_from_fixture() {
    let raw = include_str!("fixtures/forecast_case.json");
    let case: serde_json::Value = serde_json::from_str(raw).unwrap();
    let request: ForecastRequest = serde_json::from_value(case["request"].clone()).unwrap();
    let config: EngineConfig = serde_json::from_value(case["config"].clone()).unwrap();
    let tier = case["tier"].as_str().unwrap();

    let f = ForecastEngine::new(config)
        .forecast_request(&request, tier)
        .unwrap();
    assert_eq!(f.tier, Tier::Pro);
    assert_eq!(f.model_results.len(), 7);
    assert_eq!(f.consensus.skipped_models.len(), 15);
    assert!(
        f.consensus
            .skipped_models
            .iter()
            .all(|s| s.reason == "not_registered")
    );

    let nb = f.result("negative_binomial").unwrap();
    assert!(nb.totals.as_ref().unwrap().variance > 2.685);
    assert!(f.result("zero_inflated_poisson").is_some());

    let p = f.consensus.outcome_probabilities;
    assert!((p.sum() - 1.0).abs() < 1e-9);
    assert!(p.home > p.away);
    assert_eq!(f.consensus.markets.home_win.probability, p.home);
}
