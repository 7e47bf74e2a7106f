use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::time::Instant;

use serde::{Serialize, Serializer};
use tracing::{debug, warn};

use crate::classifier::{ClassifierRegistry, OutcomeClassifier, run_classifier};
use crate::config::EngineConfig;
use crate::consensus::{ConsensusAggregator, ConsensusResult, SkippedModel};
use crate::error::{NotReadyReason, Result};
use crate::inputs::{ForecastRequest, MatchContext};
use crate::models::{self, Model, ModelResult};
use crate::tiers::{ModelId, Tier, TierModelPolicy};

pub const TIMEOUT: &str = "timeout";
pub const PANICKED: &str = "panicked";

/// Everything produced for one request.
#[derive(Debug, Clone, Serialize)]
pub struct Forecast {
    pub tier: Tier,
    /// Successful results in policy order; serialised as a map keyed by model id.
    #[serde(serialize_with = "results_by_id")]
    pub model_results: Vec<ModelResult>,
    pub consensus: ConsensusResult,
}

impl Forecast {
    pub fn result(&self, model_id: &str) -> Option<&ModelResult> {
        self.model_results.iter().find(|r| r.model_id == model_id)
    }
}

fn results_by_id<S: Serializer>(
    results: &[ModelResult],
    s: S,
) -> std::result::Result<S::Ok, S::Error> {
    s.collect_map(results.iter().map(|r| (r.model_id.as_str(), r)))
}

enum Job {
    Statistical(Model),
    Classifier(String, Arc<dyn OutcomeClassifier>),
}

impl Job {
    fn name(&self) -> &str {
        match self {
            Job::Statistical(model) => model.kind().as_str(),
            Job::Classifier(name, _) => name,
        }
    }

    fn is_classifier(&self) -> bool {
        matches!(self, Job::Classifier(..))
    }

    fn run(&self, ctx: &MatchContext) -> Result<ModelResult> {
        match self {
            Job::Statistical(model) => model.predict(ctx),
            Job::Classifier(name, clf) => run_classifier(name, clf.as_ref(), ctx),
        }
    }
}

type JobOutcome = std::result::Result<Result<ModelResult>, Box<dyn Any + Send>>;

enum Event {
    Started(usize, Instant),
    Finished(usize, JobOutcome),
}

enum Slot {
    Skipped(String),
    Queued(usize),
}

/// Runs the tier's models for a request and merges them into a consensus.
pub struct ForecastEngine {
    config: EngineConfig,
    policy: TierModelPolicy,
    classifiers: ClassifierRegistry,
    aggregator: ConsensusAggregator,
    /// Statistical models only; they always terminate, so these workers are never held.
    model_pool: Option<rayon::ThreadPool>,
    /// Host classifiers, which may hang and keep a worker past their deadline.
    classifier_pool: Option<rayon::ThreadPool>,
}

impl ForecastEngine {
    pub fn new(config: EngineConfig) -> Self {
        let policy = match config.policy.clone().map(TierModelPolicy::new) {
            Some(Ok(policy)) => policy,
            Some(Err(err)) => {
                warn!(error = %err, "custom tier policy rejected, using standard tiers");
                TierModelPolicy::standard()
            }
            None => TierModelPolicy::standard(),
        };
        let model_pool = build_pool("forecast-model", config.workers);
        let classifier_pool = build_pool("forecast-classifier", config.classifier_workers);
        if model_pool.is_none() || classifier_pool.is_none() {
            warn!("worker pool unavailable, running models inline");
        }
        Self {
            aggregator: ConsensusAggregator::new(config.weights.clone()),
            config,
            policy,
            classifiers: ClassifierRegistry::new(),
            model_pool,
            classifier_pool,
        }
    }

    pub fn with_classifiers(mut self, classifiers: ClassifierRegistry) -> Self {
        self.classifiers = classifiers;
        self
    }

    pub fn with_policy(mut self, policy: TierModelPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn policy(&self) -> &TierModelPolicy {
        &self.policy
    }

    pub fn forecast_request(&self, request: &ForecastRequest, tier: &str) -> Result<Forecast> {
        self.forecast(&request.to_context(&self.config), tier)
    }

    /// Fans the tier's models out and aggregates them. Each model gets `model_timeout_ms` from the
    /// moment it starts; one still queued after that long is timed out too. Per-model failures
    /// become skips; only an empty result set is an error.
    pub fn forecast(&self, ctx: &MatchContext, tier_name: &str) -> Result<Forecast> {
        let (tier, enabled) = self.policy.for_name(tier_name);

        let mut slots = Vec::with_capacity(enabled.len());
        let mut jobs = Vec::new();
        for id in enabled {
            match self.prepare(id) {
                Ok(job) => {
                    slots.push(Slot::Queued(jobs.len()));
                    jobs.push(job);
                }
                Err(reason) => {
                    debug!(model = %id, %reason, "model skipped before run");
                    slots.push(Slot::Skipped(reason));
                }
            }
        }

        let mut outcomes = self.run_jobs(jobs, *ctx);

        let mut results = Vec::new();
        let mut skipped = Vec::new();
        for (id, slot) in enabled.iter().zip(slots) {
            let reason = match slot {
                Slot::Skipped(reason) => reason,
                Slot::Queued(i) => match outcomes[i].take() {
                    Some(Ok(Ok(result))) => {
                        results.push(result);
                        continue;
                    }
                    Some(Ok(Err(err))) => err.skip_reason(),
                    Some(Err(_)) => {
                        warn!(model = %id, "model panicked");
                        PANICKED.to_string()
                    }
                    None => {
                        warn!(
                            model = %id,
                            timeout_ms = self.config.model_timeout_ms,
                            "model timed out"
                        );
                        TIMEOUT.to_string()
                    }
                },
            };
            skipped.push(SkippedModel::new(id.as_str(), reason));
        }

        let consensus = self.aggregator.aggregate(tier, &results, skipped)?;
        Ok(Forecast {
            tier,
            model_results: results,
            consensus,
        })
    }

    fn prepare(&self, id: &ModelId) -> std::result::Result<Job, String> {
        match id {
            ModelId::Statistical(kind) => models::build(*kind, &self.config)
                .map(Job::Statistical)
                .map_err(|e| e.skip_reason()),
            ModelId::Classifier(name) => self
                .classifiers
                .get(name)
                .map(|clf| Job::Classifier(name.clone(), clf))
                .ok_or_else(|| NotReadyReason::NotRegistered.to_string()),
        }
    }

    fn run_jobs(&self, jobs: Vec<Job>, ctx: MatchContext) -> Vec<Option<JobOutcome>> {
        let n = jobs.len();
        let mut outcomes: Vec<Option<JobOutcome>> = (0..n).map(|_| None).collect();
        let (tx, rx) = mpsc::channel::<Event>();

        let mut inline = Vec::new();
        for (i, job) in jobs.into_iter().enumerate() {
            let pool = if job.is_classifier() {
                self.classifier_pool.as_ref()
            } else {
                self.model_pool.as_ref()
            };
            match pool {
                Some(pool) => {
                    let tx = tx.clone();
                    pool.spawn(move || run_pooled(i, &job, &ctx, &tx));
                }
                None => inline.push((i, job)),
            }
        }
        drop(tx);
        for (i, job) in inline {
            outcomes[i] = Some(run_guarded(&job, &ctx));
        }

        let timeout = self.config.model_timeout();
        let queued_at = Instant::now();
        let mut started: Vec<Option<Instant>> = vec![None; n];
        let mut pending: Vec<bool> = outcomes.iter().map(Option::is_none).collect();
        loop {
            let now = Instant::now();
            let deadline = |i: usize| started[i].unwrap_or(queued_at) + timeout;
            for i in 0..n {
                if pending[i] && deadline(i) <= now {
                    pending[i] = false;
                }
            }
            let Some(next) = (0..n).filter(|&i| pending[i]).map(deadline).min() else {
                break;
            };
            match rx.recv_timeout(next.saturating_duration_since(now)) {
                Ok(Event::Started(i, at)) => started[i] = Some(at),
                Ok(Event::Finished(i, outcome)) => {
                    if pending[i] {
                        outcomes[i] = Some(outcome);
                        pending[i] = false;
                    }
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        outcomes
    }
}

fn run_pooled(i: usize, job: &Job, ctx: &MatchContext, tx: &Sender<Event>) {
    // The request already returned; skip work nobody will read.
    if tx.send(Event::Started(i, Instant::now())).is_err() {
        return;
    }
    let outcome = run_guarded(job, ctx);
    let _ = tx.send(Event::Finished(i, outcome));
}

fn run_guarded(job: &Job, ctx: &MatchContext) -> JobOutcome {
    let started = Instant::now();
    let outcome = catch_unwind(AssertUnwindSafe(|| job.run(ctx)));
    debug!(
        model = job.name(),
        elapsed_us = started.elapsed().as_micros() as u64,
        "model finished"
    );
    outcome
}

fn build_pool(prefix: &'static str, workers: usize) -> Option<rayon::ThreadPool> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(workers.max(1))
        .thread_name(move |i| format!("{prefix}-{i}"))
        .build()
        .ok()
}
