use std::collections::{BTreeMap, HashSet};
use std::fmt;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::models::ModelKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Free,
    Starter,
    Pro,
    Premium,
    Ultimate,
}

impl Tier {
    /// Lowest to highest.
    pub const ALL: [Tier; 5] = [
        Tier::Free,
        Tier::Starter,
        Tier::Pro,
        Tier::Premium,
        Tier::Ultimate,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Tier::Free => "free",
            Tier::Starter => "starter",
            Tier::Pro => "pro",
            Tier::Premium => "premium",
            Tier::Ultimate => "ultimate",
        }
    }

    pub fn parse(name: &str) -> Option<Tier> {
        let key = name.trim().to_ascii_lowercase();
        Tier::ALL.into_iter().find(|t| t.as_str() == key)
    }

    /// Unknown names get the least privileged tier.
    pub fn from_name_or_lowest(name: &str) -> Tier {
        Tier::parse(name).unwrap_or_else(|| {
            debug!(tier = name, "unknown tier, using free");
            Tier::Free
        })
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A tier slot: either a built-in statistical model or a named opaque classifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ModelId {
    Statistical(ModelKind),
    Classifier(String),
}

impl ModelId {
    pub fn parse(name: &str) -> ModelId {
        match name.parse::<ModelKind>() {
            Ok(kind) => ModelId::Statistical(kind),
            Err(_) => ModelId::Classifier(name.trim().to_ascii_lowercase()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            ModelId::Statistical(kind) => kind.as_str(),
            ModelId::Classifier(name) => name,
        }
    }
}

impl From<String> for ModelId {
    fn from(s: String) -> Self {
        ModelId::parse(&s)
    }
}

impl From<ModelId> for String {
    fn from(id: ModelId) -> Self {
        id.as_str().to_string()
    }
}

impl fmt::Display for ModelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PolicyError {
    #[error("tier {0} has no model list")]
    MissingTier(Tier),

    #[error("tier {tier} lists {model} twice")]
    Duplicate { tier: Tier, model: String },

    #[error("tier {upper} drops {model}, which {lower} enables")]
    NotMonotonic {
        lower: Tier,
        upper: Tier,
        model: String,
    },
}

/// Ordered model slots per tier. Every tier enables everything the tier below it does.
#[derive(Debug, Clone, PartialEq)]
pub struct TierModelPolicy {
    tiers: BTreeMap<Tier, Vec<ModelId>>,
}

const FREE: &[&str] = &[
    "poisson",
    "dixon_coles",
    "elo",
    "logistic_regression",
    "decision_tree",
    "naive_bayes",
    "ridge",
];
const STARTER: &[&str] = &[
    "bivariate_poisson",
    "skellam",
    "knn",
    "passive_aggressive",
    "qda",
    "lda",
    "sgd",
];
const PRO: &[&str] = &[
    "negative_binomial",
    "zero_inflated_poisson",
    "random_forest",
    "extra_trees",
    "adaboost",
    "gradient_boosting",
    "neural_network",
    "bagging",
];
const PREMIUM: &[&str] = &[
    "cox_survival",
    "xgboost",
    "lightgbm",
    "catboost",
    "svm",
    "stacking_ensemble",
];
const ULTIMATE: &[&str] = &["gaussian_process", "voting_ensemble", "lstm"];

static STANDARD: Lazy<TierModelPolicy> = Lazy::new(|| {
    let additions = [FREE, STARTER, PRO, PREMIUM, ULTIMATE];
    let mut tiers = BTreeMap::new();
    let mut enabled: Vec<ModelId> = Vec::new();
    for (tier, added) in Tier::ALL.into_iter().zip(additions) {
        enabled.extend(added.iter().map(|name| ModelId::parse(name)));
        tiers.insert(tier, enabled.clone());
    }
    TierModelPolicy { tiers }
});

impl TierModelPolicy {
    /// Checks that every tier is present, has no duplicates and is a superset of the one below.
    pub fn new(tiers: BTreeMap<Tier, Vec<ModelId>>) -> Result<Self, PolicyError> {
        for tier in Tier::ALL {
            let models = tiers.get(&tier).ok_or(PolicyError::MissingTier(tier))?;
            let mut seen = HashSet::new();
            for m in models {
                if !seen.insert(m) {
                    return Err(PolicyError::Duplicate {
                        tier,
                        model: m.to_string(),
                    });
                }
            }
        }
        for pair in Tier::ALL.windows(2) {
            let (lower, upper) = (pair[0], pair[1]);
            let upper_set: HashSet<&ModelId> = tiers[&upper].iter().collect();
            if let Some(missing) = tiers[&lower].iter().find(|m| !upper_set.contains(m)) {
                return Err(PolicyError::NotMonotonic {
                    lower,
                    upper,
                    model: missing.to_string(),
                });
            }
        }
        Ok(Self { tiers })
    }

    pub fn standard() -> Self {
        STANDARD.clone()
    }

    pub fn enabled_models(&self, tier: Tier) -> &[ModelId] {
        self.tiers.get(&tier).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Resolves a raw tier name (falling back to the lowest tier) and its slots.
    pub fn for_name(&self, name: &str) -> (Tier, &[ModelId]) {
        let tier = Tier::from_name_or_lowest(name);
        (tier, self.enabled_models(tier))
    }

    pub fn as_map(&self) -> &BTreeMap<Tier, Vec<ModelId>> {
        &self.tiers
    }
}

impl Default for TierModelPolicy {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_policy_passes_its_own_validation() {
        let policy = TierModelPolicy::standard();
        assert_eq!(TierModelPolicy::new(policy.as_map().clone()).unwrap(), policy);
        assert_eq!(policy.enabled_models(Tier::Free).len(), 7);
        assert_eq!(policy.enabled_models(Tier::Ultimate).len(), 31);
    }

    #[test]
    fn unknown_tier_names_fall_back_to_free() {
        assert_eq!(Tier::from_name_or_lowest("platinum"), Tier::Free);
        assert_eq!(Tier::from_name_or_lowest(" PRO "), Tier::Pro);
        let policy = TierModelPolicy::standard();
        let (tier, models) = policy.for_name("");
        assert_eq!(tier, Tier::Free);
        assert_eq!(models[0], ModelId::Statistical(ModelKind::Poisson));
    }

    #[test]
    fn model_ids_split_statistical_from_classifiers() {
        assert_eq!(ModelId::parse("skellam"), ModelId::Statistical(ModelKind::Skellam));
        assert_eq!(ModelId::parse("XGBoost"), ModelId::Classifier("xgboost".into()));
        let json = serde_json::to_string(&ModelId::parse("elo")).unwrap();
        assert_eq!(json, "\"elo\"");
    }

    #[test]
    fn shrinking_policy_is_rejected() {
        let mut map = TierModelPolicy::standard().as_map().clone();
        map.get_mut(&Tier::Premium).unwrap().retain(|m| m.as_str() != "ridge");
        let err = TierModelPolicy::new(map).unwrap_err();
        assert_eq!(
            err,
            PolicyError::NotMonotonic {
                lower: Tier::Pro,
                upper: Tier::Premium,
                model: "ridge".into(),
            }
        );
    }
}
