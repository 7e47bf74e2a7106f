use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Why a model could not be built for a request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum NotReadyReason {
    /// A fitted constant (dispersion, coefficients, ...) is missing.
    NotTrained,
    /// A tier slot names a classifier nobody injected.
    NotRegistered,
    /// A fitted constant is present but outside its domain.
    InvalidParameters(String),
}

impl fmt::Display for NotReadyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotReadyReason::NotTrained => write!(f, "not_trained"),
            NotReadyReason::NotRegistered => write!(f, "not_registered"),
            NotReadyReason::InvalidParameters(msg) => write!(f, "invalid_parameters: {msg}"),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    /// Non-positive/non-finite strengths or ratings, or a distribution that underflowed.
    #[error("invalid_input: {0}")]
    InvalidInput(String),

    #[error("{model} not ready: {reason}")]
    NotReady {
        model: String,
        reason: NotReadyReason,
    },

    /// Nothing usable came back for the requested tier.
    #[error("no models available for tier {tier}")]
    NoModelsAvailable { tier: String },
}

impl ModelError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        ModelError::InvalidInput(msg.into())
    }

    pub fn not_ready(model: impl Into<String>, reason: NotReadyReason) -> Self {
        ModelError::NotReady {
            model: model.into(),
            reason,
        }
    }

    /// Short reason string recorded against a skipped model.
    pub fn skip_reason(&self) -> String {
        match self {
            ModelError::InvalidInput(msg) => format!("invalid_input: {msg}"),
            ModelError::NotReady { reason, .. } => reason.to_string(),
            ModelError::NoModelsAvailable { .. } => "no_models_available".to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ModelError>;

/// Rejects non-finite or non-positive values with a message naming the field.
pub fn require_positive(name: &str, value: f64) -> Result<f64> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(ModelError::invalid(format!("{name} must be finite and > 0, got {value}")))
    }
}

pub fn require_finite(name: &str, value: f64) -> Result<f64> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(ModelError::invalid(format!("{name} must be finite, got {value}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skip_reasons_use_short_codes() {
        let e = ModelError::not_ready("negative_binomial", NotReadyReason::NotTrained);
        assert_eq!(e.skip_reason(), "not_trained");
        let e = ModelError::invalid("bad lambda");
        assert_eq!(e.skip_reason(), "invalid_input: bad lambda");
    }

    #[test]
    fn positivity_check_rejects_nan_and_zero() {
        assert!(require_positive("x", 0.0).is_err());
        assert!(require_positive("x", f64::NAN).is_err());
        assert!(require_positive("x", f64::INFINITY).is_err());
        assert_eq!(require_positive("x", 0.5).unwrap(), 0.5);
    }
}
