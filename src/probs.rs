use serde::{Deserialize, Serialize};

use crate::error::{ModelError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    #[serde(rename = "home_win")]
    Home,
    Draw,
    #[serde(rename = "away_win")]
    Away,
}

impl Outcome {
    pub fn label(self) -> &'static str {
        match self {
            Outcome::Home => "Home Win",
            Outcome::Draw => "Draw",
            Outcome::Away => "Away Win",
        }
    }

    /// Elo actual score from the home side's point of view.
    pub fn home_score(self) -> f64 {
        match self {
            Outcome::Home => 1.0,
            Outcome::Draw => 0.5,
            Outcome::Away => 0.0,
        }
    }
}

/// Home/draw/away probability triple.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Prob3 {
    #[serde(rename = "home_win")]
    pub home: f64,
    pub draw: f64,
    #[serde(rename = "away_win")]
    pub away: f64,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct Metrics {
    pub samples: usize,
    pub brier: f64,
    pub log_loss: f64,
    pub accuracy: f64,
}

pub const SUM_TOLERANCE: f64 = 1e-6;

impl Prob3 {
    pub fn new(home: f64, draw: f64, away: f64) -> Self {
        Self { home, draw, away }
    }

    pub fn uniform() -> Self {
        Self {
            home: 1.0 / 3.0,
            draw: 1.0 / 3.0,
            away: 1.0 / 3.0,
        }
    }

    pub fn sum(&self) -> f64 {
        self.home + self.draw + self.away
    }

    pub fn get(&self, outcome: Outcome) -> f64 {
        match outcome {
            Outcome::Home => self.home,
            Outcome::Draw => self.draw,
            Outcome::Away => self.away,
        }
    }

    /// Rescales to sum to 1. Negative, non-finite or all-zero input is rejected rather than
    /// returned as NaN.
    pub fn normalized(self) -> Result<Self> {
        let parts = [self.home, self.draw, self.away];
        if parts.iter().any(|p| !p.is_finite() || *p < 0.0) {
            return Err(ModelError::invalid(format!(
                "outcome probabilities must be finite and >= 0, got {self:?}"
            )));
        }
        let sum = self.sum();
        if sum <= 0.0 || !sum.is_finite() {
            return Err(ModelError::invalid("outcome probabilities sum to zero"));
        }
        Ok(Self {
            home: self.home / sum,
            draw: self.draw / sum,
            away: self.away / sum,
        })
    }

    pub fn is_normalized(&self) -> bool {
        [self.home, self.draw, self.away]
            .iter()
            .all(|p| p.is_finite() && *p >= 0.0)
            && (self.sum() - 1.0).abs() <= SUM_TOLERANCE
    }

    /// Most likely outcome; ties go home, then draw, then away.
    pub fn argmax(&self) -> Outcome {
        if self.home >= self.draw && self.home >= self.away {
            Outcome::Home
        } else if self.draw >= self.away {
            Outcome::Draw
        } else {
            Outcome::Away
        }
    }

    pub fn max(&self) -> f64 {
        self.get(self.argmax())
    }
}

pub fn classify_outcome(home_goals: i32, away_goals: i32) -> Outcome {
    if home_goals > away_goals {
        Outcome::Home
    } else if home_goals < away_goals {
        Outcome::Away
    } else {
        Outcome::Draw
    }
}

pub fn evaluate_probs(predictions: &[Prob3], outcomes: &[Outcome]) -> Metrics {
    if predictions.is_empty() || outcomes.is_empty() || predictions.len() != outcomes.len() {
        return Metrics {
            samples: 0,
            brier: 0.0,
            log_loss: 0.0,
            accuracy: 0.0,
        };
    }

    let mut brier_sum = 0.0_f64;
    let mut log_loss_sum = 0.0_f64;
    let mut correct = 0usize;

    for (p, outcome) in predictions.iter().zip(outcomes) {
        let y = one_hot(*outcome);
        brier_sum +=
            (p.home - y.home).powi(2) + (p.draw - y.draw).powi(2) + (p.away - y.away).powi(2);

        let actual_prob = p.get(*outcome).clamp(1e-12, 1.0);
        log_loss_sum += -actual_prob.ln();

        if p.argmax() == *outcome {
            correct += 1;
        }
    }

    let n = predictions.len() as f64;
    Metrics {
        samples: predictions.len(),
        brier: brier_sum / n,
        log_loss: log_loss_sum / n,
        accuracy: correct as f64 / n,
    }
}

fn one_hot(outcome: Outcome) -> Prob3 {
    match outcome {
        Outcome::Home => Prob3::new(1.0, 0.0, 0.0),
        Outcome::Draw => Prob3::new(0.0, 1.0, 0.0),
        Outcome::Away => Prob3::new(0.0, 0.0, 1.0),
    }
}

#[cfg(test)]
mod tests {
    use super::{Outcome, Prob3, evaluate_probs};

    #[test]
    fn perfect_predictions_have_zero_brier() {
        let preds = vec![
            Prob3::new(1.0, 0.0, 0.0),
            Prob3::new(0.0, 1.0, 0.0),
            Prob3::new(0.0, 0.0, 1.0),
        ];
        let outcomes = vec![Outcome::Home, Outcome::Draw, Outcome::Away];
        let m = evaluate_probs(&preds, &outcomes);
        assert_eq!(m.samples, 3);
        assert!(m.brier < 1e-12);
        assert!((m.accuracy - 1.0).abs() < 1e-12);
    }

    #[test]
    fn argmax_ties_prefer_home_then_draw() {
        assert_eq!(Prob3::new(0.4, 0.4, 0.2).argmax(), Outcome::Home);
        assert_eq!(Prob3::new(0.2, 0.4, 0.4).argmax(), Outcome::Draw);
        assert_eq!(Prob3::new(0.4, 0.2, 0.4).argmax(), Outcome::Home);
        assert_eq!(Prob3::new(0.2, 0.3, 0.5).argmax(), Outcome::Away);
    }

    #[test]
    fn normalizing_rejects_zero_and_nan() {
        assert!(Prob3::new(0.0, 0.0, 0.0).normalized().is_err());
        assert!(Prob3::new(f64::NAN, 0.5, 0.5).normalized().is_err());
        let p = Prob3::new(2.0, 1.0, 1.0).normalized().unwrap();
        assert!((p.home - 0.5).abs() < 1e-12);
        assert!(p.is_normalized());
    }

    #[test]
    fn serializes_with_outcome_names() {
        let json = serde_json::to_string(&Prob3::new(0.5, 0.3, 0.2)).unwrap();
        assert!(json.contains("\"home_win\":0.5"));
        assert!(json.contains("\"away_win\":0.2"));
        assert_eq!(serde_json::to_string(&Outcome::Away).unwrap(), "\"away_win\"");
    }
}
