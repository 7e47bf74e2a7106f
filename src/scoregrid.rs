use serde::{Deserialize, Serialize};

use crate::error::{ModelError, Result};
use crate::inputs::{ExpectedGoals, Score};
use crate::probs::Prob3;

/// Truncation and reporting settings shared by every score-matrix model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridSpec {
    pub max_goals: usize,
    pub totals_lines: Vec<f64>,
}

impl Default for GridSpec {
    fn default() -> Self {
        Self {
            max_goals: 10,
            totals_lines: vec![0.5, 1.5, 2.5, 3.5, 4.5],
        }
    }
}

/// Joint home/away goal distribution over 0..=max_goals on each axis, stored row-major by home
/// goals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreMatrix {
    max_goals: usize,
    cells: Vec<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreProb {
    pub score: Score,
    pub probability: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OverUnder {
    pub line: f64,
    pub over: f64,
    pub under: f64,
}

/// Distribution of total goals in the match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TotalsDistribution {
    pub expected_total: f64,
    pub variance: f64,
    pub most_likely_total: usize,
    pub pmf: Vec<f64>,
    pub lines: Vec<OverUnder>,
}

impl ScoreMatrix {
    pub fn from_fn(max_goals: usize, mut f: impl FnMut(usize, usize) -> f64) -> Self {
        let n = max_goals + 1;
        let mut cells = Vec::with_capacity(n * n);
        for h in 0..n {
            for a in 0..n {
                cells.push(f(h, a));
            }
        }
        Self { max_goals, cells }
    }

    /// Outer product of two marginals; both must cover 0..=max_goals.
    pub fn independent(home_pmf: &[f64], away_pmf: &[f64]) -> Self {
        let max_goals = home_pmf.len().min(away_pmf.len()).saturating_sub(1);
        Self::from_fn(max_goals, |h, a| home_pmf[h] * away_pmf[a])
    }

    pub fn max_goals(&self) -> usize {
        self.max_goals
    }

    fn idx(&self, home: usize, away: usize) -> usize {
        home * (self.max_goals + 1) + away
    }

    pub fn get(&self, home: usize, away: usize) -> f64 {
        if home > self.max_goals || away > self.max_goals {
            return 0.0;
        }
        self.cells[self.idx(home, away)]
    }

    pub fn set(&mut self, home: usize, away: usize, p: f64) {
        let i = self.idx(home, away);
        self.cells[i] = p;
    }

    pub fn map_cells(&mut self, mut f: impl FnMut(usize, usize, f64) -> f64) {
        let n = self.max_goals + 1;
        for h in 0..n {
            for a in 0..n {
                let i = h * n + a;
                self.cells[i] = f(h, a, self.cells[i]);
            }
        }
    }

    pub fn total(&self) -> f64 {
        self.cells.iter().sum()
    }

    /// Rescales the truncated grid to sum to 1.
    ///
    /// A grid whose mass underflowed to zero (or went non-finite) is an input problem for the
    /// model that produced it, never a NaN result.
    pub fn normalized(mut self) -> Result<Self> {
        if self.cells.iter().any(|p| !p.is_finite() || *p < 0.0) {
            return Err(ModelError::invalid(
                "score matrix contains negative or non-finite cells",
            ));
        }
        let sum = self.total();
        if !(sum.is_finite() && sum > f64::MIN_POSITIVE) {
            return Err(ModelError::invalid(format!(
                "score matrix underflowed (sum = {sum:e})"
            )));
        }
        for p in &mut self.cells {
            *p /= sum;
        }
        Ok(self)
    }

    pub fn outcome_probs(&self) -> Prob3 {
        let mut p_home = 0.0_f64;
        let mut p_draw = 0.0_f64;
        let mut p_away = 0.0_f64;
        let n = self.max_goals + 1;
        for h in 0..n {
            for a in 0..n {
                let p = self.cells[h * n + a];
                if h > a {
                    p_home += p;
                } else if h == a {
                    p_draw += p;
                } else {
                    p_away += p;
                }
            }
        }
        Prob3::new(p_home, p_draw, p_away)
    }

    pub fn most_likely_score(&self) -> Score {
        self.top_scores(1)
            .first()
            .map(|s| s.score)
            .unwrap_or(Score::new(0, 0))
    }

    /// Highest-probability scorelines, best first.
    pub fn top_scores(&self, n: usize) -> Vec<ScoreProb> {
        let side = self.max_goals + 1;
        let mut all: Vec<ScoreProb> = self
            .cells
            .iter()
            .enumerate()
            .map(|(i, p)| ScoreProb {
                score: Score::new(clamp_u8(i / side), clamp_u8(i % side)),
                probability: *p,
            })
            .collect();
        all.sort_by(|a, b| b.probability.total_cmp(&a.probability));
        all.truncate(n);
        all
    }

    pub fn expected_goals(&self) -> ExpectedGoals {
        let n = self.max_goals + 1;
        let mut home = 0.0;
        let mut away = 0.0;
        for h in 0..n {
            for a in 0..n {
                let p = self.cells[h * n + a];
                home += h as f64 * p;
                away += a as f64 * p;
            }
        }
        ExpectedGoals { home, away }
    }

    /// PMF of home+away goals, 0..=2·max_goals.
    pub fn total_goals_pmf(&self) -> Vec<f64> {
        let n = self.max_goals + 1;
        let mut out = vec![0.0; 2 * self.max_goals + 1];
        for h in 0..n {
            for a in 0..n {
                out[h + a] += self.cells[h * n + a];
            }
        }
        out
    }

    pub fn totals(&self, lines: &[f64]) -> TotalsDistribution {
        totals_from_pmf(&self.total_goals_pmf(), lines)
    }

    pub fn rows(&self) -> Vec<Vec<f64>> {
        self.cells
            .chunks(self.max_goals + 1)
            .map(|row| row.to_vec())
            .collect()
    }
}

/// Summarises a total-goals PMF. `under` sums the PMF up to the line; `over` is its complement,
/// so any tail beyond the PMF counts as over.
pub fn totals_from_pmf(pmf: &[f64], lines: &[f64]) -> TotalsDistribution {
    let mut mean = 0.0;
    let mut second = 0.0;
    for (k, p) in pmf.iter().enumerate() {
        mean += k as f64 * p;
        second += (k * k) as f64 * p;
    }
    let most_likely_total = pmf
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.total_cmp(b.1))
        .map(|(k, _)| k)
        .unwrap_or(0);

    TotalsDistribution {
        expected_total: mean,
        variance: (second - mean * mean).max(0.0),
        most_likely_total,
        pmf: pmf.to_vec(),
        lines: over_under(pmf, lines),
    }
}

pub fn over_under(pmf: &[f64], lines: &[f64]) -> Vec<OverUnder> {
    lines
        .iter()
        .map(|&line| {
            let under: f64 = pmf
                .iter()
                .enumerate()
                .filter(|(k, _)| (*k as f64) < line)
                .map(|(_, p)| p)
                .sum();
            let under = under.clamp(0.0, 1.0);
            OverUnder {
                line,
                over: 1.0 - under,
                under,
            }
        })
        .collect()
}

fn clamp_u8(v: usize) -> u8 {
    u8::try_from(v).unwrap_or(u8::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_matrix_is_reported_as_invalid_input() {
        let m = ScoreMatrix::from_fn(3, |_, _| 0.0);
        assert!(matches!(m.normalized(), Err(ModelError::InvalidInput(_))));
    }

    #[test]
    fn outcome_sums_split_by_diagonal() {
        let m = ScoreMatrix::from_fn(1, |h, a| match (h, a) {
            (1, 0) => 0.5,
            (0, 0) | (1, 1) => 0.2,
            _ => 0.1,
        })
        .normalized()
        .unwrap();
        let p = m.outcome_probs();
        assert!((p.home - 0.5).abs() < 1e-12);
        assert!((p.draw - 0.4).abs() < 1e-12);
        assert!((p.away - 0.1).abs() < 1e-12);
        assert_eq!(m.most_likely_score(), Score::new(1, 0));
    }

    #[test]
    fn over_under_uses_strict_line() {
        let pmf = [0.1, 0.2, 0.3, 0.4];
        let lines = over_under(&pmf, &[0.5, 2.5]);
        assert!((lines[0].under - 0.1).abs() < 1e-12);
        assert!((lines[1].under - 0.6).abs() < 1e-12);
        assert!((lines[1].over - 0.4).abs() < 1e-12);
    }
}
