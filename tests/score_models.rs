use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use match_forecast::bivariate_poisson::BivariatePoissonModel;
use match_forecast::dixon_coles::DixonColesModel;
use match_forecast::inputs::{ExpectedGoals, MatchContext, TeamStrength};
use match_forecast::models::{OutcomeModel, ScoreModel};
use match_forecast::poisson::PoissonModel;
use match_forecast::scoregrid::GridSpec;
use match_forecast::skellam::GoalDifferenceDistribution;
use match_forecast::zero_inflated::ZeroInflatedModel;

fn reference_context() -> MatchContext {
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

fn random_xg(rng: &mut StdRng) -> ExpectedGoals {
    ExpectedGoals {
        home: rng.gen_range(0.05..6.0),
        away: rng.gen_range(0.05..6.0),
    }
}

#[test]
fn poisson_reference_match_is_pinned() {
    let r = PoissonModel::new(GridSpec::default())
        .predict(&reference_context())
        .unwrap();
    let p = r.outcome_probabilities;
    assert!((p.home - 0.437_634_100_667_648_35).abs() < 1e-9);
    assert!((p.draw - 0.255_958_441_648_815_76).abs() < 1e-9);
    assert!((p.away - 0.306_407_457_683_535_94).abs() < 1e-9);

    let xg = r.expected_goals.unwrap();
    assert!((xg.home - 1.485).abs() < 1e-12);
    assert!((xg.away - 1.2).abs() < 1e-12);

    let m = r.scoreline_matrix.unwrap();
    assert!((m.get(0, 0) - 0.068_221_232_405_502_14).abs() < 1e-9);
    assert!((m.get(1, 1) - 0.121_570_236_146_604_84).abs() < 1e-9);
    assert_eq!(r.top_scores.len(), 5);
    assert_eq!(r.most_likely_score, Some(r.top_scores[0].score));
}

#[test]
fn every_score_matrix_sums_to_one() {
    let mut rng = StdRng::seed_from_u64(0x5eed);
    let grid = GridSpec::default();
    let poisson = PoissonModel::new(grid.clone());
    let dc = DixonColesModel::new(grid.clone(), -0.13).unwrap();
    let bp = BivariatePoissonModel::new(grid.clone(), 0.1).unwrap();
    let zip = ZeroInflatedModel::new(grid, 0.1).unwrap();

    for _ in 0..200 {
        let xg = random_xg(&mut rng);
        for m in [
            poisson.score_matrix(xg).unwrap(),
            dc.score_matrix(xg).unwrap(),
            bp.score_matrix(xg).unwrap(),
            zip.score_matrix(xg).unwrap(),
        ] {
            assert!((m.total() - 1.0).abs() < 1e-6, "{xg:?}");
            assert!((m.outcome_probs().sum() - 1.0).abs() < 1e-6);
        }
    }
}

#[test]
fn skellam_outcomes_sum_to_one_up_to_ten_goals() {
    let mut rng = StdRng::seed_from_u64(42);
    for _ in 0..200 {
        let l1 = rng.gen_range(0.05..10.0);
        let l2 = rng.gen_range(0.05..10.0);
        let d = GoalDifferenceDistribution::new(l1, l2, 20).unwrap();
        let p = d.outcome_probs();
        assert!((p.home + p.draw + p.away - 1.0).abs() < 1e-6, "{l1} {l2}");
    }
}

#[test]
fn skellam_agrees_with_untruncated_poisson_grid() {
    let xg = ExpectedGoals {
        home: 1.485,
        away: 1.2,
    };
    let wide = GridSpec {
        max_goals: 40,
        ..GridSpec::default()
    };
    let grid = PoissonModel::new(wide).score_matrix(xg).unwrap().outcome_probs();
    let sk = GoalDifferenceDistribution::new(xg.home, xg.away, 20)
        .unwrap()
        .outcome_probs();
    assert!((grid.home - sk.home).abs() < 1e-9);
    assert!((grid.draw - sk.draw).abs() < 1e-9);
}

#[test]
fn zero_inflation_is_monotone_in_pi() {
    let xg = ExpectedGoals {
        home: 2.2,
        away: 0.7,
    };
    let mut last = 0.0;
    for step in 0..20 {
        let pi = step as f64 * 0.05;
        let m = ZeroInflatedModel::new(GridSpec::default(), pi)
            .unwrap()
            .score_matrix(xg)
            .unwrap();
        assert!(m.get(0, 0) > last);
        last = m.get(0, 0);
    }
}

#[test]
fn invalid_strength_is_rejected_not_nan() {
    let mut ctx = reference_context();
    ctx.away.defense = 0.0;
    assert!(PoissonModel::new(GridSpec::default()).predict(&ctx).is_err());
    ctx.away.defense = f64::INFINITY;
    assert!(PoissonModel::new(GridSpec::default()).predict(&ctx).is_err());
}
