//! Multi-model match outcome forecasting.
//!
//! Independent probabilistic models turn team-strength inputs into outcome distributions; a
//! consensus step merges whatever succeeded, and a tier policy decides which models run.

pub mod bivariate_poisson;
pub mod classifier;
pub mod config;
pub mod consensus;
pub mod dixon_coles;
pub mod elo;
pub mod engine;
pub mod error;
pub mod fixtures;
pub mod inputs;
pub mod models;
pub mod negative_binomial;
pub mod poisson;
pub mod probs;
pub mod scoregrid;
pub mod skellam;
pub mod special;
pub mod strength;
pub mod survival;
pub mod tiers;
pub mod zero_inflated;
