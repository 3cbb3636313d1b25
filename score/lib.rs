#![deny(unused_variables)]
#![deny(dead_code)]
#![deny(unused_imports)]
#![deny(clippy::no_effect_underscore_binding)]
pub mod dispatch;
pub mod engine;
pub mod link;
pub mod pooled_cohort;
pub mod prevent;
pub mod types;

#[path = "../inputs/mod.rs"]
pub mod inputs;

#[path = "../coefficients/mod.rs"]
pub mod coefficients;

pub use engine::{EngineOptions, RiskError, RiskPrediction, RiskRequest, predict_risk};
