//! Evaluation module: the orchestrated pipeline and its accuracy metrics.

pub mod metrics;
pub mod runner;

pub use metrics::{AccuracyMeter, Metrics};
pub use runner::run_evaluation;
