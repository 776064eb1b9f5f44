//! Outlier detection -- isolation forest and supporting statistics.

pub mod forest;
pub mod stats;
mod tree;

pub use forest::{ForestParams, IsolationForest};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DetectError {
    #[error("cannot fit a model on an empty training set")]
    EmptyTrainingSet,

    #[error("contamination must be in (0, 0.5], got {0}")]
    InvalidContamination(f64),

    #[error("n_estimators must be at least 1")]
    NoEstimators,

    #[error("input value is not finite: {0}")]
    NonFiniteInput(f64),

    #[error("model has no fitted trees")]
    NotFitted,

    #[error("model structure is corrupt: {0}")]
    CorruptModel(String),
}

/// Binary classification produced by a fitted model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Inlier,
    Outlier,
}

impl Verdict {
    pub fn is_outlier(self) -> bool {
        matches!(self, Verdict::Outlier)
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Verdict::Inlier => write!(f, "normal"),
            Verdict::Outlier => write!(f, "anomaly"),
        }
    }
}
