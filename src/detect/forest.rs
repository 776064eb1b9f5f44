//! Isolation forest over a single scalar feature.
//!
//! Outliers are few and far from the bulk of the data, so random axis splits
//! isolate them in fewer steps than inliers. The anomaly score is derived from
//! the average isolation depth across trees and calibrated against the
//! training set so that roughly `contamination` of it scores below zero.

use rand::Rng;
use serde::{Deserialize, Serialize};

use super::stats::percentile;
use super::tree::{average_path_length, IsolationTree};
use super::{DetectError, Verdict};

/// Hyperparameters for fitting an [`IsolationForest`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ForestParams {
    /// Number of trees in the ensemble.
    pub n_estimators: usize,
    /// Subsample size per tree (clamped to the training set size).
    pub max_samples: usize,
    /// Expected proportion of outliers in the training data.
    pub contamination: f64,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            max_samples: 256,
            contamination: 0.05,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IsolationForest {
    params: ForestParams,
    sample_size: usize,
    offset: f64,
    trees: Vec<IsolationTree>,
}

impl IsolationForest {
    /// Fit the forest on `samples`, drawing all randomness from `rng`.
    pub fn fit<R: Rng + ?Sized>(
        samples: &[f64],
        params: ForestParams,
        rng: &mut R,
    ) -> Result<Self, DetectError> {
        if samples.is_empty() {
            return Err(DetectError::EmptyTrainingSet);
        }
        if !(params.contamination > 0.0 && params.contamination <= 0.5) {
            return Err(DetectError::InvalidContamination(params.contamination));
        }
        if params.n_estimators == 0 {
            return Err(DetectError::NoEstimators);
        }
        if let Some(&bad) = samples.iter().find(|v| !v.is_finite()) {
            return Err(DetectError::NonFiniteInput(bad));
        }

        let sample_size = params.max_samples.clamp(1, samples.len());
        let max_depth = (sample_size.max(2) as f64).log2().ceil() as usize;

        let trees = (0..params.n_estimators)
            .map(|_| {
                let subsample: Vec<f64> =
                    rand::seq::index::sample(&mut *rng, samples.len(), sample_size)
                        .iter()
                        .map(|i| samples[i])
                        .collect();
                IsolationTree::grow(&subsample, max_depth, &mut *rng)
            })
            .collect();

        let mut forest = Self {
            params,
            sample_size,
            offset: 0.0,
            trees,
        };

        let training_scores = samples
            .iter()
            .map(|&x| forest.raw_score(x))
            .collect::<Result<Vec<f64>, _>>()?;
        forest.offset = percentile(&training_scores, 100.0 * forest.params.contamination)
            .ok_or(DetectError::EmptyTrainingSet)?;

        tracing::debug!(
            trees = forest.trees.len(),
            sample_size,
            max_depth,
            offset = forest.offset,
            "isolation forest fitted"
        );

        Ok(forest)
    }

    /// Opposite of the normalised anomaly score: in `[-1, 0)`, lower is more abnormal.
    pub fn score_samples(&self, x: f64) -> Result<f64, DetectError> {
        self.check(x)?;
        self.raw_score(x)
    }

    /// Score shifted by the calibrated offset. Negative means outlier.
    pub fn decision_function(&self, x: f64) -> Result<f64, DetectError> {
        Ok(self.score_samples(x)? - self.offset)
    }

    pub fn predict(&self, x: f64) -> Result<Verdict, DetectError> {
        if self.decision_function(x)? < 0.0 {
            Ok(Verdict::Outlier)
        } else {
            Ok(Verdict::Inlier)
        }
    }

    pub fn params(&self) -> &ForestParams {
        &self.params
    }

    pub fn offset(&self) -> f64 {
        self.offset
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn sample_size(&self) -> usize {
        self.sample_size
    }

    /// Verify the structure of a deserialized forest before it is used.
    pub fn validate(&self) -> Result<(), DetectError> {
        if self.trees.is_empty() {
            return Err(DetectError::NotFitted);
        }
        if self.sample_size == 0 {
            return Err(DetectError::CorruptModel("sample_size is 0".to_string()));
        }
        if !self.offset.is_finite() {
            return Err(DetectError::CorruptModel("offset is not finite".to_string()));
        }
        for (i, tree) in self.trees.iter().enumerate() {
            tree.validate().map_err(|e| match e {
                DetectError::CorruptModel(reason) => {
                    DetectError::CorruptModel(format!("tree {}: {}", i, reason))
                }
                other => other,
            })?;
        }
        Ok(())
    }

    fn check(&self, x: f64) -> Result<(), DetectError> {
        if self.trees.is_empty() {
            return Err(DetectError::NotFitted);
        }
        if !x.is_finite() {
            return Err(DetectError::NonFiniteInput(x));
        }
        Ok(())
    }

    fn raw_score(&self, x: f64) -> Result<f64, DetectError> {
        let mut total_depth = 0.0;
        for tree in &self.trees {
            total_depth += tree.path_length(x)?;
        }
        let mean_depth = total_depth / self.trees.len() as f64;
        let normaliser = average_path_length(self.sample_size).max(1.0);
        Ok(-(2.0_f64).powf(-mean_depth / normaliser))
    }
}
