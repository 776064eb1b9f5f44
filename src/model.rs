//! Persisted model artifact.
//!
//! The artifact is a JSON document carrying a format version, the training
//! parameters it was built from, and the fitted forest itself. The trainer
//! writes it once; the service reads it once at startup.

use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::TrainingConfig;
use crate::detect::{DetectError, IsolationForest};

/// Bumped whenever the on-disk layout changes incompatibly.
pub const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub format_version: u32,
    pub trained_at: DateTime<Utc>,
    pub training: TrainingConfig,
    pub forest: IsolationForest,
}

/// Outcome of scoring one power reading.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Analysis {
    pub is_anomaly: bool,
    pub anomaly_score: f64,
}

impl ModelArtifact {
    pub fn new(training: TrainingConfig, forest: IsolationForest) -> Self {
        Self {
            format_version: FORMAT_VERSION,
            trained_at: Utc::now(),
            training,
            forest,
        }
    }

    /// Write the artifact to `path`, creating the parent directory and
    /// replacing any previous file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)
                .with_context(|| format!("failed to create model directory: {}", dir.display()))?;
        }

        let json = serde_json::to_vec(self).context("failed to serialize model")?;
        fs::write(path, json)
            .with_context(|| format!("failed to write model file: {}", path.display()))?;

        info!(path = %path.display(), trees = self.forest.n_trees(), "model saved");
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read(path)
            .with_context(|| format!("failed to read model file: {}", path.display()))?;
        let artifact: Self = serde_json::from_slice(&content)
            .with_context(|| format!("failed to parse model file: {}", path.display()))?;

        if artifact.format_version != FORMAT_VERSION {
            bail!(
                "unsupported model format version {} in {} (expected {})",
                artifact.format_version,
                path.display(),
                FORMAT_VERSION
            );
        }
        artifact
            .forest
            .validate()
            .with_context(|| format!("invalid model in {}", path.display()))?;

        info!(
            path = %path.display(),
            trained_at = %artifact.trained_at,
            trees = artifact.forest.n_trees(),
            "model loaded"
        );
        Ok(artifact)
    }

    /// Classify one reading and report its decision-function score.
    pub fn analyze(&self, power: f64) -> Result<Analysis, DetectError> {
        let verdict = self.forest.predict(power)?;
        let anomaly_score = self.forest.decision_function(power)?;
        Ok(Analysis {
            is_anomaly: verdict.is_outlier(),
            anomaly_score,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::ForestParams;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use rand_distr::{Distribution, Normal};

    fn small_artifact() -> ModelArtifact {
        let mut rng = StdRng::seed_from_u64(42);
        let normal = Normal::new(70.0_f64, 25.0).unwrap();
        let samples: Vec<f64> = (0..300).map(|_| normal.sample(&mut rng).abs()).collect();
        let params = ForestParams {
            n_estimators: 20,
            ..ForestParams::default()
        };
        let forest = IsolationForest::fit(&samples, params, &mut rng).unwrap();
        ModelArtifact::new(TrainingConfig::default(), forest)
    }

    #[test]
    fn test_save_creates_directory_and_loads_back() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("models").join("anomaly_model.json");

        let artifact = small_artifact();
        artifact.save(&path).unwrap();
        assert!(path.exists());

        let loaded = ModelArtifact::load(&path).unwrap();
        assert_eq!(loaded.format_version, FORMAT_VERSION);
        assert_eq!(loaded.training, artifact.training);
        for power in [50.0, 70.0, 300.0] {
            assert_eq!(loaded.analyze(power).unwrap(), artifact.analyze(power).unwrap());
        }
    }

    #[test]
    fn test_save_overwrites_existing_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("anomaly_model.json");
        fs::write(&path, b"stale").unwrap();

        small_artifact().save(&path).unwrap();
        assert!(ModelArtifact::load(&path).is_ok());
    }

    #[test]
    fn test_load_missing_file_errors() {
        let result = ModelArtifact::load(Path::new("/nonexistent/anomaly_model.json"));
        assert!(result.is_err());
    }

    #[test]
    fn test_load_garbage_errors() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("anomaly_model.json");
        fs::write(&path, b"{not json").unwrap();
        assert!(ModelArtifact::load(&path).is_err());
    }

    #[test]
    fn test_load_rejects_other_format_version() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("anomaly_model.json");

        let mut artifact = small_artifact();
        artifact.format_version = FORMAT_VERSION + 1;
        artifact.save(&path).unwrap();

        let err = ModelArtifact::load(&path).unwrap_err();
        assert!(err.to_string().contains("unsupported model format version"));
    }

    /// Save a good artifact, then rewrite part of its JSON in place.
    fn save_tampered(path: &Path, tamper: impl FnOnce(&mut serde_json::Value)) {
        small_artifact().save(path).unwrap();
        let mut doc: serde_json::Value = serde_json::from_slice(&fs::read(path).unwrap()).unwrap();
        tamper(&mut doc);
        fs::write(path, serde_json::to_vec(&doc).unwrap()).unwrap();
    }

    #[test]
    fn test_load_rejects_tree_without_nodes() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("anomaly_model.json");
        save_tampered(&path, |doc| {
            doc["forest"]["trees"][0]["nodes"] = serde_json::json!([]);
        });

        let err = ModelArtifact::load(&path).unwrap_err();
        assert!(format!("{:#}", err).contains("tree has no nodes"), "{:#}", err);
    }

    #[test]
    fn test_load_rejects_dangling_and_cyclic_children() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("anomaly_model.json");

        save_tampered(&path, |doc| {
            doc["forest"]["trees"][0]["nodes"] = serde_json::json!([
                { "kind": "split", "threshold": 70.0, "left": 1, "right": 42 },
                { "kind": "leaf", "size": 3 }
            ]);
        });
        assert!(ModelArtifact::load(&path).is_err());

        save_tampered(&path, |doc| {
            doc["forest"]["trees"][0]["nodes"] = serde_json::json!([
                { "kind": "split", "threshold": 70.0, "left": 0, "right": 1 },
                { "kind": "leaf", "size": 3 }
            ]);
        });
        assert!(ModelArtifact::load(&path).is_err());
    }

    #[test]
    fn test_load_rejects_zero_sample_size_and_empty_forest() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("anomaly_model.json");

        save_tampered(&path, |doc| doc["forest"]["sample_size"] = serde_json::json!(0));
        assert!(ModelArtifact::load(&path).is_err());

        save_tampered(&path, |doc| doc["forest"]["trees"] = serde_json::json!([]));
        assert!(ModelArtifact::load(&path).is_err());
    }

    #[test]
    fn test_analyze_is_repeatable() {
        let artifact = small_artifact();
        let first = artifact.analyze(64.0).unwrap();
        let second = artifact.analyze(64.0).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_analyze_flags_far_reading() {
        let artifact = small_artifact();
        let near = artifact.analyze(70.0).unwrap();
        let far = artifact.analyze(1_000.0).unwrap();
        assert!(far.is_anomaly);
        assert!(far.anomaly_score < 0.0);
        assert!(far.anomaly_score < near.anomaly_score);
    }
}
