use std::path::Path;
use std::sync::Arc;

use tracing::{error, info};

use crate::model::ModelArtifact;

/// Shared, read-only service context.
///
/// Built once at startup and cloned into every handler. `model` is `None`
/// when the artifact could not be loaded; the service then runs degraded.
#[derive(Clone, Default)]
pub struct AppState {
    pub model: Option<Arc<ModelArtifact>>,
}

impl AppState {
    pub fn new(model: ModelArtifact) -> Self {
        Self {
            model: Some(Arc::new(model)),
        }
    }

    /// Load the artifact at `path`, falling back to degraded mode on any failure.
    pub fn load(path: &Path) -> Self {
        match ModelArtifact::load(path) {
            Ok(model) => {
                info!(path = %path.display(), "anomaly model ready");
                Self::new(model)
            }
            Err(e) => {
                let reason = format!("{:#}", e);
                error!(
                    path = %path.display(),
                    error = %reason,
                    "failed to load anomaly model, starting in degraded mode"
                );
                Self::default()
            }
        }
    }

    pub fn is_ready(&self) -> bool {
        self.model.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_model_degrades() {
        let state = AppState::load(Path::new("/nonexistent/anomaly_model.json"));
        assert!(!state.is_ready());
    }

    #[test]
    fn test_corrupt_model_degrades() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("anomaly_model.json");
        std::fs::write(&path, b"\x00\x01 not a model").unwrap();
        assert!(!AppState::load(&path).is_ready());
    }

    #[test]
    fn test_structurally_broken_model_degrades() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("anomaly_model.json");

        let cfg = crate::config::TrainingConfig {
            n_estimators: 5,
            ..Default::default()
        };
        crate::training::fit_model(&cfg).unwrap().save(&path).unwrap();

        let mut doc: serde_json::Value =
            serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        doc["forest"]["trees"][0]["nodes"] = serde_json::json!([]);
        std::fs::write(&path, serde_json::to_vec(&doc).unwrap()).unwrap();

        assert!(!AppState::load(&path).is_ready());
    }
}
