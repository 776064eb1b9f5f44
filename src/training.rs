//! Offline trainer: synthesize power readings, fit the forest, persist it.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use serde::Serialize;
use tracing::{info, warn};

use crate::config::TrainingConfig;
use crate::detect::stats::Summary;
use crate::detect::{IsolationForest, Verdict};
use crate::model::ModelArtifact;

/// Readings checked after every training run, with the verdict each should get.
pub const SMOKE_POINTS: [(f64, Verdict); 2] = [(75.0, Verdict::Inlier), (500.0, Verdict::Outlier)];

/// Result of the post-save prediction check for one reading.
#[derive(Debug, Clone, Serialize)]
pub struct SmokeCheck {
    pub power: f64,
    pub expected: Verdict,
    pub actual: Verdict,
    pub anomaly_score: f64,
}

impl SmokeCheck {
    pub fn passed(&self) -> bool {
        self.expected == self.actual
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TrainingReport {
    pub model_path: PathBuf,
    pub summary: Summary,
    pub offset: f64,
    pub checks: Vec<SmokeCheck>,
}

/// Draw `cfg.samples` non-negative readings from N(mean, std_dev) with a fixed seed.
pub fn create_training_data(cfg: &TrainingConfig) -> Result<Vec<f64>> {
    if cfg.samples == 0 {
        bail!("training requires at least one sample");
    }
    if !(cfg.mean.is_finite() && cfg.std_dev.is_finite() && cfg.std_dev > 0.0) {
        bail!(
            "invalid training distribution: mean={} std_dev={} (std_dev must be finite and positive)",
            cfg.mean,
            cfg.std_dev
        );
    }
    let normal = Normal::new(cfg.mean, cfg.std_dev).with_context(|| {
        format!(
            "invalid training distribution: mean={} std_dev={}",
            cfg.mean, cfg.std_dev
        )
    })?;
    let mut rng = StdRng::seed_from_u64(cfg.seed);

    let data: Vec<f64> = (0..cfg.samples)
        .map(|_| normal.sample(&mut rng).abs())
        .collect();

    let summary = Summary::of(&data);
    info!(
        samples = summary.count,
        mean = summary.mean,
        std_dev = summary.std_dev,
        min = summary.min,
        max = summary.max,
        "training data created"
    );
    Ok(data)
}

/// Fit the forest on synthetic data, save it to `model_path` and run the smoke check.
///
/// Smoke check mismatches are reported, never returned as errors.
pub fn train_anomaly_model(cfg: &TrainingConfig, model_path: &Path) -> Result<TrainingReport> {
    info!("starting anomaly model training");

    let (artifact, summary) = fit(cfg)?;
    artifact.save(model_path)?;

    let checks = smoke_test(&artifact)?;

    Ok(TrainingReport {
        model_path: model_path.to_path_buf(),
        summary,
        offset: artifact.forest.offset(),
        checks,
    })
}

/// Generate data and fit a model in memory, without touching the filesystem.
pub fn fit_model(cfg: &TrainingConfig) -> Result<ModelArtifact> {
    fit(cfg).map(|(artifact, _)| artifact)
}

fn fit(cfg: &TrainingConfig) -> Result<(ModelArtifact, Summary)> {
    let data = create_training_data(cfg)?;
    let summary = Summary::of(&data);

    info!(
        n_estimators = cfg.n_estimators,
        max_samples = cfg.max_samples,
        contamination = cfg.contamination,
        "fitting isolation forest"
    );
    let mut rng = StdRng::seed_from_u64(cfg.seed);
    let forest = IsolationForest::fit(&data, cfg.forest_params(), &mut rng)
        .context("failed to fit isolation forest")?;

    Ok((ModelArtifact::new(cfg.clone(), forest), summary))
}

fn smoke_test(artifact: &ModelArtifact) -> Result<Vec<SmokeCheck>> {
    let mut checks = Vec::with_capacity(SMOKE_POINTS.len());
    for (power, expected) in SMOKE_POINTS {
        let analysis = artifact
            .analyze(power)
            .with_context(|| format!("smoke prediction failed for {} W", power))?;
        let actual = if analysis.is_anomaly {
            Verdict::Outlier
        } else {
            Verdict::Inlier
        };

        let check = SmokeCheck {
            power,
            expected,
            actual,
            anomaly_score: analysis.anomaly_score,
        };
        if check.passed() {
            info!(power, verdict = %actual, score = analysis.anomaly_score, "smoke check");
        } else {
            warn!(
                power,
                expected = %expected,
                verdict = %actual,
                score = analysis.anomaly_score,
                "smoke check disagrees with expected verdict"
            );
        }
        checks.push(check);
    }
    Ok(checks)
}
