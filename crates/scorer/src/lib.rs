//! Telemetry feature transform and anomaly model inference.
//!
//! The feature transform is a fixed deterministic function, not an algorithm
//! of interest: a single sample's eleven signals are laid out as
//! `[values, zeros, values, values]` — the mean/std/min/max aggregate layout
//! the model was trained on, degenerate for a window of one.
//!
//! The model itself is a per-dimension normalizer with a decision threshold,
//! serialized as JSON by the (out-of-scope) training pipeline. A missing
//! model file is not an error; the service then runs without scoring.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use tracing::info;

use voltdesk_core::telemetry::TelemetryReading;

/// Dimensionality of the model input: 11 signals x 4 aggregate slots.
pub const FEATURE_DIM: usize = 44;

const SIGNAL_COUNT: usize = 11;
const EPSILON: f64 = 1e-9;

/// Build the model input vector for a single telemetry sample.
pub fn feature_vector(reading: &TelemetryReading) -> Vec<f64> {
    let signals = reading.signals();
    let mut feat = Vec::with_capacity(FEATURE_DIM);
    feat.extend_from_slice(&signals); // mean
    feat.extend(std::iter::repeat_n(0.0, SIGNAL_COUNT)); // std of one sample
    feat.extend_from_slice(&signals); // min
    feat.extend_from_slice(&signals); // max
    feat
}

/// Scorer errors.
#[derive(Debug, Error)]
pub enum ScorerError {
    #[error("Failed to read model file at {path}: {reason}")]
    ReadError { path: String, reason: String },

    #[error("Failed to parse model file at {path}: {reason}")]
    ParseError { path: String, reason: String },

    #[error("Model shape mismatch: expected {expected} dimensions, got {got}")]
    ShapeMismatch { expected: usize, got: usize },
}

/// A loaded anomaly model. Stateless once loaded: scoring is a pure
/// function of the feature vector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnomalyModel {
    /// Per-dimension means from the training set
    pub means: Vec<f64>,
    /// Per-dimension standard deviations from the training set
    pub stds: Vec<f64>,
    /// Scores below this value are labelled anomalous
    pub threshold: f64,
}

/// Prediction labels, matching the convention of the training pipeline.
pub const LABEL_NORMAL: i8 = 1;
pub const LABEL_ANOMALY: i8 = -1;

impl AnomalyModel {
    /// Load a model from a JSON file. `Ok(None)` when the file does not
    /// exist — the caller decides whether to run without scoring.
    pub fn load(path: &Path) -> Result<Option<Self>, ScorerError> {
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(path).map_err(|e| ScorerError::ReadError {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        let model: Self =
            serde_json::from_str(&content).map_err(|e| ScorerError::ParseError {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;
        model.check_shape()?;
        info!("Anomaly model loaded from {}", path.display());
        Ok(Some(model))
    }

    fn check_shape(&self) -> Result<(), ScorerError> {
        for len in [self.means.len(), self.stds.len()] {
            if len != FEATURE_DIM {
                return Err(ScorerError::ShapeMismatch {
                    expected: FEATURE_DIM,
                    got: len,
                });
            }
        }
        Ok(())
    }

    /// Anomaly score for a feature vector. Higher is more normal; a vector
    /// sitting exactly on the training means scores 0.
    pub fn score(&self, features: &[f64]) -> f64 {
        let deviation: f64 = features
            .iter()
            .zip(self.means.iter().zip(&self.stds))
            .map(|(x, (mean, std))| (x - mean).abs() / std.max(EPSILON))
            .sum::<f64>()
            / FEATURE_DIM as f64;
        -deviation
    }

    /// Classify a feature vector: [`LABEL_NORMAL`] or [`LABEL_ANOMALY`].
    pub fn predict(&self, features: &[f64]) -> i8 {
        if self.score(features) < self.threshold {
            LABEL_ANOMALY
        } else {
            LABEL_NORMAL
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn reading() -> TelemetryReading {
        serde_json::from_value(serde_json::json!({
            "time_s": 0,
            "pack_voltage": 400.0, "pack_current": 10.0,
            "soc": 80.0, "soh": 99.0,
            "cell_temp_max": 30.0, "cell_temp_min": 28.0,
            "coolant_temp": 29.0, "motor_rpm": 3000.0,
            "motor_torque": 100.0, "inverter_temp": 40.0,
            "speed_kph": 50.0
        }))
        .unwrap()
    }

    fn centered_model() -> AnomalyModel {
        AnomalyModel {
            means: feature_vector(&reading()),
            stds: vec![1.0; FEATURE_DIM],
            threshold: -0.5,
        }
    }

    #[test]
    fn feature_vector_has_fixed_layout() {
        let feat = feature_vector(&reading());
        assert_eq!(feat.len(), FEATURE_DIM);
        // value block, zero std block, then values twice more
        assert_eq!(feat[0], 400.0);
        assert_eq!(&feat[11..22], &[0.0; 11]);
        assert_eq!(feat[22], 400.0);
        assert_eq!(feat[33], 400.0);
        assert_eq!(feat[43], 50.0); // speed_kph in the max block
    }

    #[test]
    fn on_mean_sample_scores_zero_and_normal() {
        let model = centered_model();
        let feat = feature_vector(&reading());
        assert_eq!(model.score(&feat), 0.0);
        assert_eq!(model.predict(&feat), LABEL_NORMAL);
    }

    #[test]
    fn deviant_sample_is_anomalous() {
        let model = centered_model();
        let mut r = reading();
        r.coolant_temp = 120.0; // far off the training mean
        let feat = feature_vector(&r);
        assert!(model.score(&feat) < model.threshold);
        assert_eq!(model.predict(&feat), LABEL_ANOMALY);
    }

    #[test]
    fn missing_model_file_is_none() {
        let loaded = AnomalyModel::load(Path::new("/nonexistent/model.json")).unwrap();
        assert!(loaded.is_none());
    }

    #[test]
    fn model_load_roundtrip() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{}", serde_json::to_string(&centered_model()).unwrap()).unwrap();
        let loaded = AnomalyModel::load(file.path()).unwrap().unwrap();
        assert_eq!(loaded.threshold, -0.5);
    }

    #[test]
    fn wrong_shape_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        let bad = AnomalyModel {
            means: vec![0.0; 3],
            stds: vec![1.0; 3],
            threshold: 0.0,
        };
        write!(file, "{}", serde_json::to_string(&bad).unwrap()).unwrap();
        assert!(matches!(
            AnomalyModel::load(file.path()),
            Err(ScorerError::ShapeMismatch { .. })
        ));
    }
}
