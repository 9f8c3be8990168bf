//! Model artifact loading and prediction. The artifact is a JSON file
//! produced by the offline training notebook: a standardization scaler plus
//! two linear heads — a quality regressor (0-100 target) and a logistic
//! price-drop classifier.

use std::path::Path;

use serde::Deserialize;
use tracing::{info, warn};

use crate::error::{AppError, Result};
use crate::ml::features::{FeatureVector, FEATURE_COUNT, FEATURE_NAMES};
use crate::types::MlPrediction;

#[derive(Debug, Clone, Deserialize)]
pub struct ModelArtifact {
    pub feature_names: Vec<String>,
    pub scaler_mean: Vec<f64>,
    pub scaler_std: Vec<f64>,
    pub quality_weights: Vec<f64>,
    pub quality_intercept: f64,
    pub drop_weights: Vec<f64>,
    pub drop_intercept: f64,
}

impl ModelArtifact {
    /// Load and validate an artifact from disk.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let artifact: ModelArtifact = serde_json::from_str(&raw)?;
        artifact.validate()?;
        Ok(artifact)
    }

    /// Load if present. Missing or unreadable artifact logs and returns None —
    /// the scorer then runs the discount-only path.
    pub fn load_optional(path: &Path) -> Option<Self> {
        match Self::load(path) {
            Ok(artifact) => {
                info!("Model artifact loaded from {}", path.display());
                Some(artifact)
            }
            Err(e) => {
                warn!(
                    "Model artifact unavailable at {} ({e}) — falling back to discount-only scoring",
                    path.display()
                );
                None
            }
        }
    }

    fn validate(&self) -> Result<()> {
        if self.feature_names.len() != FEATURE_COUNT {
            return Err(AppError::Model(format!(
                "artifact has {} features, expected {}",
                self.feature_names.len(),
                FEATURE_COUNT
            )));
        }
        for (i, (have, want)) in self.feature_names.iter().zip(FEATURE_NAMES).enumerate() {
            if have != want {
                return Err(AppError::Model(format!(
                    "feature {i} is {have:?}, expected {want:?}"
                )));
            }
        }
        for (name, v) in [
            ("scaler_mean", &self.scaler_mean),
            ("scaler_std", &self.scaler_std),
            ("quality_weights", &self.quality_weights),
            ("drop_weights", &self.drop_weights),
        ] {
            if v.len() != FEATURE_COUNT {
                return Err(AppError::Model(format!(
                    "{name} has {} entries, expected {}",
                    v.len(),
                    FEATURE_COUNT
                )));
            }
        }
        Ok(())
    }

    /// Predict for one feature vector. Deterministic.
    pub fn predict(&self, features: &FeatureVector) -> MlPrediction {
        let scaled: Vec<f64> = features
            .as_slice()
            .iter()
            .zip(&self.scaler_mean)
            .zip(&self.scaler_std)
            .map(|((x, mean), std)| if *std > 0.0 { (x - mean) / std } else { 0.0 })
            .collect();

        let quality = dot(&scaled, &self.quality_weights) + self.quality_intercept;
        let probability_good = quality.clamp(0.0, 100.0);

        let drop_logit = dot(&scaled, &self.drop_weights) + self.drop_intercept;
        let drop_probability = sigmoid(drop_logit) * 100.0;

        MlPrediction { probability_good, drop_probability }
    }
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, w)| x * w).sum()
}

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DealRecord, Source};

    fn artifact_json(feature_names: &[&str]) -> String {
        let n = feature_names.len();
        // Identity scaler; quality reads the discount feature only
        let mut quality_weights = vec![0.0; n];
        if n > 1 {
            quality_weights[1] = 1.0;
        }
        serde_json::json!({
            "feature_names": feature_names,
            "scaler_mean": vec![0.0; n],
            "scaler_std": vec![1.0; n],
            "quality_weights": quality_weights,
            "quality_intercept": 10.0,
            "drop_weights": vec![0.0; n],
            "drop_intercept": 0.0,
        })
        .to_string()
    }

    fn deal(discount: f64) -> DealRecord {
        DealRecord {
            title: "Test".to_string(),
            link: "https://example.com/x".to_string(),
            price_text: None,
            price_numeric: Some(100.0),
            original_price: None,
            discount_percent: Some(discount),
            category: None,
            source: Source::Slickdeals,
            rating: None,
            reviews_count: None,
            in_stock: true,
            scraped_at: 1_700_000_000,
        }
    }

    #[test]
    fn load_missing_file_is_err_not_panic() {
        let err = ModelArtifact::load(Path::new("/nonexistent/deal_model.json"));
        assert!(err.is_err());
        assert!(ModelArtifact::load_optional(Path::new("/nonexistent/deal_model.json")).is_none());
    }

    #[test]
    fn corrupt_artifact_is_err() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("deal_model.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(ModelArtifact::load(&path).is_err());
        assert!(ModelArtifact::load_optional(&path).is_none());
    }

    #[test]
    fn wrong_feature_order_rejected() {
        let mut names: Vec<&str> = FEATURE_NAMES.to_vec();
        names.swap(0, 1);
        let artifact: ModelArtifact = serde_json::from_str(&artifact_json(&names)).unwrap();
        assert!(artifact.validate().is_err());
    }

    #[test]
    fn wrong_feature_count_rejected() {
        let names = &FEATURE_NAMES[..5];
        let artifact: ModelArtifact = serde_json::from_str(&artifact_json(names)).unwrap();
        assert!(artifact.validate().is_err());
    }

    #[test]
    fn predict_is_deterministic_and_clamped() {
        let artifact: ModelArtifact =
            serde_json::from_str(&artifact_json(&FEATURE_NAMES)).unwrap();
        artifact.validate().unwrap();

        let features = FeatureVector::build(&deal(40.0), &[]);
        let a = artifact.predict(&features);
        let b = artifact.predict(&features);
        assert_eq!(a, b);
        // identity scaler, weight 1 on discount, intercept 10 → 50
        assert!((a.probability_good - 50.0).abs() < 1e-9);
        assert!((0.0..=100.0).contains(&a.drop_probability));

        // Extreme discount clamps instead of overflowing the scale
        let extreme = FeatureVector::build(&deal(100.0), &[]);
        assert!(artifact.predict(&extreme).probability_good <= 100.0);
    }

    #[test]
    fn zero_std_features_are_ignored() {
        let mut artifact: ModelArtifact =
            serde_json::from_str(&artifact_json(&FEATURE_NAMES)).unwrap();
        artifact.scaler_std[1] = 0.0;
        let features = FeatureVector::build(&deal(40.0), &[]);
        // Discount contribution drops out, only the intercept remains
        assert!((artifact.predict(&features).probability_good - 10.0).abs() < 1e-9);
    }
}
