//! Inference adapter: turns encoded feature vectors into verdicts

use crate::config::AppConfig;
use crate::error::{DetectorError, Result};
use crate::models::loader::{LoadedModel, ModelLoader};
use crate::types::verdict::Verdict;
use ort::memory::Allocator;
use ort::value::{DowncastableTarget, DynMapValueType, DynSequenceValueType, Tensor};
use std::path::Path;
use std::sync::Mutex;
use tracing::debug;

/// Anything that can score an encoded feature vector.
pub trait Classifier: Send + Sync {
    /// Score one vector.
    fn predict(&self, features: &[f32]) -> Result<Verdict>;

    /// Score several vectors; one result per input, in input order.
    fn predict_batch(&self, features_batch: &[Vec<f32>]) -> Vec<Result<Verdict>> {
        features_batch.iter().map(|f| self.predict(f)).collect()
    }

    /// Model name for logs and error messages
    fn name(&self) -> &str;

    /// Vector length the model was trained on
    fn feature_count(&self) -> usize;
}

/// Reject vectors of the wrong length or with non-finite values.
pub fn check_features(features: &[f32], expected: usize) -> Result<()> {
    if features.len() != expected {
        return Err(DetectorError::invalid_input(
            "features",
            format!("expected {expected} values, got {}", features.len()),
        ));
    }
    if let Some(i) = features.iter().position(|v| !v.is_finite()) {
        return Err(DetectorError::invalid_input(
            "features",
            format!("value at position {i} is not finite"),
        ));
    }
    Ok(())
}

/// Single-model inference engine using ONNX Runtime
pub struct InferenceEngine {
    /// Loaded ONNX model; running a session needs exclusive access
    model: Mutex<LoadedModel>,
    name: String,
    feature_count: usize,
    /// Probability cut-off for models without a label output
    threshold: f64,
}

impl InferenceEngine {
    /// Load the model named in the configuration
    pub fn new(config: &AppConfig, feature_count: usize) -> Result<Self> {
        Self::from_path(
            &config.model.path,
            feature_count,
            config.model.threshold,
            config.model.onnx_threads,
        )
    }

    /// Load a model from an explicit path
    pub fn from_path<P: AsRef<Path>>(
        path: P,
        feature_count: usize,
        threshold: f64,
        onnx_threads: usize,
    ) -> Result<Self> {
        let path = path.as_ref();
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "classifier".to_string());

        let loader = ModelLoader::with_threads(onnx_threads)?;
        let model = loader.load_model(path, &name)?;

        debug!(
            model = %name,
            feature_count = feature_count,
            threshold = threshold,
            "Inference engine initialized"
        );

        Ok(Self {
            model: Mutex::new(model),
            name,
            feature_count,
            threshold,
        })
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Run the model on features already checked for shape
    fn run_model(&self, model: &mut LoadedModel, features: &[f32]) -> Result<Verdict> {
        let shape = vec![1_i64, features.len() as i64];
        let input_tensor = Tensor::from_array((shape, features.to_vec()))
            .map_err(|e| DetectorError::inference(&self.name, e))?;

        let input_name = model.input_name.clone();
        let outputs = model
            .session
            .run(ort::inputs![input_name => input_tensor])
            .map_err(|e| DetectorError::inference(&self.name, e))?;

        let label = match &model.label_output {
            Some(name) => match outputs.get(name.as_str()) {
                Some(output) => output
                    .try_extract_tensor::<i64>()
                    .ok()
                    .and_then(|(_, labels)| labels.first().copied()),
                None => None,
            },
            None => None,
        };
        if let Some(label) = label {
            debug!(model = %self.name, label = label, "Extracted label");
            return verdict_from_outputs(&self.name, Some(label), None, self.threshold);
        }

        let probability = match model.probability_output.as_deref() {
            Some(name) => {
                let output = outputs.get(name).ok_or_else(|| {
                    DetectorError::inference(&self.name, format!("missing output {name}"))
                })?;
                let probability = self.extract_probability(output)?;
                debug!(model = %self.name, prob = probability, "Extracted fraud probability");
                Some(probability)
            }
            None => None,
        };
        verdict_from_outputs(&self.name, None, probability, self.threshold)
    }

    /// Extract fraud probability from a tensor or seq(map) output
    fn extract_probability(&self, output: &ort::value::DynValue) -> Result<f64> {
        if let Ok((shape, data)) = output.try_extract_tensor::<f32>() {
            return fraud_prob_from_tensor(&shape.iter().copied().collect::<Vec<i64>>(), data)
                .ok_or_else(|| DetectorError::inference(&self.name, "empty probability tensor"));
        }

        if DynSequenceValueType::can_downcast(output.dtype()) {
            return self.extract_from_sequence_map(output);
        }

        Err(DetectorError::inference(
            &self.name,
            "unsupported probability output type",
        ))
    }

    /// Extract class-1 probability from seq(map(int64, float)) output
    fn extract_from_sequence_map(&self, output: &ort::value::DynValue) -> Result<f64> {
        let allocator = Allocator::default();
        let err = |e: String| DetectorError::inference(&self.name, e);

        let sequence = output
            .downcast_ref::<DynSequenceValueType>()
            .map_err(|e| err(format!("failed to downcast to sequence: {e}")))?;
        let maps = sequence
            .try_extract_sequence::<DynMapValueType>(&allocator)
            .map_err(|e| err(e.to_string()))?;
        let map_value = maps.first().ok_or_else(|| err("empty sequence".to_string()))?;
        let kv_pairs = map_value
            .try_extract_key_values::<i64, f32>()
            .map_err(|e| err(e.to_string()))?;

        let class_prob = |class: i64| {
            kv_pairs
                .iter()
                .find(|(class_id, _)| *class_id == class)
                .map(|(_, prob)| *prob as f64)
        };
        class_prob(1)
            .or_else(|| class_prob(0).map(|p| 1.0 - p))
            .ok_or_else(|| err("no class probability in map".to_string()))
    }
}

impl Classifier for InferenceEngine {
    fn predict(&self, features: &[f32]) -> Result<Verdict> {
        check_features(features, self.feature_count)?;

        let mut model = self
            .model
            .lock()
            .map_err(|e| DetectorError::inference(&self.name, format!("lock error: {e}")))?;
        self.run_model(&mut model, features)
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn feature_count(&self) -> usize {
        self.feature_count
    }
}

/// Decide a verdict from what the model produced.
///
/// A label wins over a probability; a probability is fraud at or above
/// `threshold`. Anything else is an inference failure, never a third outcome.
fn verdict_from_outputs(
    model: &str,
    label: Option<i64>,
    probability: Option<f64>,
    threshold: f64,
) -> Result<Verdict> {
    match (label, probability) {
        (Some(label), _) => Verdict::from_label(label).ok_or_else(|| {
            DetectorError::inference(model, format!("label must be 0 or 1, got {label}"))
        }),
        (None, Some(probability)) if probability.is_finite() => {
            Ok(Verdict::from_probability(probability, threshold))
        }
        (None, Some(probability)) => Err(DetectorError::inference(
            model,
            format!("probability {probability} is not finite"),
        )),
        (None, None) => Err(DetectorError::inference(
            model,
            "model produced neither a label nor a probability",
        )),
    }
}

/// Fraud probability from `[batch, classes]`, `[classes]` or `[batch, 1]` data
fn fraud_prob_from_tensor(dims: &[i64], data: &[f32]) -> Option<f64> {
    let classes = dims.last().copied().unwrap_or(0);
    if classes >= 2 {
        data.get(1).map(|&p| p as f64)
    } else {
        data.first().map(|&p| p as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_features_length() {
        assert!(check_features(&[0.0; 53], 53).is_ok());

        let err = check_features(&[0.0; 52], 53).unwrap_err();
        assert!(err.is_input_error());
        assert!(err.to_string().contains("expected 53 values, got 52"));
    }

    #[test]
    fn test_check_features_rejects_nan() {
        let mut features = vec![0.0; 5];
        features[2] = f32::NAN;
        let err = check_features(&features, 5).unwrap_err();
        assert!(err.to_string().contains("position 2"));
    }

    #[test]
    fn test_fraud_prob_from_tensor_shapes() {
        assert_eq!(fraud_prob_from_tensor(&[1, 2], &[0.25, 0.75]), Some(0.75));
        assert_eq!(fraud_prob_from_tensor(&[2], &[0.9, 0.1]), Some(0.1f32 as f64));
        assert_eq!(fraud_prob_from_tensor(&[1, 1], &[0.5]), Some(0.5));
        assert_eq!(fraud_prob_from_tensor(&[1, 2], &[]), None);
    }

    #[test]
    fn test_verdict_from_label_output() {
        assert_eq!(
            verdict_from_outputs("xgb", Some(0), None, 0.5).unwrap(),
            Verdict::NotFraudulent
        );
        assert_eq!(
            verdict_from_outputs("xgb", Some(1), None, 0.5).unwrap(),
            Verdict::Fraudulent
        );
    }

    #[test]
    fn test_out_of_range_label_is_inference_error() {
        let err = verdict_from_outputs("xgb", Some(2), Some(0.9), 0.5).unwrap_err();
        assert_eq!(err.code(), "UPI-3001");
        assert!(!err.is_input_error());
        assert!(!err.to_string().contains("UPI-2001"));
        assert!(err.to_string().contains("got 2"));
    }

    #[test]
    fn test_label_wins_over_probability() {
        assert_eq!(
            verdict_from_outputs("xgb", Some(0), Some(0.99), 0.5).unwrap(),
            Verdict::NotFraudulent
        );
        assert_eq!(
            verdict_from_outputs("xgb", Some(1), Some(0.01), 0.5).unwrap(),
            Verdict::Fraudulent
        );
    }

    #[test]
    fn test_probability_at_threshold_is_fraud() {
        assert_eq!(
            verdict_from_outputs("xgb", None, Some(0.7), 0.7).unwrap(),
            Verdict::Fraudulent
        );
        assert_eq!(
            verdict_from_outputs("xgb", None, Some(0.69), 0.7).unwrap(),
            Verdict::NotFraudulent
        );
    }

    #[test]
    fn test_no_usable_output_is_inference_error() {
        let err = verdict_from_outputs("xgb", None, None, 0.5).unwrap_err();
        assert_eq!(err.code(), "UPI-3001");

        let err = verdict_from_outputs("xgb", None, Some(f64::NAN), 0.5).unwrap_err();
        assert_eq!(err.code(), "UPI-3001");
    }

    struct FixedClassifier(Verdict);

    impl Classifier for FixedClassifier {
        fn predict(&self, features: &[f32]) -> Result<Verdict> {
            check_features(features, 3)?;
            Ok(self.0)
        }

        fn name(&self) -> &str {
            "fixed"
        }

        fn feature_count(&self) -> usize {
            3
        }
    }

    #[test]
    fn test_default_batch_preserves_order_and_failures() {
        let classifier = FixedClassifier(Verdict::Fraudulent);
        let batch = vec![vec![1.0, 2.0, 3.0], vec![1.0], vec![4.0, 5.0, 6.0]];

        let results = classifier.predict_batch(&batch);
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].as_ref().unwrap(), &Verdict::Fraudulent);
        assert!(results[1].is_err());
        assert_eq!(results[2].as_ref().unwrap(), &Verdict::Fraudulent);
    }
}
