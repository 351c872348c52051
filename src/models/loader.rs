//! ONNX model loader

use crate::error::{DetectorError, Result};
use ort::session::{builder::GraphOptimizationLevel, Session};
use std::path::Path;
use tracing::info;

/// Loaded ONNX model with metadata
pub struct LoadedModel {
    /// Model name
    pub name: String,
    /// ONNX Runtime session
    pub session: Session,
    /// Input name for the model
    pub input_name: String,
    /// Integer class-label output, if the export has one
    pub label_output: Option<String>,
    /// Class-probability output, if the export has one
    pub probability_output: Option<String>,
}

/// Loader for ONNX models
pub struct ModelLoader {
    /// Number of threads for ONNX inference
    onnx_threads: usize,
}

impl ModelLoader {
    /// Create a new model loader with default settings (1 thread)
    pub fn new() -> Result<Self> {
        Self::with_threads(1)
    }

    /// Create a new model loader with specified number of threads
    pub fn with_threads(onnx_threads: usize) -> Result<Self> {
        ort::init()
            .commit()
            .map_err(|e| DetectorError::Initialization {
                path: Default::default(),
                details: format!("ONNX Runtime initialization failed: {e}"),
            })?;
        info!(onnx_threads = onnx_threads, "ONNX Runtime initialized");
        Ok(Self { onnx_threads })
    }

    /// Load the classifier from file
    pub fn load_model<P: AsRef<Path>>(&self, path: P, name: &str) -> Result<LoadedModel> {
        let path = path.as_ref();
        let init_error = |details: String| DetectorError::Initialization {
            path: path.to_path_buf(),
            details,
        };

        if !path.exists() {
            return Err(init_error("model file not found".to_string()));
        }

        info!(model = %name, path = %path.display(), threads = self.onnx_threads, "Loading ONNX model");

        let session =
            build_session(path, self.onnx_threads).map_err(|e| init_error(e.to_string()))?;

        let input_name = session
            .inputs
            .first()
            .map(|i| i.name.clone())
            .ok_or_else(|| init_error("model declares no inputs".to_string()))?;

        let output_names: Vec<String> = session.outputs.iter().map(|o| o.name.clone()).collect();
        let (label_output, probability_output) = select_outputs(&output_names);

        if label_output.is_none() && probability_output.is_none() {
            return Err(init_error(format!(
                "no usable label or probability output among {output_names:?}"
            )));
        }

        info!(
            model = %name,
            input = %input_name,
            label_output = ?label_output,
            probability_output = ?probability_output,
            "Model loaded successfully"
        );

        Ok(LoadedModel {
            name: name.to_string(),
            session,
            input_name,
            label_output,
            probability_output,
        })
    }
}

impl Default for ModelLoader {
    fn default() -> Self {
        Self { onnx_threads: 1 }
    }
}

fn build_session(path: &Path, onnx_threads: usize) -> ort::Result<Session> {
    let session = Session::builder()?
        .with_optimization_level(GraphOptimizationLevel::Level3)?
        .with_intra_threads(onnx_threads)?
        .commit_from_file(path)?;
    Ok(session)
}

/// Pick the label and probability outputs from the names a model exports.
///
/// Classifier exports usually name them `label` and `probabilities`; a single
/// unnamed output is treated as probabilities.
fn select_outputs(names: &[String]) -> (Option<String>, Option<String>) {
    let label = names.iter().find(|n| n.contains("label")).cloned();
    let mut candidates = names.iter().filter(|n| !n.contains("label"));
    let probability = candidates
        .clone()
        .find(|n| n.contains("prob") || n.contains("output"))
        .or_else(|| candidates.next())
        .cloned();
    (label, probability)
}
