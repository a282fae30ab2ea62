use crate::image::NormalizedTensor;
use crate::models::engine::{select_class_scores, InferenceEngine};
use crate::utils::error::DigitError;
use crate::{Config, Result};
use ort::{
    inputs,
    session::{builder::GraphOptimizationLevel, Session},
    value::Tensor,
};
use parking_lot::Mutex;

/// MNIST-style digit classifier backed by an ONNX Runtime session.
pub struct OnnxClassifier {
    session: Mutex<Session>,
    input_name: String,
    output_name: String,
    class_count: usize,
}

impl OnnxClassifier {
    pub fn new(config: &Config) -> Result<Self> {
        let model_path = &config.model_path;

        if !model_path.exists() {
            return Err(DigitError::ModelLoad(format!(
                "Classification model not found: {}",
                model_path.display()
            )));
        }

        tracing::info!("Loading classification model from: {}", model_path.display());

        let session = Session::builder()?
            .with_optimization_level(optimization_level(config.onnx_config.optimization_level))?
            .with_intra_threads(config.onnx_config.intra_threads)?
            .commit_from_file(model_path)?;

        // Model exports name their tensors differently, take the first declared ones
        let input_name = session
            .inputs
            .first()
            .map(|input| input.name.clone())
            .ok_or_else(|| DigitError::ModelLoad("Classification model has no inputs".to_string()))?;

        let output_name = session
            .outputs
            .first()
            .map(|output| output.name.clone())
            .ok_or_else(|| DigitError::ModelLoad("Classification model has no outputs".to_string()))?;

        tracing::info!(
            "Classification model input: '{}', output: '{}'",
            input_name,
            output_name
        );
        for (i, output) in session.outputs.iter().enumerate() {
            tracing::debug!("Classification output[{}]: '{}'", i, output.name);
        }

        Ok(Self {
            session: Mutex::new(session),
            input_name,
            output_name,
            class_count: config.preprocess.class_count,
        })
    }
}

impl InferenceEngine for OnnxClassifier {
    fn run(&self, tensor: NormalizedTensor) -> Result<Vec<f32>> {
        let input_tensor = Tensor::from_array(tensor.into_array())?;

        let raw: Vec<f32> = {
            let mut session = self.session.lock();
            let outputs = session.run(inputs![self.input_name.as_str() => input_tensor])?;

            match outputs.get(self.output_name.as_str()) {
                Some(output) => output.try_extract_array::<f32>()?.iter().copied().collect(),
                None => {
                    let available: Vec<String> = outputs.keys().map(|s| s.to_string()).collect();
                    return Err(DigitError::Inference(format!(
                        "Classification output '{}' not found. Available outputs: {:?}",
                        self.output_name, available
                    )));
                }
            }
        };

        select_class_scores(&raw, self.class_count)
    }

    fn input_name(&self) -> &str {
        &self.input_name
    }

    fn output_name(&self) -> &str {
        &self.output_name
    }

    fn class_count(&self) -> usize {
        self.class_count
    }
}

fn optimization_level(level: i32) -> GraphOptimizationLevel {
    match level {
        i32::MIN..=0 => GraphOptimizationLevel::Disable,
        1 => GraphOptimizationLevel::Level1,
        2 => GraphOptimizationLevel::Level2,
        _ => GraphOptimizationLevel::Level3,
    }
}
