use crate::image::ImageNormalizer;
use crate::models::{InferenceEngine, OnnxClassifier};
use crate::utils::error::DigitError;
use crate::{Config, Result};
use chrono::{DateTime, Utc};
use image::DynamicImage;
use std::sync::Arc;

/// Owns the inference engine for the lifetime of the server.
///
/// Built once at startup and handed to the router; handlers only ever
/// clone the `Arc` to the engine.
pub struct ModelManager {
    engine: Arc<dyn InferenceEngine>,
    config: Config,
    loaded_at: DateTime<Utc>,
}

impl ModelManager {
    /// Load the ONNX model named in `config`, failing if it is absent.
    pub fn load(config: Config) -> Result<Self> {
        tracing::info!("Initializing model manager...");

        let classifier = OnnxClassifier::new(&config)?;
        let manager = Self::with_engine(Arc::new(classifier), config);

        tracing::info!("Model manager initialized successfully");
        Ok(manager)
    }

    pub fn with_engine(engine: Arc<dyn InferenceEngine>, config: Config) -> Self {
        Self {
            engine,
            config,
            loaded_at: Utc::now(),
        }
    }

    pub fn engine(&self) -> Arc<dyn InferenceEngine> {
        Arc::clone(&self.engine)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Runs a blank image through the engine and checks the output length.
    pub fn health_check(&self) -> Result<()> {
        tracing::debug!("Performing model health check...");

        let blank = ImageNormalizer::new(self.config.preprocess.resize_policy)
            .normalize(&DynamicImage::new_luma8(1, 1))?;
        let scores = self.engine.run(blank)?;

        if scores.len() != self.engine.class_count() {
            return Err(DigitError::Inference(format!(
                "health check produced {} scores, expected {}",
                scores.len(),
                self.engine.class_count()
            )));
        }

        tracing::debug!("Model health check passed");
        Ok(())
    }

    pub fn stats(&self) -> ModelStats {
        ModelStats {
            model_path: self.config.model_path.display().to_string(),
            input_name: self.engine.input_name().to_string(),
            output_name: self.engine.output_name().to_string(),
            class_count: self.engine.class_count(),
            top_k: self.config.preprocess.top_k,
            resize_policy: self.config.preprocess.resize_policy.to_string(),
            intra_threads: self.config.onnx_config.intra_threads,
            optimization_level: self.config.onnx_config.optimization_level,
            loaded_at: self.loaded_at,
        }
    }
}

impl Drop for ModelManager {
    fn drop(&mut self) {
        tracing::info!("Releasing inference session for {}", self.config.model_path.display());
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct ModelStats {
    pub model_path: String,
    pub input_name: String,
    pub output_name: String,
    pub class_count: usize,
    pub top_k: usize,
    pub resize_policy: String,
    pub intra_threads: usize,
    pub optimization_level: i32,
    pub loaded_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::NormalizedTensor;

    struct FixedEngine(Vec<f32>);

    impl InferenceEngine for FixedEngine {
        fn run(&self, _tensor: NormalizedTensor) -> Result<Vec<f32>> {
            Ok(self.0.clone())
        }

        fn input_name(&self) -> &str {
            "Input3"
        }

        fn output_name(&self) -> &str {
            "Plus214_Output_0"
        }

        fn class_count(&self) -> usize {
            10
        }
    }

    fn config() -> Config {
        Config::new("127.0.0.1:0".into(), "mnist-12.onnx".into(), None, false).unwrap()
    }

    #[test]
    fn health_check_probes_the_engine() {
        let healthy = ModelManager::with_engine(Arc::new(FixedEngine(vec![0.0; 10])), config());
        assert!(healthy.health_check().is_ok());

        let broken = ModelManager::with_engine(Arc::new(FixedEngine(vec![0.0; 3])), config());
        assert!(matches!(broken.health_check(), Err(DigitError::Inference(_))));
    }

    #[test]
    fn stats_report_engine_names() {
        let manager = ModelManager::with_engine(Arc::new(FixedEngine(vec![0.0; 10])), config());
        let stats = manager.stats();
        assert_eq!(stats.input_name, "Input3");
        assert_eq!(stats.output_name, "Plus214_Output_0");
        assert_eq!(stats.class_count, 10);
        assert_eq!(stats.top_k, 3);
        assert_eq!(stats.resize_policy, "letterbox");
    }
}
