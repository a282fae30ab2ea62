pub mod classifier;
pub mod engine;
pub mod manager;

pub use classifier::OnnxClassifier;
pub use engine::{select_class_scores, InferenceEngine};
pub use manager::{ModelManager, ModelStats};
