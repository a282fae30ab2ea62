pub mod loader;
pub mod normalizer;
pub mod postprocessing;

pub use loader::{ImageLimits, ImageLoader};
pub use normalizer::{ImageNormalizer, NormalizedTensor, ResizePolicy, INPUT_SIZE};
pub use postprocessing::{
    Postprocessed, PredictionResponse, PredictionWithExplanationResponse, RankedPrediction,
    ResultFormatter, ScorePostprocessor, ScoresResponse, TopKPrediction,
};
