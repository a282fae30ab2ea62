use crate::image::NormalizedTensor;
use crate::utils::error::DigitError;
use crate::Result;

/// Black-box classifier: one normalized tensor in, class scores out.
///
/// Implementations are shared read-only across requests.
pub trait InferenceEngine: Send + Sync {
    /// Runs the model and returns exactly the class scores.
    fn run(&self, tensor: NormalizedTensor) -> Result<Vec<f32>>;

    fn input_name(&self) -> &str;

    fn output_name(&self) -> &str;

    fn class_count(&self) -> usize;
}

/// Keeps the trailing `class_count` values of a raw model output.
///
/// MNIST exports disagree on `[10]` vs `[1, 10]` and some prepend extra
/// values; the class scores are always the last ones.
pub fn select_class_scores(raw: &[f32], class_count: usize) -> Result<Vec<f32>> {
    if raw.len() < class_count {
        return Err(DigitError::Inference(format!(
            "model produced {} values, expected at least {}",
            raw.len(),
            class_count
        )));
    }

    if raw.len() > class_count {
        tracing::debug!(
            "Model output has {} values, keeping the last {}",
            raw.len(),
            class_count
        );
    }

    Ok(raw[raw.len() - class_count..].to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_length_is_kept() {
        let raw: Vec<f32> = (0..10).map(|v| v as f32).collect();
        assert_eq!(select_class_scores(&raw, 10).unwrap(), raw);
    }

    #[test]
    fn takes_the_trailing_scores() {
        let raw: Vec<f32> = (0..12).map(|v| v as f32).collect();
        let scores = select_class_scores(&raw, 10).unwrap();
        assert_eq!(scores.len(), 10);
        assert_eq!(scores[0], 2.0);
        assert_eq!(scores[9], 11.0);
    }

    #[test]
    fn short_output_is_an_inference_error() {
        assert!(matches!(
            select_class_scores(&[1.0, 2.0], 10),
            Err(DigitError::Inference(_))
        ));
    }
}
