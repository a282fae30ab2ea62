use crate::utils::error::DigitError;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// A class index with its probability.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RankedPrediction {
    pub index: usize,
    pub probability: f32,
}

/// Output of [`ScorePostprocessor::process`].
#[derive(Debug, Clone, PartialEq)]
pub struct Postprocessed {
    pub best: RankedPrediction,
    pub probabilities: Vec<f32>,
    pub top_k: Vec<RankedPrediction>,
}

/// Softmax and top-K ranking over raw classifier scores.
///
/// Expects exactly the class scores. Trimming extra leading outputs is the
/// inference adapter's job, see [`crate::models::select_class_scores`].
pub struct ScorePostprocessor;

impl ScorePostprocessor {
    /// Numerically stable softmax: the maximum is subtracted before `exp`.
    pub fn softmax(scores: &[f32]) -> Result<Vec<f32>> {
        Self::validate_scores(scores)?;

        let max = scores.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        let exps: Vec<f32> = scores.iter().map(|s| (s - max).exp()).collect();
        let sum: f32 = exps.iter().sum();

        Ok(exps.into_iter().map(|e| e / sum).collect())
    }

    /// Index of the largest value; the first one wins on ties.
    pub fn argmax(values: &[f32]) -> Option<usize> {
        let mut best: Option<(usize, f32)> = None;
        for (i, &v) in values.iter().enumerate() {
            match best {
                Some((_, current)) if v <= current => {}
                _ => best = Some((i, v)),
            }
        }
        best.map(|(i, _)| i)
    }

    /// The `k` most probable classes, descending by probability, ascending index on ties.
    pub fn top_k(probabilities: &[f32], k: usize) -> Result<Vec<RankedPrediction>> {
        if probabilities.is_empty() {
            return Err(DigitError::InvalidArgument("probability vector is empty".to_string()));
        }
        if k == 0 || k > probabilities.len() {
            return Err(DigitError::InvalidArgument(format!(
                "k must be between 1 and {}, got {}",
                probabilities.len(),
                k
            )));
        }

        let mut ranked: Vec<RankedPrediction> = probabilities
            .iter()
            .enumerate()
            .map(|(index, &probability)| RankedPrediction { index, probability })
            .collect();

        ranked.sort_by(|a, b| match b.probability.total_cmp(&a.probability) {
            Ordering::Equal => a.index.cmp(&b.index),
            other => other,
        });
        ranked.truncate(k);

        Ok(ranked)
    }

    pub fn process(scores: &[f32], k: usize) -> Result<Postprocessed> {
        Self::validate_scores(scores)?;
        if k == 0 || k > scores.len() {
            return Err(DigitError::InvalidArgument(format!(
                "k must be between 1 and {}, got {}",
                scores.len(),
                k
            )));
        }

        let probabilities = Self::softmax(scores)?;
        let best_index = Self::argmax(&probabilities)
            .ok_or_else(|| DigitError::InvalidArgument("score vector is empty".to_string()))?;
        let best = RankedPrediction {
            index: best_index,
            probability: probabilities[best_index],
        };
        let top_k = Self::top_k(&probabilities, k)?;

        Ok(Postprocessed {
            best,
            probabilities,
            top_k,
        })
    }

    fn validate_scores(scores: &[f32]) -> Result<()> {
        if scores.is_empty() {
            return Err(DigitError::InvalidArgument("score vector is empty".to_string()));
        }
        if let Some((i, s)) = scores.iter().enumerate().find(|(_, s)| !s.is_finite()) {
            return Err(DigitError::InvalidArgument(format!(
                "score {} is not finite: {}",
                i, s
            )));
        }
        Ok(())
    }
}

/// `{ predicted, scores }`, raw scores of the winning class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoresResponse {
    pub predicted: usize,
    pub scores: Vec<f32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopKPrediction {
    pub digit: usize,
    pub prob: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictionResponse {
    pub digit: usize,
    pub confidence: f32,
    pub top_k: Vec<TopKPrediction>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictionWithExplanationResponse {
    #[serde(flatten)]
    pub prediction: PredictionResponse,
    pub explanation: String,
}

/// Shapes postprocessed scores into response bodies.
pub struct ResultFormatter;

impl ResultFormatter {
    pub fn scores(scores: Vec<f32>, result: &Postprocessed) -> ScoresResponse {
        ScoresResponse {
            predicted: result.best.index,
            scores,
        }
    }

    pub fn prediction(result: &Postprocessed) -> PredictionResponse {
        PredictionResponse {
            digit: result.best.index,
            confidence: result.best.probability,
            top_k: result
                .top_k
                .iter()
                .map(|p| TopKPrediction {
                    digit: p.index,
                    prob: p.probability,
                })
                .collect(),
        }
    }

    pub fn with_explanation(
        result: &Postprocessed,
        explanation: String,
    ) -> PredictionWithExplanationResponse {
        PredictionWithExplanationResponse {
            prediction: Self::prediction(result),
            explanation,
        }
    }
}
