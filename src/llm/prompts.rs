use crate::utils::error::DigitError;
use crate::Result;
use std::path::Path;

pub const EXPLAIN_SYSTEM_PROMPT: &str = "\
You are a helpful tutor that explains MNIST digit predictions in simple, visual language.
- Be concise (<=120 words).
- Mention 2-3 visual cues (strokes, loops, corners, symmetry).
- If confidence < 0.8, note likely confusions and tips to redraw for clarity.";

pub const EXPLAIN_TEMPERATURE: f32 = 0.2;

pub const QUIZ_SYSTEM_PROMPT: &str =
    "You are a coach. Create 3 short drawing tasks to practice confusing MNIST digits.";

pub const QUIZ_TEMPERATURE: f32 = 0.7;

pub const DEFAULT_SUMMARY_TEMPLATE: &str = "\
Summarize the following chat conversation in a few sentences.
Keep names, decisions and open questions.

{{$input}}

Summary:";

const INPUT_PLACEHOLDER: &str = "{{$input}}";

/// `0:0.01, 1:0.02, ...` with two decimals.
pub fn format_probabilities(probabilities: &[f32]) -> String {
    probabilities
        .iter()
        .enumerate()
        .map(|(i, p)| format!("{}:{:.2}", i, p))
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn explain_user_prompt(digit: usize, confidence: f32, probabilities: &[f32]) -> String {
    format!(
        "Predicted: {}\n\
         Confidence: {:.2}\n\
         Top-10 probabilities: {}\n\
         \n\
         Describe what patterns likely led to this prediction and how to reduce ambiguity if any.\n\
         (Optional tiny image included as base64 PNG.)",
        digit,
        confidence,
        format_probabilities(probabilities)
    )
}

pub fn quiz_user_prompt(recent_mistakes: &[i32]) -> String {
    let mistakes = recent_mistakes
        .iter()
        .map(|d| d.to_string())
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "Recent mistakes: {}. Output JSON with fields: instructions[], tips.",
        mistakes
    )
}

/// Quiz replies are JSON when the model cooperates, otherwise wrapped text.
pub fn parse_quiz_response(text: &str) -> serde_json::Value {
    let trimmed = strip_code_fence(text.trim());
    match serde_json::from_str::<serde_json::Value>(trimmed) {
        Ok(value) => value,
        Err(_) => serde_json::json!({ "response": text }),
    }
}

fn strip_code_fence(text: &str) -> &str {
    let Some(body) = text.strip_prefix("```") else {
        return text;
    };
    // drop the language tag line
    let body = body.split_once('\n').map(|(_, rest)| rest).unwrap_or(body);
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

/// Prompt text with a single `{{$input}}` placeholder.
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    template: String,
}

impl PromptTemplate {
    pub fn new(template: impl Into<String>) -> Result<Self> {
        let template = template.into();
        if !template.contains(INPUT_PLACEHOLDER) {
            return Err(DigitError::Config(format!(
                "prompt template is missing the {} placeholder",
                INPUT_PLACEHOLDER
            )));
        }
        Ok(Self { template })
    }

    /// Reads the template from `path`, or uses the built-in summary prompt.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => {
                tracing::info!("Loading summary prompt from: {}", path.display());
                let template = std::fs::read_to_string(path).map_err(|e| {
                    DigitError::Config(format!(
                        "failed to read prompt template {}: {}",
                        path.display(),
                        e
                    ))
                })?;
                Self::new(template)
            }
            None => Self::new(DEFAULT_SUMMARY_TEMPLATE),
        }
    }

    pub fn render(&self, input: &str) -> String {
        self.template.replace(INPUT_PLACEHOLDER, input)
    }
}
