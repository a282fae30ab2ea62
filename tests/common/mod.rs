#![allow(dead_code)]

use std::io::Cursor;
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, Response};
use axum::Router;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use onnx_digits::image::NormalizedTensor;
use onnx_digits::llm::LlmService;
use onnx_digits::models::{InferenceEngine, ModelManager};
use onnx_digits::web::{create_app, AppState};
use onnx_digits::{Config, Result};
use parking_lot::Mutex;

pub const SCENARIO_SCORES: [f32; 10] = [1.0, 2.0, 3.0, 4.0, 1.0, 2.0, 3.0, 4.0, 1.0, 2.0];

const BOUNDARY: &str = "digit-test-boundary";

/// Returns fixed scores and remembers the last tensor it saw.
#[derive(Default)]
pub struct FakeEngine {
    pub scores: Vec<f32>,
    pub last_tensor: Mutex<Option<NormalizedTensor>>,
}

impl FakeEngine {
    pub fn new(scores: &[f32]) -> Arc<Self> {
        Arc::new(Self {
            scores: scores.to_vec(),
            last_tensor: Mutex::new(None),
        })
    }

    pub fn last_tensor(&self) -> NormalizedTensor {
        self.last_tensor
            .lock()
            .clone()
            .expect("engine was never called")
    }
}

impl InferenceEngine for FakeEngine {
    fn run(&self, tensor: NormalizedTensor) -> Result<Vec<f32>> {
        *self.last_tensor.lock() = Some(tensor);
        Ok(self.scores.clone())
    }

    fn input_name(&self) -> &str {
        "Input3"
    }

    fn output_name(&self) -> &str {
        "Plus214_Output_0"
    }

    fn class_count(&self) -> usize {
        self.scores.len()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum LlmCall {
    Explain {
        digit: usize,
        probabilities: Vec<f32>,
        has_thumbnail: bool,
    },
    Quiz(Vec<i32>),
    Ask(String),
    Summarize(String),
}

/// Echoes a canned reply and records every call.
pub struct FakeLlm {
    pub reply: String,
    pub calls: Mutex<Vec<LlmCall>>,
}

impl FakeLlm {
    pub fn new(reply: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: reply.to_string(),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> Vec<LlmCall> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl LlmService for FakeLlm {
    async fn explain_prediction(
        &self,
        digit: usize,
        _confidence: f32,
        probabilities: &[f32],
        thumbnail_png_base64: Option<&str>,
    ) -> Result<String> {
        self.calls.lock().push(LlmCall::Explain {
            digit,
            probabilities: probabilities.to_vec(),
            has_thumbnail: thumbnail_png_base64.is_some(),
        });
        Ok(self.reply.clone())
    }

    async fn build_quiz(&self, recent_mistakes: &[i32]) -> Result<String> {
        self.calls.lock().push(LlmCall::Quiz(recent_mistakes.to_vec()));
        Ok(self.reply.clone())
    }

    async fn ask(&self, question: &str) -> Result<String> {
        self.calls.lock().push(LlmCall::Ask(question.to_string()));
        Ok(self.reply.clone())
    }

    async fn summarize(&self, chat_content: &str) -> Result<String> {
        self.calls
            .lock()
            .push(LlmCall::Summarize(chat_content.to_string()));
        Ok(self.reply.clone())
    }
}

pub fn test_config() -> Config {
    Config::new("127.0.0.1:0".into(), "mnist-12.onnx".into(), Some(1), false).unwrap()
}

pub fn app(engine: Arc<FakeEngine>, llm: Option<Arc<FakeLlm>>) -> Router {
    app_with_config(engine, llm, test_config())
}

pub fn app_with_config(engine: Arc<FakeEngine>, llm: Option<Arc<FakeLlm>>, config: Config) -> Router {
    let models = ModelManager::with_engine(engine, config);
    let llm = llm.map(|l| l as Arc<dyn LlmService>);
    create_app(AppState::new(models, llm))
}

pub fn png_bytes(width: u32, height: u32, color: [u8; 3]) -> Vec<u8> {
    let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb(color)));
    let mut bytes = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .unwrap();
    bytes
}

/// Single-part multipart request.
pub fn multipart_request(uri: &str, field: &str, content_type: &str, data: &[u8]) -> Request<Body> {
    multipart_request_with_fields(uri, field, content_type, data, &[])
}

/// Image part followed by plain text form fields.
pub fn multipart_request_with_fields(
    uri: &str,
    field: &str,
    content_type: &str,
    data: &[u8],
    text_fields: &[(&str, &str)],
) -> Request<Body> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"{}\"; filename=\"digit.png\"\r\n",
            field
        )
        .as_bytes(),
    );
    body.extend_from_slice(format!("Content-Type: {}\r\n\r\n", content_type).as_bytes());
    body.extend_from_slice(data);
    for (name, value) in text_fields {
        body.extend_from_slice(format!("\r\n--{}\r\n", BOUNDARY).as_bytes());
        body.extend_from_slice(
            format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name).as_bytes(),
        );
        body.extend_from_slice(value.as_bytes());
    }
    body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());

    Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            "content-type",
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(body))
        .unwrap()
}

pub fn json_request(uri: &str, body: &serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(body).unwrap()))
        .unwrap()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
