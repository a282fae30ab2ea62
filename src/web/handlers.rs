use crate::{
    image::{
        ImageLimits, ImageLoader, ImageNormalizer, Postprocessed, PredictionResponse,
        PredictionWithExplanationResponse, ResultFormatter, ScorePostprocessor, ScoresResponse,
    },
    llm::prompts,
    utils::error::DigitError,
    web::{
        extractors::{RequestId, ValidatedJson, ValidatedQuery},
        AppState,
    },
    Result,
};
use axum::{
    body::Bytes,
    extract::{Multipart, State},
    response::Json,
};
use image::DynamicImage;
use serde::Deserialize;
use std::time::Instant;

/// Multipart field names accepted for the uploaded image.
const IMAGE_FIELDS: [&str; 3] = ["image", "imageFile", "file"];

#[derive(Debug, Default, Deserialize)]
pub struct InvertQuery {
    pub invert: Option<String>,
}

impl InvertQuery {
    pub fn invert(&self) -> Result<Option<bool>> {
        self.invert.as_deref().map(parse_invert).transpose()
    }
}

/// Accepts the usual HTML form spellings of a boolean.
pub fn parse_invert(value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "on" | "yes" => Ok(true),
        "false" | "0" | "off" | "no" => Ok(false),
        other => Err(DigitError::InvalidInput(format!(
            "invert must be true or false, got '{}'",
            other
        ))),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Base64PredictRequest {
    pub base64_image: String,
    #[serde(default)]
    pub invert: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizRequest {
    pub recent_mistakes: Vec<i32>,
}

enum ImageInput {
    Bytes(Bytes),
    Base64(String),
}

impl ImageInput {
    fn decode(&self, limits: ImageLimits) -> Result<DynamicImage> {
        match self {
            ImageInput::Bytes(bytes) => ImageLoader::from_bytes(bytes, limits),
            ImageInput::Base64(data) => ImageLoader::from_base64(data, limits),
        }
    }
}

struct Upload {
    data: Bytes,
    invert: Option<bool>,
}

struct Classified {
    scores: Vec<f32>,
    result: Postprocessed,
    thumbnail: Option<String>,
}

/// Reads the image part and an optional `invert` form field.
async fn read_upload(multipart: &mut Multipart) -> Result<Upload> {
    let mut data: Option<Bytes> = None;
    let mut invert: Option<bool> = None;

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        DigitError::InvalidInput(format!("Failed to read multipart field: {}", e))
    })? {
        let field_name = field.name().unwrap_or("unknown").to_string();

        if IMAGE_FIELDS.contains(&field_name.as_str()) {
            ImageLoader::check_content_type(field.content_type())?;

            let bytes = field.bytes().await.map_err(|e| {
                DigitError::InvalidInput(format!("Failed to read file data: {}", e))
            })?;

            tracing::debug!("Received file '{}': {} bytes", field_name, bytes.len());
            data = Some(bytes);
        } else if field_name == "invert" {
            let value = field.text().await.map_err(|e| {
                DigitError::InvalidInput(format!("Failed to read invert field: {}", e))
            })?;
            invert = Some(parse_invert(&value)?);
        } else {
            tracing::debug!("Ignoring unknown field: {}", field_name);
        }
    }

    let data = data.ok_or_else(|| DigitError::InvalidInput("Missing 'image' file".to_string()))?;
    if data.is_empty() {
        return Err(DigitError::InvalidImage("Uploaded file is empty".to_string()));
    }

    Ok(Upload { data, invert })
}

/// Decode, normalize, infer and postprocess off the async runtime.
async fn classify(
    state: &AppState,
    input: ImageInput,
    invert: bool,
    with_thumbnail: bool,
) -> Result<Classified> {
    let limits = state.config.preprocess.image_limits;
    let normalizer = ImageNormalizer::new(state.config.preprocess.resize_policy).with_invert(invert);
    let top_k = state.config.preprocess.top_k;
    let engine = state.models.engine();

    tokio::task::spawn_blocking(move || -> Result<Classified> {
        let image = input.decode(limits)?;
        let thumbnail = if with_thumbnail {
            Some(ImageLoader::thumbnail_png_base64(&image)?)
        } else {
            None
        };

        let tensor = normalizer.normalize(&image)?;
        let scores = engine.run(tensor)?;
        let result = ScorePostprocessor::process(&scores, top_k)?;

        Ok(Classified {
            scores,
            result,
            thumbnail,
        })
    })
    .await
    .map_err(|e| DigitError::Internal(format!("inference task failed: {}", e)))?
}

/// `POST /predict`, `POST /predict-file`
pub async fn predict_file_handler(
    State(state): State<AppState>,
    request_id: RequestId,
    ValidatedQuery(query): ValidatedQuery<InvertQuery>,
    mut multipart: Multipart,
) -> Result<Json<ScoresResponse>> {
    let start_time = Instant::now();
    let upload = read_upload(&mut multipart).await?;
    let invert = query.invert()?.or(upload.invert).unwrap_or(false);

    tracing::info!(
        "Processing file prediction: request_id={}, bytes={}, invert={}",
        request_id,
        upload.data.len(),
        invert
    );

    let classified = classify(&state, ImageInput::Bytes(upload.data), invert, false).await?;

    tracing::info!(
        "File prediction completed: request_id={}, predicted={}, time={:.3}s",
        request_id,
        classified.result.best.index,
        start_time.elapsed().as_secs_f32()
    );

    Ok(Json(ResultFormatter::scores(classified.scores, &classified.result)))
}

/// `POST /predict-base64`
pub async fn predict_base64_handler(
    State(state): State<AppState>,
    request_id: RequestId,
    ValidatedJson(request): ValidatedJson<Base64PredictRequest>,
) -> Result<Json<ScoresResponse>> {
    let start_time = Instant::now();
    let invert = request.invert.unwrap_or(false);

    tracing::info!(
        "Processing base64 prediction: request_id={}, invert={}",
        request_id,
        invert
    );

    let classified = classify(&state, ImageInput::Base64(request.base64_image), invert, false).await?;

    tracing::info!(
        "Base64 prediction completed: request_id={}, predicted={}, time={:.3}s",
        request_id,
        classified.result.best.index,
        start_time.elapsed().as_secs_f32()
    );

    Ok(Json(ResultFormatter::scores(classified.scores, &classified.result)))
}

/// `POST /api/mnist/predict`. Inverts by default: uploads are usually dark ink on white.
pub async fn mnist_predict_handler(
    State(state): State<AppState>,
    request_id: RequestId,
    ValidatedQuery(query): ValidatedQuery<InvertQuery>,
    mut multipart: Multipart,
) -> Result<Json<PredictionResponse>> {
    let start_time = Instant::now();
    let upload = read_upload(&mut multipart).await?;
    let invert = query.invert()?.or(upload.invert).unwrap_or(true);

    let classified = classify(&state, ImageInput::Bytes(upload.data), invert, false).await?;

    tracing::info!(
        "MNIST prediction completed: request_id={}, digit={}, confidence={:.3}, time={:.3}s",
        request_id,
        classified.result.best.index,
        classified.result.best.probability,
        start_time.elapsed().as_secs_f32()
    );

    Ok(Json(ResultFormatter::prediction(&classified.result)))
}

/// `POST /api/mnist/predict-explain`
pub async fn mnist_predict_explain_handler(
    State(state): State<AppState>,
    request_id: RequestId,
    ValidatedQuery(query): ValidatedQuery<InvertQuery>,
    mut multipart: Multipart,
) -> Result<Json<PredictionWithExplanationResponse>> {
    let start_time = Instant::now();
    let llm = state.llm()?;
    let upload = read_upload(&mut multipart).await?;
    let invert = query.invert()?.or(upload.invert).unwrap_or(true);

    let classified = classify(&state, ImageInput::Bytes(upload.data), invert, true).await?;
    let best = classified.result.best;

    let explanation = llm
        .explain_prediction(
            best.index,
            best.probability,
            &classified.result.probabilities,
            classified.thumbnail.as_deref(),
        )
        .await?;

    tracing::info!(
        "MNIST explanation completed: request_id={}, digit={}, time={:.3}s",
        request_id,
        best.index,
        start_time.elapsed().as_secs_f32()
    );

    Ok(Json(ResultFormatter::with_explanation(
        &classified.result,
        explanation,
    )))
}

/// `POST /api/mnist/quiz`
pub async fn mnist_quiz_handler(
    State(state): State<AppState>,
    request_id: RequestId,
    ValidatedJson(request): ValidatedJson<QuizRequest>,
) -> Result<Json<serde_json::Value>> {
    let llm = state.llm()?;

    tracing::info!(
        "Building quiz: request_id={}, mistakes={:?}",
        request_id,
        request.recent_mistakes
    );

    let quiz = llm.build_quiz(&request.recent_mistakes).await?;
    Ok(Json(prompts::parse_quiz_response(&quiz)))
}

/// `POST /api/chat/ask`
pub async fn chat_ask_handler(
    State(state): State<AppState>,
    request_id: RequestId,
    ValidatedJson(question): ValidatedJson<String>,
) -> Result<Json<String>> {
    let llm = state.llm()?;
    tracing::info!("Chat question: request_id={}, chars={}", request_id, question.len());

    Ok(Json(llm.ask(&question).await?))
}

/// `POST /api/chat/summary`
pub async fn chat_summary_handler(
    State(state): State<AppState>,
    request_id: RequestId,
    ValidatedJson(chat_content): ValidatedJson<String>,
) -> Result<Json<String>> {
    let llm = state.llm()?;
    tracing::info!(
        "Chat summary: request_id={}, chars={}",
        request_id,
        chat_content.len()
    );

    Ok(Json(llm.summarize(&chat_content).await?))
}
