use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DigitError {
    #[error("Invalid image: {0}")]
    InvalidImage(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("File too large: {0} bytes, max allowed: {1} bytes")]
    FileTooLarge(usize, usize),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Model loading failed: {0}")]
    ModelLoad(String),

    #[error("Inference failed: {0}")]
    Inference(String),

    #[error("LLM service is not configured")]
    LlmUnavailable,

    #[error("LLM request failed: {0}")]
    Llm(String),

    #[error("LLM request timed out")]
    LlmTimeout,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("ORT error: {0}")]
    Ort(#[from] ort::Error),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl DigitError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            DigitError::InvalidImage(_)
            | DigitError::InvalidArgument(_)
            | DigitError::InvalidInput(_)
            | DigitError::Json(_) => StatusCode::BAD_REQUEST,
            DigitError::FileTooLarge(_, _) => StatusCode::PAYLOAD_TOO_LARGE,
            DigitError::UnsupportedFormat(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            DigitError::ModelLoad(_) | DigitError::LlmUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            DigitError::Llm(_) => StatusCode::BAD_GATEWAY,
            DigitError::LlmTimeout => StatusCode::GATEWAY_TIMEOUT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            DigitError::InvalidImage(_) => "INVALID_IMAGE",
            DigitError::InvalidArgument(_) => "INVALID_ARGUMENT",
            DigitError::InvalidInput(_) => "INVALID_INPUT",
            DigitError::FileTooLarge(_, _) => "FILE_TOO_LARGE",
            DigitError::UnsupportedFormat(_) => "UNSUPPORTED_FORMAT",
            DigitError::ModelLoad(_) => "MODEL_LOAD_ERROR",
            DigitError::Inference(_) => "INFERENCE_ERROR",
            DigitError::LlmUnavailable => "LLM_UNAVAILABLE",
            DigitError::Llm(_) => "LLM_ERROR",
            DigitError::LlmTimeout => "LLM_TIMEOUT",
            DigitError::Config(_) => "CONFIG_ERROR",
            DigitError::Io(_) => "IO_ERROR",
            DigitError::Json(_) => "JSON_ERROR",
            DigitError::Ort(_) => "ORT_ERROR",
            DigitError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl From<reqwest::Error> for DigitError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            DigitError::LlmTimeout
        } else {
            DigitError::Llm(e.to_string())
        }
    }
}

impl IntoResponse for DigitError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_response = serde_json::json!({
            "error": {
                "code": self.error_code(),
                "message": self.to_string(),
            }
        });

        if status.is_server_error() {
            tracing::error!("Request failed: {} ({})", self, status);
        } else {
            tracing::warn!("Request rejected: {} ({})", self, status);
        }

        (status, axum::Json(error_response)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_errors_map_to_4xx() {
        assert_eq!(
            DigitError::InvalidImage("empty".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            DigitError::InvalidArgument("k".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            DigitError::FileTooLarge(11, 10).status_code(),
            StatusCode::PAYLOAD_TOO_LARGE
        );
        assert_eq!(
            DigitError::UnsupportedFormat("text/plain".into()).status_code(),
            StatusCode::UNSUPPORTED_MEDIA_TYPE
        );
    }

    #[test]
    fn upstream_errors_map_to_gateway_codes() {
        assert_eq!(DigitError::LlmUnavailable.status_code(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(DigitError::Llm("500".into()).status_code(), StatusCode::BAD_GATEWAY);
        assert_eq!(DigitError::LlmTimeout.status_code(), StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(
            DigitError::Inference("shape".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn error_codes_are_stable() {
        assert_eq!(DigitError::InvalidImage(String::new()).error_code(), "INVALID_IMAGE");
        assert_eq!(DigitError::LlmUnavailable.error_code(), "LLM_UNAVAILABLE");
    }
}
