use crate::utils::error::DigitError;
use axum::{
    async_trait,
    extract::{FromRequest, FromRequestParts, Query, Request},
    http::request::Parts,
    Json,
};
use serde::de::DeserializeOwned;

/// JSON body that passed [`Validate`].
pub struct ValidatedJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = DigitError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|err| DigitError::InvalidInput(format!("JSON parse error: {}", err.body_text())))?;

        value.validate().map_err(DigitError::InvalidInput)?;

        Ok(ValidatedJson(value))
    }
}

/// Query string that passed [`Validate`]. Rejections use the JSON error body.
pub struct ValidatedQuery<T>(pub T);

#[async_trait]
impl<T, S> FromRequestParts<S> for ValidatedQuery<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = DigitError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state)
            .await
            .map_err(|err| DigitError::InvalidInput(format!("Query parse error: {}", err.body_text())))?;

        value.validate().map_err(DigitError::InvalidInput)?;

        Ok(ValidatedQuery(value))
    }
}

pub trait Validate {
    fn validate(&self) -> Result<(), String>;
}

/// Chat routes take a bare JSON string.
impl Validate for String {
    fn validate(&self) -> Result<(), String> {
        if self.trim().is_empty() {
            return Err("Text cannot be empty".to_string());
        }
        Ok(())
    }
}

impl Validate for crate::web::handlers::Base64PredictRequest {
    fn validate(&self) -> Result<(), String> {
        if self.base64_image.trim().is_empty() {
            return Err("base64Image cannot be empty".to_string());
        }
        Ok(())
    }
}

impl Validate for crate::web::handlers::InvertQuery {
    fn validate(&self) -> Result<(), String> {
        self.invert().map(|_| ()).map_err(|e| e.to_string())
    }
}

impl Validate for crate::web::handlers::QuizRequest {
    fn validate(&self) -> Result<(), String> {
        if self.recent_mistakes.is_empty() {
            return Err("RecentMistakes list is required and cannot be empty".to_string());
        }

        if let Some(digit) = self.recent_mistakes.iter().find(|d| !(0..=9).contains(*d)) {
            return Err(format!("Recent mistake {} is not a digit between 0 and 9", digit));
        }

        Ok(())
    }
}

/// `X-Request-ID` header, or a fresh UUID.
#[derive(Debug, Clone)]
pub struct RequestId(pub String);

#[async_trait]
impl<S> FromRequestParts<S> for RequestId
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let request_id = parts
            .headers
            .get("X-Request-ID")
            .and_then(|value| value.to_str().ok())
            .filter(|value| !value.is_empty())
            .map(|s| s.to_string())
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        Ok(RequestId(request_id))
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::web::handlers::{InvertQuery, QuizRequest};

    #[test]
    fn quiz_requires_digits() {
        assert!(QuizRequest { recent_mistakes: vec![] }.validate().is_err());
        assert!(QuizRequest { recent_mistakes: vec![3, 12] }.validate().is_err());
        assert!(QuizRequest { recent_mistakes: vec![3, 8] }.validate().is_ok());
    }

    #[test]
    fn invert_query_must_be_boolean() {
        let query = |value: &str| InvertQuery {
            invert: Some(value.to_string()),
        };
        assert!(InvertQuery::default().validate().is_ok());
        assert!(query("on").validate().is_ok());
        assert!(query("banana").validate().is_err());
    }

    #[test]
    fn blank_text_is_rejected() {
        assert!("   ".to_string().validate().is_err());
        assert!("summarize this".to_string().validate().is_ok());
    }
}
