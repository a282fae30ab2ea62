use crate::config::LlmConfig;
use crate::llm::types::{ChatCompletionRequest, ChatCompletionResponse};
use crate::utils::error::DigitError;
use crate::Result;
use reqwest::Client;
use std::time::Instant;

const MAX_ERROR_BODY_CHARS: usize = 512;

/// Azure OpenAI style chat-completions client. No retries.
#[derive(Clone)]
pub struct ChatClient {
    http: Client,
    url: String,
    api_key: String,
    api_version: String,
}

impl ChatClient {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| DigitError::Config(format!("failed to build HTTP client: {}", e)))?;

        let url = format!(
            "{}/openai/deployments/{}/chat/completions",
            config.endpoint.trim_end_matches('/'),
            config.deployment
        );

        Ok(Self {
            http,
            url,
            api_key: config.api_key.clone(),
            api_version: config.api_version.clone(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub async fn complete(&self, request: &ChatCompletionRequest) -> Result<String> {
        let start_time = Instant::now();

        let response = self
            .http
            .post(&self.url)
            .query(&[("api-version", self.api_version.as_str())])
            .header("api-key", &self.api_key)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let body: String = body.chars().take(MAX_ERROR_BODY_CHARS).collect();
            tracing::error!(upstream_status = %status, body = %body, "chat_completion_failed");
            return Err(DigitError::Llm(format!("upstream returned {}: {}", status, body)));
        }

        let content = response.json::<ChatCompletionResponse>().await?.into_content();

        tracing::info!(
            elapsed_ms = start_time.elapsed().as_millis() as u64,
            chars = content.len(),
            "chat_completion_finished"
        );

        Ok(content)
    }
}
