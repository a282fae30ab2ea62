use crate::config::LlmConfig;
use crate::llm::client::ChatClient;
use crate::llm::prompts::{self, PromptTemplate};
use crate::llm::types::{ChatCompletionRequest, ChatMessage};
use crate::Result;
use async_trait::async_trait;

/// Text generation used by the tutor and chat routes.
#[async_trait]
pub trait LlmService: Send + Sync {
    /// Explain a digit prediction in plain language.
    async fn explain_prediction(
        &self,
        digit: usize,
        confidence: f32,
        probabilities: &[f32],
        thumbnail_png_base64: Option<&str>,
    ) -> Result<String>;

    /// Drawing exercises for digits the user keeps getting wrong.
    async fn build_quiz(&self, recent_mistakes: &[i32]) -> Result<String>;

    async fn ask(&self, question: &str) -> Result<String>;

    async fn summarize(&self, chat_content: &str) -> Result<String>;
}

pub struct ChatLlmService {
    client: ChatClient,
    summary_template: PromptTemplate,
    attach_image: bool,
}

impl ChatLlmService {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let client = ChatClient::new(config)?;
        let summary_template = PromptTemplate::load(config.summary_prompt_path.as_deref())?;

        tracing::info!("LLM chat completions endpoint: {}", client.url());

        Ok(Self {
            client,
            summary_template,
            attach_image: config.attach_image,
        })
    }
}

#[async_trait]
impl LlmService for ChatLlmService {
    async fn explain_prediction(
        &self,
        digit: usize,
        confidence: f32,
        probabilities: &[f32],
        thumbnail_png_base64: Option<&str>,
    ) -> Result<String> {
        let user_prompt = prompts::explain_user_prompt(digit, confidence, probabilities);
        let user_message = match thumbnail_png_base64 {
            Some(png) if self.attach_image => ChatMessage::user_with_png(user_prompt, png),
            _ => ChatMessage::user(user_prompt),
        };

        let request = ChatCompletionRequest::new(vec![
            ChatMessage::system(prompts::EXPLAIN_SYSTEM_PROMPT),
            user_message,
        ])
        .with_temperature(prompts::EXPLAIN_TEMPERATURE);

        self.client.complete(&request).await
    }

    async fn build_quiz(&self, recent_mistakes: &[i32]) -> Result<String> {
        let request = ChatCompletionRequest::new(vec![
            ChatMessage::system(prompts::QUIZ_SYSTEM_PROMPT),
            ChatMessage::user(prompts::quiz_user_prompt(recent_mistakes)),
        ])
        .with_temperature(prompts::QUIZ_TEMPERATURE);

        self.client.complete(&request).await
    }

    async fn ask(&self, question: &str) -> Result<String> {
        let request = ChatCompletionRequest::new(vec![ChatMessage::user(question)]);
        self.client.complete(&request).await
    }

    async fn summarize(&self, chat_content: &str) -> Result<String> {
        let prompt = self.summary_template.render(chat_content);
        let request = ChatCompletionRequest::new(vec![ChatMessage::user(prompt)]);
        self.client.complete(&request).await
    }
}
