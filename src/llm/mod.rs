pub mod client;
pub mod prompts;
pub mod service;
pub mod types;

pub use client::ChatClient;
pub use service::{ChatLlmService, LlmService};
