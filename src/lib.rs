pub mod config;
pub mod image;
pub mod llm;
pub mod models;
pub mod utils;
pub mod web;

pub use config::Config;
pub use utils::error::DigitError;

pub type Result<T> = std::result::Result<T, DigitError>;
