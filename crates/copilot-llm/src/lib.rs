// LLM gateway client, prompt templates, and scoring-response parsing.

pub mod client;
pub mod prompt;
pub mod scoring;

pub use client::{ChatGateway, GatewayError, LlmClient};
