pub mod client;
pub mod provider;
pub mod types;

pub use client::OpenAiClient;
pub use provider::{LlmError, LlmProvider};
pub use types::{ChatMessage, ChatRequest};
