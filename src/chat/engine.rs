use async_trait::async_trait;
use thiserror::Error;

use super::conversation::Turn;

/// Raw text produced by the answer engine, before relevance gating.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Answer {
    pub text: String,
}

impl Answer {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("document index has not been built")]
    IndexNotBuilt,

    #[error("document index error: {0}")]
    Index(String),

    #[error("language model backend error: {0}")]
    Backend(String),
}

/// Produces an answer for a question. `history` is the transcript before the
/// question; engines that answer statelessly may ignore it.
#[async_trait]
pub trait AnswerEngine: Send + Sync {
    async fn ask(&self, question: &str, history: &[Turn]) -> Result<Answer, EngineError>;
}
