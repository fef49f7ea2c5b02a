//! Retrieval-augmented answer engine in condense-question mode.

use std::sync::Arc;

use async_trait::async_trait;

use super::context::format_context;
use super::index::IndexHandle;
use crate::chat::{Answer, AnswerEngine, EngineError, Role, Turn};
use crate::llm::{ChatMessage, ChatRequest, LlmError, LlmProvider};

pub const SYSTEM_PROMPT: &str = "You have expert level technical knowledge about TTTech Auto's products, \
specifically about Motionwise. If a question arises for which TTTech Auto has not provided information \
in the document, you must explicitly acknowledge the lack of data and clarify that the information is \
not available. You are an expert on the TTTech Auto's products and your job is to answer technical \
questions. Assume that all questions are related to the TTTech Auto's product specifications. Keep your \
answers technical and based on facts - do not hallucinate features.";

const CONDENSE_TEMPLATE: &str = "Given a conversation (between Human and Assistant) and a follow up \
message from Human, rewrite the message to be a standalone question that captures all relevant context \
from the conversation.\n\n<Chat History>\n{chat_history}\n\n<Follow Up Message>\n{question}\n\n<Standalone question>\n";

const QA_TEMPLATE: &str = "Context information is below.\n---------------------\n{context}\n\
---------------------\nGiven the context information and not prior knowledge, answer the query.\n\
Query: {question}\nAnswer: ";

const MAX_CONTEXT_CHARS: usize = 6000;

impl From<LlmError> for EngineError {
    fn from(err: LlmError) -> Self {
        EngineError::Backend(err.to_string())
    }
}

pub struct RagAnswerEngine {
    llm: Arc<dyn LlmProvider>,
    index: IndexHandle,
    top_k: usize,
    temperature: f64,
}

impl RagAnswerEngine {
    pub fn new(llm: Arc<dyn LlmProvider>, index: IndexHandle, top_k: usize, temperature: f64) -> Self {
        Self {
            llm,
            index,
            top_k,
            temperature,
        }
    }

    /// Rewrites a follow-up into a standalone question. Without earlier user
    /// turns the question is returned as is.
    async fn condense(&self, question: &str, history: &[Turn]) -> Result<String, EngineError> {
        let Some(chat_history) = render_history(history) else {
            return Ok(question.to_string());
        };

        let prompt = CONDENSE_TEMPLATE
            .replace("{chat_history}", &chat_history)
            .replace("{question}", question);
        let standalone = self
            .llm
            .chat(ChatRequest::new(vec![ChatMessage::user(prompt)]).with_temperature(0.0))
            .await?;

        let standalone = standalone.trim();
        if standalone.is_empty() {
            return Ok(question.to_string());
        }
        tracing::debug!("Condensed question: {}", standalone);
        Ok(standalone.to_string())
    }
}

/// Transcript from the first user turn on, one `role: content` line each.
fn render_history(history: &[Turn]) -> Option<String> {
    let first_user = history.iter().position(|t| t.role() == Role::User)?;
    let lines: Vec<String> = history[first_user..]
        .iter()
        .map(|turn| format!("{}: {}", turn.role().as_str(), turn.content()))
        .collect();
    Some(lines.join("\n"))
}

#[async_trait]
impl AnswerEngine for RagAnswerEngine {
    async fn ask(&self, question: &str, history: &[Turn]) -> Result<Answer, EngineError> {
        let index = self.index.get()?;
        let standalone = self.condense(question, history).await?;

        let query_embedding = self
            .llm
            .embed(std::slice::from_ref(&standalone))
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| EngineError::Backend("embedder returned no vector".to_string()))?;

        let hits = index.search(&query_embedding, self.top_k);
        tracing::debug!("Retrieved {} chunks for question", hits.len());
        let context = format_context(&hits, MAX_CONTEXT_CHARS);

        let prompt = QA_TEMPLATE
            .replace("{context}", &context)
            .replace("{question}", &standalone);
        let request = ChatRequest::new(vec![
            ChatMessage::system(SYSTEM_PROMPT),
            ChatMessage::user(prompt),
        ])
        .with_temperature(self.temperature);

        let text = self.llm.chat(request).await?;
        Ok(Answer::new(text))
    }
}
