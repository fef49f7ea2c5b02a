//! Conversation core: relevance gating, the per-session transcript with
//! write-once ratings, and the controller that drives one question/answer
//! cycle.

mod controller;
mod conversation;
mod engine;
mod rating;
mod relevance;

pub use controller::{TurnController, TurnError, TurnOutcome};
pub use conversation::{ConversationError, ConversationState, QaPair, Rating, Role, Turn, GREETING};
pub use engine::{Answer, AnswerEngine, EngineError};
pub use rating::{RatingCollector, RatingReceipt};
pub use relevance::{is_relevant, matched_phrase, DENYLIST, FALLBACK_TEXT};
