use std::sync::Arc;

use thiserror::Error;

use super::conversation::{ConversationState, Turn};
use super::engine::{AnswerEngine, EngineError};
use super::relevance::{matched_phrase, FALLBACK_TEXT};
use crate::flags::FlagSink;

#[derive(Debug, Error)]
pub enum TurnError {
    #[error("question must not be empty")]
    EmptyQuestion,

    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// Result of one submit-question event.
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    pub session: ConversationState,
    /// Index of the appended assistant turn.
    pub answer_index: usize,
    /// True when the raw answer was replaced by the fallback text.
    pub gated: bool,
    pub warning: Option<String>,
}

/// Drives one question through the answer engine and the relevance gate.
#[derive(Clone)]
pub struct TurnController {
    engine: Arc<dyn AnswerEngine>,
    flags: Arc<dyn FlagSink>,
}

impl TurnController {
    pub fn new(engine: Arc<dyn AnswerEngine>, flags: Arc<dyn FlagSink>) -> Self {
        Self { engine, flags }
    }

    /// Produces the session that results from asking `question`.
    ///
    /// `session` itself is never modified, so on `Err` the caller simply
    /// keeps it and neither the question nor a partial answer is recorded.
    pub async fn submit_question(
        &self,
        session: &ConversationState,
        question: &str,
    ) -> Result<TurnOutcome, TurnError> {
        if question.trim().is_empty() {
            return Err(TurnError::EmptyQuestion);
        }

        let mut next = session.clone();
        next.withdraw_offer();
        next.append_turn(Turn::user(question));

        let answer = self
            .engine
            .ask(question, session.turns())
            .await
            .map_err(|err| {
                tracing::error!("Answer engine failed: {}", err);
                err
            })?;

        let mut warning = None;
        let gated = match matched_phrase(&answer.text) {
            Some(phrase) => {
                tracing::info!("Answer gated on phrase {:?}, using fallback", phrase);
                if let Err(err) = self.flags.record(question, FALLBACK_TEXT).await {
                    tracing::warn!("Failed to auto-flag gated answer: {}", err);
                    warning = Some(format!(
                        "This question could not be flagged for review: {}",
                        err
                    ));
                }
                next.append_turn(Turn::assistant(FALLBACK_TEXT));
                true
            }
            None => {
                next.append_turn(Turn::assistant(answer.text));
                next.offer_rating(next.len() - 1);
                false
            }
        };

        Ok(TurnOutcome {
            answer_index: next.len() - 1,
            session: next,
            gated,
            warning,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::chat::{Answer, RatingCollector, Role};
    use crate::flags::StoreError;

    struct ScriptedEngine {
        reply: Result<String, String>,
        seen_history: Mutex<Vec<usize>>,
    }

    impl ScriptedEngine {
        fn answering(text: &str) -> Self {
            Self {
                reply: Ok(text.to_string()),
                seen_history: Mutex::new(Vec::new()),
            }
        }

        fn failing(message: &str) -> Self {
            Self {
                reply: Err(message.to_string()),
                seen_history: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl AnswerEngine for ScriptedEngine {
        async fn ask(&self, _question: &str, history: &[Turn]) -> Result<Answer, EngineError> {
            self.seen_history.lock().unwrap().push(history.len());
            match &self.reply {
                Ok(text) => Ok(Answer::new(text.clone())),
                Err(message) => Err(EngineError::Backend(message.clone())),
            }
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        records: Mutex<Vec<(String, String)>>,
        fail: bool,
    }

    #[async_trait]
    impl FlagSink for RecordingSink {
        async fn record(&self, question: &str, answer: &str) -> Result<(), StoreError> {
            if self.fail {
                return Err(StoreError::Query(sqlx::Error::PoolClosed));
            }
            self.records
                .lock()
                .unwrap()
                .push((question.to_string(), answer.to_string()));
            Ok(())
        }
    }

    fn controller(engine: ScriptedEngine, sink: Arc<RecordingSink>) -> TurnController {
        TurnController::new(Arc::new(engine), sink)
    }

    #[tokio::test]
    async fn relevant_answer_is_shown_verbatim_and_offered_for_rating() {
        let sink = Arc::new(RecordingSink::default());
        let ctl = controller(
            ScriptedEngine::answering("Motionwise is TTTech Auto's safety platform."),
            sink.clone(),
        );

        let outcome = ctl
            .submit_question(&ConversationState::new(), "What is Motionwise?")
            .await
            .unwrap();

        let turns = outcome.session.turns();
        assert_eq!(turns.len(), 3);
        assert_eq!(turns[1].role(), Role::User);
        assert_eq!(turns[1].content(), "What is Motionwise?");
        assert_eq!(turns[2].content(), "Motionwise is TTTech Auto's safety platform.");
        assert!(!outcome.gated);
        assert_eq!(outcome.answer_index, 2);
        assert_eq!(RatingCollector::offered_index(&outcome.session), Some(2));
        assert!(sink.records.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn irrelevant_answer_is_replaced_and_auto_flagged() {
        let sink = Arc::new(RecordingSink::default());
        let ctl = controller(
            ScriptedEngine::answering("The provided information does not specify the weather."),
            sink.clone(),
        );

        let outcome = ctl
            .submit_question(&ConversationState::new(), "What's the weather?")
            .await
            .unwrap();

        assert!(outcome.gated);
        assert_eq!(outcome.session.turns()[2].content(), FALLBACK_TEXT);
        assert!(outcome
            .session
            .turns()
            .iter()
            .all(|turn| !turn.content().contains("does not specify")));
        assert_eq!(RatingCollector::offered_index(&outcome.session), None);
        assert_eq!(
            *sink.records.lock().unwrap(),
            vec![("What's the weather?".to_string(), FALLBACK_TEXT.to_string())]
        );
    }

    #[tokio::test]
    async fn engine_failure_leaves_session_unchanged() {
        let ctl = controller(
            ScriptedEngine::failing("connection refused"),
            Arc::new(RecordingSink::default()),
        );
        let session = ConversationState::new();

        let err = ctl.submit_question(&session, "What is Motionwise?").await.unwrap_err();

        assert!(matches!(err, TurnError::Engine(EngineError::Backend(_))));
        assert_eq!(session, ConversationState::new());
    }

    #[tokio::test]
    async fn blank_question_is_rejected_before_engine_call() {
        let engine = Arc::new(ScriptedEngine::answering("unused"));
        let ctl = TurnController::new(engine.clone(), Arc::new(RecordingSink::default()));

        let err = ctl.submit_question(&ConversationState::new(), "   ").await.unwrap_err();

        assert!(matches!(err, TurnError::EmptyQuestion));
        assert!(engine.seen_history.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn new_question_withdraws_previous_offer() {
        let engine = Arc::new(ScriptedEngine::answering("An answer."));
        let ctl = TurnController::new(engine.clone(), Arc::new(RecordingSink::default()));

        let first = ctl
            .submit_question(&ConversationState::new(), "q1")
            .await
            .unwrap();
        let second = ctl.submit_question(&first.session, "q2").await.unwrap();

        assert_eq!(RatingCollector::offered_index(&second.session), Some(4));
        assert!(!second.session.is_fully_rated(2));
        assert_eq!(second.session.ratings().len(), second.session.turns().len());
        assert_eq!(*engine.seen_history.lock().unwrap(), vec![1, 3]);
    }

    #[tokio::test]
    async fn flag_store_failure_is_a_warning_not_an_error() {
        let sink = Arc::new(RecordingSink {
            fail: true,
            ..Default::default()
        });
        let ctl = controller(ScriptedEngine::answering("Apologies, I cannot help."), sink);

        let outcome = ctl
            .submit_question(&ConversationState::new(), "q")
            .await
            .unwrap();

        assert!(outcome.gated);
        assert!(outcome.warning.is_some());
        assert_eq!(outcome.session.turns()[2].content(), FALLBACK_TEXT);
    }
}
