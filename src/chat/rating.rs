use std::sync::Arc;

use super::conversation::{ConversationError, ConversationState, Rating};
use crate::flags::FlagSink;

/// Result of a rating event.
#[derive(Debug, Clone)]
pub struct RatingReceipt {
    pub session: ConversationState,
    pub index: usize,
    pub rating: Rating,
    /// True when the pair was written to the flag store.
    pub flagged: bool,
    pub warning: Option<String>,
}

/// Offers the 1-3 choice for the newest assistant turn and routes a top
/// rating into the flag store.
#[derive(Clone)]
pub struct RatingCollector {
    flags: Arc<dyn FlagSink>,
}

impl RatingCollector {
    pub fn new(flags: Arc<dyn FlagSink>) -> Self {
        Self { flags }
    }

    /// Index of the turn that should currently show rating buttons, if any.
    pub fn offered_index(session: &ConversationState) -> Option<usize> {
        let index = session.rating_offer()?;
        let newest = index + 1 == session.len();
        (newest && !session.is_fully_rated(index)).then_some(index)
    }

    /// Applies a rating to the offered turn and returns the new session.
    ///
    /// A top rating is persisted before this returns. A store failure keeps
    /// the rating and is reported through `warning`.
    pub async fn submit(
        &self,
        session: &ConversationState,
        index: usize,
        value: u8,
    ) -> Result<RatingReceipt, ConversationError> {
        let rating = Rating::new(value)?;
        if session.is_fully_rated(index) {
            return Err(ConversationError::AlreadyRated { index });
        }
        if Self::offered_index(session) != Some(index) {
            return Err(ConversationError::NotOffered { index });
        }

        let mut next = session.clone();
        let pair = next.set_rating(index, rating)?;

        let mut flagged = false;
        let mut warning = None;
        if let Some(pair) = pair {
            match self.flags.record(&pair.question, &pair.answer).await {
                Ok(()) => flagged = true,
                Err(err) => {
                    tracing::warn!("Failed to flag top-rated answer {}: {}", index, err);
                    warning = Some(format!(
                        "Your rating was saved, but the answer could not be flagged for review: {}",
                        err
                    ));
                }
            }
        }

        tracing::debug!("Turn {} rated {}", index, rating.value());
        Ok(RatingReceipt {
            session: next,
            index,
            rating,
            flagged,
            warning,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::chat::Turn;
    use crate::flags::StoreError;

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

    fn offered_session() -> ConversationState {
        let mut state = ConversationState::new();
        state.append_turn(Turn::user("What is Motionwise?"));
        state.append_turn(Turn::assistant("Motionwise is TTTech Auto's safety platform."));
        state.offer_rating(2);
        state
    }

    #[test]
    fn offer_is_limited_to_newest_unrated_turn() {
        let mut state = offered_session();
        assert_eq!(RatingCollector::offered_index(&state), Some(2));

        state.append_turn(Turn::user("follow-up"));
        assert_eq!(RatingCollector::offered_index(&state), None);

        assert_eq!(RatingCollector::offered_index(&ConversationState::new()), None);
    }

    #[tokio::test]
    async fn top_rating_records_exactly_one_flag() {
        let sink = Arc::new(RecordingSink::default());
        let collector = RatingCollector::new(sink.clone());

        let receipt = collector.submit(&offered_session(), 2, 3).await.unwrap();

        assert!(receipt.flagged);
        assert_eq!(receipt.warning, None);
        assert_eq!(
            *sink.records.lock().unwrap(),
            vec![(
                "What is Motionwise?".to_string(),
                "Motionwise is TTTech Auto's safety platform.".to_string()
            )]
        );
        assert_eq!(RatingCollector::offered_index(&receipt.session), None);
        assert_eq!(receipt.session.rating(2), Some(Rating::TOP));
    }

    #[tokio::test]
    async fn lower_ratings_are_not_flagged() {
        let sink = Arc::new(RecordingSink::default());
        let collector = RatingCollector::new(sink.clone());

        let receipt = collector.submit(&offered_session(), 2, 2).await.unwrap();

        assert!(!receipt.flagged);
        assert!(sink.records.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn rerating_is_rejected_and_input_session_is_untouched() {
        let collector = RatingCollector::new(Arc::new(RecordingSink::default()));
        let original = offered_session();

        let receipt = collector.submit(&original, 2, 1).await.unwrap();
        assert_eq!(original.rating(2), None);

        let err = collector.submit(&receipt.session, 2, 3).await.unwrap_err();
        assert_eq!(err, ConversationError::AlreadyRated { index: 2 });
        assert_eq!(receipt.session.rating(2).map(Rating::value), Some(1));
    }

    #[tokio::test]
    async fn turns_that_are_not_offered_cannot_be_rated() {
        let collector = RatingCollector::new(Arc::new(RecordingSink::default()));
        let mut state = offered_session();
        state.withdraw_offer();

        let err = collector.submit(&state, 2, 3).await.unwrap_err();
        assert_eq!(err, ConversationError::NotOffered { index: 2 });
    }

    #[tokio::test]
    async fn out_of_range_value_is_rejected() {
        let collector = RatingCollector::new(Arc::new(RecordingSink::default()));
        let err = collector.submit(&offered_session(), 2, 5).await.unwrap_err();
        assert_eq!(err, ConversationError::InvalidRating(5));
    }

    #[tokio::test]
    async fn store_failure_keeps_rating_and_warns() {
        let sink = Arc::new(RecordingSink {
            fail: true,
            ..Default::default()
        });
        let collector = RatingCollector::new(sink);

        let receipt = collector.submit(&offered_session(), 2, 3).await.unwrap();

        assert!(!receipt.flagged);
        assert!(receipt.warning.is_some());
        assert_eq!(receipt.session.rating(2), Some(Rating::TOP));
    }
}
