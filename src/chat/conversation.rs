use serde::Serialize;
use thiserror::Error;

/// Opening assistant turn of every session.
pub const GREETING: &str = "Ask me a question about TTTech Auto's Services!";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// One message of the transcript. Fields are private so a turn cannot be
/// edited once it is part of a conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    role: Role,
    content: String,
}

impl Turn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn content(&self) -> &str {
        &self.content
    }
}

/// Quality score for an assistant turn, always 1, 2 or 3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Rating(u8);

impl Rating {
    pub const TOP: Rating = Rating(3);

    pub fn new(value: u8) -> Result<Self, ConversationError> {
        match value {
            1..=3 => Ok(Rating(value)),
            other => Err(ConversationError::InvalidRating(other)),
        }
    }

    pub fn value(self) -> u8 {
        self.0
    }

    pub fn is_top(self) -> bool {
        self == Self::TOP
    }
}

impl TryFrom<u8> for Rating {
    type Error = ConversationError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Rating::new(value)
    }
}

/// Question/answer pair handed to the flag store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QaPair {
    pub question: String,
    pub answer: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConversationError {
    #[error("rating must be 1, 2 or 3, got {0}")]
    InvalidRating(u8),

    #[error("no turn at index {index}")]
    UnknownTurn { index: usize },

    #[error("turn {index} is not an assistant turn")]
    NotAssistant { index: usize },

    #[error("turn {index} does not directly follow a user question")]
    Unpaired { index: usize },

    #[error("turn {index} is already rated")]
    AlreadyRated { index: usize },

    #[error("turn {index} is not open for rating")]
    NotOffered { index: usize },
}

/// Transcript of one session plus one rating slot per turn.
///
/// `ratings.len() == turns.len()` holds whenever the state is observable:
/// every append pads the rating list before returning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationState {
    turns: Vec<Turn>,
    ratings: Vec<Option<Rating>>,
    rating_offer: Option<usize>,
}

impl ConversationState {
    /// A fresh session holding only the greeting.
    pub fn new() -> Self {
        let mut state = Self::empty();
        state.append_turn(Turn::assistant(GREETING));
        state
    }

    /// A session without the greeting turn.
    pub fn empty() -> Self {
        Self {
            turns: Vec::new(),
            ratings: Vec::new(),
            rating_offer: None,
        }
    }

    pub fn append_turn(&mut self, turn: Turn) {
        self.turns.push(turn);
        self.pad_ratings();
    }

    fn pad_ratings(&mut self) {
        while self.ratings.len() < self.turns.len() {
            self.ratings.push(None);
        }
    }

    /// Records a write-once rating for the assistant turn at `index`.
    ///
    /// The question is the turn directly before `index`; it must be a user
    /// turn or the call is rejected. Returns the pair to flag when the
    /// rating is the top score.
    pub fn set_rating(
        &mut self,
        index: usize,
        rating: Rating,
    ) -> Result<Option<QaPair>, ConversationError> {
        let answer = self
            .turns
            .get(index)
            .ok_or(ConversationError::UnknownTurn { index })?;
        if answer.role != Role::Assistant {
            return Err(ConversationError::NotAssistant { index });
        }

        let question = index
            .checked_sub(1)
            .and_then(|prev| self.turns.get(prev))
            .filter(|turn| turn.role == Role::User)
            .ok_or(ConversationError::Unpaired { index })?;

        if self.is_fully_rated(index) {
            return Err(ConversationError::AlreadyRated { index });
        }

        let flagged = rating.is_top().then(|| QaPair {
            question: question.content.clone(),
            answer: answer.content.clone(),
        });

        self.ratings[index] = Some(rating);
        if self.rating_offer == Some(index) {
            self.rating_offer = None;
        }
        Ok(flagged)
    }

    pub fn is_fully_rated(&self, index: usize) -> bool {
        matches!(self.ratings.get(index), Some(Some(_)))
    }

    pub fn rating(&self, index: usize) -> Option<Rating> {
        self.ratings.get(index).copied().flatten()
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn ratings(&self) -> &[Option<Rating>] {
        &self.ratings
    }

    pub fn last_turn(&self) -> Option<&Turn> {
        self.turns.last()
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Index of the assistant turn whose rating choice is currently shown.
    pub fn rating_offer(&self) -> Option<usize> {
        self.rating_offer
    }

    pub(crate) fn offer_rating(&mut self, index: usize) {
        self.rating_offer = Some(index);
    }

    pub(crate) fn withdraw_offer(&mut self) {
        self.rating_offer = None;
    }
}

impl Default for ConversationState {
    fn default() -> Self {
        Self::new()
    }
}
