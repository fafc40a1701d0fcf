// Guided daily-review conversation: message types and the turn tracker.
//
// The server keeps no conversation cache. Every turn arrives with the full
// history (opening trigger, then alternating assistant questions and user
// answers), and the tracker derives the session phase from it.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Number of answers collected before the report is generated.
pub const TOTAL_QUESTIONS: usize = 8;

/// Content of the synthetic user message that opens a session.
pub const OPENING_TRIGGER: &str = "Start today's review";

// ---------------------------------------------------------------------------
// Messages
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// A role-tagged chat message. Messages have no identity beyond position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

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
}

// ---------------------------------------------------------------------------
// Phases
// ---------------------------------------------------------------------------

/// Lifecycle of a review session, as seen by an incoming turn.
///
/// `Collecting { answered: 0..=7 } -> Reporting -> Closed`. A session with no
/// messages yet has nothing to submit: an empty history is rejected by
/// [`Conversation::new`] rather than mapped to a phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewPhase {
    Collecting { answered: usize },
    Reporting,
    Closed,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum HistoryError {
    #[error("messages must not be empty")]
    Empty,

    #[error("message {index} has role `system`; system prompts are supplied by the server")]
    SystemMessage { index: usize },

    #[error("the conversation must open with a user message")]
    NotOpenedByUser,

    #[error("the last message must be the user's answer")]
    NoPendingAnswer,

    #[error("message {index} repeats the role of the message before it")]
    NotAlternating { index: usize },

    #[error("a review takes 8 answers, got {answered}")]
    TooManyAnswers { answered: usize },
}

// ---------------------------------------------------------------------------
// Conversation
// ---------------------------------------------------------------------------

/// A validated view over a submitted history.
#[derive(Debug, Clone, Copy)]
pub struct Conversation<'a> {
    messages: &'a [Message],
}

impl<'a> Conversation<'a> {
    /// Validate a submitted history. Rejects empty histories, embedded system
    /// messages, histories not strictly alternating user and assistant turns
    /// from a user opening to a user answer, and histories that already carry
    /// more than [`TOTAL_QUESTIONS`] answers.
    pub fn new(messages: &'a [Message]) -> Result<Self, HistoryError> {
        let (first, last) = match (messages.first(), messages.last()) {
            (Some(first), Some(last)) => (first, last),
            _ => return Err(HistoryError::Empty),
        };

        if let Some(index) = messages.iter().position(|m| m.role == Role::System) {
            return Err(HistoryError::SystemMessage { index });
        }
        if first.role != Role::User {
            return Err(HistoryError::NotOpenedByUser);
        }
        if last.role != Role::User {
            return Err(HistoryError::NoPendingAnswer);
        }
        if let Some(i) = messages.windows(2).position(|w| w[0].role == w[1].role) {
            return Err(HistoryError::NotAlternating { index: i + 1 });
        }

        let conversation = Self { messages };
        let answered = conversation.answered();
        if answered > TOTAL_QUESTIONS {
            return Err(HistoryError::TooManyAnswers { answered });
        }
        Ok(conversation)
    }

    pub fn messages(&self) -> &'a [Message] {
        self.messages
    }

    /// User-authored messages, opening trigger included.
    pub fn user_turns(&self) -> usize {
        self.messages.iter().filter(|m| m.role == Role::User).count()
    }

    /// Substantive answers: user messages after the opening trigger.
    pub fn answered(&self) -> usize {
        self.user_turns().saturating_sub(1)
    }

    /// True once the eighth answer is present.
    pub fn is_complete(&self) -> bool {
        self.answered() == TOTAL_QUESTIONS
    }

    /// True when this history is the session's opening turn.
    pub fn is_opening(&self) -> bool {
        self.user_turns() == 1
    }

    /// Phase this turn lands in. `closed` is whether the stored session
    /// already holds its report.
    pub fn phase(&self, closed: bool) -> ReviewPhase {
        if closed {
            ReviewPhase::Closed
        } else if self.is_complete() {
            ReviewPhase::Reporting
        } else {
            ReviewPhase::Collecting {
                answered: self.answered(),
            }
        }
    }

    /// Answers in submission order, opening trigger skipped.
    pub fn answers(&self) -> Vec<String> {
        self.messages
            .iter()
            .filter(|m| m.role == Role::User)
            .skip(1)
            .map(|m| m.content.clone())
            .collect()
    }
}
