// Daily review turns: decide between asking the next question and closing
// the session with a report.

use copilot_core::db::ReviewCompletion;
use copilot_core::model::ReviewLog;
use copilot_core::protocol::{ReviewTurnReply, ReviewTurnRequest};
use copilot_core::review::{Conversation, ReviewPhase, TOTAL_QUESTIONS};
use copilot_llm::prompt;
use tracing::{debug, info};

use crate::error::CopilotError;
use crate::state::AppState;

/// Date shown in report headings, e.g. `March 3, 2026`.
pub fn report_date_today() -> String {
    chrono::Local::now().format("%B %-d, %Y").to_string()
}

/// Handle one review turn dated today.
pub async fn review_turn(
    state: &AppState,
    owner: &str,
    request: ReviewTurnRequest,
) -> Result<ReviewTurnReply, CopilotError> {
    review_turn_dated(state, owner, request, &report_date_today()).await
}

/// Handle one review turn; `date` is used only if this turn closes the
/// session.
///
/// Validation happens before the gateway is called. The draft record is
/// created only after the opening turn's reply succeeds, and completion
/// writes the report and answers in a single conditional update, so a failed
/// call leaves nothing behind.
pub async fn review_turn_dated(
    state: &AppState,
    owner: &str,
    request: ReviewTurnRequest,
    date: &str,
) -> Result<ReviewTurnReply, CopilotError> {
    let conversation = Conversation::new(&request.messages)?;

    let closed = match request.session_id.as_deref() {
        Some(id) => state
            .db
            .get_review(id, owner)?
            .ok_or(CopilotError::NotFound {
                what: "review session",
            })?
            .is_complete(),
        None => false,
    };

    match conversation.phase(closed) {
        ReviewPhase::Closed => Err(CopilotError::SessionClosed {
            id: request.session_id.unwrap_or_default(),
        }),
        ReviewPhase::Reporting => {
            close_session(state, owner, conversation, request.session_id.as_deref(), date).await
        }
        ReviewPhase::Collecting { answered } => {
            if request.is_complete == Some(true) {
                return Err(CopilotError::Validation(format!(
                    "isComplete set after {answered} of {TOTAL_QUESTIONS} answers"
                )));
            }
            if request.session_id.is_none() && !conversation.is_opening() {
                return Err(CopilotError::Validation(
                    "sessionId is required after the opening turn".into(),
                ));
            }
            ask_next(state, owner, conversation, request.session_id).await
        }
    }
}

async fn ask_next(
    state: &AppState,
    owner: &str,
    conversation: Conversation<'_>,
    session_id: Option<String>,
) -> Result<ReviewTurnReply, CopilotError> {
    let reply = state
        .gateway
        .complete(&prompt::review_messages(conversation.messages()))
        .await?;

    // Only the opening turn arrives without an id.
    let session_id = match session_id {
        Some(id) => id,
        None => {
            let id = state.db.create_review_draft(owner)?;
            info!(owner, session_id = %id, "review session started");
            id
        }
    };
    debug!(session_id = %session_id, answered = conversation.answered(), "asked next question");

    Ok(ReviewTurnReply {
        reply,
        session_id,
        is_report: false,
    })
}

async fn close_session(
    state: &AppState,
    owner: &str,
    conversation: Conversation<'_>,
    session_id: Option<&str>,
    date: &str,
) -> Result<ReviewTurnReply, CopilotError> {
    let report = state
        .gateway
        .complete(&prompt::report_messages(conversation.messages(), date))
        .await?;

    let answers = conversation.answers();
    match state.db.complete_review(owner, session_id, &answers, &report)? {
        ReviewCompletion::Completed { id } => {
            info!(owner, session_id = %id, "review session completed");
            Ok(ReviewTurnReply {
                reply: report,
                session_id: id,
                is_report: true,
            })
        }
        // Lost a race with another submission for the same session.
        ReviewCompletion::AlreadyClosed => Err(CopilotError::SessionClosed {
            id: session_id.unwrap_or_default().to_string(),
        }),
        ReviewCompletion::Missing => Err(CopilotError::NotFound {
            what: "review session",
        }),
    }
}

/// The caller's review sessions, newest first.
pub fn list_reviews(state: &AppState, owner: &str) -> Result<Vec<ReviewLog>, CopilotError> {
    Ok(state.db.list_reviews(owner)?)
}
