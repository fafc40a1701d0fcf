// Request dispatch: decode a frame, resolve the caller, route the operation
// to its handler, and encode the outcome as a response frame.

use anyhow::Context;
use copilot_core::protocol::{Operation, Request, Response};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::error::CopilotError;
use crate::state::AppState;
use crate::{ideas, review};

/// Error kind for frames that are not a well-formed request.
pub const BAD_REQUEST: &str = "bad_request";

/// Handle one raw text frame. Always produces exactly one response.
pub async fn handle_frame(state: &AppState, text: &str) -> Response {
    match serde_json::from_str::<Request>(text) {
        Ok(request) => handle_request(state, request).await,
        Err(e) => {
            // Echo the correlation id when the frame is at least a JSON object.
            let id = serde_json::from_str::<Value>(text)
                .ok()
                .and_then(|v| v.get("id").and_then(Value::as_str).map(str::to_string));
            warn!("Rejected malformed frame: {e}");
            Response::failure(id, BAD_REQUEST, format!("malformed request: {e}"))
        }
    }
}

pub async fn handle_request(state: &AppState, request: Request) -> Response {
    let Request {
        id,
        user,
        operation,
    } = request;
    let op = operation.name();

    match dispatch(state, user.as_deref(), operation).await {
        Ok(result) => {
            debug!(op, "request handled");
            Response::success(id, result)
        }
        Err(err) => {
            warn!(op, kind = err.kind(), retryable = err.is_retryable(), "request failed: {err}");
            Response::failure(id, err.kind(), err.to_string())
        }
    }
}

async fn dispatch(
    state: &AppState,
    user: Option<&str>,
    operation: Operation,
) -> Result<Value, CopilotError> {
    let owner = user
        .map(str::trim)
        .filter(|u| !u.is_empty())
        .ok_or(CopilotError::Unauthorized)?;
    state.db.touch_user(owner)?;

    match operation {
        Operation::ReviewTurn(req) => to_value(&review::review_turn(state, owner, req).await?),
        Operation::ListReviews => to_value(&review::list_reviews(state, owner)?),
        Operation::ScoreIdea(r) => to_value(&ideas::score_idea(state, owner, &r.idea_id).await?),
        Operation::CreateIdea(draft) => to_value(&ideas::create_idea(state, owner, draft)?),
        Operation::UpdateIdea(update) => to_value(&ideas::update_idea(state, owner, update)?),
        Operation::ListIdeas(filter) => to_value(&ideas::list_ideas(state, owner, filter.status)?),
        Operation::DeleteIdea(r) => {
            ideas::delete_idea(state, owner, &r.idea_id)?;
            Ok(json!({ "deleted": true }))
        }
        Operation::GetUser => {
            let user = state
                .db
                .get_user(owner)?
                .ok_or(CopilotError::NotFound { what: "user" })?;
            to_value(&user)
        }
        Operation::ListActivities => to_value(&state.db.list_activities(owner)?),
    }
}

fn to_value<T: Serialize>(value: &T) -> Result<Value, CopilotError> {
    Ok(serde_json::to_value(value).context("failed to encode result")?)
}
