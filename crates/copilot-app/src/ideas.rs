// Idea handlers: CRUD over the store plus the scoring round trip.

use copilot_core::model::{Idea, IdeaDraft, IdeaStatus};
use copilot_core::protocol::{IdeaUpdate, ScoredIdea};
use copilot_llm::scoring;
use tracing::info;

use crate::error::CopilotError;
use crate::state::AppState;

pub fn create_idea(state: &AppState, owner: &str, mut draft: IdeaDraft) -> Result<Idea, CopilotError> {
    draft.title = draft.title.trim().to_string();
    if draft.title.is_empty() {
        return Err(CopilotError::Validation("idea title must not be empty".into()));
    }
    let idea = state.db.create_idea(owner, &draft)?;
    info!(owner, idea_id = %idea.id, "idea created");
    Ok(idea)
}

/// Apply a partial update from the caller. Only the editable fields can be
/// patched; an empty patch returns the idea unchanged.
pub fn update_idea(state: &AppState, owner: &str, update: IdeaUpdate) -> Result<Idea, CopilotError> {
    let idea_id = require_id(&update.idea_id)?;
    let mut patch = update.patch;
    if let Some(title) = patch.title.as_mut() {
        *title = title.trim().to_string();
        if title.is_empty() {
            return Err(CopilotError::Validation("idea title must not be empty".into()));
        }
    }
    if let Some(Some(score)) = patch.vc_score {
        if score > 100 {
            return Err(CopilotError::Validation(format!("vcScore {score} is out of range 0-100")));
        }
    }

    let idea = state
        .db
        .update_idea(idea_id, owner, &patch)?
        .ok_or(CopilotError::NotFound { what: "idea" })?;
    info!(owner, idea_id, "idea updated");
    Ok(idea)
}

pub fn list_ideas(
    state: &AppState,
    owner: &str,
    status: Option<IdeaStatus>,
) -> Result<Vec<Idea>, CopilotError> {
    Ok(state.db.list_ideas(owner, status)?)
}

pub fn delete_idea(state: &AppState, owner: &str, idea_id: &str) -> Result<(), CopilotError> {
    let idea_id = require_id(idea_id)?;
    if !state.db.delete_idea(idea_id, owner)? {
        return Err(CopilotError::NotFound { what: "idea" });
    }
    info!(owner, idea_id, "idea deleted");
    Ok(())
}

/// Score one of the caller's ideas and persist the result.
///
/// The stored idea is untouched unless the gateway reply parses into a
/// valid score.
pub async fn score_idea(
    state: &AppState,
    owner: &str,
    idea_id: &str,
) -> Result<ScoredIdea, CopilotError> {
    let idea_id = require_id(idea_id)?;
    let idea = state
        .db
        .get_idea(idea_id, owner)?
        .ok_or(CopilotError::NotFound { what: "idea" })?;

    let score = scoring::score_idea(state.gateway.as_ref(), &idea.draft).await?;

    // The idea may have been deleted while the gateway call was in flight.
    let idea = state
        .db
        .apply_idea_score(idea_id, owner, &score)?
        .ok_or(CopilotError::NotFound { what: "idea" })?;
    info!(owner, idea_id, score = score.score, verdict = score.verdict.as_str(), "idea scored");

    Ok(ScoredIdea {
        idea,
        verdict: score.verdict,
        strengths: score.strengths,
        weaknesses: score.weaknesses,
    })
}

fn require_id(idea_id: &str) -> Result<&str, CopilotError> {
    let idea_id = idea_id.trim();
    if idea_id.is_empty() {
        return Err(CopilotError::Validation("ideaId must not be empty".into()));
    }
    Ok(idea_id)
}
