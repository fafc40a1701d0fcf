// Idea scoring: one gateway call, then tolerant extraction of the JSON
// verdict from the model's text.

use copilot_core::model::{IdeaDraft, IdeaScore, Verdict};
use serde::Deserialize;
use tracing::debug;

use crate::client::{ChatGateway, GatewayError};
use crate::prompt;

/// Shape the model is asked to return. `score` and `verdict` are checked
/// by hand so bad values produce a specific message.
#[derive(Deserialize)]
struct RawScore {
    score: serde_json::Value,
    verdict: String,
    #[serde(default)]
    comment: String,
    #[serde(default)]
    strengths: Vec<String>,
    #[serde(default)]
    weaknesses: Vec<String>,
}

/// Score an idea with a single gateway call.
pub async fn score_idea(
    gateway: &dyn ChatGateway,
    idea: &IdeaDraft,
) -> Result<IdeaScore, GatewayError> {
    let raw = gateway.complete(&prompt::scoring_messages(idea)).await?;
    debug!(chars = raw.len(), "scoring response received");
    parse_score(&raw)
}

/// The span from the first `{` to the last `}`, tolerating prose the model
/// adds around the object. Trailing prose that itself contains `}` breaks
/// this; the JSON parse then fails and the caller retries.
pub fn extract_json_object(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    (end > start).then(|| &raw[start..=end])
}

/// Parse and validate a scoring response.
pub fn parse_score(raw: &str) -> Result<IdeaScore, GatewayError> {
    let json = extract_json_object(raw)
        .ok_or_else(|| GatewayError::MalformedResponse("no JSON object in scoring reply".into()))?;

    let parsed: RawScore = serde_json::from_str(json)
        .map_err(|e| GatewayError::MalformedResponse(format!("scoring JSON did not parse: {e}")))?;

    let score = parsed
        .score
        .as_u64()
        .filter(|s| *s <= 100)
        .ok_or_else(|| {
            GatewayError::MalformedResponse(format!(
                "score must be an integer in 0..=100, got {}",
                parsed.score
            ))
        })? as u8;

    let verdict = match parsed.verdict.as_str() {
        "approved" => Verdict::Approved,
        "needs_work" => Verdict::NeedsWork,
        "rejected" => Verdict::Rejected,
        other => {
            return Err(GatewayError::MalformedResponse(format!(
                "unknown verdict `{other}`"
            )))
        }
    };

    Ok(IdeaScore {
        score,
        verdict,
        comment: parsed.comment,
        strengths: parsed.strengths,
        weaknesses: parsed.weaknesses,
    })
}
