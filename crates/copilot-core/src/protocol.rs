// Wire protocol: JSON request/response frames exchanged over the WebSocket.
//
// A request frame is `{"id", "user", "type", "payload"}`; every request is
// answered by exactly one response frame echoing its `id`.

use serde::{Deserialize, Deserializer, Serialize};

use crate::model::{Idea, IdeaDraft, IdeaPatch, IdeaStatus, Verdict};
use crate::review::Message;

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "RawRequest")]
pub struct Request {
    /// Caller-chosen correlation id, echoed in the response.
    pub id: Option<String>,
    /// Caller identity established by the outer authentication layer.
    pub user: Option<String>,
    pub operation: Operation,
}

/// Frame as it arrives. The payload is decoded per operation once the type
/// is known, so a missing or `null` payload reaches the handler as an empty
/// object and is rejected there with a specific message.
#[derive(Deserialize)]
struct RawRequest {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    user: Option<String>,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    payload: Option<serde_json::Value>,
}

impl TryFrom<RawRequest> for Request {
    type Error = serde_json::Error;

    fn try_from(raw: RawRequest) -> Result<Self, Self::Error> {
        let payload = raw
            .payload
            .filter(|p| !p.is_null())
            .unwrap_or_else(|| serde_json::Value::Object(Default::default()));
        Ok(Self {
            id: raw.id,
            user: raw.user,
            operation: Operation::decode(&raw.kind, payload)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    ReviewTurn(ReviewTurnRequest),
    ListReviews,
    ScoreIdea(IdeaRef),
    CreateIdea(IdeaDraft),
    UpdateIdea(IdeaUpdate),
    ListIdeas(IdeaFilter),
    DeleteIdea(IdeaRef),
    GetUser,
    ListActivities,
}

impl Operation {
    pub fn name(&self) -> &'static str {
        match self {
            Operation::ReviewTurn(_) => "REVIEW_TURN",
            Operation::ListReviews => "LIST_REVIEWS",
            Operation::ScoreIdea(_) => "SCORE_IDEA",
            Operation::CreateIdea(_) => "CREATE_IDEA",
            Operation::UpdateIdea(_) => "UPDATE_IDEA",
            Operation::ListIdeas(_) => "LIST_IDEAS",
            Operation::DeleteIdea(_) => "DELETE_IDEA",
            Operation::GetUser => "GET_USER",
            Operation::ListActivities => "LIST_ACTIVITIES",
        }
    }

    /// Decode `payload` for the operation named `kind`. Operations without
    /// arguments ignore their payload.
    pub fn decode(kind: &str, payload: serde_json::Value) -> Result<Self, serde_json::Error> {
        use serde::de::Error as _;
        use serde_json::from_value;

        Ok(match kind {
            "REVIEW_TURN" => Operation::ReviewTurn(from_value(payload)?),
            "LIST_REVIEWS" => Operation::ListReviews,
            "SCORE_IDEA" => Operation::ScoreIdea(from_value(payload)?),
            "CREATE_IDEA" => Operation::CreateIdea(from_value(payload)?),
            "UPDATE_IDEA" => Operation::UpdateIdea(from_value(payload)?),
            "LIST_IDEAS" => Operation::ListIdeas(from_value(payload)?),
            "DELETE_IDEA" => Operation::DeleteIdea(from_value(payload)?),
            "GET_USER" => Operation::GetUser,
            "LIST_ACTIVITIES" => Operation::ListActivities,
            other => return Err(serde_json::Error::custom(format!("unknown operation `{other}`"))),
        })
    }
}

/// One turn of the guided review. `messages` is the full history including
/// the answer being submitted; absent or `null` decodes as empty.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewTurnRequest {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub messages: Vec<Message>,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub is_complete: Option<bool>,
}

/// Reference to one idea. A missing id decodes as empty and is rejected by
/// the handler.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdeaRef {
    #[serde(default)]
    pub idea_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdeaUpdate {
    #[serde(default)]
    pub idea_id: String,
    #[serde(flatten)]
    pub patch: IdeaPatch,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct IdeaFilter {
    #[serde(default)]
    pub status: Option<IdeaStatus>,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<Message>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<Message>>::deserialize(deserializer)?.unwrap_or_default())
}

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewTurnReply {
    /// The next question, or the Markdown report when `is_report` is set.
    pub reply: String,
    pub session_id: String,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub is_report: bool,
}

/// An idea with its freshly computed score merged in.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoredIdea {
    #[serde(flatten)]
    pub idea: Idea,
    pub verdict: Verdict,
    pub strengths: Vec<String>,
    pub weaknesses: Vec<String>,
}

// ---------------------------------------------------------------------------
// Response frames
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorBody {
    /// Stable machine-readable category, e.g. `validation` or `upstream`.
    pub kind: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Response {
    pub id: Option<String>,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
}

impl Response {
    pub fn success(id: Option<String>, result: serde_json::Value) -> Self {
        Self {
            id,
            ok: true,
            result: Some(result),
            error: None,
        }
    }

    pub fn failure(id: Option<String>, kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            id,
            ok: false,
            result: None,
            error: Some(ErrorBody {
                kind: kind.into(),
                message: message.into(),
            }),
        }
    }
}
