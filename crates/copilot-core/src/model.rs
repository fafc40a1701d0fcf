// Persisted domain records: ideas, scores, review logs, activity entries.

use serde::{Deserialize, Deserializer, Serialize};

// ---------------------------------------------------------------------------
// Idea scoring
// ---------------------------------------------------------------------------

/// Categorical outcome of an idea evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Approved,
    NeedsWork,
    Rejected,
}

impl Verdict {
    pub fn as_str(self) -> &'static str {
        match self {
            Verdict::Approved => "approved",
            Verdict::NeedsWork => "needs_work",
            Verdict::Rejected => "rejected",
        }
    }

    /// The idea status an idea moves to after receiving this verdict.
    /// `needs_work` leaves the idea pending.
    pub fn resulting_status(self) -> IdeaStatus {
        match self {
            Verdict::Approved => IdeaStatus::Approved,
            Verdict::NeedsWork => IdeaStatus::Pending,
            Verdict::Rejected => IdeaStatus::Rejected,
        }
    }
}

/// One evaluation of an idea. Only the latest score is kept on the idea.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdeaScore {
    pub score: u8,
    pub verdict: Verdict,
    pub comment: String,
    pub strengths: Vec<String>,
    pub weaknesses: Vec<String>,
}

// ---------------------------------------------------------------------------
// Ideas
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdeaStatus {
    Pending,
    Approved,
    Rejected,
}

impl IdeaStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            IdeaStatus::Pending => "pending",
            IdeaStatus::Approved => "approved",
            IdeaStatus::Rejected => "rejected",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(IdeaStatus::Pending),
            "approved" => Some(IdeaStatus::Approved),
            "rejected" => Some(IdeaStatus::Rejected),
            _ => None,
        }
    }
}

/// The caller-editable fields of an idea: title plus the business canvas.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdeaDraft {
    /// Required; a missing title decodes as empty and is rejected on create.
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub canvas_target: Option<String>,
    #[serde(default)]
    pub canvas_pain: Option<String>,
    #[serde(default)]
    pub canvas_mvp: Option<String>,
    #[serde(default)]
    pub canvas_revenue: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Idea {
    pub id: String,
    pub owner: String,
    #[serde(flatten)]
    pub draft: IdeaDraft,
    pub status: IdeaStatus,
    pub vc_score: Option<u8>,
    pub vc_comment: Option<String>,
    pub vc_strengths: Vec<String>,
    pub vc_weaknesses: Vec<String>,
    pub created_at: String,
}

/// Partial update of an idea. Absent fields are left alone; for nullable
/// columns an explicit `null` clears the value.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdeaPatch {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "present")]
    pub description: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub canvas_target: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub canvas_pain: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub canvas_mvp: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub canvas_revenue: Option<Option<String>>,
    #[serde(default)]
    pub status: Option<IdeaStatus>,
    #[serde(default, deserialize_with = "present")]
    pub vc_score: Option<Option<u8>>,
    #[serde(default, deserialize_with = "present")]
    pub vc_comment: Option<Option<String>>,
}

impl IdeaPatch {
    pub fn is_empty(&self) -> bool {
        *self == IdeaPatch::default()
    }
}

/// Marks a field as present even when its value is `null`.
fn present<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}

// ---------------------------------------------------------------------------
// Users
// ---------------------------------------------------------------------------

/// A caller as the store knows them. Created on first sight.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub day_streak: u32,
    pub created_at: String,
}

// ---------------------------------------------------------------------------
// Daily review logs
// ---------------------------------------------------------------------------

/// A guided review session. `report_md` is `None` while the session is a
/// draft and set exactly once when the eighth answer arrives.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewLog {
    pub id: String,
    pub owner: String,
    pub created_at: String,
    pub answers: Vec<Option<String>>,
    pub report_md: Option<String>,
}

impl ReviewLog {
    pub fn is_complete(&self) -> bool {
        self.report_md.is_some()
    }
}

// ---------------------------------------------------------------------------
// Activity feed
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    pub id: i64,
    pub owner: String,
    pub action_type: String,
    pub description: String,
    pub metadata: Option<serde_json::Value>,
    pub created_at: String,
}
