// SQLite persistence for users, ideas, review logs, and the activity feed.

use std::sync::{Mutex, MutexGuard};

use anyhow::{Context, Result};
use rusqlite::types::{Type, Value};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};

use crate::model::{Activity, Idea, IdeaDraft, IdeaPatch, IdeaScore, IdeaStatus, ReviewLog, User};
use crate::review::TOTAL_QUESTIONS;

/// Outcome of closing a review session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReviewCompletion {
    /// The report and answers were stored under this id.
    Completed { id: String },
    /// The session already holds a report; nothing was written.
    AlreadyClosed,
    /// No session with that id belongs to the caller.
    Missing,
}

/// SQLite-backed store. All access goes through one mutex-guarded
/// connection; writes are last-write-wins except review completion.
pub struct Database {
    conn: Mutex<Connection>,
}

const IDEA_COLUMNS: &str = "id, owner, title, description, canvas_target, canvas_pain, \
     canvas_mvp, canvas_revenue, status, vc_score, vc_comment, vc_strengths, vc_weaknesses, created_at";

const REVIEW_COLUMNS: &str =
    "id, owner, created_at, q1, q2, q3, q4, q5, q6, q7, q8, report_md";

impl Database {
    /// Open (or create) a SQLite database at `path` and ensure all tables
    /// exist. Pass `":memory:"` for an ephemeral in-memory database.
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open database at {path}"))?;

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA busy_timeout = 5000;
             PRAGMA foreign_keys = ON;",
        )
        .context("failed to set database pragmas")?;

        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS users (
                id         TEXT PRIMARY KEY,
                day_streak INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
            );

            CREATE TABLE IF NOT EXISTS ideas (
                id             TEXT PRIMARY KEY,
                owner          TEXT NOT NULL REFERENCES users(id),
                title          TEXT NOT NULL,
                description    TEXT,
                canvas_target  TEXT,
                canvas_pain    TEXT,
                canvas_mvp     TEXT,
                canvas_revenue TEXT,
                status         TEXT NOT NULL DEFAULT 'pending',
                vc_score       INTEGER,
                vc_comment     TEXT,
                vc_strengths   TEXT NOT NULL DEFAULT '[]',
                vc_weaknesses  TEXT NOT NULL DEFAULT '[]',
                created_at     TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
            );

            CREATE TABLE IF NOT EXISTS daily_logs (
                id         TEXT PRIMARY KEY,
                owner      TEXT NOT NULL REFERENCES users(id),
                created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
                q1 TEXT, q2 TEXT, q3 TEXT, q4 TEXT,
                q5 TEXT, q6 TEXT, q7 TEXT, q8 TEXT,
                report_md  TEXT
            );

            CREATE TABLE IF NOT EXISTS activities (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                owner       TEXT NOT NULL REFERENCES users(id),
                action_type TEXT NOT NULL,
                description TEXT NOT NULL,
                metadata    TEXT,
                created_at  TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
            );

            CREATE INDEX IF NOT EXISTS idx_ideas_owner ON ideas(owner);
            CREATE INDEX IF NOT EXISTS idx_daily_logs_owner ON daily_logs(owner);
            ",
        )
        .context("failed to create database schema")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Acquire the database connection.
    ///
    /// Panics if the mutex is poisoned (another thread panicked while
    /// holding the lock).
    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().expect("database mutex poisoned")
    }

    // ------------------------------------------------------------------
    // Users
    // ------------------------------------------------------------------

    /// Create the user row on first sight of a caller identity.
    pub fn touch_user(&self, owner: &str) -> Result<()> {
        let conn = self.conn();
        conn.execute("INSERT OR IGNORE INTO users (id) VALUES (?1)", params![owner])
            .context("failed to upsert user")?;
        Ok(())
    }

    /// The caller's profile, or `None` for an identity never seen before.
    pub fn get_user(&self, owner: &str) -> Result<Option<User>> {
        let conn = self.conn();
        conn.query_row(
            "SELECT id, day_streak, created_at FROM users WHERE id = ?1",
            params![owner],
            |row| {
                Ok(User {
                    id: row.get(0)?,
                    day_streak: row.get(1)?,
                    created_at: row.get(2)?,
                })
            },
        )
        .optional()
        .context("failed to load user")
    }

    // ------------------------------------------------------------------
    // Review sessions
    // ------------------------------------------------------------------

    /// Create an empty draft session and return its id.
    pub fn create_review_draft(&self, owner: &str) -> Result<String> {
        let conn = self.conn();
        let id = new_id();
        conn.execute(
            "INSERT INTO daily_logs (id, owner) VALUES (?1, ?2)",
            params![id, owner],
        )
        .context("failed to create review draft")?;
        Ok(id)
    }

    /// Load a session owned by `owner`.
    pub fn get_review(&self, id: &str, owner: &str) -> Result<Option<ReviewLog>> {
        let conn = self.conn();
        conn.query_row(
            &format!("SELECT {REVIEW_COLUMNS} FROM daily_logs WHERE id = ?1 AND owner = ?2"),
            params![id, owner],
            review_from_row,
        )
        .optional()
        .context("failed to load review session")
    }

    /// All of the caller's sessions, newest first.
    pub fn list_reviews(&self, owner: &str) -> Result<Vec<ReviewLog>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {REVIEW_COLUMNS} FROM daily_logs WHERE owner = ?1
                 ORDER BY created_at DESC, rowid DESC"
            ))
            .context("failed to prepare list_reviews query")?;

        let logs = stmt
            .query_map(params![owner], review_from_row)
            .context("failed to query review sessions")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("failed to map review rows")?;
        Ok(logs)
    }

    /// Store the report and answers, closing the session.
    ///
    /// With `id`, only a still-open session owned by `owner` is updated; a
    /// closed one is left untouched. Without `id`, a completed session is
    /// inserted directly. On success the owner's streak is incremented and a
    /// `daily_log` activity recorded, all in one transaction.
    pub fn complete_review(
        &self,
        owner: &str,
        id: Option<&str>,
        answers: &[String],
        report_md: &str,
    ) -> Result<ReviewCompletion> {
        anyhow::ensure!(
            answers.len() == TOTAL_QUESTIONS,
            "a completed review needs {TOTAL_QUESTIONS} answers, got {}",
            answers.len()
        );
        let a = |i: usize| answers[i].as_str();

        let mut conn = self.conn();
        let tx = conn.transaction().context("failed to begin transaction")?;

        let id = match id {
            Some(id) => {
                let updated = tx
                    .execute(
                        "UPDATE daily_logs SET
                            q1 = ?3, q2 = ?4, q3 = ?5, q4 = ?6,
                            q5 = ?7, q6 = ?8, q7 = ?9, q8 = ?10,
                            report_md = ?11
                         WHERE id = ?1 AND owner = ?2 AND report_md IS NULL",
                        params![id, owner, a(0), a(1), a(2), a(3), a(4), a(5), a(6), a(7), report_md],
                    )
                    .context("failed to complete review session")?;
                if updated == 0 {
                    let exists: bool = tx
                        .query_row(
                            "SELECT EXISTS(SELECT 1 FROM daily_logs WHERE id = ?1 AND owner = ?2)",
                            params![id, owner],
                            |row| row.get(0),
                        )
                        .context("failed to check review session")?;
                    return Ok(if exists {
                        ReviewCompletion::AlreadyClosed
                    } else {
                        ReviewCompletion::Missing
                    });
                }
                id.to_string()
            }
            None => {
                let id = new_id();
                tx.execute(
                    "INSERT INTO daily_logs (id, owner, q1, q2, q3, q4, q5, q6, q7, q8, report_md)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                    params![id, owner, a(0), a(1), a(2), a(3), a(4), a(5), a(6), a(7), report_md],
                )
                .context("failed to insert completed review")?;
                id
            }
        };

        tx.execute(
            "UPDATE users SET day_streak = day_streak + 1 WHERE id = ?1",
            params![owner],
        )
        .context("failed to bump day streak")?;
        insert_activity(
            &tx,
            owner,
            "daily_log",
            "Completed the daily review; report generated",
            Some(&serde_json::json!({ "logId": id })),
        )?;

        tx.commit().context("failed to commit review completion")?;
        Ok(ReviewCompletion::Completed { id })
    }

    // ------------------------------------------------------------------
    // Ideas
    // ------------------------------------------------------------------

    /// Insert a pending idea and record a `create_idea` activity.
    pub fn create_idea(&self, owner: &str, draft: &IdeaDraft) -> Result<Idea> {
        let id = new_id();
        {
            let mut conn = self.conn();
            let tx = conn.transaction().context("failed to begin transaction")?;
            tx.execute(
                "INSERT INTO ideas (id, owner, title, description, canvas_target, canvas_pain,
                                    canvas_mvp, canvas_revenue, status)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 'pending')",
                params![
                    id,
                    owner,
                    draft.title,
                    draft.description,
                    draft.canvas_target,
                    draft.canvas_pain,
                    draft.canvas_mvp,
                    draft.canvas_revenue,
                ],
            )
            .context("failed to insert idea")?;
            insert_activity(
                &tx,
                owner,
                "create_idea",
                &format!("Created idea: {}", draft.title),
                Some(&serde_json::json!({ "ideaId": id })),
            )?;
            tx.commit().context("failed to commit idea creation")?;
        }

        self.get_idea(&id, owner)?
            .context("idea vanished right after insert")
    }

    pub fn get_idea(&self, id: &str, owner: &str) -> Result<Option<Idea>> {
        let conn = self.conn();
        conn.query_row(
            &format!("SELECT {IDEA_COLUMNS} FROM ideas WHERE id = ?1 AND owner = ?2"),
            params![id, owner],
            idea_from_row,
        )
        .optional()
        .context("failed to load idea")
    }

    /// The caller's ideas, newest first, optionally filtered by status.
    pub fn list_ideas(&self, owner: &str, status: Option<IdeaStatus>) -> Result<Vec<Idea>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {IDEA_COLUMNS} FROM ideas
                 WHERE owner = ?1 AND (?2 IS NULL OR status = ?2)
                 ORDER BY created_at DESC, rowid DESC"
            ))
            .context("failed to prepare list_ideas query")?;

        let ideas = stmt
            .query_map(params![owner, status.map(IdeaStatus::as_str)], idea_from_row)
            .context("failed to query ideas")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("failed to map idea rows")?;
        Ok(ideas)
    }

    /// Apply a partial update to one of the caller's ideas. Returns the
    /// updated idea, or `None` when the caller owns no such idea.
    pub fn update_idea(&self, id: &str, owner: &str, patch: &IdeaPatch) -> Result<Option<Idea>> {
        fn text(value: &Option<String>) -> Value {
            value.clone().map_or(Value::Null, Value::Text)
        }

        let mut columns: Vec<&str> = Vec::new();
        let mut values: Vec<Value> = Vec::new();
        let mut set = |column, value| {
            columns.push(column);
            values.push(value);
        };
        if let Some(title) = &patch.title {
            set("title", Value::Text(title.clone()));
        }
        if let Some(v) = &patch.description {
            set("description", text(v));
        }
        if let Some(v) = &patch.canvas_target {
            set("canvas_target", text(v));
        }
        if let Some(v) = &patch.canvas_pain {
            set("canvas_pain", text(v));
        }
        if let Some(v) = &patch.canvas_mvp {
            set("canvas_mvp", text(v));
        }
        if let Some(v) = &patch.canvas_revenue {
            set("canvas_revenue", text(v));
        }
        if let Some(status) = patch.status {
            set("status", Value::Text(status.as_str().to_string()));
        }
        if let Some(score) = patch.vc_score {
            set("vc_score", score.map_or(Value::Null, |s| Value::Integer(i64::from(s))));
        }
        if let Some(v) = &patch.vc_comment {
            set("vc_comment", text(v));
        }

        if columns.is_empty() {
            return self.get_idea(id, owner);
        }

        let assignments = columns
            .iter()
            .enumerate()
            .map(|(i, column)| format!("{column} = ?{}", i + 1))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "UPDATE ideas SET {assignments} WHERE id = ?{} AND owner = ?{}",
            columns.len() + 1,
            columns.len() + 2
        );
        values.push(Value::Text(id.to_string()));
        values.push(Value::Text(owner.to_string()));

        let updated = {
            let conn = self.conn();
            conn.execute(&sql, params_from_iter(values.iter()))
                .context("failed to update idea")?
        };
        if updated == 0 {
            return Ok(None);
        }
        self.get_idea(id, owner)
    }

    /// Delete an idea. Returns `false` when the caller owns no such idea.
    pub fn delete_idea(&self, id: &str, owner: &str) -> Result<bool> {
        let conn = self.conn();
        let deleted = conn
            .execute(
                "DELETE FROM ideas WHERE id = ?1 AND owner = ?2",
                params![id, owner],
            )
            .context("failed to delete idea")?;
        Ok(deleted > 0)
    }

    /// Overwrite the idea's score fields, move its status per the verdict,
    /// and record a `validate_idea` activity. Returns the updated idea, or
    /// `None` when the caller owns no such idea.
    pub fn apply_idea_score(&self, id: &str, owner: &str, score: &IdeaScore) -> Result<Option<Idea>> {
        let strengths =
            serde_json::to_string(&score.strengths).context("failed to serialize strengths")?;
        let weaknesses =
            serde_json::to_string(&score.weaknesses).context("failed to serialize weaknesses")?;
        {
            let mut conn = self.conn();
            let tx = conn.transaction().context("failed to begin transaction")?;
            let title: Option<String> = tx
                .query_row(
                    "UPDATE ideas SET vc_score = ?3, vc_comment = ?4, vc_strengths = ?5,
                                      vc_weaknesses = ?6, status = ?7
                     WHERE id = ?1 AND owner = ?2
                     RETURNING title",
                    params![
                        id,
                        owner,
                        score.score,
                        score.comment,
                        strengths,
                        weaknesses,
                        score.verdict.resulting_status().as_str(),
                    ],
                    |row| row.get(0),
                )
                .optional()
                .context("failed to store idea score")?;
            let Some(title) = title else {
                return Ok(None);
            };
            insert_activity(
                &tx,
                owner,
                "validate_idea",
                &format!("Validated idea \"{title}\", score {}", score.score),
                Some(&serde_json::json!({
                    "ideaId": id,
                    "score": score.score,
                    "verdict": score.verdict.as_str(),
                })),
            )?;
            tx.commit().context("failed to commit idea score")?;
        }
        self.get_idea(id, owner)
    }

    // ------------------------------------------------------------------
    // Activity feed
    // ------------------------------------------------------------------

    /// The caller's activity entries, newest first.
    pub fn list_activities(&self, owner: &str) -> Result<Vec<Activity>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(
                "SELECT id, owner, action_type, description, metadata, created_at
                 FROM activities WHERE owner = ?1 ORDER BY id DESC",
            )
            .context("failed to prepare list_activities query")?;

        let activities = stmt
            .query_map(params![owner], |row| {
                let metadata: Option<String> = row.get(4)?;
                Ok(Activity {
                    id: row.get(0)?,
                    owner: row.get(1)?,
                    action_type: row.get(2)?,
                    description: row.get(3)?,
                    metadata: metadata.and_then(|m| serde_json::from_str(&m).ok()),
                    created_at: row.get(5)?,
                })
            })
            .context("failed to query activities")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("failed to map activity rows")?;
        Ok(activities)
    }
}

// ---------------------------------------------------------------------------
// Row helpers
// ---------------------------------------------------------------------------

fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

fn insert_activity(
    conn: &Connection,
    owner: &str,
    action_type: &str,
    description: &str,
    metadata: Option<&serde_json::Value>,
) -> Result<()> {
    conn.execute(
        "INSERT INTO activities (owner, action_type, description, metadata)
         VALUES (?1, ?2, ?3, ?4)",
        params![owner, action_type, description, metadata.map(|m| m.to_string())],
    )
    .context("failed to record activity")?;
    Ok(())
}

fn review_from_row(row: &Row<'_>) -> rusqlite::Result<ReviewLog> {
    let answers = (3..3 + TOTAL_QUESTIONS)
        .map(|i| row.get::<_, Option<String>>(i))
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(ReviewLog {
        id: row.get(0)?,
        owner: row.get(1)?,
        created_at: row.get(2)?,
        answers,
        report_md: row.get(3 + TOTAL_QUESTIONS)?,
    })
}

fn idea_from_row(row: &Row<'_>) -> rusqlite::Result<Idea> {
    let status: String = row.get(8)?;
    let status = IdeaStatus::parse(&status).ok_or_else(|| {
        conversion_error(8, Type::Text, format!("unknown idea status `{status}`"))
    })?;
    let vc_score = row
        .get::<_, Option<i64>>(9)?
        .map(|s| u8::try_from(s).ok().filter(|s| *s <= 100).ok_or(s))
        .transpose()
        .map_err(|s| conversion_error(9, Type::Integer, format!("vc_score {s} out of range")))?;
    let list = |idx: usize| -> rusqlite::Result<Vec<String>> {
        let raw: String = row.get(idx)?;
        serde_json::from_str(&raw).map_err(|e| conversion_error(idx, Type::Text, e))
    };
    Ok(Idea {
        id: row.get(0)?,
        owner: row.get(1)?,
        draft: IdeaDraft {
            title: row.get(2)?,
            description: row.get(3)?,
            canvas_target: row.get(4)?,
            canvas_pain: row.get(5)?,
            canvas_mvp: row.get(6)?,
            canvas_revenue: row.get(7)?,
        },
        status,
        vc_score,
        vc_comment: row.get(10)?,
        vc_strengths: list(11)?,
        vc_weaknesses: list(12)?,
        created_at: row.get(13)?,
    })
}

fn conversion_error(
    idx: usize,
    ty: Type,
    err: impl Into<Box<dyn std::error::Error + Send + Sync>>,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, ty, err.into())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
