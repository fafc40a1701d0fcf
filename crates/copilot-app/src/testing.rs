// Test doubles shared by the unit tests in this crate.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use copilot_core::db::Database;
use copilot_core::review::{Message, OPENING_TRIGGER};
use copilot_llm::{ChatGateway, GatewayError};

use crate::state::AppState;

pub const OWNER: &str = "alice";

/// Gateway that pops scripted replies in order, falling back to
/// `"reply N"` once the script runs out. Every call is recorded.
#[derive(Default)]
pub struct ScriptedGateway {
    script: Mutex<VecDeque<Result<String, GatewayError>>>,
    calls: Mutex<Vec<Vec<Message>>>,
}

impl ScriptedGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_replies(replies: Vec<Result<String, GatewayError>>) -> Self {
        Self {
            script: Mutex::new(replies.into()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<Vec<Message>> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatGateway for ScriptedGateway {
    async fn complete(&self, messages: &[Message]) -> Result<String, GatewayError> {
        let mut calls = self.calls.lock().unwrap();
        calls.push(messages.to_vec());
        let n = calls.len();
        drop(calls);
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(format!("reply {n}")))
    }
}

/// In-memory state with `OWNER` registered.
pub fn test_state(gateway: Arc<ScriptedGateway>) -> AppState {
    let db = Database::open(":memory:").unwrap();
    db.touch_user(OWNER).unwrap();
    AppState::new(db, gateway)
}

/// Trigger plus `n` answered questions, ending on the nth answer.
pub fn history_with_answers(n: usize) -> Vec<Message> {
    let mut messages = vec![Message::user(OPENING_TRIGGER)];
    for i in 1..=n {
        messages.push(Message::assistant(format!("Question {i}?")));
        messages.push(Message::user(format!("answer {i}")));
    }
    messages
}
