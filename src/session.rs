//! Persisted conversation threads
//!
//! A [`Thread`] is what the store keeps per thread id: the full
//! conversation state plus bookkeeping timestamps.

use crate::context::Message;
use crate::state::ConversationState;
use crate::types::ThreadId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Thread {
    pub id: ThreadId,
    pub state: ConversationState,
    /// Completed turns, degraded ones included
    #[serde(default)]
    pub turns: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Thread {
    /// Create an empty thread
    pub fn new(id: ThreadId) -> Self {
        let now = Utc::now();
        Self {
            id,
            state: ConversationState::new(),
            turns: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Store the state reached at the end of a turn
    pub fn finish_turn(&mut self, state: ConversationState) {
        self.state = state;
        self.turns += 1;
        self.touch();
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Messages a person would see: user text and assistant replies
    pub fn transcript(&self) -> impl Iterator<Item = &Message> {
        self.state.messages.iter().filter(|m| m.is_conversational())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ToolCall;
    use crate::state::StateUpdate;
    use crate::types::HandlerId;

    #[test]
    fn test_thread_creation() {
        let thread = Thread::new(ThreadId::from("t-1"));
        assert_eq!(thread.id.as_str(), "t-1");
        assert_eq!(thread.turns, 0);
        assert!(thread.state.messages.is_empty());
        assert_eq!(thread.created_at, thread.updated_at);
    }

    #[test]
    fn test_finish_turn() {
        let mut thread = Thread::new(ThreadId::new());
        let mut state = thread.state.clone();
        state.apply(StateUpdate::new().with_message(Message::user("xin chào")));

        thread.finish_turn(state);
        assert_eq!(thread.turns, 1);
        assert_eq!(thread.state.messages.len(), 1);
        assert!(thread.updated_at >= thread.created_at);
    }

    #[test]
    fn test_transcript_hides_tool_traffic() {
        let mut thread = Thread::new(ThreadId::new());
        let call = ToolCall::new("flight-search-tool", serde_json::Map::new());
        thread.state.apply(StateUpdate {
            messages: vec![
                Message::user("đi Đà Nẵng"),
                Message::tool_request(HandlerId::Booking, vec![call.clone()]),
                Message::tool_result(&call, "[]"),
                Message::from_handler(HandlerId::Booking, "Dạ, em chưa tìm thấy chuyến bay."),
            ],
            ..StateUpdate::default()
        });

        let shown: Vec<&str> = thread.transcript().map(|m| m.content.as_str()).collect();
        assert_eq!(shown, vec!["đi Đà Nẵng", "Dạ, em chưa tìm thấy chuyến bay."]);
    }

    #[test]
    fn test_thread_serialization() {
        let mut thread = Thread::new(ThreadId::from("abc"));
        thread.state.origin = Some("HAN".to_string());

        let json = serde_json::to_string(&thread).unwrap();
        let restored: Thread = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, thread);
    }
}
