//! Dispatch between handlers
//!
//! [`route`] is a pure function of the conversation state. The turn engine
//! calls it after every step and validates the answer against
//! [`TRANSITIONS`] before running anything.

use crate::context::{find_tool_request, MessageRole};
use crate::error::RoutingError;
use crate::state::ConversationState;
use crate::types::HandlerId;
use std::fmt;
use tracing::trace;

/// Where the next step of a turn goes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Run the pending tool calls of the last assistant message
    CallTool,
    Handler(HandlerId),
    /// Wait for the next user message
    End,
}

/// A step that has just run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Node {
    /// Start of a turn, right after the user message was appended
    Entry,
    Tool,
    Handler(HandlerId),
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Route::CallTool => f.write_str("tool"),
            Route::Handler(id) => write!(f, "{id}"),
            Route::End => f.write_str("end"),
        }
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::Entry => f.write_str("entry"),
            Node::Tool => f.write_str("tool"),
            Node::Handler(id) => write!(f, "{id}"),
        }
    }
}

const SPECIALISTS: [Route; 3] = [
    Route::Handler(HandlerId::Booking),
    Route::Handler(HandlerId::CancelBooking),
    Route::Handler(HandlerId::General),
];

/// Legal successors of every node
pub const TRANSITIONS: &[(Node, &[Route])] = &[
    (
        Node::Entry,
        &[
            Route::Handler(HandlerId::Manager),
            SPECIALISTS[0],
            SPECIALISTS[1],
            SPECIALISTS[2],
        ],
    ),
    (
        Node::Handler(HandlerId::Manager),
        &[SPECIALISTS[0], SPECIALISTS[1], SPECIALISTS[2], Route::End],
    ),
    (
        Node::Handler(HandlerId::Booking),
        &[
            Route::CallTool,
            Route::Handler(HandlerId::Manager),
            Route::End,
        ],
    ),
    (
        Node::Handler(HandlerId::CancelBooking),
        &[
            Route::CallTool,
            Route::Handler(HandlerId::Manager),
            Route::End,
        ],
    ),
    (
        Node::Handler(HandlerId::General),
        &[Route::Handler(HandlerId::Manager), Route::End],
    ),
    (
        Node::Tool,
        &[
            Route::Handler(HandlerId::Booking),
            Route::Handler(HandlerId::CancelBooking),
        ],
    ),
];

/// Successors allowed after `from`
pub fn successors(from: Node) -> &'static [Route] {
    TRANSITIONS
        .iter()
        .find(|(node, _)| *node == from)
        .map(|(_, routes)| *routes)
        .unwrap_or(&[])
}

/// Reject edges missing from [`TRANSITIONS`]
pub fn check_transition(from: Node, to: Route) -> Result<(), RoutingError> {
    if successors(from).contains(&to) {
        Ok(())
    } else {
        Err(RoutingError::IllegalTransition {
            from: from.to_string(),
            to: to.to_string(),
        })
    }
}

/// Decide where the next step goes
///
/// Priority: pending tool calls, then a tool result back to whoever asked
/// for it, then an explicit `next_agent`, then a fresh user message to the
/// sticky specialist (or the dispatcher when none has run yet).
pub fn route(state: &ConversationState) -> Result<Route, RoutingError> {
    let Some(last) = state.last_message() else {
        return Ok(Route::End);
    };

    if last.has_tool_calls() {
        trace!("pending tool calls");
        return Ok(Route::CallTool);
    }

    if last.role == MessageRole::Tool {
        let issuer = last
            .tool_call_id
            .and_then(|id| find_tool_request(&state.messages, id))
            .and_then(|request| request.author)
            .or(state.previous_agent);
        return match issuer {
            Some(handler) => Ok(Route::Handler(handler)),
            None => Err(RoutingError::OrphanToolResult(
                last.tool_call_id.unwrap_or_default(),
            )),
        };
    }

    if let Some(next) = state.next_agent {
        return Ok(Route::Handler(next));
    }

    if last.is_user() {
        let handler = state
            .previous_agent
            .filter(|h| h.is_specialist())
            .unwrap_or(HandlerId::Manager);
        return Ok(Route::Handler(handler));
    }

    Ok(Route::End)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{Message, ToolCall};
    use crate::state::StateUpdate;

    fn state_with(messages: Vec<Message>) -> ConversationState {
        let mut state = ConversationState::new();
        state.apply(StateUpdate {
            messages,
            ..StateUpdate::default()
        });
        state
    }

    #[test]
    fn test_empty_state_ends() {
        assert_eq!(route(&ConversationState::new()).unwrap(), Route::End);
    }

    #[test]
    fn test_first_user_message_goes_to_manager() {
        let state = state_with(vec![Message::user("xin chào")]);
        assert_eq!(
            route(&state).unwrap(),
            Route::Handler(HandlerId::Manager)
        );
    }

    #[test]
    fn test_sticky_specialist() {
        let mut state = state_with(vec![Message::user("ngày mai")]);
        state.previous_agent = Some(HandlerId::Booking);
        assert_eq!(
            route(&state).unwrap(),
            Route::Handler(HandlerId::Booking)
        );
    }

    #[test]
    fn test_pending_tool_call_goes_to_executor() {
        let call = ToolCall::new("flight-search-tool", serde_json::Map::new());
        let mut state = state_with(vec![
            Message::user("đặt vé"),
            Message::tool_request(HandlerId::Booking, vec![call]),
        ]);
        state.next_agent = Some(HandlerId::Manager);
        assert_eq!(route(&state).unwrap(), Route::CallTool);
    }

    #[test]
    fn test_tool_result_returns_to_issuer() {
        let call = ToolCall::new("cancel-booking-tool", serde_json::Map::new());
        let mut state = state_with(vec![
            Message::user("hủy vé ABC123"),
            Message::tool_request(HandlerId::CancelBooking, vec![call.clone()]),
            Message::tool_result(&call, "{}"),
        ]);
        state.previous_agent = Some(HandlerId::Booking);
        state.next_agent = Some(HandlerId::Manager);
        assert_eq!(
            route(&state).unwrap(),
            Route::Handler(HandlerId::CancelBooking),
            "the author of the request wins over routing fields"
        );
    }

    #[test]
    fn test_tool_result_without_request_uses_previous_agent() {
        let call = ToolCall::new("flight-search-tool", serde_json::Map::new());
        let mut state = state_with(vec![Message::tool_result(&call, "[]")]);
        state.previous_agent = Some(HandlerId::Booking);
        assert_eq!(
            route(&state).unwrap(),
            Route::Handler(HandlerId::Booking)
        );
    }

    #[test]
    fn test_orphan_tool_result_is_an_error() {
        let call = ToolCall::new("flight-search-tool", serde_json::Map::new());
        let state = state_with(vec![Message::tool_result(&call, "[]")]);
        assert_eq!(
            route(&state).unwrap_err(),
            RoutingError::OrphanToolResult(call.id)
        );
    }

    #[test]
    fn test_explicit_next_agent() {
        let mut state = state_with(vec![
            Message::user("tôi muốn hủy vé"),
            Message::from_handler(HandlerId::Booking, "chuyển chuyên viên"),
        ]);
        state.previous_agent = Some(HandlerId::Booking);
        state.next_agent = Some(HandlerId::Manager);
        assert_eq!(
            route(&state).unwrap(),
            Route::Handler(HandlerId::Manager)
        );
    }

    #[test]
    fn test_assistant_reply_ends_turn() {
        let mut state = state_with(vec![
            Message::user("xin chào"),
            Message::from_handler(HandlerId::General, "Dạ"),
        ]);
        state.previous_agent = Some(HandlerId::General);
        assert_eq!(route(&state).unwrap(), Route::End);
    }

    #[test]
    fn test_transition_table() {
        assert!(check_transition(Node::Entry, Route::Handler(HandlerId::Manager)).is_ok());
        assert!(check_transition(Node::Tool, Route::Handler(HandlerId::Booking)).is_ok());
        assert!(check_transition(
            Node::Handler(HandlerId::Booking),
            Route::CallTool
        )
        .is_ok());

        let err = check_transition(Node::Tool, Route::Handler(HandlerId::Manager)).unwrap_err();
        assert_eq!(
            err,
            RoutingError::IllegalTransition {
                from: "tool".to_string(),
                to: "manager".to_string()
            }
        );
        assert!(check_transition(Node::Handler(HandlerId::General), Route::CallTool).is_err());
        assert!(check_transition(
            Node::Handler(HandlerId::Booking),
            Route::Handler(HandlerId::Booking)
        )
        .is_err());
        assert!(check_transition(
            Node::Handler(HandlerId::Manager),
            Route::Handler(HandlerId::Manager)
        )
        .is_err());
    }

    #[test]
    fn test_every_node_has_an_entry() {
        let mut nodes = vec![Node::Entry, Node::Tool];
        nodes.extend(HandlerId::ALL.iter().map(|id| Node::Handler(*id)));
        for node in nodes {
            assert!(!successors(node).is_empty(), "{node} has no successors");
        }
    }
}
