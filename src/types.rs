//! Common type definitions used throughout flyagent
//!
//! Identifiers are newtypes so a thread id can never be passed where a
//! tool-call id is expected. Handler identifiers form a closed enum.

use crate::error::RoutingError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Identifier of one conversation thread
///
/// Thread ids arrive from clients (HTTP body, CLI flag) as arbitrary
/// strings, so unlike the other identifiers this one wraps a `String`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ThreadId(String);

impl ThreadId {
    /// Create a new random ThreadId
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Get the id as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ThreadId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for ThreadId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for ThreadId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<Uuid> for ThreadId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid.to_string())
    }
}

/// Unique identifier for a Message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(Uuid);

impl MessageId {
    /// Create a new random MessageId
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Get the underlying UUID
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for MessageId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

/// Links a tool request in an assistant message to its tool result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ToolCallId(Uuid);

impl ToolCallId {
    /// Create a new random ToolCallId
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Get the underlying UUID
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for ToolCallId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ToolCallId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for ToolCallId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

/// The handlers a turn can be dispatched to
///
/// `Manager` is the dispatcher; the others are specialists. The set is
/// closed: parsing an unknown name fails instead of falling back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandlerId {
    Manager,
    Booking,
    CancelBooking,
    General,
}

impl HandlerId {
    /// Every handler, dispatcher first
    pub const ALL: [HandlerId; 4] = [
        HandlerId::Manager,
        HandlerId::Booking,
        HandlerId::CancelBooking,
        HandlerId::General,
    ];

    /// Specialists are the handlers the dispatcher may hand a turn to
    pub fn is_specialist(self) -> bool {
        !matches!(self, HandlerId::Manager)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            HandlerId::Manager => "manager",
            HandlerId::Booking => "booking",
            HandlerId::CancelBooking => "cancel_booking",
            HandlerId::General => "general",
        }
    }
}

impl fmt::Display for HandlerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HandlerId {
    type Err = RoutingError;

    /// Accepts the canonical names plus the `*_agent` spellings that
    /// language models tend to echo back from prompts.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase();
        let name = normalized.strip_suffix("_agent").unwrap_or(&normalized);
        match name {
            "manager" => Ok(HandlerId::Manager),
            "booking" => Ok(HandlerId::Booking),
            "cancel_booking" | "cancel" | "cancellation" => Ok(HandlerId::CancelBooking),
            "general" => Ok(HandlerId::General),
            _ => Err(RoutingError::UnknownHandler(s.to_string())),
        }
    }
}
