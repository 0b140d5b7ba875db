//! Error types for flyagent
//!
//! Every subsystem has its own thiserror enum; all of them convert into
//! [`AgentError`] so callers at the edge handle a single type.

use crate::types::ToolCallId;
use thiserror::Error;

/// Main error type for flyagent operations
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum AgentError {
    /// The language model could not be reached or refused the request
    #[error("LLM provider error: {0}")]
    Provider(String),

    /// The language model answered, but not with the structure we asked for
    #[error("Structured extraction failed: {0}")]
    Extraction(String),

    /// Dispatch could not decide where a turn goes
    #[error("Routing error: {0}")]
    Routing(#[from] RoutingError),

    /// A turn kept bouncing between handlers
    #[error("Turn exceeded {limit} steps without reaching the user")]
    StepLimitExceeded { limit: usize },

    /// Tool execution error
    #[error("Tool execution error: {0}")]
    Tool(#[from] ToolError),

    /// Flight search error
    #[error("Flight search error: {0}")]
    Search(#[from] SearchError),

    /// Booking service error
    #[error("Booking error: {0}")]
    Booking(#[from] BookingError),

    /// Storage error
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Internal error (should not happen in normal operation)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AgentError {
    /// Whether the failure happened inside a turn and can be answered with
    /// an apology instead of failing the request.
    pub fn is_recoverable_in_turn(&self) -> bool {
        matches!(
            self,
            AgentError::Provider(_)
                | AgentError::Extraction(_)
                | AgentError::Routing(_)
                | AgentError::StepLimitExceeded { .. }
                | AgentError::Tool(_)
                | AgentError::Search(_)
                | AgentError::Booking(_)
                | AgentError::Serialization(_)
                | AgentError::Internal(_)
        )
    }
}

/// Routing-related errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum RoutingError {
    /// A handler name outside the closed set
    #[error("Unknown handler: {0}")]
    UnknownHandler(String),

    /// A tool result whose request cannot be found in history
    #[error("Tool result {0} has no issuing handler")]
    OrphanToolResult(ToolCallId),

    /// An edge missing from the transition table
    #[error("Illegal transition from {from} to {to}")]
    IllegalTransition { from: String, to: String },
}

/// Storage-related errors
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum StorageError {
    /// Connection failed
    #[error("Storage connection failed: {0}")]
    Connection(String),

    /// Query failed
    #[error("Storage query failed: {0}")]
    Query(String),

    /// Serialization failed
    #[error("Storage serialization failed: {0}")]
    Serialization(String),

    /// Deserialization failed
    #[error("Storage deserialization failed: {0}")]
    Deserialization(String),

    /// Resource not found
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Resource already exists
    #[error("Resource already exists: {0}")]
    AlreadyExists(String),
}

/// Tool-related errors
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ToolError {
    /// Tool not found
    #[error("Tool not found: {0}")]
    NotFound(String),

    /// Tool already registered with same name
    #[error("Tool already registered: {0}")]
    AlreadyRegistered(String),

    /// Tool execution timeout
    #[error("Tool execution timeout after {timeout_ms}ms: {tool}")]
    Timeout { tool: String, timeout_ms: u64 },

    /// Tool execution failed
    #[error("Tool execution failed for {tool}: {message}")]
    ExecutionFailed { tool: String, message: String },

    /// Invalid tool parameters
    #[error("Invalid tool parameters for {tool}: {message}")]
    InvalidParameters { tool: String, message: String },
}

/// Flight search errors
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum SearchError {
    /// Missing or invalid credentials/configuration
    #[error("Search configuration error: {0}")]
    Configuration(String),

    /// Token exchange failed
    #[error("Search authentication failed: {0}")]
    Authentication(String),

    /// Transport-level failure
    #[error("Search request failed: {0}")]
    Request(String),

    /// The API answered with an error status
    #[error("Search API returned {status}: {message}")]
    Api { status: u16, message: String },

    /// The API answered with a body we could not read
    #[error("Search response could not be decoded: {0}")]
    Decode(String),
}

/// Booking service errors
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum BookingError {
    /// No booking with this reference
    #[error("Booking not found: {0}")]
    NotFound(String),

    /// The booking is not in a status that allows the operation
    #[error("Booking {booking_id} cannot be {action} while {status}")]
    InvalidState {
        booking_id: String,
        action: &'static str,
        status: String,
    },

    /// Missing flight or passengers
    #[error("Invalid booking request: {0}")]
    InvalidRequest(String),
}

/// Type alias for flyagent Result
pub type Result<T> = std::result::Result<T, AgentError>;

/// Type alias for Storage Result
pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// Type alias for Tool Result
pub type ToolResult<T> = std::result::Result<T, ToolError>;

/// Type alias for Search Result
pub type SearchResult<T> = std::result::Result<T, SearchError>;

/// Type alias for Booking Result
pub type BookingResult<T> = std::result::Result<T, BookingError>;
