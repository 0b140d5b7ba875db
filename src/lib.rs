//! # flyagent - conversational flight booking
//!
//! flyagent drives a multi-turn Vietnamese-language conversation that takes a
//! traveller from "I want to fly to Da Nang" to an issued ticket: it collects
//! the trip, searches offers, lets the user pick and confirm a flight, gathers
//! passenger details, creates the booking, waits for payment and issues the
//! ticket. Cancellations and general questions are handled by their own
//! specialists.
//!
//! ## Quick Start
//!
//! ```no_run
//! use flyagent::language::ProviderLanguageModel;
//! use flyagent::search::StaticFlightSearch;
//! use flyagent::{FlightAgent, OpenAIProvider, ThreadId};
//! use std::sync::Arc;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let provider = Arc::new(OpenAIProvider::from_env()?);
//!
//! let agent = FlightAgent::builder()
//!     .language_model(Arc::new(ProviderLanguageModel::new(provider)))
//!     .flight_search(Arc::new(StaticFlightSearch::new()))
//!     .build()
//!     .await?;
//!
//! let thread = ThreadId::new();
//! let reply = agent.process_message(&thread, "Tôi muốn bay từ Hà Nội đi Đà Nẵng").await?;
//! println!("{}", reply.response);
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! user text ──► FlightAgent::process_message
//!                 │  load Thread (ThreadStore)
//!                 ▼
//!           ┌──── router::route(state) ◄──────────────┐
//!           │                                         │
//!           ▼                                         │ StateUpdate
//!   Manager / Booking / CancelBooking / General ──────┤
//!           │ tool request                            │
//!           ▼                                         │
//!      ToolExecutor (search, booking, ticket, cancel) ┘
//!           │
//!           ▼ End
//!     replies + saved Thread
//! ```
//!
//! ## Module Overview
//!
//! - [`agent`]: turn engine, builder and configuration
//! - [`router`]: pure dispatch over the conversation state
//! - [`handlers`]: manager and specialist handlers, prompts, schemas
//! - [`state`]: conversation state and the update merge rules
//! - [`intent`]: keyword signals used before asking the model
//! - [`language`]: structured extraction and replies over an LLM provider
//! - [`provider`]: OpenAI and Anthropic clients
//! - [`tool`]: tool registry, executor and the four flight tools
//! - [`search`]: flight search backends (static, Amadeus)
//! - [`reservation`]: booking, ticketing and cancellation service
//! - [`normalize`]: airports, dates, phone numbers, booking references
//! - [`storage`]: thread persistence (memory, optional Redis)
//! - [`server`]: HTTP API
//! - [`config`] and [`logging`]: binary setup

// Core type definitions
pub mod types;

// Error types
pub mod error;

// Messages and transcript helpers
pub mod context;

// Conversation state
pub mod state;

// Dispatch
pub mod router;

// Input normalization
pub mod normalize;

// Keyword signals
pub mod intent;

// Language model facade
pub mod language;

// Provider abstraction
pub mod provider;

// Tool integration
pub mod tool;

// Flight search backends
pub mod search;

// Booking service
pub mod reservation;

// Manager and specialist handlers
pub mod handlers;

// Agent core
pub mod agent;

// Thread lifecycle
pub mod session;

// Storage backends
pub mod storage;

// Application configuration
pub mod config;

// Tracing setup
pub mod logging;

// HTTP API
pub mod server;

pub use agent::{AgentConfig, AgentResponse, FlightAgent, FlightAgentBuilder, LogLevel};
pub use context::{Message, MessageRole, ToolCall};
pub use error::{
    AgentError, BookingError, Result, RoutingError, SearchError, StorageError, ToolError,
};
pub use handlers::{BookingPhase, Handler, HandlerSet};
pub use language::{LanguageModel, ProviderLanguageModel};
pub use provider::{AnthropicProvider, LLMProvider, OpenAIProvider, ProviderConfig};
pub use reservation::{BookingService, StubBookingService};
pub use search::{FlightSearch, StaticFlightSearch};
pub use session::Thread;
pub use state::{ConversationState, StateUpdate};
pub use storage::{InMemoryThreadStore, ThreadStore};
pub use tool::{Tool, ToolExecutor, ToolRegistry};
pub use types::*;
