// Turn engine
//
// One user message drives router -> handler -> (tool executor -> handler)
// steps until the router answers `End`. Every edge is checked against the
// transition table, and the whole turn is bounded by `max_steps_per_turn`.

use crate::context::Message;
use crate::error::{AgentError, Result};
use crate::handlers::{prompts, Handler, HandlerContext, HandlerSet};
use crate::intent::IntentMatcher;
use crate::language::LanguageModel;
use crate::reservation::{BookingService, StubBookingService};
use crate::router::{check_transition, route, Node, Route};
use crate::search::FlightSearch;
use crate::session::Thread;
use crate::state::{ConversationState, StateUpdate};
use crate::storage::{InMemoryThreadStore, ThreadStore};
use crate::tool::{
    CancelBookingTool, CreateBookingTool, FlightSearchTool, IssueTicketTool, ToolExecutor,
    ToolRegistry,
};
use crate::types::ThreadId;
use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Log level for agent operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogLevel {
    type Err = AgentError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            other => Err(AgentError::Configuration(format!(
                "unknown log level '{other}'"
            ))),
        }
    }
}

/// Turn engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Router steps allowed for one user message
    #[serde(default = "default_max_steps_per_turn")]
    pub max_steps_per_turn: usize,

    #[serde(
        default = "default_tool_timeout",
        serialize_with = "serialize_duration",
        deserialize_with = "deserialize_duration"
    )]
    pub tool_timeout: Duration,

    /// Visible messages handed to the model when it writes a reply
    #[serde(default = "default_reply_context_messages")]
    pub reply_context_messages: usize,
}

fn default_max_steps_per_turn() -> usize {
    8
}

fn default_tool_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_reply_context_messages() -> usize {
    20
}

fn serialize_duration<S>(duration: &Duration, serializer: S) -> std::result::Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_u64(duration.as_secs())
}

fn deserialize_duration<'de, D>(deserializer: D) -> std::result::Result<Duration, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let secs = u64::deserialize(deserializer)?;
    Ok(Duration::from_secs(secs))
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_steps_per_turn: default_max_steps_per_turn(),
            tool_timeout: default_tool_timeout(),
            reply_context_messages: default_reply_context_messages(),
        }
    }
}

/// Outcome of one user message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentResponse {
    pub thread_id: ThreadId,
    /// Assistant replies written during the turn, oldest first
    pub messages: Vec<String>,
    /// The replies joined into one text
    pub response: String,
    /// The turn failed and was answered with an apology
    pub degraded: bool,
}

/// Flight-booking assistant
///
/// # Examples
///
/// ```no_run
/// use flyagent::language::ProviderLanguageModel;
/// use flyagent::search::StaticFlightSearch;
/// use flyagent::types::ThreadId;
/// use flyagent::{FlightAgent, OpenAIProvider};
/// use std::sync::Arc;
///
/// # #[tokio::main]
/// # async fn main() -> flyagent::Result<()> {
/// let provider = OpenAIProvider::from_env()?;
/// let agent = FlightAgent::builder()
///     .language_model(Arc::new(ProviderLanguageModel::new(Arc::new(provider))))
///     .flight_search(Arc::new(StaticFlightSearch::new()))
///     .build()
///     .await?;
///
/// let thread = ThreadId::new();
/// let reply = agent
///     .process_message(&thread, "Tôi muốn đặt vé từ Hà Nội đi Đà Nẵng ngày mai")
///     .await?;
/// println!("{}", reply.response);
/// # Ok(())
/// # }
/// ```
pub struct FlightAgent {
    model: Arc<dyn LanguageModel>,
    handlers: HandlerSet,
    executor: ToolExecutor,
    intents: IntentMatcher,
    store: Arc<dyn ThreadStore>,
    config: AgentConfig,
    today: Option<NaiveDate>,
}

impl FlightAgent {
    pub fn builder() -> FlightAgentBuilder {
        FlightAgentBuilder::new()
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn tools(&self) -> &ToolRegistry {
        self.executor.registry()
    }

    /// Opening line shown before the first user message
    pub fn greeting(&self) -> &'static str {
        prompts::GREETING
    }

    fn today(&self) -> NaiveDate {
        self.today.unwrap_or_else(|| Local::now().date_naive())
    }

    /// Run one turn of `thread_id`, creating the thread on first use
    pub async fn process_message(&self, thread_id: &ThreadId, text: &str) -> Result<AgentResponse> {
        let text = text.trim();
        if text.is_empty() {
            return Err(AgentError::InvalidInput("message must not be empty".to_string()));
        }

        info!(
            thread_id = %thread_id,
            message_length = text.len(),
            "Processing user message"
        );

        let (mut thread, is_new) = match self.store.get(thread_id).await? {
            Some(thread) => (thread, false),
            None => {
                debug!(thread_id = %thread_id, "Starting new thread");
                (Thread::new(thread_id.clone()), true)
            }
        };

        let history_before = thread.state.messages.len();
        let user = Message::user(text);

        let (state, degraded) = match self.run_turn(thread.state.clone(), user.clone()).await {
            Ok(state) => (state, false),
            Err(e) if e.is_recoverable_in_turn() => {
                warn!(thread_id = %thread_id, error = %e, "Turn failed, answering with an apology");
                let mut state = thread.state.clone();
                state.apply(
                    StateUpdate::new()
                        .with_message(user)
                        .with_message(Message::assistant(prompts::APOLOGY)),
                );
                (state, true)
            }
            Err(e) => return Err(e),
        };

        let messages: Vec<String> = state.messages[history_before..]
            .iter()
            .filter(|m| !m.is_user() && m.is_conversational())
            .map(|m| m.content.clone())
            .collect();

        thread.finish_turn(state);
        if is_new {
            self.store.create(thread).await?;
        } else {
            self.store.update(thread_id, thread).await?;
        }

        info!(
            thread_id = %thread_id,
            replies = messages.len(),
            degraded,
            "Turn complete"
        );

        Ok(AgentResponse {
            thread_id: thread_id.clone(),
            response: messages.join("\n\n"),
            messages,
            degraded,
        })
    }

    async fn run_turn(&self, mut state: ConversationState, user: Message) -> Result<ConversationState> {
        state.apply(StateUpdate::new().with_message(user));

        let ctx = HandlerContext {
            model: self.model.as_ref(),
            intents: &self.intents,
            today: self.today(),
            reply_window: self.config.reply_context_messages,
        };

        let mut node = Node::Entry;
        for step in 0..self.config.max_steps_per_turn {
            let next = route(&state)?;
            check_transition(node, next)?;
            debug!(step, from = %node, to = %next, "Routing");

            let update = match next {
                Route::End => return Ok(state),
                Route::CallTool => {
                    node = Node::Tool;
                    self.executor.execute_calls(&state).await?
                }
                Route::Handler(id) => {
                    node = Node::Handler(id);
                    let handler = self.handlers.get(id).ok_or_else(|| {
                        AgentError::Internal(format!("no handler registered for {id}"))
                    })?;
                    let mut update = handler.handle(&state, &ctx).await?;
                    // A dispatch request is consumed by the step that honours it
                    if update.next_agent.is_none() {
                        update.next_agent = Some(None);
                    }
                    update
                }
            };

            state.apply(update);
        }

        Err(AgentError::StepLimitExceeded {
            limit: self.config.max_steps_per_turn,
        })
    }

    /// Visible transcript of a thread; empty for unknown threads
    pub async fn history(&self, thread_id: &ThreadId) -> Result<Vec<Message>> {
        Ok(self
            .store
            .get(thread_id)
            .await?
            .map(|thread| thread.transcript().cloned().collect())
            .unwrap_or_default())
    }
}

pub struct FlightAgentBuilder {
    model: Option<Arc<dyn LanguageModel>>,
    search: Option<Arc<dyn FlightSearch>>,
    bookings: Option<Arc<dyn BookingService>>,
    store: Option<Arc<dyn ThreadStore>>,
    intents: Option<IntentMatcher>,
    handlers: HandlerSet,
    config: AgentConfig,
    today: Option<NaiveDate>,
}

impl FlightAgentBuilder {
    pub fn new() -> Self {
        Self {
            model: None,
            search: None,
            bookings: None,
            store: None,
            intents: None,
            handlers: HandlerSet::standard(),
            config: AgentConfig::default(),
            today: None,
        }
    }

    pub fn language_model(mut self, model: Arc<dyn LanguageModel>) -> Self {
        self.model = Some(model);
        self
    }

    pub fn flight_search(mut self, search: Arc<dyn FlightSearch>) -> Self {
        self.search = Some(search);
        self
    }

    /// Defaults to [`StubBookingService`]
    pub fn booking_service(mut self, bookings: Arc<dyn BookingService>) -> Self {
        self.bookings = Some(bookings);
        self
    }

    /// Defaults to [`InMemoryThreadStore`]
    pub fn thread_store(mut self, store: Arc<dyn ThreadStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn intents(mut self, intents: IntentMatcher) -> Self {
        self.intents = Some(intents);
        self
    }

    /// Replace one of the standard handlers
    pub fn handler(mut self, handler: Arc<dyn Handler>) -> Self {
        self.handlers.insert(handler);
        self
    }

    pub fn config(mut self, config: AgentConfig) -> Self {
        self.config = config;
        self
    }

    /// Fix the date relative expressions are resolved against
    pub fn today(mut self, today: NaiveDate) -> Self {
        self.today = Some(today);
        self
    }

    pub async fn build(self) -> Result<FlightAgent> {
        let model = self
            .model
            .ok_or_else(|| AgentError::Configuration("Language model is required".to_string()))?;
        let search = self
            .search
            .ok_or_else(|| AgentError::Configuration("Flight search is required".to_string()))?;
        if self.config.max_steps_per_turn == 0 {
            return Err(AgentError::Configuration(
                "max_steps_per_turn must be at least 1".to_string(),
            ));
        }

        let bookings = self
            .bookings
            .unwrap_or_else(|| Arc::new(StubBookingService::new()));
        let store = self
            .store
            .unwrap_or_else(|| Arc::new(InMemoryThreadStore::new()));
        let intents = match self.intents {
            Some(intents) => intents,
            None => IntentMatcher::with_default_rules()?,
        };

        let registry = ToolRegistry::new();
        registry.register(Arc::new(FlightSearchTool::new(search))).await?;
        registry
            .register(Arc::new(CreateBookingTool::new(bookings.clone())))
            .await?;
        registry
            .register(Arc::new(IssueTicketTool::new(bookings.clone())))
            .await?;
        registry.register(Arc::new(CancelBookingTool::new(bookings))).await?;

        Ok(FlightAgent {
            model,
            handlers: self.handlers,
            executor: ToolExecutor::new(registry, self.config.tool_timeout),
            intents,
            store,
            config: self.config,
            today: self.today,
        })
    }
}

impl Default for FlightAgentBuilder {
    fn default() -> Self {
        Self::new()
    }
}
