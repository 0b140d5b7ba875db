//! Tools and the tool executor
//!
//! Handlers never call external services directly. They emit [`ToolCall`]s
//! on an assistant message; the turn engine hands that message to
//! [`ToolExecutor`], which runs each call through the [`ToolRegistry`] and
//! appends one tool message per call. Failures never abort the turn: they
//! become `{"error": ...}` payloads for the issuing handler to read.

use crate::context::{Message, ToolCall};
use crate::error::{AgentError, Result, ToolError, ToolResult};
use crate::state::{ConversationState, StateUpdate};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::timeout;
use tracing::{debug, info, trace, warn};

pub mod flight;

pub use flight::{
    CancelBookingTool, CreateBookingTool, FlightSearchTool, IssueTicketTool,
    CANCEL_BOOKING_TOOL, CREATE_BOOKING_TOOL, FLIGHT_SEARCH_TOOL, ISSUE_TICKET_TOOL,
};

/// Tool arguments as carried on a [`ToolCall`]
pub type Parameters = Map<String, Value>;

/// Parameter schema definition for a tool
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParameterSchema {
    pub param_type: String,
    pub required: bool,
    pub description: String,
    pub default: Option<Value>,
}

impl ParameterSchema {
    pub fn required(param_type: &str, description: &str) -> Self {
        Self {
            param_type: param_type.to_string(),
            required: true,
            description: description.to_string(),
            default: None,
        }
    }

    pub fn optional(param_type: &str, description: &str) -> Self {
        Self {
            required: false,
            ..Self::required(param_type, description)
        }
    }

    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }
}

#[async_trait::async_trait]
pub trait Tool: Send + Sync {
    /// Name used in tool calls; unique within a registry
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    fn parameters(&self) -> &HashMap<String, ParameterSchema>;

    /// Run the tool; the JSON output becomes the tool message content
    async fn execute(&self, parameters: Parameters) -> ToolResult<Value>;

    /// Validate parameters before execution
    fn validate_parameters(&self, parameters: &Parameters) -> ToolResult<()> {
        trace!(tool_name = %self.name(), "Validating tool parameters");

        let schema = self.parameters();

        for (param_name, param_schema) in schema {
            let present = parameters.get(param_name).is_some_and(|v| !v.is_null());
            if param_schema.required && !present {
                warn!(
                    tool_name = %self.name(),
                    param_name = %param_name,
                    "Missing required parameter"
                );
                return Err(ToolError::InvalidParameters {
                    tool: self.name().to_string(),
                    message: format!("Missing required parameter: {param_name}"),
                });
            }
        }

        for (param_name, value) in parameters {
            if let Some(param_schema) = schema.get(param_name) {
                if !validate_type(value, &param_schema.param_type) {
                    warn!(
                        tool_name = %self.name(),
                        param_name = %param_name,
                        expected_type = %param_schema.param_type,
                        "Parameter type mismatch"
                    );
                    return Err(ToolError::InvalidParameters {
                        tool: self.name().to_string(),
                        message: format!(
                            "Parameter '{param_name}' has wrong type, expected {}",
                            param_schema.param_type
                        ),
                    });
                }
            }
        }

        Ok(())
    }

    /// Fill absent (or null) parameters from their defaults
    fn apply_defaults(&self, parameters: &mut Parameters) {
        for (param_name, param_schema) in self.parameters() {
            let absent = parameters.get(param_name).is_none_or(Value::is_null);
            if let (true, Some(default_value)) = (absent, &param_schema.default) {
                trace!(
                    tool_name = %self.name(),
                    param_name = %param_name,
                    "Applying default parameter value"
                );
                parameters.insert(param_name.clone(), default_value.clone());
            }
        }
    }
}

/// Validate a JSON value against a type string
fn validate_type(value: &Value, expected_type: &str) -> bool {
    match expected_type {
        "string" => matches!(value, Value::String(_)),
        "number" => matches!(value, Value::Number(_)),
        "integer" => value.is_i64() || value.is_u64(),
        "boolean" => matches!(value, Value::Bool(_)),
        "object" => matches!(value, Value::Object(_)),
        "array" => matches!(value, Value::Array(_)),
        "null" => matches!(value, Value::Null),
        _ => true,
    }
}

/// Name-keyed tool registry
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: Arc<RwLock<HashMap<String, Arc<dyn Tool>>>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, tool: Arc<dyn Tool>) -> ToolResult<()> {
        let tool_name = tool.name().to_string();
        let mut tools = self.tools.write().await;

        if tools.contains_key(&tool_name) {
            warn!(tool_name = %tool_name, "Attempted to register duplicate tool");
            return Err(ToolError::AlreadyRegistered(tool_name));
        }

        info!(tool_name = %tool_name, "Registering tool");
        tools.insert(tool_name, tool);
        Ok(())
    }

    pub async fn get_by_name(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.read().await.get(name).cloned()
    }

    /// Registered tool names, sorted
    pub async fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tools.read().await.keys().cloned().collect();
        names.sort();
        names
    }

    pub async fn len(&self) -> usize {
        self.tools.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.tools.read().await.is_empty()
    }

    /// Apply defaults, validate and run a tool by name
    pub async fn execute(&self, name: &str, mut parameters: Parameters) -> ToolResult<Value> {
        let tool = self
            .get_by_name(name)
            .await
            .ok_or_else(|| ToolError::NotFound(name.to_string()))?;

        tool.apply_defaults(&mut parameters);
        tool.validate_parameters(&parameters)?;

        debug!(tool_name = %name, param_count = parameters.len(), "Executing tool");
        tool.execute(parameters).await
    }

    pub async fn execute_with_timeout(
        &self,
        name: &str,
        parameters: Parameters,
        timeout_duration: Duration,
    ) -> ToolResult<Value> {
        match timeout(timeout_duration, self.execute(name, parameters)).await {
            Ok(result) => result,
            Err(_) => {
                warn!(
                    tool_name = %name,
                    timeout_ms = timeout_duration.as_millis() as u64,
                    "Tool execution timed out"
                );
                Err(ToolError::Timeout {
                    tool: name.to_string(),
                    timeout_ms: timeout_duration.as_millis() as u64,
                })
            }
        }
    }
}

/// Error payload written in place of a tool's output
pub fn error_payload(message: impl std::fmt::Display) -> Value {
    json!({ "error": message.to_string() })
}

/// Runs the pending tool calls of a conversation
#[derive(Clone)]
pub struct ToolExecutor {
    registry: ToolRegistry,
    timeout: Duration,
}

impl ToolExecutor {
    pub fn new(registry: ToolRegistry, timeout: Duration) -> Self {
        Self { registry, timeout }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Execute every call of the last assistant message, in order
    ///
    /// Only fails when there is nothing to execute.
    pub async fn execute_calls(&self, state: &ConversationState) -> Result<StateUpdate> {
        let calls: &[ToolCall] = state
            .last_message()
            .filter(|m| m.has_tool_calls())
            .map(|m| m.tool_calls.as_slice())
            .ok_or_else(|| AgentError::Internal("no pending tool calls".to_string()))?;

        let mut update = StateUpdate::new();
        for call in calls {
            info!(tool_name = %call.name, call_id = %call.id, "Running tool call");

            let output = match self
                .registry
                .execute_with_timeout(&call.name, call.arguments.clone(), self.timeout)
                .await
            {
                Ok(output) => output,
                Err(e) => {
                    warn!(tool_name = %call.name, error = %e, "Tool call failed");
                    error_payload(e)
                }
            };

            trace!(tool_name = %call.name, output = %output, "Tool output");
            update.messages.push(Message::tool_result(call, output.to_string()));
        }

        Ok(update)
    }
}
