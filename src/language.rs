//! The language-model capability used by handlers
//!
//! Handlers need exactly two things from a model: pull structured fields out
//! of a user message, and write a reply. [`LanguageModel`] is that narrow
//! seam; [`ProviderLanguageModel`] implements it on top of any
//! [`LLMProvider`], and tests implement it with scripted answers.

use crate::context::Message;
use crate::error::{AgentError, Result};
use crate::provider::LLMProvider;
use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// Type of one extracted field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Integer,
    Boolean,
    /// One of a fixed set of strings
    Choice(&'static [&'static str]),
    /// A list of objects with the given fields
    Records(&'static [FieldSpec]),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
    pub description: &'static str,
}

impl FieldSpec {
    pub const fn new(name: &'static str, kind: FieldKind, description: &'static str) -> Self {
        Self {
            name,
            kind,
            description,
        }
    }

    fn json_schema(&self) -> Value {
        let mut schema = match self.kind {
            FieldKind::Text => json!({"type": "string"}),
            FieldKind::Integer => json!({"type": "integer"}),
            FieldKind::Boolean => json!({"type": "boolean"}),
            FieldKind::Choice(options) => json!({"type": "string", "enum": options}),
            FieldKind::Records(fields) => json!({
                "type": "array",
                "items": object_schema(fields),
            }),
        };
        schema["description"] = Value::String(self.description.to_string());
        schema
    }
}

fn object_schema(fields: &[FieldSpec]) -> Value {
    let properties: Map<String, Value> = fields
        .iter()
        .map(|f| (f.name.to_string(), f.json_schema()))
        .collect();
    json!({"type": "object", "properties": properties})
}

/// What to extract from a message; every field is optional
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtractionSchema {
    pub name: &'static str,
    pub description: &'static str,
    pub fields: &'static [FieldSpec],
}

impl ExtractionSchema {
    /// JSON Schema rendering used in extraction prompts
    pub fn to_json_schema(&self) -> Value {
        let mut schema = object_schema(self.fields);
        schema["title"] = Value::String(self.name.to_string());
        schema["description"] = Value::String(self.description.to_string());
        schema
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// Fields a model pulled out of a message
///
/// Getters are forgiving about representation (numbers as strings, blank
/// strings) because model output is.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractedFields(Map<String, Value>);

impl ExtractedFields {
    pub fn new(values: Map<String, Value>) -> Self {
        Self(values)
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.0.values().all(Value::is_null)
    }

    pub fn raw(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Non-blank string value
    pub fn text(&self, name: &str) -> Option<String> {
        text_value(self.0.get(name)?)
    }

    pub fn integer(&self, name: &str) -> Option<i64> {
        integer_value(self.0.get(name)?)
    }

    pub fn flag(&self, name: &str) -> bool {
        match self.0.get(name) {
            Some(Value::Bool(b)) => *b,
            Some(Value::String(s)) => matches!(s.trim().to_lowercase().as_str(), "true" | "yes"),
            _ => false,
        }
    }

    /// Object entries of a list field
    pub fn records(&self, name: &str) -> Vec<ExtractedFields> {
        match self.0.get(name) {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|item| item.as_object().cloned())
                .map(ExtractedFields)
                .collect(),
            Some(Value::Object(single)) => vec![ExtractedFields(single.clone())],
            _ => Vec::new(),
        }
    }
}

fn text_value(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let trimmed = s.trim();
            let placeholder = matches!(
                trimmed.to_lowercase().as_str(),
                "" | "null" | "none" | "unknown" | "n/a"
            );
            (!placeholder).then(|| trimmed.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn integer_value(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
        Value::String(s) => s
            .split_whitespace()
            .next()
            .and_then(|token| token.parse().ok()),
        _ => None,
    }
}

/// Everything a model needs to write one reply
#[derive(Debug, Clone, PartialEq)]
pub struct ReplyContext {
    /// Persona and standing rules
    pub system: String,
    /// Visible conversation so far
    pub history: Vec<Message>,
    /// What this particular reply has to achieve
    pub instruction: String,
}

impl ReplyContext {
    pub fn new(
        system: impl Into<String>,
        history: Vec<Message>,
        instruction: impl Into<String>,
    ) -> Self {
        Self {
            system: system.into(),
            history,
            instruction: instruction.into(),
        }
    }

    /// Flatten into a provider prompt
    pub fn to_messages(&self) -> Vec<Message> {
        let mut messages = Vec::with_capacity(self.history.len() + 2);
        messages.push(Message::system(&self.system));
        messages.extend(self.history.iter().cloned());
        if !self.instruction.is_empty() {
            messages.push(Message::system(format!(
                "Hướng dẫn cho câu trả lời này: {}",
                self.instruction
            )));
        }
        messages
    }
}

#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Pull the fields of `schema` out of `text`; absent fields are omitted
    async fn extract(&self, text: &str, schema: &ExtractionSchema) -> Result<ExtractedFields>;

    /// Write the assistant's next message
    async fn generate_reply(&self, context: &ReplyContext) -> Result<String>;
}

/// [`LanguageModel`] backed by a chat-completion provider
pub struct ProviderLanguageModel {
    provider: Arc<dyn LLMProvider>,
    today: Option<NaiveDate>,
}

impl ProviderLanguageModel {
    pub fn new(provider: Arc<dyn LLMProvider>) -> Self {
        Self {
            provider,
            today: None,
        }
    }

    /// Pin the date given to the model for relative expressions
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = Some(today);
        self
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    fn extraction_prompt(&self, schema: &ExtractionSchema) -> String {
        let today = self
            .today
            .unwrap_or_else(|| chrono::Local::now().date_naive());
        format!(
            "Bạn là bộ trích xuất thông tin. Hôm nay là {today}. \
             Đọc tin nhắn của khách hàng và trả về DUY NHẤT một đối tượng JSON \
             theo schema dưới đây. Bỏ qua (hoặc để null) mọi trường không được \
             nhắc tới. Giữ nguyên cách khách hàng diễn đạt ngày tháng và địa danh.\n\n{}",
            schema.to_json_schema()
        )
    }
}

/// First `{ ... }` block of a model answer, parsed
pub fn parse_json_object(answer: &str) -> Result<Map<String, Value>> {
    let start = answer
        .find('{')
        .ok_or_else(|| AgentError::Extraction("no JSON object in model output".to_string()))?;
    let end = answer
        .rfind('}')
        .filter(|end| *end > start)
        .ok_or_else(|| AgentError::Extraction("unterminated JSON object".to_string()))?;

    match serde_json::from_str::<Value>(&answer[start..=end]) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(AgentError::Extraction(format!(
            "expected a JSON object, got {other}"
        ))),
        Err(e) => Err(AgentError::Extraction(format!("invalid JSON: {e}"))),
    }
}

#[async_trait]
impl LanguageModel for ProviderLanguageModel {
    async fn extract(&self, text: &str, schema: &ExtractionSchema) -> Result<ExtractedFields> {
        debug!(
            schema = schema.name,
            provider = self.provider.name(),
            "Extracting structured fields"
        );

        let messages = vec![
            Message::system(self.extraction_prompt(schema)),
            Message::user(text),
        ];
        let answer = self.provider.complete(messages).await?;
        trace!(answer = %answer, "Extraction answer");

        let mut values = parse_json_object(&answer).inspect_err(|e| {
            warn!(schema = schema.name, error = %e, "Unusable extraction output");
        })?;
        values.retain(|key, _| schema.field(key).is_some());

        Ok(ExtractedFields::new(values))
    }

    async fn generate_reply(&self, context: &ReplyContext) -> Result<String> {
        debug!(
            provider = self.provider.name(),
            history = context.history.len(),
            "Generating reply"
        );
        let reply = self.provider.complete(context.to_messages()).await?;
        Ok(reply.trim().to_string())
    }
}
