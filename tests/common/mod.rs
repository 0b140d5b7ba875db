//! Shared fixtures for the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::NaiveDate;
use flyagent::language::{ExtractedFields, ExtractionSchema, LanguageModel, ReplyContext};
use flyagent::Result;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;

pub const CANNED_REPLY: &str = "Dạ, em xin trả lời ạ.";

pub fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 10, 17).unwrap()
}

/// Language model answering from a script keyed by schema name and message
///
/// Unscripted extractions return no fields; replies are always
/// [`CANNED_REPLY`]. Every extraction is counted per schema.
#[derive(Default)]
pub struct ScriptedModel {
    answers: HashMap<(String, String), Value>,
    calls: Mutex<HashMap<String, usize>>,
}

impl ScriptedModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(mut self, schema: &str, text: &str, answer: Value) -> Self {
        self.answers
            .insert((schema.to_string(), text.to_string()), answer);
        self
    }

    pub fn calls(&self, schema: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .get(schema)
            .copied()
            .unwrap_or_default()
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn extract(&self, text: &str, schema: &ExtractionSchema) -> Result<ExtractedFields> {
        *self
            .calls
            .lock()
            .unwrap()
            .entry(schema.name.to_string())
            .or_default() += 1;

        let answer = self
            .answers
            .get(&(schema.name.to_string(), text.to_string()))
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();
        Ok(ExtractedFields::new(answer))
    }

    async fn generate_reply(&self, _context: &ReplyContext) -> Result<String> {
        Ok(CANNED_REPLY.to_string())
    }
}
