// Deterministic signal matching
//
// Literal keywords go through one Aho-Corasick automaton and regex rules
// through one RegexSet, so a message is scanned once whatever the number of
// rules. Handlers consult the matcher before paying for a model call.

use crate::error::{AgentError, Result};
use crate::types::HandlerId;
use aho_corasick::{AhoCorasick, AhoCorasickBuilder};
use regex::RegexSet;
use std::collections::HashMap;
use tracing::{debug, trace};

/// What a rule detects in a user message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Signal {
    /// The user wants this specialist
    Intent(HandlerId),
    Affirm,
    Decline,
    /// The user says the payment went through
    Paid,
}

/// Condition that triggers a rule
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleCondition {
    /// Case-insensitive substring
    Literal(String),
    Regex(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignalRule {
    pub condition: RuleCondition,
    pub signal: Signal,
    pub priority: i32,
}

impl SignalRule {
    pub fn literal(text: &str, signal: Signal, priority: i32) -> Self {
        Self {
            condition: RuleCondition::Literal(text.to_lowercase()),
            signal,
            priority,
        }
    }

    pub fn regex(pattern: &str, signal: Signal, priority: i32) -> Self {
        Self {
            condition: RuleCondition::Regex(pattern.to_string()),
            signal,
            priority,
        }
    }
}

/// A rule that fired
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignalMatch {
    pub signal: Signal,
    pub priority: i32,
    pub matched: String,
}

pub struct IntentMatcher {
    rules: Vec<SignalRule>,
    aho_corasick: Option<AhoCorasick>,
    /// Maps pattern index to rule indices (duplicate patterns share an entry)
    literal_pattern_to_rules: HashMap<usize, Vec<usize>>,
    regex_set: Option<RegexSet>,
    regex_pattern_to_rules: HashMap<usize, Vec<usize>>,
}

impl IntentMatcher {
    pub fn new(rules: Vec<SignalRule>) -> Result<Self> {
        let mut literals: Vec<String> = Vec::new();
        let mut literal_pattern_to_rules: HashMap<usize, Vec<usize>> = HashMap::new();
        let mut patterns: Vec<String> = Vec::new();
        let mut regex_pattern_to_rules: HashMap<usize, Vec<usize>> = HashMap::new();

        for (rule_idx, rule) in rules.iter().enumerate() {
            let (pool, index, text) = match &rule.condition {
                RuleCondition::Literal(text) => {
                    (&mut literals, &mut literal_pattern_to_rules, text)
                }
                RuleCondition::Regex(text) => (&mut patterns, &mut regex_pattern_to_rules, text),
            };
            let pattern_idx = match pool.iter().position(|p| p == text) {
                Some(existing) => existing,
                None => {
                    pool.push(text.clone());
                    pool.len() - 1
                }
            };
            index.entry(pattern_idx).or_default().push(rule_idx);
        }

        let aho_corasick = if literals.is_empty() {
            None
        } else {
            Some(
                AhoCorasickBuilder::new()
                    .ascii_case_insensitive(true)
                    .build(&literals)
                    .map_err(|e| {
                        AgentError::Configuration(format!("invalid keyword set: {e}"))
                    })?,
            )
        };

        let regex_set = if patterns.is_empty() {
            None
        } else {
            Some(RegexSet::new(&patterns).map_err(|e| {
                AgentError::Configuration(format!("invalid signal pattern: {e}"))
            })?)
        };

        debug!(
            rule_count = rules.len(),
            literal_count = literals.len(),
            regex_count = patterns.len(),
            "Signal matcher built"
        );

        Ok(Self {
            rules,
            aho_corasick,
            literal_pattern_to_rules,
            regex_set,
            regex_pattern_to_rules,
        })
    }

    /// Matcher loaded with the Vietnamese and English default rules
    pub fn with_default_rules() -> Result<Self> {
        Self::new(default_rules())
    }

    /// All rules that fire on `message`, highest priority first
    pub fn matches(&self, message: &str) -> Vec<SignalMatch> {
        let lowercase_message = message.to_lowercase();
        let mut fired: Vec<usize> = Vec::new();

        if let Some(ref ac) = self.aho_corasick {
            for mat in ac.find_overlapping_iter(&lowercase_message) {
                if let Some(rule_indices) = self
                    .literal_pattern_to_rules
                    .get(&mat.pattern().as_usize())
                {
                    fired.extend(rule_indices);
                }
            }
        }

        if let Some(ref regex_set) = self.regex_set {
            for pattern_idx in regex_set.matches(&lowercase_message).into_iter() {
                if let Some(rule_indices) = self.regex_pattern_to_rules.get(&pattern_idx) {
                    fired.extend(rule_indices);
                }
            }
        }

        fired.sort_unstable();
        fired.dedup();

        let mut matches: Vec<SignalMatch> = fired
            .into_iter()
            .filter_map(|idx| self.rules.get(idx))
            .map(|rule| SignalMatch {
                signal: rule.signal,
                priority: rule.priority,
                matched: match &rule.condition {
                    RuleCondition::Literal(s) | RuleCondition::Regex(s) => s.clone(),
                },
            })
            .collect();
        matches.sort_by(|a, b| b.priority.cmp(&a.priority));

        trace!(match_count = matches.len(), "Signal matching complete");
        matches
    }

    /// Strongest accepted signal; a tie between different
    /// signals is ambiguous and yields `None`
    fn strongest(&self, message: &str, accept: impl Fn(Signal) -> bool) -> Option<Signal> {
        let relevant: Vec<SignalMatch> = self
            .matches(message)
            .into_iter()
            .filter(|m| accept(m.signal))
            .collect();
        let top = relevant.first()?;
        let ambiguous = relevant
            .iter()
            .any(|m| m.priority == top.priority && m.signal != top.signal);
        if ambiguous {
            debug!(priority = top.priority, "Ambiguous signals, deferring to the model");
            None
        } else {
            Some(top.signal)
        }
    }

    /// Specialist named by keywords in the message
    pub fn best_intent(&self, message: &str) -> Option<HandlerId> {
        match self.strongest(message, |s| matches!(s, Signal::Intent(_)))? {
            Signal::Intent(handler) => Some(handler),
            _ => None,
        }
    }

    /// `Some(true)` for a clear yes, `Some(false)` for a clear no
    ///
    /// Questions are never read as an answer.
    pub fn confirmation(&self, message: &str) -> Option<bool> {
        if message.contains('?') {
            return None;
        }
        match self.strongest(message, |s| matches!(s, Signal::Affirm | Signal::Decline))? {
            Signal::Affirm => Some(true),
            Signal::Decline => Some(false),
            _ => None,
        }
    }

    pub fn is_paid(&self, message: &str) -> bool {
        self.matches(message)
            .iter()
            .any(|m| m.signal == Signal::Paid)
    }

    pub fn rules(&self) -> &[SignalRule] {
        &self.rules
    }
}

/// Keyword rules for the booking assistant
pub fn default_rules() -> Vec<SignalRule> {
    let cancel = Signal::Intent(HandlerId::CancelBooking);
    let booking = Signal::Intent(HandlerId::Booking);
    let mut rules = Vec::new();

    for phrase in [
        "hủy vé",
        "huỷ vé",
        "hủy đặt chỗ",
        "huỷ đặt chỗ",
        "hủy chuyến",
        "huỷ chuyến",
        "hủy booking",
        "huỷ booking",
        "hoàn vé",
        "cancel booking",
        "cancel my booking",
        "cancel the booking",
        "cancel my ticket",
    ] {
        rules.push(SignalRule::literal(phrase, cancel, 30));
    }

    for phrase in [
        "đặt vé",
        "mua vé",
        "đặt chuyến",
        "tìm chuyến bay",
        "tìm vé",
        "vé máy bay",
        "muốn bay",
        "book a flight",
        "book flight",
        "find a flight",
    ] {
        rules.push(SignalRule::literal(phrase, booking, 20));
    }

    rules.push(SignalRule::regex(
        r"\b(không đúng|chưa đúng|sai rồi|không phải|không muốn|không đồng ý|chọn lại|đổi chuyến)\b",
        Signal::Decline,
        20,
    ));
    rules.push(SignalRule::regex(r"^\s*(không|ko|no|chưa|nope)\b", Signal::Decline, 20));
    rules.push(SignalRule::regex(
        r"^\s*(có|vâng|dạ|ừ|ok|okay|yes|đúng|được|chuẩn)\b",
        Signal::Affirm,
        10,
    ));
    rules.push(SignalRule::regex(
        r"\b(đồng ý|xác nhận|chốt|đúng rồi|confirm)\b",
        Signal::Affirm,
        10,
    ));

    for phrase in [
        "đã thanh toán",
        "thanh toán rồi",
        "đã chuyển khoản",
        "chuyển khoản rồi",
        "đã trả tiền",
    ] {
        rules.push(SignalRule::literal(phrase, Signal::Paid, 10));
    }
    rules.push(SignalRule::regex(r"\b(i have paid|i paid|paid)\b", Signal::Paid, 10));

    rules
}
