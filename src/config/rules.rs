//! Assistant response rules
//!
//! The assistant answers from a prioritized list of keyword rules evaluated
//! top to bottom; the first rule with a keyword contained in the lowercased
//! user text wins, and the fallback answers everything else.
//!
//! # Example Rule File
//!
//! ```toml
//! greeting = "Hi! Ask me anything about donating."
//! fallback = "I can help with donations and volunteering."
//!
//! [[rules]]
//! keywords = ["donate"]
//! reply = "Tap \"Donate Food\" on the home page."
//!
//! [[rules]]
//! keywords = ["hours", "time"]
//! reply = "We are open 9 AM to 6 PM."
//!
//! [[suggestions]]
//! text = "How to donate food?"
//! emoji = "🥫"
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;

/// A single keyword rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseRule {
    /// Substrings that trigger this rule (case-insensitive)
    pub keywords: Vec<String>,

    /// Reply sent when the rule matches
    pub reply: String,
}

impl ResponseRule {
    pub fn new(keywords: &[&str], reply: impl Into<String>) -> Self {
        Self {
            keywords: keywords.iter().map(|k| k.to_lowercase()).collect(),
            reply: reply.into(),
        }
    }

    /// `lowered` must already be lowercased
    fn matches(&self, lowered: &str) -> bool {
        self.keywords.iter().any(|k| lowered.contains(k.as_str()))
    }
}

/// A one-tap suggested question shown above the chat input
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Suggestion {
    pub text: String,
    #[serde(default)]
    pub emoji: String,
}

impl Suggestion {
    pub fn new(text: impl Into<String>, emoji: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            emoji: emoji.into(),
        }
    }
}

/// The complete response table used by a conversation engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleBook {
    /// Seed message every new conversation opens with
    #[serde(default = "default_greeting")]
    pub greeting: String,

    /// Rules in priority order
    #[serde(default)]
    pub rules: Vec<ResponseRule>,

    /// Reply when no rule matches
    #[serde(default = "default_fallback")]
    pub fallback: String,

    /// Suggested questions
    #[serde(default = "default_suggestions")]
    pub suggestions: Vec<Suggestion>,
}

fn default_greeting() -> String {
    builtin::GREETING.to_string()
}

fn default_fallback() -> String {
    builtin::FALLBACK.to_string()
}

fn default_suggestions() -> Vec<Suggestion> {
    builtin::suggestions()
}

impl Default for RuleBook {
    fn default() -> Self {
        Self::builtin()
    }
}

impl RuleBook {
    /// The food-donation assistant's built-in table
    pub fn builtin() -> Self {
        Self {
            greeting: default_greeting(),
            rules: builtin::rules(),
            fallback: default_fallback(),
            suggestions: default_suggestions(),
        }
    }

    /// Load a rule book from a TOML file
    pub fn from_file(path: &Path) -> Result<Self, RuleBookError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Load a rule book from a TOML string
    pub fn from_str(content: &str) -> Result<Self, RuleBookError> {
        let book: RuleBook = toml::from_str(content)?;
        book.normalized()
    }

    /// Resolve the reply for a piece of user text.
    ///
    /// Total: every input yields exactly one reply.
    pub fn resolve(&self, text: &str) -> &str {
        let lowered = text.to_lowercase();
        self.rules
            .iter()
            .find(|rule| rule.matches(&lowered))
            .map(|rule| rule.reply.as_str())
            .unwrap_or(self.fallback.as_str())
    }

    fn normalized(mut self) -> Result<Self, RuleBookError> {
        for (index, rule) in self.rules.iter_mut().enumerate() {
            rule.keywords = rule
                .keywords
                .iter()
                .map(|k| k.trim().to_lowercase())
                .collect();

            if rule.keywords.is_empty() || rule.keywords.iter().any(|k| k.is_empty()) {
                return Err(RuleBookError::InvalidRule {
                    index,
                    reason: "keywords must be non-empty".into(),
                });
            }
            if rule.reply.trim().is_empty() {
                return Err(RuleBookError::InvalidRule {
                    index,
                    reason: "reply must be non-empty".into(),
                });
            }
        }
        Ok(self)
    }
}

/// Errors from rule book loading
#[derive(Debug, thiserror::Error)]
pub enum RuleBookError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid rule #{index}: {reason}")]
    InvalidRule { index: usize, reason: String },
}

/// Built-in replies that don't require files
pub mod builtin {
    use super::{ResponseRule, Suggestion};

    pub const GREETING: &str = "Hello! How can I assist you with food donations today?";

    pub const DONATE: &str = "To donate food, please tap on the \"Donate Food\" button on the home page. It will guide you through the process.";

    pub const HISTORY: &str = "You can check your past donations and track your impact in the \"My History\" section.";

    pub const HELLO: &str = "Hello there! How can I assist you?";

    pub const NEARBY: &str = "To find nearby food donation opportunities, please use the \"Explore Nearby\" feature on the home page.";

    pub const VOLUNTEER: &str = "We appreciate your interest in volunteering! Please visit the \"Volunteer\" section to see available opportunities.";

    pub const HOURS: &str = "Our donation centers are typically open from 9 AM to 6 PM, Monday through Saturday. Please check specific locations for exact hours.";

    pub const ACCEPTED: &str = "We accept non-perishable food items like canned goods, rice, pasta, and sealed packaged foods. We cannot accept expired items or homemade food.";

    pub const FALLBACK: &str = "I am an assistant to help you with the app. You can ask me about donating food, exploring nearby options, or your donation history.";

    /// Priority order matters: "donate" beats "hi", "history" beats "hi".
    pub fn rules() -> Vec<ResponseRule> {
        vec![
            ResponseRule::new(&["donate"], DONATE),
            ResponseRule::new(&["history"], HISTORY),
            ResponseRule::new(&["hello", "hi"], HELLO),
            ResponseRule::new(&["nearby"], NEARBY),
            ResponseRule::new(&["volunteer"], VOLUNTEER),
            ResponseRule::new(&["hours", "time"], HOURS),
            ResponseRule::new(&["accepted", "accept"], ACCEPTED),
        ]
    }

    pub fn suggestions() -> Vec<Suggestion> {
        vec![
            Suggestion::new("How to donate food?", "🥫"),
            Suggestion::new("What food is accepted?", "🍎"),
            Suggestion::new("Find a nearby donation center?", "📍"),
            Suggestion::new("How to volunteer?", "🤝"),
            Suggestion::new("What are the operational hours?", "⏰"),
        ]
    }
}
