//! Application configuration

pub mod rules;

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

pub use rules::{RuleBook, RuleBookError, Suggestion};

/// Artificial delay before the assistant answers
pub const DEFAULT_REPLY_LATENCY_MS: u64 = 1500;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub reply_latency_ms: u64,
    pub rules_path: Option<PathBuf>,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            host: env::var("HOST").unwrap_or_else(|_| "127.0.0.1".into()),
            port: env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(3000),
            reply_latency_ms: env::var("REPLY_LATENCY_MS")
                .ok()
                .and_then(|ms| ms.parse().ok())
                .unwrap_or(DEFAULT_REPLY_LATENCY_MS),
            rules_path: env::var("RULES_PATH").ok().map(PathBuf::from),
        })
    }

    pub fn reply_latency(&self) -> Duration {
        Duration::from_millis(self.reply_latency_ms)
    }

    /// Load the configured rule book, or the built-in one when no path is set
    pub fn load_rule_book(&self) -> Result<RuleBook, RuleBookError> {
        match &self.rules_path {
            Some(path) => RuleBook::from_file(path),
            None => Ok(RuleBook::builtin()),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 3000,
            reply_latency_ms: DEFAULT_REPLY_LATENCY_MS,
            rules_path: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.reply_latency(), Duration::from_millis(1500));
        assert!(config.rules_path.is_none());
    }

    #[test]
    fn test_load_rule_book_from_file() {
        let path = env::temp_dir().join(format!("harvest-rules-{}.toml", uuid::Uuid::new_v4()));
        std::fs::write(
            &path,
            "[[rules]]\nkeywords = [\"fridge\"]\nreply = \"Fridges are on Main St.\"\n",
        )
        .unwrap();

        let config = Config {
            rules_path: Some(path.clone()),
            ..Config::default()
        };
        let book = config.load_rule_book().unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(book.resolve("Where is the fridge?"), "Fridges are on Main St.");
    }

    #[test]
    fn test_load_builtin_rule_book() {
        let book = Config::default().load_rule_book().unwrap();
        assert_eq!(book.resolve("hello"), rules::builtin::HELLO);
    }
}
