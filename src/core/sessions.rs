//! Registry of mounted chat sessions
//!
//! Mounting a session creates a fresh conversation; unmounting tears it down
//! so a reply still in its latency window is never delivered.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use uuid::Uuid;

use crate::config::RuleBook;

use super::engine::ConversationEngine;

pub struct SessionRegistry {
    rules: Arc<RuleBook>,
    latency: Duration,
    sessions: RwLock<HashMap<Uuid, Arc<ConversationEngine>>>,
}

impl SessionRegistry {
    pub fn new(rules: Arc<RuleBook>, latency: Duration) -> Self {
        Self {
            rules,
            latency,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    pub fn rules(&self) -> &RuleBook {
        &self.rules
    }

    /// Mount a new session and return its engine
    pub async fn mount(&self) -> Arc<ConversationEngine> {
        let engine = Arc::new(ConversationEngine::new(
            Arc::clone(&self.rules),
            self.latency,
        ));
        let id = engine.id();

        self.sessions.write().await.insert(id, Arc::clone(&engine));
        tracing::info!(session = %id, "session mounted");

        engine
    }

    pub async fn get(&self, id: &Uuid) -> Option<Arc<ConversationEngine>> {
        self.sessions.read().await.get(id).cloned()
    }

    /// Unmount a session, returning `false` if it was not mounted
    pub async fn unmount(&self, id: &Uuid) -> bool {
        let Some(engine) = self.sessions.write().await.remove(id) else {
            return false;
        };
        engine.teardown();
        tracing::info!(session = %id, "session unmounted");
        true
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}
