//! Conversation engine with delayed assistant replies
//!
//! The ConversationEngine owns one mounted chat session. It:
//! 1. Appends trimmed user messages and clears the input buffer
//! 2. Queues a reply for each user message, in submission order
//! 3. Appends each reply once its latency window has elapsed
//! 4. Tracks like/dislike feedback on assistant messages
//!
//! All state lives behind a `watch` channel, so every mutation is serialized
//! and every subscriber is notified.

use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use uuid::Uuid;

use crate::config::RuleBook;
use crate::conversation::{Conversation, Feedback, Message};

/// Whether the assistant is working on a reply
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ComposeState {
    Idle,
    Composing,
}

/// Observable state of a chat session
#[derive(Debug, Clone)]
pub struct ConversationState {
    conversation: Conversation,
    input: String,
    pending: usize,
    torn_down: bool,
}

impl ConversationState {
    fn new(greeting: &str) -> Self {
        Self {
            conversation: Conversation::new(greeting),
            input: String::new(),
            pending: 0,
            torn_down: false,
        }
    }

    pub fn id(&self) -> Uuid {
        self.conversation.id
    }

    pub fn messages(&self) -> &[Message] {
        self.conversation.messages()
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn compose_state(&self) -> ComposeState {
        if self.pending > 0 {
            ComposeState::Composing
        } else {
            ComposeState::Idle
        }
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }
}

/// Owned copy of a session's state for rendering
#[derive(Debug, Clone, Serialize)]
pub struct ConversationSnapshot {
    pub id: Uuid,
    pub messages: Vec<Message>,
    pub state: ComposeState,
    pub input: String,
}

impl From<&ConversationState> for ConversationSnapshot {
    fn from(state: &ConversationState) -> Self {
        Self {
            id: state.id(),
            messages: state.messages().to_vec(),
            state: state.compose_state(),
            input: state.input().to_string(),
        }
    }
}

/// A reply waiting for its latency window to elapse
#[derive(Debug)]
struct PendingReply {
    prompt: String,
    due: Instant,
}

/// The per-session conversation engine
///
/// Must be created inside a Tokio runtime: the reply task is spawned on it.
pub struct ConversationEngine {
    state: Arc<watch::Sender<ConversationState>>,
    queue: mpsc::UnboundedSender<PendingReply>,
    replies: JoinHandle<()>,
    latency: Duration,
}

impl ConversationEngine {
    /// Mount a new session seeded with the rule book's greeting
    pub fn new(rules: Arc<RuleBook>, latency: Duration) -> Self {
        let (state, _) = watch::channel(ConversationState::new(&rules.greeting));
        let state = Arc::new(state);
        let (queue, pending) = mpsc::unbounded_channel();

        let replies = tokio::spawn(deliver_replies(Arc::clone(&state), rules, pending));

        tracing::debug!(session = %state.borrow().id(), "conversation mounted");

        Self {
            state,
            queue,
            replies,
            latency,
        }
    }

    pub fn id(&self) -> Uuid {
        self.state.borrow().id()
    }

    /// Current state as an owned snapshot
    pub fn snapshot(&self) -> ConversationSnapshot {
        ConversationSnapshot::from(&*self.state.borrow())
    }

    /// Receiver notified after every state change
    pub fn subscribe(&self) -> watch::Receiver<ConversationState> {
        self.state.subscribe()
    }

    pub fn compose_state(&self) -> ComposeState {
        self.state.borrow().compose_state()
    }

    pub fn is_torn_down(&self) -> bool {
        self.state.borrow().torn_down
    }

    /// Replace the pending-input buffer
    pub fn set_input(&self, text: &str) {
        self.state.send_if_modified(|state| {
            if state.torn_down || state.input == text {
                return false;
            }
            state.input = text.to_string();
            true
        });
    }

    /// Submit a user message.
    ///
    /// Whitespace-only text is ignored. Otherwise the trimmed text is
    /// appended, the input buffer cleared, and a reply queued; this returns
    /// before the reply arrives.
    pub fn submit(&self, text: &str) {
        let prompt = text.trim();
        if prompt.is_empty() {
            tracing::debug!(session = %self.id(), "ignoring empty submission");
            return;
        }

        let mut accepted = false;
        self.state.send_if_modified(|state| {
            if state.torn_down {
                return false;
            }
            state.conversation.add_user(prompt);
            state.input.clear();
            state.pending += 1;
            accepted = true;
            true
        });

        if !accepted {
            tracing::warn!(session = %self.id(), "submission after teardown ignored");
            return;
        }

        let pending = PendingReply {
            prompt: prompt.to_string(),
            due: Instant::now() + self.latency,
        };
        if self.queue.send(pending).is_err() {
            tracing::warn!(session = %self.id(), "reply queue closed");
        }
    }

    /// Submit whatever the input buffer currently holds
    pub fn submit_input(&self) {
        let input = self.state.borrow().input.clone();
        self.submit(&input);
    }

    /// Fill the input buffer with a suggested question and submit it
    pub fn preset_query(&self, text: &str) {
        self.set_input(text);
        self.submit_input();
    }

    /// Toggle like/dislike on an assistant message.
    ///
    /// Unknown ids and user messages are ignored.
    pub fn set_feedback(&self, message_id: &str, kind: Feedback) {
        let applied = self.state.send_if_modified(|state| {
            !state.torn_down && state.conversation.apply_feedback(message_id, kind)
        });

        if !applied {
            tracing::debug!(session = %self.id(), message_id, "feedback target ignored");
        }
    }

    /// Unmount the session. Replies still waiting are dropped.
    pub fn teardown(&self) {
        self.replies.abort();
        self.state.send_if_modified(|state| {
            if state.torn_down {
                return false;
            }
            state.torn_down = true;
            state.pending = 0;
            true
        });
        tracing::debug!(session = %self.id(), "conversation torn down");
    }
}

impl Drop for ConversationEngine {
    fn drop(&mut self) {
        self.replies.abort();
    }
}

/// Answer queued submissions one at a time, in the order they were made
async fn deliver_replies(
    state: Arc<watch::Sender<ConversationState>>,
    rules: Arc<RuleBook>,
    mut pending: mpsc::UnboundedReceiver<PendingReply>,
) {
    while let Some(reply) = pending.recv().await {
        tokio::time::sleep_until(reply.due).await;

        let text = rules.resolve(&reply.prompt);
        let delivered = state.send_if_modified(|state| {
            if state.torn_down {
                return false;
            }
            state.conversation.add_assistant(text);
            state.pending = state.pending.saturating_sub(1);
            true
        });

        if !delivered {
            tracing::debug!("dropping reply for torn-down conversation");
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::rules::builtin as rules_builtin;
    use crate::conversation::{Sender, SEED_MESSAGE_ID};

    const LATENCY: Duration = Duration::from_millis(1500);

    fn engine() -> ConversationEngine {
        ConversationEngine::new(Arc::new(RuleBook::builtin()), LATENCY)
    }

    /// Let every reply queued so far come due
    async fn settle() {
        tokio::time::sleep(LATENCY + Duration::from_millis(1)).await;
    }

    fn texts(engine: &ConversationEngine) -> Vec<String> {
        engine
            .snapshot()
            .messages
            .into_iter()
            .map(|m| m.text)
            .collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_starts_with_seed_greeting() {
        let engine = engine();
        let snapshot = engine.snapshot();

        assert_eq!(snapshot.messages.len(), 1);
        assert_eq!(snapshot.messages[0].id, SEED_MESSAGE_ID);
        assert_eq!(snapshot.messages[0].text, rules_builtin::GREETING);
        assert_eq!(snapshot.state, ComposeState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_submit_appends_user_then_reply() {
        let engine = engine();
        engine.set_input("What are the operational hours?");
        engine.submit("  What are the operational hours?  ");

        let snapshot = engine.snapshot();
        assert_eq!(snapshot.messages.len(), 2);
        assert_eq!(snapshot.messages[1].sender, Sender::User);
        assert_eq!(snapshot.messages[1].text, "What are the operational hours?");
        assert_eq!(snapshot.input, "");
        assert_eq!(snapshot.state, ComposeState::Composing);

        settle().await;

        let snapshot = engine.snapshot();
        assert_eq!(snapshot.state, ComposeState::Idle);
        assert_eq!(
            texts(&engine),
            vec![
                rules_builtin::GREETING,
                "What are the operational hours?",
                rules_builtin::HOURS,
            ]
        );
        assert_eq!(snapshot.messages[2].sender, Sender::Assistant);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reply_waits_for_latency() {
        let engine = engine();
        engine.submit("hi there");

        tokio::time::sleep(LATENCY - Duration::from_millis(1)).await;
        assert_eq!(engine.snapshot().messages.len(), 2);
        assert!(engine.compose_state() == ComposeState::Composing);

        tokio::time::sleep(Duration::from_millis(2)).await;
        assert_eq!(texts(&engine)[2], rules_builtin::HELLO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_whitespace_submission_is_ignored() {
        let engine = engine();
        let rx = engine.subscribe();

        engine.submit("   \t\n");
        engine.submit("");
        settle().await;

        assert_eq!(engine.snapshot().messages.len(), 1);
        assert_eq!(engine.compose_state(), ComposeState::Idle);
        assert!(!rx.has_changed().unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_matching_is_deterministic() {
        let engine = engine();
        engine.submit("I want to donate food");
        settle().await;
        engine.submit("random gibberish");
        settle().await;

        let texts = texts(&engine);
        assert_eq!(texts[2], rules_builtin::DONATE);
        assert_eq!(texts[4], rules_builtin::FALLBACK);
    }

    #[tokio::test(start_paused = true)]
    async fn test_overlapping_submissions_reply_in_order() {
        let engine = engine();
        engine.submit("how do I volunteer");
        tokio::time::sleep(Duration::from_millis(500)).await;
        engine.submit("what is accepted");

        // First reply is due at 1500ms, second at 2000ms
        tokio::time::sleep(Duration::from_millis(1001)).await;
        let snapshot = engine.snapshot();
        assert_eq!(snapshot.messages.len(), 4);
        assert_eq!(snapshot.messages[3].text, rules_builtin::VOLUNTEER);
        assert_eq!(snapshot.state, ComposeState::Composing);

        tokio::time::sleep(Duration::from_millis(500)).await;
        let snapshot = engine.snapshot();
        assert_eq!(snapshot.messages.len(), 5);
        assert_eq!(snapshot.messages[4].text, rules_builtin::ACCEPTED);
        assert_eq!(snapshot.state, ComposeState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_preset_query_matches_set_input_then_submit() {
        let preset = engine();
        preset.preset_query("How to donate food?");

        let manual = engine();
        manual.set_input("How to donate food?");
        manual.submit_input();

        settle().await;

        assert_eq!(texts(&preset), texts(&manual));
        assert_eq!(texts(&preset)[2], rules_builtin::DONATE);
        assert_eq!(preset.snapshot().input, "");
    }

    #[tokio::test(start_paused = true)]
    async fn test_feedback_toggles_on_assistant_messages() {
        let engine = engine();
        engine.submit("hello");
        settle().await;

        let snapshot = engine.snapshot();
        let user_id = snapshot.messages[1].id.clone();
        let reply_id = snapshot.messages[2].id.clone();

        engine.set_feedback(&reply_id, Feedback::Like);
        engine.set_feedback(&reply_id, Feedback::Dislike);
        let reply = engine.snapshot().messages[2].clone();
        assert!(!reply.liked);
        assert!(reply.disliked);

        engine.set_feedback(&reply_id, Feedback::Dislike);
        let reply = engine.snapshot().messages[2].clone();
        assert!(!reply.liked && !reply.disliked);

        engine.set_feedback(&user_id, Feedback::Like);
        engine.set_feedback("missing", Feedback::Like);
        assert!(engine.snapshot().messages.iter().all(|m| !m.liked));
    }

    #[tokio::test(start_paused = true)]
    async fn test_teardown_drops_pending_reply() {
        let engine = engine();
        let rx = engine.subscribe();

        engine.submit("history please");
        engine.teardown();
        settle().await;

        let state = rx.borrow();
        assert!(state.is_torn_down());
        assert_eq!(state.messages().len(), 2);
        assert_eq!(state.compose_state(), ComposeState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_teardown_ignores_later_operations() {
        let engine = engine();
        engine.teardown();

        engine.submit("hello");
        engine.set_input("draft");
        engine.set_feedback(SEED_MESSAGE_ID, Feedback::Like);
        settle().await;

        let snapshot = engine.snapshot();
        assert_eq!(snapshot.messages.len(), 1);
        assert_eq!(snapshot.input, "");
        assert!(!snapshot.messages[0].liked);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_engine_never_replies() {
        let engine = engine();
        let rx = engine.subscribe();

        engine.submit("nearby centers");
        drop(engine);
        settle().await;

        assert_eq!(rx.borrow().messages().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_subscribers_see_reply() {
        let engine = engine();
        let mut rx = engine.subscribe();

        engine.submit("any volunteer roles?");
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow_and_update().messages().len(), 2);

        rx.changed().await.unwrap();
        let state = rx.borrow_and_update();
        assert_eq!(state.messages().len(), 3);
        assert_eq!(state.messages()[2].text, rules_builtin::VOLUNTEER);
    }
}
