//! Core assistant engine components
//!
//! This module contains the conversation engine and the registry of mounted
//! chat sessions.

mod engine;
mod sessions;

pub use engine::{ConversationEngine, ConversationSnapshot};
pub use sessions::SessionRegistry;
