//! Inbound chat events.

use serde::{Deserialize, Serialize};

/// A chat message delivered by the chat connection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMessage {
    /// Login name of the sender.
    pub username: String,
    /// Raw message text.
    pub text: String,
}

impl ChatMessage {
    pub fn new(username: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            text: text.into(),
        }
    }
}
