/// C2 chat panel.
///
/// Keeps the conversation sent to the backend assistant, decodes the actions
/// it attaches to replies, and classifies links embedded in reply text.

pub mod links;
pub mod types;

use types::{ChatMessage, ChatRole};

pub const GREETING: &str = "C2 chat ready. Tell me what to do (e.g. \"list available drones\").";
pub const NO_TEXT_REPLY: &str = "(no text)";

/// Append-only conversation log. The whole log is the context of each turn.
pub struct ChatLog {
    messages: Vec<ChatMessage>,
    awaiting_reply: bool,
}

impl Default for ChatLog {
    fn default() -> Self {
        Self::new()
    }
}

impl ChatLog {
    pub fn new() -> Self {
        Self {
            messages: vec![ChatMessage::assistant(GREETING)],
            awaiting_reply: false,
        }
    }

    /// Start a user turn. Returns the transcript to send, or `None` when the
    /// text is blank or a reply is still pending.
    pub fn begin_turn(&mut self, text: &str) -> Option<Vec<ChatMessage>> {
        let text = text.trim();
        if text.is_empty() || self.awaiting_reply {
            return None;
        }
        self.messages.push(ChatMessage::user(text));
        self.awaiting_reply = true;
        Some(self.messages.clone())
    }

    pub fn finish_turn(&mut self, reply: Option<String>) {
        self.awaiting_reply = false;
        let reply = reply.unwrap_or_else(|| NO_TEXT_REPLY.to_string());
        self.messages.push(ChatMessage::assistant(reply));
    }

    pub fn fail_turn(&mut self, error: &str) {
        self.awaiting_reply = false;
        log::warn!("[chat] turn failed: {error}");
        self.messages
            .push(ChatMessage::assistant(format!("Chat error: {error}")));
    }

    /// Drop the whole history, greeting included, and any pending turn.
    pub fn reset(&mut self) {
        self.messages.clear();
        self.awaiting_reply = false;
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn awaiting_reply(&self) -> bool {
        self.awaiting_reply
    }

    pub fn last_from(&self, role: ChatRole) -> Option<&ChatMessage> {
        self.messages.iter().rev().find(|m| m.role == role)
    }

    /// Latest `n` messages, oldest first.
    pub fn tail(&self, n: usize) -> &[ChatMessage] {
        let start = self.messages.len().saturating_sub(n);
        &self.messages[start..]
    }
}
