//! Inbound channel events, already authenticated and decoded.

use serde::{Deserialize, Serialize};

/// Where an inbound event originated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventSource {
    User,
    Group,
    Room,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum WebhookMessage {
    Text(String),
    /// Any non-text message or event type, carried by name only.
    Other(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookEvent {
    pub source: EventSource,
    pub group_id: Option<String>,
    pub user_id: Option<String>,
    pub reply_token: Option<String>,
    pub message: WebhookMessage,
}

impl WebhookEvent {
    pub fn text(&self) -> Option<&str> {
        match &self.message {
            WebhookMessage::Text(t) => Some(t.as_str()),
            WebhookMessage::Other(_) => None,
        }
    }
}
