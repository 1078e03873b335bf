//! Message delivery transport.

use async_trait::async_trait;

use crate::config::RecipientConfig;
use crate::error::Result;
use crate::types::WebhookEvent;

/// Message templates the lifecycle pushes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Template {
    Problem,
    Editorial,
}

impl std::fmt::Display for Template {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Template::Problem => write!(f, "problem"),
            Template::Editorial => write!(f, "editorial"),
        }
    }
}

#[async_trait]
pub trait Deliverer: Send + Sync {
    /// Render `template` with `args` and push it to the recipient's group.
    async fn deliver(
        &self,
        recipient: &RecipientConfig,
        template: Template,
        args: &serde_json::Value,
    ) -> Result<()>;

    /// Answer an inbound event with plain text.
    async fn reply_text(&self, recipient: &RecipientConfig, reply_token: &str, text: &str) -> Result<()>;

    /// Authenticate and decode a raw webhook body.
    fn parse_webhook(
        &self,
        recipient: &RecipientConfig,
        body: &[u8],
        signature: Option<&str>,
    ) -> Result<Vec<WebhookEvent>>;
}
