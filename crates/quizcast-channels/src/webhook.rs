//! LINE webhook decoding and `X-Line-Signature` verification.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use hmac::{Hmac, Mac};
use quizcast_core::error::{QuizError, Result};
use quizcast_core::types::{EventSource, WebhookEvent, WebhookMessage};
use serde::Deserialize;
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the body signature.
pub const SIGNATURE_HEADER: &str = "X-Line-Signature";

#[derive(Debug, Deserialize)]
struct WebhookBody {
    #[serde(default)]
    events: Vec<RawEvent>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawEvent {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    reply_token: Option<String>,
    #[serde(default)]
    source: Option<RawSource>,
    #[serde(default)]
    message: Option<RawMessage>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSource {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    user_id: Option<String>,
    #[serde(default)]
    group_id: Option<String>,
    #[serde(default)]
    room_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawMessage {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

/// Compute the base64 HMAC-SHA256 signature LINE sends for `body`.
pub fn sign(secret: &str, body: &[u8]) -> Result<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| QuizError::AuthFailed(format!("invalid channel secret: {e}")))?;
    mac.update(body);
    Ok(BASE64.encode(mac.finalize().into_bytes()))
}

/// Constant-time check of `signature` against `body`.
pub fn verify_signature(secret: &str, body: &[u8], signature: &str) -> Result<()> {
    if secret.is_empty() {
        return Err(QuizError::AuthFailed("channel secret not configured".into()));
    }
    let expected = BASE64
        .decode(signature.trim())
        .map_err(|_| QuizError::AuthFailed("signature is not valid base64".into()))?;
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| QuizError::AuthFailed(format!("invalid channel secret: {e}")))?;
    mac.update(body);
    mac.verify_slice(&expected)
        .map_err(|_| QuizError::AuthFailed("Invalid webhook signature".into()))
}

/// Verify and decode a webhook body into events.
pub fn parse_events(secret: &str, body: &[u8], signature: Option<&str>) -> Result<Vec<WebhookEvent>> {
    let signature = signature
        .ok_or_else(|| QuizError::AuthFailed(format!("Missing {SIGNATURE_HEADER} header")))?;
    verify_signature(secret, body, signature)?;

    let parsed: WebhookBody = serde_json::from_slice(body)
        .map_err(|e| QuizError::Channel(format!("Invalid LINE webhook JSON: {e}")))?;

    Ok(parsed.events.into_iter().map(to_event).collect())
}

fn to_event(raw: RawEvent) -> WebhookEvent {
    let (source, user_id, group_id) = match raw.source {
        Some(src) => {
            let kind = match src.kind.as_str() {
                "group" => EventSource::Group,
                "room" => EventSource::Room,
                _ => EventSource::User,
            };
            (kind, src.user_id, src.group_id.or(src.room_id))
        }
        None => (EventSource::User, None, None),
    };

    let message = match (raw.kind.as_str(), raw.message) {
        ("message", Some(RawMessage { kind, text: Some(text) })) if kind == "text" => {
            WebhookMessage::Text(text)
        }
        ("message", Some(msg)) => WebhookMessage::Other(format!("message:{}", msg.kind)),
        (kind, _) => WebhookMessage::Other(kind.to_string()),
    };

    WebhookEvent {
        source,
        group_id,
        user_id,
        reply_token: raw.reply_token,
        message,
    }
}
