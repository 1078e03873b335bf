//! LINE Messaging API client.

use std::time::Duration;

use async_trait::async_trait;
use quizcast_core::config::{LabelConfig, RecipientConfig};
use quizcast_core::error::{QuizError, Result};
use quizcast_core::traits::{Deliverer, Template};
use quizcast_core::types::WebhookEvent;

use crate::{flex, webhook};

pub const LINE_API_BASE: &str = "https://api.line.me";

/// One HTTP client shared by every bot; credentials come per call.
pub struct LineClient {
    client: reqwest::Client,
    api_base: String,
    problem_alt_text: String,
    editorial_alt_text: String,
}

impl LineClient {
    pub fn new(request_timeout: Duration, labels: &LabelConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| QuizError::Channel(format!("LINE client: {e}")))?;
        Ok(Self {
            client,
            api_base: LINE_API_BASE.into(),
            problem_alt_text: labels.problem_alt_text.clone(),
            editorial_alt_text: labels.editorial_alt_text.clone(),
        })
    }

    /// Point at another host (tests, proxies).
    pub fn with_api_base(mut self, api_base: &str) -> Self {
        self.api_base = api_base.trim_end_matches('/').to_string();
        self
    }

    fn alt_text(&self, template: Template) -> &str {
        match template {
            Template::Problem => &self.problem_alt_text,
            Template::Editorial => &self.editorial_alt_text,
        }
    }

    async fn post(&self, access_token: &str, path: &str, body: &serde_json::Value) -> Result<()> {
        let resp = self
            .client
            .post(format!("{}{path}", self.api_base))
            .bearer_auth(access_token)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    QuizError::Timeout(format!("LINE {path}: {e}"))
                } else {
                    QuizError::Channel(format!("LINE {path}: {e}"))
                }
            })?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(QuizError::Channel(format!("LINE {path} returned {status}: {text}")));
        }
        Ok(())
    }
}

#[async_trait]
impl Deliverer for LineClient {
    async fn deliver(
        &self,
        recipient: &RecipientConfig,
        template: Template,
        args: &serde_json::Value,
    ) -> Result<()> {
        if !recipient.is_deliverable() {
            return Err(QuizError::Config(format!(
                "recipient '{}' has no access token or group",
                recipient.name
            )));
        }
        let contents = flex::render(template, args)?;
        let body = serde_json::json!({
            "to": recipient.group_id,
            "messages": [{
                "type": "flex",
                "altText": self.alt_text(template),
                "contents": contents,
            }]
        });
        self.post(&recipient.access_token, "/v2/bot/message/push", &body).await?;
        tracing::debug!("📤 LINE {template} card pushed via '{}'", recipient.name);
        Ok(())
    }

    async fn reply_text(&self, recipient: &RecipientConfig, reply_token: &str, text: &str) -> Result<()> {
        let body = serde_json::json!({
            "replyToken": reply_token,
            "messages": [{"type": "text", "text": text}]
        });
        self.post(&recipient.access_token, "/v2/bot/message/reply", &body).await
    }

    fn parse_webhook(
        &self,
        recipient: &RecipientConfig,
        body: &[u8],
        signature: Option<&str>,
    ) -> Result<Vec<WebhookEvent>> {
        webhook::parse_events(&recipient.channel_secret, body, signature)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> LineClient {
        LineClient::new(Duration::from_secs(5), &LabelConfig::default())
            .unwrap()
            .with_api_base(&server.uri())
    }

    fn recipient() -> RecipientConfig {
        let mut r = RecipientConfig::new("crab", "token-crab", "C-group");
        r.channel_secret = "secret".into();
        r
    }

    fn problem_args() -> serde_json::Value {
        serde_json::json!({
            "imageUrl": "https://img/p.png",
            "imageAspectRatio": "1:1",
            "text": "Q",
            "options": ["A", "B"]
        })
    }

    #[tokio::test]
    async fn test_deliver_pushes_flex() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v2/bot/message/push"))
            .and(header("authorization", "Bearer token-crab"))
            .and(body_partial_json(serde_json::json!({
                "to": "C-group",
                "messages": [{"type": "flex", "altText": "今日の1レッグ"}]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .expect(1)
            .mount(&server)
            .await;

        client(&server)
            .deliver(&recipient(), Template::Problem, &problem_args())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_deliver_surfaces_api_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v2/bot/message/push"))
            .respond_with(ResponseTemplate::new(400).set_body_string("bad request"))
            .mount(&server)
            .await;

        let err = client(&server)
            .deliver(&recipient(), Template::Problem, &problem_args())
            .await
            .unwrap_err();
        assert!(matches!(err, QuizError::Channel(ref m) if m.contains("400")));
    }

    #[tokio::test]
    async fn test_deliver_requires_credentials() {
        let server = MockServer::start().await;
        let mut r = recipient();
        r.access_token.clear();
        let err = client(&server)
            .deliver(&r, Template::Editorial, &serde_json::json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, QuizError::Config(_)));
    }

    #[tokio::test]
    async fn test_reply_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v2/bot/message/reply"))
            .and(body_partial_json(serde_json::json!({
                "replyToken": "r1",
                "messages": [{"type": "text", "text": "hello"}]
            })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        client(&server).reply_text(&recipient(), "r1", "hello").await.unwrap();
    }

    #[test]
    fn test_parse_webhook_uses_recipient_secret() {
        let body = br#"{"events":[]}"#;
        let sig = webhook::sign("secret", body).unwrap();
        let c = LineClient::new(Duration::from_secs(1), &LabelConfig::default()).unwrap();
        assert!(c.parse_webhook(&recipient(), body, Some(&sig)).unwrap().is_empty());
        assert!(c.parse_webhook(&recipient(), body, Some("AAAA")).is_err());
    }
}
