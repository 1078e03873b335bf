//! Broadcast fan-out: deliver one card to every configured recipient.
//! Failures are collected per recipient and never abort the others.

use futures::stream::{self, StreamExt};
use quizcast_core::config::RecipientConfig;
use quizcast_core::traits::{Deliverer, Template};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum DeliveryOutcome {
    Delivered,
    /// Recipient lacks a credential or destination.
    Skipped,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeliveryReport {
    pub recipient: String,
    pub outcome: DeliveryOutcome,
}

impl DeliveryReport {
    pub fn is_delivered(&self) -> bool {
        self.outcome == DeliveryOutcome::Delivered
    }
}

/// Push `template` to all recipients, at most `concurrency` at a time.
/// Reports come back in recipient order.
pub async fn fan_out(
    deliverer: &dyn Deliverer,
    recipients: &[RecipientConfig],
    template: Template,
    args: &serde_json::Value,
    concurrency: usize,
) -> Vec<DeliveryReport> {
    // Owned recipients keep each delivery future free of borrowed closure arguments.
    let mut reports: Vec<(usize, DeliveryReport)> = stream::iter(recipients.iter().cloned().enumerate())
        .map(|(i, recipient)| async move {
            let outcome = if !recipient.is_deliverable() {
                tracing::debug!("⏭️ Skipping {template} for '{}': no token or group", recipient.name);
                DeliveryOutcome::Skipped
            } else {
                match deliverer.deliver(&recipient, template, args).await {
                    Ok(()) => DeliveryOutcome::Delivered,
                    Err(e) => {
                        tracing::warn!("❌ Delivering {template} to '{}' failed: {e}", recipient.name);
                        DeliveryOutcome::Failed(e.to_string())
                    }
                }
            };
            (
                i,
                DeliveryReport {
                    recipient: recipient.name,
                    outcome,
                },
            )
        })
        .buffer_unordered(concurrency.max(1))
        .collect()
        .await;

    reports.sort_by_key(|(i, _)| *i);
    let reports: Vec<DeliveryReport> = reports.into_iter().map(|(_, r)| r).collect();
    let delivered = reports.iter().filter(|r| r.is_delivered()).count();
    tracing::info!("📣 {template} delivered to {delivered}/{} recipients", reports.len());
    reports
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use quizcast_core::error::{QuizError, Result};
    use quizcast_core::types::WebhookEvent;
    use std::sync::Mutex;

    /// Fails for one group, records the rest.
    struct FlakyDeliverer {
        failing_group: String,
        delivered: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Deliverer for FlakyDeliverer {
        async fn deliver(&self, recipient: &RecipientConfig, _: Template, _: &serde_json::Value) -> Result<()> {
            if recipient.group_id == self.failing_group {
                return Err(QuizError::Channel("boom".into()));
            }
            self.delivered.lock().unwrap().push(recipient.group_id.clone());
            Ok(())
        }

        async fn reply_text(&self, _: &RecipientConfig, _: &str, _: &str) -> Result<()> {
            Ok(())
        }

        fn parse_webhook(&self, _: &RecipientConfig, _: &[u8], _: Option<&str>) -> Result<Vec<WebhookEvent>> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn test_failures_do_not_abort_others() {
        let deliverer = FlakyDeliverer {
            failing_group: "G2".into(),
            delivered: Mutex::new(Vec::new()),
        };
        let recipients = vec![
            RecipientConfig::new("chimpanzee", "t1", "G1"),
            RecipientConfig::new("crab", "t2", "G2"),
            RecipientConfig::new("rabbit", "", "G3"),
            RecipientConfig::new("hamster", "t4", "G4"),
        ];

        let reports = fan_out(&deliverer, &recipients, Template::Problem, &serde_json::json!({}), 2).await;

        let names: Vec<&str> = reports.iter().map(|r| r.recipient.as_str()).collect();
        assert_eq!(names, vec!["chimpanzee", "crab", "rabbit", "hamster"]);
        assert_eq!(reports[0].outcome, DeliveryOutcome::Delivered);
        assert!(matches!(reports[1].outcome, DeliveryOutcome::Failed(ref m) if m.contains("boom")));
        assert_eq!(reports[2].outcome, DeliveryOutcome::Skipped);
        assert_eq!(reports[3].outcome, DeliveryOutcome::Delivered);

        let mut delivered = deliverer.delivered.lock().unwrap().clone();
        delivered.sort();
        assert_eq!(delivered, vec!["G1", "G4"]);
    }

    #[tokio::test]
    async fn test_no_recipients() {
        let deliverer = FlakyDeliverer {
            failing_group: String::new(),
            delivered: Mutex::new(Vec::new()),
        };
        let reports = fan_out(&deliverer, &[], Template::Editorial, &serde_json::json!({}), 4).await;
        assert!(reports.is_empty());
    }
}
