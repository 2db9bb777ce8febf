//! Outbound notification collaborator
//!
//! Best-effort, fire-and-forget delivery of text messages (optionally with
//! interactive buttons) to a messenger webhook. Failures are logged by
//! callers and never propagated to the command or monitor paths.

use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

use crate::types::{CertwatchError, Result};

/// One interactive button attached to a message
///
/// `value` is an opaque pending-action token the client echoes back through
/// the callback endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Action {
    pub name: String,
    #[serde(rename = "text")]
    pub label: String,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub value: String,
}

impl Action {
    pub fn button(name: &str, label: &str, token: &str) -> Self {
        Self {
            name: name.to_string(),
            label: label.to_string(),
            kind: "button",
            value: token.to_string(),
        }
    }
}

#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver a message to a target channel
    ///
    /// An empty target skips delivery and reports success.
    async fn send(&self, target: &str, text: &str, actions: &[Action]) -> Result<()>;
}

/// Messenger webhook payload
#[derive(Serialize)]
struct WebhookPayload<'a> {
    channel: &'a str,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    attachments: Option<Vec<Attachment<'a>>>,
}

#[derive(Serialize)]
struct Attachment<'a> {
    actions: &'a [Action],
}

/// Notifier posting to a fixed webhook URL
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CertwatchError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            url: url.to_string(),
        })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn send(&self, target: &str, text: &str, actions: &[Action]) -> Result<()> {
        if target.is_empty() || self.url.is_empty() {
            debug!("Notification skipped (no target or webhook configured)");
            return Ok(());
        }

        let payload = WebhookPayload {
            channel: target,
            text,
            attachments: (!actions.is_empty()).then(|| vec![Attachment { actions }]),
        };

        let response = self
            .client
            .post(&self.url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| CertwatchError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(CertwatchError::Transport(format!(
                "webhook answered {status}"
            )));
        }

        debug!(target, "Notification delivered");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string_contains, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn delivers_payload_with_buttons() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_string_contains("\"channel\":\"chan-1\""))
            .and(body_string_contains("\"type\":\"button\""))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let notifier = WebhookNotifier::new(&server.uri(), Duration::from_secs(2)).unwrap();
        let actions = [Action::button("register", "Register", "tok-1")];
        notifier.send("chan-1", "hello", &actions).await.unwrap();
    }

    #[tokio::test]
    async fn empty_target_skips_delivery() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let notifier = WebhookNotifier::new(&server.uri(), Duration::from_secs(2)).unwrap();
        notifier.send("", "hello", &[]).await.unwrap();
    }

    #[tokio::test]
    async fn webhook_failure_maps_to_transport() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let notifier = WebhookNotifier::new(&server.uri(), Duration::from_secs(2)).unwrap();
        let err = notifier.send("chan", "x", &[]).await.unwrap_err();
        assert!(matches!(err, CertwatchError::Transport(_)));
    }
}
