//! Outbound alert sent when a refresh arrives from an unfamiliar address.

use std::time::Duration;

use reqwest::{redirect, Client};
use serde::Serialize;

pub const ANOMALY_MESSAGE_PREFIX: &str = "Refresh attempt from an unknown IP: ";

/// Best-effort notification channel.
///
/// `notify` must return immediately. Delivery happens on a detached task and
/// its outcome is only visible in the logs.
#[cfg_attr(test, mockall::automock)]
pub trait AnomalyNotifier: Send + Sync {
    fn notify(&self, origin_ip: &str);
}

#[derive(Debug, Serialize)]
pub struct AnomalyMessage {
    pub message: String,
}

impl AnomalyMessage {
    pub fn for_ip(origin_ip: &str) -> Self {
        Self {
            message: format!("{ANOMALY_MESSAGE_PREFIX}{origin_ip}"),
        }
    }
}

/// Posts `{"message": ...}` to the configured webhook.
#[derive(Clone)]
pub struct WebhookNotifier {
    client: Client,
    url: Option<String>,
}

impl WebhookNotifier {
    pub fn new(url: Option<String>, timeout: Duration) -> anyhow::Result<Self> {
        // 3xx counts as delivered, so redirects are not followed.
        let client = Client::builder()
            .user_agent("tokenkeeper-backend/1.0")
            .timeout(timeout)
            .redirect(redirect::Policy::none())
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to initialize webhook client: {}", e))?;
        Ok(Self { client, url })
    }

    /// One delivery attempt. Returns whether the endpoint accepted it.
    pub async fn deliver(client: &Client, url: &str, origin_ip: &str) -> bool {
        let response = client
            .post(url)
            .json(&AnomalyMessage::for_ip(origin_ip))
            .send()
            .await;

        match response {
            Ok(resp) if resp.status().as_u16() >= 400 => {
                tracing::error!(
                    status = resp.status().as_u16(),
                    origin_ip,
                    "Anomaly webhook returned an error status"
                );
                false
            }
            Ok(_) => {
                tracing::info!(origin_ip, "Anomaly webhook delivered");
                true
            }
            Err(err) => {
                tracing::error!(error = %err, origin_ip, "Anomaly webhook request failed");
                false
            }
        }
    }
}

impl AnomalyNotifier for WebhookNotifier {
    fn notify(&self, origin_ip: &str) {
        let Some(url) = self.url.clone() else {
            tracing::warn!(origin_ip, "No anomaly webhook configured; notification skipped");
            return;
        };

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::error!(origin_ip, "No async runtime available for anomaly webhook");
            return;
        };

        let client = self.client.clone();
        let origin_ip = origin_ip.to_string();
        runtime.spawn(async move {
            WebhookNotifier::deliver(&client, &url, &origin_ip).await;
        });
    }
}
