// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Downstream notification of new submissions.
//!
//! Publishing is fire-and-forget: the request path spawns the publish and
//! returns. Failures are logged and counted, never retried here.

use crate::config::{NotifierConfig, NotifierKind};
use crate::error::NotifyError;
use crate::metrics::Metrics;
use crate::store::SubmissionRecord;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{error, info};
use url::Url;

/// Header carrying the topic name on HTTP pushes.
pub const TOPIC_HEADER: &str = "X-Topic";

/// Payload published for each stored submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationMessage {
    pub full_name: String,
    pub sender: String,
    pub subject: String,
    pub message: String,
}

impl From<&SubmissionRecord> for NotificationMessage {
    fn from(record: &SubmissionRecord) -> Self {
        Self {
            full_name: record.full_name.clone(),
            sender: record.email.clone(),
            subject: record.subject.clone(),
            message: record.message_text.clone(),
        }
    }
}

/// Publish capability of the message queue.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn publish(&self, message: &NotificationMessage) -> Result<(), NotifyError>;
}

/// Writes notifications to the log only.
#[derive(Debug, Clone)]
pub struct LogNotifier {
    topic: String,
}

impl LogNotifier {
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
        }
    }
}

#[async_trait]
impl Notifier for LogNotifier {
    async fn publish(&self, message: &NotificationMessage) -> Result<(), NotifyError> {
        let payload = serde_json::to_string(message)?;
        info!(topic = %self.topic, %payload, "Notification published");
        Ok(())
    }
}

/// Pushes notifications as JSON to an HTTP endpoint.
#[derive(Debug, Clone)]
pub struct HttpNotifier {
    client: reqwest::Client,
    endpoint: Url,
    topic: String,
}

impl HttpNotifier {
    pub fn new(endpoint: &str, topic: impl Into<String>, timeout: Duration) -> Result<Self, NotifyError> {
        let endpoint = Url::parse(endpoint)
            .map_err(|e| NotifyError::Config(format!("invalid endpoint {endpoint}: {e}")))?;
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint,
            topic: topic.into(),
        })
    }
}

#[async_trait]
impl Notifier for HttpNotifier {
    async fn publish(&self, message: &NotificationMessage) -> Result<(), NotifyError> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .header(TOPIC_HEADER, &self.topic)
            .json(message)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(NotifyError::Rejected(status.as_u16()));
        }
        info!(topic = %self.topic, endpoint = %self.endpoint, "Notification pushed");
        Ok(())
    }
}

/// Build the notifier selected by configuration.
pub fn from_config(config: &NotifierConfig) -> Result<Arc<dyn Notifier>, NotifyError> {
    match config.kind {
        NotifierKind::Log => Ok(Arc::new(LogNotifier::new(config.topic.clone()))),
        NotifierKind::Http => {
            let endpoint = config
                .endpoint
                .as_deref()
                .ok_or_else(|| NotifyError::Config("http notifier requires an endpoint".into()))?;
            Ok(Arc::new(HttpNotifier::new(
                endpoint,
                config.topic.clone(),
                Duration::from_millis(config.timeout_ms),
            )?))
        }
    }
}

/// Publish in the background, logging any failure.
pub fn spawn_publish(
    notifier: Arc<dyn Notifier>,
    message: NotificationMessage,
    metrics: Metrics,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        if let Err(err) = notifier.publish(&message).await {
            metrics.notify_failure();
            error!(error = %err, sender = %message.sender, "Failed to publish notification");
        }
    })
}
