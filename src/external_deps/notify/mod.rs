//! Notification-channel collaborator.
//!
//! Delivery failures are values, never panics; the scheduler catches and logs
//! them so a broken channel can never crash a monitor task.

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

/// Inline URL button attached to a notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkButton {
    pub label: String,
    pub url: String,
}

impl LinkButton {
    pub fn url(label: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            url: url.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("delivery failed: {0}")]
    Delivery(String),
}

/// Chat delivery operations the scheduler consumes.
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        button: Option<&LinkButton>,
    ) -> Result<(), ChannelError>;

    async fn send_file(
        &self,
        chat_id: i64,
        file: Bytes,
        caption: &str,
        button: Option<&LinkButton>,
    ) -> Result<(), ChannelError>;
}
