//! Live notifications.
//!
//! The watcher only needs "tell people this user went live"; delivery is
//! behind the `Notifier` trait so the session loop does not care whether it
//! ends up as an email or a log line.

pub mod logging;
pub mod sendgrid;

use async_trait::async_trait;
use serde::Serialize;

use livewatch_common::error::NotifyError;

pub use logging::LogNotifier;
pub use sendgrid::{SendGridConfig, SendGridNotifier};

/// What a live notification carries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LivePayload {
    /// Rendered into the email template as `tiktok`.
    #[serde(rename = "tiktok")]
    pub username: String,
}

impl LivePayload {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
        }
    }
}

/// Delivers a live notification.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, payload: &LivePayload) -> Result<(), NotifyError>;

    /// Human-readable name for logs (e.g., "sendgrid").
    fn name(&self) -> &'static str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_template_data() {
        let data = serde_json::to_value(LivePayload::new("alice")).unwrap();
        assert_eq!(data, serde_json::json!({"tiktok": "alice"}));
    }
}
