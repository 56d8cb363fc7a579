use async_trait::async_trait;

use livewatch_common::error::NotifyError;

use crate::{LivePayload, Notifier};

/// Notifier that only writes a log line. Used when no email API is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, payload: &LivePayload) -> Result<(), NotifyError> {
        tracing::info!(username = %payload.username, "User is live (email notifications disabled)");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "log"
    }
}
