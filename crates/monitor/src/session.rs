//! Session loop.
//!
//! Automatic mode polls forever: re-resolve the room id, check live status,
//! and notify once per cooldown window while the user is live. Manual mode
//! checks once and hands the live source URL to whoever records it.

use std::sync::Arc;

use chrono::Utc;

use livewatch_common::error::ResolveError;
use livewatch_common::types::RoomIdLookup;
use livewatch_notifier::{LivePayload, Notifier};
use livewatch_resolver::LiveResolver;

use crate::cooldown::NotificationCooldown;

/// What one automatic-mode iteration did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    /// Not live. `client_offline` is set when the room id lookup itself failed.
    Offline { client_offline: bool },
    /// Live, and a notification was attempted.
    Notified,
    /// Live, but the previous notification is still cooling down.
    CooldownSkipped,
}

pub struct SessionLoop {
    resolver: LiveResolver,
    notifier: Arc<dyn Notifier>,
    cooldown: NotificationCooldown,
}

impl SessionLoop {
    pub fn new(
        resolver: LiveResolver,
        notifier: Arc<dyn Notifier>,
        cooldown: NotificationCooldown,
    ) -> Self {
        Self {
            resolver,
            notifier,
            cooldown,
        }
    }

    pub fn resolver(&self) -> &LiveResolver {
        &self.resolver
    }

    /// Poll until the task is cancelled.
    pub async fn run_automatic(&mut self) {
        tracing::info!(
            username = %self.resolver.username(),
            notifier = self.notifier.name(),
            "Automatic watch started"
        );

        loop {
            let tick = self.tick().await;
            tracing::debug!(?tick, "Poll finished");
        }
    }

    /// One automatic-mode iteration, including its sleeps.
    pub async fn tick(&mut self) -> Tick {
        let pause = self.resolver.timeouts().automatic_mode;

        let client_offline = match self.resolver.refresh_room_id().await {
            Ok(RoomIdLookup::Resolved(_)) | Ok(RoomIdLookup::Unresolved) => false,
            Err(e) => {
                tracing::debug!(error = %e, "Room id lookup failed, treating client as offline");
                true
            }
        };

        let status = self.resolver.check_live_status().await;
        if !status.is_live() {
            let who = if client_offline {
                "Client"
            } else {
                self.resolver.username()
            };
            tracing::info!(?status, "{who} is offline");
            tracing::info!(
                wait_minutes = pause.as_secs() / 60,
                "Waiting before recheck"
            );
            tokio::time::sleep(pause).await;
            return Tick::Offline { client_offline };
        }

        if !self.cooldown.check_and_set(Utc::now()) {
            tracing::info!(
                last_sent = ?self.cooldown.last_sent(),
                "Skipping notification, one was sent recently"
            );
            tokio::time::sleep(pause).await;
            return Tick::CooldownSkipped;
        }

        let payload = LivePayload::new(self.resolver.username());
        match self.notifier.notify(&payload).await {
            Ok(()) => tracing::info!(
                username = %payload.username,
                notifier = self.notifier.name(),
                "Live notification sent"
            ),
            Err(e) => tracing::error!(
                username = %payload.username,
                notifier = self.notifier.name(),
                error = %e,
                "Live notification failed"
            ),
        }

        Tick::Notified
    }

    /// Check once; when live, return the stream URL for the recorder.
    pub async fn run_manual(&self) -> Result<Option<String>, ResolveError> {
        let status = self.resolver.check_live_status().await;
        if !status.is_live() {
            tracing::info!(username = %self.resolver.username(), ?status, "User is not live");
            return Ok(None);
        }

        self.resolver.live_source_url().await
    }
}
