//! Notification cooldown.
//!
//! A broadcast stays live across many polls; without a cooldown every poll
//! would send another email. After a notification goes out, further ones are
//! suppressed until the window has passed.
//!
//! State is in-memory: a restart forgets the last send time, so the first live
//! poll after a restart always notifies.

use chrono::{DateTime, Duration, Utc};

/// Default cooldown window (1 hour).
pub const DEFAULT_COOLDOWN_MINUTES: i64 = 60;

pub struct NotificationCooldown {
    window: Duration,
    last_sent: Option<DateTime<Utc>>,
}

impl NotificationCooldown {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last_sent: None,
        }
    }

    /// Build a window of `minutes`, or `None` if chrono cannot represent it.
    pub fn try_from_minutes(minutes: u64) -> Option<Self> {
        let minutes = i64::try_from(minutes).ok()?;
        Duration::try_minutes(minutes).map(Self::new)
    }

    /// Check whether a notification may be sent at `now`, and if so record it.
    ///
    /// Returns `true` if nothing was sent yet or the window has elapsed.
    /// Returns `false` while the previous notification is still cooling down.
    pub fn check_and_set(&mut self, now: DateTime<Utc>) -> bool {
        let allowed = match self.last_sent {
            None => true,
            Some(last) => now - last >= self.window,
        };

        if allowed {
            self.last_sent = Some(now);
        } else {
            tracing::debug!(
                last_sent = ?self.last_sent,
                window_minutes = self.window.num_minutes(),
                "Notification suppressed, cooldown active"
            );
        }

        allowed
    }

    pub fn last_sent(&self) -> Option<DateTime<Utc>> {
        self.last_sent
    }
}

impl Default for NotificationCooldown {
    fn default() -> Self {
        Self::new(Duration::minutes(DEFAULT_COOLDOWN_MINUTES))
    }
}
