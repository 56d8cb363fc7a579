use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ResolveError;

/// How the watcher runs.
///
/// The mode is fixed for the lifetime of a resolver. `Automatic` turns several
/// hard failures into "offline, retry later".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Manual,
    Automatic,
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Mode::Manual => write!(f, "manual"),
            Mode::Automatic => write!(f, "automatic"),
        }
    }
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "manual" => Ok(Mode::Manual),
            "automatic" => Ok(Mode::Automatic),
            other => Err(format!("unknown mode '{other}', expected 'manual' or 'automatic'")),
        }
    }
}

/// Partial identity a resolver starts from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentitySeed {
    pub source_url: Option<String>,
    pub username: Option<String>,
    pub room_id: Option<String>,
}

impl IdentitySeed {
    /// Build a seed, rejecting one with no usable field.
    ///
    /// Blank strings count as absent.
    pub fn new(
        source_url: Option<String>,
        username: Option<String>,
        room_id: Option<String>,
    ) -> Result<Self, ResolveError> {
        let clean = |v: Option<String>| v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty());
        let seed = Self {
            source_url: clean(source_url),
            username: clean(username).map(|u| u.trim_start_matches('@').to_string()),
            room_id: clean(room_id),
        };

        if seed.source_url.is_none() && seed.username.is_none() && seed.room_id.is_none() {
            return Err(ResolveError::EmptyIdentity);
        }
        Ok(seed)
    }

    pub fn from_url(url: impl Into<String>) -> Self {
        Self {
            source_url: Some(url.into()),
            ..Self::default()
        }
    }

    pub fn from_username(username: impl Into<String>) -> Self {
        Self {
            username: Some(username.into()),
            ..Self::default()
        }
    }

    pub fn from_room_id(room_id: impl Into<String>) -> Self {
        Self {
            room_id: Some(room_id.into()),
            ..Self::default()
        }
    }
}

/// A fully resolved user / room pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub username: String,
    pub room_id: String,
}

/// Result of one live check.
///
/// `CheckFailed` keeps "the check itself broke" apart from "checked, not live".
/// Callers treat it as offline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiveStatus {
    Live,
    Offline,
    CheckFailed,
}

impl LiveStatus {
    pub fn is_live(self) -> bool {
        matches!(self, LiveStatus::Live)
    }
}

/// Result of the profile-page redirect probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlacklistStatus {
    Blacklisted,
    Clear,
    /// The probe failed. Downstream treats this as not blacklisted.
    Unknown,
}

impl BlacklistStatus {
    pub fn is_blacklisted(self) -> bool {
        matches!(self, BlacklistStatus::Blacklisted)
    }
}

/// Outcome of looking up the current room id for a username.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoomIdLookup {
    Resolved(String),
    /// The user has no live room right now (automatic mode only). Retry later.
    Unresolved,
}

/// Status codes the platform uses as signals.
pub struct StatusCode;

impl StatusCode {
    /// Profile pages answer with this when the region requires a login.
    pub const REDIRECT: u16 = 302;
    /// Mobile share links answer with this.
    pub const MOVED: u16 = 301;
}

/// Coarse classification of a response status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    Ok,
    /// Login-wall redirect, the blacklist signal.
    Redirect,
    /// Mobile-link redirect.
    Moved,
    Other,
}

impl StatusClass {
    pub fn from_code(code: u16) -> Self {
        match code {
            StatusCode::REDIRECT => StatusClass::Redirect,
            StatusCode::MOVED => StatusClass::Moved,
            200..=299 => StatusClass::Ok,
            _ => StatusClass::Other,
        }
    }
}

/// Sleep durations used by the poll loop and retry branches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    /// Pause between automatic-mode polls while the user is offline.
    pub automatic_mode: Duration,
    /// Pause after a dropped connection or an unresolved room id.
    pub connection_closed: Duration,
}

impl Timeouts {
    pub const ONE_MINUTE: Duration = Duration::from_secs(60);

    /// Build from minute counts. Values too large for a `Duration` saturate.
    pub fn from_minutes(automatic_mode: u64, connection_closed: u64) -> Self {
        let minutes = |m: u64| Duration::from_secs(m.saturating_mul(Self::ONE_MINUTE.as_secs()));
        Self {
            automatic_mode: minutes(automatic_mode),
            connection_closed: minutes(connection_closed),
        }
    }
}

impl Default for Timeouts {
    fn default() -> Self {
        Self::from_minutes(5, 2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_parse() {
        assert_eq!("Automatic".parse::<Mode>().unwrap(), Mode::Automatic);
        assert_eq!(" manual ".parse::<Mode>().unwrap(), Mode::Manual);
        assert!("sometimes".parse::<Mode>().is_err());
    }

    #[test]
    fn test_seed_requires_a_field() {
        let err = IdentitySeed::new(None, Some("  ".into()), None).unwrap_err();
        assert!(matches!(err, ResolveError::EmptyIdentity));
    }

    #[test]
    fn test_seed_strips_at_sign() {
        let seed = IdentitySeed::new(None, Some("@alice".into()), None).unwrap();
        assert_eq!(seed.username.as_deref(), Some("alice"));
        assert_eq!(seed.source_url, None);
    }

    #[test]
    fn test_status_class() {
        assert_eq!(StatusClass::from_code(302), StatusClass::Redirect);
        assert_eq!(StatusClass::from_code(301), StatusClass::Moved);
        assert_eq!(StatusClass::from_code(200), StatusClass::Ok);
        assert_eq!(StatusClass::from_code(307), StatusClass::Other);
        assert_eq!(StatusClass::from_code(404), StatusClass::Other);
    }

    #[test]
    fn test_default_timeouts() {
        let t = Timeouts::default();
        assert_eq!(t.automatic_mode, Duration::from_secs(300));
        assert_eq!(t.connection_closed, Duration::from_secs(120));
    }

    #[test]
    fn test_large_timeouts_do_not_truncate() {
        let t = Timeouts::from_minutes(u64::from(u32::MAX) + 1, u64::MAX);
        assert_eq!(
            t.automatic_mode,
            Duration::from_secs((u64::from(u32::MAX) + 1) * 60)
        );
        assert_eq!(t.connection_closed, Duration::from_secs(u64::MAX));
    }

    #[test]
    fn test_check_failed_is_not_live() {
        assert!(LiveStatus::Live.is_live());
        assert!(!LiveStatus::Offline.is_live());
        assert!(!LiveStatus::CheckFailed.is_live());
        assert!(!BlacklistStatus::Unknown.is_blacklisted());
    }
}
