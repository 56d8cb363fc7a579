//! Live resolver: turns a partial identity into a (username, room id) pair
//! and answers "is this user live right now?".
//!
//! Resolution order at construction is fixed: source URL, then username from
//! room id, then room id from username. After that the blacklist probe runs
//! once. Room ids rotate between broadcasts, so automatic mode re-resolves the
//! room id from the username before each poll via `refresh_room_id`.

use std::sync::Arc;

use livewatch_common::config::AppConfig;
use livewatch_common::error::{HttpError, ResolveError};
use livewatch_common::types::{
    BlacklistStatus, Identity, IdentitySeed, LiveStatus, Mode, RoomIdLookup, StatusClass, StatusCode,
    Timeouts,
};

use crate::http::HttpClient;
use crate::patterns::{
    self, ENDED_MARKER, PRIVATE_ACCOUNT_MARKER, ROOM_ID_MARKER, ROOM_INFO_MARKER,
};
use crate::retry::RetryPolicy;

/// Base URLs of the three platform endpoints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub www_base: String,
    pub webcast_base: String,
}

impl Endpoints {
    pub fn new(www_base: impl Into<String>, webcast_base: impl Into<String>) -> Self {
        Self {
            www_base: www_base.into().trim_end_matches('/').to_string(),
            webcast_base: webcast_base.into().trim_end_matches('/').to_string(),
        }
    }

    /// Public live page for a user.
    pub fn profile_live(&self, username: &str) -> String {
        format!("{}/@{}/live", self.www_base, username)
    }

    /// Live detail API, carries the room status and owner.
    pub fn live_detail(&self, room_id: &str) -> String {
        format!("{}/api/live/detail/?aid=1988&roomID={}", self.www_base, room_id)
    }

    /// Room info API, carries the stream pull URLs.
    pub fn room_info(&self, room_id: &str) -> String {
        format!(
            "{}/webcast/room/info/?aid=1988&room_id={}",
            self.webcast_base, room_id
        )
    }
}

impl Default for Endpoints {
    fn default() -> Self {
        Self::new("https://www.tiktok.com", "https://webcast.tiktok.com")
    }
}

/// Everything a resolver needs besides the client, mode and seed.
#[derive(Debug, Clone, Default)]
pub struct ResolverSettings {
    pub endpoints: Endpoints,
    pub timeouts: Timeouts,
    /// Applied when a profile page carries the room id marker but cannot be parsed.
    pub retry: RetryPolicy,
}

impl ResolverSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        let timeouts = Timeouts::from_minutes(
            config.automatic_mode_timeout_minutes,
            config.connection_closed_timeout_minutes,
        );
        Self {
            endpoints: Endpoints::new(&config.www_base_url, &config.webcast_base_url),
            timeouts,
            retry: RetryPolicy {
                max_attempts: config.room_id_retry_attempts,
                ..RetryPolicy::default()
            },
        }
    }
}

pub struct LiveResolver {
    client: Arc<dyn HttpClient>,
    mode: Mode,
    settings: ResolverSettings,
    username: String,
    room_id: Option<String>,
    blacklisted: bool,
}

impl LiveResolver {
    /// Resolve the full identity from `seed` and probe the blacklist.
    ///
    /// Fails with `AutomaticModeUnsupported` for a blacklisted user in
    /// automatic mode; no further requests are made in that case.
    pub async fn new(
        client: Arc<dyn HttpClient>,
        mode: Mode,
        seed: IdentitySeed,
        settings: ResolverSettings,
    ) -> Result<Self, ResolveError> {
        let mut resolver = Self {
            client,
            mode,
            settings,
            username: String::new(),
            room_id: None,
            blacklisted: false,
        };

        let IdentitySeed {
            source_url,
            mut username,
            mut room_id,
        } = seed;

        if let Some(url) = source_url {
            let (user, lookup) = resolver.resolve_from_url(&url).await?;
            username = Some(user);
            room_id = match lookup {
                RoomIdLookup::Resolved(id) => Some(id),
                RoomIdLookup::Unresolved => None,
            };
        }

        let username = match (username, room_id.as_deref()) {
            (Some(user), _) => user,
            (None, Some(id)) => resolver.resolve_username_from_room_id(id).await?,
            (None, None) => return Err(ResolveError::EmptyIdentity),
        };

        if room_id.is_none() {
            room_id = match resolver.resolve_room_id_from_username(&username).await? {
                RoomIdLookup::Resolved(id) => Some(id),
                RoomIdLookup::Unresolved => None,
            };
        }

        tracing::info!(username = %username, room_id = ?room_id, mode = %mode, "Identity resolved");

        resolver.blacklisted = resolver.check_blacklist(&username).await.is_blacklisted();
        resolver.username = username;
        resolver.room_id = room_id;

        if mode == Mode::Automatic && resolver.blacklisted {
            return Err(ResolveError::AutomaticModeUnsupported);
        }

        Ok(resolver)
    }

    /// Replace the HTTP client used from now on.
    pub fn with_client(mut self, client: Arc<dyn HttpClient>) -> Self {
        self.client = client;
        self
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn room_id(&self) -> Option<&str> {
        self.room_id.as_deref()
    }

    /// Both halves of the identity, once a room id is known.
    pub fn identity(&self) -> Option<Identity> {
        self.room_id.as_ref().map(|room_id| Identity {
            username: self.username.clone(),
            room_id: room_id.clone(),
        })
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn is_blacklisted(&self) -> bool {
        self.blacklisted
    }

    pub fn timeouts(&self) -> Timeouts {
        self.settings.timeouts
    }

    /// Resolve username and room id from a live page URL.
    ///
    /// A mobile share link answers with `MOVED`; its body only names the user,
    /// so the room id is looked up separately.
    pub async fn resolve_from_url(
        &self,
        url: &str,
    ) -> Result<(String, RoomIdLookup), ResolveError> {
        let response = match self.client.get(url, false).await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(url, error = %e, "Live page request failed");
                return Err(ResolveError::Blacklisted);
            }
        };

        match response.status_class() {
            StatusClass::Redirect => Err(ResolveError::Blacklisted),
            StatusClass::Moved => {
                let username = patterns::extract_username(&response.body)
                    .ok_or(ResolveError::LiveNotFound)?
                    .to_string();
                let lookup = self.resolve_room_id_from_username(&username).await?;
                Ok((username, lookup))
            }
            _ => {
                let username = patterns::extract_username(&response.body).ok_or_else(|| {
                    ResolveError::Unexpected(format!("no username in live page {url}"))
                })?;
                let room_id = patterns::extract_room_id(&response.body).ok_or_else(|| {
                    ResolveError::Unexpected(format!("no room id in live page {url}"))
                })?;
                Ok((
                    username.to_string(),
                    RoomIdLookup::Resolved(room_id.to_string()),
                ))
            }
        }
    }

    /// Look up the current room id of `username` from their live page.
    ///
    /// A page without any room id marker means the user has no live room: an
    /// error in manual mode, `Unresolved` after a pause in automatic mode. A
    /// page that has the marker but cannot be parsed is retried with backoff.
    pub async fn resolve_room_id_from_username(
        &self,
        username: &str,
    ) -> Result<RoomIdLookup, ResolveError> {
        let url = self.settings.endpoints.profile_live(username);
        let retry = self.settings.retry;
        let mut attempt = 0;

        loop {
            let response = self.client.get(&url, false).await?;

            if response.status == StatusCode::REDIRECT {
                return Err(ResolveError::Blacklisted);
            }

            if !response.body.contains(ROOM_ID_MARKER) {
                return match self.mode {
                    Mode::Manual => Err(ResolveError::UserNotFound),
                    Mode::Automatic => {
                        let pause = self.settings.timeouts.connection_closed;
                        tracing::warn!(
                            username,
                            retry_in_secs = pause.as_secs(),
                            "Unable to find room id, user has no live room right now"
                        );
                        tokio::time::sleep(pause).await;
                        Ok(RoomIdLookup::Unresolved)
                    }
                };
            }

            if let Some(room_id) = patterns::extract_room_id(&response.body) {
                return Ok(RoomIdLookup::Resolved(room_id.to_string()));
            }

            if !retry.should_retry(attempt) {
                return Err(ResolveError::Unexpected(format!(
                    "live page for @{username} has a room id marker that could not be parsed after {attempt} retries"
                )));
            }

            let delay = retry.delay_for_attempt(attempt);
            tracing::warn!(
                username,
                attempt = attempt + 1,
                delay_ms = delay.as_millis() as u64,
                "Malformed live page, retrying"
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }

    /// Look up the owner of `room_id`. Only used at startup; every failure is fatal.
    pub async fn resolve_username_from_room_id(
        &self,
        room_id: &str,
    ) -> Result<String, ResolveError> {
        let url = self.settings.endpoints.live_detail(room_id);
        let response = self.client.get(&url, true).await?;

        if !response.body.contains(ROOM_INFO_MARKER) {
            return Err(ResolveError::UsernameResolution);
        }

        patterns::extract_unique_id(&response.body)
            .map(str::to_string)
            .ok_or_else(|| ResolveError::Unexpected(format!("no owner in room {room_id}")))
    }

    /// Re-resolve the room id from the username.
    ///
    /// `Unresolved` clears the stored room id; errors leave it untouched.
    pub async fn refresh_room_id(&mut self) -> Result<RoomIdLookup, ResolveError> {
        let username = self.username.clone();
        let lookup = self.resolve_room_id_from_username(&username).await?;

        match &lookup {
            RoomIdLookup::Resolved(id) => {
                if self.room_id.as_deref() != Some(id.as_str()) {
                    tracing::debug!(username = %username, room_id = %id, "Room id changed");
                }
                self.room_id = Some(id.clone());
            }
            RoomIdLookup::Unresolved => self.room_id = None,
        }

        Ok(lookup)
    }

    /// Check whether the current room is broadcasting.
    ///
    /// Failures never propagate: a dropped connection reads as `Offline`
    /// (after a pause in automatic mode), a non-2xx answer or any other
    /// failure as `CheckFailed`.
    pub async fn check_live_status(&self) -> LiveStatus {
        let Some(room_id) = self.room_id.as_deref() else {
            return LiveStatus::Offline;
        };

        let url = self.settings.endpoints.live_detail(room_id);
        match self.client.get(&url, true).await {
            Ok(response) if response.status_class() != StatusClass::Ok => {
                tracing::error!(
                    room_id,
                    status = response.status,
                    "Live status check got an error response"
                );
                LiveStatus::CheckFailed
            }
            Ok(response) if response.body.contains(ENDED_MARKER) => LiveStatus::Offline,
            Ok(_) => LiveStatus::Live,
            Err(HttpError::ConnectionAborted(reason)) => {
                match self.mode {
                    Mode::Manual => {
                        tracing::error!(%reason, "Connection closed while checking live status");
                    }
                    Mode::Automatic => {
                        let pause = self.settings.timeouts.connection_closed;
                        tracing::error!(
                            %reason,
                            retry_in_secs = pause.as_secs(),
                            "Connection closed while checking live status, waiting before retry"
                        );
                        tokio::time::sleep(pause).await;
                    }
                }
                LiveStatus::Offline
            }
            Err(e) => {
                tracing::error!(room_id, error = %e, "Live status check failed");
                LiveStatus::CheckFailed
            }
        }
    }

    /// Probe whether the user's live page redirects to a login wall.
    pub async fn check_blacklist(&self, username: &str) -> BlacklistStatus {
        let url = self.settings.endpoints.profile_live(username);
        match self.client.get(&url, false).await {
            Ok(response) if response.status == StatusCode::REDIRECT => {
                BlacklistStatus::Blacklisted
            }
            Ok(_) => BlacklistStatus::Clear,
            Err(e) => {
                tracing::error!(username, error = %e, "Blacklist check failed");
                BlacklistStatus::Unknown
            }
        }
    }

    /// Stream pull URL of the current broadcast, for the external recorder.
    ///
    /// `AccountPrivate` is the only error returned; other failures are logged
    /// and yield `Ok(None)`.
    pub async fn live_source_url(&self) -> Result<Option<String>, ResolveError> {
        let Some(room_id) = self.room_id.as_deref() else {
            tracing::warn!(username = %self.username, "No room id, cannot look up live source");
            return Ok(None);
        };

        let url = self.settings.endpoints.room_info(room_id);
        let response = match self.client.get(&url, true).await {
            Ok(response) => response,
            Err(e) => {
                tracing::error!(room_id, error = %e, "Room info request failed");
                return Ok(None);
            }
        };

        if response.body.contains(PRIVATE_ACCOUNT_MARKER) {
            return Err(ResolveError::AccountPrivate);
        }

        let source = serde_json::from_str::<serde_json::Value>(&response.body)
            .map_err(|e| e.to_string())
            .and_then(|json| {
                json.pointer("/data/stream_url/rtmp_pull_url")
                    .and_then(|v| v.as_str())
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .ok_or_else(|| "missing data.stream_url.rtmp_pull_url".to_string())
            });

        match source {
            Ok(source) => {
                tracing::info!(room_id, live_url = %source, "Live source resolved");
                Ok(Some(source))
            }
            Err(reason) => {
                tracing::error!(room_id, %reason, "Unable to read live source from room info");
                Ok(None)
            }
        }
    }
}
