use crate::types::Mode;

/// Default browser user agent; the platform serves stripped pages to unknown clients.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

/// Global application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Manual or automatic watching
    pub mode: Mode,

    /// Live page URL to start from (desktop or mobile share link)
    pub source_url: Option<String>,

    /// Username to watch, with or without the leading `@`
    pub username: Option<String>,

    /// Room id to start from
    pub room_id: Option<String>,

    /// Base URL for profile pages and the live detail API
    pub www_base_url: String,

    /// Base URL for the webcast room info API
    pub webcast_base_url: String,

    /// Proxy used while resolving the identity (polling always goes direct)
    pub proxy_url: Option<String>,

    /// Per-request timeout in seconds
    pub http_timeout_secs: u64,

    /// User agent sent on every platform request
    pub user_agent: String,

    /// Minutes to wait between automatic-mode polls
    pub automatic_mode_timeout_minutes: u64,

    /// Minutes to wait after a dropped connection or missing room id
    pub connection_closed_timeout_minutes: u64,

    /// Bound on retries when a profile page is malformed
    pub room_id_retry_attempts: u32,

    /// Minimum minutes between two live notifications
    pub notify_cooldown_minutes: u64,

    /// SendGrid API key; notifications are only logged when unset
    pub sendgrid_api_key: Option<String>,

    /// SendGrid API base URL
    pub sendgrid_base_url: String,

    /// Sender address for live notifications
    pub notify_from_email: Option<String>,

    /// Dynamic template used for the notification email
    pub notify_template_id: Option<String>,

    /// Marketing contact list the notification is sent to
    pub notify_list_id: Option<String>,
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            mode: std::env::var("LIVEWATCH_MODE")
                .unwrap_or_else(|_| "automatic".to_string())
                .parse()
                .map_err(|e| anyhow::anyhow!("LIVEWATCH_MODE: {e}"))?,
            source_url: std::env::var("LIVEWATCH_URL").ok(),
            username: std::env::var("LIVEWATCH_USERNAME").ok(),
            room_id: std::env::var("LIVEWATCH_ROOM_ID").ok(),
            www_base_url: std::env::var("LIVEWATCH_WWW_BASE_URL")
                .unwrap_or_else(|_| "https://www.tiktok.com".to_string()),
            webcast_base_url: std::env::var("LIVEWATCH_WEBCAST_BASE_URL")
                .unwrap_or_else(|_| "https://webcast.tiktok.com".to_string()),
            proxy_url: std::env::var("LIVEWATCH_PROXY_URL").ok(),
            http_timeout_secs: std::env::var("HTTP_TIMEOUT_SECS")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("HTTP_TIMEOUT_SECS must be a valid u64"))?,
            user_agent: std::env::var("HTTP_USER_AGENT")
                .unwrap_or_else(|_| DEFAULT_USER_AGENT.to_string()),
            automatic_mode_timeout_minutes: std::env::var("AUTOMATIC_MODE_TIMEOUT_MINUTES")
                .unwrap_or_else(|_| "5".to_string())
                .parse()
                .map_err(|_| {
                    anyhow::anyhow!("AUTOMATIC_MODE_TIMEOUT_MINUTES must be a valid u64")
                })?,
            connection_closed_timeout_minutes: std::env::var("CONNECTION_CLOSED_TIMEOUT_MINUTES")
                .unwrap_or_else(|_| "2".to_string())
                .parse()
                .map_err(|_| {
                    anyhow::anyhow!("CONNECTION_CLOSED_TIMEOUT_MINUTES must be a valid u64")
                })?,
            room_id_retry_attempts: std::env::var("ROOM_ID_RETRY_ATTEMPTS")
                .unwrap_or_else(|_| "5".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("ROOM_ID_RETRY_ATTEMPTS must be a valid u32"))?,
            notify_cooldown_minutes: std::env::var("NOTIFY_COOLDOWN_MINUTES")
                .unwrap_or_else(|_| "60".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("NOTIFY_COOLDOWN_MINUTES must be a valid u64"))?,
            sendgrid_api_key: std::env::var("SENDGRID_API_KEY").ok(),
            sendgrid_base_url: std::env::var("SENDGRID_BASE_URL")
                .unwrap_or_else(|_| "https://api.sendgrid.com".to_string()),
            notify_from_email: std::env::var("NOTIFY_FROM_EMAIL").ok(),
            notify_template_id: std::env::var("NOTIFY_TEMPLATE_ID").ok(),
            notify_list_id: std::env::var("NOTIFY_LIST_ID").ok(),
        };

        config.validate()?;
        Ok(config)
    }

    /// Check cross-field requirements.
    pub fn validate(&self) -> anyhow::Result<()> {
        let present = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.trim().is_empty());

        if !present(&self.source_url) && !present(&self.username) && !present(&self.room_id) {
            anyhow::bail!("one of LIVEWATCH_URL, LIVEWATCH_USERNAME or LIVEWATCH_ROOM_ID is required");
        }

        // chrono's TimeDelta holds at most i64::MAX milliseconds
        const MAX_COOLDOWN_MINUTES: u64 = i64::MAX as u64 / 60_000;
        if self.notify_cooldown_minutes > MAX_COOLDOWN_MINUTES {
            anyhow::bail!("NOTIFY_COOLDOWN_MINUTES must be at most {MAX_COOLDOWN_MINUTES}");
        }

        if present(&self.sendgrid_api_key) {
            for (name, value) in [
                ("NOTIFY_FROM_EMAIL", &self.notify_from_email),
                ("NOTIFY_TEMPLATE_ID", &self.notify_template_id),
                ("NOTIFY_LIST_ID", &self.notify_list_id),
            ] {
                if !present(value) {
                    anyhow::bail!("{name} is required when SENDGRID_API_KEY is set");
                }
            }
        }

        Ok(())
    }
}
