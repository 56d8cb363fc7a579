use thiserror::Error;

/// Transport-level failures reported by an `HttpClient`.
#[derive(Debug, Clone, Error)]
pub enum HttpError {
    /// The peer dropped or reset the connection mid-request.
    #[error("Connection aborted: {0}")]
    ConnectionAborted(String),

    #[error("Request failed: {0}")]
    Request(String),

    #[error("Failed to read response body: {0}")]
    Body(String),
}

/// Errors raised while resolving a user's identity or live source.
///
/// Most variants are expected outcomes the caller may report and handle.
/// `Unexpected` and `UsernameResolution` mean identity resolution broke in a
/// way the watcher is not built to survive; the process logs them and exits.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("Profile redirected to a login wall; this account or region is blacklisted")]
    Blacklisted,

    #[error("Live page not found for the given URL")]
    LiveNotFound,

    #[error("User not found or has no live room configured")]
    UserNotFound,

    #[error("Unable to resolve a username from the room id")]
    UsernameResolution,

    #[error("Account is private, login required")]
    AccountPrivate,

    #[error("Automatic mode is not available for blacklisted accounts, use manual mode")]
    AutomaticModeUnsupported,

    #[error("No source URL, username or room id was provided")]
    EmptyIdentity,

    #[error("Unexpected error: {0}")]
    Unexpected(String),
}

impl ResolveError {
    /// Whether this error should terminate the whole process.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ResolveError::Unexpected(_) | ResolveError::UsernameResolution
        )
    }
}

impl From<HttpError> for ResolveError {
    fn from(err: HttpError) -> Self {
        ResolveError::Unexpected(err.to_string())
    }
}

/// Errors raised while delivering a notification.
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Email API returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Contact export failed: {0}")]
    ExportFailed(String),

    #[error("Contact export did not become ready in time")]
    ExportTimedOut,

    #[error("Malformed API response: {0}")]
    Decode(String),
}
