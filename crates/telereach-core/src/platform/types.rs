use std::time::Duration;

/// Failure taxonomy of the wire-protocol client.
///
/// Adapter crates translate their library's errors into these variants at
/// the port boundary so the core can branch on meaning, not on strings.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum PlatformError {
    #[error("the phone number is invalid")]
    InvalidPhone,

    #[error("the verification code is invalid")]
    InvalidCode,

    #[error("the verification code has expired")]
    CodeExpired,

    /// Sign-in with a code succeeded but the account requires a second
    /// factor before authorization completes.
    #[error("a two-factor password is required")]
    PasswordNeeded,

    #[error("the two-factor password is wrong")]
    WrongPassword,

    /// Platform flood control. `wait` is the mandatory pause the platform
    /// demands before it will accept further requests.
    #[error("rate limited, wait {}s", wait.as_secs())]
    RateLimited { wait: Duration },

    #[error("already a participant of the group")]
    AlreadyParticipant,

    #[error("the group is private or inaccessible")]
    PrivateGroup,

    #[error("admin privileges are required")]
    AdminRequired,

    #[error("network error: {0}")]
    Network(String),

    #[error("{0}")]
    Other(String),
}

impl PlatformError {
    /// Transient failures can be retried after a backoff; everything else
    /// is a definitive answer from the platform.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::RateLimited { .. } | Self::Network(_))
    }
}

pub type PlatformResult<T> = std::result::Result<T, PlatformError>;

/// Opaque handle to a resolved group entity.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GroupHandle {
    pub id: i64,
    pub title: Option<String>,
}

/// Raw member record as returned by the platform, before filtering.
#[derive(Clone, Debug)]
pub struct Member {
    pub id: i64,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub bot: bool,
    pub verified: bool,
    /// Unix seconds of the member's last recorded presence, when exposed.
    pub last_seen: Option<i64>,
}
