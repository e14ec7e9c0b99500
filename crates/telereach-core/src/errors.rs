use std::time::Duration;

use crate::{
    domain::{AccountId, GroupRef},
    platform::types::PlatformError,
};

/// Core error type.
///
/// Every terminal failure carries the account/group context needed to act on
/// it without re-running with extra logging. Adapter crates map their own
/// failures into [`PlatformError`] at the port boundary; anything that
/// escapes a component unhandled surfaces here.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("crypto error: {0}")]
    Crypto(String),

    // === Authentication ===
    /// Fresh login was attempted without a phone number.
    #[error("account {account}: phone number is required for a fresh login")]
    MissingPhone { account: AccountId },

    /// Caller-contract violation: no way to obtain a verification code.
    #[error("account {account}: phone number and code source are required for authentication")]
    MissingCodeSource { account: AccountId },

    /// The code source answered with an empty code.
    #[error("account {account}: no verification code provided")]
    EmptyCode { account: AccountId },

    #[error("account {account}: the phone number is invalid")]
    InvalidPhone { account: AccountId },

    /// The verification code was rejected on every allowed attempt.
    #[error("account {account}: invalid code provided {attempts} times")]
    CodeRejected { account: AccountId, attempts: u32 },

    #[error("account {account}: verification code has expired")]
    CodeExpired { account: AccountId },

    /// 2FA is enabled on the account but no password source was configured.
    #[error("account {account}: two-factor authentication is enabled but no password source provided")]
    TwoFactorUnavailable { account: AccountId },

    #[error("account {account}: failed to sign in with 2FA password: {reason}")]
    TwoFactorRejected { account: AccountId, reason: String },

    /// Platform-imposed wait, surfaced verbatim; the caller decides whether
    /// to wait it out or move on to another account.
    #[error("account {account}: rate limited, wait {}s before retrying", wait.as_secs())]
    RateLimited { account: AccountId, wait: Duration },

    /// Catch-all for unhandled platform failures during login.
    #[error("account {account}: authentication failed: {reason}")]
    Auth { account: AccountId, reason: String },

    // === Roster ===
    #[error("group {group} is private or inaccessible")]
    PrivateGroup { group: GroupRef },

    #[error("group {group}: {source}")]
    Roster {
        group: GroupRef,
        source: PlatformError,
    },

    #[error(transparent)]
    Platform(#[from] PlatformError),
}

impl Error {
    /// Whether a retry of the same operation could plausibly succeed.
    ///
    /// Transient errors are platform-imposed waits and network blips;
    /// everything else is either a caller bug or a terminal platform answer.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::RateLimited { .. } => true,
            Self::Platform(e) => e.is_transient(),
            Self::Roster { source, .. } => source.is_transient(),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
