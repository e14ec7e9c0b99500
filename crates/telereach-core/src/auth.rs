//! Account authentication state machine.
//!
//! Drives phone-based login for one account: restore a persisted session
//! when possible, otherwise request a verification code, submit it (with a
//! bounded retry loop), optionally complete a second factor, and persist
//! the resulting session token. Verification codes and 2FA passwords come
//! from caller-supplied sources so the machine stays independent of any
//! particular front end.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::{
    domain::AccountId,
    errors::Error,
    platform::{PlatformConnection, PlatformConnector, PlatformError},
    sessions::SessionStore,
    Result,
};

/// Maximum verification-code submissions per login attempt.
const MAX_CODE_ATTEMPTS: u32 = 3;

/// Login progress for one account.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    Unauthenticated,
    CodeRequested,
    CodeVerified,
    PasswordRequired,
    Authorized,
}

/// Bookkeeping for one platform identity.
#[derive(Clone, Debug)]
pub struct Account {
    pub id: AccountId,
    pub phone: Option<String>,
    pub state: ConnectionState,
    pub last_authorized: Option<DateTime<Utc>>,
}

impl Account {
    fn new(id: AccountId, phone: Option<String>) -> Self {
        Self {
            id,
            phone,
            state: ConnectionState::Unauthenticated,
            last_authorized: None,
        }
    }

    fn advance(&mut self, next: ConnectionState) {
        debug!(account = %self.id, from = ?self.state, to = ?next, "auth state");
        self.state = next;
    }
}

/// Supplies verification codes on demand (typically an interactive front
/// end). Asked once per sign-in attempt, keyed by account so a UI can
/// route the prompt to the right operator.
#[async_trait]
pub trait CodeSource: Send + Sync {
    async fn verification_code(&self, account: &AccountId) -> String;
}

/// Supplies the second-factor password when the platform demands one.
#[async_trait]
pub trait PasswordSource: Send + Sync {
    async fn password(&self) -> String;
}

/// A live, authorized connection and the account it belongs to.
///
/// Owns the underlying connection; roster fetching and delivery borrow it
/// through [`AuthorizedConnection::connection`].
pub struct AuthorizedConnection {
    account: Account,
    restored: bool,
    conn: Box<dyn PlatformConnection>,
}

impl std::fmt::Debug for AuthorizedConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthorizedConnection")
            .field("account", &self.account)
            .field("restored", &self.restored)
            .finish_non_exhaustive()
    }
}

impl AuthorizedConnection {
    pub fn account(&self) -> &Account {
        &self.account
    }

    /// Whether this connection came from a persisted session rather than a
    /// fresh code exchange.
    pub fn restored(&self) -> bool {
        self.restored
    }

    pub fn connection(&self) -> &dyn PlatformConnection {
        self.conn.as_ref()
    }

    pub async fn is_healthy(&self) -> bool {
        self.conn.is_connected() && self.conn.is_authorized().await.unwrap_or(false)
    }

    pub async fn disconnect(&self) {
        self.conn.disconnect().await;
    }
}

/// Runs the login state machine against a platform connector and the
/// session store. One instance serves any number of accounts; each
/// `authenticate` call is an independent flow.
pub struct Authenticator {
    connector: Arc<dyn PlatformConnector>,
    store: Arc<SessionStore>,
}

impl Authenticator {
    pub fn new(connector: Arc<dyn PlatformConnector>, store: Arc<SessionStore>) -> Self {
        Self { connector, store }
    }

    /// Authenticate `account`, restoring a stored session when one is
    /// accepted by the platform and falling back to a fresh phone/code
    /// login otherwise.
    ///
    /// A fresh login requires `phone` and `code_source`; `password_source`
    /// is only consulted if the platform demands a second factor. The
    /// session token is persisted exactly once per successful fresh login
    /// and never on restore.
    pub async fn authenticate(
        &self,
        account_id: &AccountId,
        phone: Option<&str>,
        code_source: Option<&dyn CodeSource>,
        password_source: Option<&dyn PasswordSource>,
    ) -> Result<AuthorizedConnection> {
        if let Some(conn) = self.try_restore(account_id).await {
            return Ok(conn);
        }

        // Preconditions for a fresh login. Without a code source there is
        // no way to complete it at all, which is a caller bug rather than
        // a missing input.
        let Some(code_source) = code_source else {
            return Err(Error::MissingCodeSource {
                account: account_id.clone(),
            });
        };
        let Some(phone) = phone else {
            return Err(Error::MissingPhone {
                account: account_id.clone(),
            });
        };

        self.fresh_login(account_id, phone, code_source, password_source)
            .await
    }

    /// Restore path: any failure here is recoverable and falls through to
    /// a fresh login. A token the platform explicitly rejected is deleted;
    /// it will never be accepted again.
    async fn try_restore(&self, account_id: &AccountId) -> Option<AuthorizedConnection> {
        let stored = self.store.load(account_id)?;

        let conn = match self.connector.connect(Some(&stored.session)).await {
            Ok(conn) => conn,
            Err(e) => {
                warn!(account = %account_id, error = %e, "failed to restore session");
                return None;
            }
        };

        match conn.is_authorized().await {
            Ok(true) => {
                info!(account = %account_id, "restored from saved session");
                let mut account = Account::new(account_id.clone(), Some(stored.phone));
                account.advance(ConnectionState::Authorized);
                account.last_authorized = Some(Utc::now());
                Some(AuthorizedConnection {
                    account,
                    restored: true,
                    conn,
                })
            }
            Ok(false) => {
                warn!(account = %account_id, "stored session rejected by platform, discarding");
                conn.disconnect().await;
                if let Err(e) = self.store.delete(account_id) {
                    warn!(account = %account_id, error = %e, "failed to discard rejected session");
                }
                None
            }
            Err(e) => {
                warn!(account = %account_id, error = %e, "failed to restore session");
                conn.disconnect().await;
                None
            }
        }
    }

    async fn fresh_login(
        &self,
        account_id: &AccountId,
        phone: &str,
        code_source: &dyn CodeSource,
        password_source: Option<&dyn PasswordSource>,
    ) -> Result<AuthorizedConnection> {
        let mut account = Account::new(account_id.clone(), Some(phone.to_string()));

        let conn = self.connector.connect(None).await.map_err(|e| Error::Auth {
            account: account_id.clone(),
            reason: e.to_string(),
        })?;

        if let Err(e) = conn.request_code(phone).await {
            conn.disconnect().await;
            return Err(match e {
                PlatformError::InvalidPhone => Error::InvalidPhone {
                    account: account_id.clone(),
                },
                // Surface the platform's wait verbatim; whether to sit it
                // out is the caller's call, not this layer's.
                PlatformError::RateLimited { wait } => Error::RateLimited {
                    account: account_id.clone(),
                    wait,
                },
                other => Error::Auth {
                    account: account_id.clone(),
                    reason: other.to_string(),
                },
            });
        }
        account.advance(ConnectionState::CodeRequested);

        let mut attempt = 0u32;
        loop {
            attempt += 1;

            let code = code_source.verification_code(account_id).await;
            if code.trim().is_empty() {
                conn.disconnect().await;
                return Err(Error::EmptyCode {
                    account: account_id.clone(),
                });
            }

            match conn.sign_in_with_code(phone, &code).await {
                Ok(()) => {
                    account.advance(ConnectionState::CodeVerified);
                    return self.finish_fresh(account, conn, phone).await;
                }
                Err(PlatformError::InvalidCode) => {
                    if attempt >= MAX_CODE_ATTEMPTS {
                        conn.disconnect().await;
                        return Err(Error::CodeRejected {
                            account: account_id.clone(),
                            attempts: attempt,
                        });
                    }
                    warn!(account = %account_id, attempt, "verification code rejected");
                }
                Err(PlatformError::CodeExpired) => {
                    conn.disconnect().await;
                    return Err(Error::CodeExpired {
                        account: account_id.clone(),
                    });
                }
                Err(PlatformError::PasswordNeeded) => {
                    account.advance(ConnectionState::PasswordRequired);
                    let Some(password_source) = password_source else {
                        conn.disconnect().await;
                        return Err(Error::TwoFactorUnavailable {
                            account: account_id.clone(),
                        });
                    };

                    // Single attempt for the second factor.
                    let password = password_source.password().await;
                    return match conn.sign_in_with_password(&password).await {
                        Ok(()) => self.finish_fresh(account, conn, phone).await,
                        Err(e) => {
                            conn.disconnect().await;
                            Err(Error::TwoFactorRejected {
                                account: account_id.clone(),
                                reason: e.to_string(),
                            })
                        }
                    };
                }
                Err(other) => {
                    conn.disconnect().await;
                    return Err(Error::Auth {
                        account: account_id.clone(),
                        reason: other.to_string(),
                    });
                }
            }
        }
    }

    /// Persist the session token, then hand the authorized connection to
    /// the caller. Runs once per successful fresh login.
    async fn finish_fresh(
        &self,
        mut account: Account,
        conn: Box<dyn PlatformConnection>,
        phone: &str,
    ) -> Result<AuthorizedConnection> {
        if let Err(e) = self.store.save(&account.id, &conn.export_session(), phone) {
            conn.disconnect().await;
            return Err(e);
        }

        account.advance(ConnectionState::Authorized);
        account.last_authorized = Some(Utc::now());
        info!(account = %account.id, "authenticated with fresh login");

        Ok(AuthorizedConnection {
            account,
            restored: false,
            conn,
        })
    }
}
