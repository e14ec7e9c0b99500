//! Group membership discovery.
//!
//! Joins a group idempotently and walks its membership in fixed-size pages,
//! pausing between pages and resuming from the same offset after a
//! platform-imposed wait. Activity filtering happens here, once, as each
//! page is consumed; callers receive ready-to-use recipients.

use std::time::Duration;

use chrono::Utc;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    domain::{GroupRef, Recipient, UserId},
    errors::Error,
    platform::{GroupHandle, Member, PlatformConnection, PlatformError},
    Result,
};

/// Membership page size requested from the platform.
const PAGE_SIZE: usize = 200;
/// Proactive pause between pages to stay clear of flood control.
const PAGE_COOLDOWN: Duration = Duration::from_secs(1);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JoinOutcome {
    Joined,
    AlreadyMember,
}

/// A fetched roster. `complete` is false when pagination stopped early
/// (missing admin privileges or cancellation) and the recipient list is a
/// prefix of the real membership.
#[derive(Clone, Debug)]
pub struct Roster {
    pub recipients: Vec<Recipient>,
    pub complete: bool,
}

/// Fetches rosters over a borrowed authorized connection.
pub struct RosterFetcher<'a> {
    conn: &'a dyn PlatformConnection,
}

impl<'a> RosterFetcher<'a> {
    pub fn new(conn: &'a dyn PlatformConnection) -> Self {
        Self { conn }
    }

    /// Join `group`. Already being a member is success, not an error.
    pub async fn join(&self, group: &GroupRef) -> Result<JoinOutcome> {
        let handle = self.resolve(group).await?;
        match self.conn.join_group(&handle).await {
            Ok(()) => {
                info!(group = %group, "joined group");
                Ok(JoinOutcome::Joined)
            }
            Err(PlatformError::AlreadyParticipant) => {
                debug!(group = %group, "already a member");
                Ok(JoinOutcome::AlreadyMember)
            }
            Err(PlatformError::PrivateGroup) => Err(Error::PrivateGroup {
                group: group.clone(),
            }),
            Err(source) => Err(Error::Roster {
                group: group.clone(),
                source,
            }),
        }
    }

    /// Page through the membership of `group`, filtering as pages arrive.
    ///
    /// Stops when a page comes back empty (complete), when the platform
    /// demands admin privileges (partial), or when `cancel` fires
    /// (partial). A rate-limit signal pauses for exactly the
    /// platform-supplied duration and resumes from the same offset.
    pub async fn fetch_members(
        &self,
        group: &GroupRef,
        filter_inactive: bool,
        min_activity_epoch: Option<i64>,
        cancel: &CancellationToken,
    ) -> Result<Roster> {
        let handle = self.resolve(group).await?;

        let mut recipients = Vec::new();
        let mut offset = 0usize;

        loop {
            if cancel.is_cancelled() {
                return Ok(Roster {
                    recipients,
                    complete: false,
                });
            }

            match self.conn.participants(&handle, offset, PAGE_SIZE).await {
                Ok(page) => {
                    if page.is_empty() {
                        info!(group = %group, count = recipients.len(), "roster complete");
                        return Ok(Roster {
                            recipients,
                            complete: true,
                        });
                    }

                    offset += page.len();
                    for member in page {
                        if excluded(&member, filter_inactive, min_activity_epoch) {
                            continue;
                        }
                        recipients.push(into_recipient(member));
                    }

                    if !pause(PAGE_COOLDOWN, cancel).await {
                        return Ok(Roster {
                            recipients,
                            complete: false,
                        });
                    }
                }
                Err(PlatformError::RateLimited { wait }) => {
                    warn!(
                        group = %group,
                        wait_s = wait.as_secs(),
                        offset,
                        "rate limited while paging, will resume at same offset"
                    );
                    if !pause(wait, cancel).await {
                        return Ok(Roster {
                            recipients,
                            complete: false,
                        });
                    }
                }
                Err(PlatformError::AdminRequired) => {
                    warn!(group = %group, "admin privileges required, returning partial roster");
                    return Ok(Roster {
                        recipients,
                        complete: false,
                    });
                }
                Err(source) => {
                    return Err(Error::Roster {
                        group: group.clone(),
                        source,
                    })
                }
            }
        }
    }

    /// Join `group` and fetch its roster in one step.
    pub async fn join_and_fetch(
        &self,
        group: &GroupRef,
        filter_inactive: bool,
        min_activity_epoch: Option<i64>,
        cancel: &CancellationToken,
    ) -> Result<Roster> {
        self.join(group).await?;
        self.fetch_members(group, filter_inactive, min_activity_epoch, cancel)
            .await
    }

    async fn resolve(&self, group: &GroupRef) -> Result<GroupHandle> {
        match self.conn.resolve_group(group).await {
            Ok(handle) => Ok(handle),
            Err(PlatformError::PrivateGroup) => Err(Error::PrivateGroup {
                group: group.clone(),
            }),
            Err(source) => Err(Error::Roster {
                group: group.clone(),
                source,
            }),
        }
    }
}

/// Sleep unless cancelled first; returns false on cancellation.
async fn pause(duration: Duration, cancel: &CancellationToken) -> bool {
    tokio::select! {
        _ = cancel.cancelled() => false,
        _ = sleep(duration) => true,
    }
}

fn excluded(member: &Member, filter_inactive: bool, min_activity_epoch: Option<i64>) -> bool {
    if !filter_inactive {
        return false;
    }
    match member.last_seen {
        // No presence data at all counts as inactive.
        None => true,
        Some(seen) => min_activity_epoch.is_some_and(|cutoff| seen < cutoff),
    }
}

fn into_recipient(member: Member) -> Recipient {
    Recipient {
        id: UserId(member.id),
        username: member.username,
        first_name: member.first_name,
        last_name: member.last_name,
        bot: member.bot,
        verified: member.verified,
        last_seen: member.last_seen,
        retrieved_at: Utc::now(),
    }
}
