//! Per-account message delivery queue.
//!
//! Holds pending per-recipient jobs and delivers them one at a time,
//! highest priority first (enqueue order breaks ties). A random pause
//! between messages is the primary defense against flood detection;
//! platform rate-limit signals are honored verbatim. Failed jobs are
//! retried up to a bound and always surface a terminal outcome -- nothing
//! is dropped silently.

use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::Rng;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    config::DeliveryConfig,
    domain::UserId,
    platform::{PlatformConnection, PlatformError},
};

/// Pause after a generic delivery failure before the next attempt.
const RETRY_BACKOFF: Duration = Duration::from_secs(1);

#[derive(Clone, Debug)]
struct DeliveryJob {
    recipient: UserId,
    message: String,
    priority: i32,
    retries: u32,
    enqueued_at: DateTime<Utc>,
    /// Enqueue order; retries keep their original sequence so an old job
    /// is never starved by newer arrivals.
    seq: u64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DeliveryStatus {
    Delivered,
    /// Retry bound exhausted; carries the last failure for reporting.
    Exhausted { reason: String },
}

/// Terminal result for one job.
#[derive(Clone, Debug)]
pub struct DeliveryOutcome {
    pub recipient: UserId,
    pub status: DeliveryStatus,
    pub attempts: u32,
}

/// Point-in-time snapshot; the queue may mutate between query and use.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct QueueStatus {
    pub queue_length: usize,
    pub high_priority: usize,
    pub retrying: usize,
}

/// Delivery queue for one account connection. Never shared across
/// accounts, so one account's backoff cannot stall another's deliveries.
pub struct DeliveryQueue {
    cfg: DeliveryConfig,
    jobs: Vec<DeliveryJob>,
    next_seq: u64,
}

impl DeliveryQueue {
    pub fn new(cfg: DeliveryConfig) -> Self {
        Self {
            cfg,
            jobs: Vec::new(),
            next_seq: 0,
        }
    }

    /// O(1) append; ordering is resolved at drain time.
    pub fn enqueue(&mut self, recipient: UserId, message: impl Into<String>, priority: i32) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.jobs.push(DeliveryJob {
            recipient,
            message: message.into(),
            priority,
            retries: 0,
            enqueued_at: Utc::now(),
            seq,
        });
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn status(&self) -> QueueStatus {
        QueueStatus {
            queue_length: self.jobs.len(),
            high_priority: self.jobs.iter().filter(|j| j.priority > 1).count(),
            retrying: self.jobs.iter().filter(|j| j.retries > 0).count(),
        }
    }

    /// Drop every pending job without reporting outcomes (operator reset).
    pub fn clear(&mut self) {
        let dropped = self.jobs.len();
        self.jobs.clear();
        info!(dropped, "delivery queue cleared");
    }

    /// Deliver jobs until the queue is empty or `cancel` fires.
    ///
    /// Every job ends in a terminal outcome after at most
    /// `max_retries + 1` attempts. On cancellation, unattempted jobs stay
    /// enqueued and a job caught mid-delivery is accounted as a failed
    /// attempt, so a later `drain` call resumes cleanly.
    pub async fn drain(
        &mut self,
        conn: &dyn PlatformConnection,
        cancel: &CancellationToken,
    ) -> Vec<DeliveryOutcome> {
        let mut outcomes = Vec::new();

        while let Some(mut job) = self.take_next() {
            if cancel.is_cancelled() {
                // Not attempted: put it back untouched.
                self.jobs.push(job);
                break;
            }

            debug!(
                recipient = %job.recipient,
                priority = job.priority,
                attempt = job.retries + 1,
                enqueued_at = %job.enqueued_at,
                "delivering"
            );

            let attempt = tokio::select! {
                _ = cancel.cancelled() => None,
                result = conn.send_message(job.recipient, &job.message) => Some(result),
            };

            match attempt {
                // The send was in flight with an unknown outcome; count it
                // as a failed attempt rather than losing the job.
                None => {
                    self.settle_failure(job, "cancelled mid-delivery", &mut outcomes);
                    break;
                }
                Some(Ok(())) => {
                    info!(recipient = %job.recipient, "message delivered");
                    outcomes.push(DeliveryOutcome {
                        recipient: job.recipient,
                        status: DeliveryStatus::Delivered,
                        attempts: job.retries + 1,
                    });
                    if !self.jobs.is_empty() && !pause(self.random_delay(), cancel).await {
                        break;
                    }
                }
                Some(Err(PlatformError::RateLimited { wait })) => {
                    warn!(
                        recipient = %job.recipient,
                        wait_s = wait.as_secs(),
                        "rate limited, honoring platform wait"
                    );
                    let reason = format!("rate limited for {}s", wait.as_secs());
                    self.settle_failure(job, &reason, &mut outcomes);
                    if !pause(wait, cancel).await {
                        break;
                    }
                }
                Some(Err(e)) => {
                    warn!(recipient = %job.recipient, error = %e, "delivery failed");
                    self.settle_failure(job, &e.to_string(), &mut outcomes);
                    if !pause(RETRY_BACKOFF, cancel).await {
                        break;
                    }
                }
            }
        }

        outcomes
    }

    /// Requeue a failed job for another attempt, or report it exhausted
    /// once the retry bound is spent.
    fn settle_failure(
        &mut self,
        mut job: DeliveryJob,
        reason: &str,
        outcomes: &mut Vec<DeliveryOutcome>,
    ) {
        if job.retries < self.cfg.max_retries {
            job.retries += 1;
            self.jobs.push(job);
        } else {
            outcomes.push(DeliveryOutcome {
                recipient: job.recipient,
                status: DeliveryStatus::Exhausted {
                    reason: reason.to_string(),
                },
                attempts: job.retries + 1,
            });
        }
    }

    /// Highest priority wins; equal priorities go in enqueue order.
    fn take_next(&mut self) -> Option<DeliveryJob> {
        let idx = self
            .jobs
            .iter()
            .enumerate()
            .max_by_key(|(_, j)| (j.priority, std::cmp::Reverse(j.seq)))
            .map(|(i, _)| i)?;
        Some(self.jobs.remove(idx))
    }

    fn random_delay(&self) -> Duration {
        let min = self.cfg.min_delay.as_secs();
        let max = self.cfg.max_delay.as_secs();
        if max <= min {
            return self.cfg.min_delay;
        }
        Duration::from_secs(rand::thread_rng().gen_range(min..=max))
    }
}

/// Sleep unless cancelled first; returns false on cancellation.
async fn pause(duration: Duration, cancel: &CancellationToken) -> bool {
    tokio::select! {
        _ = cancel.cancelled() => false,
        _ = sleep(duration) => true,
    }
}
