//! Waiting for cloud-attached interfaces to become visible in the kernel.
//!
//! Attachment is asynchronous: the node status may list an interface well
//! before the kernel has created its link. The waiter polls the link table
//! with exponential backoff until every pending MAC is present or the retry
//! budget is spent.

use crate::backoff::Backoff;
use crate::config::AttachConfig;
use crate::device::PendingSet;
use crate::error::EniError;
use crate::kernel::{Link, LinkOps};
use eni_types::MacAddress;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, warn};

/// Kernel links keyed by MAC.
pub type LinkMap = HashMap<MacAddress, Link>;

/// Default number of enumeration attempts.
pub const DEFAULT_MAX_TRIES: u32 = 15;
/// Default retry interval floor.
pub const DEFAULT_MIN_RETRY_INTERVAL: Duration = Duration::from_millis(100);
/// Default retry interval ceiling.
pub const DEFAULT_MAX_RETRY_INTERVAL: Duration = Duration::from_secs(30);
/// Default backoff multiplier.
pub const DEFAULT_BACKOFF_FACTOR: f64 = 2.0;

/// The retry budget ran out before every pending device appeared.
///
/// `found` holds the links matched by the last successful enumeration so the
/// caller can still configure them.
#[derive(Debug)]
pub struct WaitTimeout {
    pub found: LinkMap,
    pub attempts: u32,
}

impl WaitTimeout {
    /// Error describing the timeout, for logging.
    pub fn to_error(&self) -> EniError {
        EniError::AttachTimeout {
            attempts: self.attempts,
        }
    }
}

/// Polls the kernel link table for pending devices.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeviceWaiter {
    max_tries: u32,
    backoff: Backoff,
}

impl Default for DeviceWaiter {
    fn default() -> Self {
        Self::new(
            DEFAULT_MAX_TRIES,
            Backoff::new(
                DEFAULT_MIN_RETRY_INTERVAL,
                DEFAULT_MAX_RETRY_INTERVAL,
                DEFAULT_BACKOFF_FACTOR,
            ),
        )
    }
}

impl DeviceWaiter {
    pub fn new(max_tries: u32, backoff: Backoff) -> Self {
        Self { max_tries, backoff }
    }

    pub fn from_config(config: &AttachConfig) -> Self {
        Self::new(config.max_tries, config.backoff())
    }

    pub fn max_tries(&self) -> u32 {
        self.max_tries
    }

    /// Delay after failed attempt number `attempt` (0-based).
    pub fn retry_interval(&self, attempt: u32) -> Duration {
        self.backoff.duration(attempt)
    }

    /// Waits until every MAC in `pending` is visible as a kernel link.
    ///
    /// Returns as soon as all are found. A failed enumeration counts as an
    /// attempt that found nothing and keeps the result of the previous
    /// successful one.
    pub async fn wait_for_devices(
        &self,
        links: &dyn LinkOps,
        pending: &PendingSet,
    ) -> Result<LinkMap, WaitTimeout> {
        let mut found = LinkMap::new();

        for attempt in 0..self.max_tries {
            match links.list_links().await {
                Ok(all) => {
                    found = match_pending(all, pending);
                    if found.len() == pending.len() {
                        debug!(attempt, count = found.len(), "All ENI devices present");
                        return Ok(found);
                    }
                }
                Err(e) => {
                    warn!(error = %e, attempt, "Failed to obtain ENI link list, retrying");
                }
            }

            if attempt + 1 < self.max_tries {
                let delay = self.retry_interval(attempt);
                debug!(
                    attempt,
                    found = found.len(),
                    expected = pending.len(),
                    delay_ms = delay.as_millis() as u64,
                    "Waiting for ENI devices"
                );
                tokio::time::sleep(delay).await;
            }
        }

        Err(WaitTimeout {
            found,
            attempts: self.max_tries,
        })
    }
}

/// Keeps the links whose MAC is pending. When several links share a MAC
/// the first listed (lowest index) wins.
fn match_pending(all: Vec<Link>, pending: &PendingSet) -> LinkMap {
    let mut found = LinkMap::new();
    for link in all {
        if let Some(mac) = link.mac {
            if pending.contains_key(&mac) {
                found.entry(mac).or_insert(link);
            }
        }
    }
    found
}
