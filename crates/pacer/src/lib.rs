//! Per-host rate limiting (§4.5): enforces a minimum delay between requests
//! issued to the same host, process-wide, without blocking workers bound
//! for different hosts.

use std::time::Duration;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::time::Instant;
use url::Url;

/// Process-wide map from host to the monotonic instant of its last request.
/// Guarded per-entry by `DashMap`'s internal sharding — no single lock is
/// held across the sleep.
pub struct HostPacer {
    last_seen: DashMap<String, Instant>,
    delay: Duration,
}

impl HostPacer {
    pub fn new(delay: Duration) -> Self {
        Self {
            last_seen: DashMap::new(),
            delay,
        }
    }

    /// Blocks the caller until at least `delay` has elapsed since the last
    /// request to `url`'s host, then records this request as the new last
    /// visit. Two workers racing for the same host serialize here; workers
    /// for different hosts never contend.
    pub async fn wait(&self, url: &Url) {
        let Some(host) = url.host_str() else {
            return;
        };
        loop {
            let now = Instant::now();
            let wait_for = match self.last_seen.entry(host.to_string()) {
                Entry::Vacant(slot) => {
                    slot.insert(now);
                    None
                }
                Entry::Occupied(mut slot) => {
                    let remaining = self.delay.checked_sub(now.duration_since(*slot.get()));
                    if remaining.is_none() {
                        slot.insert(now);
                    }
                    remaining
                }
            };

            match wait_for {
                None => return,
                Some(wait_for) => tokio::time::sleep(wait_for).await,
            }
        }
    }
}
