//! Per-host request throttling
//!
//! The fetcher consults a [`RateLimiter`] before every request attempt. The
//! limiter reserves a send slot and returns how long the caller must wait
//! for it.

use crate::url::extract_domain;
use std::collections::HashMap;
use std::fmt;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use url::Url;

/// Decides when a request may be sent
pub trait RateLimiter: Send + Sync + fmt::Debug {
    /// Reserves a slot for a request to `url` and returns the wait before sending
    fn reserve(&self, url: &Url) -> Duration;
}

/// Never delays
#[derive(Debug, Default, Clone, Copy)]
pub struct Unlimited;

impl RateLimiter for Unlimited {
    fn reserve(&self, _url: &Url) -> Duration {
        Duration::ZERO
    }
}

/// Enforces a minimum interval between requests to the same host
///
/// Slots are handed out in reservation order, so concurrent workers hitting
/// one host are spread `interval` apart while other hosts are unaffected.
#[derive(Debug)]
pub struct HostIntervalLimiter {
    interval: Duration,
    next_slot: Mutex<HashMap<String, Instant>>,
}

impl HostIntervalLimiter {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            next_slot: Mutex::new(HashMap::new()),
        }
    }

    fn reserve_at(&self, host: String, now: Instant) -> Duration {
        let mut slots = self
            .next_slot
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let slot = slots.get(&host).copied().filter(|s| *s > now).unwrap_or(now);
        slots.insert(host, slot + self.interval);
        slot.saturating_duration_since(now)
    }
}

impl RateLimiter for HostIntervalLimiter {
    fn reserve(&self, url: &Url) -> Duration {
        match extract_domain(url) {
            Some(host) => self.reserve_at(host, Instant::now()),
            None => Duration::ZERO,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unlimited() {
        let url = Url::parse("https://example.com/").unwrap();
        assert_eq!(Unlimited.reserve(&url), Duration::ZERO);
        assert_eq!(Unlimited.reserve(&url), Duration::ZERO);
    }

    #[test]
    fn test_same_host_is_spaced() {
        let limiter = HostIntervalLimiter::new(Duration::from_millis(100));
        let now = Instant::now();

        assert_eq!(limiter.reserve_at("example.com".into(), now), Duration::ZERO);
        assert_eq!(
            limiter.reserve_at("example.com".into(), now),
            Duration::from_millis(100)
        );
        assert_eq!(
            limiter.reserve_at("example.com".into(), now),
            Duration::from_millis(200)
        );
    }

    #[test]
    fn test_hosts_are_independent() {
        let limiter = HostIntervalLimiter::new(Duration::from_millis(100));
        let now = Instant::now();

        limiter.reserve_at("a.com".into(), now);
        assert_eq!(limiter.reserve_at("b.com".into(), now), Duration::ZERO);
    }

    #[test]
    fn test_slot_frees_after_interval() {
        let limiter = HostIntervalLimiter::new(Duration::from_millis(100));
        let now = Instant::now();

        limiter.reserve_at("example.com".into(), now);
        let later = now + Duration::from_millis(150);
        assert_eq!(
            limiter.reserve_at("example.com".into(), later),
            Duration::ZERO
        );
    }
}
