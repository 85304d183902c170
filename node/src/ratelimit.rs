//! Per-address request limiting for unauthenticated endpoints.

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Allows `limit` requests per address within a fixed window that starts at
/// the address's first request.
#[derive(Debug)]
pub struct RateLimiter {
    limit: u32,
    window: Duration,
    windows: Mutex<HashMap<IpAddr, (Instant, u32)>>,
}

impl RateLimiter {
    pub fn new(limit: u32, window: Duration) -> Self {
        Self {
            limit,
            window,
            windows: Mutex::new(HashMap::new()),
        }
    }

    /// `limit` requests per minute.
    pub fn per_minute(limit: u32) -> Self {
        Self::new(limit, Duration::from_secs(60))
    }

    /// Records a request from `addr`; false when it exceeds the limit.
    pub fn check(&self, addr: IpAddr) -> bool {
        self.check_at(addr, Instant::now())
    }

    pub fn check_at(&self, addr: IpAddr, now: Instant) -> bool {
        let mut windows = match self.windows.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        windows.retain(|_, (start, _)| now.duration_since(*start) < self.window);

        let (_, count) = windows.entry(addr).or_insert((now, 0));
        if *count >= self.limit {
            return false;
        }
        *count += 1;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limit_resets_after_window() {
        let limiter = RateLimiter::new(2, Duration::from_secs(60));
        let addr: IpAddr = "10.0.0.1".parse().unwrap();
        let other: IpAddr = "10.0.0.2".parse().unwrap();
        let t0 = Instant::now();

        assert!(limiter.check_at(addr, t0));
        assert!(limiter.check_at(addr, t0 + Duration::from_secs(1)));
        assert!(!limiter.check_at(addr, t0 + Duration::from_secs(2)));
        assert!(limiter.check_at(other, t0 + Duration::from_secs(2)));
        assert!(limiter.check_at(addr, t0 + Duration::from_secs(61)));
    }
}
