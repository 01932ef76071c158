//! Sliding-window request limiter, one counter per client IP.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

use axum::extract::{ConnectInfo, Request, State};
use axum::middleware::Next;
use axum::response::Response;

use crate::AppState;
use crate::error::{Result, ServerError};

const FORWARDED_FOR: &str = "x-forwarded-for";

/// Sliding window counter for each IP.
#[derive(Debug, Default)]
pub struct RateLimiter {
    counters: HashMap<String, Vec<Instant>>,
    window: Duration,
    max_requests: u64,
}

impl RateLimiter {
    pub fn new(window_secs: u64, max_requests: u64) -> Self {
        RateLimiter {
            counters: HashMap::new(),
            window: Duration::from_secs(window_secs),
            max_requests,
        }
    }

    /// Record a hit for `ip` and report whether it stays within the
    /// window budget.
    pub fn check_rate(&mut self, ip: &str) -> bool {
        let now = Instant::now();

        if let Some(counter) = self.counters.get_mut(ip) {
            counter.retain(|&timestamp| {
                now.duration_since(timestamp) < self.window
            });
        }

        if let Some(counter) = self.counters.get(ip) {
            if counter.len() as u64 >= self.max_requests {
                return false;
            }
        }

        self.counters.entry(ip.to_string()).or_default().push(now);

        true
    }
}

/// Middleware enforcing the per-IP budget on a route subtree.
pub async fn limit(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response> {
    let ip = client_ip(&req);

    let allowed = {
        let mut limiter = state.limiter.lock().unwrap();
        limiter.check_rate(&ip)
    };

    if allowed {
        Ok(next.run(req).await)
    } else {
        tracing::debug!(%ip, "rate limit exceeded");
        Err(ServerError::RateLimited)
    }
}

/// Proxy-provided address first, socket address as fallback.
fn client_ip(req: &Request) -> String {
    req.headers()
        .get(FORWARDED_FOR)
        .and_then(|header| header.to_str().ok())
        .and_then(|forwarded| forwarded.split(',').next())
        .map(|ip| ip.trim().to_owned())
        .or_else(|| {
            req.extensions()
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.ip().to_string())
        })
        .unwrap_or_else(|| "unknown".to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stays_within_budget() {
        let mut limiter = RateLimiter::new(60, 3);

        assert!(limiter.check_rate("203.0.113.9"));
        assert!(limiter.check_rate("203.0.113.9"));
        assert!(limiter.check_rate("203.0.113.9"));
        assert!(!limiter.check_rate("203.0.113.9"));
    }

    #[test]
    fn budgets_are_per_ip() {
        let mut limiter = RateLimiter::new(60, 1);

        assert!(limiter.check_rate("203.0.113.9"));
        assert!(!limiter.check_rate("203.0.113.9"));
        assert!(limiter.check_rate("203.0.113.10"));
    }

    #[test]
    fn window_expiry_readmits() {
        let mut limiter = RateLimiter::new(0, 1);

        assert!(limiter.check_rate("203.0.113.9"));
        // Zero-length window: the previous hit is already outside it.
        assert!(limiter.check_rate("203.0.113.9"));
    }
}
