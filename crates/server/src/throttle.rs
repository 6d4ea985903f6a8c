//! Per-client request throttle, applied before the auth guard.
//!
//! Each client address gets its own token bucket. Requests without a known peer
//! address (no `ConnectInfo`) share one bucket.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::{ConnectInfo, Request, State};
use axum::middleware::Next;
use axum::response::Response;
use dashmap::DashMap;
use tracing::{debug, warn};

use crate::errors::ApiError;

/// Idle buckets are swept every this many checks.
const SWEEP_EVERY: u64 = 1024;

#[derive(Debug)]
pub struct TokenBucket {
    capacity: f64,
    tokens: f64,
    refill_per_sec: f64,
    last_refill: Instant,
}

impl TokenBucket {
    pub fn new(capacity: u64, refill_per_sec: f64) -> Self {
        Self {
            capacity: capacity as f64,
            tokens: capacity as f64,
            refill_per_sec,
            last_refill: Instant::now(),
        }
    }

    pub fn try_acquire(&mut self) -> bool {
        self.refill();

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            debug!(remaining = self.tokens, "throttle token acquired");
            true
        } else {
            false
        }
    }

    fn refill(&mut self) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.refill_per_sec).min(self.capacity);
        self.last_refill = now;
    }

    fn idle_for(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_refill)
    }
}

#[derive(Clone)]
pub struct RateLimiter {
    buckets: Arc<DashMap<IpAddr, TokenBucket>>,
    checks: Arc<AtomicU64>,
    limit: u64,
    window: Duration,
    enabled: bool,
}

impl RateLimiter {
    /// `limit` requests per `window_secs` per client, with bursts up to `limit`.
    pub fn new(limit: u64, window_secs: u64, enabled: bool) -> Self {
        Self {
            buckets: Arc::new(DashMap::new()),
            checks: Arc::new(AtomicU64::new(0)),
            limit,
            window: Duration::from_secs(window_secs),
            enabled,
        }
    }

    pub fn from_config(cfg: &configs::ThrottleConfig) -> Self {
        Self::new(cfg.limit, cfg.window_secs, cfg.enabled)
    }

    pub fn disabled() -> Self {
        Self::new(1, 1, false)
    }

    fn refill_per_sec(&self) -> f64 {
        if self.window.is_zero() {
            0.0
        } else {
            self.limit as f64 / self.window.as_secs_f64()
        }
    }

    pub fn check_rate_limit(&self, client: IpAddr) -> bool {
        if !self.enabled {
            return true;
        }
        if self.checks.fetch_add(1, Ordering::Relaxed) % SWEEP_EVERY == SWEEP_EVERY - 1 {
            self.sweep_idle();
        }

        let admitted = self
            .buckets
            .entry(client)
            .or_insert_with(|| TokenBucket::new(self.limit, self.refill_per_sec()))
            .try_acquire();
        if !admitted {
            warn!(%client, "rate limit exceeded");
        }
        admitted
    }

    /// Drop buckets untouched for a full window. Such a bucket has refilled completely,
    /// so a fresh one behaves the same.
    pub fn sweep_idle(&self) {
        let now = Instant::now();
        let before = self.buckets.len();
        self.buckets.retain(|_, bucket| bucket.idle_for(now) < self.window);
        let removed = before.saturating_sub(self.buckets.len());
        if removed > 0 {
            debug!(removed, "evicted idle throttle buckets");
        }
    }

    pub fn tracked_clients(&self) -> usize {
        self.buckets.len()
    }
}

fn client_ip(req: &Request) -> IpAddr {
    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip())
        .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED))
}

/// Middleware: reject with 429 once the caller's bucket is empty.
pub async fn limit(State(limiter): State<RateLimiter>, req: Request, next: Next) -> Result<Response, ApiError> {
    if !limiter.check_rate_limit(client_ip(&req)) {
        crate::metrics::record("throttle", "rejected");
        return Err(ApiError::Throttled);
    }
    Ok(next.run(req).await)
}
