//! Rate limiting.
//!
//! # Responsibilities
//! - Gate requests per key (client IP, optionally `ip:path`) against one of
//!   three interchangeable algorithms
//! - Evict idle buckets so long-running processes don't accumulate memory
//!   for clients that stopped sending traffic
//!
//! # Design Decisions
//! - One shared contract (`allow`, `retry_after`, `info`) regardless of
//!   algorithm; the algorithm is chosen once from config and dispatched by
//!   `match`, mirroring the load-balancer's enum dispatch
//! - Per-key state lives behind a `Mutex`, since each key's state machine
//!   (token refill, window housekeeping) must be read-then-written
//!   atomically as a unit
//! - A background sweep task removes buckets untouched for longer than
//!   their own window, bounding memory under a churning client population

use crate::config::schema::{RateLimiterConfig, RateLimiterStrategy};
use dashmap::DashMap;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy)]
pub struct RateLimitInfo {
    pub limit: u32,
    pub remaining: u32,
    pub reset_seconds: u64,
}

#[derive(Debug)]
enum StrategyState {
    TokenBucket { tokens: f64, last_refill: Instant },
    SlidingWindow { hits: VecDeque<Instant> },
    FixedWindow { window_start: Instant, count: u32 },
}

impl StrategyState {
    fn new(strategy: RateLimiterStrategy, burst: u32) -> Self {
        match strategy {
            RateLimiterStrategy::TokenBucket => StrategyState::TokenBucket {
                tokens: burst as f64,
                last_refill: Instant::now(),
            },
            RateLimiterStrategy::SlidingWindow => StrategyState::SlidingWindow {
                hits: VecDeque::new(),
            },
            RateLimiterStrategy::FixedWindow => StrategyState::FixedWindow {
                window_start: Instant::now(),
                count: 0,
            },
        }
    }
}

#[derive(Debug)]
struct Bucket {
    state: StrategyState,
    last_access: Instant,
}

#[derive(Debug, Default)]
pub struct RateLimiter {
    buckets: DashMap<String, Mutex<Bucket>>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if the request at `key` is allowed to proceed, mutating
    /// the bucket's internal state as a side effect.
    pub fn allow(&self, key: &str, config: &RateLimiterConfig) -> bool {
        if !config.enabled {
            return true;
        }
        let entry = self
            .buckets
            .entry(key.to_string())
            .or_insert_with(|| {
                Mutex::new(Bucket {
                    state: StrategyState::new(config.strategy, config.burst_size),
                    last_access: Instant::now(),
                })
            });
        let mut bucket = entry.lock().unwrap();
        bucket.last_access = Instant::now();

        match &mut bucket.state {
            StrategyState::TokenBucket { tokens, last_refill } => {
                let now = Instant::now();
                let elapsed = now.duration_since(*last_refill).as_secs_f64();
                *tokens = (*tokens + elapsed * config.requests_per_second as f64)
                    .min(config.burst_size as f64);
                *last_refill = now;
                if *tokens >= 1.0 {
                    *tokens -= 1.0;
                    true
                } else {
                    false
                }
            }
            StrategyState::SlidingWindow { hits } => {
                let now = Instant::now();
                let window = Duration::from_secs(1);
                while hits.front().is_some_and(|t| now.duration_since(*t) > window) {
                    hits.pop_front();
                }
                if hits.len() < config.requests_per_second as usize {
                    hits.push_back(now);
                    true
                } else {
                    false
                }
            }
            StrategyState::FixedWindow { window_start, count } => {
                let now = Instant::now();
                if now.duration_since(*window_start) >= Duration::from_secs(1) {
                    *window_start = now;
                    *count = 0;
                }
                if *count < config.requests_per_second {
                    *count += 1;
                    true
                } else {
                    false
                }
            }
        }
    }

    /// How long the caller should wait before retrying `key`. Best-effort:
    /// derived from the same state `allow` just updated.
    pub fn retry_after(&self, key: &str, config: &RateLimiterConfig) -> Duration {
        let Some(entry) = self.buckets.get(key) else {
            return Duration::ZERO;
        };
        let bucket = entry.lock().unwrap();
        match &bucket.state {
            StrategyState::TokenBucket { tokens, .. } => {
                let deficit = (1.0 - tokens).max(0.0);
                Duration::from_secs_f64(deficit / config.requests_per_second.max(1) as f64)
            }
            StrategyState::SlidingWindow { hits } => hits
                .front()
                .map(|oldest| Duration::from_secs(1).saturating_sub(oldest.elapsed()))
                .unwrap_or(Duration::ZERO),
            StrategyState::FixedWindow { window_start, .. } => {
                Duration::from_secs(1).saturating_sub(window_start.elapsed())
            }
        }
    }

    pub fn info(&self, key: &str, config: &RateLimiterConfig) -> Option<RateLimitInfo> {
        let entry = self.buckets.get(key)?;
        let bucket = entry.lock().unwrap();
        let (remaining, reset) = match &bucket.state {
            StrategyState::TokenBucket { tokens, .. } => {
                let remaining = tokens.floor().max(0.0) as u32;
                let deficit = (1.0 - tokens).max(0.0);
                let reset = Duration::from_secs_f64(deficit / config.requests_per_second.max(1) as f64);
                (remaining, reset)
            }
            StrategyState::SlidingWindow { hits } => {
                let remaining = config.requests_per_second.saturating_sub(hits.len() as u32);
                let reset = hits
                    .front()
                    .map(|oldest| Duration::from_secs(1).saturating_sub(oldest.elapsed()))
                    .unwrap_or(Duration::ZERO);
                (remaining, reset)
            }
            StrategyState::FixedWindow { window_start, count } => {
                let remaining = config.requests_per_second.saturating_sub(*count);
                let reset = Duration::from_secs(1).saturating_sub(window_start.elapsed());
                (remaining, reset)
            }
        };
        Some(RateLimitInfo {
            limit: config.requests_per_second,
            remaining,
            reset_seconds: reset.as_secs_f64().ceil() as u64,
        })
    }

    /// Admin contract: `RateLimiter::reset`.
    pub fn reset(&self, key: &str) {
        self.buckets.remove(key);
    }

    fn evict_idle(&self, idle_after: Duration) {
        self.buckets
            .retain(|_, bucket| bucket.lock().unwrap().last_access.elapsed() < idle_after);
    }
}

/// Background task that periodically drops buckets nobody has touched in
/// `idle_after`, per spec: rate limiter memory must not grow unbounded.
pub fn spawn_sweeper(limiter: Arc<RateLimiter>, idle_after: Duration, interval: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            limiter.evict_idle(idle_after);
        }
    });
}

pub fn rate_limit_key(client_ip: &str, path: &str, per_path: bool) -> String {
    if per_path {
        format!("{client_ip}:{path}")
    } else {
        client_ip.to_string()
    }
}
