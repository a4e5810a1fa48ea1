//! Fixed-window request rate limiter
//!
//! Counters live in process memory, sharded across several maps to reduce lock
//! contention. Each key gets a window that starts on its first request; once
//! the window has passed, the next request starts a fresh one with count 1.
//! This is neither sliding nor distributed: every process keeps its own
//! counters.

use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

const DEFAULT_SHARDS: usize = 16;

/// Budget applied to one key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    pub max_requests: u32,
    pub window: Duration,
}

impl RateLimitConfig {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            max_requests,
            window,
        }
    }
}

/// Outcome of a single check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    /// Instant at which the current window ends
    pub reset_at: Instant,
    /// Time left in the current window, measured from the check
    pub reset_in: Duration,
}

impl RateLimitDecision {
    /// Whole seconds until the window resets, never less than one.
    pub fn retry_after_secs(&self) -> u64 {
        let secs = self.reset_in.as_secs();
        if self.reset_in.subsec_nanos() > 0 {
            secs + 1
        } else {
            secs.max(1)
        }
    }
}

#[derive(Debug, Clone)]
struct RateLimitRecord {
    count: u32,
    reset_at: Instant,
}

/// Sharded fixed-window rate limiter
///
/// Owned state: construct one per server (or per test) and share it through
/// an `Arc`.
pub struct FixedWindowRateLimiter {
    shards: Vec<Mutex<HashMap<String, RateLimitRecord>>>,
}

impl Default for FixedWindowRateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

impl FixedWindowRateLimiter {
    pub fn new() -> Self {
        Self::with_shards(DEFAULT_SHARDS)
    }

    pub fn with_shards(shard_count: usize) -> Self {
        let shard_count = shard_count.max(1);
        Self {
            shards: (0..shard_count)
                .map(|_| Mutex::new(HashMap::new()))
                .collect(),
        }
    }

    fn shard_for(&self, key: &str) -> &Mutex<HashMap<String, RateLimitRecord>> {
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        key.hash(&mut hasher);
        let index = (hasher.finish() as usize) % self.shards.len();
        &self.shards[index]
    }

    /// Count one request against `key`.
    pub async fn check(&self, key: &str, config: &RateLimitConfig) -> RateLimitDecision {
        self.check_at(key, config, Instant::now()).await
    }

    /// Same as [`check`](Self::check) with an explicit clock.
    pub async fn check_at(
        &self,
        key: &str,
        config: &RateLimitConfig,
        now: Instant,
    ) -> RateLimitDecision {
        let mut records = self.shard_for(key).lock().await;

        let record = match records.get_mut(key) {
            Some(record) if now <= record.reset_at => {
                record.count = record.count.saturating_add(1);
                record.clone()
            }
            _ => {
                let record = RateLimitRecord {
                    count: 1,
                    reset_at: now + config.window,
                };
                records.insert(key.to_string(), record.clone());
                record
            }
        };

        let allowed = record.count <= config.max_requests;
        let decision = RateLimitDecision {
            allowed,
            limit: config.max_requests,
            remaining: config.max_requests.saturating_sub(record.count),
            reset_at: record.reset_at,
            reset_in: record.reset_at.saturating_duration_since(now),
        };

        if !allowed {
            tracing::warn!(
                key = %key,
                count = record.count,
                limit = config.max_requests,
                reset_in_ms = decision.reset_in.as_millis() as u64,
                "Rate limit exceeded"
            );
        }

        decision
    }

    /// Drop every record whose window has already ended. Returns how many were removed.
    pub async fn sweep(&self) -> usize {
        self.sweep_at(Instant::now()).await
    }

    pub async fn sweep_at(&self, now: Instant) -> usize {
        let mut removed = 0;
        for shard in &self.shards {
            let mut records = shard.lock().await;
            let before = records.len();
            records.retain(|_, record| now <= record.reset_at);
            removed += before - records.len();
        }

        if removed > 0 {
            tracing::debug!(records_removed = removed, "Swept expired rate limit records");
        }
        removed
    }

    /// Number of live records across all shards.
    pub async fn len(&self) -> usize {
        let mut total = 0;
        for shard in &self.shards {
            total += shard.lock().await.len();
        }
        total
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Run [`sweep`](Self::sweep) every `interval` until the task is aborted.
    pub fn spawn_sweeper(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let limiter = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // First tick completes immediately.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                limiter.sweep().await;
            }
        })
    }
}
