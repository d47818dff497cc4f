use std::{
    collections::HashMap,
    time::{Duration, Instant},
};

// ============== Administrator ==============

/// The single administrator identity may broadcast to every registered user.
pub fn is_admin(username: &str, admin: Option<&str>) -> bool {
    match admin {
        Some(admin) => !admin.is_empty() && admin == username,
        None => false,
    }
}

// ============== Rate Limiter (Token Bucket) ==============

/// Bucket count above which idle buckets are dropped before a new one is added.
const PRUNE_THRESHOLD: usize = 1024;

#[derive(Clone, Debug)]
struct Bucket {
    tokens: f64,
    last_update: Instant,
}

/// Per-user token bucket for user-initiated broadcasts.
#[derive(Clone, Debug)]
pub struct RateLimiter {
    enabled: bool,
    max_tokens: f64,
    refill_per_sec: f64,
    buckets: HashMap<String, Bucket>,
}

impl RateLimiter {
    pub fn new(enabled: bool, max_tokens: u32, window: Duration) -> Self {
        let max_tokens_f = max_tokens as f64;
        let window_secs = window.as_secs_f64().max(1e-9);

        Self {
            enabled,
            max_tokens: max_tokens_f,
            refill_per_sec: max_tokens_f / window_secs,
            buckets: HashMap::new(),
        }
    }

    pub fn check(&mut self, username: &str) -> (bool, Option<Duration>) {
        self.check_at(username, Instant::now())
    }

    pub fn check_at(&mut self, username: &str, now: Instant) -> (bool, Option<Duration>) {
        if !self.enabled {
            return (true, None);
        }

        if self.buckets.len() >= PRUNE_THRESHOLD && !self.buckets.contains_key(username) {
            self.prune_full(now);
        }

        let max_tokens = self.max_tokens;
        let bucket = self
            .buckets
            .entry(username.to_string())
            .or_insert_with(|| Bucket {
                tokens: max_tokens,
                last_update: now,
            });

        let elapsed = now.duration_since(bucket.last_update).as_secs_f64();
        bucket.tokens = (bucket.tokens + elapsed * self.refill_per_sec).min(self.max_tokens);
        bucket.last_update = now;

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            return (true, None);
        }

        if self.refill_per_sec <= 0.0 {
            return (false, None);
        }
        let secs = (1.0 - bucket.tokens) / self.refill_per_sec;
        (false, Some(Duration::from_secs_f64(secs.max(0.0))))
    }

    /// Drop buckets that have refilled completely; a fresh bucket starts full anyway.
    fn prune_full(&mut self, now: Instant) {
        let (max_tokens, refill) = (self.max_tokens, self.refill_per_sec);
        self.buckets.retain(|_, b| {
            let elapsed = now.saturating_duration_since(b.last_update).as_secs_f64();
            b.tokens + elapsed * refill < max_tokens
        });
    }
}
