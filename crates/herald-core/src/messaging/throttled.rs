use std::{collections::HashMap, sync::Arc, time::Duration};

use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};

use crate::{
    messaging::{
        port::Notifier,
        types::{InlineResult, KeyboardOption},
    },
    Result,
};

/// Per-recipient limiter count above which idle limiters are dropped.
const PRUNE_THRESHOLD: usize = 1024;

#[derive(Clone, Copy, Debug)]
pub struct ThrottleConfig {
    /// Minimum spacing between *any* outbound calls (global flood control).
    pub global_min_interval: Duration,
    /// Minimum spacing between calls to the same recipient.
    pub per_recipient_min_interval: Duration,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            global_min_interval: Duration::from_millis(34), // ~30/sec
            per_recipient_min_interval: Duration::from_millis(1000),
        }
    }
}

#[derive(Debug)]
struct IntervalLimiter {
    interval: Duration,
    next: Instant,
}

impl IntervalLimiter {
    fn new(interval: Duration) -> Self {
        Self {
            interval,
            next: Instant::now(),
        }
    }

    /// Reserve the next slot and return the wait duration required before executing.
    fn reserve(&mut self) -> Duration {
        let now = Instant::now();
        let start = if now >= self.next { now } else { self.next };
        self.next = start + self.interval;
        start.saturating_duration_since(now)
    }
}

type LimiterMap = HashMap<String, Arc<Mutex<IntervalLimiter>>>;

/// Drop limiters nobody is using whose next slot has already passed. A fresh
/// limiter would hand out the same slot.
fn prune_idle(map: &mut LimiterMap, now: Instant) {
    map.retain(|_, lim| {
        if Arc::strong_count(lim) > 1 {
            return true;
        }
        match lim.try_lock() {
            Ok(guard) => guard.next > now,
            Err(_) => true,
        }
    });
}

/// Notifier decorator that spaces out outbound calls.
///
/// Broadcast fan-out can hit the transport with hundreds of sends at once;
/// this keeps us under the global and per-chat flood limits. It reduces 429s,
/// it does not rule them out.
pub struct ThrottledNotifier {
    inner: Arc<dyn Notifier>,
    cfg: ThrottleConfig,
    global: Mutex<IntervalLimiter>,
    per_recipient: Mutex<LimiterMap>,
}

impl ThrottledNotifier {
    pub fn new(inner: Arc<dyn Notifier>, cfg: ThrottleConfig) -> Self {
        Self {
            inner,
            cfg,
            global: Mutex::new(IntervalLimiter::new(cfg.global_min_interval)),
            per_recipient: Mutex::new(HashMap::new()),
        }
    }

    async fn limiter_for(&self, recipient: &str) -> Arc<Mutex<IntervalLimiter>> {
        let mut map = self.per_recipient.lock().await;
        if map.len() >= PRUNE_THRESHOLD && !map.contains_key(recipient) {
            prune_idle(&mut map, Instant::now());
        }
        map.entry(recipient.to_string())
            .or_insert_with(|| {
                Arc::new(Mutex::new(IntervalLimiter::new(
                    self.cfg.per_recipient_min_interval,
                )))
            })
            .clone()
    }

    async fn throttle_recipient(&self, recipient: &str) {
        let global_wait = { self.global.lock().await.reserve() };
        let recipient_wait = {
            let lim = self.limiter_for(recipient).await;
            let mut guard = lim.lock().await;
            guard.reserve()
        };

        let wait = global_wait.max(recipient_wait);
        if !wait.is_zero() {
            sleep(wait).await;
        }
    }

    async fn throttle_global(&self) {
        let wait = { self.global.lock().await.reserve() };
        if !wait.is_zero() {
            sleep(wait).await;
        }
    }
}

#[async_trait::async_trait]
impl Notifier for ThrottledNotifier {
    async fn send_text(&self, recipient: &str, text: &str) -> Result<()> {
        self.throttle_recipient(recipient).await;
        self.inner.send_text(recipient, text).await
    }

    async fn send_photo(
        &self,
        recipient: &str,
        file_ref: &str,
        caption: Option<&str>,
    ) -> Result<()> {
        self.throttle_recipient(recipient).await;
        self.inner.send_photo(recipient, file_ref, caption).await
    }

    async fn send_document(&self, recipient: &str, file_ref: &str) -> Result<()> {
        self.throttle_recipient(recipient).await;
        self.inner.send_document(recipient, file_ref).await
    }

    async fn send_sticker(&self, recipient: &str, file_ref: &str) -> Result<()> {
        self.throttle_recipient(recipient).await;
        self.inner.send_sticker(recipient, file_ref).await
    }

    async fn send_keyboard(
        &self,
        recipient: &str,
        prompt: &str,
        options: Vec<KeyboardOption>,
    ) -> Result<()> {
        self.throttle_recipient(recipient).await;
        self.inner.send_keyboard(recipient, prompt, options).await
    }

    async fn answer_inline_query(
        &self,
        query_id: &str,
        results: Vec<InlineResult>,
    ) -> Result<()> {
        // Inline answers are not addressed to a chat.
        self.throttle_global().await;
        self.inner.answer_inline_query(query_id, results).await
    }

    async fn answer_callback(&self, callback_id: &str, text: Option<&str>) -> Result<()> {
        self.throttle_global().await;
        self.inner.answer_callback(callback_id, text).await
    }
}
