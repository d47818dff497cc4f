//! Hand-rolled fakes shared by the unit tests.

use std::{
    collections::HashSet,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use async_trait::async_trait;
use tokio::time::sleep;

use crate::{
    domain::{FieldUpdate, UserRecord},
    errors::Error,
    messaging::{
        port::Notifier,
        types::{InlineResult, KeyboardOption},
    },
    store::{Condition, ScanFilter, UserStore},
    Result,
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Sent {
    Text(String, String),
    Photo(String, String, Option<String>),
    Document(String, String),
    Sticker(String, String),
    Keyboard(String, String, Vec<KeyboardOption>),
    Inline(String, Vec<InlineResult>),
    Callback(String, Option<String>),
}

impl Sent {
    pub fn recipient(&self) -> Option<&str> {
        match self {
            Sent::Text(r, _)
            | Sent::Photo(r, _, _)
            | Sent::Document(r, _)
            | Sent::Sticker(r, _)
            | Sent::Keyboard(r, _, _) => Some(r.as_str()),
            Sent::Inline(..) | Sent::Callback(..) => None,
        }
    }
}

/// Records every call; recipients in `failing` get `Error::Delivery` instead.
#[derive(Default)]
pub struct FakeNotifier {
    sent: Mutex<Vec<Sent>>,
    failing: Mutex<HashSet<String>>,
}

impl FakeNotifier {
    pub fn failing_for(recipients: &[&str]) -> Self {
        let fake = Self::default();
        fake.failing
            .lock()
            .unwrap()
            .extend(recipients.iter().map(|s| s.to_string()));
        fake
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }

    pub fn texts_to(&self, recipient: &str) -> Vec<String> {
        self.sent()
            .into_iter()
            .filter_map(|s| match s {
                Sent::Text(r, t) if r == recipient => Some(t),
                _ => None,
            })
            .collect()
    }

    fn record(&self, recipient: Option<&str>, sent: Sent) -> Result<()> {
        if let Some(r) = recipient {
            if self.failing.lock().unwrap().contains(r) {
                return Err(Error::Delivery(format!("bot blocked by {r}")));
            }
        }
        self.sent.lock().unwrap().push(sent);
        Ok(())
    }
}

#[async_trait]
impl Notifier for FakeNotifier {
    async fn send_text(&self, recipient: &str, text: &str) -> Result<()> {
        self.record(
            Some(recipient),
            Sent::Text(recipient.to_string(), text.to_string()),
        )
    }

    async fn send_photo(
        &self,
        recipient: &str,
        file_ref: &str,
        caption: Option<&str>,
    ) -> Result<()> {
        self.record(
            Some(recipient),
            Sent::Photo(
                recipient.to_string(),
                file_ref.to_string(),
                caption.map(str::to_string),
            ),
        )
    }

    async fn send_document(&self, recipient: &str, file_ref: &str) -> Result<()> {
        self.record(
            Some(recipient),
            Sent::Document(recipient.to_string(), file_ref.to_string()),
        )
    }

    async fn send_sticker(&self, recipient: &str, file_ref: &str) -> Result<()> {
        self.record(
            Some(recipient),
            Sent::Sticker(recipient.to_string(), file_ref.to_string()),
        )
    }

    async fn send_keyboard(
        &self,
        recipient: &str,
        prompt: &str,
        options: Vec<KeyboardOption>,
    ) -> Result<()> {
        self.record(
            Some(recipient),
            Sent::Keyboard(recipient.to_string(), prompt.to_string(), options),
        )
    }

    async fn answer_inline_query(
        &self,
        query_id: &str,
        results: Vec<InlineResult>,
    ) -> Result<()> {
        self.record(None, Sent::Inline(query_id.to_string(), results))
    }

    async fn answer_callback(&self, callback_id: &str, text: Option<&str>) -> Result<()> {
        self.record(
            None,
            Sent::Callback(callback_id.to_string(), text.map(str::to_string)),
        )
    }
}

/// Store wrapper that can simulate a backend outage for writes, either for
/// every record or only for selected usernames.
pub struct FlakyStore {
    inner: Arc<dyn UserStore>,
    fail_updates: AtomicBool,
    failing_users: Mutex<HashSet<String>>,
}

impl FlakyStore {
    pub fn new(inner: Arc<dyn UserStore>) -> Self {
        Self {
            inner,
            fail_updates: AtomicBool::new(false),
            failing_users: Mutex::new(HashSet::new()),
        }
    }

    pub fn fail_updates(&self, on: bool) {
        self.fail_updates.store(on, Ordering::SeqCst);
    }

    pub fn fail_updates_for(&self, username: &str) {
        self.failing_users
            .lock()
            .unwrap()
            .insert(username.to_string());
    }

    fn check(&self, username: &str) -> Result<()> {
        if self.fail_updates.load(Ordering::SeqCst)
            || self.failing_users.lock().unwrap().contains(username)
        {
            return Err(Error::StoreUnavailable("simulated outage".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl UserStore for FlakyStore {
    async fn get(&self, username: &str) -> Result<Option<UserRecord>> {
        self.inner.get(username).await
    }

    async fn put(&self, record: UserRecord) -> Result<()> {
        self.check(&record.username)?;
        self.inner.put(record).await
    }

    async fn put_if_absent(&self, record: UserRecord) -> Result<bool> {
        self.check(&record.username)?;
        self.inner.put_if_absent(record).await
    }

    async fn update_fields(
        &self,
        username: &str,
        updates: Vec<FieldUpdate>,
    ) -> Result<UserRecord> {
        self.check(username)?;
        self.inner.update_fields(username, updates).await
    }

    async fn update_fields_if(
        &self,
        username: &str,
        condition: &Condition,
        updates: Vec<FieldUpdate>,
    ) -> Result<Option<UserRecord>> {
        self.check(username)?;
        self.inner.update_fields_if(username, condition, updates).await
    }

    async fn scan(&self, filter: &ScanFilter) -> Result<Vec<UserRecord>> {
        self.inner.scan(filter).await
    }
}

/// Store wrapper that delays reads, widening the gap between a read and the
/// write that depends on it.
pub struct SlowStore {
    inner: Arc<dyn UserStore>,
    get_delay: Duration,
    scan_delay: Duration,
}

impl SlowStore {
    pub fn new(inner: Arc<dyn UserStore>, get_delay: Duration, scan_delay: Duration) -> Self {
        Self {
            inner,
            get_delay,
            scan_delay,
        }
    }
}

#[async_trait]
impl UserStore for SlowStore {
    async fn get(&self, username: &str) -> Result<Option<UserRecord>> {
        sleep(self.get_delay).await;
        self.inner.get(username).await
    }

    async fn put(&self, record: UserRecord) -> Result<()> {
        self.inner.put(record).await
    }

    async fn put_if_absent(&self, record: UserRecord) -> Result<bool> {
        self.inner.put_if_absent(record).await
    }

    async fn update_fields(
        &self,
        username: &str,
        updates: Vec<FieldUpdate>,
    ) -> Result<UserRecord> {
        self.inner.update_fields(username, updates).await
    }

    async fn update_fields_if(
        &self,
        username: &str,
        condition: &Condition,
        updates: Vec<FieldUpdate>,
    ) -> Result<Option<UserRecord>> {
        self.inner.update_fields_if(username, condition, updates).await
    }

    async fn scan(&self, filter: &ScanFilter) -> Result<Vec<UserRecord>> {
        sleep(self.scan_delay).await;
        self.inner.scan(filter).await
    }
}

/// Notifier that holds every call open for a moment and records the highest
/// number of calls in flight at once.
pub struct InFlightNotifier {
    hold: Duration,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    calls: AtomicUsize,
}

impl InFlightNotifier {
    pub fn new(hold: Duration) -> Self {
        Self {
            hold,
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    async fn hold(&self) -> Result<()> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        sleep(self.hold).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait]
impl Notifier for InFlightNotifier {
    async fn send_text(&self, _recipient: &str, _text: &str) -> Result<()> {
        self.hold().await
    }

    async fn send_photo(
        &self,
        _recipient: &str,
        _file_ref: &str,
        _caption: Option<&str>,
    ) -> Result<()> {
        self.hold().await
    }

    async fn send_document(&self, _recipient: &str, _file_ref: &str) -> Result<()> {
        self.hold().await
    }

    async fn send_sticker(&self, _recipient: &str, _file_ref: &str) -> Result<()> {
        self.hold().await
    }

    async fn send_keyboard(
        &self,
        _recipient: &str,
        _prompt: &str,
        _options: Vec<KeyboardOption>,
    ) -> Result<()> {
        self.hold().await
    }

    async fn answer_inline_query(
        &self,
        _query_id: &str,
        _results: Vec<InlineResult>,
    ) -> Result<()> {
        self.hold().await
    }

    async fn answer_callback(&self, _callback_id: &str, _text: Option<&str>) -> Result<()> {
        self.hold().await
    }
}
