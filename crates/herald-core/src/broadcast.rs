//! Fan-out of one payload to many recipients.

use std::sync::Arc;

use tokio::{sync::Mutex, task::JoinSet};
use tracing::{info, warn};

use crate::{messaging::port::Notifier, Result};

/// What gets delivered to every recipient.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Payload {
    Text(String),
    Photo {
        file_id: String,
        caption: Option<String>,
    },
    Document {
        file_id: String,
    },
    /// `announcement` is sent first, then the sticker, to the same recipient.
    Sticker {
        announcement: String,
        file_id: String,
    },
}

impl Payload {
    pub fn kind(&self) -> &'static str {
        match self {
            Payload::Text(_) => "text",
            Payload::Photo { .. } => "photo",
            Payload::Document { .. } => "document",
            Payload::Sticker { .. } => "sticker",
        }
    }

    async fn deliver(&self, notifier: &dyn Notifier, recipient: &str) -> Result<()> {
        match self {
            Payload::Text(text) => notifier.send_text(recipient, text).await,
            Payload::Photo { file_id, caption } => {
                notifier
                    .send_photo(recipient, file_id, caption.as_deref())
                    .await
            }
            Payload::Document { file_id } => notifier.send_document(recipient, file_id).await,
            Payload::Sticker {
                announcement,
                file_id,
            } => {
                notifier.send_text(recipient, announcement).await?;
                notifier.send_sticker(recipient, file_id).await
            }
        }
    }
}

/// Outcome of one broadcast batch.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    pub recipients: usize,
    pub delivered: usize,
    pub failed: usize,
}

/// Delivers payloads through a bounded pool of workers.
///
/// A failed delivery is logged and counted; it never stops the batch and never
/// fails the call. The call returns once every recipient has been attempted.
#[derive(Clone)]
pub struct BroadcastDispatcher {
    notifier: Arc<dyn Notifier>,
    concurrency_limit: usize,
}

impl BroadcastDispatcher {
    pub fn new(notifier: Arc<dyn Notifier>, concurrency_limit: usize) -> Self {
        Self {
            notifier,
            concurrency_limit: concurrency_limit.max(1),
        }
    }

    pub fn concurrency_limit(&self) -> usize {
        self.concurrency_limit
    }

    pub async fn broadcast(&self, payload: Payload, recipients: Vec<String>) -> BroadcastReport {
        let total = recipients.len();
        if total == 0 {
            return BroadcastReport::default();
        }

        let workers = total.min(self.concurrency_limit);
        let queue = Arc::new(Mutex::new(recipients.into_iter()));
        let payload = Arc::new(payload);

        let mut pool = JoinSet::new();
        for _ in 0..workers {
            let queue = queue.clone();
            let payload = payload.clone();
            let notifier = self.notifier.clone();
            pool.spawn(async move {
                let mut delivered = 0usize;
                let mut failed = 0usize;
                loop {
                    let next = { queue.lock().await.next() };
                    let Some(recipient) = next else {
                        break;
                    };
                    match payload.deliver(notifier.as_ref(), &recipient).await {
                        Ok(()) => delivered += 1,
                        Err(e) => {
                            failed += 1;
                            warn!(recipient = %recipient, error = %e, "broadcast delivery failed");
                        }
                    }
                }
                (delivered, failed)
            });
        }

        let mut report = BroadcastReport {
            recipients: total,
            ..BroadcastReport::default()
        };
        while let Some(joined) = pool.join_next().await {
            match joined {
                Ok((delivered, failed)) => {
                    report.delivered += delivered;
                    report.failed += failed;
                }
                Err(e) => warn!(error = %e, "broadcast worker aborted"),
            }
        }
        // A worker that panicked leaves its in-flight recipients unaccounted.
        report.failed = total.saturating_sub(report.delivered);

        info!(
            kind = payload.kind(),
            recipients = total,
            workers,
            delivered = report.delivered,
            failed = report.failed,
            "broadcast finished"
        );
        report
    }
}
