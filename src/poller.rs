//! ==============================================================================
//! poller.rs - fetch-and-render pipeline
//! ==============================================================================
//!
//! purpose:
//!     one configurable poller per view (window size + interval). a refresh:
//!
//!     ┌──────────────┐   fail   ┌──────────────┐   fail   ┌─────────────┐
//!     │ primary read │ ───────> │ fallback read│ ───────> │ empty state │
//!     │ sort + limit │          │ full, unsorted│         │ "no data"   │
//!     └──────┬───────┘          └──────┬───────┘          └──────┬──────┘
//!            │ drop nulls, sort by date desc, keep first N       │
//!            └─────────────────────────┬───────────────────────────┘
//!                                      ▼
//!                               sink.publish(view)
//!
//!     no error leaves refresh(). failures are logged and degrade a tier.
//!
//! relationships:
//!     - reads through: collection.rs
//!     - renders with: render.rs
//!     - triggered by: the poll loop, the dashboard refresh button,
//!       recorder.rs after a successful write
//!
//! ==============================================================================

use crate::collection::Collection;
use crate::config::ViewConfig;
use crate::domain::Record;
use crate::render::{StatusSink, StatusView};

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, error, warn};

pub struct Poller {
    name: &'static str,
    collection: Arc<dyn Collection>,
    sink: Arc<dyn StatusSink>,
    view: ViewConfig,
    tickets: AtomicU64,
}

impl Poller {
    pub fn new(
        name: &'static str,
        collection: Arc<dyn Collection>,
        sink: Arc<dyn StatusSink>,
        view: ViewConfig,
    ) -> Self {
        Self { name, collection, sink, view, tickets: AtomicU64::new(0) }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn window(&self) -> usize {
        self.view.window
    }

    pub fn interval_seconds(&self) -> u64 {
        self.view.interval().as_secs()
    }

    /// read the latest records and publish them; never fails
    ///
    /// overlapping calls are allowed. each takes a ticket when it starts and
    /// the sink keeps the newest ticket's result.
    pub async fn refresh(&self) -> StatusView {
        let ticket = self.tickets.fetch_add(1, Ordering::Relaxed);
        let records = self.fetch().await;
        let view = match records {
            Some(records) => StatusView::from_records(&records),
            None => StatusView::empty(),
        };
        debug!(view = self.name, ticket, rows = view.count, "refresh rendered");
        self.sink.publish(ticket, view.clone());
        view
    }

    /// primary read, then fallback; `None` when both fail
    async fn fetch(&self) -> Option<Vec<Record>> {
        let window = self.view.window;
        match self.collection.recent(window).await {
            Ok(entries) => return Some(latest(entries, window)),
            Err(e) => {
                warn!(view = self.name, "sorted read failed, retrying without parameters: {e}");
            }
        }

        match self.collection.all().await {
            Ok(entries) => Some(latest(entries, window)),
            Err(e) => {
                error!(view = self.name, "fallback read failed: {e}");
                None
            }
        }
    }

    /// refresh now, then on every interval tick, forever
    pub async fn run(self: Arc<Self>) {
        let mut ticker = tokio::time::interval(self.view.interval());
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            // each tick runs on its own task so a slow read never holds back the next tick
            let poller = Arc::clone(&self);
            tokio::spawn(async move {
                poller.refresh().await;
            });
        }
    }
}

/// drop nulls, order newest first by date string, keep the first `window`
pub fn latest(entries: Vec<Option<Record>>, window: usize) -> Vec<Record> {
    let mut records: Vec<Record> = entries.into_iter().flatten().collect();
    records.sort_by(|a, b| b.date_key().cmp(a.date_key()));
    records.truncate(window);
    records
}
