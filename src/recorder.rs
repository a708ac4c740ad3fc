//! ==============================================================================
//! recorder.rs - status recorder
//! ==============================================================================
//!
//! purpose:
//!     turns a status action into a stored record:
//!     1. name: name field, else detected label, else the fixed fallback
//!     2. remember the name for the next start
//!     3. ip: ip field, or null
//!     4. stamp the time in the configured timezone
//!     5. POST, then refresh the recorder view once
//!
//!     a failed write alerts the user and is not retried. the saving
//!     indicator is lowered however the write ends.
//!
//! relationships:
//!     - writes through: collection.rs
//!     - refreshes: poller.rs (recorder view)
//!     - defaults from: identity.rs, store.rs
//!     - driven by: dashboard.rs (status buttons), main.rs (`record` command)
//!
//! ==============================================================================

use crate::alert::Alerter;
use crate::clock::CivilClock;
use crate::collection::Collection;
use crate::domain::{NewRecord, Record};
use crate::error::CollectionError;
use crate::identity::{IpLookup, LabelProvider};
use crate::poller::Poller;
use crate::store::{KeyValueStore, DEVICE_NAME_KEY};

use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use tracing::{error, info, warn};

pub const SAVE_FAILED_ALERT: &str = "Could not save the record. Check the logs for details.";
pub const IP_DETECT_ALERT: &str = "Could not detect the public IP. You can enter it manually.";

/// the editable name and ip inputs of the recorder
#[derive(Debug, Default)]
pub struct DeviceFields {
    name: RwLock<String>,
    ip: RwLock<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldValues {
    pub name: String,
    pub ip: String,
}

impl DeviceFields {
    pub fn new() -> Self {
        Self::default()
    }

    /// remembered name, else the detected label
    pub fn prefilled(store: &dyn KeyValueStore, labels: &dyn LabelProvider) -> Self {
        let name = store
            .get(DEVICE_NAME_KEY)
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| labels.detect());
        let fields = Self::new();
        fields.set_name(&name);
        fields
    }

    pub fn name(&self) -> String {
        read(&self.name)
    }

    pub fn ip(&self) -> String {
        read(&self.ip)
    }

    pub fn set_name(&self, value: &str) {
        write(&self.name, value);
    }

    pub fn set_ip(&self, value: &str) {
        write(&self.ip, value);
    }

    pub fn values(&self) -> FieldValues {
        FieldValues { name: self.name(), ip: self.ip() }
    }
}

fn read(lock: &RwLock<String>) -> String {
    match lock.read() {
        Ok(value) => value.clone(),
        Err(poisoned) => poisoned.into_inner().clone(),
    }
}

fn write(lock: &RwLock<String>, value: &str) {
    let mut guard = match lock.write() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };
    *guard = value.to_string();
}

/// raised while a write is in flight
#[derive(Debug, Default)]
pub struct SavingIndicator {
    on: AtomicBool,
}

impl SavingIndicator {
    pub fn is_on(&self) -> bool {
        self.on.load(Ordering::SeqCst)
    }

    fn raise(&self) -> SavingGuard<'_> {
        self.on.store(true, Ordering::SeqCst);
        SavingGuard(self)
    }
}

struct SavingGuard<'a>(&'a SavingIndicator);

impl Drop for SavingGuard<'_> {
    fn drop(&mut self) {
        self.0.on.store(false, Ordering::SeqCst);
    }
}

pub struct Recorder {
    collection: Arc<dyn Collection>,
    poller: Arc<Poller>,
    fields: Arc<DeviceFields>,
    labels: Arc<dyn LabelProvider>,
    store: Arc<dyn KeyValueStore>,
    alerter: Arc<dyn Alerter>,
    clock: CivilClock,
    fallback_name: String,
    saving: SavingIndicator,
}

impl Recorder {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        collection: Arc<dyn Collection>,
        poller: Arc<Poller>,
        fields: Arc<DeviceFields>,
        labels: Arc<dyn LabelProvider>,
        store: Arc<dyn KeyValueStore>,
        alerter: Arc<dyn Alerter>,
        clock: CivilClock,
        fallback_name: impl Into<String>,
    ) -> Self {
        Self {
            collection,
            poller,
            fields,
            labels,
            store,
            alerter,
            clock,
            fallback_name: fallback_name.into(),
            saving: SavingIndicator::default(),
        }
    }

    pub fn is_saving(&self) -> bool {
        self.saving.is_on()
    }

    pub fn fields(&self) -> &Arc<DeviceFields> {
        &self.fields
    }

    /// record `status` for this device
    ///
    /// the error is returned for callers that want an exit code; the user
    /// has already been alerted when it is `Err`.
    pub async fn record(&self, status: &str) -> Result<Record, CollectionError> {
        let _saving = self.saving.raise();

        let name = self.resolve_name();
        self.store.set(DEVICE_NAME_KEY, &name);

        let ip = Some(self.fields.ip().trim().to_string()).filter(|ip| !ip.is_empty());
        let payload = NewRecord {
            name,
            status: status.to_string(),
            ip,
            date: self.clock.now(),
        };

        info!(status = %payload.status, name = %payload.name, date = %payload.date, "posting status");
        match self.collection.create(&payload).await {
            Ok(created) => {
                info!(id = created.id.as_deref().unwrap_or("?"), "status saved");
                self.poller.refresh().await;
                Ok(created)
            }
            Err(e) => {
                error!("failed to save status: {e}");
                self.alerter.alert(SAVE_FAILED_ALERT);
                Err(e)
            }
        }
    }

    /// explicit field value, else detected label (reflected into the field),
    /// else the fallback
    fn resolve_name(&self) -> String {
        let explicit = self.fields.name().trim().to_string();
        if !explicit.is_empty() {
            return explicit;
        }

        let detected = self.labels.detect().trim().to_string();
        let name = if detected.is_empty() { self.fallback_name.clone() } else { detected };
        self.fields.set_name(&name);
        name
    }

    /// put the detected label into the name field
    pub fn detect_name(&self) -> String {
        let label = self.labels.detect();
        self.fields.set_name(&label);
        label
    }
}

/// look up the public ip and put it into the ip field; alert on failure
pub async fn fill_public_ip(
    lookup: &dyn IpLookup,
    fields: &DeviceFields,
    alerter: &dyn Alerter,
) -> Option<String> {
    match lookup.public_ip().await {
        Ok(ip) => {
            info!(%ip, "public ip detected");
            fields.set_ip(&ip);
            Some(ip)
        }
        Err(e) => {
            warn!("public ip detection failed: {e}");
            alerter.alert(IP_DETECT_ALERT);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alert::tests::RecordingAlerter;
    use crate::config::ViewConfig;
    use crate::error::IdentityError;
    use crate::identity::tests::FixedLabel;
    use crate::poller::tests::{dated, ScriptedCollection};
    use crate::render::{StatusSink, StatusView, ViewSlot};
    use crate::store::MemoryStore;
    use async_trait::async_trait;

    struct Harness {
        collection: Arc<ScriptedCollection>,
        slot: Arc<ViewSlot>,
        store: Arc<MemoryStore>,
        alerts: Arc<RecordingAlerter>,
        recorder: Recorder,
    }

    fn harness(collection: ScriptedCollection, label: &str) -> Harness {
        let collection = Arc::new(collection);
        let slot = Arc::new(ViewSlot::new());
        let store = Arc::new(MemoryStore::new());
        let alerts = Arc::new(RecordingAlerter::default());
        let poller = Arc::new(Poller::new(
            "recorder",
            collection.clone(),
            slot.clone(),
            ViewConfig { window: 5, interval_seconds: 15 },
        ));
        let recorder = Recorder::new(
            collection.clone(),
            poller,
            Arc::new(DeviceFields::new()),
            Arc::new(FixedLabel(label.to_string())),
            store.clone(),
            alerts.clone(),
            CivilClock::from_name("America/Mexico_City").unwrap(),
            "IoT Web Panel",
        );
        Harness { collection, slot, store, alerts, recorder }
    }

    #[tokio::test]
    async fn empty_fields_post_detected_name_and_null_ip_then_refresh_once() {
        let collection = ScriptedCollection::with_replies(
            vec![Ok(vec![Some(dated("online", "2024-06-01 12:00:00"))])],
            vec![],
        );
        let h = harness(collection, "workshop-pi Linux");

        h.recorder.record("online").await.unwrap();

        let created = h.collection.created.lock().unwrap().clone();
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].name, "workshop-pi Linux");
        assert_eq!(created[0].status, "online");
        assert_eq!(created[0].ip, None);
        assert_eq!(created[0].date.len(), "YYYY-MM-DD HH:mm:ss".len());

        assert_eq!(h.collection.recent_calls.load(Ordering::SeqCst), 1);
        assert_eq!(h.collection.all_calls.load(Ordering::SeqCst), 0);
        assert_eq!(h.slot.current().last.status, "online");

        assert_eq!(h.recorder.fields().name(), "workshop-pi Linux");
        assert_eq!(h.store.get(DEVICE_NAME_KEY).as_deref(), Some("workshop-pi Linux"));
        assert!(h.alerts.messages.lock().unwrap().is_empty());
        assert!(!h.recorder.is_saving());
    }

    #[tokio::test]
    async fn blank_label_falls_back_to_fixed_name() {
        let h = harness(ScriptedCollection::with_replies(vec![Ok(vec![])], vec![]), "   ");

        h.recorder.record("offline").await.unwrap();

        let created = h.collection.created.lock().unwrap().clone();
        assert_eq!(created[0].name, "IoT Web Panel");
    }

    #[tokio::test]
    async fn explicit_fields_are_trimmed_and_used() {
        let h = harness(ScriptedCollection::with_replies(vec![Ok(vec![])], vec![]), "detected");
        h.recorder.fields().set_name("  kitchen sensor ");
        h.recorder.fields().set_ip(" 198.51.100.4 ");

        h.recorder.record("maintenance").await.unwrap();

        let created = h.collection.created.lock().unwrap().clone();
        assert_eq!(created[0].name, "kitchen sensor");
        assert_eq!(created[0].ip.as_deref(), Some("198.51.100.4"));
        assert_eq!(h.store.get(DEVICE_NAME_KEY).as_deref(), Some("kitchen sensor"));
    }

    #[tokio::test]
    async fn failed_write_alerts_once_and_leaves_view_alone() {
        let collection = ScriptedCollection { create_fails: true, ..ScriptedCollection::default() };
        let h = harness(collection, "bench");
        let before = StatusView::from_records(&[dated("online", "2024-06-01 12:00:00")]);
        h.slot.publish(100, before.clone());

        let result = h.recorder.record("offline").await;

        assert!(matches!(result, Err(CollectionError::WriteFailure(_))));
        assert_eq!(h.slot.current(), before);
        assert_eq!(*h.alerts.messages.lock().unwrap(), vec![SAVE_FAILED_ALERT.to_string()]);
        assert!(!h.recorder.is_saving());
        assert_eq!(h.collection.recent_calls.load(Ordering::SeqCst), 0);
        assert_eq!(h.collection.all_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn prefill_prefers_remembered_name() {
        let store = MemoryStore::new();
        let labels = FixedLabel("detected".into());
        assert_eq!(DeviceFields::prefilled(&store, &labels).name(), "detected");

        store.set(DEVICE_NAME_KEY, "remembered");
        assert_eq!(DeviceFields::prefilled(&store, &labels).name(), "remembered");
    }

    #[test]
    fn detect_name_overwrites_field() {
        let h = harness(ScriptedCollection::default(), "fresh label");
        h.recorder.fields().set_name("old");
        assert_eq!(h.recorder.detect_name(), "fresh label");
        assert_eq!(h.recorder.fields().name(), "fresh label");
    }

    struct StaticIp(Option<&'static str>);

    #[async_trait]
    impl IpLookup for StaticIp {
        async fn public_ip(&self) -> Result<String, IdentityError> {
            self.0.map(String::from).ok_or(IdentityError::Status(503))
        }
    }

    #[tokio::test]
    async fn ip_detection_fills_field_or_alerts() {
        let fields = DeviceFields::new();
        let alerts = RecordingAlerter::default();

        let found = fill_public_ip(&StaticIp(Some("203.0.113.7")), &fields, &alerts).await;
        assert_eq!(found.as_deref(), Some("203.0.113.7"));
        assert_eq!(fields.ip(), "203.0.113.7");
        assert!(alerts.messages.lock().unwrap().is_empty());

        let missing = fill_public_ip(&StaticIp(None), &fields, &alerts).await;
        assert!(missing.is_none());
        assert_eq!(fields.ip(), "203.0.113.7");
        assert_eq!(*alerts.messages.lock().unwrap(), vec![IP_DETECT_ALERT.to_string()]);
    }

    #[tokio::test]
    async fn empty_echo_clears_ip_without_alert() {
        let fields = DeviceFields::new();
        fields.set_ip("198.51.100.1");
        let alerts = RecordingAlerter::default();

        let found = fill_public_ip(&StaticIp(Some("")), &fields, &alerts).await;
        assert_eq!(found.as_deref(), Some(""));
        assert_eq!(fields.ip(), "");
        assert!(alerts.messages.lock().unwrap().is_empty());
    }
}
