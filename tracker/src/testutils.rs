use crate::backend::RemoteBackendAdapter;
use crate::normalize::TrackingKey;
use crate::types::TrackingRecord;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::oneshot;

/// Adapter serving a fixed set of records.
pub struct StaticAdapter {
    name: &'static str,
    enabled: bool,
    accept_writes: bool,
    pub records: Mutex<HashMap<TrackingKey, TrackingRecord>>,
    pub fetches: AtomicUsize,
    pub upserts: AtomicUsize,
}

impl StaticAdapter {
    pub fn new(name: &'static str) -> Self {
        StaticAdapter {
            name,
            enabled: true,
            accept_writes: true,
            records: Mutex::new(HashMap::new()),
            fetches: AtomicUsize::new(0),
            upserts: AtomicUsize::new(0),
        }
    }

    pub fn with_record(self, record: TrackingRecord) -> Self {
        self.records.lock().insert(record.key(), record);
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn rejecting_writes(mut self) -> Self {
        self.accept_writes = false;
        self
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub fn upsert_count(&self) -> usize {
        self.upserts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RemoteBackendAdapter for StaticAdapter {
    fn name(&self) -> &str {
        self.name
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    async fn fetch(&self, key: &TrackingKey) -> Option<TrackingRecord> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.records.lock().get(key).cloned()
    }

    async fn upsert(&self, record: &TrackingRecord) -> bool {
        self.upserts.fetch_add(1, Ordering::SeqCst);
        if !self.accept_writes {
            return false;
        }
        self.records.lock().insert(record.key(), record.clone());
        true
    }
}

/// Adapter whose lookups stay in flight until the test releases them.
/// Keys without a gate resolve to `None` immediately.
#[derive(Default)]
pub struct GatedAdapter {
    gates: Mutex<HashMap<TrackingKey, oneshot::Receiver<Option<TrackingRecord>>>>,
}

impl GatedAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a pending lookup for `code`. Sending on the returned channel
    /// completes it.
    pub fn gate(&self, code: &str) -> oneshot::Sender<Option<TrackingRecord>> {
        let (tx, rx) = oneshot::channel();
        self.gates.lock().insert(TrackingKey::new(code), rx);
        tx
    }
}

#[async_trait]
impl RemoteBackendAdapter for GatedAdapter {
    fn name(&self) -> &str {
        "gated"
    }

    fn is_enabled(&self) -> bool {
        true
    }

    async fn fetch(&self, key: &TrackingKey) -> Option<TrackingRecord> {
        let gate = self.gates.lock().remove(key);
        match gate {
            Some(rx) => rx.await.ok().flatten(),
            None => None,
        }
    }

    async fn upsert(&self, _record: &TrackingRecord) -> bool {
        false
    }
}
