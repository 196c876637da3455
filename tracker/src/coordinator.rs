use crate::cloud::CloudResolver;
use crate::local_cache::{LocalCacheStore, StoreError};
use crate::metrics_defs::RESOLUTION_STALE_DISCARDED;
use crate::normalize::TrackingKey;
use crate::share_link::{self, LinkTarget, ShareTokenError};
use crate::types::TrackingRecord;
use parking_lot::Mutex;
use shared::counter;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use url::Url;

/// What the caller should currently display.
#[derive(Clone, Debug, PartialEq)]
pub enum ResolutionState {
    /// Nothing has been requested yet.
    Idle,
    /// A remote lookup is in flight. `previous` is the local copy, if any.
    Pending {
        code: TrackingKey,
        previous: Option<TrackingRecord>,
    },
    Resolved(TrackingRecord),
    /// No source knows this code.
    NotFound { code: TrackingKey },
}

impl ResolutionState {
    /// The record to display, if there is one.
    pub fn record(&self) -> Option<&TrackingRecord> {
        match self {
            ResolutionState::Pending { previous, .. } => previous.as_ref(),
            ResolutionState::Resolved(record) => Some(record),
            ResolutionState::Idle | ResolutionState::NotFound { .. } => None,
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, ResolutionState::Pending { .. })
    }
}

struct Generation {
    current: u64,
    closed: bool,
}

struct Inner {
    local: Arc<LocalCacheStore>,
    cloud: Arc<CloudResolver>,
    // Guards both the generation and every state publication, so a result is
    // only ever committed while its generation is still the current one.
    generation: Mutex<Generation>,
    state: watch::Sender<ResolutionState>,
}

impl Inner {
    fn lookup_local(&self, key: &TrackingKey) -> Option<TrackingRecord> {
        match self.local.get(key) {
            Ok(record) => record,
            Err(err) => {
                tracing::warn!("Local lookup of {key} failed: {err}");
                None
            }
        }
    }

    async fn reconcile(
        &self,
        generation: u64,
        key: TrackingKey,
        local: Option<TrackingRecord>,
    ) -> bool {
        let remote = self.cloud.fetch(&key).await;
        let from_remote = remote.is_some();

        let next = match remote.or(local) {
            Some(record) => ResolutionState::Resolved(record),
            None => ResolutionState::NotFound { code: key.clone() },
        };

        let guard = self.generation.lock();
        if guard.closed || guard.current != generation {
            tracing::debug!("Discarding stale remote result for {key}");
            counter!(RESOLUTION_STALE_DISCARDED).increment(1);
            return false;
        }
        self.state.send_replace(next);
        from_remote
    }
}

/// Handle to one `resolve` call.
pub struct Resolution {
    generation: u64,
    task: Option<JoinHandle<bool>>,
}

impl Resolution {
    fn done(generation: u64) -> Self {
        Resolution {
            generation,
            task: None,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Waits for the remote lookup, if one was started. Returns true when a
    /// remote record was published for this resolution.
    pub async fn settled(self) -> bool {
        match self.task {
            Some(task) => task.await.unwrap_or(false),
            None => false,
        }
    }
}

/// Turns codes into displayable records: the local cache answers right away
/// and the remote backends may supersede that answer later.
///
/// Every call to [`resolve`](Self::resolve) starts a new generation. Remote
/// results of older generations, or arriving after [`shutdown`](Self::shutdown),
/// are dropped.
pub struct TrackingCoordinator {
    inner: Arc<Inner>,
}

impl TrackingCoordinator {
    pub fn new(local: Arc<LocalCacheStore>, cloud: Arc<CloudResolver>) -> Self {
        let (state, _) = watch::channel(ResolutionState::Idle);
        TrackingCoordinator {
            inner: Arc::new(Inner {
                local,
                cloud,
                generation: Mutex::new(Generation {
                    current: 0,
                    closed: false,
                }),
                state,
            }),
        }
    }

    pub fn local(&self) -> &LocalCacheStore {
        &self.inner.local
    }

    pub fn cloud(&self) -> &CloudResolver {
        &self.inner.cloud
    }

    pub fn subscribe(&self) -> watch::Receiver<ResolutionState> {
        self.inner.state.subscribe()
    }

    pub fn state(&self) -> ResolutionState {
        self.inner.state.borrow().clone()
    }

    /// Resolves `code`, or shows `override_record` as is when given.
    ///
    /// The initial state is published before this returns. When remote
    /// backends are enabled a lookup is spawned on the current tokio runtime
    /// and its result replaces the initial state if nothing newer was
    /// requested in the meantime.
    ///
    /// # Panics
    ///
    /// Panics when the remote backends are enabled and this is called outside
    /// a tokio runtime. Overrides, empty codes and offline resolvers never
    /// spawn and are safe to call anywhere.
    pub fn resolve(&self, code: &str, override_record: Option<TrackingRecord>) -> Resolution {
        if let Some(record) = override_record {
            return self.publish_final(ResolutionState::Resolved(record));
        }

        let key = TrackingKey::new(code);
        if key.is_empty() {
            return self.publish_final(ResolutionState::NotFound { code: key });
        }

        let local = self.inner.lookup_local(&key);
        if !self.inner.cloud.is_enabled() {
            let state = match local {
                Some(record) => ResolutionState::Resolved(record),
                None => ResolutionState::NotFound { code: key },
            };
            return self.publish_final(state);
        }

        let mut guard = self.inner.generation.lock();
        if guard.closed {
            return Resolution::done(guard.current);
        }
        guard.current += 1;
        let generation = guard.current;
        self.inner.state.send_replace(ResolutionState::Pending {
            code: key.clone(),
            previous: local.clone(),
        });
        drop(guard);

        let inner = self.inner.clone();
        let task = tokio::spawn(async move { inner.reconcile(generation, key, local).await });

        Resolution {
            generation,
            task: Some(task),
        }
    }

    /// Resolves whatever a deep link points at. Returns `None` for links
    /// that carry neither a share token nor a code.
    pub fn open_link(&self, url: &Url) -> Option<Resolution> {
        match share_link::parse_link(url)? {
            LinkTarget::Snapshot(record) => {
                let code = record.code.clone();
                Some(self.resolve(&code, Some(record)))
            }
            LinkTarget::Code(key) => Some(self.resolve(key.as_str(), None)),
        }
    }

    /// Finds a record for `code`, local cache first, then the remote backends.
    pub async fn lookup(&self, code: &str) -> Option<TrackingRecord> {
        let key = TrackingKey::new(code);
        if key.is_empty() {
            return None;
        }
        match self.inner.lookup_local(&key) {
            Some(record) => Some(record),
            None => self.inner.cloud.fetch(&key).await,
        }
    }

    /// Builds a link embedding the record for `code`, or `None` when the code
    /// cannot be resolved.
    pub async fn share_link(&self, base: &Url, code: &str) -> Result<Option<Url>, ShareTokenError> {
        match self.lookup(code).await {
            Some(record) => Ok(Some(share_link::build_share_link(base, &record)?)),
            None => Ok(None),
        }
    }

    /// Stores the record locally, then pushes it to the first remote backend
    /// that accepts it. Returns whether the remote write succeeded; a failed
    /// remote write leaves the local copy in place.
    pub async fn save(&self, mut record: TrackingRecord) -> Result<bool, StoreError> {
        record.code = record.key().to_string();
        self.inner.local.save(record.clone())?;

        if !self.inner.cloud.is_enabled() {
            return Ok(false);
        }
        Ok(self.inner.cloud.save(&record).await)
    }

    /// Removes `code` from the local cache only.
    pub fn delete(&self, code: &str) -> Result<bool, StoreError> {
        self.inner.local.delete(&TrackingKey::new(code))
    }

    /// Invalidates in-flight lookups and ignores any further `resolve` calls.
    pub fn shutdown(&self) {
        let mut guard = self.inner.generation.lock();
        guard.closed = true;
        guard.current += 1;
    }

    fn publish_final(&self, state: ResolutionState) -> Resolution {
        let mut guard = self.inner.generation.lock();
        if !guard.closed {
            guard.current += 1;
            self.inner.state.send_replace(state);
        }
        Resolution::done(guard.current)
    }
}

impl Drop for TrackingCoordinator {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::RemoteBackendAdapter;
    use crate::local_cache::{StorageBacking, STORAGE_KEY};
    use crate::seed::seed_records;
    use crate::testutils::{GatedAdapter, StaticAdapter};
    use crate::types::two_step_record;

    fn coordinator(adapters: Vec<Arc<dyn RemoteBackendAdapter>>) -> TrackingCoordinator {
        TrackingCoordinator::new(
            Arc::new(LocalCacheStore::in_memory()),
            Arc::new(CloudResolver::new(adapters)),
        )
    }

    fn remote_copy(code: &str, status: &str) -> TrackingRecord {
        let mut record = two_step_record(code);
        record.status = status.into();
        record
    }

    #[tokio::test]
    async fn test_seed_resolves_synchronously() {
        let coordinator = coordinator(vec![]);
        let resolution = coordinator.resolve("br123456789", None);

        let state = coordinator.state();
        assert_eq!(state, ResolutionState::Resolved(seed_records()[0].clone()));
        assert_eq!(state.record().unwrap().status, "Em Trânsito");
        assert!(!resolution.settled().await);
    }

    #[tokio::test]
    async fn test_local_snapshot_is_published_before_remote() {
        let gated = Arc::new(GatedAdapter::new());
        let release = gated.gate("BR123456789");
        let coordinator = coordinator(vec![gated]);
        let mut rx = coordinator.subscribe();

        let resolution = coordinator.resolve(" BR123456789 ", None);

        // Initial state is visible before any await.
        let initial = rx.borrow_and_update().clone();
        assert!(initial.is_pending());
        assert_eq!(initial.record(), Some(&seed_records()[0]));

        let remote = remote_copy("BR123456789", "Saiu para Entrega");
        release.send(Some(remote.clone())).unwrap();
        assert!(resolution.settled().await);

        assert!(rx.has_changed().unwrap());
        assert_eq!(*rx.borrow(), ResolutionState::Resolved(remote));
    }

    #[tokio::test]
    async fn test_remote_miss_keeps_local() {
        let remote = Arc::new(StaticAdapter::new("remote"));
        let coordinator = coordinator(vec![remote.clone()]);

        let resolution = coordinator.resolve("BR236472641200023", None);
        assert!(!resolution.settled().await);

        assert_eq!(
            coordinator.state(),
            ResolutionState::Resolved(seed_records()[1].clone())
        );
        assert_eq!(remote.fetch_count(), 1);
    }

    #[tokio::test]
    async fn test_remote_only_record() {
        let remote = Arc::new(StaticAdapter::new("remote").with_record(two_step_record("BR100")));
        let coordinator = coordinator(vec![remote]);

        let resolution = coordinator.resolve("br100", None);
        assert_eq!(
            coordinator.state(),
            ResolutionState::Pending {
                code: TrackingKey::new("BR100"),
                previous: None
            }
        );

        assert!(resolution.settled().await);
        assert_eq!(
            coordinator.state(),
            ResolutionState::Resolved(two_step_record("BR100"))
        );
    }

    #[tokio::test]
    async fn test_not_found() {
        let coordinator = coordinator(vec![Arc::new(StaticAdapter::new("remote"))]);

        let resolution = coordinator.resolve("BR404", None);
        assert!(coordinator.state().is_pending());
        resolution.settled().await;
        assert_eq!(
            coordinator.state(),
            ResolutionState::NotFound {
                code: TrackingKey::new("BR404")
            }
        );

        // Without remote backends the answer is final right away.
        let offline = coordinator_offline();
        offline.resolve("BR404", None);
        assert_eq!(
            offline.state(),
            ResolutionState::NotFound {
                code: TrackingKey::new("BR404")
            }
        );
    }

    fn coordinator_offline() -> TrackingCoordinator {
        TrackingCoordinator::new(
            Arc::new(LocalCacheStore::in_memory()),
            Arc::new(CloudResolver::offline()),
        )
    }

    struct UnreadableBacking;

    impl StorageBacking for UnreadableBacking {
        fn read(&self, _key: &str) -> Result<Option<String>, StoreError> {
            panic!("local cache must not be read");
        }

        fn write(&self, _key: &str, _value: &str) -> Result<(), StoreError> {
            panic!("local cache must not be written");
        }
    }

    #[tokio::test]
    async fn test_empty_code_short_circuits() {
        let remote = Arc::new(StaticAdapter::new("remote"));
        let coordinator = TrackingCoordinator::new(
            Arc::new(LocalCacheStore::new(Arc::new(UnreadableBacking))),
            Arc::new(CloudResolver::new(vec![remote.clone()])),
        );

        for code in ["", "   ", " - "] {
            let resolution = coordinator.resolve(code, None);
            assert!(!resolution.settled().await);
            assert_eq!(
                coordinator.state(),
                ResolutionState::NotFound {
                    code: TrackingKey::new("")
                }
            );
        }
        assert_eq!(remote.fetch_count(), 0);
    }

    #[tokio::test]
    async fn test_override_skips_lookups() {
        let remote = Arc::new(StaticAdapter::new("remote").with_record(remote_copy("BR100", "x")));
        let coordinator = TrackingCoordinator::new(
            Arc::new(LocalCacheStore::new(Arc::new(UnreadableBacking))),
            Arc::new(CloudResolver::new(vec![remote.clone()])),
        );

        let resolution = coordinator.resolve("BR100", Some(two_step_record("BR100")));
        assert_eq!(
            coordinator.state(),
            ResolutionState::Resolved(two_step_record("BR100"))
        );
        assert!(!resolution.settled().await);
        assert_eq!(remote.fetch_count(), 0);
    }

    #[tokio::test]
    async fn test_stale_remote_result_is_dropped() {
        let gated = Arc::new(GatedAdapter::new());
        let release_first = gated.gate("BR1");
        let release_second = gated.gate("BR2");
        let coordinator = coordinator(vec![gated]);

        let first = coordinator.resolve("BR1", None);
        let second = coordinator.resolve("BR2", None);
        assert!(second.generation() > first.generation());

        release_second
            .send(Some(remote_copy("BR2", "second")))
            .unwrap();
        assert!(second.settled().await);
        assert_eq!(
            coordinator.state(),
            ResolutionState::Resolved(remote_copy("BR2", "second"))
        );

        release_first.send(Some(remote_copy("BR1", "first"))).unwrap();
        assert!(!first.settled().await);
        assert_eq!(
            coordinator.state(),
            ResolutionState::Resolved(remote_copy("BR2", "second"))
        );
    }

    #[tokio::test]
    async fn test_stale_result_arriving_first_is_dropped() {
        let gated = Arc::new(GatedAdapter::new());
        let release_first = gated.gate("BR1");
        let release_second = gated.gate("BR2");
        let coordinator = coordinator(vec![gated]);

        let first = coordinator.resolve("BR1", None);
        let second = coordinator.resolve("BR2", None);

        release_first.send(Some(remote_copy("BR1", "first"))).unwrap();
        assert!(!first.settled().await);
        assert_eq!(
            coordinator.state(),
            ResolutionState::Pending {
                code: TrackingKey::new("BR2"),
                previous: None
            }
        );

        release_second.send(None).unwrap();
        assert!(!second.settled().await);
        assert_eq!(
            coordinator.state(),
            ResolutionState::NotFound {
                code: TrackingKey::new("BR2")
            }
        );
    }

    #[tokio::test]
    async fn test_override_supersedes_pending_lookup() {
        let gated = Arc::new(GatedAdapter::new());
        let release = gated.gate("BR1");
        let coordinator = coordinator(vec![gated]);

        let pending = coordinator.resolve("BR1", None);
        coordinator.resolve("BR100", Some(two_step_record("BR100")));

        release.send(Some(remote_copy("BR1", "late"))).unwrap();
        assert!(!pending.settled().await);
        assert_eq!(
            coordinator.state(),
            ResolutionState::Resolved(two_step_record("BR100"))
        );
    }

    #[tokio::test]
    async fn test_teardown_drops_in_flight_result() {
        let gated = Arc::new(GatedAdapter::new());
        let release = gated.gate("BR1");
        let coordinator = coordinator(vec![gated]);
        let rx = coordinator.subscribe();

        let pending = coordinator.resolve("BR1", None);
        drop(coordinator);

        release.send(Some(remote_copy("BR1", "late"))).unwrap();
        assert!(!pending.settled().await);
        assert!(rx.borrow().is_pending());
    }

    #[test]
    fn test_resolve_without_runtime() {
        let offline = coordinator_offline();
        offline.resolve("BR123456789", None);
        assert_eq!(
            offline.state(),
            ResolutionState::Resolved(seed_records()[0].clone())
        );

        let online = coordinator(vec![Arc::new(StaticAdapter::new("remote"))]);
        online.resolve("BR100", Some(two_step_record("BR100")));
        online.resolve("", None);
        assert!(matches!(online.state(), ResolutionState::NotFound { .. }));
    }

    #[test]
    #[should_panic]
    fn test_remote_lookup_requires_runtime() {
        let online = coordinator(vec![Arc::new(StaticAdapter::new("remote"))]);
        online.resolve("BR100", None);
    }

    #[tokio::test]
    async fn test_resolve_after_shutdown_is_ignored() {
        let coordinator = coordinator_offline();
        coordinator.resolve("BR123456789", None);
        coordinator.shutdown();

        coordinator.resolve("BR236472641200023", None);
        assert_eq!(
            coordinator.state(),
            ResolutionState::Resolved(seed_records()[0].clone())
        );
    }

    #[tokio::test]
    async fn test_save_and_delete() {
        let remote = Arc::new(StaticAdapter::new("remote"));
        let coordinator = coordinator(vec![remote.clone()]);

        assert!(coordinator.save(two_step_record("br100")).await.unwrap());
        assert_eq!(
            coordinator.local().get(&TrackingKey::new("BR100")).unwrap(),
            Some(two_step_record("BR100"))
        );
        assert!(
            remote
                .records
                .lock()
                .contains_key(&TrackingKey::new("BR100"))
        );

        // Deleting only affects the local cache.
        assert!(coordinator.delete("BR100").unwrap());
        assert_eq!(coordinator.local().get(&TrackingKey::new("BR100")).unwrap(), None);
        assert_eq!(remote.records.lock().len(), 1);
        assert!(!coordinator.delete("BR100").unwrap());
    }

    #[tokio::test]
    async fn test_save_keeps_local_copy_when_remote_fails() {
        let remote = Arc::new(StaticAdapter::new("remote").rejecting_writes());
        let coordinator = coordinator(vec![remote]);

        assert!(!coordinator.save(two_step_record("BR100")).await.unwrap());
        assert!(
            coordinator
                .local()
                .get(&TrackingKey::new("BR100"))
                .unwrap()
                .is_some()
        );

        let offline = coordinator_offline();
        assert!(!offline.save(two_step_record("BR100")).await.unwrap());
    }

    #[tokio::test]
    async fn test_local_failure_is_downgraded() {
        let backing = Arc::new(crate::local_cache::MemoryBacking::new());
        backing.write(STORAGE_KEY, "{corrupt").unwrap();
        let remote = Arc::new(StaticAdapter::new("remote").with_record(two_step_record("BR100")));
        let coordinator = TrackingCoordinator::new(
            Arc::new(LocalCacheStore::new(backing)),
            Arc::new(CloudResolver::new(vec![remote])),
        );

        let resolution = coordinator.resolve("BR100", None);
        assert!(resolution.settled().await);
        assert_eq!(
            coordinator.state(),
            ResolutionState::Resolved(two_step_record("BR100"))
        );
    }

    #[tokio::test]
    async fn test_open_link() {
        let base = Url::parse("https://ship-easy.example/").unwrap();
        let coordinator = coordinator_offline();

        let link = share_link::build_share_link(&base, &two_step_record("BR100")).unwrap();
        coordinator.open_link(&link).unwrap();
        assert_eq!(
            coordinator.state(),
            ResolutionState::Resolved(two_step_record("BR100"))
        );

        let link = Url::parse("https://ship-easy.example/br123456789").unwrap();
        coordinator.open_link(&link).unwrap();
        assert_eq!(
            coordinator.state(),
            ResolutionState::Resolved(seed_records()[0].clone())
        );

        assert!(coordinator.open_link(&base).is_none());
    }

    #[tokio::test]
    async fn test_share_link() {
        let base = Url::parse("https://ship-easy.example/").unwrap();
        let remote = Arc::new(StaticAdapter::new("remote").with_record(two_step_record("BR100")));
        let coordinator = coordinator(vec![remote]);

        let link = coordinator
            .share_link(&base, "br123456789")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            share_link::parse_link(&link),
            Some(LinkTarget::Snapshot(seed_records()[0].clone()))
        );

        let link = coordinator.share_link(&base, "BR100").await.unwrap().unwrap();
        assert_eq!(
            share_link::parse_link(&link),
            Some(LinkTarget::Snapshot(two_step_record("BR100")))
        );

        assert_eq!(coordinator.share_link(&base, "BR404").await.unwrap(), None);
    }
}
