use crate::metrics_defs::{
    BACKEND_FETCH_ERROR, BACKEND_FETCH_HIT, BACKEND_FETCH_MISS, BACKEND_REQUEST_DURATION,
    BACKEND_UPSERT_FAILURE, BACKEND_UPSERT_SUCCESS,
};
use crate::normalize::TrackingKey;
use crate::types::TrackingRecord;
use async_trait::async_trait;
use shared::{counter, histogram};
use std::time::Instant;

#[derive(thiserror::Error, Debug)]
pub enum BackendError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("unexpected status {status} from {resource}")]
    Status {
        resource: String,
        status: reqwest::StatusCode,
    },

    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

/// Point lookup and upsert against one remote backend.
///
/// Implementations never fail: any transport or service error is reported
/// as `None`/`false` and logged.
#[async_trait]
pub trait RemoteBackendAdapter: Send + Sync {
    fn name(&self) -> &str;

    /// False when the adapter is not configured or remote access is switched off.
    fn is_enabled(&self) -> bool;

    async fn fetch(&self, key: &TrackingKey) -> Option<TrackingRecord>;

    async fn upsert(&self, record: &TrackingRecord) -> bool;
}

/// The two primitive operations a provider offers on one named resource
/// (table, collection...). Rows are keyed by the normalized code.
#[async_trait]
pub trait BackendProvider: Send + Sync {
    const NAME: &'static str;

    async fn lookup(
        &self,
        resource: &str,
        key: &TrackingKey,
    ) -> Result<Option<TrackingRecord>, BackendError>;

    async fn upsert(
        &self,
        resource: &str,
        key: &TrackingKey,
        record: &TrackingRecord,
    ) -> Result<(), BackendError>;
}

/// Resource names a provider is tried under, in order. Providers keep the
/// old name around as the fallback while a schema migration is in progress.
#[derive(Clone, Debug, PartialEq)]
pub struct ResourceNames {
    pub primary: String,
    pub fallback: Option<String>,
}

impl ResourceNames {
    pub fn new<P: Into<String>>(primary: P, fallback: Option<String>) -> Self {
        ResourceNames {
            primary: primary.into(),
            fallback,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        let fallback = self
            .fallback
            .as_deref()
            .filter(|fallback| *fallback != self.primary);
        std::iter::once(self.primary.as_str()).chain(fallback)
    }
}

/// Adapts a [`BackendProvider`] to [`RemoteBackendAdapter`]: walks the
/// resource names in order and turns every failure into a negative result.
pub struct ProviderAdapter<P> {
    // None when the provider is not configured or remote access is disabled.
    provider: Option<P>,
    resources: ResourceNames,
}

impl<P: BackendProvider> ProviderAdapter<P> {
    pub fn new(provider: Option<P>, resources: ResourceNames) -> Self {
        ProviderAdapter {
            provider,
            resources,
        }
    }
}

#[async_trait]
impl<P: BackendProvider> RemoteBackendAdapter for ProviderAdapter<P> {
    fn name(&self) -> &str {
        P::NAME
    }

    fn is_enabled(&self) -> bool {
        self.provider.is_some()
    }

    async fn fetch(&self, key: &TrackingKey) -> Option<TrackingRecord> {
        let provider = self.provider.as_ref()?;

        // A missing row and a failed request are treated alike: both move on
        // to the next resource name. They only differ in logs and metrics.
        for resource in self.resources.iter() {
            let start = Instant::now();
            let result = provider.lookup(resource, key).await;
            histogram!(BACKEND_REQUEST_DURATION, "provider" => P::NAME)
                .record(start.elapsed().as_secs_f64());

            match result {
                Ok(Some(record)) => {
                    tracing::debug!("Found {key} in {}/{resource}", P::NAME);
                    counter!(BACKEND_FETCH_HIT, "provider" => P::NAME, "resource" => resource.to_string())
                        .increment(1);
                    return Some(record);
                }
                Ok(None) => {
                    tracing::debug!("No row for {key} in {}/{resource}", P::NAME);
                    counter!(BACKEND_FETCH_MISS, "provider" => P::NAME, "resource" => resource.to_string())
                        .increment(1);
                }
                Err(err) => {
                    tracing::warn!("Lookup of {key} in {}/{resource} failed: {err}", P::NAME);
                    counter!(BACKEND_FETCH_ERROR, "provider" => P::NAME, "resource" => resource.to_string())
                        .increment(1);
                }
            }
        }

        None
    }

    async fn upsert(&self, record: &TrackingRecord) -> bool {
        let Some(provider) = self.provider.as_ref() else {
            return false;
        };
        let key = record.key();

        for resource in self.resources.iter() {
            let start = Instant::now();
            let result = provider.upsert(resource, &key, record).await;
            histogram!(BACKEND_REQUEST_DURATION, "provider" => P::NAME)
                .record(start.elapsed().as_secs_f64());

            match result {
                Ok(()) => {
                    tracing::debug!("Stored {key} in {}/{resource}", P::NAME);
                    counter!(BACKEND_UPSERT_SUCCESS, "provider" => P::NAME).increment(1);
                    return true;
                }
                Err(err) => {
                    tracing::warn!("Upsert of {key} into {}/{resource} failed: {err}", P::NAME);
                    counter!(BACKEND_UPSERT_FAILURE, "provider" => P::NAME).increment(1);
                }
            }
        }

        false
    }
}
