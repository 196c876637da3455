pub mod backend;
pub mod cloud;
pub mod config;
pub mod coordinator;
pub mod firebase;
pub mod local_cache;
pub mod metrics_defs;
pub mod normalize;
pub mod seed;
pub mod share_link;
pub mod supabase;
pub mod types;

#[cfg(test)]
mod testutils;

use backend::BackendError;
use cloud::CloudResolver;
use coordinator::TrackingCoordinator;
use local_cache::{FilesystemBacking, LocalCacheStore};
use std::sync::Arc;

/// Wires the local cache and the remote backends described by `config` into
/// a coordinator. The cache lives in memory when no path is configured.
pub fn build(config: &config::Config) -> Result<TrackingCoordinator, BackendError> {
    let local = match &config.local_cache.path {
        Some(path) => LocalCacheStore::new(Arc::new(FilesystemBacking::new(path))),
        None => LocalCacheStore::in_memory(),
    };
    let cloud = CloudResolver::from_config(&config.cloud)?;

    tracing::debug!("Enabled remote backends: {:?}", cloud.enabled_backends());
    Ok(TrackingCoordinator::new(Arc::new(local), Arc::new(cloud)))
}
