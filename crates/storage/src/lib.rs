//! Config-store backed implementations of the domain accessor traits.
//!
//! Every collection lives under one data id as a JSON array. Reads go
//! through a TTL cache that falls back to stale or unconfirmed entries when
//! the store is unreachable; writes update the cache first, then publish
//! with retry. Invite-code inserts are re-checked after a delay because the
//! store has been seen to drop writes it acknowledged.

mod builder;
mod collection;
mod invite_store;
mod layer;
mod reconcile;
mod server_store;
pub mod source;
mod user_config_store;
mod user_server_store;
mod user_store;

use std::{sync::Arc, time::Duration};

use portal_domain::config::ConfigStoreConfig;
use portal_domain::services::{cache::CollectionCache, retry::RetryPolicy};
use tokio::sync::{Mutex, MutexGuard};

pub use builder::StorageBuilder;
pub use collection::Collection;
pub use layer::{ReadSource, Snapshot};
pub use reconcile::ReconcileOutcome;
pub use source::{ConfigSource, HttpConfigClient, MemoryConfigSource, SourceError};

/// Shared storage handle used by the HTTP API.
#[derive(Clone)]
pub struct ConfigStorage {
    inner: Arc<Inner>,
}

struct Inner {
    source: Arc<dyn ConfigSource>,
    cache: CollectionCache,
    retry: RetryPolicy,
    verify_delay: Duration,
    /// One write lock per collection, indexed by `Collection::index`.
    locks: [Mutex<()>; Collection::ALL.len()],
}

impl ConfigStorage {
    /// Builds a storage handle talking to the config store over HTTP.
    pub fn connect(config: &ConfigStoreConfig) -> Result<Self, SourceError> {
        let client = HttpConfigClient::new(config)?;
        Ok(Self::builder(Arc::new(client))
            .cache_ttl(config.cache_ttl())
            .retry(config.retry())
            .verify_delay(config.verify_delay())
            .build())
    }

    pub fn builder(source: Arc<dyn ConfigSource>) -> StorageBuilder {
        StorageBuilder::new(source)
    }

    pub(crate) fn from_parts(
        source: Arc<dyn ConfigSource>,
        cache: CollectionCache,
        retry: RetryPolicy,
        verify_delay: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                source,
                cache,
                retry,
                verify_delay,
                locks: std::array::from_fn(|_| Mutex::new(())),
            }),
        }
    }

    pub fn cache(&self) -> &CollectionCache {
        &self.inner.cache
    }

    pub fn source(&self) -> &dyn ConfigSource {
        self.inner.source.as_ref()
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.inner.retry
    }

    pub fn verify_delay(&self) -> Duration {
        self.inner.verify_delay
    }

    /// Serializes read-modify-write cycles on one collection within this
    /// process. Other processes writing the same data id still race.
    pub(crate) async fn lock(&self, collection: Collection) -> MutexGuard<'_, ()> {
        self.inner.locks[collection.index()].lock().await
    }
}
