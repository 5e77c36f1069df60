//! Cache layer: TTL reads with stale/dirty fallback, optimistic writes
//! published through the retry helper.

use metrics::counter;
use portal_domain::services::retry::retry_with_backoff;
use portal_domain::storage::{StorageError, StorageResult};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::{collection::Collection, source::SourceError, ConfigStorage};

/// Which branch of the read path produced a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadSource {
    /// Clean cache entry younger than the TTL.
    Fresh,
    /// A local write is still being published; its value wins over the store.
    Pending,
    /// Fetched from the config store.
    Fetched,
    /// Fetch failed; returned an unconfirmed local write.
    Dirty,
    /// Fetch failed; returned an expired entry.
    Stale,
    /// The store has nothing under this key.
    Absent,
    /// Fetch failed and nothing is cached.
    Unavailable,
}

impl ReadSource {
    pub fn label(self) -> &'static str {
        match self {
            ReadSource::Fresh => "fresh",
            ReadSource::Pending => "pending",
            ReadSource::Fetched => "fetched",
            ReadSource::Dirty => "dirty",
            ReadSource::Stale => "stale",
            ReadSource::Absent => "absent",
            ReadSource::Unavailable => "unavailable",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub value: Option<Value>,
    pub source: ReadSource,
    pub error: Option<SourceError>,
}

impl ConfigStorage {
    /// Cached read. Never fails: a failed fetch falls back to a dirty entry,
    /// then to any entry, then to `None`.
    pub async fn read(&self, key: &str) -> Option<Value> {
        self.read_snapshot(key).await.value
    }

    pub async fn read_snapshot(&self, key: &str) -> Snapshot {
        let snapshot = self.resolve(key).await;
        counter!("config_cache_reads_total", "result" => snapshot.source.label()).increment(1);
        snapshot
    }

    async fn resolve(&self, key: &str) -> Snapshot {
        if let Some(value) = self.cache().fresh(key) {
            return Snapshot {
                value: Some(value).filter(|value| !value.is_null()),
                source: ReadSource::Fresh,
                error: None,
            };
        }

        let seen = self.cache().get(key);
        if let Some(entry) = seen.as_ref().filter(|entry| entry.pending) {
            return Snapshot {
                value: Some(entry.value.clone()).filter(|value| !value.is_null()),
                source: ReadSource::Pending,
                error: None,
            };
        }
        let seen_version = seen.map(|entry| entry.version);

        match self.source().fetch(key).await {
            Ok(Some(value)) => {
                if !self.cache().store_fetched(key, value.clone(), seen_version) {
                    debug!(key, "cache entry changed during fetch, keeping it");
                }
                Snapshot {
                    value: Some(value),
                    source: ReadSource::Fetched,
                    error: None,
                }
            }
            Ok(None) => {
                if !self.cache().store_fetched(key, Value::Null, seen_version) {
                    debug!(key, "cache entry changed during fetch, keeping it");
                }
                Snapshot {
                    value: None,
                    source: ReadSource::Absent,
                    error: None,
                }
            }
            Err(err) => {
                let cached = self.cache().get(key);
                let source = match &cached {
                    Some(entry) if entry.dirty => ReadSource::Dirty,
                    Some(_) => ReadSource::Stale,
                    None => ReadSource::Unavailable,
                };
                warn!(key, error = %err, fallback = source.label(), "config fetch failed");
                Snapshot {
                    value: cached.map(|entry| entry.value).filter(|value| !value.is_null()),
                    source,
                    error: Some(err),
                }
            }
        }
    }

    /// Reads straight from the config store, leaving the cache untouched.
    pub async fn read_fresh(&self, key: &str) -> Result<Option<Value>, SourceError> {
        self.source().fetch(key).await
    }

    /// Optimistic write: the cache holds `value` (marked dirty and pending)
    /// before the publish starts, and reads serve it until the publish
    /// settles. The dirty flag is cleared only once the store confirms; on
    /// failure it stays set and the error is returned.
    pub async fn write(&self, key: &str, value: Value) -> StorageResult<()> {
        let content = value.to_string();
        let version = self.cache().store_dirty(key, value);

        let published = retry_with_backoff(&self.retry_policy(), || {
            self.source().publish(key, &content)
        })
        .await;

        match published {
            Ok(()) => {
                if !self.cache().mark_clean(key, version) {
                    debug!(key, version, "cache entry superseded before publish confirmed");
                }
                counter!("config_store_publish_total", "result" => "ok").increment(1);
                Ok(())
            }
            Err(err) => {
                self.cache().publish_failed(key, version);
                counter!("config_store_publish_total", "result" => "failed").increment(1);
                warn!(key, error = %err, "publish failed, cache entry left dirty");
                Err(StorageError::Unconfirmed {
                    key: key.to_string(),
                    reason: err.to_string(),
                })
            }
        }
    }

    /// Typed read for display paths: decoding problems and outages degrade to
    /// an empty collection.
    pub(crate) async fn load<T: DeserializeOwned>(&self, collection: Collection) -> Vec<T> {
        let key = collection.data_id();
        let snapshot = self.read_snapshot(key).await;
        match decode(snapshot.value) {
            Ok(items) => items,
            Err(reason) => {
                warn!(key, reason, "ignoring malformed collection");
                Vec::new()
            }
        }
    }

    /// Typed read for read-modify-write paths. Refuses to continue when the
    /// collection is unavailable or malformed, so a rewrite cannot replace
    /// remote data the process never saw.
    pub(crate) async fn load_for_update<T: DeserializeOwned>(
        &self,
        collection: Collection,
    ) -> StorageResult<Vec<T>> {
        let key = collection.data_id();
        let snapshot = self.read_snapshot(key).await;
        if snapshot.source == ReadSource::Unavailable {
            return Err(StorageError::Unavailable {
                key: key.to_string(),
                reason: snapshot
                    .error
                    .map(|err| err.to_string())
                    .unwrap_or_default(),
            });
        }
        decode(snapshot.value).map_err(|reason| StorageError::Malformed {
            key: key.to_string(),
            reason,
        })
    }

    pub(crate) async fn save<T: Serialize>(
        &self,
        collection: Collection,
        items: &[T],
    ) -> StorageResult<()> {
        let key = collection.data_id();
        let value = serde_json::to_value(items).map_err(|err| StorageError::Malformed {
            key: key.to_string(),
            reason: err.to_string(),
        })?;
        self.write(key, value).await
    }
}

/// Decodes a collection blob. Absent and empty values are empty collections;
/// a string payload is parsed as JSON text.
pub(crate) fn decode<T: DeserializeOwned>(value: Option<Value>) -> Result<Vec<T>, String> {
    match value {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::String(raw)) if raw.trim().is_empty() => Ok(Vec::new()),
        Some(Value::String(raw)) => serde_json::from_str(&raw).map_err(|err| err.to_string()),
        Some(other) => serde_json::from_value(other).map_err(|err| err.to_string()),
    }
}
