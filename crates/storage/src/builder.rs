use std::{sync::Arc, time::Duration};

use portal_domain::config::DEFAULT_VERIFY_DELAY;
use portal_domain::services::{cache::CollectionCache, retry::RetryPolicy};

use crate::{source::ConfigSource, ConfigStorage};

pub struct StorageBuilder {
    source: Arc<dyn ConfigSource>,
    cache_ttl: Duration,
    retry: RetryPolicy,
    verify_delay: Duration,
}

impl StorageBuilder {
    pub fn new(source: Arc<dyn ConfigSource>) -> Self {
        Self {
            source,
            cache_ttl: CollectionCache::DEFAULT_TTL,
            retry: RetryPolicy::default(),
            verify_delay: DEFAULT_VERIFY_DELAY,
        }
    }

    pub fn cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    pub fn retry(mut self, policy: RetryPolicy) -> Self {
        self.retry = policy;
        self
    }

    pub fn verify_delay(mut self, delay: Duration) -> Self {
        self.verify_delay = delay;
        self
    }

    pub fn build(self) -> ConfigStorage {
        ConfigStorage::from_parts(
            self.source,
            CollectionCache::new(self.cache_ttl),
            self.retry,
            self.verify_delay,
        )
    }
}
