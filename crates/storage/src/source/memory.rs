use std::{
    collections::HashMap,
    sync::{Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use async_trait::async_trait;
use serde_json::Value;

use super::{parse_payload, ConfigSource, SourceError};

#[derive(Debug, Default)]
struct MemoryState {
    values: HashMap<String, String>,
    fail_fetches: bool,
    fail_publishes: bool,
    pending_publish_failures: u32,
    pending_publish_drops: u32,
    publish_delay: Duration,
    fetches: u64,
    publishes: u64,
}

/// In-process config store with failure injection. Used by the test suites
/// and for running the API without a config server.
#[derive(Debug, Default)]
pub struct MemoryConfigSource {
    state: Mutex<MemoryState>,
}

impl MemoryConfigSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_value(self, data_id: &str, value: Value) -> Self {
        self.set_value(data_id, value);
        self
    }

    pub fn set_value(&self, data_id: &str, value: Value) {
        self.set_raw(data_id, value.to_string());
    }

    /// Stores `content` verbatim, e.g. a payload that is not JSON.
    pub fn set_raw(&self, data_id: &str, content: impl Into<String>) {
        self.state().values.insert(data_id.to_string(), content.into());
    }

    /// What the store currently holds, parsed like a fetch would.
    pub fn value(&self, data_id: &str) -> Option<Value> {
        self.state()
            .values
            .get(data_id)
            .and_then(|raw| parse_payload(raw))
    }

    pub fn set_fail_fetches(&self, fail: bool) {
        self.state().fail_fetches = fail;
    }

    /// Every publish fails until switched off.
    pub fn set_fail_publishes(&self, fail: bool) {
        self.state().fail_publishes = fail;
    }

    /// The next `count` publishes fail with a transport error.
    pub fn fail_next_publishes(&self, count: u32) {
        self.state().pending_publish_failures = count;
    }

    /// The next `count` publishes report success without storing anything.
    pub fn drop_next_publishes(&self, count: u32) {
        self.state().pending_publish_drops = count;
    }

    /// Every publish waits `delay` before it is applied.
    pub fn set_publish_delay(&self, delay: Duration) {
        self.state().publish_delay = delay;
    }

    pub fn fetch_count(&self) -> u64 {
        self.state().fetches
    }

    pub fn publish_count(&self) -> u64 {
        self.state().publishes
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl ConfigSource for MemoryConfigSource {
    async fn fetch(&self, data_id: &str) -> Result<Option<Value>, SourceError> {
        let mut state = self.state();
        state.fetches += 1;
        if state.fail_fetches {
            return Err(SourceError::Transport("injected fetch failure".into()));
        }
        Ok(state.values.get(data_id).and_then(|raw| parse_payload(raw)))
    }

    async fn publish(&self, data_id: &str, content: &str) -> Result<(), SourceError> {
        let delay = self.state().publish_delay;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        let mut state = self.state();
        state.publishes += 1;
        if state.fail_publishes {
            return Err(SourceError::Transport("injected publish failure".into()));
        }
        if state.pending_publish_failures > 0 {
            state.pending_publish_failures -= 1;
            return Err(SourceError::Transport("injected publish failure".into()));
        }
        if state.pending_publish_drops > 0 {
            state.pending_publish_drops -= 1;
            return Ok(());
        }
        state
            .values
            .insert(data_id.to_string(), content.to_string());
        Ok(())
    }
}
