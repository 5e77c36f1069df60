//! Delayed verification of invite-code inserts.
//!
//! The config store has acknowledged publishes it never applied. After new
//! codes are published, a one-shot task waits, re-reads the collection
//! bypassing the cache, and if any of those records are missing merges them
//! into the list the store returned and publishes it once. There is no
//! second attempt.

use metrics::counter;
use portal_domain::model::InviteCode;
use tokio::{task::JoinHandle, time::sleep};
use tracing::{info, warn};

use crate::{collection::Collection, layer::decode, ConfigStorage};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Every code was found in the store.
    Verified,
    /// Some codes were missing and were published again.
    Republished { missing: Vec<String> },
    /// The re-read failed; nothing was done.
    CheckFailed(String),
    /// Codes were missing but the republish failed or the stored list could
    /// not be merged.
    RepairFailed { missing: Vec<String>, reason: String },
}

impl ReconcileOutcome {
    fn label(&self) -> &'static str {
        match self {
            ReconcileOutcome::Verified => "verified",
            ReconcileOutcome::Republished { .. } => "republished",
            ReconcileOutcome::CheckFailed(_) => "check_failed",
            ReconcileOutcome::RepairFailed { .. } => "repair_failed",
        }
    }
}

/// Spawns the verification task for the records a publish just carried.
/// Callers normally drop the handle.
pub(crate) fn schedule(
    storage: ConfigStorage,
    published: Vec<InviteCode>,
) -> JoinHandle<ReconcileOutcome> {
    tokio::spawn(async move {
        sleep(storage.verify_delay()).await;
        let outcome = verify(&storage, &published).await;
        counter!("invite_reconcile_total", "result" => outcome.label()).increment(1);
        outcome
    })
}

async fn verify(storage: &ConfigStorage, published: &[InviteCode]) -> ReconcileOutcome {
    let key = Collection::InviteCodes.data_id();
    // Held across the re-read so no local write lands between it and the merge.
    let _guard = storage.lock(Collection::InviteCodes).await;

    let remote = match storage.read_fresh(key).await {
        Ok(value) => value,
        Err(err) => {
            warn!(error = %err, "invite code verification read failed");
            return ReconcileOutcome::CheckFailed(err.to_string());
        }
    };
    let present: Vec<InviteCode> = match decode(remote) {
        Ok(present) => present,
        Err(reason) => {
            warn!(reason, "stored invite code list is malformed, not republishing");
            return ReconcileOutcome::RepairFailed {
                missing: published.iter().map(|code| code.code.clone()).collect(),
                reason,
            };
        }
    };
    let lost: Vec<&InviteCode> = published
        .iter()
        .filter(|code| !present.iter().any(|entry| entry.code == code.code))
        .collect();
    if lost.is_empty() {
        return ReconcileOutcome::Verified;
    }
    let missing: Vec<String> = lost.iter().map(|code| code.code.clone()).collect();
    warn!(?missing, "invite codes missing after publish, republishing");

    let mut merged = present;
    merged.extend(lost.into_iter().cloned());
    let value = match serde_json::to_value(&merged) {
        Ok(value) => value,
        Err(err) => {
            return ReconcileOutcome::RepairFailed {
                missing,
                reason: err.to_string(),
            }
        }
    };

    let content = value.to_string();
    let version = storage.cache().store_dirty(key, value);
    match storage.source().publish(key, &content).await {
        Ok(()) => {
            storage.cache().mark_clean(key, version);
            info!(?missing, "invite code list republished");
            ReconcileOutcome::Republished { missing }
        }
        Err(err) => {
            storage.cache().publish_failed(key, version);
            warn!(error = %err, ?missing, "invite code republish failed");
            ReconcileOutcome::RepairFailed {
                missing,
                reason: err.to_string(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use portal_domain::storage::InviteCodeStore;
    use serde_json::json;

    use super::*;
    use crate::source::MemoryConfigSource;

    fn storage(source: &Arc<MemoryConfigSource>) -> ConfigStorage {
        ConfigStorage::builder(source.clone())
            .verify_delay(Duration::from_millis(2_000))
            .build()
    }

    fn stored_codes(source: &MemoryConfigSource) -> Vec<String> {
        decode::<InviteCode>(source.value(Collection::InviteCodes.data_id()))
            .unwrap()
            .into_iter()
            .map(|code| code.code)
            .collect()
    }

    async fn seed(storage: &ConfigStorage, code: &str) -> Vec<InviteCode> {
        let codes = vec![InviteCode::new(code)];
        storage.save(Collection::InviteCodes, &codes).await.unwrap();
        codes
    }

    #[tokio::test(start_paused = true)]
    async fn verified_when_publish_landed() {
        let source = Arc::new(MemoryConfigSource::new());
        let storage = storage(&source);
        let published = seed(&storage, "ABC123").await;

        let outcome = schedule(storage, published).await.unwrap();
        assert_eq!(outcome, ReconcileOutcome::Verified);
    }

    #[tokio::test(start_paused = true)]
    async fn republishes_silently_dropped_codes() {
        let source = Arc::new(MemoryConfigSource::new());
        let storage = storage(&source);
        source.drop_next_publishes(1);

        let published = seed(&storage, "ABC123").await;
        assert!(stored_codes(&source).is_empty());

        let outcome = schedule(storage.clone(), published).await.unwrap();
        assert_eq!(
            outcome,
            ReconcileOutcome::Republished {
                missing: vec!["ABC123".into()]
            }
        );
        assert_eq!(stored_codes(&source), vec!["ABC123".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn add_invite_code_repairs_itself_after_the_delay() {
        let source = Arc::new(MemoryConfigSource::new());
        let storage = storage(&source);
        source.drop_next_publishes(1);

        storage.add_invite_code("ZZZ999").await.unwrap();
        assert!(stored_codes(&source).is_empty());

        sleep(Duration::from_millis(2_500)).await;
        assert_eq!(stored_codes(&source), vec!["ZZZ999".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn repair_survives_a_cache_refresh_before_the_delay() {
        let source = Arc::new(MemoryConfigSource::new());
        let storage = ConfigStorage::builder(source.clone())
            .cache_ttl(Duration::from_millis(500))
            .verify_delay(Duration::from_millis(2_000))
            .build();
        source.drop_next_publishes(1);

        storage.add_invite_code("ZZZ999").await.unwrap();
        sleep(Duration::from_millis(1_000)).await;
        // The expired entry was replaced by what the store really holds.
        assert!(!storage.check_invite_code("ZZZ999").await);

        sleep(Duration::from_millis(1_500)).await;
        assert_eq!(stored_codes(&source), vec!["ZZZ999".to_string()]);
        assert!(storage.check_invite_code("ZZZ999").await);
    }

    #[tokio::test(start_paused = true)]
    async fn repair_keeps_codes_other_writers_added() {
        let source = Arc::new(MemoryConfigSource::new());
        let storage = storage(&source);
        source.drop_next_publishes(1);
        let published = seed(&storage, "ABC123").await;
        source.set_value(
            Collection::InviteCodes.data_id(),
            json!([{ "code": "OTHER1", "used": false }]),
        );

        let outcome = schedule(storage, published).await.unwrap();
        assert!(matches!(outcome, ReconcileOutcome::Republished { .. }));
        assert_eq!(
            stored_codes(&source),
            vec!["OTHER1".to_string(), "ABC123".to_string()]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn repair_is_attempted_only_once() {
        let source = Arc::new(MemoryConfigSource::new());
        let storage = storage(&source);
        let published = seed(&storage, "ABC123").await;
        source.set_value(Collection::InviteCodes.data_id(), json!([]));
        source.set_fail_publishes(true);
        let before = source.publish_count();

        let outcome = schedule(storage, published).await.unwrap();
        assert!(matches!(outcome, ReconcileOutcome::RepairFailed { .. }));
        assert_eq!(source.publish_count(), before + 1);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_reread_does_nothing() {
        let source = Arc::new(MemoryConfigSource::new());
        let storage = storage(&source);
        source.set_fail_fetches(true);

        let outcome = schedule(storage, vec![InviteCode::new("ABC123")])
            .await
            .unwrap();
        assert!(matches!(outcome, ReconcileOutcome::CheckFailed(_)));
        assert_eq!(source.publish_count(), 0);
    }
}
