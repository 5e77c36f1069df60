use async_trait::async_trait;
use chrono::Utc;
use portal_domain::model::{
    generate_invite_code, validate_batch_size, validate_invite_code, InviteCode,
};
use portal_domain::storage::{InviteCodeStore, StorageError, StorageResult};
use tracing::info;

use crate::{collection::Collection, reconcile, ConfigStorage};

#[async_trait]
impl InviteCodeStore for ConfigStorage {
    async fn list_invite_codes(&self) -> Vec<InviteCode> {
        self.load(Collection::InviteCodes).await
    }

    async fn add_invite_code(&self, code: &str) -> StorageResult<Option<InviteCode>> {
        validate_invite_code(code)?;

        let created = {
            let _guard = self.lock(Collection::InviteCodes).await;
            let mut codes: Vec<InviteCode> =
                self.load_for_update(Collection::InviteCodes).await?;
            if codes.iter().any(|existing| existing.code == code) {
                return Ok(None);
            }
            let created = InviteCode::new(code);
            codes.push(created.clone());
            self.save(Collection::InviteCodes, &codes).await?;
            created
        };

        info!(code = created.code, "invite code added");
        reconcile::schedule(self.clone(), vec![created.clone()]);
        Ok(Some(created))
    }

    async fn generate_invite_codes(&self, count: usize) -> StorageResult<Vec<InviteCode>> {
        validate_batch_size(count)?;

        let generated = {
            let _guard = self.lock(Collection::InviteCodes).await;
            let mut codes: Vec<InviteCode> =
                self.load_for_update(Collection::InviteCodes).await?;
            let mut generated = Vec::with_capacity(count);
            while generated.len() < count {
                let code =
                    generate_invite_code().map_err(|err| StorageError::Random(err.to_string()))?;
                if codes.iter().any(|existing| existing.code == code) {
                    continue;
                }
                let created = InviteCode::new(code);
                codes.push(created.clone());
                generated.push(created);
            }
            self.save(Collection::InviteCodes, &codes).await?;
            generated
        };

        info!(count = generated.len(), "invite codes generated");
        reconcile::schedule(self.clone(), generated.clone());
        Ok(generated)
    }

    async fn check_invite_code(&self, code: &str) -> bool {
        self.list_invite_codes()
            .await
            .iter()
            .any(|existing| existing.code == code && existing.is_available())
    }

    async fn mark_invite_code_as_used(&self, code: &str, username: &str) -> StorageResult<bool> {
        let _guard = self.lock(Collection::InviteCodes).await;
        let mut codes: Vec<InviteCode> = self.load_for_update(Collection::InviteCodes).await?;
        let Some(entry) = codes
            .iter_mut()
            .find(|existing| existing.code == code && existing.is_available())
        else {
            return Ok(false);
        };
        entry.mark_used(username, Utc::now());
        self.save(Collection::InviteCodes, &codes).await?;
        Ok(true)
    }

    async fn delete_invite_code(&self, code: &str) -> StorageResult<bool> {
        let _guard = self.lock(Collection::InviteCodes).await;
        let mut codes: Vec<InviteCode> = self.load_for_update(Collection::InviteCodes).await?;
        let Some(position) = codes.iter().position(|existing| existing.code == code) else {
            return Ok(false);
        };
        if codes[position].used {
            info!(code, "refusing to delete used invite code");
            return Ok(false);
        }
        codes.remove(position);
        self.save(Collection::InviteCodes, &codes).await?;
        Ok(true)
    }
}
