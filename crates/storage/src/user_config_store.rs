use async_trait::async_trait;
use portal_domain::model::{validate_username, UserConfig};
use portal_domain::storage::{StorageResult, UserConfigStore};
use serde_json::{Map, Value};

use crate::{collection::Collection, ConfigStorage};

#[async_trait]
impl UserConfigStore for ConfigStorage {
    async fn get_user_config(&self, username: &str) -> Option<UserConfig> {
        self.load::<UserConfig>(Collection::UserConfigs)
            .await
            .into_iter()
            .find(|config| config.username == username)
    }

    /// Replaces the user's settings wholesale, creating the entry if needed.
    async fn save_user_config(
        &self,
        username: &str,
        settings: Map<String, Value>,
    ) -> StorageResult<UserConfig> {
        validate_username(username)?;

        let _guard = self.lock(Collection::UserConfigs).await;
        let mut configs: Vec<UserConfig> = self.load_for_update(Collection::UserConfigs).await?;
        let saved = UserConfig {
            username: username.to_string(),
            settings,
        };
        match configs.iter_mut().find(|config| config.username == username) {
            Some(existing) => *existing = saved.clone(),
            None => configs.push(saved.clone()),
        }
        self.save(Collection::UserConfigs, &configs).await?;
        Ok(saved)
    }

    async fn delete_user_config(&self, username: &str) -> StorageResult<bool> {
        let _guard = self.lock(Collection::UserConfigs).await;
        let mut configs: Vec<UserConfig> = self.load_for_update(Collection::UserConfigs).await?;
        let before = configs.len();
        configs.retain(|config| config.username != username);
        if configs.len() == before {
            return Ok(false);
        }
        self.save(Collection::UserConfigs, &configs).await?;
        Ok(true)
    }
}
