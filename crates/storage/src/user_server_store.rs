use async_trait::async_trait;
use portal_domain::model::{validate_username, ServerInfo, UserServers};
use portal_domain::storage::{StorageResult, UserServerStore};

use crate::{collection::Collection, ConfigStorage};

#[async_trait]
impl UserServerStore for ConfigStorage {
    async fn get_user_servers(&self, username: &str) -> Vec<ServerInfo> {
        self.load::<UserServers>(Collection::UserServers)
            .await
            .into_iter()
            .find(|entry| entry.username == username)
            .map(|entry| entry.servers)
            .unwrap_or_default()
    }

    async fn add_user_server(&self, username: &str, server: ServerInfo) -> StorageResult<bool> {
        validate_username(username)?;
        server.validate()?;

        let _guard = self.lock(Collection::UserServers).await;
        let mut entries: Vec<UserServers> = self.load_for_update(Collection::UserServers).await?;
        match entries.iter_mut().find(|entry| entry.username == username) {
            Some(entry) => {
                if entry.servers.iter().any(|existing| existing.id == server.id) {
                    return Ok(false);
                }
                entry.servers.push(server);
            }
            None => entries.push(UserServers {
                username: username.to_string(),
                servers: vec![server],
            }),
        }
        self.save(Collection::UserServers, &entries).await?;
        Ok(true)
    }

    async fn update_user_server(&self, username: &str, server: ServerInfo) -> StorageResult<bool> {
        server.validate()?;

        let _guard = self.lock(Collection::UserServers).await;
        let mut entries: Vec<UserServers> = self.load_for_update(Collection::UserServers).await?;
        let Some(slot) = entries
            .iter_mut()
            .filter(|entry| entry.username == username)
            .flat_map(|entry| entry.servers.iter_mut())
            .find(|existing| existing.id == server.id)
        else {
            return Ok(false);
        };
        *slot = server;
        self.save(Collection::UserServers, &entries).await?;
        Ok(true)
    }

    async fn remove_user_server(&self, username: &str, server_id: &str) -> StorageResult<bool> {
        let _guard = self.lock(Collection::UserServers).await;
        let mut entries: Vec<UserServers> = self.load_for_update(Collection::UserServers).await?;
        let Some(entry) = entries.iter_mut().find(|entry| entry.username == username) else {
            return Ok(false);
        };
        let before = entry.servers.len();
        entry.servers.retain(|existing| existing.id != server_id);
        if entry.servers.len() == before {
            return Ok(false);
        }
        self.save(Collection::UserServers, &entries).await?;
        Ok(true)
    }

    async fn delete_user_servers(&self, username: &str) -> StorageResult<bool> {
        let _guard = self.lock(Collection::UserServers).await;
        let mut entries: Vec<UserServers> = self.load_for_update(Collection::UserServers).await?;
        let before = entries.len();
        entries.retain(|entry| entry.username != username);
        if entries.len() == before {
            return Ok(false);
        }
        self.save(Collection::UserServers, &entries).await?;
        Ok(true)
    }
}
