use async_trait::async_trait;
use portal_domain::model::ServerInfo;
use portal_domain::storage::{ServerCatalogStore, StorageResult};
use tracing::info;

use crate::{collection::Collection, ConfigStorage};

#[async_trait]
impl ServerCatalogStore for ConfigStorage {
    async fn list_servers(&self) -> Vec<ServerInfo> {
        self.load(Collection::Servers).await
    }

    async fn find_server(&self, id: &str) -> Option<ServerInfo> {
        self.list_servers()
            .await
            .into_iter()
            .find(|server| server.id == id)
    }

    async fn add_server(&self, server: ServerInfo) -> StorageResult<bool> {
        server.validate()?;

        let _guard = self.lock(Collection::Servers).await;
        let mut servers: Vec<ServerInfo> = self.load_for_update(Collection::Servers).await?;
        if servers.iter().any(|existing| existing.id == server.id) {
            return Ok(false);
        }
        info!(id = server.id, ip = server.ip, "server added to catalog");
        servers.push(server);
        self.save(Collection::Servers, &servers).await?;
        Ok(true)
    }

    async fn update_server(&self, server: ServerInfo) -> StorageResult<bool> {
        server.validate()?;

        let _guard = self.lock(Collection::Servers).await;
        let mut servers: Vec<ServerInfo> = self.load_for_update(Collection::Servers).await?;
        let Some(slot) = servers.iter_mut().find(|existing| existing.id == server.id) else {
            return Ok(false);
        };
        *slot = server;
        self.save(Collection::Servers, &servers).await?;
        Ok(true)
    }

    async fn remove_server(&self, id: &str) -> StorageResult<bool> {
        let _guard = self.lock(Collection::Servers).await;
        let mut servers: Vec<ServerInfo> = self.load_for_update(Collection::Servers).await?;
        let before = servers.len();
        servers.retain(|existing| existing.id != id);
        if servers.len() == before {
            return Ok(false);
        }
        self.save(Collection::Servers, &servers).await?;
        info!(id, "server removed from catalog");
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use portal_domain::services::retry::RetryPolicy;
    use portal_domain::storage::StorageError;
    use serde_json::json;

    use super::*;
    use crate::source::MemoryConfigSource;

    fn storage(source: &Arc<MemoryConfigSource>) -> ConfigStorage {
        ConfigStorage::builder(source.clone())
            .retry(RetryPolicy::no_retry())
            .build()
    }

    fn server(id: &str) -> ServerInfo {
        ServerInfo {
            id: id.into(),
            name: "gateway".into(),
            ip: "172.16.0.1".into(),
            port: None,
            description: Some("shared".into()),
        }
    }

    #[tokio::test]
    async fn catalog_crud() {
        let source = Arc::new(MemoryConfigSource::new());
        let storage = storage(&source);

        assert!(storage.add_server(server("gw")).await.unwrap());
        assert!(!storage.add_server(server("gw")).await.unwrap());

        let mut moved = server("gw");
        moved.ip = "172.16.0.2".into();
        assert!(storage.update_server(moved).await.unwrap());
        assert!(!storage.update_server(server("nope")).await.unwrap());
        assert_eq!(storage.find_server("gw").await.unwrap().ip, "172.16.0.2");

        assert!(storage.remove_server("gw").await.unwrap());
        assert!(!storage.remove_server("gw").await.unwrap());
        assert!(storage.list_servers().await.is_empty());
    }

    #[tokio::test]
    async fn catalog_reads_stringified_blobs() {
        let source = Arc::new(MemoryConfigSource::new().with_value(
            Collection::Servers.data_id(),
            json!(r#"[{"id":"gw","name":"gateway","ip":"1.2.3.4"}]"#),
        ));
        let found = storage(&source).find_server("gw").await.unwrap();
        assert_eq!(found.ip, "1.2.3.4");
        assert_eq!(found.port, None);
    }

    #[tokio::test]
    async fn malformed_catalog_is_not_overwritten() {
        let source = Arc::new(MemoryConfigSource::new());
        source.set_raw(Collection::Servers.data_id(), "{broken");
        let storage = storage(&source);

        assert!(storage.list_servers().await.is_empty());
        let err = storage.add_server(server("gw")).await.unwrap_err();
        assert!(matches!(err, StorageError::Malformed { .. }));
        assert_eq!(source.publish_count(), 0);
    }
}
