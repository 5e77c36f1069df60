use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::model::{
    CascadeReport, InviteCode, NewUser, ServerInfo, User, UserConfig, UserUpdate, ValidationError,
};

/// Common result alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// The collection could not be fetched and nothing is cached for it.
    #[error("collection `{key}` is unavailable: {reason}")]
    Unavailable { key: String, reason: String },
    /// The local cache holds the new value but the config store never
    /// confirmed it.
    #[error("write to `{key}` was not confirmed: {reason}")]
    Unconfirmed { key: String, reason: String },
    #[error("collection `{key}` is malformed: {reason}")]
    Malformed { key: String, reason: String },
    #[error("invalid input: {0}")]
    Invalid(#[from] ValidationError),
    #[error("random source failed: {0}")]
    Random(String),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistrationError {
    #[error("invalid registration: {0}")]
    Invalid(#[from] ValidationError),
    #[error("invite code is missing or already used")]
    InviteCodeUnavailable,
    #[error("username is already taken")]
    UsernameTaken,
    #[error("email is already registered")]
    EmailTaken,
    #[error("phone number is already registered")]
    PhoneTaken,
    #[error("storage failure: {0}")]
    Storage(#[from] StorageError),
}

/// Reads never fail: they degrade to whatever the cache holds, or to an empty
/// collection. Writes report `Ok(false)`/`Ok(None)` for domain rejections and
/// `Err` when the config store did not take the write.
#[async_trait]
pub trait InviteCodeStore: Send + Sync {
    async fn list_invite_codes(&self) -> Vec<InviteCode>;
    /// `Ok(None)` when the code already exists.
    async fn add_invite_code(&self, code: &str) -> StorageResult<Option<InviteCode>>;
    async fn generate_invite_codes(&self, count: usize) -> StorageResult<Vec<InviteCode>>;
    /// `true` when the code exists and has not been used.
    async fn check_invite_code(&self, code: &str) -> bool;
    async fn mark_invite_code_as_used(&self, code: &str, username: &str) -> StorageResult<bool>;
    /// Refuses (returns `false`) for used or unknown codes.
    async fn delete_invite_code(&self, code: &str) -> StorageResult<bool>;
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn list_users(&self) -> Vec<User>;
    async fn find_user(&self, username: &str) -> Option<User>;
    async fn authenticate(&self, identifier: &str, password: &str) -> Option<User>;
    async fn register_user(&self, new_user: NewUser) -> Result<User, RegistrationError>;
    async fn update_user(&self, username: &str, update: UserUpdate) -> StorageResult<Option<User>>;
    /// Removes the user, then their settings, then their servers. Each step
    /// runs regardless of the previous one's outcome.
    async fn delete_user(&self, username: &str) -> CascadeReport;
}

#[async_trait]
pub trait UserConfigStore: Send + Sync {
    async fn get_user_config(&self, username: &str) -> Option<UserConfig>;
    async fn save_user_config(
        &self,
        username: &str,
        settings: Map<String, Value>,
    ) -> StorageResult<UserConfig>;
    async fn delete_user_config(&self, username: &str) -> StorageResult<bool>;
}

#[async_trait]
pub trait UserServerStore: Send + Sync {
    async fn get_user_servers(&self, username: &str) -> Vec<ServerInfo>;
    async fn add_user_server(&self, username: &str, server: ServerInfo) -> StorageResult<bool>;
    async fn update_user_server(&self, username: &str, server: ServerInfo) -> StorageResult<bool>;
    async fn remove_user_server(&self, username: &str, server_id: &str) -> StorageResult<bool>;
    async fn delete_user_servers(&self, username: &str) -> StorageResult<bool>;
}

#[async_trait]
pub trait ServerCatalogStore: Send + Sync {
    async fn list_servers(&self) -> Vec<ServerInfo>;
    async fn find_server(&self, id: &str) -> Option<ServerInfo>;
    async fn add_server(&self, server: ServerInfo) -> StorageResult<bool>;
    async fn update_server(&self, server: ServerInfo) -> StorageResult<bool>;
    async fn remove_server(&self, id: &str) -> StorageResult<bool>;
}
