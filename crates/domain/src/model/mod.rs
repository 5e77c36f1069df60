//! Records persisted in the config store, plus the validation applied before
//! they are written.
//!
//! Every collection is stored as one JSON array, so field names follow the
//! camelCase layout the portal front end already reads and writes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use strum_macros::{AsRefStr, EnumString};
use thiserror::Error;

pub const INVITE_CODE_MIN_LEN: usize = 4;
pub const INVITE_CODE_MAX_LEN: usize = 32;
pub const USERNAME_MAX_LEN: usize = 64;
/// Upper bound for one invite code generation batch.
pub const MAX_GENERATED_CODES: usize = 100;

/// Random bytes per generated invite code (two hex characters each).
const GENERATED_CODE_BYTES: usize = 4;

/// Errors emitted when user-supplied fields fail validation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("`{field}` must not be empty")]
    Empty { field: &'static str },
    #[error("invite code must be {INVITE_CODE_MIN_LEN}-{INVITE_CODE_MAX_LEN} characters")]
    InviteCodeLength,
    #[error("invite code may only contain ASCII letters and digits")]
    InviteCodeCharset,
    #[error("username must be at most {USERNAME_MAX_LEN} characters")]
    UsernameLength,
    #[error("username may only contain letters, digits, `_`, `-` or `.`")]
    UsernameCharset,
    #[error("email address is malformed")]
    Email,
    #[error("batch size must be between 1 and {MAX_GENERATED_CODES}")]
    BatchSize,
}

pub fn validate_invite_code(code: &str) -> Result<(), ValidationError> {
    if !(INVITE_CODE_MIN_LEN..=INVITE_CODE_MAX_LEN).contains(&code.len()) {
        return Err(ValidationError::InviteCodeLength);
    }
    if !code.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(ValidationError::InviteCodeCharset);
    }
    Ok(())
}

pub fn validate_username(username: &str) -> Result<(), ValidationError> {
    if username.is_empty() {
        return Err(ValidationError::Empty { field: "username" });
    }
    if username.len() > USERNAME_MAX_LEN {
        return Err(ValidationError::UsernameLength);
    }
    if !username
        .chars()
        .all(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '.'))
    {
        return Err(ValidationError::UsernameCharset);
    }
    Ok(())
}

/// Loose shape check: one `@` with something on both sides and a dot in the
/// domain part.
pub fn validate_email(email: &str) -> Result<(), ValidationError> {
    let Some((local, domain)) = email.split_once('@') else {
        return Err(ValidationError::Email);
    };
    if local.is_empty() || domain.contains('@') || !domain.contains('.') {
        return Err(ValidationError::Email);
    }
    if domain.starts_with('.') || domain.ends_with('.') {
        return Err(ValidationError::Email);
    }
    Ok(())
}

pub fn validate_batch_size(count: usize) -> Result<(), ValidationError> {
    if !(1..=MAX_GENERATED_CODES).contains(&count) {
        return Err(ValidationError::BatchSize);
    }
    Ok(())
}

/// Generates an 8 character uppercase hex invite code from the OS RNG.
pub fn generate_invite_code() -> Result<String, getrandom::Error> {
    let mut bytes = [0_u8; GENERATED_CODE_BYTES];
    getrandom::fill(&mut bytes)?;
    Ok(hex::encode_upper(bytes))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InviteCode {
    pub code: String,
    #[serde(default)]
    pub used: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub used_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub used_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl InviteCode {
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            used: false,
            used_by: None,
            used_at: None,
            created_at: Some(Utc::now()),
        }
    }

    pub fn is_available(&self) -> bool {
        !self.used
    }

    pub fn mark_used(&mut self, username: impl Into<String>, at: DateTime<Utc>) {
        self.used = true;
        self.used_by = Some(username.into());
        self.used_at = Some(at);
    }
}

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, AsRefStr, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Admin,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub username: String,
    /// Stored as entered; the portal never hashed passwords.
    pub password: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub role: Role,
    #[serde(default)]
    pub invite_code: String,
}

impl User {
    /// Login accepts the username, the email or the phone number.
    pub fn matches_identifier(&self, identifier: &str) -> bool {
        self.username == identifier
            || (!self.email.is_empty() && self.email.eq_ignore_ascii_case(identifier))
            || (!self.phone.is_empty() && self.phone == identifier)
    }

    pub fn apply(&mut self, update: UserUpdate) {
        if let Some(email) = update.email {
            self.email = email;
        }
        if let Some(phone) = update.phone {
            self.phone = phone;
        }
        if let Some(password) = update.password {
            self.password = password;
        }
        if let Some(role) = update.role {
            self.role = role;
        }
    }
}

/// Registration payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewUser {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
    pub invite_code: String,
}

impl NewUser {
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_username(&self.username)?;
        if self.password.is_empty() {
            return Err(ValidationError::Empty { field: "password" });
        }
        if !self.email.is_empty() {
            validate_email(&self.email)?;
        }
        validate_invite_code(&self.invite_code)
    }

    pub fn into_user(self, created_at: DateTime<Utc>) -> User {
        User {
            username: self.username,
            password: self.password,
            email: self.email,
            phone: self.phone,
            created_at,
            role: Role::User,
            invite_code: self.invite_code,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserUpdate {
    pub email: Option<String>,
    pub phone: Option<String>,
    pub password: Option<String>,
    pub role: Option<Role>,
}

impl UserUpdate {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(email) = self.email.as_deref().filter(|email| !email.is_empty()) {
            validate_email(email)?;
        }
        if matches!(self.password.as_deref(), Some("")) {
            return Err(ValidationError::Empty { field: "password" });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserConfig {
    pub username: String,
    #[serde(default)]
    pub settings: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerInfo {
    /// May be omitted in update bodies, where the id comes from the path.
    #[serde(default)]
    pub id: String,
    pub name: String,
    pub ip: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl ServerInfo {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.id.trim().is_empty() {
            return Err(ValidationError::Empty { field: "id" });
        }
        if self.ip.trim().is_empty() {
            return Err(ValidationError::Empty { field: "ip" });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserServers {
    pub username: String,
    #[serde(default)]
    pub servers: Vec<ServerInfo>,
}

/// Outcome of one step of a cascading user delete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum CascadeStep {
    Removed,
    Absent,
    Failed(String),
}

impl CascadeStep {
    pub fn is_failed(&self) -> bool {
        matches!(self, CascadeStep::Failed(_))
    }
}

/// Per-collection result of deleting a user. The three steps run one after the
/// other with no rollback, so a report can mix removed and failed steps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CascadeReport {
    pub username: String,
    pub user: CascadeStep,
    pub config: CascadeStep,
    pub servers: CascadeStep,
}

impl CascadeReport {
    pub fn is_complete(&self) -> bool {
        !(self.user.is_failed() || self.config.is_failed() || self.servers.is_failed())
    }

    pub fn user_existed(&self) -> bool {
        self.user == CascadeStep::Removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_user() -> NewUser {
        NewUser {
            username: "alice".into(),
            password: "secret".into(),
            email: "alice@example.com".into(),
            phone: "13800000000".into(),
            invite_code: "ABC123".into(),
        }
    }

    #[test]
    fn invite_code_validation_rejects_invalid_inputs() {
        assert_eq!(
            validate_invite_code("AB"),
            Err(ValidationError::InviteCodeLength)
        );
        assert_eq!(
            validate_invite_code("ABC-123"),
            Err(ValidationError::InviteCodeCharset)
        );
        assert!(validate_invite_code("ABC123").is_ok());
    }

    #[test]
    fn batch_size_must_be_positive_and_bounded() {
        assert_eq!(validate_batch_size(0), Err(ValidationError::BatchSize));
        assert_eq!(
            validate_batch_size(MAX_GENERATED_CODES + 1),
            Err(ValidationError::BatchSize)
        );
        assert!(validate_batch_size(1).is_ok());
        assert!(validate_batch_size(MAX_GENERATED_CODES).is_ok());
    }

    #[test]
    fn generated_codes_are_valid_and_distinct() {
        let left = generate_invite_code().unwrap();
        let right = generate_invite_code().unwrap();
        assert_eq!(left.len(), GENERATED_CODE_BYTES * 2);
        assert!(validate_invite_code(&left).is_ok());
        assert_eq!(left, left.to_ascii_uppercase());
        assert_ne!(left, right);
    }

    #[test]
    fn email_validation_is_loose_but_rejects_garbage() {
        assert!(validate_email("a@b.cn").is_ok());
        assert_eq!(validate_email("nope"), Err(ValidationError::Email));
        assert_eq!(validate_email("@b.cn"), Err(ValidationError::Email));
        assert_eq!(validate_email("a@b"), Err(ValidationError::Email));
        assert_eq!(validate_email("a@b.cn."), Err(ValidationError::Email));
    }

    #[test]
    fn new_user_validation_checks_every_field() {
        assert!(new_user().validate().is_ok());

        let mut bad = new_user();
        bad.username = "has space".into();
        assert_eq!(bad.validate(), Err(ValidationError::UsernameCharset));

        let mut bad = new_user();
        bad.password.clear();
        assert_eq!(
            bad.validate(),
            Err(ValidationError::Empty { field: "password" })
        );

        let mut no_email = new_user();
        no_email.email.clear();
        assert!(no_email.validate().is_ok());
    }

    #[test]
    fn invite_code_uses_camel_case_wire_names() {
        let mut code = InviteCode::new("ABC123");
        code.created_at = None;
        assert_eq!(
            serde_json::to_value(&code).unwrap(),
            serde_json::json!({"code": "ABC123", "used": false})
        );

        code.mark_used("alice", Utc::now());
        let value = serde_json::to_value(&code).unwrap();
        assert_eq!(value["usedBy"], "alice");
        assert!(value["usedAt"].is_string());
        assert!(!code.is_available());
    }

    #[test]
    fn user_tolerates_sparse_records() {
        let user: User =
            serde_json::from_value(serde_json::json!({"username": "bob", "password": "pw"}))
                .unwrap();
        assert_eq!(user.role, Role::User);
        assert!(user.email.is_empty());

        let admin: User = serde_json::from_value(
            serde_json::json!({"username": "root", "password": "pw", "role": "admin"}),
        )
        .unwrap();
        assert_eq!(admin.role, Role::Admin);
        assert_eq!(admin.role.as_ref(), "admin");
    }

    #[test]
    fn identifier_matches_username_email_or_phone() {
        let user = new_user().into_user(Utc::now());
        assert!(user.matches_identifier("alice"));
        assert!(user.matches_identifier("ALICE@example.com"));
        assert!(user.matches_identifier("13800000000"));
        assert!(!user.matches_identifier("mallory"));
    }

    #[test]
    fn update_only_touches_provided_fields() {
        let mut user = new_user().into_user(Utc::now());
        user.apply(UserUpdate {
            role: Some(Role::Admin),
            ..Default::default()
        });
        assert_eq!(user.role, Role::Admin);
        assert_eq!(user.email, "alice@example.com");
        assert_eq!(user.password, "secret");
    }

    #[test]
    fn cascade_report_flags_partial_failure() {
        let report = CascadeReport {
            username: "alice".into(),
            user: CascadeStep::Removed,
            config: CascadeStep::Failed("store unavailable".into()),
            servers: CascadeStep::Absent,
        };
        assert!(!report.is_complete());
        assert!(report.user_existed());
    }
}
