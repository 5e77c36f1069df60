use async_trait::async_trait;
use chrono::Utc;
use metrics::counter;
use portal_domain::model::{
    CascadeReport, CascadeStep, InviteCode, NewUser, User, UserUpdate,
};
use portal_domain::storage::{
    RegistrationError, StorageResult, UserConfigStore, UserServerStore, UserStore,
};
use tracing::{error, info, warn};

use crate::{collection::Collection, ConfigStorage};

#[async_trait]
impl UserStore for ConfigStorage {
    async fn list_users(&self) -> Vec<User> {
        self.load(Collection::Users).await
    }

    async fn find_user(&self, username: &str) -> Option<User> {
        self.list_users()
            .await
            .into_iter()
            .find(|user| user.username == username)
    }

    async fn authenticate(&self, identifier: &str, password: &str) -> Option<User> {
        let found = self
            .list_users()
            .await
            .into_iter()
            .find(|user| user.matches_identifier(identifier) && user.password == password);
        let status = if found.is_some() { "ok" } else { "rejected" };
        counter!("portal_logins_total", "result" => status).increment(1);
        found
    }

    /// Checks the invite code, appends the user, then marks the code used.
    /// Uniqueness is only checked against the list this process sees, so two
    /// processes registering the same name at once can both succeed.
    async fn register_user(&self, new_user: NewUser) -> Result<User, RegistrationError> {
        new_user.validate()?;

        let _codes_guard = self.lock(Collection::InviteCodes).await;
        let mut codes: Vec<InviteCode> = self.load_for_update(Collection::InviteCodes).await?;
        let Some(code_index) = codes
            .iter()
            .position(|code| code.code == new_user.invite_code && code.is_available())
        else {
            counter!("portal_registrations_total", "result" => "invite_unavailable").increment(1);
            return Err(RegistrationError::InviteCodeUnavailable);
        };

        let user = {
            let _users_guard = self.lock(Collection::Users).await;
            let mut users: Vec<User> = self.load_for_update(Collection::Users).await?;
            ensure_unique(&users, &new_user)?;

            let user = new_user.into_user(Utc::now());
            users.push(user.clone());
            self.save(Collection::Users, &users).await?;
            user
        };

        codes[code_index].mark_used(&user.username, Utc::now());
        if let Err(err) = self.save(Collection::InviteCodes, &codes).await {
            // The account exists at this point; the code stays reusable until
            // someone fixes the collection.
            error!(
                username = user.username,
                code = user.invite_code,
                error = %err,
                "user registered but invite code not marked used"
            );
        }

        counter!("portal_registrations_total", "result" => "ok").increment(1);
        info!(username = user.username, "user registered");
        Ok(user)
    }

    async fn update_user(&self, username: &str, update: UserUpdate) -> StorageResult<Option<User>> {
        update.validate()?;

        let _guard = self.lock(Collection::Users).await;
        let mut users: Vec<User> = self.load_for_update(Collection::Users).await?;
        let Some(user) = users.iter_mut().find(|user| user.username == username) else {
            return Ok(None);
        };
        user.apply(update);
        let updated = user.clone();
        self.save(Collection::Users, &users).await?;
        Ok(Some(updated))
    }

    async fn delete_user(&self, username: &str) -> CascadeReport {
        let user = self.remove_user_record(username).await;
        let config = to_step(self.delete_user_config(username).await);
        let servers = to_step(self.delete_user_servers(username).await);

        let report = CascadeReport {
            username: username.to_string(),
            user,
            config,
            servers,
        };
        if report.is_complete() {
            info!(username, "user deleted");
        } else {
            warn!(username, ?report, "user delete left collections inconsistent");
        }
        report
    }
}

impl ConfigStorage {
    async fn remove_user_record(&self, username: &str) -> CascadeStep {
        let _guard = self.lock(Collection::Users).await;
        let mut users: Vec<User> = match self.load_for_update(Collection::Users).await {
            Ok(users) => users,
            Err(err) => return CascadeStep::Failed(err.to_string()),
        };
        let before = users.len();
        users.retain(|user| user.username != username);
        if users.len() == before {
            return CascadeStep::Absent;
        }
        to_step(self.save(Collection::Users, &users).await.map(|()| true))
    }
}

fn ensure_unique(users: &[User], candidate: &NewUser) -> Result<(), RegistrationError> {
    for user in users {
        if user.username == candidate.username {
            return Err(RegistrationError::UsernameTaken);
        }
        if !candidate.email.is_empty() && user.email.eq_ignore_ascii_case(&candidate.email) {
            return Err(RegistrationError::EmailTaken);
        }
        if !candidate.phone.is_empty() && user.phone == candidate.phone {
            return Err(RegistrationError::PhoneTaken);
        }
    }
    Ok(())
}

fn to_step(result: StorageResult<bool>) -> CascadeStep {
    match result {
        Ok(true) => CascadeStep::Removed,
        Ok(false) => CascadeStep::Absent,
        Err(err) => CascadeStep::Failed(err.to_string()),
    }
}
