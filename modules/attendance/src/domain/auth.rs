use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::contract::model::{AuthSession, NewUser, Role, User};
use crate::domain::error::DomainError;
use crate::domain::policy;
use crate::domain::ports::{PasswordHasher, TokenCodec};
use crate::domain::store::{Collection, Filter};

/// Registration, login and the admin user listing.
pub struct AuthService {
    users: Collection<User>,
    hasher: Arc<dyn PasswordHasher>,
    tokens: Arc<dyn TokenCodec>,
    list_limit: usize,
    // Serializes the email uniqueness check with the insert.
    register_lock: Mutex<()>,
}

impl AuthService {
    pub fn new(
        users: Collection<User>,
        hasher: Arc<dyn PasswordHasher>,
        tokens: Arc<dyn TokenCodec>,
        list_limit: usize,
    ) -> Self {
        Self {
            users,
            hasher,
            tokens,
            list_limit,
            register_lock: Mutex::new(()),
        }
    }

    #[instrument(name = "attendance.auth.register", skip(self, new_user), fields(email = %new_user.email))]
    pub async fn register(&self, new_user: NewUser) -> Result<AuthSession, DomainError> {
        let role = validate_registration(&new_user)?;

        let _guard = self.register_lock.lock().await;
        if self
            .users
            .find_one(&Filter::all().eq("email", new_user.email.as_str()))
            .await?
            .is_some()
        {
            debug!("email already registered");
            return Err(DomainError::email_already_registered(new_user.email));
        }

        let password_hash = self.hash_password(new_user.password).await?;
        let user = User {
            id: Uuid::new_v4().to_string(),
            username: new_user.username,
            email: new_user.email,
            password_hash,
            role,
            created_at: Utc::now(),
        };
        self.users.insert(&user).await?;
        info!(user_id = %user.id, role = %user.role, "user registered");

        let token = self.issue(&user.id)?;
        Ok(AuthSession { token, user })
    }

    #[instrument(name = "attendance.auth.login", skip(self, password))]
    pub async fn login(&self, email: &str, password: &str) -> Result<AuthSession, DomainError> {
        let user = self
            .users
            .find_one(&Filter::all().eq("email", email))
            .await?
            .ok_or(DomainError::InvalidCredentials)?;

        let hasher = self.hasher.clone();
        let password = password.to_owned();
        let hash = user.password_hash.clone();
        let ok = tokio::task::spawn_blocking(move || hasher.verify(&password, &hash))
            .await
            .map_err(|e| DomainError::internal(format!("password verification task failed: {e}")))?;
        if !ok {
            debug!(user_id = %user.id, "password mismatch");
            return Err(DomainError::InvalidCredentials);
        }

        let token = self.issue(&user.id)?;
        info!(user_id = %user.id, "user logged in");
        Ok(AuthSession { token, user })
    }

    pub async fn list_users(&self, actor: &User) -> Result<Vec<User>, DomainError> {
        policy::ensure_admin(actor)?;
        self.users
            .find_limited(&Filter::all(), self.list_limit)
            .await
    }

    async fn hash_password(&self, password: String) -> Result<String, DomainError> {
        let hasher = self.hasher.clone();
        tokio::task::spawn_blocking(move || hasher.hash(&password))
            .await
            .map_err(|e| DomainError::internal(format!("password hashing task failed: {e}")))?
            .map_err(|e| DomainError::internal(format!("password hashing failed: {e}")))
    }

    fn issue(&self, user_id: &str) -> Result<String, DomainError> {
        self.tokens
            .issue(user_id)
            .map_err(|e| DomainError::internal(format!("token issue failed: {e}")))
    }
}

fn validate_registration(new_user: &NewUser) -> Result<Role, DomainError> {
    if new_user.username.trim().is_empty() {
        return Err(DomainError::validation("username", "must not be empty"));
    }
    if !new_user.email.contains('@') {
        return Err(DomainError::validation("email", "must be an email address"));
    }
    if new_user.password.is_empty() {
        return Err(DomainError::validation("password", "must not be empty"));
    }
    new_user
        .role
        .parse::<Role>()
        .map_err(|msg| DomainError::validation("role", msg))
}
