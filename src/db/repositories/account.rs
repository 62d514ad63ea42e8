use anyhow::{Context, Result};
use argon2::{
    Algorithm, Argon2, Params, Version,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};
use tokio::task;

use crate::config::SecurityConfig;
use crate::entities::accounts;

/// Account data returned from the repository (without the password hash)
#[derive(Debug, Clone)]
pub struct Account {
    pub id: i32,
    pub username: String,
    pub email: String,
    pub avatar: Option<String>,
    pub bio: Option<String>,
    pub is_staff: bool,
    pub is_superuser: bool,
    pub is_active: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl From<accounts::Model> for Account {
    fn from(model: accounts::Model) -> Self {
        Self {
            id: model.id,
            username: model.username,
            email: model.email,
            avatar: model.avatar,
            bio: model.bio,
            is_staff: model.is_staff,
            is_superuser: model.is_superuser,
            is_active: model.is_active,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

/// Row to insert; the email must already be normalized and the password
/// already hashed when this reaches the repository.
#[derive(Debug, Clone)]
pub struct NewAccountRecord {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub bio: Option<String>,
    pub is_staff: bool,
    pub is_superuser: bool,
    pub is_active: bool,
}

/// Insert failure, with uniqueness conflicts split out so the service layer
/// can surface them as domain errors.
#[derive(Debug, thiserror::Error)]
pub enum InsertError {
    #[error("The email address '{0}' is already in use")]
    DuplicateEmail(String),

    #[error("The username '{0}' is already in use")]
    DuplicateUsername(String),

    #[error(transparent)]
    Database(#[from] anyhow::Error),
}

pub struct AccountRepository {
    conn: DatabaseConnection,
}

impl AccountRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    /// Insert a new account row.
    ///
    /// Uniqueness of username and email is enforced by the schema's unique
    /// indexes; a conflicting concurrent insert loses here, not at any
    /// earlier existence check.
    pub async fn insert(&self, record: NewAccountRecord) -> Result<Account, InsertError> {
        let now = chrono::Utc::now().to_rfc3339();

        let active = accounts::ActiveModel {
            username: Set(record.username.clone()),
            email: Set(record.email.clone()),
            password_hash: Set(record.password_hash),
            avatar: Set(None),
            bio: Set(record.bio),
            is_staff: Set(record.is_staff),
            is_superuser: Set(record.is_superuser),
            is_active: Set(record.is_active),
            created_at: Set(now.clone()),
            updated_at: Set(now),
            ..Default::default()
        };

        match active.insert(&self.conn).await {
            Ok(model) => Ok(Account::from(model)),
            Err(err) => {
                if let Some(sea_orm::SqlErr::UniqueConstraintViolation(msg)) = err.sql_err() {
                    if msg.contains("username") {
                        return Err(InsertError::DuplicateUsername(record.username));
                    }
                    return Err(InsertError::DuplicateEmail(record.email));
                }
                Err(InsertError::Database(
                    anyhow::Error::new(err).context("Failed to insert account"),
                ))
            }
        }
    }

    pub async fn get_by_id(&self, id: i32) -> Result<Option<Account>> {
        let account = accounts::Entity::find_by_id(id)
            .one(&self.conn)
            .await
            .context("Failed to query account by ID")?;

        Ok(account.map(Account::from))
    }

    pub async fn get_by_username(&self, username: &str) -> Result<Option<Account>> {
        let account = accounts::Entity::find()
            .filter(accounts::Column::Username.eq(username))
            .one(&self.conn)
            .await
            .context("Failed to query account by username")?;

        Ok(account.map(Account::from))
    }

    pub async fn username_exists(&self, username: &str) -> Result<bool> {
        let account = accounts::Entity::find()
            .filter(accounts::Column::Username.eq(username))
            .one(&self.conn)
            .await
            .context("Failed to check username existence")?;

        Ok(account.is_some())
    }

    pub async fn email_exists(&self, email: &str) -> Result<bool> {
        let account = accounts::Entity::find()
            .filter(accounts::Column::Email.eq(email))
            .one(&self.conn)
            .await
            .context("Failed to check email existence")?;

        Ok(account.is_some())
    }

    /// Verify a password for an account.
    /// Note: This uses `spawn_blocking` because Argon2 verification is
    /// CPU-intensive and would block the async runtime if run directly.
    pub async fn verify_password(&self, username: &str, password: &str) -> Result<bool> {
        let account = accounts::Entity::find()
            .filter(accounts::Column::Username.eq(username))
            .one(&self.conn)
            .await
            .context("Failed to query account for password verification")?;

        let Some(account) = account else {
            return Ok(false);
        };

        let password_hash = account.password_hash;
        let password = password.to_string();

        let is_valid = task::spawn_blocking(move || {
            let parsed_hash = PasswordHash::new(&password_hash)
                .map_err(|e| anyhow::anyhow!("Invalid password hash format: {e}"))?;

            let argon2 = Argon2::default();
            Ok::<bool, anyhow::Error>(
                argon2
                    .verify_password(password.as_bytes(), &parsed_hash)
                    .is_ok(),
            )
        })
        .await
        .context("Password verification task panicked")??;

        Ok(is_valid)
    }

    /// Fetch the stored hash for an account (login path).
    pub async fn get_password_hash(&self, username: &str) -> Result<Option<String>> {
        let account = accounts::Entity::find()
            .filter(accounts::Column::Username.eq(username))
            .one(&self.conn)
            .await
            .context("Failed to query account for stored hash")?;

        Ok(account.map(|a| a.password_hash))
    }

    /// Record the stored avatar reference for an account.
    pub async fn set_avatar(&self, id: i32, avatar: &str) -> Result<Account> {
        let account = accounts::Entity::find_by_id(id)
            .one(&self.conn)
            .await
            .context("Failed to query account for avatar update")?
            .ok_or_else(|| anyhow::anyhow!("Account not found: {id}"))?;

        let now = chrono::Utc::now().to_rfc3339();

        let mut active: accounts::ActiveModel = account.into();
        active.avatar = Set(Some(avatar.to_string()));
        active.updated_at = Set(now);
        let updated = active.update(&self.conn).await?;

        Ok(Account::from(updated))
    }
}

/// Hash a password using Argon2id with the configured cost parameters.
pub fn hash_password(password: &str, config: &SecurityConfig) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);

    let params = Params::new(
        config.argon2_memory_cost_kib,
        config.argon2_time_cost,
        config.argon2_parallelism,
        None, // output length (use default)
    )
    .map_err(|e| anyhow::anyhow!("Invalid Argon2 params: {e}"))?;
    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

    let hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("Failed to hash password: {e}"))?;

    Ok(hash.to_string())
}
