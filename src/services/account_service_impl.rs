//! `SeaORM` implementation of the `AccountService` trait.

use anyhow::Context;
use async_trait::async_trait;
use tokio::task;

use crate::config::Config;
use crate::db::{Account, InsertError, NewAccountRecord, Store};
use crate::db::repositories::account::hash_password;
use crate::services::account_service::{AccountError, AccountService, NewAccount, Registration};
use crate::services::avatar::AvatarService;
use crate::services::validation::{normalize_email, validate_email};

pub struct SeaOrmAccountService {
    store: Store,
    config: Config,
    avatars: AvatarService,
}

impl SeaOrmAccountService {
    #[must_use]
    pub fn new(store: Store, config: Config) -> Self {
        let avatars = AvatarService::new(config.clone());
        Self {
            store,
            config,
            avatars,
        }
    }
}

#[async_trait]
impl AccountService for SeaOrmAccountService {
    async fn create_account(&self, new: NewAccount) -> Result<Account, AccountError> {
        if new.username.trim().is_empty() {
            return Err(AccountError::MissingField("username"));
        }

        let Some(email) = new.email else {
            return Err(AccountError::MissingField("email"));
        };

        let Some(password) = new.password else {
            return Err(AccountError::MissingField("password"));
        };

        let email = normalize_email(&email);

        if !validate_email(&email) {
            return Err(AccountError::InvalidEmail);
        }

        // Argon2 is CPU-bound; keep it off the async runtime
        let security = self.config.security.clone();
        let password_hash = task::spawn_blocking(move || hash_password(&password, &security))
            .await
            .context("Password hashing task panicked")
            .map_err(AccountError::from)??;

        let record = NewAccountRecord {
            username: new.username,
            email,
            password_hash,
            bio: new.bio,
            is_staff: new.is_staff.unwrap_or(false),
            is_superuser: new.is_superuser.unwrap_or(false),
            is_active: new.is_active.unwrap_or(true),
        };

        match self.store.insert_account(record).await {
            Ok(account) => Ok(account),
            Err(InsertError::DuplicateEmail(email)) => Err(AccountError::DuplicateEmail(email)),
            Err(InsertError::DuplicateUsername(_)) => Err(AccountError::UsernameTaken),
            Err(InsertError::Database(err)) => Err(AccountError::Internal(err.to_string())),
        }
    }

    async fn create_superuser(&self, mut new: NewAccount) -> Result<Account, AccountError> {
        // Default the elevation flags without overriding explicit values,
        // then reject anything that did not resolve to true.
        let is_staff = *new.is_staff.get_or_insert(true);
        let is_superuser = *new.is_superuser.get_or_insert(true);

        if !is_staff {
            return Err(AccountError::InvalidElevation(
                "Superuser must have is_staff=true.",
            ));
        }

        if !is_superuser {
            return Err(AccountError::InvalidElevation(
                "Superuser must have is_superuser=true.",
            ));
        }

        self.create_account(new).await
    }

    async fn register(&self, registration: Registration) -> Result<Account, AccountError> {
        if registration.password != registration.password2 {
            return Err(AccountError::PasswordMismatch);
        }

        // Best-effort pre-checks for a friendly error in the common case;
        // the unique indexes at the store remain authoritative under races.
        if self.store.username_exists(&registration.username).await? {
            return Err(AccountError::UsernameTaken);
        }

        if self
            .store
            .email_exists(&normalize_email(&registration.email))
            .await?
        {
            return Err(AccountError::EmailTaken);
        }

        self.create_account(NewAccount {
            username: registration.username,
            email: Some(registration.email),
            password: Some(registration.password),
            ..NewAccount::default()
        })
        .await
    }

    async fn login(&self, username: &str, password: &str) -> Result<Account, AccountError> {
        let is_valid = self
            .store
            .verify_account_password(username, password)
            .await?;

        if !is_valid {
            return Err(AccountError::InvalidCredentials);
        }

        let account = self
            .store
            .get_account_by_username(username)
            .await?
            .ok_or(AccountError::InvalidCredentials)?;

        // Inactive accounts fail exactly like bad credentials so callers
        // cannot probe account state.
        if !account.is_active {
            return Err(AccountError::InvalidCredentials);
        }

        Ok(account)
    }

    async fn profile(&self, account_id: i32) -> Result<Account, AccountError> {
        self.store
            .get_account(account_id)
            .await?
            .ok_or(AccountError::NotFound)
    }

    async fn update_avatar(&self, account_id: i32, bytes: &[u8]) -> Result<Account, AccountError> {
        if self.store.get_account(account_id).await?.is_none() {
            return Err(AccountError::NotFound);
        }

        let filename = self.avatars.save_avatar(account_id, bytes).await?;
        let account = self.store.set_account_avatar(account_id, &filename).await?;

        Ok(account)
    }
}
