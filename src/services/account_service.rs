//! Domain service for account lifecycle.
//!
//! Covers account creation (regular and superuser), registration and login
//! validation, and the public projection used by profile responses.

use thiserror::Error;

use crate::db::Account;
use crate::services::avatar::AvatarError;

/// Errors specific to account operations.
#[derive(Debug, Error)]
pub enum AccountError {
    #[error("The {0} field is required")]
    MissingField(&'static str),

    #[error("Invalid email address")]
    InvalidEmail,

    #[error("The email address '{0}' is already in use")]
    DuplicateEmail(String),

    #[error("{0}")]
    InvalidElevation(&'static str),

    #[error("Passwords do not match")]
    PasswordMismatch,

    #[error("The username is already in use")]
    UsernameTaken,

    #[error("The email address is already in use")]
    EmailTaken,

    #[error("Invalid username or password")]
    InvalidCredentials,

    #[error("Account not found")]
    NotFound,

    #[error(transparent)]
    Avatar(#[from] AvatarError),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<sea_orm::DbErr> for AccountError {
    fn from(err: sea_orm::DbErr) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<anyhow::Error> for AccountError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

/// Inputs for direct account construction.
///
/// Email and password are optional here so that their absence can be
/// rejected as a domain error rather than at deserialization time.
#[derive(Debug, Clone, Default)]
pub struct NewAccount {
    pub username: String,
    pub email: Option<String>,
    pub password: Option<String>,
    pub bio: Option<String>,
    pub is_staff: Option<bool>,
    pub is_superuser: Option<bool>,
    pub is_active: Option<bool>,
}

/// Registration payload after deserialization.
#[derive(Debug, Clone)]
pub struct Registration {
    pub username: String,
    pub email: String,
    pub password: String,
    pub password2: String,
}

/// Domain service trait for account lifecycle.
#[async_trait::async_trait]
pub trait AccountService: Send + Sync {
    /// Validates inputs, normalizes the email, hashes the password, and
    /// persists a new account.
    ///
    /// # Errors
    ///
    /// Returns [`AccountError::MissingField`], [`AccountError::InvalidEmail`],
    /// or [`AccountError::DuplicateEmail`] when the store rejects the insert.
    async fn create_account(&self, new: NewAccount) -> Result<Account, AccountError>;

    /// Creates an account with both elevation flags forced on.
    ///
    /// # Errors
    ///
    /// Returns [`AccountError::InvalidElevation`] before any persistence if a
    /// caller explicitly passed a false elevation flag.
    async fn create_superuser(&self, new: NewAccount) -> Result<Account, AccountError>;

    /// Registration flow: cross-field checks, duplicate pre-checks, then
    /// account creation.
    async fn register(&self, registration: Registration) -> Result<Account, AccountError>;

    /// Credential check for login.
    ///
    /// # Errors
    ///
    /// Unknown username, wrong password, and inactive account all collapse to
    /// [`AccountError::InvalidCredentials`].
    async fn login(&self, username: &str, password: &str) -> Result<Account, AccountError>;

    /// Fetch an account for profile display.
    async fn profile(&self, account_id: i32) -> Result<Account, AccountError>;

    /// Validate and store avatar bytes for an account.
    async fn update_avatar(&self, account_id: i32, bytes: &[u8]) -> Result<Account, AccountError>;
}
