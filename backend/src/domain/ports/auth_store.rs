//! Driven port for the external identity provider.

use async_trait::async_trait;
use thiserror::Error as ThisError;

/// An identity record as the provider reports it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub uid: String,
    pub email: String,
    pub display_name: Option<String>,
    /// Custom role claim, when one has been set.
    pub role: Option<String>,
}

/// Mutable subset of an identity record.
#[derive(Debug, Clone, Default)]
pub struct AuthUserPatch {
    pub email: Option<String>,
    pub password: Option<String>,
    pub display_name: Option<String>,
}

impl AuthUserPatch {
    /// Patch that only rotates the password.
    pub fn password(password: impl Into<String>) -> Self {
        Self {
            password: Some(password.into()),
            ..Self::default()
        }
    }
}

/// Failures surfaced by an identity provider adapter, reduced to the small
/// set the workflows branch on.
#[derive(Debug, Clone, PartialEq, Eq, ThisError)]
pub enum AuthStoreError {
    #[error("auth user not found")]
    NotFound,
    #[error("email already registered")]
    EmailAlreadyExists,
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("identity provider unavailable: {0}")]
    Transient(String),
}

impl From<AuthStoreError> for crate::domain::Error {
    fn from(err: AuthStoreError) -> Self {
        use crate::domain::Error;
        match err {
            AuthStoreError::NotFound => Error::not_found("auth user not found"),
            AuthStoreError::EmailAlreadyExists => Error::conflict("email already registered"),
            AuthStoreError::InvalidCredentials => Error::unauthorized("invalid credentials"),
            AuthStoreError::Transient(reason) => {
                Error::internal(format!("identity provider unavailable: {reason}"))
            }
        }
    }
}

/// Typed access to the external identity provider.
///
/// Passwords cross this boundary as plaintext exactly once per call and are
/// only ever checked through `verify_password`; adapters must never expose
/// stored hashes.
#[async_trait]
pub trait AuthStore: Send + Sync {
    /// Create an identity and return its uid.
    async fn create_user(
        &self,
        email: &str,
        password: &str,
        display_name: &str,
    ) -> Result<String, AuthStoreError>;

    /// Fetch an identity by uid.
    async fn get_user(&self, uid: &str) -> Result<AuthUser, AuthStoreError>;

    /// Fetch an identity by email.
    async fn get_user_by_email(&self, email: &str) -> Result<AuthUser, AuthStoreError>;

    /// Apply a partial update to an identity.
    async fn update_user(&self, uid: &str, patch: AuthUserPatch) -> Result<(), AuthStoreError>;

    /// Replace the custom role claim.
    async fn set_custom_claims(&self, uid: &str, role: &str) -> Result<(), AuthStoreError>;

    /// Verify credentials, returning the uid on success.
    async fn verify_password(&self, email: &str, password: &str) -> Result<String, AuthStoreError>;
}
