//! In-memory identity provider.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;
use uuid::Uuid;

use crate::domain::ports::{AuthStore, AuthStoreError, AuthUser, AuthUserPatch};
use crate::domain::validate;

struct AuthRecord {
    uid: String,
    email: String,
    display_name: Option<String>,
    password_hash: String,
    role: Option<String>,
}

impl AuthRecord {
    fn to_user(&self) -> AuthUser {
        AuthUser {
            uid: self.uid.clone(),
            email: self.email.clone(),
            display_name: self.display_name.clone(),
            role: self.role.clone(),
        }
    }
}

/// Process-local identity provider storing bcrypt password hashes.
///
/// Hashes never leave this adapter; credential checks go through
/// `verify_password` only.
pub struct MemoryAuthStore {
    users: RwLock<HashMap<String, AuthRecord>>,
    bcrypt_cost: u32,
}

impl Default for MemoryAuthStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryAuthStore {
    pub fn new() -> Self {
        Self::with_cost(bcrypt::DEFAULT_COST)
    }

    /// Lower hashing cost for test suites where wall-clock time matters.
    pub fn with_cost(bcrypt_cost: u32) -> Self {
        Self {
            users: RwLock::new(HashMap::new()),
            bcrypt_cost,
        }
    }

    fn hash(&self, password: &str) -> Result<String, AuthStoreError> {
        bcrypt::hash(password, self.bcrypt_cost)
            .map_err(|err| AuthStoreError::Transient(err.to_string()))
    }
}

#[async_trait]
impl AuthStore for MemoryAuthStore {
    async fn create_user(
        &self,
        email: &str,
        password: &str,
        display_name: &str,
    ) -> Result<String, AuthStoreError> {
        let email = validate::normalize_email(email);
        let password_hash = self.hash(password)?;
        let mut users = self.users.write();
        if users.values().any(|record| record.email == email) {
            return Err(AuthStoreError::EmailAlreadyExists);
        }
        let uid = Uuid::new_v4().to_string();
        users.insert(
            uid.clone(),
            AuthRecord {
                uid: uid.clone(),
                email,
                display_name: Some(display_name.to_string()).filter(|n| !n.trim().is_empty()),
                password_hash,
                role: None,
            },
        );
        Ok(uid)
    }

    async fn get_user(&self, uid: &str) -> Result<AuthUser, AuthStoreError> {
        self.users
            .read()
            .get(uid)
            .map(AuthRecord::to_user)
            .ok_or(AuthStoreError::NotFound)
    }

    async fn get_user_by_email(&self, email: &str) -> Result<AuthUser, AuthStoreError> {
        let email = validate::normalize_email(email);
        self.users
            .read()
            .values()
            .find(|record| record.email == email)
            .map(AuthRecord::to_user)
            .ok_or(AuthStoreError::NotFound)
    }

    async fn update_user(&self, uid: &str, patch: AuthUserPatch) -> Result<(), AuthStoreError> {
        let password_hash = patch.password.as_deref().map(|p| self.hash(p)).transpose()?;
        let mut users = self.users.write();
        let record = users.get_mut(uid).ok_or(AuthStoreError::NotFound)?;
        if let Some(email) = patch.email {
            record.email = validate::normalize_email(&email);
        }
        if let Some(hash) = password_hash {
            record.password_hash = hash;
        }
        if let Some(display_name) = patch.display_name {
            record.display_name = Some(display_name).filter(|n| !n.trim().is_empty());
        }
        Ok(())
    }

    async fn set_custom_claims(&self, uid: &str, role: &str) -> Result<(), AuthStoreError> {
        let mut users = self.users.write();
        let record = users.get_mut(uid).ok_or(AuthStoreError::NotFound)?;
        record.role = Some(role.to_string());
        Ok(())
    }

    async fn verify_password(&self, email: &str, password: &str) -> Result<String, AuthStoreError> {
        let email = validate::normalize_email(email);
        let (uid, hash) = {
            let users = self.users.read();
            let record = users
                .values()
                .find(|record| record.email == email)
                .ok_or(AuthStoreError::InvalidCredentials)?;
            (record.uid.clone(), record.password_hash.clone())
        };
        match bcrypt::verify(password, &hash) {
            Ok(true) => Ok(uid),
            Ok(false) => Err(AuthStoreError::InvalidCredentials),
            Err(err) => Err(AuthStoreError::Transient(err.to_string())),
        }
    }
}
