//! Registration, login, and the password-reset workflow.
//!
//! Password reset tolerates divergence between the identity provider and
//! the profile store left behind by historical bugs: when the profile's
//! uid no longer resolves, the workflow adopts the auth record found by
//! email (or creates a fresh one) and re-keys the profile, so after a
//! successful reset the profile and the auth record share one uid and one
//! password.

pub mod token;

use std::sync::Arc;

use chrono::{Duration, Utc};
use rand::Rng;
use serde_json::json;
use tracing::{info, warn};

use crate::domain::document::{self, Document};
use crate::domain::error::Error;
use crate::domain::ports::{AuthStore, AuthStoreError, AuthUserPatch, DocStore, Mailer};
use crate::domain::timestamp;
use crate::domain::validate;

pub use self::token::{Claims, TokenKit, EXPIRES_IN};

const USERS: &str = "users";
const OTPS: &str = "otps";

/// Role minted into tokens when the identity has no role claim.
const DEFAULT_ROLE: &str = "user";

/// Validated registration input.
#[derive(Debug, Clone)]
pub struct RegisterProfile {
    pub name: String,
    pub email: String,
    pub password: String,
    pub phone_number: Option<String>,
    pub role: String,
}

/// Successful login payload.
#[derive(Debug, Clone)]
pub struct LoginSuccess {
    pub token: String,
    pub expires_in: &'static str,
}

/// Drives the auth endpoints over the identity provider, the profile
/// store, and the mail transport.
pub struct AuthService {
    auth: Arc<dyn AuthStore>,
    store: Arc<dyn DocStore>,
    mailer: Arc<dyn Mailer>,
    tokens: TokenKit,
    otp_ttl: Duration,
}

impl AuthService {
    pub fn new(
        auth: Arc<dyn AuthStore>,
        store: Arc<dyn DocStore>,
        mailer: Arc<dyn Mailer>,
        tokens: TokenKit,
        otp_ttl: Duration,
    ) -> Self {
        Self {
            auth,
            store,
            mailer,
            tokens,
            otp_ttl,
        }
    }

    /// Create an identity, stamp its role claim, and write the profile.
    pub async fn register(&self, input: RegisterProfile) -> Result<Document, Error> {
        let name = input.name.trim().to_string();
        if !(2..=100).contains(&name.chars().count()) {
            return Err(field_invalid("name", "name must be between 2 and 100 characters"));
        }
        if !validate::email_ok(&input.email) {
            return Err(field_invalid("email", "email must be an email address"));
        }
        if !validate::password_ok(&input.password) {
            return Err(field_invalid("password", "password must be at least 6 characters"));
        }
        if let Some(phone) = input.phone_number.as_deref() {
            if !validate::phone_ok(phone) {
                return Err(field_invalid("phone_number", "phone_number must be a phone number"));
            }
        }
        if !validate::role_ok(&input.role) {
            return Err(field_invalid("role", "role is not a known role"));
        }

        let email = validate::normalize_email(&input.email);
        let uid = self.auth.create_user(&email, &input.password, &name).await?;
        self.auth.set_custom_claims(&uid, &input.role).await?;

        let now = timestamp::to_value(Utc::now());
        let mut profile = Document::new();
        profile.insert("user_id".into(), json!(uid));
        profile.insert("name".into(), json!(name));
        profile.insert("email".into(), json!(email));
        if let Some(phone) = input.phone_number {
            profile.insert("phone_number".into(), json!(phone));
        }
        profile.insert("role".into(), json!(input.role));
        profile.insert("created_at".into(), now.clone());
        profile.insert("updated_at".into(), now);
        let profile = self.store.set(USERS, &uid, profile).await?;
        info!(uid = %uid, "user registered");
        Ok(profile)
    }

    /// Verify credentials and mint a bearer token.
    pub async fn login(&self, email: &str, password: &str) -> Result<LoginSuccess, Error> {
        if !validate::email_ok(email) {
            return Err(field_invalid("email", "email must be an email address"));
        }
        if password.is_empty() {
            return Err(field_invalid("password", "password must not be empty"));
        }
        let uid = self.auth.verify_password(email, password).await?;
        let user = self.auth.get_user(&uid).await?;
        let role = user.role.as_deref().unwrap_or(DEFAULT_ROLE);
        let token = self.tokens.mint(&uid, &user.email, role)?;
        Ok(LoginSuccess {
            token,
            expires_in: EXPIRES_IN,
        })
    }

    /// Issue a one-time reset code to a known account.
    pub async fn forgot_password(&self, email: &str) -> Result<(), Error> {
        if !validate::email_ok(email) {
            return Err(field_invalid("email", "email must be an email address"));
        }
        let email = validate::normalize_email(email);
        self.profile_by_email(&email)
            .await?
            .ok_or_else(|| Error::not_found("no account found for that email"))?;

        let otp: u32 = rand::thread_rng().gen_range(100_000..=999_999);
        let expires_at = Utc::now() + self.otp_ttl;
        let mut record = Document::new();
        record.insert("email".into(), json!(email));
        record.insert("otp".into(), json!(otp));
        record.insert("expires_at".into(), timestamp::to_value(expires_at));
        self.store.set(OTPS, &email, record).await?;

        self.mailer
            .send(
                &email,
                "Your password reset code",
                &format!("Your password reset code is {otp}. It expires in 10 minutes."),
            )
            .await?;
        info!(email = %email, "reset code issued");
        Ok(())
    }

    /// Check a one-time reset code without consuming it.
    pub async fn verify_otp(&self, email: &str, otp: i64) -> Result<(), Error> {
        let email = validate::normalize_email(email);
        let record = self
            .store
            .get(OTPS, &email)
            .await?
            .ok_or_else(|| Error::invalid_request("no reset code was requested for that email"))?;
        let expected = record.get("otp").and_then(serde_json::Value::as_i64);
        if expected != Some(otp) {
            return Err(Error::invalid_request("incorrect reset code"));
        }
        let expires_at = timestamp::field_instant(&record, "expires_at")
            .ok_or_else(|| Error::internal("reset code record has no expiry"))?;
        if Utc::now() > expires_at {
            return Err(Error::invalid_request("reset code has expired"));
        }
        Ok(())
    }

    /// Set a new password, repairing any uid divergence between the
    /// identity provider and the profile store first.
    pub async fn reset_password(
        &self,
        email: &str,
        password: &str,
        confirm_password: &str,
    ) -> Result<(), Error> {
        if !validate::email_ok(email) {
            return Err(field_invalid("email", "email must be an email address"));
        }
        if !validate::password_ok(password) {
            return Err(field_invalid("password", "password must be at least 6 characters"));
        }
        if password != confirm_password {
            return Err(field_invalid("confirm_password", "passwords do not match"));
        }

        let email = validate::normalize_email(email);
        let profile = self
            .profile_by_email(&email)
            .await?
            .ok_or_else(|| Error::not_found("no account found for that email"))?;
        let profile_uid = document::get_str(&profile, "user_id")
            .map(str::to_owned)
            .ok_or_else(|| Error::internal("profile record has no user_id"))?;

        let uid = match self.auth.get_user(&profile_uid).await {
            Ok(_) => profile_uid,
            Err(AuthStoreError::NotFound) => {
                self.repair_uid(&email, &profile_uid, &profile, password)
                    .await?
            }
            Err(err) => return Err(err.into()),
        };

        self.auth
            .update_user(&uid, AuthUserPatch::password(password))
            .await?;
        let mut patch = Document::new();
        patch.insert("updated_at".into(), timestamp::to_value(Utc::now()));
        self.store.update(USERS, &uid, patch).await?;
        self.store.delete(OTPS, &email).await?;
        info!(uid = %uid, "password reset");
        Ok(())
    }

    /// The profile's uid no longer resolves in the identity provider.
    /// Adopt the auth record found by email, or create a fresh one, and
    /// re-key the profile document under the surviving uid.
    async fn repair_uid(
        &self,
        email: &str,
        profile_uid: &str,
        profile: &Document,
        password: &str,
    ) -> Result<String, Error> {
        let uid = match self.auth.get_user_by_email(email).await {
            Ok(existing) => {
                warn!(
                    profile_uid = %profile_uid,
                    auth_uid = %existing.uid,
                    "profile uid diverged from auth record; adopting auth uid"
                );
                existing.uid
            }
            Err(AuthStoreError::NotFound) => {
                let name = document::get_str(profile, "name").unwrap_or(email);
                let uid = self.auth.create_user(email, password, name).await?;
                let role = document::get_str(profile, "role").unwrap_or(DEFAULT_ROLE);
                self.auth.set_custom_claims(&uid, role).await?;
                warn!(
                    profile_uid = %profile_uid,
                    auth_uid = %uid,
                    "auth record was missing; recreated and re-keyed profile"
                );
                uid
            }
            Err(err) => return Err(err.into()),
        };

        if uid != profile_uid {
            // Delete-then-set: interrupted between the two steps, the next
            // reset lands in the create branch above and recreates the
            // profile under the correct uid, so the sequence re-converges.
            let mut rekeyed = profile.clone();
            rekeyed.insert("user_id".into(), json!(uid));
            self.store.delete(USERS, profile_uid).await?;
            self.store.set(USERS, &uid, rekeyed).await?;
        }
        Ok(uid)
    }

    async fn profile_by_email(&self, email: &str) -> Result<Option<Document>, Error> {
        let mut hits = self
            .store
            .where_equals(USERS, "email", &json!(email))
            .await?;
        Ok(if hits.is_empty() {
            None
        } else {
            Some(hits.swap_remove(0))
        })
    }
}

fn field_invalid(field: &str, message: &str) -> Error {
    Error::invalid_request(message).with_details(json!({ "field": field }))
}
