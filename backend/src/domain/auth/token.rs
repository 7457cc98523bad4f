//! Bearer token minting and verification.
//!
//! Tokens are HS256-signed and self-validating: there is no revocation
//! inside the two-hour lifetime. The signing secret is injected at
//! construction so nothing here touches the environment.

use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::domain::error::Error;

/// Token lifetime in seconds.
const TOKEN_TTL_SECONDS: u64 = 2 * 60 * 60;

/// Wire form of the token lifetime, echoed in login responses.
pub const EXPIRES_IN: &str = "2h";

/// Claims carried by a bearer token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub uid: String,
    pub email: String,
    pub role: String,
    pub iat: u64,
    pub exp: u64,
}

/// Mints and verifies bearer tokens with a shared secret.
#[derive(Clone)]
pub struct TokenKit {
    secret: String,
}

impl TokenKit {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    /// Mint a token for an authenticated user.
    pub fn mint(&self, uid: &str, email: &str, role: &str) -> Result<String, Error> {
        let now = Utc::now().timestamp().max(0) as u64;
        let claims = Claims {
            uid: uid.to_string(),
            email: email.to_string(),
            role: role.to_string(),
            iat: now,
            exp: now + TOKEN_TTL_SECONDS,
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .map_err(|err| Error::internal(format!("failed to sign token: {err}")))
    }

    /// Verify a token's signature and expiry, returning its claims.
    pub fn verify(&self, token: &str) -> Result<Claims, Error> {
        decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &Validation::new(Algorithm::HS256),
        )
        .map(|data| data.claims)
        .map_err(|_| Error::unauthorized("invalid or expired token"))
    }
}
