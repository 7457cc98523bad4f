//! HTTP server configuration object and helpers.

use std::env;
use std::net::SocketAddr;

use chrono::Duration;
use tracing::warn;

/// Fallback signing secret for development builds only.
const DEV_JWT_SECRET: &str = "development-secret-change-me";

/// Builder-style configuration for creating the HTTP server.
#[derive(Clone)]
pub struct ServerConfig {
    pub(crate) bind_addr: SocketAddr,
    pub(crate) jwt_secret: String,
    pub(crate) otp_ttl: Duration,
}

impl ServerConfig {
    /// Construct a server configuration with explicit values.
    #[must_use]
    pub fn new(bind_addr: SocketAddr, jwt_secret: impl Into<String>) -> Self {
        Self {
            bind_addr,
            jwt_secret: jwt_secret.into(),
            otp_ttl: Duration::minutes(10),
        }
    }

    /// Read configuration from the environment: `PORT` (default 5000),
    /// `JWT_SECRET`, and `OTP_TTL_SECONDS` (default 600).
    pub fn from_env() -> std::io::Result<Self> {
        let port = env::var("PORT")
            .ok()
            .and_then(|raw| raw.parse::<u16>().ok())
            .unwrap_or(5000);
        let jwt_secret = match env::var("JWT_SECRET") {
            Ok(secret) if !secret.trim().is_empty() => secret,
            _ if cfg!(debug_assertions) => {
                warn!("JWT_SECRET is not set; using the development secret");
                DEV_JWT_SECRET.to_string()
            }
            _ => {
                return Err(std::io::Error::other(
                    "JWT_SECRET must be set outside debug builds",
                ));
            }
        };
        let otp_ttl = env::var("OTP_TTL_SECONDS")
            .ok()
            .and_then(|raw| raw.parse::<i64>().ok())
            .map(Duration::seconds)
            .unwrap_or_else(|| Duration::minutes(10));
        Ok(Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], port)),
            jwt_secret,
            otp_ttl,
        })
    }

    /// Override the OTP lifetime.
    #[must_use]
    pub fn with_otp_ttl(mut self, otp_ttl: Duration) -> Self {
        self.otp_ttl = otp_ttl;
        self
    }

    /// Return the socket address the server will bind to.
    #[must_use]
    pub fn bind_addr(&self) -> SocketAddr {
        self.bind_addr
    }
}
