//! Authority configuration and signing key resolution.

use secrecy::SecretString;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use tracing::warn;

use super::token::{SigningKey, TokenError};

const DEFAULT_TOKEN_TTL_SECONDS: i64 = 24 * 60 * 60;

/// Deployment profile. Production refuses insecure fallbacks.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Profile {
    Development,
    Production,
}

impl Profile {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
        }
    }
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Profile {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "development" | "dev" => Ok(Self::Development),
            "production" | "prod" => Ok(Self::Production),
            other => Err(format!(
                "invalid profile: {other} (expected development or production)"
            )),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("a signing key is required in the production profile (set TASKWARDEN_SIGNING_KEY)")]
    MissingSigningKey,
    #[error("invalid signing key: {0}")]
    InvalidSigningKey(#[from] TokenError),
    #[error("token TTL must be positive, got {0}")]
    InvalidTokenTtl(i64),
}

#[derive(Clone, Debug)]
pub struct AuthConfig {
    profile: Profile,
    token_ttl_seconds: i64,
}

impl AuthConfig {
    #[must_use]
    pub const fn new(profile: Profile) -> Self {
        Self {
            profile,
            token_ttl_seconds: DEFAULT_TOKEN_TTL_SECONDS,
        }
    }

    /// # Errors
    /// Returns `ConfigError::InvalidTokenTtl` for zero or negative values.
    pub fn with_token_ttl_seconds(mut self, seconds: i64) -> Result<Self, ConfigError> {
        if seconds <= 0 {
            return Err(ConfigError::InvalidTokenTtl(seconds));
        }
        self.token_ttl_seconds = seconds;
        Ok(self)
    }

    #[must_use]
    pub const fn profile(&self) -> Profile {
        self.profile
    }

    #[must_use]
    pub const fn token_ttl_seconds(&self) -> i64 {
        self.token_ttl_seconds
    }
}

/// Load the signing key once at startup.
///
/// Development without a key gets a random one so nothing ever falls back to a
/// value baked into the binary.
///
/// # Errors
/// Returns `ConfigError::MissingSigningKey` in production without a key, or
/// `ConfigError::InvalidSigningKey` if the key is too short.
pub fn resolve_signing_key(
    profile: Profile,
    configured: Option<&SecretString>,
) -> Result<SigningKey, ConfigError> {
    match (configured, profile) {
        (Some(secret), _) => Ok(SigningKey::from_secret(secret)?),
        (None, Profile::Production) => Err(ConfigError::MissingSigningKey),
        (None, Profile::Development) => {
            warn!("no signing key configured, generated an ephemeral key; tokens will not survive a restart");
            Ok(SigningKey::generate()?)
        }
    }
}
