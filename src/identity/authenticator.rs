//! Username/password login and token issuance.

use anyhow::anyhow;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, instrument};
use utoipa::ToSchema;

use super::{
    clock::Clock,
    config::AuthConfig,
    error::AuthError,
    store::{CredentialStore, User, UserProfile},
    token::{SessionClaims, SigningKey, TOKEN_VERSION, new_token_id, sign_hs256},
};

/// A freshly signed session token and the profile it was issued for.
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: i64,
    pub user: UserProfile,
}

#[derive(Debug)]
pub struct Authenticator {
    store: Arc<CredentialStore>,
    signing_key: Arc<SigningKey>,
    token_ttl_seconds: i64,
    clock: Arc<dyn Clock>,
}

impl Authenticator {
    #[must_use]
    pub fn new(
        store: Arc<CredentialStore>,
        signing_key: Arc<SigningKey>,
        config: &AuthConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            signing_key,
            token_ttl_seconds: config.token_ttl_seconds(),
            clock,
        }
    }

    /// Verify a username/password pair and issue a token.
    ///
    /// Runs a full Argon2 verification on every path, including unknown
    /// usernames. Blocking; call from `spawn_blocking` in async code.
    ///
    /// # Errors
    /// Returns `AuthError::InvalidCredentials` for an unknown user or a wrong
    /// password, and `AuthError::Internal` if the store or signer fails.
    #[instrument(skip(self, password))]
    pub fn login(&self, username: &str, password: &str) -> Result<IssuedToken, AuthError> {
        match self.store.find_by_username(username)? {
            Some(user) if self.store.verify_password(&user, password) => {
                let issued = self.issue(&user)?;
                info!(user_id = user.id(), role = %user.role(), "login succeeded");
                Ok(issued)
            }
            Some(user) => {
                debug!(user_id = user.id(), "login rejected: password mismatch");
                Err(AuthError::InvalidCredentials)
            }
            None => {
                self.store.verify_dummy(password);
                debug!("login rejected: unknown username");
                Err(AuthError::InvalidCredentials)
            }
        }
    }

    /// Sign a token for `user` with the current role as snapshot.
    ///
    /// # Errors
    /// Returns `AuthError::Internal` if signing fails.
    pub fn issue(&self, user: &User) -> Result<IssuedToken, AuthError> {
        let iat = self.clock.now_unix_seconds();
        let exp = iat.saturating_add(self.token_ttl_seconds);
        let claims = SessionClaims {
            v: TOKEN_VERSION,
            sub: user.id(),
            role: user.role(),
            iat,
            exp,
            jti: new_token_id().map_err(|err| anyhow!(err))?,
        };
        let token = sign_hs256(&self.signing_key, &claims).map_err(|err| anyhow!(err))?;
        Ok(IssuedToken {
            token,
            expires_at: exp,
            user: user.profile(),
        })
    }
}
