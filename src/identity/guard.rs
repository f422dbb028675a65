//! Access Guard: bearer token extraction, verification and policy checks.

use axum::http::{HeaderMap, header::AUTHORIZATION};
use std::sync::Arc;
use tracing::{debug, warn};

use super::{
    clock::Clock,
    error::{AuthError, UnauthenticatedReason},
    store::{CredentialStore, Role},
    token::{SigningKey, TokenError, check_expiry, verify_signature},
};

/// Caller identity recovered from a verified token.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Identity {
    pub user_id: i64,
    /// Role snapshot from the token; see [`AccessGuard::check`] for when it is re-read.
    pub role: Role,
    pub issued_at: i64,
    pub expires_at: i64,
}

/// What a request must be allowed to do.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Capability {
    /// Any valid token.
    Authenticated,
    /// Current role in the store must be admin.
    Admin,
    /// Caller owns the resource (user id given), or is currently an admin.
    OwnerOrAdmin(i64),
}

/// Progress of a request through the guard.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GuardStage {
    Received,
    TokenExtracted,
    SignatureVerified,
    ExpiryChecked,
    PolicyChecked,
    Admitted,
}

impl GuardStage {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Received => "received",
            Self::TokenExtracted => "token_extracted",
            Self::SignatureVerified => "signature_verified",
            Self::ExpiryChecked => "expiry_checked",
            Self::PolicyChecked => "policy_checked",
            Self::Admitted => "admitted",
        }
    }
}

#[derive(Debug)]
pub struct AccessGuard {
    store: Arc<CredentialStore>,
    signing_key: Arc<SigningKey>,
    clock: Arc<dyn Clock>,
}

impl AccessGuard {
    #[must_use]
    pub fn new(
        store: Arc<CredentialStore>,
        signing_key: Arc<SigningKey>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            signing_key,
            clock,
        }
    }

    /// Authenticate the request and check `capability`.
    ///
    /// The rejected stage and reason are logged; the returned error stays coarse.
    ///
    /// # Errors
    /// `Unauthenticated` for a missing, malformed, forged or expired token,
    /// `Forbidden` when the capability does not hold.
    pub fn authorize(
        &self,
        headers: &HeaderMap,
        capability: Capability,
    ) -> Result<Identity, AuthError> {
        let mut stage = GuardStage::Received;
        let result = self.admit(headers, capability, &mut stage);
        match &result {
            Ok(identity) => debug!(
                user_id = identity.user_id,
                ?capability,
                stage = GuardStage::Admitted.as_str(),
                "request admitted"
            ),
            Err(err) => warn!(
                ?capability,
                stage = stage.as_str(),
                error = %err,
                "request rejected"
            ),
        }
        result
    }

    fn admit(
        &self,
        headers: &HeaderMap,
        capability: Capability,
        stage: &mut GuardStage,
    ) -> Result<Identity, AuthError> {
        let token = extract_bearer_token(headers).map_err(AuthError::Unauthenticated)?;
        *stage = GuardStage::TokenExtracted;

        let claims = verify_signature(&token, &self.signing_key).map_err(|err| match err {
            TokenError::InvalidSignature => {
                AuthError::Unauthenticated(UnauthenticatedReason::InvalidSignature)
            }
            _ => AuthError::Unauthenticated(UnauthenticatedReason::MalformedToken),
        })?;
        *stage = GuardStage::SignatureVerified;

        check_expiry(&claims, self.clock.now_unix_seconds())
            .map_err(|_| AuthError::Unauthenticated(UnauthenticatedReason::Expired))?;
        *stage = GuardStage::ExpiryChecked;

        let identity = Identity {
            user_id: claims.sub,
            role: claims.role,
            issued_at: claims.iat,
            expires_at: claims.exp,
        };
        self.check(&identity, capability)?;
        *stage = GuardStage::PolicyChecked;

        Ok(identity)
    }

    /// Policy step only, for an identity the guard already admitted.
    ///
    /// Admin rights are sensitive: the token's role must say admin *and* the
    /// store must still agree.
    ///
    /// # Errors
    /// `Forbidden` when the capability does not hold, `Unauthenticated` if an
    /// admin's account no longer exists.
    pub fn check(&self, identity: &Identity, capability: Capability) -> Result<(), AuthError> {
        match capability {
            Capability::Authenticated => Ok(()),
            Capability::Admin => self.confirm_admin(identity),
            Capability::OwnerOrAdmin(owner_id) if owner_id == identity.user_id => Ok(()),
            Capability::OwnerOrAdmin(_) => self.confirm_admin(identity),
        }
    }

    fn confirm_admin(&self, identity: &Identity) -> Result<(), AuthError> {
        if !identity.role.is_admin() {
            return Err(AuthError::Forbidden);
        }
        match self.store.find_by_id(identity.user_id)? {
            Some(user) if user.role().is_admin() => Ok(()),
            Some(_) => {
                debug!(
                    user_id = identity.user_id,
                    "token claims admin but stored role no longer does"
                );
                Err(AuthError::Forbidden)
            }
            None => Err(AuthError::Unauthenticated(
                UnauthenticatedReason::UnknownSubject,
            )),
        }
    }
}

fn extract_bearer_token(headers: &HeaderMap) -> Result<String, UnauthenticatedReason> {
    let value = headers
        .get(AUTHORIZATION)
        .ok_or(UnauthenticatedReason::MissingToken)?;
    let value = value
        .to_str()
        .map_err(|_| UnauthenticatedReason::MalformedToken)?
        .trim();
    let token = value
        .strip_prefix("Bearer ")
        .or_else(|| value.strip_prefix("bearer "))
        .ok_or(UnauthenticatedReason::MalformedToken)?
        .trim();
    if token.is_empty() {
        Err(UnauthenticatedReason::MalformedToken)
    } else {
        Ok(token.to_string())
    }
}
