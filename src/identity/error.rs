use thiserror::Error;

/// Why a request failed authentication.
///
/// Only logged. Clients always receive the same `401` body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnauthenticatedReason {
    MissingToken,
    MalformedToken,
    InvalidSignature,
    Expired,
    UnknownSubject,
}

impl UnauthenticatedReason {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::MissingToken => "missing_token",
            Self::MalformedToken => "malformed_token",
            Self::InvalidSignature => "invalid_signature",
            Self::Expired => "expired",
            Self::UnknownSubject => "unknown_subject",
        }
    }
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("unauthenticated: {}", .0.as_str())]
    Unauthenticated(UnauthenticatedReason),
    #[error("forbidden")]
    Forbidden,
    #[error("not found")]
    NotFound,
    #[error("internal error: {0:#}")]
    Internal(#[from] anyhow::Error),
}

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => Self::NotFound,
            other => Self::Internal(anyhow::Error::new(other)),
        }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("username already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    /// Nothing was applied; the operation may be retried.
    #[error("storage temporarily unavailable: {0}")]
    Transient(String),
    #[error("storage failure: {0}")]
    Backend(String),
    #[error("password hashing failed: {0}")]
    Hash(String),
}

impl StoreError {
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}
