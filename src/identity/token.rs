//! Session tokens: compact JWS with an HMAC-SHA256 (`HS256`) signature.

use base64ct::{Base64UrlUnpadded, Encoding};
use hmac::{Hmac, Mac};
use rand::{RngCore, rngs::OsRng};
use secrecy::{ExposeSecret, SecretSlice, SecretString};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;

use super::store::Role;

pub const TOKEN_VERSION: u8 = 1;
pub const MIN_SIGNING_KEY_BYTES: usize = 32;
const ALG_HS256: &str = "HS256";

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
struct TokenHeader {
    alg: String,
    typ: String,
}

impl TokenHeader {
    fn hs256() -> Self {
        Self {
            alg: ALG_HS256.to_string(),
            typ: "JWT".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionClaims {
    pub v: u8,
    /// Subject user id.
    pub sub: i64,
    /// Role at issuance time.
    pub role: Role,
    pub iat: i64,
    pub exp: i64,
    pub jti: String,
}

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("invalid token format")]
    TokenFormat,
    #[error("invalid base64url encoding")]
    Base64,
    #[error("invalid json")]
    Json(#[from] serde_json::Error),
    #[error("unsupported algorithm: {0}")]
    UnsupportedAlg(String),
    #[error("invalid signature")]
    InvalidSignature,
    #[error("token expired")]
    Expired,
    #[error("invalid token version")]
    InvalidVersion,
    #[error("signing key must be at least {MIN_SIGNING_KEY_BYTES} bytes, got {0}")]
    KeyLength(usize),
    #[error("random number generator failure")]
    Rng,
}

/// Process-wide HMAC key. Never printed, never serialized.
#[derive(Debug)]
pub struct SigningKey {
    secret: SecretSlice<u8>,
}

impl SigningKey {
    /// # Errors
    /// Returns `TokenError::KeyLength` for keys shorter than 32 bytes.
    pub fn from_secret(secret: &SecretString) -> Result<Self, TokenError> {
        let bytes = secret.expose_secret().as_bytes();
        if bytes.len() < MIN_SIGNING_KEY_BYTES {
            return Err(TokenError::KeyLength(bytes.len()));
        }
        Ok(Self {
            secret: SecretSlice::from(bytes.to_vec()),
        })
    }

    /// Random key for development runs; tokens die with the process.
    ///
    /// # Errors
    /// Returns `TokenError::Rng` if the OS RNG fails.
    pub fn generate() -> Result<Self, TokenError> {
        let mut bytes = vec![0u8; MIN_SIGNING_KEY_BYTES];
        OsRng.try_fill_bytes(&mut bytes).map_err(|_| TokenError::Rng)?;
        Ok(Self {
            secret: SecretSlice::from(bytes),
        })
    }

    fn mac(&self) -> Result<HmacSha256, TokenError> {
        let key = self.secret.expose_secret();
        HmacSha256::new_from_slice(key).map_err(|_| TokenError::KeyLength(key.len()))
    }
}

fn b64e_json<T: Serialize>(value: &T) -> Result<String, TokenError> {
    let json = serde_json::to_vec(value)?;
    Ok(Base64UrlUnpadded::encode_string(&json))
}

fn b64d_json<T: for<'de> Deserialize<'de>>(s: &str) -> Result<T, TokenError> {
    let bytes = Base64UrlUnpadded::decode_vec(s).map_err(|_| TokenError::Base64)?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Random token id, base64url encoded.
///
/// # Errors
/// Returns `TokenError::Rng` if the OS RNG fails.
pub fn new_token_id() -> Result<String, TokenError> {
    let mut bytes = [0u8; 16];
    OsRng.try_fill_bytes(&mut bytes).map_err(|_| TokenError::Rng)?;
    Ok(Base64UrlUnpadded::encode_string(&bytes))
}

/// Sign claims into a compact `header.claims.signature` token.
///
/// # Errors
/// Returns an error if the header or claims cannot be encoded.
pub fn sign_hs256(key: &SigningKey, claims: &SessionClaims) -> Result<String, TokenError> {
    let header_b64 = b64e_json(&TokenHeader::hs256())?;
    let claims_b64 = b64e_json(claims)?;
    let signing_input = format!("{header_b64}.{claims_b64}");

    let mut mac = key.mac()?;
    mac.update(signing_input.as_bytes());
    let signature = mac.finalize().into_bytes();
    let signature_b64 = Base64UrlUnpadded::encode_string(&signature);

    Ok(format!("{signing_input}.{signature_b64}"))
}

/// Check structure, algorithm and signature, then decode the claims.
///
/// Expiry is not checked here; see [`check_expiry`].
///
/// # Errors
/// Returns an error if the token is malformed, uses another algorithm, carries
/// an invalid signature, or has an unknown version.
pub fn verify_signature(token: &str, key: &SigningKey) -> Result<SessionClaims, TokenError> {
    let mut parts = token.split('.');
    let header_b64 = parts.next().ok_or(TokenError::TokenFormat)?;
    let claims_b64 = parts.next().ok_or(TokenError::TokenFormat)?;
    let sig_b64 = parts.next().ok_or(TokenError::TokenFormat)?;
    if parts.next().is_some() {
        return Err(TokenError::TokenFormat);
    }

    let header: TokenHeader = b64d_json(header_b64)?;
    if header.alg != ALG_HS256 {
        return Err(TokenError::UnsupportedAlg(header.alg));
    }

    let signature = Base64UrlUnpadded::decode_vec(sig_b64).map_err(|_| TokenError::Base64)?;
    let mut mac = key.mac()?;
    mac.update(header_b64.as_bytes());
    mac.update(b".");
    mac.update(claims_b64.as_bytes());
    // Constant-time comparison.
    mac.verify_slice(&signature)
        .map_err(|_| TokenError::InvalidSignature)?;

    let claims: SessionClaims = b64d_json(claims_b64)?;
    if claims.v != TOKEN_VERSION {
        return Err(TokenError::InvalidVersion);
    }

    Ok(claims)
}

/// A token is valid strictly before `exp`.
///
/// # Errors
/// Returns `TokenError::Expired` once `now >= exp`.
pub fn check_expiry(claims: &SessionClaims, now_unix_seconds: i64) -> Result<(), TokenError> {
    if claims.exp <= now_unix_seconds {
        return Err(TokenError::Expired);
    }
    Ok(())
}

/// Full verification: signature, then expiry.
///
/// # Errors
/// See [`verify_signature`] and [`check_expiry`].
pub fn verify_hs256(
    token: &str,
    key: &SigningKey,
    now_unix_seconds: i64,
) -> Result<SessionClaims, TokenError> {
    let claims = verify_signature(token, key)?;
    check_expiry(&claims, now_unix_seconds)?;
    Ok(claims)
}
