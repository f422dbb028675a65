//! Credential and session authority.
//!
//! Flow Overview: the [`CredentialStore`] owns user records and their Argon2
//! hashes, the [`Authenticator`] turns a username/password pair into a signed
//! session token, and the [`AccessGuard`] turns a bearer token back into an
//! [`Identity`] and checks it against a [`Capability`].
//!
//! ## Uniform failures
//!
//! Login failures are always `InvalidCredentials`, whether the user exists or
//! not. The absent-user path still runs a full Argon2 verification against a
//! reference hash generated at startup so latency does not reveal which usernames
//! exist. Token failures are always `Unauthenticated`; the internal reason and the
//! guard stage that rejected the request are only written to the logs.
//!
//! ## Role snapshots
//!
//! Tokens carry the role the user had at login. Ordinary checks trust it, but
//! anything requiring admin rights re-reads the role from the store, so a demoted
//! admin loses those rights immediately even though the old token stays valid
//! until it expires. There is no revocation list.

mod authenticator;
mod clock;
mod config;
mod error;
mod guard;
mod password;
mod policy;
mod store;
mod token;

pub use authenticator::{Authenticator, IssuedToken};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{AuthConfig, ConfigError, Profile, resolve_signing_key};
pub use error::{AuthError, StoreError, UnauthenticatedReason};
pub use guard::{AccessGuard, Capability, GuardStage, Identity};
pub use password::CredentialHasher;
pub use policy::{Access, PolicyError, RoutePolicy, RouteTable, to_openapi_path};
pub use store::{
    CredentialStore, InMemoryUserRepository, NewUser, Role, User, UserProfile, UserRepository,
};
pub use token::{SessionClaims, SigningKey, TokenError};
