//! Credential Store: user records, password hashes, and the repository seam.
//!
//! The password hash never leaves this module. Callers get a [`UserProfile`]
//! for display, or hand a plaintext back to [`CredentialStore::verify_password`].

use rand::{RngCore, rngs::OsRng};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, RwLock};
use tracing::{debug, warn};
use utoipa::ToSchema;

use super::{error::StoreError, password::CredentialHasher};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    User,
}

impl Role {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::User => "user",
        }
    }

    #[must_use]
    pub const fn is_admin(self) -> bool {
        matches!(self, Self::Admin)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "admin" => Ok(Self::Admin),
            "user" => Ok(Self::User),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

/// Stored identity record. Deliberately not `Serialize`.
#[derive(Clone)]
pub struct User {
    id: i64,
    username: String,
    email: String,
    role: Role,
    password_hash: String,
}

impl User {
    #[must_use]
    pub const fn id(&self) -> i64 {
        self.id
    }

    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    #[must_use]
    pub fn email(&self) -> &str {
        &self.email
    }

    #[must_use]
    pub const fn role(&self) -> Role {
        self.role
    }

    #[must_use]
    pub fn profile(&self) -> UserProfile {
        UserProfile {
            id: self.id,
            username: self.username.clone(),
            email: self.email.clone(),
            role: self.role,
        }
    }
}

impl fmt::Debug for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("User")
            .field("id", &self.id)
            .field("username", &self.username)
            .field("email", &self.email)
            .field("role", &self.role)
            .field("password_hash", &"[REDACTED]")
            .finish()
    }
}

/// The public face of a user, safe to put in any response.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct UserProfile {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub role: Role,
}

#[derive(Debug)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password: SecretString,
    pub role: Role,
}

/// Storage backend for user records.
///
/// Implementations must apply each call atomically: a `Transient` error means
/// nothing was written, which is what makes the store's single retry safe.
pub trait UserRepository: Send + Sync {
    /// Look up by normalized username key (see [`username_key`]).
    fn find_by_username(&self, username_key: &str) -> Result<Option<User>, StoreError>;
    fn find_by_id(&self, id: i64) -> Result<Option<User>, StoreError>;
    fn insert(
        &self,
        username: &str,
        email: &str,
        role: Role,
        password_hash: &str,
    ) -> Result<User, StoreError>;
    /// Apply `change` to one record while holding it exclusively.
    fn modify(&self, id: i64, change: &mut dyn FnMut(&mut User)) -> Result<User, StoreError>;
    fn list(&self) -> Result<Vec<User>, StoreError>;
}

#[derive(Default)]
struct UserTable {
    users: BTreeMap<i64, User>,
    by_username: HashMap<String, i64>,
    next_id: i64,
}

/// Process-local user table.
#[derive(Default)]
pub struct InMemoryUserRepository {
    table: RwLock<UserTable>,
}

impl InMemoryUserRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned() -> StoreError {
    StoreError::Backend("user table lock poisoned".to_string())
}

impl UserRepository for InMemoryUserRepository {
    fn find_by_username(&self, username_key: &str) -> Result<Option<User>, StoreError> {
        let table = self.table.read().map_err(|_| poisoned())?;
        Ok(table
            .by_username
            .get(username_key)
            .and_then(|id| table.users.get(id))
            .cloned())
    }

    fn find_by_id(&self, id: i64) -> Result<Option<User>, StoreError> {
        let table = self.table.read().map_err(|_| poisoned())?;
        Ok(table.users.get(&id).cloned())
    }

    fn insert(
        &self,
        username: &str,
        email: &str,
        role: Role,
        password_hash: &str,
    ) -> Result<User, StoreError> {
        let mut table = self.table.write().map_err(|_| poisoned())?;
        let key = username_key(username);
        if table.by_username.contains_key(&key) {
            return Err(StoreError::Conflict);
        }
        table.next_id += 1;
        let user = User {
            id: table.next_id,
            username: username.to_string(),
            email: email.to_string(),
            role,
            password_hash: password_hash.to_string(),
        };
        table.by_username.insert(key, user.id);
        table.users.insert(user.id, user.clone());
        Ok(user)
    }

    fn modify(&self, id: i64, change: &mut dyn FnMut(&mut User)) -> Result<User, StoreError> {
        let mut table = self.table.write().map_err(|_| poisoned())?;
        let user = table.users.get_mut(&id).ok_or(StoreError::NotFound)?;
        change(user);
        Ok(user.clone())
    }

    fn list(&self) -> Result<Vec<User>, StoreError> {
        let table = self.table.read().map_err(|_| poisoned())?;
        Ok(table.users.values().cloned().collect())
    }
}

/// Usernames are unique regardless of case and surrounding whitespace.
pub(crate) fn username_key(username: &str) -> String {
    username.trim().to_lowercase()
}

fn retry_once<T>(
    operation: &str,
    mut call: impl FnMut() -> Result<T, StoreError>,
) -> Result<T, StoreError> {
    match call() {
        Err(err) if err.is_transient() => {
            warn!(operation, error = %err, "transient store failure, retrying once");
            call()
        }
        other => other,
    }
}

pub struct CredentialStore {
    repository: Arc<dyn UserRepository>,
    hasher: CredentialHasher,
    /// Hash of a random throwaway password, used to equalize absent-user latency.
    reference_hash: String,
}

impl fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialStore")
            .field("hasher", &self.hasher)
            .finish_non_exhaustive()
    }
}

impl CredentialStore {
    /// # Errors
    /// Returns an error if the reference hash cannot be computed.
    pub fn new(
        repository: Arc<dyn UserRepository>,
        hasher: CredentialHasher,
    ) -> Result<Self, StoreError> {
        let mut throwaway = [0u8; 32];
        OsRng
            .try_fill_bytes(&mut throwaway)
            .map_err(|err| StoreError::Hash(err.to_string()))?;
        let throwaway: String = throwaway.iter().map(|byte| format!("{byte:02x}")).collect();
        let reference_hash = hasher.hash(&throwaway)?;
        Ok(Self {
            repository,
            hasher,
            reference_hash,
        })
    }

    /// # Errors
    /// Returns an error if the reference hash cannot be computed.
    pub fn in_memory(hasher: CredentialHasher) -> Result<Self, StoreError> {
        Self::new(Arc::new(InMemoryUserRepository::new()), hasher)
    }

    /// # Errors
    /// Returns an error if the repository fails twice in a row or permanently.
    pub fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        let key = username_key(username);
        retry_once("find_by_username", || {
            self.repository.find_by_username(&key)
        })
    }

    /// # Errors
    /// Returns an error if the repository fails twice in a row or permanently.
    pub fn find_by_id(&self, id: i64) -> Result<Option<User>, StoreError> {
        retry_once("find_by_id", || self.repository.find_by_id(id))
    }

    #[must_use]
    pub fn verify_password(&self, user: &User, password: &str) -> bool {
        self.hasher.verify(password, &user.password_hash)
    }

    /// Burn the same Argon2 work as a real verification. Always fails.
    pub fn verify_dummy(&self, password: &str) {
        let matched = self.hasher.verify(password, &self.reference_hash);
        debug!(matched, "reference hash verification");
    }

    /// # Errors
    /// Returns `StoreError::Conflict` for a taken username, or hashing/backend errors.
    pub fn create_user(&self, new_user: NewUser) -> Result<UserProfile, StoreError> {
        let username = new_user.username.trim();
        let hash = self.hasher.hash(new_user.password.expose_secret())?;
        let user = retry_once("insert", || {
            self.repository
                .insert(username, new_user.email.trim(), new_user.role, &hash)
        })?;
        debug!(user_id = user.id, role = %user.role, "user created");
        Ok(user.profile())
    }

    /// Re-hash with a fresh salt and replace the stored hash.
    ///
    /// # Errors
    /// Returns `StoreError::NotFound` if the user does not exist.
    pub fn update_password(&self, id: i64, password: &str) -> Result<(), StoreError> {
        let hash = self.hasher.hash(password)?;
        retry_once("update_password", || {
            self.repository
                .modify(id, &mut |user| user.password_hash.clone_from(&hash))
        })?;
        debug!(user_id = id, "password hash replaced");
        Ok(())
    }

    /// # Errors
    /// Returns `StoreError::NotFound` if the user does not exist.
    pub fn update_role(&self, id: i64, role: Role) -> Result<UserProfile, StoreError> {
        let user = retry_once("update_role", || {
            self.repository.modify(id, &mut |user| user.role = role)
        })?;
        debug!(user_id = id, role = %role, "role updated");
        Ok(user.profile())
    }

    /// # Errors
    /// Returns an error if the repository fails twice in a row or permanently.
    pub fn list(&self) -> Result<Vec<UserProfile>, StoreError> {
        let users = retry_once("list", || self.repository.list())?;
        Ok(users.iter().map(User::profile).collect())
    }
}
