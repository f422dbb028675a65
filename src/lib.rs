//! # Taskwarden
//!
//! `taskwarden` is a task management API. Users register, log in with a
//! username and password, and manage their own tasks; administrators can see and
//! manage every account and task.
//!
//! ## Authentication
//!
//! Passwords are stored as Argon2id hashes. A successful login returns a signed
//! HS256 session token carrying the user id, role snapshot, issue time and
//! expiry. There are no server-side sessions: every protected request presents
//! the token as `Authorization: Bearer <token>`.
//!
//! ## Authorization
//!
//! Every served route is classified in a static policy table as public,
//! authenticated, or admin-only. The table is checked against the documented
//! router at startup and the process refuses to start if they disagree.
//! Per-resource ownership is decided in handlers once the resource is loaded.
//!
//! - **Uniform failures:** bad logins are indistinguishable, and every token
//!   problem is a plain `401`.
//! - **Enumeration:** non-admins get `403 Forbidden` for resources that belong to
//!   someone else and for resources that do not exist.

pub mod api;
pub mod cli;
pub mod identity;
pub mod tasks;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};
