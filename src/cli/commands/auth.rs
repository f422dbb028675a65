//! Signing key, token lifetime, profile and seeding arguments.

use anyhow::{Context, Result};
use clap::{Arg, ArgMatches, Command};
use secrecy::SecretString;

use crate::identity::Profile;

pub const ARG_PROFILE: &str = "profile";
pub const ARG_SIGNING_KEY: &str = "signing-key";
pub const ARG_TOKEN_TTL_SECONDS: &str = "token-ttl-seconds";
pub const ARG_ADMIN_USERNAME: &str = "admin-username";
pub const ARG_ADMIN_PASSWORD: &str = "admin-password";
pub const ARG_ADMIN_EMAIL: &str = "admin-email";
pub const ARG_FRONTEND_ORIGIN: &str = "frontend-origin";

#[must_use]
pub fn with_args(command: Command) -> Command {
    let command = with_session_args(command);
    with_seed_args(command)
}

fn with_session_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_PROFILE)
                .long(ARG_PROFILE)
                .help("Deployment profile: development or production")
                .long_help(
                    "Deployment profile. Production refuses to start without a signing key; development generates an ephemeral key and seeds demo accounts.",
                )
                .env("TASKWARDEN_PROFILE")
                .default_value("production")
                .value_parser(clap::builder::ValueParser::new(|value: &str| {
                    value.parse::<Profile>()
                })),
        )
        .arg(
            Arg::new(ARG_SIGNING_KEY)
                .long(ARG_SIGNING_KEY)
                .help("HMAC key for session tokens, at least 32 bytes")
                .env("TASKWARDEN_SIGNING_KEY")
                .hide_env_values(true),
        )
        .arg(
            Arg::new(ARG_TOKEN_TTL_SECONDS)
                .long(ARG_TOKEN_TTL_SECONDS)
                .help("Session token lifetime in seconds")
                .env("TASKWARDEN_TOKEN_TTL_SECONDS")
                .default_value("86400")
                .value_parser(clap::value_parser!(i64).range(1..)),
        )
        .arg(
            Arg::new(ARG_FRONTEND_ORIGIN)
                .long(ARG_FRONTEND_ORIGIN)
                .help("Browser origin allowed by CORS, e.g. https://tasks.example.com")
                .env("TASKWARDEN_FRONTEND_ORIGIN"),
        )
}

fn with_seed_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_ADMIN_USERNAME)
                .long(ARG_ADMIN_USERNAME)
                .help("Username of the admin account seeded at startup")
                .env("TASKWARDEN_ADMIN_USERNAME")
                .default_value("admin"),
        )
        .arg(
            Arg::new(ARG_ADMIN_PASSWORD)
                .long(ARG_ADMIN_PASSWORD)
                .help("Password of the seeded admin account")
                .long_help(
                    "Password of the seeded admin account. In production no admin is seeded unless this is set.",
                )
                .env("TASKWARDEN_ADMIN_PASSWORD")
                .hide_env_values(true),
        )
        .arg(
            Arg::new(ARG_ADMIN_EMAIL)
                .long(ARG_ADMIN_EMAIL)
                .help("Email of the seeded admin account")
                .env("TASKWARDEN_ADMIN_EMAIL")
                .default_value("admin@taskwarden.local"),
        )
}

#[derive(Debug)]
pub struct Options {
    pub profile: Profile,
    pub signing_key: Option<SecretString>,
    pub token_ttl_seconds: i64,
    pub frontend_origin: Option<String>,
    pub admin_username: String,
    pub admin_password: Option<SecretString>,
    pub admin_email: String,
}

impl Options {
    /// # Errors
    /// Returns an error if a defaulted argument is missing.
    pub fn parse(matches: &ArgMatches) -> Result<Self> {
        Ok(Self {
            profile: matches
                .get_one::<Profile>(ARG_PROFILE)
                .copied()
                .context("missing argument: --profile")?,
            signing_key: matches
                .get_one::<String>(ARG_SIGNING_KEY)
                .map(|key| SecretString::from(key.clone())),
            token_ttl_seconds: matches
                .get_one::<i64>(ARG_TOKEN_TTL_SECONDS)
                .copied()
                .context("missing argument: --token-ttl-seconds")?,
            frontend_origin: matches.get_one::<String>(ARG_FRONTEND_ORIGIN).cloned(),
            admin_username: matches
                .get_one::<String>(ARG_ADMIN_USERNAME)
                .cloned()
                .context("missing argument: --admin-username")?,
            admin_password: matches
                .get_one::<String>(ARG_ADMIN_PASSWORD)
                .map(|password| SecretString::from(password.clone())),
            admin_email: matches
                .get_one::<String>(ARG_ADMIN_EMAIL)
                .cloned()
                .context("missing argument: --admin-email")?,
        })
    }
}
