//! Map validated CLI arguments to the action to run.

use crate::cli::actions::{Action, server::Args};
use crate::cli::commands::{ARG_PORT, auth};
use anyhow::{Context, Result};

/// Map validated CLI matches to a server action.
///
/// # Errors
/// Returns an error if a required argument is missing.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches
        .get_one::<u16>(ARG_PORT)
        .copied()
        .context("missing argument: --port")?;

    let auth_opts = auth::Options::parse(matches)?;

    Ok(Action::Server(Args {
        port,
        profile: auth_opts.profile,
        signing_key: auth_opts.signing_key,
        token_ttl_seconds: auth_opts.token_ttl_seconds,
        frontend_origin: auth_opts.frontend_origin,
        admin_username: auth_opts.admin_username,
        admin_password: auth_opts.admin_password,
        admin_email: auth_opts.admin_email,
    }))
}
