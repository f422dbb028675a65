use anyhow::{Context, Result, anyhow};
use secrecy::SecretString;
use std::sync::Arc;
use tracing::{info, warn};

use crate::{
    api::{self, AppState, ROUTES},
    cli::telemetry,
    identity::{
        AuthConfig, CredentialHasher, CredentialStore, NewUser, Profile, Role, RouteTable,
        SystemClock, UserProfile, resolve_signing_key,
    },
};

const DEMO_PASSWORD: &str = "password123";
const DEMO_USERS: [&str; 2] = ["alice", "bob"];

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub profile: Profile,
    pub signing_key: Option<SecretString>,
    pub token_ttl_seconds: i64,
    pub frontend_origin: Option<String>,
    pub admin_username: String,
    pub admin_password: Option<SecretString>,
    pub admin_email: String,
}

/// Execute the server action.
/// # Errors
/// Returns an error if configuration is invalid, the route table does not
/// match the served routes, or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    let signing_key = resolve_signing_key(args.profile, args.signing_key.as_ref())?;
    let config = AuthConfig::new(args.profile).with_token_ttl_seconds(args.token_ttl_seconds)?;
    check_route_table()?;

    let store = Arc::new(
        CredentialStore::in_memory(CredentialHasher::default())
            .context("Failed to initialize credential store")?,
    );
    let seeded = seed_accounts(&store, &args)?;
    info!(
        profile = %args.profile,
        seeded = seeded.len(),
        token_ttl_seconds = config.token_ttl_seconds(),
        "credential store ready"
    );

    let state = Arc::new(AppState::new(
        store,
        signing_key,
        &config,
        Arc::new(SystemClock),
    ));

    let result = api::new(args.port, state, args.frontend_origin.as_deref()).await;
    telemetry::shutdown_tracer();
    result
}

/// Refuse to start if any served operation lacks a policy, or a policy names
/// a route that is not served.
pub(crate) fn check_route_table() -> Result<()> {
    let served = api::documented_operations(&api::openapi());
    RouteTable::new(ROUTES).validate(&served).map_err(|errors| {
        let details = errors
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ");
        anyhow!("route policy table does not match the router: {details}")
    })
}

/// Create the startup accounts.
///
/// An explicit admin password always wins. Without one, development seeds demo
/// accounts and production seeds nothing.
pub(crate) fn seed_accounts(store: &CredentialStore, args: &Args) -> Result<Vec<UserProfile>> {
    let mut seeded = Vec::new();

    let admin_password = match (&args.admin_password, args.profile) {
        (Some(password), _) => password.clone(),
        (None, Profile::Development) => SecretString::from(DEMO_PASSWORD),
        (None, Profile::Production) => {
            warn!("no admin password configured, no admin account seeded");
            return Ok(seeded);
        }
    };

    seeded.push(
        store
            .create_user(NewUser {
                username: args.admin_username.clone(),
                email: args.admin_email.clone(),
                password: admin_password,
                role: Role::Admin,
            })
            .with_context(|| format!("Failed to seed admin account {}", args.admin_username))?,
    );

    if args.profile == Profile::Development && args.admin_password.is_none() {
        for username in DEMO_USERS {
            seeded.push(
                store
                    .create_user(NewUser {
                        username: username.to_string(),
                        email: format!("{username}@taskwarden.local"),
                        password: SecretString::from(DEMO_PASSWORD),
                        role: Role::User,
                    })
                    .with_context(|| format!("Failed to seed demo account {username}"))?,
            );
        }
        warn!("development profile: seeded demo accounts with the well-known demo password");
    }

    Ok(seeded)
}
