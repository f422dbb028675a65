use std::sync::Arc;

use super::routes::ROUTES;
use crate::{
    identity::{
        AccessGuard, AuthConfig, Authenticator, Clock, CredentialStore, RouteTable, SigningKey,
    },
    tasks::TaskStore,
};

/// Everything a handler can reach. Built once at startup and shared via `Extension`.
#[derive(Debug)]
pub struct AppState {
    pub store: Arc<CredentialStore>,
    pub authenticator: Arc<Authenticator>,
    pub guard: AccessGuard,
    pub tasks: TaskStore,
    pub routes: RouteTable,
}

impl AppState {
    #[must_use]
    pub fn new(
        store: Arc<CredentialStore>,
        signing_key: SigningKey,
        config: &AuthConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let signing_key = Arc::new(signing_key);
        Self {
            authenticator: Arc::new(Authenticator::new(
                store.clone(),
                signing_key.clone(),
                config,
                clock.clone(),
            )),
            guard: AccessGuard::new(store.clone(), signing_key, clock.clone()),
            tasks: TaskStore::new(clock),
            routes: RouteTable::new(ROUTES),
            store,
        }
    }
}
