//! Route policy table.
//!
//! Every routed endpoint is classified once, up front, as public or protected.
//! A route with no entry is denied, never allowed.

use axum::http::Method;
use std::collections::HashSet;
use thiserror::Error;

use super::guard::Capability;

/// How a route may be reached.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Access {
    Public,
    /// Needs a valid token plus the given capability. Ownership checks need the
    /// resource, so handlers finish those with [`AccessGuard::check`](super::AccessGuard::check).
    Protected(Capability),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RoutePolicy {
    pub method: Method,
    /// Router path template, e.g. `/api/tasks/:id`.
    pub path: &'static str,
    pub access: Access,
}

impl RoutePolicy {
    #[must_use]
    pub const fn public(method: Method, path: &'static str) -> Self {
        Self {
            method,
            path,
            access: Access::Public,
        }
    }

    #[must_use]
    pub const fn protected(method: Method, path: &'static str, capability: Capability) -> Self {
        Self {
            method,
            path,
            access: Access::Protected(capability),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PolicyError {
    #[error("route {0} {1} is classified more than once")]
    Duplicate(Method, String),
    #[error("route {0} {1} is served but has no access policy")]
    Unclassified(Method, String),
    #[error("route {0} {1} has a policy but is not served")]
    Dangling(Method, String),
}

#[derive(Clone, Debug)]
pub struct RouteTable {
    routes: &'static [RoutePolicy],
}

impl RouteTable {
    #[must_use]
    pub const fn new(routes: &'static [RoutePolicy]) -> Self {
        Self { routes }
    }

    #[must_use]
    pub const fn routes(&self) -> &'static [RoutePolicy] {
        self.routes
    }

    /// Find the policy for a matched router path. `HEAD` follows `GET`.
    #[must_use]
    pub fn lookup(&self, method: &Method, path: &str) -> Option<Access> {
        let method = if *method == Method::HEAD {
            Method::GET
        } else {
            method.clone()
        };
        self.routes
            .iter()
            .find(|route| route.method == method && route.path == path)
            .map(|route| route.access)
    }

    /// Compare the table against the operations the server actually serves,
    /// given as `(method, OpenAPI path)` pairs.
    ///
    /// # Errors
    /// Returns every mismatch found, not only the first.
    pub fn validate(&self, served: &[(Method, String)]) -> Result<(), Vec<PolicyError>> {
        let mut errors = Vec::new();
        let mut classified = HashSet::new();

        for route in self.routes {
            let key = (route.method.clone(), to_openapi_path(route.path));
            if !classified.insert(key.clone()) {
                errors.push(PolicyError::Duplicate(key.0, key.1));
            }
        }

        let served_set: HashSet<(Method, String)> = served.iter().cloned().collect();
        for (method, path) in served {
            if !classified.contains(&(method.clone(), path.clone())) {
                errors.push(PolicyError::Unclassified(method.clone(), path.clone()));
            }
        }
        for route in self.routes {
            let key = (route.method.clone(), to_openapi_path(route.path));
            if !served_set.contains(&key) {
                errors.push(PolicyError::Dangling(key.0, key.1));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Convert a router template (`/api/tasks/:id`) to OpenAPI form (`/api/tasks/{id}`).
#[must_use]
pub fn to_openapi_path(path: &str) -> String {
    path.split('/')
        .map(|segment| match segment.strip_prefix(':') {
            Some(name) => format!("{{{name}}}"),
            None => segment.to_string(),
        })
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    static ROUTES: &[RoutePolicy] = &[
        RoutePolicy::public(Method::GET, "/health"),
        RoutePolicy::public(Method::POST, "/login"),
        RoutePolicy::protected(Method::GET, "/api/users", Capability::Admin),
        RoutePolicy::protected(Method::GET, "/api/tasks/:id", Capability::Authenticated),
    ];

    fn served() -> Vec<(Method, String)> {
        vec![
            (Method::GET, "/health".to_string()),
            (Method::POST, "/login".to_string()),
            (Method::GET, "/api/users".to_string()),
            (Method::GET, "/api/tasks/{id}".to_string()),
        ]
    }

    #[test]
    fn converts_path_parameters() {
        assert_eq!(to_openapi_path("/api/tasks/:id"), "/api/tasks/{id}");
        assert_eq!(
            to_openapi_path("/api/users/:id/password"),
            "/api/users/{id}/password"
        );
        assert_eq!(to_openapi_path("/"), "/");
    }

    #[test]
    fn lookup_matches_method_and_path() {
        let table = RouteTable::new(ROUTES);
        assert_eq!(table.lookup(&Method::GET, "/health"), Some(Access::Public));
        assert_eq!(
            table.lookup(&Method::GET, "/api/users"),
            Some(Access::Protected(Capability::Admin))
        );
        assert_eq!(table.lookup(&Method::POST, "/health"), None);
        assert_eq!(table.lookup(&Method::GET, "/api/unknown"), None);
    }

    #[test]
    fn head_follows_get() {
        let table = RouteTable::new(ROUTES);
        assert_eq!(table.lookup(&Method::HEAD, "/health"), Some(Access::Public));
        assert_eq!(table.lookup(&Method::HEAD, "/login"), None);
    }

    #[test]
    fn validate_accepts_matching_table() {
        assert_eq!(RouteTable::new(ROUTES).validate(&served()), Ok(()));
    }

    #[test]
    fn validate_reports_unclassified_routes() {
        let mut served = served();
        served.push((Method::DELETE, "/api/tasks/{id}".to_string()));
        let errors = RouteTable::new(ROUTES)
            .validate(&served)
            .err()
            .unwrap_or_default();
        assert_eq!(
            errors,
            vec![PolicyError::Unclassified(
                Method::DELETE,
                "/api/tasks/{id}".to_string()
            )]
        );
    }

    #[test]
    fn validate_reports_dangling_and_duplicate_entries() {
        static BROKEN: &[RoutePolicy] = &[
            RoutePolicy::public(Method::GET, "/health"),
            RoutePolicy::public(Method::GET, "/health"),
            RoutePolicy::public(Method::GET, "/gone"),
        ];
        let served = vec![(Method::GET, "/health".to_string())];
        let errors = RouteTable::new(BROKEN)
            .validate(&served)
            .err()
            .unwrap_or_default();
        assert!(errors.contains(&PolicyError::Duplicate(
            Method::GET,
            "/health".to_string()
        )));
        assert!(errors.contains(&PolicyError::Dangling(Method::GET, "/gone".to_string())));
        assert_eq!(errors.len(), 2);
    }
}
