use axum::http::Method;

use crate::identity::{Capability, RoutePolicy};

/// Access policy for every served route. Checked against the OpenAPI
/// operations at startup.
///
/// Routes with an owner-or-admin rule are listed as `Authenticated` here; the
/// handler loads the resource and finishes the check with the owner id.
pub static ROUTES: &[RoutePolicy] = &[
    RoutePolicy::public(Method::GET, "/"),
    RoutePolicy::public(Method::GET, "/health"),
    RoutePolicy::public(Method::GET, "/openapi.json"),
    RoutePolicy::public(Method::POST, "/login"),
    RoutePolicy::public(Method::POST, "/register"),
    RoutePolicy::protected(Method::GET, "/api/me", Capability::Authenticated),
    RoutePolicy::protected(Method::GET, "/api/users", Capability::Admin),
    RoutePolicy::protected(Method::GET, "/api/users/:id", Capability::Authenticated),
    RoutePolicy::protected(
        Method::PUT,
        "/api/users/:id/password",
        Capability::Authenticated,
    ),
    RoutePolicy::protected(Method::PUT, "/api/users/:id/role", Capability::Admin),
    RoutePolicy::protected(Method::GET, "/api/tasks", Capability::Authenticated),
    RoutePolicy::protected(Method::POST, "/api/tasks", Capability::Authenticated),
    RoutePolicy::protected(Method::GET, "/api/tasks/:id", Capability::Authenticated),
    RoutePolicy::protected(Method::PUT, "/api/tasks/:id", Capability::Authenticated),
    RoutePolicy::protected(Method::DELETE, "/api/tasks/:id", Capability::Authenticated),
];
