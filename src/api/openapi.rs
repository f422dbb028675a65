use axum::http::Method;
use utoipa::{
    Modify, OpenApi,
    openapi::{
        Contact, License,
        security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    },
};

use super::{
    error::ErrorBody,
    handlers::{auth, docs, health, root, tasks, users},
};
use crate::{
    identity::{IssuedToken, Role, UserProfile},
    tasks::Task,
};

/// Every served endpoint must be listed in `paths`; the route policy table is
/// checked against this document at startup.
#[derive(OpenApi)]
#[openapi(
    paths(
        root::root,
        health::health,
        docs::openapi_json,
        auth::login,
        auth::register,
        users::me,
        users::list_users,
        users::get_user,
        users::change_password,
        users::set_role,
        tasks::list_tasks,
        tasks::create_task,
        tasks::get_task,
        tasks::update_task,
        tasks::delete_task,
    ),
    components(schemas(
        ErrorBody,
        IssuedToken,
        Role,
        Task,
        UserProfile,
        auth::LoginRequest,
        auth::RegisterRequest,
        auth::RegisterResponse,
        users::PasswordChangeRequest,
        users::RoleChangeRequest,
        tasks::CreateTaskRequest,
        tasks::UpdateTaskRequest,
        health::Health,
    )),
    modifiers(&BearerAuth),
    tags(
        (name = "health", description = "Service status and documentation"),
        (name = "auth", description = "Login and registration"),
        (name = "users", description = "Profiles, passwords and roles"),
        (name = "tasks", description = "Tasks owned by users"),
    )
)]
struct ApiDoc;

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    let mut doc = ApiDoc::openapi();
    // Package metadata from Cargo.toml rather than the derive defaults.
    doc.info.title = env!("CARGO_PKG_NAME").to_string();
    doc.info.version = env!("CARGO_PKG_VERSION").to_string();
    doc.info.description = optional_str(env!("CARGO_PKG_DESCRIPTION")).map(str::to_string);
    doc.info.contact = cargo_contact();
    doc.info.license = cargo_license();
    doc
}

/// `(method, path)` for every operation in the document, paths in `{param}` form.
#[must_use]
pub fn documented_operations(doc: &utoipa::openapi::OpenApi) -> Vec<(Method, String)> {
    let mut operations = Vec::new();
    for (path, item) in &doc.paths.paths {
        let methods = [
            (Method::GET, item.get.is_some()),
            (Method::PUT, item.put.is_some()),
            (Method::POST, item.post.is_some()),
            (Method::DELETE, item.delete.is_some()),
            (Method::PATCH, item.patch.is_some()),
            (Method::OPTIONS, item.options.is_some()),
            (Method::HEAD, item.head.is_some()),
            (Method::TRACE, item.trace.is_some()),
        ];
        operations.extend(
            methods
                .into_iter()
                .filter(|(_, present)| *present)
                .map(|(method, _)| (method, path.clone())),
        );
    }
    operations
}

fn cargo_contact() -> Option<Contact> {
    // Cargo authors are `;` separated and may include "Name <email>".
    let primary = env!("CARGO_PKG_AUTHORS").split(';').next().map(str::trim)?;
    let (name, email) = split_author(primary);
    if name.is_none() && email.is_none() {
        return None;
    }

    let mut contact = Contact::new();
    contact.name = name.map(str::to_string);
    contact.email = email.map(str::to_string);
    Some(contact)
}

fn cargo_license() -> Option<License> {
    let identifier = optional_str(env!("CARGO_PKG_LICENSE"))?;
    let mut license = License::new(identifier);
    license.identifier = Some(identifier.to_string());
    Some(license)
}

fn optional_str(value: &str) -> Option<&str> {
    Some(value.trim()).filter(|value| !value.is_empty())
}

fn split_author(author: &str) -> (Option<&str>, Option<&str>) {
    match author.split_once('<') {
        Some((name, rest)) => (
            optional_str(name),
            optional_str(rest.trim_end_matches('>')),
        ),
        None => (optional_str(author), None),
    }
}
