//! Router tests driven through `tower::ServiceExt::oneshot`.

use super::*;
use crate::identity::{
    AuthConfig, CredentialHasher, CredentialStore, ManualClock, NewUser, Profile, Role, SigningKey,
};
use anyhow::{Context, Result};
use axum::{
    body::to_bytes,
    http::{StatusCode, header::AUTHORIZATION},
};
use secrecy::SecretString;
use serde_json::{Value, json};
use tower::ServiceExt;

const NOW: i64 = 1_700_000_000;
const TTL: i64 = 3600;

struct TestApp {
    router: Router,
    clock: Arc<ManualClock>,
    state: Arc<AppState>,
}

fn test_app() -> Result<TestApp> {
    let store = Arc::new(CredentialStore::in_memory(
        CredentialHasher::insecure_fast(),
    )?);
    for (username, role) in [
        ("admin", Role::Admin),
        ("alice", Role::User),
        ("bob", Role::User),
    ] {
        store.create_user(NewUser {
            username: username.to_string(),
            email: format!("{username}@example.com"),
            password: SecretString::from("password123"),
            role,
        })?;
    }
    let key = SigningKey::from_secret(&SecretString::from(
        "router-test-signing-key-0123456789",
    ))?;
    let config = AuthConfig::new(Profile::Development).with_token_ttl_seconds(TTL)?;
    let clock = Arc::new(ManualClock::new(NOW));
    let state = Arc::new(AppState::new(store, key, &config, clock.clone()));
    Ok(TestApp {
        router: app(state.clone(), None),
        clock,
        state,
    })
}

struct Reply {
    status: StatusCode,
    headers: axum::http::HeaderMap,
    body: Value,
}

impl TestApp {
    async fn send(&self, request: Request<Body>) -> Result<Reply> {
        let response = self.router.clone().oneshot(request).await?;
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = to_bytes(response.into_body(), usize::MAX).await?;
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                Value::String(String::from_utf8_lossy(&bytes).into_owned())
            })
        };
        Ok(Reply {
            status,
            headers,
            body,
        })
    }

    async fn call(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> Result<Reply> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => builder
                .header(CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))?,
            None => builder.body(Body::empty())?,
        };
        self.send(request).await
    }

    async fn login(&self, username: &str, password: &str) -> Result<Reply> {
        self.call(
            Method::POST,
            "/login",
            None,
            Some(json!({ "username": username, "password": password })),
        )
        .await
    }

    async fn token(&self, username: &str) -> Result<String> {
        let reply = self.login(username, "password123").await?;
        assert_eq!(reply.status, StatusCode::OK, "login as {username}");
        reply.body["token"]
            .as_str()
            .map(str::to_string)
            .context("login response must carry a token")
    }

    async fn create_task(&self, token: &str, title: &str) -> Result<i64> {
        let reply = self
            .call(
                Method::POST,
                "/api/tasks",
                Some(token),
                Some(json!({ "title": title })),
            )
            .await?;
        assert_eq!(reply.status, StatusCode::CREATED);
        reply.body["id"].as_i64().context("task id")
    }
}

fn contains_key(value: &Value, key: &str) -> bool {
    match value {
        Value::Object(map) => map
            .iter()
            .any(|(name, nested)| name.contains(key) || contains_key(nested, key)),
        Value::Array(items) => items.iter().any(|item| contains_key(item, key)),
        _ => false,
    }
}

#[tokio::test]
async fn health_is_public_and_tagged() -> Result<()> {
    let app = test_app()?;
    let reply = app.call(Method::GET, "/health", None, None).await?;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body["name"], env!("CARGO_PKG_NAME"));
    assert_eq!(reply.body["users"], 3);
    assert_eq!(reply.body["tasks"], 0);
    assert!(reply.headers.contains_key("x-app"));
    assert!(reply.headers.contains_key(REQUEST_ID));
    Ok(())
}

#[tokio::test]
async fn head_follows_get_policy() -> Result<()> {
    let app = test_app()?;
    let reply = app.call(Method::HEAD, "/health", None, None).await?;
    assert_eq!(reply.status, StatusCode::OK);
    let reply = app.call(Method::HEAD, "/api/me", None, None).await?;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn request_id_is_propagated() -> Result<()> {
    let app = test_app()?;
    let request = Request::builder()
        .uri("/")
        .header(REQUEST_ID, "req-123")
        .body(Body::empty())?;
    let reply = app.send(request).await?;
    assert_eq!(
        reply.headers.get(REQUEST_ID).and_then(|v| v.to_str().ok()),
        Some("req-123")
    );
    Ok(())
}

#[tokio::test]
async fn admin_login_returns_token_and_profile_without_hash() -> Result<()> {
    let app = test_app()?;
    let reply = app.login("admin", "password123").await?;
    assert_eq!(reply.status, StatusCode::OK);
    assert!(reply.body["token"].is_string());
    assert_eq!(reply.body["user"]["username"], "admin");
    assert_eq!(reply.body["user"]["role"], "admin");
    assert_eq!(reply.body["expires_at"], NOW + TTL);
    assert!(!contains_key(&reply.body, "password"));
    assert!(!contains_key(&reply.body, "hash"));
    Ok(())
}

#[tokio::test]
async fn bad_logins_are_indistinguishable() -> Result<()> {
    let app = test_app()?;
    let wrong_password = app.login("admin", "nope").await?;
    let unknown_user = app.login("mallory", "password123").await?;

    let garbage = Request::builder()
        .method(Method::POST)
        .uri("/login")
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))?;
    let malformed = app.send(garbage).await?;

    for reply in [&wrong_password, &unknown_user, &malformed] {
        assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
        assert_eq!(reply.body, json!({ "error": "Invalid credentials" }));
    }
    Ok(())
}

#[tokio::test]
async fn protected_routes_require_a_token() -> Result<()> {
    let app = test_app()?;
    let reply = app.call(Method::GET, "/api/tasks", None, None).await?;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
    assert_eq!(reply.body, json!({ "error": "Authentication required" }));

    let reply = app
        .call(Method::GET, "/api/tasks", Some("garbage.token.here"), None)
        .await?;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
    assert_eq!(reply.body, json!({ "error": "Authentication required" }));
    Ok(())
}

#[tokio::test]
async fn every_policy_entry_is_routed() -> Result<()> {
    let app = test_app()?;
    for route in ROUTES {
        let uri = route.path.replace(":id", "1");
        let reply = app.call(route.method.clone(), &uri, None, None).await?;
        assert_ne!(reply.status, StatusCode::NOT_FOUND, "{} {}", route.method, uri);
        assert_ne!(
            reply.status,
            StatusCode::METHOD_NOT_ALLOWED,
            "{} {}",
            route.method,
            uri
        );
    }
    Ok(())
}

#[tokio::test]
async fn expired_token_is_rejected() -> Result<()> {
    let app = test_app()?;
    let token = app.token("alice").await?;

    app.clock.set(NOW + TTL - 1);
    let reply = app.call(Method::GET, "/api/me", Some(&token), None).await?;
    assert_eq!(reply.status, StatusCode::OK);

    app.clock.set(NOW + TTL);
    let reply = app.call(Method::GET, "/api/me", Some(&token), None).await?;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn me_returns_fresh_profile() -> Result<()> {
    let app = test_app()?;
    let token = app.token("bob").await?;
    let reply = app.call(Method::GET, "/api/me", Some(&token), None).await?;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body["username"], "bob");
    assert_eq!(reply.body["email"], "bob@example.com");
    assert!(!contains_key(&reply.body, "password"));
    Ok(())
}

#[tokio::test]
async fn user_listing_is_admin_only() -> Result<()> {
    let app = test_app()?;
    let alice = app.token("alice").await?;
    let admin = app.token("admin").await?;

    let reply = app.call(Method::GET, "/api/users", Some(&alice), None).await?;
    assert_eq!(reply.status, StatusCode::FORBIDDEN);
    assert_eq!(reply.body, json!({ "error": "Forbidden" }));

    let reply = app.call(Method::GET, "/api/users", Some(&admin), None).await?;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body.as_array().map(Vec::len), Some(3));
    assert!(!contains_key(&reply.body, "password"));
    Ok(())
}

#[tokio::test]
async fn user_profiles_are_owner_or_admin() -> Result<()> {
    let app = test_app()?;
    let alice = app.token("alice").await?;
    let admin = app.token("admin").await?;
    let alice_id = app
        .state
        .store
        .find_by_username("alice")?
        .context("alice")?
        .id();
    let bob_id = app.state.store.find_by_username("bob")?.context("bob")?.id();

    let own = format!("/api/users/{alice_id}");
    let other = format!("/api/users/{bob_id}");
    assert_eq!(
        app.call(Method::GET, &own, Some(&alice), None).await?.status,
        StatusCode::OK
    );
    assert_eq!(
        app.call(Method::GET, &other, Some(&alice), None).await?.status,
        StatusCode::FORBIDDEN
    );
    // Absent looks the same as foreign for non-admins.
    assert_eq!(
        app.call(Method::GET, "/api/users/999", Some(&alice), None)
            .await?
            .status,
        StatusCode::FORBIDDEN
    );
    assert_eq!(
        app.call(Method::GET, &other, Some(&admin), None).await?.status,
        StatusCode::OK
    );
    assert_eq!(
        app.call(Method::GET, "/api/users/999", Some(&admin), None)
            .await?
            .status,
        StatusCode::NOT_FOUND
    );
    Ok(())
}

#[tokio::test]
async fn tasks_are_scoped_to_their_owner() -> Result<()> {
    let app = test_app()?;
    let alice = app.token("alice").await?;
    let bob = app.token("bob").await?;
    let admin = app.token("admin").await?;

    let alice_task = app.create_task(&alice, "alice's task").await?;
    app.create_task(&bob, "bob's task").await?;

    let uri = format!("/api/tasks/{alice_task}");
    let reply = app.call(Method::GET, &uri, Some(&bob), None).await?;
    assert_eq!(reply.status, StatusCode::FORBIDDEN);

    let reply = app
        .call(Method::PUT, &uri, Some(&bob), Some(json!({ "completed": true })))
        .await?;
    assert_eq!(reply.status, StatusCode::FORBIDDEN);

    let reply = app.call(Method::DELETE, &uri, Some(&bob), None).await?;
    assert_eq!(reply.status, StatusCode::FORBIDDEN);

    let reply = app.call(Method::GET, &uri, Some(&alice), None).await?;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body["title"], "alice's task");
    assert_eq!(reply.body["completed"], false);

    let reply = app.call(Method::GET, &uri, Some(&admin), None).await?;
    assert_eq!(reply.status, StatusCode::OK);

    let reply = app.call(Method::GET, "/api/tasks", Some(&alice), None).await?;
    assert_eq!(reply.body.as_array().map(Vec::len), Some(1));
    let reply = app.call(Method::GET, "/api/tasks", Some(&admin), None).await?;
    assert_eq!(reply.body.as_array().map(Vec::len), Some(2));
    Ok(())
}

#[tokio::test]
async fn missing_task_is_only_revealed_to_admins() -> Result<()> {
    let app = test_app()?;
    let bob = app.token("bob").await?;
    let admin = app.token("admin").await?;

    let reply = app.call(Method::GET, "/api/tasks/999", Some(&bob), None).await?;
    assert_eq!(reply.status, StatusCode::FORBIDDEN);
    let reply = app
        .call(Method::DELETE, "/api/tasks/999", Some(&bob), None)
        .await?;
    assert_eq!(reply.status, StatusCode::FORBIDDEN);

    let reply = app
        .call(Method::GET, "/api/tasks/999", Some(&admin), None)
        .await?;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);
    assert_eq!(reply.body, json!({ "error": "Not found" }));
    Ok(())
}

#[tokio::test]
async fn task_owner_comes_from_token_not_body() -> Result<()> {
    let app = test_app()?;
    let bob = app.token("bob").await?;
    let bob_id = app.state.store.find_by_username("bob")?.context("bob")?.id();

    let reply = app
        .call(
            Method::POST,
            "/api/tasks",
            Some(&bob),
            Some(json!({ "title": "  mine  ", "user_id": 1 })),
        )
        .await?;
    assert_eq!(reply.status, StatusCode::CREATED);
    assert_eq!(reply.body["user_id"], bob_id);
    assert_eq!(reply.body["title"], "mine");

    let uri = format!("/api/tasks/{}", reply.body["id"]);
    let reply = app
        .call(
            Method::PUT,
            &uri,
            Some(&bob),
            Some(json!({ "completed": true, "user_id": 1 })),
        )
        .await?;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body["user_id"], bob_id);
    assert_eq!(reply.body["completed"], true);
    assert_eq!(reply.body["title"], "mine");
    Ok(())
}

#[tokio::test]
async fn task_input_is_validated() -> Result<()> {
    let app = test_app()?;
    let alice = app.token("alice").await?;

    let reply = app
        .call(
            Method::POST,
            "/api/tasks",
            Some(&alice),
            Some(json!({ "title": "   " })),
        )
        .await?;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);

    let reply = app
        .call(
            Method::POST,
            "/api/tasks",
            Some(&alice),
            Some(json!({ "title": "x".repeat(201) })),
        )
        .await?;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn task_delete_returns_no_content() -> Result<()> {
    let app = test_app()?;
    let alice = app.token("alice").await?;
    let id = app.create_task(&alice, "short lived").await?;
    let uri = format!("/api/tasks/{id}");

    let reply = app.call(Method::DELETE, &uri, Some(&alice), None).await?;
    assert_eq!(reply.status, StatusCode::NO_CONTENT);
    assert_eq!(app.state.tasks.count()?, 0);
    Ok(())
}

#[tokio::test]
async fn demoted_admin_loses_admin_routes_immediately() -> Result<()> {
    let app = test_app()?;
    let admin = app.token("admin").await?;
    let alice = app.token("alice").await?;
    let admin_id = app
        .state
        .store
        .find_by_username("admin")?
        .context("admin")?
        .id();
    let task = app.create_task(&alice, "private").await?;

    app.state.store.update_role(admin_id, Role::User)?;

    let reply = app.call(Method::GET, "/api/users", Some(&admin), None).await?;
    assert_eq!(reply.status, StatusCode::FORBIDDEN);
    let reply = app
        .call(Method::GET, &format!("/api/tasks/{task}"), Some(&admin), None)
        .await?;
    assert_eq!(reply.status, StatusCode::FORBIDDEN);
    // The token itself still authenticates.
    let reply = app.call(Method::GET, "/api/me", Some(&admin), None).await?;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body["role"], "user");
    Ok(())
}

#[tokio::test]
async fn registration_creates_plain_users() -> Result<()> {
    let app = test_app()?;
    let reply = app
        .call(
            Method::POST,
            "/register",
            None,
            Some(json!({
                "username": "carol",
                "email": "Carol@Example.com",
                "password": "correct horse",
                "role": "admin",
            })),
        )
        .await?;
    assert_eq!(reply.status, StatusCode::CREATED);
    assert_eq!(reply.body["user"]["role"], "user");
    assert_eq!(reply.body["user"]["email"], "carol@example.com");
    assert!(!contains_key(&reply.body, "password"));

    let reply = app.login("carol", "correct horse").await?;
    assert_eq!(reply.status, StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn registration_rejects_bad_input_and_duplicates() -> Result<()> {
    let app = test_app()?;
    let cases = [
        json!({ "username": "x", "email": "x@example.com", "password": "password123" }),
        json!({ "username": "dave", "email": "not-an-email", "password": "password123" }),
        json!({ "username": "dave", "email": "dave@example.com", "password": "short" }),
    ];
    for body in cases {
        let reply = app.call(Method::POST, "/register", None, Some(body)).await?;
        assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    }

    let reply = app
        .call(
            Method::POST,
            "/register",
            None,
            Some(json!({ "username": "ALICE", "email": "a2@example.com", "password": "password123" })),
        )
        .await?;
    assert_eq!(reply.status, StatusCode::CONFLICT);
    assert_eq!(reply.body, json!({ "error": "Username already exists" }));
    Ok(())
}

#[tokio::test]
async fn own_password_change_requires_current_password() -> Result<()> {
    let app = test_app()?;
    let alice = app.token("alice").await?;
    let alice_id = app
        .state
        .store
        .find_by_username("alice")?
        .context("alice")?
        .id();
    let uri = format!("/api/users/{alice_id}/password");

    let reply = app
        .call(
            Method::PUT,
            &uri,
            Some(&alice),
            Some(json!({ "new_password": "brand-new-pass" })),
        )
        .await?;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);

    let reply = app
        .call(
            Method::PUT,
            &uri,
            Some(&alice),
            Some(json!({ "current_password": "wrong", "new_password": "brand-new-pass" })),
        )
        .await?;
    assert_eq!(reply.status, StatusCode::FORBIDDEN);

    let reply = app
        .call(
            Method::PUT,
            &uri,
            Some(&alice),
            Some(json!({ "current_password": "password123", "new_password": "brand-new-pass" })),
        )
        .await?;
    assert_eq!(reply.status, StatusCode::NO_CONTENT);

    assert_eq!(
        app.login("alice", "password123").await?.status,
        StatusCode::UNAUTHORIZED
    );
    assert_eq!(
        app.login("alice", "brand-new-pass").await?.status,
        StatusCode::OK
    );
    Ok(())
}

#[tokio::test]
async fn admin_can_reset_other_passwords_but_users_cannot() -> Result<()> {
    let app = test_app()?;
    let admin = app.token("admin").await?;
    let alice = app.token("alice").await?;
    let bob_id = app.state.store.find_by_username("bob")?.context("bob")?.id();
    let uri = format!("/api/users/{bob_id}/password");
    let body = json!({ "new_password": "reset-by-admin" });

    let reply = app
        .call(Method::PUT, &uri, Some(&alice), Some(body.clone()))
        .await?;
    assert_eq!(reply.status, StatusCode::FORBIDDEN);

    let reply = app.call(Method::PUT, &uri, Some(&admin), Some(body)).await?;
    assert_eq!(reply.status, StatusCode::NO_CONTENT);
    assert_eq!(
        app.login("bob", "reset-by-admin").await?.status,
        StatusCode::OK
    );
    Ok(())
}

#[tokio::test]
async fn role_changes_are_admin_only_and_never_self_demoting() -> Result<()> {
    let app = test_app()?;
    let admin = app.token("admin").await?;
    let alice = app.token("alice").await?;
    let admin_id = app
        .state
        .store
        .find_by_username("admin")?
        .context("admin")?
        .id();
    let bob_id = app.state.store.find_by_username("bob")?.context("bob")?.id();

    let reply = app
        .call(
            Method::PUT,
            &format!("/api/users/{bob_id}/role"),
            Some(&alice),
            Some(json!({ "role": "admin" })),
        )
        .await?;
    assert_eq!(reply.status, StatusCode::FORBIDDEN);

    let reply = app
        .call(
            Method::PUT,
            &format!("/api/users/{admin_id}/role"),
            Some(&admin),
            Some(json!({ "role": "user" })),
        )
        .await?;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);

    let reply = app
        .call(
            Method::PUT,
            &format!("/api/users/{bob_id}/role"),
            Some(&admin),
            Some(json!({ "role": "admin" })),
        )
        .await?;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body["role"], "admin");

    let reply = app
        .call(
            Method::PUT,
            "/api/users/999/role",
            Some(&admin),
            Some(json!({ "role": "user" })),
        )
        .await?;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn openapi_document_is_served() -> Result<()> {
    let app = test_app()?;
    let reply = app.call(Method::GET, "/openapi.json", None, None).await?;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body["info"]["title"], env!("CARGO_PKG_NAME"));
    assert!(reply.body["paths"]["/api/tasks/{id}"].is_object());
    Ok(())
}

#[test]
fn frontend_origin_drops_path() -> Result<()> {
    let origin = parse_frontend_origin("https://app.example.com:8443/tasks?x=1")?;
    assert_eq!(origin, "https://app.example.com:8443");
    assert!(parse_frontend_origin("not a url").is_err());
    Ok(())
}
