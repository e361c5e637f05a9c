//! Minimal example — validated JSON endpoints.
//!
//! Run with:
//!   RUST_LOG=debug cargo run --example basic
//!
//! Try:
//!   curl -i http://localhost:3000/users/42
//!   curl -i http://localhost:3000/users/abc
//!   curl -i -X POST http://localhost:3000/users \
//!        -H 'content-type: application/json' \
//!        -d '{"name":"alice","email":"alice@example.com"}'
//!   curl -i -X POST http://localhost:3000/users -d 'name='
//!   curl -i http://localhost:3000/me --cookie 'session=abc123'

use http::Method;
use serde_json::json;
use tsu_validate::middleware::{validate, BodyParser, CookieParser, Validate};
use tsu_validate::validation::ValidatorRegistry;
use tsu_validate::{Request, Response, Router, Server};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();

    let get_user = validate(&json!({
        "id": { "scope": "route", "numericality": { "onlyInteger": true, "greaterThan": 0 } },
    }))
    .expect("invalid constraints for GET /users/{id}");

    let create_user = Validate::builder(&json!({
        "name":  { "scope": "body", "presence": true, "length": { "maximum": 32 } },
        "email": { "scope": "body", "presence": true, "email": true },
    }))
    .formatter(|errors| json!({ "error": "validation_failed", "details": errors }))
    .build()
    .expect("invalid constraints for POST /users");

    let mut registry = ValidatorRegistry::new();
    registry.register_fn("session", |value, _| {
        let ok = value.and_then(|v| v.as_str()).is_some_and(|s| s.len() == 6);
        (!ok).then(|| "is not a valid session".to_owned())
    });
    let me = Validate::builder(&json!({
        "session": { "scope": ["cookies", "query"], "session": true },
    }))
    .registry(&registry)
    .build()
    .expect("invalid constraints for GET /me");

    let app = Router::new()
        .layer(BodyParser::new())
        .layer(CookieParser::new())
        .on_with(Method::GET, "/users/{id}", get_user, show_user)
        .on_with(Method::POST, "/users", create_user, store_user)
        .on_with(Method::GET, "/me", me, whoami);

    Server::bind("0.0.0.0:3000")
        .serve(app)
        .await
        .expect("server error");
}

async fn show_user(req: Request) -> Response {
    let id = req.valid().and_then(|v| v.get_str("id")).unwrap_or("unknown");
    Response::json_value(&json!({ "id": id, "name": "alice" }))
}

async fn store_user(req: Request) -> Response {
    let valid = req.valid().cloned().unwrap_or_default();
    Response::builder()
        .status(http::StatusCode::CREATED)
        .header("location", "/users/99")
        .json_value(&json!({ "id": "99", "user": valid }))
}

async fn whoami(req: Request) -> Response {
    let session = req.valid().and_then(|v| v.get_str("session")).unwrap_or_default();
    Response::text(format!("session {session}"))
}
