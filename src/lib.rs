//! # tsu-validate
//!
//! Declarative request validation for a minimal hyper-based HTTP framework.
//!
//! Describe the fields a route expects, where each one comes from, and the
//! rules it must pass. The [`Validate`](middleware::Validate) middleware
//! collects the values, validates them, and either hands the handler a
//! validated snapshot or answers `400` with the errors.
//!
//! ## What goes where
//!
//! - Mistakes in the constraint map fail at startup, as a
//!   [`ConfigError`] from [`ValidateBuilder::build`](middleware::ValidateBuilder::build).
//! - Bad client input is a `400` with a JSON error payload.
//! - Reading `body` or `cookies` without [`BodyParser`](middleware::BodyParser)
//!   or [`CookieParser`](middleware::CookieParser) installed is a [`Fault`],
//!   answered with `500`: that is a wiring bug, not a client error.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use http::Method;
//! use serde_json::json;
//! use tsu_validate::middleware::{validate, BodyParser};
//! use tsu_validate::{Request, Response, Router, Server};
//!
//! #[tokio::main]
//! async fn main() {
//!     let check_user = validate(&json!({
//!         "id":   { "scope": "route", "numericality": { "onlyInteger": true } },
//!         "name": { "scope": ["body", "query"], "presence": true, "length": { "maximum": 32 } },
//!     }))
//!     .expect("valid constraints");
//!
//!     let app = Router::new()
//!         .layer(BodyParser::new())
//!         .on_with(Method::PUT, "/users/{id}", check_user, update_user);
//!
//!     Server::bind("0.0.0.0:3000").serve(app).await.unwrap();
//! }
//!
//! async fn update_user(req: Request) -> Response {
//!     let valid = req.valid().expect("validated");
//!     Response::json_value(&json!({ "id": valid.get("id"), "name": valid.get("name") }))
//! }
//! ```

mod error;
mod handler;
mod request;
mod response;
mod router;
mod server;

pub mod middleware;
pub mod scope;
pub mod validation;

pub use error::{ConfigError, Error, Fault};
pub use handler::{BoxFuture, Handler};
pub use request::{Request, RequestBuilder};
pub use response::{IntoResponse, Response, ResponseBuilder};
pub use router::Router;
pub use scope::{Scope, ScopePolicy, ValidatedSnapshot};
pub use server::Server;
