//! Middleware layer.
//!
//! Middleware sees the request before the handler does and decides whether
//! the handler runs at all. It either calls [`Next::run`] to continue the
//! pipeline, returns its own [`Response`] to short-circuit, or returns a
//! [`Fault`] that the router answers with `500`.
//!
//! Built-in middleware:
//! - [`BodyParser`] — fills [`Request::fields`] from JSON or form bodies
//! - [`CookieParser`] — fills [`Request::cookies`] from the `cookie` header
//! - [`Validate`] — declarative, scope-aware request validation
//!
//! Ad-hoc middleware is a closure wrapped with [`from_fn`]:
//!
//! ```rust
//! use tsu_validate::middleware::{from_fn, Next};
//! use tsu_validate::Request;
//!
//! let log = from_fn(|req: Request, next: Next| async move {
//!     tracing::info!(path = req.path(), "request");
//!     next.run(req).await
//! });
//! ```

use std::future::Future;
use std::sync::Arc;

use crate::error::Fault;
use crate::handler::{BoxFuture, BoxedHandler};
use crate::request::Request;
use crate::response::Response;

mod body_parser;
mod cookie_parser;
mod validate;

pub use body_parser::BodyParser;
pub use cookie_parser::CookieParser;
pub use validate::{validate, Formatter, Validate, ValidateBuilder};

/// A request interceptor.
pub trait Middleware: Send + Sync + 'static {
    fn handle(&self, req: Request, next: Next) -> BoxFuture<'static, Result<Response, Fault>>;
}

/// A type-erased middleware shared across concurrent requests.
pub type BoxedMiddleware = Arc<dyn Middleware>;

// ── Next ──────────────────────────────────────────────────────────────────────

/// The rest of the pipeline: the remaining middleware, then the handler.
pub struct Next {
    chain: Arc<[BoxedMiddleware]>,
    index: usize,
    endpoint: BoxedHandler,
}

impl Next {
    pub(crate) fn new(chain: Arc<[BoxedMiddleware]>, endpoint: BoxedHandler) -> Self {
        Self { chain, index: 0, endpoint }
    }

    /// Passes `req` to the next middleware, or to the handler once the chain
    /// is exhausted.
    pub async fn run(mut self, req: Request) -> Result<Response, Fault> {
        match self.chain.get(self.index).cloned() {
            Some(middleware) => {
                self.index += 1;
                middleware.handle(req, self).await
            }
            None => Ok(self.endpoint.call(req).await),
        }
    }
}

// ── from_fn ───────────────────────────────────────────────────────────────────

/// Middleware backed by a closure. Build with [`from_fn`].
pub struct FromFn<F>(F);

/// Wraps `async |req, next| -> Result<Response, Fault>` as [`Middleware`].
pub fn from_fn<F, Fut>(f: F) -> FromFn<F>
where
    F: Fn(Request, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Response, Fault>> + Send + 'static,
{
    FromFn(f)
}

impl<F, Fut> Middleware for FromFn<F>
where
    F: Fn(Request, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Response, Fault>> + Send + 'static,
{
    fn handle(&self, req: Request, next: Next) -> BoxFuture<'static, Result<Response, Fault>> {
        Box::pin((self.0)(req, next))
    }
}
