//! Radix-tree request router.
//!
//! One tree per HTTP method. O(path-length) lookup. Global middleware added
//! with [`Router::layer`] runs for every matched route, before any middleware
//! attached to the route itself with [`Router::on_with`].

use std::collections::HashMap;
use std::sync::Arc;

use http::{Method, StatusCode};
use matchit::Router as MatchitRouter;
use tracing::{debug, error};

use crate::handler::{BoxedHandler, Handler};
use crate::middleware::{BoxedMiddleware, Middleware, Next};
use crate::request::Request;
use crate::response::Response;

struct Route {
    middleware: Vec<BoxedMiddleware>,
    handler: BoxedHandler,
}

/// The application router.
///
/// Build it once at startup; pass it to [`Server::serve`](crate::Server::serve).
/// Every registration returns `self` so calls chain naturally.
pub struct Router {
    routes: HashMap<Method, MatchitRouter<Route>>,
    layers: Vec<BoxedMiddleware>,
}

impl Router {
    pub fn new() -> Self {
        Self { routes: HashMap::new(), layers: Vec::new() }
    }

    /// Register a handler for a method + path pair.
    ///
    /// Path parameters use `{name}` syntax — `req.param("name")` retrieves them.
    ///
    /// # Panics
    ///
    /// Panics if `path` is not a valid route or conflicts with one already
    /// registered for `method`.
    pub fn on(self, method: Method, path: &str, handler: impl Handler) -> Self {
        self.add(method, path, Vec::new(), handler)
    }

    /// Register a handler guarded by route-specific middleware.
    ///
    /// ```rust
    /// # use tsu_validate::{Request, Response, Router};
    /// # use tsu_validate::middleware::validate;
    /// # use http::Method;
    /// # async fn get_user(_: Request) -> Response { Response::text("") }
    /// let check = validate(&serde_json::json!({
    ///     "id": { "scope": "route", "numericality": { "onlyInteger": true } }
    /// })).unwrap();
    ///
    /// Router::new().on_with(Method::GET, "/users/{id}", check, get_user);
    /// ```
    pub fn on_with(
        self,
        method: Method,
        path: &str,
        middleware: impl Middleware,
        handler: impl Handler,
    ) -> Self {
        self.add(method, path, vec![Arc::new(middleware)], handler)
    }

    pub fn get(self, path: &str, handler: impl Handler) -> Self {
        self.on(Method::GET, path, handler)
    }

    pub fn post(self, path: &str, handler: impl Handler) -> Self {
        self.on(Method::POST, path, handler)
    }

    pub fn put(self, path: &str, handler: impl Handler) -> Self {
        self.on(Method::PUT, path, handler)
    }

    pub fn delete(self, path: &str, handler: impl Handler) -> Self {
        self.on(Method::DELETE, path, handler)
    }

    /// Add middleware that runs for every route, in registration order.
    pub fn layer(mut self, middleware: impl Middleware) -> Self {
        self.layers.push(Arc::new(middleware));
        self
    }

    fn add(
        mut self,
        method: Method,
        path: &str,
        middleware: Vec<BoxedMiddleware>,
        handler: impl Handler,
    ) -> Self {
        let route = Route { middleware, handler: handler.into_boxed_handler() };
        self.routes
            .entry(method)
            .or_default()
            .insert(path, route)
            .unwrap_or_else(|e| panic!("invalid route `{path}`: {e}"));
        self
    }

    /// Routes one request through the middleware chain and its handler.
    ///
    /// Unmatched routes answer `404`. A [`Fault`](crate::Fault) raised
    /// anywhere in the chain is logged and answered with `500`.
    pub async fn handle(&self, mut req: Request) -> Response {
        let Some(tree) = self.routes.get(req.method()) else {
            return Response::status(StatusCode::NOT_FOUND);
        };
        let Ok(matched) = tree.at(req.path()) else {
            debug!(method = %req.method(), path = req.path(), "no route");
            return Response::status(StatusCode::NOT_FOUND);
        };

        let params = matched.params.iter()
            .map(|(k, v)| (k.to_owned(), v.to_owned()))
            .collect();
        let route = matched.value;
        let chain: Arc<[BoxedMiddleware]> = self.layers.iter()
            .chain(route.middleware.iter())
            .cloned()
            .collect();
        let next = Next::new(chain, Arc::clone(&route.handler));

        req.set_params(params);
        let method = req.method().clone();
        let path = req.path().to_owned();

        match next.run(req).await {
            Ok(res) => res,
            Err(fault) => {
                error!(%method, %path, error = %fault, "request fault");
                Response::status(StatusCode::INTERNAL_SERVER_ERROR)
            }
        }
    }
}

impl Default for Router {
    fn default() -> Self { Self::new() }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn echo_id(req: Request) -> String {
        req.param("id").unwrap_or("none").to_owned()
    }

    #[tokio::test]
    async fn routes_by_method_and_path() {
        let app = Router::new().get("/users/{id}", echo_id);

        let res = app.handle(Request::builder().uri("/users/42").build()).await;
        assert_eq!(res.status_code(), StatusCode::OK);
        assert_eq!(res.body(), b"42");

        let res = app
            .handle(Request::builder().method(Method::POST).uri("/users/42").build())
            .await;
        assert_eq!(res.status_code(), StatusCode::NOT_FOUND);

        let res = app.handle(Request::builder().uri("/nope").build()).await;
        assert_eq!(res.status_code(), StatusCode::NOT_FOUND);
    }

    #[test]
    #[should_panic(expected = "invalid route")]
    fn conflicting_routes_panic() {
        let _ = Router::new().get("/a", echo_id).get("/a", echo_id);
    }
}
