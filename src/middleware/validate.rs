//! Declarative request validation.
//!
//! A constraint map names each field, the scopes to read it from, and the
//! rules it must pass:
//!
//! ```rust
//! use serde_json::json;
//! use tsu_validate::middleware::validate;
//!
//! let check = validate(&json!({
//!     "id":    { "scope": "route", "numericality": { "onlyInteger": true } },
//!     "page":  { "scope": "query", "numericality": { "greaterThan": 0 } },
//!     "token": { "scope": ["query", "cookies"], "presence": true },
//! })).unwrap();
//! ```
//!
//! Everything that can be wrong with the map itself is reported by
//! [`ValidateBuilder::build`]. At request time the middleware collects one
//! value per field, validates the lot, and then either stores the values on
//! the request ([`Request::valid`]) and continues, or answers `400` with the
//! validation errors as JSON.

use std::sync::Arc;

use http::StatusCode;
use serde_json::Value;
use tracing::{debug, trace};

use super::{Middleware, Next};
use crate::error::{ConfigError, Fault};
use crate::handler::BoxFuture;
use crate::request::Request;
use crate::response::Response;
use crate::scope::{ScopePolicy, ScopeTable, SCOPE_KEY};
use crate::validation::{self, Constraints, ValidateOptions, ValidationMode, ValidatorRegistry};

/// Reshapes a validation error payload before it is sent.
pub type Formatter = Arc<dyn Fn(Value) -> Value + Send + Sync>;

/// Builds a [`Validate`] with default settings.
///
/// Shorthand for `Validate::builder(constraints).build()`.
pub fn validate(constraints: &Value) -> Result<Validate, ConfigError> {
    Validate::builder(constraints).build()
}

/// Request validation middleware. Cheap to clone.
#[derive(Clone)]
pub struct Validate {
    inner: Arc<Inner>,
}

struct Inner {
    scopes: ScopeTable,
    constraints: Constraints,
    options: ValidateOptions,
    registry: ValidatorRegistry,
    mode: ValidationMode,
    formatter: Option<Formatter>,
}

impl Validate {
    pub fn builder(constraints: &Value) -> ValidateBuilder<'_> {
        ValidateBuilder {
            constraints,
            options: ValidateOptions::default(),
            registry: None,
            policy: ScopePolicy::default(),
            mode: ValidationMode::default(),
            formatter: None,
        }
    }

    pub fn scopes(&self) -> &ScopeTable {
        &self.inner.scopes
    }

    /// The constraints validators run against, `scope` removed.
    pub fn constraints(&self) -> &Constraints {
        &self.inner.constraints
    }
}

impl Middleware for Validate {
    fn handle(&self, req: Request, next: Next) -> BoxFuture<'static, Result<Response, Fault>> {
        let inner = Arc::clone(&self.inner);
        Box::pin(async move { inner.run(req, next).await })
    }
}

impl Inner {
    async fn run(&self, mut req: Request, next: Next) -> Result<Response, Fault> {
        let snapshot = self.scopes.collect(&req)?;
        trace!(fields = snapshot.len(), "collected values");

        let outcome = match self.mode {
            ValidationMode::Sync => {
                match validation::validate(snapshot.as_map(), &self.constraints, &self.registry, &self.options) {
                    None => Ok(()),
                    Some(errors) => Err(errors),
                }
            }
            ValidationMode::Async => {
                validation::validate_async(snapshot.as_map(), &self.constraints, &self.registry, &self.options)
                    .await
            }
        };

        match outcome {
            Ok(()) => {
                req.set_valid(snapshot);
                next.run(req).await
            }
            Err(errors) => {
                debug!(method = %req.method(), path = req.path(), "validation failed");
                let body = match &self.formatter {
                    Some(reshape) => reshape(errors),
                    None => errors,
                };
                Ok(Response::builder().status(StatusCode::BAD_REQUEST).json_value(&body))
            }
        }
    }
}

// ── ValidateBuilder ───────────────────────────────────────────────────────────

/// Configures a [`Validate`]. Obtain via [`Validate::builder`].
pub struct ValidateBuilder<'a> {
    constraints: &'a Value,
    options: ValidateOptions,
    registry: Option<ValidatorRegistry>,
    policy: ScopePolicy,
    mode: ValidationMode,
    formatter: Option<Formatter>,
}

impl ValidateBuilder<'_> {
    /// Options forwarded to every validation run.
    pub fn options(mut self, options: ValidateOptions) -> Self {
        self.options = options;
        self
    }

    /// Validators to resolve rule names against. Defaults to the built-ins.
    ///
    /// The registry is copied: registering more validators afterwards does
    /// not affect this middleware, only middleware built later.
    pub fn registry(mut self, registry: &ValidatorRegistry) -> Self {
        self.registry = Some(registry.clone());
        self
    }

    /// What to do with fields that declare no scope.
    pub fn scope_policy(mut self, policy: ScopePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn mode(mut self, mode: ValidationMode) -> Self {
        self.mode = mode;
        self
    }

    /// Transforms the error payload of every `400` this middleware sends.
    pub fn formatter(mut self, f: impl Fn(Value) -> Value + Send + Sync + 'static) -> Self {
        self.formatter = Some(Arc::new(f));
        self
    }

    /// Resolves scopes and checks every rule.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::InvalidScope`] for scope names outside
    ///   `route`, `query`, `body`, `cookies`
    /// - [`ConfigError::MissingScope`] for undeclared scopes under
    ///   [`ScopePolicy::RequireExplicit`]
    /// - [`ConfigError::InvalidValidatorRule`] for unknown validators or
    ///   options they reject
    /// - [`ConfigError::NotAnObject`] for a malformed map
    pub fn build(self) -> Result<Validate, ConfigError> {
        let constraints = Constraints::from_value(self.constraints)?;
        let scopes = ScopeTable::from_constraints(&constraints, self.policy)?;
        let constraints = constraints.without(SCOPE_KEY);

        let registry = self.registry.unwrap_or_default();
        validation::check(&constraints, &registry, self.mode)?;

        debug!(fields = constraints.len(), mode = ?self.mode, "validation middleware ready");

        Ok(Validate {
            inner: Arc::new(Inner {
                scopes,
                constraints,
                options: self.options,
                registry,
                mode: self.mode,
                formatter: self.formatter,
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::scope::Scope;

    #[test]
    fn scope_key_is_not_a_rule() {
        let v = validate(&json!({ "a": { "scope": ["route", "query"], "presence": true } })).unwrap();
        assert!(v.constraints().get("a").unwrap().get("scope").is_none());
        assert_eq!(v.scopes().get("a"), Some(&[Scope::Route, Scope::Query][..]));
    }

    #[test]
    fn empty_map_is_valid() {
        let v = validate(&json!({})).unwrap();
        assert!(v.constraints().is_empty());
    }

    #[test]
    fn registry_is_snapshotted_at_build() {
        let mut registry = ValidatorRegistry::new();
        let constraints = json!({ "a": { "custom": true } });

        assert!(Validate::builder(&constraints).registry(&registry).build().is_err());
        registry.register_fn("custom", |_, _| None);
        assert!(Validate::builder(&constraints).registry(&registry).build().is_ok());
    }
}
