//! Named validators.
//!
//! A rule key in a constraint map is the name of a validator in a
//! [`ValidatorRegistry`]. The registry starts with the built-ins and grows
//! with whatever the application registers; each
//! [`Validate`](crate::middleware::Validate) middleware keeps its own copy,
//! taken when it is built.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::debug;

use super::validators;
use crate::handler::BoxFuture;

/// What a validator sees besides the value under test.
pub struct FieldContext<'a> {
    /// The field being validated.
    pub field: &'a str,
    /// Every collected value, for rules that compare fields.
    pub attributes: &'a Map<String, Value>,
}

/// A synchronous validator.
///
/// `value` is `None` when no scope defined the field. Validators other than
/// `presence` conventionally pass on `None` and `null`.
pub trait Validator: Send + Sync + 'static {
    /// Rejects option shapes this validator cannot work with. Called once
    /// per rule when a middleware is built.
    fn check_options(&self, options: &Value) -> Result<(), String> {
        let _ = options;
        Ok(())
    }

    /// Returns the failure message, or `None` on success.
    ///
    /// A message starting with `^` is used verbatim; any other message is
    /// prefixed with the field name when full messages are enabled.
    fn validate(&self, value: Option<&Value>, options: &Value, ctx: &FieldContext<'_>) -> Option<String>;
}

/// A validator that needs to await something: a database, another service.
///
/// Only usable by middleware built with
/// [`ValidationMode::Async`](super::ValidationMode::Async).
pub trait AsyncValidator: Send + Sync + 'static {
    fn check_options(&self, options: &Value) -> Result<(), String> {
        let _ = options;
        Ok(())
    }

    fn validate(&self, value: Option<Value>, options: Value, field: String) -> BoxFuture<'static, Option<String>>;
}

#[derive(Clone)]
pub(crate) enum Entry {
    Sync(Arc<dyn Validator>),
    Async(Arc<dyn AsyncValidator>),
}

impl Entry {
    pub(crate) fn check_options(&self, options: &Value) -> Result<(), String> {
        match self {
            Self::Sync(v) => v.check_options(options),
            Self::Async(v) => v.check_options(options),
        }
    }
}

// ── Closure adapters ──────────────────────────────────────────────────────────

struct FnValidator<F>(F);

impl<F> Validator for FnValidator<F>
where
    F: Fn(Option<&Value>, &Value) -> Option<String> + Send + Sync + 'static,
{
    fn validate(&self, value: Option<&Value>, options: &Value, _ctx: &FieldContext<'_>) -> Option<String> {
        (self.0)(value, options)
    }
}

struct FnAsyncValidator<F>(F);

impl<F, Fut> AsyncValidator for FnAsyncValidator<F>
where
    F: Fn(Option<Value>, Value) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Option<String>> + Send + 'static,
{
    fn validate(&self, value: Option<Value>, options: Value, _field: String) -> BoxFuture<'static, Option<String>> {
        Box::pin((self.0)(value, options))
    }
}

// ── ValidatorRegistry ─────────────────────────────────────────────────────────

/// Validators by name.
///
/// ```rust
/// use tsu_validate::validation::ValidatorRegistry;
///
/// let mut registry = ValidatorRegistry::new();
/// registry.register_fn("even", |value, _options| {
///     match value.and_then(|v| v.as_str()).map(str::parse::<i64>) {
///         Some(Ok(n)) if n % 2 != 0 => Some("must be even".to_owned()),
///         Some(Err(_)) => Some("is not a number".to_owned()),
///         _ => None,
///     }
/// });
/// assert!(registry.contains("even"));
/// ```
#[derive(Clone)]
pub struct ValidatorRegistry {
    validators: HashMap<String, Entry>,
}

impl ValidatorRegistry {
    /// A registry holding the built-in validators: `presence`, `length`,
    /// `format`, `numericality`, `inclusion`, `exclusion`, `email`, `equality`.
    pub fn new() -> Self {
        let mut registry = Self::empty();
        registry.register("presence", validators::Presence);
        registry.register("length", validators::Length);
        registry.register("format", validators::Format::new());
        registry.register("numericality", validators::Numericality);
        registry.register("inclusion", validators::Inclusion);
        registry.register("exclusion", validators::Exclusion);
        registry.register("email", validators::Email);
        registry.register("equality", validators::Equality);
        registry
    }

    /// A registry with no validators at all.
    pub fn empty() -> Self {
        Self { validators: HashMap::new() }
    }

    /// Registers `validator` under `name`, replacing any previous one.
    pub fn register(&mut self, name: &str, validator: impl Validator) -> &mut Self {
        debug!(name, "registering validator");
        self.validators.insert(name.to_owned(), Entry::Sync(Arc::new(validator)));
        self
    }

    /// Registers a closure `|value, options| -> Option<message>`.
    pub fn register_fn<F>(&mut self, name: &str, f: F) -> &mut Self
    where
        F: Fn(Option<&Value>, &Value) -> Option<String> + Send + Sync + 'static,
    {
        self.register(name, FnValidator(f))
    }

    pub fn register_async(&mut self, name: &str, validator: impl AsyncValidator) -> &mut Self {
        debug!(name, "registering async validator");
        self.validators.insert(name.to_owned(), Entry::Async(Arc::new(validator)));
        self
    }

    /// Registers an async closure `|value, options| async { Option<message> }`.
    pub fn register_async_fn<F, Fut>(&mut self, name: &str, f: F) -> &mut Self
    where
        F: Fn(Option<Value>, Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Option<String>> + Send + 'static,
    {
        self.register_async(name, FnAsyncValidator(f))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.validators.contains_key(name)
    }

    /// Whether `name` is registered as an [`AsyncValidator`].
    pub fn is_async(&self, name: &str) -> bool {
        matches!(self.validators.get(name), Some(Entry::Async(_)))
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.validators.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub(crate) fn get(&self, name: &str) -> Option<&Entry> {
        self.validators.get(name)
    }
}

impl Default for ValidatorRegistry {
    fn default() -> Self { Self::new() }
}
