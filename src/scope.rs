//! Where a field's value comes from.
//!
//! Every field in a constraint map reads from one or more *scopes*, tried in
//! the order declared. The first scope that defines the field wins:
//!
//! ```text
//! "id": { "scope": ["route", "query"] }
//!
//! GET /users/7?id=9   → id = "7"   (route defines it)
//! GET /users?id=9     → id = "9"   (route does not, query does)
//! GET /users          → id absent
//! ```
//!
//! `route` and `query` are always available. `body` and `cookies` exist only
//! after [`BodyParser`](crate::middleware::BodyParser) and
//! [`CookieParser`](crate::middleware::CookieParser) have run; reading them
//! without the parser installed is a [`Fault`], not a validation failure.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{ConfigError, Fault};
use crate::request::Request;
use crate::validation::Constraints;

/// The rule key holding a field's scope declaration.
pub const SCOPE_KEY: &str = "scope";

/// A request sub-object a field may be read from.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Scope {
    Route,
    Query,
    Body,
    Cookies,
}

impl Scope {
    /// The fixed allow-list of scope names.
    pub const ALL: [Scope; 4] = [Scope::Route, Scope::Query, Scope::Body, Scope::Cookies];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Route   => "route",
            Self::Query   => "query",
            Self::Body    => "body",
            Self::Cookies => "cookies",
        }
    }

    /// Case-insensitive lookup: `"Route"`, `"ROUTE"` and `"route"` all match.
    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.as_str().eq_ignore_ascii_case(name))
    }

    /// Reads `field` from this scope of `req`.
    ///
    /// `Ok(None)` means the scope exists but does not define the field.
    fn lookup(self, req: &Request, field: &str) -> Result<Option<Value>, Fault> {
        match self {
            Self::Route => Ok(req.param(field).map(Value::from)),
            Self::Query => Ok(req.query(field).map(Value::from)),
            Self::Body => {
                let fields = req.fields().ok_or(Fault::MissingCollaborator {
                    scope: self,
                    collaborator: "BodyParser",
                })?;
                Ok(fields.get(field).cloned())
            }
            Self::Cookies => {
                let cookies = req.cookies().ok_or(Fault::MissingCollaborator {
                    scope: self,
                    collaborator: "CookieParser",
                })?;
                Ok(cookies.get(field).map(|v| Value::from(v.as_str())))
            }
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What to do with a field that declares no `scope`.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum ScopePolicy {
    /// Read the field from route params only.
    #[default]
    DefaultRoute,
    /// Reject the constraint map with [`ConfigError::MissingScope`].
    RequireExplicit,
}

// ── ScopeTable ────────────────────────────────────────────────────────────────

/// Field name → ordered scopes, resolved once per middleware.
#[derive(Clone, Debug, PartialEq)]
pub struct ScopeTable {
    fields: BTreeMap<String, Vec<Scope>>,
}

impl ScopeTable {
    /// Resolves the `scope` key of every field in `constraints`.
    ///
    /// A string becomes a one-element list; a list is kept in order. Names
    /// are matched case-insensitively. `null` counts as undeclared.
    pub fn from_constraints(
        constraints: &Constraints,
        policy: ScopePolicy,
    ) -> Result<Self, ConfigError> {
        let mut fields = BTreeMap::new();
        for (field, rules) in constraints.iter() {
            let scopes = resolve(field, rules.get(SCOPE_KEY), policy)?;
            fields.insert(field.to_owned(), scopes);
        }
        Ok(Self { fields })
    }

    pub fn get(&self, field: &str) -> Option<&[Scope]> {
        self.fields.get(field).map(Vec::as_slice)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[Scope])> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// Builds the per-request snapshot, first defined scope wins.
    pub fn collect(&self, req: &Request) -> Result<ValidatedSnapshot, Fault> {
        let mut values = Map::new();
        for (field, scopes) in &self.fields {
            for scope in scopes {
                if let Some(value) = scope.lookup(req, field)? {
                    values.insert(field.clone(), value);
                    break;
                }
            }
        }
        Ok(ValidatedSnapshot(values))
    }
}

fn resolve(
    field: &str,
    declared: Option<&Value>,
    policy: ScopePolicy,
) -> Result<Vec<Scope>, ConfigError> {
    let invalid = |scope: &Value| ConfigError::InvalidScope {
        field: field.to_owned(),
        scope: scope.to_string(),
    };

    match declared {
        None | Some(Value::Null) => match policy {
            ScopePolicy::DefaultRoute => Ok(vec![Scope::Route]),
            ScopePolicy::RequireExplicit => Err(ConfigError::MissingScope { field: field.to_owned() }),
        },
        Some(Value::String(name)) => Scope::parse(name)
            .map(|s| vec![s])
            .ok_or_else(|| invalid(&Value::from(name.as_str()))),
        // The error names the offending entry, not the whole list.
        Some(Value::Array(names)) if !names.is_empty() => names.iter()
            .map(|name| name.as_str().and_then(Scope::parse).ok_or_else(|| invalid(name)))
            .collect(),
        Some(other) => Err(invalid(other)),
    }
}

// ── ValidatedSnapshot ─────────────────────────────────────────────────────────

/// Field name → value collected from the request.
///
/// Fields no scope defined are absent. Handlers read it via
/// [`Request::valid`](crate::Request::valid) once validation succeeded.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ValidatedSnapshot(Map<String, Value>);

impl ValidatedSnapshot {
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    /// The field as a string, if it was collected as one.
    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.0.get(field).and_then(Value::as_str)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn len(&self) -> usize { self.0.len() }
    pub fn is_empty(&self) -> bool { self.0.is_empty() }

    pub fn as_map(&self) -> &Map<String, Value> { &self.0 }
    pub fn into_map(self) -> Map<String, Value> { self.0 }
}

impl From<Map<String, Value>> for ValidatedSnapshot {
    fn from(values: Map<String, Value>) -> Self {
        Self(values)
    }
}
