//! The validation engine.
//!
//! A [`Constraints`] value maps each field to its rules; each rule names a
//! validator in a [`ValidatorRegistry`] and carries that validator's options:
//!
//! ```rust
//! use serde_json::json;
//! use tsu_validate::validation::{self, Constraints, ValidateOptions, ValidatorRegistry};
//!
//! let constraints = Constraints::from_value(&json!({
//!     "name": { "presence": true, "length": { "maximum": 3 } },
//! })).unwrap();
//! let registry = ValidatorRegistry::new();
//!
//! let errors = validation::validate(
//!     json!({ "name": "alice" }).as_object().unwrap(),
//!     &constraints,
//!     &registry,
//!     &ValidateOptions::default(),
//! );
//! assert_eq!(errors, Some(json!({ "name": ["Name is too long (maximum is 3 characters)"] })));
//! ```
//!
//! Failures come back as a JSON payload shaped by [`ErrorFormat`].

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::{trace, warn};

use crate::error::ConfigError;

mod registry;
mod validators;

pub use registry::{AsyncValidator, FieldContext, Validator, ValidatorRegistry};
pub use validators::{Email, Equality, Exclusion, Format, Inclusion, Length, Numericality, Presence};

use registry::Entry;

// ── Constraints ───────────────────────────────────────────────────────────────

/// One field's rules: validator name → options.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Rules(BTreeMap<String, Value>);

impl Rules {
    pub fn get(&self, rule: &str) -> Option<&Value> {
        self.0.get(rule)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize { self.0.len() }
    pub fn is_empty(&self) -> bool { self.0.is_empty() }
}

/// Field name → [`Rules`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Constraints(BTreeMap<String, Rules>);

impl Constraints {
    /// Reads a constraint map from a JSON object of JSON objects.
    ///
    /// `value` is only borrowed; the caller's map is never modified.
    pub fn from_value(value: &Value) -> Result<Self, ConfigError> {
        let fields = value.as_object()
            .ok_or_else(|| ConfigError::NotAnObject { what: "constraint map".to_owned() })?;

        let mut constraints = BTreeMap::new();
        for (field, rules) in fields {
            let rules = rules.as_object().ok_or_else(|| ConfigError::NotAnObject {
                what: format!("rules for field `{field}`"),
            })?;
            let rules = rules.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
            constraints.insert(field.clone(), Rules(rules));
        }
        Ok(Self(constraints))
    }

    /// Parses JSON text, e.g. a constraint file shipped with the application.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        Self::from_value(&serde_json::from_str(text)?)
    }

    pub fn get(&self, field: &str) -> Option<&Rules> {
        self.0.get(field)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Rules)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize { self.0.len() }
    pub fn is_empty(&self) -> bool { self.0.is_empty() }

    /// A copy with `rule` removed from every field.
    pub fn without(&self, rule: &str) -> Self {
        let mut copy = self.clone();
        for rules in copy.0.values_mut() {
            rules.0.remove(rule);
        }
        copy
    }
}

// ── Options ───────────────────────────────────────────────────────────────────

/// Shape of the failure payload.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum ErrorFormat {
    /// `{ "field": ["message", ...] }`
    #[default]
    Grouped,
    /// `["message", ...]`
    Flat,
    /// `[{ "attribute", "value", "validator", "error" }, ...]`
    Detailed,
}

/// Options passed through to every validation run.
///
/// Deserializes from the camelCase JSON an application may already keep in
/// its configuration: `{ "fullMessages": false, "format": "flat" }`.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct ValidateOptions {
    /// Prefix messages with the humanized field name.
    pub full_messages: bool,
    pub format: ErrorFormat,
}

impl Default for ValidateOptions {
    fn default() -> Self {
        Self { full_messages: true, format: ErrorFormat::Grouped }
    }
}

impl ValidateOptions {
    pub fn from_value(value: &Value) -> Result<Self, ConfigError> {
        Ok(Self::deserialize(value)?)
    }
}

/// How a middleware runs its validators, fixed when it is built.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum ValidationMode {
    /// Synchronous validators only; async ones are rejected up front.
    #[default]
    Sync,
    /// Awaits [`AsyncValidator`]s; synchronous ones run inline.
    Async,
}

// ── Self-check ────────────────────────────────────────────────────────────────

/// Checks every rule against `registry` without validating any data.
///
/// Fails on unknown validator names, on options a validator rejects, and on
/// async validators when `mode` is [`ValidationMode::Sync`]. Rules whose
/// options are `false` or `null` are disabled, but their name must still
/// exist.
pub fn check(
    constraints: &Constraints,
    registry: &ValidatorRegistry,
    mode: ValidationMode,
) -> Result<(), ConfigError> {
    for (field, rules) in constraints.iter() {
        for (rule, options) in rules.iter() {
            let invalid = |reason: String| ConfigError::InvalidValidatorRule {
                field: field.to_owned(),
                rule: rule.to_owned(),
                reason,
            };

            let entry = registry.get(rule).ok_or_else(|| invalid("unknown validator".to_owned()))?;
            if mode == ValidationMode::Sync && matches!(entry, Entry::Async(_)) {
                return Err(invalid("asynchronous validator requires async mode".to_owned()));
            }
            if is_disabled(options) {
                continue;
            }
            entry.check_options(options).map_err(invalid)?;
        }
    }
    Ok(())
}

fn is_disabled(options: &Value) -> bool {
    matches!(options, Value::Null | Value::Bool(false))
}

// ── Running validators ────────────────────────────────────────────────────────

struct Failure {
    attribute: String,
    value: Option<Value>,
    validator: String,
    message: String,
}

/// Validates `attributes` synchronously. `None` means every rule passed.
///
/// Rules naming unknown or async validators are skipped with a warning;
/// [`check`] rejects both up front.
pub fn validate(
    attributes: &Map<String, Value>,
    constraints: &Constraints,
    registry: &ValidatorRegistry,
    options: &ValidateOptions,
) -> Option<Value> {
    let mut failures = Vec::new();
    for (field, rules) in constraints.iter() {
        let value = attributes.get(field);
        let ctx = FieldContext { field, attributes };
        for (rule, rule_options) in rules.iter() {
            if is_disabled(rule_options) {
                continue;
            }
            let message = match registry.get(rule) {
                Some(Entry::Sync(v)) => v.validate(value, rule_options, &ctx),
                Some(Entry::Async(_)) => {
                    warn!(field, rule, "skipping async validator in sync validation");
                    None
                }
                None => {
                    warn!(field, rule, "skipping unknown validator");
                    None
                }
            };
            if let Some(message) = message {
                failures.push(failure(field, value, rule, message, options));
            }
        }
    }
    payload(failures, options)
}

/// Validates `attributes`, awaiting async validators one at a time.
pub async fn validate_async(
    attributes: &Map<String, Value>,
    constraints: &Constraints,
    registry: &ValidatorRegistry,
    options: &ValidateOptions,
) -> Result<(), Value> {
    let mut failures = Vec::new();
    for (field, rules) in constraints.iter() {
        let value = attributes.get(field);
        for (rule, rule_options) in rules.iter() {
            if is_disabled(rule_options) {
                continue;
            }
            let message = match registry.get(rule) {
                Some(Entry::Sync(v)) => {
                    v.validate(value, rule_options, &FieldContext { field, attributes })
                }
                Some(Entry::Async(v)) => {
                    trace!(field, rule, "awaiting async validator");
                    v.validate(value.cloned(), rule_options.clone(), field.to_owned()).await
                }
                None => {
                    warn!(field, rule, "skipping unknown validator");
                    None
                }
            };
            if let Some(message) = message {
                failures.push(failure(field, value, rule, message, options));
            }
        }
    }
    payload(failures, options).map_or(Ok(()), Err)
}

fn failure(
    field: &str,
    value: Option<&Value>,
    rule: &str,
    message: String,
    options: &ValidateOptions,
) -> Failure {
    let message = match message.strip_prefix('^') {
        Some(verbatim) => verbatim.to_owned(),
        None if options.full_messages => format!("{} {message}", humanize(field)),
        None => message,
    };
    Failure {
        attribute: field.to_owned(),
        value: value.cloned(),
        validator: rule.to_owned(),
        message,
    }
}

fn payload(failures: Vec<Failure>, options: &ValidateOptions) -> Option<Value> {
    if failures.is_empty() {
        return None;
    }
    let payload = match options.format {
        ErrorFormat::Grouped => {
            let mut grouped = Map::new();
            for f in failures {
                let messages = grouped.entry(f.attribute).or_insert_with(|| Value::Array(Vec::new()));
                if let Value::Array(list) = messages {
                    list.push(Value::String(f.message));
                }
            }
            Value::Object(grouped)
        }
        ErrorFormat::Flat => failures.into_iter().map(|f| Value::String(f.message)).collect(),
        ErrorFormat::Detailed => failures.into_iter()
            .map(|f| json!({
                "attribute": f.attribute,
                "value": f.value,
                "validator": f.validator,
                "error": f.message,
            }))
            .collect(),
    };
    Some(payload)
}

/// `"firstName"`, `"first_name"`, `"first-name"` → `"First name"`.
pub(crate) fn humanize(field: &str) -> String {
    let mut out = String::with_capacity(field.len() + 4);
    let mut prev_lower = false;
    for c in field.chars() {
        if matches!(c, '_' | '-' | '.') {
            out.push(' ');
            prev_lower = false;
        } else if c.is_uppercase() && prev_lower {
            out.push(' ');
            out.extend(c.to_lowercase());
            prev_lower = false;
        } else {
            out.extend(c.to_lowercase());
            prev_lower = c.is_lowercase() || c.is_ascii_digit();
        }
    }
    let mut chars = out.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => out,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attrs(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap_or_default()
    }

    fn constraints(value: Value) -> Constraints {
        Constraints::from_value(&value).unwrap()
    }

    #[test]
    fn humanizes_field_names() {
        assert_eq!(humanize("param"), "Param");
        assert_eq!(humanize("firstName"), "First name");
        assert_eq!(humanize("first_name"), "First name");
        assert_eq!(humanize("user.email"), "User email");
        assert_eq!(humanize(""), "");
    }

    #[test]
    fn rejects_non_object_constraints() {
        assert!(matches!(Constraints::from_value(&json!([])), Err(ConfigError::NotAnObject { .. })));
        assert!(matches!(
            Constraints::from_value(&json!({ "a": true })),
            Err(ConfigError::NotAnObject { .. })
        ));
        assert!(matches!(Constraints::from_json("{"), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn without_strips_rule_from_copy_only() {
        let c = constraints(json!({ "a": { "scope": "route", "presence": true } }));
        let stripped = c.without("scope");
        assert!(stripped.get("a").unwrap().get("scope").is_none());
        assert!(c.get("a").unwrap().get("scope").is_some());
    }

    #[test]
    fn options_deserialize_from_camel_case() {
        let o = ValidateOptions::from_value(&json!({ "fullMessages": false, "format": "detailed" })).unwrap();
        assert!(!o.full_messages);
        assert_eq!(o.format, ErrorFormat::Detailed);
        assert_eq!(ValidateOptions::from_value(&json!({})).unwrap(), ValidateOptions::default());
        assert!(ValidateOptions::from_value(&json!({ "format": "xml" })).is_err());
    }

    #[test]
    fn check_rejects_unknown_validators() {
        let e = check(
            &constraints(json!({ "a": { "invalidValidator": {} } })),
            &ValidatorRegistry::new(),
            ValidationMode::Sync,
        )
        .unwrap_err();
        assert_eq!(e.to_string(), "invalid rule `invalidValidator` for field `a`: unknown validator");
    }

    #[test]
    fn check_rejects_bad_options_but_not_disabled_rules() {
        let registry = ValidatorRegistry::new();
        let bad = constraints(json!({ "a": { "length": "long" } }));
        assert!(check(&bad, &registry, ValidationMode::Sync).is_err());

        let disabled = constraints(json!({ "a": { "length": false } }));
        assert!(check(&disabled, &registry, ValidationMode::Sync).is_ok());
    }

    #[test]
    fn check_rejects_async_validators_in_sync_mode() {
        let mut registry = ValidatorRegistry::new();
        registry.register_async_fn("remote", |_, _| async { None });
        let c = constraints(json!({ "a": { "remote": true } }));
        assert!(check(&c, &registry, ValidationMode::Sync).is_err());
        assert!(check(&c, &registry, ValidationMode::Async).is_ok());
    }

    #[test]
    fn grouped_payload_prefixes_field_name() {
        let c = constraints(json!({ "param": { "presence": true } }));
        let errors = validate(&Map::new(), &c, &ValidatorRegistry::new(), &ValidateOptions::default());
        assert_eq!(errors, Some(json!({ "param": ["Param can't be blank"] })));
    }

    #[test]
    fn flat_and_detailed_payloads() {
        let c = constraints(json!({ "n": { "numericality": true } }));
        let registry = ValidatorRegistry::new();

        let flat = ValidateOptions { full_messages: false, format: ErrorFormat::Flat };
        assert_eq!(
            validate(&attrs(json!({ "n": "x" })), &c, &registry, &flat),
            Some(json!(["is not a number"]))
        );

        let detailed = ValidateOptions { format: ErrorFormat::Detailed, ..Default::default() };
        assert_eq!(
            validate(&attrs(json!({ "n": "x" })), &c, &registry, &detailed),
            Some(json!([{
                "attribute": "n",
                "value": "x",
                "validator": "numericality",
                "error": "N is not a number",
            }]))
        );
    }

    #[test]
    fn caret_messages_are_verbatim() {
        let c = constraints(json!({ "color": { "inclusion": ["red"] } }));
        let errors = validate(
            &attrs(json!({ "color": "blue" })),
            &c,
            &ValidatorRegistry::new(),
            &ValidateOptions::default(),
        );
        assert_eq!(errors, Some(json!({ "color": ["blue is not included in the list"] })));
    }

    #[test]
    fn passing_data_yields_none() {
        let c = constraints(json!({ "a": { "presence": true, "length": { "is": 2 } } }));
        assert_eq!(
            validate(&attrs(json!({ "a": "ok" })), &c, &ValidatorRegistry::new(), &ValidateOptions::default()),
            None
        );
    }

    #[tokio::test]
    async fn async_validation_awaits_async_validators() {
        let mut registry = ValidatorRegistry::new();
        registry.register_async_fn("taken", |value, _| async move {
            (value == Some(json!("admin"))).then(|| "is already taken".to_owned())
        });
        let c = constraints(json!({ "user": { "presence": true, "taken": true } }));

        let ok = validate_async(&attrs(json!({ "user": "bob" })), &c, &registry, &ValidateOptions::default()).await;
        assert!(ok.is_ok());

        let err = validate_async(&attrs(json!({ "user": "admin" })), &c, &registry, &ValidateOptions::default())
            .await
            .unwrap_err();
        assert_eq!(err, json!({ "user": ["User is already taken"] }));
    }
}
