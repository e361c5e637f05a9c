//! Built-in validators.
//!
//! Options follow the familiar validate.js shapes, e.g.
//! `{ "length": { "minimum": 3 } }` or `{ "inclusion": ["a", "b"] }`.
//! Every validator accepts a `message` option that replaces its default
//! message; start it with `^` to suppress the field-name prefix.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use regex::Regex;
use serde_json::Value;

use super::humanize;
use super::registry::{FieldContext, Validator};

static EMAIL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^[a-z0-9!#$%&'*+/=?^_`{|}~-]+(?:\.[a-z0-9!#$%&'*+/=?^_`{|}~-]+)*@(?:[a-z0-9](?:[a-z0-9-]*[a-z0-9])?\.)+[a-z]{2,}$")
        .expect("email pattern is valid")
});

static STRICT_DECIMAL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^-?(0|[1-9]\d*)(\.\d+)?$").expect("decimal pattern is valid")
});

static STRICT_INTEGER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^-?(0|[1-9]\d*)$").expect("integer pattern is valid")
});

fn is_defined(value: Option<&Value>) -> bool {
    !matches!(value, None | Some(Value::Null))
}

/// The `message` option if present, the default otherwise.
fn message(options: &Value, default: impl Into<String>) -> String {
    options.get("message")
        .and_then(Value::as_str)
        .map_or_else(|| default.into(), str::to_owned)
}

fn bool_or_object(options: &Value) -> Result<(), String> {
    match options {
        Value::Bool(_) | Value::Object(_) => Ok(()),
        other => Err(format!("expected true or an object, got {other}")),
    }
}

/// Renders a value for a message: strings without quotes, the rest as JSON.
fn display(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

// ── presence ──────────────────────────────────────────────────────────────────

/// Fails on missing and `null` values and, unless `allowEmpty` is set, on
/// blank strings, empty arrays and empty objects.
pub struct Presence;

impl Validator for Presence {
    fn check_options(&self, options: &Value) -> Result<(), String> {
        bool_or_object(options)?;
        match options.get("allowEmpty") {
            None | Some(Value::Bool(_)) => Ok(()),
            Some(other) => Err(format!("allowEmpty must be a boolean, got {other}")),
        }
    }

    fn validate(&self, value: Option<&Value>, options: &Value, _ctx: &FieldContext<'_>) -> Option<String> {
        let allow_empty = options.get("allowEmpty").and_then(Value::as_bool).unwrap_or(false);
        let blank = match value {
            None | Some(Value::Null) => true,
            Some(_) if allow_empty => false,
            Some(Value::String(s)) => s.trim().is_empty(),
            Some(Value::Array(a)) => a.is_empty(),
            Some(Value::Object(o)) => o.is_empty(),
            Some(_) => false,
        };
        blank.then(|| message(options, "can't be blank"))
    }
}

// ── length ────────────────────────────────────────────────────────────────────

/// Character count of strings, element count of arrays. Options: `is`,
/// `minimum`, `maximum`.
pub struct Length;

impl Validator for Length {
    fn check_options(&self, options: &Value) -> Result<(), String> {
        let Value::Object(map) = options else {
            return Err(format!("expected an object, got {options}"));
        };
        let mut bounded = false;
        for key in ["is", "minimum", "maximum"] {
            if let Some(bound) = map.get(key) {
                bound.as_u64().ok_or_else(|| format!("{key} must be a non-negative integer"))?;
                bounded = true;
            }
        }
        if bounded { Ok(()) } else { Err("one of is, minimum or maximum is required".to_owned()) }
    }

    fn validate(&self, value: Option<&Value>, options: &Value, _ctx: &FieldContext<'_>) -> Option<String> {
        let value = value.filter(|v| !v.is_null())?;
        let len = match value {
            Value::String(s) => s.chars().count() as u64,
            Value::Array(a) => a.len() as u64,
            _ => return Some(message(options, "has an incorrect length")),
        };
        let bound = |key: &str| options.get(key).and_then(Value::as_u64);

        if let Some(is) = bound("is").filter(|&is| len != is) {
            return Some(message(options, format!("is the wrong length (should be {is} characters)")));
        }
        if let Some(min) = bound("minimum").filter(|&min| len < min) {
            return Some(message(options, format!("is too short (minimum is {min} characters)")));
        }
        if let Some(max) = bound("maximum").filter(|&max| len > max) {
            return Some(message(options, format!("is too long (maximum is {max} characters)")));
        }
        None
    }
}

// ── format ────────────────────────────────────────────────────────────────────

/// Whole-string regex match. Options: a pattern string, or
/// `{ "pattern": ..., "flags": "i" }`.
///
/// Patterns are compiled when the options are checked and kept, keyed by
/// their options, for every later request.
#[derive(Default)]
pub struct Format {
    compiled: RwLock<HashMap<String, Regex>>,
}

impl Format {
    pub fn new() -> Self {
        Self::default()
    }

    fn compile(options: &Value) -> Result<Regex, String> {
        let (pattern, flags) = match options {
            Value::String(p) => (p.as_str(), ""),
            Value::Object(map) => (
                map.get("pattern").and_then(Value::as_str).ok_or("pattern must be a string")?,
                map.get("flags").and_then(Value::as_str).unwrap_or(""),
            ),
            other => return Err(format!("expected a pattern or an object, got {other}")),
        };
        if let Some(bad) = flags.chars().find(|c| !matches!(c, 'i' | 'm' | 's' | 'x')) {
            return Err(format!("unsupported flag `{bad}`"));
        }
        let inline = if flags.is_empty() { String::new() } else { format!("(?{flags})") };
        Regex::new(&format!("{inline}^(?:{pattern})$")).map_err(|e| e.to_string())
    }

    /// The compiled pattern for `options`, compiling it on first use.
    fn regex(&self, options: &Value) -> Result<Regex, String> {
        let key = options.to_string();
        if let Some(re) = self.compiled.read().get(&key) {
            return Ok(re.clone());
        }
        let re = Self::compile(options)?;
        self.compiled.write().entry(key).or_insert_with(|| re.clone());
        Ok(re)
    }

    #[cfg(test)]
    fn cached(&self) -> usize {
        self.compiled.read().len()
    }
}

impl Validator for Format {
    fn check_options(&self, options: &Value) -> Result<(), String> {
        self.regex(options).map(drop)
    }

    fn validate(&self, value: Option<&Value>, options: &Value, _ctx: &FieldContext<'_>) -> Option<String> {
        let value = value.filter(|v| !v.is_null())?;
        let matched = match value.as_str() {
            Some(s) => self.regex(options).is_ok_and(|re| re.is_match(s)),
            None => false,
        };
        (!matched).then(|| message(options, "is invalid"))
    }
}

// ── numericality ──────────────────────────────────────────────────────────────

/// Numbers and numeric strings. Under `strict`, strings must be plain
/// decimals: no padding, no leading zeros, no exponent, and no fraction
/// with `onlyInteger`. Options:
/// `onlyInteger`, `strict`, `greaterThan`, `greaterThanOrEqualTo`, `equalTo`,
/// `lessThanOrEqualTo`, `lessThan`, `odd`, `even`.
pub struct Numericality;

const COMPARISONS: [(&str, &str); 5] = [
    ("greaterThan",          "must be greater than"),
    ("greaterThanOrEqualTo", "must be greater than or equal to"),
    ("equalTo",              "must be equal to"),
    ("lessThanOrEqualTo",    "must be less than or equal to"),
    ("lessThan",             "must be less than"),
];

fn holds(comparison: &str, value: f64, bound: f64) -> bool {
    match comparison {
        "greaterThan"          => value > bound,
        "greaterThanOrEqualTo" => value >= bound,
        "equalTo"              => value == bound,
        "lessThanOrEqualTo"    => value <= bound,
        "lessThan"             => value < bound,
        _                      => true,
    }
}

impl Validator for Numericality {
    fn check_options(&self, options: &Value) -> Result<(), String> {
        bool_or_object(options)?;
        for (key, _) in COMPARISONS {
            if options.get(key).is_some_and(|b| !b.is_number()) {
                return Err(format!("{key} must be a number"));
            }
        }
        Ok(())
    }

    fn validate(&self, value: Option<&Value>, options: &Value, _ctx: &FieldContext<'_>) -> Option<String> {
        let value = value.filter(|v| !v.is_null())?;
        let flag = |key: &str| options.get(key).and_then(Value::as_bool).unwrap_or(false);

        let number = match value {
            Value::Number(n) => n.as_f64(),
            Value::String(s) if flag("strict") => {
                let plain = if flag("onlyInteger") { &*STRICT_INTEGER } else { &*STRICT_DECIMAL };
                plain.is_match(s).then(|| s.parse::<f64>().ok()).flatten()
            }
            Value::String(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
            _ => None,
        };
        let Some(n) = number else {
            return Some(message(options, "is not a number"));
        };

        if flag("onlyInteger") && n.fract() != 0.0 {
            return Some(message(options, "must be an integer"));
        }
        for (key, text) in COMPARISONS {
            if let Some(bound) = options.get(key).filter(|b| b.is_number()) {
                let b = bound.as_f64().unwrap_or(f64::NAN);
                if !holds(key, n, b) {
                    return Some(message(options, format!("{text} {bound}")));
                }
            }
        }
        if flag("odd") && n % 2.0 != 1.0 && n % 2.0 != -1.0 {
            return Some(message(options, "must be odd"));
        }
        if flag("even") && n % 2.0 != 0.0 {
            return Some(message(options, "must be even"));
        }
        None
    }
}

// ── inclusion / exclusion ─────────────────────────────────────────────────────

fn within(options: &Value) -> Result<&Vec<Value>, String> {
    match options {
        Value::Array(list) => Ok(list),
        Value::Object(map) => map.get("within")
            .and_then(Value::as_array)
            .ok_or_else(|| "within must be an array".to_owned()),
        other => Err(format!("expected an array or an object, got {other}")),
    }
}

/// The value must be one of a list.
pub struct Inclusion;

impl Validator for Inclusion {
    fn check_options(&self, options: &Value) -> Result<(), String> {
        within(options).map(drop)
    }

    fn validate(&self, value: Option<&Value>, options: &Value, _ctx: &FieldContext<'_>) -> Option<String> {
        let value = value.filter(|v| !v.is_null())?;
        let list = within(options).ok()?;
        (!list.contains(value))
            .then(|| message(options, format!("^{} is not included in the list", display(value))))
    }
}

/// The value must not be one of a list.
pub struct Exclusion;

impl Validator for Exclusion {
    fn check_options(&self, options: &Value) -> Result<(), String> {
        within(options).map(drop)
    }

    fn validate(&self, value: Option<&Value>, options: &Value, _ctx: &FieldContext<'_>) -> Option<String> {
        let value = value.filter(|v| !v.is_null())?;
        let list = within(options).ok()?;
        list.contains(value)
            .then(|| message(options, format!("^{} is restricted", display(value))))
    }
}

// ── email ─────────────────────────────────────────────────────────────────────

pub struct Email;

impl Validator for Email {
    fn check_options(&self, options: &Value) -> Result<(), String> {
        bool_or_object(options)
    }

    fn validate(&self, value: Option<&Value>, options: &Value, _ctx: &FieldContext<'_>) -> Option<String> {
        let value = value.filter(|v| !v.is_null())?;
        let valid = value.as_str().is_some_and(|s| EMAIL.is_match(s));
        (!valid).then(|| message(options, "is not a valid email"))
    }
}

// ── equality ──────────────────────────────────────────────────────────────────

/// The value must equal another collected field, e.g. a password
/// confirmation. Options: the other field's name, or `{ "attribute": ... }`.
pub struct Equality;

impl Equality {
    fn attribute(options: &Value) -> Option<&str> {
        options.as_str().or_else(|| options.get("attribute")?.as_str())
    }
}

impl Validator for Equality {
    fn check_options(&self, options: &Value) -> Result<(), String> {
        Self::attribute(options)
            .map(drop)
            .ok_or_else(|| "expected an attribute name".to_owned())
    }

    fn validate(&self, value: Option<&Value>, options: &Value, ctx: &FieldContext<'_>) -> Option<String> {
        if !is_defined(value) {
            return None;
        }
        let other = Self::attribute(options)?;
        (value != ctx.attributes.get(other))
            .then(|| message(options, format!("is not equal to {}", humanize(other).to_lowercase())))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Map};

    use super::*;

    fn run(v: &dyn Validator, value: Option<Value>, options: Value) -> Option<String> {
        let attributes = Map::new();
        let ctx = FieldContext { field: "f", attributes: &attributes };
        v.validate(value.as_ref(), &options, &ctx)
    }

    #[test]
    fn presence() {
        assert_eq!(run(&Presence, None, json!(true)).as_deref(), Some("can't be blank"));
        assert_eq!(run(&Presence, Some(json!(null)), json!(true)).as_deref(), Some("can't be blank"));
        assert!(run(&Presence, Some(json!("  ")), json!(true)).is_some());
        assert!(run(&Presence, Some(json!("  ")), json!({ "allowEmpty": true })).is_none());
        assert!(run(&Presence, Some(json!("x")), json!(true)).is_none());
        assert!(run(&Presence, Some(json!(0)), json!(true)).is_none());
        assert!(Presence.check_options(&json!("yes")).is_err());
    }

    #[test]
    fn length() {
        let opts = json!({ "minimum": 2, "maximum": 4 });
        assert_eq!(
            run(&Length, Some(json!("a")), opts.clone()).as_deref(),
            Some("is too short (minimum is 2 characters)")
        );
        assert!(run(&Length, Some(json!("abc")), opts.clone()).is_none());
        assert!(run(&Length, Some(json!("abcde")), opts.clone()).is_some());
        assert!(run(&Length, None, opts).is_none());
        assert!(run(&Length, Some(json!("ab")), json!({ "is": 3 })).is_some());
        assert!(Length.check_options(&json!({})).is_err());
        assert!(Length.check_options(&json!({ "minimum": -1 })).is_err());
    }

    #[test]
    fn format_matches_whole_string() {
        let format = Format::new();
        assert!(run(&format, Some(json!("abc")), json!("[a-z]+")).is_none());
        assert!(run(&format, Some(json!("abc1")), json!("[a-z]+")).is_some());
        assert!(run(&format, Some(json!("ABC")), json!({ "pattern": "[a-z]+", "flags": "i" })).is_none());
        assert!(run(&format, Some(json!(1)), json!("[0-9]")).is_some());
        assert!(format.check_options(&json!("(")).is_err());
        assert!(format.check_options(&json!({ "pattern": "a", "flags": "g" })).is_err());
    }

    #[test]
    fn format_compiles_once_per_pattern() {
        let format = Format::new();
        format.check_options(&json!("[a-z]+")).unwrap();
        assert_eq!(format.cached(), 1);

        for value in ["abc", "xyz", "ABC"] {
            run(&format, Some(json!(value)), json!("[a-z]+"));
        }
        assert_eq!(format.cached(), 1);

        run(&format, Some(json!("abc")), json!({ "pattern": "[a-z]+", "flags": "i" }));
        assert_eq!(format.cached(), 2);
        assert!(format.check_options(&json!("(")).is_err());
        assert_eq!(format.cached(), 2);
    }

    #[test]
    fn numericality() {
        assert!(run(&Numericality, Some(json!("42")), json!(true)).is_none());
        assert_eq!(run(&Numericality, Some(json!("x")), json!(true)).as_deref(), Some("is not a number"));
        assert_eq!(
            run(&Numericality, Some(json!(1.5)), json!({ "onlyInteger": true })).as_deref(),
            Some("must be an integer")
        );
        assert_eq!(
            run(&Numericality, Some(json!(3)), json!({ "greaterThan": 5 })).as_deref(),
            Some("must be greater than 5")
        );
        assert!(run(&Numericality, Some(json!(-3)), json!({ "odd": true })).is_none());
        assert!(run(&Numericality, Some(json!(3)), json!({ "even": true })).is_some());
        assert!(Numericality.check_options(&json!({ "lessThan": "ten" })).is_err());
    }

    #[test]
    fn strict_numericality_accepts_plain_numeric_strings() {
        let strict = json!({ "strict": true });
        assert!(run(&Numericality, Some(json!("42")), strict.clone()).is_none());
        assert!(run(&Numericality, Some(json!("-0.5")), strict.clone()).is_none());
        assert!(run(&Numericality, Some(json!(7)), strict.clone()).is_none());
        for bad in ["042", " 42", "42 ", "1e3", "4.", ""] {
            assert_eq!(
                run(&Numericality, Some(json!(bad)), strict.clone()).as_deref(),
                Some("is not a number"),
                "{bad:?}"
            );
        }

        let integer = json!({ "strict": true, "onlyInteger": true });
        assert!(run(&Numericality, Some(json!("42")), integer.clone()).is_none());
        assert!(run(&Numericality, Some(json!("4.5")), integer).is_some());

        // non-strict parsing stays lenient
        assert!(run(&Numericality, Some(json!(" 042 ")), json!(true)).is_none());
    }

    #[test]
    fn inclusion_and_exclusion() {
        assert!(run(&Inclusion, Some(json!("a")), json!(["a", "b"])).is_none());
        assert_eq!(
            run(&Inclusion, Some(json!("c")), json!({ "within": ["a", "b"] })).as_deref(),
            Some("^c is not included in the list")
        );
        assert_eq!(run(&Exclusion, Some(json!("a")), json!(["a"])).as_deref(), Some("^a is restricted"));
        assert!(Inclusion.check_options(&json!("a")).is_err());
    }

    #[test]
    fn email() {
        assert!(run(&Email, Some(json!("a.b@example.com")), json!(true)).is_none());
        assert!(run(&Email, Some(json!("nope")), json!(true)).is_some());
        assert!(run(&Email, None, json!(true)).is_none());
    }

    #[test]
    fn equality_compares_other_field() {
        let attributes = json!({ "password": "hunter2" }).as_object().cloned().unwrap();
        let ctx = FieldContext { field: "confirm", attributes: &attributes };
        assert!(Equality.validate(Some(&json!("hunter2")), &json!("password"), &ctx).is_none());
        assert_eq!(
            Equality.validate(Some(&json!("x")), &json!("password"), &ctx).as_deref(),
            Some("is not equal to password")
        );
    }

    #[test]
    fn custom_message_replaces_default() {
        assert_eq!(
            run(&Presence, None, json!({ "message": "^Required" })).as_deref(),
            Some("^Required")
        );
    }
}
