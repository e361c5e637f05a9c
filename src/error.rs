//! Error types.
//!
//! Three severities, three types:
//!
//! | Type | When | Outcome |
//! |---|---|---|
//! | [`ConfigError`] | building a [`Validate`](crate::middleware::Validate) | startup fails |
//! | [`Fault`] | handling a request | `500 Internal Server Error` |
//! | [`Error`] | binding or serving | returned from [`Server::serve`](crate::Server::serve) |
//!
//! A request that simply fails validation is none of these. It is a regular
//! `400` [`Response`](crate::Response) written by the middleware.

use thiserror::Error;

use crate::scope::Scope;

/// The error type returned by the server's fallible operations.
///
/// Surfaces infrastructure failures only: binding to a port or accepting a
/// connection.
#[derive(Debug, Error)]
#[error("io: {0}")]
pub struct Error(#[from] std::io::Error);

/// A constraint map that cannot become a middleware.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A `scope` entry is not one of `route`, `query`, `body`, `cookies`,
    /// or is not a string at all.
    #[error("invalid scope {scope} for field `{field}`")]
    InvalidScope { field: String, scope: String },

    /// A field has no `scope` and the policy requires one.
    #[error("missing scope for field `{field}`")]
    MissingScope { field: String },

    /// A rule names an unknown validator or carries options its validator
    /// rejects.
    #[error("invalid rule `{rule}` for field `{field}`: {reason}")]
    InvalidValidatorRule {
        field: String,
        rule: String,
        reason: String,
    },

    /// The constraint map, or one field's rule set, is not a JSON object.
    #[error("{what} must be an object")]
    NotAnObject { what: String },

    /// Constraint or option JSON that does not parse.
    #[error("parse: {0}")]
    Parse(#[from] serde_json::Error),
}

/// A request-time failure that is the deployment's fault, not the client's.
///
/// Faults are never turned into `400`s. They travel up the middleware chain
/// as `Err` and the router answers `500`.
#[derive(Debug, Error)]
pub enum Fault {
    /// A field reads from `body` or `cookies` but the parser middleware that
    /// fills that scope was never installed.
    #[error("{collaborator} is required to read the {scope} scope")]
    MissingCollaborator {
        scope: Scope,
        collaborator: &'static str,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_field() {
        let e = ConfigError::InvalidScope { field: "id".into(), scope: "\"header\"".into() };
        assert_eq!(e.to_string(), "invalid scope \"header\" for field `id`");

        let e = ConfigError::MissingScope { field: "id".into() };
        assert_eq!(e.to_string(), "missing scope for field `id`");
    }

    #[test]
    fn fault_names_the_parser() {
        let f = Fault::MissingCollaborator { scope: Scope::Body, collaborator: "BodyParser" };
        assert_eq!(f.to_string(), "BodyParser is required to read the body scope");
    }
}
