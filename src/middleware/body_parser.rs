//! Body parsing.

use http::StatusCode;
use serde_json::{Map, Value};
use tracing::debug;

use super::{Middleware, Next};
use crate::error::Fault;
use crate::handler::BoxFuture;
use crate::request::Request;
use crate::response::Response;

/// Fills [`Request::fields`] from the raw body.
///
/// | content-type | result |
/// |---|---|
/// | `application/json` | the top-level object (empty body → empty map) |
/// | `application/x-www-form-urlencoded` | string fields, first key wins |
/// | anything else, or none | empty map |
///
/// A body that does not parse as its content type is answered with `400`.
#[derive(Clone, Copy, Debug, Default)]
pub struct BodyParser;

impl BodyParser {
    pub fn new() -> Self {
        Self
    }
}

impl Middleware for BodyParser {
    fn handle(&self, mut req: Request, next: Next) -> BoxFuture<'static, Result<Response, Fault>> {
        Box::pin(async move {
            match parse(&req) {
                Ok(fields) => {
                    req.set_fields(fields);
                    next.run(req).await
                }
                Err(reason) => {
                    debug!(path = req.path(), %reason, "rejecting malformed body");
                    Ok(Response::builder().status(StatusCode::BAD_REQUEST).text(reason))
                }
            }
        })
    }
}

fn parse(req: &Request) -> Result<Map<String, Value>, String> {
    let mime = req.header("content-type")
        .and_then(|ct| ct.split(';').next())
        .map(|m| m.trim().to_ascii_lowercase())
        .unwrap_or_default();

    match mime.as_str() {
        "application/json" => {
            if req.body().iter().all(u8::is_ascii_whitespace) {
                return Ok(Map::new());
            }
            match serde_json::from_slice(req.body()) {
                Ok(Value::Object(fields)) => Ok(fields),
                Ok(_) => Err("expected a JSON object".to_owned()),
                Err(e) => Err(format!("invalid JSON body: {e}")),
            }
        }
        "application/x-www-form-urlencoded" => {
            let pairs: Vec<(String, String)> = serde_urlencoded::from_bytes(req.body())
                .map_err(|e| format!("invalid form body: {e}"))?;
            let mut fields = Map::new();
            for (k, v) in pairs {
                fields.entry(k).or_insert(Value::String(v));
            }
            Ok(fields)
        }
        _ => Ok(Map::new()),
    }
}

#[cfg(test)]
mod tests {
    use http::Method;
    use serde_json::json;

    use super::*;

    fn post(content_type: &str, body: &str) -> Request {
        Request::builder()
            .method(Method::POST)
            .header("Content-Type", content_type)
            .body(body.to_owned())
            .build()
    }

    #[test]
    fn parses_json_objects() {
        let fields = parse(&post("application/json; charset=utf-8", r#"{"a":1,"b":"x"}"#)).unwrap();
        assert_eq!(Value::Object(fields), json!({ "a": 1, "b": "x" }));
    }

    #[test]
    fn empty_json_body_is_empty_map() {
        assert!(parse(&post("application/json", "")).unwrap().is_empty());
    }

    #[test]
    fn rejects_non_object_and_malformed_json() {
        assert!(parse(&post("application/json", "[1,2]")).is_err());
        assert!(parse(&post("application/json", "{")).is_err());
    }

    #[test]
    fn parses_forms() {
        let fields = parse(&post("application/x-www-form-urlencoded", "a=1&a=2&b=hello+world")).unwrap();
        assert_eq!(Value::Object(fields), json!({ "a": "1", "b": "hello world" }));
    }

    #[test]
    fn other_content_types_yield_empty_map() {
        assert!(parse(&post("text/plain", "a=1")).unwrap().is_empty());
        assert!(parse(&Request::builder().build()).unwrap().is_empty());
    }
}
