//! Cookie parsing.

use std::borrow::Cow;
use std::collections::HashMap;

use super::{Middleware, Next};
use crate::error::Fault;
use crate::handler::BoxFuture;
use crate::request::Request;
use crate::response::Response;

/// Fills [`Request::cookies`] from the `cookie` header.
///
/// A missing header yields an empty map. Pairs without `=` are ignored;
/// surrounding double quotes are stripped from values, which are then
/// percent-decoded (left as sent when decoding fails). On repeated names the
/// first one wins.
#[derive(Clone, Copy, Debug, Default)]
pub struct CookieParser;

impl CookieParser {
    pub fn new() -> Self {
        Self
    }
}

impl Middleware for CookieParser {
    fn handle(&self, mut req: Request, next: Next) -> BoxFuture<'static, Result<Response, Fault>> {
        let cookies = req.header("cookie").map(parse).unwrap_or_default();
        req.set_cookies(cookies);
        Box::pin(next.run(req))
    }
}

fn parse(header: &str) -> HashMap<String, String> {
    let mut cookies = HashMap::new();
    for pair in header.split(';') {
        let Some((name, value)) = pair.split_once('=') else { continue };
        let name = name.trim();
        if name.is_empty() {
            continue;
        }
        let value = value.trim();
        let value = value.strip_prefix('"')
            .and_then(|v| v.strip_suffix('"'))
            .unwrap_or(value);
        let value = urlencoding::decode(value).unwrap_or(Cow::Borrowed(value));
        cookies.entry(name.to_owned()).or_insert_with(|| value.into_owned());
    }
    cookies
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_pairs() {
        let c = parse("param=thing; session=\"abc\";flag");
        assert_eq!(c.get("param").map(String::as_str), Some("thing"));
        assert_eq!(c.get("session").map(String::as_str), Some("abc"));
        assert!(!c.contains_key("flag"));
    }

    #[test]
    fn first_name_wins() {
        let c = parse("a=1; a=2");
        assert_eq!(c.get("a").map(String::as_str), Some("1"));
    }

    #[test]
    fn values_are_percent_decoded() {
        let c = parse("name=hello%20world; quoted=\"a%3Bb\"; broken=%E0%A4%A");
        assert_eq!(c.get("name").map(String::as_str), Some("hello world"));
        assert_eq!(c.get("quoted").map(String::as_str), Some("a;b"));
        assert_eq!(c.get("broken").map(String::as_str), Some("%E0%A4%A"));
    }

    #[test]
    fn values_may_contain_equals() {
        let c = parse("token=a=b");
        assert_eq!(c.get("token").map(String::as_str), Some("a=b"));
    }
}
