//! URL assembly helpers.

use crate::config::ParamsSerializer;
use http::Uri;
use serde_json::Value;

/// Percent-encode a query component.
///
/// Matches `encodeURIComponent`, then restores `@ : $ , [ ]` and writes
/// spaces as `+`.
#[must_use]
pub fn encode(value: &str) -> String {
    let encoded = urlencoding::encode(value);
    let mut out = String::with_capacity(encoded.len());
    let mut rest: &str = &encoded;

    while let Some(pos) = rest.find('%') {
        out.push_str(&rest[..pos]);
        let escape = rest.get(pos..pos + 3).unwrap_or(&rest[pos..]);
        let restored = match escape.to_ascii_uppercase().as_str() {
            // Left intact by encodeURIComponent
            "%21" => Some('!'),
            "%27" => Some('\''),
            "%28" => Some('('),
            "%29" => Some(')'),
            "%2A" => Some('*'),
            // Readability whitelist
            "%40" => Some('@'),
            "%3A" => Some(':'),
            "%24" => Some('$'),
            "%2C" => Some(','),
            "%20" => Some('+'),
            "%5B" => Some('['),
            "%5D" => Some(']'),
            _ => None,
        };
        match restored {
            Some(c) => out.push(c),
            None => out.push_str(escape),
        }
        rest = &rest[pos + escape.len()..];
    }
    out.push_str(rest);
    out
}

fn param_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn serialize_params(params: &Value) -> String {
    let map = match params {
        Value::Object(map) => map,
        Value::String(s) => return s.clone(),
        _ => return String::new(),
    };

    let mut parts = Vec::new();
    for (key, value) in map {
        match value {
            Value::Null => {}
            Value::Array(items) => {
                let key = encode(&format!("{key}[]"));
                for item in items {
                    parts.push(format!("{key}={}", encode(&param_text(item))));
                }
            }
            other => parts.push(format!("{}={}", encode(key), encode(&param_text(other)))),
        }
    }
    parts.join("&")
}

/// Append serialized `params` to `url`.
///
/// A custom `serializer` takes precedence over the built-in one. An empty
/// query leaves `url` untouched; otherwise any fragment is dropped and the
/// query is joined with `?` or `&`.
#[must_use]
pub fn build_url(url: &str, params: Option<&Value>, serializer: Option<&ParamsSerializer>) -> String {
    let Some(params) = params else {
        return url.to_owned();
    };

    let query = match serializer {
        Some(serializer) => serializer.serialize(params),
        None => serialize_params(params),
    };
    if query.is_empty() {
        return url.to_owned();
    }

    let base = url.split_once('#').map_or(url, |(before, _)| before);
    let separator = if base.contains('?') { '&' } else { '?' };
    format!("{base}{separator}{query}")
}

/// `true` for `scheme://...` and protocol-relative `//...` URLs.
#[must_use]
pub fn is_absolute_url(url: &str) -> bool {
    if url.starts_with("//") {
        return true;
    }
    let Some((scheme, rest)) = url.split_once(':') else {
        return false;
    };
    let mut chars = scheme.chars();
    let valid_scheme = chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
    valid_scheme && rest.starts_with("//")
}

/// Join `base` and `relative` with exactly one `/`.
#[must_use]
pub fn combine_url(base: &str, relative: &str) -> String {
    if relative.is_empty() {
        return base.to_owned();
    }
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        relative.trim_start_matches('/')
    )
}

/// Same scheme, host and port.
#[must_use]
pub fn is_url_same_origin(a: &Uri, b: &Uri) -> bool {
    let host = |u: &Uri| u.host().map(str::to_ascii_lowercase);
    a.scheme() == b.scheme() && host(a) == host(b) && a.port_u16() == b.port_u16()
}
