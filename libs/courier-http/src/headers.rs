//! Header mappings.
//!
//! Request headers are configured as a nested mapping: plain `name: value`
//! entries plus a `common` block and per-method blocks (`get`, `post`, ...).
//! [`flatten_headers`] collapses them into the plain mapping sent on the wire.

use crate::data::Data;
use crate::merge::deep_merge_into;
use http::Method;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Canonical `Content-Type` name used by [`process_headers`].
pub const CONTENT_TYPE: &str = "Content-Type";

/// Content type set for JSON object bodies when none is configured.
pub const JSON_CONTENT_TYPE: &str = "application/json;charset=utf-8";

/// Keys that only carry per-method or shared blocks and never reach the wire.
pub const BOOKKEEPING_KEYS: [&str; 8] = [
    "delete", "options", "get", "head", "post", "put", "patch", "common",
];

/// Header mapping. Values are strings, or nested mappings before flattening.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Headers(Map<String, Value>);

impl Headers {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a header, replacing an existing entry with the exact same name.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.insert(name.into(), Value::String(value.into()));
    }

    /// Set a nested block (`common`, `post`, ...).
    pub fn insert_block(&mut self, name: impl Into<String>, block: Headers) {
        self.0.insert(name.into(), Value::Object(block.0));
    }

    /// Chainable [`insert`](Self::insert).
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(name, value);
        self
    }

    /// Exact-name lookup of a string value.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).and_then(Value::as_str)
    }

    /// Nested block lookup.
    #[must_use]
    pub fn block(&self, name: &str) -> Option<&Map<String, Value>> {
        self.0.get(name).and_then(Value::as_object)
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.0.remove(name)
    }

    /// Remove every entry whose name matches case-insensitively.
    pub fn remove_ignore_case(&mut self, name: &str) {
        self.0.retain(|k, _| !k.eq_ignore_ascii_case(name));
    }

    #[must_use]
    pub fn contains_key(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    /// Flat `(name, value)` pairs; nested blocks are skipped and non-string
    /// scalars are rendered with their JSON text.
    pub fn string_pairs(&self) -> impl Iterator<Item = (&str, String)> {
        self.0.iter().filter_map(|(k, v)| match v {
            Value::String(s) => Some((k.as_str(), s.clone())),
            Value::Object(_) | Value::Null | Value::Array(_) => None,
            Value::Bool(_) | Value::Number(_) => Some((k.as_str(), v.to_string())),
        })
    }

    #[must_use]
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Rename any case variant of `normalized` to exactly `normalized`.
    pub fn normalize_name(&mut self, normalized: &str) {
        let variants: Vec<String> = self
            .0
            .keys()
            .filter(|k| k.as_str() != normalized && k.eq_ignore_ascii_case(normalized))
            .cloned()
            .collect();
        for name in variants {
            if let Some(value) = self.0.remove(&name) {
                self.0.insert(normalized.to_owned(), value);
            }
        }
    }
}

impl From<Map<String, Value>> for Headers {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Headers {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut headers = Headers::new();
        for (k, v) in iter {
            headers.insert(k, v);
        }
        headers
    }
}

/// Normalize `Content-Type` and default it to JSON for object bodies.
pub fn process_headers(headers: &mut Headers, data: Option<&Data>) {
    headers.normalize_name(CONTENT_TYPE);

    if data.is_some_and(Data::is_plain_object) && !headers.contains_key(CONTENT_TYPE) {
        headers.insert(CONTENT_TYPE, JSON_CONTENT_TYPE);
    }
}

/// Collapse `common` and the per-method block into the top-level mapping.
///
/// Precedence, lowest first: `common`, the lower-cased method block, top-level
/// entries. Bookkeeping keys are removed from the result.
#[must_use]
pub fn flatten_headers(headers: &Headers, method: &Method) -> Headers {
    let method_key = method.as_str().to_ascii_lowercase();

    let mut merged = Map::new();
    if let Some(common) = headers.block("common") {
        deep_merge_into(&mut merged, common);
    }
    if let Some(per_method) = headers.block(&method_key) {
        deep_merge_into(&mut merged, per_method);
    }
    deep_merge_into(&mut merged, headers.as_map());

    for key in BOOKKEEPING_KEYS {
        merged.remove(key);
    }
    Headers(merged)
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use serde_json::json;

    fn headers(value: Value) -> Headers {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_process_headers_normalizes_and_defaults_json() {
        let mut h = headers(json!({"conTenT-Type": "text/plain"}));
        process_headers(&mut h, Some(&Data::Json(json!({"a": 1}))));
        assert_eq!(h.get(CONTENT_TYPE), Some("text/plain"));
        assert!(!h.contains_key("conTenT-Type"));

        let mut h = Headers::new();
        process_headers(&mut h, Some(&Data::Json(json!({"a": 1}))));
        assert_eq!(h.get(CONTENT_TYPE), Some(JSON_CONTENT_TYPE));

        let mut h = Headers::new();
        process_headers(&mut h, Some(&Data::Text("x".to_owned())));
        assert!(h.is_empty());
    }

    #[test]
    fn test_flatten_precedence_and_bookkeeping() {
        let h = headers(json!({
            "common": {"Accept": "application/json", "X-Common": "1"},
            "get": {"X-Get": "1", "Accept": "text/html"},
            "post": {"Content-Type": "application/x-www-form-urlencoded"},
            "Accept": "*/*",
        }));

        let flat = flatten_headers(&h, &Method::GET);

        assert_eq!(flat.get("Accept"), Some("*/*"));
        assert_eq!(flat.get("X-Common"), Some("1"));
        assert_eq!(flat.get("X-Get"), Some("1"));
        assert!(flat.get("Content-Type").is_none());
        for key in BOOKKEEPING_KEYS {
            assert!(!flat.contains_key(key), "{key} should be stripped");
        }
    }

    #[test]
    fn test_flatten_uses_lowercase_method_block() {
        let h = headers(json!({"post": {"X-Post": "yes"}}));
        let flat = flatten_headers(&h, &Method::POST);
        assert_eq!(flat.get("X-Post"), Some("yes"));
    }

    #[test]
    fn test_string_pairs_skip_blocks() {
        let h = headers(json!({"A": "1", "B": 2, "common": {"C": "3"}}));
        let pairs: Vec<_> = h.string_pairs().collect();
        assert_eq!(pairs, vec![("A", "1".to_owned()), ("B", "2".to_owned())]);
    }
}
