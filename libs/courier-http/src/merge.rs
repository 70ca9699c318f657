//! Configuration resolution.
//!
//! [`merge_config`] combines instance defaults with a per-call configuration.
//! Each option is resolved with the strategy registered for its name in
//! [`MERGE_STRATEGIES`]; options not listed use [`MergeStrategy::Default`].

use crate::config::{
    BasicCredentials, ParamsSerializer, ProgressHandler, RequestConfig, ResponseType,
    StatusValidator,
};
use crate::data::Data;
use crate::headers::Headers;
use crate::transform::Transformers;
use crate::CancelToken;
use http::Method;
use serde_json::{Map, Value};
use std::time::Duration;

/// How a single option is resolved from base and override.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeStrategy {
    /// Override's value if defined, else base's; nested values are never merged
    OverrideWins,
    /// Nested mappings merge recursively, override's leaves win
    DeepMerge,
    /// Override's value if defined, else base's
    Default,
}

/// Option names with a non-default strategy.
pub const MERGE_STRATEGIES: &[(&str, MergeStrategy)] = &[
    ("url", MergeStrategy::OverrideWins),
    ("params", MergeStrategy::OverrideWins),
    ("data", MergeStrategy::OverrideWins),
    ("headers", MergeStrategy::DeepMerge),
    ("auth", MergeStrategy::DeepMerge),
];

/// Strategy registered for `key`.
#[must_use]
pub fn strategy_for(key: &str) -> MergeStrategy {
    MERGE_STRATEGIES
        .iter()
        .find_map(|(name, strategy)| (*name == key).then_some(*strategy))
        .unwrap_or(MergeStrategy::Default)
}

/// Values that can take part in a deep merge.
///
/// Mapping-shaped values override [`merge_nested`](Mergeable::merge_nested);
/// everything else is replaced outright by the override.
pub trait Mergeable: Clone {
    #[must_use]
    fn merge_nested(&self, over: &Self) -> Self {
        over.clone()
    }
}

macro_rules! replace_on_merge {
    ($($ty:ty),* $(,)?) => {
        $(impl Mergeable for $ty {})*
    };
}

replace_on_merge!(
    String,
    bool,
    Duration,
    Method,
    Data,
    ResponseType,
    Transformers,
    CancelToken,
    ProgressHandler,
    StatusValidator,
    ParamsSerializer,
);

impl Mergeable for Value {
    fn merge_nested(&self, over: &Self) -> Self {
        deep_merge(self, over)
    }
}

impl Mergeable for Headers {
    fn merge_nested(&self, over: &Self) -> Self {
        let mut merged = Map::new();
        deep_merge_into(&mut merged, self.as_map());
        deep_merge_into(&mut merged, over.as_map());
        Headers::from(merged)
    }
}

impl Mergeable for BasicCredentials {
    fn merge_nested(&self, over: &Self) -> Self {
        // Both leaves are always present, so the override wins field by field.
        over.clone()
    }
}

/// Override-wins: the override's value if defined, else the base's.
fn override_wins<T: Clone>(base: Option<&T>, over: Option<&T>) -> Option<T> {
    over.or(base).cloned()
}

/// Deep merge: recursive for mappings; a one-sided value is deep-copied.
fn deep_merge_strategy<T: Mergeable>(base: Option<&T>, over: Option<&T>) -> Option<T> {
    match (base, over) {
        (Some(base), Some(over)) => Some(base.merge_nested(over)),
        (Some(only), None) | (None, Some(only)) => Some(only.clone()),
        (None, None) => None,
    }
}

fn default_strategy<T: Clone>(base: Option<&T>, over: Option<&T>) -> Option<T> {
    if over.is_some() { over.cloned() } else { base.cloned() }
}

fn merge_field<T: Mergeable>(key: &str, base: Option<&T>, over: Option<&T>) -> Option<T> {
    match strategy_for(key) {
        MergeStrategy::OverrideWins => override_wins(base, over),
        MergeStrategy::DeepMerge => deep_merge_strategy(base, over),
        MergeStrategy::Default => default_strategy(base, over),
    }
}

/// Merge `over` into a copy of `base`. Neither input is modified.
#[must_use]
pub fn merge_config(base: &RequestConfig, over: Option<&RequestConfig>) -> RequestConfig {
    let empty = RequestConfig::default();
    let over = over.unwrap_or(&empty);

    macro_rules! field {
        ($name:ident) => {
            merge_field(
                stringify!($name),
                base.$name.as_ref(),
                over.$name.as_ref(),
            )
        };
    }

    // Override keys first, then base-only keys, each visited once.
    let mut extra = std::collections::BTreeMap::new();
    for (key, value) in &over.extra {
        if let Some(v) = merge_field(key, base.extra.get(key), Some(value)) {
            extra.insert(key.clone(), v);
        }
    }
    for (key, value) in &base.extra {
        if !over.extra.contains_key(key)
            && let Some(v) = merge_field(key, Some(value), None)
        {
            extra.insert(key.clone(), v);
        }
    }

    RequestConfig {
        url: field!(url),
        method: field!(method),
        data: field!(data),
        params: field!(params),
        headers: field!(headers),
        response_type: field!(response_type),
        timeout: field!(timeout),
        transform_request: field!(transform_request),
        transform_response: field!(transform_response),
        cancel_token: field!(cancel_token),
        with_credentials: field!(with_credentials),
        xsrf_cookie_name: field!(xsrf_cookie_name),
        xsrf_header_name: field!(xsrf_header_name),
        on_download_progress: field!(on_download_progress),
        on_upload_progress: field!(on_upload_progress),
        auth: field!(auth),
        validate_status: field!(validate_status),
        params_serializer: field!(params_serializer),
        base_url: field!(base_url),
        extra,
    }
}

/// Recursively merge `source` into `target`; `source` wins at every leaf.
pub fn deep_merge_into(target: &mut Map<String, Value>, source: &Map<String, Value>) {
    for (key, value) in source {
        match (target.get_mut(key), value) {
            (Some(Value::Object(existing)), Value::Object(incoming)) => {
                deep_merge_into(existing, incoming);
            }
            _ => {
                target.insert(key.clone(), value.clone());
            }
        }
    }
}

/// Deep merge of two JSON values. Non-object overrides replace the base.
#[must_use]
pub fn deep_merge(base: &Value, over: &Value) -> Value {
    match (base, over) {
        (Value::Object(base), Value::Object(over)) => {
            let mut merged = base.clone();
            deep_merge_into(&mut merged, over);
            Value::Object(merged)
        }
        _ => over.clone(),
    }
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
    fn test_strategy_table() {
        assert_eq!(strategy_for("url"), MergeStrategy::OverrideWins);
        assert_eq!(strategy_for("params"), MergeStrategy::OverrideWins);
        assert_eq!(strategy_for("data"), MergeStrategy::OverrideWins);
        assert_eq!(strategy_for("headers"), MergeStrategy::DeepMerge);
        assert_eq!(strategy_for("auth"), MergeStrategy::DeepMerge);
        assert_eq!(strategy_for("timeout"), MergeStrategy::Default);
        assert_eq!(strategy_for("anything-else"), MergeStrategy::Default);
    }

    #[test]
    fn test_merge_without_override_copies_base() {
        let base = RequestConfig {
            url: Some("/a".to_owned()),
            timeout: Some(Duration::from_secs(1)),
            ..Default::default()
        };

        let merged = merge_config(&base, None);
        assert_eq!(merged.url.as_deref(), Some("/a"));
        assert_eq!(merged.timeout, Some(Duration::from_secs(1)));
    }

    #[test]
    fn test_override_wins_even_when_empty() {
        let base = RequestConfig {
            url: Some("/base".to_owned()),
            ..Default::default()
        };
        let over = RequestConfig {
            url: Some(String::new()),
            ..Default::default()
        };

        let merged = merge_config(&base, Some(&over));
        assert_eq!(merged.url.as_deref(), Some(""));
    }

    #[test]
    fn test_override_wins_falls_back_to_base_when_absent() {
        let base = RequestConfig {
            url: Some("/base".to_owned()),
            params: Some(json!({"a": 1})),
            ..Default::default()
        };
        let merged = merge_config(&base, Some(&RequestConfig::default()));
        assert_eq!(merged.url.as_deref(), Some("/base"));
        assert_eq!(merged.params, Some(json!({"a": 1})));
    }

    #[test]
    fn test_params_are_not_merged_nested() {
        let base = RequestConfig {
            params: Some(json!({"a": 1, "b": 2})),
            ..Default::default()
        };
        let over = RequestConfig {
            params: Some(json!({"c": 3})),
            ..Default::default()
        };
        let merged = merge_config(&base, Some(&over));
        assert_eq!(merged.params, Some(json!({"c": 3})));
    }

    #[test]
    fn test_headers_deep_merge_override_leaves_win() {
        let base = RequestConfig {
            headers: Some(headers(json!({
                "common": {"Accept": "application/json", "X-A": "1"},
                "X-Top": "base",
            }))),
            ..Default::default()
        };
        let over = RequestConfig {
            headers: Some(headers(json!({
                "common": {"Accept": "text/plain"},
                "X-New": "yes",
            }))),
            ..Default::default()
        };

        let merged = merge_config(&base, Some(&over));
        let h = merged.headers.unwrap();
        assert_eq!(h.block("common").unwrap()["Accept"], json!("text/plain"));
        assert_eq!(h.block("common").unwrap()["X-A"], json!("1"));
        assert_eq!(h.get("X-Top"), Some("base"));
        assert_eq!(h.get("X-New"), Some("yes"));
    }

    #[test]
    fn test_merge_does_not_mutate_inputs() {
        let base = RequestConfig {
            headers: Some(headers(json!({"common": {"A": "1"}}))),
            extra: [("k".to_owned(), json!({"x": 1}))].into(),
            ..Default::default()
        };
        let over = RequestConfig {
            headers: Some(headers(json!({"common": {"B": "2"}}))),
            extra: [("k".to_owned(), json!({"y": 2}))].into(),
            ..Default::default()
        };
        let base_before = base.headers.clone();
        let over_before = over.headers.clone();

        let mut merged = merge_config(&base, Some(&over));
        merged
            .headers
            .as_mut()
            .unwrap()
            .insert("Mutated", "after-merge");

        assert_eq!(base.headers, base_before);
        assert_eq!(over.headers, over_before);
        assert_eq!(base.extra["k"], json!({"x": 1}));
        assert_eq!(over.extra["k"], json!({"y": 2}));
    }

    #[test]
    fn test_one_sided_deep_merge_is_a_copy() {
        let base = RequestConfig {
            headers: Some(headers(json!({"A": "1"}))),
            ..Default::default()
        };
        let mut merged = merge_config(&base, None);
        merged.headers.as_mut().unwrap().insert("A", "changed");
        assert_eq!(base.headers.unwrap().get("A"), Some("1"));
    }

    #[test]
    fn test_auth_override() {
        let base = RequestConfig {
            auth: Some(BasicCredentials::new("a", "1")),
            ..Default::default()
        };
        let over = RequestConfig {
            auth: Some(BasicCredentials::new("b", "2")),
            ..Default::default()
        };
        assert_eq!(
            merge_config(&base, Some(&over)).auth,
            Some(BasicCredentials::new("b", "2"))
        );
        assert_eq!(
            merge_config(&base, None).auth,
            Some(BasicCredentials::new("a", "1"))
        );
    }

    #[test]
    fn test_extra_keys_use_default_strategy() {
        let base = RequestConfig {
            extra: [
                ("only_base".to_owned(), json!(1)),
                ("both".to_owned(), json!({"x": 1})),
            ]
            .into(),
            ..Default::default()
        };
        let over = RequestConfig {
            extra: [("both".to_owned(), json!({"y": 2}))].into(),
            ..Default::default()
        };

        let merged = merge_config(&base, Some(&over));
        assert_eq!(merged.extra["only_base"], json!(1));
        assert_eq!(merged.extra["both"], json!({"y": 2}));
    }

    #[test]
    fn test_deep_merge_values() {
        let a = json!({"a": {"b": 1, "c": 2}, "d": 1});
        let b = json!({"a": {"b": 9}, "d": {"e": 1}});
        assert_eq!(
            deep_merge(&a, &b),
            json!({"a": {"b": 9, "c": 2}, "d": {"e": 1}})
        );
        assert_eq!(deep_merge(&a, &json!("scalar")), json!("scalar"));
    }
}
