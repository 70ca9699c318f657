//! Body transform pipeline.

use crate::data::Data;
use crate::error::{BoxError, HttpError};
use crate::headers::{Headers, process_headers};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

type TransformFn = dyn Fn(Option<Data>, &mut Headers) -> Result<Option<Data>, BoxError> + Send + Sync;

/// A single body transform.
///
/// Receives the current body and the request or response headers, and returns
/// the new body. Headers may be edited in place.
#[derive(Clone)]
pub struct Transformer(Arc<TransformFn>);

impl Transformer {
    #[must_use]
    pub fn new(
        f: impl Fn(Option<Data>, &mut Headers) -> Result<Option<Data>, BoxError>
        + Send
        + Sync
        + 'static,
    ) -> Self {
        Self(Arc::new(f))
    }

    /// # Errors
    ///
    /// Returns whatever the wrapped function returns.
    pub fn apply(&self, data: Option<Data>, headers: &mut Headers) -> Result<Option<Data>, BoxError> {
        (self.0)(data, headers)
    }
}

impl fmt::Debug for Transformer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Transformer(..)")
    }
}

/// Ordered list of transforms, applied left to right.
#[derive(Debug, Clone, Default)]
pub struct Transformers(Vec<Transformer>);

impl Transformers {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a transform after the existing ones.
    #[must_use]
    pub fn then(mut self, transformer: Transformer) -> Self {
        self.0.push(transformer);
        self
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Transformer> for Transformers {
    fn from(transformer: Transformer) -> Self {
        Self(vec![transformer])
    }
}

impl From<Vec<Transformer>> for Transformers {
    fn from(transformers: Vec<Transformer>) -> Self {
        Self(transformers)
    }
}

/// Run `data` through `fns`. Absent `fns` is the identity.
///
/// # Errors
///
/// The first failing transform stops the pipeline; its error is wrapped as
/// [`ErrorKind::Transform`](crate::ErrorKind::Transform) with the original
/// error as source.
pub fn transform(
    data: Option<Data>,
    headers: &mut Headers,
    fns: Option<&Transformers>,
) -> Result<Option<Data>, HttpError> {
    let Some(fns) = fns else {
        return Ok(data);
    };

    fns.0.iter().try_fold(data, |data, f| {
        f.apply(data, headers).map_err(HttpError::transform)
    })
}

/// Normalizes `Content-Type` and serializes JSON object bodies to text.
#[must_use]
pub fn default_request_transform() -> Transformer {
    Transformer::new(|data, headers| {
        process_headers(headers, data.as_ref());
        match data {
            Some(Data::Json(value @ Value::Object(_))) => {
                Ok(Some(Data::Text(serde_json::to_string(&value)?)))
            }
            other => Ok(other),
        }
    })
}

/// Parses text bodies that hold JSON; anything else passes through.
#[must_use]
pub fn default_response_transform() -> Transformer {
    Transformer::new(|data, _headers| match data {
        Some(Data::Text(text)) => match serde_json::from_str::<Value>(&text) {
            Ok(value) => Ok(Some(Data::Json(value))),
            Err(_) => Ok(Some(Data::Text(text))),
        },
        other => Ok(other),
    })
}
