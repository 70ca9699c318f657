use crate::config::RequestConfig;
use crate::data::Data;
use crate::error::HttpError;
use crate::headers::Headers;
use crate::transport::RequestHandle;
use http::StatusCode;
use serde::de::DeserializeOwned;

/// A settled response.
///
/// Immutable once built: the response transforms produce a new value through
/// [`with_data`](Self::with_data) rather than editing in place.
///
/// ```ignore
/// let resp = client.get("/users/1", None).await?;
/// assert_eq!(resp.status(), StatusCode::OK);
/// let user: User = resp.json()?;
/// ```
#[derive(Debug, Clone)]
pub struct HttpResponse {
    data: Option<Data>,
    status: StatusCode,
    status_text: String,
    headers: Headers,
    config: RequestConfig,
    request: Option<RequestHandle>,
}

impl HttpResponse {
    /// Response with the given status and no body. `status_text` defaults to
    /// the canonical reason phrase.
    #[must_use]
    pub fn new(status: StatusCode, config: RequestConfig) -> Self {
        Self {
            data: None,
            status,
            status_text: status.canonical_reason().unwrap_or_default().to_owned(),
            headers: Headers::new(),
            config,
            request: None,
        }
    }

    #[must_use]
    pub fn with_data(mut self, data: Option<Data>) -> Self {
        self.data = data;
        self
    }

    #[must_use]
    pub fn with_headers(mut self, headers: Headers) -> Self {
        self.headers = headers;
        self
    }

    #[must_use]
    pub fn with_status_text(mut self, status_text: impl Into<String>) -> Self {
        self.status_text = status_text.into();
        self
    }

    #[must_use]
    pub fn with_request(mut self, request: RequestHandle) -> Self {
        self.request = Some(request);
        self
    }

    #[must_use]
    pub fn data(&self) -> Option<&Data> {
        self.data.as_ref()
    }

    /// Take the body out, leaving the rest of the response intact.
    #[must_use]
    pub fn into_parts(self) -> (Option<Data>, Self) {
        let mut rest = self;
        let data = rest.data.take();
        (data, rest)
    }

    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.status
    }

    #[must_use]
    pub fn status_text(&self) -> &str {
        &self.status_text
    }

    /// Response headers, keys lower-cased.
    #[must_use]
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// The configuration the request was sent with.
    #[must_use]
    pub fn config(&self) -> &RequestConfig {
        &self.config
    }

    #[must_use]
    pub fn request(&self) -> Option<&RequestHandle> {
        self.request.as_ref()
    }

    /// Deserialize the body into `T`.
    ///
    /// # Errors
    ///
    /// Returns an [`ErrorKind::Body`](crate::ErrorKind::Body) error when the
    /// body is absent or does not deserialize.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, HttpError> {
        match &self.data {
            Some(data) => Ok(data.deserialize()?),
            None => Err(HttpError::body("Response has no body")),
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::ErrorKind;
    use serde_json::json;

    #[test]
    fn test_new_uses_canonical_reason() {
        let resp = HttpResponse::new(StatusCode::NOT_FOUND, RequestConfig::default());
        assert_eq!(resp.status_text(), "Not Found");
        assert!(resp.data().is_none());
        assert!(resp.request().is_none());
    }

    #[test]
    fn test_json_deserializes_body() {
        #[derive(Debug, serde::Deserialize)]
        struct Outcome {
            ok: bool,
        }

        let resp = HttpResponse::new(StatusCode::OK, RequestConfig::default())
            .with_data(Some(Data::Json(json!({"ok": true}))));
        assert!(resp.json::<Outcome>().unwrap().ok);

        let empty = HttpResponse::new(StatusCode::NO_CONTENT, RequestConfig::default());
        assert_eq!(empty.json::<Outcome>().unwrap_err().kind(), ErrorKind::Body);
    }

    #[test]
    fn test_into_parts_keeps_metadata() {
        let resp = HttpResponse::new(StatusCode::CREATED, RequestConfig::default())
            .with_data(Some(Data::from("x")))
            .with_headers(Headers::new().with("etag", "1"));

        let (data, rest) = resp.into_parts();
        assert_eq!(data, Some(Data::from("x")));
        assert!(rest.data().is_none());
        assert_eq!(rest.status(), StatusCode::CREATED);
        assert_eq!(rest.headers().get("etag"), Some("1"));
    }
}
