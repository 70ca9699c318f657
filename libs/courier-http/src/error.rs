use crate::cancel::Cancel;
use crate::config::RequestConfig;
use crate::response::HttpResponse;
use crate::transport::RequestHandle;
use thiserror::Error;

/// Boxed error used for caller-supplied callbacks and wrapped transport failures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Code attached to network failures (connection refused, reset, DNS, ...).
pub const NETWORK_ERROR_CODE: &str = "ECONNABORTED";

/// Classification of request failures.
///
/// Lets callers tell the failure modes apart without parsing messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorKind {
    /// The request was cancelled through its [`CancelToken`](crate::CancelToken)
    Cancelled,
    /// Network-level failure, no response available
    Network,
    /// The configured timeout elapsed, no response available
    Timeout,
    /// The server answered with a status rejected by `validate_status`
    Status,
    /// A caller-supplied transform function failed
    Transform,
    /// The request could not be built (URL, scheme, header)
    InvalidRequest,
    /// The body could not be encoded or read
    Body,
    /// TLS setup failed while building the transport
    Tls,
}

/// Error returned by every request operation.
///
/// Carries the triggering configuration, the request handle when the request
/// actually went out, and the response when the server answered.
///
/// # Example
///
/// ```ignore
/// match client.get("/users", None).await {
///     Ok(resp) => println!("{}", resp.status()),
///     Err(e) if courier_http::is_cancel(&e) => println!("cancelled: {e}"),
///     Err(e) => match e.response() {
///         Some(resp) => println!("server said {}", resp.status()),
///         None => println!("no response: {e}"),
///     },
/// }
/// ```
#[derive(Error, Debug)]
#[error("{message}")]
pub struct HttpError {
    kind: ErrorKind,
    message: String,
    code: Option<String>,
    config: Option<Box<RequestConfig>>,
    request: Option<RequestHandle>,
    response: Option<Box<HttpResponse>>,
    cancel: Option<Cancel>,
    is_courier_error: bool,
    #[source]
    source: Option<BoxError>,
}

impl HttpError {
    fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            code: None,
            config: None,
            request: None,
            response: None,
            cancel: None,
            is_courier_error: true,
            source: None,
        }
    }

    /// Cancellation failure carrying the token's reason.
    #[must_use]
    pub fn cancelled(reason: Cancel) -> Self {
        let message = reason.message().unwrap_or("Request cancelled").to_owned();
        let mut err = Self::new(ErrorKind::Cancelled, message);
        err.cancel = Some(reason);
        err
    }

    /// `Network Error` with the library connection-abort code.
    #[must_use]
    pub fn network(source: impl Into<BoxError>) -> Self {
        let mut err = Self::new(ErrorKind::Network, "Network Error");
        err.code = Some(NETWORK_ERROR_CODE.to_owned());
        err.source = Some(source.into());
        err
    }

    /// `Timeout of N ms exceeded`, no code.
    #[must_use]
    pub fn timeout(timeout: std::time::Duration) -> Self {
        Self::new(
            ErrorKind::Timeout,
            format!("Timeout of {} ms exceeded", timeout.as_millis()),
        )
    }

    /// Status rejected by the validator. The response is embedded.
    #[must_use]
    pub fn status(response: HttpResponse) -> Self {
        let mut err = Self::new(
            ErrorKind::Status,
            format!(
                "Request failed with status code {}",
                response.status().as_u16()
            ),
        );
        err.config = Some(Box::new(response.config().clone()));
        err.request = response.request().cloned();
        err.response = Some(Box::new(response));
        err
    }

    /// Failure raised by a caller-supplied transform.
    ///
    /// The original error stays reachable through `source()`; the error is not
    /// flagged as originating from this library.
    #[must_use]
    pub fn transform(source: BoxError) -> Self {
        let mut err = Self::new(ErrorKind::Transform, source.to_string());
        err.is_courier_error = false;
        err.source = Some(source);
        err
    }

    /// Request could not be built.
    #[must_use]
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidRequest, message)
    }

    /// Body encode/decode failure or size limit.
    #[must_use]
    pub fn body(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Body, message)
    }

    /// TLS configuration failure.
    #[must_use]
    pub fn tls(source: impl Into<BoxError>) -> Self {
        let source = source.into();
        let mut err = Self::new(ErrorKind::Tls, format!("TLS configuration failed: {source}"));
        err.source = Some(source);
        err
    }

    /// Attach the configuration that triggered this error.
    #[must_use]
    pub fn with_config(mut self, config: RequestConfig) -> Self {
        self.config = Some(Box::new(config));
        self
    }

    /// Attach the transport request handle.
    #[must_use]
    pub fn with_request(mut self, request: RequestHandle) -> Self {
        self.request = Some(request);
        self
    }

    /// Replace the embedded response.
    #[must_use]
    pub fn with_response(mut self, response: HttpResponse) -> Self {
        self.response = Some(Box::new(response));
        self
    }

    /// Attach an underlying cause.
    #[must_use]
    pub fn with_source(mut self, source: impl Into<BoxError>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Detach the embedded response, leaving the error without one.
    pub fn take_response(&mut self) -> Option<HttpResponse> {
        self.response.take().map(|r| *r)
    }

    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Machine-readable code, e.g. [`NETWORK_ERROR_CODE`].
    #[must_use]
    pub fn code(&self) -> Option<&str> {
        self.code.as_deref()
    }

    #[must_use]
    pub fn config(&self) -> Option<&RequestConfig> {
        self.config.as_deref()
    }

    /// Handle of the request that was sent, if any.
    #[must_use]
    pub fn request(&self) -> Option<&RequestHandle> {
        self.request.as_ref()
    }

    /// Response that triggered the failure, if the server answered.
    #[must_use]
    pub fn response(&self) -> Option<&HttpResponse> {
        self.response.as_deref()
    }

    /// Cancellation reason for [`ErrorKind::Cancelled`] errors.
    #[must_use]
    pub fn cancel_reason(&self) -> Option<&Cancel> {
        self.cancel.as_ref()
    }

    /// `true` when the error was produced by this library rather than passed
    /// through from a caller-supplied transform.
    #[must_use]
    pub fn is_courier_error(&self) -> bool {
        self.is_courier_error
    }
}

impl From<http::Error> for HttpError {
    fn from(err: http::Error) -> Self {
        HttpError::invalid_request(format!("Failed to build request: {err}")).with_source(err)
    }
}

impl From<http::header::InvalidHeaderName> for HttpError {
    fn from(err: http::header::InvalidHeaderName) -> Self {
        HttpError::invalid_request(format!("Invalid header name: {err}")).with_source(err)
    }
}

impl From<http::header::InvalidHeaderValue> for HttpError {
    fn from(err: http::header::InvalidHeaderValue) -> Self {
        HttpError::invalid_request(format!("Invalid header value: {err}")).with_source(err)
    }
}

impl From<serde_json::Error> for HttpError {
    fn from(err: serde_json::Error) -> Self {
        HttpError::body(format!("JSON processing failed: {err}")).with_source(err)
    }
}

/// Returns `true` when `err` is a cancellation.
#[must_use]
pub fn is_cancel(err: &HttpError) -> bool {
    err.kind == ErrorKind::Cancelled
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use std::error::Error;
    use std::fmt;
    use std::time::Duration;

    #[derive(Debug)]
    struct TestError(&'static str);

    impl fmt::Display for TestError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "{}", self.0)
        }
    }

    impl Error for TestError {}

    #[test]
    fn test_network_error_preserves_source() {
        let err = HttpError::network(TestError("connection refused"));

        assert_eq!(err.kind(), ErrorKind::Network);
        assert_eq!(err.to_string(), "Network Error");
        assert_eq!(err.code(), Some(NETWORK_ERROR_CODE));
        assert!(err.response().is_none());

        let source = err.source().unwrap();
        let downcast = source.downcast_ref::<TestError>();
        assert_eq!(downcast.unwrap().0, "connection refused");
    }

    #[test]
    fn test_timeout_message_has_duration_and_no_code() {
        let err = HttpError::timeout(Duration::from_millis(2000));
        assert_eq!(err.kind(), ErrorKind::Timeout);
        assert_eq!(err.to_string(), "Timeout of 2000 ms exceeded");
        assert!(err.code().is_none());
        assert!(err.response().is_none());
    }

    #[test]
    fn test_transform_error_is_not_reclassified() {
        let err = HttpError::transform(Box::new(TestError("bad payload")));

        assert_eq!(err.kind(), ErrorKind::Transform);
        assert_eq!(err.to_string(), "bad payload");
        assert!(!err.is_courier_error());
        assert!(err.source().unwrap().downcast_ref::<TestError>().is_some());
    }

    #[test]
    fn test_cancelled_carries_reason() {
        let err = HttpError::cancelled(Cancel::new(Some("user aborted".to_owned())));
        assert!(is_cancel(&err));
        assert_eq!(err.to_string(), "user aborted");
        assert_eq!(
            err.cancel_reason().and_then(Cancel::message),
            Some("user aborted")
        );
    }

    #[test]
    fn test_error_chain_traversal() {
        let err = HttpError::network(TestError("root cause"));

        let mut count = 0;
        let mut current: Option<&(dyn Error + 'static)> = Some(&err);
        while let Some(e) = current {
            count += 1;
            current = e.source();
        }

        assert_eq!(count, 2, "Should have 2 errors in chain: HttpError and TestError");
    }
}
