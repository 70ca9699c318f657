use crate::cancel::CancelToken;
use crate::data::Data;
use crate::headers::Headers;
use crate::transform::{Transformers, default_request_transform, default_response_transform};
use http::{Method, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Default User-Agent string for HTTP requests
pub const DEFAULT_USER_AGENT: &str = concat!("courier-http/", env!("CARGO_PKG_VERSION"));

/// Default maximum response body size (10 MB)
pub const DEFAULT_MAX_BODY_SIZE: usize = 10 * 1024 * 1024;

/// Default `Accept` header sent with every method
pub const DEFAULT_ACCEPT: &str = "application/json, text/plain, */*";

/// Default `Content-Type` for methods that carry a body
pub const DEFAULT_FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

pub const DEFAULT_XSRF_COOKIE_NAME: &str = "XSRF-TOKEN";
pub const DEFAULT_XSRF_HEADER_NAME: &str = "X-XSRF-TOKEN";

/// How the transport decodes the response body
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseType {
    /// Lossy UTF-8 text
    #[default]
    Text,
    /// Parsed JSON; `null` when the body does not parse
    Json,
    /// Raw bytes
    Bytes,
}

/// Credentials for HTTP Basic authentication
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BasicCredentials {
    pub username: String,
    pub password: String,
}

impl BasicCredentials {
    #[must_use]
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

/// Progress snapshot passed to upload/download observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressEvent {
    /// Bytes transferred so far
    pub loaded: u64,
    /// Total size when known up front
    pub total: Option<u64>,
}

/// Upload or download progress observer.
#[derive(Clone)]
pub struct ProgressHandler(Arc<dyn Fn(ProgressEvent) + Send + Sync>);

impl ProgressHandler {
    #[must_use]
    pub fn new(f: impl Fn(ProgressEvent) + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    pub fn notify(&self, event: ProgressEvent) {
        (self.0)(event);
    }
}

impl fmt::Debug for ProgressHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ProgressHandler(..)")
    }
}

/// Decides which response statuses resolve the request.
#[derive(Clone)]
pub struct StatusValidator(Arc<dyn Fn(StatusCode) -> bool + Send + Sync>);

impl StatusValidator {
    #[must_use]
    pub fn new(f: impl Fn(StatusCode) -> bool + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    /// Accepts `200..300`.
    #[must_use]
    pub fn success_range() -> Self {
        Self::new(|status| status.is_success())
    }

    #[must_use]
    pub fn accepts(&self, status: StatusCode) -> bool {
        (self.0)(status)
    }
}

impl fmt::Debug for StatusValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("StatusValidator(..)")
    }
}

/// Custom query-string serializer for `params`.
#[derive(Clone)]
pub struct ParamsSerializer(Arc<dyn Fn(&Value) -> String + Send + Sync>);

impl ParamsSerializer {
    #[must_use]
    pub fn new(f: impl Fn(&Value) -> String + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    #[must_use]
    pub fn serialize(&self, params: &Value) -> String {
        (self.0)(params)
    }
}

impl fmt::Debug for ParamsSerializer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ParamsSerializer(..)")
    }
}

/// Options governing one request.
///
/// Every option is optional; unset options fall back to the client defaults
/// during [`merge_config`](crate::merge_config). Options unknown to the
/// library travel in `extra` and are merged like any other option.
#[derive(Debug, Clone, Default)]
pub struct RequestConfig {
    pub url: Option<String>,
    pub method: Option<Method>,
    pub data: Option<Data>,
    /// Query parameters, usually a JSON object
    pub params: Option<Value>,
    pub headers: Option<Headers>,
    /// `Duration::ZERO` disables the timeout
    pub timeout: Option<Duration>,
    pub response_type: Option<ResponseType>,
    pub transform_request: Option<Transformers>,
    pub transform_response: Option<Transformers>,
    pub cancel_token: Option<CancelToken>,
    pub with_credentials: Option<bool>,
    pub xsrf_cookie_name: Option<String>,
    pub xsrf_header_name: Option<String>,
    pub on_download_progress: Option<ProgressHandler>,
    pub on_upload_progress: Option<ProgressHandler>,
    pub auth: Option<BasicCredentials>,
    /// Absent means every status resolves
    pub validate_status: Option<StatusValidator>,
    pub params_serializer: Option<ParamsSerializer>,
    pub base_url: Option<String>,
    pub extra: BTreeMap<String, Value>,
}

impl RequestConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Library defaults every client starts from.
    ///
    /// `GET`, no timeout, JSON-friendly `Accept`, form content type for
    /// `post`/`put`/`patch`, `XSRF-TOKEN`/`X-XSRF-TOKEN`, `2xx` validation and
    /// the default request/response transforms.
    #[must_use]
    pub fn defaults() -> Self {
        let mut headers = Headers::new();
        headers.insert_block("common", Headers::new().with("Accept", DEFAULT_ACCEPT));
        for method in ["delete", "get", "head"] {
            headers.insert_block(method, Headers::new());
        }
        for method in ["post", "put", "patch"] {
            headers.insert_block(
                method,
                Headers::new().with(crate::headers::CONTENT_TYPE, DEFAULT_FORM_CONTENT_TYPE),
            );
        }

        Self {
            method: Some(Method::GET),
            timeout: Some(Duration::ZERO),
            headers: Some(headers),
            xsrf_cookie_name: Some(DEFAULT_XSRF_COOKIE_NAME.to_owned()),
            xsrf_header_name: Some(DEFAULT_XSRF_HEADER_NAME.to_owned()),
            validate_status: Some(StatusValidator::success_range()),
            transform_request: Some(Transformers::from(default_request_transform())),
            transform_response: Some(Transformers::from(default_response_transform())),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    #[must_use]
    pub fn with_method(mut self, method: Method) -> Self {
        self.method = Some(method);
        self
    }

    #[must_use]
    pub fn with_data(mut self, data: impl Into<Data>) -> Self {
        self.data = Some(data.into());
        self
    }

    #[must_use]
    pub fn with_params(mut self, params: Value) -> Self {
        self.params = Some(params);
        self
    }

    /// Add a top-level header, creating the mapping if needed.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers
            .get_or_insert_with(Headers::new)
            .insert(name, value);
        self
    }

    #[must_use]
    pub fn with_headers(mut self, headers: Headers) -> Self {
        self.headers = Some(headers);
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn with_response_type(mut self, response_type: ResponseType) -> Self {
        self.response_type = Some(response_type);
        self
    }

    #[must_use]
    pub fn with_transform_request(mut self, transforms: impl Into<Transformers>) -> Self {
        self.transform_request = Some(transforms.into());
        self
    }

    #[must_use]
    pub fn with_transform_response(mut self, transforms: impl Into<Transformers>) -> Self {
        self.transform_response = Some(transforms.into());
        self
    }

    #[must_use]
    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel_token = Some(token);
        self
    }

    #[must_use]
    pub fn with_credentials(mut self, enabled: bool) -> Self {
        self.with_credentials = Some(enabled);
        self
    }

    #[must_use]
    pub fn with_auth(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.auth = Some(BasicCredentials::new(username, password));
        self
    }

    #[must_use]
    pub fn with_validate_status(
        mut self,
        validator: impl Fn(StatusCode) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.validate_status = Some(StatusValidator::new(validator));
        self
    }

    #[must_use]
    pub fn with_params_serializer(
        mut self,
        serializer: impl Fn(&Value) -> String + Send + Sync + 'static,
    ) -> Self {
        self.params_serializer = Some(ParamsSerializer::new(serializer));
        self
    }

    #[must_use]
    pub fn with_download_progress(
        mut self,
        observer: impl Fn(ProgressEvent) + Send + Sync + 'static,
    ) -> Self {
        self.on_download_progress = Some(ProgressHandler::new(observer));
        self
    }

    #[must_use]
    pub fn with_upload_progress(
        mut self,
        observer: impl Fn(ProgressEvent) + Send + Sync + 'static,
    ) -> Self {
        self.on_upload_progress = Some(ProgressHandler::new(observer));
        self
    }

    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    #[must_use]
    pub fn with_extra(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }
}

/// TLS root certificate configuration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[non_exhaustive]
pub enum TlsRootConfig {
    /// Use Mozilla's root certificates (webpki-roots, no OS dependency)
    #[default]
    WebPki,
    /// Use OS native root certificate store
    Native,
}

/// Transport security configuration
///
/// Controls whether the transport enforces TLS or allows insecure HTTP.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[non_exhaustive]
pub enum TransportSecurity {
    /// Require TLS for all connections (HTTPS only) - default and recommended
    #[default]
    TlsOnly,
    /// Allow insecure HTTP connections (for testing with mock servers only)
    ///
    /// **WARNING**: Never use in production as it exposes traffic to interception.
    AllowInsecureHttp,
}

/// Externally loaded client settings.
///
/// Deserialized from any figment provider; every field has a default so a
/// partial YAML file or a handful of environment variables is enough.
///
/// ```ignore
/// use figment::{Figment, providers::{Env, Format, Yaml}};
///
/// let settings = ClientSettings::from_figment(
///     Figment::new()
///         .merge(Yaml::file("courier.yaml"))
///         .merge(Env::prefixed("COURIER__").split("__")),
/// )?;
/// let client = HttpClient::builder().with_settings(&settings).build()?;
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientSettings {
    /// Prefix for relative request URLs
    pub base_url: Option<String>,
    /// Request timeout in milliseconds, `0` for none
    pub timeout_ms: u64,
    /// Headers added to every request
    pub headers: BTreeMap<String, String>,
    pub with_credentials: bool,
    pub xsrf_cookie_name: String,
    pub xsrf_header_name: String,
    pub user_agent: String,
    pub max_body_size: usize,
    /// Permit `http://` URLs (local testing only)
    pub allow_insecure_http: bool,
    pub tls_roots: TlsRootConfig,
    /// Origin used for same-origin XSRF checks, e.g. `https://app.example.com`
    pub origin: Option<String>,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout_ms: 0,
            headers: BTreeMap::new(),
            with_credentials: false,
            xsrf_cookie_name: DEFAULT_XSRF_COOKIE_NAME.to_owned(),
            xsrf_header_name: DEFAULT_XSRF_HEADER_NAME.to_owned(),
            user_agent: DEFAULT_USER_AGENT.to_owned(),
            max_body_size: DEFAULT_MAX_BODY_SIZE,
            allow_insecure_http: false,
            tls_roots: TlsRootConfig::default(),
            origin: None,
        }
    }
}

impl ClientSettings {
    /// Extract settings from a figment.
    ///
    /// # Errors
    ///
    /// Returns `figment::Error` when a provider fails or a value has the wrong type.
    pub fn from_figment(figment: figment::Figment) -> Result<Self, figment::Error> {
        let defaults = figment::providers::Serialized::defaults(Self::default());
        figment::Figment::from(defaults).merge(figment).extract()
    }

    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Request options these settings contribute to the client defaults.
    #[must_use]
    pub fn to_request_config(&self) -> RequestConfig {
        let headers = (!self.headers.is_empty()).then(|| {
            self.headers
                .iter()
                .map(|(k, v)| (k.as_str(), v.as_str()))
                .collect::<Headers>()
        });

        RequestConfig {
            base_url: self.base_url.clone(),
            timeout: Some(self.timeout()),
            headers,
            with_credentials: Some(self.with_credentials),
            xsrf_cookie_name: Some(self.xsrf_cookie_name.clone()),
            xsrf_header_name: Some(self.xsrf_header_name.clone()),
            ..Default::default()
        }
    }
}
