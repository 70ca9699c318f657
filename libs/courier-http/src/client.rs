use crate::builder::HttpClientBuilder;
use crate::config::RequestConfig;
use crate::data::Data;
use crate::dispatch::{dispatch_request, transform_url};
use crate::error::HttpError;
use crate::interceptor::Interceptors;
use crate::merge::merge_config;
use crate::response::HttpResponse;
use crate::transport::Transport;
use http::Method;
use std::fmt;
use std::sync::Arc;

struct ClientInner {
    defaults: RequestConfig,
    interceptors: Interceptors,
    transport: Arc<dyn Transport>,
}

/// HTTP client driving the interceptor chain and the dispatcher.
///
/// Every call runs `[request interceptors..., dispatch, response
/// interceptors...]` as one sequential computation over a `Result`.
///
/// # Thread Safety
///
/// `HttpClient` is `Clone + Send + Sync`; clones share the defaults, the
/// interceptor registries and the transport.
///
/// # Example
///
/// ```ignore
/// let client = HttpClient::builder()
///     .base_url("https://api.example.com")
///     .timeout(Duration::from_secs(10))
///     .build()?;
///
/// client.interceptors().request.register(|config: RequestConfig| async move {
///     Ok(config.with_header("X-Request-Source", "docs"))
/// });
///
/// let resp = client.get("/users/1", None).await?;
/// ```
#[derive(Clone)]
pub struct HttpClient {
    inner: Arc<ClientInner>,
}

impl fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpClient")
            .field("defaults", &self.inner.defaults)
            .field("interceptors", &self.inner.interceptors)
            .finish_non_exhaustive()
    }
}

impl HttpClient {
    /// Client with the library defaults and the built-in transport.
    ///
    /// # Errors
    ///
    /// Returns an error if TLS initialization fails.
    pub fn new() -> Result<Self, HttpError> {
        HttpClientBuilder::new().build()
    }

    #[must_use]
    pub fn builder() -> HttpClientBuilder {
        HttpClientBuilder::new()
    }

    /// Client whose defaults are `config` merged over the library defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if TLS initialization fails.
    pub fn create(config: &RequestConfig) -> Result<Self, HttpError> {
        HttpClientBuilder::new().defaults(config).build()
    }

    pub(crate) fn from_parts(defaults: RequestConfig, transport: Arc<dyn Transport>) -> Self {
        Self {
            inner: Arc::new(ClientInner {
                defaults,
                interceptors: Interceptors::default(),
                transport,
            }),
        }
    }

    /// Instance defaults every request is merged over.
    #[must_use]
    pub fn defaults(&self) -> &RequestConfig {
        &self.inner.defaults
    }

    #[must_use]
    pub fn interceptors(&self) -> &Interceptors {
        &self.inner.interceptors
    }

    /// Send a request.
    ///
    /// # Errors
    ///
    /// Returns the failure left at the end of the chain: from an interceptor,
    /// the dispatcher, or the transport, unless a rejection handler recovered
    /// from it.
    pub async fn request(&self, config: RequestConfig) -> Result<HttpResponse, HttpError> {
        let merged = merge_config(&self.inner.defaults, Some(&config));
        tracing::debug!(
            request_interceptors = self.inner.interceptors.request.len(),
            response_interceptors = self.inner.interceptors.response.len(),
            "running request chain"
        );

        // A request-side failure never reaches the response interceptors.
        let config = self.inner.interceptors.request.run(Ok(merged)).await?;
        let outcome = dispatch_request(config, self.inner.transport.as_ref()).await;
        self.inner.interceptors.response.run(outcome).await
    }

    /// `request` with `url` taking precedence over `config.url`.
    ///
    /// # Errors
    ///
    /// See [`request`](Self::request).
    pub async fn request_url(
        &self,
        url: &str,
        config: Option<RequestConfig>,
    ) -> Result<HttpResponse, HttpError> {
        self.request(config.unwrap_or_default().with_url(url)).await
    }

    /// Resolved URL for `config` (base URL and query applied) without sending.
    #[must_use]
    pub fn get_uri(&self, config: Option<&RequestConfig>) -> String {
        transform_url(&merge_config(&self.inner.defaults, config))
    }

    async fn without_data(
        &self,
        method: Method,
        url: &str,
        config: Option<RequestConfig>,
    ) -> Result<HttpResponse, HttpError> {
        let config = config.unwrap_or_default().with_url(url).with_method(method);
        self.request(config).await
    }

    async fn with_data(
        &self,
        method: Method,
        url: &str,
        data: Option<Data>,
        config: Option<RequestConfig>,
    ) -> Result<HttpResponse, HttpError> {
        let mut config = config.unwrap_or_default().with_url(url).with_method(method);
        if data.is_some() {
            config.data = data;
        }
        self.request(config).await
    }

    /// # Errors
    ///
    /// See [`request`](Self::request).
    pub async fn get(
        &self,
        url: &str,
        config: Option<RequestConfig>,
    ) -> Result<HttpResponse, HttpError> {
        self.without_data(Method::GET, url, config).await
    }

    /// # Errors
    ///
    /// See [`request`](Self::request).
    pub async fn delete(
        &self,
        url: &str,
        config: Option<RequestConfig>,
    ) -> Result<HttpResponse, HttpError> {
        self.without_data(Method::DELETE, url, config).await
    }

    /// # Errors
    ///
    /// See [`request`](Self::request).
    pub async fn head(
        &self,
        url: &str,
        config: Option<RequestConfig>,
    ) -> Result<HttpResponse, HttpError> {
        self.without_data(Method::HEAD, url, config).await
    }

    /// # Errors
    ///
    /// See [`request`](Self::request).
    pub async fn options(
        &self,
        url: &str,
        config: Option<RequestConfig>,
    ) -> Result<HttpResponse, HttpError> {
        self.without_data(Method::OPTIONS, url, config).await
    }

    /// # Errors
    ///
    /// See [`request`](Self::request).
    pub async fn post(
        &self,
        url: &str,
        data: Option<Data>,
        config: Option<RequestConfig>,
    ) -> Result<HttpResponse, HttpError> {
        self.with_data(Method::POST, url, data, config).await
    }

    /// # Errors
    ///
    /// See [`request`](Self::request).
    pub async fn put(
        &self,
        url: &str,
        data: Option<Data>,
        config: Option<RequestConfig>,
    ) -> Result<HttpResponse, HttpError> {
        self.with_data(Method::PUT, url, data, config).await
    }

    /// # Errors
    ///
    /// See [`request`](Self::request).
    pub async fn patch(
        &self,
        url: &str,
        data: Option<Data>,
        config: Option<RequestConfig>,
    ) -> Result<HttpResponse, HttpError> {
        self.with_data(Method::PATCH, url, data, config).await
    }
}
