use crate::client::HttpClient;
use crate::config::{ClientSettings, RequestConfig, TlsRootConfig};
use crate::cookie::CookieStore;
use crate::error::HttpError;
use crate::merge::merge_config;
use crate::transport::{HyperTransport, HyperTransportConfig, Transport};
use http::Uri;
use std::sync::Arc;
use std::time::Duration;

/// Builder for [`HttpClient`].
///
/// Starts from [`RequestConfig::defaults`] and a [`HyperTransport`] with
/// default settings. Supplying a custom [`Transport`] bypasses every
/// transport option.
pub struct HttpClientBuilder {
    defaults: RequestConfig,
    transport: Option<Arc<dyn Transport>>,
    transport_config: HyperTransportConfig,
}

impl Default for HttpClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpClientBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            defaults: RequestConfig::defaults(),
            transport: None,
            transport_config: HyperTransportConfig::default(),
        }
    }

    /// Merge `config` over the current defaults.
    #[must_use]
    pub fn defaults(mut self, config: &RequestConfig) -> Self {
        self.defaults = merge_config(&self.defaults, Some(config));
        self
    }

    /// Apply loaded [`ClientSettings`] to the defaults and the transport.
    #[must_use]
    pub fn with_settings(mut self, settings: &ClientSettings) -> Self {
        self.defaults = merge_config(&self.defaults, Some(&settings.to_request_config()));
        self.transport_config.user_agent.clone_from(&settings.user_agent);
        self.transport_config.max_body_size = settings.max_body_size;
        self.transport_config.tls_roots = settings.tls_roots;
        if settings.allow_insecure_http {
            self = self.insecure_http_from_settings();
        }
        self.transport_config.origin = settings.origin.as_deref().and_then(|origin| {
            origin
                .parse::<Uri>()
                .inspect_err(|e| tracing::warn!(origin, error = %e, "ignoring invalid origin"))
                .ok()
        });
        self
    }

    /// Use `transport` instead of the built-in [`HyperTransport`].
    #[must_use]
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Default request timeout; `Duration::ZERO` disables it.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.defaults.timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.defaults.base_url = Some(base_url.into());
        self
    }

    #[must_use]
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.transport_config.user_agent = user_agent.into();
        self
    }

    /// Maximum decompressed response body size in bytes.
    #[must_use]
    pub fn max_body_size(mut self, size: usize) -> Self {
        self.transport_config.max_body_size = size;
        self
    }

    /// Allow plain `http://` URLs.
    ///
    /// Only available in debug builds or with the `allow-insecure-http`
    /// feature.
    #[must_use]
    #[cfg(any(debug_assertions, feature = "allow-insecure-http"))]
    pub fn allow_insecure_http(mut self) -> Self {
        tracing::warn!(
            target: "courier_http::security",
            "allow_insecure_http() called - HTTP traffic will NOT be encrypted"
        );
        self.transport_config.transport_security =
            crate::config::TransportSecurity::AllowInsecureHttp;
        self
    }

    #[cfg(any(debug_assertions, feature = "allow-insecure-http"))]
    fn insecure_http_from_settings(self) -> Self {
        self.allow_insecure_http()
    }

    #[cfg(not(any(debug_assertions, feature = "allow-insecure-http")))]
    fn insecure_http_from_settings(self) -> Self {
        tracing::warn!(
            target: "courier_http::security",
            "allow_insecure_http setting ignored: built without the allow-insecure-http feature"
        );
        self
    }

    #[must_use]
    pub fn tls_roots(mut self, roots: TlsRootConfig) -> Self {
        self.transport_config.tls_roots = roots;
        self
    }

    /// Cookie source for XSRF headers.
    #[must_use]
    pub fn cookie_store(mut self, store: Arc<dyn CookieStore>) -> Self {
        self.transport_config.cookie_store = Some(store);
        self
    }

    /// Origin the XSRF same-origin check compares request URLs against.
    #[must_use]
    pub fn origin(mut self, origin: Uri) -> Self {
        self.transport_config.origin = Some(origin);
        self
    }

    /// # Errors
    ///
    /// Fails when the built-in transport cannot be created (TLS roots, user
    /// agent).
    pub fn build(self) -> Result<HttpClient, HttpError> {
        let transport = match self.transport {
            Some(transport) => transport,
            None => Arc::new(HyperTransport::new(self.transport_config)?),
        };
        Ok(HttpClient::from_parts(self.defaults, transport))
    }
}
