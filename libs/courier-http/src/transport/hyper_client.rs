use super::body::{ProgressBody, ResponseBody, read_body};
use super::user_agent::UserAgentLayer;
use super::{RequestHandle, Transport};
use crate::config::{
    DEFAULT_MAX_BODY_SIZE, DEFAULT_USER_AGENT, ProgressHandler, RequestConfig, ResponseType,
    TlsRootConfig, TransportSecurity,
};
use crate::cookie::CookieStore;
use crate::data::Data;
use crate::error::{BoxError, HttpError};
use crate::headers::{CONTENT_TYPE, Headers};
use crate::response::HttpResponse;
use crate::tls;
use crate::url::is_url_same_origin;
use async_trait::async_trait;
use base64::Engine;
use bytes::Bytes;
use http::header::{AUTHORIZATION, CONTENT_LENGTH};
use http::response::Parts;
use http::{HeaderMap, Method, Request, Response, Uri};
use http_body_util::BodyExt;
use hyper_util::client::legacy::Client;
use hyper_util::rt::{TokioExecutor, TokioTimer};
use rand::Rng;
use std::fmt;
use std::sync::Arc;
use tower::util::BoxCloneSyncService;
use tower::{ServiceBuilder, ServiceExt};
use tower_http::decompression::DecompressionLayer;

type ClientService = BoxCloneSyncService<Request<ProgressBody>, Response<ResponseBody>, BoxError>;

/// Settings for [`HyperTransport`].
#[derive(Clone)]
pub struct HyperTransportConfig {
    /// Transport security mode (default: `TlsOnly`)
    pub transport_security: TransportSecurity,
    /// TLS root certificate strategy (default: `WebPki`)
    pub tls_roots: TlsRootConfig,
    /// Sent when the request does not set its own `User-Agent`
    pub user_agent: String,
    /// Maximum decompressed response body size in bytes (default: 10 MB)
    pub max_body_size: usize,
    /// Origin the XSRF same-origin check compares against
    pub origin: Option<Uri>,
    /// Where XSRF cookies are read from; no store means no XSRF header
    pub cookie_store: Option<Arc<dyn CookieStore>>,
}

impl Default for HyperTransportConfig {
    fn default() -> Self {
        Self {
            transport_security: TransportSecurity::default(),
            tls_roots: TlsRootConfig::default(),
            user_agent: DEFAULT_USER_AGENT.to_owned(),
            max_body_size: DEFAULT_MAX_BODY_SIZE,
            origin: None,
            cookie_store: None,
        }
    }
}

impl fmt::Debug for HyperTransportConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HyperTransportConfig")
            .field("transport_security", &self.transport_security)
            .field("tls_roots", &self.tls_roots)
            .field("user_agent", &self.user_agent)
            .field("max_body_size", &self.max_body_size)
            .field("origin", &self.origin)
            .field("cookie_store", &self.cookie_store.is_some())
            .finish()
    }
}

/// Network transport built on hyper, rustls and tower.
///
/// Service stack, outer to inner: `User-Agent` → decompression → hyper
/// client. Timeouts and cancellation wrap the whole exchange, including the
/// body read.
#[derive(Clone)]
pub struct HyperTransport {
    service: ClientService,
    config: HyperTransportConfig,
}

impl fmt::Debug for HyperTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HyperTransport")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl HyperTransport {
    /// # Errors
    ///
    /// Fails when the TLS roots cannot be loaded or the user agent is not a
    /// valid header value.
    pub fn new(config: HyperTransportConfig) -> Result<Self, HttpError> {
        if config.transport_security == TransportSecurity::AllowInsecureHttp {
            tracing::warn!(
                "insecure HTTP enabled (TransportSecurity::AllowInsecureHttp); \
                 use only for testing with mock servers"
            );
        }

        let https = tls::build_https_connector(config.tls_roots, config.transport_security)?;
        let hyper_client = Client::builder(TokioExecutor::new())
            .pool_timer(TokioTimer::new())
            .build::<_, ProgressBody>(https);

        let service = ServiceBuilder::new()
            .layer(UserAgentLayer::try_new(&config.user_agent)?)
            .layer(DecompressionLayer::new())
            .service(hyper_client)
            .map_response(box_response_body)
            .map_err(BoxError::from);

        Ok(Self {
            service: BoxCloneSyncService::new(service),
            config,
        })
    }

    #[must_use]
    pub fn config(&self) -> &HyperTransportConfig {
        &self.config
    }

    /// Parse `url` and check its scheme against the transport security mode.
    fn validate_url(&self, url: &str) -> Result<Uri, HttpError> {
        let uri: Uri = url.parse().map_err(|e: http::uri::InvalidUri| {
            HttpError::invalid_request(format!("Invalid URL '{url}': {e}")).with_source(e)
        })?;

        if uri.authority().is_none() {
            return Err(HttpError::invalid_request(format!(
                "Invalid URL '{url}': missing host"
            )));
        }

        match uri.scheme_str() {
            Some("https") => Ok(uri),
            Some("http") if self.config.transport_security == TransportSecurity::AllowInsecureHttp => {
                Ok(uri)
            }
            Some("http") => Err(HttpError::invalid_request(
                "HTTPS required (transport security is TlsOnly)",
            )),
            Some(scheme) => Err(HttpError::invalid_request(format!(
                "Unsupported scheme '{scheme}': only http:// and https:// are supported"
            ))),
            None => Err(HttpError::invalid_request(format!(
                "Invalid URL '{url}': missing scheme"
            ))),
        }
    }

    fn prepare(&self, config: &RequestConfig) -> Result<Request<ProgressBody>, HttpError> {
        let uri = self.validate_url(config.url.as_deref().unwrap_or_default())?;
        let mut headers = config.headers.clone().unwrap_or_default();

        let content = match &config.data {
            None => {
                headers.remove_ignore_case(CONTENT_TYPE);
                Bytes::new()
            }
            Some(Data::Form(form)) => {
                let boundary = multipart_boundary();
                headers.remove_ignore_case(CONTENT_TYPE);
                headers.insert(
                    CONTENT_TYPE,
                    format!("multipart/form-data; boundary={boundary}"),
                );
                form.encode(&boundary)
            }
            Some(Data::Json(value)) => Bytes::from(serde_json::to_vec(value)?),
            Some(Data::Text(text)) => Bytes::from(text.clone()),
            Some(Data::Bytes(bytes)) => bytes.clone(),
        };

        self.attach_xsrf(config, &uri, &mut headers);

        if let Some(auth) = &config.auth {
            let token = base64::engine::general_purpose::STANDARD
                .encode(format!("{}:{}", auth.username, auth.password));
            headers.remove_ignore_case(AUTHORIZATION.as_str());
            headers.insert(AUTHORIZATION.as_str(), format!("Basic {token}"));
        }

        let mut builder = Request::builder()
            .method(config.method.clone().unwrap_or(Method::GET))
            .uri(uri);
        for (name, value) in headers.string_pairs() {
            builder = builder.header(name, value);
        }

        Ok(builder.body(ProgressBody::new(
            content,
            config.on_upload_progress.clone(),
        ))?)
    }

    /// Copy the XSRF cookie into its header for credentialed or same-origin
    /// requests.
    fn attach_xsrf(&self, config: &RequestConfig, uri: &Uri, headers: &mut Headers) {
        let (Some(store), Some(cookie_name), Some(header_name)) = (
            self.config.cookie_store.as_ref(),
            config.xsrf_cookie_name.as_deref(),
            config.xsrf_header_name.as_deref(),
        ) else {
            return;
        };

        let same_origin = self
            .config
            .origin
            .as_ref()
            .is_some_and(|origin| is_url_same_origin(origin, uri));
        if !config.with_credentials.unwrap_or(false) && !same_origin {
            return;
        }

        if let Some(value) = store.read(cookie_name) {
            headers.insert(header_name, value);
        }
    }

    /// Send the request and collect the body.
    async fn exchange(
        &self,
        request: Request<ProgressBody>,
        observer: Option<&ProgressHandler>,
    ) -> Result<(Parts, Bytes), HttpError> {
        let response = self
            .service
            .clone()
            .oneshot(request)
            .await
            .map_err(HttpError::network)?;

        let (parts, body) = response.into_parts();
        let total = parts
            .headers
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok());
        let bytes = read_body(body, self.config.max_body_size, observer, total).await?;
        Ok((parts, bytes))
    }

    /// [`exchange`](Self::exchange) bounded by the timeout and raced against
    /// the cancel token.
    async fn guarded_exchange(
        &self,
        request: Request<ProgressBody>,
        config: &RequestConfig,
    ) -> Result<(Parts, Bytes), HttpError> {
        let exchange = self.exchange(request, config.on_download_progress.as_ref());
        let timeout = config.timeout.filter(|t| !t.is_zero());

        let bounded = async move {
            match timeout {
                Some(limit) => tokio::time::timeout(limit, exchange)
                    .await
                    .unwrap_or_else(|_| Err(HttpError::timeout(limit))),
                None => exchange.await,
            }
        };

        match &config.cancel_token {
            Some(token) => tokio::select! {
                biased;
                reason = token.cancelled() => {
                    tracing::warn!(%reason, "in-flight request aborted by cancel token");
                    Err(HttpError::cancelled(reason))
                }
                result = bounded => result,
            },
            None => bounded.await,
        }
    }
}

#[async_trait]
impl Transport for HyperTransport {
    async fn send(&self, config: RequestConfig) -> Result<HttpResponse, HttpError> {
        let request = self
            .prepare(&config)
            .map_err(|e| e.with_config(config.clone()))?;
        let handle = RequestHandle::of(&request);
        tracing::debug!(method = %handle.method, uri = %handle.uri, "sending request");

        let (parts, body) = self
            .guarded_exchange(request, &config)
            .await
            .map_err(|e| e.with_config(config.clone()).with_request(handle.clone()))?;

        tracing::debug!(status = parts.status.as_u16(), bytes = body.len(), "response received");

        let data = decode_body(body, config.response_type.unwrap_or_default());
        let response = HttpResponse::new(parts.status, config)
            .with_headers(response_headers(&parts.headers))
            .with_data(data)
            .with_request(handle);

        settle(response)
    }
}

/// Resolve or reject by the configured status validator; absent accepts all.
fn settle(response: HttpResponse) -> Result<HttpResponse, HttpError> {
    let accepted = response
        .config()
        .validate_status
        .as_ref()
        .is_none_or(|validator| validator.accepts(response.status()));
    if accepted {
        Ok(response)
    } else {
        Err(HttpError::status(response))
    }
}

/// Empty bodies decode to `None`.
fn decode_body(body: Bytes, response_type: ResponseType) -> Option<Data> {
    if body.is_empty() {
        return None;
    }
    Some(match response_type {
        ResponseType::Text => Data::Text(String::from_utf8_lossy(&body).into_owned()),
        ResponseType::Json => {
            Data::Json(serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null))
        }
        ResponseType::Bytes => Data::Bytes(body),
    })
}

/// Lower-cased header mapping; repeated headers are joined with `, `.
fn response_headers(map: &HeaderMap) -> Headers {
    let mut headers = Headers::new();
    for name in map.keys() {
        let joined = map
            .get_all(name)
            .iter()
            .map(|v| String::from_utf8_lossy(v.as_bytes()))
            .collect::<Vec<_>>()
            .join(", ");
        headers.insert(name.as_str(), joined);
    }
    headers
}

fn multipart_boundary() -> String {
    format!("----courier{:016x}", rand::rng().random::<u64>())
}

fn box_response_body<B>(response: Response<B>) -> Response<ResponseBody>
where
    B: hyper::body::Body<Data = Bytes> + Send + Sync + 'static,
    B::Error: Into<BoxError>,
{
    let (parts, body) = response.into_parts();
    Response::from_parts(parts, body.map_err(Into::into).boxed())
}
