#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![warn(warnings)]

//! Promise-style HTTP client with interceptors, mergeable configuration and
//! cooperative cancellation.
//!
//! Every request runs through one pipeline:
//! - the per-call [`RequestConfig`] is merged over the client defaults
//!   ([`merge_config`]);
//! - request interceptors run in registration order;
//! - the dispatcher resolves the URL, runs the request transforms, flattens
//!   the header blocks and calls the [`Transport`];
//! - response transforms and response interceptors run on the outcome.
//!
//! [`HyperTransport`] is the bundled transport: hyper + rustls, HTTPS only
//! by default, `User-Agent` injection, transparent gzip/brotli/deflate
//! decompression and a response body size limit.
//!
//! # Example
//!
//! ```ignore
//! use courier_http::{CancelToken, HttpClient, RequestConfig};
//! use std::time::Duration;
//!
//! let client = HttpClient::builder()
//!     .base_url("https://api.example.com")
//!     .timeout(Duration::from_secs(10))
//!     .build()?;
//!
//! let source = CancelToken::source();
//! let config = RequestConfig::new().with_cancel_token(source.token.clone());
//! let user: User = client.get("/users/1", Some(config)).await?.json()?;
//! ```

mod builder;
mod cancel;
mod client;
pub mod config;
pub mod cookie;
mod data;
pub mod dispatch;
mod error;
pub mod headers;
mod interceptor;
pub mod merge;
mod response;
pub mod tls;
pub mod transform;
pub mod transport;
pub mod url;

pub use builder::HttpClientBuilder;
pub use cancel::{Cancel, CancelToken, CancelTokenSource, Canceler};
pub use client::HttpClient;
pub use config::{
    BasicCredentials, ClientSettings, DEFAULT_USER_AGENT, ParamsSerializer, ProgressEvent,
    ProgressHandler, RequestConfig, ResponseType, StatusValidator, TlsRootConfig,
    TransportSecurity,
};
pub use cookie::{CookieJar, CookieStore};
pub use data::{Data, FormData, FormValue};
pub use dispatch::dispatch_request;
pub use error::{BoxError, ErrorKind, HttpError, NETWORK_ERROR_CODE, is_cancel};
pub use headers::Headers;
pub use interceptor::{InterceptorFuture, InterceptorId, InterceptorManager, Interceptors};
pub use merge::merge_config;
pub use response::HttpResponse;
pub use transform::{Transformer, Transformers};
pub use transport::{HyperTransport, HyperTransportConfig, RequestHandle, Transport};
