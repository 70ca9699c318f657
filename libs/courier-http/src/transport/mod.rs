//! Transport adapters.
//!
//! The request pipeline only needs [`Transport::send`]. [`HyperTransport`]
//! is the network-backed adapter; tests plug in their own implementations.

mod body;
mod hyper_client;
mod user_agent;

pub use body::{ProgressBody, ResponseBody};
pub use hyper_client::{HyperTransport, HyperTransportConfig};
pub use user_agent::{UserAgent, UserAgentLayer};

use crate::config::RequestConfig;
use crate::error::HttpError;
use crate::response::HttpResponse;
use async_trait::async_trait;
use http::{HeaderMap, Method, Uri};

/// Performs the network exchange for a fully resolved configuration.
///
/// Contract for implementations:
/// - honor `timeout` (`Duration::ZERO` or absent means none) and fail with
///   [`HttpError::timeout`];
/// - race the exchange against `cancel_token` and fail with
///   [`HttpError::cancelled`] when it fires;
/// - map connection failures to [`HttpError::network`];
/// - reject statuses refused by `validate_status` with [`HttpError::status`].
///
/// Exactly one outcome is produced per call.
#[async_trait]
pub trait Transport: Send + Sync {
    /// # Errors
    ///
    /// Returns an [`HttpError`] classified per the contract above.
    async fn send(&self, config: RequestConfig) -> Result<HttpResponse, HttpError>;
}

/// What was actually put on the wire.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestHandle {
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
}

impl RequestHandle {
    #[must_use]
    pub fn new(method: Method, uri: Uri, headers: HeaderMap) -> Self {
        Self {
            method,
            uri,
            headers,
        }
    }

    pub(crate) fn of<B>(request: &http::Request<B>) -> Self {
        Self::new(
            request.method().clone(),
            request.uri().clone(),
            request.headers().clone(),
        )
    }
}
