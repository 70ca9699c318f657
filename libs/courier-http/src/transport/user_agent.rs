use crate::error::HttpError;
use http::{HeaderValue, Request, header::USER_AGENT};
use std::task::{Context, Poll};
use tower::{Layer, Service};

/// Sets `User-Agent` on requests that do not carry one.
#[derive(Debug, Clone)]
pub struct UserAgentLayer {
    value: HeaderValue,
}

impl UserAgentLayer {
    /// # Errors
    ///
    /// Returns an [`ErrorKind::InvalidRequest`](crate::ErrorKind::InvalidRequest)
    /// error when `user_agent` is not a valid header value.
    pub fn try_new(user_agent: &str) -> Result<Self, HttpError> {
        Ok(Self {
            value: HeaderValue::from_str(user_agent)?,
        })
    }
}

impl<S> Layer<S> for UserAgentLayer {
    type Service = UserAgent<S>;

    fn layer(&self, inner: S) -> Self::Service {
        UserAgent {
            inner,
            value: self.value.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct UserAgent<S> {
    inner: S,
    value: HeaderValue,
}

impl<S, B> Service<Request<B>> for UserAgent<S>
where
    S: Service<Request<B>>,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = S::Future;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<B>) -> Self::Future {
        req.headers_mut()
            .entry(USER_AGENT)
            .or_insert_with(|| self.value.clone());
        self.inner.call(req)
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use std::convert::Infallible;
    use tower::{ServiceExt, service_fn};

    async fn echo_agent(req: Request<()>) -> Result<Option<HeaderValue>, Infallible> {
        Ok(req.headers().get(USER_AGENT).cloned())
    }

    #[tokio::test]
    async fn test_sets_missing_user_agent() {
        let service = UserAgentLayer::try_new("courier-test/1.0")
            .unwrap()
            .layer(service_fn(echo_agent));

        let seen = service.oneshot(Request::new(())).await.unwrap();
        assert_eq!(seen, Some(HeaderValue::from_static("courier-test/1.0")));
    }

    #[tokio::test]
    async fn test_keeps_caller_user_agent() {
        let service = UserAgentLayer::try_new("courier-test/1.0")
            .unwrap()
            .layer(service_fn(echo_agent));

        let req = Request::builder()
            .header(USER_AGENT, "custom/2.0")
            .body(())
            .unwrap();
        let seen = service.oneshot(req).await.unwrap();
        assert_eq!(seen, Some(HeaderValue::from_static("custom/2.0")));
    }

    #[test]
    fn test_rejects_invalid_value() {
        assert!(UserAgentLayer::try_new("bad\x00agent").is_err());
    }
}
