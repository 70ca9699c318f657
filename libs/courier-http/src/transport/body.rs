use crate::config::{ProgressEvent, ProgressHandler};
use crate::error::{BoxError, HttpError};
use bytes::Bytes;
use http_body::{Body, Frame, SizeHint};
use http_body_util::{BodyExt, Full};
use pin_project_lite::pin_project;
use std::convert::Infallible;
use std::pin::Pin;
use std::task::{Context, Poll};

/// Boxed response body, after transparent decompression.
pub type ResponseBody = http_body_util::combinators::BoxBody<Bytes, BoxError>;

fn byte_count(len: usize) -> u64 {
    u64::try_from(len).unwrap_or(u64::MAX)
}

pin_project! {
    /// Buffered request body that reports upload progress as it is polled.
    pub struct ProgressBody {
        #[pin]
        inner: Full<Bytes>,
        observer: Option<ProgressHandler>,
        total: u64,
        sent: u64,
    }
}

impl ProgressBody {
    #[must_use]
    pub fn new(content: Bytes, observer: Option<ProgressHandler>) -> Self {
        Self {
            total: byte_count(content.len()),
            inner: Full::new(content),
            observer,
            sent: 0,
        }
    }
}

impl Body for ProgressBody {
    type Data = Bytes;
    type Error = Infallible;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = self.project();
        let polled = this.inner.poll_frame(cx);

        if let Poll::Ready(Some(Ok(frame))) = &polled
            && let Some(chunk) = frame.data_ref()
        {
            *this.sent += byte_count(chunk.len());
            if let Some(observer) = this.observer.as_ref() {
                observer.notify(ProgressEvent {
                    loaded: *this.sent,
                    total: Some(*this.total),
                });
            }
        }
        polled
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}

/// Collect `body`, enforcing `limit` and reporting download progress.
///
/// `total` is the announced `Content-Length`, if any.
pub(super) async fn read_body(
    body: ResponseBody,
    limit: usize,
    observer: Option<&ProgressHandler>,
    total: Option<u64>,
) -> Result<Bytes, HttpError> {
    let mut collected = Vec::new();
    let mut body = std::pin::pin!(body);

    while let Some(frame) = body.frame().await {
        let frame = frame.map_err(HttpError::network)?;
        if let Some(chunk) = frame.data_ref() {
            if collected.len() + chunk.len() > limit {
                return Err(HttpError::body(format!(
                    "Response body exceeds limit of {limit} bytes"
                )));
            }
            collected.extend_from_slice(chunk);
            if let Some(observer) = observer {
                observer.notify(ProgressEvent {
                    loaded: byte_count(collected.len()),
                    total,
                });
            }
        }
    }

    Ok(Bytes::from(collected))
}
