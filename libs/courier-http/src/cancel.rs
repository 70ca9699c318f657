//! Cooperative request cancellation.
//!
//! A [`CancelToken`] is shared between the caller and the transport. The caller
//! triggers it through the paired [`Canceler`]; the dispatcher checks it before
//! sending and the transport races the in-flight exchange against
//! [`CancelToken::cancelled`].
//!
//! ```ignore
//! let CancelTokenSource { token, cancel } = CancelToken::source();
//!
//! let pending = client.get("/slow", Some(RequestConfig::default().with_cancel_token(token)));
//! cancel.cancel(Some("user navigated away"));
//!
//! let err = pending.await.unwrap_err();
//! assert!(courier_http::is_cancel(&err));
//! ```

use std::fmt;
use std::sync::{Arc, OnceLock};
use tokio_util::sync::CancellationToken;

/// Reason attached to a cancelled token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cancel {
    message: Option<String>,
}

impl Cancel {
    #[must_use]
    pub fn new(message: Option<String>) -> Self {
        Self { message }
    }

    #[must_use]
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }
}

impl fmt::Display for Cancel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message().unwrap_or("Request cancelled"))
    }
}

struct TokenState {
    reason: OnceLock<Cancel>,
    signal: CancellationToken,
}

/// One-shot cancellation signal.
///
/// Cloning is cheap; all clones observe the same state.
#[derive(Clone)]
pub struct CancelToken {
    state: Arc<TokenState>,
}

/// Trigger bound to a [`CancelToken`].
///
/// Only the first call records a reason; later calls are no-ops.
#[derive(Clone)]
pub struct Canceler {
    state: Arc<TokenState>,
}

/// A token together with its canceler, see [`CancelToken::source`].
pub struct CancelTokenSource {
    pub token: CancelToken,
    pub cancel: Canceler,
}

impl CancelToken {
    /// Create a token, handing its canceler to `executor` synchronously.
    #[must_use]
    pub fn new(executor: impl FnOnce(Canceler)) -> Self {
        let state = Arc::new(TokenState {
            reason: OnceLock::new(),
            signal: CancellationToken::new(),
        });
        executor(Canceler {
            state: Arc::clone(&state),
        });
        Self { state }
    }

    /// Create a fresh token and its canceler.
    #[must_use]
    pub fn source() -> CancelTokenSource {
        let mut cancel = None;
        let token = CancelToken::new(|c| cancel = Some(c));
        // The executor runs synchronously, so the canceler is always captured.
        let cancel = cancel.unwrap_or_else(|| Canceler {
            state: Arc::clone(&token.state),
        });
        CancelTokenSource { token, cancel }
    }

    /// Stored reason, once cancelled.
    #[must_use]
    pub fn reason(&self) -> Option<&Cancel> {
        self.state.reason.get()
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.state.reason.get().is_some()
    }

    /// Fail with the stored reason if the token has been cancelled.
    ///
    /// # Errors
    ///
    /// Returns the [`Cancel`] reason recorded by the first `cancel` call.
    pub fn throw_if_requested(&self) -> Result<(), Cancel> {
        match self.state.reason.get() {
            Some(reason) => Err(reason.clone()),
            None => Ok(()),
        }
    }

    /// Resolves with the reason once the token is cancelled.
    pub async fn cancelled(&self) -> Cancel {
        self.state.signal.cancelled().await;
        // The reason is stored before the signal fires.
        self.state
            .reason
            .get()
            .cloned()
            .unwrap_or_else(|| Cancel::new(None))
    }
}

impl fmt::Debug for CancelToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancelToken")
            .field("reason", &self.reason())
            .finish()
    }
}

impl Canceler {
    /// Cancel the token. Idempotent.
    pub fn cancel(&self, message: Option<&str>) {
        let reason = Cancel::new(message.map(str::to_owned));
        if self.state.reason.set(reason).is_ok() {
            tracing::debug!(reason = ?message, "cancel token triggered");
            self.state.signal.cancel();
        }
    }
}

impl fmt::Debug for Canceler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Canceler")
            .field("cancelled", &self.state.reason.get().is_some())
            .finish()
    }
}
