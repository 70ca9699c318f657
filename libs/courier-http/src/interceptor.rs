//! Interceptor registries.
//!
//! Each registry keeps handler pairs in insertion order. Ejected entries leave
//! an empty slot behind, so ids stay stable and are never reused.

use crate::config::RequestConfig;
use crate::error::HttpError;
use crate::response::HttpResponse;
use futures::future::BoxFuture;
use parking_lot::RwLock;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// Future returned by interceptor handlers.
pub type InterceptorFuture<T> = BoxFuture<'static, Result<T, HttpError>>;

type Fulfilled<T> = Arc<dyn Fn(T) -> InterceptorFuture<T> + Send + Sync>;
type Rejected<T> = Arc<dyn Fn(HttpError) -> InterceptorFuture<T> + Send + Sync>;

/// Handle returned by [`InterceptorManager::register`], used to eject.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InterceptorId(usize);

/// A registered handler pair.
pub(crate) struct Interceptor<T> {
    fulfilled: Fulfilled<T>,
    rejected: Option<Rejected<T>>,
}

impl<T> Clone for Interceptor<T> {
    fn clone(&self) -> Self {
        Self {
            fulfilled: Arc::clone(&self.fulfilled),
            rejected: self.rejected.clone(),
        }
    }
}

impl<T> Interceptor<T> {
    /// Advance the chain by one step.
    ///
    /// Success goes to the fulfilled handler. Failure goes to the rejected
    /// handler when there is one, otherwise it passes through.
    pub(crate) async fn apply(&self, outcome: Result<T, HttpError>) -> Result<T, HttpError> {
        match outcome {
            Ok(value) => (self.fulfilled)(value).await,
            Err(err) => match &self.rejected {
                Some(rejected) => rejected(err).await,
                None => Err(err),
            },
        }
    }
}

/// Ordered registry of handler pairs for one side of the chain.
pub struct InterceptorManager<T> {
    handlers: RwLock<Vec<Option<Interceptor<T>>>>,
}

impl<T> Default for InterceptorManager<T> {
    fn default() -> Self {
        Self {
            handlers: RwLock::new(Vec::new()),
        }
    }
}

impl<T> fmt::Debug for InterceptorManager<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InterceptorManager")
            .field("active", &self.len())
            .finish()
    }
}

impl<T: Send + 'static> InterceptorManager<T> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a fulfilled handler; failures pass through it untouched.
    pub fn register<F, Fut>(&self, on_fulfilled: F) -> InterceptorId
    where
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, HttpError>> + Send + 'static,
    {
        self.push(Interceptor {
            fulfilled: Arc::new(move |value| Box::pin(on_fulfilled(value))),
            rejected: None,
        })
    }

    /// Register a fulfilled handler together with a rejected handler.
    ///
    /// The rejected handler may recover by returning `Ok`.
    pub fn register_with_rejection<F, Fut, R, RFut>(
        &self,
        on_fulfilled: F,
        on_rejected: R,
    ) -> InterceptorId
    where
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, HttpError>> + Send + 'static,
        R: Fn(HttpError) -> RFut + Send + Sync + 'static,
        RFut: Future<Output = Result<T, HttpError>> + Send + 'static,
    {
        self.push(Interceptor {
            fulfilled: Arc::new(move |value| Box::pin(on_fulfilled(value))),
            rejected: Some(Arc::new(move |err| Box::pin(on_rejected(err)))),
        })
    }

    fn push(&self, interceptor: Interceptor<T>) -> InterceptorId {
        let mut handlers = self.handlers.write();
        handlers.push(Some(interceptor));
        let id = InterceptorId(handlers.len() - 1);
        tracing::trace!(id = id.0, "interceptor registered");
        id
    }
}

impl<T> InterceptorManager<T> {
    /// Remove an interceptor. Unknown or already-ejected ids are ignored.
    pub fn eject(&self, id: InterceptorId) {
        if let Some(slot) = self.handlers.write().get_mut(id.0)
            && slot.take().is_some()
        {
            tracing::trace!(id = id.0, "interceptor ejected");
        }
    }

    /// Number of active (non-ejected) interceptors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.read().iter().flatten().count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// First active interceptor at or after slot `index`.
    ///
    /// The registry is read at each step, so ejections made while a request
    /// is in the chain apply to the slots it has not reached yet.
    pub(crate) fn next_from(&self, index: usize) -> Option<(usize, Interceptor<T>)> {
        let handlers = self.handlers.read();
        handlers
            .iter()
            .enumerate()
            .skip(index)
            .find_map(|(i, slot)| slot.as_ref().map(|ic| (i, ic.clone())))
    }

    /// Drive `outcome` through every active interceptor in order.
    pub(crate) async fn run(&self, mut outcome: Result<T, HttpError>) -> Result<T, HttpError> {
        let mut index = 0;
        while let Some((slot, interceptor)) = self.next_from(index) {
            outcome = interceptor.apply(outcome).await;
            index = slot + 1;
            tokio::task::yield_now().await;
        }
        outcome
    }
}

/// The request and response registries of a client.
#[derive(Debug, Default)]
pub struct Interceptors {
    /// Runs on the merged configuration before dispatch
    pub request: InterceptorManager<RequestConfig>,
    /// Runs on the response (or failure) after dispatch
    pub response: InterceptorManager<HttpResponse>,
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    fn recorder(
        log: Arc<Mutex<Vec<&'static str>>>,
        name: &'static str,
    ) -> impl Fn(u32) -> std::future::Ready<Result<u32, HttpError>> + Send + Sync + 'static {
        move |v| {
            log.lock().push(name);
            std::future::ready(Ok(v + 1))
        }
    }

    #[tokio::test]
    async fn test_runs_in_registration_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let manager = InterceptorManager::<u32>::new();
        manager.register(recorder(Arc::clone(&log), "first"));
        manager.register(recorder(Arc::clone(&log), "second"));

        let out = manager.run(Ok(0)).await.unwrap();
        assert_eq!(out, 2);
        assert_eq!(*log.lock(), vec!["first", "second"]);
    }

    #[tokio::test]
    async fn test_eject_is_idempotent_and_ids_are_not_reused() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let manager = InterceptorManager::<u32>::new();
        let a = manager.register(recorder(Arc::clone(&log), "a"));
        manager.eject(a);
        manager.eject(a);
        manager.eject(InterceptorId(99));

        let b = manager.register(recorder(Arc::clone(&log), "b"));
        assert_ne!(a, b);
        assert_eq!(manager.len(), 1);

        manager.run(Ok(0)).await.unwrap();
        assert_eq!(*log.lock(), vec!["b"]);
    }

    #[tokio::test]
    async fn test_failure_skips_fulfilled_handlers() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let manager = InterceptorManager::<u32>::new();
        manager.register(recorder(Arc::clone(&log), "fulfilled"));

        let err = manager
            .run(Err(HttpError::invalid_request("bad")))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "bad");
        assert!(log.lock().is_empty());
    }

    #[tokio::test]
    async fn test_rejected_handler_can_recover() {
        let manager = InterceptorManager::<u32>::new();
        manager.register_with_rejection(
            |v| async move { Ok(v) },
            |_err| async move { Ok(42) },
        );
        manager.register(|v| async move { Ok(v * 2) });

        let out = manager.run(Err(HttpError::invalid_request("bad"))).await;
        assert_eq!(out.unwrap(), 84);
    }

    #[tokio::test]
    async fn test_fulfilled_handler_can_reject() {
        let manager = InterceptorManager::<u32>::new();
        manager.register(|_| async move { Err(HttpError::invalid_request("nope")) });
        let seen = Arc::new(Mutex::new(None));
        let seen_in = Arc::clone(&seen);
        manager.register_with_rejection(
            |v| async move { Ok(v) },
            move |err| {
                *seen_in.lock() = Some(err.to_string());
                async move { Err(err) }
            },
        );

        assert!(manager.run(Ok(1)).await.is_err());
        assert_eq!(seen.lock().as_deref(), Some("nope"));
    }

    #[tokio::test]
    async fn test_eject_during_traversal_skips_unreached_slot() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let manager = Arc::new(InterceptorManager::<u32>::new());
        let later = Arc::new(Mutex::new(None::<InterceptorId>));

        let ejector = {
            let manager = Arc::downgrade(&manager);
            let later = Arc::clone(&later);
            move |v| {
                if let (Some(m), Some(id)) = (manager.upgrade(), *later.lock()) {
                    m.eject(id);
                }
                std::future::ready(Ok(v))
            }
        };
        manager.register(ejector);
        let id = manager.register(recorder(Arc::clone(&log), "ejected"));
        *later.lock() = Some(id);

        manager.run(Ok(0)).await.unwrap();
        assert!(log.lock().is_empty());
    }
}
