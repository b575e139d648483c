use futures::FutureExt;
use futures::future::BoxFuture;
use parking_lot::Mutex;
use std::future::Future;
use std::sync::Arc;

use crate::contexts::toast::ToastDispatcher;
use crate::error::ErrorInfo;
use crate::state::RequestState;

type Operation<A, T> =
    Arc<dyn Fn(A) -> BoxFuture<'static, Result<T, ErrorInfo>> + Send + Sync>;
type SuccessCallback<T> = Arc<dyn Fn(&T) + Send + Sync>;
type ErrorCallback = Arc<dyn Fn(&ErrorInfo) + Send + Sync>;

pub const SUCCESS_TOAST_TITLE: &str = "Success";
pub const ERROR_TOAST_TITLE: &str = "Error";
pub const DEFAULT_SUCCESS_MESSAGE: &str = "Operation completed successfully";

/// Behaviour of a [`RequestHook`] around the operation it wraps.
///
/// Failures toast by default; successes are silent unless opted in.
pub struct RequestOptions<T> {
    pub on_success: Option<SuccessCallback<T>>,
    pub on_error: Option<ErrorCallback>,
    pub show_success_toast: bool,
    pub show_error_toast: bool,
    pub success_message: Option<String>,
}

impl<T> Default for RequestOptions<T> {
    fn default() -> Self {
        Self {
            on_success: None,
            on_error: None,
            show_success_toast: false,
            show_error_toast: true,
            success_message: None,
        }
    }
}

impl<T> Clone for RequestOptions<T> {
    fn clone(&self) -> Self {
        Self {
            on_success: self.on_success.clone(),
            on_error: self.on_error.clone(),
            show_success_toast: self.show_success_toast,
            show_error_toast: self.show_error_toast,
            success_message: self.success_message.clone(),
        }
    }
}

impl<T> RequestOptions<T> {
    pub fn on_success(
        mut self,
        f: impl Fn(&T) + Send + Sync + 'static,
    ) -> Self {
        self.on_success = Some(Arc::new(f));
        self
    }

    pub fn on_error(
        mut self,
        f: impl Fn(&ErrorInfo) + Send + Sync + 'static,
    ) -> Self {
        self.on_error = Some(Arc::new(f));
        self
    }

    /// Toast on success with the given message.
    pub fn success_toast(mut self, message: impl Into<String>) -> Self {
        self.show_success_toast = true;
        self.success_message = Some(message.into());
        self
    }

    pub fn show_success_toast(mut self, show: bool) -> Self {
        self.show_success_toast = show;
        self
    }

    pub fn show_error_toast(mut self, show: bool) -> Self {
        self.show_error_toast = show;
        self
    }
}

struct Inner<T> {
    state: RequestState<T>,
    /// Ticket of the most recent call. Completions holding an older ticket
    /// are stale and leave the state alone.
    latest: u64,
}

/// Tracks loading/data/error for an async operation.
///
/// The hook owns the operation; callers only supply its arguments. State
/// transitions follow the latest call: when calls overlap, the response of
/// an older call is returned to its caller but never written to the state,
/// and [`reset`](Self::reset) or [`cancel`](Self::cancel) discard every call
/// still in flight.
///
/// # Example
///
/// ```rust,ignore
/// let session = session.clone();
/// let profile = RequestHook::new(
///     toasts.clone(),
///     RequestOptions::default().success_toast("Profile saved"),
///     move |details: UpdateProfile| {
///         let session = session.clone();
///         async move { session.update_profile(&details).await }
///     },
/// );
///
/// profile.execute(details).await?;
/// assert!(profile.data().is_some());
/// ```
pub struct RequestHook<A, T> {
    operation: Operation<A, T>,
    options: RequestOptions<T>,
    toasts: ToastDispatcher,
    inner: Arc<Mutex<Inner<T>>>,
}

impl<A, T> Clone for RequestHook<A, T> {
    fn clone(&self) -> Self {
        Self {
            operation: self.operation.clone(),
            options: self.options.clone(),
            toasts: self.toasts.clone(),
            inner: self.inner.clone(),
        }
    }
}

impl<A, T> RequestHook<A, T>
where
    A: Send + 'static,
    T: Clone + Send + Sync + 'static,
{
    pub fn new<F, Fut, E>(
        toasts: ToastDispatcher,
        options: RequestOptions<T>,
        operation: F,
    ) -> Self
    where
        F: Fn(A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        E: Into<ErrorInfo> + Send + 'static,
    {
        let operation: Operation<A, T> = Arc::new(move |args| {
            let fut = operation(args);
            async move { fut.await.map_err(Into::into) }.boxed()
        });
        Self {
            operation,
            options,
            toasts,
            inner: Arc::new(Mutex::new(Inner {
                state: RequestState::default(),
                latest: 0,
            })),
        }
    }

    /// Run the operation, tracking its progress in the hook state.
    ///
    /// The result is always returned to the caller, normalized on failure,
    /// even when the call went stale and was not recorded.
    pub async fn execute(&self, args: A) -> Result<T, ErrorInfo> {
        let mut flight = self.begin();
        let result = (self.operation)(args).await;

        match result {
            Ok(data) => {
                let value = data.clone();
                if flight.settle(|state| state.resolve(value)) {
                    if self.options.show_success_toast {
                        let message = self
                            .options
                            .success_message
                            .as_deref()
                            .unwrap_or(DEFAULT_SUCCESS_MESSAGE);
                        self.toasts.success(SUCCESS_TOAST_TITLE, message);
                    }
                    if let Some(on_success) = &self.options.on_success {
                        on_success(&data);
                    }
                }
                Ok(data)
            }
            Err(error) => {
                let value = error.clone();
                if flight.settle(|state| state.fail(value)) {
                    tracing::debug!(error = %error, "request failed");
                    if self.options.show_error_toast {
                        self.toasts
                            .error(ERROR_TOAST_TITLE, error.message.clone());
                    }
                    if let Some(on_error) = &self.options.on_error {
                        on_error(&error);
                    }
                }
                Err(error)
            }
        }
    }

    fn begin(&self) -> InFlight<T> {
        let mut inner = self.inner.lock();
        inner.latest += 1;
        inner.state = RequestState::loading();
        InFlight {
            inner: self.inner.clone(),
            ticket: inner.latest,
            settled: false,
        }
    }

    /// Restore the idle state and discard every call still in flight.
    pub fn reset(&self) {
        let mut inner = self.inner.lock();
        inner.latest += 1;
        inner.state = RequestState::default();
    }

    /// Discard calls in flight, keeping the last recorded data or error.
    pub fn cancel(&self) {
        let mut inner = self.inner.lock();
        inner.latest += 1;
        inner.state.loading = false;
    }

    pub fn state(&self) -> RequestState<T> {
        self.inner.lock().state.clone()
    }

    pub fn data(&self) -> Option<T> {
        self.inner.lock().state.data.clone()
    }

    pub fn error(&self) -> Option<ErrorInfo> {
        self.inner.lock().state.error.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.inner.lock().state.loading
    }
}

/// One call of [`RequestHook::execute`]. If the call's future is dropped
/// before completing, loading is cleared as long as no newer call started.
struct InFlight<T> {
    inner: Arc<Mutex<Inner<T>>>,
    ticket: u64,
    settled: bool,
}

impl<T> InFlight<T> {
    /// Apply `f` if this call is still the latest. Returns whether it was.
    fn settle(&mut self, f: impl FnOnce(&mut RequestState<T>)) -> bool {
        self.settled = true;
        let mut inner = self.inner.lock();
        if inner.latest != self.ticket {
            tracing::debug!(
                ticket = self.ticket,
                latest = inner.latest,
                "discarding stale response"
            );
            return false;
        }
        f(&mut inner.state);
        true
    }
}

impl<T> Drop for InFlight<T> {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        let mut inner = self.inner.lock();
        if inner.latest == self.ticket {
            inner.state.loading = false;
        }
    }
}
