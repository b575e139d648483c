use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

pub const DEFAULT_TOAST_DURATION_MS: i64 = 5000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastKind {
    Success,
    Error,
    Warning,
    Info,
}

/// A toast as displayed. Created by [`ToastDispatcher::show`].
#[derive(Debug, Clone, PartialEq)]
pub struct ToastMessage {
    pub id: Uuid,
    pub kind: ToastKind,
    pub title: String,
    pub message: Option<String>,
    /// Milliseconds before auto-dismiss; zero or negative disables it.
    pub duration_ms: i64,
}

/// A toast that hasn't been dispatched yet.
#[derive(Debug, Clone, PartialEq)]
pub struct NewToast {
    pub kind: ToastKind,
    pub title: String,
    pub message: Option<String>,
    pub duration_ms: Option<i64>,
}

impl NewToast {
    pub fn new(kind: ToastKind, title: impl Into<String>) -> Self {
        Self {
            kind,
            title: title.into(),
            message: None,
            duration_ms: None,
        }
    }

    pub fn success(title: impl Into<String>) -> Self {
        Self::new(ToastKind::Success, title)
    }

    pub fn error(title: impl Into<String>) -> Self {
        Self::new(ToastKind::Error, title)
    }

    pub fn warning(title: impl Into<String>) -> Self {
        Self::new(ToastKind::Warning, title)
    }

    pub fn info(title: impl Into<String>) -> Self {
        Self::new(ToastKind::Info, title)
    }

    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn duration(mut self, duration_ms: i64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }

    pub fn no_auto_dismiss(mut self) -> Self {
        self.duration_ms = Some(0);
        self
    }
}

/// Shared handle to the toast queue. Clones dispatch into the same queue.
#[derive(Clone)]
pub struct ToastDispatcher {
    toasts: Arc<Mutex<Vec<ToastMessage>>>,
    default_duration_ms: i64,
}

impl Default for ToastDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl ToastDispatcher {
    pub fn new() -> Self {
        Self::with_default_duration(DEFAULT_TOAST_DURATION_MS)
    }

    pub fn with_default_duration(default_duration_ms: i64) -> Self {
        Self {
            toasts: Arc::new(Mutex::new(Vec::new())),
            default_duration_ms,
        }
    }

    /// Queue a toast and schedule its removal. Returns the new toast's id.
    pub fn show(&self, toast: NewToast) -> Uuid {
        let toast = ToastMessage {
            id: Uuid::new_v4(),
            kind: toast.kind,
            title: toast.title,
            message: toast.message,
            duration_ms: toast.duration_ms.unwrap_or(self.default_duration_ms),
        };
        let id = toast.id;
        let duration_ms = toast.duration_ms;
        tracing::debug!(
            %id,
            kind = ?toast.kind,
            title = %toast.title,
            "show toast"
        );

        self.toasts.lock().push(toast);

        if duration_ms > 0 {
            self.schedule_removal(id, duration_ms.unsigned_abs());
        }
        id
    }

    fn schedule_removal(&self, id: Uuid, duration_ms: u64) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::warn!(%id, "no async runtime; toast won't auto-dismiss");
            return;
        };
        // The task only holds a weak reference so a dropped queue isn't kept
        // alive by pending timers.
        let toasts = Arc::downgrade(&self.toasts);
        runtime.spawn(async move {
            tokio::time::sleep(Duration::from_millis(duration_ms)).await;
            if let Some(toasts) = toasts.upgrade() {
                toasts.lock().retain(|toast| toast.id != id);
            }
        });
    }

    pub fn hide(&self, id: Uuid) {
        self.toasts.lock().retain(|toast| toast.id != id);
    }

    /// Empty the queue. Pending auto-dismiss timers fire as no-ops.
    pub fn clear_all(&self) {
        self.toasts.lock().clear();
    }

    /// Snapshot of queued toasts in display order.
    pub fn toasts(&self) -> Vec<ToastMessage> {
        self.toasts.lock().clone()
    }

    pub fn get(&self, id: Uuid) -> Option<ToastMessage> {
        self.toasts.lock().iter().find(|t| t.id == id).cloned()
    }

    pub fn len(&self) -> usize {
        self.toasts.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.toasts.lock().is_empty()
    }

    pub fn success(
        &self,
        title: impl Into<String>,
        message: impl Into<String>,
    ) -> Uuid {
        self.show(NewToast::success(title).message(message))
    }

    pub fn error(
        &self,
        title: impl Into<String>,
        message: impl Into<String>,
    ) -> Uuid {
        self.show(NewToast::error(title).message(message))
    }

    pub fn warning(
        &self,
        title: impl Into<String>,
        message: impl Into<String>,
    ) -> Uuid {
        self.show(NewToast::warning(title).message(message))
    }

    pub fn info(
        &self,
        title: impl Into<String>,
        message: impl Into<String>,
    ) -> Uuid {
        self.show(NewToast::info(title).message(message))
    }
}
