//! Client-side session and request lifecycle for the events platform.
//!
//! [`auth::SessionManager`] owns the persisted session. The request hooks
//! track one async operation each and report failures through the toast
//! queue in [`contexts::toast`].

pub mod auth;
pub mod config;
pub mod contexts;
pub mod error;
pub mod forms;
pub mod guard;
pub mod hooks;
pub mod state;
pub mod storage;
pub mod telemetry;
pub mod theme;
pub mod time;

pub use auth::{Session, SessionError, SessionManager};
pub use config::ClientConfig;
pub use contexts::toast::{ToastDispatcher, ToastKind, ToastMessage};
pub use error::ErrorInfo;
pub use hooks::{PaginatedHook, RequestHook, RequestOptions};
pub use state::{PaginatedState, Pagination, RequestState};
