pub mod toast;

pub use toast::{NewToast, ToastDispatcher, ToastKind, ToastMessage};
