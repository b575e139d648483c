use crate::error::ErrorInfo;

/// Observable state of a request hook.
///
/// After the first call completes, either `loading` is set or exactly one of
/// `data` and `error` is.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestState<T> {
    pub data: Option<T>,
    pub loading: bool,
    pub error: Option<ErrorInfo>,
}

impl<T> Default for RequestState<T> {
    fn default() -> Self {
        Self {
            data: None,
            loading: false,
            error: None,
        }
    }
}

impl<T> RequestState<T> {
    pub fn loading() -> Self {
        Self {
            data: None,
            loading: true,
            error: None,
        }
    }

    pub fn is_idle(&self) -> bool {
        !self.loading && self.data.is_none() && self.error.is_none()
    }

    pub(crate) fn resolve(&mut self, data: T) {
        self.data = Some(data);
        self.error = None;
        self.loading = false;
    }

    pub(crate) fn fail(&mut self, error: ErrorInfo) {
        self.data = None;
        self.error = Some(error);
        self.loading = false;
    }
}

/// Pagination view derived from the last successful page response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub current: u32,
    pub total: u64,
    pub page_size: u32,
    pub total_pages: u32,
}

impl Pagination {
    /// The view before anything has loaded.
    pub fn empty(page_size: u32) -> Self {
        Self {
            current: 0,
            total: 0,
            page_size,
            total_pages: 0,
        }
    }

    pub fn is_known(&self) -> bool {
        self.total_pages > 0
    }

    pub fn has_next(&self) -> bool {
        self.current < self.total_pages
    }

    pub fn has_previous(&self) -> bool {
        self.current > 1
    }
}

/// Request state of a paginated hook together with its page cursor.
#[derive(Debug, Clone, PartialEq)]
pub struct PaginatedState<T> {
    pub request: RequestState<Vec<T>>,
    pub current_page: u32,
    pub pagination: Pagination,
}
