use parking_lot::Mutex;
use payloads::requests::PageRequest;
use payloads::responses::Page;
use std::future::Future;
use std::sync::Arc;

use super::use_request::{RequestHook, RequestOptions};
use crate::contexts::toast::ToastDispatcher;
use crate::error::ErrorInfo;
use crate::state::{PaginatedState, Pagination, RequestState};

pub const DEFAULT_PAGE_SIZE: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Cursor {
    current_page: u32,
    page_size: u32,
}

/// `page` within `[1, total_pages]`, or at least 1 while the page count is
/// unknown.
fn clamp_page(page: u32, total_pages: u32) -> u32 {
    if total_pages > 0 {
        page.clamp(1, total_pages)
    } else {
        page.max(1)
    }
}

/// A [`RequestHook`] over a paged list endpoint, with a page cursor.
///
/// Navigation outside the known page range is a no-op that hands back the
/// data already loaded.
pub struct PaginatedHook<T> {
    inner: RequestHook<PageRequest, Page<T>>,
    cursor: Arc<Mutex<Cursor>>,
    pagination: Arc<Mutex<Pagination>>,
}

impl<T> Clone for PaginatedHook<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            cursor: self.cursor.clone(),
            pagination: self.pagination.clone(),
        }
    }
}

impl<T> PaginatedHook<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new<F, Fut, E>(
        toasts: ToastDispatcher,
        mut options: RequestOptions<Page<T>>,
        page_size: u32,
        operation: F,
    ) -> Self
    where
        F: Fn(PageRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Page<T>, E>> + Send + 'static,
        E: Into<ErrorInfo> + Send + 'static,
    {
        let page_size = page_size.max(1);
        let cursor = Arc::new(Mutex::new(Cursor {
            current_page: 1,
            page_size,
        }));
        let pagination = Arc::new(Mutex::new(Pagination::empty(page_size)));

        // Pagination only follows responses the request hook accepted, so a
        // stale page can't overwrite it.
        let user_on_success = options.on_success.take();
        options.on_success = Some({
            let cursor = cursor.clone();
            let pagination = pagination.clone();
            Arc::new(move |page: &Page<T>| {
                let mut cursor = cursor.lock();
                cursor.current_page =
                    clamp_page(cursor.current_page, page.total_pages);
                *pagination.lock() = Pagination {
                    current: cursor.current_page,
                    total: page.total,
                    page_size: if page.limit > 0 {
                        page.limit
                    } else {
                        cursor.page_size
                    },
                    total_pages: page.total_pages,
                };
                drop(cursor);
                if let Some(on_success) = &user_on_success {
                    on_success(page);
                }
            })
        });

        Self {
            inner: RequestHook::new(toasts, options, operation),
            cursor,
            pagination,
        }
    }

    /// Load `page` with the current page size.
    ///
    /// The page is clamped to the known range first. If the load fails the
    /// cursor goes back to where it was.
    pub async fn load_page(&self, page: u32) -> Result<Vec<T>, ErrorInfo> {
        let total_pages = self.pagination().total_pages;
        let (previous, requested) = {
            let mut cursor = self.cursor.lock();
            let previous = *cursor;
            cursor.current_page = clamp_page(page, total_pages);
            (previous, *cursor)
        };
        tracing::debug!(
            page = requested.current_page,
            page_size = requested.page_size,
            "loading page"
        );
        let request =
            PageRequest::new(requested.current_page, requested.page_size);
        match self.inner.execute(request).await {
            Ok(page) => Ok(page.data),
            Err(e) => {
                let mut cursor = self.cursor.lock();
                if *cursor == requested {
                    cursor.current_page = previous.current_page;
                }
                Err(e)
            }
        }
    }

    pub async fn next_page(&self) -> Result<Option<Vec<T>>, ErrorInfo> {
        let current = self.current_page();
        if current >= self.pagination().total_pages {
            return Ok(self.data());
        }
        self.load_page(current + 1).await.map(Some)
    }

    pub async fn previous_page(&self) -> Result<Option<Vec<T>>, ErrorInfo> {
        let current = self.current_page();
        if current <= 1 {
            return Ok(self.data());
        }
        self.load_page(current - 1).await.map(Some)
    }

    pub async fn go_to_page(
        &self,
        page: u32,
    ) -> Result<Option<Vec<T>>, ErrorInfo> {
        let pagination = self.pagination();
        if page < 1 || (pagination.is_known() && page > pagination.total_pages)
        {
            tracing::debug!(
                page,
                total_pages = pagination.total_pages,
                "page out of range"
            );
            return Ok(self.data());
        }
        self.load_page(page).await.map(Some)
    }

    /// Reload the current page.
    pub async fn refresh(&self) -> Result<Vec<T>, ErrorInfo> {
        self.load_page(self.current_page()).await
    }

    /// Change the page size. The cursor goes back to the first page and any
    /// load in flight is discarded; nothing is loaded until the next
    /// navigation.
    pub fn set_page_size(&self, page_size: u32) {
        self.inner.cancel();
        let mut cursor = self.cursor.lock();
        cursor.page_size = page_size.max(1);
        cursor.current_page = 1;

        let mut pagination = self.pagination.lock();
        *pagination = if pagination.total > 0 {
            let total_pages =
                pagination.total.div_ceil(cursor.page_size.into());
            Pagination {
                current: 1,
                total: pagination.total,
                page_size: cursor.page_size,
                total_pages: u32::try_from(total_pages).unwrap_or(u32::MAX),
            }
        } else {
            Pagination::empty(cursor.page_size)
        };
    }

    pub fn reset(&self) {
        self.inner.reset();
        let mut cursor = self.cursor.lock();
        cursor.current_page = 1;
        *self.pagination.lock() = Pagination::empty(cursor.page_size);
    }

    pub fn cancel(&self) {
        self.inner.cancel();
    }

    pub fn current_page(&self) -> u32 {
        self.cursor.lock().current_page
    }

    pub fn page_size(&self) -> u32 {
        self.cursor.lock().page_size
    }

    pub fn pagination(&self) -> Pagination {
        *self.pagination.lock()
    }

    pub fn data(&self) -> Option<Vec<T>> {
        self.inner.data().map(|page| page.data)
    }

    pub fn error(&self) -> Option<ErrorInfo> {
        self.inner.error()
    }

    pub fn is_loading(&self) -> bool {
        self.inner.is_loading()
    }

    pub fn state(&self) -> PaginatedState<T> {
        let RequestState {
            data,
            loading,
            error,
        } = self.inner.state();
        PaginatedState {
            request: RequestState {
                data: data.map(|page| page.data),
                loading,
                error,
            },
            current_page: self.current_page(),
            pagination: self.pagination(),
        }
    }
}
