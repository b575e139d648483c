pub mod use_paginated_request;
pub mod use_request;

pub use use_paginated_request::{DEFAULT_PAGE_SIZE, PaginatedHook};
pub use use_request::{RequestHook, RequestOptions};
