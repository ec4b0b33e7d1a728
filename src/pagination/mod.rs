//! Pagination module
//!
//! Offset paging over the catalog's list and search endpoints.
//!
//! # Overview
//!
//! A search reports the total number of matches alongside each page. The
//! pager walks `offset`/`limit` windows until that total is reached, a short
//! page comes back, or an optional record cap is hit.

mod types;

pub use types::{NextPage, OffsetPager, PaginationState, StopCondition};
