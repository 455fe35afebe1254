//! Client-side list pipeline: filter, then sort, then paginate.
//!
//! Everything here is pure and works on borrowed records, so the board can
//! recompute the visible page on every keystroke without touching the
//! fetched collection.

pub mod filter;
pub mod page;
pub mod sort;

use chrono::{DateTime, Utc};

pub use filter::Criteria;
pub use page::{paginate, Page, Pagination};
pub use sort::{Sort, SortDirection, SortField};

/// What the pipeline needs to know about a record.
pub trait Listable {
    fn id(&self) -> &str;
    fn title(&self) -> &str;
    fn description(&self) -> &str;
    fn status_key(&self) -> Option<&str>;
    fn priority_key(&self) -> Option<&str> {
        None
    }
    fn priority_rank(&self) -> u8 {
        0
    }
    /// Position in the record's workflow, used when sorting by status.
    fn status_rank(&self) -> u8 {
        0
    }
    fn category(&self) -> Option<&str>;
    fn assignee(&self) -> Option<&str>;
    fn tags(&self) -> &[String];
    fn created_at(&self) -> DateTime<Utc>;
    fn updated_at(&self) -> DateTime<Utc>;
}

/// Filter then sort. `sort: None` keeps collection order.
pub fn apply<'a, T: Listable>(items: &'a [T], criteria: &Criteria, sort: Option<Sort>) -> Vec<&'a T> {
    let mut out: Vec<&T> = items.iter().filter(|item| criteria.matches(*item)).collect();
    if let Some(sort) = sort {
        sort::sort_items(&mut out, sort);
    }
    out
}
