pub mod listing;
pub mod test_utils;

pub use listing::{ListQuery, Listable, Page, SortDirection, SortState, SortValue};
