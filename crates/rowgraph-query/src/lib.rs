//! SQL text generation for rowgraph.
//!
//! Everything here is a pure function from mappings and strings to SQL text:
//!
//! - [`build_page_queries`] rewrites a `SELECT` into a count query and a
//!   `ROW_NUMBER()`-windowed page query.
//! - [`build_join_sql`] builds the flat two-table join the join splitter
//!   hydrates from.
//! - [`columns_list`], [`select_sql`] and [`safe_order_by`] render mapping
//!   columns and validate user-supplied orderings.

pub mod columns;
pub mod join;
pub mod paging;
mod scan;

pub use columns::{DEFAULT_WHERE, columns_list, safe_order_by, select_sql};
pub use join::{JoinKind, JoinSpec, build_join_sql};
pub use paging::{PageQueries, PagingConfig, build_page_queries, build_page_queries_with};
