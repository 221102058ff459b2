//! rowgraph: hydrate flat tabular query results into typed object graphs.
//!
//! This is the facade crate. It re-exports the hydration core
//! (`rowgraph-core`) and SQL text generation (`rowgraph-query`), and adds:
//!
//! - [`Mapper`], which runs SQL through a [`Connection`] and hydrates the
//!   rows it gets back.
//! - The join splitter ([`assemble_join`], [`Mapper::join`]), which turns one
//!   flat two-table join into parents with nested children.
//! - Paged fetching ([`Mapper::page`], [`PagedData`]).
//! - [`RowOptions`], which sets column offsets, a field subset and a per-row
//!   callback for the mapper's hydrating queries.
//! - [`MapperConfig`], loadable from JSON.
//!
//! # Example
//!
//! ```ignore
//! use rowgraph::prelude::*;
//!
//! #[derive(Debug, Default)]
//! struct Project {
//!     id: i64,
//!     name: String,
//!     comments: Vec<Comment>,
//! }
//!
//! impl Entity for Project {
//!     const TABLE_NAME: &'static str = "Project";
//!
//!     fn fields() -> Vec<FieldDef<Self>> {
//!         vec![
//!             FieldDef::column(mapped_column!(Project, id).primary_key()),
//!             FieldDef::column(mapped_column!(Project, name)),
//!             FieldDef::collection("comments"),
//!         ]
//!     }
//! }
//!
//! let mapper = Mapper::new(conn);
//! let projects: Vec<Project> = mapper
//!     .left_join(&cx, "ProjectID", ChildField::many(|p: &mut Project, c| p.comments = c), None, &[])
//!     .await
//!     .unwrap();
//! ```

pub mod config;
pub mod join;
pub mod mapper;
pub mod page;

pub use config::MapperConfig;
pub use join::{ChildField, JoinRequest, RelationshipKind, assemble_join};
pub use mapper::{Mapper, RowOptions};
pub use page::PagedData;

pub use rowgraph_core::{
    BatchHydrator, Bootstrap, ColumnDescriptor, Connection, ConversionError, Cx, Entity,
    EntityMapping, Error, FieldDef, FieldKind, FromValue, Hydrate, HydrateSite, HydrationContext,
    KeyedLists, MappingBuilder, MappingSummary, Outcome, Result, Row, RowCallback, RowCursor,
    RowHydrator, RowSet, SchemaRegistry, ToValue, Value, ValueKey, hydrate, hydrate_by_name,
    hydrate_entity, hydrate_list, hydrate_list_per_key, hydrate_non_null_list,
    hydrate_non_null_list_per_key, hydrate_non_null_unique_keyed, hydrate_non_null_unique_list,
    hydrate_unique_keyed, hydrate_unique_list, mapped_column,
};
pub use rowgraph_query::{
    JoinKind, JoinSpec, PageQueries, PagingConfig, build_join_sql, build_page_queries,
    build_page_queries_with, columns_list, safe_order_by, select_sql,
};

/// The types most applications need.
pub mod prelude {
    pub use crate::{
        BatchHydrator, ChildField, Connection, Cx, Entity, EntityMapping, Error, FieldDef,
        HydrationContext, JoinKind, JoinRequest, Mapper, MapperConfig, Outcome, PagedData, Result,
        Row, RowOptions, RowSet, SchemaRegistry, Value, mapped_column,
    };
}
