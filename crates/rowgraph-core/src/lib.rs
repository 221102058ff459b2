//! Core types and hydration for rowgraph.
//!
//! `rowgraph-core` turns flat, tabular query results into typed values and
//! object graphs. It never executes SQL itself.
//!
//! # Role In The Architecture
//!
//! - **Data model**: [`Value`], [`Row`] and [`RowSet`] are what a query
//!   collaborator hands back; [`Value::Null`] is the null sentinel.
//! - **Schema registry**: [`SchemaRegistry`] caches one [`EntityMapping`] per
//!   entity type, built from an explicit registration or lazily from
//!   [`Entity::fields`].
//! - **Row hydrator**: [`hydrate`] maps a row segment (starting column plus
//!   sentinel column) to a scalar or an entity.
//! - **Graph assembler**: list, unique-by-key and per-key batch hydration in
//!   [`graph`], the building blocks for one-to-many materialization. Batches
//!   run through a [`BatchHydrator`], which resolves the mapping once and can
//!   carry a per-row callback.
//! - **Collaborator contract**: [`Connection`] is implemented by whatever runs
//!   the SQL. It is async over asupersync; hydration is synchronous.
//!
//! SQL text generation lives in `rowgraph-query`; most applications should
//! use the `rowgraph` facade.

pub use asupersync::{Cx, Outcome};

pub mod connection;
pub mod entity;
pub mod error;
pub mod field;
pub mod graph;
pub mod hydrate;
pub mod mapping;
pub mod registry;
pub mod row;
pub mod value;

pub use connection::Connection;
pub use entity::Entity;
pub use error::{Error, HydrateSite, Result};
pub use field::{ColumnDescriptor, FieldDef, FieldKind};
pub use graph::{
    KeyedLists, hydrate_list, hydrate_list_per_key, hydrate_non_null_list,
    hydrate_non_null_list_per_key, hydrate_non_null_unique_keyed, hydrate_non_null_unique_list,
    hydrate_unique_keyed, hydrate_unique_list,
};
pub use hydrate::{
    BatchHydrator, Hydrate, HydrationContext, RowCallback, RowCursor, hydrate, hydrate_by_name,
    hydrate_entity,
};
pub use mapping::{EntityMapping, MappingBuilder, MappingSummary, RowHydrator};
pub use registry::{Bootstrap, SchemaRegistry};
pub use row::{Row, RowSet};
pub use value::{ConversionError, FromValue, ToValue, Value, ValueKey};
