//! The `Entity` trait implemented by hydratable composite types.

use crate::field::FieldDef;

/// A composite type that can be hydrated from a flat row segment.
///
/// `fields` lists every declared field in declaration order. It is only
/// consulted when no explicit mapping was registered (see
/// [`SchemaRegistry::resolve`](crate::SchemaRegistry::resolve)); relationship
/// fields may be listed and are ignored by hydration.
///
/// # Example
///
/// ```ignore
/// #[derive(Default)]
/// struct Project {
///     id: i64,
///     name: String,
///     comments: Vec<Comment>,
/// }
///
/// impl Entity for Project {
///     const TABLE_NAME: &'static str = "Project";
///
///     fn fields() -> Vec<FieldDef<Self>> {
///         vec![
///             FieldDef::column(mapped_column!(Project, id).primary_key()),
///             FieldDef::column(mapped_column!(Project, name)),
///             FieldDef::collection("comments"),
///         ]
///     }
/// }
/// ```
pub trait Entity: Default + Send + Sync + 'static {
    /// Table (and default alias) the entity is read from.
    const TABLE_NAME: &'static str;

    fn fields() -> Vec<FieldDef<Self>>;
}
