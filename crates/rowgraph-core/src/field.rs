//! Column descriptors: per-field metadata plus the accessors used to read and
//! write a field on an entity instance.
//!
//! Accessors are resolved once, when a descriptor is built, from a pair of
//! field projections. Hydration then assigns fields through these stored
//! closures without any per-row lookup.

use std::fmt;
use std::sync::Arc;

use crate::value::{ConversionError, FromValue, ToValue, Value};

/// Broad classification of a field's declared type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind {
    Bool,
    Integer,
    Float,
    Decimal,
    Text,
    Bytes,
    /// A user enumeration stored as text or an integer code.
    Enum,
    Temporal,
    Uuid,
    Json,
    /// A value type passed through unchanged (e.g. [`Value`] itself).
    Opaque,
    /// A single related entity. Never populated from one cell.
    Reference,
    /// A list of related entities. Never populated from one cell.
    Collection,
}

impl FieldKind {
    /// Whether a field of this kind can be populated from a single cell.
    pub const fn is_hydratable(self) -> bool {
        !matches!(self, FieldKind::Reference | FieldKind::Collection)
    }
}

type Setter<T> = Arc<dyn Fn(&mut T, &Value) -> Result<(), ConversionError> + Send + Sync>;
type Getter<T> = Arc<dyn Fn(&T) -> Value + Send + Sync>;

/// Metadata and accessors for one mapped column of entity `T`.
pub struct ColumnDescriptor<T> {
    name: &'static str,
    column_name: &'static str,
    ordinal: usize,
    nullable: bool,
    primary_key: bool,
    kind: FieldKind,
    setter: Setter<T>,
    getter: Getter<T>,
}

impl<T: 'static> ColumnDescriptor<T> {
    /// Build a descriptor from a shared and a mutable projection of the field.
    ///
    /// Nullability and kind are taken from the field type `F`.
    pub fn new<F, G, M>(name: &'static str, get: G, get_mut: M) -> Self
    where
        F: FromValue + ToValue + 'static,
        G: Fn(&T) -> &F + Send + Sync + 'static,
        M: Fn(&mut T) -> &mut F + Send + Sync + 'static,
    {
        Self {
            name,
            column_name: name,
            ordinal: 0,
            nullable: F::NULLABLE,
            primary_key: false,
            kind: F::KIND,
            setter: Arc::new(move |entity: &mut T, value: &Value| {
                *get_mut(entity) = F::from_value(value)?;
                Ok(())
            }),
            getter: Arc::new(move |entity: &T| get(entity).to_value()),
        }
    }
}

impl<T> ColumnDescriptor<T> {
    /// Set the database column name when it differs from the field name.
    pub fn column(mut self, column_name: &'static str) -> Self {
        self.column_name = column_name;
        self
    }

    /// Mark the column as (part of) the primary key.
    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    /// Override the inferred kind, e.g. [`FieldKind::Enum`] for an enum
    /// stored as text.
    pub fn kind(mut self, kind: FieldKind) -> Self {
        self.kind = kind;
        self
    }

    pub(crate) fn with_ordinal(mut self, ordinal: usize) -> Self {
        self.ordinal = ordinal;
        self
    }

    /// Field name on the entity.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Column name in the database.
    pub fn column_name(&self) -> &'static str {
        self.column_name
    }

    /// Position within the owning mapping's column list.
    pub fn ordinal(&self) -> usize {
        self.ordinal
    }

    pub fn is_nullable(&self) -> bool {
        self.nullable
    }

    pub fn is_primary_key(&self) -> bool {
        self.primary_key
    }

    pub fn field_kind(&self) -> FieldKind {
        self.kind
    }

    /// Assign `value` to this field on `entity`.
    pub fn set(&self, entity: &mut T, value: &Value) -> Result<(), ConversionError> {
        (self.setter)(entity, value)
    }

    /// Read this field from `entity`.
    pub fn get(&self, entity: &T) -> Value {
        (self.getter)(entity)
    }
}

impl<T> Clone for ColumnDescriptor<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            column_name: self.column_name,
            ordinal: self.ordinal,
            nullable: self.nullable,
            primary_key: self.primary_key,
            kind: self.kind,
            setter: Arc::clone(&self.setter),
            getter: Arc::clone(&self.getter),
        }
    }
}

impl<T> fmt::Debug for ColumnDescriptor<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ColumnDescriptor")
            .field("name", &self.name)
            .field("column_name", &self.column_name)
            .field("ordinal", &self.ordinal)
            .field("nullable", &self.nullable)
            .field("primary_key", &self.primary_key)
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

/// One declared field of an entity, as reported by [`Entity::fields`](crate::Entity::fields).
///
/// Relationship fields are listed so introspection can see the whole shape of
/// the type, but they carry no accessor and are skipped when a mapping is
/// built.
pub struct FieldDef<T> {
    name: &'static str,
    kind: FieldKind,
    column: Option<ColumnDescriptor<T>>,
}

impl<T> FieldDef<T> {
    /// A field backed by a single cell.
    pub fn column(descriptor: ColumnDescriptor<T>) -> Self {
        Self {
            name: descriptor.name,
            kind: descriptor.kind,
            column: Some(descriptor),
        }
    }

    /// A field holding one related entity.
    pub fn reference(name: &'static str) -> Self {
        Self {
            name,
            kind: FieldKind::Reference,
            column: None,
        }
    }

    /// A field holding a list of related entities.
    pub fn collection(name: &'static str) -> Self {
        Self {
            name,
            kind: FieldKind::Collection,
            column: None,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn kind(&self) -> FieldKind {
        self.kind
    }

    /// The column descriptor, if this field can be hydrated from one cell.
    pub fn into_column(self) -> Option<ColumnDescriptor<T>> {
        if self.kind.is_hydratable() {
            self.column
        } else {
            None
        }
    }
}

/// Build a [`ColumnDescriptor`] for a struct field.
///
/// ```ignore
/// let id = mapped_column!(Project, id).primary_key();
/// ```
#[macro_export]
macro_rules! mapped_column {
    ($entity:ty, $field:ident) => {
        $crate::ColumnDescriptor::<$entity>::new(
            stringify!($field),
            |e: &$entity| &e.$field,
            |e: &mut $entity| &mut e.$field,
        )
    };
}
