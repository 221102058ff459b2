//! Entity mappings: the registered shape of a composite type.

use std::collections::HashMap;
use std::fmt;

use serde::Serialize;

use crate::entity::Entity;
use crate::error::{Error, Result};
use crate::field::ColumnDescriptor;
use crate::value::Value;

/// A precompiled hydrator: builds `T` from `row[starting_column..]` directly.
///
/// Must behave exactly like generic field-by-field hydration, including
/// leaving fields past the end of a narrower row at their defaults. Use
/// [`RowCursor`](crate::RowCursor) to get that behaviour for free.
pub type RowHydrator<T> = fn(&[Value], usize) -> Result<T>;

/// Ordered columns, key columns and accessors for entity `T`.
///
/// Column order is significant: it is the physical column order assumed by
/// positional hydration. Immutable once built.
pub struct EntityMapping<T> {
    type_name: &'static str,
    table_name: &'static str,
    columns: Vec<ColumnDescriptor<T>>,
    by_name: HashMap<&'static str, usize>,
    primary_keys: Vec<usize>,
    hydrator: Option<RowHydrator<T>>,
}

impl<T: 'static> EntityMapping<T> {
    /// Start an explicit registration for `T` backed by `table_name`.
    pub fn builder(table_name: &'static str) -> MappingBuilder<T> {
        MappingBuilder {
            table_name,
            columns: Vec::new(),
            hydrator: None,
        }
    }
}

impl<T: Entity> EntityMapping<T> {
    /// Build a mapping from the fields `T` declares, keeping only those that
    /// can be populated from a single cell.
    pub fn introspect() -> Result<Self> {
        let mut builder = Self::builder(T::TABLE_NAME);
        for field in T::fields() {
            if let Some(column) = field.into_column() {
                builder = builder.column(column);
            }
        }
        if builder.columns.is_empty() {
            return Err(Error::MappingNotFound {
                type_name: std::any::type_name::<T>(),
            });
        }
        Ok(builder.build())
    }
}

impl<T> EntityMapping<T> {
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn table_name(&self) -> &'static str {
        self.table_name
    }

    pub fn columns(&self) -> &[ColumnDescriptor<T>] {
        &self.columns
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Column names in mapping order.
    pub fn column_names(&self) -> Vec<&'static str> {
        self.columns.iter().map(|c| c.column_name()).collect()
    }

    /// Look a column up by field name.
    pub fn field(&self, name: &str) -> Option<&ColumnDescriptor<T>> {
        self.by_name.get(name).map(|&i| &self.columns[i])
    }

    /// Look a column up by database column name, case-insensitively.
    pub fn column_by_name(&self, column_name: &str) -> Option<&ColumnDescriptor<T>> {
        self.columns
            .iter()
            .find(|c| c.column_name().eq_ignore_ascii_case(column_name))
    }

    /// Positions of the primary-key columns.
    pub fn primary_keys(&self) -> &[usize] {
        &self.primary_keys
    }

    /// Position of the single primary-key column.
    ///
    /// Composite or missing keys are rejected rather than silently using the
    /// first key column.
    pub fn primary_key_index(&self) -> Result<usize> {
        match self.primary_keys.as_slice() {
            [index] => Ok(*index),
            keys => Err(Error::UnsupportedKey {
                type_name: self.type_name,
                key_columns: keys.len(),
            }),
        }
    }

    /// The single primary-key column.
    pub fn primary_key(&self) -> Result<&ColumnDescriptor<T>> {
        self.primary_key_index().map(|i| &self.columns[i])
    }

    /// Read the primary-key values off an instance.
    pub fn primary_key_values(&self, entity: &T) -> Vec<Value> {
        self.primary_keys
            .iter()
            .map(|&i| self.columns[i].get(entity))
            .collect()
    }

    pub fn hydrator(&self) -> Option<RowHydrator<T>> {
        self.hydrator
    }

    /// A serializable description, used for diagnostics.
    pub fn summary(&self) -> MappingSummary {
        MappingSummary {
            type_name: self.type_name,
            table_name: self.table_name,
            columns: self.column_names(),
            primary_keys: self
                .primary_keys
                .iter()
                .map(|&i| self.columns[i].column_name())
                .collect(),
            precompiled: self.hydrator.is_some(),
        }
    }
}

impl<T> fmt::Debug for EntityMapping<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityMapping")
            .field("type_name", &self.type_name)
            .field("table_name", &self.table_name)
            .field("columns", &self.columns)
            .field("primary_keys", &self.primary_keys)
            .field("precompiled", &self.hydrator.is_some())
            .finish()
    }
}

/// Builder for explicit registrations.
pub struct MappingBuilder<T> {
    table_name: &'static str,
    columns: Vec<ColumnDescriptor<T>>,
    hydrator: Option<RowHydrator<T>>,
}

impl<T: 'static> MappingBuilder<T> {
    /// Append a column. Order of calls is the physical column order.
    pub fn column(mut self, column: ColumnDescriptor<T>) -> Self {
        let ordinal = self.columns.len();
        self.columns.push(column.with_ordinal(ordinal));
        self
    }

    /// Attach a precompiled hydrator used as a fast path.
    pub fn hydrator(mut self, hydrator: RowHydrator<T>) -> Self {
        self.hydrator = Some(hydrator);
        self
    }

    pub fn build(self) -> EntityMapping<T> {
        let by_name = self
            .columns
            .iter()
            .enumerate()
            .map(|(i, c)| (c.name(), i))
            .collect();
        let primary_keys = self
            .columns
            .iter()
            .enumerate()
            .filter(|(_, c)| c.is_primary_key())
            .map(|(i, _)| i)
            .collect();
        EntityMapping {
            type_name: std::any::type_name::<T>(),
            table_name: self.table_name,
            columns: self.columns,
            by_name,
            primary_keys,
            hydrator: self.hydrator,
        }
    }
}

/// Serializable view of a registered mapping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MappingSummary {
    pub type_name: &'static str,
    pub table_name: &'static str,
    pub columns: Vec<&'static str>,
    pub primary_keys: Vec<&'static str>,
    pub precompiled: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapped_column;
    use crate::field::FieldDef;

    #[derive(Debug, Default)]
    struct Account {
        id: i64,
        region: String,
        label: Option<String>,
        #[allow(dead_code)]
        members: Vec<Account>,
    }

    impl Entity for Account {
        const TABLE_NAME: &'static str = "accounts";

        fn fields() -> Vec<FieldDef<Self>> {
            vec![
                FieldDef::column(mapped_column!(Account, id).primary_key()),
                FieldDef::collection("members"),
                FieldDef::column(mapped_column!(Account, region).column("region_code")),
                FieldDef::column(mapped_column!(Account, label)),
            ]
        }
    }

    #[derive(Debug, Default)]
    struct Shapeless {
        #[allow(dead_code)]
        children: Vec<Account>,
    }

    impl Entity for Shapeless {
        const TABLE_NAME: &'static str = "shapeless";

        fn fields() -> Vec<FieldDef<Self>> {
            vec![FieldDef::collection("children")]
        }
    }

    #[test]
    fn test_introspection_skips_relationship_fields() {
        let mapping = EntityMapping::<Account>::introspect().unwrap();
        assert_eq!(mapping.column_names(), vec!["id", "region_code", "label"]);
        assert_eq!(mapping.columns()[1].ordinal(), 1);
        assert_eq!(mapping.primary_key_index(), Ok(0));
        assert!(mapping.field("members").is_none());
        assert_eq!(mapping.field("region").map(|c| c.ordinal()), Some(1));
        assert_eq!(mapping.column_by_name("REGION_CODE").map(|c| c.name()), Some("region"));
    }

    #[test]
    fn test_introspection_without_columns_fails() {
        let err = EntityMapping::<Shapeless>::introspect().unwrap_err();
        assert!(matches!(err, Error::MappingNotFound { .. }));
    }

    #[test]
    fn test_composite_key_is_rejected_for_single_key_paths() {
        let mapping = EntityMapping::<Account>::builder("accounts")
            .column(mapped_column!(Account, id).primary_key())
            .column(mapped_column!(Account, region).primary_key())
            .build();
        assert_eq!(mapping.primary_keys(), &[0, 1]);
        assert!(matches!(
            mapping.primary_key_index(),
            Err(Error::UnsupportedKey { key_columns: 2, .. })
        ));
    }

    #[test]
    fn test_primary_key_values_and_summary() {
        let mapping = EntityMapping::<Account>::introspect().unwrap();
        let account = Account {
            id: 12,
            region: "eu".into(),
            label: None,
            members: Vec::new(),
        };
        assert_eq!(mapping.primary_key_values(&account), vec![Value::BigInt(12)]);

        let summary = mapping.summary();
        assert_eq!(summary.table_name, "accounts");
        assert_eq!(summary.primary_keys, vec!["id"]);
        assert!(!summary.precompiled);
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["columns"][1], "region_code");
    }
}
