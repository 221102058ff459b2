//! Batch hydration over many rows.
//!
//! Everything here goes through a [`BatchHydrator`], so the target's mapping
//! is resolved once per batch. No function reads cells itself except for the
//! grouping key.

use std::collections::{HashMap, HashSet};

use crate::error::{Error, Result};
use crate::hydrate::{BatchHydrator, Hydrate};
use crate::value::{Value, ValueKey};

/// Hydrate every row, keeping absent results in row order.
pub fn hydrate_list<T, R>(rows: &[R], hydrator: &BatchHydrator<'_, T>) -> Result<Vec<Option<T>>>
where
    T: Hydrate,
    R: AsRef<[Value]>,
{
    let out = rows
        .iter()
        .map(|row| hydrator.hydrate(row.as_ref()))
        .collect::<Result<Vec<_>>>()?;
    tracing::trace!(
        target_type = std::any::type_name::<T>(),
        rows = rows.len(),
        "Hydrated list"
    );
    Ok(out)
}

/// Hydrate every row, dropping absent results.
pub fn hydrate_non_null_list<T, R>(rows: &[R], hydrator: &BatchHydrator<'_, T>) -> Result<Vec<T>>
where
    T: Hydrate,
    R: AsRef<[Value]>,
{
    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        if let Some(value) = hydrator.hydrate(row.as_ref())? {
            out.push(value);
        }
    }
    Ok(out)
}

/// Hydrate the first row carrying each distinct `row[key_index]`, paired
/// with that key.
///
/// Later rows with the same key are skipped without being read. First-seen
/// order is preserved, and a first occurrence that hydrates to absent is kept
/// as `None`.
pub fn hydrate_unique_keyed<T, R>(
    rows: &[R],
    key_index: usize,
    hydrator: &BatchHydrator<'_, T>,
) -> Result<Vec<(Value, Option<T>)>>
where
    T: Hydrate,
    R: AsRef<[Value]>,
{
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for row in rows {
        let row = row.as_ref();
        let key = group_key(row, key_index, hydrator)?;
        if !seen.insert(ValueKey::from(key)) {
            continue;
        }
        out.push((key.clone(), hydrator.hydrate(row)?));
    }
    tracing::trace!(
        target_type = std::any::type_name::<T>(),
        rows = rows.len(),
        unique = out.len(),
        "Hydrated unique list"
    );
    Ok(out)
}

/// [`hydrate_unique_keyed`] without the keys.
pub fn hydrate_unique_list<T, R>(
    rows: &[R],
    key_index: usize,
    hydrator: &BatchHydrator<'_, T>,
) -> Result<Vec<Option<T>>>
where
    T: Hydrate,
    R: AsRef<[Value]>,
{
    Ok(hydrate_unique_keyed(rows, key_index, hydrator)?
        .into_iter()
        .map(|(_, value)| value)
        .collect())
}

/// [`hydrate_unique_keyed`] with absent results dropped. An absent first
/// occurrence still claims its key.
pub fn hydrate_non_null_unique_keyed<T, R>(
    rows: &[R],
    key_index: usize,
    hydrator: &BatchHydrator<'_, T>,
) -> Result<Vec<(Value, T)>>
where
    T: Hydrate,
    R: AsRef<[Value]>,
{
    Ok(hydrate_unique_keyed(rows, key_index, hydrator)?
        .into_iter()
        .filter_map(|(key, value)| value.map(|v| (key, v)))
        .collect())
}

/// [`hydrate_unique_list`] with absent results dropped.
pub fn hydrate_non_null_unique_list<T, R>(
    rows: &[R],
    key_index: usize,
    hydrator: &BatchHydrator<'_, T>,
) -> Result<Vec<T>>
where
    T: Hydrate,
    R: AsRef<[Value]>,
{
    Ok(hydrate_unique_keyed(rows, key_index, hydrator)?
        .into_iter()
        .filter_map(|(_, value)| value)
        .collect())
}

/// Group rows by `row[key_index]` and hydrate each row's value into its
/// group's list.
///
/// Every key seen appears in the result, in first-seen order, even when all of
/// its values were absent and `include_nulls` is false.
pub fn hydrate_list_per_key<T, R>(
    rows: &[R],
    key_index: usize,
    include_nulls: bool,
    hydrator: &BatchHydrator<'_, T>,
) -> Result<KeyedLists<Option<T>>>
where
    T: Hydrate,
    R: AsRef<[Value]>,
{
    let mut lists = KeyedLists::new();
    for row in rows {
        let row = row.as_ref();
        let key = group_key(row, key_index, hydrator)?;
        let value = hydrator.hydrate(row)?;
        let group = lists.group_mut(key);
        if value.is_some() || include_nulls {
            group.push(value);
        }
    }
    tracing::trace!(
        target_type = std::any::type_name::<T>(),
        rows = rows.len(),
        groups = lists.len(),
        "Hydrated list per key"
    );
    Ok(lists)
}

/// [`hydrate_list_per_key`] with absent values filtered out.
pub fn hydrate_non_null_list_per_key<T, R>(
    rows: &[R],
    key_index: usize,
    hydrator: &BatchHydrator<'_, T>,
) -> Result<KeyedLists<T>>
where
    T: Hydrate,
    R: AsRef<[Value]>,
{
    let mut lists = KeyedLists::new();
    for row in rows {
        let row = row.as_ref();
        let key = group_key(row, key_index, hydrator)?;
        let value = hydrator.hydrate(row)?;
        let group = lists.group_mut(key);
        if let Some(value) = value {
            group.push(value);
        }
    }
    Ok(lists)
}

fn group_key<'r, T: Hydrate>(
    row: &'r [Value],
    key_index: usize,
    hydrator: &BatchHydrator<'_, T>,
) -> Result<&'r Value> {
    row.get(key_index).ok_or_else(|| {
        Error::OutOfBoundsColumn(hydrator.context().site(
            std::any::type_name::<T>(),
            "<key>",
            key_index,
            row,
        ))
    })
}

/// Lists grouped by key, iterated in first-seen key order.
#[derive(Debug, Clone)]
pub struct KeyedLists<T> {
    index: HashMap<ValueKey, usize>,
    groups: Vec<(Value, Vec<T>)>,
}

impl<T> KeyedLists<T> {
    fn new() -> Self {
        Self {
            index: HashMap::new(),
            groups: Vec::new(),
        }
    }

    fn group_mut(&mut self, key: &Value) -> &mut Vec<T> {
        let slot = match self.index.get(&ValueKey::from(key)) {
            Some(&slot) => slot,
            None => {
                let slot = self.groups.len();
                self.index.insert(ValueKey::from(key), slot);
                self.groups.push((key.clone(), Vec::new()));
                slot
            }
        };
        &mut self.groups[slot].1
    }

    pub fn get(&self, key: &Value) -> Option<&[T]> {
        self.index
            .get(&ValueKey::from(key))
            .map(|&slot| self.groups[slot].1.as_slice())
    }

    pub fn contains_key(&self, key: &Value) -> bool {
        self.index.contains_key(&ValueKey::from(key))
    }

    /// Move a group's list out, leaving an empty list behind. The key stays
    /// present.
    pub fn take(&mut self, key: &Value) -> Option<Vec<T>> {
        let slot = *self.index.get(&ValueKey::from(key))?;
        Some(std::mem::take(&mut self.groups[slot].1))
    }

    pub fn keys(&self) -> impl Iterator<Item = &Value> {
        self.groups.iter().map(|(key, _)| key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Value, &[T])> {
        self.groups.iter().map(|(key, list)| (key, list.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

impl<T> IntoIterator for KeyedLists<T> {
    type Item = (Value, Vec<T>);
    type IntoIter = std::vec::IntoIter<(Value, Vec<T>)>;

    fn into_iter(self) -> Self::IntoIter {
        self.groups.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::Entity;
    use crate::field::FieldDef;
    use crate::hydrate::HydrationContext;
    use crate::mapped_column;
    use crate::registry::SchemaRegistry;

    #[derive(Debug, Default, Clone, PartialEq)]
    struct Comment {
        id: i64,
        body: String,
    }

    impl Entity for Comment {
        const TABLE_NAME: &'static str = "Comment";

        fn fields() -> Vec<FieldDef<Self>> {
            vec![
                FieldDef::column(mapped_column!(Comment, id).primary_key()),
                FieldDef::column(mapped_column!(Comment, body)),
            ]
        }
    }

    /// Rows of `[parent_key, comment_id, comment_body]`.
    fn rows(layout: &[(i64, Option<i64>)]) -> Vec<Vec<Value>> {
        layout
            .iter()
            .map(|&(key, child)| match child {
                Some(id) => vec![Value::BigInt(key), Value::BigInt(id), Value::Text(format!("c{id}"))],
                None => vec![Value::BigInt(key), Value::Null, Value::Null],
            })
            .collect()
    }

    fn comments(registry: &SchemaRegistry) -> BatchHydrator<'_, Comment> {
        BatchHydrator::new(HydrationContext::at(1).registry(registry)).unwrap()
    }

    fn ids(comments: &[Option<Comment>]) -> Vec<Option<i64>> {
        comments.iter().map(|c| c.as_ref().map(|c| c.id)).collect()
    }

    #[test]
    fn test_hydrate_list_keeps_absent_results() {
        let registry = SchemaRegistry::new();
        let rows = rows(&[(1, Some(10)), (1, None), (2, Some(20))]);
        let hydrator = comments(&registry);

        let all = hydrate_list(&rows, &hydrator).unwrap();
        assert_eq!(ids(&all), vec![Some(10), None, Some(20)]);

        let present = hydrate_non_null_list(&rows, &hydrator).unwrap();
        assert_eq!(present.iter().map(|c| c.id).collect::<Vec<_>>(), vec![10, 20]);
    }

    #[test]
    fn test_unique_list_preserves_first_seen_order() {
        let registry = SchemaRegistry::new();
        let rows = rows(&[(1, Some(1)), (1, Some(1)), (2, Some(2)), (1, Some(1)), (3, Some(3))]);

        let unique = hydrate_non_null_unique_list(&rows, 0, &comments(&registry)).unwrap();
        assert_eq!(unique.iter().map(|c| c.id).collect::<Vec<_>>(), vec![1, 2, 3]);
    }

    #[test]
    fn test_unique_list_keeps_absent_first_occurrence() {
        let registry = SchemaRegistry::new();
        let rows = rows(&[(1, None), (1, Some(11)), (2, Some(20))]);
        let hydrator = comments(&registry);

        let unique = hydrate_unique_list(&rows, 0, &hydrator).unwrap();
        assert_eq!(ids(&unique), vec![None, Some(20)]);

        let present = hydrate_non_null_unique_list(&rows, 0, &hydrator).unwrap();
        assert_eq!(present.iter().map(|c| c.id).collect::<Vec<_>>(), vec![20]);

        let keyed = hydrate_non_null_unique_keyed(&rows, 0, &hydrator).unwrap();
        assert_eq!(keyed.len(), 1);
        assert_eq!(keyed[0].0, Value::BigInt(2));
    }

    #[test]
    fn test_unique_list_skips_repeated_rows_without_hydrating_them() {
        let registry = SchemaRegistry::new();
        // The repeat of key 1 carries a cell that would fail conversion.
        let rows = vec![
            vec![Value::BigInt(1), Value::BigInt(1), Value::Text("a".into())],
            vec![Value::BigInt(1), Value::Text("bad".into()), Value::Text("b".into())],
        ];
        let unique = hydrate_unique_keyed(&rows, 0, &comments(&registry)).unwrap();
        assert_eq!(unique.len(), 1);
        assert_eq!(unique[0].0, Value::BigInt(1));
        assert_eq!(unique[0].1.as_ref().map(|c| c.body.as_str()), Some("a"));
    }

    #[test]
    fn test_list_per_key_filters_nulls() {
        let registry = SchemaRegistry::new();
        let rows = rows(&[(1, Some(10)), (1, None), (2, Some(20))]);
        let hydrator = comments(&registry);

        let lists = hydrate_non_null_list_per_key(&rows, 0, &hydrator).unwrap();
        assert_eq!(lists.len(), 2);
        assert_eq!(lists.get(&Value::BigInt(1)).map(<[Comment]>::len), Some(1));
        assert_eq!(lists.get(&Value::BigInt(2)).map(<[Comment]>::len), Some(1));

        let with_nulls = hydrate_list_per_key(&rows, 0, true, &hydrator).unwrap();
        assert_eq!(with_nulls.get(&Value::BigInt(1)).map(<[_]>::len), Some(2));
    }

    #[test]
    fn test_list_per_key_keeps_keys_with_empty_lists() {
        let registry = SchemaRegistry::new();
        let rows = rows(&[(3, None)]);

        let lists = hydrate_list_per_key(&rows, 0, false, &comments(&registry)).unwrap();
        assert!(lists.contains_key(&Value::BigInt(3)));
        assert_eq!(lists.get(&Value::BigInt(3)), Some(&[][..]));
    }

    #[test]
    fn test_list_per_key_groups_in_first_seen_order() {
        let registry = SchemaRegistry::new();
        let rows = rows(&[(5, Some(1)), (2, Some(2)), (5, Some(3)), (9, None)]);

        let lists = hydrate_non_null_list_per_key(&rows, 0, &comments(&registry)).unwrap();
        let keys: Vec<_> = lists.keys().cloned().collect();
        assert_eq!(keys, vec![Value::BigInt(5), Value::BigInt(2), Value::BigInt(9)]);

        let grouped: Vec<(Value, Vec<i64>)> = lists
            .into_iter()
            .map(|(k, list)| (k, list.into_iter().map(|c| c.id).collect()))
            .collect();
        assert_eq!(grouped[0].1, vec![1, 3]);
        assert!(grouped[2].1.is_empty());
    }

    #[test]
    fn test_take_leaves_key_present() {
        let registry = SchemaRegistry::new();
        let rows = rows(&[(1, Some(10))]);
        let mut lists = hydrate_non_null_list_per_key(&rows, 0, &comments(&registry)).unwrap();

        assert_eq!(lists.take(&Value::BigInt(1)).map(|l| l.len()), Some(1));
        assert!(lists.contains_key(&Value::BigInt(1)));
        assert!(lists.take(&Value::BigInt(4)).is_none());
    }

    #[test]
    fn test_mapping_is_resolved_once_per_batch() {
        let registry = SchemaRegistry::new();
        let hydrator = comments(&registry);
        assert!(registry.contains::<Comment>());

        // Replacing the registered mapping does not affect a prepared batch.
        registry.register(
            crate::mapping::EntityMapping::<Comment>::builder("Comment")
                .column(mapped_column!(Comment, body))
                .column(mapped_column!(Comment, id).primary_key())
                .build(),
        );
        let rows = rows(&[(1, Some(10))]);
        let list = hydrate_non_null_list(&rows, &hydrator).unwrap();
        assert_eq!(list[0].id, 10);
        assert_eq!(list[0].body, "c10");
    }

    #[test]
    fn test_scalar_batches() {
        let rows = vec![
            vec![Value::Int(1), Value::Text("a".into())],
            vec![Value::Int(1), Value::Text("b".into())],
            vec![Value::Int(2), Value::Null],
        ];
        let names: BatchHydrator<'_, String> = BatchHydrator::new(HydrationContext::at(1)).unwrap();
        assert_eq!(
            hydrate_non_null_list(&rows, &names).unwrap(),
            vec!["a".to_string(), "b".to_string()]
        );

        let ids: BatchHydrator<'_, i32> = BatchHydrator::new(HydrationContext::new()).unwrap();
        assert_eq!(hydrate_unique_list(&rows, 0, &ids).unwrap(), vec![Some(1), Some(2)]);
    }

    #[test]
    fn test_key_index_out_of_bounds() {
        let rows = vec![vec![Value::Int(1)]];
        let ids: BatchHydrator<'_, i32> = BatchHydrator::new(HydrationContext::new()).unwrap();
        let err = hydrate_unique_list(&rows, 4, &ids).unwrap_err();
        assert!(matches!(err, Error::OutOfBoundsColumn(ref site) if site.field == "<key>"));
    }
}
