//! The join splitter: rebuilding parent entities with nested children from
//! one flat two-table join result.
//!
//! Rows are laid out as `[primary columns..., joined columns...]`, which is
//! what [`build_join_sql`](rowgraph_query::build_join_sql) selects. Parents
//! are deduplicated by their primary key; children are either grouped per
//! parent (one-to-many) or read from the parent's own row (one-to-one).

use std::collections::HashSet;

use rowgraph_core::{
    BatchHydrator, Entity, Error, HydrationContext, Result, SchemaRegistry, Value, ValueKey,
    hydrate_non_null_list_per_key, hydrate_non_null_unique_keyed,
};
use rowgraph_query::JoinKind;

/// Shape of the relationship being materialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RelationshipKind {
    OneToOne,
    OneToMany,
}

/// Where hydrated children are stored on the parent.
pub enum ChildField<P, J> {
    /// A single optional child; `None` when the join found no match.
    One(fn(&mut P, Option<J>)),
    /// A list of children; empty when the join found no match.
    Many(fn(&mut P, Vec<J>)),
}

impl<P, J> ChildField<P, J> {
    pub fn one(assign: fn(&mut P, Option<J>)) -> Self {
        ChildField::One(assign)
    }

    pub fn many(assign: fn(&mut P, Vec<J>)) -> Self {
        ChildField::Many(assign)
    }

    pub fn kind(&self) -> RelationshipKind {
        match self {
            ChildField::One(_) => RelationshipKind::OneToOne,
            ChildField::Many(_) => RelationshipKind::OneToMany,
        }
    }
}

impl<P, J> Clone for ChildField<P, J> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<P, J> Copy for ChildField<P, J> {}

impl<P, J> std::fmt::Debug for ChildField<P, J> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("ChildField").field(&self.kind()).finish()
    }
}

/// A join to issue through [`Mapper::join`](crate::Mapper::join).
///
/// ```ignore
/// let request = JoinRequest::new(JoinKind::Left, "ProjectID", ChildField::many(|p: &mut Project, c| p.comments = c))
///     .filter("Project.OwnerID = ?")
///     .params(&[Value::BigInt(owner)]);
/// let projects = mapper.join(&cx, &request).await;
/// ```
#[derive(Debug, Clone)]
pub struct JoinRequest<'a, P, J> {
    pub(crate) kind: JoinKind,
    pub(crate) join_column: &'a str,
    pub(crate) primary_column: Option<&'a str>,
    pub(crate) child: ChildField<P, J>,
    pub(crate) where_clause: Option<&'a str>,
    pub(crate) order_by: Option<&'a str>,
    pub(crate) params: &'a [Value],
}

impl<'a, P, J> JoinRequest<'a, P, J> {
    pub fn new(kind: JoinKind, join_column: &'a str, child: ChildField<P, J>) -> Self {
        Self {
            kind,
            join_column,
            primary_column: None,
            child,
            where_clause: None,
            order_by: None,
            params: &[],
        }
    }

    /// Join on this primary-side column instead of the primary key.
    pub fn primary_column(mut self, column: &'a str) -> Self {
        self.primary_column = Some(column);
        self
    }

    pub fn filter(mut self, where_clause: &'a str) -> Self {
        self.where_clause = Some(where_clause);
        self
    }

    pub fn order_by(mut self, order_by: &'a str) -> Self {
        self.order_by = Some(order_by);
        self
    }

    pub fn params(mut self, params: &'a [Value]) -> Self {
        self.params = params;
        self
    }
}

/// Rebuild deduplicated parents with their children from flat join rows.
///
/// Parents come back in the order their key first appears. In one-to-many
/// mode each parent's list holds the non-absent children of every row that
/// carries its key. In one-to-one mode the child is hydrated from the same
/// row the parent was, so no ordering between separate passes is assumed.
pub fn assemble_join<P, J, R>(
    rows: &[R],
    child: ChildField<P, J>,
    registry: &SchemaRegistry,
) -> Result<Vec<P>>
where
    P: Entity,
    J: Entity,
    R: AsRef<[Value]>,
{
    if rows.is_empty() {
        return Ok(Vec::new());
    }

    let primary = registry.resolve::<P>()?;
    let joined = registry.resolve::<J>()?;
    let primary_key = primary.primary_key_index()?;
    let offset = primary.column_count();
    let joined_key = offset + joined.primary_key_index()?;

    let parents_of = BatchHydrator::<P>::new(
        HydrationContext::new()
            .pk_column(primary_key)
            .registry(registry),
    )?;
    let children_of = BatchHydrator::<J>::new(
        HydrationContext::at(offset)
            .pk_column(joined_key)
            .registry(registry),
    )?;

    let parents = match child {
        ChildField::Many(assign) => {
            let parents = hydrate_non_null_unique_keyed(rows, primary_key, &parents_of)?;
            let mut children = hydrate_non_null_list_per_key(rows, primary_key, &children_of)?;
            let mut out = Vec::with_capacity(parents.len());
            for (key, mut parent) in parents {
                let Some(list) = children.take(&key) else {
                    return Err(Error::MissingGroupKey {
                        type_name: primary.type_name(),
                        key,
                    });
                };
                assign(&mut parent, list);
                out.push(parent);
            }
            out
        }
        ChildField::One(assign) => {
            let mut seen = HashSet::new();
            let mut out = Vec::new();
            for row in rows {
                let row = row.as_ref();
                let key = row.get(primary_key).ok_or_else(|| {
                    Error::OutOfBoundsColumn(parents_of.context().site(
                        primary.type_name(),
                        "<key>",
                        primary_key,
                        row,
                    ))
                })?;
                if !seen.insert(ValueKey::from(key)) {
                    continue;
                }
                let Some(mut parent) = parents_of.hydrate(row)? else {
                    continue;
                };
                assign(&mut parent, children_of.hydrate(row)?);
                out.push(parent);
            }
            out
        }
    };

    tracing::debug!(
        primary = primary.type_name(),
        joined = joined.type_name(),
        relationship = ?child.kind(),
        rows = rows.len(),
        parents = parents.len(),
        "Assembled join"
    );
    Ok(parents)
}
