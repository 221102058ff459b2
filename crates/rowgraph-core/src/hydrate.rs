//! Row hydration: turning one flat row segment into a typed value.
//!
//! Positional hydration assumes the physical order of the row segment starting
//! at `starting_column` matches the mapping's column order; no names are
//! consulted. `row[pk_column] == Value::Null` means "no row on this side of an
//! outer join" and hydrates to `None`.

use std::sync::Arc;

use crate::entity::Entity;
use crate::error::{Error, HydrateSite, Result};
use crate::field::ColumnDescriptor;
use crate::mapping::EntityMapping;
use crate::registry::SchemaRegistry;
use crate::row::Row;
use crate::value::{ConversionError, FromValue, Value};

/// Per-call hydration parameters.
#[derive(Debug, Clone, Copy, Default)]
pub struct HydrationContext<'a> {
    starting_column: usize,
    pk_column: Option<usize>,
    fields: Option<&'a [&'a str]>,
    registry: Option<&'a SchemaRegistry>,
}

impl<'a> HydrationContext<'a> {
    /// Hydrate from column 0.
    pub fn new() -> Self {
        Self::default()
    }

    /// Hydrate the segment beginning at `starting_column`.
    pub fn at(starting_column: usize) -> Self {
        Self {
            starting_column,
            ..Self::default()
        }
    }

    /// Column tested for the null sentinel. Defaults to the starting column.
    pub fn pk_column(mut self, pk_column: usize) -> Self {
        self.pk_column = Some(pk_column);
        self
    }

    /// Hydrate only these fields, in this order, from consecutive cells.
    pub fn fields(mut self, fields: &'a [&'a str]) -> Self {
        self.fields = Some(fields);
        self
    }

    /// Resolve mappings from `registry` instead of the global one.
    pub fn registry(mut self, registry: &'a SchemaRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn start(&self) -> usize {
        self.starting_column
    }

    pub fn pk_index(&self) -> usize {
        self.pk_column.unwrap_or(self.starting_column)
    }

    pub fn field_subset(&self) -> Option<&'a [&'a str]> {
        self.fields
    }

    pub fn schema(&self) -> &'a SchemaRegistry {
        match self.registry {
            Some(registry) => registry,
            None => SchemaRegistry::global(),
        }
    }

    /// The same context shifted to another segment of the row.
    pub fn shifted(self, starting_column: usize, pk_column: usize) -> Self {
        Self {
            starting_column,
            pk_column: Some(pk_column),
            ..self
        }
    }

    /// Diagnostic location for a failure at `row_index` while hydrating
    /// `type_name`.
    pub fn site(
        &self,
        type_name: &'static str,
        field: &'static str,
        row_index: usize,
        row: &[Value],
    ) -> HydrateSite {
        HydrateSite {
            type_name,
            field,
            row_index,
            starting_column: self.starting_column,
            pk_column: self.pk_index(),
            row_len: row.len(),
        }
    }
}

/// Types a row segment can be hydrated into: scalars and [`Entity`] types.
pub trait Hydrate: Sized + 'static {
    /// State resolved once per batch: the entity mapping, or nothing for
    /// scalars.
    type Plan;

    fn plan(ctx: &HydrationContext<'_>) -> Result<Self::Plan>;

    /// Hydrate a segment already known not to be absent.
    fn hydrate_present(plan: &Self::Plan, row: &[Value], ctx: &HydrationContext<'_>) -> Result<Self>;
}

/// Whether `row[pk_column]` holds the null sentinel.
fn is_absent<T>(row: &[Value], ctx: &HydrationContext<'_>) -> Result<bool> {
    let pk = ctx.pk_index();
    match row.get(pk) {
        None => Err(Error::OutOfBoundsColumn(ctx.site(
            std::any::type_name::<T>(),
            "<sentinel>",
            pk,
            row,
        ))),
        Some(value) => Ok(value.is_null()),
    }
}

/// Hydrate one row segment, returning `None` when the sentinel column holds
/// the null sentinel.
///
/// Resolves the target's mapping on every call; batches should go through a
/// [`BatchHydrator`].
pub fn hydrate<T: Hydrate>(row: &[Value], ctx: &HydrationContext<'_>) -> Result<Option<T>> {
    if is_absent::<T>(row, ctx)? {
        return Ok(None);
    }
    let plan = T::plan(ctx)?;
    T::hydrate_present(&plan, row, ctx).map(Some)
}

impl<T: Entity> Hydrate for T {
    type Plan = Arc<EntityMapping<T>>;

    fn plan(ctx: &HydrationContext<'_>) -> Result<Self::Plan> {
        ctx.schema().resolve::<T>()
    }

    fn hydrate_present(plan: &Self::Plan, row: &[Value], ctx: &HydrationContext<'_>) -> Result<Self> {
        hydrate_entity(plan, row, ctx)
    }
}

/// Hook run after every row of a batch is hydrated, absent rows included.
/// Receives the hydrated value (if any) and the whole row.
pub type RowCallback<'a, T> = &'a (dyn Fn(Option<&mut T>, &[Value]) + Send + Sync);

/// A hydration context with the target's mapping resolved once, for
/// hydrating many rows.
///
/// ```ignore
/// let stamp = |c: Option<&mut Comment>, row: &[Value]| {
///     if let Some(c) = c {
///         c.score = i64::from_value(&row[5]).unwrap_or_default();
///     }
/// };
/// let hydrator = BatchHydrator::<Comment>::new(HydrationContext::at(2))?.on_row(&stamp);
/// let comments = hydrate_non_null_list(&rows, &hydrator)?;
/// ```
pub struct BatchHydrator<'a, T: Hydrate> {
    ctx: HydrationContext<'a>,
    plan: T::Plan,
    on_row: Option<RowCallback<'a, T>>,
}

impl<'a, T: Hydrate> BatchHydrator<'a, T> {
    pub fn new(ctx: HydrationContext<'a>) -> Result<Self> {
        Ok(Self {
            plan: T::plan(&ctx)?,
            ctx,
            on_row: None,
        })
    }

    pub fn on_row(mut self, callback: RowCallback<'a, T>) -> Self {
        self.on_row = Some(callback);
        self
    }

    pub fn context(&self) -> &HydrationContext<'a> {
        &self.ctx
    }

    /// Hydrate one row segment; `None` when the sentinel column is null.
    pub fn hydrate(&self, row: &[Value]) -> Result<Option<T>> {
        let mut value = if is_absent::<T>(row, &self.ctx)? {
            None
        } else {
            Some(T::hydrate_present(&self.plan, row, &self.ctx)?)
        };
        if let Some(callback) = self.on_row {
            callback(value.as_mut(), row);
        }
        Ok(value)
    }
}

impl<T: Hydrate> std::fmt::Debug for BatchHydrator<'_, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchHydrator")
            .field("target", &std::any::type_name::<T>())
            .field("ctx", &self.ctx)
            .field("on_row", &self.on_row.is_some())
            .finish()
    }
}

/// Hydrate an entity with an already-resolved mapping. Does not test the
/// null sentinel.
pub fn hydrate_entity<T: Default>(
    mapping: &EntityMapping<T>,
    row: &[Value],
    ctx: &HydrationContext<'_>,
) -> Result<T> {
    let start = ctx.start();

    if ctx.field_subset().is_none() && start >= row.len() {
        if let Some(first) = mapping.columns().first() {
            return Err(Error::OutOfBoundsColumn(ctx.site(
                mapping.type_name(),
                first.name(),
                start,
                row,
            )));
        }
    }

    if let (Some(hydrator), None) = (mapping.hydrator(), ctx.field_subset()) {
        return hydrator(row, start);
    }

    let mut entity = T::default();
    if let Some(names) = ctx.field_subset() {
        for (i, name) in names.iter().enumerate() {
            let column = mapping.field(name).ok_or_else(|| Error::UnknownField {
                type_name: mapping.type_name(),
                field: (*name).to_string(),
            })?;
            assign(mapping, column, &mut entity, row, start + i, ctx)?;
        }
    } else {
        // Result sets narrower than the entity hydrate only the leading columns.
        let count = mapping.column_count().min(row.len().saturating_sub(start));
        for column in &mapping.columns()[..count] {
            assign(mapping, column, &mut entity, row, start + column.ordinal(), ctx)?;
        }
    }
    Ok(entity)
}

fn assign<T>(
    mapping: &EntityMapping<T>,
    column: &ColumnDescriptor<T>,
    entity: &mut T,
    row: &[Value],
    row_index: usize,
    ctx: &HydrationContext<'_>,
) -> Result<()> {
    let site = || ctx.site(mapping.type_name(), column.name(), row_index, row);
    let value = row
        .get(row_index)
        .ok_or_else(|| Error::OutOfBoundsColumn(site()))?;
    column
        .set(entity, value)
        .map_err(|err| conversion_failure(err, site()))
}

fn conversion_failure(err: ConversionError, site: HydrateSite) -> Error {
    match err {
        ConversionError::Null => Error::NullSentinelOnRequiredField(site),
        ConversionError::Mismatch { expected, found } => Error::TypeConversionFailure {
            site,
            expected,
            found,
        },
    }
}

fn hydrate_scalar<T: FromValue + 'static>(row: &[Value], ctx: &HydrationContext<'_>) -> Result<T> {
    let index = ctx.start();
    let site = || ctx.site(std::any::type_name::<T>(), "<value>", index, row);
    let value = row
        .get(index)
        .ok_or_else(|| Error::OutOfBoundsColumn(site()))?;
    T::from_value(value).map_err(|err| conversion_failure(err, site()))
}

macro_rules! scalar_hydrate {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Hydrate for $ty {
                type Plan = ();

                fn plan(_ctx: &HydrationContext<'_>) -> Result<()> {
                    Ok(())
                }

                fn hydrate_present(_plan: &(), row: &[Value], ctx: &HydrationContext<'_>) -> Result<Self> {
                    hydrate_scalar(row, ctx)
                }
            }
        )*
    };
}

scalar_hydrate!(
    bool,
    i8,
    i16,
    i32,
    i64,
    u8,
    u16,
    u32,
    u64,
    f32,
    f64,
    String,
    Vec<u8>,
    [u8; 16],
    serde_json::Value,
    Value,
);

/// Hydrate an entity by column name rather than position.
///
/// Each mapped column is looked up (case-insensitively) as
/// `column_prefix + column_name` in the row's column names. The context's
/// `pk_column` is still used for the null-sentinel test; its starting column
/// and field subset are ignored.
pub fn hydrate_by_name<T: Entity>(
    row: &Row,
    column_prefix: &str,
    ctx: &HydrationContext<'_>,
) -> Result<Option<T>> {
    let values = row.values();
    if is_absent::<T>(values, ctx)? {
        return Ok(None);
    }

    let mapping = ctx.schema().resolve::<T>()?;
    let mut entity = T::default();
    for column in mapping.columns() {
        let name = format!("{column_prefix}{}", column.column_name());
        let index = row.index_of(&name).ok_or_else(|| Error::UnknownField {
            type_name: mapping.type_name(),
            field: name.clone(),
        })?;
        assign(&mapping, column, &mut entity, values, index, ctx)?;
    }
    Ok(Some(entity))
}

/// Sequential reader for precompiled hydrators.
///
/// Reads one cell per call starting at the hydrator's starting column. Cells
/// past the end of the row produce the field type's default, matching generic
/// hydration of partial projections.
///
/// ```ignore
/// fn hydrate_project(row: &[Value], start: usize) -> Result<Project> {
///     let mut cur = RowCursor::new::<Project>(row, start);
///     Ok(Project {
///         id: cur.read("id")?,
///         name: cur.read("name")?,
///         ..Project::default()
///     })
/// }
/// ```
#[derive(Debug)]
pub struct RowCursor<'r> {
    row: &'r [Value],
    start: usize,
    offset: usize,
    type_name: &'static str,
}

impl<'r> RowCursor<'r> {
    pub fn new<T>(row: &'r [Value], start: usize) -> Self {
        Self {
            row,
            start,
            offset: 0,
            type_name: std::any::type_name::<T>(),
        }
    }

    /// Read the next cell into `field`.
    pub fn read<F: FromValue + Default>(&mut self, field: &'static str) -> Result<F> {
        let index = self.start + self.offset;
        self.offset += 1;
        match self.row.get(index) {
            None => Ok(F::default()),
            Some(value) => F::from_value(value).map_err(|err| {
                conversion_failure(
                    err,
                    HydrateSite {
                        type_name: self.type_name,
                        field,
                        row_index: index,
                        starting_column: self.start,
                        pk_column: self.start,
                        row_len: self.row.len(),
                    },
                )
            }),
        }
    }

    /// Skip `n` cells.
    pub fn skip(&mut self, n: usize) {
        self.offset += n;
    }
}
