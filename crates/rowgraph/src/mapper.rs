//! `Mapper`: a query collaborator plus the hydration core.

use rowgraph_core::{
    BatchHydrator, Connection, Cx, Entity, Error, FromValue, Hydrate, HydrationContext, Outcome,
    Result, Row, RowCallback, RowSet, SchemaRegistry, Value, hydrate_list, hydrate_non_null_list,
    hydrate_unique_list,
};
use rowgraph_query::{JoinKind, JoinSpec, build_join_sql, build_page_queries_with, select_sql};

use crate::config::MapperConfig;
use crate::join::{ChildField, JoinRequest, assemble_join};
use crate::page::PagedData;

/// How a mapper operation hydrates the rows it fetches.
///
/// Offsets count from the first column the statement selects; for paged
/// fetches that excludes the leading row-number column. The mapper's own
/// registry is always used.
///
/// ```ignore
/// let fields = ["name", "id"];
/// let options = RowOptions::at(2).pk_column(3).fields(&fields);
/// let people: Vec<Option<Person>> = mapper.query(&cx, sql, &[], &options).await?;
/// ```
pub struct RowOptions<'a, T> {
    ctx: HydrationContext<'a>,
    on_row: Option<RowCallback<'a, T>>,
}

impl<'a, T> RowOptions<'a, T> {
    /// Hydrate from column 0, testing column 0 for the null sentinel.
    pub fn new() -> Self {
        Self {
            ctx: HydrationContext::new(),
            on_row: None,
        }
    }

    pub fn at(starting_column: usize) -> Self {
        Self {
            ctx: HydrationContext::at(starting_column),
            on_row: None,
        }
    }

    pub fn pk_column(mut self, pk_column: usize) -> Self {
        self.ctx = self.ctx.pk_column(pk_column);
        self
    }

    pub fn fields(mut self, fields: &'a [&'a str]) -> Self {
        self.ctx = self.ctx.fields(fields);
        self
    }

    /// Run `callback` after every row is hydrated, absent rows included.
    pub fn on_row(mut self, callback: RowCallback<'a, T>) -> Self {
        self.on_row = Some(callback);
        self
    }

    /// A batch hydrator over the mapper's registry, with offsets moved right
    /// by `shift` columns.
    fn hydrator(&self, registry: &'a SchemaRegistry, shift: usize) -> Result<BatchHydrator<'a, T>>
    where
        T: Hydrate,
    {
        let ctx = self
            .ctx
            .shifted(self.ctx.start() + shift, self.ctx.pk_index() + shift)
            .registry(registry);
        let hydrator = BatchHydrator::new(ctx)?;
        Ok(match self.on_row {
            Some(callback) => hydrator.on_row(callback),
            None => hydrator,
        })
    }
}

impl<T> Default for RowOptions<'_, T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for RowOptions<'_, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for RowOptions<'_, T> {}

impl<T> std::fmt::Debug for RowOptions<'_, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RowOptions")
            .field("ctx", &self.ctx)
            .field("on_row", &self.on_row.is_some())
            .finish()
    }
}

/// Runs SQL through a [`Connection`] and hydrates the results.
///
/// Every operation is one or two round trips followed by synchronous
/// hydration. Cancellation and timeouts are the connection's business; a
/// cancelled or panicked query outcome is passed through unchanged.
#[derive(Debug)]
pub struct Mapper<C> {
    connection: C,
    config: MapperConfig,
    registry: &'static SchemaRegistry,
}

impl<C: Connection> Mapper<C> {
    /// A mapper using the default configuration and the global registry.
    pub fn new(connection: C) -> Self {
        Self {
            connection,
            config: MapperConfig::default(),
            registry: SchemaRegistry::global(),
        }
    }

    pub fn with_config(mut self, config: MapperConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_registry(mut self, registry: &'static SchemaRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn connection(&self) -> &C {
        &self.connection
    }

    pub fn config(&self) -> &MapperConfig {
        &self.config
    }

    pub fn registry(&self) -> &'static SchemaRegistry {
        self.registry
    }

    async fn rows(&self, cx: &Cx, sql: &str, params: &[Value]) -> Outcome<Vec<Row>, Error> {
        match self.connection.query(cx, sql, params).await {
            Outcome::Ok(rows) => {
                tracing::trace!(rows = rows.len(), "Query returned");
                Outcome::Ok(rows)
            }
            Outcome::Err(e) => Outcome::Err(e),
            Outcome::Cancelled(r) => Outcome::Cancelled(r),
            Outcome::Panicked(p) => Outcome::Panicked(p),
        }
    }

    /// Run `sql` and hydrate every row with `options`, then apply `assemble`
    /// to the rows and the prepared hydrator.
    async fn hydrate_rows<T, O>(
        &self,
        cx: &Cx,
        sql: &str,
        params: &[Value],
        options: &RowOptions<'_, T>,
        assemble: impl FnOnce(&[Row], &BatchHydrator<'_, T>) -> Result<O>,
    ) -> Outcome<O, Error>
    where
        T: Hydrate,
    {
        let rows = match self.rows(cx, sql, params).await {
            Outcome::Ok(rows) => rows,
            Outcome::Err(e) => return Outcome::Err(e),
            Outcome::Cancelled(r) => return Outcome::Cancelled(r),
            Outcome::Panicked(p) => return Outcome::Panicked(p),
        };
        let result = options
            .hydrator(self.registry, 0)
            .and_then(|hydrator| assemble(&rows, &hydrator));
        match result {
            Ok(out) => Outcome::Ok(out),
            Err(e) => Outcome::Err(e),
        }
    }

    /// Hydrate every row, keeping rows whose sentinel column is null as
    /// `None`.
    #[tracing::instrument(level = "debug", skip(self, cx, params, options))]
    pub async fn query<T: Hydrate>(
        &self,
        cx: &Cx,
        sql: &str,
        params: &[Value],
        options: &RowOptions<'_, T>,
    ) -> Outcome<Vec<Option<T>>, Error> {
        self.hydrate_rows(cx, sql, params, options, |rows, hydrator| hydrate_list(rows, hydrator))
            .await
    }

    /// [`query`](Self::query) with absent rows dropped.
    #[tracing::instrument(level = "debug", skip(self, cx, params, options))]
    pub async fn query_non_null<T: Hydrate>(
        &self,
        cx: &Cx,
        sql: &str,
        params: &[Value],
        options: &RowOptions<'_, T>,
    ) -> Outcome<Vec<T>, Error> {
        self.hydrate_rows(cx, sql, params, options, |rows, hydrator| {
            hydrate_non_null_list(rows, hydrator)
        })
        .await
    }

    /// Hydrate one value per distinct `row[key_index]`, from the first row
    /// carrying it. Absent first occurrences are kept as `None`.
    #[tracing::instrument(level = "debug", skip(self, cx, params, options))]
    pub async fn unique<T: Hydrate>(
        &self,
        cx: &Cx,
        sql: &str,
        key_index: usize,
        params: &[Value],
        options: &RowOptions<'_, T>,
    ) -> Outcome<Vec<Option<T>>, Error> {
        self.hydrate_rows(cx, sql, params, options, |rows, hydrator| {
            hydrate_unique_list(rows, key_index, hydrator)
        })
        .await
    }

    /// Hydrate the first row, if there is one.
    #[tracing::instrument(level = "debug", skip(self, cx, params, options))]
    pub async fn query_one<T: Hydrate>(
        &self,
        cx: &Cx,
        sql: &str,
        params: &[Value],
        options: &RowOptions<'_, T>,
    ) -> Outcome<Option<T>, Error> {
        self.hydrate_rows(cx, sql, params, options, |rows, hydrator| match rows.first() {
            Some(first) => hydrator.hydrate(first.values()),
            None => Ok(None),
        })
        .await
    }

    /// Run a query and keep the raw cells.
    #[tracing::instrument(level = "debug", skip(self, cx, params))]
    pub async fn query_raw(&self, cx: &Cx, sql: &str, params: &[Value]) -> Outcome<RowSet, Error> {
        match self.rows(cx, sql, params).await {
            Outcome::Ok(rows) => Outcome::Ok(RowSet::from_rows(rows, 0)),
            Outcome::Err(e) => Outcome::Err(e),
            Outcome::Cancelled(r) => Outcome::Cancelled(r),
            Outcome::Panicked(p) => Outcome::Panicked(p),
        }
    }

    /// `SELECT <all mapped columns> FROM <table> WHERE <where_clause>`.
    #[tracing::instrument(level = "debug", skip(self, cx, params))]
    pub async fn select<T: Entity>(
        &self,
        cx: &Cx,
        where_clause: Option<&str>,
        params: &[Value],
    ) -> Outcome<Vec<T>, Error> {
        let mapping = match self.registry.resolve::<T>() {
            Ok(mapping) => mapping,
            Err(e) => return Outcome::Err(e),
        };
        let where_clause = where_clause.unwrap_or(self.config.default_where.as_str());
        let sql = select_sql(&mapping, Some(where_clause));
        self.query_non_null(cx, &sql, params, &RowOptions::new()).await
    }

    /// Issue a two-table join and rebuild the parent entities with their
    /// children.
    #[tracing::instrument(level = "debug", skip(self, cx, request), fields(kind = ?request.kind, join_column = request.join_column))]
    pub async fn join<P: Entity, J: Entity>(
        &self,
        cx: &Cx,
        request: &JoinRequest<'_, P, J>,
    ) -> Outcome<Vec<P>, Error> {
        let (primary, joined) = match (self.registry.resolve::<P>(), self.registry.resolve::<J>()) {
            (Ok(p), Ok(j)) => (p, j),
            (Err(e), _) | (_, Err(e)) => return Outcome::Err(e),
        };
        let spec = JoinSpec {
            kind: request.kind,
            primary_column: request.primary_column,
            join_column: request.join_column,
            where_clause: Some(request.where_clause.unwrap_or(self.config.default_where.as_str())),
            order_by: request.order_by,
        };
        let sql = match build_join_sql(&primary, &joined, &spec) {
            Ok(sql) => sql,
            Err(e) => return Outcome::Err(e),
        };
        tracing::debug!(sql = %sql, "Built join statement");

        let rows = match self.rows(cx, &sql, request.params).await {
            Outcome::Ok(rows) => rows,
            Outcome::Err(e) => return Outcome::Err(e),
            Outcome::Cancelled(r) => return Outcome::Cancelled(r),
            Outcome::Panicked(p) => return Outcome::Panicked(p),
        };
        match assemble_join(&rows, request.child, self.registry) {
            Ok(parents) => Outcome::Ok(parents),
            Err(e) => Outcome::Err(e),
        }
    }

    /// [`join`](Self::join) with `INNER JOIN` and the primary key as the
    /// primary-side join column.
    pub async fn inner_join<P: Entity, J: Entity>(
        &self,
        cx: &Cx,
        join_column: &str,
        child: ChildField<P, J>,
        where_clause: Option<&str>,
        params: &[Value],
    ) -> Outcome<Vec<P>, Error> {
        let mut request = JoinRequest::new(JoinKind::Inner, join_column, child).params(params);
        request.where_clause = where_clause;
        self.join(cx, &request).await
    }

    /// [`join`](Self::join) with `LEFT JOIN`; parents without children are
    /// kept.
    pub async fn left_join<P: Entity, J: Entity>(
        &self,
        cx: &Cx,
        join_column: &str,
        child: ChildField<P, J>,
        where_clause: Option<&str>,
        params: &[Value],
    ) -> Outcome<Vec<P>, Error> {
        let mut request = JoinRequest::new(JoinKind::Left, join_column, child).params(params);
        request.where_clause = where_clause;
        self.join(cx, &request).await
    }

    /// Fetch page `page_index` (zero-based) of `sql` and hydrate its rows,
    /// dropping absent ones. `options` offsets skip the leading row-number
    /// column.
    #[tracing::instrument(level = "debug", skip(self, cx, params, options))]
    pub async fn page<T: Hydrate>(
        &self,
        cx: &Cx,
        page_index: u64,
        page_size: u64,
        sql: &str,
        params: &[Value],
        options: &RowOptions<'_, T>,
    ) -> Outcome<PagedData<Vec<T>>, Error> {
        let (rows, total) = match self.fetch_page(cx, page_index, page_size, sql, params).await {
            Outcome::Ok(fetched) => fetched,
            Outcome::Err(e) => return Outcome::Err(e),
            Outcome::Cancelled(r) => return Outcome::Cancelled(r),
            Outcome::Panicked(p) => return Outcome::Panicked(p),
        };
        let items = options
            .hydrator(self.registry, 1)
            .and_then(|hydrator| hydrate_non_null_list(&rows, &hydrator));
        match items {
            Ok(items) => Outcome::Ok(PagedData::new(items, page_size, page_index, total)),
            Err(e) => Outcome::Err(e),
        }
    }

    /// [`page`](Self::page) without hydration; the row-number column is
    /// dropped.
    #[tracing::instrument(level = "debug", skip(self, cx, params))]
    pub async fn page_raw(
        &self,
        cx: &Cx,
        page_index: u64,
        page_size: u64,
        sql: &str,
        params: &[Value],
    ) -> Outcome<PagedData<RowSet>, Error> {
        match self.fetch_page(cx, page_index, page_size, sql, params).await {
            Outcome::Ok((rows, total)) => Outcome::Ok(PagedData::new(
                RowSet::from_rows(rows, 1),
                page_size,
                page_index,
                total,
            )),
            Outcome::Err(e) => Outcome::Err(e),
            Outcome::Cancelled(r) => Outcome::Cancelled(r),
            Outcome::Panicked(p) => Outcome::Panicked(p),
        }
    }

    /// Page rows and the total record count.
    async fn fetch_page(
        &self,
        cx: &Cx,
        page_index: u64,
        page_size: u64,
        sql: &str,
        params: &[Value],
    ) -> Outcome<(Vec<Row>, u64), Error> {
        let Some(skip) = page_index.checked_mul(page_size) else {
            return Outcome::Err(Error::SqlRewriteFailure {
                sql: sql.to_string(),
                reason: "page bounds overflow",
            });
        };
        let queries = match build_page_queries_with(sql, skip, page_size, &self.config.paging) {
            Ok(queries) => queries,
            Err(e) => return Outcome::Err(e),
        };

        let rows = match self.rows(cx, &queries.page_sql, params).await {
            Outcome::Ok(rows) => rows,
            Outcome::Err(e) => return Outcome::Err(e),
            Outcome::Cancelled(r) => return Outcome::Cancelled(r),
            Outcome::Panicked(p) => return Outcome::Panicked(p),
        };
        let count = match self.connection.query_scalar(cx, &queries.count_sql, params).await {
            Outcome::Ok(count) => count,
            Outcome::Err(e) => return Outcome::Err(e),
            Outcome::Cancelled(r) => return Outcome::Cancelled(r),
            Outcome::Panicked(p) => return Outcome::Panicked(p),
        };
        let total = match count {
            Value::Null => 0,
            other => match u64::from_value(&other) {
                Ok(total) => total,
                Err(e) => {
                    return Outcome::Err(Error::Query(format!("count query returned an unusable value: {e}")));
                }
            },
        };

        tracing::debug!(page_index, page_size, rows = rows.len(), total, "Fetched page");
        Outcome::Ok((rows, total))
    }
}
