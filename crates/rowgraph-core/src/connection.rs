//! The query-execution collaborator.
//!
//! Hydration never performs I/O. Whatever executes SQL implements
//! [`Connection`] and hands back rows whose "no value" cells are already
//! [`Value::Null`]. Timeouts and cancellation belong to the implementation and
//! the [`Cx`] it is given.

use std::future::Future;

use asupersync::{Cx, Outcome};

use crate::error::Error;
use crate::row::Row;
use crate::value::Value;

/// Executes SQL text with positional parameters.
pub trait Connection: Send + Sync {
    /// Execute a query and return every row.
    fn query(
        &self,
        cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Outcome<Vec<Row>, Error>> + Send;

    /// Execute a query returning a single value (e.g. `COUNT(*)`).
    ///
    /// The default takes the first cell of the first row, or `Value::Null`
    /// when the query produced no rows.
    fn query_scalar(
        &self,
        cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Outcome<Value, Error>> + Send {
        async move {
            match self.query(cx, sql, params).await {
                Outcome::Ok(rows) => Outcome::Ok(
                    rows.into_iter()
                        .next()
                        .and_then(|row| row.into_values().into_iter().next())
                        .unwrap_or(Value::Null),
                ),
                Outcome::Err(e) => Outcome::Err(e),
                Outcome::Cancelled(r) => Outcome::Cancelled(r),
                Outcome::Panicked(p) => Outcome::Panicked(p),
            }
        }
    }
}
