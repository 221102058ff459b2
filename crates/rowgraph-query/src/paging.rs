//! Rewriting a `SELECT` into a count query and a row-windowed page query.
//!
//! The rewrite is text analysis over a [`scan`](crate::scan) of the
//! statement, not a SQL parse. Statements it cannot split with confidence
//! (compound `UNION`s, leading `WITH` clauses, unbalanced text) are refused
//! with [`Error::SqlRewriteFailure`] instead of producing wrong SQL. So are
//! statements that already limit their rows (`LIMIT`, `OFFSET`, `FETCH`,
//! `TOP`); the count would ignore the limit and the window would page inside
//! it.
//!
//! ```ignore
//! let q = build_page_queries("SELECT a, b FROM t WHERE x = 1 ORDER BY a", 20, 10)?;
//! // q.count_sql: SELECT COUNT(*) FROM t WHERE x = 1
//! // q.page_sql:  SELECT * FROM (SELECT ROW_NUMBER() OVER (ORDER BY a) AS __rowgraph_rownum,
//! //              a, b FROM t WHERE x = 1) __rowgraph_paged
//! //              WHERE __rowgraph_rownum > 20 AND __rowgraph_rownum <= 30
//! ```

use rowgraph_core::{Error, Result};
use serde::{Deserialize, Serialize};

use crate::scan::{Token, TokenKind, tokenize};

/// Aliases and defaults used in generated page queries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PagingConfig {
    /// Alias of the `ROW_NUMBER()` column.
    pub rownum_alias: String,
    /// Alias of the derived table the window is filtered over.
    pub paged_alias: String,
    /// Alias of the inner derived table wrapping a `SELECT DISTINCT`.
    pub distinct_alias: String,
    /// Window ordering used when the statement has no `ORDER BY`.
    pub fallback_order: String,
}

impl Default for PagingConfig {
    fn default() -> Self {
        Self {
            rownum_alias: "__rowgraph_rownum".to_string(),
            paged_alias: "__rowgraph_paged".to_string(),
            distinct_alias: "__rowgraph_inner".to_string(),
            fallback_order: "ORDER BY (SELECT NULL)".to_string(),
        }
    }
}

/// The two statements a paged fetch runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageQueries {
    /// Counts every row the original statement returns.
    pub count_sql: String,
    /// Returns rows `skip + 1 ..= skip + take`, each prefixed with a row number.
    pub page_sql: String,
}

/// Top-level words after which an `ORDER BY` term list ends.
const ORDER_TERMINATORS: &[&str] = &["FOR", "OPTION"];

/// Top-level words that limit the rows a statement returns.
const ROW_LIMITS: &[&str] = &["LIMIT", "OFFSET", "FETCH", "TOP"];

/// Top-level words that make a statement compound.
const COMPOUND_OPERATORS: &[&str] = &["UNION", "INTERSECT", "EXCEPT"];

/// The pieces of a statement the rewrite needs, as ranges into the trimmed text.
#[derive(Debug)]
struct Split<'a> {
    /// Text before the column list (`SELECT `).
    head: &'a str,
    /// The column list, without surrounding whitespace.
    columns: &'a str,
    /// Everything from `FROM` onwards with the `ORDER BY` clause removed.
    tail: String,
    /// The `ORDER BY ...` clause, if any.
    order_by: Option<&'a str>,
    /// Whether the column list starts with `DISTINCT`.
    distinct: bool,
}

fn split(sql: &str) -> std::result::Result<Split<'_>, &'static str> {
    let tokens = tokenize(sql)?;
    let first = tokens.first().ok_or("empty statement")?;
    if first.is_keyword(sql, "WITH") {
        return Err("common table expressions are not supported");
    }
    if !first.is_keyword(sql, "SELECT") {
        return Err("statement does not begin with SELECT");
    }
    if tokens
        .iter()
        .any(|t| COMPOUND_OPERATORS.iter().any(|op| t.is_keyword(sql, op)))
    {
        return Err("compound statements are not supported");
    }
    if tokens
        .iter()
        .any(|t| ROW_LIMITS.iter().any(|kw| t.is_keyword(sql, kw)))
    {
        return Err("row-limiting clauses are not supported");
    }

    let from = tokens
        .iter()
        .skip(1)
        .position(|t| t.is_keyword(sql, "FROM"))
        .map(|p| p + 1)
        .ok_or("no top-level FROM clause")?;
    if from == 1 {
        return Err("empty column list");
    }
    let columns_start = tokens[1].start;
    let from_start = tokens[from].start;

    let order = find_order_by(sql, &tokens[from..])?;
    let tail = match order {
        Some((start, end)) => join_trimmed(&sql[from_start..start], &sql[end..]),
        None => sql[from_start..].to_string(),
    };

    Ok(Split {
        head: &sql[..columns_start],
        columns: sql[columns_start..from_start].trim(),
        tail,
        order_by: order.map(|(start, end)| &sql[start..end]),
        distinct: tokens[1].is_keyword(sql, "DISTINCT"),
    })
}

/// Byte range of the last top-level `ORDER BY` clause in `tokens`.
fn find_order_by(sql: &str, tokens: &[Token]) -> std::result::Result<Option<(usize, usize)>, &'static str> {
    let Some(at) = tokens
        .windows(2)
        .rposition(|w| w[0].is_keyword(sql, "ORDER") && w[1].is_keyword(sql, "BY"))
    else {
        return Ok(None);
    };

    let terms = &tokens[at + 2..];
    let len = terms
        .iter()
        .position(|t| ORDER_TERMINATORS.iter().any(|kw| t.is_keyword(sql, kw)))
        .unwrap_or(terms.len());
    let Some(last) = terms[..len].last() else {
        return Err("ORDER BY without terms");
    };
    if last.depth == 0 && last.kind == TokenKind::Comma {
        return Err("ORDER BY ends with a comma");
    }
    Ok(Some((tokens[at].start, last.end)))
}

fn join_trimmed(left: &str, right: &str) -> String {
    let (left, right) = (left.trim_end(), right.trim_start());
    if right.is_empty() {
        left.to_string()
    } else {
        format!("{left} {right}")
    }
}

/// Build the count and page queries for rows `skip + 1 ..= skip + take` of
/// `sql` with the default aliases.
pub fn build_page_queries(sql: &str, skip: u64, take: u64) -> Result<PageQueries> {
    build_page_queries_with(sql, skip, take, &PagingConfig::default())
}

/// [`build_page_queries`] with explicit aliases.
pub fn build_page_queries_with(
    sql: &str,
    skip: u64,
    take: u64,
    config: &PagingConfig,
) -> Result<PageQueries> {
    let refuse = |reason: &'static str| {
        tracing::warn!(reason, sql, "Refusing to rewrite statement for paging");
        Error::SqlRewriteFailure {
            sql: sql.to_string(),
            reason,
        }
    };

    let statement = sql.trim().trim_end_matches(';').trim_end();
    let parts = split(statement).map_err(refuse)?;
    let last = skip.checked_add(take).ok_or_else(|| refuse("page bounds overflow"))?;

    let count = if parts.distinct {
        format!("COUNT({})", parts.columns)
    } else {
        "COUNT(*)".to_string()
    };
    let count_sql = format!("{}{} {}", parts.head, count, parts.tail);

    let mut body = format!("{} {}", parts.columns, parts.tail);
    if parts.distinct {
        body = format!(
            "{alias}.* FROM (SELECT {body}) {alias}",
            alias = config.distinct_alias
        );
    }
    let order = parts.order_by.unwrap_or(config.fallback_order.as_str());
    let rn = &config.rownum_alias;
    let page_sql = format!(
        "SELECT * FROM (SELECT ROW_NUMBER() OVER ({order}) AS {rn}, {body}) {paged} WHERE {rn} > {skip} AND {rn} <= {last}",
        paged = config.paged_alias,
    );

    tracing::debug!(skip, take, count_sql = %count_sql, page_sql = %page_sql, "Built page queries");
    Ok(PageQueries { count_sql, page_sql })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_statement() {
        let q = build_page_queries("SELECT a,b FROM T WHERE x=1 ORDER BY a", 20, 10).unwrap();
        assert_eq!(q.count_sql, "SELECT COUNT(*) FROM T WHERE x=1");
        assert!(!q.count_sql.contains("ORDER BY"));
        assert_eq!(
            q.page_sql,
            "SELECT * FROM (SELECT ROW_NUMBER() OVER (ORDER BY a) AS __rowgraph_rownum, a,b FROM T WHERE x=1) \
             __rowgraph_paged WHERE __rowgraph_rownum > 20 AND __rowgraph_rownum <= 30"
        );
    }

    #[test]
    fn test_missing_order_by_uses_fallback() {
        let q = build_page_queries("select id from users", 0, 5).unwrap();
        assert_eq!(q.count_sql, "select COUNT(*) from users");
        assert!(q.page_sql.contains("OVER (ORDER BY (SELECT NULL))"));
        assert!(q.page_sql.ends_with("__rowgraph_rownum > 0 AND __rowgraph_rownum <= 5"));
    }

    #[test]
    fn test_distinct_counts_distinct_columns() {
        let q = build_page_queries("SELECT DISTINCT a FROM T", 0, 10).unwrap();
        assert_eq!(q.count_sql, "SELECT COUNT(DISTINCT a) FROM T");
        assert!(!q.count_sql.contains("COUNT(*)"));
        assert!(q.page_sql.contains(
            "__rowgraph_rownum, __rowgraph_inner.* FROM (SELECT DISTINCT a FROM T) __rowgraph_inner)"
        ));
    }

    #[test]
    fn test_nested_from_and_order_by_are_ignored() {
        let sql = "SELECT a, (SELECT MAX(b) FROM u WHERE u.id = t.id) AS mb, COALESCE(c, 'FROM') \
                   FROM t ORDER BY (CASE WHEN a > 1 THEN 0 ELSE 1 END), mb DESC, t.a ASC";
        let q = build_page_queries(sql, 10, 10).unwrap();
        assert_eq!(q.count_sql, "SELECT COUNT(*) FROM t");
        assert!(q.page_sql.contains(
            "OVER (ORDER BY (CASE WHEN a > 1 THEN 0 ELSE 1 END), mb DESC, t.a ASC) AS __rowgraph_rownum, a, (SELECT MAX(b)"
        ));
        assert!(q.page_sql.contains("FROM t) __rowgraph_paged"));
    }

    #[test]
    fn test_window_order_by_inside_columns_is_not_the_statement_order() {
        let sql = "SELECT a, RANK() OVER (ORDER BY b) r FROM t";
        let q = build_page_queries(sql, 0, 1).unwrap();
        assert!(q.page_sql.contains("OVER (ORDER BY (SELECT NULL)) AS __rowgraph_rownum"));
        assert!(q.page_sql.contains("RANK() OVER (ORDER BY b) r FROM t)"));
    }

    #[test]
    fn test_row_limited_statements_are_refused() {
        for sql in [
            "SELECT a FROM t ORDER BY a OFFSET 10 ROWS FETCH NEXT 5 ROWS ONLY",
            "SELECT a FROM t ORDER BY a DESC LIMIT 100;",
            "SELECT a FROM t LIMIT 10 OFFSET 20",
            "SELECT TOP 5 a FROM t ORDER BY a",
            "select distinct top (5) a from t",
        ] {
            let err = build_page_queries(sql, 0, 10).unwrap_err();
            assert!(
                matches!(
                    err,
                    Error::SqlRewriteFailure {
                        reason: "row-limiting clauses are not supported",
                        ..
                    }
                ),
                "{sql}: {err:?}"
            );
        }
    }

    #[test]
    fn test_nested_row_limits_are_allowed() {
        let sql = "SELECT a, (SELECT b FROM u ORDER BY b LIMIT 1) AS first_b FROM t ORDER BY a";
        let q = build_page_queries(sql, 0, 10).unwrap();
        assert_eq!(q.count_sql, "SELECT COUNT(*) FROM t");
        assert!(q.page_sql.contains("OVER (ORDER BY a) AS __rowgraph_rownum"));
        assert!(q.page_sql.contains("(SELECT b FROM u ORDER BY b LIMIT 1) AS first_b FROM t)"));
    }

    #[test]
    fn test_query_hints_after_order_by_stay_in_both_queries() {
        let q = build_page_queries("SELECT a FROM t ORDER BY a DESC OPTION (RECOMPILE)", 0, 10).unwrap();
        assert_eq!(q.count_sql, "SELECT COUNT(*) FROM t OPTION (RECOMPILE)");
        assert!(q.page_sql.contains("OVER (ORDER BY a DESC)"));
    }

    #[test]
    fn test_custom_aliases() {
        let config = PagingConfig {
            rownum_alias: "rn".into(),
            paged_alias: "pg".into(),
            ..PagingConfig::default()
        };
        let q = build_page_queries_with("SELECT a FROM t", 5, 5, &config).unwrap();
        assert!(q.page_sql.ends_with(") pg WHERE rn > 5 AND rn <= 10"));
    }

    #[test]
    fn test_unsupported_statements_fail() {
        for (sql, reason) in [
            ("SELECT a FROM t UNION SELECT a FROM u", "compound statements are not supported"),
            ("WITH x AS (SELECT 1) SELECT * FROM x", "common table expressions are not supported"),
            ("UPDATE t SET a = 1", "statement does not begin with SELECT"),
            ("SELECT 1", "no top-level FROM clause"),
            ("SELECT (a FROM t", "unbalanced parentheses"),
            ("SELECT FROM t", "empty column list"),
            ("SELECT a FROM t ORDER BY", "ORDER BY without terms"),
        ] {
            let err = build_page_queries(sql, 0, 10).unwrap_err();
            assert_eq!(
                err,
                Error::SqlRewriteFailure {
                    sql: sql.to_string(),
                    reason
                },
                "{sql}"
            );
        }
    }

    #[test]
    fn test_page_bounds_overflow() {
        let err = build_page_queries("SELECT a FROM t", u64::MAX, 1).unwrap_err();
        assert!(matches!(err, Error::SqlRewriteFailure { reason: "page bounds overflow", .. }));
    }

    #[test]
    fn test_config_deserializes_with_defaults() {
        let config: PagingConfig = serde_json::from_str(r#"{"rownum_alias": "rn"}"#).unwrap();
        assert_eq!(config.rownum_alias, "rn");
        assert_eq!(config.paged_alias, "__rowgraph_paged");
    }
}
