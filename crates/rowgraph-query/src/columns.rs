//! Column-list and ORDER BY helpers driven by an entity mapping.

use std::sync::OnceLock;

use regex::Regex;
use rowgraph_core::{EntityMapping, Error, Result};

/// Where clause used when a caller supplies none.
pub const DEFAULT_WHERE: &str = "1 = 1";

/// The mapping's columns as a select list, in mapping order.
///
/// `table_alias` qualifies each column (`p.id`); `as_prefix` renames it
/// (`p.id AS p_id`), which is what [`hydrate_by_name`] expects.
///
/// [`hydrate_by_name`]: rowgraph_core::hydrate_by_name
pub fn columns_list<T>(
    mapping: &EntityMapping<T>,
    table_alias: Option<&str>,
    as_prefix: Option<&str>,
) -> String {
    let qualifier = table_alias
        .filter(|a| !a.is_empty())
        .map(|a| format!("{a}."))
        .unwrap_or_default();
    mapping
        .column_names()
        .into_iter()
        .map(|name| match as_prefix.filter(|p| !p.is_empty()) {
            Some(prefix) => format!("{qualifier}{name} AS {prefix}{name}"),
            None => format!("{qualifier}{name}"),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// `SELECT <columns> FROM <table> WHERE <where_clause>`.
pub fn select_sql<T>(mapping: &EntityMapping<T>, where_clause: Option<&str>) -> String {
    let where_clause = where_clause
        .map(str::trim)
        .filter(|w| !w.is_empty())
        .unwrap_or(DEFAULT_WHERE);
    format!(
        "SELECT {} FROM {} WHERE {}",
        columns_list(mapping, None, None),
        mapping.table_name(),
        where_clause
    )
}

const ORDER_TERM: &str = r"(?i)^(\w+)(?:\s+(ASC|DESC))?$";

fn order_term() -> std::result::Result<&'static Regex, &'static regex::Error> {
    static TERM: OnceLock<std::result::Result<Regex, regex::Error>> = OnceLock::new();
    TERM.get_or_init(|| Regex::new(ORDER_TERM)).as_ref()
}

/// Validate a user-supplied `column [ASC|DESC], ...` list.
///
/// Every column must be a mapped column name (case-insensitive). The result
/// uses the mapping's spelling of each name and always carries an explicit
/// direction, defaulting to `ASC`. Anything else in the input is rejected,
/// which makes the output safe to splice into SQL.
pub fn safe_order_by<T>(mapping: &EntityMapping<T>, input: &str) -> Result<String> {
    let invalid = |reason: String| Error::InvalidOrderBy {
        input: input.to_string(),
        reason,
    };
    let term = order_term().map_err(|e| invalid(e.to_string()))?;

    let mut terms = Vec::new();
    for raw in input.split(',') {
        let raw = raw.trim();
        let caps = term
            .captures(raw)
            .ok_or_else(|| invalid(format!("malformed term '{raw}'")))?;
        let column = mapping
            .column_by_name(&caps[1])
            .ok_or_else(|| invalid(format!("unknown column '{}'", &caps[1])))?;
        let direction = caps
            .get(2)
            .map_or("ASC", |m| if m.as_str().eq_ignore_ascii_case("DESC") { "DESC" } else { "ASC" });
        terms.push(format!("{} {direction}", column.column_name()));
    }
    Ok(terms.join(", "))
}
