//! The flat two-table join statement used by the join splitter.

use std::fmt;

use rowgraph_core::{EntityMapping, Error, Result};

use crate::columns::{DEFAULT_WHERE, columns_list};

/// SQL join type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum JoinKind {
    #[default]
    Inner,
    Left,
}

impl JoinKind {
    pub const fn as_sql(self) -> &'static str {
        match self {
            JoinKind::Inner => "INNER JOIN",
            JoinKind::Left => "LEFT JOIN",
        }
    }
}

impl fmt::Display for JoinKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

/// Parameters of a join statement.
#[derive(Debug, Clone, Copy)]
pub struct JoinSpec<'a> {
    pub kind: JoinKind,
    /// Primary-side column of the ON clause. Defaults to the primary key.
    pub primary_column: Option<&'a str>,
    /// Joined-side column of the ON clause.
    pub join_column: &'a str,
    pub where_clause: Option<&'a str>,
    /// Defaults to both primary keys, descending.
    pub order_by: Option<&'a str>,
}

impl<'a> JoinSpec<'a> {
    pub fn new(kind: JoinKind, join_column: &'a str) -> Self {
        Self {
            kind,
            primary_column: None,
            join_column,
            where_clause: None,
            order_by: None,
        }
    }
}

fn non_empty(s: Option<&str>) -> Option<&str> {
    s.map(str::trim).filter(|s| !s.is_empty())
}

/// Build `SELECT <P columns>, <J columns> FROM P P <kind> J J ON ... WHERE ... ORDER BY ...`.
///
/// Each table is aliased by its own name, so the primary's columns occupy
/// `row[0..P.column_count]` and the joined columns follow immediately.
/// Join columns are checked against the mappings.
pub fn build_join_sql<P, J>(
    primary: &EntityMapping<P>,
    joined: &EntityMapping<J>,
    spec: &JoinSpec<'_>,
) -> Result<String> {
    let p = primary.table_name();
    let j = joined.table_name();

    let primary_column = match spec.primary_column {
        Some(name) => primary
            .column_by_name(name)
            .or_else(|| primary.field(name))
            .ok_or_else(|| Error::UnknownField {
                type_name: primary.type_name(),
                field: name.to_string(),
            })?,
        None => primary.primary_key()?,
    }
    .column_name();
    let join_column = joined
        .column_by_name(spec.join_column)
        .or_else(|| joined.field(spec.join_column))
        .ok_or_else(|| Error::UnknownField {
            type_name: joined.type_name(),
            field: spec.join_column.to_string(),
        })?
        .column_name();

    let where_clause = non_empty(spec.where_clause).unwrap_or(DEFAULT_WHERE);
    let order_by = match non_empty(spec.order_by) {
        Some(order) => order.to_string(),
        None => format!(
            "{p}.{} DESC, {j}.{} DESC",
            primary.primary_key()?.column_name(),
            joined.primary_key()?.column_name()
        ),
    };

    Ok(format!(
        "SELECT {}, {} FROM {p} {p} {} {j} {j} ON {p}.{primary_column} = {j}.{join_column} WHERE {where_clause} ORDER BY {order_by}",
        columns_list(primary, Some(p), None),
        columns_list(joined, Some(j), None),
        spec.kind,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rowgraph_core::mapped_column;

    #[derive(Debug, Default)]
    struct Project {
        id: i64,
        name: String,
    }

    #[derive(Debug, Default)]
    struct Comment {
        id: i64,
        project_id: i64,
        body: String,
    }

    fn projects() -> EntityMapping<Project> {
        EntityMapping::builder("Project")
            .column(mapped_column!(Project, id).primary_key())
            .column(mapped_column!(Project, name))
            .build()
    }

    fn comments() -> EntityMapping<Comment> {
        EntityMapping::builder("Comment")
            .column(mapped_column!(Comment, id).primary_key())
            .column(mapped_column!(Comment, project_id).column("ProjectID"))
            .column(mapped_column!(Comment, body))
            .build()
    }

    #[test]
    fn test_defaults() {
        let sql = build_join_sql(&projects(), &comments(), &JoinSpec::new(JoinKind::Left, "ProjectID")).unwrap();
        assert_eq!(
            sql,
            "SELECT Project.id, Project.name, Comment.id, Comment.ProjectID, Comment.body \
             FROM Project Project LEFT JOIN Comment Comment ON Project.id = Comment.ProjectID \
             WHERE 1 = 1 ORDER BY Project.id DESC, Comment.id DESC"
        );
    }

    #[test]
    fn test_explicit_clauses_and_field_names() {
        let spec = JoinSpec {
            kind: JoinKind::Inner,
            primary_column: Some("id"),
            join_column: "project_id",
            where_clause: Some("Project.name LIKE ?"),
            order_by: Some("Project.name"),
        };
        let sql = build_join_sql(&projects(), &comments(), &spec).unwrap();
        assert!(sql.contains("INNER JOIN Comment Comment ON Project.id = Comment.ProjectID"));
        assert!(sql.ends_with("WHERE Project.name LIKE ? ORDER BY Project.name"));
    }

    #[test]
    fn test_unknown_join_column() {
        let err = build_join_sql(&projects(), &comments(), &JoinSpec::new(JoinKind::Inner, "OwnerID")).unwrap_err();
        assert!(matches!(err, Error::UnknownField { ref field, .. } if field == "OwnerID"));
    }

    #[test]
    fn test_missing_primary_key_is_rejected() {
        let keyless = EntityMapping::<Project>::builder("Project")
            .column(mapped_column!(Project, name))
            .build();
        let err = build_join_sql(&keyless, &comments(), &JoinSpec::new(JoinKind::Inner, "ProjectID")).unwrap_err();
        assert!(matches!(err, Error::UnsupportedKey { key_columns: 0, .. }));
    }
}
