//! Simple-statement path.
//!
//! Narrow, anchored regexes recognize the common single-table shapes
//! without involving the full SQL parser. The same handlers run again as
//! a fallback when the full parser rejects a statement.

use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::ast::*;
use crate::error::{SqlRestError, SqlRestResult};
use crate::parser::{
    parse_column_list, parse_insert_values, parse_select_fields, parse_single_condition,
};
use crate::value::parse_literal_token;

/// How strictly a simple handler treats text it only partly understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Anything short of a full match is "not applicable" and goes to the full parser.
    FastPath,
    /// The full parser already rejected the text; failures become 400 errors.
    Fallback,
}

/// Collapse whitespace runs outside quotes, trim, drop one trailing `;`.
pub fn normalize(sql: &str) -> String {
    let mut out = String::with_capacity(sql.len());
    let mut quote: Option<char> = None;
    let mut pending_space = false;

    for c in sql.trim().chars() {
        match quote {
            Some(q) => {
                out.push(c);
                if c == q {
                    quote = None;
                }
            }
            None if c.is_whitespace() => pending_space = true,
            None => {
                if pending_space {
                    out.push(' ');
                    pending_space = false;
                }
                if c == '\'' || c == '"' || c == '`' {
                    quote = Some(c);
                }
                out.push(c);
            }
        }
    }

    match out.strip_suffix(';') {
        Some(stripped) => stripped.trim_end().to_string(),
        None => out,
    }
}

static DELETE_SHAPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^DELETE FROM (\w+)(?: WHERE (.+))?$").unwrap());

static UPDATE_SHAPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)^UPDATE (\w+) SET (\w+) ?= ?('[^']*'|"[^"]*"|\d+|\w+)(?: WHERE (.+))?$"#)
        .unwrap()
});

static UPDATE_CAPTURE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?i)^UPDATE (\w+) SET (\w+) ?= ?('(?:[^']|'')*'|"(?:[^"]|"")*"|[^\s,'"]+)(?: WHERE (.+))?$"#,
    )
    .unwrap()
});

static INSERT_SHAPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^INSERT INTO (\w+) ?\(([^)]+)\) VALUES ?\((.+)\)$").unwrap()
});

static SELECT_FIELDS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^SELECT (.+?) FROM ").unwrap());

static SELECT_SHAPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^SELECT (.+?) FROM (\w+)(?: ORDER BY (\w+)(?: (ASC|DESC))?)?$").unwrap()
});

static SELECT_CAPTURE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^SELECT (.+?) FROM (\w+)(?: WHERE (.+?))?(?: ORDER BY (\w+)(?: (ASC|DESC))?)?$",
    )
    .unwrap()
});

/// Classifiers and handlers over the shared simple-statement patterns.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimpleMatcher;

impl SimpleMatcher {
    pub fn new() -> Self {
        Self
    }

    /// `DELETE FROM <table> [WHERE <rest>]`
    pub fn is_simple_delete(&self, sql: &str) -> bool {
        DELETE_SHAPE.is_match(sql)
    }

    /// `UPDATE <table> SET <col> = <value> [WHERE <rest>]` with one assignment.
    pub fn is_simple_update(&self, sql: &str) -> bool {
        UPDATE_SHAPE.is_match(sql)
    }

    /// `INSERT INTO <table> (<cols>) VALUES (<vals>)`
    pub fn is_simple_insert(&self, sql: &str) -> bool {
        INSERT_SHAPE.is_match(sql)
    }

    /// Multi-column field list, or `SELECT <fields> FROM <table> [ORDER BY <col> [ASC|DESC]]`.
    pub fn is_simple_select(&self, sql: &str) -> bool {
        let multi_column = SELECT_FIELDS
            .captures(sql)
            .is_some_and(|caps| caps[1].contains(','));
        multi_column || SELECT_SHAPE.is_match(sql)
    }

    /// First matching classifier, in priority order DELETE > UPDATE > INSERT > SELECT.
    pub fn classify(&self, sql: &str) -> Option<StatementKind> {
        if self.is_simple_delete(sql) {
            Some(StatementKind::Delete)
        } else if self.is_simple_update(sql) {
            Some(StatementKind::Update)
        } else if self.is_simple_insert(sql) {
            Some(StatementKind::Insert)
        } else if self.is_simple_select(sql) {
            Some(StatementKind::Select)
        } else {
            None
        }
    }

    /// Run the handler for `kind` over normalized text.
    ///
    /// `Ok(None)` means the text is not a simple statement of that kind (fast path only).
    pub fn recognize(
        &self,
        kind: StatementKind,
        sql: &str,
        mode: Mode,
    ) -> SqlRestResult<Option<Statement>> {
        match kind {
            StatementKind::Select => self.recognize_select(sql, mode),
            StatementKind::Insert => self.recognize_insert(sql, mode),
            StatementKind::Update => self.recognize_update(sql, mode),
            StatementKind::Delete => self.recognize_delete(sql, mode),
        }
    }

    fn recognize_select(&self, sql: &str, mode: Mode) -> SqlRestResult<Option<Statement>> {
        let Some(caps) = SELECT_CAPTURE.captures(sql) else {
            return not_applicable(mode, "Unrecognized SELECT statement format");
        };

        let fields = &caps[1];
        let Some(columns) = parse_select_fields(fields) else {
            return not_applicable(mode, format!("Unsupported field list '{}'", fields));
        };

        let filter = match caps.get(3) {
            None => None,
            Some(clause) => match parse_single_condition(clause.as_str()) {
                Some(cond) => Some(Predicate::Compare(cond)),
                None if mode == Mode::FastPath => return Ok(None),
                None => {
                    tracing::warn!(
                        "WHERE clause '{}' left unapplied on simple SELECT",
                        clause.as_str()
                    );
                    None
                }
            },
        };

        let order_by = match caps.get(4) {
            Some(column) => {
                let desc = caps
                    .get(5)
                    .is_some_and(|dir| dir.as_str().eq_ignore_ascii_case("DESC"));
                vec![if desc {
                    OrderBy::desc(column.as_str())
                } else {
                    OrderBy::asc(column.as_str())
                }]
            }
            None => vec![],
        };

        Ok(Some(Statement::Select(SelectStmt {
            table: caps[2].to_string(),
            columns,
            filter,
            order_by,
            limit: None,
            offset: None,
        })))
    }

    fn recognize_insert(&self, sql: &str, mode: Mode) -> SqlRestResult<Option<Statement>> {
        let Some(caps) = INSERT_SHAPE.captures(sql) else {
            return not_applicable(mode, "Unrecognized INSERT statement format");
        };

        let Some(columns) = parse_column_list(&caps[2]) else {
            return not_applicable(mode, format!("Unsupported column list '{}'", &caps[2]));
        };
        let values = match parse_insert_values(&caps[3]) {
            Ok(values) => values,
            Err(_) if mode == Mode::FastPath => return Ok(None),
            Err(e) => return Err(e),
        };
        if columns.len() != values.len() {
            return Err(SqlRestError::ArityMismatch {
                columns: columns.len(),
                values: values.len(),
            });
        }

        Ok(Some(Statement::Insert(InsertStmt {
            table: caps[1].to_string(),
            columns,
            rows: vec![values],
        })))
    }

    fn recognize_update(&self, sql: &str, mode: Mode) -> SqlRestResult<Option<Statement>> {
        let Some(caps) = UPDATE_CAPTURE.captures(sql) else {
            return not_applicable(mode, "Unrecognized UPDATE statement format");
        };

        let Some(filter) = where_condition(&caps, 4, mode, StatementKind::Update)? else {
            return Ok(None);
        };

        Ok(Some(Statement::Update(UpdateStmt {
            table: caps[1].to_string(),
            assignments: vec![Assignment {
                column: caps[2].to_string(),
                value: parse_literal_token(&caps[3]),
            }],
            filter,
        })))
    }

    fn recognize_delete(&self, sql: &str, mode: Mode) -> SqlRestResult<Option<Statement>> {
        let Some(caps) = DELETE_SHAPE.captures(sql) else {
            return not_applicable(mode, "Unrecognized DELETE statement format");
        };

        let Some(filter) = where_condition(&caps, 2, mode, StatementKind::Delete)? else {
            return Ok(None);
        };

        Ok(Some(Statement::Delete(DeleteStmt {
            table: caps[1].to_string(),
            filter,
        })))
    }
}

fn not_applicable<T>(mode: Mode, message: impl Into<String>) -> SqlRestResult<Option<T>> {
    match mode {
        Mode::FastPath => Ok(None),
        Mode::Fallback => Err(SqlRestError::simple(message)),
    }
}

/// WHERE clause of a mutating statement.
///
/// The outer `Option` is `None` when the statement is not applicable; the
/// inner one is the (possibly absent) filter. A mutation never runs with a
/// filter it could not read.
fn where_condition(
    caps: &Captures<'_>,
    group: usize,
    mode: Mode,
    kind: StatementKind,
) -> SqlRestResult<Option<Option<Predicate>>> {
    let Some(clause) = caps.get(group) else {
        return Ok(Some(None));
    };
    match parse_single_condition(clause.as_str()) {
        Some(cond) => Ok(Some(Some(Predicate::Compare(cond)))),
        None => not_applicable(
            mode,
            format!(
                "WHERE clause '{}' is not supported by the simple {} path",
                clause.as_str(),
                kind
            ),
        ),
    }
}
