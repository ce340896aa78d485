//! In-process table store.
//!
//! Evaluates table-API requests against rows held in memory, following the
//! PostgREST semantics the translator relies on: filters cast the filter
//! value to the column's type, NULL only matches `is`, ascending order puts
//! NULLs last.

use async_trait::async_trait;
use regex::RegexBuilder;
use serde_json::Value as Json;
use std::cmp::Ordering;
use std::collections::HashMap;
use tokio::sync::RwLock;

use super::{ApiError, QueryResult, TableApi};
use crate::ast::{Comparison, Operator, OrderBy, SortOrder};
use crate::query::{Filter, Operation, Row, TableQuery};
use crate::value::Value;

/// Tables keyed by name, each an ordered list of rows.
#[derive(Debug, Default)]
pub struct MemoryClient {
    tables: RwLock<HashMap<String, Vec<Row>>>,
}

impl MemoryClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) a table with initial rows.
    pub fn with_table(mut self, name: impl Into<String>, rows: Vec<Row>) -> Self {
        self.tables.get_mut().insert(name.into(), rows);
        self
    }

    /// Create an empty table if it does not exist yet.
    pub async fn create_table(&self, name: impl Into<String>) {
        self.tables.write().await.entry(name.into()).or_default();
    }

    /// Snapshot of a table's rows.
    pub async fn rows(&self, table: &str) -> Option<Vec<Row>> {
        self.tables.read().await.get(table).cloned()
    }

    async fn select(&self, query: &TableQuery) -> Result<Vec<Row>, ApiError> {
        let tables = self.tables.read().await;
        let rows = tables.get(&query.table).ok_or_else(|| missing(&query.table))?;

        let mut matched: Vec<&Row> = rows
            .iter()
            .filter(|row| matches_all(row, &query.filters))
            .collect();
        if !query.order.is_empty() {
            matched.sort_by(|a, b| compare_rows(a, b, &query.order));
        }

        let offset = query.offset.unwrap_or(0) as usize;
        let limit = query.limit.map(|n| n as usize).unwrap_or(usize::MAX);
        let columns = query.select.as_deref().unwrap_or("*");
        Ok(matched
            .into_iter()
            .skip(offset)
            .take(limit)
            .map(|row| project(row, columns))
            .collect())
    }

    async fn insert(&self, query: &TableQuery, new_rows: &[Row]) -> Result<Vec<Row>, ApiError> {
        let mut tables = self.tables.write().await;
        let rows = tables
            .get_mut(&query.table)
            .ok_or_else(|| missing(&query.table))?;
        rows.extend(new_rows.iter().cloned());
        Ok(new_rows.to_vec())
    }

    async fn update(&self, query: &TableQuery, record: &Row) -> Result<Vec<Row>, ApiError> {
        let mut tables = self.tables.write().await;
        let rows = tables
            .get_mut(&query.table)
            .ok_or_else(|| missing(&query.table))?;

        let mut updated = Vec::new();
        for row in rows.iter_mut().filter(|row| matches_all(row, &query.filters)) {
            for (column, value) in record {
                row.insert(column.clone(), value.clone());
            }
            updated.push(row.clone());
        }
        Ok(updated)
    }

    async fn delete(&self, query: &TableQuery) -> Result<Vec<Row>, ApiError> {
        let mut tables = self.tables.write().await;
        let rows = tables
            .get_mut(&query.table)
            .ok_or_else(|| missing(&query.table))?;

        let (removed, kept): (Vec<Row>, Vec<Row>) = std::mem::take(rows)
            .into_iter()
            .partition(|row| matches_all(row, &query.filters));
        *rows = kept;
        Ok(removed)
    }
}

#[async_trait]
impl TableApi for MemoryClient {
    async fn execute(&self, query: &TableQuery) -> QueryResult {
        let result = match &query.operation {
            Operation::Select => self.select(query).await,
            Operation::Insert(rows) => self.insert(query, rows).await,
            Operation::Update(record) => self.update(query, record).await,
            Operation::Delete => self.delete(query).await,
        };
        match result {
            Ok(rows) if matches!(query.operation, Operation::Select) => QueryResult::ok(rows),
            Ok(rows) => match query.select.as_deref() {
                Some(columns) => {
                    QueryResult::ok(rows.iter().map(|row| project(row, columns)).collect())
                }
                None => QueryResult::empty(),
            },
            Err(e) => QueryResult::failure(e),
        }
    }
}

fn missing(table: &str) -> ApiError {
    ApiError::new(format!("relation \"{}\" does not exist", table), Some(404))
}

fn matches_all(row: &Row, filters: &[Filter]) -> bool {
    filters.iter().all(|filter| match filter {
        Filter::Condition(c) => matches(row, c),
        Filter::Or(d) => d.conditions.iter().any(|c| matches(row, c)),
    })
}

fn matches(row: &Row, condition: &Comparison) -> bool {
    let actual = row.get(&condition.column).unwrap_or(&Json::Null);

    let ordering = || compare_to_filter(actual, &condition.value);
    match condition.op {
        Operator::Is => match (&condition.value, actual) {
            (Value::Null, Json::Null) => true,
            (Value::Bool(expected), Json::Bool(b)) => expected == b,
            _ => false,
        },
        _ if actual.is_null() => false,
        Operator::Eq => ordering() == Some(Ordering::Equal),
        Operator::Neq => matches!(ordering(), Some(Ordering::Less | Ordering::Greater)),
        Operator::Gt => ordering() == Some(Ordering::Greater),
        Operator::Gte => matches!(ordering(), Some(Ordering::Greater | Ordering::Equal)),
        Operator::Lt => ordering() == Some(Ordering::Less),
        Operator::Lte => matches!(ordering(), Some(Ordering::Less | Ordering::Equal)),
        Operator::Like => like(actual, &condition.value, false),
        Operator::ILike => like(actual, &condition.value, true),
        Operator::In => match &condition.value {
            Value::List(items) => items
                .iter()
                .any(|v| compare_to_filter(actual, v) == Some(Ordering::Equal)),
            single => compare_to_filter(actual, single) == Some(Ordering::Equal),
        },
    }
}

/// Compare a stored value with a filter value cast to the stored value's type.
fn compare_to_filter(actual: &Json, expected: &Value) -> Option<Ordering> {
    match (actual, expected) {
        (_, Value::Null) | (_, Value::List(_)) => None,
        (Json::Number(n), Value::Int(i)) => match n.as_i64() {
            Some(a) => Some(a.cmp(i)),
            None => n.as_f64()?.partial_cmp(&(*i as f64)),
        },
        (Json::Number(n), Value::Float(f)) => n.as_f64()?.partial_cmp(f),
        (Json::Number(n), Value::String(s)) => n.as_f64()?.partial_cmp(&s.trim().parse::<f64>().ok()?),
        (Json::String(a), Value::String(s)) => Some(a.as_str().cmp(s.as_str())),
        (Json::String(a), Value::Int(_) | Value::Float(_) | Value::Bool(_)) => {
            Some(a.as_str().cmp(expected.to_string().as_str()))
        }
        (Json::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        (Json::Bool(a), Value::String(s)) => Some(a.cmp(&s.parse::<bool>().ok()?)),
        _ => None,
    }
}

/// SQL LIKE with `%` (or `*`) for any run and `_` for one character.
fn like(actual: &Json, pattern: &Value, case_insensitive: bool) -> bool {
    let (Json::String(text), Value::String(pattern)) = (actual, pattern) else {
        return false;
    };

    let mut re = String::from("^");
    let mut literal = String::new();
    for c in pattern.chars() {
        let wildcard = match c {
            '%' | '*' => ".*",
            '_' => ".",
            _ => {
                literal.push(c);
                continue;
            }
        };
        re.push_str(&regex::escape(&literal));
        literal.clear();
        re.push_str(wildcard);
    }
    re.push_str(&regex::escape(&literal));
    re.push('$');

    RegexBuilder::new(&re)
        .case_insensitive(case_insensitive)
        .dot_matches_new_line(true)
        .build()
        .is_ok_and(|re| re.is_match(text))
}

fn compare_rows(a: &Row, b: &Row, order: &[OrderBy]) -> Ordering {
    for key in order {
        let left = a.get(&key.column).unwrap_or(&Json::Null);
        let right = b.get(&key.column).unwrap_or(&Json::Null);
        // NULL sorts as the largest value
        let ord = match (left.is_null(), right.is_null()) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Greater,
            (false, true) => Ordering::Less,
            (false, false) => compare_json(left, right),
        };
        let ord = match key.order {
            SortOrder::Asc => ord,
            SortOrder::Desc => ord.reverse(),
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}

fn compare_json(a: &Json, b: &Json) -> Ordering {
    match (a, b) {
        (Json::Number(x), Json::Number(y)) => match (x.as_i64(), y.as_i64()) {
            (Some(x), Some(y)) => x.cmp(&y),
            _ => x
                .as_f64()
                .partial_cmp(&y.as_f64())
                .unwrap_or(Ordering::Equal),
        },
        (Json::String(x), Json::String(y)) => x.cmp(y),
        (Json::Bool(x), Json::Bool(y)) => x.cmp(y),
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

fn type_rank(v: &Json) -> u8 {
    match v {
        Json::Null => 0,
        Json::Bool(_) => 1,
        Json::Number(_) => 2,
        Json::String(_) => 3,
        Json::Array(_) => 4,
        Json::Object(_) => 5,
    }
}

/// Apply a `select` column string (`*`, `col`, `alias:col`) to a row.
fn project(row: &Row, columns: &str) -> Row {
    let mut out = Row::new();
    for item in columns.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        if item == "*" {
            for (k, v) in row {
                out.insert(k.clone(), v.clone());
            }
            continue;
        }
        let (alias, column) = item.split_once(':').unwrap_or((item, item));
        out.insert(
            alias.to_string(),
            row.get(column).cloned().unwrap_or(Json::Null),
        );
    }
    out
}
