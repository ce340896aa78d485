//! Table-API request model.
//!
//! A [`TableQuery`] is the value the translator produces: a chain of
//! builder calls (`select`, `eq`, `or`, `order`, `limit`, `insert`, ...)
//! recorded as data, executed later by a [`crate::client::TableApi`].
//!
//! The textual filter syntax (`column.op.value`, `or=(...)`, `in.(...)`) is
//! produced only by [`render_value`] and [`render_condition`].

use serde::{Deserialize, Serialize};

use crate::ast::{Comparison, Operator, OrderBy, SortOrder};
use crate::value::Value;

/// A row as exchanged with the table API.
pub type Row = serde_json::Map<String, serde_json::Value>;

/// What the request does to the table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Operation {
    Select,
    Insert(Vec<Row>),
    Update(Row),
    Delete,
}

impl Operation {
    pub fn name(&self) -> &'static str {
        match self {
            Operation::Select => "select",
            Operation::Insert(_) => "insert",
            Operation::Update(_) => "update",
            Operation::Delete => "delete",
        }
    }
}

/// One filter call on the builder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Filter {
    /// `.eq(column, value)` and friends
    Condition(Comparison),
    /// `.or("a.eq.1,b.eq.2")`
    Or(Disjunction),
}

/// Leaf conditions joined by OR.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Disjunction {
    pub conditions: Vec<Comparison>,
}

impl Disjunction {
    pub fn new(conditions: Vec<Comparison>) -> Self {
        Self { conditions }
    }

    /// Render as the table API's disjunctive filter expression.
    pub fn to_filter_string(&self) -> String {
        self.conditions
            .iter()
            .map(render_condition)
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// A recorded chain of table-API builder calls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableQuery {
    pub table: String,
    pub operation: Operation,
    /// Column list to return. For mutations `None` means no select-back.
    pub select: Option<String>,
    pub filters: Vec<Filter>,
    pub order: Vec<OrderBy>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

impl TableQuery {
    /// Start a request against `table` (`.from(table)`).
    pub fn table(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            operation: Operation::Select,
            select: None,
            filters: vec![],
            order: vec![],
            limit: None,
            offset: None,
        }
    }

    /// Choose returned columns; after `insert`/`update` this selects the affected rows back.
    pub fn select(mut self, columns: impl Into<String>) -> Self {
        self.select = Some(columns.into());
        self
    }

    pub fn insert(mut self, rows: Vec<Row>) -> Self {
        self.operation = Operation::Insert(rows);
        self
    }

    pub fn update(mut self, record: Row) -> Self {
        self.operation = Operation::Update(record);
        self
    }

    pub fn delete(mut self) -> Self {
        self.operation = Operation::Delete;
        self
    }

    /// Add a leaf filter.
    pub fn filter(mut self, column: impl Into<String>, op: Operator, value: impl Into<Value>) -> Self {
        let value = value.into();
        let value = match op {
            Operator::In => Value::List(value.into_list()),
            _ => value,
        };
        self.filters.push(Filter::Condition(Comparison {
            column: column.into(),
            op,
            value,
        }));
        self
    }

    pub fn eq(self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filter(column, Operator::Eq, value)
    }

    pub fn neq(self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filter(column, Operator::Neq, value)
    }

    pub fn gt(self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filter(column, Operator::Gt, value)
    }

    pub fn gte(self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filter(column, Operator::Gte, value)
    }

    pub fn lt(self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filter(column, Operator::Lt, value)
    }

    pub fn lte(self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filter(column, Operator::Lte, value)
    }

    pub fn like(self, column: impl Into<String>, pattern: impl Into<Value>) -> Self {
        self.filter(column, Operator::Like, pattern)
    }

    pub fn ilike(self, column: impl Into<String>, pattern: impl Into<Value>) -> Self {
        self.filter(column, Operator::ILike, pattern)
    }

    pub fn in_list(self, column: impl Into<String>, values: Vec<Value>) -> Self {
        self.filter(column, Operator::In, Value::List(values))
    }

    pub fn is(self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filter(column, Operator::Is, value)
    }

    pub fn or(mut self, disjunction: Disjunction) -> Self {
        self.filters.push(Filter::Or(disjunction));
        self
    }

    /// Append an ordering key; earlier keys take precedence.
    pub fn order(mut self, column: impl Into<String>, ascending: bool) -> Self {
        self.order.push(OrderBy {
            column: column.into(),
            order: if ascending {
                SortOrder::Asc
            } else {
                SortOrder::Desc
            },
        });
        self
    }

    pub fn limit(mut self, n: u64) -> Self {
        self.limit = Some(n);
        self
    }

    pub fn offset(mut self, n: u64) -> Self {
        self.offset = Some(n);
        self
    }

    /// Whether the response should carry rows.
    pub fn returns_rows(&self) -> bool {
        matches!(self.operation, Operation::Select) || self.select.is_some()
    }
}

impl std::fmt::Display for TableQuery {
    /// Builder-chain notation, e.g. `from("users").select("*").eq("id", 1)`.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "from({:?})", self.table)?;
        match &self.operation {
            Operation::Select => {}
            Operation::Insert(rows) => {
                let body = serde_json::Value::Array(
                    rows.iter().cloned().map(serde_json::Value::Object).collect(),
                );
                write!(f, ".insert({})", body)?;
            }
            Operation::Update(record) => {
                write!(f, ".update({})", serde_json::Value::Object(record.clone()))?;
            }
            Operation::Delete => write!(f, ".delete()")?,
        }
        match (&self.operation, &self.select) {
            (_, Some(columns)) => write!(f, ".select({:?})", columns)?,
            (Operation::Select, None) => write!(f, ".select(\"*\")")?,
            _ => {}
        }
        for filter in &self.filters {
            match filter {
                Filter::Condition(c) => write!(
                    f,
                    ".{}({:?}, {})",
                    c.op.api_name(),
                    c.column,
                    render_value(&c.value, false)
                )?,
                Filter::Or(d) => write!(f, ".or({:?})", d.to_filter_string())?,
            }
        }
        for o in &self.order {
            let ascending = o.order == SortOrder::Asc;
            write!(f, ".order({:?}, {{ ascending: {} }})", o.column, ascending)?;
        }
        if let Some(n) = self.limit {
            write!(f, ".limit({})", n)?;
        }
        if let Some(n) = self.offset {
            write!(f, ".offset({})", n)?;
        }
        Ok(())
    }
}

/// Characters that must be quoted inside `or=(...)` and `in.(...)` lists.
const RESERVED: &[char] = &[',', '.', ':', '(', ')', '"', '\\'];

/// Render a value in the table API's filter syntax.
///
/// `nested` is set inside lists and disjunctions, where reserved characters
/// would otherwise split the expression.
pub fn render_value(value: &Value, nested: bool) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Int(n) => n.to_string(),
        Value::Float(n) => n.to_string(),
        Value::String(s) => {
            if nested && (s.is_empty() || s.contains(RESERVED) || s.contains(char::is_whitespace)) {
                format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
            } else {
                s.clone()
            }
        }
        Value::List(items) => format!(
            "({})",
            items
                .iter()
                .map(|v| render_value(v, true))
                .collect::<Vec<_>>()
                .join(",")
        ),
    }
}

/// Render a leaf condition as a `column.op.value` fragment.
pub fn render_condition(condition: &Comparison) -> String {
    format!(
        "{}.{}.{}",
        condition.column,
        condition.op.api_name(),
        render_value(&condition.value, true)
    )
}

/// Render the `select` list entry for a column: `alias:column` renames it.
pub fn render_column(name: &str, alias: Option<&str>) -> String {
    match alias {
        Some(alias) => format!("{}:{}", alias, name),
        None => name.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_or_fragments() {
        let d = Disjunction::new(vec![
            Comparison::new("col1", Operator::Eq, "a"),
            Comparison::new("col2", Operator::Eq, "b"),
        ]);
        assert_eq!(d.to_filter_string(), "col1.eq.a,col2.eq.b");
    }

    #[test]
    fn test_reserved_characters_are_quoted_in_lists() {
        let d = Disjunction::new(vec![
            Comparison::new("name", Operator::Eq, "Doe, John"),
            Comparison::new("tag", Operator::In, Value::List(vec!["a.b".into(), 1.into()])),
        ]);
        assert_eq!(
            d.to_filter_string(),
            "name.eq.\"Doe, John\",tag.in.(\"a.b\",1)"
        );
    }

    #[test]
    fn test_top_level_values_are_raw() {
        assert_eq!(render_value(&Value::String("a,b".into()), false), "a,b");
        assert_eq!(render_value(&Value::Null, false), "null");
        assert_eq!(
            render_value(&Value::String("say \"hi\"".into()), true),
            "\"say \\\"hi\\\"\""
        );
    }

    #[test]
    fn test_in_coerces_single_value_to_list() {
        let q = TableQuery::table("t").filter("id", Operator::In, 5);
        assert_eq!(
            q.filters,
            vec![Filter::Condition(Comparison::new(
                "id",
                Operator::In,
                Value::List(vec![Value::Int(5)])
            ))]
        );
    }

    #[test]
    fn test_chain_display() {
        let q = TableQuery::table("users")
            .select("id,name")
            .eq("active", true)
            .order("created_at", false)
            .limit(10);
        assert_eq!(
            q.to_string(),
            "from(\"users\").select(\"id,name\").eq(\"active\", true)\
             .order(\"created_at\", { ascending: false }).limit(10)"
        );
    }

    #[test]
    fn test_delete_returns_no_rows() {
        let q = TableQuery::table("t").delete().eq("id", 1);
        assert!(!q.returns_rows());
        assert!(TableQuery::table("t").returns_rows());
        assert!(TableQuery::table("t").insert(vec![]).select("*").returns_rows());
    }

    #[test]
    fn test_render_column() {
        assert_eq!(render_column("full_name", Some("name")), "name:full_name");
        assert_eq!(render_column("id", None), "id");
    }
}
