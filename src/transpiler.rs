//! Statement to table-API transpiler.
//!
//! Converts typed statements into [`TableQuery`] builder chains.

use regex::Regex;
use std::sync::LazyLock;

use crate::ast::*;
use crate::error::{SqlRestError, SqlRestResult};
use crate::query::{render_column, Disjunction, Row, TableQuery};
use crate::value::Value;

static IDENTIFIER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap());

/// Trait for converting statements to table-API requests.
pub trait ToTableQuery {
    /// Build the request this statement stands for.
    fn to_table_query(&self) -> SqlRestResult<TableQuery>;
}

impl ToTableQuery for Statement {
    fn to_table_query(&self) -> SqlRestResult<TableQuery> {
        match self {
            Statement::Select(s) => s.to_table_query(),
            Statement::Insert(s) => s.to_table_query(),
            Statement::Update(s) => s.to_table_query(),
            Statement::Delete(s) => s.to_table_query(),
        }
    }
}

impl ToTableQuery for SelectStmt {
    fn to_table_query(&self) -> SqlRestResult<TableQuery> {
        validate_identifier(&self.table)?;

        let columns = self
            .columns
            .iter()
            .map(|column| match column {
                SelectColumn::Star => Ok("*".to_string()),
                SelectColumn::Named { name, alias } => {
                    validate_identifier(name)?;
                    if let Some(alias) = alias {
                        validate_identifier(alias)?;
                    }
                    Ok(render_column(name, alias.as_deref()))
                }
            })
            .collect::<SqlRestResult<Vec<_>>>()?;
        let select = if columns.is_empty() {
            "*".to_string()
        } else {
            columns.join(",")
        };

        let mut query = TableQuery::table(&self.table).select(select);
        if let Some(filter) = &self.filter {
            query = apply_where(query, filter)?;
        }
        for order in &self.order_by {
            validate_identifier(&order.column)?;
            query = query.order(&order.column, order.order == SortOrder::Asc);
        }
        if let Some(n) = self.limit {
            query = query.limit(n);
        }
        if let Some(n) = self.offset {
            query = query.offset(n);
        }
        Ok(query)
    }
}

impl ToTableQuery for InsertStmt {
    fn to_table_query(&self) -> SqlRestResult<TableQuery> {
        validate_identifier(&self.table)?;
        for column in &self.columns {
            validate_identifier(column)?;
        }
        if self.rows.is_empty() {
            return Err(SqlRestError::unsupported("INSERT without rows"));
        }

        let rows = self
            .rows
            .iter()
            .map(|values| {
                if values.len() != self.columns.len() {
                    return Err(SqlRestError::ArityMismatch {
                        columns: self.columns.len(),
                        values: values.len(),
                    });
                }
                Ok(self
                    .columns
                    .iter()
                    .cloned()
                    .zip(values.iter().cloned().map(serde_json::Value::from))
                    .collect::<Row>())
            })
            .collect::<SqlRestResult<Vec<_>>>()?;

        Ok(TableQuery::table(&self.table).insert(rows).select("*"))
    }
}

impl ToTableQuery for UpdateStmt {
    fn to_table_query(&self) -> SqlRestResult<TableQuery> {
        validate_identifier(&self.table)?;
        if self.assignments.is_empty() {
            return Err(SqlRestError::unsupported("UPDATE without assignments"));
        }

        let mut record = Row::new();
        for assignment in &self.assignments {
            validate_identifier(&assignment.column)?;
            record.insert(
                assignment.column.clone(),
                serde_json::Value::from(assignment.value.clone()),
            );
        }

        let mut query = TableQuery::table(&self.table).update(record);
        if let Some(filter) = &self.filter {
            query = apply_where(query, filter)?;
        }
        Ok(query.select("*"))
    }
}

impl ToTableQuery for DeleteStmt {
    fn to_table_query(&self) -> SqlRestResult<TableQuery> {
        validate_identifier(&self.table)?;

        let mut query = TableQuery::table(&self.table).delete();
        if let Some(filter) = &self.filter {
            query = apply_where(query, filter)?;
        }
        Ok(query)
    }
}

/// Apply a WHERE tree to a query.
///
/// AND applies both sides as successive filters. An OR subtree becomes a
/// single disjunctive filter over its leaves.
pub fn apply_where(query: TableQuery, predicate: &Predicate) -> SqlRestResult<TableQuery> {
    match predicate {
        Predicate::Compare(c) => {
            let c = checked(c)?;
            Ok(query.filter(c.column, c.op, c.value))
        }
        Predicate::And(left, right) => {
            let query = apply_where(query, left)?;
            apply_where(query, right)
        }
        Predicate::Or(..) => {
            let mut conditions = Vec::new();
            collect_disjuncts(predicate, &mut conditions)?;
            Ok(query.or(Disjunction::new(conditions)))
        }
    }
}

fn collect_disjuncts(predicate: &Predicate, out: &mut Vec<Comparison>) -> SqlRestResult<()> {
    match predicate {
        Predicate::Compare(c) => {
            out.push(checked(c)?);
            Ok(())
        }
        Predicate::Or(left, right) => {
            collect_disjuncts(left, out)?;
            collect_disjuncts(right, out)
        }
        Predicate::And(..) => Err(SqlRestError::unsupported("AND nested inside OR")),
    }
}

/// Validate a leaf and bring its value into the shape its operator expects.
fn checked(c: &Comparison) -> SqlRestResult<Comparison> {
    validate_identifier(&c.column)?;
    let value = match (c.op, &c.value) {
        (Operator::In, value) => Value::List(value.clone().into_list()),
        (Operator::Is, Value::Null | Value::Bool(_)) => c.value.clone(),
        (Operator::Is, other) => {
            return Err(SqlRestError::InvalidValue(format!(
                "IS expects NULL, TRUE or FALSE, got {}",
                other
            )));
        }
        (_, Value::List(_)) => {
            return Err(SqlRestError::InvalidValue(format!(
                "list value for {} on column {}",
                c.op.sql_symbol(),
                c.column
            )));
        }
        (_, value) => value.clone(),
    };
    Ok(Comparison {
        column: c.column.clone(),
        op: c.op,
        value,
    })
}

/// Reject names that are not plain identifiers.
pub fn validate_identifier(name: &str) -> SqlRestResult<()> {
    if IDENTIFIER.is_match(name) {
        Ok(())
    } else {
        Err(SqlRestError::InvalidIdentifier(name.to_string()))
    }
}
