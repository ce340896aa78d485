//! Lowering from the sqlparser MySQL AST to [`Statement`].
//!
//! Only single-table SELECT/INSERT/UPDATE/DELETE survive lowering; every
//! other construct is rejected here so the transpiler never sees it.

use sqlparser::ast::{
    BinaryOperator, Expr, FromTable, GroupByExpr, LimitClause, OrderByKind, Query, SelectItem,
    SetExpr, Statement as SqlStatement, TableFactor, TableWithJoins, UnaryOperator,
};
use sqlparser::dialect::MySqlDialect;
use sqlparser::parser::Parser;

use crate::ast::*;
use crate::error::{SqlRestError, SqlRestResult};
use crate::value::Value;

/// Parse one MySQL statement and lower it.
///
/// Any rejection by the SQL parser itself is reported as
/// [`SqlRestError::Syntax`]; everything else is a translation error.
pub fn parse_statement(sql: &str) -> SqlRestResult<Statement> {
    let dialect = MySqlDialect {};
    let statements =
        Parser::parse_sql(&dialect, sql).map_err(|e| SqlRestError::Syntax(e.to_string()))?;

    match statements.as_slice() {
        [] => Err(SqlRestError::Syntax("empty statement".to_string())),
        [stmt] => lower_statement(stmt),
        _ => Err(SqlRestError::unsupported("multiple statements")),
    }
}

/// Lower a parsed statement by kind.
pub fn lower_statement(stmt: &SqlStatement) -> SqlRestResult<Statement> {
    match stmt {
        SqlStatement::Query(query) => lower_select(query).map(Statement::Select),
        SqlStatement::Insert(insert) => {
            if insert.replace_into {
                return Err(SqlRestError::unsupported("REPLACE INTO"));
            }
            if insert.ignore {
                return Err(SqlRestError::unsupported("INSERT IGNORE"));
            }
            if insert.on.is_some() {
                return Err(SqlRestError::unsupported("INSERT ... ON DUPLICATE KEY UPDATE"));
            }
            if !insert.assignments.is_empty() {
                return Err(SqlRestError::unsupported("INSERT ... SET"));
            }
            if insert.returning.is_some() {
                return Err(SqlRestError::unsupported("INSERT ... RETURNING"));
            }
            if insert.columns.is_empty() {
                return Err(SqlRestError::unsupported("INSERT without a column list"));
            }

            let table = object_name(&insert.table.to_string());
            let columns: Vec<String> = insert.columns.iter().map(|c| c.value.clone()).collect();

            let Some(source) = &insert.source else {
                return Err(SqlRestError::unsupported("INSERT without VALUES"));
            };
            let SetExpr::Values(values) = source.body.as_ref() else {
                return Err(SqlRestError::unsupported("INSERT ... SELECT"));
            };
            let rows = values
                .rows
                .iter()
                .map(|row| row.iter().map(lower_value).collect::<SqlRestResult<Vec<_>>>())
                .collect::<SqlRestResult<Vec<_>>>()?;

            Ok(Statement::Insert(InsertStmt {
                table,
                columns,
                rows,
            }))
        }
        SqlStatement::Update(update) => {
            if update.limit.is_some() {
                return Err(SqlRestError::unsupported("UPDATE ... LIMIT"));
            }
            if update.from.is_some() {
                return Err(SqlRestError::unsupported("UPDATE ... FROM"));
            }
            if update.returning.is_some() {
                return Err(SqlRestError::unsupported("UPDATE ... RETURNING"));
            }
            if update.or.is_some() {
                return Err(SqlRestError::unsupported("UPDATE OR ..."));
            }
            let table = single_table(&update.table, "UPDATE")?;
            let assignments = update
                .assignments
                .iter()
                .map(|a| {
                    Ok(Assignment {
                        column: object_name(&a.target.to_string()),
                        value: lower_value(&a.value)?,
                    })
                })
                .collect::<SqlRestResult<Vec<_>>>()?;
            let filter = update.selection.as_ref().map(lower_predicate).transpose()?;

            Ok(Statement::Update(UpdateStmt {
                table,
                assignments,
                filter,
            }))
        }
        SqlStatement::Delete(delete) => {
            if !delete.tables.is_empty() {
                return Err(SqlRestError::unsupported("multi-table DELETE"));
            }
            if delete.limit.is_some() {
                return Err(SqlRestError::unsupported("DELETE ... LIMIT"));
            }
            let tables = match &delete.from {
                FromTable::WithFromKeyword(tables) => tables,
                FromTable::WithoutKeyword(tables) => tables,
            };
            let table = match tables.as_slice() {
                [] => return Err(SqlRestError::MissingTable("DELETE")),
                [table] => single_table(table, "DELETE")?,
                _ => return Err(SqlRestError::unsupported("multi-table DELETE")),
            };
            let filter = delete.selection.as_ref().map(lower_predicate).transpose()?;

            Ok(Statement::Delete(DeleteStmt { table, filter }))
        }
        other => {
            let text = other.to_string();
            let keyword = text.split_whitespace().next().unwrap_or("").to_uppercase();
            Err(SqlRestError::UnsupportedStatement(keyword))
        }
    }
}

fn lower_select(query: &Query) -> SqlRestResult<SelectStmt> {
    if query.with.is_some() {
        return Err(SqlRestError::unsupported("WITH"));
    }
    let SetExpr::Select(select) = query.body.as_ref() else {
        return Err(SqlRestError::unsupported("set operations and subqueries"));
    };
    if select.distinct.is_some() {
        return Err(SqlRestError::unsupported("DISTINCT"));
    }
    match &select.group_by {
        GroupByExpr::Expressions(exprs, _) if exprs.is_empty() => {}
        _ => return Err(SqlRestError::unsupported("GROUP BY")),
    }
    if select.having.is_some() {
        return Err(SqlRestError::unsupported("HAVING"));
    }

    let table = match select.from.as_slice() {
        [] => return Err(SqlRestError::MissingTable("SELECT")),
        [table] => single_table(table, "SELECT")?,
        _ => return Err(SqlRestError::unsupported("multiple tables in FROM")),
    };

    let columns = select
        .projection
        .iter()
        .map(lower_select_item)
        .collect::<SqlRestResult<Vec<_>>>()?;

    let filter = select.selection.as_ref().map(lower_predicate).transpose()?;

    let order_by = match &query.order_by {
        None => vec![],
        Some(ob) => match &ob.kind {
            OrderByKind::All(_) => return Err(SqlRestError::unsupported("ORDER BY ALL")),
            OrderByKind::Expressions(exprs) => exprs
                .iter()
                .map(|o| {
                    let column = column_name(&o.expr)?;
                    Ok(if o.options.asc == Some(false) {
                        OrderBy::desc(column)
                    } else {
                        OrderBy::asc(column)
                    })
                })
                .collect::<SqlRestResult<Vec<_>>>()?,
        },
    };

    let (limit, offset) = match &query.limit_clause {
        None => (None, None),
        Some(LimitClause::LimitOffset {
            limit,
            offset,
            limit_by,
        }) => {
            if !limit_by.is_empty() {
                return Err(SqlRestError::unsupported("LIMIT BY"));
            }
            (
                limit.as_ref().map(lower_count).transpose()?,
                offset.as_ref().map(|o| lower_count(&o.value)).transpose()?,
            )
        }
        // MySQL `LIMIT offset, count`
        Some(LimitClause::OffsetCommaLimit { offset, limit }) => {
            (Some(lower_count(limit)?), Some(lower_count(offset)?))
        }
    };

    Ok(SelectStmt {
        table,
        columns,
        filter,
        order_by,
        limit,
        offset,
    })
}

fn lower_select_item(item: &SelectItem) -> SqlRestResult<SelectColumn> {
    match item {
        SelectItem::Wildcard(_) => Ok(SelectColumn::Star),
        SelectItem::UnnamedExpr(expr) => Ok(SelectColumn::named(column_name(expr)?)),
        SelectItem::ExprWithAlias { expr, alias } => {
            Ok(SelectColumn::aliased(column_name(expr)?, alias.value.clone()))
        }
        other => Err(SqlRestError::unsupported(format!("select item {}", other))),
    }
}

/// Table name of a plain, join-free relation.
fn single_table(table: &TableWithJoins, kind: &'static str) -> SqlRestResult<String> {
    if !table.joins.is_empty() {
        return Err(SqlRestError::unsupported("JOIN"));
    }
    match &table.relation {
        TableFactor::Table { name, .. } => Ok(object_name(&name.to_string())),
        other => Err(SqlRestError::unsupported(format!(
            "{} target {}",
            kind, other
        ))),
    }
}

fn object_name(raw: &str) -> String {
    raw.trim_matches(|c| c == '`' || c == '"').to_string()
}

/// Bare column reference; qualified names keep their last part.
fn column_name(expr: &Expr) -> SqlRestResult<String> {
    match expr {
        Expr::Identifier(ident) => Ok(ident.value.clone()),
        Expr::CompoundIdentifier(parts) => parts
            .last()
            .map(|i| i.value.clone())
            .ok_or_else(|| SqlRestError::unsupported("empty column reference")),
        Expr::Nested(inner) => column_name(inner),
        Expr::BinaryOp { op, .. } => Err(SqlRestError::UnsupportedOperator(op.to_string())),
        other => Err(SqlRestError::unsupported(format!("expression {}", other))),
    }
}

/// Lower a WHERE expression into a predicate tree.
pub fn lower_predicate(expr: &Expr) -> SqlRestResult<Predicate> {
    match expr {
        Expr::Nested(inner) => lower_predicate(inner),
        Expr::BinaryOp {
            left,
            op: BinaryOperator::And,
            right,
        } => Ok(Predicate::and(lower_predicate(left)?, lower_predicate(right)?)),
        Expr::BinaryOp {
            left,
            op: BinaryOperator::Or,
            right,
        } => Ok(Predicate::or(lower_predicate(left)?, lower_predicate(right)?)),
        Expr::BinaryOp { left, op, right } => {
            let op = comparison_operator(op)?;
            Ok(Comparison::new(column_name(left)?, op, lower_value(right)?).into())
        }
        Expr::InList {
            expr,
            list,
            negated: false,
        } => {
            let values = list.iter().map(lower_value).collect::<SqlRestResult<Vec<_>>>()?;
            Ok(Comparison::new(column_name(expr)?, Operator::In, Value::List(values)).into())
        }
        Expr::InList { negated: true, .. } => {
            Err(SqlRestError::UnsupportedOperator("NOT IN".to_string()))
        }
        Expr::IsNull(inner) => Ok(Comparison::new(column_name(inner)?, Operator::Is, Value::Null).into()),
        Expr::IsTrue(inner) => Ok(Comparison::new(column_name(inner)?, Operator::Is, true).into()),
        Expr::IsFalse(inner) => Ok(Comparison::new(column_name(inner)?, Operator::Is, false).into()),
        Expr::IsNotNull(_) | Expr::IsNotTrue(_) | Expr::IsNotFalse(_) => {
            Err(SqlRestError::UnsupportedOperator("IS NOT".to_string()))
        }
        Expr::Like {
            negated: false,
            expr,
            pattern,
            ..
        } => Ok(Comparison::new(column_name(expr)?, Operator::Like, lower_value(pattern)?).into()),
        Expr::ILike {
            negated: false,
            expr,
            pattern,
            ..
        } => Ok(Comparison::new(column_name(expr)?, Operator::ILike, lower_value(pattern)?).into()),
        Expr::Like { negated: true, .. } => {
            Err(SqlRestError::UnsupportedOperator("NOT LIKE".to_string()))
        }
        Expr::ILike { negated: true, .. } => {
            Err(SqlRestError::UnsupportedOperator("NOT ILIKE".to_string()))
        }
        other => Err(SqlRestError::unsupported(format!("WHERE expression {}", other))),
    }
}

fn comparison_operator(op: &BinaryOperator) -> SqlRestResult<Operator> {
    match op {
        BinaryOperator::Eq => Ok(Operator::Eq),
        BinaryOperator::NotEq => Ok(Operator::Neq),
        BinaryOperator::Gt => Ok(Operator::Gt),
        BinaryOperator::GtEq => Ok(Operator::Gte),
        BinaryOperator::Lt => Ok(Operator::Lt),
        BinaryOperator::LtEq => Ok(Operator::Lte),
        other => Err(SqlRestError::UnsupportedOperator(other.to_string())),
    }
}

/// Lower a value-side expression. Bare identifiers are taken as text.
pub fn lower_value(expr: &Expr) -> SqlRestResult<Value> {
    match expr {
        Expr::Value(v) => Value::try_from(&v.value),
        Expr::Nested(inner) => lower_value(inner),
        Expr::UnaryOp {
            op: UnaryOperator::Minus,
            expr,
        } => match lower_value(expr)? {
            Value::Int(n) => Ok(Value::Int(-n)),
            Value::Float(n) => Ok(Value::Float(-n)),
            other => Err(SqlRestError::InvalidValue(format!("-{}", other))),
        },
        Expr::UnaryOp {
            op: UnaryOperator::Plus,
            expr,
        } => lower_value(expr),
        Expr::Identifier(ident) => Ok(Value::String(ident.value.clone())),
        Expr::Tuple(items) => items
            .iter()
            .map(lower_value)
            .collect::<SqlRestResult<Vec<_>>>()
            .map(Value::List),
        Expr::BinaryOp { op, .. } => Err(SqlRestError::UnsupportedOperator(op.to_string())),
        other => Err(SqlRestError::InvalidValue(other.to_string())),
    }
}

/// LIMIT / OFFSET count.
fn lower_count(expr: &Expr) -> SqlRestResult<u64> {
    if let Expr::Value(v) = expr
        && let sqlparser::ast::Value::Number(raw, _) = &v.value
        && let Ok(n) = raw.parse::<u64>()
    {
        return Ok(n);
    }
    match lower_value(expr) {
        Ok(Value::Int(n)) if n >= 0 => Ok(n as u64),
        _ => Err(SqlRestError::InvalidValue(format!(
            "expected a non-negative integer, got {}",
            expr
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_select_with_everything() {
        let stmt = parse_statement(
            "SELECT id, name AS n FROM users WHERE age >= 18 AND status = 'active' \
             ORDER BY created_at DESC, id LIMIT 10 OFFSET 20",
        )
        .unwrap();
        assert_eq!(
            stmt,
            Statement::Select(SelectStmt {
                table: "users".into(),
                columns: vec![SelectColumn::named("id"), SelectColumn::aliased("name", "n")],
                filter: Some(Predicate::and(
                    Comparison::new("age", Operator::Gte, 18).into(),
                    Comparison::new("status", Operator::Eq, "active").into(),
                )),
                order_by: vec![OrderBy::desc("created_at"), OrderBy::asc("id")],
                limit: Some(10),
                offset: Some(20),
            })
        );
    }

    #[test]
    fn test_mysql_offset_comma_limit() {
        let Statement::Select(select) = parse_statement("SELECT * FROM t LIMIT 5, 10").unwrap()
        else {
            panic!("expected select");
        };
        assert_eq!(select.limit, Some(10));
        assert_eq!(select.offset, Some(5));
    }

    #[test]
    fn test_where_operators() {
        let Statement::Select(select) = parse_statement(
            "SELECT * FROM t WHERE a IN (1, 2) OR b IS NULL OR c LIKE 'x%' OR d <> -3",
        )
        .unwrap() else {
            panic!("expected select");
        };
        assert_eq!(
            select.filter.unwrap().to_string(),
            "(((a IN (1, 2) OR b IS NULL) OR c LIKE 'x%') OR d != -3)"
        );
    }

    #[test]
    fn test_bulk_insert() {
        let stmt = parse_statement("INSERT INTO t (a, b) VALUES (1, 'x'), (2, NULL)").unwrap();
        assert_eq!(
            stmt,
            Statement::Insert(InsertStmt {
                table: "t".into(),
                columns: vec!["a".into(), "b".into()],
                rows: vec![
                    vec![Value::Int(1), Value::String("x".into())],
                    vec![Value::Int(2), Value::Null],
                ],
            })
        );
    }

    #[test]
    fn test_update_multiple_assignments() {
        let stmt = parse_statement("UPDATE t SET a = 1, b = 'two' WHERE id = 3").unwrap();
        let Statement::Update(update) = stmt else {
            panic!("expected update");
        };
        assert_eq!(update.table, "t");
        assert_eq!(
            update.assignments,
            vec![
                Assignment {
                    column: "a".into(),
                    value: Value::Int(1)
                },
                Assignment {
                    column: "b".into(),
                    value: Value::String("two".into())
                },
            ]
        );
        assert_eq!(
            update.filter,
            Some(Comparison::new("id", Operator::Eq, 3).into())
        );
    }

    #[test]
    fn test_delete() {
        let stmt = parse_statement("DELETE FROM `sessions` WHERE expired = TRUE").unwrap();
        assert_eq!(
            stmt,
            Statement::Delete(DeleteStmt {
                table: "sessions".into(),
                filter: Some(Comparison::new("expired", Operator::Eq, true).into()),
            })
        );
    }

    #[test]
    fn test_syntax_errors_are_typed() {
        assert!(parse_statement("SELECT * FROM users WHERE name = 'bob")
            .unwrap_err()
            .is_syntax());
        assert!(parse_statement("SELEC * FROM users").unwrap_err().is_syntax());
    }

    #[test]
    fn test_unsupported_constructs() {
        assert!(matches!(
            parse_statement("SELECT * FROM t WHERE id % 2 = 0"),
            Err(SqlRestError::UnsupportedOperator(op)) if op == "%"
        ));
        assert!(matches!(
            parse_statement("SELECT * FROM a JOIN b ON a.id = b.a_id"),
            Err(SqlRestError::Unsupported(_))
        ));
        assert!(matches!(
            parse_statement("SELECT status FROM t GROUP BY status"),
            Err(SqlRestError::Unsupported(_))
        ));
        assert!(matches!(
            parse_statement("SELECT COUNT(*) FROM t"),
            Err(SqlRestError::Unsupported(_))
        ));
        assert!(matches!(
            parse_statement("DROP TABLE users"),
            Err(SqlRestError::UnsupportedStatement(kind)) if kind == "DROP"
        ));
        assert!(matches!(
            parse_statement("SELECT * FROM t WHERE name NOT LIKE 'a%'"),
            Err(SqlRestError::UnsupportedOperator(_))
        ));
    }

    #[test]
    fn test_mutation_modifiers_are_unsupported() {
        for sql in [
            "UPDATE users SET age = 99 WHERE name = 'bob' LIMIT 1",
            "UPDATE users SET age = 99 LIMIT 1",
            "DELETE FROM users WHERE name = 'bob' LIMIT 1",
            "REPLACE INTO users (id, name) VALUES (1, 'zed')",
            "INSERT IGNORE INTO users (id, name) VALUES (1, 'zed')",
            "INSERT INTO users SET id = 1, name = 'zed'",
        ] {
            let err = parse_statement(sql).unwrap_err();
            assert!(
                matches!(err, SqlRestError::Unsupported(_)),
                "{}: {:?}",
                sql,
                err
            );
        }
    }
}
