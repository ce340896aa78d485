//! Statement dispatch.
//!
//! Text goes through the simple classifiers first, then the full SQL
//! parser. When the parser rejects the text as a syntax error, the simple
//! handler for the statement's keyword gets a second, more lenient try.

use std::collections::HashSet;

use crate::ast::{Statement, StatementKind};
use crate::client::{QueryResult, TableApi};
use crate::config::Config;
use crate::error::{SqlRestError, SqlRestResult};
use crate::query::TableQuery;
use crate::simple::{normalize, Mode, SimpleMatcher};
use crate::translator;
use crate::transpiler::{validate_identifier, ToTableQuery};

/// Which path produced a statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Recognized by a simple classifier.
    Simple,
    /// Parsed by the full SQL parser.
    Parsed,
    /// The parser rejected it; a simple handler recovered it.
    Fallback,
}

impl std::fmt::Display for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Route::Simple => write!(f, "simple"),
            Route::Parsed => write!(f, "parsed"),
            Route::Fallback => write!(f, "fallback"),
        }
    }
}

/// A translated statement, ready to execute.
#[derive(Debug, Clone, PartialEq)]
pub struct Plan {
    pub route: Route,
    pub statement: Statement,
    pub query: TableQuery,
}

/// Turns SQL text into a [`Plan`] without touching any backend.
pub struct Planner {
    matcher: SimpleMatcher,
    allowed_tables: Option<HashSet<String>>,
}

impl Default for Planner {
    fn default() -> Self {
        Self::new()
    }
}

impl Planner {
    pub fn new() -> Self {
        Self {
            matcher: SimpleMatcher::new(),
            allowed_tables: None,
        }
    }

    /// Restrict statements to the given tables.
    pub fn with_allowed_tables<I, S>(mut self, tables: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_tables = Some(tables.into_iter().map(Into::into).collect());
        self
    }

    pub fn from_config(config: &Config) -> Self {
        match config.allowed_tables() {
            Some(tables) => Self::new().with_allowed_tables(tables.iter().cloned()),
            None => Self::new(),
        }
    }

    /// Translate one statement.
    pub fn plan(&self, sql: &str) -> SqlRestResult<Plan> {
        let text = normalize(sql);

        if let Some(kind) = self.matcher.classify(&text) {
            if let Some(statement) = self.matcher.recognize(kind, &text, Mode::FastPath)? {
                tracing::debug!("{} handled by the simple path", kind);
                return self.finish(Route::Simple, statement);
            }
            tracing::debug!("{} looked simple but needs the full parser", kind);
        }

        match translator::parse_statement(&text) {
            Ok(statement) => self.finish(Route::Parsed, statement),
            Err(e) if e.is_syntax() => {
                let Some(kind) = fallback_kind(&text) else {
                    return Err(e);
                };
                tracing::warn!("{}; retrying with the simple {} handler", e, kind);
                match self.matcher.recognize(kind, &text, Mode::Fallback)? {
                    Some(statement) => self.finish(Route::Fallback, statement),
                    None => Err(SqlRestError::simple(format!(
                        "Unrecognized {} statement format",
                        kind
                    ))),
                }
            }
            Err(e) => Err(e),
        }
    }

    fn finish(&self, route: Route, statement: Statement) -> SqlRestResult<Plan> {
        self.check_table(statement.table())?;
        let query = statement.to_table_query()?;
        Ok(Plan {
            route,
            statement,
            query,
        })
    }

    fn check_table(&self, table: &str) -> SqlRestResult<()> {
        validate_identifier(table)?;
        match &self.allowed_tables {
            Some(allowed) if !allowed.contains(table) => {
                Err(SqlRestError::TableNotAllowed(table.to_string()))
            }
            _ => Ok(()),
        }
    }
}

/// Keyword naming the statement: the leading word if it is one, otherwise
/// the first keyword contained in the text.
fn fallback_kind(text: &str) -> Option<StatementKind> {
    const KINDS: [StatementKind; 4] = [
        StatementKind::Select,
        StatementKind::Insert,
        StatementKind::Update,
        StatementKind::Delete,
    ];

    let lower = text.to_lowercase();
    let leading = lower.split_whitespace().next().unwrap_or("");
    KINDS
        .into_iter()
        .find(|kind| leading == kind.keyword())
        .or_else(|| KINDS.into_iter().find(|kind| lower.contains(kind.keyword())))
}

/// Executes SQL text against a table API.
pub struct SqlExecutor<C> {
    planner: Planner,
    client: C,
}

impl<C: TableApi> SqlExecutor<C> {
    pub fn new(client: C) -> Self {
        Self {
            planner: Planner::new(),
            client,
        }
    }

    pub fn with_planner(client: C, planner: Planner) -> Self {
        Self { planner, client }
    }

    /// Restrict statements to the given tables.
    pub fn with_allowed_tables<I, S>(mut self, tables: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.planner = self.planner.with_allowed_tables(tables);
        self
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn plan(&self, sql: &str) -> SqlRestResult<Plan> {
        self.planner.plan(sql)
    }

    /// Translate and execute one statement.
    ///
    /// Never fails: translation errors and backend errors both come back as
    /// an error result.
    pub async fn execute_sql(&self, sql: &str) -> QueryResult {
        let plan = match self.planner.plan(sql) {
            Ok(plan) => plan,
            Err(e) => {
                tracing::warn!("Cannot translate '{}': {}", sql.trim(), e);
                return QueryResult::from(e);
            }
        };

        tracing::debug!("[{}] {}", plan.route, plan.query);
        let result = self.client.execute(&plan.query).await;
        if let Some(err) = &result.error {
            tracing::error!(
                "{} on '{}' failed: {}",
                plan.statement.kind(),
                plan.query.table,
                err
            );
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{SelectStmt, StatementKind};
    use crate::query::Filter;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_routes() {
        let planner = Planner::new();
        assert_eq!(
            planner.plan("SELECT id, name FROM users").unwrap().route,
            Route::Simple
        );
        assert_eq!(
            planner.plan("SELECT * FROM users WHERE id = 1 LIMIT 1").unwrap().route,
            Route::Parsed
        );
        assert_eq!(
            planner.plan("SELECT * FROM users WHERE name = 'bob").unwrap().route,
            Route::Fallback
        );
    }

    #[test]
    fn test_fallback_matches_direct_simple_handler() {
        let sql = "SELECT * FROM users WHERE name = 'bob";
        let plan = Planner::new().plan(sql).unwrap();

        let direct = SimpleMatcher::new()
            .recognize(StatementKind::Select, &normalize(sql), Mode::Fallback)
            .unwrap()
            .unwrap();
        assert_eq!(plan.statement, direct);
        assert_eq!(plan.statement, Statement::Select(SelectStmt::all("users")));
        assert!(plan.query.filters.is_empty());
    }

    #[test]
    fn test_fallback_mutation_with_broken_where_is_refused() {
        let err = Planner::new()
            .plan("UPDATE users SET name = 'x WHERE id = 1")
            .unwrap_err();
        assert_eq!(err.status_code(), Some(400));
    }

    #[test]
    fn test_compound_where_goes_to_parser() {
        let plan = Planner::new()
            .plan("SELECT id, name FROM users WHERE a = 1 OR b = 2")
            .unwrap();
        assert_eq!(plan.route, Route::Parsed);
        assert!(matches!(plan.query.filters.as_slice(), [Filter::Or(_)]));
    }

    #[test]
    fn test_fallback_kind() {
        assert_eq!(fallback_kind("update t set"), Some(StatementKind::Update));
        assert_eq!(
            fallback_kind("/* x */ delete from t"),
            Some(StatementKind::Delete)
        );
        assert_eq!(
            fallback_kind("with x as (select 1) delete"),
            Some(StatementKind::Select)
        );
        assert_eq!(fallback_kind("drop table t"), None);
    }

    #[test]
    fn test_allowlist() {
        let planner = Planner::new().with_allowed_tables(["users"]);
        assert!(planner.plan("SELECT * FROM users").is_ok());
        let err = planner.plan("SELECT * FROM secrets").unwrap_err();
        assert_eq!(err.status_code(), Some(403));
    }

    #[test]
    fn test_non_syntax_errors_do_not_fall_back() {
        let err = Planner::new()
            .plan("SELECT * FROM t WHERE id % 2 = 0")
            .unwrap_err();
        assert!(matches!(err, SqlRestError::UnsupportedOperator(_)));
    }

    #[test]
    fn test_unknown_garbage() {
        let err = Planner::new().plan("hello world").unwrap_err();
        assert!(err.is_syntax());
    }
}
