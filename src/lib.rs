//! # sqlrest
//!
//! Run MySQL-dialect SQL against a PostgREST-style table API.
//!
//! Statements are translated into table-API builder chains (`select`,
//! `eq`, `or`, `order`, `limit`, `insert`, `update`, `delete`) and handed
//! to a [`client::TableApi`]. Common single-table shapes take a regex fast
//! path; everything else goes through a full SQL parser, with the fast-path
//! handlers as a fallback when the parser rejects the text.
//!
//! ## Quick Example
//!
//! ```rust,ignore
//! use sqlrest::prelude::*;
//!
//! let client = MemoryClient::new().with_table("users", vec![]);
//! let executor = SqlExecutor::new(client);
//!
//! executor.execute_sql("INSERT INTO users (id, name) VALUES (1, 'Ada')").await;
//! let result = executor
//!     .execute_sql("SELECT id, name FROM users WHERE id = 1")
//!     .await;
//! // => {"data": [{"id": 1, "name": "Ada"}], "error": null}
//! ```
//!
//! ## Operators
//!
//! | SQL          | Filter  |
//! |--------------|---------|
//! | `=`          | `eq`    |
//! | `!=`, `<>`   | `neq`   |
//! | `>` / `>=`   | `gt` / `gte` |
//! | `<` / `<=`   | `lt` / `lte` |
//! | `LIKE`       | `like`  |
//! | `ILIKE`      | `ilike` |
//! | `IN (...)`   | `in`    |
//! | `IS NULL`    | `is`    |
//! | `a OR b`     | `or=(...)` |

pub mod ast;
pub mod client;
pub mod config;
pub mod engine;
pub mod error;
pub mod parser;
pub mod query;
pub mod simple;
pub mod translator;
pub mod transpiler;
pub mod value;

pub mod prelude {
    pub use crate::ast::*;
    pub use crate::client::{ApiError, MemoryClient, PostgrestClient, QueryResult, TableApi};
    pub use crate::config::Config;
    pub use crate::engine::{Plan, Planner, Route, SqlExecutor};
    pub use crate::error::*;
    pub use crate::query::{Disjunction, Filter, Operation, Row, TableQuery};
    pub use crate::transpiler::ToTableQuery;
    pub use crate::value::Value;
}

/// Translate one statement and run it against `client`.
///
/// # Example
///
/// ```
/// use sqlrest::client::MemoryClient;
///
/// let client = MemoryClient::new();
/// let result = tokio::runtime::Runtime::new()
///     .unwrap()
///     .block_on(sqlrest::execute_sql(&client, "SELECT * FROM nowhere"));
/// assert_eq!(result.status_code(), Some(404));
/// ```
pub async fn execute_sql<C: client::TableApi>(client: C, sql: &str) -> client::QueryResult {
    engine::SqlExecutor::new(client).execute_sql(sql).await
}

/// Translate one statement without executing it.
pub fn plan(sql: &str) -> Result<engine::Plan, error::SqlRestError> {
    engine::Planner::new().plan(sql)
}
