//! Table-API clients.
//!
//! The translator only ever talks to a [`TableApi`]. Two implementations
//! ship with the crate:
//!
//! - [`MemoryClient`]: tables held in process, filters evaluated locally
//! - [`PostgrestClient`]: a PostgREST server over HTTP

mod memory;
mod postgrest;

pub use memory::MemoryClient;
pub use postgrest::{render_params, PostgrestClient};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::SqlRestError;
use crate::query::{Row, TableQuery};

/// A backend that executes table-API requests.
#[async_trait]
pub trait TableApi: Send + Sync {
    /// Execute one request. Backend failures come back inside the result.
    async fn execute(&self, query: &TableQuery) -> QueryResult;
}

#[async_trait]
impl<T: TableApi + ?Sized> TableApi for &T {
    async fn execute(&self, query: &TableQuery) -> QueryResult {
        (**self).execute(query).await
    }
}

#[async_trait]
impl<T: TableApi + ?Sized> TableApi for std::sync::Arc<T> {
    async fn execute(&self, query: &TableQuery) -> QueryResult {
        (**self).execute(query).await
    }
}

#[async_trait]
impl<T: TableApi + ?Sized> TableApi for Box<T> {
    async fn execute(&self, query: &TableQuery) -> QueryResult {
        (**self).execute(query).await
    }
}

/// Uniform outcome of a statement: rows or an error, never both.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct QueryResult {
    pub data: Option<Vec<Row>>,
    pub error: Option<ApiError>,
}

impl QueryResult {
    pub fn ok(rows: Vec<Row>) -> Self {
        Self {
            data: Some(rows),
            error: None,
        }
    }

    /// Success without a row payload.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn failure(error: ApiError) -> Self {
        Self {
            data: None,
            error: Some(error),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    /// Status code of the error, if any.
    pub fn status_code(&self) -> Option<u16> {
        self.error.as_ref().and_then(|e| e.status_code)
    }
}

impl From<SqlRestError> for QueryResult {
    fn from(err: SqlRestError) -> Self {
        Self::failure(ApiError::from(&err))
    }
}

/// Error part of a [`QueryResult`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiError {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
}

impl ApiError {
    pub fn new(message: impl Into<String>, status_code: Option<u16>) -> Self {
        Self {
            message: message.into(),
            status_code,
        }
    }
}

impl From<&SqlRestError> for ApiError {
    fn from(err: &SqlRestError) -> Self {
        Self {
            message: err.to_string(),
            status_code: err.status_code(),
        }
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.status_code {
            Some(code) => write!(f, "{} ({})", self.message, code),
            None => write!(f, "{}", self.message),
        }
    }
}
