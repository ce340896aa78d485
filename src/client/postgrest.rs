//! PostgREST client over HTTP.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

use super::{ApiError, QueryResult, TableApi};
use crate::ast::SortOrder;
use crate::config::RestConfig;
use crate::error::{SqlRestError, SqlRestResult};
use crate::query::{render_value, Filter, Operation, Row, TableQuery};

/// Executes requests against `{base_url}/{table}`.
#[derive(Debug, Clone)]
pub struct PostgrestClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    schema: Option<String>,
}

impl PostgrestClient {
    /// Create a client with the default request timeout.
    pub fn new(base_url: impl Into<String>) -> SqlRestResult<Self> {
        Self::with_timeout(base_url, Duration::from_secs(RestConfig::DEFAULT_TIMEOUT_SECS))
    }

    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> SqlRestResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SqlRestError::Http(e.to_string()))?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: None,
            schema: None,
        })
    }

    /// Build a client from the `[rest]` config section.
    pub fn from_config(config: &RestConfig) -> SqlRestResult<Self> {
        let url = config
            .url
            .as_deref()
            .ok_or_else(|| SqlRestError::Config("rest.url is not set".to_string()))?;
        let mut client = Self::with_timeout(url, Duration::from_secs(config.timeout_secs))?;
        client.api_key = config.api_key.clone();
        client.schema = config.schema.clone();
        Ok(client)
    }

    /// Send `apikey` and `Authorization: Bearer` with every request.
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Target a non-default schema via the profile headers.
    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn send(&self, query: &TableQuery) -> SqlRestResult<QueryResult> {
        let url = format!("{}/{}", self.base_url, query.table);
        let mut request = match &query.operation {
            Operation::Select => self.http.get(&url),
            Operation::Insert(rows) => self.http.post(&url).json(rows),
            Operation::Update(record) => self.http.patch(&url).json(record),
            Operation::Delete => self.http.delete(&url),
        };
        request = request.query(&render_params(query));

        if let Some(key) = &self.api_key {
            request = request
                .header("apikey", key)
                .header("Authorization", format!("Bearer {}", key));
        }
        if let Some(schema) = &self.schema {
            let header = match query.operation {
                Operation::Select | Operation::Delete => "Accept-Profile",
                Operation::Insert(_) | Operation::Update(_) => "Content-Profile",
            };
            request = request.header(header, schema);
        }
        if !matches!(query.operation, Operation::Select) {
            let prefer = if query.returns_rows() {
                "return=representation"
            } else {
                "return=minimal"
            };
            request = request.header("Prefer", prefer);
        }

        tracing::debug!("{} {} ({})", query.operation.name(), url, query);
        let response = request
            .send()
            .await
            .map_err(|e| SqlRestError::Http(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Ok(QueryResult::failure(error_from_body(status.as_u16(), &body)));
        }
        if !query.returns_rows() {
            return Ok(QueryResult::empty());
        }

        let rows: Vec<Row> = response
            .json()
            .await
            .map_err(|e| SqlRestError::Http(format!("invalid response body: {}", e)))?;
        Ok(QueryResult::ok(rows))
    }
}

#[async_trait]
impl TableApi for PostgrestClient {
    async fn execute(&self, query: &TableQuery) -> QueryResult {
        match self.send(query).await {
            Ok(result) => result,
            Err(e) => {
                tracing::error!("Request to {} failed: {}", self.base_url, e);
                QueryResult::from(e)
            }
        }
    }
}

/// Query-string parameters for a request.
pub fn render_params(query: &TableQuery) -> Vec<(String, String)> {
    let mut params = Vec::new();

    if let Some(columns) = &query.select {
        params.push(("select".to_string(), columns.clone()));
    }
    for filter in &query.filters {
        match filter {
            Filter::Condition(c) => params.push((
                c.column.clone(),
                format!("{}.{}", c.op.api_name(), render_value(&c.value, false)),
            )),
            Filter::Or(d) => params.push(("or".to_string(), format!("({})", d.to_filter_string()))),
        }
    }
    if !query.order.is_empty() {
        let order = query
            .order
            .iter()
            .map(|o| match o.order {
                SortOrder::Asc => format!("{}.asc", o.column),
                SortOrder::Desc => format!("{}.desc", o.column),
            })
            .collect::<Vec<_>>()
            .join(",");
        params.push(("order".to_string(), order));
    }
    if let Some(n) = query.limit {
        params.push(("limit".to_string(), n.to_string()));
    }
    if let Some(n) = query.offset {
        params.push(("offset".to_string(), n.to_string()));
    }

    params
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    details: Option<String>,
    #[serde(default)]
    hint: Option<String>,
}

fn error_from_body(status: u16, body: &str) -> ApiError {
    let message = match serde_json::from_str::<ErrorBody>(body) {
        Ok(err) => {
            let mut message = err.message;
            if let Some(code) = err.code {
                message = format!("{} [{}]", message, code);
            }
            if let Some(details) = err.details {
                message = format!("{}: {}", message, details);
            }
            if let Some(hint) = err.hint {
                message = format!("{} (hint: {})", message, hint);
            }
            message
        }
        Err(_) if body.trim().is_empty() => format!("HTTP {}", status),
        Err(_) => body.trim().to_string(),
    };
    ApiError::new(message, Some(status))
}
