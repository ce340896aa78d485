//! Error types for sqlrest.

use thiserror::Error;

/// The main error type for translating and running SQL statements.
#[derive(Debug, Error)]
pub enum SqlRestError {
    /// The full SQL parser rejected the input.
    #[error("Syntax error: {0}")]
    Syntax(String),

    /// The simple-statement path could not use the text.
    #[error("Invalid statement: {0}")]
    SimpleStatement(String),

    /// INSERT column list and value list differ in length.
    #[error("Column count ({columns}) does not match value count ({values})")]
    ArityMismatch { columns: usize, values: usize },

    /// Table, column or alias name that is not a plain identifier.
    #[error("Invalid identifier: '{0}'")]
    InvalidIdentifier(String),

    /// Table outside the configured allowlist.
    #[error("Table not allowed: '{0}'")]
    TableNotAllowed(String),

    /// Statement kind other than SELECT, INSERT, UPDATE or DELETE.
    #[error("Unsupported query type: {0}")]
    UnsupportedStatement(String),

    /// WHERE operator without a table-API filter.
    #[error("Unsupported operator: {0}")]
    UnsupportedOperator(String),

    /// Any other construct the translator cannot express.
    #[error("Unsupported construct: {0}")]
    Unsupported(String),

    /// Literal that cannot become a value.
    #[error("Invalid value: {0}")]
    InvalidValue(String),

    /// Statement without a target table.
    #[error("No table found in {0} statement")]
    MissingTable(&'static str),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// HTTP transport error.
    #[error("HTTP error: {0}")]
    Http(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl SqlRestError {
    /// Create a simple-statement error.
    pub fn simple(message: impl Into<String>) -> Self {
        Self::SimpleStatement(message.into())
    }

    /// Create an unsupported-construct error.
    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::Unsupported(message.into())
    }

    /// Status code reported in an error result.
    ///
    /// `None` means the caller applies its default (500).
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::SimpleStatement(_) => Some(400),
            Self::ArityMismatch { .. } => Some(400),
            Self::InvalidIdentifier(_) => Some(400),
            Self::TableNotAllowed(_) => Some(403),
            Self::Syntax(_)
            | Self::UnsupportedStatement(_)
            | Self::UnsupportedOperator(_)
            | Self::Unsupported(_)
            | Self::InvalidValue(_)
            | Self::MissingTable(_)
            | Self::Config(_)
            | Self::Http(_)
            | Self::Io(_) => None,
        }
    }

    /// Whether the full parser rejected the input, as opposed to an internal failure.
    pub fn is_syntax(&self) -> bool {
        matches!(self, Self::Syntax(_))
    }
}

/// Result type alias for sqlrest operations.
pub type SqlRestResult<T> = Result<T, SqlRestError>;
