use thiserror::Error;

/// Error type for graphproc operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GraphProcError {
    #[error("connection error: {0}")]
    ConnectionError(String),
    #[error("schema error: {0}")]
    SchemaError(String),
    #[error("query error: {0}")]
    QueryError(String),
    #[error("transaction error: {0}")]
    TransactionError(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("parse error: {0}")]
    ParseError(String),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("unsupported operation: {0}")]
    Unsupported(String),
}

impl GraphProcError {
    pub fn connection<T: Into<String>>(msg: T) -> Self {
        GraphProcError::ConnectionError(msg.into())
    }

    pub fn schema<T: Into<String>>(msg: T) -> Self {
        GraphProcError::SchemaError(msg.into())
    }

    pub fn query<T: Into<String>>(msg: T) -> Self {
        GraphProcError::QueryError(msg.into())
    }

    pub fn transaction<T: Into<String>>(msg: T) -> Self {
        GraphProcError::TransactionError(msg.into())
    }

    pub fn not_found<T: Into<String>>(msg: T) -> Self {
        GraphProcError::NotFound(msg.into())
    }

    pub fn invalid_input<T: Into<String>>(msg: T) -> Self {
        GraphProcError::InvalidInput(msg.into())
    }

    pub fn parse<T: Into<String>>(msg: T) -> Self {
        GraphProcError::ParseError(msg.into())
    }

    pub fn invalid_config<T: Into<String>>(msg: T) -> Self {
        GraphProcError::InvalidConfig(msg.into())
    }

    pub fn unsupported<T: Into<String>>(msg: T) -> Self {
        GraphProcError::Unsupported(msg.into())
    }

    /// Bare message without the variant prefix; used as the key of error histograms.
    pub fn message(&self) -> &str {
        match self {
            GraphProcError::ConnectionError(msg)
            | GraphProcError::SchemaError(msg)
            | GraphProcError::QueryError(msg)
            | GraphProcError::TransactionError(msg)
            | GraphProcError::NotFound(msg)
            | GraphProcError::InvalidInput(msg)
            | GraphProcError::ParseError(msg)
            | GraphProcError::InvalidConfig(msg)
            | GraphProcError::Unsupported(msg) => msg,
        }
    }

    /// Whether the failure happened while committing rather than while running a statement.
    pub fn is_commit_failure(&self) -> bool {
        matches!(self, GraphProcError::TransactionError(_))
    }
}
