use std::fmt::Display;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use snafu::{Location, Snafu};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QueryExecutionId(String);

impl QueryExecutionId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for QueryExecutionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Result payload of a finished statement. `rows` holds data rows only, the
/// column labels live in `columns`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryOutput {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Option<String>>>,
    pub update_count: Option<u64>,
}

impl QueryOutput {
    /// First value of the first row, if any.
    #[must_use]
    pub fn scalar(&self) -> Option<&str> {
        self.rows
            .first()
            .and_then(|row| row.first())
            .and_then(|value| value.as_deref())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryPoll {
    Running,
    /// `output` is `None` when the engine reports success without returning
    /// any result payload.
    Succeeded {
        output: Option<QueryOutput>,
    },
    Failed {
        reason: String,
    },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeStats {
    pub execution_time_millis: u64,
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum QueryEngineError {
    #[snafu(display("Statement rejected: {message}"))]
    Rejected {
        message: String,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("Unknown query execution {id}"))]
    UnknownExecution {
        id: QueryExecutionId,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("Query engine unavailable: {message}"))]
    Unavailable {
        message: String,
        #[snafu(implicit)]
        location: Location,
    },
}

pub type QueryEngineResult<T> = std::result::Result<T, QueryEngineError>;

/// Asynchronous SQL engine (Athena/Presto/Trino style): statements are
/// submitted, then polled until they reach a terminal state.
#[async_trait]
pub trait QueryEngine: std::fmt::Debug + Send + Sync {
    async fn submit(&self, sql: &str, catalog: &str) -> QueryEngineResult<QueryExecutionId>;
    async fn poll(&self, id: &QueryExecutionId) -> QueryEngineResult<QueryPoll>;
    async fn runtime_stats(&self, id: &QueryExecutionId) -> QueryEngineResult<RuntimeStats>;
}
