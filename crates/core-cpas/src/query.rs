use core_traits::{QueryEngine, QueryExecutionId, QueryOutput, QueryPoll};
use snafu::{OptionExt, ResultExt};

use crate::config::PollPolicy;
use crate::error::{
    EmptyQueryResultSnafu, QueryFailedSnafu, QuerySnafu, QueryTimeoutSnafu, Result,
};
use crate::poll::{Backoff, format_execution_time};

/// Runs statements against one catalog of the query engine and waits for
/// them to finish.
#[derive(Debug, Clone, Copy)]
pub struct QueryRunner<'a> {
    engine: &'a dyn QueryEngine,
    catalog: &'a str,
    policy: PollPolicy,
}

impl<'a> QueryRunner<'a> {
    #[must_use]
    pub const fn new(engine: &'a dyn QueryEngine, catalog: &'a str, policy: PollPolicy) -> Self {
        Self {
            engine,
            catalog,
            policy,
        }
    }

    #[must_use]
    pub const fn catalog(&self) -> &str {
        self.catalog
    }

    /// Submits `sql` and polls until it reaches a terminal state. DDL may
    /// finish without a result payload, hence the `Option`.
    #[tracing::instrument(
        name = "QueryRunner::execute",
        level = "debug",
        skip(self),
        fields(execution_id),
        err
    )]
    pub async fn execute(&self, sql: &str) -> Result<Option<QueryOutput>> {
        let execution_id = self
            .engine
            .submit(sql, self.catalog)
            .await
            .context(QuerySnafu { sql })?;
        tracing::Span::current().record("execution_id", execution_id.as_str());

        let mut backoff = Backoff::new(self.policy);
        loop {
            match self
                .engine
                .poll(&execution_id)
                .await
                .context(QuerySnafu { sql })?
            {
                QueryPoll::Running => {
                    if !backoff.wait().await {
                        return QueryTimeoutSnafu {
                            sql,
                            attempts: backoff.attempts(),
                        }
                        .fail();
                    }
                }
                QueryPoll::Failed { reason } => {
                    return QueryFailedSnafu { sql, reason }.fail();
                }
                QueryPoll::Succeeded { output } => {
                    self.log_runtime(&execution_id).await;
                    return Ok(output);
                }
            }
        }
    }

    /// Like [`Self::execute`], for statements that must return a result.
    pub async fn run(&self, sql: &str) -> Result<QueryOutput> {
        self.execute(sql)
            .await?
            .context(EmptyQueryResultSnafu { sql })
    }

    async fn log_runtime(&self, execution_id: &QueryExecutionId) {
        match self.engine.runtime_stats(execution_id).await {
            Ok(stats) => tracing::info!(
                "Query {execution_id} finished in {}",
                format_execution_time(stats.execution_time_millis)
            ),
            Err(error) => {
                tracing::debug!("Runtime statistics unavailable for {execution_id}: {error}");
            }
        }
    }
}
