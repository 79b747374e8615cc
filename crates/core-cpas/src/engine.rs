use std::sync::Arc;

use core_traits::{
    Catalog, ColumnDescriptor, ObjectStoreRegistry, QueryEngine, TableDefinition, TableIdent,
};
use object_store::ObjectStore;
use object_store::path::Path;
use snafu::{IntoError, ResultExt, ensure};

use crate::cleanup::CleanupCoordinator;
use crate::commit::PartitionCommit;
use crate::config::EngineConfig;
use crate::conflict::{self, ConflictDecision};
use crate::error::{CatalogSnafu, ConfigurationSnafu, Error, Result, StoreRegistrySnafu};
use crate::location::{OrderedPartition, PartitionLocation};
use crate::query::QueryRunner;
use crate::request::CpasRequest;
use crate::schema::SchemaInference;
use crate::staging::{StagingTableManager, StagingTableName};

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum WorkflowState {
    Init,
    LocationResolved,
    ConflictChecked,
    SchemaInferred,
    StagingInserted,
    RowCountVerified,
    ObjectsVisible,
    PartitionCommitted,
    CleanedUp,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CpasOutcome {
    /// The partition now points at freshly written data.
    Committed {
        location: String,
        partition: Vec<(String, String)>,
        rows: u64,
        staging_table: TableIdent,
    },
    /// The location already held objects and the save mode said to leave it.
    Skipped { location: String },
}

impl CpasOutcome {
    #[must_use]
    pub fn location(&self) -> &str {
        match self {
            Self::Committed { location, .. } | Self::Skipped { location } => location,
        }
    }
}

struct StateTracker<'a> {
    table: &'a TableIdent,
    state: WorkflowState,
}

impl StateTracker<'_> {
    fn advance(&mut self, next: WorkflowState) {
        tracing::debug!("{}: {} -> {next}", self.table, self.state);
        self.state = next;
    }
}

/// Resolved inputs of the staging and commit stages.
struct StagingTarget<'a> {
    request: &'a CpasRequest,
    destination: &'a TableIdent,
    location: &'a PartitionLocation,
    partition: &'a OrderedPartition,
    staging: &'a TableIdent,
    marker: &'a Path,
}

/// Runs "create partition as select" jobs against injected collaborators.
#[derive(Debug, Clone)]
pub struct CpasOperator {
    engine: Arc<dyn QueryEngine>,
    catalog: Arc<dyn Catalog>,
    stores: Arc<dyn ObjectStoreRegistry>,
    config: Arc<EngineConfig>,
}

impl CpasOperator {
    #[must_use]
    pub fn new(
        engine: Arc<dyn QueryEngine>,
        catalog: Arc<dyn Catalog>,
        stores: Arc<dyn ObjectStoreRegistry>,
        config: EngineConfig,
    ) -> Self {
        Self {
            engine,
            catalog,
            stores,
            config: Arc::new(config),
        }
    }

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Materializes `request.query` as one partition of the destination
    /// table.
    ///
    /// Stages, in order: resolve the partition location, apply the save mode
    /// to objects already there, infer the result schema through a probe
    /// table, write the marker object, create and fill the staging table,
    /// verify the row count, wait for the written objects to be listed,
    /// swap the partition in the catalog and remove the marker. Any failure
    /// after the marker was written drops the staging table and the marker
    /// before the error is returned.
    #[tracing::instrument(
        name = "CpasOperator::execute",
        level = "info",
        skip_all,
        fields(table = %request.destination(), save_mode = %request.save_mode),
        err
    )]
    pub async fn execute(&self, request: &CpasRequest) -> Result<CpasOutcome> {
        let destination = request.destination();
        let mut tracker = StateTracker {
            table: &destination,
            state: WorkflowState::Init,
        };
        let result = self.run(request, &destination, &mut tracker).await;
        if result.is_err() {
            tracker.advance(WorkflowState::Failed);
        }
        result
    }

    async fn run(
        &self,
        request: &CpasRequest,
        destination: &TableIdent,
        tracker: &mut StateTracker<'_>,
    ) -> Result<CpasOutcome> {
        self.config.check()?;
        request.check()?;

        let table = self.find_table(destination).await?;
        let partition = OrderedPartition::resolve(request, table.as_ref())?;
        let location = PartitionLocation::resolve(request, table.as_ref(), &partition)?;
        ensure!(
            table.is_some(),
            ConfigurationSnafu {
                reason: format!("Table {destination} does not exist, cannot add a partition to it"),
            }
        );
        tracker.advance(WorkflowState::LocationResolved);
        tracing::info!(
            "Materializing partition {} of {destination} at {location}",
            partition.path_segments()
        );

        let store = self
            .stores
            .store(location.bucket())
            .context(StoreRegistrySnafu)?;
        let decision = conflict::evaluate(store.as_ref(), &location, request.save_mode).await?;
        tracker.advance(WorkflowState::ConflictChecked);
        if decision == ConflictDecision::Skip {
            return Ok(CpasOutcome::Skipped {
                location: location.uri().to_string(),
            });
        }

        let runner = QueryRunner::new(
            self.engine.as_ref(),
            &request.source,
            self.config.query_poll,
        );
        let probe = TableIdent::new(
            &request.database,
            StagingTableName::generate(&self.config.staging_prefix),
        );
        let columns = SchemaInference::new(runner)
            .infer(&probe, &request.query)
            .await?;
        tracker.advance(WorkflowState::SchemaInferred);

        let staging = TableIdent::new(
            &request.database,
            StagingTableName::generate(&self.config.staging_prefix),
        );
        let marker = location.child(&self.config.marker_name);
        let target = StagingTarget {
            request,
            destination,
            location: &location,
            partition: &partition,
            staging: &staging,
            marker: &marker,
        };
        let cleanup = CleanupCoordinator::new(self.catalog.as_ref(), store.as_ref());

        match self
            .stage_and_commit(&target, &columns, runner, store.as_ref(), tracker)
            .await
        {
            Ok(rows) => {
                cleanup.remove_marker(&marker).await?;
                tracker.advance(WorkflowState::CleanedUp);
                tracing::info!(
                    "Committed {rows} rows as partition {} of {destination}",
                    partition.path_segments()
                );
                Ok(CpasOutcome::Committed {
                    location: location.uri().to_string(),
                    partition: partition.pairs().to_vec(),
                    rows,
                    staging_table: staging,
                })
            }
            Err(error) => {
                // After a lost partition the staging table holds the only
                // copy of the descriptor needed to recreate it.
                let staging_to_drop =
                    (!matches!(error, Error::PartitionLost { .. })).then_some(&staging);
                cleanup.rollback(staging_to_drop, &marker).await;
                Err(error)
            }
        }
    }

    async fn stage_and_commit(
        &self,
        target: &StagingTarget<'_>,
        columns: &[ColumnDescriptor],
        runner: QueryRunner<'_>,
        store: &dyn ObjectStore,
        tracker: &mut StateTracker<'_>,
    ) -> Result<u64> {
        let request = target.request;
        let manager = StagingTableManager::new(runner, store, self.config.visibility_poll);

        manager.write_marker(target.marker).await?;
        manager
            .create_table(
                target.staging,
                columns,
                request.format,
                target.location,
                &request.properties,
            )
            .await?;
        let inserted = manager.insert(target.staging, &request.query).await?;
        tracker.advance(WorkflowState::StagingInserted);

        let rows = manager
            .verify_row_count(target.staging, inserted.rows)
            .await?;
        tracker.advance(WorkflowState::RowCountVerified);

        if rows > 0 {
            manager
                .wait_until_visible(target.location, inserted.started_at)
                .await?;
        }
        tracker.advance(WorkflowState::ObjectsVisible);

        PartitionCommit::new(self.catalog.as_ref())
            .commit(target.staging, target.destination, target.partition.values())
            .await?;
        tracker.advance(WorkflowState::PartitionCommitted);
        Ok(rows)
    }

    async fn find_table(&self, ident: &TableIdent) -> Result<Option<TableDefinition>> {
        match self.catalog.get_table(ident).await {
            Ok(table) => Ok(Some(table)),
            Err(error) if error.is_not_found() => Ok(None),
            Err(error) => Err(CatalogSnafu {
                operation: format!("get table {ident}"),
            }
            .into_error(error)),
        }
    }
}
