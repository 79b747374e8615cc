use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use core_traits::{ColumnDescriptor, TableIdent};
use object_store::ObjectStore;
use object_store::path::Path;
use snafu::{OptionExt, ensure};
use uuid::Uuid;

use crate::config::PollPolicy;
use crate::error::{ConsistencySnafu, EmptyQueryResultSnafu, Result, UnparsableResultSnafu};
use crate::format::OutputFormat;
use crate::location::PartitionLocation;
use crate::objects;
use crate::query::QueryRunner;
use crate::sql;

const SUFFIX_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const SUFFIX_LEN: usize = 10;

/// Generator for transient table names:
/// `<prefix>_<UTC yyyymmddHHMMSS>_<10 chars of [A-Z0-9]>`.
pub struct StagingTableName;

impl StagingTableName {
    #[must_use]
    pub fn generate(prefix: &str) -> String {
        let mut entropy = Uuid::new_v4().as_u128();
        let radix = SUFFIX_ALPHABET.len() as u128;
        let mut suffix = String::with_capacity(SUFFIX_LEN);
        for _ in 0..SUFFIX_LEN {
            #[allow(clippy::cast_possible_truncation)]
            let index = (entropy % radix) as usize;
            suffix.push(char::from(SUFFIX_ALPHABET[index]));
            entropy /= radix;
        }
        format!("{prefix}_{}_{suffix}", Utc::now().format("%Y%m%d%H%M%S"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InsertReport {
    pub started_at: DateTime<Utc>,
    pub rows: u64,
}

/// Drives the staging table through creation, insert and verification.
pub struct StagingTableManager<'a> {
    runner: QueryRunner<'a>,
    store: &'a dyn ObjectStore,
    visibility: PollPolicy,
}

impl<'a> StagingTableManager<'a> {
    #[must_use]
    pub const fn new(
        runner: QueryRunner<'a>,
        store: &'a dyn ObjectStore,
        visibility: PollPolicy,
    ) -> Self {
        Self {
            runner,
            store,
            visibility,
        }
    }

    /// Makes sure the target prefix exists before the engine writes to it.
    pub async fn write_marker(&self, marker: &Path) -> Result<()> {
        objects::put_marker(self.store, marker).await?;
        tracing::debug!("Wrote staging marker {marker}");
        Ok(())
    }

    #[tracing::instrument(
        name = "StagingTableManager::create_table",
        level = "debug",
        skip_all,
        fields(staging = %staging),
        err
    )]
    pub async fn create_table(
        &self,
        staging: &TableIdent,
        columns: &[ColumnDescriptor],
        format: OutputFormat,
        location: &PartitionLocation,
        properties: &BTreeMap<String, String>,
    ) -> Result<()> {
        let statement = sql::create_external_table(staging, columns, format, location, properties)?;
        self.runner.run(&statement).await?;
        tracing::info!("Created staging table {staging} at {location}");
        Ok(())
    }

    /// Runs the insert and returns the engine-reported row count together
    /// with the wall-clock time the insert started at.
    #[tracing::instrument(
        name = "StagingTableManager::insert",
        level = "debug",
        skip_all,
        fields(staging = %staging),
        err
    )]
    pub async fn insert(&self, staging: &TableIdent, query: &str) -> Result<InsertReport> {
        let started_at = Utc::now();
        let statement = sql::insert_into(staging, query);
        let output = self.runner.run(&statement).await?;
        let rows = output
            .update_count
            .context(EmptyQueryResultSnafu { sql: &statement })?;
        tracing::info!("Inserted {rows} rows into {staging}");
        Ok(InsertReport { started_at, rows })
    }

    #[tracing::instrument(
        name = "StagingTableManager::verify_row_count",
        level = "debug",
        skip(self, staging),
        fields(staging = %staging),
        err
    )]
    pub async fn verify_row_count(&self, staging: &TableIdent, reported: u64) -> Result<u64> {
        let statement = sql::count_rows(staging);
        let output = self.runner.run(&statement).await?;
        let value = output.scalar();
        let actual = value
            .and_then(|v| v.trim().parse::<u64>().ok())
            .context(UnparsableResultSnafu {
                sql: &statement,
                value: value.map(ToString::to_string),
            })?;
        ensure!(actual == reported, ConsistencySnafu { reported, actual });
        Ok(actual)
    }

    pub async fn wait_until_visible(
        &self,
        location: &PartitionLocation,
        since: DateTime<Utc>,
    ) -> Result<()> {
        objects::wait_for_new_objects(self.store, location, since, self.visibility).await?;
        Ok(())
    }
}
