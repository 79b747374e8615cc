use core_traits::{Catalog, Partition, TableIdent};
use snafu::{IntoError, ResultExt};

use crate::error::{CatalogSnafu, PartitionLostSnafu, Result};

/// Promotes a staging table into a partition of the destination table.
///
/// Only metadata moves: the partition takes over the staging table's storage
/// descriptor and the staging table entry is removed afterwards. Data objects
/// are never touched.
pub struct PartitionCommit<'a> {
    catalog: &'a dyn Catalog,
}

impl<'a> PartitionCommit<'a> {
    #[must_use]
    pub const fn new(catalog: &'a dyn Catalog) -> Self {
        Self { catalog }
    }

    #[tracing::instrument(
        name = "PartitionCommit::commit",
        level = "debug",
        skip_all,
        fields(staging = %staging, destination = %destination, values = ?values),
        err
    )]
    pub async fn commit(
        &self,
        staging: &TableIdent,
        destination: &TableIdent,
        values: Vec<String>,
    ) -> Result<Partition> {
        let staging_table = self
            .catalog
            .get_table(staging)
            .await
            .context(CatalogSnafu {
                operation: format!("get staging table {staging}"),
            })?;
        let descriptor = staging_table.storage_descriptor;

        let replaced = self.drop_existing(destination, &values).await?;

        match self
            .catalog
            .create_partition(destination, values.clone(), descriptor.clone())
            .await
        {
            Ok(partition) => {
                tracing::info!(
                    "Created partition {values:?} of {destination} at {}",
                    partition.storage_descriptor.location
                );
                self.catalog
                    .delete_table(staging)
                    .await
                    .context(CatalogSnafu {
                        operation: format!("delete staging table {staging}"),
                    })?;
                Ok(partition)
            }
            Err(source) if replaced => {
                tracing::error!(
                    reconciliation_required = true,
                    table = %destination,
                    values = ?values,
                    staging = %staging,
                    staging_descriptor = ?descriptor,
                    "Partition was removed but its replacement could not be created: {source}"
                );
                Err(PartitionLostSnafu {
                    table: destination.clone(),
                    values,
                    staging: staging.clone(),
                }
                .into_error(source))
            }
            Err(source) => Err(CatalogSnafu {
                operation: format!("create partition {values:?} of {destination}"),
            }
            .into_error(source)),
        }
    }

    /// Deletes the partition with `values` if present. Returns whether one
    /// was removed. Only a structured not-found means absent.
    async fn drop_existing(&self, destination: &TableIdent, values: &[String]) -> Result<bool> {
        match self.catalog.get_partition(destination, values).await {
            Ok(existing) => {
                tracing::info!(
                    "Replacing partition {values:?} of {destination} at {}",
                    existing.storage_descriptor.location
                );
                self.catalog
                    .delete_partition(destination, values)
                    .await
                    .context(CatalogSnafu {
                        operation: format!("delete partition {values:?} of {destination}"),
                    })?;
                Ok(true)
            }
            Err(error) if error.is_not_found() => Ok(false),
            Err(error) => Err(CatalogSnafu {
                operation: format!("get partition {values:?} of {destination}"),
            }
            .into_error(error)),
        }
    }
}
