use core_traits::{Catalog, TableIdent};
use object_store::ObjectStore;
use object_store::path::Path;

use crate::error::Result;
use crate::objects;

/// Removes the transient artifacts of a run: the marker object and, on
/// failure, the staging table.
pub struct CleanupCoordinator<'a> {
    catalog: &'a dyn Catalog,
    store: &'a dyn ObjectStore,
}

impl<'a> CleanupCoordinator<'a> {
    #[must_use]
    pub const fn new(catalog: &'a dyn Catalog, store: &'a dyn ObjectStore) -> Self {
        Self { catalog, store }
    }

    /// Deletes the marker object and anything stored below it.
    pub async fn remove_marker(&self, marker: &Path) -> Result<()> {
        let mut paths: Vec<Path> = objects::list_objects(self.store, marker)
            .await?
            .into_iter()
            .map(|meta| meta.location)
            .collect();
        if !paths.contains(marker) {
            paths.push(marker.clone());
        }
        objects::delete_objects(self.store, paths).await?;
        tracing::debug!("Removed staging marker {marker}");
        Ok(())
    }

    /// Best-effort cleanup after a failed run. Errors are logged and
    /// swallowed so the caller can return the original failure.
    pub async fn rollback(&self, staging: Option<&TableIdent>, marker: &Path) {
        if let Some(staging) = staging {
            match self.catalog.delete_table(staging).await {
                Ok(()) => tracing::info!("Dropped staging table {staging}"),
                Err(error) if error.is_not_found() => {
                    tracing::debug!("Staging table {staging} was never created");
                }
                Err(error) => {
                    tracing::warn!("Failed to drop staging table {staging}: {error}");
                }
            }
        }
        if let Err(error) = self.remove_marker(marker).await {
            tracing::warn!("Failed to remove staging marker {marker}: {error}");
        }
    }
}
