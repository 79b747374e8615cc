use object_store::ObjectStore;

use crate::error::{ConflictSnafu, Result};
use crate::location::PartitionLocation;
use crate::objects;
use crate::request::SaveMode;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictDecision {
    Proceed,
    Skip,
}

/// Decides how to treat objects already present at the target location.
/// Under `overwrite` the existing objects are removed before returning.
#[tracing::instrument(
    name = "conflict::evaluate",
    level = "debug",
    skip(store, location),
    fields(location = %location),
    err
)]
pub async fn evaluate(
    store: &dyn ObjectStore,
    location: &PartitionLocation,
    save_mode: SaveMode,
) -> Result<ConflictDecision> {
    let existing = objects::list_objects(store, location.prefix()).await?;
    if existing.is_empty() {
        return Ok(ConflictDecision::Proceed);
    }

    match save_mode {
        SaveMode::SkipIfExists => {
            tracing::info!(
                "Skipping {location}: {} objects already present",
                existing.len()
            );
            Ok(ConflictDecision::Skip)
        }
        SaveMode::ErrorIfExists => ConflictSnafu {
            uri: location.uri(),
            save_mode,
        }
        .fail(),
        SaveMode::IgnoreSaveMode => {
            tracing::info!(
                "Keeping {} existing objects under {location}",
                existing.len()
            );
            Ok(ConflictDecision::Proceed)
        }
        SaveMode::Overwrite => {
            let paths = existing.into_iter().map(|meta| meta.location).collect();
            let removed = objects::delete_objects(store, paths).await?;
            tracing::info!("Removed {removed} existing objects under {location}");
            Ok(ConflictDecision::Proceed)
        }
    }
}
