use chrono::{DateTime, Utc};
use futures::{StreamExt, TryStreamExt};
use object_store::path::Path;
use object_store::{ObjectMeta, ObjectStore, PutPayload};
use snafu::ResultExt;

use crate::config::PollPolicy;
use crate::error::{ObjectStoreSnafu, ObjectsNotVisibleSnafu, Result};
use crate::location::PartitionLocation;
use crate::poll::Backoff;

pub async fn list_objects(store: &dyn ObjectStore, prefix: &Path) -> Result<Vec<ObjectMeta>> {
    store
        .list(Some(prefix))
        .try_collect::<Vec<_>>()
        .await
        .context(ObjectStoreSnafu {
            operation: format!("list {prefix}"),
        })
}

/// Deletes `paths`, returning how many were removed.
pub async fn delete_objects(store: &dyn ObjectStore, paths: Vec<Path>) -> Result<usize> {
    if paths.is_empty() {
        return Ok(0);
    }
    let locations = futures::stream::iter(paths.into_iter().map(Ok)).boxed();
    let deleted: Vec<Path> = store
        .delete_stream(locations)
        .try_collect()
        .await
        .context(ObjectStoreSnafu {
            operation: "delete objects",
        })?;
    Ok(deleted.len())
}

/// Deletes everything under `prefix`.
pub async fn purge_prefix(store: &dyn ObjectStore, prefix: &Path) -> Result<usize> {
    let paths = list_objects(store, prefix)
        .await?
        .into_iter()
        .map(|meta| meta.location)
        .collect();
    delete_objects(store, paths).await
}

pub async fn put_marker(store: &dyn ObjectStore, path: &Path) -> Result<()> {
    store
        .put(path, PutPayload::new())
        .await
        .context(ObjectStoreSnafu {
            operation: format!("put {path}"),
        })?;
    Ok(())
}

/// Waits until at least one non-empty object modified after `since` shows up
/// under the location. Listing is eventually consistent on some stores, so an
/// empty listing right after a successful write is retried with backoff.
#[tracing::instrument(
    name = "objects::wait_for_new_objects",
    level = "debug",
    skip(store, location, policy),
    fields(location = %location),
    err
)]
pub async fn wait_for_new_objects(
    store: &dyn ObjectStore,
    location: &PartitionLocation,
    since: DateTime<Utc>,
    policy: PollPolicy,
) -> Result<Vec<ObjectMeta>> {
    let mut backoff = Backoff::new(policy);
    loop {
        let fresh: Vec<ObjectMeta> = list_objects(store, location.prefix())
            .await?
            .into_iter()
            .filter(|meta| meta.last_modified > since && meta.size > 0)
            .collect();
        if !fresh.is_empty() {
            tracing::debug!("Found {} new objects under {location}", fresh.len());
            return Ok(fresh);
        }
        if !backoff.wait().await {
            return ObjectsNotVisibleSnafu {
                uri: location.uri(),
                attempts: backoff.attempts(),
            }
            .fail();
        }
    }
}
