use std::sync::Arc;

use object_store::ObjectStore;
use snafu::{Location, Snafu};

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum StorageError {
    #[snafu(display("Failed to build object store for bucket {bucket}: {source}"))]
    BuildStore {
        bucket: String,
        source: object_store::Error,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("Bucket {bucket} is not served by this registry"))]
    UnknownBucket {
        bucket: String,
        #[snafu(implicit)]
        location: Location,
    },
}

pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// Resolves a bucket name to an object store scoped to that bucket.
pub trait ObjectStoreRegistry: std::fmt::Debug + Send + Sync {
    fn store(&self, bucket: &str) -> StorageResult<Arc<dyn ObjectStore>>;
}
