use std::sync::Arc;

use core_traits::storage::{
    BuildStoreSnafu, ObjectStoreRegistry, StorageResult, UnknownBucketSnafu,
};
use dashmap::DashMap;
use object_store::ObjectStore;
use object_store::aws::AmazonS3Builder;
use object_store::memory::InMemory;
use snafu::ResultExt;

use crate::config::{AwsCredentials, S3Config, validate_bucket_name};

/// Registry handing out one [`InMemory`] store per bucket, created on first
/// use. Stores live as long as the registry.
#[derive(Debug, Default)]
pub struct InMemoryStoreRegistry {
    stores: DashMap<String, Arc<InMemory>>,
}

impl InMemoryStoreRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Concrete handle to a bucket, handy for seeding data in tests.
    #[must_use]
    pub fn bucket(&self, bucket: &str) -> Arc<InMemory> {
        self.stores
            .entry(bucket.to_string())
            .or_insert_with(|| Arc::new(InMemory::new()))
            .clone()
    }
}

impl ObjectStoreRegistry for InMemoryStoreRegistry {
    fn store(&self, bucket: &str) -> StorageResult<Arc<dyn ObjectStore>> {
        if validate_bucket_name(bucket).is_err() {
            return UnknownBucketSnafu { bucket }.fail();
        }
        Ok(self.bucket(bucket) as Arc<dyn ObjectStore>)
    }
}

/// Registry building S3 clients lazily from a shared [`S3Config`] and caching
/// them per bucket.
pub struct S3StoreRegistry {
    config: S3Config,
    object_store_cache: DashMap<String, Arc<dyn ObjectStore>>,
}

impl std::fmt::Debug for S3StoreRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3StoreRegistry")
            .field("region", &self.config.region)
            .field("endpoint", &self.config.endpoint)
            .finish_non_exhaustive()
    }
}

impl S3StoreRegistry {
    #[must_use]
    pub fn new(config: S3Config) -> Self {
        Self {
            config,
            object_store_cache: DashMap::new(),
        }
    }

    #[must_use]
    pub fn s3_builder(&self, bucket: &str) -> AmazonS3Builder {
        let mut s3_builder = AmazonS3Builder::from_env().with_bucket_name(bucket);

        if let Some(region) = &self.config.region {
            s3_builder = s3_builder.with_region(region);
        }
        if let Some(endpoint) = &self.config.endpoint {
            s3_builder = s3_builder.with_endpoint(endpoint);
            s3_builder = s3_builder.with_allow_http(endpoint.starts_with("http:"));
        }
        if let Some(skip_signature) = self.config.skip_signature {
            s3_builder = s3_builder.with_skip_signature(skip_signature);
        }
        if let Some(credentials) = &self.config.credentials {
            match credentials {
                AwsCredentials::AccessKey(creds) => {
                    s3_builder = s3_builder.with_access_key_id(creds.aws_access_key_id.clone());
                    s3_builder =
                        s3_builder.with_secret_access_key(creds.aws_secret_access_key.clone());
                }
                AwsCredentials::Token { token } => {
                    s3_builder = s3_builder.with_token(token.clone());
                }
            }
        }
        s3_builder
    }
}

impl ObjectStoreRegistry for S3StoreRegistry {
    fn store(&self, bucket: &str) -> StorageResult<Arc<dyn ObjectStore>> {
        if let Some(store) = self.object_store_cache.get(bucket) {
            return Ok(store.value().clone());
        }
        if validate_bucket_name(bucket).is_err() {
            return UnknownBucketSnafu { bucket }.fail();
        }
        let store: Arc<dyn ObjectStore> = Arc::new(
            self.s3_builder(bucket)
                .build()
                .context(BuildStoreSnafu { bucket })?,
        );
        tracing::debug!("Built S3 object store for bucket {bucket}");
        self.object_store_cache
            .insert(bucket.to_string(), store.clone());
        Ok(store)
    }
}
