pub mod config;
pub mod registry;

pub use config::{AwsAccessKeyCredentials, AwsCredentials, S3Config};
pub use registry::{InMemoryStoreRegistry, S3StoreRegistry};
