//! Create Partition As Select.
//!
//! Materializes the result of a SQL query as one partition of a catalog
//! table backed by object storage. The query output is staged under a
//! transient external table pointing at the partition's final location,
//! verified, and then promoted into the destination table by a catalog-only
//! metadata move. See [`CpasOperator::execute`] for the stage sequence.

pub mod cleanup;
pub mod commit;
pub mod config;
pub mod conflict;
pub mod engine;
pub mod error;
pub mod format;
pub mod location;
pub mod objects;
pub mod poll;
pub mod query;
pub mod request;
pub mod schema;
pub mod sql;
pub mod staging;

#[cfg(test)]
pub mod tests;

pub use config::{EngineConfig, PollPolicy};
pub use engine::{CpasOperator, CpasOutcome, WorkflowState};
pub use error::{Error, ErrorCategory, Result};
pub use format::OutputFormat;
pub use location::{OrderedPartition, PartitionLocation};
pub use request::{CpasRequest, PartitionKeyValue, SaveMode};
