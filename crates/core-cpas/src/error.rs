use core_traits::{CatalogError, QueryEngineError, StorageError, TableIdent};
use snafu::{Location, Snafu};

use crate::request::SaveMode;

/// Coarse classification of a failed run, stable across variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum ErrorCategory {
    Configuration,
    Conflict,
    Query,
    Consistency,
    NotFound,
    Catalog,
    Storage,
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    #[snafu(display("Invalid configuration: {reason}"))]
    Configuration {
        reason: String,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("Location {uri} already contains objects and save mode is {save_mode}"))]
    Conflict {
        uri: String,
        save_mode: SaveMode,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("Query engine error for `{sql}`: {source}"))]
    Query {
        sql: String,
        source: QueryEngineError,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("Query failed: {reason}. Statement: `{sql}`"))]
    QueryFailed {
        sql: String,
        reason: String,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("Query did not finish after {attempts} polls: `{sql}`"))]
    QueryTimeout {
        sql: String,
        attempts: u32,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("Query returned no result: `{sql}`"))]
    EmptyQueryResult {
        sql: String,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("Unexpected result {value:?} for `{sql}`"))]
    UnparsableResult {
        sql: String,
        value: Option<String>,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display(
        "Mismatch between rows inserted ({reported}) and rows in staging table ({actual})"
    ))]
    Consistency {
        reported: u64,
        actual: u64,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display(
        "No objects written by the current execution found under {uri} after {attempts} attempts"
    ))]
    ObjectsNotVisible {
        uri: String,
        attempts: u32,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("Catalog operation {operation} failed: {source}"))]
    Catalog {
        operation: String,
        source: CatalogError,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display(
        "Partition {values:?} of {table} was removed but could not be recreated, staging table {staging} keeps its descriptor: {source}"
    ))]
    PartitionLost {
        table: TableIdent,
        values: Vec<String>,
        staging: TableIdent,
        source: CatalogError,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("Object store operation {operation} failed: {source}"))]
    ObjectStore {
        operation: String,
        source: object_store::Error,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("Object store unavailable: {source}"))]
    StoreRegistry {
        source: StorageError,
        #[snafu(implicit)]
        location: Location,
    },
}

impl Error {
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::Configuration { .. } => ErrorCategory::Configuration,
            Self::Conflict { .. } => ErrorCategory::Conflict,
            Self::Query { .. }
            | Self::QueryFailed { .. }
            | Self::QueryTimeout { .. }
            | Self::EmptyQueryResult { .. }
            | Self::UnparsableResult { .. } => ErrorCategory::Query,
            Self::Consistency { .. } => ErrorCategory::Consistency,
            Self::ObjectsNotVisible { .. } => ErrorCategory::NotFound,
            Self::Catalog { .. } | Self::PartitionLost { .. } => ErrorCategory::Catalog,
            Self::ObjectStore { .. } | Self::StoreRegistry { .. } => ErrorCategory::Storage,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
