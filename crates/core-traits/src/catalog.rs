use std::collections::HashMap;
use std::fmt::Display;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use snafu::{Location, Snafu};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
/// A table identifier
pub struct TableIdent {
    /// The database the table belongs to
    pub database: String,
    /// The name of the table
    pub table: String,
}

impl TableIdent {
    #[must_use]
    pub fn new(database: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            table: table.into(),
        }
    }
}

impl Display for TableIdent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.database, self.table)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    pub name: String,
    pub r#type: String,
}

impl ColumnDescriptor {
    #[must_use]
    pub fn new(name: impl Into<String>, r#type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            r#type: r#type.into(),
        }
    }
}

impl Display for ColumnDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.name, self.r#type)
    }
}

/// Physical layout of a table or partition: where the data lives, how it is
/// encoded and which columns it carries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageDescriptor {
    pub location: String,
    pub columns: Vec<ColumnDescriptor>,
    pub input_format: Option<String>,
    pub output_format: Option<String>,
    pub serde_library: Option<String>,
    #[serde(default)]
    pub parameters: HashMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableDefinition {
    pub ident: TableIdent,
    pub storage_descriptor: StorageDescriptor,
    #[serde(default)]
    pub partition_keys: Vec<ColumnDescriptor>,
    #[serde(default)]
    pub parameters: HashMap<String, String>,
}

impl TableDefinition {
    #[must_use]
    pub fn location(&self) -> &str {
        &self.storage_descriptor.location
    }

    #[must_use]
    pub fn partition_key_names(&self) -> Vec<&str> {
        self.partition_keys.iter().map(|k| k.name.as_str()).collect()
    }
}

/// Everything needed to register an external table, i.e. a table whose data
/// is owned by the object store rather than by the catalog.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalTableCreate {
    pub storage_descriptor: StorageDescriptor,
    #[serde(default)]
    pub partition_keys: Vec<ColumnDescriptor>,
    #[serde(default)]
    pub parameters: HashMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Partition {
    pub table: TableIdent,
    pub values: Vec<String>,
    pub storage_descriptor: StorageDescriptor,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogErrorKind {
    EntityNotFound,
    AlreadyExists,
    InvalidInput,
    Internal,
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum CatalogError {
    #[snafu(display("Entity not found: {entity}"))]
    EntityNotFound {
        entity: String,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("Entity already exists: {entity}"))]
    AlreadyExists {
        entity: String,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("Invalid catalog input: {reason}"))]
    InvalidInput {
        reason: String,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("Catalog backend error: {message}"))]
    Internal {
        message: String,
        #[snafu(implicit)]
        location: Location,
    },
}

impl CatalogError {
    #[must_use]
    pub const fn kind(&self) -> CatalogErrorKind {
        match self {
            Self::EntityNotFound { .. } => CatalogErrorKind::EntityNotFound,
            Self::AlreadyExists { .. } => CatalogErrorKind::AlreadyExists,
            Self::InvalidInput { .. } => CatalogErrorKind::InvalidInput,
            Self::Internal { .. } => CatalogErrorKind::Internal,
        }
    }

    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self.kind(), CatalogErrorKind::EntityNotFound)
    }
}

pub type CatalogResult<T> = std::result::Result<T, CatalogError>;

/// Table and partition metadata store (Glue/Hive metastore style).
///
/// Lookups of missing tables or partitions fail with
/// [`CatalogError::EntityNotFound`]; callers tell "absent" apart from other
/// failures with [`CatalogError::is_not_found`].
#[async_trait]
pub trait Catalog: std::fmt::Debug + Send + Sync {
    async fn get_table(&self, ident: &TableIdent) -> CatalogResult<TableDefinition>;
    async fn create_external_table(
        &self,
        ident: &TableIdent,
        table: ExternalTableCreate,
    ) -> CatalogResult<TableDefinition>;
    async fn delete_table(&self, ident: &TableIdent) -> CatalogResult<()>;

    async fn get_partition(&self, ident: &TableIdent, values: &[String])
    -> CatalogResult<Partition>;
    async fn create_partition(
        &self,
        ident: &TableIdent,
        values: Vec<String>,
        storage_descriptor: StorageDescriptor,
    ) -> CatalogResult<Partition>;
    async fn delete_partition(&self, ident: &TableIdent, values: &[String]) -> CatalogResult<()>;
}
