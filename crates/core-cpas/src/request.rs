use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::str::FromStr;

use core_traits::TableIdent;
use serde::{Deserialize, Serialize};
use snafu::ensure;
use validator::Validate;

use crate::error::{ConfigurationSnafu, Result};
use crate::format::OutputFormat;
use crate::sql;

/// What to do when the target location already holds objects.
///
/// Serialized in kebab-case. Parsing, including YAML, goes through
/// [`SaveMode::parse`] and accepts legacy spellings in any case.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "kebab-case", try_from = "String")]
#[strum(ascii_case_insensitive)]
pub enum SaveMode {
    #[strum(to_string = "skip-if-exists", serialize = "skipifexists")]
    SkipIfExists,
    #[strum(to_string = "error-if-exists", serialize = "errorifexists")]
    ErrorIfExists,
    #[strum(to_string = "ignore-save-mode", serialize = "ignoresavemode")]
    IgnoreSaveMode,
    #[default]
    #[strum(to_string = "overwrite")]
    Overwrite,
}

impl SaveMode {
    pub fn parse(value: &str) -> Result<Self> {
        Self::from_str(value.trim()).map_err(|_| {
            ConfigurationSnafu {
                reason: format!("Unsupported save mode: {value}"),
            }
            .build()
        })
    }
}

impl TryFrom<String> for SaveMode {
    type Error = crate::error::Error;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct PartitionKeyValue {
    #[validate(length(min = 1))]
    pub key: String,
    #[validate(length(min = 1))]
    pub value: String,
}

impl PartitionKeyValue {
    #[must_use]
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// One materialization job: run `query` against `source` and publish its
/// output as the `partition` of `database.table`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "kebab-case")]
pub struct CpasRequest {
    #[validate(length(min = 1))]
    pub source: String,
    #[validate(length(min = 1))]
    pub database: String,
    #[validate(length(min = 1))]
    pub table: String,
    #[validate(length(min = 1))]
    pub query: String,
    /// Partition key/value pairs in caller order.
    #[validate(length(min = 1, message = "at least one partition key is required"))]
    pub partition: Vec<PartitionKeyValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default)]
    pub format: OutputFormat,
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
    #[serde(default)]
    pub save_mode: SaveMode,
}

impl CpasRequest {
    #[must_use]
    pub fn builder(
        source: impl Into<String>,
        database: impl Into<String>,
        table: impl Into<String>,
        query: impl Into<String>,
    ) -> CpasRequestBuilder {
        CpasRequestBuilder {
            request: Self {
                source: source.into(),
                database: database.into(),
                table: table.into(),
                query: query.into(),
                partition: Vec::new(),
                location: None,
                format: OutputFormat::default(),
                properties: BTreeMap::new(),
                save_mode: SaveMode::default(),
            },
        }
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let request: Self = serde_yaml::from_str(yaml).map_err(|e| {
            ConfigurationSnafu {
                reason: format!("Failed to parse request: {e}"),
            }
            .build()
        })?;
        request.check()?;
        Ok(request)
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            ConfigurationSnafu {
                reason: format!("Failed to read request file {}: {e}", path.display()),
            }
            .build()
        })?;
        Self::from_yaml_str(&content)
    }

    #[must_use]
    pub fn destination(&self) -> TableIdent {
        TableIdent::new(&self.database, &self.table)
    }

    #[must_use]
    pub fn partition_keys(&self) -> Vec<&str> {
        self.partition.iter().map(|p| p.key.as_str()).collect()
    }

    #[must_use]
    pub fn partition_value(&self, key: &str) -> Option<&str> {
        self.partition
            .iter()
            .find(|p| p.key == key)
            .map(|p| p.value.as_str())
    }

    /// Validates everything that can be checked without the catalog.
    pub fn check(&self) -> Result<()> {
        self.validate()
            .map_err(|e| e.to_string())
            .map_err(|reason| ConfigurationSnafu { reason }.build())?;

        sql::validate_catalog_name(&self.source)?;
        sql::validate_identifier("database", &self.database)?;
        sql::validate_identifier("table", &self.table)?;
        ensure!(
            !self.query.trim().is_empty(),
            ConfigurationSnafu {
                reason: "query must not be blank",
            }
        );

        let mut seen = HashSet::new();
        for pair in &self.partition {
            sql::validate_identifier("partition key", &pair.key)?;
            sql::validate_partition_value(&pair.key, &pair.value)?;
            ensure!(
                seen.insert(pair.key.as_str()),
                ConfigurationSnafu {
                    reason: format!("duplicate partition key {}", pair.key),
                }
            );
        }
        for key in self.properties.keys() {
            ensure!(
                !key.trim().is_empty(),
                ConfigurationSnafu {
                    reason: "table property names must not be blank",
                }
            );
        }
        Ok(())
    }
}

pub struct CpasRequestBuilder {
    request: CpasRequest,
}

impl CpasRequestBuilder {
    #[must_use]
    pub fn partition(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.request
            .partition
            .push(PartitionKeyValue::new(key, value));
        self
    }

    #[must_use]
    pub fn location(mut self, location: impl Into<String>) -> Self {
        self.request.location = Some(location.into());
        self
    }

    #[must_use]
    pub fn format(mut self, format: OutputFormat) -> Self {
        self.request.format = format;
        self
    }

    #[must_use]
    pub fn property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.request.properties.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn save_mode(mut self, save_mode: SaveMode) -> Self {
        self.request.save_mode = save_mode;
        self
    }

    pub fn build(self) -> Result<CpasRequest> {
        self.request.check()?;
        Ok(self.request)
    }
}
