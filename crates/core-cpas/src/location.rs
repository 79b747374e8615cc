use std::collections::HashSet;
use std::fmt::Display;
use std::sync::LazyLock;

use core_traits::TableDefinition;
use object_store::path::Path;
use regex::Regex;
use snafu::{OptionExt, ensure};

use crate::error::{ConfigurationSnafu, Result};
use crate::request::CpasRequest;

#[allow(clippy::unwrap_used)]
static OBJECT_URI: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([A-Za-z][A-Za-z0-9+.-]*)://([^/]+)/(.+)$").unwrap());

/// Final storage location of a partition, `scheme://bucket/prefix/`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionLocation {
    uri: String,
    bucket: String,
    prefix: Path,
}

impl PartitionLocation {
    pub fn parse(uri: &str) -> Result<Self> {
        let captures = OBJECT_URI.captures(uri.trim()).context(ConfigurationSnafu {
            reason: format!("Invalid object store location {uri:?}, expected scheme://bucket/prefix"),
        })?;
        let scheme = &captures[1];
        let bucket = &captures[2];
        let raw_prefix = captures[3].trim_end_matches('/');
        ensure!(
            !raw_prefix.is_empty() && !raw_prefix.starts_with('/'),
            ConfigurationSnafu {
                reason: format!("Location {uri:?} must name a prefix below the bucket root"),
            }
        );
        let prefix = Path::parse(raw_prefix).map_err(|e| {
            ConfigurationSnafu {
                reason: format!("Invalid object store location {uri:?}: {e}"),
            }
            .build()
        })?;
        Ok(Self {
            uri: format!("{scheme}://{bucket}/{prefix}/"),
            bucket: bucket.to_string(),
            prefix,
        })
    }

    /// Location of the destination partition. An explicit request location
    /// wins; otherwise the partition directory is derived from the table's
    /// base location and the ordered `key=value` pairs.
    pub fn resolve(
        request: &CpasRequest,
        destination: Option<&TableDefinition>,
        partition: &OrderedPartition,
    ) -> Result<Self> {
        if let Some(location) = &request.location {
            return Self::parse(location);
        }
        let table = destination.context(ConfigurationSnafu {
            reason: format!(
                "Table {} does not exist and no explicit location was provided",
                request.destination()
            ),
        })?;
        let base = table.location().trim_end_matches('/');
        Self::parse(&format!("{base}/{}/", partition.path_segments()))
    }

    #[must_use]
    pub fn uri(&self) -> &str {
        &self.uri
    }

    #[must_use]
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    #[must_use]
    pub const fn prefix(&self) -> &Path {
        &self.prefix
    }

    #[must_use]
    pub fn child(&self, name: &str) -> Path {
        self.prefix.child(name)
    }
}

impl Display for PartitionLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.uri)
    }
}

/// Partition key/value pairs in the destination table's key order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderedPartition(Vec<(String, String)>);

impl OrderedPartition {
    /// Orders the request pairs by the table's declared partition keys. When
    /// the table does not exist yet the caller's order is kept.
    pub fn resolve(request: &CpasRequest, destination: Option<&TableDefinition>) -> Result<Self> {
        let Some(table) = destination else {
            return Ok(Self(
                request
                    .partition
                    .iter()
                    .map(|p| (p.key.clone(), p.value.clone()))
                    .collect(),
            ));
        };

        let table_keys = table.partition_key_names();
        let requested: HashSet<&str> = request.partition_keys().into_iter().collect();
        let declared: HashSet<&str> = table_keys.iter().copied().collect();
        ensure!(
            requested == declared && table_keys.len() == request.partition.len(),
            ConfigurationSnafu {
                reason: format!(
                    "Partition keys [{}] do not match keys [{}] of table {}",
                    request.partition_keys().join(", "),
                    table_keys.join(", "),
                    table.ident
                ),
            }
        );

        let mut pairs = Vec::with_capacity(table_keys.len());
        for key in table_keys {
            let value = request.partition_value(key).context(ConfigurationSnafu {
                reason: format!("Missing value for partition key {key}"),
            })?;
            pairs.push((key.to_string(), value.to_string()));
        }
        Ok(Self(pairs))
    }

    #[must_use]
    pub fn pairs(&self) -> &[(String, String)] {
        &self.0
    }

    #[must_use]
    pub fn values(&self) -> Vec<String> {
        self.0.iter().map(|(_, v)| v.clone()).collect()
    }

    /// `k1=v1/k2=v2`
    #[must_use]
    pub fn path_segments(&self) -> String {
        self.0
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("/")
    }
}
