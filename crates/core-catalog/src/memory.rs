use async_trait::async_trait;
use chrono::Utc;
use core_traits::catalog::{
    AlreadyExistsSnafu, Catalog, CatalogResult, EntityNotFoundSnafu, ExternalTableCreate,
    InvalidInputSnafu, Partition, StorageDescriptor, TableDefinition, TableIdent,
};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use crate::config::CatalogConfig;

type PartitionKey = (TableIdent, Vec<String>);

/// In-process catalog keeping tables and partitions in concurrent maps.
#[derive(Debug, Default)]
pub struct MemoryCatalog {
    tables: DashMap<TableIdent, TableDefinition>,
    partitions: DashMap<PartitionKey, Partition>,
}

impl MemoryCatalog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn from_config(config: &CatalogConfig) -> Self {
        let catalog = Self::new();
        for table in &config.tables {
            catalog.register_table(table.to_table());
        }
        catalog
    }

    /// Create from YAML string
    pub fn from_yaml_str(yaml: &str) -> Result<Self, String> {
        Ok(Self::from_config(&CatalogConfig::from_yaml_str(yaml)?))
    }

    /// Inserts or replaces a table definition without any validation.
    pub fn register_table(&self, table: TableDefinition) {
        self.tables.insert(table.ident.clone(), table);
    }

    #[must_use]
    pub fn table_exists(&self, ident: &TableIdent) -> bool {
        self.tables.contains_key(ident)
    }

    #[must_use]
    pub fn table_names(&self) -> Vec<TableIdent> {
        let mut names: Vec<TableIdent> = self.tables.iter().map(|t| t.key().clone()).collect();
        names.sort_by(|a, b| a.to_string().cmp(&b.to_string()));
        names
    }

    /// Partitions of `ident` ordered by their values.
    #[must_use]
    pub fn partitions(&self, ident: &TableIdent) -> Vec<Partition> {
        let mut partitions: Vec<Partition> = self
            .partitions
            .iter()
            .filter(|p| &p.key().0 == ident)
            .map(|p| p.value().clone())
            .collect();
        partitions.sort_by(|a, b| a.values.cmp(&b.values));
        partitions
    }

    fn partition_entity(ident: &TableIdent, values: &[String]) -> String {
        format!("partition {ident}[{}]", values.join(", "))
    }
}

#[async_trait]
impl Catalog for MemoryCatalog {
    async fn get_table(&self, ident: &TableIdent) -> CatalogResult<TableDefinition> {
        self.tables.get(ident).map(|t| t.value().clone()).ok_or_else(|| {
            EntityNotFoundSnafu {
                entity: format!("table {ident}"),
            }
            .build()
        })
    }

    async fn create_external_table(
        &self,
        ident: &TableIdent,
        table: ExternalTableCreate,
    ) -> CatalogResult<TableDefinition> {
        if table.storage_descriptor.location.is_empty() {
            return InvalidInputSnafu {
                reason: format!("external table {ident} has no location"),
            }
            .fail();
        }
        match self.tables.entry(ident.clone()) {
            Entry::Occupied(_) => AlreadyExistsSnafu {
                entity: format!("table {ident}"),
            }
            .fail(),
            Entry::Vacant(vacant) => {
                let definition = TableDefinition {
                    ident: ident.clone(),
                    storage_descriptor: table.storage_descriptor,
                    partition_keys: table.partition_keys,
                    parameters: table.parameters,
                };
                vacant.insert(definition.clone());
                tracing::debug!("Registered external table {ident}");
                Ok(definition)
            }
        }
    }

    async fn delete_table(&self, ident: &TableIdent) -> CatalogResult<()> {
        if self.tables.remove(ident).is_none() {
            return EntityNotFoundSnafu {
                entity: format!("table {ident}"),
            }
            .fail();
        }
        self.partitions.retain(|(table, _), _| table != ident);
        Ok(())
    }

    async fn get_partition(
        &self,
        ident: &TableIdent,
        values: &[String],
    ) -> CatalogResult<Partition> {
        self.partitions
            .get(&(ident.clone(), values.to_vec()))
            .map(|p| p.value().clone())
            .ok_or_else(|| {
                EntityNotFoundSnafu {
                    entity: Self::partition_entity(ident, values),
                }
                .build()
            })
    }

    async fn create_partition(
        &self,
        ident: &TableIdent,
        values: Vec<String>,
        storage_descriptor: StorageDescriptor,
    ) -> CatalogResult<Partition> {
        let key_count = self
            .tables
            .get(ident)
            .map(|t| t.partition_keys.len())
            .ok_or_else(|| {
                EntityNotFoundSnafu {
                    entity: format!("table {ident}"),
                }
                .build()
            })?;
        if key_count != values.len() {
            return InvalidInputSnafu {
                reason: format!(
                    "table {ident} has {key_count} partition keys, got {} values",
                    values.len()
                ),
            }
            .fail();
        }
        match self.partitions.entry((ident.clone(), values.clone())) {
            Entry::Occupied(_) => AlreadyExistsSnafu {
                entity: Self::partition_entity(ident, &values),
            }
            .fail(),
            Entry::Vacant(vacant) => {
                let partition = Partition {
                    table: ident.clone(),
                    values,
                    storage_descriptor,
                    created_at: Utc::now(),
                };
                vacant.insert(partition.clone());
                Ok(partition)
            }
        }
    }

    async fn delete_partition(&self, ident: &TableIdent, values: &[String]) -> CatalogResult<()> {
        self.partitions
            .remove(&(ident.clone(), values.to_vec()))
            .map(|_| ())
            .ok_or_else(|| {
                EntityNotFoundSnafu {
                    entity: Self::partition_entity(ident, values),
                }
                .build()
            })
    }
}
