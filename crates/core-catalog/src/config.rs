use std::collections::HashMap;

use core_traits::{ColumnDescriptor, StorageDescriptor, TableDefinition, TableIdent};
use serde::{Deserialize, Serialize};

/// Tables to pre-register in a [`crate::MemoryCatalog`], loaded from YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    #[serde(default)]
    pub tables: Vec<TableConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableConfig {
    pub database: String,
    pub table: String,
    pub location: String,
    #[serde(default)]
    pub columns: Vec<ColumnDescriptor>,
    #[serde(default)]
    pub partition_keys: Vec<ColumnDescriptor>,
    pub input_format: Option<String>,
    pub output_format: Option<String>,
    pub serde_library: Option<String>,
    #[serde(default)]
    pub parameters: HashMap<String, String>,
}

impl CatalogConfig {
    /// Load configuration from YAML file
    pub fn from_yaml_file(path: &str) -> Result<Self, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read catalog config file: {e}"))?;
        Self::from_yaml_str(&content)
    }

    /// Load configuration from YAML string
    pub fn from_yaml_str(yaml: &str) -> Result<Self, String> {
        serde_yaml::from_str(yaml).map_err(|e| format!("Failed to parse catalog config YAML: {e}"))
    }
}

impl TableConfig {
    #[must_use]
    pub fn to_table(&self) -> TableDefinition {
        TableDefinition {
            ident: TableIdent::new(&self.database, &self.table),
            storage_descriptor: StorageDescriptor {
                location: self.location.clone(),
                columns: self.columns.clone(),
                input_format: self.input_format.clone(),
                output_format: self.output_format.clone(),
                serde_library: self.serde_library.clone(),
                parameters: HashMap::new(),
            },
            partition_keys: self.partition_keys.clone(),
            parameters: self.parameters.clone(),
        }
    }
}
