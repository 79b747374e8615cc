//! Statement rendering for the query engine.
//!
//! Identifiers are never quoted by the engine's dialect rules, so everything
//! spliced into a statement is validated against a narrow allow-list first and
//! literals are single-quoted with embedded quotes doubled.

use std::collections::BTreeMap;

use core_traits::{ColumnDescriptor, TableIdent};
use snafu::ensure;

use crate::error::{ConfigurationSnafu, Result};
use crate::format::OutputFormat;
use crate::location::PartitionLocation;

fn is_identifier_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

pub fn validate_identifier(kind: &str, value: &str) -> Result<()> {
    ensure!(
        !value.is_empty() && value.chars().all(is_identifier_char),
        ConfigurationSnafu {
            reason: format!(
                "Invalid {kind} {value:?}: only letters, digits and underscores are allowed"
            ),
        }
    );
    Ok(())
}

pub fn validate_catalog_name(value: &str) -> Result<()> {
    ensure!(
        !value.is_empty() && value.chars().all(|c| is_identifier_char(c) || c == '-'),
        ConfigurationSnafu {
            reason: format!(
                "Invalid catalog name {value:?}: only letters, digits, underscores and hyphens are allowed"
            ),
        }
    );
    Ok(())
}

/// Partition values end up both in object keys (`key=value/`) and in
/// catalog calls, so path separators, quotes and control characters are
/// rejected outright.
pub fn validate_partition_value(key: &str, value: &str) -> Result<()> {
    let forbidden = |c: char| matches!(c, '/' | '=' | '\'' | '"' | '\\' | '`') || c.is_control();
    ensure!(
        !value.is_empty() && !value.contains(forbidden),
        ConfigurationSnafu {
            reason: format!("Invalid value {value:?} for partition key {key}"),
        }
    );
    Ok(())
}

pub fn validate_column(column: &ColumnDescriptor) -> Result<()> {
    validate_identifier("column name", &column.name)?;
    let type_char = |c: char| {
        c.is_ascii_alphanumeric() || matches!(c, '_' | '(' | ')' | ',' | '<' | '>' | ':' | ' ')
    };
    ensure!(
        !column.r#type.is_empty() && column.r#type.chars().all(type_char),
        ConfigurationSnafu {
            reason: format!(
                "Invalid type {:?} for column {}",
                column.r#type, column.name
            ),
        }
    );
    Ok(())
}

#[must_use]
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

#[must_use]
pub fn create_table_as(table: &TableIdent, query: &str) -> String {
    format!("CREATE TABLE {table} AS {query}")
}

#[must_use]
pub fn describe(catalog: &str, table: &TableIdent) -> String {
    format!("DESCRIBE {catalog}.{table}")
}

#[must_use]
pub fn drop_table(table: &TableIdent) -> String {
    format!("DROP TABLE IF EXISTS {table}")
}

#[must_use]
pub fn insert_into(table: &TableIdent, query: &str) -> String {
    format!("INSERT INTO {table} {query}")
}

#[must_use]
pub fn count_rows(table: &TableIdent) -> String {
    format!("SELECT COUNT(*) FROM {table}")
}

pub fn create_external_table(
    table: &TableIdent,
    columns: &[ColumnDescriptor],
    format: OutputFormat,
    location: &PartitionLocation,
    properties: &BTreeMap<String, String>,
) -> Result<String> {
    ensure!(
        !columns.is_empty(),
        ConfigurationSnafu {
            reason: format!("No columns to create {table} with"),
        }
    );
    for column in columns {
        validate_column(column)?;
    }

    let driver = format.driver();
    let columns = columns
        .iter()
        .map(|c| format!("  `{}` {}", c.name, c.r#type))
        .collect::<Vec<_>>()
        .join(",\n");
    let mut statement = format!(
        "CREATE EXTERNAL TABLE IF NOT EXISTS {table} (\n{columns}\n)\n\
         ROW FORMAT SERDE {}\n\
         STORED AS INPUTFORMAT {}\n\
         OUTPUTFORMAT {}\n\
         LOCATION {}",
        quote_literal(driver.serde_library),
        quote_literal(driver.input_format),
        quote_literal(driver.output_format),
        quote_literal(location.uri()),
    );
    if !properties.is_empty() {
        let properties = properties
            .iter()
            .map(|(k, v)| format!("{}={}", quote_literal(k), quote_literal(v)))
            .collect::<Vec<_>>()
            .join(", ");
        statement.push_str(&format!("\nTBLPROPERTIES ({properties})"));
    }
    Ok(statement)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn staging() -> TableIdent {
        TableIdent::new("sales", "cpas_staging_20240101000000_ABCDE12345")
    }

    #[test]
    fn test_simple_statements() {
        let table = staging();
        insta::assert_snapshot!(
            create_table_as(&table, "SELECT 1 AS id"),
            @"CREATE TABLE sales.cpas_staging_20240101000000_ABCDE12345 AS SELECT 1 AS id"
        );
        insta::assert_snapshot!(
            describe("AwsDataCatalog", &table),
            @"DESCRIBE AwsDataCatalog.sales.cpas_staging_20240101000000_ABCDE12345"
        );
        insta::assert_snapshot!(
            count_rows(&table),
            @"SELECT COUNT(*) FROM sales.cpas_staging_20240101000000_ABCDE12345"
        );
    }

    #[test]
    fn test_create_external_table() {
        let location =
            PartitionLocation::parse("s3://lake/sales/orders/dt=2024-01-01").unwrap();
        let columns = vec![
            ColumnDescriptor::new("order_id", "bigint"),
            ColumnDescriptor::new("amount", "decimal(10,2)"),
        ];
        let mut properties = BTreeMap::new();
        properties.insert("parquet.compression".to_string(), "SNAPPY".to_string());

        let statement = create_external_table(
            &staging(),
            &columns,
            OutputFormat::Parquet,
            &location,
            &properties,
        )
        .unwrap();
        insta::assert_snapshot!(statement, @r"
        CREATE EXTERNAL TABLE IF NOT EXISTS sales.cpas_staging_20240101000000_ABCDE12345 (
          `order_id` bigint,
          `amount` decimal(10,2)
        )
        ROW FORMAT SERDE 'org.apache.hadoop.hive.ql.io.parquet.serde.ParquetHiveSerDe'
        STORED AS INPUTFORMAT 'org.apache.hadoop.hive.ql.io.parquet.MapredParquetInputFormat'
        OUTPUTFORMAT 'org.apache.hadoop.hive.ql.io.parquet.MapredParquetOutputFormat'
        LOCATION 's3://lake/sales/orders/dt=2024-01-01/'
        TBLPROPERTIES ('parquet.compression'='SNAPPY')
        ");
    }

    #[test]
    fn test_rejects_unsafe_input() {
        assert!(validate_identifier("table", "orders").is_ok());
        assert!(validate_identifier("table", "orders;drop").is_err());
        assert!(validate_identifier("table", "").is_err());
        assert!(validate_catalog_name("my-catalog").is_ok());
        assert!(validate_partition_value("dt", "2024-01-01").is_ok());
        assert!(validate_partition_value("dt", "x' OR '1").is_err());
        assert!(validate_partition_value("dt", "a=b").is_err());
        assert!(validate_column(&ColumnDescriptor::new("tags", "array<struct<k:string>>")).is_ok());
        assert!(validate_column(&ColumnDescriptor::new("x", "int; DROP")).is_err());
        assert_eq!(quote_literal("it's"), "'it''s'");
    }
}
