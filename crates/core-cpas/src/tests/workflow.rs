use std::sync::Arc;

use bytes::Bytes;
use core_catalog::MemoryCatalog;
use core_storage::InMemoryStoreRegistry;
use core_traits::{Catalog, ColumnDescriptor, StorageDescriptor};
use object_store::ObjectStore;
use object_store::path::Path;

use super::fake_engine::{EngineFaults, FakeQueryEngine};
use super::faulty_catalog::CatalogFaults;
use super::harness::{PARTITION_URI, TestEnv, test_config};
use crate::engine::{CpasOperator, CpasOutcome};
use crate::error::{Error, ErrorCategory};
use crate::format::OutputFormat;
use crate::request::{CpasRequest, SaveMode};

const FULL_RUN: [&str; 6] = [
    "CREATE TABLE",
    "DESCRIBE",
    "DROP TABLE IF EXISTS",
    "CREATE EXTERNAL TABLE IF NOT EXISTS",
    "INSERT INTO",
    "SELECT",
];

#[tokio::test]
async fn test_overwrite_into_empty_location() {
    let env = TestEnv::new(3);

    let outcome = env
        .operator
        .execute(&env.request(SaveMode::Overwrite))
        .await
        .unwrap();
    let CpasOutcome::Committed {
        location,
        partition,
        rows,
        staging_table,
    } = outcome
    else {
        panic!("expected a committed outcome");
    };
    assert_eq!(location, PARTITION_URI);
    assert_eq!(partition, vec![("dt".to_string(), "2024-01-01".to_string())]);
    assert_eq!(rows, 3);
    assert!(staging_table.table.starts_with("cpas_staging_"));
    assert_eq!(env.engine.statement_kinds(), FULL_RUN);

    let partitions = env.partitions();
    assert_eq!(partitions.len(), 1);
    let descriptor = &partitions[0].storage_descriptor;
    assert_eq!(partitions[0].values, vec!["2024-01-01"]);
    assert_eq!(descriptor.location, PARTITION_URI);
    assert_eq!(
        descriptor.columns,
        vec![
            ColumnDescriptor::new("order_id", "bigint"),
            ColumnDescriptor::new("amount", "decimal(10,2)"),
        ]
    );
    assert_eq!(
        descriptor.serde_library.as_deref(),
        Some(OutputFormat::Parquet.driver().serde_library)
    );

    assert!(env.staging_tables().is_empty());
    assert!(!env.marker_exists().await);
    assert_eq!(env.objects().await.len(), 1);
}

#[tokio::test]
async fn test_statements_target_destination_database() {
    let env = TestEnv::new(1);
    env.operator
        .execute(&env.request(SaveMode::Overwrite))
        .await
        .unwrap();

    let statements = env.engine.statements();
    assert!(statements[0].starts_with("CREATE TABLE sales.cpas_staging_"));
    assert!(statements[0].ends_with(super::harness::QUERY));
    assert!(statements[3].contains(&format!("LOCATION '{PARTITION_URI}'")));
    assert!(statements[4].starts_with("INSERT INTO sales.cpas_staging_"));
    // probe and staging tables are distinct
    let probe = statements[0].split_whitespace().nth(2).unwrap();
    let staging = statements[4].split_whitespace().nth(2).unwrap();
    assert_ne!(probe, staging);
}

#[tokio::test]
async fn test_skip_if_exists_leaves_location_alone() {
    let env = TestEnv::new(3);
    env.seed_objects(&["a.parquet", "b.parquet", "c.parquet"]).await;
    let before = env.objects().await;

    let outcome = env
        .operator
        .execute(&env.request(SaveMode::SkipIfExists))
        .await
        .unwrap();
    assert_eq!(
        outcome,
        CpasOutcome::Skipped {
            location: PARTITION_URI.to_string()
        }
    );
    assert!(env.engine.statements().is_empty());
    assert_eq!(env.objects().await, before);
    assert!(env.partitions().is_empty());
    assert_eq!(env.catalog.calls(), vec!["get_table"]);
}

#[tokio::test]
async fn test_error_if_exists_fails_before_any_query() {
    let env = TestEnv::new(3);
    env.seed_objects(&["a.parquet"]).await;

    let err = env
        .operator
        .execute(&env.request(SaveMode::ErrorIfExists))
        .await
        .unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Conflict);
    insta::assert_snapshot!(err, @"Location s3://lake/sales/orders/dt=2024-01-01/ already contains objects and save mode is error-if-exists");
    assert!(env.engine.statements().is_empty());
    assert_eq!(env.object_names().await, vec!["a.parquet"]);
}

#[tokio::test]
async fn test_ignore_save_mode_keeps_existing_objects() {
    let env = TestEnv::new(2);
    env.seed_objects(&["a.parquet", "b.parquet"]).await;

    env.operator
        .execute(&env.request(SaveMode::IgnoreSaveMode))
        .await
        .unwrap();
    let names = env.object_names().await;
    assert_eq!(names.len(), 3, "{names:?}");
    assert!(names.contains(&"a.parquet".to_string()));
    assert!(names.contains(&"b.parquet".to_string()));
    assert_eq!(env.partitions().len(), 1);
}

#[tokio::test]
async fn test_overwrite_replaces_existing_objects() {
    let env = TestEnv::new(2);
    env.seed_objects(&["a.parquet", "b.parquet"]).await;

    env.operator
        .execute(&env.request(SaveMode::Overwrite))
        .await
        .unwrap();
    let names = env.object_names().await;
    assert_eq!(names.len(), 1);
    assert!(names[0].starts_with("part-"), "{names:?}");
}

#[tokio::test]
async fn test_overwrite_is_idempotent() {
    let env = TestEnv::new(4);
    let request = env.request(SaveMode::Overwrite);

    let first = env.operator.execute(&request).await.unwrap();
    let second = env.operator.execute(&request).await.unwrap();
    for outcome in [first, second] {
        assert!(matches!(outcome, CpasOutcome::Committed { rows: 4, .. }));
    }
    assert_eq!(env.partitions().len(), 1);
    assert_eq!(env.objects().await.len(), 1);
    assert!(!env.marker_exists().await);
    assert!(env.staging_tables().is_empty());
}

#[tokio::test]
async fn test_existing_partition_is_replaced() {
    let env = TestEnv::new(2);
    env.memory
        .create_partition(
            &TestEnv::orders(),
            vec!["2024-01-01".to_string()],
            StorageDescriptor {
                location: "s3://lake/legacy/dt=2024-01-01/".to_string(),
                ..StorageDescriptor::default()
            },
        )
        .await
        .unwrap();

    env.operator
        .execute(&env.request(SaveMode::Overwrite))
        .await
        .unwrap();
    let partitions = env.partitions();
    assert_eq!(partitions.len(), 1);
    assert_eq!(partitions[0].storage_descriptor.location, PARTITION_URI);
    assert!(partitions[0].storage_descriptor.input_format.is_some());
}

#[tokio::test]
async fn test_row_count_mismatch_never_commits() {
    let env = TestEnv::new(10);
    env.engine.set_faults(EngineFaults {
        count_offset: 1,
        ..EngineFaults::default()
    });

    let err = env
        .operator
        .execute(&env.request(SaveMode::Overwrite))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Consistency { reported: 10, actual: 11, .. }));
    assert_eq!(err.category(), ErrorCategory::Consistency);
    assert!(env.partitions().is_empty());
    assert!(env.staging_tables().is_empty());
    assert!(!env.marker_exists().await);
    assert!(!env.catalog.calls().contains(&"create_partition".to_string()));
}

#[tokio::test]
async fn test_query_failure_cleans_up() {
    let env = TestEnv::new(3);
    env.engine.set_faults(EngineFaults {
        fail_statement: Some("INSERT INTO".to_string()),
        ..EngineFaults::default()
    });

    let err = env
        .operator
        .execute(&env.request(SaveMode::Overwrite))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::QueryFailed { .. }));
    assert_eq!(err.category(), ErrorCategory::Query);
    assert!(env.staging_tables().is_empty());
    assert!(!env.marker_exists().await);
    assert!(env.partitions().is_empty());
}

#[tokio::test]
async fn test_probe_is_dropped_when_describe_fails() {
    let env = TestEnv::new(3);
    env.engine.set_faults(EngineFaults {
        fail_statement: Some("DESCRIBE".to_string()),
        ..EngineFaults::default()
    });

    let err = env
        .operator
        .execute(&env.request(SaveMode::Overwrite))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::QueryFailed { .. }));
    assert_eq!(env.engine.statement_kinds(), FULL_RUN[..3]);
    assert!(env.staging_tables().is_empty());
    assert!(!env.marker_exists().await);
}

#[tokio::test]
async fn test_ddl_without_result_payload() {
    let env = TestEnv::new(3);
    env.engine.set_faults(EngineFaults {
        silent_ddl: true,
        ..EngineFaults::default()
    });

    let outcome = env
        .operator
        .execute(&env.request(SaveMode::Overwrite))
        .await
        .unwrap();
    assert!(matches!(outcome, CpasOutcome::Committed { rows: 3, .. }));
    assert_eq!(env.engine.statement_kinds(), FULL_RUN);
    assert_eq!(env.partitions().len(), 1);
    assert!(env.staging_tables().is_empty());
}

#[tokio::test]
async fn test_missing_update_count_is_a_query_error() {
    let env = TestEnv::new(3);
    env.engine.set_faults(EngineFaults {
        missing_update_count: true,
        ..EngineFaults::default()
    });

    let err = env
        .operator
        .execute(&env.request(SaveMode::Overwrite))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::EmptyQueryResult { .. }));
    assert!(env.staging_tables().is_empty());
}

#[tokio::test]
async fn test_objects_never_visible() {
    let env = TestEnv::new(5);
    env.engine.set_faults(EngineFaults {
        skip_object_writes: true,
        ..EngineFaults::default()
    });

    let err = env
        .operator
        .execute(&env.request(SaveMode::Overwrite))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::ObjectsNotVisible { attempts: 5, .. }));
    assert_eq!(err.category(), ErrorCategory::NotFound);
    assert!(env.partitions().is_empty());
    assert!(env.staging_tables().is_empty());
    assert!(!env.marker_exists().await);
}

#[tokio::test]
async fn test_empty_result_skips_visibility_wait() {
    let env = TestEnv::new(0);

    let outcome = env
        .operator
        .execute(&env.request(SaveMode::Overwrite))
        .await
        .unwrap();
    assert!(matches!(outcome, CpasOutcome::Committed { rows: 0, .. }));
    assert_eq!(env.partitions().len(), 1);
    assert!(env.objects().await.is_empty());
}

#[tokio::test]
async fn test_partition_lookup_error_is_fatal() {
    let env = TestEnv::new(3);
    env.catalog.set_faults(CatalogFaults {
        get_partition: true,
        ..CatalogFaults::default()
    });

    let err = env
        .operator
        .execute(&env.request(SaveMode::Overwrite))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Catalog { .. }));
    let calls = env.catalog.calls();
    assert!(!calls.contains(&"delete_partition".to_string()));
    assert!(!calls.contains(&"create_partition".to_string()));
    assert!(env.staging_tables().is_empty());
}

#[tokio::test]
async fn test_lost_partition_keeps_staging_table() {
    let env = TestEnv::new(3);
    env.memory
        .create_partition(
            &TestEnv::orders(),
            vec!["2024-01-01".to_string()],
            StorageDescriptor {
                location: PARTITION_URI.to_string(),
                ..StorageDescriptor::default()
            },
        )
        .await
        .unwrap();
    env.catalog.set_faults(CatalogFaults {
        create_partition: true,
        ..CatalogFaults::default()
    });

    let err = env
        .operator
        .execute(&env.request(SaveMode::Overwrite))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::PartitionLost { .. }));
    assert_eq!(err.category(), ErrorCategory::Catalog);
    assert!(env.partitions().is_empty());
    let staging = env.staging_tables();
    assert_eq!(staging.len(), 1);
    let kept = env.memory.get_table(&staging[0]).await.unwrap();
    assert_eq!(kept.location(), PARTITION_URI);
    assert!(!env.marker_exists().await);
}

#[tokio::test]
async fn test_cleanup_failure_does_not_mask_error() {
    let env = TestEnv::new(3);
    env.engine.set_faults(EngineFaults {
        count_offset: 2,
        ..EngineFaults::default()
    });
    env.catalog.set_faults(CatalogFaults {
        delete_table: true,
        ..CatalogFaults::default()
    });

    let err = env
        .operator
        .execute(&env.request(SaveMode::Overwrite))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Consistency { .. }));
    assert_eq!(env.staging_tables().len(), 1);
    assert!(!env.marker_exists().await);
}

#[tokio::test]
async fn test_partition_keys_follow_table_order() {
    let env = TestEnv::new(1);
    env.memory.register_table(core_traits::TableDefinition {
        ident: core_traits::TableIdent::new("sales", "events"),
        storage_descriptor: StorageDescriptor {
            location: "s3://lake/sales/events/".to_string(),
            ..StorageDescriptor::default()
        },
        partition_keys: vec![
            ColumnDescriptor::new("region", "string"),
            ColumnDescriptor::new("dt", "string"),
        ],
        parameters: std::collections::HashMap::new(),
    });
    let request = CpasRequest::builder("AwsDataCatalog", "sales", "events", "SELECT 1")
        .partition("dt", "2024-01-01")
        .partition("region", "eu")
        .build()
        .unwrap();

    let outcome = env.operator.execute(&request).await.unwrap();
    assert_eq!(
        outcome.location(),
        "s3://lake/sales/events/region=eu/dt=2024-01-01/"
    );
    let partitions = env
        .memory
        .partitions(&core_traits::TableIdent::new("sales", "events"));
    assert_eq!(partitions[0].values, vec!["eu", "2024-01-01"]);
}

#[tokio::test]
async fn test_configuration_errors_stop_before_queries() {
    let env = TestEnv::new(1);

    let unknown_table = CpasRequest::builder("AwsDataCatalog", "sales", "missing", "SELECT 1")
        .partition("dt", "2024-01-01")
        .build()
        .unwrap();
    let err = env.operator.execute(&unknown_table).await.unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Configuration);

    let with_location = CpasRequest::builder("AwsDataCatalog", "sales", "missing", "SELECT 1")
        .partition("dt", "2024-01-01")
        .location("s3://lake/sales/missing/dt=2024-01-01/")
        .build()
        .unwrap();
    let err = env.operator.execute(&with_location).await.unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Configuration);

    let wrong_keys = env
        .request_builder()
        .partition("region", "eu")
        .build()
        .unwrap();
    let err = env.operator.execute(&wrong_keys).await.unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Configuration);

    assert!(env.engine.statements().is_empty());
}

#[tokio::test]
async fn test_catalog_outage_on_table_lookup() {
    let env = TestEnv::new(1);
    env.catalog.set_faults(CatalogFaults {
        get_table: true,
        ..CatalogFaults::default()
    });

    let err = env
        .operator
        .execute(&env.request(SaveMode::Overwrite))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Catalog { .. }));
    assert!(env.engine.statements().is_empty());
}

#[tokio::test]
async fn test_explicit_location_and_format() {
    let env = TestEnv::new(2);
    let request = env
        .request_builder()
        .location("s3://archive/orders/2024-01-01")
        .format(OutputFormat::Json)
        .property("ignore.malformed.json", "true")
        .build()
        .unwrap();

    let outcome = env.operator.execute(&request).await.unwrap();
    assert_eq!(outcome.location(), "s3://archive/orders/2024-01-01/");

    let create = env
        .engine
        .statements()
        .into_iter()
        .find(|s| s.starts_with("CREATE EXTERNAL"))
        .unwrap();
    assert!(create.contains("ROW FORMAT SERDE 'org.openx.data.jsonserde.JsonSerDe'"));
    assert!(create.ends_with("TBLPROPERTIES ('ignore.malformed.json'='true')"));

    let partitions = env.partitions();
    assert_eq!(
        partitions[0].storage_descriptor.location,
        "s3://archive/orders/2024-01-01/"
    );
    let archive = env.stores.bucket("archive");
    let listed = crate::objects::list_objects(archive.as_ref(), &Path::from("orders/2024-01-01"))
        .await
        .unwrap();
    assert_eq!(listed.len(), 1);
}

#[tokio::test]
async fn test_marker_folder_is_removed() {
    let env = TestEnv::new(1);
    env.bucket()
        .put(
            &Path::from("sales/orders/dt=2024-01-01/_CPAS_STAGING/leftover"),
            object_store::PutPayload::from(Bytes::from_static(b"x")),
        )
        .await
        .unwrap();

    env.operator
        .execute(&env.request(SaveMode::IgnoreSaveMode))
        .await
        .unwrap();
    let names = env.object_names().await;
    assert_eq!(names.len(), 1, "{names:?}");
    assert!(names[0].starts_with("part-"));
}

#[tokio::test(start_paused = true)]
async fn test_slow_engine_is_polled_until_done() {
    let env = TestEnv::new(1);
    env.engine.set_faults(EngineFaults {
        running_polls: 4,
        ..EngineFaults::default()
    });

    let outcome = env
        .operator
        .execute(&env.request(SaveMode::Overwrite))
        .await
        .unwrap();
    assert!(matches!(outcome, CpasOutcome::Committed { rows: 1, .. }));
}

#[tokio::test(start_paused = true)]
async fn test_stuck_engine_times_out() {
    let env = TestEnv::new(1);
    env.engine.set_faults(EngineFaults {
        running_polls: u32::MAX,
        ..EngineFaults::default()
    });

    let err = env
        .operator
        .execute(&env.request(SaveMode::Overwrite))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::QueryTimeout { .. }));
    assert!(env.staging_tables().is_empty());
}

#[tokio::test]
async fn test_operator_is_cloneable() {
    let memory = Arc::new(MemoryCatalog::new());
    let stores = Arc::new(InMemoryStoreRegistry::new());
    let engine = Arc::new(FakeQueryEngine::new(
        memory.clone(),
        stores.clone(),
        Vec::new(),
        0,
    ));
    let operator = CpasOperator::new(engine, memory, stores, test_config());
    let cloned = operator.clone();
    assert_eq!(cloned.config(), operator.config());
}
