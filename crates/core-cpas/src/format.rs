use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigurationSnafu, Result};

const TEXT_INPUT_FORMAT: &str = "org.apache.hadoop.mapred.TextInputFormat";
const TEXT_OUTPUT_FORMAT: &str = "org.apache.hadoop.hive.ql.io.HiveIgnoreKeyTextOutputFormat";

/// Storage format of the staged partition data.
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
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum OutputFormat {
    #[default]
    Parquet,
    Orc,
    Json,
    Textfile,
}

/// Hive serialization classes used in `CREATE EXTERNAL TABLE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SerdeDriver {
    pub serde_library: &'static str,
    pub input_format: &'static str,
    pub output_format: &'static str,
}

impl OutputFormat {
    pub fn parse(value: &str) -> Result<Self> {
        Self::from_str(value.trim()).map_err(|_| {
            ConfigurationSnafu {
                reason: format!("Unsupported output format: {value}"),
            }
            .build()
        })
    }

    #[must_use]
    pub const fn driver(self) -> SerdeDriver {
        match self {
            Self::Parquet => SerdeDriver {
                serde_library: "org.apache.hadoop.hive.ql.io.parquet.serde.ParquetHiveSerDe",
                input_format: "org.apache.hadoop.hive.ql.io.parquet.MapredParquetInputFormat",
                output_format: "org.apache.hadoop.hive.ql.io.parquet.MapredParquetOutputFormat",
            },
            Self::Orc => SerdeDriver {
                serde_library: "org.apache.hadoop.hive.ql.io.orc.OrcSerde",
                input_format: "org.apache.hadoop.hive.ql.io.orc.OrcInputFormat",
                output_format: "org.apache.hadoop.hive.ql.io.orc.OrcOutputFormat",
            },
            Self::Json => SerdeDriver {
                serde_library: "org.openx.data.jsonserde.JsonSerDe",
                input_format: TEXT_INPUT_FORMAT,
                output_format: TEXT_OUTPUT_FORMAT,
            },
            Self::Textfile => SerdeDriver {
                serde_library: "org.apache.hadoop.hive.serde2.lazy.LazySimpleSerDe",
                input_format: TEXT_INPUT_FORMAT,
                output_format: TEXT_OUTPUT_FORMAT,
            },
        }
    }
}
