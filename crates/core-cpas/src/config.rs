use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize};
use snafu::ensure;
use validator::Validate;

use crate::error::{ConfigurationSnafu, Result};
use crate::sql;

/// Bounded exponential backoff: delays start at `initial_delay_ms`, grow by
/// `multiplier` up to `max_delay_ms`, and polling stops after `max_attempts`
/// polls or `timeout_ms` overall, whichever comes first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "kebab-case")]
pub struct PollPolicy {
    #[validate(range(min = 1))]
    pub initial_delay_ms: u64,
    #[validate(range(min = 1))]
    pub max_delay_ms: u64,
    #[validate(range(min = 1))]
    pub multiplier: u32,
    #[validate(range(min = 1))]
    pub max_attempts: u32,
    #[validate(range(min = 1))]
    pub timeout_ms: u64,
}

impl PollPolicy {
    /// Budget for a single engine statement.
    #[must_use]
    pub const fn query_default() -> Self {
        Self {
            initial_delay_ms: 200,
            max_delay_ms: 5_000,
            multiplier: 2,
            max_attempts: 1_000,
            timeout_ms: 60 * 60 * 1_000,
        }
    }

    /// Budget for freshly written objects to show up in listings.
    #[must_use]
    pub const fn visibility_default() -> Self {
        Self {
            initial_delay_ms: 500,
            max_delay_ms: 10_000,
            multiplier: 2,
            max_attempts: 12,
            timeout_ms: 2 * 60 * 1_000,
        }
    }

    #[must_use]
    pub const fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }

    #[must_use]
    pub const fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }

    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// A policy as written in YAML; missing fields fall back to the defaults of
/// the policy it configures.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
struct PollPolicyOverrides {
    initial_delay_ms: Option<u64>,
    max_delay_ms: Option<u64>,
    multiplier: Option<u32>,
    max_attempts: Option<u32>,
    timeout_ms: Option<u64>,
}

impl PollPolicyOverrides {
    fn apply(self, base: PollPolicy) -> PollPolicy {
        PollPolicy {
            initial_delay_ms: self.initial_delay_ms.unwrap_or(base.initial_delay_ms),
            max_delay_ms: self.max_delay_ms.unwrap_or(base.max_delay_ms),
            multiplier: self.multiplier.unwrap_or(base.multiplier),
            max_attempts: self.max_attempts.unwrap_or(base.max_attempts),
            timeout_ms: self.timeout_ms.unwrap_or(base.timeout_ms),
        }
    }
}

fn query_poll<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<PollPolicy, D::Error> {
    PollPolicyOverrides::deserialize(deserializer).map(|o| o.apply(PollPolicy::query_default()))
}

fn visibility_poll<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<PollPolicy, D::Error> {
    PollPolicyOverrides::deserialize(deserializer)
        .map(|o| o.apply(PollPolicy::visibility_default()))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(default, rename_all = "kebab-case")]
pub struct EngineConfig {
    #[validate(nested)]
    #[serde(deserialize_with = "query_poll")]
    pub query_poll: PollPolicy,
    #[validate(nested)]
    #[serde(deserialize_with = "visibility_poll")]
    pub visibility_poll: PollPolicy,
    /// Zero-byte object written under the target prefix before staging.
    #[validate(length(min = 1))]
    pub marker_name: String,
    /// Leading part of generated staging table names.
    #[validate(length(min = 1))]
    pub staging_prefix: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            query_poll: PollPolicy::query_default(),
            visibility_poll: PollPolicy::visibility_default(),
            marker_name: "_CPAS_STAGING".to_string(),
            staging_prefix: "cpas_staging".to_string(),
        }
    }
}

impl EngineConfig {
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml).map_err(|e| {
            ConfigurationSnafu {
                reason: format!("Failed to parse engine config: {e}"),
            }
            .build()
        })?;
        config.check()?;
        Ok(config)
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            ConfigurationSnafu {
                reason: format!("Failed to read engine config {}: {e}", path.display()),
            }
            .build()
        })?;
        Self::from_yaml_str(&content)
    }

    pub fn check(&self) -> Result<()> {
        self.validate()
            .map_err(|e| e.to_string())
            .map_err(|reason| ConfigurationSnafu { reason }.build())?;
        sql::validate_identifier("staging prefix", &self.staging_prefix)?;
        ensure!(
            !self.marker_name.contains('/') && !self.marker_name.contains(char::is_control),
            ConfigurationSnafu {
                reason: format!("Invalid marker name {:?}", self.marker_name),
            }
        );
        Ok(())
    }
}
