use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError, ValidationErrors};

#[derive(Validate, Serialize, Deserialize, Debug, PartialEq, Eq, Clone)]
#[serde(rename_all = "kebab-case")]
pub struct AwsAccessKeyCredentials {
    #[validate(length(min = 1))]
    pub aws_access_key_id: String,
    #[validate(length(min = 1))]
    pub aws_secret_access_key: String,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone)]
#[serde(tag = "credential_type", rename_all = "kebab-case")]
pub enum AwsCredentials {
    #[serde(rename = "access_key")]
    AccessKey(AwsAccessKeyCredentials),
    #[serde(rename = "token")]
    Token { token: String },
}

impl Validate for AwsCredentials {
    fn validate(&self) -> Result<(), ValidationErrors> {
        match self {
            Self::AccessKey(creds) => creds.validate(),
            Self::Token { token } => {
                if token.is_empty() {
                    let mut errors = ValidationErrors::new();
                    errors.add("token", ValidationError::new("Token must not be empty"));
                    return Err(errors);
                }
                Ok(())
            }
        }
    }
}

/// Connection settings shared by every bucket an S3 registry serves.
/// Unset fields fall back to the environment (`AWS_*` variables).
#[derive(Validate, Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub struct S3Config {
    #[validate(length(min = 1))]
    pub region: Option<String>,
    #[validate(length(min = 1))]
    pub endpoint: Option<String>,
    pub skip_signature: Option<bool>,
    #[validate(nested)]
    pub credentials: Option<AwsCredentials>,
}

pub(crate) fn validate_bucket_name(bucket_name: &str) -> Result<(), ValidationError> {
    if bucket_name.is_empty()
        || !bucket_name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
    {
        return Err(ValidationError::new(
            "Bucket name must only contain alphanumeric characters, dots, hyphens, or underscores",
        ));
    }
    if bucket_name.starts_with(['-', '_', '.']) || bucket_name.ends_with(['-', '_', '.']) {
        return Err(ValidationError::new(
            "Bucket name must not start or end with a dot, hyphen or underscore",
        ));
    }
    Ok(())
}
