use crate::errors::AppError;
use crate::jwks::KeySource;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_SIGNED_URL_EXPIRATION_SECS: u64 = 300;

#[derive(Debug, Clone)]
pub struct Config {
    pub todos_table: String,
    pub index_name: String,
    pub attachments_bucket: String,
    pub storage_host: String,
    pub signed_url_expiration: Duration,
    pub environment: String,
    pub aws_region: String,
    /// ローカル実行用（DynamoDB Local など）
    pub dynamodb_endpoint: Option<String>,
    pub s3_endpoint: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AppError> {
        let or_default =
            |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let signed_url_expiration = match lookup("SIGNED_URL_EXPIRATION") {
            Some(value) => parse_seconds("SIGNED_URL_EXPIRATION", &value)?,
            None => Duration::from_secs(DEFAULT_SIGNED_URL_EXPIRATION_SECS),
        };

        Ok(Config {
            todos_table: or_default("TODOS_TABLE", "todos-dev"),
            index_name: or_default("INDEX_NAME", "UserIdIndex"),
            attachments_bucket: or_default("TODOS_S3_BUCKET", "todos-attachments-dev"),
            storage_host: or_default("S3_STORAGE_HOST", "s3.amazonaws.com"),
            signed_url_expiration,
            environment: or_default("ENVIRONMENT", "dev"),
            aws_region: or_default("AWS_REGION", "us-east-1"),
            dynamodb_endpoint: lookup("DYNAMODB_ENDPOINT").filter(|v| !v.is_empty()),
            s3_endpoint: lookup("S3_ENDPOINT").filter(|v| !v.is_empty()),
        })
    }
}

/// オーソライザーの設定
#[derive(Debug, Clone, Default)]
pub struct AuthConfig {
    pub key_source: Option<KeySource>,
    pub reload_interval: Option<Duration>,
    pub audience: Option<String>,
    pub issuer: Option<String>,
}

impl AuthConfig {
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AppError> {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let key_source = match (non_empty("AUTH_JWKS"), non_empty("AUTH_JWKS_PATH")) {
            (Some(_), Some(_)) => {
                return Err(AppError::Configuration(
                    "AUTH_JWKS と AUTH_JWKS_PATH は同時に指定できません".to_string(),
                ))
            }
            (Some(json), None) => Some(KeySource::Inline(json)),
            (None, Some(path)) => Some(KeySource::File(PathBuf::from(path))),
            (None, None) => None,
        };

        let reload_interval = non_empty("AUTH_JWKS_RELOAD_SECS")
            .map(|value| parse_seconds("AUTH_JWKS_RELOAD_SECS", &value))
            .transpose()?;

        Ok(AuthConfig {
            key_source,
            reload_interval,
            audience: non_empty("AUTH_AUDIENCE"),
            issuer: non_empty("AUTH_ISSUER"),
        })
    }
}

fn parse_seconds(key: &str, value: &str) -> Result<Duration, AppError> {
    match value.trim().parse::<u64>() {
        Ok(secs) if secs > 0 => Ok(Duration::from_secs(secs)),
        _ => Err(AppError::Configuration(format!(
            "{key} は正の整数で指定してください: {value}"
        ))),
    }
}
