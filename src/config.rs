use std::str::FromStr;

use crate::error::AppError;

const DEFAULT_REGION: &str = "ap-northeast-2";
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

#[derive(Clone)]
pub struct Config {
    pub server_host: String,
    pub server_port: u16,
    pub database: DatabaseConfig,
    pub session_expiry_hours: i64,
    pub request_timeout_secs: u64,
    pub storage: StorageConfig,
    pub inference: InferenceConfig,
    pub chat: ChatConfig,
    pub upload_max_bytes: usize,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
}

/// Object-store settings handed explicitly to the codec, signer and object store.
#[derive(Clone, Debug)]
pub struct StorageConfig {
    pub bucket: String,
    pub region: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
    /// Host the bucket name is prefixed onto, e.g. `s3.ap-northeast-2.amazonaws.com`.
    pub endpoint_host: String,
    pub presign_ttl_secs: u64,
    /// Applies to object-store PUTs only; inference has its own timeout.
    pub upload_timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct InferenceConfig {
    pub base_url: String,
    pub timeout_secs: u64,
    pub generation: GenerationParams,
}

#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct GenerationParams {
    pub max_tokens: u32,
    pub temperature: f32,
    pub top_p: f32,
    pub repetition_penalty: f32,
    pub k_internal: u32,
    pub k_external: u32,
    pub cap_internal: u32,
    pub cap_external: u32,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            max_tokens: 1024,
            temperature: 0.7,
            top_p: 0.9,
            repetition_penalty: 1.05,
            k_internal: 6,
            k_external: 0,
            cap_internal: 1200,
            cap_external: 1500,
        }
    }
}

#[derive(Clone, Debug)]
pub struct ChatConfig {
    /// Prior messages sent to the model per turn.
    pub history_window: i64,
    /// Messages returned by the history endpoint.
    pub display_window: i64,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            history_window: 10,
            display_window: 50,
        }
    }
}

impl StorageConfig {
    pub fn new(bucket: impl Into<String>, region: impl Into<String>) -> Self {
        let region = region.into();
        Self {
            bucket: bucket.into(),
            endpoint_host: format!("s3.{}.amazonaws.com", region),
            region,
            access_key_id: String::new(),
            secret_access_key: String::new(),
            session_token: None,
            presign_ttl_secs: 3600,
            upload_timeout_secs: 60,
        }
    }

    pub fn with_credentials(
        mut self,
        access_key_id: impl Into<String>,
        secret_access_key: impl Into<String>,
    ) -> Self {
        self.access_key_id = access_key_id.into();
        self.secret_access_key = secret_access_key.into();
        self
    }

    pub fn from_env() -> Result<Self, AppError> {
        let bucket = env_first(&["AWS_S3_BUCKET", "AWS_STORAGE_BUCKET_NAME"])
            .ok_or_else(|| AppError::Config("AWS_S3_BUCKET is not set".to_string()))?;
        let region = env_first(&["AWS_S3_REGION_NAME", "AWS_REGION"])
            .unwrap_or_else(|| DEFAULT_REGION.to_string());

        let mut config = StorageConfig::new(bucket, region).with_credentials(
            std::env::var("AWS_ACCESS_KEY_ID").unwrap_or_default(),
            std::env::var("AWS_SECRET_ACCESS_KEY").unwrap_or_default(),
        );
        config.session_token = std::env::var("AWS_SESSION_TOKEN").ok().filter(|t| !t.is_empty());
        if let Some(host) = env_first(&["AWS_S3_ENDPOINT_HOST"]) {
            config.endpoint_host = host;
        }
        config.presign_ttl_secs = parse_env("AWS_PRESIGN_TTL_SECS", 3600)?;
        config.upload_timeout_secs = parse_env("AWS_S3_UPLOAD_TIMEOUT", 60)?;
        Ok(config)
    }
}

impl DatabaseConfig {
    pub fn from_env() -> Result<Self, AppError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        Ok(DatabaseConfig {
            url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite://pdf_chat.db".to_string()),
            max_connections: parse_env("DB_MAX_CONNECTIONS", 20)?,
            min_connections: parse_env("DB_MIN_CONNECTIONS", 1)?,
        })
    }
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        let database = DatabaseConfig::from_env()?;

        let base_url = std::env::var("RUNPOD_API_BASE")
            .map(|url| url.trim_end_matches('/').to_string())
            .ok()
            .filter(|url| !url.is_empty())
            .ok_or_else(|| AppError::Config("RUNPOD_API_BASE is not set".to_string()))?;

        Ok(Config {
            server_host: std::env::var("SERVER_HOST")
                .unwrap_or_else(|_| "127.0.0.1".to_string()),
            server_port: parse_env("SERVER_PORT", 8080)?,
            database,
            session_expiry_hours: parse_env("SESSION_EXPIRY_HOURS", 24)?,
            request_timeout_secs: parse_env("REQUEST_TIMEOUT_SECS", 180)?,
            storage: StorageConfig::from_env()?,
            inference: InferenceConfig {
                base_url,
                timeout_secs: parse_env("RUNPOD_TIMEOUT", 120)?,
                generation: GenerationParams::default(),
            },
            chat: ChatConfig {
                history_window: at_least_one(
                    "CHAT_HISTORY_WINDOW",
                    parse_env("CHAT_HISTORY_WINDOW", 10)?,
                )?,
                display_window: at_least_one(
                    "CHAT_DISPLAY_WINDOW",
                    parse_env("CHAT_DISPLAY_WINDOW", 50)?,
                )?,
            },
            upload_max_bytes: parse_env("UPLOAD_MAX_BYTES", DEFAULT_MAX_UPLOAD_BYTES)?,
        })
    }

    pub fn server_address(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }
}

fn env_first(names: &[&str]) -> Option<String> {
    names
        .iter()
        .filter_map(|name| std::env::var(name).ok())
        .find(|value| !value.trim().is_empty())
}

fn parse_env<T>(name: &str, default: T) -> Result<T, AppError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|e| AppError::Config(format!("Invalid {}: {}", name, e))),
        _ => Ok(default),
    }
}

fn at_least_one(name: &str, value: i64) -> Result<i64, AppError> {
    if value < 1 {
        return Err(AppError::Config(format!(
            "{} must be at least 1, got {}",
            name, value
        )));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_config_derives_regional_endpoint() {
        let config = StorageConfig::new("bucket", "us-west-2");
        assert_eq!(config.endpoint_host, "s3.us-west-2.amazonaws.com");
        assert_eq!(config.presign_ttl_secs, 3600);
        assert_eq!(config.upload_timeout_secs, 60);
    }

    #[test]
    fn generation_defaults() {
        let params = GenerationParams::default();
        assert_eq!(params.max_tokens, 1024);
        assert_eq!(params.k_internal, 6);
        assert_eq!(params.k_external, 0);
    }

    #[test]
    fn chat_windows_must_be_positive() {
        assert_eq!(at_least_one("CHAT_HISTORY_WINDOW", 1).unwrap(), 1);
        assert_eq!(at_least_one("CHAT_DISPLAY_WINDOW", 50).unwrap(), 50);
        for bad in [0, -5] {
            let err = at_least_one("CHAT_HISTORY_WINDOW", bad).unwrap_err();
            assert!(matches!(err, AppError::Config(ref m) if m.contains("CHAT_HISTORY_WINDOW")));
        }
    }
}
