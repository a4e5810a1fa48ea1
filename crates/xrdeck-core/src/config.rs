//! Configuration module
//!
//! Environment-driven configuration for the API server, the storage backend,
//! the product store and the archive ingestion pipeline.

use std::env;
use std::str::FromStr;

use crate::storage_types::StorageBackend;

// Common constants
const SERVER_PORT: u16 = 4000;
const DB_MAX_CONNECTIONS: u32 = 10;
const MAX_REQUEST_BODY_MB: usize = 110;
const TRUSTED_PROXY_COUNT: usize = 1;

const MAX_ARCHIVE_MB: usize = 100;
const MAX_ARCHIVE_ENTRIES: usize = 10_000;
const MAX_UNCOMPRESSED_MB: u64 = 1024;
const BATCH_SIZE: usize = 8;
const MAX_BATCH_SIZE: usize = 64;
const BATCH_DELAY_MS: u64 = 250;
const MAX_RETRIES: u32 = 3;
const RETRY_BASE_DELAY_MS: u64 = 500;
const RATE_LIMIT_MAX_REQUESTS: u32 = 10;
const RATE_LIMIT_WINDOW_SECS: u64 = 60;
const RATE_LIMIT_SWEEP_INTERVAL_SECS: u64 = 60;

/// Server-level configuration
#[derive(Clone, Debug)]
pub struct BaseConfig {
    pub server_port: u16,
    pub cors_origins: Vec<String>,
    pub environment: String,
    pub max_request_body_bytes: usize,
    pub trusted_proxy_count: usize,
    pub log_format: String,
}

/// Tunables for the archive ingestion pipeline and its rate-limit gate
#[derive(Clone, Debug, PartialEq)]
pub struct IngestSettings {
    pub max_archive_bytes: usize,
    pub max_entries: usize,
    pub max_uncompressed_bytes: u64,
    pub allow_rar: bool,
    pub batch_size: usize,
    pub batch_delay_ms: u64,
    pub max_retries: u32,
    pub retry_base_delay_ms: u64,
    pub rate_limit_max_requests: u32,
    pub rate_limit_window_secs: u64,
    pub rate_limit_sweep_interval_secs: u64,
}

impl Default for IngestSettings {
    fn default() -> Self {
        Self {
            max_archive_bytes: MAX_ARCHIVE_MB * 1024 * 1024,
            max_entries: MAX_ARCHIVE_ENTRIES,
            max_uncompressed_bytes: MAX_UNCOMPRESSED_MB * 1024 * 1024,
            allow_rar: false,
            batch_size: BATCH_SIZE,
            batch_delay_ms: BATCH_DELAY_MS,
            max_retries: MAX_RETRIES,
            retry_base_delay_ms: RETRY_BASE_DELAY_MS,
            rate_limit_max_requests: RATE_LIMIT_MAX_REQUESTS,
            rate_limit_window_secs: RATE_LIMIT_WINDOW_SECS,
            rate_limit_sweep_interval_secs: RATE_LIMIT_SWEEP_INTERVAL_SECS,
        }
    }
}

/// Full service configuration
#[derive(Clone, Debug)]
pub struct ServiceConfig {
    pub base: BaseConfig,
    // Product store configuration
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    // Storage configuration
    pub storage_backend: StorageBackend,
    pub s3_bucket: Option<String>,
    pub s3_region: Option<String>,
    pub s3_endpoint: Option<String>, // Custom endpoint for S3-compatible providers (MinIO, R2, ...)
    pub aws_region: Option<String>,
    pub local_storage_path: String,
    pub local_storage_base_url: String,
    pub ingest: IngestSettings,
}

/// Application configuration.
#[derive(Clone, Debug)]
pub struct Config(pub Box<ServiceConfig>);

/// Read an env var and parse it, falling back to `default` when unset or unparsable.
fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|s| s.trim().parse::<T>().ok())
        .unwrap_or(default)
}

fn env_bool(key: &str, default: bool) -> bool {
    env::var(key)
        .map(|s| matches!(s.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(default)
}

impl Config {
    fn inner(&self) -> &ServiceConfig {
        &self.0
    }

    pub fn from_env() -> Result<Self, anyhow::Error> {
        let config = ServiceConfig::from_env()?;
        Ok(Config(Box::new(config)))
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        self.inner().validate()
    }

    /// Check if the application is running in production mode
    pub fn is_production(&self) -> bool {
        let env = self.inner().base.environment.to_lowercase();
        env == "production" || env == "prod"
    }

    pub fn server_port(&self) -> u16 {
        self.inner().base.server_port
    }

    pub fn environment(&self) -> &str {
        &self.inner().base.environment
    }

    pub fn cors_origins(&self) -> &[String] {
        &self.inner().base.cors_origins
    }

    pub fn max_request_body_bytes(&self) -> usize {
        self.inner().base.max_request_body_bytes
    }

    pub fn trusted_proxy_count(&self) -> usize {
        self.inner().base.trusted_proxy_count
    }

    pub fn log_format(&self) -> &str {
        &self.inner().base.log_format
    }

    pub fn database_url(&self) -> Option<&str> {
        self.inner().database_url.as_deref()
    }

    pub fn db_max_connections(&self) -> u32 {
        self.inner().db_max_connections
    }

    pub fn storage_backend(&self) -> StorageBackend {
        self.inner().storage_backend
    }

    pub fn s3_bucket(&self) -> Option<&str> {
        self.inner().s3_bucket.as_deref()
    }

    pub fn s3_region(&self) -> Option<&str> {
        self.inner().s3_region.as_deref()
    }

    pub fn s3_endpoint(&self) -> Option<&str> {
        self.inner().s3_endpoint.as_deref()
    }

    pub fn aws_region(&self) -> Option<&str> {
        self.inner().aws_region.as_deref()
    }

    pub fn local_storage_path(&self) -> &str {
        &self.inner().local_storage_path
    }

    pub fn local_storage_base_url(&self) -> &str {
        &self.inner().local_storage_base_url
    }

    pub fn ingest(&self) -> &IngestSettings {
        &self.inner().ingest
    }
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        let environment = env::var("ENVIRONMENT")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string());

        let cors_origins: Vec<String> = env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "*".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let base = BaseConfig {
            server_port: env::var("PORT")
                .unwrap_or_else(|_| SERVER_PORT.to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number"))?,
            cors_origins,
            environment,
            max_request_body_bytes: env_or("MAX_REQUEST_BODY_MB", MAX_REQUEST_BODY_MB)
                * 1024
                * 1024,
            trusted_proxy_count: env_or("TRUSTED_PROXY_COUNT", TRUSTED_PROXY_COUNT),
            log_format: env::var("LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string()),
        };

        let storage_backend = match env::var("STORAGE_BACKEND") {
            Ok(value) => value.parse::<StorageBackend>()?,
            Err(_) => StorageBackend::Local,
        };

        let ingest = IngestSettings {
            max_archive_bytes: env_or("INGEST_MAX_ARCHIVE_MB", MAX_ARCHIVE_MB) * 1024 * 1024,
            max_entries: env_or("INGEST_MAX_ENTRIES", MAX_ARCHIVE_ENTRIES),
            max_uncompressed_bytes: env_or("INGEST_MAX_UNCOMPRESSED_MB", MAX_UNCOMPRESSED_MB)
                * 1024
                * 1024,
            allow_rar: env_bool("INGEST_ALLOW_RAR", false),
            batch_size: env_or("INGEST_BATCH_SIZE", BATCH_SIZE).min(MAX_BATCH_SIZE),
            batch_delay_ms: env_or("INGEST_BATCH_DELAY_MS", BATCH_DELAY_MS),
            max_retries: env_or("INGEST_MAX_RETRIES", MAX_RETRIES),
            retry_base_delay_ms: env_or("INGEST_RETRY_BASE_DELAY_MS", RETRY_BASE_DELAY_MS),
            rate_limit_max_requests: env_or(
                "INGEST_RATE_LIMIT_MAX_REQUESTS",
                RATE_LIMIT_MAX_REQUESTS,
            ),
            rate_limit_window_secs: env_or("INGEST_RATE_LIMIT_WINDOW_SECS", RATE_LIMIT_WINDOW_SECS),
            rate_limit_sweep_interval_secs: env_or(
                "RATE_LIMIT_SWEEP_INTERVAL_SECS",
                RATE_LIMIT_SWEEP_INTERVAL_SECS,
            ),
        };

        let config = ServiceConfig {
            base,
            database_url: env::var("DATABASE_URL").ok().filter(|s| !s.is_empty()),
            db_max_connections: env_or("DB_MAX_CONNECTIONS", DB_MAX_CONNECTIONS),
            storage_backend,
            s3_bucket: env::var("S3_BUCKET").ok(),
            s3_region: env::var("S3_REGION").ok(),
            s3_endpoint: env::var("S3_ENDPOINT").ok(),
            aws_region: env::var("AWS_REGION").ok(),
            local_storage_path: env::var("LOCAL_STORAGE_PATH")
                .unwrap_or_else(|_| "./data/storage".to_string()),
            local_storage_base_url: env::var("LOCAL_STORAGE_BASE_URL")
                .unwrap_or_else(|_| format!("http://localhost:{}/storage", SERVER_PORT)),
            ingest,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        let env = self.base.environment.to_lowercase();
        let is_production = env == "production" || env == "prod";
        if is_production && self.base.cors_origins.iter().any(|o| o == "*") {
            return Err(anyhow::anyhow!(
                "CORS_ORIGINS cannot be '*' in production. Please specify explicit origins."
            ));
        }

        if self.storage_backend == StorageBackend::S3 && self.s3_bucket.is_none() {
            return Err(anyhow::anyhow!("S3_BUCKET must be set when STORAGE_BACKEND=s3"));
        }

        let ingest = &self.ingest;
        if ingest.batch_size == 0 {
            return Err(anyhow::anyhow!("INGEST_BATCH_SIZE must be at least 1"));
        }
        if ingest.max_retries == 0 {
            return Err(anyhow::anyhow!("INGEST_MAX_RETRIES must be at least 1"));
        }
        if ingest.max_archive_bytes == 0 || ingest.max_entries == 0 {
            return Err(anyhow::anyhow!(
                "INGEST_MAX_ARCHIVE_MB and INGEST_MAX_ENTRIES must be greater than zero"
            ));
        }
        if ingest.rate_limit_window_secs == 0 || ingest.rate_limit_max_requests == 0 {
            return Err(anyhow::anyhow!(
                "INGEST_RATE_LIMIT_WINDOW_SECS and INGEST_RATE_LIMIT_MAX_REQUESTS must be greater than zero"
            ));
        }

        Ok(())
    }
}
