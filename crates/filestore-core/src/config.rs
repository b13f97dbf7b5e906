//! Configuration module
//!
//! Environment-driven configuration for the filestore service. Loaded once
//! at startup and immutable thereafter; everything downstream reads it
//! through getters.

use std::env;
use std::str::FromStr;

use crate::backend::StorageBackend;

const SERVER_PORT: u16 = 3000;
const CONVERSION_TIMEOUT_SECS: u64 = 10;
const KILL_SIGNAL: &str = "SIGTERM";

/// Filestore service configuration
#[derive(Clone, Debug)]
pub struct FilestoreConfig {
    pub server_port: u16,
    pub environment: String,
    // Storage configuration
    pub storage_backend: StorageBackend,
    pub local_storage_path: Option<String>,
    pub staging_path: Option<String>,
    pub s3_region: Option<String>,
    pub s3_endpoint: Option<String>,
    pub aws_region: Option<String>,
    // Conversion configuration
    pub conversions_enabled: bool,
    pub convert_command_prefix: Vec<String>,
    pub conversion_timeout_secs: u64,
    pub conversion_kill_signal: String,
    pub optimise_pngs: bool,
}

/// Application configuration
#[derive(Clone, Debug)]
pub struct Config(pub Box<FilestoreConfig>);

impl Config {
    fn inner(&self) -> &FilestoreConfig {
        &self.0
    }

    pub fn from_env() -> Result<Self, anyhow::Error> {
        let config = FilestoreConfig::from_env()?;
        Ok(Config(Box::new(config)))
    }

    /// Check if the application is running in production mode
    pub fn is_production(&self) -> bool {
        let env = self.inner().environment.to_lowercase();
        env == "production" || env == "prod"
    }

    pub fn server_port(&self) -> u16 {
        self.inner().server_port
    }

    pub fn environment(&self) -> &str {
        &self.inner().environment
    }

    pub fn storage_backend(&self) -> StorageBackend {
        self.inner().storage_backend
    }

    pub fn local_storage_path(&self) -> Option<&str> {
        self.inner().local_storage_path.as_deref()
    }

    /// Directory for temp-file staging. Falls back to the OS temp dir.
    pub fn staging_path(&self) -> Option<&str> {
        self.inner().staging_path.as_deref()
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

    pub fn conversions_enabled(&self) -> bool {
        self.inner().conversions_enabled
    }

    pub fn convert_command_prefix(&self) -> &[String] {
        &self.inner().convert_command_prefix
    }

    pub fn conversion_timeout_secs(&self) -> u64 {
        self.inner().conversion_timeout_secs
    }

    pub fn conversion_kill_signal(&self) -> &str {
        &self.inner().conversion_kill_signal
    }

    pub fn optimise_pngs(&self) -> bool {
        self.inner().optimise_pngs
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        self.inner().validate()
    }
}

impl FilestoreConfig {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        let environment = env::var("ENVIRONMENT")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string());

        let storage_backend = match env::var("STORAGE_BACKEND") {
            Ok(value) => StorageBackend::from_str(&value)?,
            Err(_) => StorageBackend::Fs,
        };

        // Argv prefix prepended to every conversion command, e.g. "nice"
        // or "nice,-n,10". Empty means none.
        let convert_command_prefix: Vec<String> = env::var("CONVERT_COMMAND_PREFIX")
            .unwrap_or_default()
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let config = FilestoreConfig {
            server_port: env::var("PORT")
                .unwrap_or_else(|_| SERVER_PORT.to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number"))?,
            environment,
            storage_backend,
            local_storage_path: env::var("LOCAL_STORAGE_PATH").ok(),
            staging_path: env::var("STAGING_PATH").ok(),
            s3_region: env::var("S3_REGION").ok(),
            s3_endpoint: env::var("S3_ENDPOINT").ok(),
            aws_region: env::var("AWS_REGION").ok(),
            conversions_enabled: env::var("CONVERSIONS_ENABLED")
                .unwrap_or_else(|_| "true".to_string())
                .to_lowercase()
                .parse()
                .unwrap_or(true),
            convert_command_prefix,
            conversion_timeout_secs: env::var("CONVERSION_TIMEOUT_SECS")
                .unwrap_or_else(|_| CONVERSION_TIMEOUT_SECS.to_string())
                .parse()
                .unwrap_or(CONVERSION_TIMEOUT_SECS),
            conversion_kill_signal: env::var("CONVERSION_KILL_SIGNAL")
                .unwrap_or_else(|_| KILL_SIGNAL.to_string()),
            optimise_pngs: env::var("OPTIMISE_PNGS")
                .unwrap_or_else(|_| "true".to_string())
                .to_lowercase()
                .parse()
                .unwrap_or(true),
        };

        config.validate()?;

        Ok(config)
    }

    /// Fail fast on configuration that can never work at runtime.
    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.storage_backend == StorageBackend::Fs && self.local_storage_path.is_none() {
            return Err(anyhow::anyhow!(
                "LOCAL_STORAGE_PATH must be set when STORAGE_BACKEND is fs"
            ));
        }

        if self.storage_backend == StorageBackend::S3
            && self.s3_region.is_none()
            && self.aws_region.is_none()
        {
            return Err(anyhow::anyhow!(
                "S3_REGION or AWS_REGION must be set when STORAGE_BACKEND is s3"
            ));
        }

        if self.conversion_timeout_secs == 0 {
            return Err(anyhow::anyhow!("CONVERSION_TIMEOUT_SECS must be non-zero"));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> FilestoreConfig {
        FilestoreConfig {
            server_port: 3000,
            environment: "test".to_string(),
            storage_backend: StorageBackend::Fs,
            local_storage_path: Some("/tmp/filestore".to_string()),
            staging_path: None,
            s3_region: None,
            s3_endpoint: None,
            aws_region: None,
            conversions_enabled: true,
            convert_command_prefix: vec![],
            conversion_timeout_secs: 10,
            conversion_kill_signal: "SIGTERM".to_string(),
            optimise_pngs: true,
        }
    }

    #[test]
    fn validates_fs_backend_requires_path() {
        let mut config = base_config();
        config.local_storage_path = None;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validates_s3_backend_requires_region() {
        let mut config = base_config();
        config.storage_backend = StorageBackend::S3;
        assert!(config.validate().is_err());

        config.s3_region = Some("us-east-1".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validates_zero_timeout_rejected() {
        let mut config = base_config();
        config.conversion_timeout_secs = 0;
        assert!(config.validate().is_err());
    }
}
