//! Configuration management for RAX upload server
//!
//! Values come from an optional `config.toml` layered under `RAX_UPLOAD__*`
//! environment variables. Defaults reproduce the stock deployment: port 3000,
//! images in `./uploads`, data files in `./archivos`.

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::PathBuf;

use crate::storage::{Category, CategoryPolicy};

/// Environment variable that points at an alternative config file
pub const CONFIG_PATH_ENV: &str = "RAX_UPLOAD_CONFIG";

const DEFAULT_CONFIG_PATH: &str = "config";
const ENV_PREFIX: &str = "RAX_UPLOAD";

/// Complete server configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// IP address the HTTP listener binds to
    pub bind_address: String,

    /// Port for the HTTP listener
    pub port: u16,

    /// Host advertised in upload response URLs
    pub public_host: String,

    /// Image storage settings
    pub image: CategoryConfig,

    /// Tabular data (xlsx/xls/csv) storage settings
    pub tabular: CategoryConfig,
}

/// Storage settings for one category
#[derive(Debug, Deserialize, Clone)]
pub struct CategoryConfig {
    /// Directory the category's files live in
    pub directory: String,

    /// Per-file size ceiling in MB
    pub max_file_size_mb: u64,
}

impl ServerConfig {
    /// Load configuration from `config.toml` (or `$RAX_UPLOAD_CONFIG`) with environment overrides
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());

        let settings = Self::builder_with_defaults()?
            .add_source(File::with_name(&path).required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: ServerConfig = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    fn builder_with_defaults()
    -> Result<config::ConfigBuilder<config::builder::DefaultState>, ConfigError> {
        Config::builder()
            .set_default("bind_address", "0.0.0.0")?
            .set_default("port", 3000_i64)?
            .set_default("public_host", "localhost")?
            .set_default("image.directory", "./uploads")?
            .set_default("image.max_file_size_mb", 5_i64)?
            .set_default("tabular.directory", "./archivos")?
            .set_default("tabular.max_file_size_mb", 10_i64)
    }

    /// Validation for all configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.port == 0 {
            return Err(ConfigError::Message("port cannot be 0".into()));
        }

        if self.public_host.trim().is_empty() {
            return Err(ConfigError::Message("public_host cannot be empty".into()));
        }

        for (name, category) in [("image", &self.image), ("tabular", &self.tabular)] {
            if category.directory.trim().is_empty() {
                return Err(ConfigError::Message(format!(
                    "{name}.directory cannot be empty"
                )));
            }
            if category.max_file_size_mb == 0 {
                return Err(ConfigError::Message(format!(
                    "{name}.max_file_size_mb must be greater than 0"
                )));
            }
        }

        if self.image.directory_path() == self.tabular.directory_path() {
            return Err(ConfigError::Message(
                "image.directory and tabular.directory must differ".into(),
            ));
        }

        Ok(())
    }

    /// Get bind address and port as socket address
    pub fn listen_socket(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }

    /// Base URL written into upload responses, e.g. `http://localhost:3000`
    pub fn public_base_url(&self) -> String {
        format!("http://{}:{}", self.public_host, self.port)
    }

    /// Build the storage policy for a category
    pub fn policy(&self, category: Category) -> CategoryPolicy {
        match category {
            Category::Image => {
                CategoryPolicy::image(self.image.directory_path(), self.image.max_file_size_bytes())
            }
            Category::TabularData => CategoryPolicy::tabular(
                self.tabular.directory_path(),
                self.tabular.max_file_size_bytes(),
            ),
        }
    }
}

impl CategoryConfig {
    pub fn directory_path(&self) -> PathBuf {
        PathBuf::from(&self.directory)
    }

    /// Get maximum file size in bytes
    pub fn max_file_size_bytes(&self) -> u64 {
        self.max_file_size_mb * 1024 * 1024
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: 3000,
            public_host: "localhost".to_string(),
            image: CategoryConfig {
                directory: "./uploads".to_string(),
                max_file_size_mb: 5,
            },
            tabular: CategoryConfig {
                directory: "./archivos".to_string(),
                max_file_size_mb: 10,
            },
        }
    }
}
