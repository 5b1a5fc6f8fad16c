use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    /// Maximum upload size in bytes
    pub max_upload_size: u64,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_address: String,
}

#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Directory holding the manifest and every stored blob
    pub root: PathBuf,
    /// Staging directory for multipart uploads. Keep it on the same
    /// filesystem as `root` so installs are a plain rename.
    pub upload_dir: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:3000".to_string(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        let root = PathBuf::from("./files");
        Self {
            upload_dir: root.join(".uploads"),
            root,
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        let bind_address =
            std::env::var("BIND_ADDRESS").unwrap_or_else(|_| ServerConfig::default().bind_address);

        let storage = match std::env::var("STORAGE_DIR") {
            Ok(dir) => {
                let root = PathBuf::from(dir);
                StorageConfig {
                    upload_dir: root.join(".uploads"),
                    root,
                }
            }
            Err(_) => StorageConfig::default(),
        };
        let storage = match std::env::var("UPLOAD_DIR") {
            Ok(dir) => StorageConfig {
                upload_dir: PathBuf::from(dir),
                ..storage
            },
            Err(_) => storage,
        };

        let max_upload_size = match std::env::var("MAX_UPLOAD_SIZE") {
            Ok(raw) => raw.trim().parse().map_err(|_| {
                ConfigError::ValidationError(format!(
                    "MAX_UPLOAD_SIZE must be a byte count, got '{raw}'"
                ))
            })?,
            Err(_) => 50 * 1024 * 1024, // 50MB
        };

        let config = Config {
            server: ServerConfig { bind_address },
            storage,
            max_upload_size,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.storage.root.as_os_str().is_empty() {
            return Err(ConfigError::ValidationError(
                "STORAGE_DIR cannot be empty".to_string(),
            ));
        }

        if self.max_upload_size == 0 {
            return Err(ConfigError::ValidationError(
                "MAX_UPLOAD_SIZE must be greater than 0".to_string(),
            ));
        }

        if self.storage.upload_dir.parent() != Some(self.storage.root.as_path()) {
            tracing::warn!(
                upload_dir = %self.storage.upload_dir.display(),
                "UPLOAD_DIR is outside STORAGE_DIR; installs may fall back to copying"
            );
        }

        Ok(())
    }
}
