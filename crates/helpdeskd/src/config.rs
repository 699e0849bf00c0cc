//! Server configuration.
//!
//! Values come from, lowest precedence first: built-in defaults, an optional
//! TOML file, then command-line flags and environment variables (applied by
//! the binary through [`ServerConfig::with_overrides`]).

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use helpdesk_protocol::DEFAULT_MAX_FRAME_SIZE;

/// Default listen address.
pub const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:8899";

/// Default WebSocket endpoint path.
pub const DEFAULT_PATH: &str = "/customer";

/// Default broadcast buffer for console events.
pub const DEFAULT_EVENT_BUFFER: usize = 100;

/// Configuration for the helpdesk server.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    /// Address the WebSocket listener binds to.
    pub listen_addr: SocketAddr,

    /// Request path customers connect to.
    pub path: String,

    /// Sender name on operator replies.
    pub operator_name: String,

    /// Sender name on server notices.
    pub system_name: String,

    /// Prefix of each customer's display name ("Customer-C1").
    pub customer_prefix: String,

    /// Largest inbound frame accepted, in bytes.
    pub max_message_size: usize,

    /// Capacity of the console event channel.
    pub event_buffer: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([127, 0, 0, 1], 8899)),
            path: DEFAULT_PATH.to_string(),
            operator_name: "Service".to_string(),
            system_name: "System".to_string(),
            customer_prefix: "Customer".to_string(),
            max_message_size: DEFAULT_MAX_FRAME_SIZE,
            event_buffer: DEFAULT_EVENT_BUFFER,
        }
    }
}

impl ServerConfig {
    /// Loads configuration.
    ///
    /// An explicit `path` must exist. Without one, the default location is
    /// read if present and built-in defaults are used otherwise.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::from_file(path),
            None => match default_config_path() {
                Some(path) if path.exists() => Self::from_file(&path),
                _ => {
                    debug!("No config file found, using defaults");
                    Ok(Self::default())
                }
            },
        }
    }

    /// Parses a TOML configuration file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;
        let config = Self::from_toml(&text).map_err(|e| match e {
            ConfigError::Parse { error, .. } => ConfigError::Parse {
                path: path.to_path_buf(),
                error,
            },
            other => other,
        })?;
        debug!(path = %path.display(), "Loaded config file");
        Ok(config)
    }

    /// Parses configuration from TOML text.
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text).map_err(|e| ConfigError::Parse {
            path: PathBuf::new(),
            error: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Applies command-line / environment overrides.
    pub fn with_overrides(
        mut self,
        listen_addr: Option<SocketAddr>,
        path: Option<String>,
    ) -> Result<Self, ConfigError> {
        if let Some(addr) = listen_addr {
            self.listen_addr = addr;
        }
        if let Some(path) = path {
            self.path = path;
        }
        self.validate()?;
        Ok(self)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !self.path.starts_with('/') {
            return Err(ConfigError::Invalid {
                field: "path",
                reason: format!("'{}' must start with '/'", self.path),
            });
        }
        if self.max_message_size == 0 {
            return Err(ConfigError::Invalid {
                field: "max_message_size",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.event_buffer == 0 {
            return Err(ConfigError::Invalid {
                field: "event_buffer",
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}

/// Returns the default config file location (`<config dir>/helpdesk/config.toml`).
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("helpdesk").join("config.toml"))
}

/// Errors that can occur while loading configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {error}")]
    Read { path: PathBuf, error: String },

    #[error("Failed to parse config {path}: {error}")]
    Parse { path: PathBuf, error: String },

    #[error("Invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}
