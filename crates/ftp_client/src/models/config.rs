use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::{FtpClientError, FtpClientResult};

/// Server used when neither the configuration nor the request names one
pub const DEFAULT_SERVER: &str = "ftp.datasus.gov.br";

pub const ENV_SERVER: &str = "FTP_GET_SERVER";
pub const ENV_PORT: &str = "FTP_GET_PORT";
pub const ENV_USER: &str = "FTP_GET_USER";
pub const ENV_PASSWORD: &str = "FTP_GET_PASSWORD";

/// Client configuration for customizing connection and transfer behavior
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Default FTP host for requests that do not name one
    pub server: String,
    /// Control connection port
    pub port: u16,
    /// Login user (DATASUS allows anonymous access)
    pub username: String,
    /// Login password
    pub password: String,
    /// Whether percentage updates are sent to the progress sink
    pub progress_enabled: bool,
    /// Read buffer size for streaming downloads (in bytes)
    pub buffer_size: usize,
    /// Upper bound for establishing the control connection
    pub connect_timeout_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server: DEFAULT_SERVER.to_string(),
            port: 21,
            username: "anonymous".to_string(),
            password: "anonymous".to_string(),
            progress_enabled: true,
            buffer_size: 8192,
            connect_timeout_secs: 30,
        }
    }
}

impl ClientConfig {
    /// Default configuration pointing at another server
    pub fn with_server(server: impl Into<String>) -> Self {
        Self {
            server: server.into(),
            ..Self::default()
        }
    }

    /// Parse a configuration from JSON; missing keys keep their defaults
    pub fn from_json(json: &str) -> FtpClientResult<Self> {
        serde_json::from_str(json)
            .map_err(|e| FtpClientError::Config(format!("invalid configuration JSON: {}", e)))
    }

    /// Read a JSON configuration file
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> FtpClientResult<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            FtpClientError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_json(&contents)
    }

    /// Defaults, then the optional JSON file, then `FTP_GET_*` environment variables
    pub fn load(path: Option<&Path>) -> FtpClientResult<Self> {
        let config = match path {
            Some(path) => Self::from_json_file(path)?,
            None => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides looked up by environment variable name
    pub fn apply_overrides<F>(mut self, lookup: F) -> FtpClientResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(server) = lookup(ENV_SERVER) {
            self.server = server;
        }
        if let Some(port) = lookup(ENV_PORT) {
            self.port = port.trim().parse().map_err(|_| {
                FtpClientError::Config(format!("{} is not a valid port: {:?}", ENV_PORT, port))
            })?;
        }
        if let Some(username) = lookup(ENV_USER) {
            self.username = username;
        }
        if let Some(password) = lookup(ENV_PASSWORD) {
            self.password = password;
        }
        Ok(self)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}
