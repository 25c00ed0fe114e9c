use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// What to fetch and where to put it.
///
/// Fields:
/// - `file`: remote file name.
/// - `dir`: remote directory; empty means the server root.
/// - `destination`: local path; defaults to `file` in the current directory.
/// - `server`: host; defaults to the client's configured server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferRequest {
    pub file: String,
    #[serde(default)]
    pub dir: String,
    #[serde(default)]
    pub destination: Option<PathBuf>,
    #[serde(default)]
    pub server: Option<String>,
}

impl TransferRequest {
    pub fn new(file: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            dir: String::new(),
            destination: None,
            server: None,
        }
    }

    pub fn in_dir(mut self, dir: impl Into<String>) -> Self {
        self.dir = dir.into();
        self
    }

    pub fn save_to(mut self, destination: impl Into<PathBuf>) -> Self {
        self.destination = Some(destination.into());
        self
    }

    pub fn on_server(mut self, server: impl Into<String>) -> Self {
        self.server = Some(server.into());
        self
    }

    /// Full path of the file on the server
    pub fn remote_path(&self) -> String {
        if self.dir.is_empty() {
            self.file.clone()
        } else if self.dir.ends_with('/') {
            format!("{}{}", self.dir, self.file)
        } else {
            format!("{}/{}", self.dir, self.file)
        }
    }

    /// Local path the download is written to
    pub fn destination(&self) -> PathBuf {
        self.destination
            .clone()
            .unwrap_or_else(|| PathBuf::from(&self.file))
    }

    /// Host for this request, falling back to `default_server`
    pub fn server_or<'a>(&'a self, default_server: &'a str) -> &'a str {
        self.server.as_deref().unwrap_or(default_server)
    }
}
