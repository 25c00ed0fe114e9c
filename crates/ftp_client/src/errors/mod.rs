use thiserror::Error;

use crate::models::client::ConnectionState;
use crate::models::transport::TransportError;

/// Centralized error type for the ftp client crate
#[derive(Error, Debug)]
pub enum FtpClientError {
    #[error("Connection error with {host}: {source}")]
    Connection {
        host: String,
        #[source]
        source: TransportError,
    },

    #[error("SIZE rejected for {path}: {source}")]
    RemoteQuery {
        path: String,
        #[source]
        source: TransportError,
    },

    #[error("RETR rejected for {path}: {source}")]
    Retrieve {
        path: String,
        #[source]
        source: TransportError,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Cannot {operation} while the connection is {state}")]
    IllegalState {
        state: ConnectionState,
        operation: &'static str,
    },

    #[error("Transfer cancelled")]
    Cancelled,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid CNES period: {0}")]
    InvalidPeriod(String),
}

/// Alias for fallible operations in the ftp client crate
pub type FtpClientResult<T> = Result<T, FtpClientError>;
