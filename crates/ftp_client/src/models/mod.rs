pub mod client;
pub mod cnes;
pub mod config;
pub mod progress;
pub mod request;
pub mod transport;

pub use client::{ConnectionState, FtpClient};
pub use cnes::{CnesPeriod, cnes_request, CNES_DIR};
pub use config::{ClientConfig, DEFAULT_SERVER};
pub use progress::{ConsoleProgress, ProgressSink, TransferProgress, format_percent};
pub use request::TransferRequest;
pub use transport::{DataReader, FtpTransport, SuppaFtpTransport, TransportError};
