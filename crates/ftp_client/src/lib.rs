//! Async FTP download client.
//!
//! [`FtpClient`] connects to an FTP server, asks for the size of a remote
//! file, retrieves it while reporting progress and writes it to a local
//! destination.
//!
//! ```no_run
//! use ftp_client::{FtpClient, TransferRequest};
//!
//! # async fn run() -> ftp_client::FtpClientResult<()> {
//! let mut client = FtpClient::new_datasus();
//! let request = TransferRequest::new("BASE_DE_DADOS_CNES_202102.ZIP").in_dir("/cnes/");
//! let bytes = client.get(&request).await?;
//! client.close().await?;
//! println!("{bytes}");
//! # Ok(())
//! # }
//! ```

pub mod errors;
pub mod models;

pub use errors::*;
pub use models::*;
