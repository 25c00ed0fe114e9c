use std::fmt;
use std::future::Future;
use std::io;
use std::sync::Arc;

use futures::io::AsyncReadExt;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;

use crate::errors::{FtpClientError, FtpClientResult};
use crate::models::config::ClientConfig;
use crate::models::progress::{ConsoleProgress, ProgressSink, TransferProgress};
use crate::models::request::TransferRequest;
use crate::models::transport::{FtpTransport, SuppaFtpTransport, TransportError};

/// Lifecycle of the client's control connection.
///
/// `Disconnected → Connecting → Ready → {SizeQuery | Retrieving} → Ready → Closed`.
/// `Closed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Ready,
    SizeQuery,
    Retrieving,
    Closed,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Ready => "ready",
            Self::SizeQuery => "querying a size",
            Self::Retrieving => "retrieving",
            Self::Closed => "closed",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy)]
enum Phase {
    Size,
    Retrieve,
}

/// FTP client that sizes, downloads and stores remote files with progress
/// reporting.
///
/// The client owns a single control connection. It is opened lazily by the
/// first operation, reused by later operations on the same host, and
/// terminated by [`FtpClient::close`], after which the instance can no longer
/// be used.
pub struct FtpClient<T: FtpTransport = SuppaFtpTransport> {
    config: ClientConfig,
    transport: T,
    progress: Arc<dyn ProgressSink>,
    state: ConnectionState,
    host: Option<String>,
}

impl FtpClient<SuppaFtpTransport> {
    /// Creates a client over suppaftp; does not connect
    pub fn new(config: ClientConfig) -> Self {
        let transport = SuppaFtpTransport::new(&config);
        Self::with_transport(config, transport)
    }

    /// Creates a client with DATASUS defaults
    pub fn new_datasus() -> Self {
        Self::new(ClientConfig::default())
    }
}

impl<T: FtpTransport> FtpClient<T> {
    /// Creates a client over a custom transport, reporting to the console
    pub fn with_transport(config: ClientConfig, transport: T) -> Self {
        Self {
            config,
            transport,
            progress: Arc::new(ConsoleProgress::new()),
            state: ConnectionState::Disconnected,
            host: None,
        }
    }

    /// Replace the sink receiving percentage updates
    pub fn with_progress_sink(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.progress = sink;
        self
    }

    /// Enable or disable progress reports; checked for every received chunk
    pub fn set_progress_enabled(&mut self, enabled: bool) {
        self.config.progress_enabled = enabled;
    }

    pub fn progress_enabled(&self) -> bool {
        self.config.progress_enabled
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Host of the open control connection, if any
    pub fn connected_host(&self) -> Option<&str> {
        self.host.as_deref()
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Size in bytes of the requested remote file.
    ///
    /// Connects to the request's server first when needed; the connection
    /// stays open for later operations.
    pub async fn size(&mut self, request: &TransferRequest) -> FtpClientResult<u64> {
        let host = request.server_or(&self.config.server).to_string();
        self.ensure_ready(&host).await?;

        let path = request.remote_path();
        self.state = ConnectionState::SizeQuery;
        match self.transport.size(&path).await {
            Ok(bytes) => {
                self.state = ConnectionState::Ready;
                log::debug!("{} on {} has {} bytes", path, host, bytes);
                Ok(bytes)
            }
            Err(source) => Err(self.remote_failure(Phase::Size, path, source)),
        }
    }

    /// Download the requested file to its destination path.
    ///
    /// The remote size is queried first; if that fails nothing is retrieved
    /// and the destination is never created. Resolves with the number of
    /// bytes actually received, which may differ from the declared size. On a
    /// mid-transfer failure the partially written destination is left in
    /// place.
    pub async fn get(&mut self, request: &TransferRequest) -> FtpClientResult<u64> {
        let destination = request.destination();
        self.transfer(request, move || async move {
            if let Some(parent) = destination.parent() {
                if !parent.as_os_str().is_empty() {
                    tokio::fs::create_dir_all(parent).await?;
                }
            }
            tokio::fs::File::create(&destination).await
        })
        .await
    }

    /// Download the requested file into `writer` instead of a file
    pub async fn download_to<W>(&mut self, request: &TransferRequest, writer: &mut W) -> FtpClientResult<u64>
    where
        W: AsyncWrite + Unpin,
    {
        self.transfer(request, move || async move { Ok(writer) }).await
    }

    /// [`FtpClient::get`] that gives up when `token` is cancelled. A cancelled
    /// transfer drops the connection and fails with
    /// [`FtpClientError::Cancelled`].
    pub async fn get_with_cancel(
        &mut self,
        request: &TransferRequest,
        token: &CancellationToken,
    ) -> FtpClientResult<u64> {
        let outcome = tokio::select! {
            biased;
            _ = token.cancelled() => None,
            result = self.get(request) => Some(result),
        };

        match outcome {
            Some(result) => result,
            None => {
                log::info!("Transfer of {} cancelled", request.remote_path());
                self.abandon_progress();
                self.abort_connection();
                Err(FtpClientError::Cancelled)
            }
        }
    }

    /// Terminate the connection. The client is unusable afterwards; closing
    /// again is a no-op.
    pub async fn close(&mut self) -> FtpClientResult<()> {
        match self.state {
            ConnectionState::Closed => return Ok(()),
            ConnectionState::Disconnected => {
                self.state = ConnectionState::Closed;
                return Ok(());
            }
            _ => {}
        }

        let host = self.host.take().unwrap_or_default();
        self.state = ConnectionState::Closed;
        self.transport
            .disconnect()
            .await
            .map_err(|source| FtpClientError::Connection {
                host: host.clone(),
                source,
            })?;
        log::info!("Closed FTP connection to {}", host);
        Ok(())
    }

    async fn transfer<D, F, Fut>(&mut self, request: &TransferRequest, open_destination: F) -> FtpClientResult<u64>
    where
        D: AsyncWrite + Unpin,
        F: FnOnce() -> Fut,
        Fut: Future<Output = io::Result<D>>,
    {
        let total = self.size(request).await?;
        let path = request.remote_path();

        self.state = ConnectionState::Retrieving;
        let mut reader = match self.transport.retrieve(&path).await {
            Ok(reader) => reader,
            Err(source) => return Err(self.remote_failure(Phase::Retrieve, path, source)),
        };

        let mut destination = match open_destination().await {
            Ok(destination) => destination,
            Err(e) => {
                self.abort_connection();
                return Err(FtpClientError::Io(e));
            }
        };

        let mut progress = TransferProgress::new(total);
        let mut chunk_buffer = vec![0u8; self.config.buffer_size.max(1)];

        loop {
            let n = match reader.read(&mut chunk_buffer).await {
                Ok(0) => break, // EOF
                Ok(n) => n,
                Err(e) => {
                    self.abandon_progress();
                    return Err(self.connection_lost(TransportError::Connection(e)));
                }
            };

            if let Err(e) = destination.write_all(&chunk_buffer[..n]).await {
                self.abandon_progress();
                self.abort_connection();
                return Err(FtpClientError::Io(e));
            }

            let percent = progress.advance(n as u64);
            if self.config.progress_enabled {
                self.progress.report(percent);
            }
        }

        if let Err(e) = destination.flush().await {
            self.abandon_progress();
            self.abort_connection();
            return Err(FtpClientError::Io(e));
        }
        drop(destination);

        if let Err(source) = self.transport.finish_retrieve(reader).await {
            self.abandon_progress();
            return Err(self.remote_failure(Phase::Retrieve, path, source));
        }
        self.state = ConnectionState::Ready;

        if self.config.progress_enabled {
            self.progress.finish();
        }
        if progress.overrun() {
            log::warn!(
                "{} declared {} bytes but {} were received",
                path,
                progress.total(),
                progress.accumulated()
            );
        }
        log::info!("Downloaded {} ({} bytes)", path, progress.accumulated());

        Ok(progress.accumulated())
    }

    async fn ensure_ready(&mut self, host: &str) -> FtpClientResult<()> {
        match self.state {
            ConnectionState::Ready if self.host.as_deref() == Some(host) => {
                log::debug!("Reusing FTP connection to {}", host);
                return Ok(());
            }
            ConnectionState::Ready => {
                log::debug!("Leaving {:?} to connect to {}", self.host, host);
                if let Err(e) = self.transport.disconnect().await {
                    log::debug!("Ignoring error while leaving {:?}: {}", self.host, e);
                }
                self.host = None;
                self.state = ConnectionState::Disconnected;
            }
            ConnectionState::Disconnected => {}
            state => {
                return Err(FtpClientError::IllegalState {
                    state,
                    operation: "start an operation",
                });
            }
        }

        self.state = ConnectionState::Connecting;
        log::debug!("Creating new FTP connection to {}", host);
        match self.transport.connect(host).await {
            Ok(()) => {
                self.state = ConnectionState::Ready;
                self.host = Some(host.to_string());
                log::info!("Connected to {}", host);
                Ok(())
            }
            Err(source) => {
                self.state = ConnectionState::Disconnected;
                self.host = None;
                Err(FtpClientError::Connection {
                    host: host.to_string(),
                    source,
                })
            }
        }
    }

    fn remote_failure(&mut self, phase: Phase, path: String, source: TransportError) -> FtpClientError {
        if source.is_connection() {
            return self.connection_lost(source);
        }

        self.state = ConnectionState::Ready;
        match phase {
            Phase::Size => FtpClientError::RemoteQuery { path, source },
            Phase::Retrieve => FtpClientError::Retrieve { path, source },
        }
    }

    fn connection_lost(&mut self, source: TransportError) -> FtpClientError {
        let host = self.host.clone().unwrap_or_default();
        log::warn!("Connection to {} lost: {}", host, source);
        self.abort_connection();
        FtpClientError::Connection { host, source }
    }

    /// Release a progress line left unfinished by a failed transfer
    fn abandon_progress(&self) {
        if self.config.progress_enabled {
            self.progress.abandon();
        }
    }

    /// Drop the connection without a QUIT round trip; a closed client stays closed
    fn abort_connection(&mut self) {
        self.transport.abandon();
        self.host = None;
        if self.state != ConnectionState::Closed {
            self.state = ConnectionState::Disconnected;
        }
    }
}
