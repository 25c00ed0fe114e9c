use std::io;
use std::time::Duration;

use async_trait::async_trait;
use suppaftp::types::FileType;
use suppaftp::{AsyncFtpStream, FtpError, Mode};
use thiserror::Error;

use crate::models::config::ClientConfig;

/// Byte stream of a file being retrieved; a zero-length read marks end-of-data
pub type DataReader = Box<dyn futures::io::AsyncRead + Send + Unpin>;

/// Errors reported by a transport, carried unchanged inside client errors
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Connection failed: {0}")]
    Connection(#[from] io::Error),
    #[error("Server replied {code}: {message}")]
    Remote { code: u32, message: String },
    #[error("Protocol error: {0}")]
    Protocol(String),
}

impl TransportError {
    /// The control connection can no longer be trusted
    pub fn is_connection(&self) -> bool {
        matches!(self, Self::Connection(_))
    }
}

impl From<FtpError> for TransportError {
    fn from(err: FtpError) -> Self {
        match err {
            FtpError::ConnectionError(e) => Self::Connection(e),
            FtpError::UnexpectedResponse(response) => {
                let code = response.status.code();
                let text = String::from_utf8_lossy(&response.body);
                let text = text.trim();
                // The body is the raw reply line, "550 File not found"
                let message = text
                    .strip_prefix(code.to_string().as_str())
                    .map(|rest| rest.trim_start_matches([' ', '-']))
                    .unwrap_or(text);
                Self::Remote {
                    code,
                    message: message.to_string(),
                }
            }
            other => Self::Protocol(other.to_string()),
        }
    }
}

/// The FTP primitives the client is built on
#[async_trait]
pub trait FtpTransport: Send {
    /// Open and authenticate a control connection to `host`
    async fn connect(&mut self, host: &str) -> Result<(), TransportError>;

    /// Size in bytes of the remote file (SIZE)
    async fn size(&mut self, path: &str) -> Result<u64, TransportError>;

    /// Start retrieving the remote file (RETR)
    async fn retrieve(&mut self, path: &str) -> Result<DataReader, TransportError>;

    /// Close the data stream and read the server's transfer-complete reply
    async fn finish_retrieve(&mut self, reader: DataReader) -> Result<(), TransportError>;

    /// Terminate the control connection (QUIT)
    async fn disconnect(&mut self) -> Result<(), TransportError>;

    /// Drop the control connection without waiting for the server
    fn abandon(&mut self);
}

/// Transport over a suppaftp async stream
pub struct SuppaFtpTransport {
    port: u16,
    username: String,
    password: String,
    timeout: Duration,
    stream: Option<AsyncFtpStream>,
}

impl SuppaFtpTransport {
    pub fn new(config: &ClientConfig) -> Self {
        Self {
            port: config.port,
            username: config.username.clone(),
            password: config.password.clone(),
            timeout: config.connect_timeout(),
            stream: None,
        }
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    fn timed_out(&self, action: &str) -> TransportError {
        TransportError::Connection(io::Error::new(
            io::ErrorKind::TimedOut,
            format!("timed out after {:?} {}", self.timeout, action),
        ))
    }

    fn stream_mut(&mut self) -> Result<&mut AsyncFtpStream, TransportError> {
        self.stream
            .as_mut()
            .ok_or_else(|| TransportError::Protocol("no open control connection".to_string()))
    }
}

#[async_trait]
impl FtpTransport for SuppaFtpTransport {
    async fn connect(&mut self, host: &str) -> Result<(), TransportError> {
        let address = format!("{}:{}", host, self.port);

        let mut ftp_stream = tokio::time::timeout(self.timeout, AsyncFtpStream::connect(address.as_str()))
            .await
            .map_err(|_| self.timed_out(&format!("connecting to {}", address)))??;

        ftp_stream.login(&self.username, &self.password).await?;
        ftp_stream.set_mode(Mode::Passive);
        ftp_stream.transfer_type(FileType::Binary).await?;

        log::debug!("Logged in to {} as {}", address, self.username);
        self.stream = Some(ftp_stream);
        Ok(())
    }

    async fn size(&mut self, path: &str) -> Result<u64, TransportError> {
        let bytes = self.stream_mut()?.size(path).await?;
        Ok(bytes as u64)
    }

    async fn retrieve(&mut self, path: &str) -> Result<DataReader, TransportError> {
        let data_stream = self.stream_mut()?.retr_as_stream(path).await?;
        Ok(Box::new(data_stream))
    }

    async fn finish_retrieve(&mut self, reader: DataReader) -> Result<(), TransportError> {
        self.stream_mut()?.finalize_retr_stream(reader).await?;
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), TransportError> {
        if let Some(mut ftp_stream) = self.stream.take() {
            tokio::time::timeout(self.timeout, ftp_stream.quit())
                .await
                .map_err(|_| self.timed_out("waiting for the QUIT reply"))??;
        }
        Ok(())
    }

    fn abandon(&mut self) {
        if self.stream.take().is_some() {
            log::debug!("Dropped FTP control connection without QUIT");
        }
    }
}

/// In-memory transport for exercising the client without a server
#[cfg(test)]
pub(crate) mod scripted {
    use super::*;
    use futures::{StreamExt, TryStreamExt};
    use std::sync::{Arc, Mutex};

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum Call {
        Connect(String),
        Size(String),
        Retrieve(String),
        FinishRetrieve,
        Disconnect,
        Abandon,
    }

    pub enum Chunk {
        Data(Vec<u8>),
        Reset,
    }

    pub struct ScriptedTransport {
        calls: Arc<Mutex<Vec<Call>>>,
        refuse_connect: bool,
        size_reply: Option<u64>,
        size_connection_lost: bool,
        reject_retrieve: bool,
        chunks: Vec<Vec<u8>>,
        drop_after: Option<usize>,
        stall: bool,
        hang_on_quit: bool,
    }

    impl ScriptedTransport {
        /// Server holding a file of `declared` bytes delivered as `chunk_lens`
        pub fn serving(declared: u64, chunk_lens: &[usize]) -> Self {
            Self {
                calls: Arc::new(Mutex::new(Vec::new())),
                refuse_connect: false,
                size_reply: Some(declared),
                size_connection_lost: false,
                reject_retrieve: false,
                chunks: chunk_lens.iter().map(|len| vec![0xAB; *len]).collect(),
                drop_after: None,
                stall: false,
                hang_on_quit: false,
            }
        }

        pub fn missing_file() -> Self {
            Self {
                size_reply: None,
                ..Self::serving(0, &[])
            }
        }

        pub fn unreachable() -> Self {
            Self {
                refuse_connect: true,
                ..Self::serving(0, &[])
            }
        }

        pub fn losing_connection_on_size(mut self) -> Self {
            self.size_connection_lost = true;
            self
        }

        pub fn rejecting_retrieve(mut self) -> Self {
            self.reject_retrieve = true;
            self
        }

        /// Drop the data connection after `count` chunks
        pub fn dropping_after(mut self, count: usize) -> Self {
            self.drop_after = Some(count);
            self
        }

        /// Keep the data connection open without sending anything after the chunks
        pub fn stalling(mut self) -> Self {
            self.stall = true;
            self
        }

        /// Never answer QUIT
        pub fn hanging_on_quit(mut self) -> Self {
            self.hang_on_quit = true;
            self
        }

        pub fn call_log(&self) -> Arc<Mutex<Vec<Call>>> {
            self.calls.clone()
        }

        fn record(&self, call: Call) {
            self.calls.lock().unwrap().push(call);
        }

        fn script(&self) -> Vec<Chunk> {
            let mut script: Vec<Chunk> = self.chunks.iter().cloned().map(Chunk::Data).collect();
            if let Some(count) = self.drop_after {
                script.truncate(count);
                script.push(Chunk::Reset);
            }
            script
        }
    }

    #[async_trait]
    impl FtpTransport for ScriptedTransport {
        async fn connect(&mut self, host: &str) -> Result<(), TransportError> {
            self.record(Call::Connect(host.to_string()));
            if self.refuse_connect {
                return Err(TransportError::Connection(io::Error::new(
                    io::ErrorKind::ConnectionRefused,
                    "connection refused",
                )));
            }
            Ok(())
        }

        async fn size(&mut self, path: &str) -> Result<u64, TransportError> {
            self.record(Call::Size(path.to_string()));
            if self.size_connection_lost {
                return Err(TransportError::Connection(io::Error::new(
                    io::ErrorKind::ConnectionReset,
                    "connection reset by peer",
                )));
            }
            self.size_reply.ok_or_else(|| TransportError::Remote {
                code: 550,
                message: "File not found".to_string(),
            })
        }

        async fn retrieve(&mut self, path: &str) -> Result<DataReader, TransportError> {
            self.record(Call::Retrieve(path.to_string()));
            if self.reject_retrieve {
                return Err(TransportError::Remote {
                    code: 550,
                    message: "Permission denied".to_string(),
                });
            }
            let items: Vec<io::Result<Vec<u8>>> = self
                .script()
                .into_iter()
                .map(|chunk| match chunk {
                    Chunk::Data(bytes) => Ok(bytes),
                    Chunk::Reset => Err(io::Error::new(
                        io::ErrorKind::ConnectionReset,
                        "data connection reset",
                    )),
                })
                .collect();
            let data = futures::stream::iter(items);
            if self.stall {
                Ok(Box::new(data.chain(futures::stream::pending()).into_async_read()))
            } else {
                Ok(Box::new(data.into_async_read()))
            }
        }

        async fn finish_retrieve(&mut self, _reader: DataReader) -> Result<(), TransportError> {
            self.record(Call::FinishRetrieve);
            Ok(())
        }

        async fn disconnect(&mut self) -> Result<(), TransportError> {
            self.record(Call::Disconnect);
            if self.hang_on_quit {
                futures::future::pending::<()>().await;
            }
            Ok(())
        }

        fn abandon(&mut self) {
            self.record(Call::Abandon);
        }
    }
}

/// FTP server on a loopback socket for driving `SuppaFtpTransport` in tests
#[cfg(test)]
pub(crate) mod loopback {
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
    use tokio::net::{TcpListener, TcpStream};

    pub const FILE: &str = "/cnes/BASE.ZIP";
    pub const FILE_LEN: usize = 1000;

    #[derive(Debug, Clone, Copy, Default)]
    pub struct Behaviour {
        /// Send this many bytes of `FILE`, then keep the data connection open
        pub stall_after: Option<usize>,
        /// Never answer QUIT
        pub ignore_quit: bool,
    }

    /// Accept one control connection in the background; returns the port
    pub async fn serve(behaviour: Behaviour) -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            if let Ok((control, _)) = listener.accept().await {
                let _ = session(control, behaviour).await;
            }
        });
        port
    }

    async fn session(control: TcpStream, behaviour: Behaviour) -> std::io::Result<()> {
        let (read_half, mut writer) = control.into_split();
        let mut lines = BufReader::new(read_half).lines();
        let mut data_listener: Option<TcpListener> = None;
        let mut stalled = Vec::new();

        writer.write_all(b"220 loopback ready\r\n").await?;
        while let Some(line) = lines.next_line().await? {
            let (verb, arg) = line.split_once(' ').unwrap_or((line.as_str(), ""));
            match verb {
                "USER" => writer.write_all(b"331 Password required\r\n").await?,
                "PASS" => writer.write_all(b"230 Logged in\r\n").await?,
                "TYPE" => writer.write_all(b"200 Type set to I\r\n").await?,
                "SIZE" if arg == FILE => {
                    writer.write_all(format!("213 {}\r\n", FILE_LEN).as_bytes()).await?
                }
                "SIZE" => writer.write_all(b"550 File not found\r\n").await?,
                "PASV" => {
                    let listener = TcpListener::bind("127.0.0.1:0").await?;
                    let port = listener.local_addr()?.port();
                    data_listener = Some(listener);
                    let reply = format!(
                        "227 Entering Passive Mode (127,0,0,1,{},{})\r\n",
                        port >> 8,
                        port & 0xff
                    );
                    writer.write_all(reply.as_bytes()).await?;
                }
                "RETR" if arg == FILE => {
                    let Some(listener) = data_listener.take() else {
                        writer.write_all(b"425 Use PASV first\r\n").await?;
                        continue;
                    };
                    writer.write_all(b"150 Opening BINARY mode data connection\r\n").await?;
                    let (mut data, _) = listener.accept().await?;
                    let payload = vec![0xCD; FILE_LEN];
                    match behaviour.stall_after {
                        Some(sent) => {
                            data.write_all(&payload[..sent]).await?;
                            stalled.push(data);
                        }
                        None => {
                            data.write_all(&payload).await?;
                            data.shutdown().await?;
                            drop(data);
                            writer.write_all(b"226 Transfer complete\r\n").await?;
                        }
                    }
                }
                // The passive listener stays open so the client's data connect still succeeds
                "RETR" => writer.write_all(b"550 Permission denied\r\n").await?,
                "QUIT" if behaviour.ignore_quit => {}
                "QUIT" => {
                    writer.write_all(b"221 Goodbye\r\n").await?;
                    break;
                }
                _ => writer.write_all(b"502 Command not implemented\r\n").await?,
            }
        }
        Ok(())
    }
}
