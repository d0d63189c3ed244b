use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::debug;

use crate::cancel::{race_with_signals, AbortSignal};
use crate::protocol::AdbError;

/// Boxed read half of a server connection.
pub type ConnectionReader = Box<dyn AsyncRead + Send + Unpin>;

/// Boxed write half of a server connection.
pub type ConnectionWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Handler invoked for each incoming socket the server directs at a
/// registered reverse-tunnel address.
pub type ReverseTunnelHandler = Arc<dyn Fn(ServerConnection) + Send + Sync>;

/// Options for dialing the server.
#[derive(Clone, Debug, Default)]
pub struct ConnectOptions {
    /// Abort signal honoured while dialing and while awaiting the ack
    pub signal: Option<AbortSignal>,
    /// Advisory hint to release any process-keepalive hold on the underlying
    /// handle; connectors may ignore it
    pub unref: bool,
}

/// A raw bidirectional byte stream to the ADB server.
///
/// Each connection carries exactly one request/response exchange. Closing
/// shuts the write half down; the peer observes it as EOF.
pub struct ServerConnection {
    reader: ConnectionReader,
    writer: ConnectionWriter,
}

impl ServerConnection {
    /// Wrap a connected stream.
    pub fn new<S>(stream: S) -> Self
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (reader, writer) = tokio::io::split(stream);
        Self {
            reader: Box::new(reader),
            writer: Box::new(writer),
        }
    }

    /// Assemble a connection from separately-owned halves.
    pub fn from_parts(reader: ConnectionReader, writer: ConnectionWriter) -> Self {
        Self { reader, writer }
    }

    /// Split into owned halves.
    pub fn into_split(self) -> (ConnectionReader, ConnectionWriter) {
        (self.reader, self.writer)
    }

    /// Close the connection. Both halves are unusable afterwards.
    pub async fn close(mut self) -> Result<(), AdbError> {
        self.writer.shutdown().await?;
        Ok(())
    }
}

impl fmt::Debug for ServerConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerConnection").finish_non_exhaustive()
    }
}

/// Capability that opens byte streams to the ADB server.
///
/// Connectors may also accept reverse-tunnel registrations. Plain stream
/// connectors have no way to receive server-directed sockets and report
/// [`AdbError::Unsupported`]; failures are never retried here.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Open a fresh connection to the server.
    async fn connect(&self, options: &ConnectOptions) -> Result<ServerConnection, AdbError>;

    /// Register a handler for incoming sockets. The connector picks an
    /// address when none is supplied and returns the effective one.
    async fn add_reverse_tunnel(
        &self,
        _handler: ReverseTunnelHandler,
        _address: Option<String>,
    ) -> Result<String, AdbError> {
        Err(AdbError::Unsupported("reverse tunnels"))
    }

    /// Drop a previously registered handler.
    async fn remove_reverse_tunnel(&self, _address: &str) -> Result<(), AdbError> {
        Err(AdbError::Unsupported("reverse tunnels"))
    }

    /// Drop every registered handler.
    async fn clear_reverse_tunnels(&self) -> Result<(), AdbError> {
        Err(AdbError::Unsupported("reverse tunnels"))
    }
}

/// Connects to an ADB server over TCP. Defaults to `localhost:5037`.
///
/// The `unref` hint has no meaning for tokio sockets and is ignored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TcpConnector {
    pub host: String,
    pub port: u16,
}

impl Default for TcpConnector {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5037,
        }
    }
}

impl TcpConnector {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

#[async_trait]
impl Connector for TcpConnector {
    async fn connect(&self, options: &ConnectOptions) -> Result<ServerConnection, AdbError> {
        let signals: Vec<&AbortSignal> = options.signal.iter().collect();
        let stream = race_with_signals(
            async {
                TcpStream::connect((self.host.as_str(), self.port))
                    .await
                    .map_err(AdbError::from)
            },
            &signals,
        )
        .await?;

        debug!("connected to adb server at {}:{}", self.host, self.port);
        Ok(ServerConnection::new(stream))
    }
}

/// Connects to an ADB server listening on a Unix socket.
#[cfg(unix)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnixConnector {
    pub path: std::path::PathBuf,
}

#[cfg(unix)]
impl UnixConnector {
    pub fn new(path: impl Into<std::path::PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[cfg(unix)]
#[async_trait]
impl Connector for UnixConnector {
    async fn connect(&self, options: &ConnectOptions) -> Result<ServerConnection, AdbError> {
        let signals: Vec<&AbortSignal> = options.signal.iter().collect();
        let stream = race_with_signals(
            async {
                tokio::net::UnixStream::connect(&self.path)
                    .await
                    .map_err(AdbError::from)
            },
            &signals,
        )
        .await?;

        debug!("connected to adb server at {}", self.path.display());
        Ok(ServerConnection::new(stream))
    }
}
