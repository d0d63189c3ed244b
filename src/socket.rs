use std::fmt;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, ReadBuf};

use crate::protocol::AdbError;
use crate::transport::{ConnectionReader, ConnectionWriter};

/// A service channel bound to one device transport.
///
/// Produced by [`Client::connect_device`]. Reads and writes go straight to
/// the post-handshake byte stream; whatever protocol the service speaks
/// (shell, sync, ...) belongs to the caller. Closing shuts down the
/// underlying server connection.
///
/// [`Client::connect_device`]: crate::client::Client::connect_device
pub struct ServiceSocket {
    transport_id: u64,
    service: String,
    reader: ConnectionReader,
    writer: ConnectionWriter,
}

impl ServiceSocket {
    pub(crate) fn new(
        transport_id: u64,
        service: impl Into<String>,
        reader: ConnectionReader,
        writer: ConnectionWriter,
    ) -> Self {
        Self {
            transport_id,
            service: service.into(),
            reader,
            writer,
        }
    }

    /// The transport id the bind handshake resolved.
    pub fn transport_id(&self) -> u64 {
        self.transport_id
    }

    /// The service this socket is connected to.
    pub fn service(&self) -> &str {
        &self.service
    }

    /// Split into raw halves for a packet dispatcher that drives both sides.
    pub fn into_split(self) -> (ConnectionReader, ConnectionWriter) {
        (self.reader, self.writer)
    }

    /// Close the channel and the connection under it.
    pub async fn close(&mut self) -> Result<(), AdbError> {
        self.writer.shutdown().await?;
        Ok(())
    }
}

impl AsyncRead for ServiceSocket {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().reader).poll_read(cx, buf)
    }
}

impl AsyncWrite for ServiceSocket {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.get_mut().writer).poll_write(cx, buf)
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().writer).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().writer).poll_shutdown(cx)
    }
}

impl fmt::Debug for ServiceSocket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceSocket")
            .field("transport_id", &self.transport_id)
            .field("service", &self.service)
            .finish_non_exhaustive()
    }
}
