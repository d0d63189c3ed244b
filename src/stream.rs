use std::cmp;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncReadExt, ReadBuf};

use crate::protocol::AdbError;

const CHUNK: usize = 4096;

/// Exact-byte reads over a chunked transport.
///
/// The transport hands back whatever bytes are available, so reading "exactly
/// n" can pull in more than n. The surplus stays in a residue buffer and is
/// served to later reads, or handed back whole via [`release`].
///
/// [`release`]: BufferedReader::release
#[derive(Debug)]
pub struct BufferedReader<R> {
    inner: R,
    buffer: Vec<u8>,
    start: usize,
}

impl<R> BufferedReader<R>
where
    R: AsyncRead + Unpin,
{
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            buffer: Vec::new(),
            start: 0,
        }
    }

    fn buffered(&self) -> usize {
        self.buffer.len() - self.start
    }

    /// Read exactly `n` bytes.
    ///
    /// Fails with [`AdbError::UnexpectedEnd`] if the stream closes before `n`
    /// bytes arrive.
    pub async fn read_exactly(&mut self, n: usize) -> Result<Vec<u8>, AdbError> {
        while self.buffered() < n {
            let mut chunk = [0u8; CHUNK];
            let read = self.inner.read(&mut chunk).await?;
            if read == 0 {
                return Err(AdbError::UnexpectedEnd);
            }
            self.buffer.extend_from_slice(&chunk[..read]);
        }

        let out = self.buffer[self.start..self.start + n].to_vec();
        self.start += n;
        if self.start == self.buffer.len() {
            self.buffer.clear();
            self.start = 0;
        }
        Ok(out)
    }

    /// Hand the stream back to the caller.
    ///
    /// The returned stream yields any buffered residue first, then continues
    /// from the underlying transport. The reader is consumed; it must not be
    /// used after release.
    pub fn release(self) -> ResidueReader<R> {
        ResidueReader {
            residue: self.buffer,
            pos: self.start,
            inner: self.inner,
        }
    }
}

/// Stream returned by [`BufferedReader::release`]: residue first, then the
/// underlying transport.
#[derive(Debug)]
pub struct ResidueReader<R> {
    residue: Vec<u8>,
    pos: usize,
    inner: R,
}

impl<R> AsyncRead for ResidueReader<R>
where
    R: AsyncRead + Unpin,
{
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();

        if this.pos < this.residue.len() {
            let n = cmp::min(buf.remaining(), this.residue.len() - this.pos);
            buf.put_slice(&this.residue[this.pos..this.pos + n]);
            this.pos += n;
            if this.pos == this.residue.len() {
                this.residue = Vec::new();
                this.pos = 0;
            }
            return Poll::Ready(Ok(()));
        }

        Pin::new(&mut this.inner).poll_read(cx, buf)
    }
}
