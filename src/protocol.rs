use std::io;

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};

use crate::stream::BufferedReader;

/// Server protocol version this client speaks
pub const VERSION: u32 = 41;

/// Maximum string frame payload (the length prefix is 4 hex digits)
pub const MAX_PAYLOAD: usize = 0xFFFF;

/// Success acknowledgement
pub const OKAY: &[u8; 4] = b"OKAY";

/// Failure acknowledgement, followed by a string frame with the reason
pub const FAIL: &[u8; 4] = b"FAIL";

/// Encode a string frame: 4 lower-case hex digits giving the payload length,
/// followed by the UTF-8 payload.
pub fn encode_frame(payload: &str) -> Result<Vec<u8>, AdbError> {
    if payload.len() > MAX_PAYLOAD {
        return Err(AdbError::PayloadTooLarge(payload.len()));
    }

    let mut bytes = Vec::with_capacity(4 + payload.len());
    bytes.extend_from_slice(format!("{:04x}", payload.len()).as_bytes());
    bytes.extend_from_slice(payload.as_bytes());
    Ok(bytes)
}

/// Parse a 4-digit hex length prefix. Either case is accepted.
pub fn decode_hex_length(digits: &[u8]) -> Result<usize, AdbError> {
    if digits.len() != 4 || !digits.iter().all(|b| b.is_ascii_hexdigit()) {
        return Err(AdbError::Decode(format!(
            "invalid hex length prefix: {:?}",
            String::from_utf8_lossy(digits)
        )));
    }

    let text = std::str::from_utf8(digits).map_err(|e| AdbError::Decode(e.to_string()))?;
    usize::from_str_radix(text, 16).map_err(|e| AdbError::Decode(e.to_string()))
}

/// Write one string frame as a single contiguous write.
pub async fn write_frame<W>(writer: &mut W, payload: &str) -> Result<(), AdbError>
where
    W: AsyncWrite + Unpin,
{
    let frame = encode_frame(payload)?;
    writer.write_all(&frame).await?;
    writer.flush().await?;
    Ok(())
}

/// Read one string frame: length prefix, then that many bytes of UTF-8.
pub async fn read_string_frame<R>(reader: &mut BufferedReader<R>) -> Result<String, AdbError>
where
    R: AsyncRead + Unpin,
{
    let prefix = reader.read_exactly(4).await?;
    let length = decode_hex_length(&prefix)?;
    let payload = reader.read_exactly(length).await?;

    String::from_utf8(payload).map_err(|e| AdbError::Decode(e.to_string()))
}

/// Read an acknowledgement frame.
///
/// `OKAY` succeeds. `FAIL` is followed by a string frame carrying the server's
/// reason, surfaced as [`AdbError::ServerFailure`]. Anything else is
/// [`AdbError::UnexpectedResponse`].
pub async fn read_ack<R>(reader: &mut BufferedReader<R>) -> Result<(), AdbError>
where
    R: AsyncRead + Unpin,
{
    let ack = reader.read_exactly(4).await?;

    if ack == OKAY {
        return Ok(());
    }

    if ack == FAIL {
        let reason = read_string_frame(reader).await?;
        return Err(AdbError::ServerFailure(reason));
    }

    Err(AdbError::UnexpectedResponse([ack[0], ack[1], ack[2], ack[3]]))
}

/// Read the 8-byte little-endian transport id a `host:tport:*` bind emits.
pub async fn read_transport_id<R>(reader: &mut BufferedReader<R>) -> Result<u64, AdbError>
where
    R: AsyncRead + Unpin,
{
    let bytes = reader.read_exactly(8).await?;
    let mut raw = [0u8; 8];
    raw.copy_from_slice(&bytes);
    Ok(u64::from_le_bytes(raw))
}

/// ADB errors
#[derive(Error, Debug)]
pub enum AdbError {
    #[error("transport error: {0}")]
    Transport(#[from] io::Error),

    #[error("adb server failure: {0}")]
    ServerFailure(String),

    #[error("unexpected ack from server: {0:?}")]
    UnexpectedResponse([u8; 4]),

    #[error("stream ended before the read completed")]
    UnexpectedEnd,

    #[error("decode error: {0}")]
    Decode(String),

    #[error("frame payload of {0} bytes exceeds the 16-bit length prefix")]
    PayloadTooLarge(usize),

    #[error("invalid device selector: {0:?}")]
    InvalidSelector(String),

    #[error("device '{0}' reported no transport id")]
    MissingTransportId(String),

    #[error("adb server speaks protocol version {server}, this client speaks {client}")]
    VersionMismatch { server: u32, client: u32 },

    #[error("aborted: {0}")]
    Aborted(String),

    #[error("{0} is not supported by this connector")]
    Unsupported(&'static str),
}
