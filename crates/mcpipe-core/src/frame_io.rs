//! Async frame reading and writing over any byte stream.

use bytes::BytesMut;
use mcpipe_proto::{Frame, FrameHeader};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::ConnectionError;

/// Read one frame.
///
/// Returns `Ok(None)` on a clean EOF before the first header byte.
///
/// # Errors
///
/// - [`ConnectionError::Closed`] on EOF inside a frame
/// - [`ConnectionError::Protocol`] on an invalid header
/// - [`ConnectionError::Transport`] on other I/O failures
pub async fn read_frame<R>(reader: &mut R) -> Result<Option<Frame>, ConnectionError>
where
    R: AsyncRead + Unpin,
{
    let mut header = [0u8; FrameHeader::SIZE];
    let first = reader.read(&mut header).await?;
    if first == 0 {
        return Ok(None);
    }
    reader.read_exact(&mut header[first..]).await?;

    // Validate before allocating the payload.
    let payload_size = FrameHeader::from_bytes(&header)?.payload_size();

    let mut buf = BytesMut::with_capacity(FrameHeader::SIZE + payload_size);
    buf.extend_from_slice(&header);
    buf.resize(FrameHeader::SIZE + payload_size, 0);
    reader.read_exact(&mut buf[FrameHeader::SIZE..]).await?;

    Ok(Some(Frame::decode(&buf)?))
}

/// Encode and write one frame, then flush.
///
/// # Errors
///
/// - [`ConnectionError::Closed`] / [`ConnectionError::Transport`] on I/O
///   failures
pub async fn write_frame<W>(writer: &mut W, frame: &Frame) -> Result<(), ConnectionError>
where
    W: AsyncWrite + Unpin,
{
    let mut buf = BytesMut::with_capacity(frame.encoded_len());
    frame.encode(&mut buf);

    writer.write_all(&buf).await?;
    writer.flush().await?;
    Ok(())
}
