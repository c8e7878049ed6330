//! Byte-counting buffered reader used by the RESP parser.
//!
//! Every byte pulled through the reader increments an internal counter. The
//! follower's replication loop flushes that counter into its durable
//! bytes-read tally after each command, which is what makes REPLCONF ACK
//! offsets exact to the byte.

use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncReadExt, BufReader, ReadBuf};

use crate::resp::RespError;

/// Buffered reader that counts every byte it hands out.
///
/// Implements [`AsyncRead`] itself, so it can be passed anywhere a plain
/// reader is expected (e.g. wrapped in `take()` for the snapshot transfer)
/// while still keeping the tally accurate.
#[derive(Debug)]
pub struct TrackingReader<R> {
    inner: BufReader<R>,
    bytes_read: u64,
}

impl<R: AsyncRead + Unpin> TrackingReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner: BufReader::new(inner),
            bytes_read: 0,
        }
    }

    /// Bytes consumed since construction or the last [`take_bytes_read`].
    ///
    /// [`take_bytes_read`]: Self::take_bytes_read
    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }

    /// Returns the current byte count and resets it to zero.
    pub fn take_bytes_read(&mut self) -> u64 {
        std::mem::take(&mut self.bytes_read)
    }

    /// Reads a single byte.
    pub async fn read_byte(&mut self) -> Result<u8, RespError> {
        self.read_u8().await.map_err(RespError::from_io)
    }

    /// Reads up to and including the next `\n`, returning the line without
    /// its `\r\n` terminator.
    pub async fn read_line(&mut self) -> Result<String, RespError> {
        let mut line: Vec<u8> = Vec::new();

        loop {
            let byte = self.read_u8().await.map_err(RespError::from_io)?;

            if byte == b'\n' {
                break;
            }

            line.push(byte);
        }

        if line.last() == Some(&b'\r') {
            line.pop();
        }

        String::from_utf8(line).map_err(|_| RespError::InvalidUtf8)
    }

    /// Reads exactly `len` bytes.
    pub async fn read_exact_bytes(&mut self, len: usize) -> Result<Vec<u8>, RespError> {
        let mut buf = vec![0u8; len];
        self.read_exact(&mut buf).await.map_err(RespError::from_io)?;

        Ok(buf)
    }
}

impl<R: AsyncRead + Unpin> AsyncRead for TrackingReader<R> {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        let filled_before = buf.filled().len();
        let me = &mut *self;

        match Pin::new(&mut me.inner).poll_read(cx, buf) {
            Poll::Ready(Ok(())) => {
                me.bytes_read += (buf.filled().len() - filled_before) as u64;
                Poll::Ready(Ok(()))
            }
            other => other,
        }
    }
}
