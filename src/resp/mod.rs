//! RESP (REdis Serialization Protocol) values: streaming parser and encoder.
//!
//! Frames are dispatched on their first byte: `+` simple string, `-` error,
//! `:` integer, `$` bulk string, `*` array. Bulk strings are binary-safe and
//! carry raw bytes; simple strings and errors are protocol text. Null bulk
//! strings (`$-1`) and null arrays (`*-1`) are distinct values so that
//! "absent" survives a round-trip through the codec.

mod reader;

use std::future::Future;
use std::pin::Pin;

use thiserror::Error;
use tokio::io::AsyncRead;

pub use reader::TrackingReader;

#[derive(Error, Debug, PartialEq)]
pub enum RespError {
    #[error("I/O error: {0}")]
    Io(String),
    #[error("connection closed")]
    ConnectionClosed,
    #[error("unknown RESP type prefix: {0:?}")]
    UnknownPrefix(char),
    #[error("invalid length: {0}")]
    InvalidLength(String),
    #[error("invalid integer: {0}")]
    InvalidInteger(String),
    #[error("bulk string missing CRLF terminator")]
    MissingTerminator,
    #[error("invalid UTF-8 sequence")]
    InvalidUtf8,
}

impl RespError {
    pub(crate) fn from_io(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::UnexpectedEof => RespError::ConnectionClosed,
            _ => RespError::Io(err.to_string()),
        }
    }

    /// Encoded form suitable for writing back to a client before closing.
    pub fn as_string(&self) -> String {
        format!("-ERR {}\r\n", self)
    }
}

/// A single RESP value.
#[derive(Debug, PartialEq, Clone)]
pub enum RespValue {
    SimpleString(String),
    Error(String),
    Integer(i64),
    /// Binary-safe payload; the wire length prefix makes any byte legal.
    BulkString(Vec<u8>),
    /// `$-1\r\n`: the null bulk string, distinct from the empty string.
    NullBulkString,
    Array(Vec<RespValue>),
    /// `*-1\r\n`: the null array.
    NullArray,
}

impl RespValue {
    /// Serializes the value to its wire representation.
    ///
    /// Arrays serialize recursively; nulls use the `-1` length form.
    pub fn encode(&self) -> Vec<u8> {
        match self {
            RespValue::SimpleString(s) => format!("+{}\r\n", s).into_bytes(),
            RespValue::Error(s) => format!("-{}\r\n", s).into_bytes(),
            RespValue::Integer(n) => format!(":{}\r\n", n).into_bytes(),
            RespValue::BulkString(bytes) => {
                let mut encoded = format!("${}\r\n", bytes.len()).into_bytes();
                encoded.extend_from_slice(bytes);
                encoded.extend_from_slice(b"\r\n");
                encoded
            }
            RespValue::NullBulkString => b"$-1\r\n".to_vec(),
            RespValue::Array(items) => {
                let mut encoded = format!("*{}\r\n", items.len()).into_bytes();
                for item in items {
                    encoded.extend_from_slice(&item.encode());
                }
                encoded
            }
            RespValue::NullArray => b"*-1\r\n".to_vec(),
        }
    }

    /// Builds a command array out of bulk strings.
    pub fn command<I, S>(parts: I) -> RespValue
    where
        I: IntoIterator<Item = S>,
        S: Into<Vec<u8>>,
    {
        RespValue::Array(
            parts
                .into_iter()
                .map(|part| RespValue::BulkString(part.into()))
                .collect(),
        )
    }

    /// Reads one RESP value from the reader.
    ///
    /// Boxed because arrays recurse into their elements.
    pub fn read<'a, R>(
        reader: &'a mut TrackingReader<R>,
    ) -> Pin<Box<dyn Future<Output = Result<RespValue, RespError>> + Send + 'a>>
    where
        R: AsyncRead + Unpin + Send,
    {
        Box::pin(async move {
            let prefix = reader.read_byte().await?;

            match prefix {
                b'+' => Ok(RespValue::SimpleString(reader.read_line().await?)),
                b'-' => Ok(RespValue::Error(reader.read_line().await?)),
                b':' => {
                    let line = reader.read_line().await?;
                    let value = line
                        .parse::<i64>()
                        .map_err(|_| RespError::InvalidInteger(line))?;

                    Ok(RespValue::Integer(value))
                }
                b'$' => {
                    let length = match read_length(reader).await? {
                        None => return Ok(RespValue::NullBulkString),
                        Some(length) => length,
                    };

                    let mut content = reader.read_exact_bytes(length + 2).await?;

                    if content.split_off(length) != b"\r\n" {
                        return Err(RespError::MissingTerminator);
                    }

                    Ok(RespValue::BulkString(content))
                }
                b'*' => {
                    let count = match read_length(reader).await? {
                        None => return Ok(RespValue::NullArray),
                        Some(count) => count,
                    };

                    let mut items = Vec::with_capacity(count);
                    for _ in 0..count {
                        items.push(RespValue::read(reader).await?);
                    }

                    Ok(RespValue::Array(items))
                }
                other => Err(RespError::UnknownPrefix(other as char)),
            }
        })
    }
}

/// Reads a decimal length line; `-1` maps to `None` (the null marker), any
/// other negative value is rejected.
async fn read_length<R: AsyncRead + Unpin>(
    reader: &mut TrackingReader<R>,
) -> Result<Option<usize>, RespError> {
    let line = reader.read_line().await?;

    let length = line
        .parse::<i64>()
        .map_err(|_| RespError::InvalidLength(line.clone()))?;

    match length {
        -1 => Ok(None),
        n if n < 0 => Err(RespError::InvalidLength(line)),
        n => Ok(Some(n as usize)),
    }
}
