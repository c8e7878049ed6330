//! Length and string encodings of the snapshot format.
//!
//! The first byte's top two bits select the mode:
//!
//! * `00xxxxxx`: 6-bit length
//! * `01xxxxxx yyyyyyyy`: 14-bit length
//! * `10xxxxxx` + 4 bytes: 32-bit big-endian length (low 6 bits unused)
//! * `11xxxxxx`: special string encoding selected by the low 6 bits

use tokio::io::{AsyncRead, AsyncReadExt};

use crate::rdb::{SnapshotError, lzf};

#[derive(Debug, PartialEq)]
pub enum LengthEncoding {
    Length(usize),
    Special(StringEncoding),
}

#[derive(Debug, PartialEq, Clone, Copy)]
pub enum StringEncoding {
    Int8,
    Int16,
    Int32,
    Lzf,
}

pub async fn read_length_encoding<R: AsyncRead + Unpin>(
    reader: &mut R,
) -> Result<LengthEncoding, SnapshotError> {
    let first = reader.read_u8().await?;

    match first >> 6 {
        0b00 => Ok(LengthEncoding::Length((first & 0x3F) as usize)),
        0b01 => {
            let second = reader.read_u8().await?;
            let length = (((first & 0x3F) as usize) << 8) | second as usize;

            Ok(LengthEncoding::Length(length))
        }
        0b10 => {
            let mut buf = [0u8; 4];
            reader.read_exact(&mut buf).await?;

            Ok(LengthEncoding::Length(u32::from_be_bytes(buf) as usize))
        }
        _ => match first & 0x3F {
            0x00 => Ok(LengthEncoding::Special(StringEncoding::Int8)),
            0x01 => Ok(LengthEncoding::Special(StringEncoding::Int16)),
            0x02 => Ok(LengthEncoding::Special(StringEncoding::Int32)),
            0x03 => Ok(LengthEncoding::Special(StringEncoding::Lzf)),
            _ => Err(SnapshotError::InvalidLengthEncoding(first)),
        },
    }
}

/// Reads a length encoding and requires it to be an ordinary length.
pub async fn read_length<R: AsyncRead + Unpin>(reader: &mut R) -> Result<usize, SnapshotError> {
    match read_length_encoding(reader).await? {
        LengthEncoding::Length(length) => Ok(length),
        LengthEncoding::Special(_) => Err(SnapshotError::UnexpectedSpecialEncoding),
    }
}

/// Reads a snapshot string: either raw bytes of an encoded length or one of
/// the special formats (integers rendered as decimal, or LZF-compressed).
/// Snapshot strings are binary-safe; no character set is assumed.
pub async fn read_string<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Vec<u8>, SnapshotError> {
    match read_length_encoding(reader).await? {
        LengthEncoding::Length(length) => {
            let mut buf = vec![0u8; length];
            reader.read_exact(&mut buf).await?;

            Ok(buf)
        }
        LengthEncoding::Special(encoding) => read_special_string(reader, encoding).await,
    }
}

async fn read_special_string<R: AsyncRead + Unpin>(
    reader: &mut R,
    encoding: StringEncoding,
) -> Result<Vec<u8>, SnapshotError> {
    match encoding {
        StringEncoding::Int8 => {
            let value = reader.read_i8().await?;

            Ok(value.to_string().into_bytes())
        }
        StringEncoding::Int16 => {
            let mut buf = [0u8; 2];
            reader.read_exact(&mut buf).await?;

            Ok(i16::from_be_bytes(buf).to_string().into_bytes())
        }
        StringEncoding::Int32 => {
            let mut buf = [0u8; 4];
            reader.read_exact(&mut buf).await?;

            Ok(i32::from_be_bytes(buf).to_string().into_bytes())
        }
        StringEncoding::Lzf => {
            let compressed_len = read_length(reader).await?;
            let original_len = read_length(reader).await?;

            let mut compressed = vec![0u8; compressed_len];
            reader.read_exact(&mut compressed).await?;

            let decompressed = lzf::decompress(&compressed, original_len)?;

            if decompressed.len() != original_len {
                return Err(SnapshotError::LzfLengthMismatch {
                    expected: original_len,
                    actual: decompressed.len(),
                });
            }

            Ok(decompressed)
        }
    }
}
