//! RDB snapshot reading.
//!
//! Snapshots are read in two situations: at startup from `{dir}/{dbfilename}`
//! and on the follower side of a full resync, where the master streams the
//! snapshot as `$<len>\r\n<bytes>` with no trailing CRLF. Writing snapshots
//! is not supported; the only produced image is the minimal empty snapshot
//! used to bootstrap replicas.

mod encoding;
mod lzf;
mod parser;

use std::path::Path;

use thiserror::Error;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::OwnedWriteHalf;
use tracing::info;

use crate::store::Store;

pub use encoding::{LengthEncoding, StringEncoding, read_length, read_string};
pub use parser::{RdbVisitor, StoreVisitor, parse_snapshot};

#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error("I/O error reading snapshot: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid magic string")]
    InvalidMagic,
    #[error("invalid snapshot version: {0}")]
    InvalidVersion(String),
    #[error("unknown opcode: 0x{0:02X}")]
    UnknownOpcode(u8),
    #[error("invalid length encoding byte: 0x{0:02X}")]
    InvalidLengthEncoding(u8),
    #[error("expected a length, found a special string encoding")]
    UnexpectedSpecialEncoding,
    #[error("compressed string is malformed")]
    LzfCorrupt,
    #[error("decompressed length mismatch: expected {expected}, got {actual}")]
    LzfLengthMismatch { expected: usize, actual: usize },
}

/// The minimal empty snapshot streamed to replicas when no file exists:
/// magic and version, immediate EOF, zeroed checksum.
pub fn empty_snapshot() -> Vec<u8> {
    let mut bytes = Vec::with_capacity(18);
    bytes.extend_from_slice(b"REDIS0012");
    bytes.push(0xFF);
    bytes.extend_from_slice(&[0u8; 8]);

    bytes
}

/// Loads a snapshot file into the store.
pub async fn load_snapshot_file(path: &Path, store: &Store) -> Result<(), SnapshotError> {
    let file = File::open(path).await?;
    let mut visitor = StoreVisitor::new(store);

    parse_snapshot(BufReader::new(file), &mut visitor).await?;

    info!(path = %path.display(), keys = store.len(), "loaded snapshot");
    Ok(())
}

/// Streams the snapshot to a replica as `$<len>\r\n<bytes>` (no trailing
/// CRLF). Falls back to the empty snapshot when the file is missing.
pub async fn stream_snapshot(
    writer: &mut OwnedWriteHalf,
    path: Option<&Path>,
) -> std::io::Result<()> {
    let file = match path {
        Some(path) => match File::open(path).await {
            Ok(file) => Some(file),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => None,
            Err(err) => return Err(err),
        },
        None => None,
    };

    match file {
        Some(file) => {
            let size = file.metadata().await?.len();
            writer.write_all(format!("${}\r\n", size).as_bytes()).await?;

            let mut reader = BufReader::new(file);
            let mut buffer = [0u8; 4096];

            loop {
                let n = reader.read(&mut buffer).await?;
                if n == 0 {
                    break;
                }
                writer.write_all(&buffer[..n]).await?;
            }
        }
        None => {
            info!("no snapshot on disk, streaming empty snapshot");
            let bytes = empty_snapshot();
            writer
                .write_all(format!("${}\r\n", bytes.len()).as_bytes())
                .await?;
            writer.write_all(&bytes).await?;
        }
    }

    writer.flush().await
}
