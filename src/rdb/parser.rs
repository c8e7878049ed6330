//! Single-pass streaming snapshot parser.
//!
//! The body is a sequence of opcode-dispatched sections terminated by `0xFF`
//! and an 8-byte CRC64 trailer (currently unverified). Parsing never seeks;
//! everything is consumed in order and reported through an [`RdbVisitor`].

use jiff::Timestamp;
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::{debug, warn};

use crate::rdb::SnapshotError;
use crate::rdb::encoding::{read_length, read_string};
use crate::store::{Entry, Store};

const OPCODE_AUX_FIELD: u8 = 0xFA;
const OPCODE_RESIZE_DB: u8 = 0xFB;
const OPCODE_EXPIRE_MS: u8 = 0xFC;
const OPCODE_EXPIRE_SECONDS: u8 = 0xFD;
const OPCODE_SELECT_DB: u8 = 0xFE;
const OPCODE_EOF: u8 = 0xFF;
const TYPE_STRING: u8 = 0x00;

/// Callbacks driven by the parser, in stream order. Keys and values are raw
/// bytes; snapshot strings carry no character-set guarantee.
pub trait RdbVisitor {
    fn on_header(&mut self, version: u32);
    fn on_aux_field(&mut self, key: &[u8], value: &[u8]);
    fn on_db_start(&mut self, index: usize);
    fn on_resize_db(&mut self, db_size: usize, expire_size: usize);
    /// `expire_at_ms` is an absolute millisecond timestamp, already
    /// normalized from the seconds opcode where necessary.
    fn on_entry(&mut self, key: Vec<u8>, value: Vec<u8>, expire_at_ms: Option<i64>);
    fn on_end(&mut self);
}

/// Parses a complete snapshot stream, driving the visitor.
pub async fn parse_snapshot<R, V>(mut reader: R, visitor: &mut V) -> Result<(), SnapshotError>
where
    R: AsyncRead + Unpin,
    V: RdbVisitor,
{
    let mut header = [0u8; 9];
    reader.read_exact(&mut header).await?;

    if &header[..5] != b"REDIS" {
        return Err(SnapshotError::InvalidMagic);
    }

    let version_str = std::str::from_utf8(&header[5..])
        .map_err(|_| SnapshotError::InvalidVersion(String::from_utf8_lossy(&header[5..]).into()))?;
    let version = version_str
        .parse::<u32>()
        .map_err(|_| SnapshotError::InvalidVersion(version_str.to_string()))?;

    visitor.on_header(version);

    // Expiry opcodes apply to the next key/value entry only.
    let mut pending_expiry: Option<i64> = None;

    loop {
        let opcode = reader.read_u8().await?;

        match opcode {
            OPCODE_AUX_FIELD => {
                let key = read_string(&mut reader).await?;
                let value = read_string(&mut reader).await?;

                visitor.on_aux_field(&key, &value);
            }
            OPCODE_SELECT_DB => {
                let index = read_length(&mut reader).await?;

                visitor.on_db_start(index);
            }
            OPCODE_RESIZE_DB => {
                let db_size = read_length(&mut reader).await?;
                let expire_size = read_length(&mut reader).await?;

                visitor.on_resize_db(db_size, expire_size);
            }
            OPCODE_EXPIRE_SECONDS => {
                let mut buf = [0u8; 4];
                reader.read_exact(&mut buf).await?;

                let seconds = u32::from_le_bytes(buf);
                pending_expiry = Some(seconds as i64 * 1000);
            }
            OPCODE_EXPIRE_MS => {
                let mut buf = [0u8; 8];
                reader.read_exact(&mut buf).await?;

                pending_expiry = Some(u64::from_le_bytes(buf) as i64);
            }
            TYPE_STRING => {
                let key = read_string(&mut reader).await?;
                let value = read_string(&mut reader).await?;

                visitor.on_entry(key, value, pending_expiry.take());
            }
            OPCODE_EOF => {
                let mut checksum = [0u8; 8];
                reader.read_exact(&mut checksum).await?;

                visitor.on_end();
                return Ok(());
            }
            other => return Err(SnapshotError::UnknownOpcode(other)),
        }
    }
}

/// Visitor that funnels entries into a [`Store`].
pub struct StoreVisitor<'a> {
    store: &'a Store,
    current_db: usize,
}

impl<'a> StoreVisitor<'a> {
    pub fn new(store: &'a Store) -> Self {
        Self {
            store,
            current_db: 0,
        }
    }
}

impl RdbVisitor for StoreVisitor<'_> {
    fn on_header(&mut self, version: u32) {
        debug!(version, "parsed snapshot header");
    }

    fn on_aux_field(&mut self, key: &[u8], value: &[u8]) {
        debug!(
            key = %String::from_utf8_lossy(key),
            value = %String::from_utf8_lossy(value),
            "snapshot aux field"
        );
    }

    fn on_db_start(&mut self, index: usize) {
        self.current_db = index;
        debug!(index, "snapshot database section");
    }

    fn on_resize_db(&mut self, db_size: usize, expire_size: usize) {
        debug!(db_size, expire_size, "snapshot resize hint");
    }

    fn on_entry(&mut self, key: Vec<u8>, value: Vec<u8>, expire_at_ms: Option<i64>) {
        let expire_at = match expire_at_ms {
            Some(ms) => match Timestamp::from_millisecond(ms) {
                Ok(timestamp) => Some(timestamp),
                Err(_) => {
                    warn!(
                        key = %String::from_utf8_lossy(&key),
                        ms,
                        "skipping entry with out-of-range expiry"
                    );
                    return;
                }
            },
            None => None,
        };

        // Set drops entries whose expiry has already passed.
        self.store.set(key, Entry::string(value, expire_at));
    }

    fn on_end(&mut self) {
        debug!("snapshot fully parsed");
    }
}
