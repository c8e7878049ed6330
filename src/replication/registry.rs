//! Replica registry and write-command broadcaster.
//!
//! The master tracks each connected replica's write half together with its
//! pending and acknowledged byte offsets. Write commands are fanned out
//! through [`ReplicaRegistry::broadcast`], which bumps the shared master
//! offset exactly once per call and stamps the post-bump value on every
//! replica that received the bytes.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::time::Instant;
use tracing::{debug, info, warn};

const GETACK_PROBE: &[u8] = b"*3\r\n$8\r\nREPLCONF\r\n$6\r\nGETACK\r\n$1\r\n*\r\n";

/// Minimum interval between consecutive GETACK probes to one replica.
pub const ACK_THROTTLE: Duration = Duration::from_millis(100);

#[derive(Debug, Default)]
struct AckState {
    last_ack_offset: u64,
    pending_offset: u64,
    last_ack_request: Option<Instant>,
}

/// A connected replica as seen by the master.
#[derive(Debug)]
pub struct ReplicaState {
    pub addr: String,
    writer: Arc<tokio::sync::Mutex<OwnedWriteHalf>>,
    ack: Mutex<AckState>,
}

impl ReplicaState {
    /// A replica needs an ACK while its acknowledged offset trails the last
    /// offset dispatched to it.
    pub fn needs_ack(&self) -> bool {
        let ack = self.ack.lock();
        ack.last_ack_offset < ack.pending_offset
    }

    pub fn last_ack_offset(&self) -> u64 {
        self.ack.lock().last_ack_offset
    }

    pub fn pending_offset(&self) -> u64 {
        self.ack.lock().pending_offset
    }

    fn set_pending_offset(&self, offset: u64) {
        self.ack.lock().pending_offset = offset;
    }

    fn record_ack(&self, offset: u64) {
        self.ack.lock().last_ack_offset = offset;
    }

    /// Sends a GETACK probe unless one was sent within the throttle window.
    /// The throttle check and the request timestamp are updated atomically
    /// so concurrent WAIT loops cannot double-probe.
    pub async fn send_getack(&self, throttle: Duration) -> std::io::Result<()> {
        {
            let mut ack = self.ack.lock();
            let now = Instant::now();

            if let Some(last) = ack.last_ack_request {
                if now.duration_since(last) < throttle {
                    debug!(addr = %self.addr, "GETACK throttled");
                    return Ok(());
                }
            }

            ack.last_ack_request = Some(now);
        }

        self.write(GETACK_PROBE).await
    }

    async fn write(&self, bytes: &[u8]) -> std::io::Result<()> {
        let mut writer = self.writer.lock().await;
        writer.write_all(bytes).await?;
        writer.flush().await
    }
}

/// Concurrent map of connected replicas plus the master offset counter.
#[derive(Debug, Default)]
pub struct ReplicaRegistry {
    replicas: RwLock<HashMap<String, Arc<ReplicaState>>>,
    master_offset: AtomicU64,
}

impl ReplicaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a replica after a completed full resync. Offsets start at
    /// zero; the replica has everything streamed so far.
    pub fn register(&self, addr: String, writer: Arc<tokio::sync::Mutex<OwnedWriteHalf>>) {
        info!(%addr, "registered replica");

        self.replicas.write().insert(
            addr.clone(),
            Arc::new(ReplicaState {
                addr,
                writer,
                ack: Mutex::new(AckState::default()),
            }),
        );
    }

    pub fn unregister(&self, addr: &str) {
        if self.replicas.write().remove(addr).is_some() {
            info!(%addr, "unregistered replica");
        }
    }

    pub fn all(&self) -> Vec<Arc<ReplicaState>> {
        self.replicas.read().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.replicas.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.replicas.read().is_empty()
    }

    /// Total bytes of replicated commands since startup.
    pub fn master_offset(&self) -> u64 {
        self.master_offset.load(Ordering::SeqCst)
    }

    /// Records an acknowledged offset reported by a replica.
    pub fn record_ack(&self, addr: &str, offset: u64) {
        if let Some(replica) = self.replicas.read().get(addr) {
            debug!(%addr, offset, "replica acknowledged offset");
            replica.record_ack(offset);
        }
    }

    /// Fans out one replicated command to every connected replica.
    ///
    /// The master offset is bumped once, before any write; every replica
    /// that receives the bytes gets the same post-bump value as its pending
    /// offset. Replicas whose write fails are unregistered. The replica map
    /// lock is only held to snapshot the list, never across a write.
    pub async fn broadcast(&self, bytes: &[u8]) {
        let offset = self
            .master_offset
            .fetch_add(bytes.len() as u64, Ordering::SeqCst)
            + bytes.len() as u64;

        let targets = self.all();
        let mut failed: Vec<String> = Vec::new();

        for replica in targets {
            match replica.write(bytes).await {
                Ok(()) => replica.set_pending_offset(offset),
                Err(err) => {
                    warn!(addr = %replica.addr, %err, "replica write failed, removing");
                    failed.push(replica.addr.clone());
                }
            }
        }

        for addr in failed {
            self.unregister(&addr);
        }
    }
}
