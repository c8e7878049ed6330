//! Leader/follower replication.
//!
//! The master side lives in [`registry`]: connected replicas, offset
//! accounting and command fan-out. The follower side is the handshake plus
//! the replication read loop that applies the streamed command feed and
//! answers GETACK probes.

mod follower;
mod handshake;
mod registry;

use thiserror::Error;

use crate::rdb::SnapshotError;
use crate::resp::RespError;

pub use follower::{ReplicaStats, run_replication_client};
pub use handshake::{handshake, read_snapshot_header};
pub use registry::{ACK_THROTTLE, ReplicaRegistry, ReplicaState};

#[derive(Error, Debug)]
pub enum ReplicationError {
    #[error("timed out connecting to master")]
    ConnectTimeout,
    #[error("I/O error on master connection: {0}")]
    Io(#[from] std::io::Error),
    #[error("protocol error on master connection: {0}")]
    Protocol(#[from] RespError),
    #[error("unexpected reply from master: {0}")]
    UnexpectedReply(String),
    #[error("failed to ingest snapshot: {0}")]
    Snapshot(#[from] SnapshotError),
}
