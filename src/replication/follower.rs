//! Follower role: connect to the master, sync, apply the command feed.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::commands::{CommandContext, CommandHandler, CommandResult};
use crate::config::Role;
use crate::rdb::{StoreVisitor, parse_snapshot};
use crate::replication::handshake::{handshake, read_snapshot_header};
use crate::replication::ReplicationError;
use crate::resp::{RespValue, TrackingReader};
use crate::server::ServerContext;

const MASTER_DIAL_TIMEOUT: Duration = Duration::from_secs(5);

/// Bytes consumed from the master since the snapshot transfer completed.
///
/// This is the value a follower reports in REPLCONF ACK. It is flushed from
/// the framing reader only after a command finishes executing, so a GETACK
/// always reports the offset at its own command entry.
#[derive(Debug, Default)]
pub struct ReplicaStats {
    bytes_read: AtomicU64,
}

impl ReplicaStats {
    pub fn add(&self, n: u64) {
        self.bytes_read.fetch_add(n, Ordering::SeqCst);
    }

    pub fn bytes_read(&self) -> u64 {
        self.bytes_read.load(Ordering::SeqCst)
    }
}

/// Connects to the configured master, performs the handshake, ingests the
/// snapshot, marks the server ready to serve and then consumes the
/// replicated command feed until the link drops.
pub async fn run_replication_client(ctx: Arc<ServerContext>) -> Result<(), ReplicationError> {
    let Role::Replica { host, port } = &ctx.config.role else {
        return Ok(());
    };

    let master_addr = format!("{}:{}", host, port);

    let stream = timeout(MASTER_DIAL_TIMEOUT, TcpStream::connect(&master_addr))
        .await
        .map_err(|_| ReplicationError::ConnectTimeout)??;

    info!(%master_addr, "connected to master");

    let (read_half, mut write_half) = stream.into_split();
    let mut reader = TrackingReader::new(read_half);

    handshake(&mut reader, &mut write_half, ctx.config.port).await?;

    let snapshot_len = read_snapshot_header(&mut reader).await?;
    debug!(snapshot_len, "ingesting snapshot from master");

    {
        let mut limited = (&mut reader).take(snapshot_len);
        let mut visitor = StoreVisitor::new(&ctx.store);
        parse_snapshot(&mut limited, &mut visitor).await?;
    }

    // Offset accounting starts at the first byte after the snapshot.
    reader.take_bytes_read();

    ctx.mark_ready();
    info!("snapshot sync complete, ready to serve");

    let stats = Arc::new(ReplicaStats::default());
    let command_ctx = CommandContext {
        server: Arc::clone(&ctx),
        client_addr: master_addr.clone(),
        replica_stats: Some(Arc::clone(&stats)),
    };

    loop {
        let value = match RespValue::read(&mut reader).await {
            Ok(value) => value,
            Err(err) => {
                warn!(%err, "replication stream ended");
                return Err(ReplicationError::Protocol(err));
            }
        };

        apply_replicated_command(value, &command_ctx, &mut write_half).await;

        // Flushing after execution keeps a GETACK's own frame out of the
        // offset it reports.
        stats.add(reader.take_bytes_read());
    }
}

/// Applies one replicated command. Responses stay local except for commands
/// that ack back to the master (REPLCONF GETACK).
async fn apply_replicated_command(
    value: RespValue,
    command_ctx: &CommandContext,
    write_half: &mut tokio::net::tcp::OwnedWriteHalf,
) {
    let handler = match CommandHandler::new(value) {
        Ok(handler) => handler,
        Err(err) => {
            warn!(%err, "skipping malformed replicated command");
            return;
        }
    };

    let acks_to_master = handler.acks_to_master();

    match handler.execute(command_ctx).await {
        Ok(CommandResult::Response(response)) if acks_to_master => {
            if let Err(err) = write_half.write_all(&response).await {
                warn!(%err, "failed to write ack to master");
            } else if let Err(err) = write_half.flush().await {
                warn!(%err, "failed to flush ack to master");
            }
        }
        Ok(_) => {}
        Err(err) => {
            warn!(command = %handler.name, %err, "replicated command failed");
        }
    }
}
