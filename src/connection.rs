//! Per-connection command loop.
//!
//! Each inbound connection runs its own task: read a RESP array, dispatch,
//! execute, write the response. Write commands additionally fan their wire
//! bytes out to the replica registry. A PSYNC hands the connection off: the
//! write half is registered as a replication sink and the read half keeps
//! running only to ingest REPLCONF ACK frames.

use std::sync::Arc;

use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tracing::{debug, info, warn};

use crate::commands::{CommandContext, CommandHandler, CommandResult};
use crate::rdb::stream_snapshot;
use crate::resp::{RespError, RespValue, TrackingReader};
use crate::server::ServerContext;

pub async fn handle_client_connection(
    stream: TcpStream,
    ctx: Arc<ServerContext>,
    client_addr: String,
) {
    // A replica that has not finished syncing does not serve clients yet.
    ctx.wait_ready().await;

    debug!(%client_addr, "new connection");

    let (read_half, write_half) = stream.into_split();
    let mut reader = TrackingReader::new(read_half);
    let writer = Arc::new(tokio::sync::Mutex::new(write_half));

    let command_ctx = CommandContext {
        server: Arc::clone(&ctx),
        client_addr: client_addr.clone(),
        replica_stats: None,
    };

    loop {
        let value = match RespValue::read(&mut reader).await {
            Ok(value) => value,
            Err(RespError::ConnectionClosed) => {
                debug!(%client_addr, "connection closed");
                return;
            }
            Err(err) => {
                // Malformed framing: report and drop the connection.
                warn!(%client_addr, %err, "protocol error");
                let _ = write(&writer, err.as_string().as_bytes()).await;
                return;
            }
        };

        let handler = match CommandHandler::new(value) {
            Ok(handler) => handler,
            Err(err) => {
                if write(&writer, err.as_string().as_bytes()).await.is_err() {
                    return;
                }
                continue;
            }
        };

        let result = match handler.execute(&command_ctx).await {
            Ok(result) => result,
            Err(err) => {
                if write(&writer, err.as_string().as_bytes()).await.is_err() {
                    return;
                }
                continue;
            }
        };

        match result {
            CommandResult::Response(response) => {
                if write(&writer, &response).await.is_err() {
                    return;
                }

                if handler.is_write() {
                    ctx.replicas.broadcast(&handler.raw_bytes()).await;
                }
            }
            CommandResult::HandoffToReplication(response) => {
                if write(&writer, &response).await.is_err() {
                    return;
                }

                {
                    let mut writer_guard = writer.lock().await;
                    if let Err(err) =
                        stream_snapshot(&mut writer_guard, ctx.config.snapshot_path().as_deref())
                            .await
                    {
                        warn!(%client_addr, %err, "failed to stream snapshot to replica");
                        return;
                    }
                }

                ctx.replicas.register(client_addr.clone(), Arc::clone(&writer));
                info!(%client_addr, "connection handed off to replication");

                run_replica_ack_loop(reader, ctx, client_addr).await;
                return;
            }
        }
    }
}

/// Inbound side of a replica connection after PSYNC. The connection is a
/// one-way outbound replication sink from the master's point of view; the
/// only traffic a replica sends back is REPLCONF ACK, which updates the
/// registry and is never answered.
async fn run_replica_ack_loop(
    mut reader: TrackingReader<OwnedReadHalf>,
    ctx: Arc<ServerContext>,
    replica_addr: String,
) {
    loop {
        let value = match RespValue::read(&mut reader).await {
            Ok(value) => value,
            Err(err) => {
                debug!(%replica_addr, %err, "replica connection ended");
                ctx.replicas.unregister(&replica_addr);
                return;
            }
        };

        match parse_ack_offset(&value) {
            Some(offset) => ctx.replicas.record_ack(&replica_addr, offset),
            None => warn!(%replica_addr, "unexpected frame from replica"),
        }
    }
}

fn parse_ack_offset(value: &RespValue) -> Option<u64> {
    let RespValue::Array(items) = value else {
        return None;
    };

    match items.as_slice() {
        [
            RespValue::BulkString(cmd),
            RespValue::BulkString(sub),
            RespValue::BulkString(offset),
        ] if cmd.eq_ignore_ascii_case(b"replconf") && sub.eq_ignore_ascii_case(b"ack") => {
            std::str::from_utf8(offset).ok()?.parse::<u64>().ok()
        }
        _ => None,
    }
}

async fn write(
    writer: &Arc<tokio::sync::Mutex<OwnedWriteHalf>>,
    bytes: &[u8],
) -> std::io::Result<()> {
    let mut writer_guard = writer.lock().await;
    writer_guard.write_all(bytes).await?;
    writer_guard.flush().await
}
