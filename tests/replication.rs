use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;

use redlite::config::Config;
use redlite::rdb::empty_snapshot;
use redlite::replication::run_replication_client;
use redlite::resp::{RespValue, TrackingReader};
use redlite::server::{ServerContext, run_with_listener};
use redlite::store::Entry;

const GETACK_PROBE: &[u8] = b"*3\r\n$8\r\nREPLCONF\r\n$6\r\nGETACK\r\n$1\r\n*\r\n";

async fn start_master() -> (Arc<ServerContext>, SocketAddr) {
    let config = Config::from_args(vec!["redlite".to_string()]).unwrap();
    let ctx = Arc::new(ServerContext::new(config));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server_ctx = Arc::clone(&ctx);
    tokio::spawn(async move {
        let _ = run_with_listener(server_ctx, listener).await;
    });

    (ctx, addr)
}

async fn connect(addr: SocketAddr) -> (TrackingReader<OwnedReadHalf>, OwnedWriteHalf) {
    let stream = TcpStream::connect(addr).await.unwrap();
    let (read_half, write_half) = stream.into_split();

    (TrackingReader::new(read_half), write_half)
}

async fn send(writer: &mut OwnedWriteHalf, parts: &[&str]) {
    let frame = bulk_array(parts);

    writer.write_all(&frame.encode()).await.unwrap();
    writer.flush().await.unwrap();
}

async fn read_value(reader: &mut TrackingReader<OwnedReadHalf>) -> RespValue {
    timeout(Duration::from_secs(2), RespValue::read(reader))
        .await
        .expect("timed out reading frame")
        .expect("failed to parse frame")
}

fn bulk_array(parts: &[&str]) -> RespValue {
    RespValue::Array(
        parts
            .iter()
            .map(|part| RespValue::BulkString(part.as_bytes().to_vec()))
            .collect(),
    )
}

/// Polls `condition` for up to two seconds.
async fn eventually<F: Fn() -> bool>(condition: F, what: &str) {
    for _ in 0..200 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    panic!("condition never became true: {}", what);
}

#[tokio::test]
async fn test_handshake_full_resync_and_offset_accounting() {
    let (ctx, addr) = start_master().await;

    // --- Handshake, follower side driven by hand ---
    let (mut reader, mut writer) = connect(addr).await;

    send(&mut writer, &["PING"]).await;
    assert_eq!(
        read_value(&mut reader).await,
        RespValue::SimpleString("PONG".to_string())
    );

    send(&mut writer, &["REPLCONF", "listening-port", "6380"]).await;
    assert_eq!(
        read_value(&mut reader).await,
        RespValue::SimpleString("OK".to_string())
    );

    send(&mut writer, &["REPLCONF", "capa", "psync2"]).await;
    assert_eq!(
        read_value(&mut reader).await,
        RespValue::SimpleString("OK".to_string())
    );

    send(&mut writer, &["PSYNC", "?", "-1"]).await;
    let RespValue::SimpleString(fullresync) = read_value(&mut reader).await else {
        panic!("expected FULLRESYNC simple string");
    };

    let parts: Vec<&str> = fullresync.split_whitespace().collect();
    assert_eq!(parts.len(), 3);
    assert_eq!(parts[0], "FULLRESYNC");
    assert_eq!(parts[1], ctx.repl_id);
    assert_eq!(parts[1].len(), 40);
    assert_eq!(parts[2], "0");

    // --- Snapshot transfer: $<len> header, body, no trailing CRLF ---
    assert_eq!(reader.read_byte().await.unwrap(), b'$');
    let snapshot_len: usize = reader.read_line().await.unwrap().parse().unwrap();
    assert_eq!(snapshot_len, 18);

    let snapshot = reader.read_exact_bytes(snapshot_len).await.unwrap();
    assert_eq!(snapshot, empty_snapshot());

    eventually(|| ctx.replicas.len() == 1, "replica registered").await;

    // --- Broadcast accounting ---
    let (mut client_reader, mut client_writer) = connect(addr).await;

    send(&mut client_writer, &["SET", "x", "1"]).await;
    assert_eq!(
        read_value(&mut client_reader).await,
        RespValue::SimpleString("OK".to_string())
    );

    // The replica receives the original wire bytes of the command
    let replicated = read_value(&mut reader).await;
    assert_eq!(replicated, bulk_array(&["SET", "x", "1"]));

    let set_frame_len = replicated.encode().len() as u64;
    assert_eq!(ctx.replicas.master_offset(), set_frame_len);

    let replicas = ctx.replicas.all();
    assert_eq!(replicas.len(), 1);
    assert_eq!(replicas[0].pending_offset(), set_frame_len);
    assert!(replicas[0].needs_ack());

    // --- ACK ingestion through the handed-off connection ---
    send(
        &mut writer,
        &["REPLCONF", "ACK", &set_frame_len.to_string()],
    )
    .await;

    eventually(
        || ctx.replicas.all()[0].last_ack_offset() == set_frame_len,
        "ack recorded",
    )
    .await;
    assert!(!ctx.replicas.all()[0].needs_ack());

    // --- WAIT is satisfied without probing: the replica is caught up ---
    send(&mut client_writer, &["WAIT", "1", "500"]).await;
    assert_eq!(read_value(&mut client_reader).await, RespValue::Integer(1));
}

#[tokio::test]
async fn test_wait_times_out_and_probes_stragglers() {
    let (ctx, addr) = start_master().await;

    let (mut replica_reader, mut replica_writer) = connect(addr).await;

    // Abbreviated handshake: PSYNC is all the master needs
    send(&mut replica_writer, &["PSYNC", "?", "-1"]).await;
    let _fullresync = read_value(&mut replica_reader).await;
    assert_eq!(replica_reader.read_byte().await.unwrap(), b'$');
    let snapshot_len: usize = replica_reader.read_line().await.unwrap().parse().unwrap();
    replica_reader.read_exact_bytes(snapshot_len).await.unwrap();

    eventually(|| ctx.replicas.len() == 1, "replica registered").await;

    let (mut client_reader, mut client_writer) = connect(addr).await;
    send(&mut client_writer, &["SET", "x", "1"]).await;
    read_value(&mut client_reader).await;
    read_value(&mut replica_reader).await; // consume the replicated SET

    // The replica never acks: WAIT runs into its timeout and reports zero,
    // but it must have nudged the straggler with a GETACK probe.
    let started = tokio::time::Instant::now();
    send(&mut client_writer, &["WAIT", "1", "100"]).await;
    assert_eq!(read_value(&mut client_reader).await, RespValue::Integer(0));
    assert!(started.elapsed() >= Duration::from_millis(100));

    let probe = read_value(&mut replica_reader).await;
    assert_eq!(probe, bulk_array(&["REPLCONF", "GETACK", "*"]));
}

#[tokio::test]
async fn test_dead_replica_is_unregistered_on_disconnect() {
    let (ctx, addr) = start_master().await;

    let (mut replica_reader, mut replica_writer) = connect(addr).await;
    send(&mut replica_writer, &["PSYNC", "?", "-1"]).await;
    read_value(&mut replica_reader).await;
    assert_eq!(replica_reader.read_byte().await.unwrap(), b'$');
    let snapshot_len: usize = replica_reader.read_line().await.unwrap().parse().unwrap();
    replica_reader.read_exact_bytes(snapshot_len).await.unwrap();

    eventually(|| ctx.replicas.len() == 1, "replica registered").await;

    drop(replica_reader);
    drop(replica_writer);

    eventually(|| ctx.replicas.is_empty(), "replica unregistered").await;
}

#[tokio::test]
async fn test_follower_syncs_applies_and_acks() {
    let master_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let master_addr = master_listener.local_addr().unwrap();

    let config = Config::from_args(vec![
        "redlite".to_string(),
        "--replicaof".to_string(),
        format!("127.0.0.1 {}", master_addr.port()),
    ])
    .unwrap();
    let ctx = Arc::new(ServerContext::new(config));

    let follower_ctx = Arc::clone(&ctx);
    tokio::spawn(async move {
        let _ = run_replication_client(follower_ctx).await;
    });

    // --- Fake master: drive the handshake from the other side ---
    let (stream, _) = timeout(Duration::from_secs(2), master_listener.accept())
        .await
        .unwrap()
        .unwrap();
    let (read_half, mut writer) = stream.into_split();
    let mut reader = TrackingReader::new(read_half);

    assert_eq!(read_value(&mut reader).await, bulk_array(&["PING"]));
    writer.write_all(b"+PONG\r\n").await.unwrap();

    assert_eq!(
        read_value(&mut reader).await,
        bulk_array(&["REPLCONF", "listening-port", "6379"])
    );
    writer.write_all(b"+OK\r\n").await.unwrap();

    assert_eq!(
        read_value(&mut reader).await,
        bulk_array(&["REPLCONF", "capa", "psync2"])
    );
    writer.write_all(b"+OK\r\n").await.unwrap();

    assert_eq!(read_value(&mut reader).await, bulk_array(&["PSYNC", "?", "-1"]));
    writer
        .write_all(b"+FULLRESYNC 8371b4fb1155b71f4a04d3e1bc3e18c4a990aeeb 0\r\n")
        .await
        .unwrap();

    let snapshot = empty_snapshot();
    writer
        .write_all(format!("${}\r\n", snapshot.len()).as_bytes())
        .await
        .unwrap();
    writer.write_all(&snapshot).await.unwrap();
    writer.flush().await.unwrap();

    // The follower only serves once the snapshot is ingested
    timeout(Duration::from_secs(2), ctx.wait_ready())
        .await
        .expect("follower never became ready");

    // --- Streamed write command is applied silently ---
    let set_frame = bulk_array(&["SET", "foo", "bar"]).encode();
    writer.write_all(&set_frame).await.unwrap();
    writer.flush().await.unwrap();

    eventually(
        || ctx.store.get(b"foo") == Some(Entry::string("bar", None)),
        "replicated SET applied",
    )
    .await;

    // --- GETACK reports the bytes of fully processed commands, excluding
    // the GETACK frame itself ---
    writer.write_all(GETACK_PROBE).await.unwrap();
    writer.flush().await.unwrap();

    let expected_offset = set_frame.len();
    assert_eq!(
        read_value(&mut reader).await,
        bulk_array(&["REPLCONF", "ACK", &expected_offset.to_string()])
    );

    // A second probe now counts the first probe's bytes as processed
    writer.write_all(GETACK_PROBE).await.unwrap();
    writer.flush().await.unwrap();

    let expected_offset = set_frame.len() + GETACK_PROBE.len();
    assert_eq!(
        read_value(&mut reader).await,
        bulk_array(&["REPLCONF", "ACK", &expected_offset.to_string()])
    );
}
