//! Follower side of the replication handshake.
//!
//! PING, then REPLCONF listening-port and capa, then PSYNC. The master
//! answers PSYNC with `+FULLRESYNC <replid> <offset>` followed by the
//! snapshot as `$<len>\r\n<bytes>`; unlike a bulk string, the snapshot body
//! has no trailing CRLF.

use regex::Regex;
use tokio::io::{AsyncRead, AsyncWriteExt};
use tokio::net::tcp::OwnedWriteHalf;
use tracing::{debug, info};

use crate::replication::ReplicationError;
use crate::resp::{RespValue, TrackingReader};

/// Performs the handshake up to and including the FULLRESYNC reply.
/// The snapshot transfer that follows is handled by the caller.
pub async fn handshake<R>(
    reader: &mut TrackingReader<R>,
    writer: &mut OwnedWriteHalf,
    listening_port: u16,
) -> Result<(), ReplicationError>
where
    R: AsyncRead + Unpin + Send,
{
    debug!("handshake: sending PING");
    let reply = exchange(reader, writer, RespValue::command(["PING"])).await?;
    expect_simple_string(&reply, "PONG")?;

    debug!("handshake: sending REPLCONF listening-port");
    let reply = exchange(
        reader,
        writer,
        RespValue::command([
            "REPLCONF".to_string(),
            "listening-port".to_string(),
            listening_port.to_string(),
        ]),
    )
    .await?;
    expect_simple_string(&reply, "OK")?;

    debug!("handshake: sending REPLCONF capa");
    let reply = exchange(reader, writer, RespValue::command(["REPLCONF", "capa", "psync2"])).await?;
    expect_simple_string(&reply, "OK")?;

    debug!("handshake: sending PSYNC");
    let reply = exchange(reader, writer, RespValue::command(["PSYNC", "?", "-1"])).await?;

    let RespValue::SimpleString(line) = reply else {
        return Err(ReplicationError::UnexpectedReply(
            String::from_utf8_lossy(&reply.encode()).into_owned(),
        ));
    };

    let parts: Vec<&str> = line.split_whitespace().collect();

    if parts.len() != 3 || parts[0] != "FULLRESYNC" || !is_valid_replication_id(parts[1]) {
        return Err(ReplicationError::UnexpectedReply(line));
    }

    info!(replid = parts[1], offset = parts[2], "full resync granted");
    Ok(())
}

/// Reads the `$<len>\r\n` snapshot header and returns the body length.
pub async fn read_snapshot_header<R>(
    reader: &mut TrackingReader<R>,
) -> Result<u64, ReplicationError>
where
    R: AsyncRead + Unpin,
{
    let prefix = reader.read_byte().await?;

    if prefix != b'$' {
        return Err(ReplicationError::UnexpectedReply(
            (prefix as char).to_string(),
        ));
    }

    let line = reader.read_line().await?;

    line.parse::<u64>()
        .map_err(|_| ReplicationError::UnexpectedReply(line))
}

async fn exchange<R>(
    reader: &mut TrackingReader<R>,
    writer: &mut OwnedWriteHalf,
    command: RespValue,
) -> Result<RespValue, ReplicationError>
where
    R: AsyncRead + Unpin + Send,
{
    writer.write_all(&command.encode()).await?;
    writer.flush().await?;

    Ok(RespValue::read(reader).await?)
}

fn expect_simple_string(reply: &RespValue, expected: &str) -> Result<(), ReplicationError> {
    if *reply != RespValue::SimpleString(expected.to_string()) {
        return Err(ReplicationError::UnexpectedReply(
            String::from_utf8_lossy(&reply.encode()).into_owned(),
        ));
    }

    Ok(())
}

fn is_valid_replication_id(replication_id: &str) -> bool {
    let re = Regex::new(r"^[a-zA-Z0-9]{40}$").unwrap();
    re.is_match(replication_id)
}

#[cfg(test)]
mod tests {
    use super::is_valid_replication_id;

    #[test]
    fn test_is_valid_replication_id() {
        let test_cases = [
            ("8371b4fb1155b71f4a04d3e1bc3e18c4a990aeeb", true),
            ("8371b4fb1155b71f4a04d3e1bc3e18c4a990aee", false),
            ("8371b4fb1155b71f4a04d3e1bc3e18c4a990aeebb", false),
            ("8371b4fb1155b71f4a04d3e1bc3e18c4a990aee!", false),
            ("", false),
        ];

        for (input, expected) in test_cases {
            assert_eq!(is_valid_replication_id(input), expected, "input: {}", input);
        }
    }
}
