//! REPLCONF command: replication handshake configuration plus the ACK
//! exchange used for offset accounting.

use tracing::debug;

use crate::{
    commands::{CommandContext, CommandError, CommandResult, as_text},
    resp::RespValue,
};

/// REPLCONF handles three shapes:
///
/// * `GETACK *` (master → follower): answered with
///   `[REPLCONF, ACK, <bytes_read>]`; only valid on the master link, where
///   the byte counter exists.
/// * `ACK <offset>` (follower → master): records the replica's acknowledged
///   offset in the registry.
/// * `<key> <value> ...` pairs (handshake): accepted and logged.
pub fn replconf(
    ctx: &CommandContext,
    arguments: &[Vec<u8>],
) -> Result<CommandResult, CommandError> {
    let Some(subcommand) = arguments.first() else {
        return Err(CommandError::InvalidReplconfCommand);
    };

    if subcommand.eq_ignore_ascii_case(b"getack") {
        if arguments.len() != 2 || arguments[1].as_slice() != b"*" {
            return Err(CommandError::InvalidGetackArgument);
        }

        let Some(stats) = &ctx.replica_stats else {
            // GETACK only makes sense on the follower's master link.
            return Err(CommandError::InvalidReplconfCommand);
        };

        let response = RespValue::command([
            "REPLCONF".to_string(),
            "ACK".to_string(),
            stats.bytes_read().to_string(),
        ]);

        return Ok(CommandResult::Response(response.encode()));
    }

    if subcommand.eq_ignore_ascii_case(b"ack") {
        if arguments.len() != 2 {
            return Err(CommandError::InvalidReplconfCommand);
        }

        let offset = as_text(&arguments[1])
            .and_then(|s| s.parse::<u64>().ok())
            .ok_or(CommandError::InvalidAckOffset)?;

        ctx.server.replicas.record_ack(&ctx.client_addr, offset);

        return Ok(CommandResult::Response(
            RespValue::SimpleString("OK".to_string()).encode(),
        ));
    }

    // Handshake configuration pairs (listening-port, capa, ...)
    if arguments.len() % 2 != 0 {
        return Err(CommandError::InvalidReplconfCommand);
    }

    for pair in arguments.chunks(2) {
        debug!(
            key = %String::from_utf8_lossy(&pair[0]),
            value = %String::from_utf8_lossy(&pair[1]),
            "REPLCONF option"
        );
    }

    Ok(CommandResult::Response(
        RespValue::SimpleString("OK".to_string()).encode(),
    ))
}
