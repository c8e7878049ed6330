use crate::{
    commands::{CommandContext, CommandError, CommandResult, as_text},
    resp::RespValue,
};

pub struct PsyncArguments {
    replication_id: String,
    offset: i64,
}

impl PsyncArguments {
    /// `PSYNC <replid> <offset>`; a first-time follower sends `? -1`.
    pub fn parse(arguments: &[Vec<u8>]) -> Result<Self, CommandError> {
        if arguments.len() != 2 {
            return Err(CommandError::InvalidPsyncCommand);
        }

        let replication_id = as_text(&arguments[0])
            .ok_or(CommandError::InvalidPsyncReplicationId)?
            .to_string();

        let offset = as_text(&arguments[1])
            .and_then(|s| s.parse::<i64>().ok())
            .ok_or(CommandError::InvalidPsyncOffset)?;

        Ok(Self {
            replication_id,
            offset,
        })
    }
}

/// PSYNC always grants a full resync: the response names this master's
/// replication ID, and the connection loop follows up by streaming the
/// snapshot and registering the connection as a replica. The returned
/// variant hands connection ownership off to that path.
pub fn psync(ctx: &CommandContext, arguments: &[Vec<u8>]) -> Result<CommandResult, CommandError> {
    let psync_arguments = PsyncArguments::parse(arguments)?;

    if psync_arguments.replication_id != "?"
        && psync_arguments.replication_id != ctx.server.repl_id
    {
        return Err(CommandError::InvalidPsyncReplicationId);
    }

    if psync_arguments.offset != -1 {
        return Err(CommandError::InvalidPsyncOffset);
    }

    Ok(CommandResult::HandoffToReplication(
        RespValue::SimpleString(format!("FULLRESYNC {} 0", ctx.server.repl_id)).encode(),
    ))
}
