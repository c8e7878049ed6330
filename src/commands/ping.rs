use crate::{
    commands::{CommandError, CommandResult},
    resp::RespValue,
};

pub struct PingArguments;

impl PingArguments {
    pub fn parse(arguments: &[Vec<u8>]) -> Result<Self, CommandError> {
        if !arguments.is_empty() {
            return Err(CommandError::InvalidPingCommand);
        }

        Ok(Self)
    }
}

/// PING is a liveness check, also sent by the master over the replication
/// stream. Always answers PONG.
pub fn ping(arguments: &[Vec<u8>]) -> Result<CommandResult, CommandError> {
    PingArguments::parse(arguments)?;

    Ok(CommandResult::Response(
        RespValue::SimpleString("PONG".to_string()).encode(),
    ))
}
