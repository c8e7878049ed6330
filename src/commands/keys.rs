use crate::{
    commands::{CommandContext, CommandError, CommandResult},
    resp::RespValue,
};

pub struct KeysArguments;

impl KeysArguments {
    /// Only the literal `*` pattern is supported.
    pub fn parse(arguments: &[Vec<u8>]) -> Result<Self, CommandError> {
        if arguments.len() != 1 {
            return Err(CommandError::InvalidKeysCommand);
        }

        if arguments[0].as_slice() != b"*" {
            return Err(CommandError::UnsupportedKeysPattern);
        }

        Ok(Self)
    }
}

/// KEYS *: lists all live keys. Expired entries encountered during the scan
/// are evicted by the store.
pub fn keys(ctx: &CommandContext, arguments: &[Vec<u8>]) -> Result<CommandResult, CommandError> {
    KeysArguments::parse(arguments)?;

    let response = ctx
        .server
        .store
        .keys()
        .into_iter()
        .map(RespValue::BulkString)
        .collect();

    Ok(CommandResult::Response(RespValue::Array(response).encode()))
}
