use crate::{
    commands::{CommandContext, CommandError, CommandResult},
    resp::RespValue,
    store::DataType,
};

/// GET returns the value of a key, or the null bulk string when the key is
/// missing or expired. Expiry eviction happens inside the store's read path.
pub fn get(ctx: &CommandContext, arguments: &[Vec<u8>]) -> Result<CommandResult, CommandError> {
    if arguments.len() != 1 {
        return Err(CommandError::InvalidGetCommand);
    }

    let response = match ctx.server.store.get(&arguments[0]) {
        Some(entry) => match entry.data {
            DataType::String(value) => RespValue::BulkString(value),
        },
        None => RespValue::NullBulkString,
    };

    Ok(CommandResult::Response(response.encode()))
}
