use jiff::{SignedDuration, Timestamp};

use crate::{
    commands::{CommandContext, CommandError, CommandResult, as_text},
    resp::RespValue,
    store::Entry,
};

pub struct SetArguments {
    key: Vec<u8>,
    value: Vec<u8>,
    expire_at: Option<Timestamp>,
}

impl SetArguments {
    /// `SET key value [PX <milliseconds>]`. Key and value are raw bytes; the
    /// PX value is ASCII and converted to an absolute expiry at parse time.
    pub fn parse(arguments: &[Vec<u8>]) -> Result<Self, CommandError> {
        if arguments.len() != 2 && arguments.len() != 4 {
            return Err(CommandError::InvalidSetCommand);
        }

        let mut expire_at: Option<Timestamp> = None;

        if arguments.len() == 4 {
            if !arguments[2].eq_ignore_ascii_case(b"px") {
                return Err(CommandError::InvalidSetOption(
                    String::from_utf8_lossy(&arguments[2]).into_owned(),
                ));
            }

            let ttl_millis = as_text(&arguments[3])
                .and_then(|s| s.parse::<u64>().ok())
                .ok_or(CommandError::InvalidSetExpiration)?;

            expire_at = Some(
                Timestamp::now()
                    .checked_add(SignedDuration::from_millis(ttl_millis as i64))
                    .map_err(|_| CommandError::InvalidSetExpiration)?,
            );
        }

        Ok(Self {
            key: arguments[0].clone(),
            value: arguments[1].clone(),
            expire_at,
        })
    }
}

/// SET stores a string value, optionally with a millisecond TTL.
pub fn set(ctx: &CommandContext, arguments: &[Vec<u8>]) -> Result<CommandResult, CommandError> {
    let set_arguments = SetArguments::parse(arguments)?;

    ctx.server.store.set(
        set_arguments.key,
        Entry::string(set_arguments.value, set_arguments.expire_at),
    );

    Ok(CommandResult::Response(
        RespValue::SimpleString("OK".to_string()).encode(),
    ))
}
