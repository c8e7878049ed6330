use crate::{
    commands::{CommandError, CommandResult},
    resp::RespValue,
};

pub struct EchoArguments {
    message: Vec<u8>,
}

impl EchoArguments {
    pub fn parse(arguments: &[Vec<u8>]) -> Result<Self, CommandError> {
        if arguments.len() != 1 {
            return Err(CommandError::InvalidEchoCommand);
        }

        Ok(Self {
            message: arguments[0].clone(),
        })
    }
}

/// ECHO returns its argument unchanged, as a simple string.
pub fn echo(arguments: &[Vec<u8>]) -> Result<CommandResult, CommandError> {
    let echo_arguments = EchoArguments::parse(arguments)?;

    Ok(CommandResult::Response(
        RespValue::SimpleString(String::from_utf8_lossy(&echo_arguments.message).into_owned())
            .encode(),
    ))
}
