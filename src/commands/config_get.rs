use crate::{
    commands::{CommandContext, CommandError, CommandResult, as_text},
    config::Role,
    resp::RespValue,
};

pub struct ConfigGetArguments {
    parameter: String,
}

impl ConfigGetArguments {
    /// `CONFIG GET <parameter>`: the GET subcommand is validated by the
    /// dispatcher; only the parameter name arrives here.
    pub fn parse(arguments: &[Vec<u8>]) -> Result<Self, CommandError> {
        if arguments.len() != 2 || !arguments[0].eq_ignore_ascii_case(b"get") {
            return Err(CommandError::InvalidConfigGetCommand);
        }

        let parameter = as_text(&arguments[1])
            .ok_or(CommandError::InvalidConfigGetCommand)?
            .to_string();

        Ok(Self { parameter })
    }
}

/// CONFIG GET resolves a configuration parameter to `[name, value]`.
/// Unknown parameters yield an empty array, not an error.
pub fn config_get(
    ctx: &CommandContext,
    arguments: &[Vec<u8>],
) -> Result<CommandResult, CommandError> {
    let config_get_arguments = ConfigGetArguments::parse(arguments)?;
    let config = &ctx.server.config;

    let value = match config_get_arguments.parameter.to_lowercase().as_str() {
        "dir" => Some(config.dir.clone()),
        "dbfilename" => Some(config.dbfilename.clone()),
        "port" => Some(config.port.to_string()),
        "replicaof" => match &config.role {
            Role::Replica { host, port } => Some(format!("{} {}", host, port)),
            Role::Master => Some(String::new()),
        },
        _ => None,
    };

    let response = match value {
        Some(value) => RespValue::Array(vec![
            RespValue::BulkString(config_get_arguments.parameter.into_bytes()),
            RespValue::BulkString(value.into_bytes()),
        ]),
        None => RespValue::Array(Vec::new()),
    };

    Ok(CommandResult::Response(response.encode()))
}
