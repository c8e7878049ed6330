use thiserror::Error;

/// Semantic command failures: the RESP frame was well formed but the command
/// itself is wrong. These are reported to the client as an Error value and
/// never terminate the connection.
#[derive(Error, Debug, PartialEq)]
pub enum CommandError {
    #[error("expected an array of bulk strings")]
    InvalidCommand,
    #[error("unknown command '{0}'")]
    UnknownCommand(String),
    #[error("wrong number of arguments for 'PING' command")]
    InvalidPingCommand,
    #[error("wrong number of arguments for 'ECHO' command")]
    InvalidEchoCommand,
    #[error("wrong number of arguments for 'GET' command")]
    InvalidGetCommand,
    #[error("wrong number of arguments for 'SET' command")]
    InvalidSetCommand,
    #[error("unknown SET option '{0}'")]
    InvalidSetOption(String),
    #[error("PX value must be a non-negative integer")]
    InvalidSetExpiration,
    #[error("wrong number of arguments for 'KEYS' command")]
    InvalidKeysCommand,
    #[error("only KEYS * is supported")]
    UnsupportedKeysPattern,
    #[error("wrong number of arguments for 'CONFIG GET' command")]
    InvalidConfigGetCommand,
    #[error("wrong number of arguments for 'REPLCONF' command")]
    InvalidReplconfCommand,
    #[error("REPLCONF GETACK requires '*'")]
    InvalidGetackArgument,
    #[error("invalid offset in REPLCONF ACK")]
    InvalidAckOffset,
    #[error("wrong number of arguments for 'PSYNC' command")]
    InvalidPsyncCommand,
    #[error("invalid PSYNC replication ID")]
    InvalidPsyncReplicationId,
    #[error("invalid PSYNC offset")]
    InvalidPsyncOffset,
    #[error("wrong number of arguments for 'WAIT' command")]
    InvalidWaitCommand,
    #[error("invalid WAIT command argument")]
    InvalidWaitArgument,
}

impl CommandError {
    /// Encoded RESP error ready to be written to the client.
    pub fn as_string(&self) -> String {
        format!("-ERR {}\r\n", self)
    }
}
