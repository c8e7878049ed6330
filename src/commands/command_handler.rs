use crate::{
    commands::{
        CommandContext, CommandError, config_get::config_get, echo::echo, get::get, info::info,
        keys::keys, ping::ping, psync::psync, replconf::replconf, set::set, wait::wait,
    },
    resp::RespValue,
};

/// Commands whose serialized bytes are fanned out to replicas after a
/// successful response.
const WRITE_COMMANDS: &[&str] = &["SET"];

/// Outcome of executing a command.
#[derive(Debug, PartialEq)]
pub enum CommandResult {
    /// Encoded response to write back to the peer.
    Response(Vec<u8>),
    /// PSYNC: write the response, then stream the snapshot, register the
    /// connection as a replica and stop treating it as a client.
    HandoffToReplication(Vec<u8>),
}

/// A parsed command: uppercase name, raw-byte arguments and the original
/// value (re-encoded for replication fan-out).
#[derive(Debug, PartialEq, Clone)]
pub struct CommandHandler {
    pub name: String,
    pub arguments: Vec<Vec<u8>>,
    pub input: RespValue,
}

impl CommandHandler {
    /// Parses a RESP array of bulk strings into a command. The first element
    /// names the command, case-insensitively; argument payloads stay raw
    /// bytes.
    pub fn new(input: RespValue) -> Result<Self, CommandError> {
        let RespValue::Array(elements) = &input else {
            return Err(CommandError::InvalidCommand);
        };

        let name = match elements.first() {
            Some(RespValue::BulkString(bytes)) => std::str::from_utf8(bytes)
                .map_err(|_| CommandError::InvalidCommand)?
                .to_uppercase(),
            _ => return Err(CommandError::InvalidCommand),
        };

        let mut arguments: Vec<Vec<u8>> = Vec::with_capacity(elements.len() - 1);

        for element in &elements[1..] {
            let RespValue::BulkString(bytes) = element else {
                return Err(CommandError::InvalidCommand);
            };
            arguments.push(bytes.clone());
        }

        Ok(Self {
            name,
            arguments,
            input,
        })
    }

    /// Whether this command is replicated to followers.
    pub fn is_write(&self) -> bool {
        WRITE_COMMANDS.contains(&self.name.as_str())
    }

    /// Whether a follower writes this command's response back to the master
    /// (only REPLCONF GETACK).
    pub fn acks_to_master(&self) -> bool {
        self.name == "REPLCONF"
            && self
                .arguments
                .first()
                .is_some_and(|sub| sub.eq_ignore_ascii_case(b"getack"))
    }

    /// Wire bytes of the command as fanned out to replicas.
    pub fn raw_bytes(&self) -> Vec<u8> {
        self.input.encode()
    }

    /// Dispatches to the per-command handler.
    pub async fn execute(&self, ctx: &CommandContext) -> Result<CommandResult, CommandError> {
        match self.name.as_str() {
            "PING" => ping(&self.arguments),
            "ECHO" => echo(&self.arguments),
            "GET" => get(ctx, &self.arguments),
            "SET" => set(ctx, &self.arguments),
            "KEYS" => keys(ctx, &self.arguments),
            "CONFIG" => config_get(ctx, &self.arguments),
            "INFO" => info(ctx, &self.arguments),
            "REPLCONF" => replconf(ctx, &self.arguments),
            "PSYNC" => psync(ctx, &self.arguments),
            "WAIT" => wait(ctx, &self.arguments).await,
            _ => Err(CommandError::UnknownCommand(self.name.clone())),
        }
    }
}
