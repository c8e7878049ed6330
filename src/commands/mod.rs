//! Command parsing, classification and execution.
//!
//! A command arrives as a RESP array of bulk strings. [`CommandHandler`]
//! extracts the uppercase name and arguments, classifies the command (write,
//! handoff, acks-to-master) and dispatches to the per-command handler
//! modules.

mod command_error;
mod command_handler;
mod config_get;
mod echo;
mod get;
mod info;
mod keys;
mod ping;
mod psync;
mod replconf;
mod set;
mod wait;

use std::sync::Arc;

use crate::replication::ReplicaStats;
use crate::server::ServerContext;

pub use command_error::CommandError;
pub use command_handler::{CommandHandler, CommandResult};

/// Everything a command handler can reach during execution.
pub struct CommandContext {
    pub server: Arc<ServerContext>,
    /// Peer address of the connection the command arrived on. Used to
    /// attribute REPLCONF ACK frames to the right replica.
    pub client_addr: String,
    /// Present only on the follower's master-link loop; backs the offset
    /// reported by REPLCONF GETACK.
    pub replica_stats: Option<Arc<ReplicaStats>>,
}

/// Arguments arrive as raw bytes; options, numbers and subcommand names are
/// ASCII text. Returns `None` for payloads that are not valid text.
pub(crate) fn as_text(argument: &[u8]) -> Option<&str> {
    std::str::from_utf8(argument).ok()
}
