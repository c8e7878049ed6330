//! INFO command: named introspection sections.
//!
//! Sections are selected by name; with no arguments every supported section
//! is rendered. Unknown section names are skipped rather than rejected,
//! matching how redis-cli probes for sections.

use tracing::debug;

use crate::{
    commands::{CommandContext, CommandError, CommandResult, as_text},
    resp::RespValue,
};

const SECTION_REPLICATION: &str = "replication";

const SUPPORTED_SECTIONS: &[&str] = &[SECTION_REPLICATION];

/// INFO renders the requested sections as one bulk string.
pub fn info(ctx: &CommandContext, arguments: &[Vec<u8>]) -> Result<CommandResult, CommandError> {
    let sections: Vec<&str> = if arguments.is_empty() {
        SUPPORTED_SECTIONS.to_vec()
    } else {
        arguments
            .iter()
            .filter_map(|name| {
                let lower = as_text(name)?.to_lowercase();
                match SUPPORTED_SECTIONS.iter().find(|s| **s == lower) {
                    Some(section) => Some(*section),
                    None => {
                        debug!(section = %String::from_utf8_lossy(name), "unsupported INFO section");
                        None
                    }
                }
            })
            .collect()
    };

    let rendered: Vec<String> = sections
        .iter()
        .map(|section| match *section {
            SECTION_REPLICATION => replication_section(ctx),
            _ => unreachable!("section list is closed"),
        })
        .collect();

    Ok(CommandResult::Response(
        RespValue::BulkString(rendered.join("\n").into_bytes()).encode(),
    ))
}

fn replication_section(ctx: &CommandContext) -> String {
    format!(
        "# Replication\nrole:{}\nmaster_replid:{}\nmaster_repl_offset:{}",
        ctx.server.config.role.as_str(),
        ctx.server.repl_id,
        ctx.server.replicas.master_offset()
    )
}
