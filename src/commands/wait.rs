//! WAIT command: block until enough replicas acknowledge the current write
//! offset, or until the timeout elapses.

use std::time::Duration;

use tokio::time::Instant;
use tracing::warn;

use crate::{
    commands::{CommandContext, CommandError, CommandResult, as_text},
    replication::ACK_THROTTLE,
    resp::RespValue,
};

const POLL_INTERVAL: Duration = Duration::from_millis(10);

pub struct WaitArguments {
    target_replicas: usize,
    timeout: Duration,
}

impl WaitArguments {
    pub fn parse(arguments: &[Vec<u8>]) -> Result<Self, CommandError> {
        if arguments.len() != 2 {
            return Err(CommandError::InvalidWaitCommand);
        }

        let target_replicas = as_text(&arguments[0])
            .and_then(|s| s.parse::<usize>().ok())
            .ok_or(CommandError::InvalidWaitArgument)?;

        let timeout_ms = as_text(&arguments[1])
            .and_then(|s| s.parse::<u64>().ok())
            .ok_or(CommandError::InvalidWaitArgument)?;

        Ok(Self {
            target_replicas,
            timeout: Duration::from_millis(timeout_ms),
        })
    }
}

/// WAIT polls the registry every 10 ms, counting replicas whose
/// acknowledged offset has caught up with their pending offset. Stragglers
/// are nudged with throttled GETACK probes; the probes run in their own
/// tasks so the poll cadence is unaffected. Returns the count reached when
/// either the target or the deadline is hit.
pub async fn wait(
    ctx: &CommandContext,
    arguments: &[Vec<u8>],
) -> Result<CommandResult, CommandError> {
    let wait_arguments = WaitArguments::parse(arguments)?;
    let deadline = Instant::now() + wait_arguments.timeout;

    loop {
        let replicas = ctx.server.replicas.all();
        let mut acked = 0;

        for replica in replicas {
            if !replica.needs_ack() {
                acked += 1;
                continue;
            }

            tokio::spawn(async move {
                if let Err(err) = replica.send_getack(ACK_THROTTLE).await {
                    warn!(addr = %replica.addr, %err, "GETACK probe failed");
                }
            });
        }

        if acked >= wait_arguments.target_replicas || Instant::now() >= deadline {
            return Ok(CommandResult::Response(
                RespValue::Integer(acked as i64).encode(),
            ));
        }

        tokio::time::sleep(POLL_INTERVAL).await;
    }
}
