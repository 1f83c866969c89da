// EventRequest command implementations
//
// Debuggers register a handful of lifecycle requests during start-up. A
// frozen VM never fires them, but accepting them keeps start-up going.
// Requests that depend on execution (breakpoints, steps, watches) are
// refused.

use crate::commands::{event_commands, event_kinds};
use crate::dispatcher::{CommandError, CommandResult, Dispatcher};
use crate::reader::{read_i32, read_u8};
use bytes::BufMut;
use tracing::debug;

/// Suspend policy for events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SuspendPolicy {
    None = 0,
    EventThread = 1,
    All = 2,
}

impl TryFrom<u8> for SuspendPolicy {
    type Error = CommandError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(SuspendPolicy::None),
            1 => Ok(SuspendPolicy::EventThread),
            2 => Ok(SuspendPolicy::All),
            other => Err(CommandError::IllegalArgument(format!(
                "unknown suspend policy {}",
                other
            ))),
        }
    }
}

/// Event kinds a snapshot can accept without ever reporting them
fn is_lifecycle_kind(kind: u8) -> bool {
    matches!(
        kind,
        event_kinds::CLASS_PREPARE
            | event_kinds::CLASS_UNLOAD
            | event_kinds::THREAD_START
            | event_kinds::THREAD_DEATH
            | event_kinds::VM_DEATH
    )
}

impl Dispatcher {
    pub(crate) fn event_request(&self, command: u8, data: &mut &[u8]) -> CommandResult<Vec<u8>> {
        let mut body = Vec::new();
        match command {
            event_commands::SET => {
                let kind = read_u8(data)?;
                let policy = SuspendPolicy::try_from(read_u8(data)?)?;
                if !is_lifecycle_kind(kind) {
                    return Err(CommandError::NotImplemented);
                }
                let request_id = self.next_request_id();
                debug!(
                    "Accepted event request {} (kind {}, policy {:?})",
                    request_id, kind, policy
                );
                body.put_i32(request_id);
            }
            event_commands::CLEAR => {
                read_u8(data)?;
                read_i32(data)?;
            }
            _ => return Err(CommandError::NotImplemented),
        }
        Ok(body)
    }
}
