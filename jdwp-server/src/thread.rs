// ThreadReference command implementations
//
// Commands for working with threads (name, status, group and frames).
// Every thread of a snapshot is permanently suspended.

use crate::commands::thread_commands;
use crate::dispatcher::{CommandError, CommandResult, Dispatcher};
use crate::reader::{read_i32, read_u64};
use crate::types::SuspendStatus;
use crate::writer::{write_location, write_string};
use bytes::BufMut;

/// Resolve a (start, length) request against `count` frames; length -1 means all
fn frame_range(start: i32, length: i32, count: usize) -> CommandResult<std::ops::Range<usize>> {
    if start < 0 || start as usize > count {
        return Err(CommandError::InvalidIndex(start as i64));
    }
    let start = start as usize;
    let end = match length {
        -1 => count,
        n if n < 0 || start + n as usize > count => {
            return Err(CommandError::InvalidLength(n as i64))
        }
        n => start + n as usize,
    };
    Ok(start..end)
}

impl Dispatcher {
    pub(crate) fn thread_reference(&self, command: u8, data: &mut &[u8]) -> CommandResult<Vec<u8>> {
        if !matches!(
            command,
            thread_commands::NAME
                | thread_commands::STATUS
                | thread_commands::THREAD_GROUP
                | thread_commands::FRAMES
                | thread_commands::FRAME_COUNT
                | thread_commands::SUSPEND_COUNT
        ) {
            return Err(CommandError::NotImplemented);
        }

        let thread = self.model.thread(read_u64(data)?)?;
        let mut body = Vec::new();
        match command {
            thread_commands::NAME => write_string(&mut body, &thread.name),
            thread_commands::STATUS => {
                body.put_i32(thread.status as i32);
                body.put_i32(SuspendStatus::Suspended as i32);
            }
            thread_commands::THREAD_GROUP => body.put_u64(thread.group),
            thread_commands::FRAMES => {
                let start = read_i32(data)?;
                let length = read_i32(data)?;
                let frames = self.model.frames(thread.id)?;
                let range = frame_range(start, length, frames.len())?;

                body.put_i32(range.len() as i32);
                for frame in &frames[range] {
                    body.put_u64(frame.id);
                    write_location(&mut body, &frame.location);
                }
            }
            thread_commands::FRAME_COUNT => body.put_i32(self.model.frames(thread.id)?.len() as i32),
            _ => body.put_i32(1),
        }
        Ok(body)
    }
}
