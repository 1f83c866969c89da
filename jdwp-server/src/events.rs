// JDWP event encoding
//
// Events are sent from the server to the debugger as composite command
// packets (Event.Composite). A frozen snapshot never executes, so the only
// event actually emitted is VM_START; the other kinds exist so that event
// sets decode back to exactly what was encoded.

use crate::commands::{command_sets, event_kinds, event_set_commands};
use crate::protocol::{CommandPacket, JdwpError, JdwpResult};
use crate::reader::{read_i32, read_string, read_u64, read_u8};
use crate::types::*;
use crate::writer::write_string;
use bytes::BufMut;
use serde::{Deserialize, Serialize};

/// Composite event packet (can contain multiple events)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventSet {
    pub suspend_policy: u8,
    pub events: Vec<Event>,
}

/// Single event within an event set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub kind: u8,
    pub request_id: i32,
    pub details: EventKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum EventKind {
    VMStart {
        thread: ThreadId,
    },
    VMDeath,
    ThreadStart {
        thread: ThreadId,
    },
    ThreadDeath {
        thread: ThreadId,
    },
    ClassPrepare {
        thread: ThreadId,
        ref_type_tag: u8,
        ref_type: ReferenceTypeId,
        signature: String,
        status: i32,
    },
}

impl EventKind {
    pub fn kind(&self) -> u8 {
        match self {
            EventKind::VMStart { .. } => event_kinds::VM_START,
            EventKind::VMDeath => event_kinds::VM_DEATH,
            EventKind::ThreadStart { .. } => event_kinds::THREAD_START,
            EventKind::ThreadDeath { .. } => event_kinds::THREAD_DEATH,
            EventKind::ClassPrepare { .. } => event_kinds::CLASS_PREPARE,
        }
    }
}

impl EventSet {
    /// The composite event a debugger waits for before sending commands
    pub fn vm_start(suspend_policy: u8, thread: ThreadId) -> Self {
        Self {
            suspend_policy,
            events: vec![Event {
                kind: event_kinds::VM_START,
                request_id: 0,
                details: EventKind::VMStart { thread },
            }],
        }
    }

    /// Encode as an Event.Composite command packet
    pub fn to_packet(&self, id: u32) -> CommandPacket {
        let mut packet = CommandPacket::new(id, command_sets::EVENT, event_set_commands::COMPOSITE);
        self.encode_body(&mut packet.data);
        packet
    }

    pub fn encode_body<B: BufMut>(&self, buf: &mut B) {
        buf.put_u8(self.suspend_policy);
        buf.put_i32(self.events.len() as i32);

        for event in &self.events {
            buf.put_u8(event.kind);
            buf.put_i32(event.request_id);

            match &event.details {
                EventKind::VMStart { thread }
                | EventKind::ThreadStart { thread }
                | EventKind::ThreadDeath { thread } => buf.put_u64(*thread),
                EventKind::VMDeath => {}
                EventKind::ClassPrepare {
                    thread,
                    ref_type_tag,
                    ref_type,
                    signature,
                    status,
                } => {
                    buf.put_u64(*thread);
                    buf.put_u8(*ref_type_tag);
                    buf.put_u64(*ref_type);
                    write_string(buf, signature);
                    buf.put_i32(*status);
                }
            }
        }
    }
}

/// Parse the body of an Event.Composite packet
pub fn parse_event_packet(data: &[u8]) -> JdwpResult<EventSet> {
    let mut buf = data;

    // Read suspend policy
    let suspend_policy = read_u8(&mut buf)?;

    // Read number of events
    let event_count = read_i32(&mut buf)?;

    let mut events = Vec::with_capacity(event_count.max(0) as usize);

    for _ in 0..event_count {
        let kind = read_u8(&mut buf)?;
        let request_id = read_i32(&mut buf)?;

        let details = match kind {
            event_kinds::VM_START => {
                let thread = read_u64(&mut buf)?;
                EventKind::VMStart { thread }
            }
            event_kinds::VM_DEATH => EventKind::VMDeath,
            event_kinds::THREAD_START => {
                let thread = read_u64(&mut buf)?;
                EventKind::ThreadStart { thread }
            }
            event_kinds::THREAD_DEATH => {
                let thread = read_u64(&mut buf)?;
                EventKind::ThreadDeath { thread }
            }
            event_kinds::CLASS_PREPARE => {
                let thread = read_u64(&mut buf)?;
                let ref_type_tag = read_u8(&mut buf)?;
                let ref_type = read_u64(&mut buf)?;
                let signature = read_string(&mut buf)?;
                let status = read_i32(&mut buf)?;
                EventKind::ClassPrepare {
                    thread,
                    ref_type_tag,
                    ref_type,
                    signature,
                    status,
                }
            }
            _ => {
                return Err(JdwpError::Protocol(format!(
                    "Unsupported event kind: {}",
                    kind
                )))
            }
        };

        events.push(Event {
            kind,
            request_id,
            details,
        });
    }

    Ok(EventSet {
        suspend_policy,
        events,
    })
}
