// Command dispatcher
//
// Routes each command packet by its (command set, command) pair and turns
// the outcome into a reply carrying the same id. Handlers live in one file
// per command set, each adding an `impl Dispatcher` block.

use crate::commands::{command_sets, suspend_policy};
use crate::events::EventSet;
use crate::model::{DebugModel, ModelError, RefKind};
use crate::protocol::{error_codes, error_name, CommandPacket, JdwpError, ReplyPacket};
use crate::reader::read_i32;
use crate::session::CloseReason;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

pub type CommandResult<T> = Result<T, CommandError>;

/// Per-request failure; each variant is one JDWP error code
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("not supported against a frozen snapshot")]
    NotImplemented,

    #[error("invalid thread {0}")]
    InvalidThread(u64),

    #[error("invalid thread group {0}")]
    InvalidThreadGroup(u64),

    #[error("invalid object {0}")]
    InvalidObject(u64),

    #[error("invalid class {0}")]
    InvalidClass(u64),

    #[error("invalid method {0}")]
    InvalidMethod(u64),

    #[error("invalid field {0}")]
    InvalidField(u64),

    #[error("invalid frame {0}")]
    InvalidFrame(u64),

    #[error("invalid slot {0}")]
    InvalidSlot(i32),

    #[error("absent information: {0}")]
    AbsentInformation(String),

    #[error("illegal argument: {0}")]
    IllegalArgument(String),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("invalid index {0}")]
    InvalidIndex(i64),

    #[error("invalid length {0}")]
    InvalidLength(i64),

    #[error("object {0} is not a string")]
    InvalidString(u64),

    #[error("object {0} is not an array")]
    InvalidArray(u64),

    #[error("object {0} is not a class loader")]
    InvalidClassLoader(u64),
}

impl CommandError {
    pub fn error_code(&self) -> u16 {
        match self {
            CommandError::NotImplemented => error_codes::NOT_IMPLEMENTED,
            CommandError::InvalidThread(_) => error_codes::INVALID_THREAD,
            CommandError::InvalidThreadGroup(_) => error_codes::INVALID_THREAD_GROUP,
            CommandError::InvalidObject(_) => error_codes::INVALID_OBJECT,
            CommandError::InvalidClass(_) => error_codes::INVALID_CLASS,
            CommandError::InvalidMethod(_) => error_codes::INVALID_METHODID,
            CommandError::InvalidField(_) => error_codes::INVALID_FIELDID,
            CommandError::InvalidFrame(_) => error_codes::INVALID_FRAMEID,
            CommandError::InvalidSlot(_) => error_codes::INVALID_SLOT,
            CommandError::AbsentInformation(_) => error_codes::ABSENT_INFORMATION,
            CommandError::IllegalArgument(_) => error_codes::ILLEGAL_ARGUMENT,
            CommandError::Internal(_) => error_codes::INTERNAL,
            CommandError::InvalidIndex(_) => error_codes::INVALID_INDEX,
            CommandError::InvalidLength(_) => error_codes::INVALID_LENGTH,
            CommandError::InvalidString(_) => error_codes::INVALID_STRING,
            CommandError::InvalidArray(_) => error_codes::INVALID_ARRAY,
            CommandError::InvalidClassLoader(_) => error_codes::INVALID_CLASS_LOADER,
        }
    }
}

impl From<ModelError> for CommandError {
    fn from(err: ModelError) -> Self {
        match err {
            ModelError::InvalidReference { kind, id } => match kind {
                RefKind::Object => CommandError::InvalidObject(id),
                RefKind::Type => CommandError::InvalidClass(id),
                RefKind::Method => CommandError::InvalidMethod(id),
                RefKind::Field => CommandError::InvalidField(id),
                RefKind::Frame => CommandError::InvalidFrame(id),
                RefKind::Thread => CommandError::InvalidThread(id),
                RefKind::ThreadGroup => CommandError::InvalidThreadGroup(id),
            },
            ModelError::InvalidIndex { index, .. } => CommandError::InvalidIndex(index),
            ModelError::InvalidLength { requested, .. } => CommandError::InvalidLength(requested),
            ModelError::InvalidSlot { slot } => CommandError::InvalidSlot(slot),
            ModelError::InvalidTag(_) => CommandError::IllegalArgument(err.to_string()),
            ModelError::AbsentInformation(what) => CommandError::AbsentInformation(what),
            ModelError::NotAString(id) => CommandError::InvalidString(id),
            ModelError::NotAnArray(id) => CommandError::InvalidArray(id),
            ModelError::NotAClassLoader(id) => CommandError::InvalidClassLoader(id),
            ModelError::NotAClassObject(id) => CommandError::InvalidObject(id),
            ModelError::Unreadable { .. } | ModelError::SnapshotIo(_) | ModelError::Malformed(_) => {
                CommandError::Internal(err.to_string())
            }
        }
    }
}

/// Decoding a command body only fails when it is too short or malformed
impl From<JdwpError> for CommandError {
    fn from(err: JdwpError) -> Self {
        CommandError::IllegalArgument(err.to_string())
    }
}

/// A `maxInstances` or `maxReferrers` argument; 0 means no limit
pub(crate) fn read_limit(data: &mut &[u8]) -> CommandResult<usize> {
    let max = read_i32(data)?;
    usize::try_from(max).map_err(|_| CommandError::IllegalArgument(format!("negative limit {}", max)))
}

/// What the session does after sending a reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disposition {
    Continue,
    Close(CloseReason),
}

/// A handler's reply body, and whether the session ends once it is sent
#[derive(Debug, Default)]
pub(crate) struct Handled {
    pub(crate) body: Vec<u8>,
    pub(crate) close: Option<CloseReason>,
}

impl From<Vec<u8>> for Handled {
    fn from(body: Vec<u8>) -> Self {
        Self { body, close: None }
    }
}

pub struct Dispatcher {
    pub(crate) model: Arc<DebugModel>,
    next_request_id: AtomicI32,
}

impl Dispatcher {
    pub fn new(model: Arc<DebugModel>) -> Self {
        Self {
            model,
            next_request_id: AtomicI32::new(1),
        }
    }

    pub fn model(&self) -> &Arc<DebugModel> {
        &self.model
    }

    /// Fresh id for an accepted event request
    pub(crate) fn next_request_id(&self) -> i32 {
        self.next_request_id.fetch_add(1, Ordering::Relaxed)
    }

    /// The composite event sent right after the handshake
    pub fn vm_start_event(&self) -> EventSet {
        let thread = match self.model.threads() {
            Ok(threads) => threads.first().map(|t| t.id).unwrap_or(0),
            Err(err) => {
                warn!("Cannot enumerate threads for VM start: {}", err);
                0
            }
        };
        EventSet::vm_start(suspend_policy::ALL, thread)
    }

    pub fn dispatch(&self, packet: &CommandPacket) -> (ReplyPacket, Disposition) {
        debug!(
            "Command id={} set={} cmd={} ({} bytes)",
            packet.id,
            packet.command_set,
            packet.command,
            packet.data.len()
        );

        let mut data = packet.data.as_slice();
        let command = packet.command;
        let result = match packet.command_set {
            command_sets::VIRTUAL_MACHINE => self.virtual_machine(command, &mut data),
            command_sets::REFERENCE_TYPE => self.reference_type(command, &mut data).map(Handled::from),
            command_sets::CLASS_TYPE => self.class_type(command, &mut data).map(Handled::from),
            command_sets::METHOD => self.method(command, &mut data).map(Handled::from),
            command_sets::OBJECT_REFERENCE => self.object_reference(command, &mut data).map(Handled::from),
            command_sets::STRING_REFERENCE => self.string_reference(command, &mut data).map(Handled::from),
            command_sets::THREAD_REFERENCE => self.thread_reference(command, &mut data).map(Handled::from),
            command_sets::THREAD_GROUP_REFERENCE => {
                self.thread_group_reference(command, &mut data).map(Handled::from)
            }
            command_sets::ARRAY_REFERENCE => self.array_reference(command, &mut data).map(Handled::from),
            command_sets::EVENT_REQUEST => self.event_request(command, &mut data).map(Handled::from),
            command_sets::STACK_FRAME => self.stack_frame(command, &mut data).map(Handled::from),
            command_sets::CLASS_LOADER_REFERENCE => {
                self.class_loader_reference(command, &mut data).map(Handled::from)
            }
            command_sets::CLASS_OBJECT_REFERENCE => {
                self.class_object_reference(command, &mut data).map(Handled::from)
            }
            _ => Err(CommandError::NotImplemented),
        };

        match result {
            Ok(handled) => {
                let disposition = match handled.close {
                    Some(reason) => Disposition::Close(reason),
                    None => Disposition::Continue,
                };
                (ReplyPacket::new(packet.id, error_codes::NONE, handled.body), disposition)
            }
            Err(err) => {
                match err {
                    CommandError::NotImplemented => debug!(
                        "Command {}/{} not supported against a snapshot",
                        packet.command_set, packet.command
                    ),
                    _ => warn!(
                        "Command {}/{} id={} failed with {}: {}",
                        packet.command_set,
                        packet.command,
                        packet.id,
                        error_name(err.error_code()),
                        err
                    ),
                }
                (ReplyPacket::error(packet.id, err.error_code()), Disposition::Continue)
            }
        }
    }
}
