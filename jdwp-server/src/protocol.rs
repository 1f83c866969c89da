// JDWP protocol definitions and packet handling
//
// Reference: https://docs.oracle.com/javase/8/docs/platform/jpda/jdwp/jdwp-protocol.html
//
// The server side of the wire: command packets are decoded from the debugger,
// reply and event packets are encoded back to it.

use bytes::{Buf, BufMut, BytesMut};
use thiserror::Error;

// JDWP uses big-endian (network byte order) for all multi-byte values
// This is architecture-independent (works on Intel, ARM M1/M2/M3, etc.)

pub type JdwpResult<T> = Result<T, JdwpError>;

#[derive(Debug, Error)]
pub enum JdwpError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Invalid handshake")]
    InvalidHandshake,

    #[error("Packet too large: {size} bytes (max: {max} bytes)")]
    PacketTooLarge { size: usize, max: usize },

    #[error("Unsupported JVM version: {0}")]
    UnsupportedVersion(String),

    #[error("Attach failed: {0}")]
    Attach(#[from] crate::provider::AttachError),

    #[error("Snapshot adapter error: {0}")]
    Adapter(crate::adapter::AdapterError),

    #[error("Connection closed")]
    ConnectionClosed,
}

// JDWP handshake string
pub const JDWP_HANDSHAKE: &[u8] = b"JDWP-Handshake";

// Packet structure:
// length (4 bytes) - includes header
// id (4 bytes)
// flags (1 byte) - 0x00 = command, 0x80 = reply
// [Command packet: command set (1 byte) + command (1 byte)]
// [Reply packet: error code (2 bytes)]
// data (variable)

pub const HEADER_SIZE: usize = 11;
pub const REPLY_FLAG: u8 = 0x80;

/// Default upper bound for an incoming packet (10MB)
pub const DEFAULT_MAX_PACKET_SIZE: usize = 10 * 1024 * 1024;

/// JDWP error codes used in reply packets
pub mod error_codes {
    pub const NONE: u16 = 0;
    pub const INVALID_THREAD: u16 = 10;
    pub const INVALID_THREAD_GROUP: u16 = 11;
    pub const INVALID_OBJECT: u16 = 20;
    pub const INVALID_CLASS: u16 = 21;
    pub const INVALID_METHODID: u16 = 23;
    pub const INVALID_FIELDID: u16 = 25;
    pub const INVALID_FRAMEID: u16 = 30;
    pub const INVALID_SLOT: u16 = 35;
    pub const NOT_IMPLEMENTED: u16 = 99;
    pub const ABSENT_INFORMATION: u16 = 101;
    pub const ILLEGAL_ARGUMENT: u16 = 103;
    pub const INTERNAL: u16 = 113;
    pub const INVALID_INDEX: u16 = 503;
    pub const INVALID_LENGTH: u16 = 504;
    pub const INVALID_STRING: u16 = 506;
    pub const INVALID_CLASS_LOADER: u16 = 507;
    pub const INVALID_ARRAY: u16 = 508;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandPacket {
    pub id: u32,
    pub command_set: u8,
    pub command: u8,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyPacket {
    pub id: u32,
    pub error_code: u16,
    pub data: Vec<u8>,
}

impl CommandPacket {
    pub fn new(id: u32, command_set: u8, command: u8) -> Self {
        Self {
            id,
            command_set,
            command,
            data: Vec::new(),
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let length = HEADER_SIZE + self.data.len();
        let mut buf = BytesMut::with_capacity(length);

        buf.put_u32(length as u32);
        buf.put_u32(self.id);
        buf.put_u8(0x00); // command flag
        buf.put_u8(self.command_set);
        buf.put_u8(self.command);
        buf.put_slice(&self.data);

        buf.to_vec()
    }

    /// Decode a complete command packet (header included)
    pub fn decode(mut buf: &[u8]) -> JdwpResult<Self> {
        if buf.len() < HEADER_SIZE {
            return Err(JdwpError::Protocol("Command packet too short".to_string()));
        }

        let length = buf.get_u32() as usize;
        if length != buf.len() + 4 {
            return Err(JdwpError::Protocol(format!(
                "Command packet length mismatch: header says {}, got {}",
                length,
                buf.len() + 4
            )));
        }

        let id = buf.get_u32();
        let flags = buf.get_u8();

        if flags & REPLY_FLAG != 0 {
            return Err(JdwpError::Protocol(format!("Unexpected reply flag: {:#x}", flags)));
        }

        let command_set = buf.get_u8();
        let command = buf.get_u8();
        let data = buf.to_vec();

        Ok(Self {
            id,
            command_set,
            command,
            data,
        })
    }
}

impl ReplyPacket {
    pub fn new(id: u32, error_code: u16, data: Vec<u8>) -> Self {
        Self {
            id,
            error_code,
            data,
        }
    }

    /// Reply with an error code and an empty body
    pub fn error(id: u32, error_code: u16) -> Self {
        Self::new(id, error_code, Vec::new())
    }

    pub fn encode(&self) -> Vec<u8> {
        let length = HEADER_SIZE + self.data.len();
        let mut buf = BytesMut::with_capacity(length);

        buf.put_u32(length as u32);
        buf.put_u32(self.id);
        buf.put_u8(REPLY_FLAG);
        buf.put_u16(self.error_code);
        buf.put_slice(&self.data);

        buf.to_vec()
    }

    pub fn decode(mut buf: &[u8]) -> JdwpResult<Self> {
        if buf.len() < HEADER_SIZE {
            return Err(JdwpError::Protocol("Reply packet too short".to_string()));
        }

        let _length = buf.get_u32();
        let id = buf.get_u32();
        let flags = buf.get_u8();

        if flags != REPLY_FLAG {
            return Err(JdwpError::Protocol(format!("Invalid reply flag: {:#x}", flags)));
        }

        let error_code = buf.get_u16();
        let data = buf.to_vec();

        Ok(Self {
            id,
            error_code,
            data,
        })
    }

    pub fn is_error(&self) -> bool {
        self.error_code != 0
    }

    pub fn error_message(&self) -> &'static str {
        error_name(self.error_code)
    }
}

/// Symbolic name of a JDWP error code
pub fn error_name(code: u16) -> &'static str {
    use error_codes::*;
    match code {
        NONE => "NONE",
        INVALID_THREAD => "INVALID_THREAD",
        INVALID_THREAD_GROUP => "INVALID_THREAD_GROUP",
        INVALID_OBJECT => "INVALID_OBJECT",
        INVALID_CLASS => "INVALID_CLASS",
        INVALID_METHODID => "INVALID_METHODID",
        INVALID_FIELDID => "INVALID_FIELDID",
        INVALID_FRAMEID => "INVALID_FRAMEID",
        INVALID_SLOT => "INVALID_SLOT",
        NOT_IMPLEMENTED => "NOT_IMPLEMENTED",
        ABSENT_INFORMATION => "ABSENT_INFORMATION",
        ILLEGAL_ARGUMENT => "ILLEGAL_ARGUMENT",
        INTERNAL => "INTERNAL",
        INVALID_INDEX => "INVALID_INDEX",
        INVALID_LENGTH => "INVALID_LENGTH",
        INVALID_STRING => "INVALID_STRING",
        INVALID_CLASS_LOADER => "INVALID_CLASS_LOADER",
        INVALID_ARRAY => "INVALID_ARRAY",
        // Codes this server never sends
        _ => "UNKNOWN_ERROR",
    }
}

/// Parsed fixed-size header, common to commands and replies
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketHeader {
    pub length: usize,
    pub id: u32,
    pub flags: u8,
}

impl PacketHeader {
    pub fn parse(header: &[u8; HEADER_SIZE]) -> Self {
        let length = u32::from_be_bytes([header[0], header[1], header[2], header[3]]) as usize;
        let id = u32::from_be_bytes([header[4], header[5], header[6], header[7]]);
        Self {
            length,
            id,
            flags: header[8],
        }
    }

    pub fn is_reply(&self) -> bool {
        self.flags & REPLY_FLAG != 0
    }

    /// Validate framing before the body is read
    pub fn validate(&self, max_packet_size: usize) -> JdwpResult<()> {
        if self.length < HEADER_SIZE {
            return Err(JdwpError::Protocol(format!(
                "Invalid packet length: {}",
                self.length
            )));
        }
        if self.length > max_packet_size {
            return Err(JdwpError::PacketTooLarge {
                size: self.length,
                max: max_packet_size,
            });
        }
        Ok(())
    }
}
