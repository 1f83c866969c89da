// JDWP type definitions
//
// Common types used across the JDWP protocol

use serde::{Deserialize, Serialize};

// Object IDs are 8 bytes in JDWP
pub type ObjectId = u64;
pub type ThreadId = ObjectId;
pub type ThreadGroupId = ObjectId;

pub type ReferenceTypeId = u64;

pub type MethodId = u64;
pub type FieldId = u64;
pub type FrameId = u64;

/// Every id kind is transmitted as 8 bytes
pub const ID_SIZE: i32 = 8;

// Location identifies a code position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub type_tag: u8, // 1=class, 2=interface, 3=array
    pub class_id: ReferenceTypeId,
    pub method_id: MethodId,
    pub index: u64, // bytecode index (PC)
}

// Reference type tags (ClassesBySignature, AllClasses, Location)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum RefTypeTag {
    Class = 1,
    Interface = 2,
    Array = 3,
}

// Thread status values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u32)]
pub enum ThreadStatus {
    Zombie = 0,
    Running = 1,
    Sleeping = 2,
    Monitor = 3,
    Wait = 4,
}

// Suspend status values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u32)]
pub enum SuspendStatus {
    Running = 0,
    Suspended = 1,
}

// Class status bits
pub mod class_status {
    pub const VERIFIED: i32 = 1;
    pub const PREPARED: i32 = 2;
    pub const INITIALIZED: i32 = 4;
    pub const ERROR: i32 = 8;
}

// Access modifiers shared by classes, fields and methods
pub mod modifiers {
    pub const PUBLIC: u32 = 0x0001;
    pub const PRIVATE: u32 = 0x0002;
    pub const STATIC: u32 = 0x0008;
    pub const FINAL: u32 = 0x0010;
    pub const NATIVE: u32 = 0x0100;
    pub const INTERFACE: u32 = 0x0200;
    pub const ABSTRACT: u32 = 0x0400;
}

// Type tags for values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum TypeTag {
    Array = 91,        // '['
    Byte = 66,         // 'B'
    Char = 67,         // 'C'
    Object = 76,       // 'L'
    Float = 70,        // 'F'
    Double = 68,       // 'D'
    Int = 73,          // 'I'
    Long = 74,         // 'J'
    Short = 83,        // 'S'
    Void = 86,         // 'V'
    Boolean = 90,      // 'Z'
    String = 115,      // 's'
    Thread = 116,      // 't'
    ThreadGroup = 103, // 'g'
    ClassLoader = 108, // 'l'
    ClassObject = 99,  // 'c'
}

impl TypeTag {
    pub fn from_u8(tag: u8) -> Option<Self> {
        let tag = match tag {
            b'[' => TypeTag::Array,
            b'B' => TypeTag::Byte,
            b'C' => TypeTag::Char,
            b'L' => TypeTag::Object,
            b'F' => TypeTag::Float,
            b'D' => TypeTag::Double,
            b'I' => TypeTag::Int,
            b'J' => TypeTag::Long,
            b'S' => TypeTag::Short,
            b'V' => TypeTag::Void,
            b'Z' => TypeTag::Boolean,
            b's' => TypeTag::String,
            b't' => TypeTag::Thread,
            b'g' => TypeTag::ThreadGroup,
            b'l' => TypeTag::ClassLoader,
            b'c' => TypeTag::ClassObject,
            _ => return None,
        };
        Some(tag)
    }

    /// Tag for a JVM type signature, e.g. `I` or `Ljava/lang/String;`
    pub fn from_signature(signature: &str) -> Self {
        signature
            .as_bytes()
            .first()
            .and_then(|b| TypeTag::from_u8(*b))
            .unwrap_or(TypeTag::Object)
    }

    pub fn is_primitive(self) -> bool {
        matches!(
            self,
            TypeTag::Byte
                | TypeTag::Char
                | TypeTag::Float
                | TypeTag::Double
                | TypeTag::Int
                | TypeTag::Long
                | TypeTag::Short
                | TypeTag::Boolean
        )
    }
}

// Tagged value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Value {
    pub tag: u8,
    pub data: ValueData,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ValueData {
    Byte(i8),
    Char(u16),
    Float(f32),
    Double(f64),
    Int(i32),
    Long(i64),
    Short(i16),
    Boolean(bool),
    Object(ObjectId),
    Void,
}

impl Value {
    pub fn new(tag: TypeTag, data: ValueData) -> Self {
        Self {
            tag: tag as u8,
            data,
        }
    }

    /// Null reference, tagged as a plain object
    pub fn null() -> Self {
        Self::new(TypeTag::Object, ValueData::Object(0))
    }

    pub fn object(tag: TypeTag, id: ObjectId) -> Self {
        Self::new(tag, ValueData::Object(id))
    }

    pub fn int(v: i32) -> Self {
        Self::new(TypeTag::Int, ValueData::Int(v))
    }

    pub fn long(v: i64) -> Self {
        Self::new(TypeTag::Long, ValueData::Long(v))
    }

    pub fn boolean(v: bool) -> Self {
        Self::new(TypeTag::Boolean, ValueData::Boolean(v))
    }
}

// Variable information
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variable {
    pub code_index: u64,
    pub name: String,
    pub signature: String,
    pub length: u32,
    pub slot: u32,
}
