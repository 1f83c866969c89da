// Raw introspection interfaces
//
// What a serviceability provider hands out for one frozen JVM. Memory is
// read as little-endian bytes through `HeapMemory`; class metadata comes in
// the shape of the JVM generation that produced the snapshot, so there is one
// API trait per generation on top of a shared base.

use std::collections::BTreeMap;
use thiserror::Error;

/// Native address inside the snapshot (oop, klass or method pointer)
pub type Address = u64;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ReadError {
    #[error("unmapped memory at {address:#x} ({len} bytes)")]
    Unmapped { address: Address, len: usize },

    #[error("unknown metadata handle {0:#x}")]
    UnknownHandle(Address),

    #[error("snapshot I/O error: {0}")]
    Io(String),
}

pub trait HeapMemory: Send + Sync {
    fn read_bytes(&self, address: Address, len: usize) -> Result<Vec<u8>, ReadError>;

    fn read_u8(&self, address: Address) -> Result<u8, ReadError> {
        Ok(u8::from_le_bytes(fixed(self.read_bytes(address, 1)?, address)?))
    }

    fn read_u16(&self, address: Address) -> Result<u16, ReadError> {
        Ok(u16::from_le_bytes(fixed(self.read_bytes(address, 2)?, address)?))
    }

    fn read_u32(&self, address: Address) -> Result<u32, ReadError> {
        Ok(u32::from_le_bytes(fixed(self.read_bytes(address, 4)?, address)?))
    }

    fn read_u64(&self, address: Address) -> Result<u64, ReadError> {
        Ok(u64::from_le_bytes(fixed(self.read_bytes(address, 8)?, address)?))
    }
}

fn fixed<const N: usize>(bytes: Vec<u8>, address: Address) -> Result<[u8; N], ReadError> {
    bytes
        .try_into()
        .map_err(|_| ReadError::Unmapped { address, len: N })
}

/// Layout constants published by the VM (the `gHotSpotVMStructs` table)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VmStructs {
    pub flags: BTreeMap<String, bool>,
    /// Offset of the klass pointer inside an object header
    pub klass_offset: u64,
    pub narrow_klass_base: u64,
    pub narrow_klass_shift: u32,
}

impl VmStructs {
    pub fn flag(&self, name: &str) -> bool {
        self.flags.get(name).copied().unwrap_or(false)
    }

    pub fn instance_header_size(&self, compressed_klass: bool) -> u64 {
        self.klass_offset + if compressed_klass { 4 } else { 8 }
    }

    pub fn array_length_offset(&self, compressed_klass: bool) -> u64 {
        self.instance_header_size(compressed_klass)
    }

    /// First element of an array whose elements are `element_size` bytes wide
    pub fn array_base_offset(&self, compressed_klass: bool, element_size: u64) -> u64 {
        let end_of_length = self.array_length_offset(compressed_klass) + 4;
        align_up(end_of_length, element_size.max(4))
    }

    pub fn decode_narrow_klass(&self, narrow: u32) -> Address {
        self.narrow_klass_base + ((narrow as u64) << self.narrow_klass_shift)
    }

    pub fn encode_narrow_klass(&self, klass: Address) -> Option<u32> {
        let offset = klass.checked_sub(self.narrow_klass_base)?;
        u32::try_from(offset >> self.narrow_klass_shift).ok()
    }
}

pub fn align_up(value: u64, alignment: u64) -> u64 {
    (value + alignment - 1) / alignment * alignment
}

/// HotSpot `InstanceKlass::ClassState`
pub mod init_state {
    pub const ALLOCATED: u8 = 0;
    pub const LOADED: u8 = 1;
    pub const LINKED: u8 = 2;
    pub const BEING_INITIALIZED: u8 = 3;
    pub const FULLY_INITIALIZED: u8 = 4;
    pub const INITIALIZATION_ERROR: u8 = 5;
}

/// JVMTI thread state bits, as stored in `java.lang.Thread.threadStatus`
pub mod jvmti {
    pub const ALIVE: i32 = 0x0001;
    pub const TERMINATED: i32 = 0x0002;
    pub const RUNNABLE: i32 = 0x0004;
    pub const WAITING_INDEFINITELY: i32 = 0x0010;
    pub const WAITING_WITH_TIMEOUT: i32 = 0x0020;
    pub const SLEEPING: i32 = 0x0040;
    pub const WAITING: i32 = 0x0080;
    pub const IN_OBJECT_WAIT: i32 = 0x0100;
    pub const BLOCKED_ON_MONITOR_ENTER: i32 = 0x0400;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KlassLayout {
    Instance,
    /// Array of references; `element` is the element klass
    ObjArray { element: Address },
    /// Array of primitives, e.g. `b'I'` for `int[]`
    TypeArray { element_type: u8 },
}

/// Klass fields that kept their shape across generations
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KlassHeader {
    /// Internal name, `java/lang/String` or `[I`
    pub name: String,
    pub super_klass: Option<Address>,
    pub access_flags: u32,
    pub init_state: u8,
    pub interfaces: Vec<Address>,
    /// Defining loader oop, 0 for the boot loader
    pub class_loader: Address,
    pub java_mirror: Address,
    pub source_file: Option<String>,
    pub methods: Vec<Address>,
    pub layout: KlassLayout,
    /// Next higher dimension array klass, if one was created
    pub array_klass: Option<Address>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalVariableEntry {
    pub start_bci: u32,
    pub length: u32,
    pub name: String,
    pub signature: String,
    pub slot: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodMetadata {
    pub holder: Address,
    pub name: String,
    pub signature: String,
    pub access_flags: u32,
    pub max_locals: u32,
    pub code: Vec<u8>,
    /// (bci, line) pairs
    pub line_numbers: Vec<(u32, u32)>,
    pub local_variables: Option<Vec<LocalVariableEntry>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackSlot {
    Empty,
    /// Primitive bits; 32-bit kinds use the low half
    Word(u64),
    Oop(Address),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JavaVFrame {
    pub method: Address,
    pub bci: u32,
    pub locals: Vec<StackSlot>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JavaThreadSnapshot {
    pub thread_oop: Address,
    /// Innermost frame first
    pub frames: Vec<JavaVFrame>,
}

/// Services every generation provides in the same shape
pub trait IntrospectionBase: Send + Sync {
    fn memory(&self) -> &dyn HeapMemory;
    fn vm_structs(&self) -> &VmStructs;
    fn system_property(&self, key: &str) -> Option<String>;
    fn java_threads(&self) -> Result<Vec<JavaThreadSnapshot>, ReadError>;
    fn method(&self, handle: Address) -> Result<MethodMetadata, ReadError>;
    /// Every object the heap walk reaches, in address order
    fn heap_objects(&self) -> Result<Vec<Address>, ReadError>;
}

/// JDK 6/7: klasses live in the permanent generation and keep their
/// statics inline; fields are packed 7-tuples with raw byte offsets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermGenKlass {
    pub header: KlassHeader,
    /// `[access, name, signature, initval, low_offset, high_offset, generic]`
    pub fields: Vec<u16>,
    pub symbols: Vec<String>,
}

pub trait Hotspot6Api: IntrospectionBase {
    fn system_dictionary(&self) -> Result<Vec<Address>, ReadError>;
    fn basic_type_array_klasses(&self) -> Vec<Address>;
    fn klass(&self, address: Address) -> Result<PermGenKlass, ReadError>;
}

/// JDK 8-12: metaspace klasses; fields are packed 6-tuples whose offset
/// halves carry a 2-bit tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetaspaceKlass {
    pub header: KlassHeader,
    /// `[access, name, signature, initval, low_packed, high_packed]`
    pub fields: Vec<u16>,
    pub symbols: Vec<String>,
}

pub trait Hotspot8Api: IntrospectionBase {
    fn system_dictionary(&self) -> Result<Vec<Address>, ReadError>;
    fn basic_type_array_klasses(&self) -> Vec<Address>;
    fn klass(&self, address: Address) -> Result<MetaspaceKlass, ReadError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassLoaderData {
    /// Loader oop, 0 for the boot loader
    pub loader: Address,
    pub klasses: Vec<Address>,
}

pub trait Hotspot10Api: IntrospectionBase {
    fn class_loader_data_graph(&self) -> Result<Vec<ClassLoaderData>, ReadError>;
    fn klass(&self, address: Address) -> Result<MetaspaceKlass, ReadError>;
}

/// JDK 13+: field metadata is handed out already resolved
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldEntry {
    pub name: String,
    pub signature: String,
    pub access_flags: u32,
    pub offset: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedKlass {
    pub header: KlassHeader,
    pub fields: Vec<FieldEntry>,
}

pub trait Hotspot13Api: IntrospectionBase {
    fn class_loader_data_graph(&self) -> Result<Vec<ClassLoaderData>, ReadError>;
    fn klass(&self, address: Address) -> Result<ResolvedKlass, ReadError>;
}
