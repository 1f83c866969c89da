// Shared layout helpers
//
// Pure functions over raw snapshot memory and metadata that every adapter
// generation agrees on: object headers, field reads, array bodies, string
// decoding and status mapping.

use super::{
    AdapterError, AdapterResult, FieldInfo, Handle, LineEntry, MethodInfo, RawValue, SnapshotAdapter,
    TypeInfo, TypeKind,
};
use crate::provider::api::{
    init_state, jvmti, Address, HeapMemory, KlassHeader, KlassLayout, MethodMetadata, ReadError,
    VmStructs,
};
use crate::types::{class_status, modifiers, ThreadStatus, Variable};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

/// `java/lang/String` → `Ljava/lang/String;`, arrays unchanged
pub fn signature_of(name: &str) -> String {
    if name.starts_with('[') {
        name.to_string()
    } else {
        format!("L{};", name)
    }
}

/// `Ljava/lang/String;` → `java/lang/String`, arrays unchanged
pub fn name_of(signature: &str) -> Option<&str> {
    if signature.starts_with('[') {
        Some(signature)
    } else {
        signature.strip_prefix('L')?.strip_suffix(';')
    }
}

/// Storage size of a value of `signature`; references are always 8 bytes
pub fn value_size(signature: &str) -> u64 {
    match signature.as_bytes().first() {
        Some(b'Z') | Some(b'B') => 1,
        Some(b'C') | Some(b'S') => 2,
        Some(b'I') | Some(b'F') => 4,
        _ => 8,
    }
}

/// `base + offset`, or `Unmapped` when the sum leaves the address space
pub fn offset_address(base: Address, offset: u64, len: usize) -> Result<Address, ReadError> {
    base.checked_add(offset)
        .ok_or(ReadError::Unmapped { address: base, len })
}

pub fn read_klass_pointer(
    memory: &dyn HeapMemory,
    structs: &VmStructs,
    oop: Address,
    compressed: bool,
) -> Result<Address, ReadError> {
    let width = if compressed { 4 } else { 8 };
    let at = offset_address(oop, structs.klass_offset, width)?;
    if compressed {
        Ok(structs.decode_narrow_klass(memory.read_u32(at)?))
    } else {
        memory.read_u64(at)
    }
}

pub fn read_raw_value(
    memory: &dyn HeapMemory,
    address: Address,
    signature: &str,
) -> Result<RawValue, ReadError> {
    let value = match signature.as_bytes().first() {
        Some(b'Z') => RawValue::Boolean(memory.read_u8(address)? != 0),
        Some(b'B') => RawValue::Byte(memory.read_u8(address)? as i8),
        Some(b'C') => RawValue::Char(memory.read_u16(address)?),
        Some(b'S') => RawValue::Short(memory.read_u16(address)? as i16),
        Some(b'I') => RawValue::Int(memory.read_u32(address)? as i32),
        Some(b'J') => RawValue::Long(memory.read_u64(address)? as i64),
        Some(b'F') => RawValue::Float(f32::from_bits(memory.read_u32(address)?)),
        Some(b'D') => RawValue::Double(f64::from_bits(memory.read_u64(address)?)),
        _ => RawValue::Object(memory.read_u64(address)?),
    };
    Ok(value)
}

pub fn array_length(
    memory: &dyn HeapMemory,
    structs: &VmStructs,
    compressed: bool,
    array: Address,
) -> Result<usize, ReadError> {
    let at = offset_address(array, structs.array_length_offset(compressed), 4)?;
    let length = memory.read_u32(at)?;
    Ok(length as usize)
}

/// Whole body of a primitive array
pub fn read_array_bytes(
    memory: &dyn HeapMemory,
    structs: &VmStructs,
    compressed: bool,
    array: Address,
    element_size: u64,
) -> Result<Vec<u8>, ReadError> {
    let length = array_length(memory, structs, compressed, array)?;
    let len = length * element_size as usize;
    let base = offset_address(array, structs.array_base_offset(compressed, element_size), len)?;
    memory.read_bytes(base, len)
}

pub fn decode_latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|b| *b as char).collect()
}

/// Little-endian UTF-16 code units; unpaired surrogates become U+FFFD
pub fn decode_utf16_le(bytes: &[u8]) -> String {
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .collect();
    String::from_utf16_lossy(&units)
}

/// A core class every snapshot must have loaded
pub fn require_type(adapter: &dyn SnapshotAdapter, name: &str) -> AdapterResult<Handle> {
    adapter
        .resolve_type(name)?
        .ok_or_else(|| AdapterError::Malformed(format!("{} is not loaded", name)))
}

fn reference_field(adapter: &dyn SnapshotAdapter, object: Handle, name: &str) -> AdapterResult<Handle> {
    match adapter.field_by_name(object, name)? {
        RawValue::Object(handle) => Ok(handle),
        other => Err(AdapterError::Malformed(format!("{} is {:?}", name, other))),
    }
}

fn int_field(adapter: &dyn SnapshotAdapter, object: Handle, name: &str) -> AdapterResult<i32> {
    match adapter.field_by_name(object, name)? {
        RawValue::Int(value) => Ok(value),
        RawValue::Byte(value) => Ok(value as i32),
        other => Err(AdapterError::Malformed(format!("{} is {:?}", name, other))),
    }
}

/// Contents of a `char[]`, or the `count` units starting at `offset`
pub fn char_array_string(
    adapter: &dyn SnapshotAdapter,
    array: Handle,
    range: Option<(usize, usize)>,
) -> AdapterResult<String> {
    if array == 0 {
        return Err(AdapterError::Malformed("null char array".to_string()));
    }
    let bytes = read_array_bytes(
        adapter.memory(),
        adapter.vm_structs(),
        adapter.compressed_klass_pointers(),
        array,
        2,
    )?;
    let units = bytes.len() / 2;
    let (offset, count) = range.unwrap_or((0, units));
    let end = offset
        .checked_add(count)
        .filter(|end| *end <= units)
        .ok_or(AdapterError::IndexOutOfRange {
            index: offset.saturating_add(count),
            length: units,
        })?;
    Ok(decode_utf16_le(&bytes[offset * 2..end * 2]))
}

/// `String` backed by a `char[]` (JDK 8)
pub fn char_backed_string(adapter: &dyn SnapshotAdapter, object: Handle) -> AdapterResult<String> {
    char_array_string(adapter, reference_field(adapter, object, "value")?, None)
}

/// `String` backed by a shared `char[]` window (JDK 6/7)
pub fn windowed_string(adapter: &dyn SnapshotAdapter, object: Handle) -> AdapterResult<String> {
    let value = reference_field(adapter, object, "value")?;
    let offset = int_field(adapter, object, "offset")?;
    let count = int_field(adapter, object, "count")?;
    if offset < 0 || count < 0 {
        return Err(AdapterError::Malformed(format!(
            "string window {}+{}",
            offset, count
        )));
    }
    char_array_string(adapter, value, Some((offset as usize, count as usize)))
}

/// Compact `String`: a `byte[]` plus a coder, 0 for LATIN1 and 1 for UTF-16 (JDK 9+)
pub fn compact_string(adapter: &dyn SnapshotAdapter, object: Handle) -> AdapterResult<String> {
    const LATIN1: i32 = 0;
    const UTF16: i32 = 1;

    let value = reference_field(adapter, object, "value")?;
    if value == 0 {
        return Err(AdapterError::Malformed("null string value".to_string()));
    }
    let bytes = read_array_bytes(
        adapter.memory(),
        adapter.vm_structs(),
        adapter.compressed_klass_pointers(),
        value,
        1,
    )?;
    match int_field(adapter, object, "coder")? {
        LATIN1 => Ok(decode_latin1(&bytes)),
        UTF16 => Ok(decode_utf16_le(&bytes)),
        other => Err(AdapterError::Malformed(format!("string coder {}", other))),
    }
}

/// Fail unless `object` is an instance of `string_klass`
pub fn ensure_string(adapter: &dyn SnapshotAdapter, string_klass: Handle, object: Handle) -> AdapterResult<()> {
    if object == 0 || adapter.object_type(object)? != string_klass {
        return Err(AdapterError::NotAString(object));
    }
    Ok(())
}

/// Loaded handles that reached the linked state
pub fn prepared_types(adapter: &dyn SnapshotAdapter, handles: Vec<Handle>) -> AdapterResult<Vec<Handle>> {
    let mut prepared = Vec::with_capacity(handles.len());
    for handle in dedupe(handles) {
        if adapter.type_info(handle)?.status & class_status::PREPARED != 0 {
            prepared.push(handle);
        }
    }
    Ok(prepared)
}

/// JVMTI thread state bits to a JDWP thread status
pub fn thread_status(bits: i32) -> ThreadStatus {
    if bits & jvmti::ALIVE == 0 {
        ThreadStatus::Zombie
    } else if bits & jvmti::BLOCKED_ON_MONITOR_ENTER != 0 {
        ThreadStatus::Monitor
    } else if bits & jvmti::SLEEPING != 0 {
        ThreadStatus::Sleeping
    } else if bits & (jvmti::WAITING | jvmti::IN_OBJECT_WAIT) != 0 {
        ThreadStatus::Wait
    } else {
        ThreadStatus::Running
    }
}

/// HotSpot init state to JDWP class status bits
pub fn class_status(state: u8) -> i32 {
    match state {
        init_state::ALLOCATED | init_state::LOADED => 0,
        init_state::LINKED | init_state::BEING_INITIALIZED => {
            class_status::VERIFIED | class_status::PREPARED
        }
        init_state::FULLY_INITIALIZED => {
            class_status::VERIFIED | class_status::PREPARED | class_status::INITIALIZED
        }
        _ => class_status::VERIFIED | class_status::PREPARED | class_status::ERROR,
    }
}

fn primitive_signature(element_type: u8) -> AdapterResult<String> {
    match element_type {
        b'Z' | b'B' | b'C' | b'S' | b'I' | b'J' | b'F' | b'D' => {
            Ok((element_type as char).to_string())
        }
        other => Err(AdapterError::Malformed(format!(
            "unknown array element type {:#x}",
            other
        ))),
    }
}

/// Normalize a klass header and its decoded fields
pub fn type_info(handle: Handle, header: &KlassHeader, fields: Vec<FieldInfo>) -> AdapterResult<TypeInfo> {
    let kind = match &header.layout {
        KlassLayout::Instance if header.access_flags & modifiers::INTERFACE != 0 => TypeKind::Interface,
        KlassLayout::Instance => TypeKind::Class,
        KlassLayout::TypeArray { element_type } => TypeKind::Array {
            component: primitive_signature(*element_type)?,
        },
        KlassLayout::ObjArray { .. } => TypeKind::Array {
            component: header
                .name
                .strip_prefix('[')
                .map(str::to_string)
                .ok_or_else(|| AdapterError::Malformed(format!("array klass named {}", header.name)))?,
        },
    };

    Ok(TypeInfo {
        handle,
        name: header.name.clone(),
        kind,
        super_type: header.super_klass,
        interfaces: header.interfaces.clone(),
        access_flags: header.access_flags,
        status: class_status(header.init_state),
        class_loader: header.class_loader,
        mirror: header.java_mirror,
        source_file: header.source_file.clone(),
        fields,
        methods: header.methods.clone(),
    })
}

pub fn method_info(handle: Handle, metadata: MethodMetadata) -> MethodInfo {
    let line_table = metadata
        .line_numbers
        .iter()
        .map(|(bci, line)| LineEntry {
            code_index: *bci as u64,
            line: *line as i32,
        })
        .collect();
    let variables = metadata.local_variables.map(|entries| {
        entries
            .into_iter()
            .map(|v| Variable {
                code_index: v.start_bci as u64,
                name: v.name,
                signature: v.signature,
                length: v.length,
                slot: v.slot,
            })
            .collect()
    });

    MethodInfo {
        handle,
        declaring_type: metadata.holder,
        name: metadata.name,
        signature: metadata.signature,
        access_flags: metadata.access_flags,
        max_locals: metadata.max_locals,
        code: metadata.code,
        line_table,
        variables,
    }
}

fn symbol(symbols: &[String], index: u16) -> AdapterResult<String> {
    symbols
        .get(index as usize)
        .cloned()
        .ok_or_else(|| AdapterError::Malformed(format!("symbol index {} out of range", index)))
}

/// Decode packed `u16` field tuples of `width` entries.
///
/// Each tuple starts `[access, name, signature, initval, low, high]`; the
/// 32-bit word formed by `low | high << 16` goes through `decode_offset`.
pub fn unpack_fields(
    packed: &[u16],
    symbols: &[String],
    width: usize,
    decode_offset: impl Fn(u32) -> AdapterResult<u64>,
) -> AdapterResult<Vec<FieldInfo>> {
    if packed.len() % width != 0 {
        return Err(AdapterError::Malformed(format!(
            "field array of {} entries is not a multiple of {}",
            packed.len(),
            width
        )));
    }
    packed
        .chunks_exact(width)
        .map(|tuple| {
            let word = tuple[4] as u32 | (tuple[5] as u32) << 16;
            Ok(FieldInfo {
                name: symbol(symbols, tuple[1])?,
                signature: symbol(symbols, tuple[2])?,
                access_flags: tuple[0] as u32,
                offset: decode_offset(word)?,
            })
        })
        .collect()
}

/// Metaspace field offsets carry a 2-bit tag; `0b01` marks a resolved offset
pub fn decode_tagged_offset(word: u32) -> AdapterResult<u64> {
    const TAG_MASK: u32 = 0b11;
    const TAG_OFFSET: u32 = 0b01;
    if word & TAG_MASK != TAG_OFFSET {
        return Err(AdapterError::Malformed(format!(
            "field offset word {:#x} is not resolved",
            word
        )));
    }
    Ok((word >> 2) as u64)
}

/// Drop repeated handles, keeping first occurrences in order
pub fn dedupe(handles: impl IntoIterator<Item = Handle>) -> Vec<Handle> {
    let mut seen = HashSet::new();
    handles.into_iter().filter(|h| seen.insert(*h)).collect()
}

/// `start` followed by every higher dimension array klass hanging off it
pub fn with_array_klasses(
    start: Handle,
    next: impl Fn(Handle) -> Result<Option<Handle>, ReadError>,
) -> Result<Vec<Handle>, ReadError> {
    let mut chain = vec![start];
    let mut current = start;
    while let Some(array) = next(current)? {
        if chain.contains(&array) {
            break;
        }
        chain.push(array);
        current = array;
    }
    Ok(chain)
}

/// Decoded type metadata per klass.
///
/// Snapshots are frozen, so entries never go stale.
#[derive(Debug, Default)]
pub struct TypeCache {
    types: Mutex<HashMap<Handle, Arc<TypeInfo>>>,
}

impl TypeCache {
    pub fn get_or_load(
        &self,
        handle: Handle,
        load: impl FnOnce() -> AdapterResult<TypeInfo>,
    ) -> AdapterResult<Arc<TypeInfo>> {
        if let Some(info) = self.lock().get(&handle) {
            return Ok(info.clone());
        }
        // Decoded outside the lock; a racing load stores an equal value
        let info = Arc::new(load()?);
        Ok(self.lock().entry(handle).or_insert(info).clone())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<Handle, Arc<TypeInfo>>> {
        self.types.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::api::KlassLayout;

    #[test]
    fn test_thread_status_mapping() {
        assert_eq!(thread_status(0), ThreadStatus::Zombie);
        assert_eq!(thread_status(jvmti::TERMINATED), ThreadStatus::Zombie);
        assert_eq!(thread_status(jvmti::ALIVE | jvmti::RUNNABLE), ThreadStatus::Running);
        assert_eq!(
            thread_status(jvmti::ALIVE | jvmti::BLOCKED_ON_MONITOR_ENTER),
            ThreadStatus::Monitor
        );
        assert_eq!(
            thread_status(jvmti::ALIVE | jvmti::WAITING | jvmti::WAITING_WITH_TIMEOUT | jvmti::SLEEPING),
            ThreadStatus::Sleeping
        );
        assert_eq!(
            thread_status(jvmti::ALIVE | jvmti::WAITING | jvmti::WAITING_INDEFINITELY | jvmti::IN_OBJECT_WAIT),
            ThreadStatus::Wait
        );
    }

    #[test]
    fn test_header_reads_near_the_top_of_the_address_space() {
        let structs = VmStructs {
            flags: Default::default(),
            klass_offset: 8,
            narrow_klass_base: 0,
            narrow_klass_shift: 3,
        };
        let memory = NoMemory;
        assert_eq!(
            offset_address(u64::MAX - 2, 8, 8),
            Err(ReadError::Unmapped { address: u64::MAX - 2, len: 8 })
        );
        assert_eq!(offset_address(0x1000, 8, 8), Ok(0x1008));
        for compressed in [false, true] {
            assert!(matches!(
                read_klass_pointer(&memory, &structs, u64::MAX - 2, compressed),
                Err(ReadError::Unmapped { address, .. }) if address == u64::MAX - 2
            ));
            assert!(matches!(
                array_length(&memory, &structs, compressed, u64::MAX - 4),
                Err(ReadError::Unmapped { address, .. }) if address == u64::MAX - 4
            ));
        }
    }

    struct NoMemory;

    impl HeapMemory for NoMemory {
        fn read_bytes(&self, address: Address, len: usize) -> Result<Vec<u8>, ReadError> {
            Err(ReadError::Io(format!("read of {} bytes at {:#x}", len, address)))
        }
    }

    #[test]
    fn test_class_status() {
        assert_eq!(class_status(init_state::LOADED), 0);
        assert_eq!(class_status(init_state::LINKED), 3);
        assert_eq!(class_status(init_state::FULLY_INITIALIZED), 7);
        assert_eq!(class_status(init_state::INITIALIZATION_ERROR), 11);
    }

    #[test]
    fn test_string_decoding() {
        assert_eq!(decode_latin1(&[0x68, 0xe9]), "hé");
        assert_eq!(decode_utf16_le(&[0x3a, 0x26, 0x41, 0x00]), "\u{263a}A");
        // Unpaired high surrogate
        assert_eq!(decode_utf16_le(&[0x00, 0xd8]), "\u{fffd}");
    }

    #[test]
    fn test_unpack_fields() {
        let symbols = vec![String::new(), "count".to_string(), "I".to_string()];
        let word = (12u32 << 2) | 1;
        let packed = [0x2, 1, 2, 0, (word & 0xffff) as u16, (word >> 16) as u16];
        let fields = unpack_fields(&packed, &symbols, 6, decode_tagged_offset).unwrap();
        assert_eq!(
            fields,
            vec![FieldInfo {
                name: "count".to_string(),
                signature: "I".to_string(),
                access_flags: 0x2,
                offset: 12,
            }]
        );

        assert!(unpack_fields(&packed[..5], &symbols, 6, decode_tagged_offset).is_err());
        let unresolved = [0x2, 1, 2, 0, 12 << 2, 0];
        assert!(matches!(
            unpack_fields(&unresolved, &symbols, 6, decode_tagged_offset),
            Err(AdapterError::Malformed(_))
        ));
        let bad_symbol = [0x2, 9, 2, 0, (word & 0xffff) as u16, 0];
        assert!(unpack_fields(&bad_symbol, &symbols, 6, decode_tagged_offset).is_err());
    }

    #[test]
    fn test_array_chain_and_dedupe() {
        let chain = with_array_klasses(1, |h| Ok(if h < 3 { Some(h + 1) } else { None })).unwrap();
        assert_eq!(chain, vec![1, 2, 3]);
        assert_eq!(dedupe([3, 1, 3, 2, 1]), vec![3, 1, 2]);
    }

    #[test]
    fn test_array_type_info() {
        let header = KlassHeader {
            name: "[I".to_string(),
            super_klass: Some(0x10),
            access_flags: modifiers::PUBLIC | modifiers::FINAL | modifiers::ABSTRACT,
            init_state: init_state::FULLY_INITIALIZED,
            interfaces: Vec::new(),
            class_loader: 0,
            java_mirror: 0x20,
            source_file: None,
            methods: Vec::new(),
            layout: KlassLayout::TypeArray { element_type: b'I' },
            array_klass: None,
        };
        let info = type_info(0x30, &header, Vec::new()).unwrap();
        assert_eq!(info.kind, TypeKind::Array { component: "I".to_string() });
        assert_eq!(info.signature(), "[I");

        let bad = KlassHeader {
            layout: KlassLayout::TypeArray { element_type: b'Q' },
            ..header
        };
        assert!(type_info(0x30, &bad, Vec::new()).is_err());
    }

    #[test]
    fn test_type_cache_loads_once() {
        let cache = TypeCache::default();
        let header = KlassHeader {
            name: "A".to_string(),
            super_klass: None,
            access_flags: modifiers::PUBLIC,
            init_state: init_state::LINKED,
            interfaces: Vec::new(),
            class_loader: 0,
            java_mirror: 0,
            source_file: None,
            methods: Vec::new(),
            layout: KlassLayout::Instance,
            array_klass: None,
        };
        let first = cache.get_or_load(1, || type_info(1, &header, Vec::new())).unwrap();
        let second = cache
            .get_or_load(1, || Err(AdapterError::Malformed("reloaded".to_string())))
            .unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }
}
