// Snapshot adapters
//
// Each JVM generation hands out class metadata, strings and thread names in
// its own shape. An adapter wraps one generation's introspection API and
// answers in the normalized shapes below; everything above this layer is
// version neutral.

pub mod hotspot10;
pub mod hotspot13;
pub mod hotspot6;
pub mod hotspot8;
pub mod layout;

use crate::protocol::JdwpError;
use crate::provider::api::{
    Address, HeapMemory, JavaThreadSnapshot, MethodMetadata, ReadError, StackSlot, VmStructs,
};
use crate::provider::{IntrospectionApi, SnapshotHandle};
use crate::types::{modifiers, ThreadStatus, Variable};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

pub use hotspot10::Hotspot10Adapter;
pub use hotspot13::Hotspot13Adapter;
pub use hotspot6::Hotspot6Adapter;
pub use hotspot8::Hotspot8Adapter;

/// Native handle of a klass, oop or method inside the snapshot
pub type Handle = Address;

pub type AdapterResult<T> = Result<T, AdapterError>;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AdapterError {
    #[error(transparent)]
    Read(#[from] ReadError),

    #[error("unsupported JVM version: {0}")]
    UnsupportedVersion(String),

    #[error("object {0:#x} is not a java.lang.String")]
    NotAString(Handle),

    #[error("object {0:#x} is not an array")]
    NotAnArray(Handle),

    #[error("index {index} out of range for length {length}")]
    IndexOutOfRange { index: usize, length: usize },

    #[error("{kind} {handle:#x} not found")]
    NotFound { kind: &'static str, handle: Handle },

    #[error("malformed metadata: {0}")]
    Malformed(String),
}

impl From<AdapterError> for JdwpError {
    fn from(err: AdapterError) -> Self {
        match err {
            AdapterError::UnsupportedVersion(version) => JdwpError::UnsupportedVersion(version),
            other => JdwpError::Adapter(other),
        }
    }
}

/// Introspection API generations, named after the JDK that introduced them
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JvmGeneration {
    /// JDK 6 and 7
    Jdk6,
    Jdk8,
    /// JDK 9 to 12
    Jdk10,
    /// JDK 13 to 17
    Jdk13,
}

impl JvmGeneration {
    pub const ALL: [JvmGeneration; 4] = [
        JvmGeneration::Jdk6,
        JvmGeneration::Jdk8,
        JvmGeneration::Jdk10,
        JvmGeneration::Jdk13,
    ];

    /// Map `java.specification.version` to a generation
    pub fn detect(specification_version: &str) -> AdapterResult<Self> {
        let version = specification_version.trim();
        match version {
            "1.6" | "1.7" => Ok(JvmGeneration::Jdk6),
            "1.8" => Ok(JvmGeneration::Jdk8),
            _ => match version.parse::<u32>() {
                Ok(9..=12) => Ok(JvmGeneration::Jdk10),
                Ok(13..=17) => Ok(JvmGeneration::Jdk13),
                _ => Err(AdapterError::UnsupportedVersion(version.to_string())),
            },
        }
    }

    pub fn tag(self) -> &'static str {
        match self {
            JvmGeneration::Jdk6 => "jdk6",
            JvmGeneration::Jdk8 => "jdk8",
            JvmGeneration::Jdk10 => "jdk10",
            JvmGeneration::Jdk13 => "jdk13",
        }
    }
}

impl FromStr for JvmGeneration {
    type Err = AdapterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        JvmGeneration::ALL
            .into_iter()
            .find(|g| g.tag().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| AdapterError::UnsupportedVersion(format!("unknown version tag {:?}", s)))
    }
}

impl fmt::Display for JvmGeneration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VmInfo {
    pub java_version: String,
    pub vm_name: String,
    pub vm_info: String,
    pub base_dir: String,
    pub class_path: Vec<String>,
    pub boot_class_path: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeKind {
    Class,
    Interface,
    Array { component: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldInfo {
    pub name: String,
    pub signature: String,
    pub access_flags: u32,
    /// From the object start, or from the static base for statics
    pub offset: u64,
}

impl FieldInfo {
    pub fn is_static(&self) -> bool {
        self.access_flags & modifiers::STATIC != 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeInfo {
    pub handle: Handle,
    /// Internal name, `java/lang/String` or `[I`
    pub name: String,
    pub kind: TypeKind,
    pub super_type: Option<Handle>,
    pub interfaces: Vec<Handle>,
    pub access_flags: u32,
    /// JDWP class status bits
    pub status: i32,
    /// Defining loader oop, 0 for the boot loader
    pub class_loader: Handle,
    pub mirror: Handle,
    pub source_file: Option<String>,
    pub fields: Vec<FieldInfo>,
    pub methods: Vec<Handle>,
}

impl TypeInfo {
    pub fn signature(&self) -> String {
        layout::signature_of(&self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineEntry {
    pub code_index: u64,
    pub line: i32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodInfo {
    pub handle: Handle,
    pub declaring_type: Handle,
    pub name: String,
    pub signature: String,
    pub access_flags: u32,
    pub max_locals: u32,
    pub code: Vec<u8>,
    pub line_table: Vec<LineEntry>,
    pub variables: Option<Vec<Variable>>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RawValue {
    Boolean(bool),
    Byte(i8),
    Char(u16),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    /// 0 is null
    Object(Handle),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldValue {
    pub declaring_type: Handle,
    /// Index into the declaring type's field list
    pub index: usize,
    pub value: RawValue,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadInfo {
    pub handle: Handle,
    pub name: String,
    pub status: ThreadStatus,
    pub group: Handle,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadGroupInfo {
    pub handle: Handle,
    pub name: String,
    pub parent: Handle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameInfo {
    pub method: Handle,
    pub declaring_type: Handle,
    pub bci: u64,
}

/// Version neutral view of a snapshot.
///
/// Implementors supply the generation specific pieces; traversal of objects,
/// arrays, threads and frames is shared.
pub trait SnapshotAdapter: Send + Sync {
    fn generation(&self) -> JvmGeneration;
    fn memory(&self) -> &dyn HeapMemory;
    fn vm_structs(&self) -> &VmStructs;
    fn system_property(&self, key: &str) -> Option<String>;

    /// Whether object headers hold a 32-bit narrow klass pointer
    fn compressed_klass_pointers(&self) -> bool;

    /// Every prepared type, each handle once
    fn list_loaded_types(&self) -> AdapterResult<Vec<Handle>>;
    fn type_info(&self, ty: Handle) -> AdapterResult<Arc<TypeInfo>>;

    /// Where the static fields of `ty` live
    fn static_base(&self, ty: &TypeInfo) -> Handle;

    fn string_value(&self, object: Handle) -> AdapterResult<String>;
    fn thread_name(&self, thread: Handle) -> AdapterResult<String>;

    fn method_metadata(&self, method: Handle) -> AdapterResult<MethodMetadata>;
    fn java_threads(&self) -> AdapterResult<Vec<JavaThreadSnapshot>>;

    /// Every object on the heap, in walk order
    fn heap_objects(&self) -> AdapterResult<Vec<Handle>>;

    fn vm_info(&self) -> AdapterResult<VmInfo> {
        let property = |key: &str| self.system_property(key).unwrap_or_default();
        let split = |value: String| -> Vec<String> {
            value
                .split(':')
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        };
        Ok(VmInfo {
            java_version: property("java.version"),
            vm_name: property("java.vm.name"),
            vm_info: property("java.vm.info"),
            base_dir: property("user.dir"),
            class_path: split(property("java.class.path")),
            boot_class_path: split(property("sun.boot.class.path")),
        })
    }

    /// Find a loaded type by internal name
    fn resolve_type(&self, name: &str) -> AdapterResult<Option<Handle>> {
        for handle in self.list_loaded_types()? {
            if self.type_info(handle)?.name == name {
                return Ok(Some(handle));
            }
        }
        Ok(None)
    }

    fn method_info(&self, method: Handle) -> AdapterResult<MethodInfo> {
        Ok(layout::method_info(method, self.method_metadata(method)?))
    }

    fn object_type(&self, object: Handle) -> AdapterResult<Handle> {
        if object == 0 {
            return Err(AdapterError::NotFound {
                kind: "object",
                handle: object,
            });
        }
        Ok(layout::read_klass_pointer(
            self.memory(),
            self.vm_structs(),
            object,
            self.compressed_klass_pointers(),
        )?)
    }

    /// Instance field values of `object`, superclass fields included
    fn object_fields(&self, object: Handle) -> AdapterResult<Vec<FieldValue>> {
        let mut values = Vec::new();
        let mut next = Some(self.object_type(object)?);
        while let Some(handle) = next {
            let ty = self.type_info(handle)?;
            for (index, field) in ty.fields.iter().enumerate() {
                if field.is_static() {
                    continue;
                }
                let value = read_field(self.memory(), object, field)?;
                values.push(FieldValue {
                    declaring_type: handle,
                    index,
                    value,
                });
            }
            next = ty.super_type;
        }
        Ok(values)
    }

    fn static_fields(&self, ty: Handle) -> AdapterResult<Vec<FieldValue>> {
        let info = self.type_info(ty)?;
        let base = self.static_base(&info);
        let mut values = Vec::new();
        for (index, field) in info.fields.iter().enumerate() {
            if !field.is_static() {
                continue;
            }
            let value = read_field(self.memory(), base, field)?;
            values.push(FieldValue {
                declaring_type: ty,
                index,
                value,
            });
        }
        Ok(values)
    }

    /// Instance field by name, searched from the runtime class upwards
    fn field_by_name(&self, object: Handle, name: &str) -> AdapterResult<RawValue> {
        let mut next = Some(self.object_type(object)?);
        while let Some(handle) = next {
            let ty = self.type_info(handle)?;
            if let Some(field) = ty.fields.iter().find(|f| f.name == name && !f.is_static()) {
                return Ok(read_field(self.memory(), object, field)?);
            }
            next = ty.super_type;
        }
        Err(AdapterError::Malformed(format!(
            "object {:#x} has no field {}",
            object, name
        )))
    }

    fn array_component(&self, array: Handle) -> AdapterResult<String> {
        let ty = self.type_info(self.object_type(array)?)?;
        match &ty.kind {
            TypeKind::Array { component } => Ok(component.clone()),
            _ => Err(AdapterError::NotAnArray(array)),
        }
    }

    fn array_length(&self, array: Handle) -> AdapterResult<usize> {
        self.array_component(array)?;
        Ok(layout::array_length(
            self.memory(),
            self.vm_structs(),
            self.compressed_klass_pointers(),
            array,
        )?)
    }

    fn read_array_elements(
        &self,
        array: Handle,
        first: usize,
        count: usize,
    ) -> AdapterResult<Vec<RawValue>> {
        let component = self.array_component(array)?;
        let compressed = self.compressed_klass_pointers();
        let length = layout::array_length(self.memory(), self.vm_structs(), compressed, array)?;
        let end = first
            .checked_add(count)
            .filter(|end| *end <= length)
            .ok_or(AdapterError::IndexOutOfRange {
                index: first.saturating_add(count),
                length,
            })?;

        let size = layout::value_size(&component);
        let base = layout::offset_address(
            array,
            self.vm_structs().array_base_offset(compressed, size),
            size as usize,
        )?;
        (first..end)
            .map(|i| {
                let at = layout::offset_address(base, i as u64 * size, size as usize)?;
                Ok(layout::read_raw_value(self.memory(), at, &component)?)
            })
            .collect()
    }

    fn list_threads(&self) -> AdapterResult<Vec<ThreadInfo>> {
        let mut threads = Vec::new();
        for snapshot in self.java_threads()? {
            let handle = snapshot.thread_oop;
            let status = match self.field_by_name(handle, "threadStatus")? {
                RawValue::Int(bits) => layout::thread_status(bits),
                other => {
                    return Err(AdapterError::Malformed(format!(
                        "threadStatus is {:?}",
                        other
                    )))
                }
            };
            let group = match self.field_by_name(handle, "group")? {
                RawValue::Object(group) => group,
                _ => 0,
            };
            threads.push(ThreadInfo {
                handle,
                name: self.thread_name(handle)?,
                status,
                group,
            });
        }
        Ok(threads)
    }

    fn thread_group_info(&self, group: Handle) -> AdapterResult<ThreadGroupInfo> {
        let name = match self.field_by_name(group, "name")? {
            RawValue::Object(0) => String::new(),
            RawValue::Object(name) => self.string_value(name)?,
            other => {
                return Err(AdapterError::Malformed(format!(
                    "ThreadGroup.name is {:?}",
                    other
                )))
            }
        };
        let parent = match self.field_by_name(group, "parent")? {
            RawValue::Object(parent) => parent,
            _ => 0,
        };
        Ok(ThreadGroupInfo {
            handle: group,
            name,
            parent,
        })
    }

    /// Frames of `thread`, innermost first
    fn thread_frames(&self, thread: Handle) -> AdapterResult<Vec<FrameInfo>> {
        let snapshot = self.java_thread(thread)?;
        snapshot
            .frames
            .iter()
            .map(|frame| {
                Ok(FrameInfo {
                    method: frame.method,
                    declaring_type: self.method_metadata(frame.method)?.holder,
                    bci: frame.bci as u64,
                })
            })
            .collect()
    }

    fn frame_locals(&self, thread: Handle, depth: usize) -> AdapterResult<Vec<StackSlot>> {
        let snapshot = self.java_thread(thread)?;
        snapshot
            .frames
            .get(depth)
            .map(|frame| frame.locals.clone())
            .ok_or(AdapterError::NotFound {
                kind: "frame",
                handle: depth as Handle,
            })
    }

    fn java_thread(&self, thread: Handle) -> AdapterResult<JavaThreadSnapshot> {
        self.java_threads()?
            .into_iter()
            .find(|t| t.thread_oop == thread)
            .ok_or(AdapterError::NotFound {
                kind: "thread",
                handle: thread,
            })
    }
}

fn read_field(memory: &dyn HeapMemory, base: Handle, field: &FieldInfo) -> Result<RawValue, ReadError> {
    let size = layout::value_size(&field.signature) as usize;
    let at = layout::offset_address(base, field.offset, size)?;
    layout::read_raw_value(memory, at, &field.signature)
}

/// Pick the adapter for a snapshot.
///
/// A declared generation tag wins over the snapshot's own
/// `java.specification.version`.
pub fn select_adapter(
    snapshot: Arc<dyn SnapshotHandle>,
    declared: Option<&str>,
) -> AdapterResult<Arc<dyn SnapshotAdapter>> {
    let generation = match declared {
        Some(tag) => tag.parse::<JvmGeneration>()?,
        None => {
            let version = snapshot
                .system_property("java.specification.version")
                .ok_or_else(|| {
                    AdapterError::UnsupportedVersion(
                        "snapshot has no java.specification.version".to_string(),
                    )
                })?;
            JvmGeneration::detect(&version)?
        }
    };
    debug!("Selecting {} adapter", generation);

    let api = snapshot.introspection(generation).ok_or_else(|| {
        AdapterError::UnsupportedVersion(format!(
            "snapshot does not provide the {} introspection API",
            generation
        ))
    })?;

    let adapter: Arc<dyn SnapshotAdapter> = match api {
        IntrospectionApi::Jdk6(api) => Arc::new(Hotspot6Adapter::new(api)?),
        IntrospectionApi::Jdk8(api) => Arc::new(Hotspot8Adapter::new(api)?),
        IntrospectionApi::Jdk10(api) => Arc::new(Hotspot10Adapter::new(api)?),
        IntrospectionApi::Jdk13(api) => Arc::new(Hotspot13Adapter::new(api)?),
    };
    info!("Using {} snapshot adapter", adapter.generation());
    Ok(adapter)
}

/// Shared adapter checks, run against each generation's adapter
#[cfg(test)]
pub(crate) mod conformance {
    use super::*;
    use crate::provider::synthetic::{fixtures, SyntheticHeap};

    pub const VERSIONS: [(&str, JvmGeneration); 4] = [
        ("1.6.0_45", JvmGeneration::Jdk6),
        ("1.8.0_292", JvmGeneration::Jdk8),
        ("11.0.2", JvmGeneration::Jdk10),
        ("17.0.1", JvmGeneration::Jdk13),
    ];

    pub fn adapter_for(java_version: &str) -> (Arc<SyntheticHeap>, Arc<dyn SnapshotAdapter>) {
        let heap = fixtures::render(java_version);
        let adapter = select_adapter(heap.clone(), None).expect("adapter must be selected");
        (heap, adapter)
    }

    pub fn check(java_version: &str) {
        let (heap, adapter) = adapter_for(java_version);

        // Types
        let a = adapter.resolve_type("A").unwrap().unwrap();
        assert_eq!(Some(a), heap.klass_address("A"));
        let info = adapter.type_info(a).unwrap();
        assert_eq!(info.signature(), "LA;");
        assert_eq!(info.kind, TypeKind::Class);
        assert_eq!(info.source_file.as_deref(), Some("A.java"));
        let names: Vec<&str> = info.fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, ["count", "flag", "ratio", "b", "label", "instances"]);
        assert!(info.fields[5].is_static());

        let loaded = adapter.list_loaded_types().unwrap();
        let mut unique = loaded.clone();
        unique.sort_unstable();
        unique.dedup();
        assert_eq!(unique.len(), loaded.len());
        assert!(loaded.contains(&heap.klass_address("[I").unwrap()));
        assert!(loaded.contains(&heap.klass_address("[Ljava/lang/String;").unwrap()));

        // Objects and fields
        let a1 = heap.object_address("a1").unwrap();
        let b1 = heap.object_address("b1").unwrap();
        assert_eq!(adapter.object_type(a1).unwrap(), a);
        let fields = adapter.object_fields(a1).unwrap();
        let values: Vec<RawValue> = fields.iter().map(|f| f.value).collect();
        assert_eq!(values[0], RawValue::Int(42));
        assert_eq!(values[1], RawValue::Boolean(true));
        assert_eq!(values[2], RawValue::Double(2.5));
        assert_eq!(values[3], RawValue::Object(b1));
        assert_eq!(adapter.field_by_name(b1, "owner").unwrap(), RawValue::Object(a1));
        assert_eq!(adapter.field_by_name(b1, "weight").unwrap(), RawValue::Long(-7));

        let statics = adapter.static_fields(a).unwrap();
        assert_eq!(statics.len(), 1);
        assert_eq!(statics[0].index, 5);
        assert_eq!(statics[0].value, RawValue::Int(1));

        // Strings
        let label = match values[4] {
            RawValue::Object(handle) => handle,
            other => panic!("label is {:?}", other),
        };
        assert_eq!(adapter.string_value(label).unwrap(), "héllo");
        assert!(matches!(
            adapter.string_value(a1),
            Err(AdapterError::NotAString(_))
        ));

        // Arrays
        let ints = heap.object_address("ints").unwrap();
        assert_eq!(adapter.array_length(ints).unwrap(), 3);
        assert_eq!(
            adapter.read_array_elements(ints, 1, 2).unwrap(),
            vec![RawValue::Int(2), RawValue::Int(3)]
        );
        assert!(matches!(
            adapter.read_array_elements(ints, 2, 2),
            Err(AdapterError::IndexOutOfRange { .. })
        ));
        let names = heap.object_address("names").unwrap();
        let elements = adapter.read_array_elements(names, 0, 3).unwrap();
        assert_eq!(elements[1], RawValue::Object(0));
        match elements[2] {
            RawValue::Object(handle) => assert_eq!(adapter.string_value(handle).unwrap(), "\u{263a}"),
            other => panic!("element is {:?}", other),
        }
        assert!(matches!(adapter.array_length(a1), Err(AdapterError::NotAnArray(_))));

        // Heap walk
        let walked = adapter.heap_objects().unwrap();
        for id in ["a1", "b1", "ints", "names", "class:A", "thread:T"] {
            assert!(walked.contains(&heap.object_address(id).unwrap()), "{} not walked", id);
        }
        assert!(walked.windows(2).all(|w| w[0] < w[1]));

        // Threads and frames
        let threads = adapter.list_threads().unwrap();
        assert_eq!(threads.len(), 1);
        assert_eq!(threads[0].name, "T");
        assert_eq!(threads[0].status, ThreadStatus::Running);
        let group = adapter.thread_group_info(threads[0].group).unwrap();
        assert_eq!(group.name, "main");
        let system = adapter.thread_group_info(group.parent).unwrap();
        assert_eq!(system.name, "system");
        assert_eq!(system.parent, 0);

        let frames = adapter.thread_frames(threads[0].handle).unwrap();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].declaring_type, a);
        assert_eq!(frames[0].bci, 2);
        let method = adapter.method_info(frames[0].method).unwrap();
        assert_eq!(method.name, "foo");
        assert_eq!(method.max_locals, 3);
        let locals = adapter.frame_locals(threads[0].handle, 0).unwrap();
        assert_eq!(locals[0], StackSlot::Oop(a1));
        assert_eq!(locals[1], StackSlot::Word(5));
        assert_eq!(locals[2], StackSlot::Oop(b1));

        // VM info
        let vm = adapter.vm_info().unwrap();
        assert_eq!(vm.java_version, java_version);
        assert_eq!(vm.class_path, vec!["/app/classes".to_string()]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::synthetic::fixtures;

    #[test]
    fn test_detect() {
        assert_eq!(JvmGeneration::detect("1.6").unwrap(), JvmGeneration::Jdk6);
        assert_eq!(JvmGeneration::detect("1.7").unwrap(), JvmGeneration::Jdk6);
        assert_eq!(JvmGeneration::detect("1.8").unwrap(), JvmGeneration::Jdk8);
        assert_eq!(JvmGeneration::detect("9").unwrap(), JvmGeneration::Jdk10);
        assert_eq!(JvmGeneration::detect("12").unwrap(), JvmGeneration::Jdk10);
        assert_eq!(JvmGeneration::detect("13").unwrap(), JvmGeneration::Jdk13);
        assert_eq!(JvmGeneration::detect("17").unwrap(), JvmGeneration::Jdk13);
        assert!(JvmGeneration::detect("1.5").is_err());
        assert!(JvmGeneration::detect("18").is_err());
        assert!(JvmGeneration::detect("").is_err());
    }

    #[test]
    fn test_tags() {
        assert_eq!("JDK8".parse::<JvmGeneration>().unwrap(), JvmGeneration::Jdk8);
        assert_eq!(" jdk13 ".parse::<JvmGeneration>().unwrap(), JvmGeneration::Jdk13);
        assert!("jdk9".parse::<JvmGeneration>().is_err());
        for generation in JvmGeneration::ALL {
            assert_eq!(generation.to_string().parse::<JvmGeneration>().unwrap(), generation);
        }
    }

    #[test]
    fn test_select_by_detected_version() {
        for (version, generation) in conformance::VERSIONS {
            let (_, adapter) = conformance::adapter_for(version);
            assert_eq!(adapter.generation(), generation);
        }
    }

    #[test]
    fn test_declared_tag_must_match_snapshot() {
        let heap = fixtures::render("1.8.0_292");
        assert!(select_adapter(heap.clone(), Some("jdk8")).is_ok());
        assert!(matches!(
            select_adapter(heap.clone(), Some("jdk13")),
            Err(AdapterError::UnsupportedVersion(_))
        ));
        assert!(matches!(
            select_adapter(heap, Some("hotspot")),
            Err(AdapterError::UnsupportedVersion(_))
        ));
    }

    #[test]
    fn test_addresses_past_the_top_are_unmapped() {
        let (_, adapter) = conformance::adapter_for("17.0.1");
        let unmapped = |result: AdapterResult<_>| {
            matches!(result, Err(AdapterError::Read(ReadError::Unmapped { .. })))
        };
        for handle in [u64::MAX, u64::MAX - 2] {
            assert!(unmapped(adapter.object_type(handle).map(|_| ())));
            assert!(unmapped(adapter.object_fields(handle).map(|_| ())));
            assert!(unmapped(adapter.field_by_name(handle, "count").map(|_| ())));
            assert!(unmapped(adapter.read_array_elements(handle, 0, 1).map(|_| ())));
        }

        let field = FieldInfo {
            name: "count".to_string(),
            signature: "I".to_string(),
            access_flags: 0,
            offset: 12,
        };
        assert_eq!(
            read_field(adapter.memory(), u64::MAX - 4, &field),
            Err(ReadError::Unmapped { address: u64::MAX - 4, len: 4 })
        );
    }

    #[test]
    fn test_unsupported_version_maps_to_jdwp_error() {
        let err: JdwpError = AdapterError::UnsupportedVersion("21".to_string()).into();
        assert!(matches!(err, JdwpError::UnsupportedVersion(v) if v == "21"));
        let err: JdwpError = AdapterError::Malformed("x".to_string()).into();
        assert!(matches!(err, JdwpError::Adapter(_)));
    }
}
