// Debug model
//
// The session's queryable view of a snapshot. Descriptors are materialized
// on first use and memoized, so asking for the same type twice returns the
// same instance. Values come back tagged the way they travel on the wire.

use crate::adapter::{AdapterError, AdapterResult, Handle, RawValue, SnapshotAdapter, TypeKind, VmInfo};
use crate::adapter::{JvmGeneration, LineEntry};
use crate::provider::api::{ReadError, StackSlot};
use crate::reftable::{lock, FieldKey, FrameKey, ReferenceTables};
use crate::types::{
    modifiers, FieldId, FrameId, Location, MethodId, ObjectId, RefTypeTag, ReferenceTypeId,
    ThreadGroupId, ThreadId, ThreadStatus, TypeTag, Value, ValueData, Variable,
};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tracing::debug;

pub type ModelResult<T> = Result<T, ModelError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefKind {
    Object,
    Type,
    Method,
    Field,
    Frame,
    Thread,
    ThreadGroup,
}

impl fmt::Display for RefKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RefKind::Object => "object",
            RefKind::Type => "reference type",
            RefKind::Method => "method",
            RefKind::Field => "field",
            RefKind::Frame => "frame",
            RefKind::Thread => "thread",
            RefKind::ThreadGroup => "thread group",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ModelError {
    #[error("invalid {kind} id {id}")]
    InvalidReference { kind: RefKind, id: u64 },

    #[error("index {index} out of range for length {length}")]
    InvalidIndex { index: i64, length: usize },

    #[error("length {requested} from index {index} exceeds length {length}")]
    InvalidLength {
        index: usize,
        requested: i64,
        length: usize,
    },

    #[error("invalid slot {slot}")]
    InvalidSlot { slot: i32 },

    #[error("invalid value tag {0:#x}")]
    InvalidTag(u8),

    #[error("absent information: {0}")]
    AbsentInformation(String),

    #[error("object {0} is not a string")]
    NotAString(ObjectId),

    #[error("object {0} is not an array")]
    NotAnArray(ObjectId),

    #[error("object {0} is not a class loader")]
    NotAClassLoader(ObjectId),

    #[error("object {0} is not a class object")]
    NotAClassObject(ObjectId),

    /// Memory the snapshot does not contain, e.g. a truncated core file
    #[error("unreadable memory at {address:#x}")]
    Unreadable { address: u64 },

    #[error("snapshot I/O error: {0}")]
    SnapshotIo(String),

    #[error("malformed snapshot: {0}")]
    Malformed(String),
}

impl From<AdapterError> for ModelError {
    fn from(err: AdapterError) -> Self {
        match err {
            AdapterError::Read(ReadError::Unmapped { address, .. })
            | AdapterError::Read(ReadError::UnknownHandle(address)) => {
                ModelError::Unreadable { address }
            }
            AdapterError::Read(ReadError::Io(message)) => ModelError::SnapshotIo(message),
            AdapterError::IndexOutOfRange { index, length } => ModelError::InvalidIndex {
                index: index as i64,
                length,
            },
            other => ModelError::Malformed(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDescriptor {
    pub id: FieldId,
    pub name: String,
    pub signature: String,
    pub modifiers: u32,
}

impl FieldDescriptor {
    pub fn is_static(&self) -> bool {
        self.modifiers & modifiers::STATIC != 0
    }
}

#[derive(Debug)]
pub struct TypeDescriptor {
    pub id: ReferenceTypeId,
    pub handle: Handle,
    pub name: String,
    pub signature: String,
    pub tag: RefTypeTag,
    /// Component signature of an array type
    pub component: Option<String>,
    /// Resolved on demand through `DebugModel::superclass`
    pub super_handle: Option<Handle>,
    pub interface_handles: Vec<Handle>,
    pub modifiers: u32,
    pub status: i32,
    pub class_loader: ObjectId,
    /// The `java.lang.Class` instance; its id is assigned on request
    pub mirror: Handle,
    pub source_file: Option<String>,
    pub fields: Vec<FieldDescriptor>,
    pub method_handles: Vec<Handle>,
}

#[derive(Debug)]
pub struct MethodDescriptor {
    pub id: MethodId,
    pub handle: Handle,
    pub declaring_type: ReferenceTypeId,
    pub name: String,
    pub signature: String,
    pub modifiers: u32,
    pub max_locals: u32,
    pub code: Vec<u8>,
    pub line_table: Vec<LineEntry>,
    pub variables: Option<Vec<Variable>>,
}

impl MethodDescriptor {
    pub fn is_static(&self) -> bool {
        self.modifiers & modifiers::STATIC != 0
    }

    /// First and last code index, `-1` for both without bytecode
    pub fn code_range(&self) -> (i64, i64) {
        if self.code.is_empty() || self.modifiers & (modifiers::NATIVE | modifiers::ABSTRACT) != 0 {
            (-1, -1)
        } else {
            (0, self.code.len() as i64 - 1)
        }
    }

    /// Slots taken by the declared arguments, receiver included
    pub fn arg_count(&self) -> i32 {
        let receiver = if self.is_static() { 0 } else { 1 };
        receiver + argument_slots(&self.signature)
    }
}

fn argument_slots(signature: &str) -> i32 {
    let params = signature
        .strip_prefix('(')
        .and_then(|s| s.split(')').next())
        .unwrap_or("");
    let mut chars = params.chars();
    let mut slots = 0;
    while let Some(c) = chars.next() {
        match c {
            'J' | 'D' => slots += 2,
            'L' => {
                chars.by_ref().find(|c| *c == ';');
                slots += 1;
            }
            '[' => {
                let mut element = chars.next();
                while element == Some('[') {
                    element = chars.next();
                }
                if element == Some('L') {
                    chars.by_ref().find(|c| *c == ';');
                }
                slots += 1;
            }
            _ => slots += 1,
        }
    }
    slots
}

#[derive(Debug)]
pub struct ThreadDescriptor {
    pub id: ThreadId,
    pub handle: Handle,
    pub name: String,
    pub status: ThreadStatus,
    pub group: ThreadGroupId,
}

#[derive(Debug)]
pub struct FrameDescriptor {
    pub id: FrameId,
    pub thread: ThreadId,
    /// 0 is the innermost frame
    pub depth: usize,
    pub location: Location,
}

#[derive(Debug)]
pub struct ThreadGroupDescriptor {
    pub id: ThreadGroupId,
    pub handle: Handle,
    pub name: String,
    pub parent: ThreadGroupId,
}

/// Core classes whose subclasses get their own value tags
#[derive(Debug, Clone, Copy)]
struct CoreTypes {
    string: Option<Handle>,
    thread: Option<Handle>,
    thread_group: Option<Handle>,
    class_loader: Option<Handle>,
    class: Option<Handle>,
}

pub struct DebugModel {
    adapter: Arc<dyn SnapshotAdapter>,
    refs: ReferenceTables,
    core: CoreTypes,
    types: Mutex<HashMap<Handle, Arc<TypeDescriptor>>>,
    all_types: Mutex<Option<Vec<Arc<TypeDescriptor>>>>,
    methods: Mutex<HashMap<Handle, Arc<MethodDescriptor>>>,
    threads: Mutex<Option<Vec<Arc<ThreadDescriptor>>>>,
    frames: Mutex<HashMap<Handle, Vec<Arc<FrameDescriptor>>>>,
    groups: Mutex<HashMap<Handle, Arc<ThreadGroupDescriptor>>>,
}

impl DebugModel {
    pub fn new(adapter: Arc<dyn SnapshotAdapter>) -> AdapterResult<Self> {
        let core = CoreTypes {
            string: adapter.resolve_type("java/lang/String")?,
            thread: adapter.resolve_type("java/lang/Thread")?,
            thread_group: adapter.resolve_type("java/lang/ThreadGroup")?,
            class_loader: adapter.resolve_type("java/lang/ClassLoader")?,
            class: adapter.resolve_type("java/lang/Class")?,
        };
        Ok(Self {
            adapter,
            refs: ReferenceTables::new(),
            core,
            types: Mutex::new(HashMap::new()),
            all_types: Mutex::new(None),
            methods: Mutex::new(HashMap::new()),
            threads: Mutex::new(None),
            frames: Mutex::new(HashMap::new()),
            groups: Mutex::new(HashMap::new()),
        })
    }

    pub fn generation(&self) -> JvmGeneration {
        self.adapter.generation()
    }

    pub fn vm_info(&self) -> ModelResult<VmInfo> {
        Ok(self.adapter.vm_info()?)
    }

    /// Object id for a snapshot handle, 0 for null
    pub fn object_id(&self, handle: Handle) -> ObjectId {
        self.refs.object_id(handle)
    }

    pub fn object_handle(&self, id: ObjectId) -> ModelResult<Handle> {
        self.refs.objects.lookup(id).ok_or(ModelError::InvalidReference {
            kind: RefKind::Object,
            id,
        })
    }

    // Types

    pub fn type_descriptor(&self, handle: Handle) -> ModelResult<Arc<TypeDescriptor>> {
        if let Some(ty) = lock(&self.types, "types").get(&handle) {
            return Ok(ty.clone());
        }
        let ty = Arc::new(self.materialize_type(handle)?);
        Ok(lock(&self.types, "types").entry(handle).or_insert(ty).clone())
    }

    fn materialize_type(&self, handle: Handle) -> ModelResult<TypeDescriptor> {
        let info = self.adapter.type_info(handle)?;
        let id = self.refs.types.id_for(handle);
        let (tag, component) = match &info.kind {
            TypeKind::Class => (RefTypeTag::Class, None),
            TypeKind::Interface => (RefTypeTag::Interface, None),
            TypeKind::Array { component } => (RefTypeTag::Array, Some(component.clone())),
        };
        let fields = info
            .fields
            .iter()
            .enumerate()
            .map(|(index, field)| FieldDescriptor {
                id: self.refs.fields.id_for(FieldKey {
                    declaring_type: handle,
                    index,
                }),
                name: field.name.clone(),
                signature: field.signature.clone(),
                modifiers: field.access_flags,
            })
            .collect();

        debug!("Materialized type {} as id {}", info.name, id);
        Ok(TypeDescriptor {
            id,
            handle,
            name: info.name.clone(),
            signature: info.signature(),
            tag,
            component,
            super_handle: info.super_type,
            interface_handles: info.interfaces.clone(),
            modifiers: info.access_flags,
            status: info.status,
            class_loader: self.refs.object_id(info.class_loader),
            mirror: info.mirror,
            source_file: info.source_file.clone(),
            fields,
            method_handles: info.methods.clone(),
        })
    }

    pub fn reference_type(&self, id: ReferenceTypeId) -> ModelResult<Arc<TypeDescriptor>> {
        let handle = self.refs.types.lookup(id).ok_or(ModelError::InvalidReference {
            kind: RefKind::Type,
            id,
        })?;
        self.type_descriptor(handle)
    }

    /// Every loaded type, ordered by signature
    pub fn all_types(&self) -> ModelResult<Vec<Arc<TypeDescriptor>>> {
        if let Some(all) = lock(&self.all_types, "all types").as_ref() {
            return Ok(all.clone());
        }

        let mut loaded = Vec::new();
        for handle in self.adapter.list_loaded_types()? {
            loaded.push((self.adapter.type_info(handle)?.signature(), handle));
        }
        loaded.sort();

        let all = loaded
            .into_iter()
            .map(|(_, handle)| self.type_descriptor(handle))
            .collect::<ModelResult<Vec<_>>>()?;
        debug!("{} loaded types", all.len());
        Ok(lock(&self.all_types, "all types").get_or_insert(all).clone())
    }

    pub fn types_by_signature(&self, signature: &str) -> ModelResult<Vec<Arc<TypeDescriptor>>> {
        Ok(self
            .all_types()?
            .into_iter()
            .filter(|ty| ty.signature == signature)
            .collect())
    }

    pub fn superclass(&self, ty: &TypeDescriptor) -> ModelResult<Option<Arc<TypeDescriptor>>> {
        if ty.tag == RefTypeTag::Interface {
            return Ok(None);
        }
        ty.super_handle
            .map(|handle| self.type_descriptor(handle))
            .transpose()
    }

    pub fn interfaces(&self, ty: &TypeDescriptor) -> ModelResult<Vec<Arc<TypeDescriptor>>> {
        ty.interface_handles
            .iter()
            .map(|handle| self.type_descriptor(*handle))
            .collect()
    }

    /// Whether `ty` is `target` or inherits from it through classes or interfaces
    fn is_assignable(&self, ty: Handle, target: Handle) -> ModelResult<bool> {
        let mut pending = vec![ty];
        let mut seen = HashSet::new();
        while let Some(current) = pending.pop() {
            if current == target {
                return Ok(true);
            }
            if !seen.insert(current) {
                continue;
            }
            let info = self.adapter.type_info(current)?;
            pending.extend(info.super_type);
            pending.extend(info.interfaces.iter().copied());
        }
        Ok(false)
    }

    fn extends(&self, ty: Handle, ancestor: Option<Handle>) -> ModelResult<bool> {
        match ancestor {
            Some(ancestor) => self.is_assignable(ty, ancestor),
            None => Ok(false),
        }
    }

    // Methods

    pub fn method_descriptor(&self, handle: Handle) -> ModelResult<Arc<MethodDescriptor>> {
        if let Some(method) = lock(&self.methods, "methods").get(&handle) {
            return Ok(method.clone());
        }
        let info = self.adapter.method_info(handle)?;
        let declaring_type = self.type_descriptor(info.declaring_type)?.id;
        let method = Arc::new(MethodDescriptor {
            id: self.refs.methods.id_for(handle),
            handle,
            declaring_type,
            name: info.name,
            signature: info.signature,
            modifiers: info.access_flags,
            max_locals: info.max_locals,
            code: info.code,
            line_table: info.line_table,
            variables: info.variables,
        });
        Ok(lock(&self.methods, "methods").entry(handle).or_insert(method).clone())
    }

    pub fn methods(&self, ty: &TypeDescriptor) -> ModelResult<Vec<Arc<MethodDescriptor>>> {
        ty.method_handles
            .iter()
            .map(|handle| self.method_descriptor(*handle))
            .collect()
    }

    /// A method declared by the type `type_id`
    pub fn method(&self, type_id: ReferenceTypeId, method_id: MethodId) -> ModelResult<Arc<MethodDescriptor>> {
        let ty = self.reference_type(type_id)?;
        let handle = self
            .refs
            .methods
            .lookup(method_id)
            .filter(|handle| ty.method_handles.contains(handle))
            .ok_or(ModelError::InvalidReference {
                kind: RefKind::Method,
                id: method_id,
            })?;
        self.method_descriptor(handle)
    }

    // Values

    fn field(&self, field_id: FieldId) -> ModelResult<(FieldKey, Arc<TypeDescriptor>)> {
        let key = self.refs.fields.lookup(field_id).ok_or(ModelError::InvalidReference {
            kind: RefKind::Field,
            id: field_id,
        })?;
        Ok((key, self.type_descriptor(key.declaring_type)?))
    }

    /// Tag a raw value for the wire; `signature` is the declared type
    pub fn tagged_value(&self, raw: RawValue, signature: &str) -> Value {
        match raw {
            RawValue::Boolean(v) => Value::new(TypeTag::Boolean, ValueData::Boolean(v)),
            RawValue::Byte(v) => Value::new(TypeTag::Byte, ValueData::Byte(v)),
            RawValue::Char(v) => Value::new(TypeTag::Char, ValueData::Char(v)),
            RawValue::Short(v) => Value::new(TypeTag::Short, ValueData::Short(v)),
            RawValue::Int(v) => Value::new(TypeTag::Int, ValueData::Int(v)),
            RawValue::Long(v) => Value::new(TypeTag::Long, ValueData::Long(v)),
            RawValue::Float(v) => Value::new(TypeTag::Float, ValueData::Float(v)),
            RawValue::Double(v) => Value::new(TypeTag::Double, ValueData::Double(v)),
            RawValue::Object(0) if signature.starts_with('[') => Value::object(TypeTag::Array, 0),
            RawValue::Object(0) => Value::null(),
            RawValue::Object(handle) => Value::object(self.object_tag(handle), self.object_id(handle)),
        }
    }

    /// Runtime tag of an object; unreadable objects are plain `L`
    pub fn object_tag(&self, handle: Handle) -> TypeTag {
        match self.classify(handle) {
            Ok(tag) => tag,
            Err(err) => {
                debug!("Tagging {:#x} as a plain object: {}", handle, err);
                TypeTag::Object
            }
        }
    }

    fn classify(&self, handle: Handle) -> ModelResult<TypeTag> {
        let ty = self.adapter.object_type(handle)?;
        if let TypeKind::Array { .. } = self.adapter.type_info(ty)?.kind {
            return Ok(TypeTag::Array);
        }
        if Some(ty) == self.core.string {
            return Ok(TypeTag::String);
        }
        let special = [
            (self.core.thread, TypeTag::Thread),
            (self.core.thread_group, TypeTag::ThreadGroup),
            (self.core.class_loader, TypeTag::ClassLoader),
            (self.core.class, TypeTag::ClassObject),
        ];
        for (ancestor, tag) in special {
            if self.extends(ty, ancestor)? {
                return Ok(tag);
            }
        }
        Ok(TypeTag::Object)
    }

    pub fn object_type(&self, object: ObjectId) -> ModelResult<Arc<TypeDescriptor>> {
        let handle = self.object_handle(object)?;
        self.type_descriptor(self.adapter.object_type(handle)?)
    }

    /// Field values of an object; fields may be inherited or static
    pub fn object_values(&self, object: ObjectId, field_ids: &[FieldId]) -> ModelResult<Vec<Value>> {
        let handle = self.object_handle(object)?;
        let runtime_type = self.adapter.object_type(handle)?;
        let mut instance_values = None;

        let mut values = Vec::with_capacity(field_ids.len());
        for field_id in field_ids {
            let (key, declaring) = self.field(*field_id)?;
            if !self.is_assignable(runtime_type, key.declaring_type)? {
                return Err(ModelError::InvalidReference {
                    kind: RefKind::Field,
                    id: *field_id,
                });
            }
            let field = &declaring.fields[key.index];
            let raw = if field.is_static() {
                self.static_raw(key)?
            } else {
                if instance_values.is_none() {
                    instance_values = Some(self.adapter.object_fields(handle)?);
                }
                instance_values
                    .iter()
                    .flatten()
                    .find(|v| v.declaring_type == key.declaring_type && v.index == key.index)
                    .map(|v| v.value)
                    .ok_or(ModelError::InvalidReference {
                        kind: RefKind::Field,
                        id: *field_id,
                    })?
            };
            values.push(self.tagged_value(raw, &field.signature));
        }
        Ok(values)
    }

    fn static_raw(&self, key: FieldKey) -> ModelResult<RawValue> {
        self.adapter
            .static_fields(key.declaring_type)?
            .into_iter()
            .find(|v| v.index == key.index)
            .map(|v| v.value)
            .ok_or(ModelError::Malformed(format!(
                "no static value for field {} of {:#x}",
                key.index, key.declaring_type
            )))
    }

    /// Static field values; fields may be declared by a supertype
    pub fn static_values(&self, type_id: ReferenceTypeId, field_ids: &[FieldId]) -> ModelResult<Vec<Value>> {
        let ty = self.reference_type(type_id)?;
        let mut values = Vec::with_capacity(field_ids.len());
        for field_id in field_ids {
            let (key, declaring) = self.field(*field_id)?;
            let field = &declaring.fields[key.index];
            if !field.is_static() || !self.is_assignable(ty.handle, key.declaring_type)? {
                return Err(ModelError::InvalidReference {
                    kind: RefKind::Field,
                    id: *field_id,
                });
            }
            values.push(self.tagged_value(self.static_raw(key)?, &field.signature));
        }
        Ok(values)
    }

    pub fn string_value(&self, object: ObjectId) -> ModelResult<String> {
        let handle = self.object_handle(object)?;
        self.adapter.string_value(handle).map_err(|err| match err {
            AdapterError::NotAString(_) => ModelError::NotAString(object),
            other => other.into(),
        })
    }

    fn array_component(&self, array: ObjectId, handle: Handle) -> ModelResult<String> {
        self.adapter.array_component(handle).map_err(|err| match err {
            AdapterError::NotAnArray(_) => ModelError::NotAnArray(array),
            other => other.into(),
        })
    }

    pub fn array_length(&self, array: ObjectId) -> ModelResult<usize> {
        let handle = self.object_handle(array)?;
        self.array_component(array, handle)?;
        Ok(self.adapter.array_length(handle)?)
    }

    /// Component tag and values of `array[first..first + length]`
    pub fn array_values(&self, array: ObjectId, first: i32, length: i32) -> ModelResult<(u8, Vec<Value>)> {
        let handle = self.object_handle(array)?;
        let component = self.array_component(array, handle)?;
        let size = self.adapter.array_length(handle)?;

        if first < 0 || first as usize > size {
            return Err(ModelError::InvalidIndex {
                index: first as i64,
                length: size,
            });
        }
        let first = first as usize;
        if length < 0 || first + length as usize > size {
            return Err(ModelError::InvalidLength {
                index: first,
                requested: length as i64,
                length: size,
            });
        }

        let values = self
            .adapter
            .read_array_elements(handle, first, length as usize)?
            .into_iter()
            .map(|raw| self.tagged_value(raw, &component))
            .collect();
        Ok((TypeTag::from_signature(&component) as u8, values))
    }

    // Heap queries

    /// The `java.lang.Class` instance of a type
    pub fn class_object(&self, type_id: ReferenceTypeId) -> ModelResult<ObjectId> {
        Ok(self.object_id(self.reference_type(type_id)?.mirror))
    }

    /// Type reflected by a `java.lang.Class` instance
    pub fn reflected_type(&self, object: ObjectId) -> ModelResult<Arc<TypeDescriptor>> {
        let handle = self.object_handle(object)?;
        self.all_types()?
            .into_iter()
            .find(|ty| ty.mirror == handle)
            .ok_or(ModelError::NotAClassObject(object))
    }

    /// Types a loader can name: its own, its parents' and the boot loader's
    pub fn visible_classes(&self, loader: ObjectId) -> ModelResult<Vec<Arc<TypeDescriptor>>> {
        let handle = self.object_handle(loader)?;
        let ty = self.adapter.object_type(handle)?;
        if !self.extends(ty, self.core.class_loader)? {
            return Err(ModelError::NotAClassLoader(loader));
        }

        let mut chain = vec![0, handle];
        let mut next = self.adapter.field_by_name(handle, "parent")?;
        while let RawValue::Object(parent) = next {
            if parent == 0 || chain.contains(&parent) {
                break;
            }
            chain.push(parent);
            next = self.adapter.field_by_name(parent, "parent")?;
        }

        let mut visible = Vec::new();
        for ty in self.all_types()? {
            if chain.contains(&self.adapter.type_info(ty.handle)?.class_loader) {
                visible.push(ty);
            }
        }
        Ok(visible)
    }

    /// Every walked object with its runtime type; unreadable headers are skipped
    fn heap_walk(&self) -> ModelResult<Vec<(Handle, Handle)>> {
        let mut walked = Vec::new();
        for object in self.adapter.heap_objects()? {
            match self.adapter.object_type(object) {
                Ok(ty) => walked.push((object, ty)),
                Err(AdapterError::Read(ReadError::Unmapped { .. })) => {
                    debug!("Skipping unreadable object {:#x}", object);
                }
                Err(err) => return Err(err.into()),
            }
        }
        Ok(walked)
    }

    fn tagged_object(&self, handle: Handle) -> Value {
        Value::object(self.object_tag(handle), self.object_id(handle))
    }

    /// Objects whose runtime type is exactly `type_id`; `limit` 0 means all
    pub fn instances(&self, type_id: ReferenceTypeId, limit: usize) -> ModelResult<Vec<Value>> {
        let ty = self.reference_type(type_id)?;
        let mut found = Vec::new();
        for (object, runtime_type) in self.heap_walk()? {
            if limit != 0 && found.len() == limit {
                break;
            }
            if runtime_type == ty.handle {
                found.push(self.tagged_object(object));
            }
        }
        Ok(found)
    }

    /// Exact-type instance count for each of `type_ids`
    pub fn instance_counts(&self, type_ids: &[ReferenceTypeId]) -> ModelResult<Vec<u64>> {
        let handles = type_ids
            .iter()
            .map(|id| self.reference_type(*id).map(|ty| ty.handle))
            .collect::<ModelResult<Vec<_>>>()?;
        let mut counts: HashMap<Handle, u64> = HashMap::new();
        if !handles.is_empty() {
            for (_, runtime_type) in self.heap_walk()? {
                *counts.entry(runtime_type).or_default() += 1;
            }
        }
        Ok(handles
            .iter()
            .map(|handle| counts.get(handle).copied().unwrap_or(0))
            .collect())
    }

    /// Objects holding a reference to `object` in a field or array element.
    /// A class object counts as referring through its type's statics.
    pub fn referring_objects(&self, object: ObjectId, limit: usize) -> ModelResult<Vec<Value>> {
        let target = self.object_handle(object)?;
        let mirrors: HashMap<Handle, Handle> = self
            .all_types()?
            .iter()
            .map(|ty| (ty.mirror, ty.handle))
            .collect();

        let mut found = Vec::new();
        for (candidate, runtime_type) in self.heap_walk()? {
            if limit != 0 && found.len() == limit {
                break;
            }
            if self.refers_to(candidate, runtime_type, target, mirrors.get(&candidate).copied())? {
                found.push(self.tagged_object(candidate));
            }
        }
        Ok(found)
    }

    fn refers_to(
        &self,
        object: Handle,
        runtime_type: Handle,
        target: Handle,
        reflected: Option<Handle>,
    ) -> ModelResult<bool> {
        let reference = RawValue::Object(target);
        let held = match &self.adapter.type_info(runtime_type)?.kind {
            TypeKind::Array { component } if component.starts_with(['L', '[']) => {
                let length = self.adapter.array_length(object)?;
                self.adapter.read_array_elements(object, 0, length)?.contains(&reference)
            }
            TypeKind::Array { .. } => false,
            _ => self
                .adapter
                .object_fields(object)?
                .iter()
                .any(|field| field.value == reference),
        };
        if held {
            return Ok(true);
        }
        match reflected {
            Some(ty) => Ok(self
                .adapter
                .static_fields(ty)?
                .iter()
                .any(|field| field.value == reference)),
            None => Ok(false),
        }
    }

    // Threads and frames

    pub fn threads(&self) -> ModelResult<Vec<Arc<ThreadDescriptor>>> {
        if let Some(threads) = lock(&self.threads, "threads").as_ref() {
            return Ok(threads.clone());
        }
        let threads = self
            .adapter
            .list_threads()?
            .into_iter()
            .map(|info| {
                Arc::new(ThreadDescriptor {
                    id: self.object_id(info.handle),
                    handle: info.handle,
                    name: info.name,
                    status: info.status,
                    group: self.object_id(info.group),
                })
            })
            .collect::<Vec<_>>();
        Ok(lock(&self.threads, "threads").get_or_insert(threads).clone())
    }

    pub fn thread(&self, id: ThreadId) -> ModelResult<Arc<ThreadDescriptor>> {
        let handle = self.object_handle(id)?;
        self.threads()?
            .into_iter()
            .find(|t| t.handle == handle)
            .ok_or(ModelError::InvalidReference {
                kind: RefKind::Thread,
                id,
            })
    }

    /// Frames of a thread, innermost first
    pub fn frames(&self, thread: ThreadId) -> ModelResult<Vec<Arc<FrameDescriptor>>> {
        let thread = self.thread(thread)?;
        if let Some(frames) = lock(&self.frames, "frames").get(&thread.handle) {
            return Ok(frames.clone());
        }

        let mut frames = Vec::new();
        for (depth, frame) in self.adapter.thread_frames(thread.handle)?.into_iter().enumerate() {
            let method = self.method_descriptor(frame.method)?;
            let ty = self.type_descriptor(frame.declaring_type)?;
            frames.push(Arc::new(FrameDescriptor {
                id: self.refs.frames.id_for(FrameKey {
                    thread: thread.handle,
                    depth,
                }),
                thread: thread.id,
                depth,
                location: Location {
                    type_tag: ty.tag as u8,
                    class_id: ty.id,
                    method_id: method.id,
                    index: frame.bci,
                },
            }));
        }
        Ok(lock(&self.frames, "frames")
            .entry(thread.handle)
            .or_insert(frames)
            .clone())
    }

    pub fn frame(&self, thread: ThreadId, frame: FrameId) -> ModelResult<Arc<FrameDescriptor>> {
        self.frames(thread)?
            .into_iter()
            .find(|f| f.id == frame)
            .ok_or(ModelError::InvalidReference {
                kind: RefKind::Frame,
                id: frame,
            })
    }

    fn frame_method(&self, frame: &FrameDescriptor) -> ModelResult<Arc<MethodDescriptor>> {
        self.method(frame.location.class_id, frame.location.method_id)
    }

    /// Local slot values, each read as the requested tag
    pub fn frame_values(
        &self,
        thread: ThreadId,
        frame: FrameId,
        slots: &[(i32, u8)],
    ) -> ModelResult<Vec<Value>> {
        let thread = self.thread(thread)?;
        let frame = self.frame(thread.id, frame)?;
        let locals = self.adapter.frame_locals(thread.handle, frame.depth)?;

        slots
            .iter()
            .map(|(slot, tag)| {
                let index = usize::try_from(*slot).map_err(|_| ModelError::InvalidSlot { slot: *slot })?;
                let local = locals.get(index).ok_or(ModelError::InvalidSlot { slot: *slot })?;
                self.slot_value(*local, *slot, *tag)
            })
            .collect()
    }

    fn slot_value(&self, local: StackSlot, slot: i32, tag: u8) -> ModelResult<Value> {
        let tag = TypeTag::from_u8(tag).ok_or(ModelError::InvalidTag(tag))?;
        let value = match (local, tag) {
            (_, TypeTag::Void) => return Err(ModelError::InvalidTag(tag as u8)),
            (StackSlot::Empty, t) if t.is_primitive() => primitive_from_bits(t, 0),
            (StackSlot::Word(bits), t) if t.is_primitive() => primitive_from_bits(t, bits),
            (StackSlot::Empty, TypeTag::Array) => Value::object(TypeTag::Array, 0),
            (StackSlot::Empty, _) => Value::null(),
            (StackSlot::Oop(0), t) if !t.is_primitive() => Value::object(t, 0),
            (StackSlot::Oop(handle), t) if !t.is_primitive() => {
                Value::object(self.object_tag(handle), self.object_id(handle))
            }
            _ => return Err(ModelError::InvalidSlot { slot }),
        };
        Ok(value)
    }

    /// Receiver of the frame's method, null for static and native methods
    pub fn this_object(&self, thread: ThreadId, frame: FrameId) -> ModelResult<Value> {
        let thread = self.thread(thread)?;
        let frame = self.frame(thread.id, frame)?;
        let method = self.frame_method(&frame)?;
        if method.is_static() || method.modifiers & modifiers::NATIVE != 0 {
            return Ok(Value::null());
        }
        match self.adapter.frame_locals(thread.handle, frame.depth)?.first() {
            Some(StackSlot::Oop(handle)) if *handle != 0 => Ok(Value::object(
                self.object_tag(*handle),
                self.object_id(*handle),
            )),
            _ => Ok(Value::null()),
        }
    }

    // Thread groups

    fn group_descriptor(&self, handle: Handle) -> ModelResult<Arc<ThreadGroupDescriptor>> {
        if let Some(group) = lock(&self.groups, "groups").get(&handle) {
            return Ok(group.clone());
        }
        let info = self.adapter.thread_group_info(handle)?;
        let group = Arc::new(ThreadGroupDescriptor {
            id: self.object_id(handle),
            handle,
            name: info.name,
            parent: self.object_id(info.parent),
        });
        Ok(lock(&self.groups, "groups").entry(handle).or_insert(group).clone())
    }

    pub fn thread_group(&self, id: ThreadGroupId) -> ModelResult<Arc<ThreadGroupDescriptor>> {
        let handle = self.object_handle(id)?;
        let ty = self.adapter.object_type(handle)?;
        if !self.extends(ty, self.core.thread_group)? {
            return Err(ModelError::InvalidReference {
                kind: RefKind::ThreadGroup,
                id,
            });
        }
        self.group_descriptor(handle)
    }

    /// Groups reachable from the threads, in order of first appearance
    fn known_groups(&self) -> ModelResult<Vec<Arc<ThreadGroupDescriptor>>> {
        let mut groups: Vec<Arc<ThreadGroupDescriptor>> = Vec::new();
        for thread in self.threads()? {
            let mut next = self.refs.objects.lookup(thread.group);
            while let Some(handle) = next {
                if groups.iter().any(|g| g.handle == handle) {
                    break;
                }
                let group = self.group_descriptor(handle)?;
                next = self.refs.objects.lookup(group.parent);
                groups.push(group);
            }
        }
        Ok(groups)
    }

    pub fn top_level_thread_groups(&self) -> ModelResult<Vec<Arc<ThreadGroupDescriptor>>> {
        Ok(self
            .known_groups()?
            .into_iter()
            .filter(|g| g.parent == 0)
            .collect())
    }

    /// Direct child threads and groups of a group
    pub fn thread_group_children(&self, id: ThreadGroupId) -> ModelResult<(Vec<ThreadId>, Vec<ThreadGroupId>)> {
        let group = self.thread_group(id)?;
        let threads = self
            .threads()?
            .iter()
            .filter(|t| t.group == group.id)
            .map(|t| t.id)
            .collect();
        let groups = self
            .known_groups()?
            .iter()
            .filter(|g| g.parent == group.id)
            .map(|g| g.id)
            .collect();
        Ok((threads, groups))
    }
}

fn primitive_from_bits(tag: TypeTag, bits: u64) -> Value {
    let data = match tag {
        TypeTag::Boolean => ValueData::Boolean(bits & 0xff != 0),
        TypeTag::Byte => ValueData::Byte(bits as u8 as i8),
        TypeTag::Char => ValueData::Char(bits as u16),
        TypeTag::Short => ValueData::Short(bits as u16 as i16),
        TypeTag::Int => ValueData::Int(bits as u32 as i32),
        TypeTag::Long => ValueData::Long(bits as i64),
        TypeTag::Float => ValueData::Float(f32::from_bits(bits as u32)),
        TypeTag::Double => ValueData::Double(f64::from_bits(bits)),
        _ => ValueData::Void,
    };
    Value::new(tag, data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::select_adapter;
    use crate::provider::dump::HeapSpec;
    use crate::provider::synthetic::{fixtures, SyntheticHeap};

    fn model_for(spec: &HeapSpec) -> (Arc<SyntheticHeap>, DebugModel) {
        let heap = Arc::new(SyntheticHeap::render(spec).unwrap());
        let adapter = select_adapter(heap.clone(), None).unwrap();
        (heap, DebugModel::new(adapter).unwrap())
    }

    fn model() -> (Arc<SyntheticHeap>, DebugModel) {
        model_for(&fixtures::two_types("11.0.2"))
    }

    fn type_named(model: &DebugModel, signature: &str) -> Arc<TypeDescriptor> {
        model.types_by_signature(signature).unwrap().remove(0)
    }

    #[test]
    fn test_argument_slots() {
        assert_eq!(argument_slots("()V"), 0);
        assert_eq!(argument_slots("(IJLjava/lang/String;[[D[LA;)V"), 6);
    }

    #[test]
    fn test_descriptors_are_memoized() {
        let (heap, model) = model();
        let handle = heap.klass_address("A").unwrap();
        let first = model.type_descriptor(handle).unwrap();
        let second = model.type_descriptor(handle).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert!(Arc::ptr_eq(&first, &model.reference_type(first.id).unwrap()));

        let methods = model.methods(&first).unwrap();
        let again = model.methods(&first).unwrap();
        assert!(Arc::ptr_eq(&methods[0], &again[0]));
    }

    #[test]
    fn test_all_types_sorted_by_signature() {
        let (_, model) = model();
        let all = model.all_types().unwrap();
        let signatures: Vec<&str> = all.iter().map(|t| t.signature.as_str()).collect();
        let mut sorted = signatures.clone();
        sorted.sort();
        assert_eq!(signatures, sorted);
        assert!(signatures.contains(&"LA;"));
        assert!(signatures.contains(&"[I"));
        assert!(model.types_by_signature("LMissing;").unwrap().is_empty());
    }

    #[test]
    fn test_hierarchy() {
        let (_, model) = model();
        let a = type_named(&model, "LA;");
        assert_eq!(a.tag, RefTypeTag::Class);
        let object = model.superclass(&a).unwrap().unwrap();
        assert_eq!(object.signature, "Ljava/lang/Object;");
        assert!(model.superclass(&object).unwrap().is_none());

        let ints = type_named(&model, "[I");
        assert_eq!(ints.tag, RefTypeTag::Array);
        assert_eq!(ints.component.as_deref(), Some("I"));
    }

    #[test]
    fn test_instance_values_are_tagged() {
        let (heap, model) = model();
        let a1 = model.object_id(heap.object_address("a1").unwrap());
        let a = model.object_type(a1).unwrap();
        let ids: Vec<FieldId> = a.fields.iter().filter(|f| !f.is_static()).map(|f| f.id).collect();

        let values = model.object_values(a1, &ids).unwrap();
        let tags: Vec<u8> = values.iter().map(|v| v.tag).collect();
        assert_eq!(tags, vec![b'I', b'Z', b'D', b'L', b's']);
        assert_eq!(values[0].data, ValueData::Int(42));
        assert_eq!(values[1].data, ValueData::Boolean(true));
        assert_eq!(values[2].data, ValueData::Double(2.5));

        let label = match values[4].data {
            ValueData::Object(id) => id,
            ref other => panic!("label is {:?}", other),
        };
        assert_eq!(model.string_value(label).unwrap(), "héllo");
        assert_eq!(model.string_value(a1), Err(ModelError::NotAString(a1)));
    }

    #[test]
    fn test_reference_ids_are_stable() {
        let (heap, model) = model();
        let a1 = model.object_id(heap.object_address("a1").unwrap());
        let b1 = model.object_id(heap.object_address("b1").unwrap());
        let b = model.object_type(b1).unwrap();
        let owner = b.fields.iter().find(|f| f.name == "owner").unwrap().id;

        let first = model.object_values(b1, &[owner]).unwrap();
        let second = model.object_values(b1, &[owner]).unwrap();
        assert_eq!(first, second);
        assert_eq!(first[0].data, ValueData::Object(a1));
        assert_ne!(a1, b1);
    }

    #[test]
    fn test_foreign_field_is_rejected() {
        let (heap, model) = model();
        let a1 = model.object_id(heap.object_address("a1").unwrap());
        let b = type_named(&model, "LB;");
        let weight = b.fields.iter().find(|f| f.name == "weight").unwrap().id;
        assert!(matches!(
            model.object_values(a1, &[weight]),
            Err(ModelError::InvalidReference { kind: RefKind::Field, .. })
        ));
    }

    #[test]
    fn test_static_values() {
        let (_, model) = model();
        let a = type_named(&model, "LA;");
        let instances = a.fields.iter().find(|f| f.is_static()).unwrap().id;
        let values = model.static_values(a.id, &[instances]).unwrap();
        assert_eq!(values, vec![Value::int(1)]);

        let count = a.fields[0].id;
        assert!(model.static_values(a.id, &[count]).is_err());
    }

    #[test]
    fn test_dangling_reference() {
        let (_, model) = model();
        assert_eq!(
            model.object_type(0xdead).unwrap_err(),
            ModelError::InvalidReference {
                kind: RefKind::Object,
                id: 0xdead
            }
        );
        assert!(matches!(
            model.reference_type(0xdead),
            Err(ModelError::InvalidReference { kind: RefKind::Type, .. })
        ));
    }

    #[test]
    fn test_arrays() {
        let (heap, model) = model();
        let ints = model.object_id(heap.object_address("ints").unwrap());
        assert_eq!(model.array_length(ints).unwrap(), 3);

        let (tag, values) = model.array_values(ints, 1, 2).unwrap();
        assert_eq!(tag, b'I');
        assert_eq!(values, vec![Value::int(2), Value::int(3)]);
        assert!(model.array_values(ints, 3, 0).unwrap().1.is_empty());
        assert!(matches!(model.array_values(ints, 4, 0), Err(ModelError::InvalidIndex { .. })));
        assert!(matches!(model.array_values(ints, -1, 1), Err(ModelError::InvalidIndex { .. })));
        assert!(matches!(model.array_values(ints, 1, 3), Err(ModelError::InvalidLength { .. })));

        let names = model.object_id(heap.object_address("names").unwrap());
        let (tag, values) = model.array_values(names, 0, 3).unwrap();
        assert_eq!(tag, b'L');
        assert_eq!(values[0].tag, b's');
        assert_eq!(values[1], Value::null());

        let a1 = model.object_id(heap.object_address("a1").unwrap());
        assert_eq!(model.array_length(a1), Err(ModelError::NotAnArray(a1)));
    }

    #[test]
    fn test_threads_and_frames() {
        let (heap, model) = model();
        let threads = model.threads().unwrap();
        assert_eq!(threads.len(), 1);
        let t = &threads[0];
        assert_eq!(t.name, "T");
        assert_eq!(t.status, ThreadStatus::Running);

        let frames = model.frames(t.id).unwrap();
        assert_eq!(frames.len(), 2);
        let foo = model.method(frames[0].location.class_id, frames[0].location.method_id).unwrap();
        let bar = model.method(frames[1].location.class_id, frames[1].location.method_id).unwrap();
        assert_eq!((foo.name.as_str(), frames[0].location.index), ("foo", 2));
        assert_eq!(bar.name, "bar");
        assert!(Arc::ptr_eq(&frames[0], &model.frame(t.id, frames[0].id).unwrap()));

        let a1 = model.object_id(heap.object_address("a1").unwrap());
        let values = model
            .frame_values(t.id, frames[0].id, &[(1, b'I'), (2, b'L'), (0, b'L')])
            .unwrap();
        assert_eq!(values[0], Value::int(5));
        assert_eq!(values[1].tag, b'L');
        assert_eq!(values[2].data, ValueData::Object(a1));
        assert!(matches!(
            model.frame_values(t.id, frames[0].id, &[(9, b'I')]),
            Err(ModelError::InvalidSlot { slot: 9 })
        ));
        assert!(matches!(
            model.frame_values(t.id, frames[0].id, &[(1, b'L')]),
            Err(ModelError::InvalidSlot { slot: 1 })
        ));

        let this = model.this_object(t.id, frames[0].id).unwrap();
        assert_eq!(this.data, ValueData::Object(a1));
        assert!(matches!(
            model.frame(t.id, 0xdead),
            Err(ModelError::InvalidReference { kind: RefKind::Frame, .. })
        ));
    }

    #[test]
    fn test_non_thread_is_invalid_thread() {
        let (heap, model) = model();
        let a1 = model.object_id(heap.object_address("a1").unwrap());
        assert!(matches!(
            model.thread(a1),
            Err(ModelError::InvalidReference { kind: RefKind::Thread, .. })
        ));
        assert!(matches!(
            model.thread_group(a1),
            Err(ModelError::InvalidReference { kind: RefKind::ThreadGroup, .. })
        ));
    }

    #[test]
    fn test_thread_groups() {
        let (_, model) = model();
        let thread = model.threads().unwrap()[0].clone();
        let top = model.top_level_thread_groups().unwrap();
        assert_eq!(top.len(), 1);
        assert_eq!(top[0].name, "system");

        let (threads, groups) = model.thread_group_children(top[0].id).unwrap();
        assert!(threads.is_empty());
        assert_eq!(groups, vec![thread.group]);

        let main = model.thread_group(thread.group).unwrap();
        assert_eq!(main.name, "main");
        assert_eq!(main.parent, top[0].id);
        let (threads, groups) = model.thread_group_children(main.id).unwrap();
        assert_eq!(threads, vec![thread.id]);
        assert!(groups.is_empty());
    }

    #[test]
    fn test_class_objects() {
        let (heap, model) = model();
        let a = type_named(&model, "LA;");
        let mirror = model.class_object(a.id).unwrap();
        let handle = heap.object_address("class:A").unwrap();
        assert_eq!(model.object_handle(mirror).unwrap(), handle);
        assert_eq!(model.object_tag(handle), TypeTag::ClassObject);
        assert!(Arc::ptr_eq(&model.reflected_type(mirror).unwrap(), &a));

        let a1 = model.object_id(heap.object_address("a1").unwrap());
        assert_eq!(model.reflected_type(a1).unwrap_err(), ModelError::NotAClassObject(a1));
    }

    #[test]
    fn test_instances_and_counts() {
        let (heap, model) = model();
        let a = type_named(&model, "LA;");
        let b = type_named(&model, "LB;");
        let object = type_named(&model, "Ljava/lang/Object;");
        let strings = type_named(&model, "Ljava/lang/String;");
        let a1 = model.object_id(heap.object_address("a1").unwrap());

        assert_eq!(model.instances(a.id, 0).unwrap(), vec![Value::object(TypeTag::Object, a1)]);
        // Exact type only
        assert!(model.instances(object.id, 0).unwrap().is_empty());

        let all = model.instances(strings.id, 0).unwrap();
        assert!(all.len() >= 3);
        assert!(all.iter().all(|v| v.tag == b's'));
        assert_eq!(model.instances(strings.id, 2).unwrap(), all[..2].to_vec());

        assert_eq!(
            model.instance_counts(&[a.id, b.id, object.id, strings.id]).unwrap(),
            vec![1, 1, 0, all.len() as u64]
        );
        assert!(model.instance_counts(&[]).unwrap().is_empty());
        assert!(matches!(
            model.instance_counts(&[a.id, 999_999]),
            Err(ModelError::InvalidReference { kind: RefKind::Type, id: 999_999 })
        ));
    }

    #[test]
    fn test_referring_objects() {
        let (heap, model) = model();
        let id = |name: &str| model.object_id(heap.object_address(name).unwrap());
        let (a1, b1, ints, names) = (id("a1"), id("b1"), id("ints"), id("names"));

        assert_eq!(model.referring_objects(a1, 0).unwrap(), vec![Value::object(TypeTag::Object, b1)]);
        assert_eq!(model.referring_objects(b1, 0).unwrap(), vec![Value::object(TypeTag::Object, a1)]);
        assert_eq!(model.referring_objects(ints, 1).unwrap(), vec![Value::object(TypeTag::Object, b1)]);
        assert!(model.referring_objects(names, 0).unwrap().is_empty());

        let element = match model.array_values(names, 0, 1).unwrap().1[0].data {
            ValueData::Object(id) => id,
            ref other => panic!("element is {:?}", other),
        };
        assert_eq!(
            model.referring_objects(element, 0).unwrap(),
            vec![Value::object(TypeTag::Array, names)]
        );
        assert!(matches!(
            model.referring_objects(999_999, 0),
            Err(ModelError::InvalidReference { kind: RefKind::Object, .. })
        ));
    }

    #[test]
    fn test_statics_refer_through_the_class_object() {
        let mut spec = fixtures::two_types("1.8.0_292");
        spec.classes[1].fields.push(
            serde_json::from_value(serde_json::json!(
                {"name": "root", "signature": "LA;", "static": true, "value": "@a1"}
            ))
            .unwrap(),
        );
        let (heap, model) = model_for(&spec);
        let a1 = model.object_id(heap.object_address("a1").unwrap());
        let b1 = model.object_id(heap.object_address("b1").unwrap());
        let class_b = model.object_id(heap.object_address("class:B").unwrap());

        assert_eq!(
            model.referring_objects(a1, 0).unwrap(),
            vec![
                Value::object(TypeTag::ClassObject, class_b),
                Value::object(TypeTag::Object, b1),
            ]
        );
    }

    #[test]
    fn test_visible_classes_follow_the_parent_chain() {
        let mut spec = fixtures::two_types("11.0.2");
        for loader in [
            serde_json::json!({"kind": "instance", "id": "ext", "class": "java/lang/ClassLoader", "fields": {}}),
            serde_json::json!({"kind": "instance", "id": "app", "class": "java/lang/ClassLoader",
                               "fields": {"parent": "@ext"}}),
        ] {
            spec.objects.push(serde_json::from_value(loader).unwrap());
        }
        spec.classes[0].loader = Some("ext".to_string());
        spec.classes[1].loader = Some("app".to_string());
        let (heap, model) = model_for(&spec);
        let id = |name: &str| model.object_id(heap.object_address(name).unwrap());

        let signatures = |loader| -> Vec<String> {
            model
                .visible_classes(loader)
                .unwrap()
                .iter()
                .map(|ty| ty.signature.clone())
                .collect()
        };
        let app = signatures(id("app"));
        assert!(app.contains(&"LA;".to_string()));
        assert!(app.contains(&"LB;".to_string()));
        assert!(app.contains(&"Ljava/lang/Object;".to_string()));
        let ext = signatures(id("ext"));
        assert!(ext.contains(&"LA;".to_string()));
        assert!(!ext.contains(&"LB;".to_string()));
        assert!(ext.contains(&"[I".to_string()));

        let a1 = id("a1");
        assert_eq!(model.visible_classes(a1).unwrap_err(), ModelError::NotAClassLoader(a1));
    }

    #[test]
    fn test_unreadable_object() {
        let mut spec = fixtures::two_types("1.8.0_292");
        spec.unmapped.push("b1".to_string());
        let (heap, model) = model_for(&spec);
        let a1 = model.object_id(heap.object_address("a1").unwrap());
        let a = model.object_type(a1).unwrap();
        let b_field = a.fields.iter().find(|f| f.name == "b").unwrap().id;

        // The referent cannot be classified, so it stays a plain object
        let value = model.object_values(a1, &[b_field]).unwrap().remove(0);
        assert_eq!(value.tag, b'L');
        let b1 = match value.data {
            ValueData::Object(id) => id,
            other => panic!("b is {:?}", other),
        };
        assert!(matches!(model.object_type(b1), Err(ModelError::Unreadable { .. })));
    }
}
