// Synthetic heap provider
//
// Renders a `HeapSpec` into a little-endian memory image plus class, method
// and thread metadata, laid out the way the JVM generation named by the
// spec's `java_version` lays them out. The rendered heap answers exactly one
// generation's introspection API.

use super::api::*;
use super::dump::{
    ClassSpec, DumpError, FieldSpec, HeapSpec, MethodSpec, ObjectSpec, ThreadGroupSpec,
    ThreadSpec,
};
use super::{IntrospectionApi, SnapshotHandle};
use crate::adapter::JvmGeneration;
use crate::types::modifiers;
use serde_json::Value as Json;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

const HEAP_BASE: Address = 0x7_0000_0000;
const KLASS_BASE: Address = 0x8_0000_0000;
const METHOD_BASE: Address = 0x9_0000_0000;
const OBJECT_GAP: u64 = 0x10;
const KLASS_STRIDE: u64 = 0x100;
const METHOD_STRIDE: u64 = 0x40;
// Statics start this far into a permgen klass block
const PERMGEN_STATICS_OFFSET: u64 = 0x60;
const MARK_WORD: u64 = 0x1;

const PRIMITIVE_ARRAYS: [&str; 8] = ["[Z", "[B", "[C", "[S", "[I", "[J", "[F", "[D"];

/// `1.8.0_292` → `1.8`, `11.0.2` → `11`
pub fn specification_version(java_version: &str) -> String {
    let mut parts = java_version.split(|c: char| c == '.' || c == '_' || c == '-');
    match parts.next() {
        Some("1") => match parts.next() {
            Some(minor) => format!("1.{}", minor),
            None => "1".to_string(),
        },
        Some(major) => major.to_string(),
        None => String::new(),
    }
}

fn value_size(signature: &str) -> u64 {
    match signature.as_bytes().first() {
        Some(b'Z') | Some(b'B') => 1,
        Some(b'C') | Some(b'S') => 2,
        Some(b'I') | Some(b'F') => 4,
        _ => 8,
    }
}

fn is_reference(signature: &str) -> bool {
    matches!(signature.as_bytes().first(), Some(b'L') | Some(b'['))
}

fn signature_of(name: &str) -> String {
    if name.starts_with('[') {
        name.to_string()
    } else {
        format!("L{};", name)
    }
}

/// `LA;` → `A`, `[I` → `[I`
fn name_of(signature: &str) -> Option<&str> {
    if signature.starts_with('[') {
        Some(signature)
    } else {
        signature.strip_prefix('L')?.strip_suffix(';')
    }
}

/// Memory image made of disjoint regions, one per object or klass block
#[derive(Debug, Default)]
pub struct RegionMemory {
    regions: BTreeMap<Address, Vec<u8>>,
    detached: AtomicBool,
}

impl HeapMemory for RegionMemory {
    fn read_bytes(&self, address: Address, len: usize) -> Result<Vec<u8>, ReadError> {
        if self.detached.load(Ordering::Acquire) {
            return Err(ReadError::Io("snapshot detached".to_string()));
        }
        let unmapped = ReadError::Unmapped { address, len };
        let (start, bytes) = self
            .regions
            .range(..=address)
            .next_back()
            .ok_or_else(|| unmapped.clone())?;
        let from = (address - start) as usize;
        let to = from.checked_add(len).ok_or_else(|| unmapped.clone())?;
        if to > bytes.len() {
            return Err(unmapped);
        }
        Ok(bytes[from..to].to_vec())
    }
}

#[derive(Debug, Clone)]
struct RenderedField {
    name: String,
    signature: String,
    access_flags: u32,
    offset: u64,
}

#[derive(Debug, Clone)]
struct KlassRecord {
    header: KlassHeader,
    fields: Vec<RenderedField>,
}

impl KlassRecord {
    /// Pack fields into `u16` tuples of `width`, interning names into a
    /// symbol table whose slot 0 stays unused.
    fn packed(&self, width: usize, encode_offset: impl Fn(u64) -> u32) -> (Vec<u16>, Vec<String>) {
        let mut symbols = vec![String::new()];
        let mut intern = |s: &str| -> u16 {
            match symbols.iter().position(|x| x == s) {
                Some(index) => index as u16,
                None => {
                    symbols.push(s.to_string());
                    (symbols.len() - 1) as u16
                }
            }
        };

        let mut packed = Vec::with_capacity(self.fields.len() * width);
        for field in &self.fields {
            let offset = encode_offset(field.offset);
            packed.push(field.access_flags as u16);
            packed.push(intern(&field.name));
            packed.push(intern(&field.signature));
            packed.push(0); // initval
            packed.push((offset & 0xffff) as u16);
            packed.push((offset >> 16) as u16);
            packed.resize(packed.len() + width - 6, 0);
        }
        (packed, symbols)
    }
}

/// A heap rendered for one JVM generation
#[derive(Debug)]
pub struct SyntheticHeap {
    generation: JvmGeneration,
    memory: RegionMemory,
    vm_structs: VmStructs,
    properties: BTreeMap<String, String>,
    klasses: HashMap<Address, KlassRecord>,
    dictionary: Vec<Address>,
    basic_arrays: Vec<Address>,
    loader_data: Vec<ClassLoaderData>,
    methods: HashMap<Address, MethodMetadata>,
    threads: Vec<JavaThreadSnapshot>,
    objects: HashMap<String, Address>,
    heap: Vec<Address>,
}

impl SyntheticHeap {
    pub fn render(spec: &HeapSpec) -> Result<Self, DumpError> {
        let spec_version = specification_version(&spec.java_version);
        let generation = JvmGeneration::detect(&spec_version)
            .map_err(|_| DumpError::UnsupportedVersion(spec.java_version.clone()))?;

        let heap = Builder::new(spec, generation)?.build()?;
        info!(
            "Rendered {} heap: {} klasses, {} objects, {} threads",
            generation,
            heap.klasses.len(),
            heap.objects.len(),
            heap.threads.len()
        );
        Ok(heap)
    }

    pub fn generation(&self) -> JvmGeneration {
        self.generation
    }

    /// Address of a described object (`a1`, `thread:T`, `class:A`, ...)
    pub fn object_address(&self, id: &str) -> Option<Address> {
        self.objects.get(id).copied()
    }

    pub fn klass_address(&self, name: &str) -> Option<Address> {
        self.klasses
            .iter()
            .find(|(_, record)| record.header.name == name)
            .map(|(address, _)| *address)
    }

    pub fn is_detached(&self) -> bool {
        self.memory.detached.load(Ordering::Acquire)
    }

    fn check_attached(&self) -> Result<(), ReadError> {
        if self.is_detached() {
            Err(ReadError::Io("snapshot detached".to_string()))
        } else {
            Ok(())
        }
    }

    fn record(&self, address: Address) -> Result<&KlassRecord, ReadError> {
        self.check_attached()?;
        self.klasses
            .get(&address)
            .ok_or(ReadError::UnknownHandle(address))
    }
}

impl SnapshotHandle for SyntheticHeap {
    fn system_property(&self, key: &str) -> Option<String> {
        self.properties.get(key).cloned()
    }

    fn introspection(self: Arc<Self>, generation: JvmGeneration) -> Option<IntrospectionApi> {
        if generation != self.generation {
            return None;
        }
        let api = match generation {
            JvmGeneration::Jdk6 => IntrospectionApi::Jdk6(self),
            JvmGeneration::Jdk8 => IntrospectionApi::Jdk8(self),
            JvmGeneration::Jdk10 => IntrospectionApi::Jdk10(self),
            JvmGeneration::Jdk13 => IntrospectionApi::Jdk13(self),
        };
        Some(api)
    }

    fn detach(&self) {
        debug!("Detaching synthetic {} heap", self.generation);
        self.memory.detached.store(true, Ordering::Release);
    }
}

impl IntrospectionBase for SyntheticHeap {
    fn memory(&self) -> &dyn HeapMemory {
        &self.memory
    }

    fn vm_structs(&self) -> &VmStructs {
        &self.vm_structs
    }

    fn system_property(&self, key: &str) -> Option<String> {
        self.properties.get(key).cloned()
    }

    fn java_threads(&self) -> Result<Vec<JavaThreadSnapshot>, ReadError> {
        self.check_attached()?;
        Ok(self.threads.clone())
    }

    fn method(&self, handle: Address) -> Result<MethodMetadata, ReadError> {
        self.check_attached()?;
        self.methods
            .get(&handle)
            .cloned()
            .ok_or(ReadError::UnknownHandle(handle))
    }

    fn heap_objects(&self) -> Result<Vec<Address>, ReadError> {
        self.check_attached()?;
        Ok(self.heap.clone())
    }
}

impl Hotspot6Api for SyntheticHeap {
    fn system_dictionary(&self) -> Result<Vec<Address>, ReadError> {
        self.check_attached()?;
        Ok(self.dictionary.clone())
    }

    fn basic_type_array_klasses(&self) -> Vec<Address> {
        self.basic_arrays.clone()
    }

    fn klass(&self, address: Address) -> Result<PermGenKlass, ReadError> {
        let record = self.record(address)?;
        let (fields, symbols) = record.packed(7, |offset| offset as u32);
        Ok(PermGenKlass {
            header: record.header.clone(),
            fields,
            symbols,
        })
    }
}

fn metaspace_klass(record: &KlassRecord) -> MetaspaceKlass {
    let (fields, symbols) = record.packed(6, |offset| ((offset as u32) << 2) | 0b01);
    MetaspaceKlass {
        header: record.header.clone(),
        fields,
        symbols,
    }
}

impl Hotspot8Api for SyntheticHeap {
    fn system_dictionary(&self) -> Result<Vec<Address>, ReadError> {
        self.check_attached()?;
        Ok(self.dictionary.clone())
    }

    fn basic_type_array_klasses(&self) -> Vec<Address> {
        self.basic_arrays.clone()
    }

    fn klass(&self, address: Address) -> Result<MetaspaceKlass, ReadError> {
        Ok(metaspace_klass(self.record(address)?))
    }
}

impl Hotspot10Api for SyntheticHeap {
    fn class_loader_data_graph(&self) -> Result<Vec<ClassLoaderData>, ReadError> {
        self.check_attached()?;
        Ok(self.loader_data.clone())
    }

    fn klass(&self, address: Address) -> Result<MetaspaceKlass, ReadError> {
        Ok(metaspace_klass(self.record(address)?))
    }
}

impl Hotspot13Api for SyntheticHeap {
    fn class_loader_data_graph(&self) -> Result<Vec<ClassLoaderData>, ReadError> {
        self.check_attached()?;
        Ok(self.loader_data.clone())
    }

    fn klass(&self, address: Address) -> Result<ResolvedKlass, ReadError> {
        let record = self.record(address)?;
        Ok(ResolvedKlass {
            header: record.header.clone(),
            fields: record
                .fields
                .iter()
                .map(|f| FieldEntry {
                    name: f.name.clone(),
                    signature: f.signature.clone(),
                    access_flags: f.access_flags,
                    offset: f.offset as u32,
                })
                .collect(),
        })
    }
}

#[derive(Debug, Clone)]
enum DefLayout {
    Instance,
    ObjArray(String),
    TypeArray(u8),
}

#[derive(Debug, Clone)]
struct ClassDef {
    name: String,
    super_name: Option<String>,
    interfaces: Vec<String>,
    access_flags: u32,
    init_state: u8,
    source_file: Option<String>,
    loader: Option<String>,
    fields: Vec<FieldSpec>,
    methods: Vec<MethodSpec>,
    layout: DefLayout,
}

impl ClassDef {
    fn core(name: &str, super_name: Option<&str>, fields: &[(&str, &str)]) -> Self {
        Self {
            name: name.to_string(),
            super_name: super_name.map(str::to_string),
            interfaces: Vec::new(),
            access_flags: modifiers::PUBLIC,
            init_state: init_state::FULLY_INITIALIZED,
            source_file: None,
            loader: None,
            fields: fields
                .iter()
                .map(|(name, sig)| FieldSpec::instance(name, sig))
                .collect(),
            methods: Vec::new(),
            layout: DefLayout::Instance,
        }
    }

    fn array(name: &str, layout: DefLayout, loader: Option<String>) -> Self {
        Self {
            name: name.to_string(),
            super_name: Some("java/lang/Object".to_string()),
            interfaces: Vec::new(),
            access_flags: modifiers::PUBLIC | modifiers::FINAL | modifiers::ABSTRACT,
            init_state: init_state::FULLY_INITIALIZED,
            source_file: None,
            loader,
            fields: Vec::new(),
            methods: Vec::new(),
            layout,
        }
    }

    fn from_spec(spec: &ClassSpec) -> Self {
        let default_access = if spec.interface {
            modifiers::PUBLIC | modifiers::INTERFACE | modifiers::ABSTRACT
        } else {
            modifiers::PUBLIC
        };
        let super_name = match &spec.super_name {
            Some(name) => Some(name.clone()),
            None if spec.name != "java/lang/Object" => Some("java/lang/Object".to_string()),
            None => None,
        };
        Self {
            name: spec.name.clone(),
            super_name,
            interfaces: spec.interfaces.clone(),
            access_flags: spec.access.unwrap_or(default_access),
            init_state: if spec.prepared {
                init_state::FULLY_INITIALIZED
            } else {
                init_state::LOADED
            },
            source_file: spec.source_file.clone(),
            loader: spec.loader.clone(),
            fields: spec.fields.clone(),
            methods: spec.methods.clone(),
            layout: DefLayout::Instance,
        }
    }
}

#[derive(Debug, Clone)]
struct SlotField {
    name: String,
    signature: String,
    offset: u64,
}

#[derive(Debug, Clone)]
struct ClassLayout {
    /// Inherited first; lookups search from the back so subclasses shadow
    instance_fields: Vec<SlotField>,
    own_fields: Vec<RenderedField>,
    instance_end: u64,
    statics_end: u64,
}

struct Builder<'a> {
    spec: &'a HeapSpec,
    generation: JvmGeneration,
    compressed: bool,
    structs: VmStructs,
    defs: Vec<ClassDef>,
    by_name: HashMap<String, usize>,
    layouts: Vec<Option<ClassLayout>>,
    klass_addresses: Vec<Address>,
    mirrors: Vec<Address>,
    regions: BTreeMap<Address, Vec<u8>>,
    next_object: Address,
    heap: Vec<Address>,
    objects: HashMap<String, Address>,
    interned: HashMap<String, Address>,
    methods: HashMap<Address, MethodMetadata>,
    method_addresses: Vec<Vec<Address>>,
}

impl<'a> Builder<'a> {
    fn new(spec: &'a HeapSpec, generation: JvmGeneration) -> Result<Self, DumpError> {
        let compressed = spec.compressed_class_pointers;
        let mut flags = BTreeMap::new();
        match generation {
            JvmGeneration::Jdk6 => {
                flags.insert("UseCompressedOops".to_string(), compressed);
            }
            _ => {
                flags.insert("UseCompressedOops".to_string(), compressed);
                flags.insert("UseCompressedClassPointers".to_string(), compressed);
            }
        }
        let structs = VmStructs {
            flags,
            klass_offset: 8,
            narrow_klass_base: KLASS_BASE,
            narrow_klass_shift: 3,
        };

        let mut builder = Self {
            spec,
            generation,
            compressed,
            structs,
            defs: Vec::new(),
            by_name: HashMap::new(),
            layouts: Vec::new(),
            klass_addresses: Vec::new(),
            mirrors: Vec::new(),
            regions: BTreeMap::new(),
            next_object: HEAP_BASE,
            heap: Vec::new(),
            objects: HashMap::new(),
            interned: HashMap::new(),
            methods: HashMap::new(),
            method_addresses: Vec::new(),
        };
        builder.define_classes()?;
        Ok(builder)
    }

    fn define(&mut self, def: ClassDef) -> Result<usize, DumpError> {
        if self.by_name.contains_key(&def.name) {
            return Err(DumpError::DuplicateClass(def.name));
        }
        let index = self.defs.len();
        self.by_name.insert(def.name.clone(), index);
        self.defs.push(def);
        Ok(index)
    }

    fn class_index(&self, name: &str) -> Result<usize, DumpError> {
        self.by_name
            .get(name)
            .copied()
            .ok_or_else(|| DumpError::UnknownClass(name.to_string()))
    }

    fn define_classes(&mut self) -> Result<(), DumpError> {
        let (string_fields, thread_name): (&[(&str, &str)], &str) = match self.generation {
            JvmGeneration::Jdk6 => (
                &[("value", "[C"), ("offset", "I"), ("count", "I"), ("hash", "I")],
                "[C",
            ),
            JvmGeneration::Jdk8 => (&[("value", "[C"), ("hash", "I")], "[C"),
            JvmGeneration::Jdk10 | JvmGeneration::Jdk13 => (
                &[("value", "[B"), ("coder", "B"), ("hash", "I")],
                "Ljava/lang/String;",
            ),
        };

        let core = [
            ClassDef::core("java/lang/Object", None, &[]),
            ClassDef::core("java/lang/String", Some("java/lang/Object"), string_fields),
            ClassDef::core("java/lang/Class", Some("java/lang/Object"), &[]),
            ClassDef::core(
                "java/lang/ClassLoader",
                Some("java/lang/Object"),
                &[("parent", "Ljava/lang/ClassLoader;")],
            ),
            ClassDef::core(
                "java/lang/ThreadGroup",
                Some("java/lang/Object"),
                &[
                    ("parent", "Ljava/lang/ThreadGroup;"),
                    ("name", "Ljava/lang/String;"),
                    ("maxPriority", "I"),
                ],
            ),
            ClassDef::core(
                "java/lang/Thread",
                Some("java/lang/Object"),
                &[
                    ("name", thread_name),
                    ("priority", "I"),
                    ("daemon", "Z"),
                    ("threadStatus", "I"),
                    ("group", "Ljava/lang/ThreadGroup;"),
                ],
            ),
        ];
        for mut def in core {
            if def.name == "java/lang/String" {
                def.access_flags |= modifiers::FINAL;
            }
            self.define(def)?;
        }

        let spec = self.spec;
        for class in &spec.classes {
            self.define(ClassDef::from_spec(class))?;
        }

        for name in PRIMITIVE_ARRAYS {
            let element = name.as_bytes()[1];
            self.define(ClassDef::array(name, DefLayout::TypeArray(element), None))?;
        }

        for object in &spec.objects {
            if let ObjectSpec::Array { component, .. } = object {
                if is_reference(component) {
                    self.ensure_array_class(&format!("[{}", component))?;
                }
            }
        }

        for def in &self.defs {
            if let Some(super_name) = &def.super_name {
                self.class_index(super_name)?;
            }
            for interface in &def.interfaces {
                self.class_index(interface)?;
            }
        }
        Ok(())
    }

    fn ensure_array_class(&mut self, name: &str) -> Result<usize, DumpError> {
        if let Some(index) = self.by_name.get(name) {
            return Ok(*index);
        }
        let element_sig = &name[1..];
        let element = name_of(element_sig)
            .ok_or_else(|| DumpError::UnknownClass(name.to_string()))?
            .to_string();
        let element_index = if element.starts_with('[') {
            self.ensure_array_class(&element)?
        } else {
            self.class_index(&element)?
        };
        let loader = self.defs[element_index].loader.clone();
        self.define(ClassDef::array(name, DefLayout::ObjArray(element), loader))
    }

    fn build(mut self) -> Result<SyntheticHeap, DumpError> {
        self.layouts = vec![None; self.defs.len()];
        for index in 0..self.defs.len() {
            self.layout(index, &mut Vec::new())?;
        }
        self.assign_klass_addresses()?;
        self.assign_methods()?;
        self.allocate_named_objects()?;
        self.write_mirrors()?;
        self.write_objects()?;
        let threads = self.render_threads()?;

        let spec = self.spec;
        for id in &spec.unmapped {
            let address = self.object(id)?;
            self.regions.remove(&address);
        }
        let regions = &self.regions;
        self.heap.retain(|address| regions.contains_key(address));

        let klasses = self.klass_records()?;
        let (dictionary, basic_arrays, loader_data) = self.enumerations();

        Ok(SyntheticHeap {
            generation: self.generation,
            memory: RegionMemory {
                regions: self.regions,
                detached: AtomicBool::new(false),
            },
            vm_structs: self.structs,
            properties: properties(self.spec),
            klasses,
            dictionary,
            basic_arrays,
            loader_data,
            methods: self.methods,
            threads,
            objects: self.objects,
            heap: self.heap,
        })
    }

    fn header_size(&self) -> u64 {
        self.structs.instance_header_size(self.compressed)
    }

    fn statics_start(&self) -> u64 {
        match self.generation {
            JvmGeneration::Jdk6 => PERMGEN_STATICS_OFFSET,
            // After the (field-less) java.lang.Class instance
            _ => self.header_size(),
        }
    }

    fn layout(&mut self, index: usize, visiting: &mut Vec<usize>) -> Result<(), DumpError> {
        if self.layouts[index].is_some() {
            return Ok(());
        }
        if visiting.contains(&index) {
            return Err(DumpError::InvalidClass {
                name: self.defs[index].name.clone(),
                reason: "circular superclass chain".to_string(),
            });
        }
        visiting.push(index);

        let (mut instance_fields, mut cursor) = match self.defs[index].super_name.clone() {
            Some(super_name) => {
                let super_index = self.class_index(&super_name)?;
                self.layout(super_index, visiting)?;
                match &self.layouts[super_index] {
                    Some(layout) => (layout.instance_fields.clone(), layout.instance_end),
                    None => (Vec::new(), self.header_size()),
                }
            }
            None => (Vec::new(), self.header_size()),
        };

        let mut statics_cursor = self.statics_start();
        let mut own_fields = Vec::new();
        for field in &self.defs[index].fields {
            let size = value_size(&field.signature);
            let mut access = field.access.unwrap_or(modifiers::PRIVATE);
            let offset = if field.is_static {
                access |= modifiers::STATIC;
                let offset = align_up(statics_cursor, size);
                statics_cursor = offset + size;
                offset
            } else {
                let offset = align_up(cursor, size);
                cursor = offset + size;
                instance_fields.push(SlotField {
                    name: field.name.clone(),
                    signature: field.signature.clone(),
                    offset,
                });
                offset
            };
            own_fields.push(RenderedField {
                name: field.name.clone(),
                signature: field.signature.clone(),
                access_flags: access,
                offset,
            });
        }

        visiting.pop();
        self.layouts[index] = Some(ClassLayout {
            instance_fields,
            own_fields,
            instance_end: cursor,
            statics_end: statics_cursor,
        });
        Ok(())
    }

    fn class_layout(&self, index: usize) -> Result<&ClassLayout, DumpError> {
        self.layouts[index]
            .as_ref()
            .ok_or_else(|| DumpError::InvalidClass {
                name: self.defs[index].name.clone(),
                reason: "layout not computed".to_string(),
            })
    }

    fn assign_klass_addresses(&mut self) -> Result<(), DumpError> {
        let mut next = KLASS_BASE + 0x1000;
        for index in 0..self.defs.len() {
            let address = next;
            if self.generation == JvmGeneration::Jdk6 {
                // Permgen klass blocks carry their statics
                let size = align_up(self.class_layout(index)?.statics_end, 0x10);
                self.regions.insert(address, vec![0; size as usize]);
                next = align_up(address + size.max(KLASS_STRIDE), 0x10);
            } else {
                next = address + KLASS_STRIDE;
            }
            self.klass_addresses.push(address);
        }
        Ok(())
    }

    fn assign_methods(&mut self) -> Result<(), DumpError> {
        let mut next = METHOD_BASE;
        for index in 0..self.defs.len() {
            let holder = self.klass_addresses[index];
            let mut addresses = Vec::new();
            for method in &self.defs[index].methods {
                let address = next;
                next += METHOD_STRIDE;
                self.methods.insert(address, method_metadata(holder, method));
                addresses.push(address);
            }
            self.method_addresses.push(addresses);
        }
        Ok(())
    }

    fn allocate(&mut self, size: u64) -> Address {
        let address = self.next_object;
        let size = align_up(size.max(self.header_size()), 8);
        self.regions.insert(address, vec![0; size as usize]);
        self.heap.push(address);
        self.next_object = address + size + OBJECT_GAP;
        address
    }

    fn name_object(&mut self, id: String, address: Address) -> Result<(), DumpError> {
        if self.objects.insert(id.clone(), address).is_some() {
            return Err(DumpError::DuplicateObject(id));
        }
        Ok(())
    }

    fn object(&self, id: &str) -> Result<Address, DumpError> {
        self.objects
            .get(id)
            .copied()
            .ok_or_else(|| DumpError::UnknownObject(id.to_string()))
    }

    fn instance_size(&self, class: &str) -> Result<u64, DumpError> {
        Ok(self.class_layout(self.class_index(class)?)?.instance_end)
    }

    fn array_size(&self, component: &str, length: usize) -> u64 {
        let element = value_size(component);
        self.structs.array_base_offset(self.compressed, element) + element * length as u64
    }

    fn thread_groups(&self) -> Vec<ThreadGroupSpec> {
        let mut groups = self.spec.thread_groups.clone();
        let mut ensure = |name: &str, parent: Option<&str>| {
            if !groups.iter().any(|g| g.name == name) {
                groups.push(ThreadGroupSpec {
                    name: name.to_string(),
                    parent: parent.map(str::to_string),
                });
            }
        };
        ensure("system", None);
        ensure("main", Some("system"));
        groups
    }

    fn thread_class(thread: &ThreadSpec) -> &str {
        thread.class.as_deref().unwrap_or("java/lang/Thread")
    }

    fn allocate_named_objects(&mut self) -> Result<(), DumpError> {
        let mirror_size = match self.generation {
            JvmGeneration::Jdk6 => self.instance_size("java/lang/Class")?,
            _ => 0,
        };
        for index in 0..self.defs.len() {
            let size = match self.generation {
                JvmGeneration::Jdk6 => mirror_size,
                _ => self.class_layout(index)?.statics_end,
            };
            let address = self.allocate(size);
            self.mirrors.push(address);
            let id = format!("class:{}", self.defs[index].name);
            self.name_object(id, address)?;
        }

        for group in self.thread_groups() {
            let address = self.allocate(self.instance_size("java/lang/ThreadGroup")?);
            self.name_object(ThreadGroupSpec::object_id(&group.name), address)?;
        }

        let spec = self.spec;
        for thread in &spec.threads {
            let address = self.allocate(self.instance_size(Self::thread_class(thread))?);
            self.name_object(thread.object_id(), address)?;
        }

        for object in &spec.objects {
            let size = match object {
                ObjectSpec::Instance { class, .. } => self.instance_size(class)?,
                ObjectSpec::Array {
                    component,
                    elements,
                    ..
                } => self.array_size(component, elements.len()),
                ObjectSpec::String { .. } => self.instance_size("java/lang/String")?,
            };
            let address = self.allocate(size);
            self.name_object(object.id().to_string(), address)?;
        }
        Ok(())
    }

    fn write(&mut self, address: Address, bytes: &[u8]) -> Result<(), DumpError> {
        let out_of_image = || DumpError::InvalidValue {
            context: format!("{:#x}", address),
            reason: "write outside the heap image".to_string(),
        };
        let (start, region) = self
            .regions
            .range_mut(..=address)
            .next_back()
            .ok_or_else(out_of_image)?;
        let from = (address - start) as usize;
        let to = from + bytes.len();
        if to > region.len() {
            return Err(out_of_image());
        }
        region[from..to].copy_from_slice(bytes);
        Ok(())
    }

    fn write_sized(&mut self, address: Address, bits: u64, size: u64) -> Result<(), DumpError> {
        let bytes = bits.to_le_bytes();
        self.write(address, &bytes[..size as usize])
    }

    fn write_header(&mut self, address: Address, class_index: usize) -> Result<(), DumpError> {
        self.write_sized(address, MARK_WORD, 8)?;
        let klass = self.klass_addresses[class_index];
        let klass_at = address + self.structs.klass_offset;
        if self.compressed {
            let narrow = self
                .structs
                .encode_narrow_klass(klass)
                .ok_or_else(|| DumpError::InvalidClass {
                    name: self.defs[class_index].name.clone(),
                    reason: "klass outside the compressed class space".to_string(),
                })?;
            self.write_sized(klass_at, narrow as u64, 4)
        } else {
            self.write_sized(klass_at, klass, 8)
        }
    }

    fn field_slot(&self, class: &str, field: &str) -> Result<SlotField, DumpError> {
        let layout = self.class_layout(self.class_index(class)?)?;
        layout
            .instance_fields
            .iter()
            .rev()
            .find(|f| f.name == field)
            .cloned()
            .ok_or_else(|| DumpError::UnknownField {
                class: class.to_string(),
                field: field.to_string(),
            })
    }

    fn write_field(
        &mut self,
        object: Address,
        class: &str,
        field: &str,
        value: &Json,
    ) -> Result<(), DumpError> {
        let slot = self.field_slot(class, field)?;
        let context = format!("{}.{}", class, field);
        let bits = self.value_bits(&slot.signature, value, &context)?;
        self.write_sized(object + slot.offset, bits, value_size(&slot.signature))
    }

    fn write_mirrors(&mut self) -> Result<(), DumpError> {
        let class_index = self.class_index("java/lang/Class")?;
        for index in 0..self.defs.len() {
            let mirror = self.mirrors[index];
            self.write_header(mirror, class_index)?;

            let base = match self.generation {
                JvmGeneration::Jdk6 => self.klass_addresses[index],
                _ => mirror,
            };
            let name = self.defs[index].name.clone();
            for field in self.defs[index].fields.clone() {
                if !field.is_static {
                    continue;
                }
                let offset = self
                    .class_layout(index)?
                    .own_fields
                    .iter()
                    .find(|f| f.name == field.name)
                    .map(|f| f.offset)
                    .ok_or_else(|| DumpError::UnknownField {
                        class: name.clone(),
                        field: field.name.clone(),
                    })?;
                let context = format!("{}.{}", name, field.name);
                let bits = self.value_bits(&field.signature, &field.value, &context)?;
                self.write_sized(base + offset, bits, value_size(&field.signature))?;
            }
        }
        Ok(())
    }

    fn write_objects(&mut self) -> Result<(), DumpError> {
        let spec = self.spec;

        for group in self.thread_groups() {
            let address = self.object(&ThreadGroupSpec::object_id(&group.name))?;
            self.write_header(address, self.class_index("java/lang/ThreadGroup")?)?;
            let class = "java/lang/ThreadGroup";
            self.write_field(address, class, "name", &Json::String(group.name.clone()))?;
            self.write_field(address, class, "maxPriority", &Json::from(10))?;
            if let Some(parent) = &group.parent {
                let parent_ref = Json::String(format!("@{}", ThreadGroupSpec::object_id(parent)));
                self.write_field(address, class, "parent", &parent_ref)?;
            }
        }

        for thread in &spec.threads {
            let address = self.object(&thread.object_id())?;
            let class = Self::thread_class(thread);
            self.write_header(address, self.class_index(class)?)?;
            self.write_thread_name(address, class, &thread.name)?;
            self.write_field(address, class, "priority", &Json::from(5))?;
            self.write_field(address, class, "daemon", &Json::Bool(thread.daemon))?;
            self.write_field(
                address,
                class,
                "threadStatus",
                &Json::from(thread.state.jvmti_status()),
            )?;
            let group_ref = Json::String(format!("@{}", ThreadGroupSpec::object_id(&thread.group)));
            self.write_field(address, class, "group", &group_ref)?;
        }

        for object in &spec.objects {
            let address = self.object(object.id())?;
            match object {
                ObjectSpec::Instance { class, fields, .. } => {
                    self.write_header(address, self.class_index(class)?)?;
                    for (name, value) in fields {
                        self.write_field(address, class, name, value)?;
                    }
                }
                ObjectSpec::Array {
                    component,
                    elements,
                    ..
                } => {
                    let class = format!("[{}", component);
                    self.write_array(address, &class, component, elements)?;
                }
                ObjectSpec::String { value, .. } => {
                    self.write_string(address, value)?;
                }
            }
        }
        Ok(())
    }

    fn write_array(
        &mut self,
        address: Address,
        class: &str,
        component: &str,
        elements: &[Json],
    ) -> Result<(), DumpError> {
        self.write_header(address, self.class_index(class)?)?;
        let length_at = address + self.structs.array_length_offset(self.compressed);
        self.write_sized(length_at, elements.len() as u64, 4)?;

        let size = value_size(component);
        let base = address + self.structs.array_base_offset(self.compressed, size);
        for (i, element) in elements.iter().enumerate() {
            let context = format!("{}[{}]", class, i);
            let bits = self.value_bits(component, element, &context)?;
            self.write_sized(base + i as u64 * size, bits, size)?;
        }
        Ok(())
    }

    fn new_primitive_array(&mut self, component: &str, bits: &[u64]) -> Result<Address, DumpError> {
        let address = self.allocate(self.array_size(component, bits.len()));
        let class = format!("[{}", component);
        self.write_header(address, self.class_index(&class)?)?;
        let length_at = address + self.structs.array_length_offset(self.compressed);
        self.write_sized(length_at, bits.len() as u64, 4)?;

        let size = value_size(component);
        let base = address + self.structs.array_base_offset(self.compressed, size);
        for (i, value) in bits.iter().enumerate() {
            self.write_sized(base + i as u64 * size, *value, size)?;
        }
        Ok(address)
    }

    fn write_string(&mut self, address: Address, value: &str) -> Result<(), DumpError> {
        let class = "java/lang/String";
        self.write_header(address, self.class_index(class)?)?;
        let units: Vec<u64> = value.encode_utf16().map(u64::from).collect();

        let (array, coder) = match self.generation {
            JvmGeneration::Jdk6 | JvmGeneration::Jdk8 => (self.new_primitive_array("C", &units)?, None),
            JvmGeneration::Jdk10 | JvmGeneration::Jdk13 => {
                if units.iter().all(|u| *u <= 0xff) {
                    (self.new_primitive_array("B", &units)?, Some(0))
                } else {
                    let bytes: Vec<u64> = units
                        .iter()
                        .flat_map(|u| [u & 0xff, u >> 8])
                        .collect();
                    (self.new_primitive_array("B", &bytes)?, Some(1))
                }
            }
        };

        let slot = self.field_slot(class, "value")?;
        self.write_sized(address + slot.offset, array, 8)?;
        if let Some(coder) = coder {
            self.write_field(address, class, "coder", &Json::from(coder))?;
        }
        if self.generation == JvmGeneration::Jdk6 {
            self.write_field(address, class, "offset", &Json::from(0))?;
            self.write_field(address, class, "count", &Json::from(units.len()))?;
        }
        Ok(())
    }

    fn write_thread_name(&mut self, thread: Address, class: &str, name: &str) -> Result<(), DumpError> {
        match self.generation {
            JvmGeneration::Jdk6 | JvmGeneration::Jdk8 => {
                let units: Vec<u64> = name.encode_utf16().map(u64::from).collect();
                let array = self.new_primitive_array("C", &units)?;
                let slot = self.field_slot(class, "name")?;
                self.write_sized(thread + slot.offset, array, 8)
            }
            _ => self.write_field(thread, class, "name", &Json::String(name.to_string())),
        }
    }

    fn intern(&mut self, value: &str) -> Result<Address, DumpError> {
        if let Some(address) = self.interned.get(value) {
            return Ok(*address);
        }
        let address = self.allocate(self.instance_size("java/lang/String")?);
        self.write_string(address, value)?;
        self.interned.insert(value.to_string(), address);
        Ok(address)
    }

    fn reference(&mut self, signature: &str, value: &Json, context: &str) -> Result<Address, DumpError> {
        match value {
            Json::Null => Ok(0),
            Json::String(s) => match s.strip_prefix('@') {
                Some(id) => self.object(id),
                None if matches!(
                    signature,
                    "Ljava/lang/String;" | "Ljava/lang/Object;" | "Ljava/lang/CharSequence;"
                ) =>
                {
                    self.intern(s)
                }
                None => Err(DumpError::InvalidValue {
                    context: context.to_string(),
                    reason: format!("string literal for {}", signature),
                }),
            },
            other => Err(DumpError::InvalidValue {
                context: context.to_string(),
                reason: format!("expected a reference, got {}", other),
            }),
        }
    }

    /// Raw bits of `value` stored as `signature`
    fn value_bits(&mut self, signature: &str, value: &Json, context: &str) -> Result<u64, DumpError> {
        if is_reference(signature) {
            return self.reference(signature, value, context);
        }
        if value.is_null() {
            return Ok(0);
        }

        let invalid = |reason: &str| DumpError::InvalidValue {
            context: context.to_string(),
            reason: reason.to_string(),
        };

        let bits = match signature.as_bytes().first() {
            Some(b'Z') => match value {
                Json::Bool(b) => *b as u64,
                Json::Number(n) => (n.as_i64().unwrap_or(0) != 0) as u64,
                _ => return Err(invalid("expected a boolean")),
            },
            Some(b'C') => match value {
                Json::String(s) => {
                    let mut units = s.encode_utf16();
                    match (units.next(), units.next()) {
                        (Some(unit), None) => unit as u64,
                        _ => return Err(invalid("expected a single character")),
                    }
                }
                Json::Number(n) => n.as_u64().ok_or_else(|| invalid("expected a char code"))?,
                _ => return Err(invalid("expected a character")),
            },
            Some(b'F') => {
                let f = value.as_f64().ok_or_else(|| invalid("expected a number"))?;
                (f as f32).to_bits() as u64
            }
            Some(b'D') => {
                let f = value.as_f64().ok_or_else(|| invalid("expected a number"))?;
                f.to_bits()
            }
            Some(b'B') | Some(b'S') | Some(b'I') | Some(b'J') => {
                value.as_i64().ok_or_else(|| invalid("expected an integer"))? as u64
            }
            _ => return Err(invalid("unknown signature")),
        };
        Ok(bits)
    }

    fn render_threads(&mut self) -> Result<Vec<JavaThreadSnapshot>, DumpError> {
        let spec = self.spec;
        let mut threads = Vec::new();
        for thread in &spec.threads {
            let thread_oop = self.object(&thread.object_id())?;
            let mut frames = Vec::new();
            for frame in &thread.frames {
                let class_index = self.class_index(&frame.class)?;
                let position = self.defs[class_index]
                    .methods
                    .iter()
                    .position(|m| {
                        m.name == frame.method
                            && frame.signature.as_ref().map_or(true, |s| *s == m.signature)
                    })
                    .ok_or_else(|| DumpError::UnknownMethod {
                        class: frame.class.clone(),
                        method: frame.method.clone(),
                    })?;
                let method = self.method_addresses[class_index][position];
                let metadata = self.methods.get(&method).cloned().ok_or_else(|| {
                    DumpError::UnknownMethod {
                        class: frame.class.clone(),
                        method: frame.method.clone(),
                    }
                })?;

                let slots = (metadata.max_locals as usize).max(frame.locals.len());
                let mut locals = vec![StackSlot::Empty; slots];
                for (slot, value) in frame.locals.iter().enumerate() {
                    let context = format!("{}.{} local {}", frame.class, frame.method, slot);
                    let signature = local_signature(&metadata, &frame.class, frame.bci, slot as u32);
                    locals[slot] = self.stack_slot(signature.as_deref(), value, &context)?;
                }

                frames.push(JavaVFrame {
                    method,
                    bci: frame.bci,
                    locals,
                });
            }
            threads.push(JavaThreadSnapshot { thread_oop, frames });
        }
        Ok(threads)
    }

    fn stack_slot(
        &mut self,
        signature: Option<&str>,
        value: &Json,
        context: &str,
    ) -> Result<StackSlot, DumpError> {
        match signature {
            Some(sig) if is_reference(sig) => Ok(StackSlot::Oop(self.reference(sig, value, context)?)),
            Some(sig) => Ok(StackSlot::Word(self.value_bits(sig, value, context)?)),
            None => match value {
                Json::Null => Ok(StackSlot::Empty),
                Json::Bool(b) => Ok(StackSlot::Word(*b as u64)),
                Json::Number(n) => match n.as_i64() {
                    Some(i) => Ok(StackSlot::Word(i as u64)),
                    None => Ok(StackSlot::Word(n.as_f64().unwrap_or(0.0).to_bits())),
                },
                Json::String(_) => Ok(StackSlot::Oop(self.reference(
                    "Ljava/lang/Object;",
                    value,
                    context,
                )?)),
                other => Err(DumpError::InvalidValue {
                    context: context.to_string(),
                    reason: format!("unsupported local value {}", other),
                }),
            },
        }
    }

    fn klass_records(&self) -> Result<HashMap<Address, KlassRecord>, DumpError> {
        let mut records = HashMap::new();
        for (index, def) in self.defs.iter().enumerate() {
            let address_of = |name: &str| -> Result<Address, DumpError> {
                Ok(self.klass_addresses[self.class_index(name)?])
            };
            let super_klass = match &def.super_name {
                Some(name) => Some(address_of(name)?),
                None => None,
            };
            let interfaces = def
                .interfaces
                .iter()
                .map(|name| address_of(name))
                .collect::<Result<Vec<_>, _>>()?;
            let class_loader = match &def.loader {
                Some(id) => self.object(id.trim_start_matches('@'))?,
                None => 0,
            };
            let layout = match &def.layout {
                DefLayout::Instance => KlassLayout::Instance,
                DefLayout::TypeArray(element_type) => KlassLayout::TypeArray {
                    element_type: *element_type,
                },
                DefLayout::ObjArray(element) => KlassLayout::ObjArray {
                    element: address_of(element)?,
                },
            };
            let array_name = format!("[{}", signature_of(&def.name));
            let array_klass = self
                .by_name
                .get(&array_name)
                .map(|i| self.klass_addresses[*i]);

            let header = KlassHeader {
                name: def.name.clone(),
                super_klass,
                access_flags: def.access_flags,
                init_state: def.init_state,
                interfaces,
                class_loader,
                java_mirror: self.mirrors[index],
                source_file: def.source_file.clone(),
                methods: self.method_addresses[index].clone(),
                layout,
                array_klass,
            };
            let fields = self.class_layout(index)?.own_fields.clone();
            records.insert(self.klass_addresses[index], KlassRecord { header, fields });
        }
        Ok(records)
    }

    /// System dictionary, basic type arrays and the class loader data graph
    fn enumerations(&self) -> (Vec<Address>, Vec<Address>, Vec<ClassLoaderData>) {
        let mut dictionary = Vec::new();
        let mut basic_arrays = Vec::new();
        let mut loader_data: Vec<ClassLoaderData> = Vec::new();

        for (index, def) in self.defs.iter().enumerate() {
            let address = self.klass_addresses[index];
            match def.layout {
                DefLayout::Instance => dictionary.push(address),
                DefLayout::TypeArray(_) => basic_arrays.push(address),
                DefLayout::ObjArray(_) => {}
            }
            if let DefLayout::TypeArray(_) = def.layout {
                continue;
            }

            let loader = def
                .loader
                .as_ref()
                .and_then(|id| self.objects.get(id.trim_start_matches('@')).copied())
                .unwrap_or(0);
            match loader_data.iter_mut().find(|cld| cld.loader == loader) {
                Some(cld) => cld.klasses.push(address),
                None => loader_data.push(ClassLoaderData {
                    loader,
                    klasses: vec![address],
                }),
            }
        }

        // Every loader's data lists the primitive array klasses it uses
        for cld in &mut loader_data {
            cld.klasses.extend(basic_arrays.iter().copied());
        }
        (dictionary, basic_arrays, loader_data)
    }
}

/// Declared type of `slot` at `bci`, from the local variable table or the
/// implicit receiver
fn local_signature(method: &MethodMetadata, holder: &str, bci: u32, slot: u32) -> Option<String> {
    if let Some(variables) = &method.local_variables {
        let live = variables
            .iter()
            .find(|v| v.slot == slot && bci >= v.start_bci && bci < v.start_bci + v.length);
        if let Some(variable) = live {
            return Some(variable.signature.clone());
        }
    }
    if slot == 0 && method.access_flags & modifiers::STATIC == 0 {
        return Some(signature_of(holder));
    }
    None
}

fn argument_slots(signature: &str) -> u32 {
    let params = signature
        .strip_prefix('(')
        .and_then(|s| s.split(')').next())
        .unwrap_or("");
    let bytes = params.as_bytes();
    let mut slots = 0;
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'J' | b'D' => slots += 2,
            b'L' => {
                while i < bytes.len() && bytes[i] != b';' {
                    i += 1;
                }
                slots += 1;
            }
            b'[' => {
                while i < bytes.len() && bytes[i] == b'[' {
                    i += 1;
                }
                if i < bytes.len() && bytes[i] == b'L' {
                    while i < bytes.len() && bytes[i] != b';' {
                        i += 1;
                    }
                }
                slots += 1;
            }
            _ => slots += 1,
        }
        i += 1;
    }
    slots
}

fn method_metadata(holder: Address, spec: &MethodSpec) -> MethodMetadata {
    let mut access_flags = spec.access.unwrap_or(modifiers::PUBLIC);
    if spec.is_static {
        access_flags |= modifiers::STATIC;
    }
    let receiver = if spec.is_static { 0 } else { 1 };
    let variable_slots = spec
        .variables
        .iter()
        .flatten()
        .map(|v| v.slot + if matches!(v.signature.as_str(), "J" | "D") { 2 } else { 1 })
        .max()
        .unwrap_or(0);
    let max_locals = spec
        .max_locals
        .max(receiver + argument_slots(&spec.signature))
        .max(variable_slots);

    MethodMetadata {
        holder,
        name: spec.name.clone(),
        signature: spec.signature.clone(),
        access_flags,
        max_locals,
        code: spec.code.clone(),
        line_numbers: spec.lines.iter().map(|l| (l.bci, l.line)).collect(),
        local_variables: spec.variables.as_ref().map(|vars| {
            vars.iter()
                .map(|v| LocalVariableEntry {
                    start_bci: v.start_bci,
                    length: v.length,
                    name: v.name.clone(),
                    signature: v.signature.clone(),
                    slot: v.slot,
                })
                .collect()
        }),
    }
}

fn properties(spec: &HeapSpec) -> BTreeMap<String, String> {
    let mut properties = BTreeMap::new();
    properties.insert("java.version".to_string(), spec.java_version.clone());
    properties.insert(
        "java.specification.version".to_string(),
        specification_version(&spec.java_version),
    );
    properties.insert("java.vm.name".to_string(), spec.vm_name.clone());
    properties.insert("java.vm.info".to_string(), spec.vm_info.clone());
    properties.insert("java.class.path".to_string(), spec.class_path.join(":"));
    properties.extend(spec.properties.clone());
    properties
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    /// Types `A` and `B`, one thread `T` stopped in `A.foo` called from `B.bar`
    pub fn two_types(java_version: &str) -> HeapSpec {
        serde_json::from_value(serde_json::json!({
            "java_version": java_version,
            "vm_info": "mixed mode",
            "class_path": ["/app/classes"],
            "classes": [
                {
                    "name": "A",
                    "source_file": "A.java",
                    "fields": [
                        {"name": "count", "signature": "I"},
                        {"name": "flag", "signature": "Z"},
                        {"name": "ratio", "signature": "D"},
                        {"name": "b", "signature": "LB;"},
                        {"name": "label", "signature": "Ljava/lang/String;"},
                        {"name": "instances", "signature": "I", "static": true, "value": 1}
                    ],
                    "methods": [
                        {
                            "name": "foo",
                            "signature": "(I)V",
                            "code": [42, 27, 182, 0, 2, 177],
                            "lines": [{"bci": 0, "line": 10}, {"bci": 2, "line": 11}],
                            "variables": [
                                {"start_bci": 0, "length": 6, "name": "this", "signature": "LA;", "slot": 0},
                                {"start_bci": 0, "length": 6, "name": "n", "signature": "I", "slot": 1},
                                {"start_bci": 0, "length": 6, "name": "other", "signature": "LB;", "slot": 2}
                            ]
                        }
                    ]
                },
                {
                    "name": "B",
                    "fields": [
                        {"name": "owner", "signature": "LA;"},
                        {"name": "weight", "signature": "J"},
                        {"name": "data", "signature": "[I"}
                    ],
                    "methods": [
                        {"name": "bar", "signature": "()V", "code": [177], "lines": [{"bci": 0, "line": 20}]}
                    ]
                }
            ],
            "objects": [
                {"kind": "instance", "id": "a1", "class": "A",
                 "fields": {"count": 42, "flag": true, "ratio": 2.5, "b": "@b1", "label": "héllo"}},
                {"kind": "instance", "id": "b1", "class": "B",
                 "fields": {"owner": "@a1", "weight": -7, "data": "@ints"}},
                {"kind": "array", "id": "ints", "component": "I", "elements": [1, 2, 3]},
                {"kind": "array", "id": "names", "component": "Ljava/lang/String;",
                 "elements": ["x", null, "\u{263a}"]}
            ],
            "threads": [
                {
                    "name": "T",
                    "frames": [
                        {"class": "A", "method": "foo", "bci": 2, "locals": ["@a1", 5, "@b1"]},
                        {"class": "B", "method": "bar", "bci": 0, "locals": ["@b1"]}
                    ]
                }
            ]
        }))
        .expect("fixture must deserialize")
    }

    pub fn render(java_version: &str) -> Arc<SyntheticHeap> {
        Arc::new(SyntheticHeap::render(&two_types(java_version)).expect("fixture must render"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_specification_version() {
        assert_eq!(specification_version("1.6.0_45"), "1.6");
        assert_eq!(specification_version("1.8.0_292"), "1.8");
        assert_eq!(specification_version("11.0.2"), "11");
        assert_eq!(specification_version("17"), "17");
    }

    #[test]
    fn test_argument_slots() {
        assert_eq!(argument_slots("()V"), 0);
        assert_eq!(argument_slots("(IJ)V"), 3);
        assert_eq!(argument_slots("(Ljava/lang/String;[[I[LA;D)V"), 5);
    }

    #[test]
    fn test_generation_follows_java_version() {
        assert_eq!(fixtures::render("1.7.0_80").generation(), JvmGeneration::Jdk6);
        assert_eq!(fixtures::render("1.8.0_292").generation(), JvmGeneration::Jdk8);
        assert_eq!(fixtures::render("11.0.2").generation(), JvmGeneration::Jdk10);
        assert_eq!(fixtures::render("17.0.1").generation(), JvmGeneration::Jdk13);

        let spec = fixtures::two_types("21");
        assert!(matches!(
            SyntheticHeap::render(&spec),
            Err(DumpError::UnsupportedVersion(_))
        ));
    }

    #[test]
    fn test_only_own_generation_is_exposed() {
        let heap = fixtures::render("1.8.0_292");
        assert!(heap.clone().introspection(JvmGeneration::Jdk6).is_none());
        assert!(heap.introspection(JvmGeneration::Jdk8).is_some());
    }

    #[test]
    fn test_compressed_klass_header() {
        let heap = fixtures::render("1.8.0_292");
        let a1 = heap.object_address("a1").unwrap();
        let klass = heap.klass_address("A").unwrap();

        let narrow = heap.memory().read_u32(a1 + 8).unwrap();
        assert_eq!(heap.vm_structs().decode_narrow_klass(narrow), klass);
        assert_eq!(heap.memory().read_u64(a1).unwrap(), MARK_WORD);
    }

    #[test]
    fn test_wide_klass_header() {
        let mut spec = fixtures::two_types("1.8.0_292");
        spec.compressed_class_pointers = false;
        let heap = SyntheticHeap::render(&spec).unwrap();
        let a1 = heap.object_address("a1").unwrap();

        assert_eq!(
            heap.memory().read_u64(a1 + 8).unwrap(),
            heap.klass_address("A").unwrap()
        );
        assert!(!heap.vm_structs().flag("UseCompressedClassPointers"));
    }

    #[test]
    fn test_packed_field_offsets() {
        let heap = fixtures::render("1.8.0_292");
        let klass = Hotspot8Api::klass(&*heap, heap.klass_address("A").unwrap()).unwrap();

        // count is the first instance field, right after the 12 byte header
        assert_eq!(klass.fields.len(), 6 * 6);
        assert_eq!(klass.symbols[klass.fields[1] as usize], "count");
        let packed = (klass.fields[4] as u32) | ((klass.fields[5] as u32) << 16);
        assert_eq!(packed & 0b11, 0b01);
        assert_eq!(packed >> 2, 12);

        let heap = fixtures::render("1.6.0_45");
        let klass = Hotspot6Api::klass(&*heap, heap.klass_address("A").unwrap()).unwrap();
        assert_eq!(klass.fields.len(), 6 * 7);
        assert_eq!(klass.fields[4], 12);
    }

    #[test]
    fn test_unmapped_objects() {
        let mut spec = fixtures::two_types("11.0.2");
        spec.unmapped.push("b1".to_string());
        let heap = SyntheticHeap::render(&spec).unwrap();
        let b1 = heap.object_address("b1").unwrap();

        assert!(matches!(
            heap.memory().read_u64(b1),
            Err(ReadError::Unmapped { .. })
        ));
        assert!(heap.memory().read_u64(heap.object_address("a1").unwrap()).is_ok());

        let walked = heap.heap_objects().unwrap();
        assert!(!walked.contains(&b1));
        assert!(walked.contains(&heap.object_address("a1").unwrap()));
    }

    #[test]
    fn test_loader_data_lists_shared_arrays_per_loader() {
        let heap = fixtures::render("17");
        let graph = Hotspot13Api::class_loader_data_graph(&*heap).unwrap();
        assert_eq!(graph.len(), 1);
        let int_array = heap.klass_address("[I").unwrap();
        assert!(graph[0].klasses.contains(&int_array));
        assert!(graph[0].klasses.contains(&heap.klass_address("[Ljava/lang/String;").unwrap()));
    }

    #[test]
    fn test_detach_stops_reads() {
        let heap = fixtures::render("11.0.2");
        let a1 = heap.object_address("a1").unwrap();
        heap.detach();

        assert!(heap.is_detached());
        assert!(matches!(heap.memory().read_u8(a1), Err(ReadError::Io(_))));
        assert!(heap.java_threads().is_err());
    }

    #[test]
    fn test_unknown_references_are_reported() {
        let mut spec = fixtures::two_types("1.8.0_292");
        spec.objects.push(serde_json::from_value(serde_json::json!(
            {"kind": "instance", "id": "bad", "class": "A", "fields": {"b": "@missing"}}
        )).unwrap());
        assert!(matches!(
            SyntheticHeap::render(&spec),
            Err(DumpError::UnknownObject(id)) if id == "missing"
        ));
    }
}
