// JDK 8 adapter
//
// Metaspace klasses, still enumerated through the system dictionary. Field
// tuples shrank to six entries and their offsets carry a tag; statics moved
// to the java.lang.Class mirror.

use super::layout::{self, TypeCache};
use super::{AdapterError, AdapterResult, Handle, JvmGeneration, RawValue, SnapshotAdapter, TypeInfo};
use crate::provider::api::{HeapMemory, Hotspot8Api, JavaThreadSnapshot, MethodMetadata, VmStructs};
use std::sync::Arc;
use tracing::debug;

const FIELD_TUPLE: usize = 6;

pub struct Hotspot8Adapter {
    api: Arc<dyn Hotspot8Api>,
    types: TypeCache,
    string_klass: Handle,
}

impl Hotspot8Adapter {
    pub fn new(api: Arc<dyn Hotspot8Api>) -> AdapterResult<Self> {
        let mut adapter = Self {
            api,
            types: TypeCache::default(),
            string_klass: 0,
        };
        adapter.string_klass = layout::require_type(&adapter, "java/lang/String")?;
        layout::require_type(&adapter, "java/lang/Thread")?;
        debug!("JDK 8 adapter ready, String klass at {:#x}", adapter.string_klass);
        Ok(adapter)
    }
}

impl SnapshotAdapter for Hotspot8Adapter {
    fn generation(&self) -> JvmGeneration {
        JvmGeneration::Jdk8
    }

    fn memory(&self) -> &dyn HeapMemory {
        self.api.memory()
    }

    fn vm_structs(&self) -> &VmStructs {
        self.api.vm_structs()
    }

    fn system_property(&self, key: &str) -> Option<String> {
        self.api.system_property(key)
    }

    fn compressed_klass_pointers(&self) -> bool {
        self.api.vm_structs().flag("UseCompressedClassPointers")
    }

    fn list_loaded_types(&self) -> AdapterResult<Vec<Handle>> {
        let roots = self
            .api
            .system_dictionary()?
            .into_iter()
            .chain(self.api.basic_type_array_klasses());
        let mut handles = Vec::new();
        for root in roots {
            handles.extend(layout::with_array_klasses(root, |klass| {
                Ok(self.api.klass(klass)?.header.array_klass)
            })?);
        }
        layout::prepared_types(self, handles)
    }

    fn type_info(&self, ty: Handle) -> AdapterResult<Arc<TypeInfo>> {
        self.types.get_or_load(ty, || {
            let klass = self.api.klass(ty)?;
            let fields = layout::unpack_fields(
                &klass.fields,
                &klass.symbols,
                FIELD_TUPLE,
                layout::decode_tagged_offset,
            )?;
            layout::type_info(ty, &klass.header, fields)
        })
    }

    fn static_base(&self, ty: &TypeInfo) -> Handle {
        ty.mirror
    }

    fn string_value(&self, object: Handle) -> AdapterResult<String> {
        layout::ensure_string(self, self.string_klass, object)?;
        layout::char_backed_string(self, object)
    }

    fn thread_name(&self, thread: Handle) -> AdapterResult<String> {
        match self.field_by_name(thread, "name")? {
            RawValue::Object(chars) => layout::char_array_string(self, chars, None),
            other => Err(AdapterError::Malformed(format!(
                "Thread.name is {:?}",
                other
            ))),
        }
    }

    fn method_metadata(&self, method: Handle) -> AdapterResult<MethodMetadata> {
        Ok(self.api.method(method)?)
    }

    fn java_threads(&self) -> AdapterResult<Vec<JavaThreadSnapshot>> {
        Ok(self.api.java_threads()?)
    }

    fn heap_objects(&self) -> AdapterResult<Vec<Handle>> {
        Ok(self.api.heap_objects()?)
    }
}
