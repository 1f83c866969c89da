// JDK 6/7 adapter
//
// Permanent generation klasses. Types come from the system dictionary plus
// the basic type array klasses and every array klass hanging off either.
// Field tuples are seven entries wide with a raw byte offset, statics live
// inside the klass block, and strings are windows into a shared char[].

use super::layout::{self, TypeCache};
use super::{AdapterError, AdapterResult, Handle, JvmGeneration, RawValue, SnapshotAdapter, TypeInfo};
use crate::provider::api::{HeapMemory, Hotspot6Api, JavaThreadSnapshot, MethodMetadata, VmStructs};
use std::sync::Arc;
use tracing::debug;

const FIELD_TUPLE: usize = 7;

pub struct Hotspot6Adapter {
    api: Arc<dyn Hotspot6Api>,
    types: TypeCache,
    string_klass: Handle,
}

impl Hotspot6Adapter {
    pub fn new(api: Arc<dyn Hotspot6Api>) -> AdapterResult<Self> {
        let mut adapter = Self {
            api,
            types: TypeCache::default(),
            string_klass: 0,
        };
        adapter.string_klass = layout::require_type(&adapter, "java/lang/String")?;
        layout::require_type(&adapter, "java/lang/Thread")?;
        debug!("JDK 6 adapter ready, String klass at {:#x}", adapter.string_klass);
        Ok(adapter)
    }
}

impl SnapshotAdapter for Hotspot6Adapter {
    fn generation(&self) -> JvmGeneration {
        JvmGeneration::Jdk6
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

    // Before class pointers were split out, klass pointers followed oops
    fn compressed_klass_pointers(&self) -> bool {
        self.api.vm_structs().flag("UseCompressedOops")
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
            let fields = layout::unpack_fields(&klass.fields, &klass.symbols, FIELD_TUPLE, |word| {
                Ok(word as u64)
            })?;
            layout::type_info(ty, &klass.header, fields)
        })
    }

    fn static_base(&self, ty: &TypeInfo) -> Handle {
        ty.handle
    }

    fn string_value(&self, object: Handle) -> AdapterResult<String> {
        layout::ensure_string(self, self.string_klass, object)?;
        layout::windowed_string(self, object)
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::conformance;
    use crate::provider::synthetic::fixtures;

    #[test]
    fn test_conformance() {
        conformance::check("1.6.0_45");
        conformance::check("1.7.0_80");
    }

    #[test]
    fn test_statics_live_in_the_klass_block() {
        let heap = fixtures::render("1.6.0_45");
        let adapter = Hotspot6Adapter::new(heap.clone()).unwrap();
        let a = heap.klass_address("A").unwrap();
        let info = adapter.type_info(a).unwrap();
        assert_eq!(adapter.static_base(&info), a);
        assert_ne!(info.mirror, a);
    }

    #[test]
    fn test_array_klasses_come_from_chains() {
        let heap = fixtures::render("1.6.0_45");
        let adapter = Hotspot6Adapter::new(heap.clone()).unwrap();
        let loaded = adapter.list_loaded_types().unwrap();
        // Only reachable through String's array klass link
        assert!(loaded.contains(&heap.klass_address("[Ljava/lang/String;").unwrap()));
    }

    #[test]
    fn test_unprepared_classes_are_hidden() {
        let mut spec = fixtures::two_types("1.6.0_45");
        spec.classes[1].prepared = false;
        let heap = Arc::new(crate::provider::synthetic::SyntheticHeap::render(&spec).unwrap());
        let adapter = Hotspot6Adapter::new(heap.clone()).unwrap();
        assert_eq!(adapter.resolve_type("B").unwrap(), None);
        assert!(adapter.resolve_type("A").unwrap().is_some());
    }
}
