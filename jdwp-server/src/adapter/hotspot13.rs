// JDK 13-17 adapter
//
// Enumeration and strings as in JDK 10, but field metadata arrives already
// resolved, so there is no tuple unpacking left to do.

use super::layout::{self, TypeCache};
use super::{
    AdapterError, AdapterResult, FieldInfo, Handle, JvmGeneration, RawValue, SnapshotAdapter,
    TypeInfo,
};
use crate::provider::api::{HeapMemory, Hotspot13Api, JavaThreadSnapshot, MethodMetadata, VmStructs};
use std::sync::Arc;
use tracing::debug;

pub struct Hotspot13Adapter {
    api: Arc<dyn Hotspot13Api>,
    types: TypeCache,
    string_klass: Handle,
}

impl Hotspot13Adapter {
    pub fn new(api: Arc<dyn Hotspot13Api>) -> AdapterResult<Self> {
        let mut adapter = Self {
            api,
            types: TypeCache::default(),
            string_klass: 0,
        };
        adapter.string_klass = layout::require_type(&adapter, "java/lang/String")?;
        layout::require_type(&adapter, "java/lang/Thread")?;
        debug!("JDK 13 adapter ready, String klass at {:#x}", adapter.string_klass);
        Ok(adapter)
    }
}

impl SnapshotAdapter for Hotspot13Adapter {
    fn generation(&self) -> JvmGeneration {
        JvmGeneration::Jdk13
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
        let handles = self
            .api
            .class_loader_data_graph()?
            .into_iter()
            .flat_map(|cld| cld.klasses)
            .collect();
        layout::prepared_types(self, handles)
    }

    fn type_info(&self, ty: Handle) -> AdapterResult<Arc<TypeInfo>> {
        self.types.get_or_load(ty, || {
            let klass = self.api.klass(ty)?;
            let fields = klass
                .fields
                .into_iter()
                .map(|entry| FieldInfo {
                    name: entry.name,
                    signature: entry.signature,
                    access_flags: entry.access_flags,
                    offset: entry.offset as u64,
                })
                .collect();
            layout::type_info(ty, &klass.header, fields)
        })
    }

    fn static_base(&self, ty: &TypeInfo) -> Handle {
        ty.mirror
    }

    fn string_value(&self, object: Handle) -> AdapterResult<String> {
        layout::ensure_string(self, self.string_klass, object)?;
        layout::compact_string(self, object)
    }

    fn thread_name(&self, thread: Handle) -> AdapterResult<String> {
        match self.field_by_name(thread, "name")? {
            RawValue::Object(0) => Ok(String::new()),
            RawValue::Object(name) => self.string_value(name),
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
    use crate::types::ThreadStatus;

    #[test]
    fn test_conformance() {
        conformance::check("13.0.2");
        conformance::check("17.0.1");
    }

    #[test]
    fn test_thread_states() {
        let mut spec = fixtures::two_types("17.0.1");
        spec.threads.push(
            serde_json::from_value(serde_json::json!(
                {"name": "blocked", "state": "blocked", "daemon": true}
            ))
            .unwrap(),
        );
        spec.threads.push(
            serde_json::from_value(serde_json::json!({"name": "done", "state": "terminated"}))
                .unwrap(),
        );
        let heap = Arc::new(crate::provider::synthetic::SyntheticHeap::render(&spec).unwrap());
        let adapter = Hotspot13Adapter::new(heap).unwrap();

        let threads = adapter.list_threads().unwrap();
        let status: Vec<(&str, ThreadStatus)> = threads
            .iter()
            .map(|t| (t.name.as_str(), t.status))
            .collect();
        assert_eq!(
            status,
            vec![
                ("T", ThreadStatus::Running),
                ("blocked", ThreadStatus::Monitor),
                ("done", ThreadStatus::Zombie),
            ]
        );
        assert!(adapter.thread_frames(threads[1].handle).unwrap().is_empty());
    }

    #[test]
    fn test_unreadable_object() {
        let mut spec = fixtures::two_types("17.0.1");
        spec.unmapped.push("b1".to_string());
        let heap = Arc::new(crate::provider::synthetic::SyntheticHeap::render(&spec).unwrap());
        let adapter = Hotspot13Adapter::new(heap.clone()).unwrap();
        let b1 = heap.object_address("b1").unwrap();
        assert!(matches!(
            adapter.object_fields(b1),
            Err(AdapterError::Read(_))
        ));
    }
}
