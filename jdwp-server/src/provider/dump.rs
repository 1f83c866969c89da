// Snapshot dump files
//
// JSON description of a frozen heap: classes, objects, thread groups and
// threads with their frames. The dump provider renders it through the
// synthetic heap into the memory image of the JVM generation named by
// `java_version`.

use super::api::jvmti;
use super::synthetic::SyntheticHeap;
use super::{AttachError, SnapshotHandle, SnapshotProvider, TargetLocator};
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum DumpError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid dump JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unsupported java version: {0}")]
    UnsupportedVersion(String),

    #[error("unknown class {0}")]
    UnknownClass(String),

    #[error("class {0} defined twice")]
    DuplicateClass(String),

    #[error("invalid class {name}: {reason}")]
    InvalidClass { name: String, reason: String },

    #[error("unknown object @{0}")]
    UnknownObject(String),

    #[error("object @{0} defined twice")]
    DuplicateObject(String),

    #[error("class {class} has no field {field}")]
    UnknownField { class: String, field: String },

    #[error("class {class} has no method {method}")]
    UnknownMethod { class: String, method: String },

    #[error("invalid value for {context}: {reason}")]
    InvalidValue { context: String, reason: String },
}

fn default_true() -> bool {
    true
}

fn default_vm_name() -> String {
    "Java HotSpot(TM) 64-Bit Server VM".to_string()
}

fn default_group() -> String {
    "main".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeapSpec {
    /// `java.version` of the target, e.g. `1.8.0_292` or `11.0.2`
    pub java_version: String,
    #[serde(default = "default_vm_name")]
    pub vm_name: String,
    #[serde(default)]
    pub vm_info: String,
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
    #[serde(default)]
    pub class_path: Vec<String>,
    #[serde(default = "default_true")]
    pub compressed_class_pointers: bool,
    #[serde(default)]
    pub classes: Vec<ClassSpec>,
    #[serde(default)]
    pub objects: Vec<ObjectSpec>,
    #[serde(default)]
    pub thread_groups: Vec<ThreadGroupSpec>,
    #[serde(default)]
    pub threads: Vec<ThreadSpec>,
    /// Object ids whose memory is left out of the image
    #[serde(default)]
    pub unmapped: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassSpec {
    /// Internal name, `com/example/A`
    pub name: String,
    #[serde(rename = "super", default)]
    pub super_name: Option<String>,
    #[serde(default)]
    pub interfaces: Vec<String>,
    #[serde(default)]
    pub interface: bool,
    #[serde(default)]
    pub access: Option<u32>,
    #[serde(default = "default_true")]
    pub prepared: bool,
    #[serde(default)]
    pub source_file: Option<String>,
    /// Object id of the defining loader; boot loader when absent
    #[serde(default)]
    pub loader: Option<String>,
    #[serde(default)]
    pub fields: Vec<FieldSpec>,
    #[serde(default)]
    pub methods: Vec<MethodSpec>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    pub signature: String,
    #[serde(rename = "static", default)]
    pub is_static: bool,
    #[serde(default)]
    pub access: Option<u32>,
    /// Initial value of a static field
    #[serde(default)]
    pub value: Json,
}

impl FieldSpec {
    pub fn instance(name: &str, signature: &str) -> Self {
        Self {
            name: name.to_string(),
            signature: signature.to_string(),
            is_static: false,
            access: None,
            value: Json::Null,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodSpec {
    pub name: String,
    pub signature: String,
    #[serde(rename = "static", default)]
    pub is_static: bool,
    #[serde(default)]
    pub access: Option<u32>,
    #[serde(default)]
    pub max_locals: u32,
    #[serde(default)]
    pub code: Vec<u8>,
    #[serde(default)]
    pub lines: Vec<LineSpec>,
    #[serde(default)]
    pub variables: Option<Vec<VariableSpec>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineSpec {
    pub bci: u32,
    pub line: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariableSpec {
    #[serde(default)]
    pub start_bci: u32,
    pub length: u32,
    pub name: String,
    pub signature: String,
    pub slot: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ObjectSpec {
    Instance {
        id: String,
        class: String,
        #[serde(default)]
        fields: BTreeMap<String, Json>,
    },
    Array {
        id: String,
        /// Component signature, `I` or `Ljava/lang/String;`
        component: String,
        #[serde(default)]
        elements: Vec<Json>,
    },
    String {
        id: String,
        value: String,
    },
}

impl ObjectSpec {
    pub fn id(&self) -> &str {
        match self {
            ObjectSpec::Instance { id, .. }
            | ObjectSpec::Array { id, .. }
            | ObjectSpec::String { id, .. } => id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadGroupSpec {
    pub name: String,
    #[serde(default)]
    pub parent: Option<String>,
}

impl ThreadGroupSpec {
    /// Object id a value uses to refer to this group
    pub fn object_id(name: &str) -> String {
        format!("group:{}", name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThreadState {
    New,
    #[default]
    Runnable,
    Blocked,
    Waiting,
    TimedWaiting,
    Sleeping,
    Terminated,
}

impl ThreadState {
    /// Value of `java.lang.Thread.threadStatus` for this state
    pub fn jvmti_status(self) -> i32 {
        match self {
            ThreadState::New => 0,
            ThreadState::Runnable => jvmti::ALIVE | jvmti::RUNNABLE,
            ThreadState::Blocked => jvmti::ALIVE | jvmti::BLOCKED_ON_MONITOR_ENTER,
            ThreadState::Waiting => {
                jvmti::ALIVE | jvmti::WAITING | jvmti::WAITING_INDEFINITELY | jvmti::IN_OBJECT_WAIT
            }
            ThreadState::TimedWaiting => {
                jvmti::ALIVE | jvmti::WAITING | jvmti::WAITING_WITH_TIMEOUT | jvmti::IN_OBJECT_WAIT
            }
            ThreadState::Sleeping => {
                jvmti::ALIVE | jvmti::WAITING | jvmti::WAITING_WITH_TIMEOUT | jvmti::SLEEPING
            }
            ThreadState::Terminated => jvmti::TERMINATED,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreadSpec {
    pub name: String,
    /// Object id for references; `thread:<name>` when absent
    #[serde(default)]
    pub id: Option<String>,
    /// A subclass of `java/lang/Thread`
    #[serde(default)]
    pub class: Option<String>,
    #[serde(default)]
    pub state: ThreadState,
    #[serde(default = "default_group")]
    pub group: String,
    #[serde(default)]
    pub daemon: bool,
    /// Innermost frame first
    #[serde(default)]
    pub frames: Vec<FrameSpec>,
}

impl ThreadSpec {
    pub fn object_id(&self) -> String {
        self.id
            .clone()
            .unwrap_or_else(|| format!("thread:{}", self.name))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameSpec {
    pub class: String,
    pub method: String,
    /// Disambiguates overloads
    #[serde(default)]
    pub signature: Option<String>,
    #[serde(default)]
    pub bci: u32,
    /// Local slot values by slot number
    #[serde(default)]
    pub locals: Vec<Json>,
}

pub fn load_heap_spec(path: &Path) -> Result<HeapSpec, DumpError> {
    let text = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}

pub fn save_heap_spec(path: &Path, spec: &HeapSpec) -> Result<(), DumpError> {
    let text = serde_json::to_string_pretty(spec)?;
    std::fs::write(path, text)?;
    Ok(())
}

/// Attaches to snapshot dump files; every other locator is refused
#[derive(Debug, Default, Clone, Copy)]
pub struct DumpSnapshotProvider;

impl SnapshotProvider for DumpSnapshotProvider {
    fn attach(&self, target: &TargetLocator) -> Result<Arc<dyn SnapshotHandle>, AttachError> {
        match target {
            TargetLocator::SnapshotFile(path) => {
                info!("Loading snapshot dump {}", path.display());
                let spec = load_heap_spec(path)?;
                let heap = SyntheticHeap::render(&spec)?;
                Ok(Arc::new(heap))
            }
            other => Err(AttachError::UnsupportedLocator(other.clone())),
        }
    }
}
