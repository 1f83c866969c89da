// Snapshot providers
//
// A provider attaches to a target (process, core file, remote debug server
// or dump file) and hands out a read-only snapshot handle. The handle exposes
// the raw introspection API of the JVM generation that produced it.

pub mod api;
pub mod dump;
pub mod synthetic;

use crate::adapter::JvmGeneration;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

pub use api::{
    Address, HeapMemory, Hotspot10Api, Hotspot13Api, Hotspot6Api, Hotspot8Api,
    IntrospectionBase, ReadError, VmStructs,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetLocator {
    Pid(u32),
    CoreFile { executable: PathBuf, core: PathBuf },
    /// `host:port` of a remote serviceability debug server
    Remote(String),
    SnapshotFile(PathBuf),
}

#[derive(Debug, Error)]
pub enum AttachError {
    #[error("unsupported target: {0:?}")]
    UnsupportedLocator(TargetLocator),

    #[error("failed to load snapshot dump: {0}")]
    Dump(#[from] dump::DumpError),

    #[error("snapshot I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub trait SnapshotProvider {
    fn attach(&self, target: &TargetLocator) -> Result<Arc<dyn SnapshotHandle>, AttachError>;
}

/// Generation specific introspection entry point
#[derive(Clone)]
pub enum IntrospectionApi {
    Jdk6(Arc<dyn Hotspot6Api>),
    Jdk8(Arc<dyn Hotspot8Api>),
    Jdk10(Arc<dyn Hotspot10Api>),
    Jdk13(Arc<dyn Hotspot13Api>),
}

impl IntrospectionApi {
    pub fn generation(&self) -> JvmGeneration {
        match self {
            IntrospectionApi::Jdk6(_) => JvmGeneration::Jdk6,
            IntrospectionApi::Jdk8(_) => JvmGeneration::Jdk8,
            IntrospectionApi::Jdk10(_) => JvmGeneration::Jdk10,
            IntrospectionApi::Jdk13(_) => JvmGeneration::Jdk13,
        }
    }
}

/// Read-only view of one attached target, owned by a single session
pub trait SnapshotHandle: Send + Sync {
    fn system_property(&self, key: &str) -> Option<String>;

    /// The API for `generation`, or `None` if this snapshot cannot speak it
    fn introspection(self: Arc<Self>, generation: JvmGeneration) -> Option<IntrospectionApi>;

    /// Release the target; further reads are undefined
    fn detach(&self);
}
