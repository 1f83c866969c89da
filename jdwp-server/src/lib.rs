// JDWP server over read-only JVM snapshots
//
// A debugger attaches over JDWP and inspects a frozen JVM:
// - Providers attach to a target and hand out a snapshot handle
// - Adapters hide each JVM generation's introspection API behind one trait
// - The debug model assigns JDWP ids and caches descriptors
// - Sessions speak the wire protocol to exactly one debugger

pub mod adapter;
pub mod commands;
pub mod config;
pub mod connection;
pub mod dispatcher;
pub mod events;
pub mod listener;
pub mod model;
pub mod protocol;
pub mod provider;
pub mod reader;
pub mod reftable;
pub mod session;
pub mod types;
pub mod writer;

// Command set handlers
pub mod array;
pub mod classloader;
pub mod classobject;
pub mod classtype;
pub mod eventrequest;
pub mod method;
pub mod object;
pub mod reftype;
pub mod stackframe;
pub mod string;
pub mod thread;
pub mod threadgroup;
pub mod vm;

pub use adapter::{select_adapter, AdapterError, JvmGeneration, SnapshotAdapter};
pub use config::{ConfigError, ServerConfig};
pub use connection::JdwpConnection;
pub use eventrequest::SuspendPolicy;
pub use listener::Listener;
pub use model::{DebugModel, ModelError};
pub use protocol::{JdwpError, JdwpResult};
pub use provider::{SnapshotHandle, SnapshotProvider, TargetLocator};
pub use session::{CloseReason, Session, SessionHandle, SessionState};
