// VirtualMachine command implementations
//
// Version, type and thread enumeration, id sizes and capabilities, plus the
// two commands that end a session (Dispose and Exit).

use crate::commands::vm_commands;
use crate::dispatcher::{CommandError, CommandResult, Dispatcher, Handled};
use crate::model::TypeDescriptor;
use crate::reader::{read_i32, read_string, read_u64};
use crate::session::CloseReason;
use crate::types::{ReferenceTypeId, ID_SIZE};
use crate::writer::{write_bool, write_string};
use bytes::BufMut;

/// JDWP protocol version we answer with
const JDWP_MAJOR: i32 = 1;
const JDWP_MINOR: i32 = 8;

/// JVM version information
#[derive(Debug, Clone)]
pub struct VmVersion {
    pub description: String,
    pub jdwp_major: i32,
    pub jdwp_minor: i32,
    pub vm_version: String,
    pub vm_name: String,
}

impl VmVersion {
    fn write(&self, buf: &mut Vec<u8>) {
        write_string(buf, &self.description);
        buf.put_i32(self.jdwp_major);
        buf.put_i32(self.jdwp_minor);
        write_string(buf, &self.vm_version);
        write_string(buf, &self.vm_name);
    }
}

/// ID sizes used on the wire
#[derive(Debug, Clone)]
pub struct VmIdSizes {
    pub field_id_size: i32,
    pub method_id_size: i32,
    pub object_id_size: i32,
    pub reference_type_id_size: i32,
    pub frame_id_size: i32,
}

impl Default for VmIdSizes {
    fn default() -> Self {
        Self {
            field_id_size: ID_SIZE,
            method_id_size: ID_SIZE,
            object_id_size: ID_SIZE,
            reference_type_id_size: ID_SIZE,
            frame_id_size: ID_SIZE,
        }
    }
}

impl VmIdSizes {
    fn write(&self, buf: &mut Vec<u8>) {
        buf.put_i32(self.field_id_size);
        buf.put_i32(self.method_id_size);
        buf.put_i32(self.object_id_size);
        buf.put_i32(self.reference_type_id_size);
        buf.put_i32(self.frame_id_size);
    }
}

/// One entry of ClassesBySignature / AllClasses
#[derive(Debug, Clone)]
pub struct ClassInfo {
    pub ref_type_tag: u8, // 1=class, 2=interface, 3=array
    pub type_id: ReferenceTypeId,
    pub signature: String,
    pub status: i32,
}

impl From<&TypeDescriptor> for ClassInfo {
    fn from(ty: &TypeDescriptor) -> Self {
        Self {
            ref_type_tag: ty.tag as u8,
            type_id: ty.id,
            signature: ty.signature.clone(),
            status: ty.status,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum ClassListing {
    /// ClassesBySignature: the signature is implied
    BySignature,
    All,
    AllWithGeneric,
}

impl ClassInfo {
    fn write(&self, buf: &mut Vec<u8>, listing: ClassListing) {
        buf.put_u8(self.ref_type_tag);
        buf.put_u64(self.type_id);
        match listing {
            ClassListing::BySignature => {}
            ClassListing::All => write_string(buf, &self.signature),
            ClassListing::AllWithGeneric => {
                write_string(buf, &self.signature);
                write_string(buf, "");
            }
        }
        buf.put_i32(self.status);
    }
}

fn write_classes(buf: &mut Vec<u8>, classes: &[std::sync::Arc<TypeDescriptor>], listing: ClassListing) {
    buf.put_i32(classes.len() as i32);
    for ty in classes {
        ClassInfo::from(ty.as_ref()).write(buf, listing);
    }
}

/// Capability bits, in CapabilitiesNew order. A frozen target offers
/// bytecodes and heap walks, nothing that needs a running VM.
fn capabilities(count: usize) -> Vec<bool> {
    const CAN_GET_BYTECODES: usize = 2;
    const CAN_GET_INSTANCE_INFO: usize = 15;
    (0..count)
        .map(|i| i == CAN_GET_BYTECODES || i == CAN_GET_INSTANCE_INFO)
        .collect()
}

impl Dispatcher {
    pub(crate) fn virtual_machine(&self, command: u8, data: &mut &[u8]) -> CommandResult<Handled> {
        let mut body = Vec::new();
        match command {
            vm_commands::VERSION => self.version()?.write(&mut body),
            vm_commands::CLASSES_BY_SIGNATURE => {
                let signature = read_string(data)?;
                let classes = self.model.types_by_signature(&signature)?;
                write_classes(&mut body, &classes, ClassListing::BySignature);
            }
            vm_commands::ALL_CLASSES => {
                write_classes(&mut body, &self.model.all_types()?, ClassListing::All);
            }
            vm_commands::ALL_CLASSES_WITH_GENERIC => {
                write_classes(&mut body, &self.model.all_types()?, ClassListing::AllWithGeneric);
            }
            vm_commands::ALL_THREADS => {
                let threads = self.model.threads()?;
                body.put_i32(threads.len() as i32);
                for thread in threads {
                    body.put_u64(thread.id);
                }
            }
            vm_commands::TOP_LEVEL_THREAD_GROUPS => {
                let groups = self.model.top_level_thread_groups()?;
                body.put_i32(groups.len() as i32);
                for group in groups {
                    body.put_u64(group.id);
                }
            }
            vm_commands::DISPOSE => {
                return Ok(Handled {
                    body,
                    close: Some(CloseReason::Disposed),
                })
            }
            vm_commands::ID_SIZES => VmIdSizes::default().write(&mut body),
            // Already frozen
            vm_commands::SUSPEND => {}
            vm_commands::EXIT => {
                let code = read_i32(data)?;
                return Ok(Handled {
                    body,
                    close: Some(CloseReason::Exited(code)),
                });
            }
            vm_commands::CAPABILITIES => {
                for bit in capabilities(7) {
                    write_bool(&mut body, bit);
                }
            }
            vm_commands::CAPABILITIES_NEW => {
                for bit in capabilities(32) {
                    write_bool(&mut body, bit);
                }
            }
            vm_commands::CLASS_PATHS => {
                let info = self.model.vm_info()?;
                write_string(&mut body, &info.base_dir);
                for paths in [&info.class_path, &info.boot_class_path] {
                    body.put_i32(paths.len() as i32);
                    for path in paths {
                        write_string(&mut body, path);
                    }
                }
            }
            vm_commands::INSTANCE_COUNTS => {
                let count = read_i32(data)?;
                let types = (0..count)
                    .map(|_| read_u64(data))
                    .collect::<Result<Vec<_>, _>>()?;
                let counts = self.model.instance_counts(&types)?;
                body.put_i32(counts.len() as i32);
                for count in counts {
                    body.put_u64(count);
                }
            }
            vm_commands::DISPOSE_OBJECTS
            | vm_commands::HOLD_EVENTS
            | vm_commands::RELEASE_EVENTS
            | vm_commands::SET_DEFAULT_STRATUM => {}
            _ => return Err(CommandError::NotImplemented),
        }
        Ok(body.into())
    }

    fn version(&self) -> CommandResult<VmVersion> {
        let info = self.model.vm_info()?;
        let vm_name = format!(
            "JVM version {} ({}, {})",
            info.java_version, info.vm_name, info.vm_info
        );
        Ok(VmVersion {
            description: format!(
                "Java Debug Interface (Reference Implementation) version {}.{} \n{}",
                JDWP_MAJOR, JDWP_MINOR, vm_name
            ),
            jdwp_major: JDWP_MAJOR,
            jdwp_minor: JDWP_MINOR,
            vm_version: info.java_version,
            vm_name: info.vm_name,
        })
    }
}
