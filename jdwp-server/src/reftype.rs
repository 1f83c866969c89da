// ReferenceType command implementations
//
// Signature, modifiers, members and static values of loaded types

use crate::commands::reference_type_commands;
use crate::dispatcher::{read_limit, CommandError, CommandResult, Dispatcher};
use crate::model::{FieldDescriptor, MethodDescriptor};
use crate::reader::{read_i32, read_u64};
use crate::types::{FieldId, MethodId};
use crate::writer::{write_string, write_tagged_value};
use bytes::BufMut;

/// Method information
#[derive(Debug, Clone)]
pub struct MethodInfo {
    pub method_id: MethodId,
    pub name: String,
    pub signature: String,
    pub mod_bits: i32,
}

/// Field information
#[derive(Debug, Clone)]
pub struct FieldInfo {
    pub field_id: FieldId,
    pub name: String,
    pub signature: String,
    pub mod_bits: i32,
}

impl From<&MethodDescriptor> for MethodInfo {
    fn from(method: &MethodDescriptor) -> Self {
        Self {
            method_id: method.id,
            name: method.name.clone(),
            signature: method.signature.clone(),
            mod_bits: method.modifiers as i32,
        }
    }
}

impl From<&FieldDescriptor> for FieldInfo {
    fn from(field: &FieldDescriptor) -> Self {
        Self {
            field_id: field.id,
            name: field.name.clone(),
            signature: field.signature.clone(),
            mod_bits: field.modifiers as i32,
        }
    }
}

/// Write one member entry; generic variants carry an empty generic signature
fn write_member(buf: &mut Vec<u8>, id: u64, name: &str, signature: &str, mod_bits: i32, generic: bool) {
    buf.put_u64(id);
    write_string(buf, name);
    write_string(buf, signature);
    if generic {
        write_string(buf, "");
    }
    buf.put_i32(mod_bits);
}

const SUPPORTED: &[u8] = &[
    reference_type_commands::SIGNATURE,
    reference_type_commands::CLASS_LOADER,
    reference_type_commands::MODIFIERS,
    reference_type_commands::FIELDS,
    reference_type_commands::METHODS,
    reference_type_commands::GET_VALUES,
    reference_type_commands::SOURCE_FILE,
    reference_type_commands::NESTED_TYPES,
    reference_type_commands::STATUS,
    reference_type_commands::INTERFACES,
    reference_type_commands::CLASS_OBJECT,
    reference_type_commands::SIGNATURE_WITH_GENERIC,
    reference_type_commands::FIELDS_WITH_GENERIC,
    reference_type_commands::METHODS_WITH_GENERIC,
    reference_type_commands::INSTANCES,
];

impl Dispatcher {
    pub(crate) fn reference_type(&self, command: u8, data: &mut &[u8]) -> CommandResult<Vec<u8>> {
        if !SUPPORTED.contains(&command) {
            return Err(CommandError::NotImplemented);
        }
        let ty = self.model.reference_type(read_u64(data)?)?;
        let mut body = Vec::new();

        match command {
            reference_type_commands::SIGNATURE => write_string(&mut body, &ty.signature),
            reference_type_commands::SIGNATURE_WITH_GENERIC => {
                write_string(&mut body, &ty.signature);
                write_string(&mut body, "");
            }
            reference_type_commands::CLASS_LOADER => body.put_u64(ty.class_loader),
            reference_type_commands::MODIFIERS => body.put_i32(ty.modifiers as i32),
            reference_type_commands::FIELDS | reference_type_commands::FIELDS_WITH_GENERIC => {
                let generic = command == reference_type_commands::FIELDS_WITH_GENERIC;
                body.put_i32(ty.fields.len() as i32);
                for field in &ty.fields {
                    let info = FieldInfo::from(field);
                    write_member(&mut body, info.field_id, &info.name, &info.signature, info.mod_bits, generic);
                }
            }
            reference_type_commands::METHODS | reference_type_commands::METHODS_WITH_GENERIC => {
                let generic = command == reference_type_commands::METHODS_WITH_GENERIC;
                let methods = self.model.methods(&ty)?;
                body.put_i32(methods.len() as i32);
                for method in methods {
                    let info = MethodInfo::from(method.as_ref());
                    write_member(&mut body, info.method_id, &info.name, &info.signature, info.mod_bits, generic);
                }
            }
            reference_type_commands::GET_VALUES => {
                let count = read_i32(data)?;
                let fields = (0..count)
                    .map(|_| read_u64(data))
                    .collect::<Result<Vec<_>, _>>()?;
                let values = self.model.static_values(ty.id, &fields)?;
                body.put_i32(values.len() as i32);
                for value in &values {
                    write_tagged_value(&mut body, value);
                }
            }
            reference_type_commands::SOURCE_FILE => match &ty.source_file {
                Some(file) => write_string(&mut body, file),
                None => {
                    return Err(CommandError::AbsentInformation(format!(
                        "no source file for {}",
                        ty.name
                    )))
                }
            },
            // Nested types are not tracked by the snapshot
            reference_type_commands::NESTED_TYPES => body.put_i32(0),
            reference_type_commands::STATUS => body.put_i32(ty.status),
            reference_type_commands::INTERFACES => {
                let interfaces = self.model.interfaces(&ty)?;
                body.put_i32(interfaces.len() as i32);
                for interface in interfaces {
                    body.put_u64(interface.id);
                }
            }
            reference_type_commands::CLASS_OBJECT => body.put_u64(self.model.class_object(ty.id)?),
            reference_type_commands::INSTANCES => {
                let instances = self.model.instances(ty.id, read_limit(data)?)?;
                body.put_i32(instances.len() as i32);
                for instance in &instances {
                    write_tagged_value(&mut body, instance);
                }
            }
            _ => return Err(CommandError::NotImplemented),
        }
        Ok(body)
    }
}
