// ObjectReference command implementations
//
// Commands for working with object instances

use crate::commands::object_reference_commands;
use crate::dispatcher::{read_limit, CommandError, CommandResult, Dispatcher};
use crate::reader::{read_i32, read_u64};
use crate::writer::{write_bool, write_tagged_value};
use bytes::BufMut;

impl Dispatcher {
    pub(crate) fn object_reference(&self, command: u8, data: &mut &[u8]) -> CommandResult<Vec<u8>> {
        let mut body = Vec::new();
        match command {
            object_reference_commands::REFERENCE_TYPE => {
                let ty = self.model.object_type(read_u64(data)?)?;
                body.put_u8(ty.tag as u8);
                body.put_u64(ty.id);
            }
            object_reference_commands::GET_VALUES => {
                let object = read_u64(data)?;
                let count = read_i32(data)?;
                let fields = (0..count)
                    .map(|_| read_u64(data))
                    .collect::<Result<Vec<_>, _>>()?;

                let values = self.model.object_values(object, &fields)?;
                body.put_i32(values.len() as i32);
                for value in &values {
                    write_tagged_value(&mut body, value);
                }
            }
            // Nothing is ever collected while the snapshot is open
            object_reference_commands::DISABLE_COLLECTION
            | object_reference_commands::ENABLE_COLLECTION => {
                self.model.object_handle(read_u64(data)?)?;
            }
            object_reference_commands::IS_COLLECTED => {
                self.model.object_handle(read_u64(data)?)?;
                write_bool(&mut body, false);
            }
            object_reference_commands::REFERRING_OBJECTS => {
                let object = read_u64(data)?;
                let referrers = self.model.referring_objects(object, read_limit(data)?)?;
                body.put_i32(referrers.len() as i32);
                for referrer in &referrers {
                    write_tagged_value(&mut body, referrer);
                }
            }
            _ => return Err(CommandError::NotImplemented),
        }
        Ok(body)
    }
}
