// ArrayReference command implementations

use crate::commands::array_reference_commands;
use crate::dispatcher::{CommandError, CommandResult, Dispatcher};
use crate::reader::{read_i32, read_u64};
use crate::writer::write_array_region;
use bytes::BufMut;

impl Dispatcher {
    pub(crate) fn array_reference(&self, command: u8, data: &mut &[u8]) -> CommandResult<Vec<u8>> {
        let mut body = Vec::new();
        match command {
            array_reference_commands::LENGTH => {
                let length = self.model.array_length(read_u64(data)?)?;
                body.put_i32(length as i32);
            }
            array_reference_commands::GET_VALUES => {
                let array = read_u64(data)?;
                let first = read_i32(data)?;
                let length = read_i32(data)?;
                let (tag, values) = self.model.array_values(array, first, length)?;
                write_array_region(&mut body, tag, &values);
            }
            _ => return Err(CommandError::NotImplemented),
        }
        Ok(body)
    }
}
