// ClassObjectReference command implementations

use crate::commands::class_object_commands;
use crate::dispatcher::{CommandError, CommandResult, Dispatcher};
use crate::reader::read_u64;
use bytes::BufMut;

impl Dispatcher {
    /// ClassObjectReference.ReflectedType
    ///
    /// # Returns
    /// Tag and id of the type a `java.lang.Class` instance reflects;
    /// INVALID_OBJECT for any other object
    pub(crate) fn class_object_reference(&self, command: u8, data: &mut &[u8]) -> CommandResult<Vec<u8>> {
        match command {
            class_object_commands::REFLECTED_TYPE => {
                let ty = self.model.reflected_type(read_u64(data)?)?;
                let mut body = Vec::new();
                body.put_u8(ty.tag as u8);
                body.put_u64(ty.id);
                Ok(body)
            }
            _ => Err(CommandError::NotImplemented),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::commands::{class_object_commands, command_sets, reference_type_commands};
    use crate::dispatcher::testing::*;
    use crate::protocol::error_codes;
    use crate::reader::{read_u64, read_u8};

    const CO: u8 = command_sets::CLASS_OBJECT_REFERENCE;

    #[test]
    fn test_reflected_type_inverts_class_object() {
        for version in ["1.6.0_45", "1.8.0_292", "11.0.2", "17.0.1"] {
            let (_, dispatcher) = dispatcher(version);
            for signature in ["LA;", "[I"] {
                let ty = class_id(&dispatcher, signature);
                let body = ok(
                    &dispatcher,
                    command_sets::REFERENCE_TYPE,
                    reference_type_commands::CLASS_OBJECT,
                    ty.to_be_bytes().to_vec(),
                );
                let mirror = read_u64(&mut body.as_slice()).unwrap();

                let body = ok(&dispatcher, CO, class_object_commands::REFLECTED_TYPE, mirror.to_be_bytes().to_vec());
                let mut data = body.as_slice();
                let tag = read_u8(&mut data).unwrap();
                assert_eq!(tag, if signature == "LA;" { 1 } else { 3 }, "{}", version);
                assert_eq!(read_u64(&mut data).unwrap(), ty, "{}", version);
            }
        }
    }

    #[test]
    fn test_plain_object_is_invalid_object() {
        let (heap, dispatcher) = dispatcher("17.0.1");
        let b1 = dispatcher.model().object_id(heap.object_address("b1").unwrap());
        let reply = call(&dispatcher, CO, class_object_commands::REFLECTED_TYPE, b1.to_be_bytes().to_vec());
        assert_eq!(reply.error_code, error_codes::INVALID_OBJECT);
    }
}
