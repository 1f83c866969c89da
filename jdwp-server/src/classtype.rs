// ClassType command implementations

use crate::commands::class_type_commands;
use crate::dispatcher::{CommandError, CommandResult, Dispatcher};
use crate::reader::read_u64;
use bytes::BufMut;

impl Dispatcher {
    pub(crate) fn class_type(&self, command: u8, data: &mut &[u8]) -> CommandResult<Vec<u8>> {
        match command {
            class_type_commands::SUPERCLASS => {
                let ty = self.model.reference_type(read_u64(data)?)?;
                let superclass = self.model.superclass(&ty)?;
                let mut body = Vec::new();
                body.put_u64(superclass.map(|s| s.id).unwrap_or(0));
                Ok(body)
            }
            // SetValues, InvokeMethod and NewInstance need a live VM
            _ => Err(CommandError::NotImplemented),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::commands::{class_type_commands, command_sets};
    use crate::dispatcher::testing::*;
    use crate::protocol::error_codes;
    use crate::reader::read_u64;

    #[test]
    fn test_superclass_chain() {
        let (_, dispatcher) = dispatcher("11.0.2");
        let a = class_id(&dispatcher, "LA;");
        let object = class_id(&dispatcher, "Ljava/lang/Object;");

        let body = ok(&dispatcher, command_sets::CLASS_TYPE, class_type_commands::SUPERCLASS, a.to_be_bytes().to_vec());
        assert_eq!(read_u64(&mut body.as_slice()).unwrap(), object);

        let body = ok(&dispatcher, command_sets::CLASS_TYPE, class_type_commands::SUPERCLASS, object.to_be_bytes().to_vec());
        assert_eq!(read_u64(&mut body.as_slice()).unwrap(), 0);
    }

    #[test]
    fn test_invocation_is_not_implemented() {
        let (_, dispatcher) = dispatcher("11.0.2");
        let a = class_id(&dispatcher, "LA;");
        for command in [
            class_type_commands::SET_VALUES,
            class_type_commands::INVOKE_METHOD,
            class_type_commands::NEW_INSTANCE,
        ] {
            let reply = call(&dispatcher, command_sets::CLASS_TYPE, command, a.to_be_bytes().to_vec());
            assert_eq!(reply.error_code, error_codes::NOT_IMPLEMENTED);
        }
    }
}
