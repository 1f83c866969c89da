// StringReference command implementations

use crate::commands::string_reference_commands;
use crate::dispatcher::{CommandError, CommandResult, Dispatcher};
use crate::reader::read_u64;
use crate::writer::write_string;

impl Dispatcher {
    /// StringReference.Value
    ///
    /// # Returns
    /// The string's characters, decoded from whatever layout the JVM
    /// generation uses; INVALID_STRING for any other object
    pub(crate) fn string_reference(&self, command: u8, data: &mut &[u8]) -> CommandResult<Vec<u8>> {
        match command {
            string_reference_commands::VALUE => {
                let value = self.model.string_value(read_u64(data)?)?;
                let mut body = Vec::new();
                write_string(&mut body, &value);
                Ok(body)
            }
            _ => Err(CommandError::NotImplemented),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::commands::{command_sets, string_reference_commands};
    use crate::dispatcher::testing::*;
    use crate::protocol::error_codes;
    use crate::reader::read_string;

    #[test]
    fn test_string_value_per_generation() {
        for version in ["1.6.0_45", "1.8.0_292", "11.0.2", "17.0.1"] {
            let (heap, dispatcher) = dispatcher(version);
            let names = heap.object_address("names").unwrap();
            let strings = dispatcher.model().array_values(dispatcher.model().object_id(names), 0, 3).unwrap().1;
            let smiley = match strings[2].data {
                crate::types::ValueData::Object(id) => id,
                ref other => panic!("{:?}", other),
            };
            let body = ok(
                &dispatcher,
                command_sets::STRING_REFERENCE,
                string_reference_commands::VALUE,
                smiley.to_be_bytes().to_vec(),
            );
            assert_eq!(read_string(&mut body.as_slice()).unwrap(), "\u{263a}", "{}", version);
        }
    }

    #[test]
    fn test_non_string_is_invalid_string() {
        let (heap, dispatcher) = dispatcher("11.0.2");
        let a1 = dispatcher.model().object_id(heap.object_address("a1").unwrap());
        let reply = call(
            &dispatcher,
            command_sets::STRING_REFERENCE,
            string_reference_commands::VALUE,
            a1.to_be_bytes().to_vec(),
        );
        assert_eq!(reply.error_code, error_codes::INVALID_STRING);
    }
}
