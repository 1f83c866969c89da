// StackFrame command implementations
//
// Commands for inspecting stack frame variables

use crate::commands::stack_frame_commands;
use crate::dispatcher::{CommandError, CommandResult, Dispatcher};
use crate::reader::{read_i32, read_u64, read_u8};
use crate::writer::write_tagged_value;
use bytes::BufMut;

/// Variable slot information for GetValues
#[derive(Debug, Clone)]
pub struct VariableSlot {
    pub slot: i32,
    pub sig_byte: u8,
}

impl VariableSlot {
    fn read(data: &mut &[u8]) -> CommandResult<Self> {
        Ok(Self {
            slot: read_i32(data)?,
            sig_byte: read_u8(data)?,
        })
    }
}

impl Dispatcher {
    pub(crate) fn stack_frame(&self, command: u8, data: &mut &[u8]) -> CommandResult<Vec<u8>> {
        let mut body = Vec::new();
        match command {
            stack_frame_commands::GET_VALUES => {
                let thread = read_u64(data)?;
                let frame = read_u64(data)?;
                let count = read_i32(data)?;
                let slots = (0..count)
                    .map(|_| VariableSlot::read(data).map(|s| (s.slot, s.sig_byte)))
                    .collect::<CommandResult<Vec<_>>>()?;

                let values = self.model.frame_values(thread, frame, &slots)?;
                body.put_i32(values.len() as i32);
                for value in &values {
                    write_tagged_value(&mut body, value);
                }
            }
            stack_frame_commands::THIS_OBJECT => {
                let thread = read_u64(data)?;
                let frame = read_u64(data)?;
                write_tagged_value(&mut body, &self.model.this_object(thread, frame)?);
            }
            // SetValues and PopFrames would change the target
            _ => return Err(CommandError::NotImplemented),
        }
        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use crate::commands::{command_sets, stack_frame_commands, thread_commands};
    use crate::dispatcher::testing::*;
    use crate::dispatcher::Dispatcher;
    use crate::protocol::error_codes;
    use crate::reader::{read_i32, read_tagged_value, read_u64};
    use crate::types::{Value, ValueData};
    use bytes::BufMut;

    const SF: u8 = command_sets::STACK_FRAME;

    /// (thread, innermost frame) ids
    fn top_frame(dispatcher: &Dispatcher) -> (u64, u64) {
        let t = first_thread(dispatcher);
        let mut request = t.to_be_bytes().to_vec();
        request.put_i32(0);
        request.put_i32(1);
        let body = ok(dispatcher, command_sets::THREAD_REFERENCE, thread_commands::FRAMES, request);
        let mut data = body.as_slice();
        assert_eq!(read_i32(&mut data).unwrap(), 1);
        (t, read_u64(&mut data).unwrap())
    }

    fn slots(thread: u64, frame: u64, slots: &[(i32, u8)]) -> Vec<u8> {
        let mut request = thread.to_be_bytes().to_vec();
        request.put_u64(frame);
        request.put_i32(slots.len() as i32);
        for (slot, tag) in slots {
            request.put_i32(*slot);
            request.put_u8(*tag);
        }
        request
    }

    #[test]
    fn test_get_values() {
        let (heap, dispatcher) = dispatcher("11.0.2");
        let (t, frame) = top_frame(&dispatcher);
        let body = ok(&dispatcher, SF, stack_frame_commands::GET_VALUES, slots(t, frame, &[(1, b'I'), (0, b'L')]));
        let mut data = body.as_slice();
        assert_eq!(read_i32(&mut data).unwrap(), 2);
        assert_eq!(read_tagged_value(&mut data).unwrap(), Value::int(5));
        let a1 = dispatcher.model().object_id(heap.object_address("a1").unwrap());
        assert_eq!(read_tagged_value(&mut data).unwrap().data, ValueData::Object(a1));
    }

    #[test]
    fn test_bad_slot() {
        let (_, dispatcher) = dispatcher("1.8.0_292");
        let (t, frame) = top_frame(&dispatcher);
        let reply = call(&dispatcher, SF, stack_frame_commands::GET_VALUES, slots(t, frame, &[(7, b'I')]));
        assert_eq!(reply.error_code, error_codes::INVALID_SLOT);

        let reply = call(&dispatcher, SF, stack_frame_commands::GET_VALUES, slots(t, 0xbad, &[(0, b'I')]));
        assert_eq!(reply.error_code, error_codes::INVALID_FRAMEID);
    }

    #[test]
    fn test_this_object() {
        let (heap, dispatcher) = dispatcher("17.0.1");
        let (t, frame) = top_frame(&dispatcher);
        let mut request = t.to_be_bytes().to_vec();
        request.put_u64(frame);
        let body = ok(&dispatcher, SF, stack_frame_commands::THIS_OBJECT, request.clone());
        let value = read_tagged_value(&mut body.as_slice()).unwrap();
        let a1 = dispatcher.model().object_id(heap.object_address("a1").unwrap());
        assert_eq!(value, Value::object(crate::types::TypeTag::Object, a1));

        let reply = call(&dispatcher, SF, stack_frame_commands::POP_FRAMES, request);
        assert_eq!(reply.error_code, error_codes::NOT_IMPLEMENTED);
    }
}
