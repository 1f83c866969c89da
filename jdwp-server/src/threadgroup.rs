// ThreadGroupReference command implementations

use crate::commands::thread_group_commands;
use crate::dispatcher::{CommandError, CommandResult, Dispatcher};
use crate::reader::read_u64;
use crate::writer::write_string;
use bytes::BufMut;

impl Dispatcher {
    pub(crate) fn thread_group_reference(&self, command: u8, data: &mut &[u8]) -> CommandResult<Vec<u8>> {
        let mut body = Vec::new();
        match command {
            thread_group_commands::NAME => {
                let group = self.model.thread_group(read_u64(data)?)?;
                write_string(&mut body, &group.name);
            }
            thread_group_commands::PARENT => {
                let group = self.model.thread_group(read_u64(data)?)?;
                body.put_u64(group.parent);
            }
            thread_group_commands::CHILDREN => {
                let (threads, groups) = self.model.thread_group_children(read_u64(data)?)?;
                for ids in [threads, groups] {
                    body.put_i32(ids.len() as i32);
                    for id in ids {
                        body.put_u64(id);
                    }
                }
            }
            _ => return Err(CommandError::NotImplemented),
        }
        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use crate::commands::{command_sets, thread_commands, thread_group_commands, vm_commands};
    use crate::dispatcher::testing::*;
    use crate::protocol::error_codes;
    use crate::reader::{read_i32, read_string, read_u64};

    const TG: u8 = command_sets::THREAD_GROUP_REFERENCE;

    #[test]
    fn test_group_tree() {
        let (_, dispatcher) = dispatcher("11.0.2");
        let system = ids(ok(&dispatcher, command_sets::VIRTUAL_MACHINE, vm_commands::TOP_LEVEL_THREAD_GROUPS, Vec::new()))[0];
        let body = ok(&dispatcher, TG, thread_group_commands::NAME, system.to_be_bytes().to_vec());
        assert_eq!(read_string(&mut body.as_slice()).unwrap(), "system");
        let body = ok(&dispatcher, TG, thread_group_commands::PARENT, system.to_be_bytes().to_vec());
        assert_eq!(read_u64(&mut body.as_slice()).unwrap(), 0);

        let t = first_thread(&dispatcher);
        let body = ok(&dispatcher, command_sets::THREAD_REFERENCE, thread_commands::THREAD_GROUP, t.to_be_bytes().to_vec());
        let main = read_u64(&mut body.as_slice()).unwrap();

        let body = ok(&dispatcher, TG, thread_group_commands::CHILDREN, system.to_be_bytes().to_vec());
        let mut data = body.as_slice();
        assert_eq!(read_i32(&mut data).unwrap(), 0);
        assert_eq!(read_i32(&mut data).unwrap(), 1);
        assert_eq!(read_u64(&mut data).unwrap(), main);

        let body = ok(&dispatcher, TG, thread_group_commands::CHILDREN, main.to_be_bytes().to_vec());
        let mut data = body.as_slice();
        assert_eq!(read_i32(&mut data).unwrap(), 1);
        assert_eq!(read_u64(&mut data).unwrap(), t);
        assert_eq!(read_i32(&mut data).unwrap(), 0);
    }

    #[test]
    fn test_thread_is_not_a_group() {
        let (_, dispatcher) = dispatcher("1.8.0_292");
        let t = first_thread(&dispatcher);
        let reply = call(&dispatcher, TG, thread_group_commands::NAME, t.to_be_bytes().to_vec());
        assert_eq!(reply.error_code, error_codes::INVALID_THREAD_GROUP);
    }
}
