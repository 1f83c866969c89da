// ClassLoaderReference command implementations

use crate::commands::class_loader_commands;
use crate::dispatcher::{CommandError, CommandResult, Dispatcher};
use crate::reader::read_u64;
use bytes::BufMut;

impl Dispatcher {
    pub(crate) fn class_loader_reference(&self, command: u8, data: &mut &[u8]) -> CommandResult<Vec<u8>> {
        match command {
            class_loader_commands::VISIBLE_CLASSES => {
                let classes = self.model.visible_classes(read_u64(data)?)?;
                let mut body = Vec::new();
                body.put_i32(classes.len() as i32);
                for ty in classes {
                    body.put_u8(ty.tag as u8);
                    body.put_u64(ty.id);
                }
                Ok(body)
            }
            _ => Err(CommandError::NotImplemented),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::commands::{class_loader_commands, command_sets};
    use crate::dispatcher::testing::*;
    use crate::protocol::error_codes;
    use crate::provider::synthetic::fixtures;
    use crate::reader::{read_i32, read_u64, read_u8};

    const CL: u8 = command_sets::CLASS_LOADER_REFERENCE;

    #[test]
    fn test_visible_classes() {
        let mut spec = fixtures::two_types("1.8.0_292");
        spec.objects.push(
            serde_json::from_value(serde_json::json!(
                {"kind": "instance", "id": "app", "class": "java/lang/ClassLoader", "fields": {}}
            ))
            .unwrap(),
        );
        spec.classes[1].loader = Some("app".to_string());
        let (heap, dispatcher) = dispatcher_for(&spec);
        let app = dispatcher.model().object_id(heap.object_address("app").unwrap());
        let b = class_id(&dispatcher, "LB;");
        let object = class_id(&dispatcher, "Ljava/lang/Object;");

        let body = ok(&dispatcher, CL, class_loader_commands::VISIBLE_CLASSES, app.to_be_bytes().to_vec());
        let mut data = body.as_slice();
        let count = read_i32(&mut data).unwrap();
        let classes: Vec<(u8, u64)> = (0..count)
            .map(|_| (read_u8(&mut data).unwrap(), read_u64(&mut data).unwrap()))
            .collect();
        assert!(data.is_empty());
        assert!(classes.contains(&(1, b)));
        assert!(classes.contains(&(1, object)));
        assert!(classes.iter().any(|(tag, _)| *tag == 3));
        assert_eq!(count as usize, dispatcher.model().all_types().unwrap().len());
    }

    #[test]
    fn test_non_loader_is_invalid_class_loader() {
        let (heap, dispatcher) = dispatcher("11.0.2");
        let a1 = dispatcher.model().object_id(heap.object_address("a1").unwrap());
        let reply = call(&dispatcher, CL, class_loader_commands::VISIBLE_CLASSES, a1.to_be_bytes().to_vec());
        assert_eq!(reply.error_code, error_codes::INVALID_CLASS_LOADER);

        let reply = call(&dispatcher, CL, 2, a1.to_be_bytes().to_vec());
        assert_eq!(reply.error_code, error_codes::NOT_IMPLEMENTED);
    }
}
