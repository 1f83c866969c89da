// Method command implementations
//
// Line tables, local variable tables and bytecodes of a method

use crate::commands::method_commands;
use crate::dispatcher::{CommandError, CommandResult, Dispatcher};
use crate::model::MethodDescriptor;
use crate::reader::read_u64;
use crate::types::Variable;
use crate::writer::{write_bool, write_string};
use bytes::BufMut;

/// Line table entry - maps source line to bytecode index
#[derive(Debug, Clone)]
pub struct LineTableEntry {
    pub line_code_index: u64, // bytecode index
    pub line_number: i32,     // source line number
}

/// Complete line table for a method
#[derive(Debug, Clone)]
pub struct LineTable {
    pub start: i64, // -1 for native methods
    pub end: i64,
    pub lines: Vec<LineTableEntry>,
}

impl From<&MethodDescriptor> for LineTable {
    fn from(method: &MethodDescriptor) -> Self {
        let (start, end) = method.code_range();
        Self {
            start,
            end,
            lines: method
                .line_table
                .iter()
                .map(|entry| LineTableEntry {
                    line_code_index: entry.code_index,
                    line_number: entry.line,
                })
                .collect(),
        }
    }
}

impl LineTable {
    fn write(&self, buf: &mut Vec<u8>) {
        buf.put_i64(self.start);
        buf.put_i64(self.end);
        buf.put_i32(self.lines.len() as i32);
        for line in &self.lines {
            buf.put_u64(line.line_code_index);
            buf.put_i32(line.line_number);
        }
    }
}

fn write_variables(buf: &mut Vec<u8>, arg_count: i32, variables: &[Variable], generic: bool) {
    buf.put_i32(arg_count);
    buf.put_i32(variables.len() as i32);
    for variable in variables {
        buf.put_u64(variable.code_index);
        write_string(buf, &variable.name);
        write_string(buf, &variable.signature);
        if generic {
            write_string(buf, "");
        }
        buf.put_u32(variable.length);
        buf.put_u32(variable.slot);
    }
}

impl Dispatcher {
    pub(crate) fn method(&self, command: u8, data: &mut &[u8]) -> CommandResult<Vec<u8>> {
        if !matches!(
            command,
            method_commands::LINE_TABLE
                | method_commands::VARIABLE_TABLE
                | method_commands::BYTECODES
                | method_commands::IS_OBSOLETE
                | method_commands::VARIABLE_TABLE_WITH_GENERIC
        ) {
            return Err(CommandError::NotImplemented);
        }

        let type_id = read_u64(data)?;
        let method = self.model.method(type_id, read_u64(data)?)?;
        let mut body = Vec::new();

        match command {
            method_commands::LINE_TABLE => LineTable::from(method.as_ref()).write(&mut body),
            method_commands::VARIABLE_TABLE | method_commands::VARIABLE_TABLE_WITH_GENERIC => {
                let variables = method.variables.as_ref().ok_or_else(|| {
                    CommandError::AbsentInformation(format!("no local variable table for {}", method.name))
                })?;
                let generic = command == method_commands::VARIABLE_TABLE_WITH_GENERIC;
                write_variables(&mut body, method.arg_count(), variables, generic);
            }
            method_commands::BYTECODES => {
                body.put_i32(method.code.len() as i32);
                body.put_slice(&method.code);
            }
            // Nothing is ever redefined in a snapshot
            _ => write_bool(&mut body, false),
        }
        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use crate::commands::{command_sets, method_commands, reference_type_commands};
    use crate::dispatcher::testing::*;
    use crate::dispatcher::Dispatcher;
    use crate::protocol::error_codes;
    use crate::reader::{read_i32, read_i64, read_string, read_u32, read_u64};

    /// (type id, method id) of the only method of a class
    fn only_method(dispatcher: &Dispatcher, signature: &str) -> Vec<u8> {
        let ty = class_id(dispatcher, signature);
        let body = ok(dispatcher, command_sets::REFERENCE_TYPE, reference_type_commands::METHODS, ty.to_be_bytes().to_vec());
        let mut data = body.as_slice();
        assert_eq!(read_i32(&mut data).unwrap(), 1);
        let method = read_u64(&mut data).unwrap();
        let mut request = ty.to_be_bytes().to_vec();
        request.extend_from_slice(&method.to_be_bytes());
        request
    }

    #[test]
    fn test_line_table() {
        let (_, dispatcher) = dispatcher("11.0.2");
        let request = only_method(&dispatcher, "LA;");
        let body = ok(&dispatcher, command_sets::METHOD, method_commands::LINE_TABLE, request);
        let mut data = body.as_slice();
        assert_eq!(read_i64(&mut data).unwrap(), 0);
        assert_eq!(read_i64(&mut data).unwrap(), 5);
        assert_eq!(read_i32(&mut data).unwrap(), 2);
        assert_eq!(read_u64(&mut data).unwrap(), 0);
        assert_eq!(read_i32(&mut data).unwrap(), 10);
        assert_eq!(read_u64(&mut data).unwrap(), 2);
        assert_eq!(read_i32(&mut data).unwrap(), 11);
    }

    #[test]
    fn test_variable_table() {
        let (_, dispatcher) = dispatcher("1.8.0_292");
        let request = only_method(&dispatcher, "LA;");
        let body = ok(&dispatcher, command_sets::METHOD, method_commands::VARIABLE_TABLE, request);
        let mut data = body.as_slice();
        // this + int
        assert_eq!(read_i32(&mut data).unwrap(), 2);
        assert_eq!(read_i32(&mut data).unwrap(), 3);
        assert_eq!(read_u64(&mut data).unwrap(), 0);
        assert_eq!(read_string(&mut data).unwrap(), "this");
        assert_eq!(read_string(&mut data).unwrap(), "LA;");
        assert_eq!(read_u32(&mut data).unwrap(), 6);
        assert_eq!(read_u32(&mut data).unwrap(), 0);
    }

    #[test]
    fn test_missing_variable_table_is_absent() {
        let (_, dispatcher) = dispatcher("17.0.1");
        let request = only_method(&dispatcher, "LB;");
        let reply = call(&dispatcher, command_sets::METHOD, method_commands::VARIABLE_TABLE_WITH_GENERIC, request);
        assert_eq!(reply.error_code, error_codes::ABSENT_INFORMATION);
    }

    #[test]
    fn test_bytecodes_and_obsolete() {
        let (_, dispatcher) = dispatcher("1.7.0_80");
        let request = only_method(&dispatcher, "LA;");
        let body = ok(&dispatcher, command_sets::METHOD, method_commands::BYTECODES, request.clone());
        assert_eq!(body, vec![0, 0, 0, 6, 42, 27, 182, 0, 2, 177]);
        assert_eq!(ok(&dispatcher, command_sets::METHOD, method_commands::IS_OBSOLETE, request), vec![0]);
    }

    #[test]
    fn test_method_of_other_type_is_invalid() {
        let (_, dispatcher) = dispatcher("11.0.2");
        let mut request = only_method(&dispatcher, "LA;");
        let b = class_id(&dispatcher, "LB;");
        request[..8].copy_from_slice(&b.to_be_bytes());
        let reply = call(&dispatcher, command_sets::METHOD, method_commands::LINE_TABLE, request);
        assert_eq!(reply.error_code, error_codes::INVALID_METHODID);
    }
}
