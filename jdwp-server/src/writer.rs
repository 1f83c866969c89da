// Helper functions for writing JDWP data types into reply buffers
//
// Counterpart of reader.rs; every writer here has a reader that restores
// the same value. Bytes come back unchanged except booleans, which are
// normalized: any non-zero byte reads as true and is written as 1.

use crate::types::{Location, Value, ValueData};
use bytes::BufMut;

/// Write a JDWP string (4-byte length prefix + UTF-8 bytes)
pub fn write_string<B: BufMut>(buf: &mut B, s: &str) {
    buf.put_u32(s.len() as u32);
    buf.put_slice(s.as_bytes());
}

/// Always 0 or 1
pub fn write_bool<B: BufMut>(buf: &mut B, v: bool) {
    buf.put_u8(if v { 1 } else { 0 });
}

pub fn write_location<B: BufMut>(buf: &mut B, location: &Location) {
    buf.put_u8(location.type_tag);
    buf.put_u64(location.class_id);
    buf.put_u64(location.method_id);
    buf.put_u64(location.index);
}

/// Write a value without its tag
pub fn write_untagged_value<B: BufMut>(buf: &mut B, data: &ValueData) {
    match *data {
        ValueData::Byte(v) => buf.put_i8(v),
        ValueData::Char(v) => buf.put_u16(v),
        ValueData::Float(v) => buf.put_f32(v),
        ValueData::Double(v) => buf.put_f64(v),
        ValueData::Int(v) => buf.put_i32(v),
        ValueData::Long(v) => buf.put_i64(v),
        ValueData::Short(v) => buf.put_i16(v),
        ValueData::Boolean(v) => write_bool(buf, v),
        ValueData::Object(id) => buf.put_u64(id),
        ValueData::Void => {}
    }
}

pub fn write_tagged_value<B: BufMut>(buf: &mut B, value: &Value) {
    buf.put_u8(value.tag);
    write_untagged_value(buf, &value.data);
}

/// Write an array region: component tag, count, then values.
///
/// Primitive components are written untagged, object components tagged.
pub fn write_array_region<B: BufMut>(buf: &mut B, component_tag: u8, values: &[Value]) {
    buf.put_u8(component_tag);
    buf.put_i32(values.len() as i32);

    let primitive = crate::types::TypeTag::from_u8(component_tag)
        .map(|t| t.is_primitive())
        .unwrap_or(false);

    for value in values {
        if primitive {
            write_untagged_value(buf, &value.data);
        } else {
            write_tagged_value(buf, value);
        }
    }
}
