//! # Generic Struct Codec
//!
//! One routine encodes and decodes every payload by walking a
//! [`StructSpec`]. Struct layout (little-endian):
//!
//! ```text
//! u32 byte size (including this 8 byte prefix)
//! u32 encoded field count
//! fields in spec order; nullable fields carry a leading u8 presence marker
//! ```
//!
//! A decoder reading a struct with more fields than its spec knows skips the
//! tail using the byte size; fewer fields are accepted when the missing ones
//! are nullable.

use crate::errors::{CodecError, SendError};
use crate::header::{MessageFlags, MessageHeader};
use crate::pipe::MessagePipe;
use crate::schema::{FieldKind, StructSpec, StructValue, Value};
use bytes::{Buf, BufMut, Bytes, BytesMut};

const STRUCT_PREFIX: usize = 8;

/// Encode `value` as a struct described by `spec`.
pub fn encode_struct(spec: &StructSpec, value: &StructValue) -> Result<BytesMut, CodecError> {
    let mut out = BytesMut::with_capacity(64);
    write_struct(&mut out, spec, value)?;
    Ok(out)
}

/// Encode a full message: header followed by the struct payload.
pub fn encode_message(
    header: &MessageHeader,
    spec: &StructSpec,
    value: &StructValue,
) -> Result<Bytes, CodecError> {
    let mut out = BytesMut::with_capacity(header.header_size as usize + 64);
    header.encode(&mut out);
    write_struct(&mut out, spec, value)?;
    Ok(out.freeze())
}

/// Encode a message and write it to `handle`.
pub fn serialize_and_send_message(
    handle: &dyn MessagePipe,
    ordinal: u32,
    request_id: u64,
    flags: MessageFlags,
    spec: &StructSpec,
    value: &StructValue,
) -> Result<(), SendError> {
    let header = MessageHeader::new(ordinal, request_id, flags);
    let bytes = encode_message(&header, spec, value)?;
    handle.write_message(bytes, Vec::new())?;
    Ok(())
}

/// Decode the struct at the start of `payload`.
pub fn decode_struct_inline(payload: &[u8], spec: &StructSpec) -> Result<StructValue, CodecError> {
    let mut decoder = Decoder {
        buf: payload,
        pos: 0,
    };
    read_struct(&mut decoder, spec)
}

fn write_struct(out: &mut BytesMut, spec: &StructSpec, value: &StructValue) -> Result<(), CodecError> {
    let start = out.len();
    out.put_u32_le(0);
    out.put_u32_le(spec.fields().len() as u32);

    for field in spec.fields() {
        let v = value.get(&field.name).unwrap_or(&Value::Null);
        if field.nullable {
            if v.is_null() {
                out.put_u8(0);
                continue;
            }
            out.put_u8(1);
        } else if v.is_null() {
            return Err(CodecError::MissingField {
                spec: spec.name().to_string(),
                field: field.name.clone(),
            });
        }
        write_value(out, &field.name, &field.kind, v)?;
    }

    let size = (out.len() - start) as u32;
    out[start..start + 4].copy_from_slice(&size.to_le_bytes());
    Ok(())
}

fn write_value(
    out: &mut BytesMut,
    field: &str,
    kind: &FieldKind,
    value: &Value,
) -> Result<(), CodecError> {
    match (kind, value) {
        (FieldKind::Bool, Value::Bool(v)) => out.put_u8(u8::from(*v)),
        (FieldKind::Int32, Value::Int32(v)) => out.put_i32_le(*v),
        (FieldKind::Uint32, Value::Uint32(v)) => out.put_u32_le(*v),
        (FieldKind::Int64, Value::Int64(v)) => out.put_i64_le(*v),
        (FieldKind::Uint64, Value::Uint64(v)) => out.put_u64_le(*v),
        (FieldKind::Double, Value::Double(v)) => out.put_f64_le(*v),
        (FieldKind::String, Value::String(v)) => {
            out.put_u32_le(v.len() as u32);
            out.put_slice(v.as_bytes());
        }
        (FieldKind::Bytes, Value::Bytes(v)) => {
            out.put_u32_le(v.len() as u32);
            out.put_slice(v);
        }
        (FieldKind::Array(inner), Value::Array(items)) => {
            out.put_u32_le(items.len() as u32);
            for item in items {
                write_value(out, field, inner, item)?;
            }
        }
        (FieldKind::Struct(spec), Value::Struct(v)) => write_struct(out, spec, v)?,
        _ => {
            return Err(CodecError::TypeMismatch {
                field: field.to_string(),
                expected: kind.to_string(),
            })
        }
    }
    Ok(())
}

struct Decoder<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Decoder<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8], CodecError> {
        let available = self.buf.len().saturating_sub(self.pos);
        if n > available {
            return Err(CodecError::Truncated {
                offset: self.pos,
                needed: n,
                available,
            });
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn u8(&mut self) -> Result<u8, CodecError> {
        Ok(self.take(1)?[0])
    }

    fn u32(&mut self) -> Result<u32, CodecError> {
        Ok(self.take(4)?.get_u32_le())
    }

    fn u64(&mut self) -> Result<u64, CodecError> {
        Ok(self.take(8)?.get_u64_le())
    }
}

fn read_struct(dec: &mut Decoder<'_>, spec: &StructSpec) -> Result<StructValue, CodecError> {
    let start = dec.pos;
    let size = dec.u32()?;
    let count = dec.u32()? as usize;
    let end = start + size as usize;
    if (size as usize) < STRUCT_PREFIX || end > dec.buf.len() {
        return Err(CodecError::InvalidStructSize {
            spec: spec.name().to_string(),
            declared: size,
        });
    }

    // Field reads may not run past this struct's declared end.
    let mut inner = Decoder {
        buf: &dec.buf[..end],
        pos: dec.pos,
    };
    let mut value = StructValue::new();
    for (index, field) in spec.fields().iter().enumerate() {
        if index >= count {
            if !field.nullable {
                return Err(CodecError::MissingField {
                    spec: spec.name().to_string(),
                    field: field.name.clone(),
                });
            }
            value.insert(field.name.clone(), Value::Null);
            continue;
        }

        let v = if field.nullable {
            match inner.u8()? {
                0 => Value::Null,
                1 => read_value(&mut inner, &field.name, &field.kind)?,
                marker => {
                    return Err(CodecError::InvalidPresence {
                        field: field.name.clone(),
                        marker,
                    })
                }
            }
        } else {
            read_value(&mut inner, &field.name, &field.kind)?
        };
        value.insert(field.name.clone(), v);
    }

    dec.pos = end;
    Ok(value)
}

fn read_value(dec: &mut Decoder<'_>, field: &str, kind: &FieldKind) -> Result<Value, CodecError> {
    let value = match kind {
        FieldKind::Bool => match dec.u8()? {
            0 => Value::Bool(false),
            1 => Value::Bool(true),
            _ => {
                return Err(CodecError::TypeMismatch {
                    field: field.to_string(),
                    expected: kind.to_string(),
                })
            }
        },
        FieldKind::Int32 => Value::Int32(dec.take(4)?.get_i32_le()),
        FieldKind::Uint32 => Value::Uint32(dec.u32()?),
        FieldKind::Int64 => Value::Int64(dec.take(8)?.get_i64_le()),
        FieldKind::Uint64 => Value::Uint64(dec.u64()?),
        FieldKind::Double => Value::Double(dec.take(8)?.get_f64_le()),
        FieldKind::String => {
            let len = dec.u32()? as usize;
            let raw = dec.take(len)?;
            let s = std::str::from_utf8(raw).map_err(|_| CodecError::InvalidUtf8 {
                field: field.to_string(),
            })?;
            Value::String(s.to_string())
        }
        FieldKind::Bytes => {
            let len = dec.u32()? as usize;
            Value::Bytes(dec.take(len)?.to_vec())
        }
        FieldKind::Array(inner) => {
            let count = dec.u32()? as usize;
            // Every element occupies at least one byte.
            if count > dec.buf.len().saturating_sub(dec.pos) {
                return Err(CodecError::Truncated {
                    offset: dec.pos,
                    needed: count,
                    available: dec.buf.len().saturating_sub(dec.pos),
                });
            }
            let mut items = Vec::with_capacity(count);
            for _ in 0..count {
                items.push(read_value(dec, field, inner)?);
            }
            Value::Array(items)
        }
        FieldKind::Struct(spec) => Value::Struct(read_struct(dec, spec)?),
    };
    Ok(value)
}
