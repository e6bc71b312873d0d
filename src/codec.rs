/*
 * Byte Codec
 * ==========
 *
 * Little-endian integer packing plus a declarative field schema. Every
 * on-disk structure in this crate (partition records, the BIOS parameter
 * block, directory entries) is described by a table of `Field` descriptors
 * giving the name, byte offset, width, and kind of each field. The typed
 * structure codecs read and write through these descriptors, and the shell
 * uses `decode_record` to render any structure as name/value pairs without
 * knowing its type.
 */

use std::fmt;

/// Decodes `buf` as an unsigned little-endian integer. `buf` must be at
/// most 8 bytes wide.
pub fn unpack(buf: &[u8]) -> u64 {
    debug_assert!(buf.len() <= 8);
    let mut value = 0u64;
    for (i, &byte) in buf.iter().enumerate() {
        value |= (byte as u64) << (i * 8);
    }
    value
}

/// Encodes `value` into `buf` little-endian, truncating bits above
/// `8 * buf.len()`. `buf` must be at most 8 bytes wide.
pub fn pack(value: u64, buf: &mut [u8]) {
    debug_assert!(buf.len() <= 8);
    for (i, slot) in buf.iter_mut().enumerate() {
        *slot = (value >> (i * 8)) as u8;
    }
}

/// One field of an on-disk structure.
#[derive(Debug, Clone, Copy)]
pub struct Field {
    pub name: &'static str,
    pub offset: usize,
    pub length: usize,
    pub ascii: bool,
}

impl Field {
    pub const fn int(name: &'static str, offset: usize, length: usize) -> Self {
        Field {
            name,
            offset,
            length,
            ascii: false,
        }
    }

    pub const fn ascii(name: &'static str, offset: usize, length: usize) -> Self {
        Field {
            name,
            offset,
            length,
            ascii: true,
        }
    }

    /// Reads the field as a little-endian integer.
    pub fn get(&self, buf: &[u8]) -> u64 {
        unpack(&buf[self.offset..self.offset + self.length])
    }

    /// Writes the field as a little-endian integer, truncating high bits.
    pub fn put(&self, buf: &mut [u8], value: u64) {
        pack(value, &mut buf[self.offset..self.offset + self.length]);
    }

    /// Borrows the field's raw bytes.
    pub fn get_bytes<'a>(&self, buf: &'a [u8]) -> &'a [u8] {
        &buf[self.offset..self.offset + self.length]
    }

    /// Writes raw bytes into the field, zero-padding up to the field width.
    /// `value` must not exceed the field width.
    pub fn put_bytes(&self, buf: &mut [u8], value: &[u8]) {
        let dst = &mut buf[self.offset..self.offset + self.length];
        dst.fill(0);
        dst[..value.len()].copy_from_slice(value);
    }
}

/// A decoded field value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Int(u64),
    Ascii(Vec<u8>),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(v) => write!(f, "{}", v),
            Value::Ascii(bytes) => write!(f, "{}", String::from_utf8_lossy(bytes)),
        }
    }
}

/// Decodes every schema field out of `buf` into name/value pairs, in schema
/// order. Single-byte fields decode as the raw byte value.
pub fn decode_record(schema: &[Field], buf: &[u8]) -> Vec<(&'static str, Value)> {
    schema
        .iter()
        .map(|field| {
            let value = if field.ascii {
                Value::Ascii(field.get_bytes(buf).to_vec())
            } else {
                Value::Int(field.get(buf))
            };
            (field.name, value)
        })
        .collect()
}

/// Encodes a full record of `size` bytes from name/value pairs. Every
/// schema field must be supplied; unnamed gap bytes stay zero.
pub fn encode_record(
    schema: &[Field],
    values: &[(&str, Value)],
    size: usize,
) -> Result<Vec<u8>, String> {
    let mut buf = vec![0u8; size];
    for field in schema {
        let value = values
            .iter()
            .find(|(name, _)| *name == field.name)
            .map(|(_, value)| value)
            .ok_or_else(|| format!("missing field: {}", field.name))?;
        match value {
            Value::Int(v) => field.put(&mut buf, *v),
            Value::Ascii(bytes) => {
                if bytes.len() > field.length {
                    return Err(format!(
                        "field {} takes {} bytes, got {}",
                        field.name,
                        field.length,
                        bytes.len()
                    ));
                }
                field.put_bytes(&mut buf, bytes);
            }
        }
    }
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unpack() {
        assert_eq!(unpack(&[]), 0);
        assert_eq!(unpack(&[0x34, 0x12]), 0x1234);
        assert_eq!(unpack(&[0x78, 0x56, 0x34, 0x12]), 0x12345678);
        assert_eq!(unpack(&[0xFF; 8]), u64::MAX);
    }

    #[test]
    fn test_pack() {
        let mut buf = [0u8; 2];
        pack(0x1234, &mut buf);
        assert_eq!(buf, [0x34, 0x12]);

        // High bits beyond the buffer width are truncated
        let mut buf = [0u8; 2];
        pack(0xABCD_1234, &mut buf);
        assert_eq!(buf, [0x34, 0x12]);
    }

    #[test]
    fn test_pack_unpack_roundtrip() {
        for value in [0u64, 1, 0xFF, 0x100, 0xFFFF, 0x12345678, 0xFFFF_FFFF] {
            let mut buf = [0u8; 4];
            pack(value & 0xFFFF_FFFF, &mut buf);
            assert_eq!(unpack(&buf), value & 0xFFFF_FFFF);
        }
    }

    #[test]
    fn test_field_get_put() {
        const VALUE: Field = Field::int("value", 2, 2);
        let mut buf = [0u8; 8];
        VALUE.put(&mut buf, 0xBEEF);
        assert_eq!(buf, [0, 0, 0xEF, 0xBE, 0, 0, 0, 0]);
        assert_eq!(VALUE.get(&buf), 0xBEEF);
    }

    #[test]
    fn test_field_put_bytes_zero_pads() {
        const NAME: Field = Field::ascii("name", 1, 5);
        let mut buf = [0xFFu8; 8];
        NAME.put_bytes(&mut buf, b"AB");
        assert_eq!(&buf[1..6], &[b'A', b'B', 0, 0, 0]);
        assert_eq!(buf[0], 0xFF);
        assert_eq!(buf[6], 0xFF);
    }

    const SCHEMA: [Field; 3] = [
        Field::ascii("tag", 0, 4),
        Field::int("kind", 4, 1),
        Field::int("count", 5, 2),
    ];

    #[test]
    fn test_decode_record() {
        let mut buf = [0u8; 8];
        buf[..4].copy_from_slice(b"DATA");
        buf[4] = 7;
        buf[5..7].copy_from_slice(&0x0102u16.to_le_bytes());

        let record = decode_record(&SCHEMA, &buf);
        assert_eq!(record[0], ("tag", Value::Ascii(b"DATA".to_vec())));
        assert_eq!(record[1], ("kind", Value::Int(7)));
        assert_eq!(record[2], ("count", Value::Int(0x0102)));
    }

    #[test]
    fn test_encode_decode_roundtrip() {
        let values = vec![
            ("tag", Value::Ascii(b"DATA".to_vec())),
            ("kind", Value::Int(7)),
            ("count", Value::Int(0x0102)),
        ];
        let buf = encode_record(&SCHEMA, &values, 8).unwrap();
        let decoded = decode_record(&SCHEMA, &buf);
        assert_eq!(decoded, values);
    }

    #[test]
    fn test_encode_record_missing_field() {
        let values = vec![("tag", Value::Ascii(b"DATA".to_vec()))];
        let err = encode_record(&SCHEMA, &values, 8).unwrap_err();
        assert!(err.contains("kind"));
    }

    #[test]
    fn test_encode_record_oversized_ascii() {
        let values = vec![
            ("tag", Value::Ascii(b"TOOLONG".to_vec())),
            ("kind", Value::Int(0)),
            ("count", Value::Int(0)),
        ];
        assert!(encode_record(&SCHEMA, &values, 8).is_err());
    }
}
