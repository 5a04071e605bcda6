//! Packed binary codec.
//!
//! Each atom is written with the data type named by its binary member, or
//! its declared data type otherwise. Variable-length strings carry a `u32`
//! byte length prefix; members with a `byteLength` are zero padded instead.
//! Implicit array sizes are written as `u32` and choice selections as a `u8`
//! item index.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tracing::{debug, warn};

use swe_common::data::{read_block, visit_block, BlockSource, BlockVisitor};
use swe_common::{
    BinaryEncoding, BinaryMember, ByteOrder, DataBlock, DataChoice, DataComponent, DataEncoding,
    DataType, Scalar, ScalarValue,
};

use crate::config::CodecConfig;
use crate::data::{check_array_size, DataCodec, DataReader, DataWriter};
use crate::error::{BindingError, Result};
use crate::schema::resolve_member;
use crate::time::{format_iso, parse_iso};

/// Codec for [`BinaryEncoding`] with raw byte encoding.
#[derive(Debug, Clone)]
pub struct BinaryCodec {
    encoding: BinaryEncoding,
    max_array_size: usize,
}

impl BinaryCodec {
    pub fn new(encoding: BinaryEncoding, config: &CodecConfig) -> Self {
        Self {
            encoding,
            max_array_size: config.max_array_size,
        }
    }
}

impl DataWriter for BinaryCodec {
    fn write_blocks(&self, component: &DataComponent, blocks: &[DataBlock]) -> Result<Bytes> {
        let members = MemberTable::resolve(component, &self.encoding);
        let mut writer = BinaryWriter {
            buf: BytesMut::new(),
            order: self.encoding.byte_order,
            members: &members,
        };
        for block in blocks {
            visit_block(component, block, &mut writer)?;
        }
        debug!(
            codec = "binary",
            byte_order = self.encoding.byte_order.as_str(),
            blocks = blocks.len(),
            bytes = writer.buf.len(),
            "Encoded data blocks"
        );
        Ok(writer.buf.freeze())
    }
}

impl DataReader for BinaryCodec {
    fn read_blocks(&self, component: &DataComponent, input: &[u8]) -> Result<Vec<DataBlock>> {
        if let Some(expected) = self.encoding.byte_length {
            if expected != input.len() {
                warn!(expected, actual = input.len(), "Binary stream length differs from byteLength");
            }
        }

        let members = MemberTable::resolve(component, &self.encoding);
        let mut reader = BinaryReader {
            input,
            total: input.len(),
            order: self.encoding.byte_order,
            members: &members,
            max_array_size: self.max_array_size,
        };

        let mut blocks = Vec::new();
        while reader.input.has_remaining() {
            blocks.push(read_block(component, &mut reader)?);
        }
        debug!(codec = "binary", blocks = blocks.len(), bytes = input.len(), "Decoded data blocks");
        Ok(blocks)
    }
}

impl DataCodec for BinaryCodec {
    fn encoding(&self) -> DataEncoding {
        DataEncoding::Binary(self.encoding.clone())
    }
}

/// Binary members resolved to the scalars they describe.
struct MemberTable<'a> {
    entries: Vec<(&'a DataComponent, &'a BinaryMember)>,
}

impl<'a> MemberTable<'a> {
    fn resolve(root: &'a DataComponent, encoding: &'a BinaryEncoding) -> Self {
        let entries = encoding
            .members
            .iter()
            .filter_map(|m| match resolve_member(root, &m.reference) {
                Some(c) if c.is_scalar() => Some((c, m)),
                _ => {
                    warn!(reference = %m.reference, "Binary member does not resolve to a scalar, skipping");
                    None
                }
            })
            .collect();
        Self { entries }
    }

    fn get(&self, component: &DataComponent) -> Option<&'a BinaryMember> {
        self.entries
            .iter()
            .find(|(c, _)| std::ptr::eq(*c, component))
            .map(|(_, m)| *m)
    }

    /// Wire type and fixed byte length of a scalar.
    fn wire_format(&self, component: &DataComponent, scalar: &Scalar) -> (DataType, Option<usize>) {
        match self.get(component) {
            Some(m) => (m.data_type.unwrap_or(scalar.data_type), m.byte_length),
            None => (scalar.data_type, None),
        }
    }
}

macro_rules! put_ordered {
    ($buf:expr, $order:expr, $value:expr, $be:ident, $le:ident) => {
        match $order {
            ByteOrder::BigEndian => $buf.$be($value),
            ByteOrder::LittleEndian => $buf.$le($value),
        }
    };
}

macro_rules! get_ordered {
    ($buf:expr, $order:expr, $be:ident, $le:ident) => {
        match $order {
            ByteOrder::BigEndian => $buf.$be(),
            ByteOrder::LittleEndian => $buf.$le(),
        }
    };
}

// =============================================================================
// Writing
// =============================================================================

struct BinaryWriter<'a> {
    buf: BytesMut,
    order: ByteOrder,
    members: &'a MemberTable<'a>,
}

impl BinaryWriter<'_> {
    fn put_string(&mut self, s: &str, byte_length: Option<usize>) {
        match byte_length {
            Some(n) => {
                let mut end = s.len().min(n);
                while !s.is_char_boundary(end) {
                    end -= 1;
                }
                self.buf.put_slice(&s.as_bytes()[..end]);
                self.buf.put_bytes(0, n - end);
            }
            None => {
                put_ordered!(self.buf, self.order, s.len() as u32, put_u32, put_u32_le);
                self.buf.put_slice(s.as_bytes());
            }
        }
    }
}

impl BlockVisitor for BinaryWriter<'_> {
    type Error = BindingError;

    fn begin_array(&mut self, component: &DataComponent, len: usize) -> Result<()> {
        if component.as_array().is_some_and(|a| a.is_implicit_size()) {
            let len = u32::try_from(len).map_err(|_| BindingError::SizeLimitExceeded {
                size: len,
                limit: u32::MAX as usize,
            })?;
            put_ordered!(self.buf, self.order, len, put_u32, put_u32_le);
        }
        Ok(())
    }

    fn begin_choice(&mut self, component: &DataComponent, index: usize) -> Result<()> {
        let index = u8::try_from(index).map_err(|_| {
            BindingError::invalid_schema(format!(
                "choice '{}' has too many items for a one byte selector",
                component.name
            ))
        })?;
        self.buf.put_u8(index);
        Ok(())
    }

    fn scalar(&mut self, component: &DataComponent, scalar: &Scalar, value: ScalarValue) -> Result<()> {
        let (data_type, byte_length) = self.members.wire_format(component, scalar);
        let iso = data_type == DataType::Utf8String
            && scalar.is_iso_time()
            && value.data_type().is_numeric();
        let iso_text = if iso { value.as_f64().and_then(format_iso) } else { None };
        let value = match iso_text {
            Some(text) => ScalarValue::Text(text),
            None => value.convert(data_type)?,
        };

        match value {
            ScalarValue::Boolean(v) => self.buf.put_u8(u8::from(v)),
            ScalarValue::Byte(v) => self.buf.put_i8(v),
            ScalarValue::UByte(v) => self.buf.put_u8(v),
            ScalarValue::Short(v) => put_ordered!(self.buf, self.order, v, put_i16, put_i16_le),
            ScalarValue::UShort(v) => put_ordered!(self.buf, self.order, v, put_u16, put_u16_le),
            ScalarValue::Int(v) => put_ordered!(self.buf, self.order, v, put_i32, put_i32_le),
            ScalarValue::UInt(v) => put_ordered!(self.buf, self.order, v, put_u32, put_u32_le),
            ScalarValue::Long(v) => put_ordered!(self.buf, self.order, v, put_i64, put_i64_le),
            ScalarValue::Float(v) => put_ordered!(self.buf, self.order, v, put_f32, put_f32_le),
            ScalarValue::Double(v) => put_ordered!(self.buf, self.order, v, put_f64, put_f64_le),
            ScalarValue::Text(s) => self.put_string(&s, byte_length),
        }
        Ok(())
    }
}

// =============================================================================
// Reading
// =============================================================================

struct BinaryReader<'a, 'b> {
    input: &'b [u8],
    total: usize,
    order: ByteOrder,
    members: &'a MemberTable<'a>,
    max_array_size: usize,
}

impl BinaryReader<'_, '_> {
    fn position(&self) -> usize {
        self.total - self.input.remaining()
    }

    fn need(&self, n: usize) -> Result<()> {
        if self.input.remaining() < n {
            return Err(BindingError::UnexpectedEof);
        }
        Ok(())
    }

    fn get_string(&mut self, byte_length: Option<usize>) -> Result<String> {
        let position = self.position();
        let len = match byte_length {
            Some(n) => n,
            None => {
                self.need(4)?;
                get_ordered!(self.input, self.order, get_u32, get_u32_le) as usize
            }
        };
        self.need(len)?;
        let raw = &self.input[..len];
        let raw = match byte_length {
            Some(_) => raw.split(|b| *b == 0).next().unwrap_or_default(),
            None => raw,
        };
        let s = std::str::from_utf8(raw)
            .map_err(|_| BindingError::parse(position, "string is not valid UTF-8"))?
            .to_string();
        self.input.advance(len);
        Ok(s)
    }
}

impl BlockSource for BinaryReader<'_, '_> {
    type Error = BindingError;

    fn begin_array(&mut self, _component: &DataComponent, known: Option<usize>) -> Result<usize> {
        let size = match known {
            Some(n) => n,
            None => {
                self.need(4)?;
                get_ordered!(self.input, self.order, get_u32, get_u32_le) as usize
            }
        };
        check_array_size(size, self.max_array_size)?;
        Ok(size)
    }

    fn begin_choice(&mut self, component: &DataComponent, choice: &DataChoice) -> Result<usize> {
        let position = self.position();
        self.need(1)?;
        let index = self.input.get_u8() as usize;
        if index >= choice.items.len() {
            return Err(BindingError::parse(
                position,
                format!(
                    "choice '{}' has {} items, found selector {}",
                    component.name,
                    choice.items.len(),
                    index
                ),
            ));
        }
        Ok(index)
    }

    fn read_scalar(&mut self, component: &DataComponent, scalar: &Scalar) -> Result<ScalarValue> {
        let position = self.position();
        let (data_type, byte_length) = self.members.wire_format(component, scalar);
        if let Some(size) = data_type.byte_size() {
            self.need(size)?;
        }

        let order = self.order;
        let input = &mut self.input;
        let raw = match data_type {
            DataType::Boolean => ScalarValue::Boolean(input.get_u8() != 0),
            DataType::Byte => ScalarValue::Byte(input.get_i8()),
            DataType::UByte => ScalarValue::UByte(input.get_u8()),
            DataType::Short => ScalarValue::Short(get_ordered!(input, order, get_i16, get_i16_le)),
            DataType::UShort => ScalarValue::UShort(get_ordered!(input, order, get_u16, get_u16_le)),
            DataType::Int => ScalarValue::Int(get_ordered!(input, order, get_i32, get_i32_le)),
            DataType::UInt => ScalarValue::UInt(get_ordered!(input, order, get_u32, get_u32_le)),
            DataType::Long => ScalarValue::Long(get_ordered!(input, order, get_i64, get_i64_le)),
            DataType::Float => ScalarValue::Float(get_ordered!(input, order, get_f32, get_f32_le)),
            DataType::Double => ScalarValue::Double(get_ordered!(input, order, get_f64, get_f64_le)),
            DataType::Utf8String => {
                let s = self.get_string(byte_length)?;
                let iso = scalar.is_iso_time() && scalar.data_type.is_numeric();
                match parse_iso(&s).filter(|_| iso) {
                    Some(t) => ScalarValue::Double(t),
                    None => ScalarValue::Text(s),
                }
            }
        };

        raw.convert(scalar.data_type).map_err(|e| BindingError::parse(position, e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use swe_common::{DataHolder, DataPath, SweBuilder};

    fn codec(encoding: BinaryEncoding) -> BinaryCodec {
        BinaryCodec::new(encoding, &CodecConfig::default())
    }

    fn sample() -> DataComponent {
        SweBuilder::record("s")
            .field(SweBuilder::count("id").with_data_type(DataType::UShort))
            .field(SweBuilder::quantity("v", "m"))
            .build()
            .unwrap()
    }

    fn sample_block(id: u16, v: f64) -> DataBlock {
        let mut holder = DataHolder::new(sample()).unwrap();
        holder.set_value(&DataPath::parse("id").unwrap(), id).unwrap();
        holder.set_value(&DataPath::parse("v").unwrap(), v).unwrap();
        holder.into_parts().1
    }

    #[test]
    fn test_byte_order() {
        let block = sample_block(0x0102, 1.0);
        let big = codec(BinaryEncoding::new(ByteOrder::BigEndian))
            .write_block(&sample(), &block)
            .unwrap();
        assert_eq!(&big[..2], &[0x01, 0x02]);
        assert_eq!(&big[2..], &1.0f64.to_be_bytes());

        let little = codec(BinaryEncoding::new(ByteOrder::LittleEndian))
            .write_block(&sample(), &block)
            .unwrap();
        assert_eq!(&little[..2], &[0x02, 0x01]);
        assert_eq!(&little[2..], &1.0f64.to_le_bytes());
    }

    #[test]
    fn test_member_overrides_wire_type() {
        let encoding = BinaryEncoding::new(ByteOrder::LittleEndian)
            .with_member(BinaryMember::new("v", DataType::Float));
        let c = codec(encoding);
        let root = sample();
        let blocks = vec![sample_block(1, 2.5), sample_block(2, -0.5)];

        let bytes = c.write_blocks(&root, &blocks).unwrap();
        assert_eq!(bytes.len(), 2 * (2 + 4));

        let back = c.read_blocks(&root, &bytes).unwrap();
        assert_eq!(back, blocks);
    }

    #[test]
    fn test_strings_prefixed_and_fixed() {
        let root = SweBuilder::record("r")
            .field(SweBuilder::text("a"))
            .field(SweBuilder::text("b"))
            .build()
            .unwrap();
        let mut holder = DataHolder::new(root.clone()).unwrap();
        holder.set_value(&DataPath::parse("a").unwrap(), "hi").unwrap();
        holder.set_value(&DataPath::parse("b").unwrap(), "xyz").unwrap();

        let encoding = BinaryEncoding::new(ByteOrder::BigEndian).with_member(BinaryMember {
            reference: "b".to_string(),
            data_type: None,
            byte_length: Some(5),
        });
        let c = codec(encoding);
        let bytes = c.write_block(&root, holder.data()).unwrap();
        assert_eq!(&bytes[..], b"\x00\x00\x00\x02hixyz\x00\x00");

        let back = c.read_block(&root, &bytes).unwrap();
        assert_eq!(back.get_string(1).unwrap(), "xyz");
    }

    #[test]
    fn test_choice_and_implicit_array() {
        let root = SweBuilder::choice("c")
            .item(SweBuilder::boolean("flag"))
            .item(SweBuilder::implicit_array("vals", SweBuilder::count("v").with_data_type(DataType::UByte)))
            .build()
            .unwrap();
        let c = codec(BinaryEncoding::default());
        let input = [1u8, 0, 0, 0, 3, 7, 8, 9, 0, 1];
        let blocks = c.read_blocks(&root, &input).unwrap();
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].atom_count(), 4);
        assert_eq!(blocks[0].get_long(3).unwrap(), 9);
        assert!(blocks[1].get_boolean(1).unwrap());

        let bytes = c.write_blocks(&root, &blocks).unwrap();
        assert_eq!(&bytes[..], &input);
    }

    #[test]
    fn test_bad_choice_selector() {
        let root = SweBuilder::choice("c")
            .item(SweBuilder::boolean("flag"))
            .build()
            .unwrap();
        assert!(matches!(
            codec(BinaryEncoding::default()).read_blocks(&root, &[5, 1]),
            Err(BindingError::Parse { position: 0, .. })
        ));
    }

    #[test]
    fn test_truncated_input() {
        assert!(matches!(
            codec(BinaryEncoding::default()).read_blocks(&sample(), &[0, 1, 0, 0]),
            Err(BindingError::UnexpectedEof)
        ));
    }

    #[test]
    fn test_implicit_size_limit() {
        let root = SweBuilder::implicit_array("vals", SweBuilder::boolean("b"))
            .build()
            .unwrap();
        let config = CodecConfig {
            max_array_size: 2,
            ..CodecConfig::default()
        };
        let c = BinaryCodec::new(BinaryEncoding::default(), &config);
        assert!(matches!(
            c.read_blocks(&root, &[0, 0, 0, 3, 1, 1, 1]),
            Err(BindingError::SizeLimitExceeded { size: 3, limit: 2 })
        ));
    }

    #[test]
    fn test_iso_time_as_string_member() {
        let root = SweBuilder::record("r")
            .field(SweBuilder::time_iso("t"))
            .build()
            .unwrap();
        let mut holder = DataHolder::new(root.clone()).unwrap();
        holder.set_value(&DataPath::parse("t").unwrap(), 0.0).unwrap();

        let c = codec(BinaryEncoding::default().with_member(BinaryMember::new("t", DataType::Utf8String)));
        let bytes = c.write_block(&root, holder.data()).unwrap();
        assert_eq!(&bytes[4..], b"1970-01-01T00:00:00Z");
        assert_eq!(c.read_block(&root, &bytes).unwrap(), *holder.data());
    }
}
