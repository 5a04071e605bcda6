//! JSON data codec.
//!
//! A stream is a JSON array with one value per block. Records map to
//! objects keyed by field name (or to arrays when `records_as_arrays` is
//! set), arrays to JSON arrays, and a choice to an object with the selected
//! item's name as its single key.

use bytes::Bytes;
use serde_json::{Map, Value};
use tracing::debug;

use swe_common::data::{read_block, visit_block, BlockSource, BlockVisitor};
use swe_common::{DataBlock, DataChoice, DataComponent, DataEncoding, JsonEncoding, Scalar, ScalarValue};

use crate::config::CodecConfig;
use crate::data::{check_array_size, DataCodec, DataReader, DataWriter};
use crate::error::{BindingError, Result};
use crate::schema::json::{scalar_value_from_json, scalar_value_to_json};

/// Codec for [`JsonEncoding`].
#[derive(Debug, Clone)]
pub struct JsonCodec {
    encoding: JsonEncoding,
    pretty: bool,
    max_array_size: usize,
}

impl JsonCodec {
    pub fn new(encoding: JsonEncoding, config: &CodecConfig) -> Self {
        Self {
            encoding,
            pretty: config.pretty_json,
            max_array_size: config.max_array_size,
        }
    }

    /// Encode blocks as JSON values, without serializing them.
    pub fn to_values(&self, component: &DataComponent, blocks: &[DataBlock]) -> Result<Vec<Value>> {
        blocks
            .iter()
            .map(|block| {
                let mut writer = ValueWriter {
                    records_as_arrays: self.encoding.records_as_arrays,
                    stack: Vec::new(),
                    root: None,
                };
                visit_block(component, block, &mut writer)?;
                writer.root.ok_or_else(|| {
                    BindingError::Model(swe_common::SweError::structure_mismatch(format!(
                        "block for '{}' produced no value",
                        component.name
                    )))
                })
            })
            .collect()
    }

    /// Decode blocks from already-parsed JSON.
    ///
    /// A top-level array is a list of blocks; any other value is a single
    /// block.
    pub fn read_value(&self, component: &DataComponent, value: &Value) -> Result<Vec<DataBlock>> {
        let values = match value {
            Value::Array(items) => items.as_slice(),
            single => std::slice::from_ref(single),
        };

        values
            .iter()
            .enumerate()
            .map(|(index, v)| {
                let mut source = JsonSource {
                    stack: vec![Cursor::Single(Some(v))],
                    block: index,
                    max_array_size: self.max_array_size,
                };
                read_block(component, &mut source)
            })
            .collect()
    }
}

impl DataWriter for JsonCodec {
    fn write_blocks(&self, component: &DataComponent, blocks: &[DataBlock]) -> Result<Bytes> {
        let values = Value::Array(self.to_values(component, blocks)?);
        let out = if self.pretty {
            serde_json::to_vec_pretty(&values)?
        } else {
            serde_json::to_vec(&values)?
        };
        debug!(codec = "json", blocks = blocks.len(), bytes = out.len(), "Encoded data blocks");
        Ok(Bytes::from(out))
    }
}

impl DataReader for JsonCodec {
    fn read_blocks(&self, component: &DataComponent, input: &[u8]) -> Result<Vec<DataBlock>> {
        let value: Value = serde_json::from_slice(input)?;
        let blocks = self.read_value(component, &value)?;
        debug!(codec = "json", blocks = blocks.len(), bytes = input.len(), "Decoded data blocks");
        Ok(blocks)
    }
}

impl DataCodec for JsonCodec {
    fn encoding(&self) -> DataEncoding {
        DataEncoding::Json(self.encoding.clone())
    }
}

// =============================================================================
// Writing
// =============================================================================

enum Frame {
    Record(Vec<(String, Value)>),
    Array(Vec<Value>),
    Choice { item: String, value: Option<Value> },
}

struct ValueWriter {
    records_as_arrays: bool,
    stack: Vec<Frame>,
    root: Option<Value>,
}

impl ValueWriter {
    /// Hand a finished value to the enclosing container.
    fn emit(&mut self, name: &str, value: Value) {
        match self.stack.last_mut() {
            Some(Frame::Record(fields)) => fields.push((name.to_string(), value)),
            Some(Frame::Array(items)) => items.push(value),
            Some(Frame::Choice { value: slot, .. }) => *slot = Some(value),
            None => self.root = Some(value),
        }
    }

    fn pop(&mut self, component: &DataComponent) -> Result<Frame> {
        self.stack.pop().ok_or_else(|| unbalanced(component))
    }
}

impl BlockVisitor for ValueWriter {
    type Error = BindingError;

    fn begin_record(&mut self, _component: &DataComponent) -> Result<()> {
        self.stack.push(Frame::Record(Vec::new()));
        Ok(())
    }

    fn end_record(&mut self, component: &DataComponent) -> Result<()> {
        let value = match self.pop(component)? {
            Frame::Record(fields) if self.records_as_arrays => {
                Value::Array(fields.into_iter().map(|(_, v)| v).collect())
            }
            Frame::Record(fields) => Value::Object(fields.into_iter().collect::<Map<_, _>>()),
            _ => return Err(unbalanced(component)),
        };
        self.emit(&component.name, value);
        Ok(())
    }

    fn begin_array(&mut self, _component: &DataComponent, len: usize) -> Result<()> {
        self.stack.push(Frame::Array(Vec::with_capacity(len)));
        Ok(())
    }

    fn end_array(&mut self, component: &DataComponent) -> Result<()> {
        let value = match self.pop(component)? {
            Frame::Array(items) => Value::Array(items),
            _ => return Err(unbalanced(component)),
        };
        self.emit(&component.name, value);
        Ok(())
    }

    fn begin_choice(&mut self, component: &DataComponent, index: usize) -> Result<()> {
        let item = component
            .component(index)
            .ok_or(swe_common::SweError::IndexOutOfRange {
                index,
                len: component.component_count(),
            })?;
        self.stack.push(Frame::Choice {
            item: item.name.clone(),
            value: None,
        });
        Ok(())
    }

    fn end_choice(&mut self, component: &DataComponent) -> Result<()> {
        let value = match self.pop(component)? {
            Frame::Choice { item, value } => {
                let mut map = Map::new();
                map.insert(item, value.unwrap_or(Value::Null));
                Value::Object(map)
            }
            _ => return Err(unbalanced(component)),
        };
        self.emit(&component.name, value);
        Ok(())
    }

    fn scalar(&mut self, component: &DataComponent, scalar: &Scalar, value: ScalarValue) -> Result<()> {
        let value = scalar_value_to_json(scalar, &value);
        self.emit(&component.name, value);
        Ok(())
    }
}

fn unbalanced(component: &DataComponent) -> BindingError {
    BindingError::Model(swe_common::SweError::structure_mismatch(format!(
        "unbalanced end of '{}'",
        component.name
    )))
}

// =============================================================================
// Reading
// =============================================================================

enum Cursor<'a> {
    /// Fields looked up by component name.
    Object(&'a Map<String, Value>),
    /// Record fields or array elements taken in order.
    Sequence(std::slice::Iter<'a, Value>),
    /// A lone value: a whole block or a choice payload.
    Single(Option<&'a Value>),
}

struct JsonSource<'a> {
    stack: Vec<Cursor<'a>>,
    block: usize,
    max_array_size: usize,
}

impl<'a> JsonSource<'a> {
    fn error(&self, message: impl Into<String>) -> BindingError {
        BindingError::parse(self.block, message)
    }

    fn next_value(&mut self, component: &DataComponent) -> Result<&'a Value> {
        let value = match self.stack.last_mut() {
            Some(Cursor::Object(map)) => (*map).get(&component.name),
            Some(Cursor::Sequence(iter)) => iter.next(),
            Some(Cursor::Single(slot)) => slot.take(),
            None => None,
        };
        value.ok_or_else(|| self.error(format!("missing value for '{}'", component.name)))
    }

    fn pop(&mut self) {
        self.stack.pop();
    }
}

impl<'a> BlockSource for JsonSource<'a> {
    type Error = BindingError;

    fn begin_record(&mut self, component: &DataComponent) -> Result<()> {
        let cursor = match self.next_value(component)? {
            Value::Object(map) => Cursor::Object(map),
            Value::Array(items) => Cursor::Sequence(items.iter()),
            other => {
                return Err(self.error(format!(
                    "expected an object for '{}', found {}",
                    component.name, other
                )))
            }
        };
        self.stack.push(cursor);
        Ok(())
    }

    fn end_record(&mut self, _component: &DataComponent) -> Result<()> {
        self.pop();
        Ok(())
    }

    fn begin_array(&mut self, component: &DataComponent, known: Option<usize>) -> Result<usize> {
        let items = match self.next_value(component)? {
            Value::Array(items) => items,
            other => {
                return Err(self.error(format!(
                    "expected an array for '{}', found {}",
                    component.name, other
                )))
            }
        };
        if let Some(n) = known {
            if n != items.len() {
                return Err(self.error(format!(
                    "array '{}' should have {} elements, found {}",
                    component.name,
                    n,
                    items.len()
                )));
            }
        }
        check_array_size(items.len(), self.max_array_size)?;
        self.stack.push(Cursor::Sequence(items.iter()));
        Ok(items.len())
    }

    fn end_array(&mut self, _component: &DataComponent) -> Result<()> {
        self.pop();
        Ok(())
    }

    fn begin_choice(&mut self, component: &DataComponent, choice: &DataChoice) -> Result<usize> {
        let (item, payload) = match self.next_value(component)? {
            Value::Object(map) if map.len() == 1 => match map.iter().next() {
                Some(entry) => entry,
                None => return Err(self.error("empty choice object")),
            },
            other => {
                return Err(self.error(format!(
                    "expected a single-key object for choice '{}', found {}",
                    component.name, other
                )))
            }
        };
        let index = choice.item_index(item).ok_or_else(|| {
            self.error(format!("'{}' is not an item of choice '{}'", item, component.name))
        })?;
        self.stack.push(Cursor::Single(Some(payload)));
        Ok(index)
    }

    fn end_choice(&mut self, _component: &DataComponent) -> Result<()> {
        self.pop();
        Ok(())
    }

    fn read_scalar(&mut self, component: &DataComponent, scalar: &Scalar) -> Result<ScalarValue> {
        let value = self.next_value(component)?;
        scalar_value_from_json(scalar, value)
            .map_err(|e| self.error(format!("field '{}': {}", component.name, e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use swe_common::{DataHolder, DataPath, SweBuilder};

    fn codec(records_as_arrays: bool) -> JsonCodec {
        JsonCodec::new(JsonEncoding { records_as_arrays }, &CodecConfig::default())
    }

    fn station() -> DataComponent {
        SweBuilder::record("station")
            .field(SweBuilder::time_iso("time"))
            .field(SweBuilder::quantity("temp", "Cel"))
            .field(SweBuilder::count("n"))
            .field(SweBuilder::variable_array("levels", "n", SweBuilder::quantity("z", "m")))
            .build()
            .unwrap()
    }

    #[test]
    fn test_write_record_as_object() {
        let mut holder = DataHolder::new(station()).unwrap();
        holder.update_size(&DataPath::parse("levels").unwrap(), 2).unwrap();
        holder.set_value(&DataPath::parse("temp").unwrap(), 21.5).unwrap();
        holder.set_value(&DataPath::parse("levels[1]").unwrap(), 100.0).unwrap();

        let values = codec(false).to_values(holder.root(), std::slice::from_ref(holder.data())).unwrap();
        assert_eq!(
            values[0],
            json!({
                "time": "1970-01-01T00:00:00Z",
                "temp": 21.5,
                "n": 2,
                "levels": [0.0, 100.0]
            })
        );
    }

    #[test]
    fn test_records_as_arrays() {
        let root = station();
        let c = codec(true);
        let blocks = c
            .read_blocks(&root, br#"[["2024-01-15T12:00:00Z", 3.5, 1, [12.0]]]"#)
            .unwrap();
        assert_eq!(blocks[0].get_double(0).unwrap(), 1_705_320_000.0);
        assert_eq!(blocks[0].get_double(3).unwrap(), 12.0);

        let out = c.write_blocks(&root, &blocks).unwrap();
        let value: Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(value, json!([["2024-01-15T12:00:00Z", 3.5, 1, [12.0]]]));
    }

    #[test]
    fn test_read_single_block_and_list() {
        let root = station();
        let one = br#"{"time": 0, "temp": 1.0, "n": 0, "levels": []}"#;
        assert_eq!(codec(false).read_blocks(&root, one).unwrap().len(), 1);

        let two = br#"[
            {"time": 0, "temp": 1.0, "n": 0, "levels": []},
            {"time": 60, "temp": null, "n": 1, "levels": [5]}
        ]"#;
        let blocks = codec(false).read_blocks(&root, two).unwrap();
        assert_eq!(blocks.len(), 2);
        assert!(blocks[1].get_double(1).unwrap().is_nan());
        assert_eq!(blocks[1].get_double(3).unwrap(), 5.0);
    }

    #[test]
    fn test_count_mismatch_reports_block() {
        let root = station();
        let input = br#"[
            {"time": 0, "temp": 1.0, "n": 0, "levels": []},
            {"time": 0, "temp": 1.0, "n": 3, "levels": [1, 2]}
        ]"#;
        match codec(false).read_blocks(&root, input) {
            Err(BindingError::Parse { position, message }) => {
                assert_eq!(position, 1);
                assert!(message.contains("levels"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_missing_field_and_bad_value() {
        let root = station();
        assert!(matches!(
            codec(false).read_blocks(&root, br#"{"time": 0, "n": 0, "levels": []}"#),
            Err(BindingError::Parse { .. })
        ));
        assert!(matches!(
            codec(false).read_blocks(&root, br#"{"time": 0, "temp": "warm", "n": 0, "levels": []}"#),
            Err(BindingError::Parse { .. })
        ));
        assert!(matches!(
            codec(false).read_blocks(&root, b"{not json"),
            Err(BindingError::Json(_))
        ));
    }

    #[test]
    fn test_choice_round_trip() {
        let root = SweBuilder::record("msg")
            .field(
                SweBuilder::choice("body")
                    .item(SweBuilder::quantity("temp", "Cel"))
                    .item(SweBuilder::implicit_array("tags", SweBuilder::text("tag"))),
            )
            .build()
            .unwrap();
        let c = codec(false);
        let input = br#"[{"body": {"temp": 21.5}}, {"body": {"tags": ["a", "b"]}}]"#;
        let blocks = c.read_blocks(&root, input).unwrap();
        assert_eq!(blocks[0].get_double(1).unwrap(), 21.5);
        assert_eq!(blocks[1].get_string(2).unwrap(), "b");

        let out = c.write_blocks(&root, &blocks).unwrap();
        let value: Value = serde_json::from_slice(&out).unwrap();
        let expected: Value = serde_json::from_slice(input).unwrap();
        assert_eq!(value, expected);

        assert!(c.read_blocks(&root, br#"{"body": {"wind": 3}}"#).is_err());
        assert!(c.read_blocks(&root, br#"{"body": {"temp": 1, "tags": []}}"#).is_err());
    }

    #[test]
    fn test_size_limit() {
        let root = SweBuilder::implicit_array("xs", SweBuilder::count("x")).build().unwrap();
        let config = CodecConfig {
            max_array_size: 2,
            ..CodecConfig::default()
        };
        let c = JsonCodec::new(JsonEncoding::default(), &config);
        assert!(c.read_blocks(&root, b"[[1, 2]]").is_ok());
        assert!(matches!(
            c.read_blocks(&root, b"[[1, 2, 3]]"),
            Err(BindingError::SizeLimitExceeded { size: 3, limit: 2 })
        ));
    }

    #[test]
    fn test_pretty_output() {
        let root = SweBuilder::quantity("v", "m").build().unwrap();
        let config = CodecConfig {
            pretty_json: true,
            ..CodecConfig::default()
        };
        let c = JsonCodec::new(JsonEncoding::default(), &config);
        let blocks = c.read_blocks(&root, b"[1.5, 2.5]").unwrap();
        let out = c.write_blocks(&root, &blocks).unwrap();
        assert_eq!(std::str::from_utf8(&out).unwrap(), "[\n  1.5,\n  2.5\n]");
    }
}
