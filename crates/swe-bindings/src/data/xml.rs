//! XML data codec.
//!
//! Blocks are wrapped in a `values` element. Each block is an element named
//! after the root component, each field a child element named after the
//! field, and each array element a child named after the element type. A
//! choice element holds one child named after the selected item.

use bytes::Bytes;
use tracing::debug;

use swe_common::data::{read_block, visit_block, BlockSource, BlockVisitor};
use swe_common::{DataBlock, DataChoice, DataComponent, DataEncoding, Scalar, ScalarValue, SweError, XmlEncoding};

use crate::config::CodecConfig;
use crate::data::{check_array_size, scalar_from_text, scalar_to_text, DataCodec, DataReader, DataWriter};
use crate::error::{BindingError, Result};
use crate::xml::XmlElement;

const WRAPPER: &str = "values";

/// Codec for [`XmlEncoding`].
#[derive(Debug, Clone)]
pub struct XmlCodec {
    encoding: XmlEncoding,
    max_array_size: usize,
}

impl XmlCodec {
    pub fn new(encoding: XmlEncoding, config: &CodecConfig) -> Self {
        Self {
            encoding,
            max_array_size: config.max_array_size,
        }
    }
}

/// Element name for a component; unnamed components fall back to `default`.
fn tag<'a>(component: &'a DataComponent, default: &'a str) -> &'a str {
    if component.name.is_empty() {
        default
    } else {
        &component.name
    }
}

impl DataWriter for XmlCodec {
    fn write_blocks(&self, component: &DataComponent, blocks: &[DataBlock]) -> Result<Bytes> {
        let mut root = XmlElement::new(WRAPPER)
            .with_opt_attr("xmlns", self.encoding.namespace.as_deref());
        for block in blocks {
            let mut writer = ElementWriter {
                stack: Vec::new(),
                root: None,
            };
            visit_block(component, block, &mut writer)?;
            let element = writer.root.ok_or_else(|| {
                SweError::structure_mismatch(format!("block for '{}' produced no element", component.name))
            })?;
            root.push(element);
        }

        let out = root.to_xml(false)?;
        debug!(codec = "xml", blocks = blocks.len(), bytes = out.len(), "Encoded data blocks");
        Ok(Bytes::from(out))
    }
}

impl DataReader for XmlCodec {
    fn read_blocks(&self, component: &DataComponent, input: &[u8]) -> Result<Vec<DataBlock>> {
        let text = std::str::from_utf8(input)
            .map_err(|e| BindingError::parse(e.valid_up_to(), "input is not valid UTF-8"))?;
        let document = XmlElement::parse(text)?;
        if document.local_name() != WRAPPER {
            return Err(BindingError::parse(
                0,
                format!("expected <{}>, found <{}>", WRAPPER, document.name),
            ));
        }

        let blocks = document
            .children
            .iter()
            .enumerate()
            .map(|(index, element)| {
                let mut source = ElementSource {
                    stack: vec![Cursor::Single(Some(element))],
                    block: index,
                    max_array_size: self.max_array_size,
                };
                read_block(component, &mut source)
            })
            .collect::<Result<Vec<_>>>()?;
        debug!(codec = "xml", blocks = blocks.len(), bytes = input.len(), "Decoded data blocks");
        Ok(blocks)
    }
}

impl DataCodec for XmlCodec {
    fn encoding(&self) -> DataEncoding {
        DataEncoding::Xml(self.encoding.clone())
    }
}

// =============================================================================
// Writing
// =============================================================================

struct ElementWriter {
    stack: Vec<XmlElement>,
    root: Option<XmlElement>,
}

impl ElementWriter {
    fn open(&mut self, component: &DataComponent) {
        self.stack.push(XmlElement::new(tag(component, "block")));
    }

    fn close(&mut self, component: &DataComponent) -> Result<()> {
        let element = self.stack.pop().ok_or_else(|| {
            SweError::structure_mismatch(format!("unbalanced end of '{}'", component.name))
        })?;
        self.emit(element);
        Ok(())
    }

    fn emit(&mut self, element: XmlElement) {
        match self.stack.last_mut() {
            Some(parent) => parent.push(element),
            None => self.root = Some(element),
        }
    }
}

impl BlockVisitor for ElementWriter {
    type Error = BindingError;

    fn begin_record(&mut self, component: &DataComponent) -> Result<()> {
        self.open(component);
        Ok(())
    }

    fn end_record(&mut self, component: &DataComponent) -> Result<()> {
        self.close(component)
    }

    fn begin_array(&mut self, component: &DataComponent, _len: usize) -> Result<()> {
        self.open(component);
        Ok(())
    }

    fn end_array(&mut self, component: &DataComponent) -> Result<()> {
        self.close(component)
    }

    fn begin_choice(&mut self, component: &DataComponent, _index: usize) -> Result<()> {
        self.open(component);
        Ok(())
    }

    fn end_choice(&mut self, component: &DataComponent) -> Result<()> {
        self.close(component)
    }

    fn scalar(&mut self, component: &DataComponent, scalar: &Scalar, value: ScalarValue) -> Result<()> {
        let element = XmlElement::new(tag(component, "value")).with_text(scalar_to_text(scalar, &value));
        self.emit(element);
        Ok(())
    }
}

// =============================================================================
// Reading
// =============================================================================

enum Cursor<'a> {
    /// Fields looked up by element name.
    Fields(&'a XmlElement),
    /// Array elements taken in order.
    Sequence(std::slice::Iter<'a, XmlElement>),
    /// A whole block or a choice payload.
    Single(Option<&'a XmlElement>),
}

struct ElementSource<'a> {
    stack: Vec<Cursor<'a>>,
    block: usize,
    max_array_size: usize,
}

impl<'a> ElementSource<'a> {
    fn error(&self, message: impl Into<String>) -> BindingError {
        BindingError::parse(self.block, message)
    }

    fn next_element(&mut self, component: &DataComponent) -> Result<&'a XmlElement> {
        let element = match self.stack.last_mut() {
            Some(Cursor::Fields(parent)) => (*parent).child(tag(component, "value")),
            Some(Cursor::Sequence(iter)) => iter.next(),
            Some(Cursor::Single(slot)) => slot.take(),
            None => None,
        };
        element.ok_or_else(|| self.error(format!("missing element for '{}'", component.name)))
    }
}

impl<'a> BlockSource for ElementSource<'a> {
    type Error = BindingError;

    fn begin_record(&mut self, component: &DataComponent) -> Result<()> {
        let element = self.next_element(component)?;
        self.stack.push(Cursor::Fields(element));
        Ok(())
    }

    fn end_record(&mut self, _component: &DataComponent) -> Result<()> {
        self.stack.pop();
        Ok(())
    }

    fn begin_array(&mut self, component: &DataComponent, known: Option<usize>) -> Result<usize> {
        let element = self.next_element(component)?;
        let len = element.children.len();
        if let Some(n) = known {
            if n != len {
                return Err(self.error(format!(
                    "array '{}' should have {} elements, found {}",
                    component.name, n, len
                )));
            }
        }
        check_array_size(len, self.max_array_size)?;
        self.stack.push(Cursor::Sequence(element.children.iter()));
        Ok(len)
    }

    fn end_array(&mut self, _component: &DataComponent) -> Result<()> {
        self.stack.pop();
        Ok(())
    }

    fn begin_choice(&mut self, component: &DataComponent, choice: &DataChoice) -> Result<usize> {
        let element = self.next_element(component)?;
        let selected = match element.children.as_slice() {
            [only] => only,
            children => {
                return Err(self.error(format!(
                    "choice '{}' should hold one element, found {}",
                    component.name,
                    children.len()
                )))
            }
        };
        let index = choice.item_index(selected.local_name()).ok_or_else(|| {
            self.error(format!(
                "'{}' is not an item of choice '{}'",
                selected.local_name(),
                component.name
            ))
        })?;
        self.stack.push(Cursor::Single(Some(selected)));
        Ok(index)
    }

    fn end_choice(&mut self, _component: &DataComponent) -> Result<()> {
        self.stack.pop();
        Ok(())
    }

    fn read_scalar(&mut self, component: &DataComponent, scalar: &Scalar) -> Result<ScalarValue> {
        let element = self.next_element(component)?;
        scalar_from_text(scalar, element.text.trim(), self.block)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use swe_common::SweBuilder;

    fn codec() -> XmlCodec {
        XmlCodec::new(XmlEncoding::default(), &CodecConfig::default())
    }

    fn track() -> DataComponent {
        SweBuilder::record("track")
            .field(SweBuilder::time_iso("time"))
            .field(SweBuilder::count("n"))
            .field(SweBuilder::variable_array(
                "points",
                "n",
                SweBuilder::record("pt")
                    .field(SweBuilder::quantity("x", "m"))
                    .field(SweBuilder::quantity("y", "m")),
            ))
            .build()
            .unwrap()
    }

    const TRACK_XML: &str = "<values>\
        <track><time>2024-01-15T12:00:00Z</time><n>2</n>\
        <points><pt><x>1</x><y>2</y></pt><pt><x>3</x><y>4.5</y></pt></points>\
        </track></values>";

    #[test]
    fn test_read_nested_record() {
        let blocks = codec().read_blocks(&track(), TRACK_XML.as_bytes()).unwrap();
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].get_double(0).unwrap(), 1_705_320_000.0);
        assert_eq!(blocks[0].get_long(1).unwrap(), 2);
        assert_eq!(blocks[0].get_double(5).unwrap(), 4.5);
    }

    #[test]
    fn test_round_trip_with_namespace() {
        let encoding = XmlEncoding {
            namespace: Some("http://example.org/obs".to_string()),
        };
        let c = XmlCodec::new(encoding, &CodecConfig::default());
        let root = track();
        let blocks = codec().read_blocks(&root, TRACK_XML.as_bytes()).unwrap();

        let out = c.write_blocks(&root, &blocks).unwrap();
        let text = std::str::from_utf8(&out).unwrap();
        assert!(text.contains(r#"<values xmlns="http://example.org/obs">"#));
        assert!(text.contains("<time>2024-01-15T12:00:00Z</time>"));
        assert!(text.contains("<y>4.5</y>"));

        let again = c.read_blocks(&root, &out).unwrap();
        assert_eq!(again, blocks);
    }

    #[test]
    fn test_count_mismatch() {
        let input = "<values><track><time>0</time><n>3</n>\
            <points><pt><x>1</x><y>2</y></pt></points></track></values>";
        match codec().read_blocks(&track(), input.as_bytes()) {
            Err(BindingError::Parse { position, message }) => {
                assert_eq!(position, 0);
                assert!(message.contains("points"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_missing_field_and_wrong_wrapper() {
        let input = "<values><track><n>0</n><points/></track></values>";
        assert!(matches!(
            codec().read_blocks(&track(), input.as_bytes()),
            Err(BindingError::Parse { .. })
        ));
        assert!(matches!(
            codec().read_blocks(&track(), b"<blocks/>"),
            Err(BindingError::Parse { .. })
        ));
    }

    #[test]
    fn test_choice() {
        let root = SweBuilder::record("msg")
            .field(
                SweBuilder::choice("body")
                    .item(SweBuilder::quantity("temp", "Cel"))
                    .item(SweBuilder::implicit_array("tags", SweBuilder::text("tag"))),
            )
            .build()
            .unwrap();
        let input = "<values>\
            <msg><body><temp>21.5</temp></body></msg>\
            <msg><body><tags><tag>a</tag><tag>b</tag></tags></body></msg>\
            </values>";
        let blocks = codec().read_blocks(&root, input.as_bytes()).unwrap();
        assert_eq!(blocks[0].get_double(1).unwrap(), 21.5);
        assert_eq!(blocks[1].get_string(2).unwrap(), "b");

        let out = codec().write_blocks(&root, &blocks).unwrap();
        assert!(std::str::from_utf8(&out).unwrap().contains("<body><tags><tag>a</tag>"));

        let bad = "<values><msg><body><wind>1</wind></body></msg></values>";
        assert!(codec().read_blocks(&root, bad.as_bytes()).is_err());
    }

    #[test]
    fn test_size_limit() {
        let root = SweBuilder::implicit_array("xs", SweBuilder::count("x")).build().unwrap();
        let config = CodecConfig {
            max_array_size: 1,
            ..CodecConfig::default()
        };
        let c = XmlCodec::new(XmlEncoding::default(), &config);
        assert!(matches!(
            c.read_blocks(&root, b"<values><xs><x>1</x><x>2</x></xs></values>"),
            Err(BindingError::SizeLimitExceeded { size: 2, limit: 1 })
        ));
    }
}
