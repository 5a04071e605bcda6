//! Data codecs: encode and decode data blocks in the four SWE encodings.
//!
//! Writers walk blocks with [`swe_common::data::visit_block`]. Readers feed
//! [`swe_common::data::read_block`], which tracks the Count values read so
//! far, so variable-size arrays and choices come out with the shape the
//! stream describes.

mod binary;
mod json;
mod text;
mod xml;

pub use binary::BinaryCodec;
pub use json::JsonCodec;
pub use text::TextCodec;
pub use xml::XmlCodec;

use bytes::Bytes;

use swe_common::{ByteEncoding, DataBlock, DataComponent, DataEncoding, Scalar, ScalarValue};

use crate::config::CodecConfig;
use crate::error::{BindingError, Result};
use crate::time::{format_iso, parse_iso};

/// Encodes data blocks.
pub trait DataWriter {
    /// Encode a sequence of blocks, each described by `component`.
    fn write_blocks(&self, component: &DataComponent, blocks: &[DataBlock]) -> Result<Bytes>;

    /// Encode a single block.
    fn write_block(&self, component: &DataComponent, block: &DataBlock) -> Result<Bytes> {
        self.write_blocks(component, std::slice::from_ref(block))
    }
}

/// Decodes data blocks.
pub trait DataReader {
    /// Decode every block in `input`.
    ///
    /// # Arguments
    /// * `component` - Structure of each block
    /// * `input` - Encoded stream
    ///
    /// # Returns
    /// * One block per record in the stream, shaped by the counts and choice
    ///   selections it carries
    fn read_blocks(&self, component: &DataComponent, input: &[u8]) -> Result<Vec<DataBlock>>;

    /// Decode a stream holding exactly one block.
    fn read_block(&self, component: &DataComponent, input: &[u8]) -> Result<DataBlock> {
        let mut blocks = self.read_blocks(component, input)?;
        match blocks.len() {
            1 => blocks.pop().ok_or(BindingError::UnexpectedEof),
            0 => Err(BindingError::UnexpectedEof),
            n => Err(BindingError::parse(
                input.len(),
                format!("expected one block, found {}", n),
            )),
        }
    }
}

/// A reader and writer for one encoding.
pub trait DataCodec: DataReader + DataWriter + Send + Sync {
    /// Encoding descriptor this codec implements.
    fn encoding(&self) -> DataEncoding;
}

/// Create the codec for `encoding`, with limits and output options from
/// `config`.
pub fn codec_for(encoding: &DataEncoding, config: &CodecConfig) -> Result<Box<dyn DataCodec>> {
    Ok(match encoding {
        DataEncoding::Text(t) => Box::new(TextCodec::new(t.clone(), config)?),
        DataEncoding::Binary(b) => {
            if b.byte_encoding == ByteEncoding::Base64 {
                return Err(BindingError::UnsupportedEncoding(
                    "base64 byte encoding".to_string(),
                ));
            }
            Box::new(BinaryCodec::new(b.clone(), config))
        }
        DataEncoding::Json(j) => Box::new(JsonCodec::new(j.clone(), config)),
        DataEncoding::Xml(x) => Box::new(XmlCodec::new(x.clone(), config)),
    })
}

/// Reject wire-supplied array sizes above the configured limit.
pub(crate) fn check_array_size(size: usize, limit: usize) -> Result<()> {
    if size > limit {
        return Err(BindingError::SizeLimitExceeded { size, limit });
    }
    Ok(())
}

/// Text form of an atom; ISO-8601 times print as timestamps.
pub(crate) fn scalar_to_text(scalar: &Scalar, value: &ScalarValue) -> String {
    if scalar.is_iso_time() && value.data_type().is_numeric() {
        if let Some(iso) = value.as_f64().and_then(format_iso) {
            return iso;
        }
    }
    value.to_string()
}

/// Parse an atom from text. `position` locates the token in error reports.
pub(crate) fn scalar_from_text(scalar: &Scalar, text: &str, position: usize) -> Result<ScalarValue> {
    let raw = if scalar.is_iso_time() && scalar.data_type.is_numeric() {
        match parse_iso(text) {
            Some(t) => ScalarValue::Double(t),
            None => ScalarValue::from(text),
        }
    } else {
        ScalarValue::from(text)
    };
    raw.convert(scalar.data_type).map_err(|_| {
        BindingError::parse(
            position,
            format!("cannot read '{}' as {}", text, scalar.data_type),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use swe_common::{
        BinaryEncoding, DataType, JsonEncoding, ScalarKind, TextEncoding, UnitOfMeasure,
        XmlEncoding,
    };

    #[test]
    fn test_codec_for_each_encoding() {
        let config = CodecConfig::default();
        let encodings = vec![
            DataEncoding::Text(TextEncoding::default()),
            DataEncoding::Binary(BinaryEncoding::default()),
            DataEncoding::Json(JsonEncoding::default()),
            DataEncoding::Xml(XmlEncoding::default()),
        ];
        for encoding in encodings {
            let codec = codec_for(&encoding, &config).unwrap();
            assert_eq!(codec.encoding(), encoding);
        }
    }

    #[test]
    fn test_codec_for_rejects_base64() {
        let encoding = DataEncoding::Binary(BinaryEncoding {
            byte_encoding: ByteEncoding::Base64,
            ..BinaryEncoding::default()
        });
        assert!(matches!(
            codec_for(&encoding, &CodecConfig::default()),
            Err(BindingError::UnsupportedEncoding(_))
        ));
    }

    #[test]
    fn test_codec_for_rejects_invalid_text_encoding() {
        let encoding = DataEncoding::Text(TextEncoding::new(",", ","));
        assert!(codec_for(&encoding, &CodecConfig::default()).is_err());
    }

    #[test]
    fn test_check_array_size() {
        assert!(check_array_size(10, 10).is_ok());
        assert!(matches!(
            check_array_size(11, 10),
            Err(BindingError::SizeLimitExceeded { size: 11, limit: 10 })
        ));
    }

    #[test]
    fn test_scalar_text_forms() {
        let mut time = Scalar::new(ScalarKind::Time);
        time.uom = Some(UnitOfMeasure::iso_time());
        assert_eq!(scalar_to_text(&time, &ScalarValue::Double(0.0)), "1970-01-01T00:00:00Z");
        assert_eq!(
            scalar_from_text(&time, "1970-01-01T00:01:00Z", 0).unwrap(),
            ScalarValue::Double(60.0)
        );
        assert_eq!(scalar_from_text(&time, "60", 0).unwrap(), ScalarValue::Double(60.0));

        let count = Scalar::new(ScalarKind::Count);
        assert_eq!(scalar_from_text(&count, "12", 0).unwrap(), ScalarValue::Int(12));
        match scalar_from_text(&count, "x", 7) {
            Err(BindingError::Parse { position, .. }) => assert_eq!(position, 7),
            other => panic!("unexpected {:?}", other),
        }

        let mut small = Scalar::new(ScalarKind::Count);
        small.data_type = DataType::UByte;
        assert!(scalar_from_text(&small, "300", 0).is_err());
    }
}
