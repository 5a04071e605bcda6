//! Delimited text codec.
//!
//! Atoms are written as tokens in component order. A choice contributes
//! the name of its selected item ahead of the item's tokens, and an
//! implicit-size array contributes its element count ahead of the elements.

use bytes::Bytes;
use tracing::debug;

use swe_common::data::{read_block, visit_block, BlockSource, BlockVisitor};
use swe_common::{DataBlock, DataChoice, DataComponent, DataEncoding, Scalar, ScalarValue, TextEncoding};

use crate::config::CodecConfig;
use crate::data::{check_array_size, scalar_from_text, scalar_to_text, DataCodec, DataReader, DataWriter};
use crate::error::{BindingError, Result};

/// Codec for [`TextEncoding`].
#[derive(Debug, Clone)]
pub struct TextCodec {
    encoding: TextEncoding,
    max_array_size: usize,
}

impl TextCodec {
    /// Create a codec, validating the separators.
    pub fn new(encoding: TextEncoding, config: &CodecConfig) -> Result<Self> {
        encoding.validate()?;
        Ok(Self {
            encoding,
            max_array_size: config.max_array_size,
        })
    }
}

impl DataWriter for TextCodec {
    fn write_blocks(&self, component: &DataComponent, blocks: &[DataBlock]) -> Result<Bytes> {
        let mut out = String::new();
        for block in blocks {
            let mut writer = TokenWriter {
                decimal_separator: &self.encoding.decimal_separator,
                tokens: Vec::new(),
            };
            visit_block(component, block, &mut writer)?;
            out.push_str(&writer.tokens.join(&self.encoding.token_separator));
            out.push_str(&self.encoding.block_separator);
        }
        debug!(codec = "text", blocks = blocks.len(), bytes = out.len(), "Encoded data blocks");
        Ok(Bytes::from(out))
    }
}

impl DataReader for TextCodec {
    fn read_blocks(&self, component: &DataComponent, input: &[u8]) -> Result<Vec<DataBlock>> {
        let text = std::str::from_utf8(input)
            .map_err(|e| BindingError::parse(e.valid_up_to(), "input is not valid UTF-8"))?;
        let mut source = TokenReader {
            tokenizer: Tokenizer::new(text, &self.encoding),
            decimal_separator: &self.encoding.decimal_separator,
            max_array_size: self.max_array_size,
        };

        let mut blocks = Vec::new();
        while !source.tokenizer.at_end() {
            blocks.push(read_block(component, &mut source)?);
        }
        debug!(codec = "text", blocks = blocks.len(), bytes = input.len(), "Decoded data blocks");
        Ok(blocks)
    }
}

impl DataCodec for TextCodec {
    fn encoding(&self) -> DataEncoding {
        DataEncoding::Text(self.encoding.clone())
    }
}

// =============================================================================
// Writing
// =============================================================================

struct TokenWriter<'a> {
    decimal_separator: &'a str,
    tokens: Vec<String>,
}

impl BlockVisitor for TokenWriter<'_> {
    type Error = BindingError;

    fn begin_array(&mut self, component: &DataComponent, len: usize) -> Result<()> {
        if component.as_array().is_some_and(|a| a.is_implicit_size()) {
            self.tokens.push(len.to_string());
        }
        Ok(())
    }

    fn begin_choice(&mut self, component: &DataComponent, index: usize) -> Result<()> {
        let item = component
            .component(index)
            .ok_or(swe_common::SweError::IndexOutOfRange {
                index,
                len: component.component_count(),
            })?;
        self.tokens.push(item.name.clone());
        Ok(())
    }

    fn scalar(&mut self, _component: &DataComponent, scalar: &Scalar, value: ScalarValue) -> Result<()> {
        let mut token = scalar_to_text(scalar, &value);
        if self.decimal_separator != "." && value.data_type().is_floating() && !scalar.is_iso_time() {
            token = token.replace('.', self.decimal_separator);
        }
        self.tokens.push(token);
        Ok(())
    }
}

// =============================================================================
// Reading
// =============================================================================

/// Splits text on either separator, tracking byte positions.
struct Tokenizer<'a> {
    input: &'a str,
    pos: usize,
    token_separator: &'a str,
    block_separator: &'a str,
    collapse: bool,
}

impl<'a> Tokenizer<'a> {
    fn new(input: &'a str, encoding: &'a TextEncoding) -> Self {
        Self {
            input,
            pos: 0,
            token_separator: &encoding.token_separator,
            block_separator: &encoding.block_separator,
            collapse: encoding.collapse_white_spaces,
        }
    }

    fn rest(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn skip_whitespace(&mut self) {
        if self.collapse {
            let rest = self.rest();
            self.pos += rest.len() - rest.trim_start().len();
        }
    }

    /// True once only whitespace and block separators remain.
    fn at_end(&mut self) -> bool {
        loop {
            self.skip_whitespace();
            if self.rest().starts_with(self.block_separator) {
                self.pos += self.block_separator.len();
            } else {
                break;
            }
        }
        self.pos >= self.input.len()
    }

    /// Next token and the byte position where it starts.
    fn next_token(&mut self) -> Result<(&'a str, usize)> {
        self.skip_whitespace();
        if self.pos >= self.input.len() {
            return Err(BindingError::UnexpectedEof);
        }

        let start = self.pos;
        let rest = self.rest();
        let token_end = rest.find(self.token_separator);
        let block_end = rest.find(self.block_separator);
        let (len, separator_len) = match (token_end, block_end) {
            (Some(t), Some(b)) if t <= b => (t, self.token_separator.len()),
            (_, Some(b)) => (b, self.block_separator.len()),
            (Some(t), None) => (t, self.token_separator.len()),
            (None, None) => (rest.len(), 0),
        };

        let token = &rest[..len];
        self.pos += len + separator_len;
        let token = if self.collapse { token.trim() } else { token };
        Ok((token, start))
    }
}

struct TokenReader<'a> {
    tokenizer: Tokenizer<'a>,
    decimal_separator: &'a str,
    max_array_size: usize,
}

impl BlockSource for TokenReader<'_> {
    type Error = BindingError;

    fn begin_array(&mut self, _component: &DataComponent, known: Option<usize>) -> Result<usize> {
        let size = match known {
            Some(n) => n,
            None => {
                let (token, position) = self.tokenizer.next_token()?;
                token.parse().map_err(|_| {
                    BindingError::parse(position, format!("invalid array size '{}'", token))
                })?
            }
        };
        check_array_size(size, self.max_array_size)?;
        Ok(size)
    }

    fn begin_choice(&mut self, component: &DataComponent, choice: &DataChoice) -> Result<usize> {
        let (token, position) = self.tokenizer.next_token()?;
        choice.item_index(token).ok_or_else(|| {
            BindingError::parse(
                position,
                format!("'{}' is not an item of choice '{}'", token, component.name),
            )
        })
    }

    fn read_scalar(&mut self, _component: &DataComponent, scalar: &Scalar) -> Result<ScalarValue> {
        let (token, position) = self.tokenizer.next_token()?;
        if self.decimal_separator != "." && scalar.data_type.is_floating() && !scalar.is_iso_time() {
            return scalar_from_text(scalar, &token.replace(self.decimal_separator, "."), position);
        }
        scalar_from_text(scalar, token, position)
    }
}
