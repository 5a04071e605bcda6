//! Encoding descriptors that travel alongside a component tree.

use serde::{Deserialize, Serialize};

use crate::data_type::DataType;
use crate::error::{Result, SweError};

/// How the atoms of a data block are laid out on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum DataEncoding {
    #[serde(rename = "TextEncoding")]
    Text(TextEncoding),
    #[serde(rename = "BinaryEncoding")]
    Binary(BinaryEncoding),
    #[serde(rename = "XMLEncoding")]
    Xml(XmlEncoding),
    #[serde(rename = "JSONEncoding")]
    Json(JsonEncoding),
}

impl DataEncoding {
    pub fn kind_name(&self) -> &'static str {
        match self {
            DataEncoding::Text(_) => "TextEncoding",
            DataEncoding::Binary(_) => "BinaryEncoding",
            DataEncoding::Xml(_) => "XMLEncoding",
            DataEncoding::Json(_) => "JSONEncoding",
        }
    }
}

fn default_token_separator() -> String {
    ",".to_string()
}

fn default_block_separator() -> String {
    "\n".to_string()
}

fn default_decimal_separator() -> String {
    ".".to_string()
}

fn default_true() -> bool {
    true
}

/// Delimited text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextEncoding {
    #[serde(default = "default_token_separator")]
    pub token_separator: String,
    #[serde(default = "default_block_separator")]
    pub block_separator: String,
    #[serde(default = "default_decimal_separator")]
    pub decimal_separator: String,
    #[serde(default = "default_true")]
    pub collapse_white_spaces: bool,
}

impl Default for TextEncoding {
    fn default() -> Self {
        Self {
            token_separator: default_token_separator(),
            block_separator: default_block_separator(),
            decimal_separator: default_decimal_separator(),
            collapse_white_spaces: true,
        }
    }
}

impl TextEncoding {
    pub fn new(token_separator: impl Into<String>, block_separator: impl Into<String>) -> Self {
        Self {
            token_separator: token_separator.into(),
            block_separator: block_separator.into(),
            ..Self::default()
        }
    }

    pub fn with_decimal_separator(mut self, separator: impl Into<String>) -> Self {
        self.decimal_separator = separator.into();
        self
    }

    /// Separators must be non-empty, distinct, and the decimal separator a
    /// single character.
    pub fn validate(&self) -> Result<()> {
        if self.token_separator.is_empty() || self.block_separator.is_empty() {
            return Err(SweError::invalid_component("text separators cannot be empty"));
        }
        if self.token_separator == self.block_separator {
            return Err(SweError::invalid_component(
                "token and block separators must differ",
            ));
        }
        if self.decimal_separator.chars().count() != 1 {
            return Err(SweError::invalid_component(
                "decimal separator must be a single character",
            ));
        }
        if self.token_separator == self.decimal_separator {
            return Err(SweError::invalid_component(
                "token and decimal separators must differ",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ByteOrder {
    #[default]
    BigEndian,
    LittleEndian,
}

impl ByteOrder {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "bigEndian" | "big" | "BE" => Some(ByteOrder::BigEndian),
            "littleEndian" | "little" | "LE" => Some(ByteOrder::LittleEndian),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ByteOrder::BigEndian => "bigEndian",
            ByteOrder::LittleEndian => "littleEndian",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ByteEncoding {
    #[default]
    Raw,
    Base64,
}

impl ByteEncoding {
    pub fn as_str(&self) -> &'static str {
        match self {
            ByteEncoding::Raw => "raw",
            ByteEncoding::Base64 => "base64",
        }
    }
}

/// Per-component override of the byte representation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BinaryMember {
    /// Slash-separated component path, as used by scalar indexers.
    #[serde(rename = "ref")]
    pub reference: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_type: Option<DataType>,
    /// Fixed byte length of text values.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub byte_length: Option<usize>,
}

impl BinaryMember {
    pub fn new(reference: impl Into<String>, data_type: DataType) -> Self {
        Self {
            reference: reference.into(),
            data_type: Some(data_type),
            byte_length: None,
        }
    }
}

/// Packed binary.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BinaryEncoding {
    #[serde(default)]
    pub byte_order: ByteOrder,
    #[serde(default)]
    pub byte_encoding: ByteEncoding,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub byte_length: Option<usize>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub members: Vec<BinaryMember>,
}

impl BinaryEncoding {
    pub fn new(byte_order: ByteOrder) -> Self {
        Self {
            byte_order,
            ..Self::default()
        }
    }

    pub fn with_member(mut self, member: BinaryMember) -> Self {
        self.members.push(member);
        self
    }

    /// Override for the scalar at `path`, ignoring leading slashes.
    pub fn member_for(&self, path: &str) -> Option<&BinaryMember> {
        let path = path.trim_start_matches('/');
        self.members
            .iter()
            .find(|m| m.reference.trim_start_matches('/') == path)
    }
}

/// Inline XML.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct XmlEncoding {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

/// JSON values.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JsonEncoding {
    /// Write records as JSON arrays instead of objects.
    #[serde(default)]
    pub records_as_arrays: bool,
}
