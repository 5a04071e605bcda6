//! Configuration for data codecs.

use serde::{Deserialize, Serialize};
use std::path::Path;

use swe_common::{BinaryEncoding, ByteOrder, TextEncoding};

use crate::error::Result;

/// Defaults and limits applied by the codecs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodecConfig {
    /// Token separator of the default text encoding.
    pub token_separator: String,

    /// Block separator of the default text encoding.
    pub block_separator: String,

    /// Decimal separator of the default text encoding.
    pub decimal_separator: String,

    /// Byte order of the default binary encoding.
    pub byte_order: ByteOrder,

    /// Largest element count accepted from the wire for any single array.
    pub max_array_size: usize,

    /// Pretty-print JSON output.
    pub pretty_json: bool,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            token_separator: ",".to_string(),
            block_separator: "\n".to_string(),
            decimal_separator: ".".to_string(),
            byte_order: ByteOrder::BigEndian,
            max_array_size: 1_000_000,
            pretty_json: false,
        }
    }
}

impl CodecConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("SWE_TOKEN_SEPARATOR") {
            config.token_separator = unescape(&val);
        }

        if let Ok(val) = std::env::var("SWE_BLOCK_SEPARATOR") {
            config.block_separator = unescape(&val);
        }

        if let Ok(val) = std::env::var("SWE_DECIMAL_SEPARATOR") {
            config.decimal_separator = val;
        }

        if let Ok(val) = std::env::var("SWE_BYTE_ORDER") {
            if let Some(order) = ByteOrder::parse(&val) {
                config.byte_order = order;
            }
        }

        if let Ok(val) = std::env::var("SWE_MAX_ARRAY_SIZE") {
            if let Ok(size) = val.parse() {
                config.max_array_size = size;
            }
        }

        if let Ok(val) = std::env::var("SWE_PRETTY_JSON") {
            config.pretty_json = val.to_lowercase() == "true" || val == "1";
        }

        config
    }

    /// Load configuration from a YAML file. Missing keys keep their
    /// defaults.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Self = serde_yaml::from_str(&contents)?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> std::result::Result<(), String> {
        self.text_encoding().validate().map_err(|e| e.to_string())?;

        if self.max_array_size == 0 {
            return Err("max_array_size must be > 0".to_string());
        }

        Ok(())
    }

    /// Text encoding built from the configured separators.
    pub fn text_encoding(&self) -> TextEncoding {
        TextEncoding::new(&self.token_separator, &self.block_separator)
            .with_decimal_separator(&self.decimal_separator)
    }

    /// Binary encoding with the configured byte order.
    pub fn binary_encoding(&self) -> BinaryEncoding {
        BinaryEncoding::new(self.byte_order)
    }
}

/// Allow `\n`, `\t` and `\r` escapes in separators given as plain strings.
fn unescape(s: &str) -> String {
    s.replace("\\n", "\n").replace("\\t", "\t").replace("\\r", "\r")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_is_valid() {
        let config = CodecConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.text_encoding(), TextEncoding::default());
    }

    #[test]
    fn test_validate_rejects_same_separators() {
        let config = CodecConfig {
            block_separator: ",".to_string(),
            ..CodecConfig::default()
        };
        assert!(config.validate().is_err());

        let config = CodecConfig {
            max_array_size: 0,
            ..CodecConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_yaml_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "token_separator: \";\"").unwrap();
        writeln!(file, "byte_order: littleEndian").unwrap();
        writeln!(file, "max_array_size: 42").unwrap();

        let config = CodecConfig::from_yaml_file(file.path()).unwrap();
        assert_eq!(config.token_separator, ";");
        assert_eq!(config.byte_order, ByteOrder::LittleEndian);
        assert_eq!(config.max_array_size, 42);
        assert_eq!(config.block_separator, "\n");
    }

    #[test]
    fn test_unescape() {
        assert_eq!(unescape("\\n"), "\n");
        assert_eq!(unescape(";"), ";");
    }
}
