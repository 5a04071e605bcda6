//! Primitive data types and atom values.
//!
//! Every scalar component declares one [`DataType`]; codecs use it to pick
//! the byte-level representation of the atom.

// `NumCast::from` collides with `From::from` on primitives, so it is not imported
use num_traits::{cast, ToPrimitive};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Result, SweError};

/// Prefix of the OGC data type definition URIs.
pub const OGC_DATA_TYPE_PREFIX: &str = "http://www.opengis.net/def/dataType/OGC/0/";

/// Primitive type of a single atom.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum DataType {
    Boolean,
    Byte,
    UByte,
    Short,
    UShort,
    Int,
    UInt,
    Long,
    Float,
    Double,
    Utf8String,
}

impl DataType {
    /// All supported data types.
    pub const ALL: [DataType; 11] = [
        DataType::Boolean,
        DataType::Byte,
        DataType::UByte,
        DataType::Short,
        DataType::UShort,
        DataType::Int,
        DataType::UInt,
        DataType::Long,
        DataType::Float,
        DataType::Double,
        DataType::Utf8String,
    ];

    /// Short name used at the end of the OGC data type URI.
    pub fn short_name(&self) -> &'static str {
        match self {
            DataType::Boolean => "boolean",
            DataType::Byte => "signedByte",
            DataType::UByte => "unsignedByte",
            DataType::Short => "signedShort",
            DataType::UShort => "unsignedShort",
            DataType::Int => "signedInt",
            DataType::UInt => "unsignedInt",
            DataType::Long => "signedLong",
            DataType::Float => "float32",
            DataType::Double => "double",
            DataType::Utf8String => "string-utf-8",
        }
    }

    /// Full OGC definition URI of this data type.
    pub fn uri(&self) -> String {
        format!("{}{}", OGC_DATA_TYPE_PREFIX, self.short_name())
    }

    /// Parse a data type from its OGC URI, its short name, or a common alias
    /// (`double`, `float`, `int`, `string`, ...).
    pub fn from_uri(uri: &str) -> Option<Self> {
        let name = uri.strip_prefix(OGC_DATA_TYPE_PREFIX).unwrap_or(uri);
        let name = name.strip_prefix("xs:").unwrap_or(name);
        match name {
            "boolean" | "bool" => Some(DataType::Boolean),
            "signedByte" | "byte" => Some(DataType::Byte),
            "unsignedByte" | "ubyte" => Some(DataType::UByte),
            "signedShort" | "short" => Some(DataType::Short),
            "unsignedShort" | "ushort" => Some(DataType::UShort),
            "signedInt" | "int" | "integer" => Some(DataType::Int),
            "unsignedInt" | "uint" => Some(DataType::UInt),
            "signedLong" | "long" => Some(DataType::Long),
            "float32" | "float" => Some(DataType::Float),
            "double" | "float64" => Some(DataType::Double),
            "string-utf-8" | "string" => Some(DataType::Utf8String),
            _ => None,
        }
    }

    /// Encoded size in bytes, `None` for variable-length strings.
    pub fn byte_size(&self) -> Option<usize> {
        match self {
            DataType::Boolean | DataType::Byte | DataType::UByte => Some(1),
            DataType::Short | DataType::UShort => Some(2),
            DataType::Int | DataType::UInt | DataType::Float => Some(4),
            DataType::Long | DataType::Double => Some(8),
            DataType::Utf8String => None,
        }
    }

    pub fn is_numeric(&self) -> bool {
        !matches!(self, DataType::Boolean | DataType::Utf8String)
    }

    pub fn is_integral(&self) -> bool {
        matches!(
            self,
            DataType::Byte
                | DataType::UByte
                | DataType::Short
                | DataType::UShort
                | DataType::Int
                | DataType::UInt
                | DataType::Long
        )
    }

    pub fn is_floating(&self) -> bool {
        matches!(self, DataType::Float | DataType::Double)
    }

    /// Value a freshly allocated atom of this type holds.
    pub fn default_value(&self) -> ScalarValue {
        match self {
            DataType::Boolean => ScalarValue::Boolean(false),
            DataType::Byte => ScalarValue::Byte(0),
            DataType::UByte => ScalarValue::UByte(0),
            DataType::Short => ScalarValue::Short(0),
            DataType::UShort => ScalarValue::UShort(0),
            DataType::Int => ScalarValue::Int(0),
            DataType::UInt => ScalarValue::UInt(0),
            DataType::Long => ScalarValue::Long(0),
            DataType::Float => ScalarValue::Float(0.0),
            DataType::Double => ScalarValue::Double(0.0),
            DataType::Utf8String => ScalarValue::Text(String::new()),
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.short_name())
    }
}

impl From<DataType> for String {
    fn from(dt: DataType) -> Self {
        dt.uri()
    }
}

impl TryFrom<String> for DataType {
    type Error = String;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        DataType::from_uri(&value).ok_or_else(|| format!("unknown data type: {}", value))
    }
}

/// The value of one atom.
#[derive(Debug, Clone, PartialEq)]
pub enum ScalarValue {
    Boolean(bool),
    Byte(i8),
    UByte(u8),
    Short(i16),
    UShort(u16),
    Int(i32),
    UInt(u32),
    Long(i64),
    Float(f32),
    Double(f64),
    Text(String),
}

impl ScalarValue {
    pub fn data_type(&self) -> DataType {
        match self {
            ScalarValue::Boolean(_) => DataType::Boolean,
            ScalarValue::Byte(_) => DataType::Byte,
            ScalarValue::UByte(_) => DataType::UByte,
            ScalarValue::Short(_) => DataType::Short,
            ScalarValue::UShort(_) => DataType::UShort,
            ScalarValue::Int(_) => DataType::Int,
            ScalarValue::UInt(_) => DataType::UInt,
            ScalarValue::Long(_) => DataType::Long,
            ScalarValue::Float(_) => DataType::Float,
            ScalarValue::Double(_) => DataType::Double,
            ScalarValue::Text(_) => DataType::Utf8String,
        }
    }

    /// Numeric view of the value. Booleans map to 0/1, text is parsed.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ScalarValue::Boolean(b) => Some(if *b { 1.0 } else { 0.0 }),
            ScalarValue::Byte(v) => v.to_f64(),
            ScalarValue::UByte(v) => v.to_f64(),
            ScalarValue::Short(v) => v.to_f64(),
            ScalarValue::UShort(v) => v.to_f64(),
            ScalarValue::Int(v) => v.to_f64(),
            ScalarValue::UInt(v) => v.to_f64(),
            ScalarValue::Long(v) => v.to_f64(),
            ScalarValue::Float(v) => v.to_f64(),
            ScalarValue::Double(v) => Some(*v),
            ScalarValue::Text(s) => s.trim().parse().ok(),
        }
    }

    /// Integer view of the value. Floating values must be whole numbers.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ScalarValue::Boolean(b) => Some(i64::from(*b)),
            ScalarValue::Byte(v) => Some(i64::from(*v)),
            ScalarValue::UByte(v) => Some(i64::from(*v)),
            ScalarValue::Short(v) => Some(i64::from(*v)),
            ScalarValue::UShort(v) => Some(i64::from(*v)),
            ScalarValue::Int(v) => Some(i64::from(*v)),
            ScalarValue::UInt(v) => Some(i64::from(*v)),
            ScalarValue::Long(v) => Some(*v),
            ScalarValue::Float(v) => whole_number(f64::from(*v)),
            ScalarValue::Double(v) => whole_number(*v),
            ScalarValue::Text(s) => {
                let s = s.trim();
                s.parse::<i64>()
                    .ok()
                    .or_else(|| s.parse::<f64>().ok().and_then(whole_number))
            }
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ScalarValue::Boolean(b) => Some(*b),
            ScalarValue::Text(s) => match s.trim() {
                "true" | "1" => Some(true),
                "false" | "0" => Some(false),
                _ => None,
            },
            other => other.as_f64().map(|v| v != 0.0),
        }
    }

    /// Text view of the value.
    pub fn as_text(&self) -> String {
        self.to_string()
    }

    /// Convert this value to another data type, failing on overflow,
    /// non-finite to integer conversion or unparsable text.
    pub fn convert(&self, target: DataType) -> Result<ScalarValue> {
        if self.data_type() == target {
            return Ok(self.clone());
        }
        let fail = || SweError::type_mismatch(target, format!("{} ({})", self, self.data_type()));
        let converted = match target {
            DataType::Boolean => ScalarValue::Boolean(self.as_bool().ok_or_else(fail)?),
            DataType::Utf8String => ScalarValue::Text(self.as_text()),
            DataType::Float => ScalarValue::Float(cast_f64(self.as_f64().ok_or_else(fail)?).ok_or_else(fail)?),
            DataType::Double => ScalarValue::Double(self.as_f64().ok_or_else(fail)?),
            DataType::Byte => ScalarValue::Byte(self.cast_integral().ok_or_else(fail)?),
            DataType::UByte => ScalarValue::UByte(self.cast_integral().ok_or_else(fail)?),
            DataType::Short => ScalarValue::Short(self.cast_integral().ok_or_else(fail)?),
            DataType::UShort => ScalarValue::UShort(self.cast_integral().ok_or_else(fail)?),
            DataType::Int => ScalarValue::Int(self.cast_integral().ok_or_else(fail)?),
            DataType::UInt => ScalarValue::UInt(self.cast_integral().ok_or_else(fail)?),
            DataType::Long => ScalarValue::Long(self.as_i64().ok_or_else(fail)?),
        };
        Ok(converted)
    }

    fn cast_integral<T: num_traits::NumCast>(&self) -> Option<T> {
        self.as_i64().and_then(cast)
    }
}

fn whole_number(v: f64) -> Option<i64> {
    if v.is_finite() && v.fract() == 0.0 {
        v.to_i64()
    } else {
        None
    }
}

fn cast_f64<T: num_traits::NumCast>(v: f64) -> Option<T> {
    if v.is_nan() {
        // NaN survives float narrowing but NumCast rejects it
        return cast(f32::NAN);
    }
    cast(v)
}

impl fmt::Display for ScalarValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScalarValue::Boolean(v) => write!(f, "{}", v),
            ScalarValue::Byte(v) => write!(f, "{}", v),
            ScalarValue::UByte(v) => write!(f, "{}", v),
            ScalarValue::Short(v) => write!(f, "{}", v),
            ScalarValue::UShort(v) => write!(f, "{}", v),
            ScalarValue::Int(v) => write!(f, "{}", v),
            ScalarValue::UInt(v) => write!(f, "{}", v),
            ScalarValue::Long(v) => write!(f, "{}", v),
            ScalarValue::Float(v) => write!(f, "{}", v),
            ScalarValue::Double(v) => write!(f, "{}", v),
            ScalarValue::Text(v) => f.write_str(v),
        }
    }
}

macro_rules! impl_from_value {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for ScalarValue {
                fn from(v: $ty) -> Self {
                    ScalarValue::$variant(v)
                }
            }
        )*
    };
}

impl_from_value!(
    bool => Boolean,
    i8 => Byte,
    u8 => UByte,
    i16 => Short,
    u16 => UShort,
    i32 => Int,
    u32 => UInt,
    i64 => Long,
    f32 => Float,
    f64 => Double,
    String => Text,
);

impl From<&str> for ScalarValue {
    fn from(v: &str) -> Self {
        ScalarValue::Text(v.to_string())
    }
}
