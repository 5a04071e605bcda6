//! Typed primitive buffers, the leaves of every data block tree.

use num_traits::ToPrimitive;

use crate::data_type::{DataType, ScalarValue};
use crate::error::{Result, SweError};

/// A contiguous run of atoms sharing one primitive type.
///
/// Holds a single scalar, a packed fixed-shape subtree (e.g. a vector of
/// doubles), or every atom of an array of homogeneous elements.
#[derive(Debug, Clone, PartialEq)]
pub enum PrimitiveBlock {
    Boolean(Vec<bool>),
    Byte(Vec<i8>),
    UByte(Vec<u8>),
    Short(Vec<i16>),
    UShort(Vec<u16>),
    Int(Vec<i32>),
    UInt(Vec<u32>),
    Long(Vec<i64>),
    Float(Vec<f32>),
    Double(Vec<f64>),
    Text(Vec<String>),
}

macro_rules! dispatch {
    ($block:expr, $v:ident => $body:expr) => {
        match $block {
            PrimitiveBlock::Boolean($v) => $body,
            PrimitiveBlock::Byte($v) => $body,
            PrimitiveBlock::UByte($v) => $body,
            PrimitiveBlock::Short($v) => $body,
            PrimitiveBlock::UShort($v) => $body,
            PrimitiveBlock::Int($v) => $body,
            PrimitiveBlock::UInt($v) => $body,
            PrimitiveBlock::Long($v) => $body,
            PrimitiveBlock::Float($v) => $body,
            PrimitiveBlock::Double($v) => $body,
            PrimitiveBlock::Text($v) => $body,
        }
    };
}

impl PrimitiveBlock {
    /// Allocate `len` default-valued atoms.
    pub fn new(data_type: DataType, len: usize) -> Self {
        match data_type {
            DataType::Boolean => PrimitiveBlock::Boolean(vec![false; len]),
            DataType::Byte => PrimitiveBlock::Byte(vec![0; len]),
            DataType::UByte => PrimitiveBlock::UByte(vec![0; len]),
            DataType::Short => PrimitiveBlock::Short(vec![0; len]),
            DataType::UShort => PrimitiveBlock::UShort(vec![0; len]),
            DataType::Int => PrimitiveBlock::Int(vec![0; len]),
            DataType::UInt => PrimitiveBlock::UInt(vec![0; len]),
            DataType::Long => PrimitiveBlock::Long(vec![0; len]),
            DataType::Float => PrimitiveBlock::Float(vec![0.0; len]),
            DataType::Double => PrimitiveBlock::Double(vec![0.0; len]),
            DataType::Utf8String => PrimitiveBlock::Text(vec![String::new(); len]),
        }
    }

    /// Build a block from values, converting each to `data_type`.
    pub fn from_values(data_type: DataType, values: &[ScalarValue]) -> Result<Self> {
        let mut block = Self::new(data_type, values.len());
        for (i, v) in values.iter().enumerate() {
            block.set_value(i, v)?;
        }
        Ok(block)
    }

    pub fn data_type(&self) -> DataType {
        match self {
            PrimitiveBlock::Boolean(_) => DataType::Boolean,
            PrimitiveBlock::Byte(_) => DataType::Byte,
            PrimitiveBlock::UByte(_) => DataType::UByte,
            PrimitiveBlock::Short(_) => DataType::Short,
            PrimitiveBlock::UShort(_) => DataType::UShort,
            PrimitiveBlock::Int(_) => DataType::Int,
            PrimitiveBlock::UInt(_) => DataType::UInt,
            PrimitiveBlock::Long(_) => DataType::Long,
            PrimitiveBlock::Float(_) => DataType::Float,
            PrimitiveBlock::Double(_) => DataType::Double,
            PrimitiveBlock::Text(_) => DataType::Utf8String,
        }
    }

    pub fn len(&self) -> usize {
        dispatch!(self, v => v.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Grow or shrink to `len` atoms; new atoms take the default value.
    pub fn resize(&mut self, len: usize) {
        dispatch!(self, v => v.resize(len, Default::default()))
    }

    fn check_index(&self, index: usize) -> Result<()> {
        let len = self.len();
        if index >= len {
            return Err(SweError::IndexOutOfRange { index, len });
        }
        Ok(())
    }

    pub fn get_value(&self, index: usize) -> Result<ScalarValue> {
        self.check_index(index)?;
        Ok(match self {
            PrimitiveBlock::Boolean(v) => ScalarValue::Boolean(v[index]),
            PrimitiveBlock::Byte(v) => ScalarValue::Byte(v[index]),
            PrimitiveBlock::UByte(v) => ScalarValue::UByte(v[index]),
            PrimitiveBlock::Short(v) => ScalarValue::Short(v[index]),
            PrimitiveBlock::UShort(v) => ScalarValue::UShort(v[index]),
            PrimitiveBlock::Int(v) => ScalarValue::Int(v[index]),
            PrimitiveBlock::UInt(v) => ScalarValue::UInt(v[index]),
            PrimitiveBlock::Long(v) => ScalarValue::Long(v[index]),
            PrimitiveBlock::Float(v) => ScalarValue::Float(v[index]),
            PrimitiveBlock::Double(v) => ScalarValue::Double(v[index]),
            PrimitiveBlock::Text(v) => ScalarValue::Text(v[index].clone()),
        })
    }

    /// Store `value`, converted to this block's data type.
    pub fn set_value(&mut self, index: usize, value: &ScalarValue) -> Result<()> {
        self.check_index(index)?;
        let converted = value.convert(self.data_type())?;
        match (self, converted) {
            (PrimitiveBlock::Boolean(v), ScalarValue::Boolean(x)) => v[index] = x,
            (PrimitiveBlock::Byte(v), ScalarValue::Byte(x)) => v[index] = x,
            (PrimitiveBlock::UByte(v), ScalarValue::UByte(x)) => v[index] = x,
            (PrimitiveBlock::Short(v), ScalarValue::Short(x)) => v[index] = x,
            (PrimitiveBlock::UShort(v), ScalarValue::UShort(x)) => v[index] = x,
            (PrimitiveBlock::Int(v), ScalarValue::Int(x)) => v[index] = x,
            (PrimitiveBlock::UInt(v), ScalarValue::UInt(x)) => v[index] = x,
            (PrimitiveBlock::Long(v), ScalarValue::Long(x)) => v[index] = x,
            (PrimitiveBlock::Float(v), ScalarValue::Float(x)) => v[index] = x,
            (PrimitiveBlock::Double(v), ScalarValue::Double(x)) => v[index] = x,
            (PrimitiveBlock::Text(v), ScalarValue::Text(x)) => v[index] = x,
            (block, other) => {
                return Err(SweError::type_mismatch(block.data_type(), other.data_type()))
            }
        }
        Ok(())
    }

    pub fn get_f64(&self, index: usize) -> Result<f64> {
        match self {
            PrimitiveBlock::Double(v) => v
                .get(index)
                .copied()
                .ok_or(SweError::IndexOutOfRange { index, len: v.len() }),
            PrimitiveBlock::Float(v) => v
                .get(index)
                .and_then(ToPrimitive::to_f64)
                .ok_or(SweError::IndexOutOfRange { index, len: v.len() }),
            _ => {
                let value = self.get_value(index)?;
                value
                    .as_f64()
                    .ok_or_else(|| SweError::type_mismatch(DataType::Double, value.data_type()))
            }
        }
    }

    pub fn set_f64(&mut self, index: usize, value: f64) -> Result<()> {
        match self {
            PrimitiveBlock::Double(v) => {
                let len = v.len();
                let slot = v.get_mut(index).ok_or(SweError::IndexOutOfRange { index, len })?;
                *slot = value;
                Ok(())
            }
            _ => self.set_value(index, &ScalarValue::Double(value)),
        }
    }

    pub fn get_i64(&self, index: usize) -> Result<i64> {
        match self {
            PrimitiveBlock::Int(v) => v
                .get(index)
                .map(|x| i64::from(*x))
                .ok_or(SweError::IndexOutOfRange { index, len: v.len() }),
            _ => {
                let value = self.get_value(index)?;
                value
                    .as_i64()
                    .ok_or_else(|| SweError::type_mismatch(DataType::Long, value.data_type()))
            }
        }
    }

    pub fn set_i64(&mut self, index: usize, value: i64) -> Result<()> {
        self.set_value(index, &ScalarValue::Long(value))
    }

    pub fn get_bool(&self, index: usize) -> Result<bool> {
        let value = self.get_value(index)?;
        value
            .as_bool()
            .ok_or_else(|| SweError::type_mismatch(DataType::Boolean, value.data_type()))
    }

    pub fn set_bool(&mut self, index: usize, value: bool) -> Result<()> {
        self.set_value(index, &ScalarValue::Boolean(value))
    }

    pub fn get_string(&self, index: usize) -> Result<String> {
        match self {
            PrimitiveBlock::Text(v) => v
                .get(index)
                .cloned()
                .ok_or(SweError::IndexOutOfRange { index, len: v.len() }),
            _ => Ok(self.get_value(index)?.as_text()),
        }
    }

    pub fn set_string(&mut self, index: usize, value: impl Into<String>) -> Result<()> {
        self.set_value(index, &ScalarValue::Text(value.into()))
    }

    /// Every atom in order.
    pub fn values(&self) -> Vec<ScalarValue> {
        (0..self.len())
            .filter_map(|i| self.get_value(i).ok())
            .collect()
    }

    pub fn as_f64_slice(&self) -> Option<&[f64]> {
        match self {
            PrimitiveBlock::Double(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_f64_slice_mut(&mut self) -> Option<&mut [f64]> {
        match self {
            PrimitiveBlock::Double(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_i32_slice(&self) -> Option<&[i32]> {
        match self {
            PrimitiveBlock::Int(v) => Some(v),
            _ => None,
        }
    }
}

impl From<Vec<f64>> for PrimitiveBlock {
    fn from(v: Vec<f64>) -> Self {
        PrimitiveBlock::Double(v)
    }
}

impl From<Vec<f32>> for PrimitiveBlock {
    fn from(v: Vec<f32>) -> Self {
        PrimitiveBlock::Float(v)
    }
}

impl From<Vec<i32>> for PrimitiveBlock {
    fn from(v: Vec<i32>) -> Self {
        PrimitiveBlock::Int(v)
    }
}

impl From<Vec<String>> for PrimitiveBlock {
    fn from(v: Vec<String>) -> Self {
        PrimitiveBlock::Text(v)
    }
}

impl From<Vec<bool>> for PrimitiveBlock {
    fn from(v: Vec<bool>) -> Self {
        PrimitiveBlock::Boolean(v)
    }
}
