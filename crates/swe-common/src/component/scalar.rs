//! Scalar (leaf) components.

use serde::{Deserialize, Serialize};

use crate::data_type::{DataType, ScalarValue};
use crate::error::{Result, SweError};

/// UOM reference for ISO 8601 calendar time.
pub const ISO_8601_UOM: &str = "http://www.opengis.net/def/uom/ISO-8601/0/Gregorian";

/// Variant of a scalar component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScalarKind {
    Boolean,
    Count,
    Quantity,
    Time,
    Category,
    Text,
}

impl ScalarKind {
    /// SWE Common element name of this kind.
    pub fn name(&self) -> &'static str {
        match self {
            ScalarKind::Boolean => "Boolean",
            ScalarKind::Count => "Count",
            ScalarKind::Quantity => "Quantity",
            ScalarKind::Time => "Time",
            ScalarKind::Category => "Category",
            ScalarKind::Text => "Text",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "Boolean" => Some(ScalarKind::Boolean),
            "Count" => Some(ScalarKind::Count),
            "Quantity" => Some(ScalarKind::Quantity),
            "Time" => Some(ScalarKind::Time),
            "Category" => Some(ScalarKind::Category),
            "Text" => Some(ScalarKind::Text),
            _ => None,
        }
    }

    pub fn default_data_type(&self) -> DataType {
        match self {
            ScalarKind::Boolean => DataType::Boolean,
            ScalarKind::Count => DataType::Int,
            ScalarKind::Quantity | ScalarKind::Time => DataType::Double,
            ScalarKind::Category | ScalarKind::Text => DataType::Utf8String,
        }
    }

    /// Whether a unit of measure applies to this kind.
    pub fn has_uom(&self) -> bool {
        matches!(self, ScalarKind::Quantity | ScalarKind::Time)
    }

    /// Data types this kind may declare.
    pub fn accepts_data_type(&self, dt: DataType) -> bool {
        match self {
            ScalarKind::Boolean => dt == DataType::Boolean,
            ScalarKind::Count => dt.is_integral(),
            ScalarKind::Quantity => dt.is_numeric(),
            ScalarKind::Time => dt.is_numeric() || dt == DataType::Utf8String,
            ScalarKind::Category | ScalarKind::Text => dt == DataType::Utf8String,
        }
    }
}

/// Unit of measure, either a UCUM code or a reference URI.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UnitOfMeasure {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub href: Option<String>,
}

impl UnitOfMeasure {
    pub fn code(code: impl Into<String>) -> Self {
        Self {
            code: Some(code.into()),
            href: None,
        }
    }

    pub fn href(href: impl Into<String>) -> Self {
        Self {
            code: None,
            href: Some(href.into()),
        }
    }

    /// ISO 8601 calendar time unit.
    pub fn iso_time() -> Self {
        Self::href(ISO_8601_UOM)
    }

    pub fn is_iso_time(&self) -> bool {
        self.href.as_deref() == Some(ISO_8601_UOM)
    }
}

/// Restriction on the values a scalar accepts.
#[derive(Debug, Clone, PartialEq)]
pub enum Constraint {
    /// Enumerated numbers and/or closed intervals.
    AllowedValues {
        values: Vec<f64>,
        intervals: Vec<(f64, f64)>,
        significant_figures: Option<u32>,
    },
    /// Enumerated tokens for Category and Text.
    AllowedTokens { values: Vec<String> },
    /// Enumerated instants and/or periods, as seconds since the epoch.
    AllowedTimes {
        values: Vec<f64>,
        intervals: Vec<(f64, f64)>,
    },
}

impl Constraint {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Constraint::AllowedValues { .. } => "AllowedValues",
            Constraint::AllowedTokens { .. } => "AllowedTokens",
            Constraint::AllowedTimes { .. } => "AllowedTimes",
        }
    }

    /// Whether `value` satisfies the constraint.
    pub fn accepts(&self, value: &ScalarValue) -> bool {
        match self {
            Constraint::AllowedValues {
                values, intervals, ..
            }
            | Constraint::AllowedTimes { values, intervals } => match value.as_f64() {
                Some(v) => in_numeric_set(v, values, intervals),
                None => false,
            },
            Constraint::AllowedTokens { values } => {
                values.is_empty() || values.iter().any(|t| *t == value.as_text())
            }
        }
    }
}

fn in_numeric_set(v: f64, values: &[f64], intervals: &[(f64, f64)]) -> bool {
    if values.is_empty() && intervals.is_empty() {
        return true;
    }
    values.iter().any(|x| *x == v) || intervals.iter().any(|(lo, hi)| v >= *lo && v <= *hi)
}

/// A leaf component mapping to exactly one atom.
#[derive(Debug, Clone, PartialEq)]
pub struct Scalar {
    pub kind: ScalarKind,
    pub data_type: DataType,
    pub uom: Option<UnitOfMeasure>,
    pub constraint: Option<Constraint>,
    /// Fixed or default value carried by the schema.
    pub value: Option<ScalarValue>,
    pub reference_frame: Option<String>,
    pub axis_id: Option<String>,
    pub code_space: Option<String>,
}

impl Scalar {
    pub fn new(kind: ScalarKind) -> Self {
        Self {
            kind,
            data_type: kind.default_data_type(),
            uom: None,
            constraint: None,
            value: None,
            reference_frame: None,
            axis_id: None,
            code_space: None,
        }
    }

    pub fn is_count(&self) -> bool {
        self.kind == ScalarKind::Count
    }

    /// Time scalars carrying the ISO 8601 unit.
    pub fn is_iso_time(&self) -> bool {
        self.kind == ScalarKind::Time && self.uom.as_ref().is_some_and(UnitOfMeasure::is_iso_time)
    }

    /// Check that `value` converts to the declared data type and satisfies
    /// the constraint, returning the converted value.
    pub fn check_value(&self, value: &ScalarValue) -> Result<ScalarValue> {
        let converted = value.convert(self.data_type)?;
        if let Some(constraint) = &self.constraint {
            if !constraint.accepts(&converted) {
                return Err(SweError::invalid_component(format!(
                    "value {} violates {} constraint",
                    converted,
                    constraint.kind_name()
                )));
            }
        }
        Ok(converted)
    }

    /// Schema value as an element count, for Count scalars.
    pub(crate) fn count_value(&self) -> usize {
        self.value
            .as_ref()
            .and_then(ScalarValue::as_i64)
            .map(|v| v.max(0) as usize)
            .unwrap_or(0)
    }
}
