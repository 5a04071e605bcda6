//! SWE Common JSON for component trees and data streams.
//!
//! Components map to objects tagged by `type`:
//!
//! ```json
//! {
//!   "type": "DataRecord",
//!   "fields": [
//!     { "type": "Quantity", "name": "temp", "uom": { "code": "Cel" } },
//!     { "type": "Count", "name": "n", "id": "N" },
//!     {
//!       "type": "DataArray",
//!       "name": "samples",
//!       "elementCount": { "href": "#N" },
//!       "elementType": { "type": "Quantity", "name": "v", "uom": { "code": "m" } }
//!     }
//!   ]
//! }
//! ```
//!
//! Scalars may carry a `dataType` URI when they do not use the default type
//! of their kind.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use swe_common::{
    ComponentKind, Constraint, DataArray, DataChoice, DataComponent, DataEncoding, DataRecord,
    DataType, ElementCount, Matrix, Scalar, ScalarKind, ScalarValue, UnitOfMeasure, Vector,
};

use crate::error::{BindingError, Result};
use crate::schema::DataStream;
use crate::time::{format_iso, parse_iso};

fn is_false(b: &bool) -> bool {
    !*b
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ComponentJson {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    definition: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    #[serde(default, skip_serializing_if = "is_false")]
    optional: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    updatable: bool,

    // scalars
    #[serde(default, skip_serializing_if = "Option::is_none")]
    data_type: Option<DataType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    uom: Option<UnitOfMeasure>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    code_space: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    constraint: Option<ConstraintJson>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none", rename = "axisID")]
    axis_id: Option<String>,

    // vectors, matrices and scalars
    #[serde(default, skip_serializing_if = "Option::is_none")]
    reference_frame: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    local_frame: Option<String>,

    // containers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    fields: Option<Vec<ComponentJson>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    coordinates: Option<Vec<ComponentJson>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    items: Option<Vec<ComponentJson>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    element_count: Option<ElementCountJson>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    element_type: Option<Box<ComponentJson>>,
}

/// Either a link to a size component or an inline Count.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum ElementCountJson {
    Href { href: String },
    Inline(Box<ComponentJson>),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
enum ConstraintJson {
    AllowedValues {
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        values: Vec<f64>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        intervals: Vec<[f64; 2]>,
        #[serde(
            default,
            skip_serializing_if = "Option::is_none",
            rename = "significantFigures"
        )]
        significant_figures: Option<u32>,
    },
    AllowedTokens {
        #[serde(default)]
        values: Vec<String>,
    },
    AllowedTimes {
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        values: Vec<Value>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        intervals: Vec<[Value; 2]>,
    },
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DataStreamJson {
    element_type: ComponentJson,
    encoding: DataEncoding,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    values: Option<Value>,
}

// =============================================================================
// Public API
// =============================================================================

pub fn read_component(json: &str) -> Result<DataComponent> {
    let dto: ComponentJson = serde_json::from_str(json)?;
    let component = from_json(dto)?;
    component.validate()?;
    debug!(
        component = %component.name,
        kind = component.kind_name(),
        "Read component from JSON"
    );
    Ok(component)
}

pub fn write_component(component: &DataComponent, pretty: bool) -> Result<String> {
    to_string(&to_json(component), pretty)
}

/// Read a data stream object: `elementType`, `encoding` and optional
/// `values`. Values that are not a JSON string are kept as JSON text.
pub fn read_data_stream(json: &str) -> Result<DataStream> {
    let dto: DataStreamJson = serde_json::from_str(json)?;
    let values = match dto.values {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s),
        Some(other) => Some(serde_json::to_string(&other)?),
    };
    DataStream {
        element_type: from_json(dto.element_type)?,
        encoding: dto.encoding,
        values,
    }
    .resolve()
}

/// Write a data stream object. Values of a JSON-encoded stream are embedded
/// as JSON when they parse.
pub fn write_data_stream(stream: &DataStream, pretty: bool) -> Result<String> {
    let values = stream.values.as_ref().map(|v| match stream.encoding {
        DataEncoding::Json(_) => {
            serde_json::from_str(v).unwrap_or_else(|_| Value::String(v.clone()))
        }
        _ => Value::String(v.clone()),
    });
    let dto = DataStreamJson {
        element_type: to_json(&stream.element_type),
        encoding: stream.encoding.clone(),
        values,
    };
    to_string(&dto, pretty)
}

fn to_string<T: Serialize>(value: &T, pretty: bool) -> Result<String> {
    Ok(if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    })
}

// =============================================================================
// DTO -> model
// =============================================================================

fn from_json(dto: ComponentJson) -> Result<DataComponent> {
    let name = dto.name.clone().unwrap_or_default();
    let kind = match dto.kind.as_str() {
        "DataRecord" => ComponentKind::Record(DataRecord {
            fields: children(dto.fields, "fields")?,
        }),
        "Vector" => ComponentKind::Vector(Vector {
            reference_frame: dto.reference_frame.clone(),
            local_frame: dto.local_frame.clone(),
            coordinates: children(dto.coordinates, "coordinates")?,
        }),
        "DataChoice" => {
            let mut choice = DataChoice::new();
            for item in children(dto.items, "items")? {
                choice.add_item(item)?;
            }
            ComponentKind::Choice(choice)
        }
        "DataArray" => ComponentKind::Array(DataArray {
            element_count: element_count_from_json(dto.element_count)?,
            element_type: Box::new(element_type_from_json(dto.element_type)?),
        }),
        "Matrix" => {
            let rows = match element_count_from_json(dto.element_count)? {
                ElementCount::Fixed(n) => n,
                _ => {
                    return Err(BindingError::invalid_schema(format!(
                        "matrix '{}' must have a fixed element count",
                        name
                    )))
                }
            };
            ComponentKind::Matrix(Matrix {
                reference_frame: dto.reference_frame.clone(),
                local_frame: dto.local_frame.clone(),
                element_count: rows,
                element_type: Box::new(element_type_from_json(dto.element_type)?),
            })
        }
        other => {
            let kind = ScalarKind::from_name(other).ok_or_else(|| {
                BindingError::invalid_schema(format!("unsupported component type '{}'", other))
            })?;
            ComponentKind::Scalar(scalar_from_json(&dto, kind)?)
        }
    };

    let mut component = DataComponent::new(name, kind);
    component.id = dto.id;
    component.definition = dto.definition;
    component.label = dto.label;
    component.description = dto.description;
    component.optional = dto.optional;
    component.updatable = dto.updatable;
    Ok(component)
}

fn children(list: Option<Vec<ComponentJson>>, property: &str) -> Result<Vec<DataComponent>> {
    list.unwrap_or_default()
        .into_iter()
        .map(|c| {
            if c.name.as_deref().map_or(true, str::is_empty) {
                return Err(BindingError::invalid_schema(format!(
                    "{} entry without a name",
                    property
                )));
            }
            from_json(c)
        })
        .collect()
}

fn element_type_from_json(element_type: Option<Box<ComponentJson>>) -> Result<DataComponent> {
    let mut dto = *element_type
        .ok_or_else(|| BindingError::invalid_schema("array has no elementType"))?;
    if dto.name.is_none() {
        dto.name = Some("element".to_string());
    }
    from_json(dto)
}

fn element_count_from_json(count: Option<ElementCountJson>) -> Result<ElementCount> {
    match count {
        None => Ok(ElementCount::Implicit),
        Some(ElementCountJson::Href { href }) => Ok(ElementCount::SizeComponent(
            href.trim_start_matches('#').to_string(),
        )),
        Some(ElementCountJson::Inline(count)) => match &count.value {
            None => Ok(ElementCount::Implicit),
            Some(v) => v
                .as_u64()
                .map(|n| ElementCount::Fixed(n as usize))
                .ok_or_else(|| BindingError::invalid_schema(format!("invalid element count {}", v))),
        },
    }
}

fn scalar_from_json(dto: &ComponentJson, kind: ScalarKind) -> Result<Scalar> {
    let mut scalar = Scalar::new(kind);
    if let Some(dt) = dto.data_type {
        scalar.data_type = dt;
    }
    scalar.uom = dto.uom.clone();
    scalar.code_space = dto.code_space.clone();
    scalar.reference_frame = dto.reference_frame.clone();
    scalar.axis_id = dto.axis_id.clone();
    if let Some(c) = &dto.constraint {
        scalar.constraint = Some(constraint_from_json(c, &scalar)?);
    }
    if let Some(v) = &dto.value {
        scalar.value = Some(scalar_value_from_json(&scalar, v)?);
    }
    Ok(scalar)
}

fn constraint_from_json(constraint: &ConstraintJson, scalar: &Scalar) -> Result<Constraint> {
    Ok(match constraint {
        ConstraintJson::AllowedValues {
            values,
            intervals,
            significant_figures,
        } => Constraint::AllowedValues {
            values: values.clone(),
            intervals: intervals.iter().map(|[lo, hi]| (*lo, *hi)).collect(),
            significant_figures: *significant_figures,
        },
        ConstraintJson::AllowedTokens { values } => Constraint::AllowedTokens {
            values: values.clone(),
        },
        ConstraintJson::AllowedTimes { values, intervals } => Constraint::AllowedTimes {
            values: values
                .iter()
                .map(|v| time_from_json(scalar, v))
                .collect::<Result<_>>()?,
            intervals: intervals
                .iter()
                .map(|[lo, hi]| Ok((time_from_json(scalar, lo)?, time_from_json(scalar, hi)?)))
                .collect::<Result<_>>()?,
        },
    })
}

fn time_from_json(scalar: &Scalar, value: &Value) -> Result<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) if scalar.is_iso_time() => parse_iso(s),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
    .ok_or_else(|| BindingError::invalid_schema(format!("invalid time value {}", value)))
}

/// Convert a JSON value to an atom of the scalar's data type.
pub(crate) fn scalar_value_from_json(scalar: &Scalar, value: &Value) -> Result<ScalarValue> {
    let raw = match value {
        Value::Bool(b) => ScalarValue::Boolean(*b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                ScalarValue::Long(i)
            } else if let Some(f) = n.as_f64() {
                ScalarValue::Double(f)
            } else {
                return Err(BindingError::invalid_schema(format!("number out of range: {}", n)));
            }
        }
        Value::String(s) if scalar.is_iso_time() && scalar.data_type.is_numeric() => {
            ScalarValue::Double(time_from_json(scalar, value).map_err(|_| {
                BindingError::invalid_schema(format!("invalid ISO time '{}'", s))
            })?)
        }
        Value::String(s) => ScalarValue::Text(s.clone()),
        Value::Null if scalar.data_type.is_floating() => ScalarValue::Double(f64::NAN),
        other => {
            return Err(BindingError::invalid_schema(format!(
                "unexpected JSON value {} for {}",
                other,
                scalar.kind.name()
            )))
        }
    };
    Ok(raw.convert(scalar.data_type)?)
}

// =============================================================================
// Model -> DTO
// =============================================================================

fn to_json(component: &DataComponent) -> ComponentJson {
    let mut dto = ComponentJson {
        kind: component.kind_name().to_string(),
        name: (!component.name.is_empty()).then(|| component.name.clone()),
        id: component.id.clone(),
        definition: component.definition.clone(),
        label: component.label.clone(),
        description: component.description.clone(),
        optional: component.optional,
        updatable: component.updatable,
        ..ComponentJson::default()
    };

    match &component.kind {
        ComponentKind::Scalar(s) => {
            if s.data_type != s.kind.default_data_type() {
                dto.data_type = Some(s.data_type);
            }
            dto.uom = s.uom.clone();
            dto.code_space = s.code_space.clone();
            dto.reference_frame = s.reference_frame.clone();
            dto.axis_id = s.axis_id.clone();
            dto.constraint = s.constraint.as_ref().map(|c| constraint_to_json(s, c));
            dto.value = s.value.as_ref().map(|v| scalar_value_to_json(s, v));
        }
        ComponentKind::Record(r) => dto.fields = Some(r.fields.iter().map(to_json).collect()),
        ComponentKind::Vector(v) => {
            dto.reference_frame = v.reference_frame.clone();
            dto.local_frame = v.local_frame.clone();
            dto.coordinates = Some(v.coordinates.iter().map(to_json).collect());
        }
        ComponentKind::Choice(c) => dto.items = Some(c.items.iter().map(to_json).collect()),
        ComponentKind::Array(a) => {
            dto.element_count = Some(element_count_to_json(&a.element_count));
            dto.element_type = Some(Box::new(to_json(&a.element_type)));
        }
        ComponentKind::Matrix(m) => {
            dto.reference_frame = m.reference_frame.clone();
            dto.local_frame = m.local_frame.clone();
            dto.element_count = Some(element_count_to_json(&ElementCount::Fixed(m.element_count)));
            dto.element_type = Some(Box::new(to_json(&m.element_type)));
        }
    }
    dto
}

fn element_count_to_json(count: &ElementCount) -> ElementCountJson {
    let inline = |value: Option<Value>| {
        ElementCountJson::Inline(Box::new(ComponentJson {
            kind: ScalarKind::Count.name().to_string(),
            value,
            ..ComponentJson::default()
        }))
    };
    match count {
        ElementCount::SizeComponent(r) => ElementCountJson::Href {
            href: format!("#{}", r.trim_start_matches('#')),
        },
        ElementCount::Fixed(n) => inline(Some(Value::from(*n))),
        ElementCount::Implicit => inline(None),
    }
}

fn constraint_to_json(scalar: &Scalar, constraint: &Constraint) -> ConstraintJson {
    match constraint {
        Constraint::AllowedValues {
            values,
            intervals,
            significant_figures,
        } => ConstraintJson::AllowedValues {
            values: values.clone(),
            intervals: intervals.iter().map(|(lo, hi)| [*lo, *hi]).collect(),
            significant_figures: *significant_figures,
        },
        Constraint::AllowedTokens { values } => ConstraintJson::AllowedTokens {
            values: values.clone(),
        },
        Constraint::AllowedTimes { values, intervals } => ConstraintJson::AllowedTimes {
            values: values.iter().map(|t| time_to_json(scalar, *t)).collect(),
            intervals: intervals
                .iter()
                .map(|(lo, hi)| [time_to_json(scalar, *lo), time_to_json(scalar, *hi)])
                .collect(),
        },
    }
}

fn time_to_json(scalar: &Scalar, t: f64) -> Value {
    match format_iso(t) {
        Some(iso) if scalar.is_iso_time() => Value::String(iso),
        _ => number(t),
    }
}

fn number(v: f64) -> Value {
    serde_json::Number::from_f64(v).map_or(Value::Null, Value::Number)
}

/// JSON form of an atom: ISO strings for ISO-8601 times, JSON numbers,
/// booleans and strings otherwise. Non-finite floats become `null`.
pub(crate) fn scalar_value_to_json(scalar: &Scalar, value: &ScalarValue) -> Value {
    if scalar.is_iso_time() && value.data_type().is_numeric() {
        if let Some(t) = value.as_f64() {
            return time_to_json(scalar, t);
        }
    }
    match value {
        ScalarValue::Boolean(b) => Value::Bool(*b),
        ScalarValue::Byte(v) => Value::from(*v),
        ScalarValue::UByte(v) => Value::from(*v),
        ScalarValue::Short(v) => Value::from(*v),
        ScalarValue::UShort(v) => Value::from(*v),
        ScalarValue::Int(v) => Value::from(*v),
        ScalarValue::UInt(v) => Value::from(*v),
        ScalarValue::Long(v) => Value::from(*v),
        ScalarValue::Float(v) => number(f64::from(*v)),
        ScalarValue::Double(v) => number(*v),
        ScalarValue::Text(s) => Value::String(s.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use swe_common::{BinaryEncoding, BinaryMember, ByteOrder, SweBuilder, TextEncoding};

    #[test]
    fn test_read_documented_example() {
        let json = r##"{
            "type": "DataRecord",
            "fields": [
                { "type": "Quantity", "name": "temp", "uom": { "code": "Cel" } },
                { "type": "Count", "name": "n", "id": "N" },
                {
                    "type": "DataArray",
                    "name": "samples",
                    "elementCount": { "href": "#N" },
                    "elementType": { "type": "Quantity", "name": "v", "uom": { "code": "m" } }
                }
            ]
        }"##;
        let root = read_component(json).unwrap();
        assert_eq!(root.component_count(), 3);
        assert_eq!(root.find("samples").unwrap().as_array().unwrap().size_ref(), Some("N"));
        assert_eq!(root.find("samples/v").unwrap().data_type(), Some(DataType::Double));
    }

    #[test]
    fn test_component_round_trip() {
        let root = SweBuilder::record("obs")
            .with_label("Observation")
            .field(SweBuilder::time_iso("time").with_value(1_705_320_000.0))
            .field(SweBuilder::quantity("temp", "Cel").with_allowed_interval(-80.0, 60.0))
            .field(SweBuilder::count("n").with_data_type(DataType::UShort).with_id("N"))
            .field(SweBuilder::variable_array("v", "N", SweBuilder::quantity("x", "m")))
            .field(SweBuilder::fixed_array("f", 2, SweBuilder::boolean("b")))
            .field(SweBuilder::implicit_array("i", SweBuilder::text("t")))
            .field(SweBuilder::matrix(
                "rot",
                3,
                SweBuilder::vector("row", "urn:frame")
                    .coordinate(SweBuilder::quantity("x", "1"))
                    .coordinate(SweBuilder::quantity("y", "1"))
                    .coordinate(SweBuilder::quantity("z", "1")),
            ))
            .field(SweBuilder::choice("c").item(SweBuilder::category("a")).item(SweBuilder::count("b")))
            .build()
            .unwrap();

        let json = write_component(&root, true).unwrap();
        assert!(json.contains("\"2024-01-15T12:00:00Z\""));
        assert!(json.contains("unsignedShort"));
        assert_eq!(read_component(&json).unwrap(), root);
    }

    #[test]
    fn test_element_count_forms() {
        let fixed = r#"{"type":"DataArray","elementCount":{"type":"Count","value":5},"elementType":{"type":"Boolean"}}"#;
        let array = read_component(fixed).unwrap();
        assert_eq!(array.as_array().unwrap().fixed_size(), Some(5));
        assert_eq!(array.as_array().unwrap().element_type.name, "element");

        let implicit = r#"{"type":"DataArray","elementType":{"type":"Boolean","name":"b"}}"#;
        assert!(read_component(implicit).unwrap().as_array().unwrap().is_implicit_size());
    }

    #[test]
    fn test_rejects_unknown_type_and_unnamed_field() {
        assert!(matches!(
            read_component(r#"{"type":"Geometry"}"#),
            Err(BindingError::InvalidSchema(_))
        ));
        assert!(matches!(
            read_component(r#"{"type":"DataRecord","fields":[{"type":"Count"}]}"#),
            Err(BindingError::InvalidSchema(_))
        ));
        assert!(matches!(read_component("{"), Err(BindingError::Json(_))));
    }

    #[test]
    fn test_value_conversion() {
        let count = Scalar::new(ScalarKind::Count);
        assert_eq!(
            scalar_value_from_json(&count, &serde_json::json!(4)).unwrap(),
            ScalarValue::Int(4)
        );
        assert!(scalar_value_from_json(&count, &serde_json::json!(4.5)).is_err());

        let q = Scalar::new(ScalarKind::Quantity);
        match scalar_value_from_json(&q, &Value::Null).unwrap() {
            ScalarValue::Double(v) => assert!(v.is_nan()),
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(scalar_value_to_json(&q, &ScalarValue::Double(f64::INFINITY)), Value::Null);
    }

    #[test]
    fn test_data_stream_round_trip() {
        let root = SweBuilder::record("obs")
            .field(SweBuilder::quantity("temp", "Cel"))
            .build()
            .unwrap();
        let encoding = DataEncoding::Binary(
            BinaryEncoding::new(ByteOrder::LittleEndian).with_member(BinaryMember::new("temp", DataType::Float)),
        );
        let stream = DataStream::new(root, encoding);
        let json = write_data_stream(&stream, false).unwrap();
        assert!(json.contains("\"type\":\"BinaryEncoding\""));

        let back = read_data_stream(&json).unwrap();
        assert_eq!(back.element_type.find("temp").unwrap().data_type(), Some(DataType::Float));
        assert_eq!(back.encoding, stream.encoding);
    }

    #[test]
    fn test_data_stream_keeps_json_values() {
        let json = r#"{
            "elementType": {"type": "Quantity", "name": "t"},
            "encoding": {"type": "JSONEncoding"},
            "values": [1.5, 2.5]
        }"#;
        let stream = read_data_stream(json).unwrap();
        assert_eq!(stream.values.as_deref(), Some("[1.5,2.5]"));

        let json = r#"{
            "elementType": {"type": "Quantity", "name": "t"},
            "encoding": {"type": "TextEncoding", "tokenSeparator": ";"},
            "values": "1.5;2.5"
        }"#;
        let stream = read_data_stream(json).unwrap();
        assert_eq!(
            stream.encoding,
            DataEncoding::Text(TextEncoding::new(";", "\n"))
        );
    }
}
