//! SWE Common 2.0 XML for component trees, encodings and data streams.
//!
//! Documents are parsed into an [`XmlElement`] tree first. Elements the
//! model has no place for (quality, nil values, extensions) are skipped with
//! a warning.

use tracing::{debug, warn};

use swe_common::{
    BinaryEncoding, BinaryMember, ByteEncoding, ByteOrder, ComponentKind, Constraint, DataArray,
    DataChoice, DataComponent, DataEncoding, DataRecord, DataType, ElementCount, JsonEncoding,
    Matrix, Scalar, ScalarKind, ScalarValue, TextEncoding, UnitOfMeasure, Vector, XmlEncoding,
};

use crate::error::{BindingError, Result};
use crate::schema::DataStream;
use crate::time::{format_iso, parse_iso};
use crate::xml::{XmlElement, SWE_NS, XLINK_NS};

const SCALAR_CHILDREN: &[&str] = &[
    "identifier",
    "label",
    "description",
    "uom",
    "codeSpace",
    "constraint",
    "value",
];

// =============================================================================
// Public API
// =============================================================================

/// Read a component tree whose root element is a SWE component.
pub fn read_component(xml: &str) -> Result<DataComponent> {
    let root = XmlElement::parse(xml)?;
    let name = root.attr("name").unwrap_or_default().to_string();
    let component = component_from_xml(&root, name)?;
    component.validate()?;
    debug!(
        component = %component.name,
        kind = component.kind_name(),
        "Read component from XML"
    );
    Ok(component)
}

/// Write a component tree as a standalone SWE XML document.
pub fn write_component(component: &DataComponent) -> Result<String> {
    with_namespaces(component_to_xml(component)).to_xml(true)
}

/// Read a standalone encoding element.
pub fn read_encoding(xml: &str) -> Result<DataEncoding> {
    encoding_from_xml(&XmlElement::parse(xml)?)
}

pub fn write_encoding(encoding: &DataEncoding) -> Result<String> {
    with_namespaces(encoding_to_xml(encoding)).to_xml(true)
}

/// Read a `swe:DataStream` document: element type, encoding and inline
/// values.
pub fn read_data_stream(xml: &str) -> Result<DataStream> {
    let root = XmlElement::parse(xml)?;
    if root.local_name() != "DataStream" {
        return Err(BindingError::invalid_schema(format!(
            "expected DataStream, found {}",
            root.local_name()
        )));
    }

    let element_type = root
        .child("elementType")
        .ok_or_else(|| BindingError::invalid_schema("DataStream has no elementType"))?;
    let component = component_from_xml(
        first_element(element_type)?,
        element_type.attr("name").unwrap_or_default().to_string(),
    )?;

    let encoding = match root.child("encoding") {
        Some(e) => encoding_from_xml(first_element(e)?)?,
        None => {
            warn!("DataStream has no encoding, assuming text");
            DataEncoding::Text(TextEncoding::default())
        }
    };

    let values = root
        .child("values")
        .map(|v| v.text.clone())
        .filter(|v| !v.trim().is_empty());

    DataStream {
        element_type: component,
        encoding,
        values,
    }
    .resolve()
}

pub fn write_data_stream(stream: &DataStream) -> Result<String> {
    let mut root = XmlElement::new("swe:DataStream")
        .with_child(
            XmlElement::new("swe:elementType")
                .with_attr("name", stream.element_type.name.as_str())
                .with_child(component_to_xml(&stream.element_type)),
        )
        .with_child(XmlElement::new("swe:encoding").with_child(encoding_to_xml(&stream.encoding)));
    if let Some(values) = &stream.values {
        root.push(XmlElement::new("swe:values").with_text(values.as_str()));
    }
    with_namespaces(root).to_xml(true)
}

fn with_namespaces(element: XmlElement) -> XmlElement {
    let mut root = XmlElement::new(element.name.clone())
        .with_attr("xmlns:swe", SWE_NS)
        .with_attr("xmlns:xlink", XLINK_NS);
    root.attributes.extend(element.attributes);
    root.children = element.children;
    root.text = element.text;
    root
}

fn first_element(parent: &XmlElement) -> Result<&XmlElement> {
    parent.children.first().ok_or_else(|| {
        BindingError::invalid_schema(format!("{} has no content", parent.local_name()))
    })
}

// =============================================================================
// Components: reading
// =============================================================================

fn component_from_xml(element: &XmlElement, name: String) -> Result<DataComponent> {
    let kind = match element.local_name() {
        "DataRecord" => ComponentKind::Record(DataRecord {
            fields: named_children(element, "field")?,
        }),
        "Vector" => ComponentKind::Vector(Vector {
            reference_frame: element.attr("referenceFrame").map(String::from),
            local_frame: element.attr("localFrame").map(String::from),
            coordinates: named_children(element, "coordinate")?,
        }),
        "DataChoice" => {
            let mut choice = DataChoice::new();
            for item in named_children(element, "item")? {
                choice.add_item(item)?;
            }
            ComponentKind::Choice(choice)
        }
        "DataArray" => {
            let element_count = element_count_from_xml(element)?;
            ComponentKind::Array(DataArray {
                element_count,
                element_type: Box::new(element_type_from_xml(element)?),
            })
        }
        "Matrix" => {
            let rows = match element_count_from_xml(element)? {
                ElementCount::Fixed(n) => n,
                _ => {
                    return Err(BindingError::invalid_schema(format!(
                        "matrix '{}' must have a fixed element count",
                        name
                    )))
                }
            };
            ComponentKind::Matrix(Matrix {
                reference_frame: element.attr("referenceFrame").map(String::from),
                local_frame: element.attr("localFrame").map(String::from),
                element_count: rows,
                element_type: Box::new(element_type_from_xml(element)?),
            })
        }
        other => match ScalarKind::from_name(other) {
            Some(kind) => ComponentKind::Scalar(scalar_from_xml(element, kind)?),
            None => {
                return Err(BindingError::invalid_schema(format!(
                    "unsupported component element '{}'",
                    element.name
                )))
            }
        },
    };

    let mut component = DataComponent::new(name, kind);
    component.id = element.attr("id").map(String::from);
    component.definition = element.attr("definition").map(String::from);
    component.label = element.child_text("label").map(String::from);
    component.description = element.child_text("description").map(String::from);
    component.optional = bool_attr(element, "optional")?;
    component.updatable = bool_attr(element, "updatable")?;
    Ok(component)
}

/// Components wrapped in `swe:field`, `swe:coordinate` or `swe:item`
/// property elements carrying the name.
fn named_children(element: &XmlElement, property: &str) -> Result<Vec<DataComponent>> {
    element
        .children_named(property)
        .map(|p| {
            let name = p.attr("name").ok_or_else(|| {
                BindingError::invalid_schema(format!("{} without a name attribute", property))
            })?;
            component_from_xml(first_element(p)?, name.to_string())
        })
        .collect()
}

fn element_type_from_xml(array: &XmlElement) -> Result<DataComponent> {
    let property = array
        .child("elementType")
        .ok_or_else(|| BindingError::invalid_schema("array has no elementType"))?;
    component_from_xml(
        first_element(property)?,
        property.attr("name").unwrap_or("element").to_string(),
    )
}

/// `xlink:href` names a size component; an inline Count fixes the size when
/// it has a value and leaves it implicit otherwise.
fn element_count_from_xml(array: &XmlElement) -> Result<ElementCount> {
    let Some(count) = array.child("elementCount") else {
        return Ok(ElementCount::Implicit);
    };
    if let Some(href) = count.attr("href") {
        return Ok(ElementCount::SizeComponent(
            href.trim_start_matches('#').to_string(),
        ));
    }
    match count.child("Count").and_then(|c| c.child_text("value")) {
        Some(text) => text.parse().map(ElementCount::Fixed).map_err(|_| {
            BindingError::invalid_schema(format!("invalid element count '{}'", text))
        }),
        None => Ok(ElementCount::Implicit),
    }
}

fn scalar_from_xml(element: &XmlElement, kind: ScalarKind) -> Result<Scalar> {
    let mut scalar = Scalar::new(kind);
    scalar.reference_frame = element.attr("referenceFrame").map(String::from);
    scalar.axis_id = element.attr("axisID").map(String::from);

    if let Some(uom) = element.child("uom") {
        scalar.uom = Some(UnitOfMeasure {
            code: uom.attr("code").map(String::from),
            href: uom.attr("href").map(String::from),
        });
    }
    if let Some(code_space) = element.child("codeSpace") {
        scalar.code_space = code_space.attr("href").map(String::from);
    }
    if let Some(constraint) = element.child("constraint") {
        scalar.constraint = Some(constraint_from_xml(first_element(constraint)?, &scalar)?);
    }
    if let Some(text) = element.child_text("value") {
        scalar.value = Some(scalar_value_from_text(&scalar, text)?);
    }

    for child in &element.children {
        if !SCALAR_CHILDREN.contains(&child.local_name()) {
            warn!(
                element = %child.name,
                scalar = kind.name(),
                "Skipping unsupported scalar property"
            );
        }
    }
    Ok(scalar)
}

fn constraint_from_xml(element: &XmlElement, scalar: &Scalar) -> Result<Constraint> {
    match element.local_name() {
        "AllowedValues" => Ok(Constraint::AllowedValues {
            values: element
                .children_named("value")
                .map(|v| parse_number(v.text.trim()))
                .collect::<Result<_>>()?,
            intervals: element
                .children_named("interval")
                .map(|i| parse_interval(i.text.trim(), parse_number))
                .collect::<Result<_>>()?,
            significant_figures: element
                .child_text("significantFigures")
                .and_then(|s| s.parse().ok()),
        }),
        "AllowedTokens" => {
            if element.child("pattern").is_some() {
                warn!("Ignoring AllowedTokens pattern");
            }
            Ok(Constraint::AllowedTokens {
                values: element
                    .children_named("value")
                    .map(|v| v.text.trim().to_string())
                    .collect(),
            })
        }
        "AllowedTimes" => {
            let parse_time = |s: &str| time_from_text(scalar, s);
            Ok(Constraint::AllowedTimes {
                values: element
                    .children_named("value")
                    .map(|v| parse_time(v.text.trim()))
                    .collect::<Result<_>>()?,
                intervals: element
                    .children_named("interval")
                    .map(|i| parse_interval(i.text.trim(), parse_time))
                    .collect::<Result<_>>()?,
            })
        }
        other => Err(BindingError::invalid_schema(format!(
            "unsupported constraint '{}'",
            other
        ))),
    }
}

fn parse_number(text: &str) -> Result<f64> {
    text.parse()
        .map_err(|_| BindingError::invalid_schema(format!("invalid number '{}'", text)))
}

fn parse_interval(text: &str, parse: impl Fn(&str) -> Result<f64>) -> Result<(f64, f64)> {
    let mut bounds = text.split_whitespace();
    match (bounds.next(), bounds.next(), bounds.next()) {
        (Some(lo), Some(hi), None) => Ok((parse(lo)?, parse(hi)?)),
        _ => Err(BindingError::invalid_schema(format!(
            "interval must have two bounds: '{}'",
            text
        ))),
    }
}

fn time_from_text(scalar: &Scalar, text: &str) -> Result<f64> {
    if scalar.is_iso_time() {
        if let Some(t) = parse_iso(text) {
            return Ok(t);
        }
    }
    parse_number(text)
}

/// Schema values use ISO timestamps for ISO-8601 times and plain text
/// otherwise.
fn scalar_value_from_text(scalar: &Scalar, text: &str) -> Result<ScalarValue> {
    if scalar.is_iso_time() && scalar.data_type.is_numeric() {
        return Ok(ScalarValue::Double(time_from_text(scalar, text)?).convert(scalar.data_type)?);
    }
    Ok(ScalarValue::from(text).convert(scalar.data_type)?)
}

fn bool_attr(element: &XmlElement, name: &str) -> Result<bool> {
    match element.attr(name) {
        None => Ok(false),
        Some("true") | Some("1") => Ok(true),
        Some("false") | Some("0") => Ok(false),
        Some(other) => Err(BindingError::invalid_schema(format!(
            "invalid boolean '{}' for {}",
            other, name
        ))),
    }
}

// =============================================================================
// Components: writing
// =============================================================================

fn component_to_xml(component: &DataComponent) -> XmlElement {
    let mut element = XmlElement::new(format!("swe:{}", component.kind_name()))
        .with_opt_attr("id", component.id.as_deref())
        .with_opt_attr("definition", component.definition.as_deref());
    if component.optional {
        element = element.with_attr("optional", "true");
    }
    if component.updatable {
        element = element.with_attr("updatable", "true");
    }
    if let Some(label) = &component.label {
        element.push(XmlElement::new("swe:label").with_text(label.as_str()));
    }
    if let Some(description) = &component.description {
        element.push(XmlElement::new("swe:description").with_text(description.as_str()));
    }

    match &component.kind {
        ComponentKind::Scalar(s) => scalar_to_xml(element, s),
        ComponentKind::Record(r) => push_named(element, "swe:field", &r.fields),
        ComponentKind::Vector(v) => {
            let element = element
                .with_opt_attr("referenceFrame", v.reference_frame.as_deref())
                .with_opt_attr("localFrame", v.local_frame.as_deref());
            push_named(element, "swe:coordinate", &v.coordinates)
        }
        ComponentKind::Choice(c) => push_named(element, "swe:item", &c.items),
        ComponentKind::Array(a) => element
            .with_child(element_count_to_xml(&a.element_count))
            .with_child(element_type_to_xml(&a.element_type)),
        ComponentKind::Matrix(m) => element
            .with_opt_attr("referenceFrame", m.reference_frame.as_deref())
            .with_opt_attr("localFrame", m.local_frame.as_deref())
            .with_child(element_count_to_xml(&ElementCount::Fixed(m.element_count)))
            .with_child(element_type_to_xml(&m.element_type)),
    }
}

fn push_named(mut element: XmlElement, property: &str, children: &[DataComponent]) -> XmlElement {
    for child in children {
        element.push(
            XmlElement::new(property)
                .with_attr("name", child.name.as_str())
                .with_child(component_to_xml(child)),
        );
    }
    element
}

fn element_count_to_xml(count: &ElementCount) -> XmlElement {
    let property = XmlElement::new("swe:elementCount");
    match count {
        ElementCount::SizeComponent(r) => property.with_attr("xlink:href", format!("#{}", r.trim_start_matches('#'))),
        ElementCount::Fixed(n) => property.with_child(
            XmlElement::new("swe:Count").with_child(XmlElement::new("swe:value").with_text(n.to_string())),
        ),
        ElementCount::Implicit => property.with_child(XmlElement::new("swe:Count")),
    }
}

fn element_type_to_xml(element_type: &DataComponent) -> XmlElement {
    XmlElement::new("swe:elementType")
        .with_attr("name", element_type.name.as_str())
        .with_child(component_to_xml(element_type))
}

fn scalar_to_xml(element: XmlElement, scalar: &Scalar) -> XmlElement {
    let mut element = element
        .with_opt_attr("referenceFrame", scalar.reference_frame.as_deref())
        .with_opt_attr("axisID", scalar.axis_id.as_deref());

    if let Some(code_space) = &scalar.code_space {
        element.push(XmlElement::new("swe:codeSpace").with_attr("xlink:href", code_space.as_str()));
    }
    if let Some(uom) = &scalar.uom {
        element.push(
            XmlElement::new("swe:uom")
                .with_opt_attr("code", uom.code.as_deref())
                .with_opt_attr("xlink:href", uom.href.as_deref()),
        );
    }
    if let Some(constraint) = &scalar.constraint {
        element.push(XmlElement::new("swe:constraint").with_child(constraint_to_xml(scalar, constraint)));
    }
    if let Some(value) = &scalar.value {
        element.push(XmlElement::new("swe:value").with_text(scalar_value_to_text(scalar, value)));
    }
    element
}

fn constraint_to_xml(scalar: &Scalar, constraint: &Constraint) -> XmlElement {
    let mut element = XmlElement::new(format!("swe:{}", constraint.kind_name()));
    match constraint {
        Constraint::AllowedValues {
            values,
            intervals,
            significant_figures,
        } => {
            for v in values {
                element.push(XmlElement::new("swe:value").with_text(v.to_string()));
            }
            for (lo, hi) in intervals {
                element.push(XmlElement::new("swe:interval").with_text(format!("{} {}", lo, hi)));
            }
            if let Some(sf) = significant_figures {
                element.push(XmlElement::new("swe:significantFigures").with_text(sf.to_string()));
            }
        }
        Constraint::AllowedTokens { values } => {
            for v in values {
                element.push(XmlElement::new("swe:value").with_text(v.as_str()));
            }
        }
        Constraint::AllowedTimes { values, intervals } => {
            let time = |t: f64| time_to_text(scalar, t);
            for v in values {
                element.push(XmlElement::new("swe:value").with_text(time(*v)));
            }
            for (lo, hi) in intervals {
                element.push(XmlElement::new("swe:interval").with_text(format!("{} {}", time(*lo), time(*hi))));
            }
        }
    }
    element
}

fn time_to_text(scalar: &Scalar, t: f64) -> String {
    if scalar.is_iso_time() {
        if let Some(iso) = format_iso(t) {
            return iso;
        }
    }
    t.to_string()
}

fn scalar_value_to_text(scalar: &Scalar, value: &ScalarValue) -> String {
    match value.as_f64() {
        Some(t) if scalar.is_iso_time() && value.data_type().is_numeric() => time_to_text(scalar, t),
        _ => value.to_string(),
    }
}

// =============================================================================
// Encodings
// =============================================================================

fn encoding_from_xml(element: &XmlElement) -> Result<DataEncoding> {
    match element.local_name() {
        "TextEncoding" => {
            let defaults = TextEncoding::default();
            let encoding = TextEncoding {
                token_separator: element
                    .attr("tokenSeparator")
                    .map(String::from)
                    .unwrap_or(defaults.token_separator),
                block_separator: element
                    .attr("blockSeparator")
                    .map(String::from)
                    .unwrap_or(defaults.block_separator),
                decimal_separator: element
                    .attr("decimalSeparator")
                    .map(String::from)
                    .unwrap_or(defaults.decimal_separator),
                collapse_white_spaces: match element.attr("collapseWhiteSpaces") {
                    Some(_) => bool_attr(element, "collapseWhiteSpaces")?,
                    None => defaults.collapse_white_spaces,
                },
            };
            encoding.validate()?;
            Ok(DataEncoding::Text(encoding))
        }
        "BinaryEncoding" => Ok(DataEncoding::Binary(binary_from_xml(element)?)),
        "XMLEncoding" => Ok(DataEncoding::Xml(XmlEncoding {
            namespace: element.attr("namespace").map(String::from),
        })),
        "JSONEncoding" => Ok(DataEncoding::Json(JsonEncoding {
            records_as_arrays: bool_attr(element, "recordsAsArrays")?,
        })),
        other => Err(BindingError::UnsupportedEncoding(other.to_string())),
    }
}

fn binary_from_xml(element: &XmlElement) -> Result<BinaryEncoding> {
    let byte_order = match element.attr("byteOrder") {
        Some(s) => ByteOrder::parse(s)
            .ok_or_else(|| BindingError::invalid_schema(format!("invalid byte order '{}'", s)))?,
        None => ByteOrder::default(),
    };
    let byte_encoding = match element.attr("byteEncoding") {
        None | Some("raw") => ByteEncoding::Raw,
        Some("base64") => ByteEncoding::Base64,
        Some(other) => return Err(BindingError::UnsupportedEncoding(other.to_string())),
    };

    let mut encoding = BinaryEncoding {
        byte_order,
        byte_encoding,
        byte_length: usize_attr(element, "byteLength")?,
        members: Vec::new(),
    };

    for member in element.children_named("member") {
        for entry in &member.children {
            if entry.local_name() != "Component" {
                warn!(element = %entry.name, "Skipping unsupported binary member");
                continue;
            }
            let reference = entry
                .attr("ref")
                .ok_or_else(|| BindingError::invalid_schema("binary member without ref"))?;
            let data_type = match entry.attr("dataType") {
                Some(uri) => Some(DataType::from_uri(uri).ok_or_else(|| {
                    BindingError::invalid_schema(format!("unknown data type '{}'", uri))
                })?),
                None => None,
            };
            encoding.members.push(BinaryMember {
                reference: reference.to_string(),
                data_type,
                byte_length: usize_attr(entry, "byteLength")?,
            });
        }
    }
    Ok(encoding)
}

fn usize_attr(element: &XmlElement, name: &str) -> Result<Option<usize>> {
    element
        .attr(name)
        .map(|v| {
            v.parse()
                .map_err(|_| BindingError::invalid_schema(format!("invalid {} '{}'", name, v)))
        })
        .transpose()
}

fn encoding_to_xml(encoding: &DataEncoding) -> XmlElement {
    match encoding {
        DataEncoding::Text(t) => XmlElement::new("swe:TextEncoding")
            .with_attr("collapseWhiteSpaces", t.collapse_white_spaces.to_string())
            .with_attr("decimalSeparator", t.decimal_separator.as_str())
            .with_attr("tokenSeparator", t.token_separator.as_str())
            .with_attr("blockSeparator", t.block_separator.as_str()),
        DataEncoding::Binary(b) => {
            let mut element = XmlElement::new("swe:BinaryEncoding")
                .with_attr("byteOrder", b.byte_order.as_str())
                .with_attr("byteEncoding", b.byte_encoding.as_str());
            if let Some(len) = b.byte_length {
                element = element.with_attr("byteLength", len.to_string());
            }
            for m in &b.members {
                let mut entry = XmlElement::new("swe:Component").with_attr("ref", m.reference.as_str());
                if let Some(dt) = m.data_type {
                    entry = entry.with_attr("dataType", dt.uri());
                }
                if let Some(len) = m.byte_length {
                    entry = entry.with_attr("byteLength", len.to_string());
                }
                element.push(XmlElement::new("swe:member").with_child(entry));
            }
            element
        }
        DataEncoding::Xml(x) => {
            XmlElement::new("swe:XMLEncoding").with_opt_attr("namespace", x.namespace.as_deref())
        }
        DataEncoding::Json(j) => {
            let element = XmlElement::new("swe:JSONEncoding");
            if j.records_as_arrays {
                element.with_attr("recordsAsArrays", "true")
            } else {
                element
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use swe_common::SweBuilder;

    const WEATHER_XML: &str = r##"<?xml version="1.0" encoding="UTF-8"?>
<swe:DataRecord xmlns:swe="http://www.opengis.net/swe/2.0"
                xmlns:xlink="http://www.w3.org/1999/xlink"
                definition="urn:example:weather">
  <swe:label>Weather</swe:label>
  <swe:field name="time">
    <swe:Time definition="http://www.opengis.net/def/property/OGC/0/SamplingTime">
      <swe:uom xlink:href="http://www.opengis.net/def/uom/ISO-8601/0/Gregorian"/>
    </swe:Time>
  </swe:field>
  <swe:field name="temperature">
    <swe:Quantity>
      <swe:uom code="Cel"/>
      <swe:constraint>
        <swe:AllowedValues><swe:interval>-80 60</swe:interval></swe:AllowedValues>
      </swe:constraint>
    </swe:Quantity>
  </swe:field>
  <swe:field name="num">
    <swe:Count id="NUM"/>
  </swe:field>
  <swe:field name="samples">
    <swe:DataArray>
      <swe:elementCount xlink:href="#NUM"/>
      <swe:elementType name="sample">
        <swe:Quantity><swe:uom code="m"/><swe:quality/></swe:Quantity>
      </swe:elementType>
    </swe:DataArray>
  </swe:field>
</swe:DataRecord>"##;

    #[test]
    fn test_read_component() {
        let root = read_component(WEATHER_XML).unwrap();
        assert_eq!(root.definition.as_deref(), Some("urn:example:weather"));
        assert_eq!(root.label.as_deref(), Some("Weather"));
        assert_eq!(root.component_count(), 4);

        let time = root.find("time").unwrap().as_scalar().unwrap();
        assert!(time.is_iso_time());

        let temp = root.find("temperature").unwrap().as_scalar().unwrap();
        assert_eq!(temp.uom, Some(UnitOfMeasure::code("Cel")));
        assert!(temp.check_value(&ScalarValue::Double(61.0)).is_err());

        let samples = root.find("samples").unwrap().as_array().unwrap();
        assert_eq!(samples.size_ref(), Some("NUM"));
        assert_eq!(samples.element_type.name, "sample");
    }

    #[test]
    fn test_component_round_trip() {
        let root = SweBuilder::record("obs")
            .with_definition("urn:x:obs")
            .field(SweBuilder::time_iso("time").with_value(1_705_320_000.0))
            .field(SweBuilder::category("kind").with_allowed_tokens(["rain", "snow"]))
            .field(SweBuilder::vector("pos", "urn:ogc:def:crs:EPSG::4326")
                .coordinate(SweBuilder::quantity("lat", "deg").with_axis_id("Lat"))
                .coordinate(SweBuilder::quantity("lon", "deg").with_axis_id("Long")))
            .field(SweBuilder::fixed_array("fixed", 3, SweBuilder::quantity("v", "m")))
            .field(SweBuilder::implicit_array("open", SweBuilder::count("c")))
            .field(SweBuilder::choice("msg")
                .item(SweBuilder::boolean("flag"))
                .item(SweBuilder::text("note")))
            .build()
            .unwrap();

        let xml = write_component(&root).unwrap();
        assert!(xml.contains("2024-01-15T12:00:00Z"));
        let mut back = read_component(&xml).unwrap();
        back.name = root.name.clone();
        assert_eq!(back, root);
    }

    #[test]
    fn test_fixed_and_implicit_counts() {
        let xml = r#"<swe:DataArray xmlns:swe="http://www.opengis.net/swe/2.0">
            <swe:elementCount><swe:Count><swe:value>4</swe:value></swe:Count></swe:elementCount>
            <swe:elementType name="v"><swe:Boolean/></swe:elementType>
        </swe:DataArray>"#;
        let array = read_component(xml).unwrap();
        assert_eq!(array.as_array().unwrap().fixed_size(), Some(4));

        let xml = r#"<swe:DataArray xmlns:swe="http://www.opengis.net/swe/2.0">
            <swe:elementCount><swe:Count/></swe:elementCount>
            <swe:elementType name="v"><swe:Boolean/></swe:elementType>
        </swe:DataArray>"#;
        assert!(read_component(xml).unwrap().as_array().unwrap().is_implicit_size());
    }

    #[test]
    fn test_unknown_component_is_rejected() {
        let xml = r#"<swe:QuantityRange xmlns:swe="http://www.opengis.net/swe/2.0"/>"#;
        assert!(matches!(read_component(xml), Err(BindingError::InvalidSchema(_))));
    }

    #[test]
    fn test_unresolved_size_reference_is_rejected() {
        let xml = r##"<swe:DataRecord xmlns:swe="http://www.opengis.net/swe/2.0" xmlns:xlink="http://www.w3.org/1999/xlink">
            <swe:field name="a"><swe:DataArray>
                <swe:elementCount xlink:href="#missing"/>
                <swe:elementType name="v"><swe:Quantity/></swe:elementType>
            </swe:DataArray></swe:field>
        </swe:DataRecord>"##;
        assert!(matches!(read_component(xml), Err(BindingError::Model(_))));
    }

    #[test]
    fn test_encoding_round_trip() {
        let encodings = vec![
            DataEncoding::Text(TextEncoding::new(";", "|").with_decimal_separator(",")),
            DataEncoding::Text(TextEncoding::default()),
            DataEncoding::Binary(
                BinaryEncoding::new(ByteOrder::LittleEndian)
                    .with_member(BinaryMember::new("temp", DataType::Float))
                    .with_member(BinaryMember {
                        reference: "station".to_string(),
                        data_type: Some(DataType::Utf8String),
                        byte_length: Some(8),
                    }),
            ),
            DataEncoding::Xml(XmlEncoding {
                namespace: Some("urn:x".to_string()),
            }),
            DataEncoding::Json(JsonEncoding {
                records_as_arrays: true,
            }),
        ];
        for encoding in encodings {
            let xml = write_encoding(&encoding).unwrap();
            assert_eq!(read_encoding(&xml).unwrap(), encoding);
        }
    }

    #[test]
    fn test_unknown_encoding() {
        let xml = r#"<swe:CsvEncoding xmlns:swe="http://www.opengis.net/swe/2.0"/>"#;
        assert!(matches!(
            read_encoding(xml),
            Err(BindingError::UnsupportedEncoding(_))
        ));
    }

    #[test]
    fn test_data_stream_applies_member_types() {
        let xml = r#"<swe:DataStream xmlns:swe="http://www.opengis.net/swe/2.0">
            <swe:elementType name="obs">
                <swe:DataRecord>
                    <swe:field name="temp"><swe:Quantity><swe:uom code="Cel"/></swe:Quantity></swe:field>
                    <swe:field name="count"><swe:Count/></swe:field>
                </swe:DataRecord>
            </swe:elementType>
            <swe:encoding>
                <swe:BinaryEncoding byteOrder="littleEndian" byteEncoding="raw">
                    <swe:member><swe:Component ref="obs/temp" dataType="http://www.opengis.net/def/dataType/OGC/0/float32"/></swe:member>
                    <swe:member><swe:Component ref="count" dataType="http://www.opengis.net/def/dataType/OGC/0/unsignedShort"/></swe:member>
                </swe:BinaryEncoding>
            </swe:encoding>
        </swe:DataStream>"#;

        let stream = read_data_stream(xml).unwrap();
        assert_eq!(stream.element_type.name, "obs");
        assert_eq!(stream.element_type.find("temp").unwrap().data_type(), Some(DataType::Float));
        assert_eq!(stream.element_type.find("count").unwrap().data_type(), Some(DataType::UShort));
        assert!(stream.values.is_none());
    }

    #[test]
    fn test_data_stream_round_trip_with_values() {
        let root = SweBuilder::record("obs")
            .field(SweBuilder::quantity("temp", "Cel"))
            .build()
            .unwrap();
        let stream = DataStream::new(root, DataEncoding::Text(TextEncoding::default()))
            .with_values("1.5\n2.5\n");
        let xml = write_data_stream(&stream).unwrap();
        let back = read_data_stream(&xml).unwrap();
        assert_eq!(back.element_type, stream.element_type);
        assert_eq!(back.encoding, stream.encoding);
        assert!(back.values.unwrap().contains("2.5"));
    }
}
