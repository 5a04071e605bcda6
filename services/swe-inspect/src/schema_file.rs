//! Loading schema files in either interchange format.

use std::path::Path;

use anyhow::{Context, Result};
use swe_bindings::schema::{json, xml};
use swe_bindings::DataStream;
use swe_common::{DataEncoding, TextEncoding};
use tracing::{info, warn};

/// Load a DataStream or a bare component from `path`.
///
/// JSON is recognized by a leading `{`, XML otherwise. A bare component is
/// given a default text encoding and no values.
pub fn load(path: &Path) -> Result<DataStream> {
    let contents =
        std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    let stream = parse(&contents).with_context(|| format!("failed to load schema {}", path.display()))?;
    info!(
        path = %path.display(),
        root = %stream.element_type.name,
        encoding = stream.encoding.kind_name(),
        "Loaded schema"
    );
    Ok(stream)
}

pub fn parse(contents: &str) -> Result<DataStream> {
    if contents.trim_start().starts_with('{') {
        let value: serde_json::Value = serde_json::from_str(contents)?;
        if value.get("elementType").is_some() {
            return Ok(json::read_data_stream(contents)?);
        }
        let component = json::read_component(contents)?;
        return Ok(bare(component));
    }

    if is_xml_data_stream(contents) {
        Ok(xml::read_data_stream(contents)?)
    } else {
        Ok(bare(xml::read_component(contents)?))
    }
}

fn bare(component: swe_common::DataComponent) -> DataStream {
    warn!(root = %component.name, "Schema has no encoding, assuming default text encoding");
    DataStream::new(component, DataEncoding::Text(TextEncoding::default()))
}

/// Whether the document element is a DataStream, judged by its first tag.
fn is_xml_data_stream(contents: &str) -> bool {
    contents
        .match_indices('<')
        .map(|(i, _)| &contents[i + 1..])
        .find(|rest| !rest.starts_with('?') && !rest.starts_with('!'))
        .map(|tag| {
            let name: String = tag
                .chars()
                .take_while(|c| !c.is_whitespace() && *c != '>' && *c != '/')
                .collect();
            name.rsplit(':').next() == Some("DataStream")
        })
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_json_forms() {
        let stream = parse(r#"{"type": "Quantity", "name": "t", "uom": {"code": "Cel"}}"#).unwrap();
        assert_eq!(stream.element_type.name, "t");
        assert_eq!(stream.encoding, DataEncoding::Text(TextEncoding::default()));

        let stream = parse(
            r#"{"elementType": {"type": "Count", "name": "c"}, "encoding": {"type": "JSONEncoding"}}"#,
        )
        .unwrap();
        assert!(matches!(stream.encoding, DataEncoding::Json(_)));
    }

    #[test]
    fn test_parse_xml_forms() {
        let component = r#"<?xml version="1.0"?>
            <!-- a lone quantity -->
            <swe:Quantity xmlns:swe="http://www.opengis.net/swe/2.0"><swe:uom code="m"/></swe:Quantity>"#;
        assert!(!is_xml_data_stream(component));
        assert!(parse(component).unwrap().element_type.is_scalar());

        let stream = r#"<swe:DataStream xmlns:swe="http://www.opengis.net/swe/2.0">
            <swe:elementType name="c"><swe:Count/></swe:elementType>
            <swe:encoding><swe:XMLEncoding/></swe:encoding>
        </swe:DataStream>"#;
        assert!(is_xml_data_stream(stream));
        assert!(matches!(parse(stream).unwrap().encoding, DataEncoding::Xml(_)));
    }

    #[test]
    fn test_load_sample_file() {
        let path = test_utils::require_test_file!("weather_stream.xml");
        let stream = load(&path).unwrap();
        assert_eq!(stream.element_type.name, "weather");
        assert!(stream.values.is_some());
    }
}
