//! Command implementations. Each returns its output so it can be tested
//! without touching stdout.

use std::fmt::Write as _;
use std::io::Write as _;
use std::path::Path;

use anyhow::{bail, Context, Result};
use swe_bindings::schema::{json, xml};
use swe_bindings::{codec_for, CodecConfig, DataReader, DataStream, DataWriter};
use swe_common::{ComponentKind, DataComponent, DataEncoding, DataHolder, ElementCount, JsonEncoding, XmlEncoding};
use tracing::info;

use crate::{SchemaFormat, TargetEncoding};

// =============================================================================
// describe
// =============================================================================

/// Component tree, atom layout and encoding summary of a stream.
pub fn describe(stream: &DataStream, config: &CodecConfig) -> Result<String> {
    let root = &stream.element_type;
    let mut out = String::new();

    describe_component(root, 0, &mut out)?;

    match root.fixed_atom_count() {
        Some(n) => writeln!(out, "\natoms: {} (fixed)", n)?,
        None => {
            let holder = DataHolder::new(root.clone())?;
            writeln!(out, "\natoms: {} in an empty block (variable)", holder.atom_count())?
        }
    }
    writeln!(out, "encoding: {}", describe_encoding(&stream.encoding))?;

    if let Some(values) = &stream.values {
        let codec = codec_for(&stream.encoding, config)?;
        let blocks = codec.read_blocks(root, values.as_bytes())?;
        let atoms: usize = blocks.iter().map(|b| b.atom_count()).sum();
        writeln!(out, "values: {} blocks, {} atoms", blocks.len(), atoms)?;
    }
    Ok(out)
}

fn describe_component(component: &DataComponent, depth: usize, out: &mut String) -> Result<()> {
    let name = if component.name.is_empty() {
        "(root)"
    } else {
        component.name.as_str()
    };
    write!(out, "{:indent$}{}: {}", "", name, component.kind_name(), indent = depth * 2)?;

    match &component.kind {
        ComponentKind::Scalar(s) => {
            write!(out, " [{}]", s.data_type)?;
            if let Some(uom) = &s.uom {
                match (&uom.code, &uom.href) {
                    (Some(code), _) => write!(out, " uom={}", code)?,
                    (None, Some(href)) => write!(out, " uom=<{}>", href)?,
                    (None, None) => {}
                }
            }
            if let Some(constraint) = &s.constraint {
                write!(out, " {}", constraint.kind_name())?;
            }
        }
        ComponentKind::Array(a) => match &a.element_count {
            ElementCount::Fixed(n) => write!(out, " size={}", n)?,
            ElementCount::SizeComponent(r) => write!(out, " size=#{}", r.trim_start_matches('#'))?,
            ElementCount::Implicit => write!(out, " size=implicit")?,
        },
        ComponentKind::Matrix(m) => write!(out, " size={}", m.element_count)?,
        ComponentKind::Choice(c) => write!(out, " items={}", c.items.len())?,
        ComponentKind::Record(_) | ComponentKind::Vector(_) => {}
    }
    if let Some(id) = &component.id {
        write!(out, " id={}", id)?;
    }
    if component.optional {
        write!(out, " optional")?;
    }
    writeln!(out)?;

    for child in component.children() {
        describe_component(child, depth + 1, out)?;
    }
    Ok(())
}

fn describe_encoding(encoding: &DataEncoding) -> String {
    match encoding {
        DataEncoding::Text(t) => format!(
            "TextEncoding token={:?} block={:?} decimal={:?}",
            t.token_separator, t.block_separator, t.decimal_separator
        ),
        DataEncoding::Binary(b) => format!(
            "BinaryEncoding {} {} members",
            b.byte_order.as_str(),
            b.members.len()
        ),
        DataEncoding::Json(j) if j.records_as_arrays => "JSONEncoding records as arrays".to_string(),
        DataEncoding::Json(_) => "JSONEncoding".to_string(),
        DataEncoding::Xml(x) => match &x.namespace {
            Some(ns) => format!("XMLEncoding namespace={}", ns),
            None => "XMLEncoding".to_string(),
        },
    }
}

// =============================================================================
// export
// =============================================================================

/// Rewrite the schema in `format`.
pub fn export(stream: &DataStream, format: SchemaFormat, pretty: bool) -> Result<String> {
    Ok(match format {
        SchemaFormat::Xml => xml::write_data_stream(stream)?,
        SchemaFormat::Json => json::write_data_stream(stream, pretty)?,
    })
}

// =============================================================================
// convert
// =============================================================================

pub fn target_encoding(target: TargetEncoding, records_as_arrays: bool, config: &CodecConfig) -> DataEncoding {
    match target {
        TargetEncoding::Text => DataEncoding::Text(config.text_encoding()),
        TargetEncoding::Binary => DataEncoding::Binary(config.binary_encoding()),
        TargetEncoding::Json => DataEncoding::Json(JsonEncoding { records_as_arrays }),
        TargetEncoding::Xml => DataEncoding::Xml(XmlEncoding::default()),
    }
}

/// Decode `input` (or the stream's inline values) with the stream's
/// encoding and encode the blocks with `target`.
pub fn convert(
    stream: &DataStream,
    input: Option<&[u8]>,
    target: &DataEncoding,
    config: &CodecConfig,
) -> Result<Vec<u8>> {
    let data = match (input, &stream.values) {
        (Some(bytes), _) => bytes,
        (None, Some(values)) => values.as_bytes(),
        (None, None) => bail!("the schema has no inline values and no input was given"),
    };

    let root = &stream.element_type;
    let reader = codec_for(&stream.encoding, config)?;
    let blocks = reader
        .read_blocks(root, data)
        .with_context(|| format!("failed to decode {}", stream.encoding.kind_name()))?;

    let writer = codec_for(target, config)?;
    let out = writer.write_blocks(root, &blocks)?;
    info!(
        from = stream.encoding.kind_name(),
        to = target.kind_name(),
        blocks = blocks.len(),
        bytes_in = data.len(),
        bytes_out = out.len(),
        "Converted data"
    );
    Ok(out.to_vec())
}

/// Write `bytes` to `path`, or to stdout.
pub fn emit(path: Option<&Path>, bytes: &[u8]) -> Result<()> {
    match path {
        Some(path) => std::fs::write(path, bytes).with_context(|| format!("failed to write {}", path.display()))?,
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(bytes)?;
            stdout.flush()?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use swe_common::{BinaryEncoding, ByteOrder, SweBuilder, TextEncoding};
    use test_utils::fixtures;

    fn weather_stream() -> DataStream {
        DataStream::new(fixtures::weather_record(), DataEncoding::Text(TextEncoding::default()))
            .with_values(fixtures::text::WEATHER_CSV)
    }

    #[test]
    fn test_describe_layout() {
        let text = describe(&weather_stream(), &CodecConfig::default()).unwrap();
        assert!(text.starts_with("weather: DataRecord\n"));
        assert!(text.contains("  temperature: Quantity [double] uom=Cel AllowedValues\n"));
        assert!(text.contains("    speed: Quantity"));
        assert!(text.contains("atoms: 7 (fixed)"));
        assert!(text.contains("values: 2 blocks, 14 atoms"));
    }

    #[test]
    fn test_describe_variable_stream() {
        let stream = DataStream::new(fixtures::trajectory(), DataEncoding::Binary(BinaryEncoding::new(ByteOrder::LittleEndian)));
        let text = describe(&stream, &CodecConfig::default()).unwrap();
        assert!(text.contains("points: DataArray size=#NUM_POINTS"));
        assert!(text.contains("num_points: Count [signedInt] id=NUM_POINTS"));
        assert!(text.contains("atoms: 2 in an empty block (variable)"));
        assert!(text.contains("encoding: BinaryEncoding littleEndian 0 members"));
        assert!(!text.contains("values:"));
    }

    #[test]
    fn test_convert_text_to_json() {
        let target = target_encoding(TargetEncoding::Json, false, &CodecConfig::default());
        let out = convert(&weather_stream(), None, &target, &CodecConfig::default()).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(value[1]["temperature"], 21.7);
        assert_eq!(value[1]["wind"]["direction"], 265.0);
        assert_eq!(value[0]["station"], "KBOS");
    }

    #[test]
    fn test_convert_explicit_input_through_binary() {
        let config = CodecConfig::default();
        let stream = weather_stream();
        let binary = target_encoding(TargetEncoding::Binary, false, &config);
        let bytes = convert(&stream, None, &binary, &config).unwrap();

        let binary_stream = DataStream::new(fixtures::weather_record(), binary);
        let text = target_encoding(TargetEncoding::Text, false, &config);
        let back = convert(&binary_stream, Some(&bytes), &text, &config).unwrap();
        assert_eq!(String::from_utf8(back).unwrap(), fixtures::text::WEATHER_CSV.replace("1013.0", "1013"));
    }

    #[test]
    fn test_convert_requires_data() {
        let stream = DataStream::new(
            SweBuilder::count("c").build().unwrap(),
            DataEncoding::Text(TextEncoding::default()),
        );
        let target = target_encoding(TargetEncoding::Xml, false, &CodecConfig::default());
        assert!(convert(&stream, None, &target, &CodecConfig::default()).is_err());
    }

    #[test]
    fn test_export_both_formats() {
        let stream = weather_stream();
        let as_xml = export(&stream, SchemaFormat::Xml, false).unwrap();
        assert!(as_xml.contains("swe:DataStream"));
        let as_json = export(&stream, SchemaFormat::Json, true).unwrap();

        let from_xml = crate::schema_file::parse(&as_xml).unwrap();
        let from_json = crate::schema_file::parse(&as_json).unwrap();
        assert_eq!(from_xml.element_type, from_json.element_type);
        assert_eq!(from_json.values, stream.values);
    }
}
