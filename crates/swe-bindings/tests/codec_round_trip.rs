//! Round trips of realistic records through every data codec.
//!
//! Blocks are first read from the text fixtures, then written and read
//! back with each encoding; the atoms must survive unchanged.

use swe_bindings::{
    codec_for, BinaryCodec, BindingError, CodecConfig, DataCodec, DataReader, DataWriter,
    TextCodec,
};
use swe_common::{
    BinaryEncoding, ByteOrder, DataBlock, DataComponent, DataEncoding, DataHolder, DataPath,
    JsonEncoding, TextEncoding, XmlEncoding,
};
use test_utils::fixtures;
use test_utils::fixtures::time::REFERENCE_EPOCH;

fn path(p: &str) -> DataPath {
    DataPath::parse(p).unwrap()
}

fn all_encodings() -> Vec<DataEncoding> {
    vec![
        DataEncoding::Text(TextEncoding::default()),
        DataEncoding::Text(TextEncoding::new(";", "|").with_decimal_separator(",")),
        DataEncoding::Binary(BinaryEncoding::new(ByteOrder::BigEndian)),
        DataEncoding::Binary(BinaryEncoding::new(ByteOrder::LittleEndian)),
        DataEncoding::Json(JsonEncoding::default()),
        DataEncoding::Json(JsonEncoding {
            records_as_arrays: true,
        }),
        DataEncoding::Xml(XmlEncoding::default()),
    ]
}

fn read_csv(root: &DataComponent, csv: &str) -> Vec<DataBlock> {
    TextCodec::new(TextEncoding::default(), &CodecConfig::default())
        .unwrap()
        .read_blocks(root, csv.as_bytes())
        .unwrap()
}

fn assert_round_trip(root: &DataComponent, blocks: &[DataBlock]) {
    let config = CodecConfig::default();
    for encoding in all_encodings() {
        let codec: Box<dyn DataCodec> = codec_for(&encoding, &config).unwrap();
        let bytes = codec.write_blocks(root, blocks).unwrap();
        let back = codec.read_blocks(root, &bytes).unwrap();

        assert_eq!(back.len(), blocks.len(), "block count with {:?}", encoding);
        for (a, b) in back.iter().zip(blocks) {
            assert_eq!(a.to_values(), b.to_values(), "atoms with {:?}", encoding);
        }
    }
}

// =============================================================================
// Fixture round trips
// =============================================================================

#[test]
fn test_weather_round_trip() {
    let root = fixtures::weather_record();
    let blocks = read_csv(&root, fixtures::text::WEATHER_CSV);
    assert_eq!(blocks.len(), 2);
    assert_eq!(blocks[0].get_double(0).unwrap(), REFERENCE_EPOCH);
    assert_eq!(blocks[1].get_double(3).unwrap(), 4.1);
    assert_eq!(blocks[1].get_string(6).unwrap(), "KBOS");

    assert_round_trip(&root, &blocks);
}

#[test]
fn test_trajectory_round_trip() {
    let root = fixtures::trajectory();
    let blocks = read_csv(&root, fixtures::text::TRAJECTORY_CSV);
    assert_eq!(blocks[0].atom_count(), 2 + 2 * 3);
    assert_eq!(blocks[0].get_double(7).unwrap(), 12.5);

    assert_round_trip(&root, &blocks);
}

#[test]
fn test_nested_grid_round_trip() {
    let mut holder = DataHolder::new(fixtures::nested_grid()).unwrap();
    holder.set_value(&path("width"), 3).unwrap();
    holder.update_size(&path("rows"), 2).unwrap();
    holder.set_value(&path("rows[0][1]"), 273.15).unwrap();
    holder.set_value(&path("rows[1][2]"), 280.5).unwrap();

    let blocks = vec![holder.data().clone()];
    assert_round_trip(holder.root(), &blocks);

    let codec = codec_for(&DataEncoding::Text(TextEncoding::default()), &CodecConfig::default()).unwrap();
    let text = codec.write_blocks(holder.root(), &blocks).unwrap();
    assert_eq!(&text[..], b"3,2,0,273.15,0,0,0,280.5\n");
}

#[test]
fn test_grid_row_resize_round_trip() {
    let mut holder = DataHolder::new(fixtures::nested_grid()).unwrap();
    holder.set_value(&path("width"), 2).unwrap();
    holder.update_size(&path("rows"), 2).unwrap();
    holder.update_size(&path("rows[0]"), 3).unwrap();
    holder.set_value(&path("rows[1][2]"), 5.5).unwrap();

    let blocks = vec![holder.data().clone()];
    let codec = codec_for(&DataEncoding::Text(TextEncoding::default()), &CodecConfig::default()).unwrap();
    let text = codec.write_blocks(holder.root(), &blocks).unwrap();
    assert_eq!(&text[..], b"3,2,0,0,0,0,0,5.5\n");

    assert_round_trip(holder.root(), &blocks);
}

#[test]
fn test_choice_round_trip() {
    let root = fixtures::message_choice();
    let blocks = read_csv(&root, "temp,21.5\nwind,3.4,270\nstatus,calibrating\n");
    assert_eq!(blocks.len(), 3);
    assert_eq!(blocks[1].get_long(0).unwrap(), 1);
    assert_eq!(blocks[2].get_string(1).unwrap(), "calibrating");

    assert_round_trip(&root, &blocks);
}

#[test]
fn test_choice_without_selection_cannot_be_written() {
    let holder = DataHolder::new(fixtures::message_choice()).unwrap();
    for encoding in all_encodings() {
        let codec = codec_for(&encoding, &CodecConfig::default()).unwrap();
        assert!(
            codec.write_block(holder.root(), holder.data()).is_err(),
            "{:?} wrote an unselected choice",
            encoding
        );
    }
}

// =============================================================================
// Cross-encoding conversion
// =============================================================================

#[test]
fn test_text_to_binary_to_json() {
    let root = fixtures::trajectory();
    let config = CodecConfig::default();
    let blocks = read_csv(&root, fixtures::text::TRAJECTORY_CSV);

    let binary = BinaryCodec::new(BinaryEncoding::new(ByteOrder::LittleEndian), &config);
    let bytes = binary.write_blocks(&root, &blocks).unwrap();
    // f64 time, i32 count, six f64 coordinates
    assert_eq!(bytes.len(), 8 + 4 + 6 * 8);

    let decoded = binary.read_blocks(&root, &bytes).unwrap();
    let json = codec_for(&DataEncoding::Json(JsonEncoding::default()), &config).unwrap();
    let out = json.write_blocks(&root, &decoded).unwrap();
    let value: serde_json::Value = serde_json::from_slice(&out).unwrap();

    assert_eq!(value[0]["time"], "2024-01-15T12:00:00Z");
    assert_eq!(value[0]["num_points"], 2);
    assert_eq!(value[0]["points"][1]["alt"], 12.5);
}

#[test]
fn test_read_block_requires_exactly_one() {
    let root = fixtures::simple_record();
    let codec = TextCodec::new(TextEncoding::default(), &CodecConfig::default()).unwrap();
    assert!(codec.read_block(&root, b"1,2,3\n").is_ok());
    assert!(matches!(
        codec.read_block(&root, b""),
        Err(BindingError::UnexpectedEof)
    ));
    assert!(matches!(
        codec.read_block(&root, b"1,2,3\n4,5,6\n"),
        Err(BindingError::Parse { .. })
    ));
}
