//! Benchmarks for the data codecs.
//!
//! Run with: cargo bench --package swe-bindings
//! Or: cargo bench --package swe-bindings --bench codec_benchmarks

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use swe_bindings::{codec_for, CodecConfig, DataCodec, DataReader, DataWriter};
use swe_common::{
    BinaryEncoding, ByteOrder, DataBlock, DataComponent, DataEncoding, DataHolder, DataPath,
    JsonEncoding, TextEncoding, XmlEncoding,
};
use test_utils::{create_track, fixtures};

fn track_block(points: usize) -> (DataComponent, DataBlock) {
    let mut holder = DataHolder::new(fixtures::trajectory()).unwrap();
    holder
        .update_size(&DataPath::root().field("points"), points)
        .unwrap();
    for (i, (lat, lon, alt)) in create_track(points).into_iter().enumerate() {
        let point = DataPath::root().field("points").element(i);
        holder.set_value(&point.clone().field("lat"), lat).unwrap();
        holder.set_value(&point.clone().field("lon"), lon).unwrap();
        holder.set_value(&point.field("alt"), alt).unwrap();
    }
    holder.into_parts()
}

fn codecs() -> Vec<(&'static str, Box<dyn DataCodec>)> {
    let config = CodecConfig::default();
    [
        ("text", DataEncoding::Text(TextEncoding::default())),
        ("binary", DataEncoding::Binary(BinaryEncoding::new(ByteOrder::LittleEndian))),
        ("json", DataEncoding::Json(JsonEncoding::default())),
        ("xml", DataEncoding::Xml(XmlEncoding::default())),
    ]
    .into_iter()
    .map(|(name, encoding)| (name, codec_for(&encoding, &config).unwrap()))
    .collect()
}

// =============================================================================
// ENCODE BENCHMARKS
// =============================================================================

fn bench_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode_track");

    for points in [10usize, 1000] {
        let (root, block) = track_block(points);
        let blocks = vec![block; 10];
        group.throughput(Throughput::Elements((points * 10) as u64));

        for (name, codec) in codecs() {
            group.bench_with_input(BenchmarkId::new(name, points), &blocks, |b, blocks| {
                b.iter(|| codec.write_blocks(&root, black_box(blocks)).unwrap())
            });
        }
    }

    group.finish();
}

// =============================================================================
// DECODE BENCHMARKS
// =============================================================================

fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode_track");

    for points in [10usize, 1000] {
        let (root, block) = track_block(points);
        let blocks = vec![block; 10];
        group.throughput(Throughput::Elements((points * 10) as u64));

        for (name, codec) in codecs() {
            let bytes = codec.write_blocks(&root, &blocks).unwrap();
            group.bench_with_input(BenchmarkId::new(name, points), &bytes, |b, bytes| {
                b.iter(|| codec.read_blocks(&root, black_box(bytes)).unwrap())
            });
        }
    }

    group.finish();
}

criterion_group!(benches, bench_encode, bench_decode);
criterion_main!(benches);
