//! Benchmark: walk (extent only) vs decode vs decode+encode on a batch of synthetic
//! measurement-report style PDUs with optional fields, lists and an extension group.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use uperdsl::{message_extent, Codec, CodecConfig, ResolvedSchema, SequenceValue, Value};

const SCHEMA: &str = "
Bench DEFINITIONS AUTOMATIC TAGS ::= BEGIN
    maxCells INTEGER ::= 32

    CellResult ::= SEQUENCE {
        physCellId INTEGER (0..1007),
        rsrp INTEGER (0..127) OPTIONAL,
        rsrq INTEGER (0..127) OPTIONAL,
        beams BIT STRING (SIZE(8))
    }

    Report ::= SEQUENCE {
        measId INTEGER (1..64),
        serving CellResult,
        neighbours SEQUENCE (SIZE(1..maxCells)) OF CellResult OPTIONAL,
        trigger ENUMERATED { periodic, eventA3, eventA5, ... },
        ...,
        [[ label OCTET STRING (SIZE(0..255)) OPTIONAL ]]
    }
END
";

fn cell(i: i64) -> Value {
    Value::Sequence(
        SequenceValue::new()
            .with("physCellId", Value::Integer(i * 31 % 1008))
            .with("rsrp", Value::Integer(i % 128))
            .with("rsrq", if i % 3 == 0 { Value::Absent } else { Value::Integer(i % 100) })
            .with("beams", Value::bits("10110010")),
    )
}

fn report(i: i64) -> Value {
    let neighbours = (0..(i % 16) + 1).map(|j| cell(i + j)).collect();
    let mut seq = SequenceValue::new()
        .with("measId", Value::Integer(i % 64 + 1))
        .with("serving", cell(i))
        .with("neighbours", Value::List(neighbours))
        .with("trigger", Value::Enumerated((i % 3) as u64));
    if i % 4 == 0 {
        seq.insert("label", Value::octets(format!("report-{}", i).into_bytes()));
    }
    Value::Sequence(seq)
}

fn bench_codec(c: &mut Criterion) {
    let schema = ResolvedSchema::from_source(SCHEMA).expect("schema");
    let codec = Codec::new(schema, CodecConfig::default());
    let pdus: Vec<Vec<u8>> = (0..256)
        .map(|i| codec.encode_message("Report", &report(i)).expect("encode"))
        .collect();
    let total: usize = pdus.iter().map(Vec::len).sum();
    eprintln!("{} PDUs, {} octets", pdus.len(), total);

    let mut group = c.benchmark_group("report");
    group.bench_function("walk_extent", |b| {
        b.iter(|| {
            for pdu in &pdus {
                black_box(message_extent(&codec, "Report", black_box(pdu)).expect("extent"));
            }
        })
    });
    group.bench_function("decode", |b| {
        b.iter(|| {
            for pdu in &pdus {
                black_box(codec.decode_message("Report", black_box(pdu)).expect("decode"));
            }
        })
    });
    group.bench_function("decode_encode", |b| {
        b.iter(|| {
            for pdu in &pdus {
                let decoded = codec.decode_message("Report", black_box(pdu)).expect("decode");
                black_box(codec.encode_message("Report", &decoded.value).expect("encode"));
            }
        })
    });
    group.finish();
}

criterion_group!(benches, bench_codec);
criterion_main!(benches);
