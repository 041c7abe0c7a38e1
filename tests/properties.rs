//! Property-based tests: encode/decode laws, extent agreement between walk and decode, and
//! robustness against arbitrary input.

use proptest::prelude::*;
use uperdsl::ast::{IntRange, SizeRange};
use uperdsl::per;
use uperdsl::{message_extent, validate_message, BitCursor, BitSink, Codec, CodecConfig, ResolvedSchema, Value};

const SCHEMA: &str = r#"
Props DEFINITIONS AUTOMATIC TAGS ::= BEGIN
    Rec ::= SEQUENCE {
        id INTEGER (0..65535),
        temp INTEGER (-40..85) OPTIONAL,
        label OCTET STRING (SIZE(0..64)) OPTIONAL,
        flags BIT STRING (SIZE(0..12)),
        items SEQUENCE (SIZE(0..5)) OF INTEGER,
        mode Mode,
        ...,
        note OCTET STRING,
        [[ rank INTEGER (1..MAX), level ENUMERATED { lo, hi, ..., max } OPTIONAL ]]
    }
    Mode ::= CHOICE { off NULL, on INTEGER (1..10), ..., boost BOOLEAN }
END
"#;

fn codec() -> Codec {
    Codec::new(ResolvedSchema::from_source(SCHEMA).expect("schema"), CodecConfig::default())
}

fn arb_mode() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::choice(0, "off", Value::Null)),
        (1i64..=10).prop_map(|v| Value::choice(1, "on", Value::Integer(v))),
        any::<bool>().prop_map(|b| Value::choice(2, "boost", Value::Boolean(b))),
    ]
}

fn arb_rec() -> impl Strategy<Value = Value> {
    (
        0i64..=65535,
        prop::option::of(-40i64..=85),
        prop::option::of(prop::collection::vec(any::<u8>(), 0..=64)),
        prop::collection::vec(any::<bool>(), 0..=12),
        prop::collection::vec(any::<i64>(), 0..=5),
        arb_mode(),
        prop::option::of(prop::collection::vec(any::<u8>(), 0..300)),
        prop::option::of((1i64..i64::MAX, prop::option::of(0u64..3))),
    )
        .prop_map(|(id, temp, label, flags, items, mode, note, v2)| {
            let mut fields = vec![
                ("id", Value::Integer(id)),
                ("temp", temp.map_or(Value::Absent, Value::Integer)),
                ("label", label.map_or(Value::Absent, Value::octets)),
                ("flags", Value::BitString(flags.into_iter().collect())),
                ("items", Value::List(items.into_iter().map(Value::Integer).collect())),
                ("mode", mode),
            ];
            if let Some(note) = note {
                fields.push(("note", Value::octets(note)));
            }
            if let Some((rank, level)) = v2 {
                fields.push(("rank", Value::Integer(rank)));
                fields.push(("level", level.map_or(Value::Absent, Value::Enumerated)));
            }
            Value::sequence(fields)
        })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn rec_round_trips(value in arb_rec()) {
        let codec = codec();
        let bytes = codec.encode_message("Rec", &value).expect("encode");
        let decoded = codec.decode_message("Rec", &bytes).expect("decode");
        prop_assert_eq!(&decoded.value, &value);
        prop_assert_eq!(decoded.octets, bytes.len());
        prop_assert!(decoded.warnings.is_empty());
        prop_assert_eq!(message_extent(&codec, "Rec", &bytes).expect("extent"), bytes.len());
        prop_assert!(validate_message(&codec, "Rec", &bytes).is_ok());
    }

    #[test]
    fn arbitrary_input_never_panics(bytes in prop::collection::vec(any::<u8>(), 0..64)) {
        let codec = codec();
        if let Ok(decoded) = codec.decode_message("Rec", &bytes) {
            prop_assert!(decoded.octets <= bytes.len());
            prop_assert_eq!(message_extent(&codec, "Rec", &bytes).expect("extent"), decoded.octets);
            let again = codec.encode_message("Rec", &decoded.value).expect("re-encode");
            prop_assert_eq!(codec.decode_message("Rec", &again).expect("re-decode").value, decoded.value);
        }
    }

    #[test]
    fn constrained_integer_uses_range_width(a in any::<i64>(), b in any::<i64>(), seed in any::<u64>()) {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        let span = hi as i128 - lo as i128 + 1;
        let value = (lo as i128 + seed as i128 % span) as i64;
        let mut sink = BitSink::new();
        per::encode_integer(&mut sink, value, &IntRange::constrained(lo, hi)).expect("encode");
        prop_assert_eq!(sink.len(), per::bits_for_range(span as u128));
        let bytes = sink.into_bytes();
        let mut cur = BitCursor::new(&bytes);
        prop_assert_eq!(per::decode_integer(&mut cur, &IntRange::constrained(lo, hi)).expect("decode"), value);
    }

    #[test]
    fn unconstrained_integer_is_minimal(value in any::<i64>()) {
        let mut sink = BitSink::new();
        per::encode_unconstrained_integer(&mut sink, value).expect("encode");
        let bytes = sink.into_bytes();
        let n = bytes[0] as usize;
        prop_assert!((1..=8).contains(&n));
        prop_assert_eq!(bytes.len(), n + 1);
        if n > 1 {
            // The leading octet is not redundant sign extension.
            let lead = (bytes[1], bytes[2] & 0x80);
            prop_assert!(lead != (0x00, 0x00) && lead != (0xFF, 0x80));
        }
        let mut cur = BitCursor::new(&bytes);
        prop_assert_eq!(per::decode_unconstrained_integer(&mut cur).expect("decode"), value);
    }

    #[test]
    fn normally_small_round_trips(value in prop_oneof![0u64..=63, 64u64..1_000_000]) {
        let mut sink = BitSink::new();
        per::encode_normally_small(&mut sink, value).expect("encode");
        if value <= 63 {
            prop_assert_eq!(sink.len(), 7);
        }
        let bytes = sink.into_bytes();
        let mut cur = BitCursor::new(&bytes);
        prop_assert_eq!(per::decode_normally_small(&mut cur).expect("decode"), value);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn octet_string_any_length(n in prop_oneof![0usize..300, 16000usize..16500, 32760usize..32800, 65530usize..65600]) {
        let data: Vec<u8> = (0..n).map(|i| (i % 251) as u8).collect();
        let mut sink = BitSink::new();
        per::encode_octet_string(&mut sink, &data, &SizeRange::unbounded()).expect("encode");
        let bytes = sink.into_bytes();
        let mut cur = BitCursor::new(&bytes);
        let back = per::decode_octet_string(&mut cur, &SizeRange::unbounded()).expect("decode");
        prop_assert_eq!(back.as_ref(), data.as_slice());
        prop_assert_eq!(cur.bits_remaining(), 0);
    }
}
