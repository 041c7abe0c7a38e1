//! Decoder fuzz target: decode arbitrary bytes as a schema exercising every type category,
//! under both constraint policies. Decoding must return Ok or a CodecError, never panic, and
//! whatever decodes must re-encode.
//! Build with: cargo fuzz run decode_fuzz (requires nightly and cargo fuzz).

#![cfg_attr(fuzzing, no_main)]

#[cfg(fuzzing)]
use libfuzzer_sys::fuzz_target;

#[cfg(fuzzing)]
const SCHEMA: &str = "
    Item ::= SEQUENCE {
        id INTEGER (0..1000),
        delta INTEGER OPTIONAL,
        flags BIT STRING (SIZE(1..16, ...)),
        ...,
        [[ note OCTET STRING OPTIONAL ]],
        extra BOOLEAN OPTIONAL
    }
    Pdu ::= CHOICE {
        items SEQUENCE (SIZE(0..8)) OF Item,
        raw OCTET STRING,
        kind ENUMERATED { a, b, c, ... },
        nested Pdu,
        ...,
        blob ANY
    }
";

#[cfg(fuzzing)]
fuzz_target!(|data: &[u8]| {
    use uperdsl::{Codec, CodecConfig, ResolvedSchema};
    let Ok(schema) = ResolvedSchema::from_source(SCHEMA) else {
        return;
    };
    for config in [CodecConfig::default(), CodecConfig::permissive()] {
        let strict = config == CodecConfig::default();
        let codec = Codec::new(schema.clone(), config);
        if let Ok(decoded) = codec.decode_message("Pdu", data) {
            let _ = uperdsl::message_extent(&codec, "Pdu", data);
            if strict {
                let _ = codec.encode_message("Pdu", &decoded.value);
            }
        }
    }
});

#[cfg(not(fuzzing))]
fn main() {
    eprintln!("Build with: cargo fuzz run decode_fuzz");
}
