//! Format decoded values as an indented tree, using the schema for enumeration and alternative
//! names.

use crate::ast::{AsnType, ResolvedSchema};
use crate::value::Value;
use std::fmt::Write;

const INDENT: &str = "  ";

/// Render `value` (a decoded `type_name`) as one line per field.
pub fn dump_message(resolved: &ResolvedSchema, type_name: &str, value: &Value) -> String {
    let mut out = String::new();
    match resolved.get_type(type_name) {
        Some(ty) => dump_field(resolved, type_name, ty, value, 0, &mut out),
        None => {
            let _ = writeln!(out, "{}: <unknown type>", type_name);
        }
    }
    out
}

/// Bit string in ASN.1 value notation, e.g. `'0110'B`.
pub fn format_bits(value: &Value) -> Option<String> {
    let bits = value.as_bits()?;
    let digits: String = bits.iter().by_vals().map(|b| if b { '1' } else { '0' }).collect();
    Some(format!("'{}'B", digits))
}

fn dump_field(resolved: &ResolvedSchema, label: &str, ty: &AsnType, value: &Value, depth: usize, out: &mut String) {
    let pad = INDENT.repeat(depth);
    let ty = resolved.resolve_ref(ty).unwrap_or(ty);
    match (ty, value) {
        (_, Value::Absent) => {}
        (AsnType::Sequence(spec), Value::Sequence(seq)) => {
            let _ = writeln!(out, "{}{}:", pad, label);
            let fields = spec
                .root
                .iter()
                .chain(spec.extensions.iter().flat_map(|e| e.fields().iter()));
            for f in fields {
                if let Some(v) = seq.get(&f.name) {
                    dump_field(resolved, &f.name, &f.ty, v, depth + 1, out);
                }
            }
        }
        (AsnType::Choice(spec), Value::Choice(choice)) => {
            let alt = choice.name.as_deref().and_then(|n| spec.index_of(n)).and_then(|i| spec.alternative(i));
            match alt {
                Some(alt) => {
                    let _ = writeln!(out, "{}{}: {}", pad, label, alt.name);
                    dump_field(resolved, &alt.name, &alt.ty, &choice.value, depth + 1, out);
                }
                None => {
                    let _ = writeln!(
                        out,
                        "{}{}: <unknown extension alternative #{}> {}",
                        pad,
                        label,
                        choice.index,
                        scalar(&choice.value)
                    );
                }
            }
        }
        (AsnType::SequenceOf { element, .. }, Value::List(items)) => {
            let _ = writeln!(out, "{}{}: {} items", pad, label, items.len());
            for (i, item) in items.iter().enumerate() {
                dump_field(resolved, &format!("[{}]", i), element, item, depth + 1, out);
            }
        }
        (AsnType::Enumerated(spec), Value::Enumerated(index)) => {
            let text = match spec.name(*index) {
                Some(name) => name.to_string(),
                None => format!("<unknown extension item {}>", index),
            };
            let _ = writeln!(out, "{}{}: {}", pad, label, text);
        }
        _ => {
            let _ = writeln!(out, "{}{}: {}", pad, label, scalar(value));
        }
    }
}

fn scalar(value: &Value) -> String {
    match value {
        Value::Absent => "(absent)".to_string(),
        Value::Null => "NULL".to_string(),
        Value::Boolean(b) => (if *b { "TRUE" } else { "FALSE" }).to_string(),
        Value::Integer(v) => v.to_string(),
        Value::Enumerated(i) => format!("#{}", i),
        Value::BitString(_) => format_bits(value).unwrap_or_default(),
        Value::OctetString(b) => format!("'{}'H", hex::encode_upper(b)),
        Value::Open(open) => match &open.containing {
            Some(t) => format!("'{}'H (containing {})", hex::encode_upper(&open.bytes), t),
            None => format!("'{}'H", hex::encode_upper(&open.bytes)),
        },
        Value::Sequence(s) => format!("{{ {} fields }}", s.len()),
        Value::Choice(c) => format!("choice #{}", c.index),
        Value::List(items) => format!("{} items", items.len()),
    }
}
