//! Decode hex-encoded PER PDUs against a schema and print the value tree.
//!
//! Usage:
//!   decode_hex --schema FILE.asn --type NAME [OPTIONS] [HEX ...]
//!   decode_hex --schema FILE.asn --type NAME [OPTIONS] < pdus.txt
//!
//! Each HEX argument (or each non-empty stdin line) is one PDU. Whitespace and `:` inside a PDU
//! are ignored.
//!
//! Options:
//!   --permissive      Accept out-of-range values and report them as warnings
//!   --unaligned-open  Do not octet-align open-type content (plain X.691 unaligned PER)
//!   --extent          Only print the octet extent of each PDU (no decode)
//!
//! Set RUST_LOG=debug to see skipped extensions and tolerated constraint violations.

use anyhow::{bail, Context};
use std::io::{self, BufRead};
use uperdsl::dump::dump_message;
use uperdsl::{parse_file, walk, Codec, CodecConfig, ResolvedSchema};

struct Options {
    schema: String,
    type_name: String,
    permissive: bool,
    unaligned_open: bool,
    extent_only: bool,
    pdus: Vec<String>,
}

fn take_value(args: &mut Vec<String>, flag: &str) -> anyhow::Result<Option<String>> {
    match args.iter().position(|a| a == flag) {
        Some(pos) if pos + 1 < args.len() => {
            let value = args.remove(pos + 1);
            args.remove(pos);
            Ok(Some(value))
        }
        Some(_) => bail!("{} needs a value", flag),
        None => Ok(None),
    }
}

fn take_flag(args: &mut Vec<String>, flag: &str) -> bool {
    match args.iter().position(|a| a == flag) {
        Some(pos) => {
            args.remove(pos);
            true
        }
        None => false,
    }
}

fn parse_args() -> anyhow::Result<Options> {
    let mut args: Vec<String> = std::env::args().skip(1).collect();
    let schema = take_value(&mut args, "--schema")?.context("missing --schema FILE")?;
    let type_name = take_value(&mut args, "--type")?.context("missing --type NAME")?;
    let permissive = take_flag(&mut args, "--permissive");
    let unaligned_open = take_flag(&mut args, "--unaligned-open");
    let extent_only = take_flag(&mut args, "--extent");
    if let Some(unknown) = args.iter().find(|a| a.starts_with("--")) {
        bail!("unknown option {}", unknown);
    }
    Ok(Options {
        schema,
        type_name,
        permissive,
        unaligned_open,
        extent_only,
        pdus: args,
    })
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let opts = parse_args()?;

    let schema = parse_file(&opts.schema).with_context(|| format!("parsing {}", opts.schema))?;
    let resolved = ResolvedSchema::resolve(schema).with_context(|| format!("resolving {}", opts.schema))?;
    if resolved.get_type(&opts.type_name).is_none() {
        bail!("{}: no type named {}", opts.schema, opts.type_name);
    }
    let mut config = CodecConfig::default().with_open_content_alignment(!opts.unaligned_open);
    if opts.permissive {
        config = config.with_constraint_policy(uperdsl::ConstraintPolicy::Permissive);
    }
    let codec = Codec::new(resolved, config);

    let pdus = if opts.pdus.is_empty() {
        let mut lines = Vec::new();
        for line in io::stdin().lock().lines() {
            let line = line?;
            if !line.trim().is_empty() {
                lines.push(line);
            }
        }
        lines
    } else {
        opts.pdus
    };

    let mut failures = 0usize;
    for (i, text) in pdus.iter().enumerate() {
        let cleaned: String = text.chars().filter(|c| !c.is_whitespace() && *c != ':').collect();
        let bytes = match hex::decode(&cleaned) {
            Ok(b) => b,
            Err(e) => {
                eprintln!("PDU #{}: invalid hex: {}", i, e);
                failures += 1;
                continue;
            }
        };
        if opts.extent_only {
            match walk::message_extent(&codec, &opts.type_name, &bytes) {
                Ok(n) => println!("PDU #{}: {} of {} octets", i, n, bytes.len()),
                Err(e) => {
                    eprintln!("PDU #{}: {}", i, e);
                    failures += 1;
                }
            }
            continue;
        }
        match codec.decode_message(&opts.type_name, &bytes) {
            Ok(decoded) => {
                println!("PDU #{}: {} bits, {} of {} octets", i, decoded.bits, decoded.octets, bytes.len());
                print!("{}", dump_message(codec.resolved(), &opts.type_name, &decoded.value));
                for w in &decoded.warnings {
                    println!("  warning: {}", w);
                }
            }
            Err(e) => {
                eprintln!("PDU #{}: {} ({:?})", i, e, e.kind());
                failures += 1;
            }
        }
    }
    if failures > 0 {
        eprintln!("decode_hex: {} of {} PDU(s) failed", failures, pdus.len());
        std::process::exit(1);
    }
    Ok(())
}
