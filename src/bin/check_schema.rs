//! Parse and resolve ASN.1 schema files, printing one line per type.
//!
//! Usage:
//!   check_schema FILE.asn [FILE.asn ...]
//!
//! Exits with status 1 if any file fails to parse or resolve.

use uperdsl::{parse_file, ResolvedSchema};

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let paths: Vec<String> = std::env::args().skip(1).collect();
    if paths.is_empty() {
        anyhow::bail!("usage: check_schema FILE.asn [FILE.asn ...]");
    }

    let mut has_error = false;
    for path in &paths {
        let resolved = match parse_file(path).and_then(ResolvedSchema::resolve) {
            Ok(r) => r,
            Err(e) => {
                eprintln!("{}: {}", path, e);
                has_error = true;
                continue;
            }
        };
        let module = resolved.schema.module.as_deref().unwrap_or("<no module>");
        println!(
            "{}: module {}, {} type(s), {} value(s)",
            path,
            module,
            resolved.schema.types.len(),
            resolved.schema.values.len()
        );
        for def in &resolved.schema.types {
            println!("  {} ::= {}", def.name, def.ty.kind_name());
        }
    }
    if has_error {
        std::process::exit(1);
    }
    Ok(())
}
