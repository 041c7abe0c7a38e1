//! Schema notation: parsing, value references, extension markers, and resolution errors.

use std::io::Write;
use uperdsl::ast::{AsnType, ExtensionAddition, IntRange, Literal, Presence, SizeRange};
use uperdsl::{parse, parse_file, ResolvedSchema, SchemaError};

const MODULE: &str = r#"
-- Test module exercising the supported notation.
Demo-Module { iso(1) 2 3 } DEFINITIONS AUTOMATIC TAGS ::= BEGIN
    EXPORTS ALL;
    IMPORTS Foo FROM Other-Module;

    maxId INTEGER ::= 1007
    minLevel INTEGER ::= -3

    Id ::= INTEGER (0..maxId)
    Level ::= INTEGER (minLevel..MAX)
    Delta ::= INTEGER (-10..10, ...)
    Big ::= INTEGER { zero(0), one(1) }
    Mask ::= BIT STRING { a(0), b(1) } (SIZE(8))
    Name ::= OCTET STRING (SIZE(1..32, ...))
    Holder ::= OCTET STRING (CONTAINING Id)
    Anything ::= ANY DEFINED BY id
    Ids ::= SET SIZE(1..4) OF Id
    /* numbered items are ordered by value */
    Mode ::= ENUMERATED { high(10), low(1), mid(5), ..., turbo(20) }

    Record ::= [APPLICATION 3] IMPLICIT SEQUENCE {
        id Id,
        name Name OPTIONAL,
        level Level DEFAULT 0,
        enabled BOOLEAN DEFAULT TRUE,
        mode Mode DEFAULT low,
        ...,
        extra NULL,
        [[ 2: v2a INTEGER (0..3), v2b BOOLEAN OPTIONAL ]],
        ...,
        trailer BOOLEAN
    }

    Event ::= CHOICE {
        plain [0] NULL,
        counted INTEGER (0..255),
        ...,
        [[ later BOOLEAN, latest Record ]]
    }
END
"#;

fn resolved() -> ResolvedSchema {
    ResolvedSchema::from_source(MODULE).expect("schema")
}

#[test]
fn test_module_header_and_values() {
    let schema = parse(MODULE).expect("parse");
    assert_eq!(schema.module.as_deref(), Some("Demo-Module"));
    assert_eq!(
        schema.values,
        vec![("maxId".to_string(), 1007), ("minLevel".to_string(), -3)]
    );
    let names: Vec<&str> = schema.types.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names[..3], ["Id", "Level", "Delta"]);
    assert_eq!(names.len(), 12);
}

#[test]
fn test_integer_constraints() {
    let r = resolved();
    assert_eq!(r.get_type("Id"), Some(&AsnType::Integer(IntRange::constrained(0, 1007))));
    assert_eq!(r.get_type("Level"), Some(&AsnType::Integer(IntRange::semi_constrained(-3))));
    assert_eq!(
        r.get_type("Delta"),
        Some(&AsnType::Integer(IntRange::constrained(-10, 10).extensible()))
    );
    // Named numbers do not constrain.
    assert_eq!(r.get_type("Big"), Some(&AsnType::Integer(IntRange::unconstrained())));
}

#[test]
fn test_string_and_list_types() {
    let r = resolved();
    assert_eq!(r.get_type("Mask"), Some(&AsnType::BitString(SizeRange::fixed(8))));
    assert_eq!(
        r.get_type("Name"),
        Some(&AsnType::octet_string(SizeRange::bounded(1, 32).extensible()))
    );
    assert_eq!(r.get_type("Holder"), Some(&AsnType::containing("Id")));
    assert_eq!(r.get_type("Anything"), Some(&AsnType::Open));
    match r.get_type("Ids") {
        Some(AsnType::SequenceOf { element, size, set }) => {
            assert!(*set);
            assert_eq!(*size, SizeRange::bounded(1, 4));
            assert_eq!(**element, AsnType::reference("Id"));
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_enumerated_numbered_items_sorted() {
    let r = resolved();
    let Some(AsnType::Enumerated(spec)) = r.get_type("Mode") else {
        panic!("Mode is not ENUMERATED");
    };
    assert_eq!(spec.root, vec!["low", "mid", "high"]);
    assert!(spec.extensible);
    assert_eq!(spec.extensions, vec!["turbo"]);
    assert_eq!(spec.index_of("turbo"), Some(3));
    assert_eq!(spec.name(1), Some("mid"));
    assert_eq!(spec.name(4), None);
}

#[test]
fn test_sequence_components_and_extensions() {
    let r = resolved();
    let Some(AsnType::Sequence(spec)) = r.get_type("Record") else {
        panic!("Record is not a SEQUENCE");
    };
    let root: Vec<&str> = spec.root.iter().map(|f| f.name.as_str()).collect();
    // Fields after the second marker belong to the root.
    assert_eq!(root, ["id", "name", "level", "enabled", "mode", "trailer"]);
    assert_eq!(spec.root[1].presence, Presence::Optional);
    assert_eq!(spec.root[2].presence, Presence::Default(Literal::Int(0)));
    assert_eq!(spec.root[3].presence, Presence::Default(Literal::Bool(true)));
    assert_eq!(spec.root[4].presence, Presence::Default(Literal::Ident("low".to_string())));
    assert_eq!(spec.optional_count(), 4);
    assert!(spec.extensible);
    assert_eq!(spec.extensions.len(), 2);
    assert!(matches!(&spec.extensions[0], ExtensionAddition::Field(f) if f.name == "extra"));
    match &spec.extensions[1] {
        ExtensionAddition::Group(fields) => {
            assert_eq!(fields.len(), 2);
            assert_eq!(fields[1].name, "v2b");
            assert!(fields[1].is_optional());
        }
        other => panic!("expected group, got {:?}", other),
    }
}

#[test]
fn test_choice_groups_flatten_to_alternatives() {
    let r = resolved();
    let Some(AsnType::Choice(spec)) = r.get_type("Event") else {
        panic!("Event is not a CHOICE");
    };
    assert_eq!(spec.root.len(), 2);
    let ext: Vec<&str> = spec.extensions.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(ext, ["later", "latest"]);
    assert_eq!(spec.index_of("latest"), Some(3));
    assert_eq!(spec.alternative(2).map(|f| f.name.as_str()), Some("later"));
}

#[test]
fn test_bare_assignments_without_module() {
    let schema = parse("A ::= BOOLEAN  B ::= SEQUENCE { x A }").expect("parse");
    assert_eq!(schema.module, None);
    assert_eq!(schema.types.len(), 2);
    let r = ResolvedSchema::resolve(schema).expect("resolve");
    assert_eq!(r.type_names().collect::<Vec<_>>(), ["A", "B"]);
    let b = r.get_type("B").expect("B");
    assert_eq!(r.resolve_ref(&AsnType::reference("A")), Some(&AsnType::Boolean));
    assert_eq!(b.kind_name(), "SEQUENCE");
}

#[test]
fn test_extensibility_implied() {
    let r = ResolvedSchema::from_source(
        "M DEFINITIONS AUTOMATIC TAGS EXTENSIBILITY IMPLIED ::= BEGIN
             S ::= SEQUENCE { a BOOLEAN }
             C ::= CHOICE { x NULL, y NULL }
             E ::= ENUMERATED { p, q }
         END",
    )
    .expect("schema");
    assert!(matches!(r.get_type("S"), Some(AsnType::Sequence(s)) if s.extensible));
    assert!(matches!(r.get_type("C"), Some(AsnType::Choice(c)) if c.extensible));
    assert!(matches!(r.get_type("E"), Some(AsnType::Enumerated(e)) if e.extensible));
}

#[test]
fn test_syntax_error() {
    assert!(matches!(parse("A ::= SEQUENCE { a INTEGER ("), Err(SchemaError::Syntax(_))));
    assert!(matches!(parse("A ::= CHOICE { }"), Err(SchemaError::Syntax(_))));
    // Keywords are not identifiers.
    assert!(matches!(parse("A ::= SEQUENCE { END BOOLEAN }"), Err(SchemaError::Syntax(_))));
}

#[test]
fn test_duplicates() {
    assert_eq!(
        ResolvedSchema::from_source("A ::= BOOLEAN A ::= NULL").unwrap_err(),
        SchemaError::Duplicate("A".to_string())
    );
    assert_eq!(
        parse("n INTEGER ::= 1 n INTEGER ::= 2").unwrap_err(),
        SchemaError::Duplicate("n".to_string())
    );
    assert!(matches!(
        ResolvedSchema::from_source("S ::= SEQUENCE { a NULL, ..., a BOOLEAN }"),
        Err(SchemaError::Invalid { .. })
    ));
    for source in ["C ::= CHOICE { a NULL, a BOOLEAN }", "C ::= CHOICE { a NULL, ..., a BOOLEAN }"] {
        assert_eq!(
            ResolvedSchema::from_source(source).unwrap_err(),
            SchemaError::Invalid {
                context: "C".to_string(),
                reason: "duplicate alternative 'a'".to_string()
            },
            "{}",
            source
        );
    }
}

#[test]
fn test_choice_tags_follow_textual_order() {
    let r = ResolvedSchema::from_source("C ::= CHOICE { a [0] NULL, b BOOLEAN, c [2] INTEGER (0..3) }")
        .expect("ascending tags");
    assert!(matches!(r.get_type("C"), Some(AsnType::Choice(c)) if c.index_of("c") == Some(2)));
    // Class-qualified tags and extension alternatives are not ordered against context tags.
    let mixed = "C ::= CHOICE { a [1] NULL, b [APPLICATION 0] BOOLEAN, ..., c [0] NULL }";
    assert!(ResolvedSchema::from_source(mixed).is_ok());

    assert_eq!(
        parse("C ::= CHOICE { a [1] NULL, b [0] BOOLEAN }").unwrap_err(),
        SchemaError::Invalid {
            context: "C.b".to_string(),
            reason: "tag [0] does not follow [1] of 'a'".to_string()
        }
    );
    assert!(matches!(
        parse("C ::= CHOICE { a [3] NULL, b [3] BOOLEAN }"),
        Err(SchemaError::Invalid { .. })
    ));
}

#[test]
fn test_unresolved_references() {
    assert_eq!(
        ResolvedSchema::from_source("S ::= SEQUENCE { a Missing }").unwrap_err(),
        SchemaError::Unresolved {
            name: "Missing".to_string(),
            context: "S.a".to_string()
        }
    );
    assert!(matches!(
        parse("I ::= INTEGER (0..noSuchValue)"),
        Err(SchemaError::Unresolved { ref name, .. }) if name == "noSuchValue"
    ));
    assert!(matches!(
        ResolvedSchema::from_source("H ::= OCTET STRING (CONTAINING Nowhere)"),
        Err(SchemaError::Unresolved { .. })
    ));
}

#[test]
fn test_invalid_definitions() {
    for source in [
        "I ::= INTEGER (5..1)",
        "O ::= OCTET STRING (SIZE(4..2))",
        "O ::= OCTET STRING (SIZE(-1..2))",
        "E ::= ENUMERATED { a, ..., b, ... }",
        "S ::= SEQUENCE { [[ a NULL ]] }",
        "S ::= SEQUENCE { a NULL, ..., b NULL, ..., c NULL, ... }",
    ] {
        assert!(
            matches!(ResolvedSchema::from_source(source), Err(SchemaError::Invalid { .. })),
            "{}",
            source
        );
    }
}

#[test]
fn test_parse_file() {
    let mut file = tempfile::NamedTempFile::new().expect("tempfile");
    file.write_all(MODULE.as_bytes()).expect("write");
    let schema = parse_file(file.path()).expect("parse_file");
    assert_eq!(schema, parse(MODULE).expect("parse"));

    let dir = tempfile::tempdir().expect("tempdir");
    let missing = dir.path().join("missing.asn");
    assert!(matches!(parse_file(&missing), Err(SchemaError::Io(_))));
}
