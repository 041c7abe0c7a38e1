//! Schema model: the static description the codec interprets.
//!
//! A schema is built once (parsed from notation or assembled with the builders below), resolved
//! into a [`ResolvedSchema`] registry, and then only read.

use crate::error::SchemaError;
use std::collections::HashMap;

/// Inclusive integer bound; `None` on either side means unbounded on that side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IntRange {
    pub lower: Option<i64>,
    pub upper: Option<i64>,
    /// `(lo..hi, ...)`: values outside the root are sent unconstrained behind a marker bit.
    pub extensible: bool,
}

impl IntRange {
    pub fn constrained(lower: i64, upper: i64) -> Self {
        IntRange {
            lower: Some(lower),
            upper: Some(upper),
            extensible: false,
        }
    }

    pub fn semi_constrained(lower: i64) -> Self {
        IntRange {
            lower: Some(lower),
            upper: None,
            extensible: false,
        }
    }

    pub fn unconstrained() -> Self {
        IntRange::default()
    }

    pub fn extensible(mut self) -> Self {
        self.extensible = true;
        self
    }

    pub fn contains(&self, value: i64) -> bool {
        self.lower.map_or(true, |lo| value >= lo) && self.upper.map_or(true, |hi| value <= hi)
    }
}

/// Inclusive size bound for strings and lists; `max: None` is unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SizeRange {
    pub min: usize,
    pub max: Option<usize>,
    pub extensible: bool,
}

/// Upper bounds at or above this are sent with a general length determinant.
pub const CONSTRAINED_SIZE_LIMIT: usize = 65536;

impl SizeRange {
    pub fn fixed(n: usize) -> Self {
        SizeRange {
            min: n,
            max: Some(n),
            extensible: false,
        }
    }

    pub fn bounded(min: usize, max: usize) -> Self {
        SizeRange {
            min,
            max: Some(max),
            extensible: false,
        }
    }

    pub fn at_least(min: usize) -> Self {
        SizeRange {
            min,
            max: None,
            extensible: false,
        }
    }

    pub fn unbounded() -> Self {
        SizeRange::default()
    }

    pub fn extensible(mut self) -> Self {
        self.extensible = true;
        self
    }

    pub fn contains(&self, n: usize) -> bool {
        n >= self.min && self.max.map_or(true, |max| n <= max)
    }

    /// Upper bound small enough for the constrained-whole-number form.
    pub fn effective_upper(&self) -> Option<usize> {
        self.max.filter(|&max| max < CONSTRAINED_SIZE_LIMIT)
    }
}

/// Literal used in `DEFAULT` clauses.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Int(i64),
    Bool(bool),
    Ident(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Presence {
    Mandatory,
    Optional,
    /// Encoded exactly like OPTIONAL; the literal is informational.
    Default(Literal),
}

/// One named component of a SEQUENCE or alternative of a CHOICE.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSpec {
    pub name: String,
    pub ty: AsnType,
    pub presence: Presence,
}

impl FieldSpec {
    pub fn mandatory(name: impl Into<String>, ty: AsnType) -> Self {
        FieldSpec {
            name: name.into(),
            ty,
            presence: Presence::Mandatory,
        }
    }

    pub fn optional(name: impl Into<String>, ty: AsnType) -> Self {
        FieldSpec {
            name: name.into(),
            ty,
            presence: Presence::Optional,
        }
    }

    pub fn with_default(name: impl Into<String>, ty: AsnType, default: Literal) -> Self {
        FieldSpec {
            name: name.into(),
            ty,
            presence: Presence::Default(default),
        }
    }

    /// Takes a bit in the presence bitmap.
    pub fn is_optional(&self) -> bool {
        !matches!(self.presence, Presence::Mandatory)
    }
}

/// One extension addition of a SEQUENCE: a single component or a `[[ ... ]]` group.
#[derive(Debug, Clone, PartialEq)]
pub enum ExtensionAddition {
    Field(FieldSpec),
    Group(Vec<FieldSpec>),
}

impl ExtensionAddition {
    pub fn fields(&self) -> &[FieldSpec] {
        match self {
            ExtensionAddition::Field(f) => std::slice::from_ref(f),
            ExtensionAddition::Group(fields) => fields,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct SequenceSpec {
    pub root: Vec<FieldSpec>,
    pub extensible: bool,
    pub extensions: Vec<ExtensionAddition>,
}

impl SequenceSpec {
    pub fn new(root: Vec<FieldSpec>) -> Self {
        SequenceSpec {
            root,
            extensible: false,
            extensions: Vec::new(),
        }
    }

    /// Mark extensible with the given additions (possibly none).
    pub fn extensible(mut self, extensions: Vec<ExtensionAddition>) -> Self {
        self.extensible = true;
        self.extensions = extensions;
        self
    }

    pub fn optional_count(&self) -> usize {
        self.root.iter().filter(|f| f.is_optional()).count()
    }

    /// Every field name, root first, then extension fields in addition order.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.root
            .iter()
            .chain(self.extensions.iter().flat_map(|e| e.fields().iter()))
            .map(|f| f.name.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ChoiceSpec {
    pub root: Vec<FieldSpec>,
    pub extensible: bool,
    pub extensions: Vec<FieldSpec>,
}

impl ChoiceSpec {
    pub fn new(root: Vec<FieldSpec>) -> Self {
        ChoiceSpec {
            root,
            extensible: false,
            extensions: Vec::new(),
        }
    }

    pub fn extensible(mut self, extensions: Vec<FieldSpec>) -> Self {
        self.extensible = true;
        self.extensions = extensions;
        self
    }

    /// Alternative by global index (root first, then extensions).
    pub fn alternative(&self, index: usize) -> Option<&FieldSpec> {
        if index < self.root.len() {
            self.root.get(index)
        } else {
            self.extensions.get(index - self.root.len())
        }
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.root
            .iter()
            .chain(self.extensions.iter())
            .position(|f| f.name == name)
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct EnumSpec {
    pub root: Vec<String>,
    pub extensible: bool,
    pub extensions: Vec<String>,
}

impl EnumSpec {
    pub fn new<S: Into<String>>(root: impl IntoIterator<Item = S>) -> Self {
        EnumSpec {
            root: root.into_iter().map(Into::into).collect(),
            extensible: false,
            extensions: Vec::new(),
        }
    }

    pub fn extensible<S: Into<String>>(mut self, extensions: impl IntoIterator<Item = S>) -> Self {
        self.extensible = true;
        self.extensions = extensions.into_iter().map(Into::into).collect();
        self
    }

    /// Item name by global index (root first, then extensions).
    pub fn name(&self, index: u64) -> Option<&str> {
        let index = usize::try_from(index).ok()?;
        self.root
            .iter()
            .chain(self.extensions.iter())
            .nth(index)
            .map(String::as_str)
    }

    pub fn index_of(&self, name: &str) -> Option<u64> {
        self.root
            .iter()
            .chain(self.extensions.iter())
            .position(|n| n == name)
            .map(|i| i as u64)
    }
}

/// A type as the codec sees it.
#[derive(Debug, Clone, PartialEq)]
pub enum AsnType {
    Null,
    Boolean,
    Integer(IntRange),
    Enumerated(EnumSpec),
    BitString(SizeRange),
    /// `containing` names the type carried inside (`OCTET STRING (CONTAINING T)`).
    OctetString {
        size: SizeRange,
        containing: Option<String>,
    },
    /// Open type: a complete encoding of some type the schema does not pin down.
    Open,
    Sequence(SequenceSpec),
    Choice(ChoiceSpec),
    SequenceOf {
        element: Box<AsnType>,
        size: SizeRange,
        /// SET OF: transported exactly like SEQUENCE OF.
        set: bool,
    },
    Ref(String),
}

impl AsnType {
    pub fn integer(lower: i64, upper: i64) -> Self {
        AsnType::Integer(IntRange::constrained(lower, upper))
    }

    pub fn octet_string(size: SizeRange) -> Self {
        AsnType::OctetString {
            size,
            containing: None,
        }
    }

    pub fn containing(type_name: impl Into<String>) -> Self {
        AsnType::OctetString {
            size: SizeRange::unbounded(),
            containing: Some(type_name.into()),
        }
    }

    pub fn sequence_of(element: AsnType, size: SizeRange) -> Self {
        AsnType::SequenceOf {
            element: Box::new(element),
            size,
            set: false,
        }
    }

    pub fn reference(name: impl Into<String>) -> Self {
        AsnType::Ref(name.into())
    }

    /// Short name of the type category, for messages and dumps.
    pub fn kind_name(&self) -> &'static str {
        match self {
            AsnType::Null => "NULL",
            AsnType::Boolean => "BOOLEAN",
            AsnType::Integer(_) => "INTEGER",
            AsnType::Enumerated(_) => "ENUMERATED",
            AsnType::BitString(_) => "BIT STRING",
            AsnType::OctetString { .. } => "OCTET STRING",
            AsnType::Open => "open type",
            AsnType::Sequence(_) => "SEQUENCE",
            AsnType::Choice(_) => "CHOICE",
            AsnType::SequenceOf { set: false, .. } => "SEQUENCE OF",
            AsnType::SequenceOf { set: true, .. } => "SET OF",
            AsnType::Ref(_) => "reference",
        }
    }
}

/// `Name ::= Type`.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeDef {
    pub name: String,
    pub ty: AsnType,
}

/// Parsed schema: optional module name, integer value assignments, type assignments.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Schema {
    pub module: Option<String>,
    pub values: Vec<(String, i64)>,
    pub types: Vec<TypeDef>,
}

/// Validated schema with name lookup; the registry every decode/encode call is handed.
#[derive(Debug, Clone, Default)]
pub struct ResolvedSchema {
    pub schema: Schema,
    pub types_by_name: HashMap<String, usize>,
}

impl ResolvedSchema {
    pub fn resolve(schema: Schema) -> Result<Self, SchemaError> {
        let mut types_by_name = HashMap::new();
        for (i, t) in schema.types.iter().enumerate() {
            if types_by_name.insert(t.name.clone(), i).is_some() {
                return Err(SchemaError::Duplicate(t.name.clone()));
            }
        }
        let resolved = ResolvedSchema {
            schema,
            types_by_name,
        };
        for t in &resolved.schema.types {
            resolved.check_type(&t.ty, &t.name)?;
        }
        Ok(resolved)
    }

    /// Parse notation and resolve it in one step.
    pub fn from_source(source: &str) -> Result<Self, SchemaError> {
        ResolvedSchema::resolve(crate::parser::parse(source)?)
    }

    pub fn get_type(&self, name: &str) -> Option<&AsnType> {
        self.types_by_name
            .get(name)
            .map(|&i| &self.schema.types[i].ty)
    }

    pub fn type_names(&self) -> impl Iterator<Item = &str> {
        self.schema.types.iter().map(|t| t.name.as_str())
    }

    /// Follow references until a non-reference type.
    pub fn resolve_ref<'s>(&'s self, mut ty: &'s AsnType) -> Option<&'s AsnType> {
        let mut hops = 0;
        while let AsnType::Ref(name) = ty {
            ty = self.get_type(name)?;
            hops += 1;
            if hops > self.schema.types.len() {
                return None;
            }
        }
        Some(ty)
    }

    fn check_type(&self, ty: &AsnType, context: &str) -> Result<(), SchemaError> {
        let invalid = |reason: &str| SchemaError::Invalid {
            context: context.to_string(),
            reason: reason.to_string(),
        };
        match ty {
            AsnType::Null | AsnType::Boolean | AsnType::Open => Ok(()),
            AsnType::Integer(r) => match (r.lower, r.upper) {
                (Some(lo), Some(hi)) if lo > hi => Err(invalid("lower bound above upper bound")),
                _ => Ok(()),
            },
            AsnType::Enumerated(e) => {
                if e.root.is_empty() {
                    return Err(invalid("ENUMERATED without root items"));
                }
                Ok(())
            }
            AsnType::BitString(size) => check_size(size, context),
            AsnType::OctetString { size, containing } => {
                check_size(size, context)?;
                if let Some(name) = containing {
                    self.check_ref(name, context)?;
                }
                Ok(())
            }
            AsnType::Sequence(seq) => {
                let mut seen = std::collections::HashSet::new();
                for name in seq.field_names() {
                    if !seen.insert(name) {
                        return Err(invalid(&format!("duplicate field '{}'", name)));
                    }
                }
                for f in seq.root.iter().chain(seq.extensions.iter().flat_map(|e| e.fields().iter())) {
                    self.check_type(&f.ty, &format!("{}.{}", context, f.name))?;
                }
                Ok(())
            }
            AsnType::Choice(choice) => {
                if choice.root.is_empty() {
                    return Err(invalid("CHOICE without root alternatives"));
                }
                let mut seen = std::collections::HashSet::new();
                for f in choice.root.iter().chain(choice.extensions.iter()) {
                    if !seen.insert(f.name.as_str()) {
                        return Err(invalid(&format!("duplicate alternative '{}'", f.name)));
                    }
                }
                for f in choice.root.iter().chain(choice.extensions.iter()) {
                    self.check_type(&f.ty, &format!("{}.{}", context, f.name))?;
                }
                Ok(())
            }
            AsnType::SequenceOf { element, size, .. } => {
                check_size(size, context)?;
                self.check_type(element, &format!("{}.element", context))
            }
            AsnType::Ref(name) => self.check_ref(name, context),
        }
    }

    fn check_ref(&self, name: &str, context: &str) -> Result<(), SchemaError> {
        if self.types_by_name.contains_key(name) {
            Ok(())
        } else {
            Err(SchemaError::Unresolved {
                name: name.to_string(),
                context: context.to_string(),
            })
        }
    }
}

fn check_size(size: &SizeRange, context: &str) -> Result<(), SchemaError> {
    match size.max {
        Some(max) if max < size.min => Err(SchemaError::Invalid {
            context: context.to_string(),
            reason: format!("SIZE({}..{}) is empty", size.min, max),
        }),
        _ => Ok(()),
    }
}
