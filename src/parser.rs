//! Parse ASN.1 notation into a [`Schema`] using PEST.
//!
//! Integer value assignments (`maxItems INTEGER ::= 16`) are collected first so they can be used
//! as bounds anywhere in the module, before or after their definition.

use crate::ast::*;
use crate::error::SchemaError;
use pest::Parser;
use pest_derive::Parser as PestParser;
use std::collections::HashMap;
use std::path::Path;

#[derive(PestParser)]
#[grammar = "grammar.pest"]
struct AsnParser;

type Pair<'i> = pest::iterators::Pair<'i, Rule>;

/// Parse schema source into a [`Schema`].
pub fn parse(source: &str) -> Result<Schema, SchemaError> {
    let pairs = AsnParser::parse(Rule::schema, source).map_err(|e| SchemaError::Syntax(e.to_string()))?;
    let pair = pairs
        .into_iter()
        .next()
        .ok_or_else(|| SchemaError::Syntax("empty parse".to_string()))?;
    build_schema(pair)
}

/// Read and parse a schema file.
pub fn parse_file(path: impl AsRef<Path>) -> Result<Schema, SchemaError> {
    let path = path.as_ref();
    let source = std::fs::read_to_string(path)
        .map_err(|e| SchemaError::Io(format!("{}: {}", path.display(), e)))?;
    parse(&source)
}

fn syntax(what: &str) -> SchemaError {
    SchemaError::Syntax(what.to_string())
}

fn parse_i64(pair: &Pair) -> Result<i64, SchemaError> {
    pair.as_str()
        .parse::<i64>()
        .map_err(|e| SchemaError::Syntax(format!("{}: {}", pair.as_str(), e)))
}

fn build_schema(pair: Pair) -> Result<Schema, SchemaError> {
    let mut module = None;
    let mut extensibility_implied = false;
    let mut assignments = None;
    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::module_def => {
                for part in inner.into_inner() {
                    match part.as_rule() {
                        Rule::ident if module.is_none() => module = Some(part.as_str().to_string()),
                        Rule::extensibility_implied => extensibility_implied = true,
                        Rule::assignment_list => assignments = Some(part),
                        _ => {}
                    }
                }
            }
            Rule::assignment_list => assignments = Some(inner),
            _ => {}
        }
    }
    let assignments: Vec<Pair> = assignments.map(|a| a.into_inner().collect()).unwrap_or_default();

    let mut values = Vec::new();
    let mut by_name = HashMap::new();
    for a in assignments.iter().filter(|a| a.as_rule() == Rule::value_assignment) {
        let mut name = None;
        let mut value = None;
        for part in a.clone().into_inner() {
            match part.as_rule() {
                Rule::ident => name = Some(part.as_str().to_string()),
                Rule::signed_number => value = Some(parse_i64(&part)?),
                _ => {}
            }
        }
        let (name, value) = name.zip(value).ok_or_else(|| syntax("value assignment"))?;
        if by_name.insert(name.clone(), value).is_some() {
            return Err(SchemaError::Duplicate(name));
        }
        values.push((name, value));
    }

    let builder = Builder {
        values: &by_name,
        extensibility_implied,
    };
    let mut types = Vec::new();
    for a in assignments.into_iter().filter(|a| a.as_rule() == Rule::type_assignment) {
        let mut it = a.into_inner();
        let name = it.next().ok_or_else(|| syntax("type assignment: name"))?.as_str().to_string();
        let ty_pair = it.next().ok_or_else(|| syntax("type assignment: type"))?;
        let ty = builder.build_type(ty_pair, &name)?;
        types.push(TypeDef { name, ty });
    }
    Ok(Schema {
        module,
        values,
        types,
    })
}

enum Bound {
    Min,
    Max,
    Value(i64),
}

struct Builder<'v> {
    values: &'v HashMap<String, i64>,
    /// `EXTENSIBILITY IMPLIED`: every SEQUENCE, CHOICE and ENUMERATED carries an extension marker.
    extensibility_implied: bool,
}

impl Builder<'_> {
    fn build_type(&self, pair: Pair, context: &str) -> Result<AsnType, SchemaError> {
        let inner = pair
            .into_inner()
            .find(|p| p.as_rule() != Rule::tag)
            .ok_or_else(|| syntax("empty type"))?;
        let ty = match inner.as_rule() {
            Rule::null_type => AsnType::Null,
            Rule::boolean_type => AsnType::Boolean,
            Rule::integer_type => {
                let range = match inner.into_inner().find(|p| p.as_rule() == Rule::value_constraint) {
                    Some(c) => self.int_range(c, context)?,
                    None => IntRange::unconstrained(),
                };
                AsnType::Integer(range)
            }
            Rule::enumerated_type => AsnType::Enumerated(self.build_enum(inner, context)?),
            Rule::bit_string_type => {
                let size = match inner.into_inner().find(|p| p.as_rule() == Rule::size_constraint) {
                    Some(c) => self.size_range(c, context)?,
                    None => SizeRange::unbounded(),
                };
                AsnType::BitString(size)
            }
            Rule::octet_string_type => {
                let mut size = SizeRange::unbounded();
                let mut containing = None;
                for part in inner.into_inner() {
                    match part.as_rule() {
                        Rule::size_constraint => size = self.size_range(part, context)?,
                        Rule::containing_constraint => {
                            containing = part
                                .into_inner()
                                .find(|p| p.as_rule() == Rule::ident)
                                .map(|p| p.as_str().to_string());
                        }
                        _ => {}
                    }
                }
                AsnType::OctetString { size, containing }
            }
            Rule::sequence_of_type => {
                let mut set = false;
                let mut size = SizeRange::unbounded();
                let mut element = None;
                for part in inner.into_inner() {
                    match part.as_rule() {
                        Rule::k_set => set = true,
                        Rule::size_constraint => size = self.size_range(part, context)?,
                        Rule::asn_type => {
                            element = Some(self.build_type(part, &format!("{}.element", context))?)
                        }
                        _ => {}
                    }
                }
                AsnType::SequenceOf {
                    element: Box::new(element.ok_or_else(|| syntax("SEQUENCE OF without element type"))?),
                    size,
                    set,
                }
            }
            Rule::sequence_type => AsnType::Sequence(self.build_sequence(inner, context)?),
            Rule::choice_type => AsnType::Choice(self.build_choice(inner, context)?),
            Rule::any_type => AsnType::Open,
            Rule::type_ref => AsnType::Ref(inner.as_str().trim().to_string()),
            r => return Err(SchemaError::Syntax(format!("unexpected {:?} in {}", r, context))),
        };
        Ok(ty)
    }

    fn bound(&self, pair: Pair, context: &str) -> Result<Bound, SchemaError> {
        let inner = pair.into_inner().next().ok_or_else(|| syntax("empty bound"))?;
        match inner.as_rule() {
            Rule::k_min => Ok(Bound::Min),
            Rule::k_max => Ok(Bound::Max),
            Rule::signed_number => parse_i64(&inner).map(Bound::Value),
            _ => {
                let name = inner.as_str();
                self.values
                    .get(name)
                    .copied()
                    .map(Bound::Value)
                    .ok_or_else(|| SchemaError::Unresolved {
                        name: name.to_string(),
                        context: context.to_string(),
                    })
            }
        }
    }

    /// `lo..hi` or a single value, as `(lower, upper)`; `None` for MIN/MAX.
    fn range(&self, pair: Pair, context: &str) -> Result<(Option<i64>, Option<i64>), SchemaError> {
        let mut bounds = Vec::new();
        for b in pair.into_inner().filter(|p| p.as_rule() == Rule::bound) {
            bounds.push(self.bound(b, context)?);
        }
        let value = |b: &Bound| match b {
            Bound::Value(v) => Some(*v),
            Bound::Min | Bound::Max => None,
        };
        match bounds.as_slice() {
            [single] => Ok((value(single), value(single))),
            [lo, hi] => Ok((value(lo), value(hi))),
            _ => Err(syntax("range")),
        }
    }

    /// Root range and whether the constraint carries an extension marker.
    fn constraint(&self, pair: Pair, context: &str) -> Result<((Option<i64>, Option<i64>), bool), SchemaError> {
        let mut root = None;
        let mut extensible = false;
        for part in pair.into_inner() {
            match part.as_rule() {
                Rule::range => root = Some(self.range(part, context)?),
                Rule::extension_marker => extensible = true,
                _ => {}
            }
        }
        Ok((root.ok_or_else(|| syntax("constraint without range"))?, extensible))
    }

    fn int_range(&self, pair: Pair, context: &str) -> Result<IntRange, SchemaError> {
        let ((lower, upper), extensible) = self.constraint(pair, context)?;
        Ok(IntRange {
            lower,
            upper,
            extensible,
        })
    }

    fn size_range(&self, pair: Pair, context: &str) -> Result<SizeRange, SchemaError> {
        let ((lower, upper), extensible) = self.constraint(pair, context)?;
        let to_size = |v: i64| {
            usize::try_from(v).map_err(|_| SchemaError::Invalid {
                context: context.to_string(),
                reason: format!("negative size {}", v),
            })
        };
        Ok(SizeRange {
            min: lower.map(to_size).transpose()?.unwrap_or(0),
            max: upper.map(to_size).transpose()?,
            extensible,
        })
    }

    fn build_enum(&self, pair: Pair, context: &str) -> Result<EnumSpec, SchemaError> {
        let mut root: Vec<(String, Option<i64>)> = Vec::new();
        let mut extensions = Vec::new();
        let mut ellipses = 0;
        for part in pair.into_inner() {
            match part.as_rule() {
                Rule::ellipsis => ellipses += 1,
                Rule::enum_item => {
                    let mut it = part.into_inner();
                    let name = it.next().ok_or_else(|| syntax("enum item"))?.as_str().to_string();
                    let number = it.next().map(|n| parse_i64(&n)).transpose()?;
                    if ellipses == 0 {
                        root.push((name, number));
                    } else {
                        extensions.push(name);
                    }
                }
                _ => {}
            }
        }
        if ellipses > 1 {
            return Err(SchemaError::Invalid {
                context: context.to_string(),
                reason: "ENUMERATED with more than one extension marker".to_string(),
            });
        }
        // Root indices follow the order of the associated values when every item has one.
        if root.iter().all(|(_, n)| n.is_some()) {
            root.sort_by_key(|(_, n)| *n);
        }
        Ok(EnumSpec {
            root: root.into_iter().map(|(name, _)| name).collect(),
            extensible: ellipses > 0 || self.extensibility_implied,
            extensions,
        })
    }

    fn build_component(&self, pair: Pair, context: &str) -> Result<FieldSpec, SchemaError> {
        let mut name = None;
        let mut ty = None;
        let mut presence = Presence::Mandatory;
        for part in pair.into_inner() {
            match part.as_rule() {
                Rule::ident => name = Some(part.as_str().to_string()),
                Rule::asn_type => {
                    let field = name.as_deref().unwrap_or("?");
                    ty = Some(self.build_type(part, &format!("{}.{}", context, field))?);
                }
                Rule::presence => presence = build_presence(part)?,
                _ => {}
            }
        }
        Ok(FieldSpec {
            name: name.ok_or_else(|| syntax("component name"))?,
            ty: ty.ok_or_else(|| syntax("component type"))?,
            presence,
        })
    }

    fn build_group(&self, pair: Pair, context: &str) -> Result<Vec<FieldSpec>, SchemaError> {
        pair.into_inner()
            .filter(|p| p.as_rule() == Rule::component)
            .map(|p| self.build_component(p, context))
            .collect()
    }

    fn build_sequence(&self, pair: Pair, context: &str) -> Result<SequenceSpec, SchemaError> {
        let mut root = Vec::new();
        let mut extensions = Vec::new();
        let mut ellipses = 0;
        for part in pair.into_inner() {
            match part.as_rule() {
                Rule::ellipsis => ellipses += 1,
                Rule::component => {
                    let field = self.build_component(part, context)?;
                    if ellipses == 1 {
                        extensions.push(ExtensionAddition::Field(field));
                    } else {
                        root.push(field);
                    }
                }
                Rule::extension_group if ellipses == 1 => {
                    extensions.push(ExtensionAddition::Group(self.build_group(part, context)?));
                }
                Rule::extension_group => {
                    return Err(SchemaError::Invalid {
                        context: context.to_string(),
                        reason: "extension group outside the extension part".to_string(),
                    })
                }
                _ => {}
            }
        }
        if ellipses > 2 {
            return Err(SchemaError::Invalid {
                context: context.to_string(),
                reason: "more than two extension markers".to_string(),
            });
        }
        Ok(SequenceSpec {
            root,
            extensible: ellipses > 0 || self.extensibility_implied,
            extensions,
        })
    }

    fn build_choice(&self, pair: Pair, context: &str) -> Result<ChoiceSpec, SchemaError> {
        let mut root = Vec::new();
        let mut extensions = Vec::new();
        let mut ellipses = 0;
        let mut last_tag: Option<(u64, String)> = None;
        for part in pair.into_inner() {
            match part.as_rule() {
                Rule::ellipsis => ellipses += 1,
                Rule::component => {
                    let tag = context_tag(&part);
                    let alt = self.build_component(part, context)?;
                    if ellipses == 1 {
                        extensions.push(alt);
                        continue;
                    }
                    // Root indices follow textual order; tags that sort otherwise are refused.
                    if let Some(tag) = tag {
                        if let Some((prev, prev_name)) = last_tag.as_ref().filter(|last| tag <= last.0) {
                            return Err(SchemaError::Invalid {
                                context: format!("{}.{}", context, alt.name),
                                reason: format!("tag [{}] does not follow [{}] of '{}'", tag, prev, prev_name),
                            });
                        }
                        last_tag = Some((tag, alt.name.clone()));
                    }
                    root.push(alt);
                }
                // Alternatives of a version group are plain extension alternatives.
                Rule::extension_group if ellipses == 1 => extensions.extend(self.build_group(part, context)?),
                Rule::extension_group => {
                    return Err(SchemaError::Invalid {
                        context: context.to_string(),
                        reason: "extension group outside the extension part".to_string(),
                    })
                }
                _ => {}
            }
        }
        if ellipses > 2 {
            return Err(SchemaError::Invalid {
                context: context.to_string(),
                reason: "more than two extension markers".to_string(),
            });
        }
        Ok(ChoiceSpec {
            root,
            extensible: ellipses > 0 || self.extensibility_implied,
            extensions,
        })
    }
}

/// Number of a context-specific `[n]` tag in front of a component's type.
fn context_tag(component: &Pair) -> Option<u64> {
    let ty = component.clone().into_inner().find(|p| p.as_rule() == Rule::asn_type)?;
    let tag = ty.into_inner().next().filter(|p| p.as_rule() == Rule::tag)?;
    let first = tag.into_inner().next()?;
    match first.as_rule() {
        Rule::number => first.as_str().parse().ok(),
        _ => None,
    }
}

fn build_presence(pair: Pair) -> Result<Presence, SchemaError> {
    let mut it = pair.into_inner();
    let head = it.next().ok_or_else(|| syntax("presence"))?;
    if head.as_rule() == Rule::k_optional {
        return Ok(Presence::Optional);
    }
    let literal = it
        .next()
        .and_then(|l| l.into_inner().next())
        .ok_or_else(|| syntax("DEFAULT without value"))?;
    let literal = match literal.as_rule() {
        Rule::k_true => Literal::Bool(true),
        Rule::k_false => Literal::Bool(false),
        Rule::signed_number => Literal::Int(parse_i64(&literal)?),
        _ => Literal::Ident(literal.as_str().to_string()),
    };
    Ok(Presence::Default(literal))
}
