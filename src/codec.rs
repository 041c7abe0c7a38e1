//! Decode/encode PER messages from a resolved schema.
//!
//! One generic recursive function per type category interprets the schema: SEQUENCE (presence
//! bitmap, extension additions), CHOICE (root index or extension alternative), SEQUENCE OF
//! (count + elements), and the primitives in [`crate::per`].
//!
//! Extension additions and extension alternatives travel as open types. Ones this schema does not
//! know are skipped by their length and reported as [`Warning::UnknownExtension`], never as errors.

use crate::ast::*;
use crate::bits::{BitCursor, BitSink};
use crate::config::CodecConfig;
use crate::error::CodecError;
use crate::per;
use crate::value::{ChoiceValue, OpenValue, SequenceValue, Value};
use std::fmt;

#[derive(Debug, Clone)]
pub struct Codec {
    pub config: CodecConfig,
    resolved: ResolvedSchema,
}

/// Result of a top-level decode.
#[derive(Debug, Clone, PartialEq)]
pub struct Decoded {
    pub value: Value,
    /// Bits consumed by the PDU.
    pub bits: usize,
    /// `bits` rounded up to whole octets (at least one): the extent of the PDU in the input.
    pub octets: usize,
    pub warnings: Vec<Warning>,
}

/// Which extensible construct carried an unknown extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtensionKind {
    SequenceAddition,
    ChoiceAlternative,
    EnumeratedItem,
}

/// Non-fatal findings of a decode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Warning {
    /// A value or size outside its bound, accepted under the permissive policy.
    OutOfRange {
        path: String,
        offset: usize,
        value: i64,
        lower: Option<i64>,
        upper: Option<i64>,
    },
    /// An extension this schema does not know; `index` counts from the first extension and
    /// `octets` is the size of the skipped content.
    UnknownExtension {
        path: String,
        offset: usize,
        kind: ExtensionKind,
        index: u64,
        octets: usize,
    },
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bound = |b: &Option<i64>, open: &str| b.map_or_else(|| open.to_string(), |v| v.to_string());
        match self {
            Warning::OutOfRange {
                path,
                offset,
                value,
                lower,
                upper,
            } => write!(
                f,
                "{}: {} outside {}..{} at bit {}",
                path,
                value,
                bound(lower, "MIN"),
                bound(upper, "MAX"),
                offset
            ),
            Warning::UnknownExtension {
                path,
                offset,
                kind,
                index,
                octets,
            } => {
                let what = match kind {
                    ExtensionKind::SequenceAddition => "extension addition",
                    ExtensionKind::ChoiceAlternative => "extension alternative",
                    ExtensionKind::EnumeratedItem => "extension item",
                };
                write!(
                    f,
                    "{}: unknown {} #{} ({} octets) at bit {}",
                    path, what, index, octets, offset
                )
            }
        }
    }
}

/// Decode-side state threaded through one call: field path, warnings, nesting depth.
#[derive(Debug, Default)]
pub struct DecodeContext {
    path: Vec<String>,
    warnings: Vec<Warning>,
    depth: usize,
    items: usize,
}

impl DecodeContext {
    pub fn new() -> Self {
        DecodeContext::default()
    }

    pub fn for_type(type_name: &str) -> Self {
        DecodeContext {
            path: vec![type_name.to_string()],
            ..DecodeContext::default()
        }
    }

    pub fn path(&self) -> String {
        self.path.join(".")
    }

    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    pub fn into_warnings(self) -> Vec<Warning> {
        self.warnings
    }

    fn in_field<T>(&mut self, name: &str, f: impl FnOnce(&mut Self) -> T) -> T {
        self.path.push(name.to_string());
        let out = f(self);
        self.path.pop();
        out
    }

    fn enter(&mut self, offset: usize, limit: usize) -> Result<(), CodecError> {
        if self.depth >= limit {
            return Err(CodecError::DepthExceeded { offset, limit });
        }
        self.depth += 1;
        Ok(())
    }

    fn leave(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    fn count_items(&mut self, offset: usize, n: usize, limit: usize) -> Result<(), CodecError> {
        self.items = self.items.saturating_add(n);
        if self.items > limit {
            return Err(CodecError::malformed(
                offset,
                format!("{} list elements exceed the limit of {}", self.items, limit),
            ));
        }
        Ok(())
    }

    fn absorb(&mut self, cur: &mut BitCursor) {
        for v in cur.take_violations() {
            self.warnings.push(Warning::OutOfRange {
                path: self.path(),
                offset: v.offset,
                value: v.value,
                lower: v.lower,
                upper: v.upper,
            });
        }
    }

    fn unknown_extension(&mut self, offset: usize, kind: ExtensionKind, index: u64, octets: usize) {
        let path = self.path();
        log::debug!(
            "{}: skipping unknown {:?} #{} ({} octets) at bit {}",
            path,
            kind,
            index,
            octets,
            offset
        );
        self.warnings.push(Warning::UnknownExtension {
            path,
            offset,
            kind,
            index,
            octets,
        });
    }
}

/// Encode-side state: field path (for logging) and nesting depth.
#[derive(Debug, Default)]
pub struct EncodeContext {
    path: Vec<String>,
    depth: usize,
}

impl EncodeContext {
    pub fn new() -> Self {
        EncodeContext::default()
    }

    fn in_field<T>(&mut self, name: &str, f: impl FnOnce(&mut Self) -> T) -> T {
        self.path.push(name.to_string());
        let out = f(self);
        self.path.pop();
        out
    }

    fn enter(&mut self, offset: usize, limit: usize) -> Result<(), CodecError> {
        if self.depth >= limit {
            return Err(CodecError::DepthExceeded { offset, limit });
        }
        self.depth += 1;
        Ok(())
    }

    fn leave(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }
}

/// Octets a complete encoding of `bits` occupies in `input`: zero-padded and never empty, so a
/// PDU that encodes in zero bits still needs its one octet.
pub(crate) fn complete_octets(bits: usize, input: &[u8]) -> Result<usize, CodecError> {
    if input.is_empty() {
        return Err(CodecError::OutOfBounds {
            offset: 0,
            needed: 8,
            available: 0,
        });
    }
    Ok(((bits + 7) >> 3).max(1))
}

impl Codec {
    pub fn new(resolved: ResolvedSchema, config: CodecConfig) -> Self {
        Codec { config, resolved }
    }

    pub fn resolved(&self) -> &ResolvedSchema {
        &self.resolved
    }

    /// Cursor carrying this codec's decode settings.
    pub fn cursor<'a>(&self, bytes: &'a [u8]) -> BitCursor<'a> {
        BitCursor::with_config(bytes, &self.config)
    }

    /// Sink carrying this codec's encode settings.
    pub fn sink(&self) -> BitSink {
        BitSink::with_config(&self.config)
    }

    pub(crate) fn lookup(&self, type_name: &str) -> Result<&AsnType, CodecError> {
        self.resolved
            .get_type(type_name)
            .ok_or_else(|| CodecError::UnknownType(type_name.to_string()))
    }

    /// Decode one PDU of `type_name` from the start of `bytes`.
    pub fn decode_message(&self, type_name: &str, bytes: &[u8]) -> Result<Decoded, CodecError> {
        let ty = self.lookup(type_name)?;
        let mut cur = self.cursor(bytes);
        let mut ctx = DecodeContext::for_type(type_name);
        let value = self.decode_type(&mut cur, ty, &mut ctx)?;
        let bits = cur.position();
        Ok(Decoded {
            value,
            bits,
            octets: complete_octets(bits, bytes)?,
            warnings: ctx.into_warnings(),
        })
    }

    /// Complete encoding of one PDU: zero-padded to octets, never empty.
    pub fn encode_message(&self, type_name: &str, value: &Value) -> Result<Vec<u8>, CodecError> {
        let ty = self.lookup(type_name)?;
        let mut sink = self.sink();
        let mut ctx = EncodeContext::new();
        ctx.path.push(type_name.to_string());
        self.encode_type(&mut sink, ty, value, &mut ctx)?;
        log::trace!("{}: encoded {} bits", type_name, sink.len());
        Ok(sink.into_open_octets())
    }

    /// Decode the payload of an `OCTET STRING (CONTAINING T)` field as a `T` message.
    pub fn decode_embedded(&self, open: &OpenValue) -> Result<Decoded, CodecError> {
        let type_name = open
            .containing
            .as_deref()
            .ok_or_else(|| CodecError::UnknownType("open value without a declared type".to_string()))?;
        self.decode_message(type_name, &open.bytes)
    }

    /// Encode `value` as a `type_name` message and wrap it for a CONTAINING field.
    pub fn encode_embedded(&self, type_name: &str, value: &Value) -> Result<Value, CodecError> {
        let bytes = self.encode_message(type_name, value)?;
        Ok(Value::Open(OpenValue::containing(type_name, bytes)))
    }

    // -----------------------------------------------------------------------
    // Decode
    // -----------------------------------------------------------------------

    pub fn decode_type(
        &self,
        cur: &mut BitCursor,
        ty: &AsnType,
        ctx: &mut DecodeContext,
    ) -> Result<Value, CodecError> {
        ctx.enter(cur.offset(), self.config.max_depth)?;
        let result = self.decode_type_inner(cur, ty, ctx);
        ctx.leave();
        let value = result?;
        ctx.absorb(cur);
        Ok(value)
    }

    fn decode_type_inner(
        &self,
        cur: &mut BitCursor,
        ty: &AsnType,
        ctx: &mut DecodeContext,
    ) -> Result<Value, CodecError> {
        let v = match ty {
            AsnType::Null => {
                per::decode_null(cur)?;
                Value::Null
            }
            AsnType::Boolean => Value::Boolean(per::decode_boolean(cur)?),
            AsnType::Integer(range) => Value::Integer(per::decode_integer(cur, range)?),
            AsnType::Enumerated(spec) => {
                let at = cur.offset();
                let index = per::decode_enumerated(cur, spec.root.len(), spec.extensible)?;
                if spec.name(index).is_none() {
                    let ext = index - spec.root.len() as u64;
                    ctx.unknown_extension(at, ExtensionKind::EnumeratedItem, ext, 0);
                }
                Value::Enumerated(index)
            }
            AsnType::BitString(size) => Value::BitString(per::decode_bit_string(cur, size)?),
            AsnType::OctetString {
                size,
                containing: None,
            } => Value::OctetString(per::decode_octet_string(cur, size)?),
            AsnType::OctetString {
                size,
                containing: Some(name),
            } => Value::Open(OpenValue::containing(
                name.clone(),
                per::decode_octet_string(cur, size)?,
            )),
            AsnType::Open => Value::Open(OpenValue::new(per::decode_open_type(cur)?)),
            AsnType::Sequence(spec) => Value::Sequence(self.decode_sequence(cur, spec, ctx)?),
            AsnType::Choice(spec) => Value::Choice(Box::new(self.decode_choice(cur, spec, ctx)?)),
            AsnType::SequenceOf { element, size, .. } => {
                Value::List(self.decode_sequence_of(cur, element, size, ctx)?)
            }
            AsnType::Ref(name) => {
                let target = self.lookup(name)?;
                self.decode_type(cur, target, ctx)?
            }
        };
        Ok(v)
    }

    pub fn decode_sequence(
        &self,
        cur: &mut BitCursor,
        spec: &SequenceSpec,
        ctx: &mut DecodeContext,
    ) -> Result<SequenceValue, CodecError> {
        let extended = spec.extensible && cur.take_bit()?;
        let mut out = SequenceValue::new();
        self.decode_fields(cur, &spec.root, ctx, &mut out)?;
        let known = if extended {
            self.decode_extension_additions(cur, spec, ctx, &mut out)?
        } else {
            0
        };
        for addition in spec.extensions.iter().skip(known) {
            for f in addition.fields() {
                out.insert(f.name.clone(), Value::Absent);
            }
        }
        Ok(out)
    }

    /// Presence bitmap of the OPTIONAL/DEFAULT fields, then each present field in order.
    fn decode_fields(
        &self,
        cur: &mut BitCursor,
        fields: &[FieldSpec],
        ctx: &mut DecodeContext,
        out: &mut SequenceValue,
    ) -> Result<(), CodecError> {
        let optional = fields.iter().filter(|f| f.is_optional()).count();
        let bitmap = cur.take_bitvec(optional)?;
        let mut presence = bitmap.iter().by_vals();
        for f in fields {
            let present = !f.is_optional() || presence.next().unwrap_or(false);
            if !present {
                out.insert(f.name.clone(), Value::Absent);
                continue;
            }
            log::trace!("{}.{} at bit {}", ctx.path(), f.name, cur.offset());
            let v = ctx.in_field(&f.name, |ctx| self.decode_type(cur, &f.ty, ctx))?;
            out.insert(f.name.clone(), v);
        }
        Ok(())
    }

    /// Returns how many of the schema's additions the encoding covered.
    fn decode_extension_additions(
        &self,
        cur: &mut BitCursor,
        spec: &SequenceSpec,
        ctx: &mut DecodeContext,
        out: &mut SequenceValue,
    ) -> Result<usize, CodecError> {
        let count = per::decode_normally_small_length(cur)?;
        let presence = cur.take_bitvec(count)?;
        for (i, present) in presence.iter().by_vals().enumerate() {
            let addition = spec.extensions.get(i);
            if !present {
                for f in addition.map(ExtensionAddition::fields).unwrap_or(&[]) {
                    out.insert(f.name.clone(), Value::Absent);
                }
                continue;
            }
            let Some(addition) = addition else {
                let at = cur.offset();
                let octets = per::skip_open_type(cur)?;
                ctx.unknown_extension(at, ExtensionKind::SequenceAddition, i as u64, octets);
                continue;
            };
            let (origin, bytes) = per::decode_open_type_at(cur)?;
            let mut inner = cur.nested(&bytes, origin);
            match addition {
                ExtensionAddition::Field(f) => {
                    let v = ctx.in_field(&f.name, |ctx| self.decode_type(&mut inner, &f.ty, ctx))?;
                    out.insert(f.name.clone(), v);
                }
                ExtensionAddition::Group(fields) => {
                    self.decode_fields(&mut inner, fields, ctx, out)?;
                }
            }
        }
        Ok(count.min(spec.extensions.len()))
    }

    pub fn decode_choice(
        &self,
        cur: &mut BitCursor,
        spec: &ChoiceSpec,
        ctx: &mut DecodeContext,
    ) -> Result<ChoiceValue, CodecError> {
        let root = spec.root.len();
        if spec.extensible && cur.take_bit()? {
            let at = cur.offset();
            let ext = per::decode_normally_small(cur)?;
            let index = usize::try_from(ext)
                .ok()
                .and_then(|i| i.checked_add(root))
                .ok_or(CodecError::InvalidChoiceIndex {
                    offset: at,
                    index: ext,
                    alternatives: root,
                })?;
            let (origin, bytes) = per::decode_open_type_at(cur)?;
            let Some(alt) = spec.extensions.get(index - root) else {
                ctx.unknown_extension(at, ExtensionKind::ChoiceAlternative, ext, bytes.len());
                return Ok(ChoiceValue {
                    index,
                    name: None,
                    value: Value::Open(OpenValue::new(bytes)),
                });
            };
            let mut inner = cur.nested(&bytes, origin);
            let value = ctx.in_field(&alt.name, |ctx| self.decode_type(&mut inner, &alt.ty, ctx))?;
            return Ok(ChoiceValue {
                index,
                name: Some(alt.name.clone()),
                value,
            });
        }
        let at = cur.offset();
        let raw = per::decode_constrained_raw(cur, 0, root as i64 - 1)?;
        let (index, alt) = usize::try_from(raw)
            .ok()
            .and_then(|i| spec.root.get(i).map(|alt| (i, alt)))
            .ok_or(CodecError::InvalidChoiceIndex {
                offset: at,
                index: raw as u64,
                alternatives: root,
            })?;
        log::trace!("{}: alternative {} at bit {}", ctx.path(), alt.name, at);
        let value = ctx.in_field(&alt.name, |ctx| self.decode_type(cur, &alt.ty, ctx))?;
        Ok(ChoiceValue {
            index,
            name: Some(alt.name.clone()),
            value,
        })
    }

    pub fn decode_sequence_of(
        &self,
        cur: &mut BitCursor,
        element: &AsnType,
        size: &SizeRange,
        ctx: &mut DecodeContext,
    ) -> Result<Vec<Value>, CodecError> {
        let limit = self.config.max_decoded_items;
        let mut items = Vec::new();
        per::decode_sized(cur, size, 0, false, |c, n| {
            // A tolerated count belongs to the list, not to its first element.
            ctx.absorb(c);
            ctx.count_items(c.offset(), n, limit)?;
            for _ in 0..n {
                let label = format!("[{}]", items.len());
                let v = ctx.in_field(&label, |ctx| self.decode_type(c, element, ctx))?;
                items.push(v);
            }
            Ok(())
        })?;
        Ok(items)
    }

    // -----------------------------------------------------------------------
    // Encode
    // -----------------------------------------------------------------------

    pub fn encode_type(
        &self,
        sink: &mut BitSink,
        ty: &AsnType,
        value: &Value,
        ctx: &mut EncodeContext,
    ) -> Result<(), CodecError> {
        ctx.enter(sink.len(), self.config.max_depth)?;
        let result = self.encode_type_inner(sink, ty, value, ctx);
        ctx.leave();
        result
    }

    fn encode_type_inner(
        &self,
        sink: &mut BitSink,
        ty: &AsnType,
        value: &Value,
        ctx: &mut EncodeContext,
    ) -> Result<(), CodecError> {
        match (ty, value) {
            (AsnType::Null, Value::Null) => per::encode_null(sink),
            (AsnType::Boolean, Value::Boolean(b)) => per::encode_boolean(sink, *b),
            (AsnType::Integer(range), Value::Integer(v)) => per::encode_integer(sink, *v, range),
            (AsnType::Enumerated(spec), Value::Enumerated(index)) => {
                per::encode_enumerated(sink, *index, spec.root.len(), spec.extensible)
            }
            (AsnType::BitString(size), Value::BitString(bits)) => per::encode_bit_string(sink, bits, size),
            (AsnType::OctetString { size, .. }, Value::OctetString(bytes)) => {
                per::encode_octet_string(sink, bytes, size)
            }
            (AsnType::OctetString { size, .. }, Value::Open(open)) => {
                per::encode_octet_string(sink, &open.bytes, size)
            }
            (AsnType::Open, Value::Open(open)) => per::encode_open_type(sink, &open.bytes),
            (AsnType::Open, Value::OctetString(bytes)) => per::encode_open_type(sink, bytes),
            (AsnType::Sequence(spec), Value::Sequence(seq)) => self.encode_sequence(sink, spec, seq, ctx),
            (AsnType::Choice(spec), Value::Choice(choice)) => self.encode_choice(sink, spec, choice, ctx),
            (AsnType::SequenceOf { element, size, .. }, Value::List(items)) => {
                self.encode_sequence_of(sink, element, size, items, ctx)
            }
            (AsnType::Ref(name), _) => {
                let target = self.lookup(name)?;
                self.encode_type(sink, target, value, ctx)
            }
            (ty, _) => Err(CodecError::ValueMismatch {
                offset: sink.len(),
                expected: ty.kind_name(),
            }),
        }
    }

    pub fn encode_sequence(
        &self,
        sink: &mut BitSink,
        spec: &SequenceSpec,
        value: &SequenceValue,
        ctx: &mut EncodeContext,
    ) -> Result<(), CodecError> {
        if let Some((name, _)) = value
            .present()
            .find(|(name, _)| !spec.field_names().any(|known| known == *name))
        {
            return Err(CodecError::UnknownField {
                offset: sink.len(),
                name: name.to_string(),
            });
        }
        let additions: Vec<bool> = spec
            .extensions
            .iter()
            .map(|a| a.fields().iter().any(|f| value.is_present(&f.name)))
            .collect();
        let count = additions.iter().rposition(|&p| p).map_or(0, |last| last + 1);
        if spec.extensible {
            sink.put_bit(count > 0)?;
        }
        self.encode_fields(sink, &spec.root, value, ctx)?;
        if count == 0 {
            return Ok(());
        }
        per::encode_normally_small_length(sink, count)?;
        for &present in &additions[..count] {
            sink.put_bit(present)?;
        }
        for (addition, _) in spec.extensions.iter().zip(&additions[..count]).filter(|(_, p)| **p) {
            let mut inner = sink.child();
            match addition {
                ExtensionAddition::Field(f) => {
                    if let Some(v) = value.get(&f.name) {
                        ctx.in_field(&f.name, |ctx| self.encode_type(&mut inner, &f.ty, v, ctx))?;
                    }
                }
                ExtensionAddition::Group(fields) => self.encode_fields(&mut inner, fields, value, ctx)?,
            }
            per::encode_open_type(sink, &inner.into_open_octets())?;
        }
        Ok(())
    }

    fn encode_fields(
        &self,
        sink: &mut BitSink,
        fields: &[FieldSpec],
        value: &SequenceValue,
        ctx: &mut EncodeContext,
    ) -> Result<(), CodecError> {
        if let Some(missing) = fields
            .iter()
            .find(|f| !f.is_optional() && !value.is_present(&f.name))
        {
            return Err(CodecError::MissingField {
                offset: sink.len(),
                name: missing.name.clone(),
            });
        }
        for f in fields.iter().filter(|f| f.is_optional()) {
            sink.put_bit(value.is_present(&f.name))?;
        }
        for f in fields {
            if let Some(v) = value.get(&f.name) {
                log::trace!("encode {}.{} at bit {}", ctx.path.join("."), f.name, sink.len());
                ctx.in_field(&f.name, |ctx| self.encode_type(sink, &f.ty, v, ctx))?;
            }
        }
        Ok(())
    }

    pub fn encode_choice(
        &self,
        sink: &mut BitSink,
        spec: &ChoiceSpec,
        value: &ChoiceValue,
        ctx: &mut EncodeContext,
    ) -> Result<(), CodecError> {
        let index = match &value.name {
            Some(name) => {
                let index = spec.index_of(name).ok_or_else(|| CodecError::UnknownField {
                    offset: sink.len(),
                    name: name.clone(),
                })?;
                if index != value.index {
                    return Err(CodecError::ValueMismatch {
                        offset: sink.len(),
                        expected: "choice index of the named alternative",
                    });
                }
                index
            }
            None => value.index,
        };
        let root = spec.root.len();
        if let Some(alt) = spec.root.get(index) {
            if spec.extensible {
                sink.put_bit(false)?;
            }
            per::encode_constrained_integer(sink, index as i64, 0, root as i64 - 1)?;
            return ctx.in_field(&alt.name, |ctx| self.encode_type(sink, &alt.ty, &value.value, ctx));
        }
        if !spec.extensible {
            return Err(CodecError::InvalidChoiceIndex {
                offset: sink.len(),
                index: index as u64,
                alternatives: root,
            });
        }
        sink.put_bit(true)?;
        per::encode_normally_small(sink, (index - root) as u64)?;
        let content = match (spec.extensions.get(index - root), &value.value) {
            (Some(alt), v) => {
                let mut inner = sink.child();
                ctx.in_field(&alt.name, |ctx| self.encode_type(&mut inner, &alt.ty, v, ctx))?;
                inner.into_open_octets()
            }
            (None, Value::Open(open)) => open.bytes.to_vec(),
            (None, _) => {
                return Err(CodecError::ValueMismatch {
                    offset: sink.len(),
                    expected: "open type for an unknown extension alternative",
                })
            }
        };
        per::encode_open_type(sink, &content)
    }

    pub fn encode_sequence_of(
        &self,
        sink: &mut BitSink,
        element: &AsnType,
        size: &SizeRange,
        items: &[Value],
        ctx: &mut EncodeContext,
    ) -> Result<(), CodecError> {
        per::encode_sized(sink, size, items.len(), false, |s, range| {
            for (i, item) in items[range.clone()].iter().enumerate() {
                let label = format!("[{}]", range.start + i);
                ctx.in_field(&label, |ctx| self.encode_type(s, element, item, ctx))?;
            }
            Ok(())
        })
    }
}
