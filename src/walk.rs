//! Structure-only walk over a PER encoding.
//!
//! The walker follows the same schema rules as the [codec](crate::codec) (presence bitmaps,
//! size and length determinants, extension additions, choice indices) but never builds a
//! [`Value`](crate::value::Value) tree: string content is skipped, unknown extensions are skipped,
//! and only integers, enumerations, sizes and choice indices are read to check them.
//!
//! ## When to use walk vs codec
//!
//! | Use case | Prefer |
//! |----------|--------|
//! | Octets one PDU occupies | [`message_extent`] |
//! | Check a buffer holds exactly one well-formed PDU | [`validate_message`] |
//! | Inspect or re-encode values | [codec](crate::codec) |
//!
//! Known extension additions and alternatives are walked inside their open-type wrapper, so a
//! malformed addition fails validation even though the wrapper's length would allow skipping it.
//!
//! ## Example
//!
//! ```
//! use uperdsl::{walk, Codec, CodecConfig, ResolvedSchema};
//!
//! let schema = ResolvedSchema::from_source("Msg ::= SEQUENCE { a INTEGER (0..7), b BOOLEAN }").unwrap();
//! let codec = Codec::new(schema, CodecConfig::default());
//! // a = 5 (101), b = TRUE (1), padded to one octet.
//! assert_eq!(walk::message_extent(&codec, "Msg", &[0b1011_0000, 0xFF]).unwrap(), 1);
//! ```

use crate::ast::*;
use crate::bits::BitCursor;
use crate::codec::{complete_octets, Codec};
use crate::error::CodecError;
use crate::per;

/// Number of octets the PDU of `type_name` at the start of `bytes` occupies.
pub fn message_extent(codec: &Codec, type_name: &str, bytes: &[u8]) -> Result<usize, CodecError> {
    let ty = codec.lookup(type_name)?;
    let mut cur = codec.cursor(bytes);
    let mut walker = Walker::new(codec);
    walker.walk_type(&mut cur, ty)?;
    complete_octets(cur.position(), bytes)
}

/// Check that `bytes` is exactly one well-formed PDU of `type_name`: every bound holds (under the
/// codec's constraint policy) and no octet follows the encoding.
pub fn validate_message(codec: &Codec, type_name: &str, bytes: &[u8]) -> Result<(), CodecError> {
    let extent = message_extent(codec, type_name, bytes)?;
    if bytes.len() > extent {
        return Err(CodecError::malformed(
            extent * 8,
            format!("{} trailing octets after {} octet PDU", bytes.len() - extent, extent),
        ));
    }
    Ok(())
}

/// Schema-guided skipper over a [`BitCursor`].
pub struct Walker<'c> {
    codec: &'c Codec,
    depth: usize,
    items: usize,
}

impl<'c> Walker<'c> {
    pub fn new(codec: &'c Codec) -> Self {
        Walker {
            codec,
            depth: 0,
            items: 0,
        }
    }

    pub fn walk_type(&mut self, cur: &mut BitCursor, ty: &AsnType) -> Result<(), CodecError> {
        let limit = self.codec.config.max_depth;
        if self.depth >= limit {
            return Err(CodecError::DepthExceeded {
                offset: cur.offset(),
                limit,
            });
        }
        self.depth += 1;
        let result = self.walk_inner(cur, ty);
        self.depth -= 1;
        result
    }

    fn walk_inner(&mut self, cur: &mut BitCursor, ty: &AsnType) -> Result<(), CodecError> {
        match ty {
            AsnType::Null => Ok(()),
            AsnType::Boolean => cur.skip_bits(1),
            AsnType::Integer(range) => per::decode_integer(cur, range).map(drop),
            AsnType::Enumerated(spec) => {
                per::decode_enumerated(cur, spec.root.len(), spec.extensible).map(drop)
            }
            AsnType::BitString(size) => per::decode_sized(cur, size, 1, false, |c, n| c.skip_bits(n)).map(drop),
            AsnType::OctetString { size, .. } => {
                per::decode_sized(cur, size, 8, true, |c, n| c.skip_bits(n * 8)).map(drop)
            }
            AsnType::Open => per::skip_open_type(cur).map(drop),
            AsnType::Sequence(spec) => self.walk_sequence(cur, spec),
            AsnType::Choice(spec) => self.walk_choice(cur, spec),
            AsnType::SequenceOf { element, size, .. } => per::decode_sized(cur, size, 0, false, |c, n| {
                let limit = self.codec.config.max_decoded_items;
                self.items = self.items.saturating_add(n);
                if self.items > limit {
                    return Err(CodecError::malformed(
                        c.offset(),
                        format!("{} list elements exceed the limit of {}", self.items, limit),
                    ));
                }
                for _ in 0..n {
                    self.walk_type(c, element)?;
                }
                Ok(())
            })
            .map(drop),
            AsnType::Ref(name) => {
                let target = self.codec.lookup(name)?;
                self.walk_type(cur, target)
            }
        }
    }

    fn walk_fields(&mut self, cur: &mut BitCursor, fields: &[FieldSpec]) -> Result<(), CodecError> {
        let optional = fields.iter().filter(|f| f.is_optional()).count();
        let bitmap = cur.take_bitvec(optional)?;
        let mut presence = bitmap.iter().by_vals();
        for f in fields {
            if !f.is_optional() || presence.next().unwrap_or(false) {
                self.walk_type(cur, &f.ty)?;
            }
        }
        Ok(())
    }

    fn walk_sequence(&mut self, cur: &mut BitCursor, spec: &SequenceSpec) -> Result<(), CodecError> {
        let extended = spec.extensible && cur.take_bit()?;
        self.walk_fields(cur, &spec.root)?;
        if !extended {
            return Ok(());
        }
        let count = per::decode_normally_small_length(cur)?;
        let presence = cur.take_bitvec(count)?;
        for (i, present) in presence.iter().by_vals().enumerate() {
            if !present {
                continue;
            }
            match spec.extensions.get(i) {
                Some(addition) => {
                    let (origin, bytes) = per::decode_open_type_at(cur)?;
                    let mut inner = cur.nested(&bytes, origin);
                    match addition {
                        ExtensionAddition::Field(f) => self.walk_type(&mut inner, &f.ty)?,
                        ExtensionAddition::Group(fields) => self.walk_fields(&mut inner, fields)?,
                    }
                }
                None => {
                    per::skip_open_type(cur)?;
                }
            }
        }
        Ok(())
    }

    fn walk_choice(&mut self, cur: &mut BitCursor, spec: &ChoiceSpec) -> Result<(), CodecError> {
        let root = spec.root.len();
        if spec.extensible && cur.take_bit()? {
            let ext = per::decode_normally_small(cur)?;
            let known = usize::try_from(ext).ok().and_then(|i| spec.extensions.get(i));
            let Some(alt) = known else {
                return per::skip_open_type(cur).map(drop);
            };
            let (origin, bytes) = per::decode_open_type_at(cur)?;
            let mut inner = cur.nested(&bytes, origin);
            return self.walk_type(&mut inner, &alt.ty);
        }
        let at = cur.offset();
        let raw = per::decode_constrained_raw(cur, 0, root as i64 - 1)?;
        let alt = usize::try_from(raw)
            .ok()
            .and_then(|i| spec.root.get(i))
            .ok_or(CodecError::InvalidChoiceIndex {
                offset: at,
                index: raw as u64,
                alternatives: root,
            })?;
        self.walk_type(cur, &alt.ty)
    }
}
