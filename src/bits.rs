//! Bit-addressable cursor (decode) and sink (encode), most-significant bit first.
//!
//! PER packs fields without regard to octet boundaries, so everything in the codec reads and
//! writes through these two types. The cursor is the only mutable state of a decode call.

use crate::config::{CodecConfig, ConstraintPolicy};
use crate::error::CodecError;
use bitvec::prelude::*;

/// A bound violation tolerated under [`ConstraintPolicy::Permissive`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeViolation {
    pub offset: usize,
    pub value: i64,
    pub lower: Option<i64>,
    pub upper: Option<i64>,
}

/// Read side: a borrowed buffer plus the current bit position.
#[derive(Debug)]
pub struct BitCursor<'a> {
    raw: &'a [u8],
    bits: &'a BitSlice<u8, Msb0>,
    pos: usize,
    origin: usize,
    policy: ConstraintPolicy,
    align_open_content: bool,
    violations: Vec<RangeViolation>,
}

impl<'a> BitCursor<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self::with_config(bytes, &CodecConfig::default())
    }

    pub fn with_config(bytes: &'a [u8], config: &CodecConfig) -> Self {
        BitCursor {
            raw: bytes,
            bits: BitSlice::from_slice(bytes),
            pos: 0,
            origin: 0,
            policy: config.constraint_policy,
            align_open_content: config.align_open_content,
            violations: Vec::new(),
        }
    }

    /// Cursor over the content of an open type found at absolute bit `origin` of the outer
    /// buffer. Inherits the policy of `self`; offsets it reports are absolute.
    pub fn nested<'b>(&self, bytes: &'b [u8], origin: usize) -> BitCursor<'b> {
        BitCursor {
            raw: bytes,
            bits: BitSlice::from_slice(bytes),
            pos: 0,
            origin,
            policy: self.policy,
            align_open_content: self.align_open_content,
            violations: Vec::new(),
        }
    }

    /// Bits consumed from this cursor's own buffer.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Absolute bit offset, used in errors.
    pub fn offset(&self) -> usize {
        self.origin + self.pos
    }

    pub fn bits_remaining(&self) -> usize {
        self.bits.len() - self.pos
    }

    pub fn is_aligned(&self) -> bool {
        self.pos % 8 == 0
    }

    pub fn policy(&self) -> ConstraintPolicy {
        self.policy
    }

    pub fn align_open_content(&self) -> bool {
        self.align_open_content
    }

    fn ensure(&self, n: usize) -> Result<(), CodecError> {
        if n > self.bits_remaining() {
            return Err(CodecError::OutOfBounds {
                offset: self.offset(),
                needed: n,
                available: self.bits_remaining(),
            });
        }
        Ok(())
    }

    /// Up to 64 bits as an unsigned value, without advancing.
    pub fn peek_bits(&self, n: usize) -> Result<u64, CodecError> {
        debug_assert!(n <= 64);
        self.ensure(n)?;
        let mut value = 0u64;
        for bit in self.bits[self.pos..self.pos + n].iter().by_vals() {
            value = (value << 1) | bit as u64;
        }
        Ok(value)
    }

    pub fn take_bits(&mut self, n: usize) -> Result<u64, CodecError> {
        let value = self.peek_bits(n)?;
        self.pos += n;
        Ok(value)
    }

    pub fn take_bit(&mut self) -> Result<bool, CodecError> {
        self.ensure(1)?;
        let bit = self.bits[self.pos];
        self.pos += 1;
        Ok(bit)
    }

    pub fn take_bitvec(&mut self, n: usize) -> Result<BitVec<u8, Msb0>, CodecError> {
        self.ensure(n)?;
        let out = self.bits[self.pos..self.pos + n].to_bitvec();
        self.pos += n;
        Ok(out)
    }

    pub fn take_octets(&mut self, n: usize) -> Result<Vec<u8>, CodecError> {
        self.ensure(n.saturating_mul(8))?;
        if self.is_aligned() {
            let start = self.pos / 8;
            self.pos += n * 8;
            return Ok(self.raw[start..start + n].to_vec());
        }
        let mut out = Vec::with_capacity(n);
        for _ in 0..n {
            out.push(self.take_bits(8)? as u8);
        }
        Ok(out)
    }

    pub fn skip_bits(&mut self, n: usize) -> Result<(), CodecError> {
        self.ensure(n)?;
        self.pos += n;
        Ok(())
    }

    /// Advance to the next octet boundary. Only the open-content exception calls this.
    pub fn align_to_byte(&mut self) -> Result<(), CodecError> {
        let pad = (8 - self.pos % 8) % 8;
        self.skip_bits(pad)
    }

    /// Check `value` against `[lower, upper]`. Under the permissive policy an out-of-range value
    /// that still fits in an `i64` is recorded and accepted.
    pub fn check_range(
        &mut self,
        offset: usize,
        value: i128,
        lower: Option<i64>,
        upper: Option<i64>,
    ) -> Result<i64, CodecError> {
        let below = lower.is_some_and(|lo| value < lo as i128);
        let above = upper.is_some_and(|hi| value > hi as i128);
        let fits = i64::try_from(value).ok();
        match (below || above, fits) {
            (false, Some(v)) => Ok(v),
            (true, Some(v)) if self.policy == ConstraintPolicy::Permissive => {
                log::debug!("tolerating {} outside bound at bit {}", v, offset);
                self.violations.push(RangeViolation {
                    offset,
                    value: v,
                    lower,
                    upper,
                });
                Ok(v)
            }
            _ => Err(CodecError::ConstraintViolation {
                offset,
                value,
                lower,
                upper,
            }),
        }
    }

    pub fn take_violations(&mut self) -> Vec<RangeViolation> {
        std::mem::take(&mut self.violations)
    }
}

/// Write side: a growable bit vector, optionally capped.
#[derive(Debug, Clone)]
pub struct BitSink {
    bits: BitVec<u8, Msb0>,
    limit: Option<usize>,
    align_open_content: bool,
}

impl Default for BitSink {
    fn default() -> Self {
        Self::new()
    }
}

impl BitSink {
    pub fn new() -> Self {
        Self::with_config(&CodecConfig::default())
    }

    pub fn with_config(config: &CodecConfig) -> Self {
        BitSink {
            bits: BitVec::new(),
            limit: config.max_encoded_octets.map(|n| n.saturating_mul(8)),
            align_open_content: config.align_open_content,
        }
    }

    /// A sink refusing to grow past `max_bits`.
    pub fn bounded(max_bits: usize) -> Self {
        BitSink {
            limit: Some(max_bits),
            ..Self::new()
        }
    }

    /// An empty sink with the same settings, for open-type content.
    pub fn child(&self) -> Self {
        BitSink {
            bits: BitVec::new(),
            limit: self.limit,
            align_open_content: self.align_open_content,
        }
    }

    pub fn len(&self) -> usize {
        self.bits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bits.is_empty()
    }

    pub fn align_open_content(&self) -> bool {
        self.align_open_content
    }

    pub fn as_bitslice(&self) -> &BitSlice<u8, Msb0> {
        &self.bits
    }

    fn reserve(&self, n: usize) -> Result<(), CodecError> {
        if let Some(limit) = self.limit {
            if self.bits.len() + n > limit {
                return Err(CodecError::OutOfBounds {
                    offset: self.bits.len(),
                    needed: n,
                    available: limit.saturating_sub(self.bits.len()),
                });
            }
        }
        Ok(())
    }

    pub fn put_bit(&mut self, bit: bool) -> Result<(), CodecError> {
        self.reserve(1)?;
        self.bits.push(bit);
        Ok(())
    }

    /// The low `n` bits of `value`, most significant first.
    pub fn put_bits(&mut self, value: u64, n: usize) -> Result<(), CodecError> {
        debug_assert!(n <= 64);
        self.reserve(n)?;
        for i in (0..n).rev() {
            self.bits.push((value >> i) & 1 == 1);
        }
        Ok(())
    }

    pub fn put_bitslice(&mut self, bits: &BitSlice<u8, Msb0>) -> Result<(), CodecError> {
        self.reserve(bits.len())?;
        self.bits.extend_from_bitslice(bits);
        Ok(())
    }

    pub fn put_octets(&mut self, octets: &[u8]) -> Result<(), CodecError> {
        self.reserve(octets.len().saturating_mul(8))?;
        self.bits.extend_from_bitslice(octets.view_bits::<Msb0>());
        Ok(())
    }

    pub fn align_to_byte(&mut self) -> Result<(), CodecError> {
        let pad = (8 - self.bits.len() % 8) % 8;
        self.reserve(pad)?;
        for _ in 0..pad {
            self.bits.push(false);
        }
        Ok(())
    }

    /// The encoding zero-padded to whole octets.
    pub fn into_bytes(mut self) -> Vec<u8> {
        let padded = (self.bits.len() + 7) / 8 * 8;
        self.bits.resize(padded, false);
        self.bits.into_vec()
    }

    /// As [`into_bytes`](Self::into_bytes), but an empty encoding becomes a single zero octet
    /// (content of an open type or of a complete top-level encoding is never empty).
    pub fn into_open_octets(self) -> Vec<u8> {
        if self.bits.is_empty() {
            return vec![0];
        }
        self.into_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_take_bits_msb_first() {
        let data = [0b1010_1100, 0xFF];
        let mut cur = BitCursor::new(&data);
        assert_eq!(cur.take_bits(3).unwrap(), 0b101);
        assert_eq!(cur.take_bits(5).unwrap(), 0b01100);
        assert!(cur.is_aligned());
        assert_eq!(cur.peek_bits(4).unwrap(), 0xF);
        assert_eq!(cur.position(), 8);
        assert_eq!(cur.bits_remaining(), 8);
    }

    #[test]
    fn test_take_past_end_does_not_advance() {
        let data = [0xAB];
        let mut cur = BitCursor::new(&data);
        cur.take_bits(4).unwrap();
        let err = cur.take_bits(5).unwrap_err();
        assert_eq!(
            err,
            CodecError::OutOfBounds {
                offset: 4,
                needed: 5,
                available: 4
            }
        );
        assert_eq!(cur.position(), 4);
    }

    #[test]
    fn test_take_octets_unaligned() {
        let data = [0b0110_0000, 0b0110_0000];
        let mut cur = BitCursor::new(&data);
        assert!(!cur.take_bit().unwrap());
        assert_eq!(cur.take_octets(1).unwrap(), vec![0b1100_0000]);
        assert_eq!(cur.position(), 9);
    }

    #[test]
    fn test_align_to_byte() {
        let data = [0u8; 2];
        let mut cur = BitCursor::new(&data);
        cur.take_bits(3).unwrap();
        cur.align_to_byte().unwrap();
        assert_eq!(cur.position(), 8);
        cur.align_to_byte().unwrap();
        assert_eq!(cur.position(), 8);
    }

    #[test]
    fn test_sink_put_and_pad() {
        let mut sink = BitSink::new();
        sink.put_bits(0b101, 3).unwrap();
        sink.put_bit(true).unwrap();
        assert_eq!(sink.len(), 4);
        assert_eq!(sink.into_bytes(), vec![0b1011_0000]);
    }

    #[test]
    fn test_sink_octets_after_bits() {
        let mut sink = BitSink::new();
        sink.put_bit(true).unwrap();
        sink.put_octets(&[0xFF]).unwrap();
        assert_eq!(sink.into_bytes(), vec![0xFF, 0x80]);
    }

    #[test]
    fn test_bounded_sink_rejects_overflow() {
        let mut sink = BitSink::bounded(8);
        sink.put_bits(0, 6).unwrap();
        let err = sink.put_bits(0, 3).unwrap_err();
        assert!(matches!(err, CodecError::OutOfBounds { offset: 6, needed: 3, available: 2 }));
    }

    #[test]
    fn test_empty_open_octets() {
        assert_eq!(BitSink::new().into_open_octets(), vec![0]);
        assert!(BitSink::new().into_bytes().is_empty());
    }

    #[test]
    fn test_check_range_policies() {
        let mut strict = BitCursor::new(&[]);
        assert!(strict.check_range(0, 9, Some(0), Some(7)).is_err());
        let config = CodecConfig::permissive();
        let mut permissive = BitCursor::with_config(&[], &config);
        assert_eq!(permissive.check_range(3, 9, Some(0), Some(7)).unwrap(), 9);
        let v = permissive.take_violations();
        assert_eq!(v.len(), 1);
        assert_eq!(v[0].offset, 3);
        assert!(permissive.check_range(0, i128::MAX, Some(0), None).is_err());
    }
}
