//! Unaligned PER primitives (ITU-T X.691): integers, booleans, enumerations, strings and open
//! types over a [`BitCursor`] / [`BitSink`].
//!
//! Every decode function leaves the cursor exactly one bit past what it consumed, or fails
//! without hiding the failure. Range checks on decoded values go through
//! [`BitCursor::check_range`], which applies the caller's constraint policy.

use crate::ast::{IntRange, SizeRange};
use crate::bits::{BitCursor, BitSink};
use crate::error::CodecError;
use crate::length;
use bitvec::prelude::*;
use byteorder::{BigEndian, ByteOrder};
use bytes::Bytes;
use std::ops::Range;

/// Largest value of a normally small number sent in the 6-bit form.
const NORMALLY_SMALL_MAX: u64 = 63;

/// Number of bits for a constrained whole number taking `range` distinct values.
pub fn bits_for_range(range: u128) -> usize {
    if range <= 1 {
        0
    } else {
        (128 - (range - 1).leading_zeros()) as usize
    }
}

fn constrained_width(lo: i64, hi: i64) -> usize {
    bits_for_range((hi as i128 - lo as i128 + 1) as u128)
}

fn unsigned_octets(v: u64) -> usize {
    ((64 - v.leading_zeros() as usize + 7) / 8).max(1)
}

fn signed_octets(v: i64) -> usize {
    let magnitude_bits = if v >= 0 {
        64 - v.leading_zeros() as usize
    } else {
        64 - v.leading_ones() as usize
    };
    (magnitude_bits + 1 + 7) / 8
}

fn violation(offset: usize, value: i128, lower: Option<i64>, upper: Option<i64>) -> CodecError {
    CodecError::ConstraintViolation {
        offset,
        value,
        lower,
        upper,
    }
}

fn take_integer_octets(cur: &mut BitCursor, at: usize) -> Result<(Vec<u8>, usize), CodecError> {
    let n = length::decode_length_determinant(cur)?;
    if n == 0 || n > 8 {
        return Err(CodecError::malformed(
            at,
            format!("integer of {} octets (supported 1..=8)", n),
        ));
    }
    Ok((cur.take_octets(n)?, n))
}

// ---------------------------------------------------------------------------
// Integers
// ---------------------------------------------------------------------------

/// `lo + raw` for a constrained whole number, unchecked against `hi`.
pub(crate) fn decode_constrained_raw(cur: &mut BitCursor, lo: i64, hi: i64) -> Result<i128, CodecError> {
    if lo > hi {
        return Err(violation(cur.offset(), lo as i128, Some(lo), Some(hi)));
    }
    let raw = cur.take_bits(constrained_width(lo, hi))?;
    Ok(lo as i128 + raw as i128)
}

/// Integer in `[lo, hi]`, sent as `value - lo` in the minimum number of bits (zero bits when
/// the range holds a single value).
pub fn decode_constrained_integer(cur: &mut BitCursor, lo: i64, hi: i64) -> Result<i64, CodecError> {
    let at = cur.offset();
    let value = decode_constrained_raw(cur, lo, hi)?;
    cur.check_range(at, value, Some(lo), Some(hi))
}

pub fn encode_constrained_integer(sink: &mut BitSink, value: i64, lo: i64, hi: i64) -> Result<(), CodecError> {
    if value < lo || value > hi {
        return Err(violation(sink.len(), value as i128, Some(lo), Some(hi)));
    }
    let offset = (value as i128 - lo as i128) as u64;
    sink.put_bits(offset, constrained_width(lo, hi))
}

/// Integer `>= lo`: length determinant, then `value - lo` in the minimum number of octets.
pub fn decode_semi_constrained_integer(cur: &mut BitCursor, lo: i64) -> Result<i64, CodecError> {
    let at = cur.offset();
    let (octets, n) = take_integer_octets(cur, at)?;
    let offset = BigEndian::read_uint(&octets, n);
    cur.check_range(at, lo as i128 + offset as i128, Some(lo), None)
}

pub fn encode_semi_constrained_integer(sink: &mut BitSink, value: i64, lo: i64) -> Result<(), CodecError> {
    if value < lo {
        return Err(violation(sink.len(), value as i128, Some(lo), None));
    }
    let offset = (value as i128 - lo as i128) as u64;
    let n = unsigned_octets(offset);
    length::encode_length_determinant(sink, n)?;
    let mut buf = [0u8; 8];
    BigEndian::write_uint(&mut buf[..n], offset, n);
    sink.put_octets(&buf[..n])
}

/// Integer without lower bound: length determinant, then two's complement in the minimum
/// number of octets.
pub fn decode_unconstrained_integer(cur: &mut BitCursor) -> Result<i64, CodecError> {
    let at = cur.offset();
    let (octets, n) = take_integer_octets(cur, at)?;
    Ok(BigEndian::read_int(&octets, n))
}

pub fn encode_unconstrained_integer(sink: &mut BitSink, value: i64) -> Result<(), CodecError> {
    let n = signed_octets(value);
    length::encode_length_determinant(sink, n)?;
    let mut buf = [0u8; 8];
    BigEndian::write_int(&mut buf[..n], value, n);
    sink.put_octets(&buf[..n])
}

/// Integer of any constraint shape. An extensible constraint prepends one bit; a value outside
/// the root is then sent unconstrained.
pub fn decode_integer(cur: &mut BitCursor, range: &IntRange) -> Result<i64, CodecError> {
    if range.extensible && cur.take_bit()? {
        return decode_unconstrained_integer(cur);
    }
    match (range.lower, range.upper) {
        (Some(lo), Some(hi)) => decode_constrained_integer(cur, lo, hi),
        (Some(lo), None) => decode_semi_constrained_integer(cur, lo),
        (None, upper) => {
            let at = cur.offset();
            let value = decode_unconstrained_integer(cur)?;
            cur.check_range(at, value as i128, None, upper)
        }
    }
}

pub fn encode_integer(sink: &mut BitSink, value: i64, range: &IntRange) -> Result<(), CodecError> {
    if range.extensible {
        let in_root = range.contains(value);
        sink.put_bit(!in_root)?;
        if !in_root {
            return encode_unconstrained_integer(sink, value);
        }
    }
    match (range.lower, range.upper) {
        (Some(lo), Some(hi)) => encode_constrained_integer(sink, value, lo, hi),
        (Some(lo), None) => encode_semi_constrained_integer(sink, value, lo),
        (None, upper) => {
            if upper.is_some_and(|hi| value > hi) {
                return Err(violation(sink.len(), value as i128, None, upper));
            }
            encode_unconstrained_integer(sink, value)
        }
    }
}

/// Normally small non-negative whole number (X.691 11.6): `0` + 6 bits up to 63, otherwise
/// `1` + semi-constrained number.
pub fn decode_normally_small(cur: &mut BitCursor) -> Result<u64, CodecError> {
    if !cur.take_bit()? {
        return cur.take_bits(6);
    }
    decode_semi_constrained_integer(cur, 0).map(|v| v as u64)
}

pub fn encode_normally_small(sink: &mut BitSink, value: u64) -> Result<(), CodecError> {
    if value <= NORMALLY_SMALL_MAX {
        sink.put_bit(false)?;
        return sink.put_bits(value, 6);
    }
    let value = i64::try_from(value).map_err(|_| violation(sink.len(), value as i128, Some(0), Some(i64::MAX)))?;
    sink.put_bit(true)?;
    encode_semi_constrained_integer(sink, value, 0)
}

/// Normally small length (X.691 11.9.3.4), used for the extension-addition bitmap: `0` + 6 bits
/// holding `n - 1` up to 64, otherwise `1` + length determinant.
pub fn decode_normally_small_length(cur: &mut BitCursor) -> Result<usize, CodecError> {
    if !cur.take_bit()? {
        return Ok(cur.take_bits(6)? as usize + 1);
    }
    let at = cur.offset();
    let n = length::decode_length_determinant(cur)?;
    if n == 0 {
        return Err(CodecError::malformed(at, "empty extension bitmap"));
    }
    Ok(n)
}

pub fn encode_normally_small_length(sink: &mut BitSink, n: usize) -> Result<(), CodecError> {
    match n {
        0 => Err(CodecError::malformed(sink.len(), "empty extension bitmap")),
        1..=64 => {
            sink.put_bit(false)?;
            sink.put_bits(n as u64 - 1, 6)
        }
        _ => {
            sink.put_bit(true)?;
            length::encode_length_determinant(sink, n)
        }
    }
}

// ---------------------------------------------------------------------------
// BOOLEAN, NULL, ENUMERATED
// ---------------------------------------------------------------------------

pub fn decode_boolean(cur: &mut BitCursor) -> Result<bool, CodecError> {
    cur.take_bit()
}

pub fn encode_boolean(sink: &mut BitSink, value: bool) -> Result<(), CodecError> {
    sink.put_bit(value)
}

pub fn decode_null(_cur: &mut BitCursor) -> Result<(), CodecError> {
    Ok(())
}

pub fn encode_null(_sink: &mut BitSink) -> Result<(), CodecError> {
    Ok(())
}

/// Enumerated index. Root items are a constrained number over `0..root_count`; with
/// `extensible`, a leading `1` bit introduces an extension item as a normally small number,
/// returned as `root_count + i`.
pub fn decode_enumerated(cur: &mut BitCursor, root_count: usize, extensible: bool) -> Result<u64, CodecError> {
    if extensible && cur.take_bit()? {
        let at = cur.offset();
        let i = decode_normally_small(cur)?;
        return (root_count as u64)
            .checked_add(i)
            .ok_or_else(|| violation(at, i as i128, Some(0), None));
    }
    let at = cur.offset();
    let hi = root_count as i64 - 1;
    let index = decode_constrained_raw(cur, 0, hi)?;
    if index > hi as i128 {
        return Err(violation(at, index, Some(0), Some(hi)));
    }
    Ok(index as u64)
}

pub fn encode_enumerated(sink: &mut BitSink, index: u64, root_count: usize, extensible: bool) -> Result<(), CodecError> {
    let root_count = root_count as u64;
    if index < root_count {
        if extensible {
            sink.put_bit(false)?;
        }
        return encode_constrained_integer(sink, index as i64, 0, root_count as i64 - 1);
    }
    if !extensible {
        return Err(violation(sink.len(), index as i128, Some(0), Some(root_count as i64 - 1)));
    }
    sink.put_bit(true)?;
    encode_normally_small(sink, index - root_count)
}

// ---------------------------------------------------------------------------
// Sizes, BIT STRING, OCTET STRING, open types
// ---------------------------------------------------------------------------

/// Read a size per `size` and hand the content to `take`. Fixed sizes below 64K carry no
/// length; bounded sizes below 64K use a constrained number over `[min, max]`; anything else
/// (or an extended size) uses the general length determinant. `align` marks open content.
pub(crate) fn decode_sized<F>(
    cur: &mut BitCursor,
    size: &SizeRange,
    unit_bits: usize,
    align: bool,
    mut take: F,
) -> Result<usize, CodecError>
where
    F: FnMut(&mut BitCursor, usize) -> Result<(), CodecError>,
{
    let extended = size.extensible && cur.take_bit()?;
    if !extended {
        if let Some(ub) = size.effective_upper() {
            let n = if size.min == ub {
                ub
            } else {
                let at = cur.offset();
                let raw = decode_constrained_raw(cur, size.min as i64, ub as i64)?;
                cur.check_range(at, raw, Some(size.min as i64), Some(ub as i64))? as usize
            };
            take(cur, n)?;
            return Ok(n);
        }
    }
    let at = cur.offset();
    let n = length::decode_fragmented(cur, unit_bits, align, take)?;
    if !extended {
        cur.check_range(at, n as i128, Some(size.min as i64), size.max.map(|m| m as i64))?;
    }
    Ok(n)
}

pub(crate) fn encode_sized<F>(
    sink: &mut BitSink,
    size: &SizeRange,
    count: usize,
    align: bool,
    mut emit: F,
) -> Result<(), CodecError>
where
    F: FnMut(&mut BitSink, Range<usize>) -> Result<(), CodecError>,
{
    let in_root = size.contains(count);
    if size.extensible {
        sink.put_bit(!in_root)?;
    } else if !in_root {
        return Err(violation(
            sink.len(),
            count as i128,
            Some(size.min as i64),
            size.max.map(|m| m as i64),
        ));
    }
    if in_root {
        if let Some(ub) = size.effective_upper() {
            if size.min != ub {
                encode_constrained_integer(sink, count as i64, size.min as i64, ub as i64)?;
            }
            return emit(sink, 0..count);
        }
    }
    length::encode_fragmented(sink, count, align, emit)
}

pub fn decode_bit_string(cur: &mut BitCursor, size: &SizeRange) -> Result<BitVec<u8, Msb0>, CodecError> {
    let mut out = BitVec::new();
    decode_sized(cur, size, 1, false, |c, n| {
        out.extend_from_bitslice(&c.take_bitvec(n)?);
        Ok(())
    })?;
    Ok(out)
}

pub fn encode_bit_string(sink: &mut BitSink, bits: &BitSlice<u8, Msb0>, size: &SizeRange) -> Result<(), CodecError> {
    encode_sized(sink, size, bits.len(), false, |s, r| s.put_bitslice(&bits[r]))
}

/// Octet string; content sent behind a general length determinant is octet-aligned when the
/// open-content exception is enabled.
pub fn decode_octet_string(cur: &mut BitCursor, size: &SizeRange) -> Result<Bytes, CodecError> {
    let mut out = Vec::new();
    decode_sized(cur, size, 8, true, |c, n| {
        out.extend(c.take_octets(n)?);
        Ok(())
    })?;
    Ok(Bytes::from(out))
}

pub fn encode_octet_string(sink: &mut BitSink, octets: &[u8], size: &SizeRange) -> Result<(), CodecError> {
    encode_sized(sink, size, octets.len(), true, |s, r| s.put_octets(&octets[r]))
}

/// Open type content: the complete encoding of some value, as an unbounded octet string.
pub fn decode_open_type(cur: &mut BitCursor) -> Result<Bytes, CodecError> {
    decode_open_type_at(cur).map(|(_, bytes)| bytes)
}

/// As [`decode_open_type`], also returning the absolute bit offset where the content starts.
pub fn decode_open_type_at(cur: &mut BitCursor) -> Result<(usize, Bytes), CodecError> {
    let mut origin = None;
    let mut out = Vec::new();
    length::decode_fragmented(cur, 8, true, |c, n| {
        origin.get_or_insert(c.offset());
        out.extend(c.take_octets(n)?);
        Ok(())
    })?;
    Ok((origin.unwrap_or_else(|| cur.offset()), Bytes::from(out)))
}

/// Consume an open type without keeping it; returns the number of octets skipped.
pub fn skip_open_type(cur: &mut BitCursor) -> Result<usize, CodecError> {
    length::decode_fragmented(cur, 8, true, |c, n| c.skip_bits(n * 8))
}

pub fn encode_open_type(sink: &mut BitSink, octets: &[u8]) -> Result<(), CodecError> {
    length::encode_fragmented(sink, octets.len(), true, |s, r| s.put_octets(&octets[r]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CodecConfig;

    fn bits_of(sink: &BitSink) -> String {
        sink.as_bitslice().iter().by_vals().map(|b| if b { '1' } else { '0' }).collect()
    }

    #[test]
    fn test_bits_for_range() {
        assert_eq!(bits_for_range(1), 0);
        assert_eq!(bits_for_range(2), 1);
        assert_eq!(bits_for_range(3), 2);
        assert_eq!(bits_for_range(8), 3);
        assert_eq!(bits_for_range(9), 4);
        assert_eq!(bits_for_range(256), 8);
        assert_eq!(bits_for_range(1u128 << 64), 64);
    }

    #[test]
    fn test_constrained_five_in_zero_to_seven() {
        let mut sink = BitSink::new();
        encode_constrained_integer(&mut sink, 5, 0, 7).unwrap();
        assert_eq!(bits_of(&sink), "101");
        let bytes = sink.into_bytes();
        let mut cur = BitCursor::new(&bytes);
        assert_eq!(decode_constrained_integer(&mut cur, 0, 7).unwrap(), 5);
        assert_eq!(cur.position(), 3);
    }

    #[test]
    fn test_single_value_range_uses_no_bits() {
        let mut sink = BitSink::new();
        encode_constrained_integer(&mut sink, 5, 5, 5).unwrap();
        assert!(sink.is_empty());
        let mut cur = BitCursor::new(&[]);
        assert_eq!(decode_constrained_integer(&mut cur, 5, 5).unwrap(), 5);
        assert_eq!(cur.position(), 0);
    }

    #[test]
    fn test_constrained_extremes_and_full_i64_range() {
        for (v, lo, hi) in [
            (-10, -10, 20),
            (20, -10, 20),
            (i64::MIN, i64::MIN, i64::MAX),
            (i64::MAX, i64::MIN, i64::MAX),
        ] {
            let mut sink = BitSink::new();
            encode_constrained_integer(&mut sink, v, lo, hi).unwrap();
            let n = sink.len();
            let bytes = sink.into_bytes();
            let mut cur = BitCursor::new(&bytes);
            assert_eq!(decode_constrained_integer(&mut cur, lo, hi).unwrap(), v);
            assert_eq!(cur.position(), n);
        }
    }

    #[test]
    fn test_constrained_out_of_range_raw_is_reported() {
        // range 0..5 takes 3 bits; 0b111 decodes to 7.
        let data = [0b1110_0000];
        let mut cur = BitCursor::new(&data);
        let err = decode_constrained_integer(&mut cur, 0, 5).unwrap_err();
        assert!(matches!(err, CodecError::ConstraintViolation { value: 7, .. }));

        let config = CodecConfig::permissive();
        let mut cur = BitCursor::with_config(&data, &config);
        assert_eq!(decode_constrained_integer(&mut cur, 0, 5).unwrap(), 7);
        assert_eq!(cur.position(), 3);
        assert_eq!(cur.take_violations().len(), 1);
    }

    #[test]
    fn test_encode_out_of_range_fails() {
        let mut sink = BitSink::new();
        assert!(encode_constrained_integer(&mut sink, 8, 0, 7).is_err());
        assert!(encode_semi_constrained_integer(&mut sink, -1, 0).is_err());
        assert!(sink.is_empty());
    }

    #[test]
    fn test_semi_constrained_layout() {
        let mut sink = BitSink::new();
        encode_semi_constrained_integer(&mut sink, 300, 44).unwrap();
        // 256 fits in two octets.
        assert_eq!(sink.into_bytes(), vec![0x02, 0x01, 0x00]);
        for (v, lo) in [(0, 0), (-5, -5), (255, 0), (256, 0), (i64::MAX, 0), (i64::MAX, i64::MIN)] {
            let mut sink = BitSink::new();
            encode_semi_constrained_integer(&mut sink, v, lo).unwrap();
            let bytes = sink.into_bytes();
            let mut cur = BitCursor::new(&bytes);
            assert_eq!(decode_semi_constrained_integer(&mut cur, lo).unwrap(), v);
        }
    }

    #[test]
    fn test_unconstrained_twos_complement() {
        let cases: [(i64, &[u8]); 6] = [
            (0, &[0x01, 0x00]),
            (127, &[0x01, 0x7F]),
            (128, &[0x02, 0x00, 0x80]),
            (-1, &[0x01, 0xFF]),
            (-128, &[0x01, 0x80]),
            (-129, &[0x02, 0xFF, 0x7F]),
        ];
        for (v, wire) in cases {
            let mut sink = BitSink::new();
            encode_unconstrained_integer(&mut sink, v).unwrap();
            assert_eq!(sink.into_bytes(), wire.to_vec(), "value {}", v);
            let mut cur = BitCursor::new(wire);
            assert_eq!(decode_unconstrained_integer(&mut cur).unwrap(), v);
        }
        for v in [i64::MIN, i64::MAX] {
            let mut sink = BitSink::new();
            encode_unconstrained_integer(&mut sink, v).unwrap();
            let bytes = sink.into_bytes();
            assert_eq!(bytes.len(), 9);
            let mut cur = BitCursor::new(&bytes);
            assert_eq!(decode_unconstrained_integer(&mut cur).unwrap(), v);
        }
    }

    #[test]
    fn test_integer_of_zero_or_nine_octets_is_malformed() {
        let mut cur = BitCursor::new(&[0x00]);
        assert!(matches!(
            decode_unconstrained_integer(&mut cur),
            Err(CodecError::MalformedLength { .. })
        ));
        let data = [0x09, 0, 0, 0, 0, 0, 0, 0, 0, 1];
        let mut cur = BitCursor::new(&data);
        assert!(matches!(
            decode_semi_constrained_integer(&mut cur, 0),
            Err(CodecError::MalformedLength { .. })
        ));
    }

    #[test]
    fn test_extensible_integer() {
        let range = IntRange::constrained(0, 15).extensible();
        let mut sink = BitSink::new();
        encode_integer(&mut sink, 9, &range).unwrap();
        assert_eq!(bits_of(&sink), "01001");
        let mut sink = BitSink::new();
        encode_integer(&mut sink, 300, &range).unwrap();
        let bytes = sink.into_bytes();
        let mut cur = BitCursor::new(&bytes);
        assert_eq!(decode_integer(&mut cur, &range).unwrap(), 300);
    }

    #[test]
    fn test_normally_small_boundary() {
        let mut sink = BitSink::new();
        encode_normally_small(&mut sink, 63).unwrap();
        assert_eq!(bits_of(&sink), "0111111");
        for v in [0u64, 1, 63, 64, 1000] {
            let mut sink = BitSink::new();
            encode_normally_small(&mut sink, v).unwrap();
            let n = sink.len();
            let bytes = sink.into_bytes();
            let mut cur = BitCursor::new(&bytes);
            assert_eq!(decode_normally_small(&mut cur).unwrap(), v);
            assert_eq!(cur.position(), n);
        }
    }

    #[test]
    fn test_normally_small_length() {
        for n in [1usize, 2, 64, 65, 300] {
            let mut sink = BitSink::new();
            encode_normally_small_length(&mut sink, n).unwrap();
            let bytes = sink.into_bytes();
            let mut cur = BitCursor::new(&bytes);
            assert_eq!(decode_normally_small_length(&mut cur).unwrap(), n);
        }
        let mut sink = BitSink::new();
        encode_normally_small_length(&mut sink, 1).unwrap();
        assert_eq!(bits_of(&sink), "0000000");
    }

    #[test]
    fn test_enumerated_root_and_extension() {
        let mut sink = BitSink::new();
        encode_enumerated(&mut sink, 2, 3, false).unwrap();
        assert_eq!(bits_of(&sink), "10");

        let mut sink = BitSink::new();
        encode_enumerated(&mut sink, 4, 3, true).unwrap();
        assert_eq!(bits_of(&sink), "10000001");
        let bytes = sink.into_bytes();
        let mut cur = BitCursor::new(&bytes);
        assert_eq!(decode_enumerated(&mut cur, 3, true).unwrap(), 4);

        let mut sink = BitSink::new();
        assert!(encode_enumerated(&mut sink, 3, 3, false).is_err());

        // Root index 3 in a 3-item root is never accepted.
        let data = [0b1100_0000];
        let mut cur = BitCursor::with_config(&data, &CodecConfig::permissive());
        assert!(decode_enumerated(&mut cur, 3, false).is_err());
    }

    #[test]
    fn test_fixed_bit_string_short_by_one_bit() {
        let data = [0xFF, 0xFE];
        let mut cur = BitCursor::new(&data);
        cur.take_bit().unwrap();
        let err = decode_bit_string(&mut cur, &SizeRange::fixed(16)).unwrap_err();
        assert_eq!(
            err,
            CodecError::OutOfBounds {
                offset: 1,
                needed: 16,
                available: 15
            }
        );
    }

    #[test]
    fn test_bounded_octet_string_layout() {
        let mut sink = BitSink::new();
        encode_octet_string(&mut sink, &[0xAB, 0xCD], &SizeRange::bounded(1, 4)).unwrap();
        // size 2 as 2 bits over 1..4 ("01"), then the octets without alignment.
        assert_eq!(sink.len(), 2 + 16);
        assert_eq!(sink.into_bytes(), vec![0b0110_1010, 0b1111_0011, 0b0100_0000]);
    }

    #[test]
    fn test_unbounded_octet_string_alignment() {
        let mut aligned = BitSink::new();
        aligned.put_bit(true).unwrap();
        encode_octet_string(&mut aligned, &[0x11], &SizeRange::unbounded()).unwrap();
        assert_eq!(aligned.len(), 1 + 8 + 7 + 8);

        let config = CodecConfig::default().with_open_content_alignment(false);
        let mut plain = BitSink::with_config(&config);
        plain.put_bit(true).unwrap();
        encode_octet_string(&mut plain, &[0x11], &SizeRange::unbounded()).unwrap();
        assert_eq!(plain.len(), 1 + 8 + 8);
        let bytes = plain.into_bytes();
        let mut cur = BitCursor::with_config(&bytes, &config);
        cur.take_bit().unwrap();
        assert_eq!(decode_octet_string(&mut cur, &SizeRange::unbounded()).unwrap().as_ref(), &[0x11]);
    }

    #[test]
    fn test_extensible_size() {
        let size = SizeRange::bounded(1, 2).extensible();
        let mut sink = BitSink::new();
        encode_bit_string(&mut sink, bits![u8, Msb0; 1, 0, 1], &size).unwrap();
        let bytes = sink.into_bytes();
        let mut cur = BitCursor::new(&bytes);
        assert_eq!(decode_bit_string(&mut cur, &size).unwrap(), bitvec![u8, Msb0; 1, 0, 1]);
    }

    #[test]
    fn test_open_type_round_trip_and_skip() {
        let mut sink = BitSink::new();
        sink.put_bits(0b11, 2).unwrap();
        encode_open_type(&mut sink, &[1, 2, 3]).unwrap();
        sink.put_bits(0b101, 3).unwrap();
        let bytes = sink.into_bytes();

        let mut cur = BitCursor::new(&bytes);
        cur.take_bits(2).unwrap();
        let (origin, content) = decode_open_type_at(&mut cur).unwrap();
        assert_eq!(content.as_ref(), &[1, 2, 3]);
        assert_eq!(origin, 16);
        assert_eq!(cur.take_bits(3).unwrap(), 0b101);

        let mut cur = BitCursor::new(&bytes);
        cur.take_bits(2).unwrap();
        assert_eq!(skip_open_type(&mut cur).unwrap(), 3);
        assert_eq!(cur.take_bits(3).unwrap(), 0b101);
    }
}
