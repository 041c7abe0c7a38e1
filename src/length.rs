//! General length determinant (X.691 11.9) with fragmentation.
//!
//! | value            | wire form                                              |
//! |------------------|--------------------------------------------------------|
//! | `0..=127`        | one octet `0xxxxxxx`                                   |
//! | `128..=16383`    | two octets `10xxxxxx xxxxxxxx`                         |
//! | `>= 16384`       | `11000mmm` (m = 1..=4 units of 16K items), the items,  |
//! |                  | then the next length prefix for what remains           |
//!
//! A count that is an exact multiple of 16K still ends with a prefix: the one-octet length 0.
//! Fragments interleave with the content they count, so the fragmented forms take a callback
//! that emits or consumes the items covered by each prefix.

use crate::bits::{BitCursor, BitSink};
use crate::error::CodecError;
use std::ops::Range;

pub const SHORT_FORM_LIMIT: usize = 128;
pub const FRAGMENT_UNIT: usize = 16384;
pub const MAX_FRAGMENT_MULTIPLIER: usize = 4;

/// One length prefix as found on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LengthPrefix {
    /// Final prefix: this many items follow and the determinant ends.
    Complete(usize),
    /// This many items (a multiple of 16K) follow, then another prefix.
    Fragment(usize),
}

impl LengthPrefix {
    pub fn count(&self) -> usize {
        match self {
            LengthPrefix::Complete(n) | LengthPrefix::Fragment(n) => *n,
        }
    }
}

/// Write the prefix for `remaining` items and return how many of them it covers.
pub fn encode_length_prefix(sink: &mut BitSink, remaining: usize) -> Result<LengthPrefix, CodecError> {
    if remaining < SHORT_FORM_LIMIT {
        sink.put_bits(remaining as u64, 8)?;
        Ok(LengthPrefix::Complete(remaining))
    } else if remaining < FRAGMENT_UNIT {
        sink.put_bits(0x8000 | remaining as u64, 16)?;
        Ok(LengthPrefix::Complete(remaining))
    } else {
        let m = (remaining / FRAGMENT_UNIT).min(MAX_FRAGMENT_MULTIPLIER);
        sink.put_bits(0xC0 | m as u64, 8)?;
        Ok(LengthPrefix::Fragment(m * FRAGMENT_UNIT))
    }
}

pub fn decode_length_prefix(cur: &mut BitCursor) -> Result<LengthPrefix, CodecError> {
    let at = cur.offset();
    let first = cur.take_bits(8)? as usize;
    if first & 0x80 == 0 {
        Ok(LengthPrefix::Complete(first))
    } else if first & 0x40 == 0 {
        let second = cur.take_bits(8)? as usize;
        Ok(LengthPrefix::Complete(((first & 0x3F) << 8) | second))
    } else {
        let m = first & 0x3F;
        if m == 0 || m > MAX_FRAGMENT_MULTIPLIER {
            return Err(CodecError::malformed(
                at,
                format!("fragment multiplier {} (expected 1..=4)", m),
            ));
        }
        Ok(LengthPrefix::Fragment(m * FRAGMENT_UNIT))
    }
}

/// Unfragmented length determinant, for values known to stay below 16K (octet counts of
/// integers, normally small lengths).
pub fn encode_length_determinant(sink: &mut BitSink, n: usize) -> Result<(), CodecError> {
    if n >= FRAGMENT_UNIT {
        return Err(CodecError::malformed(
            sink.len(),
            format!("length {} needs fragmentation", n),
        ));
    }
    encode_length_prefix(sink, n).map(|_| ())
}

pub fn decode_length_determinant(cur: &mut BitCursor) -> Result<usize, CodecError> {
    let at = cur.offset();
    match decode_length_prefix(cur)? {
        LengthPrefix::Complete(n) => Ok(n),
        LengthPrefix::Fragment(_) => Err(CodecError::malformed(
            at,
            "fragmented length where a single length determinant is required",
        )),
    }
}

/// Write `count` items behind a general length determinant. `emit` is called once per prefix
/// with the item range that prefix covers. With `align`, content is octet-aligned after every
/// prefix when the sink has the open-content exception enabled.
pub fn encode_fragmented<F>(
    sink: &mut BitSink,
    count: usize,
    align: bool,
    mut emit: F,
) -> Result<(), CodecError>
where
    F: FnMut(&mut BitSink, Range<usize>) -> Result<(), CodecError>,
{
    let mut start = 0;
    loop {
        let prefix = encode_length_prefix(sink, count - start)?;
        if align && sink.align_open_content() {
            sink.align_to_byte()?;
        }
        let n = prefix.count();
        emit(sink, start..start + n)?;
        start += n;
        if let LengthPrefix::Complete(_) = prefix {
            return Ok(());
        }
    }
}

/// Read a general length determinant and its items; returns the total item count. `take` is
/// called once per prefix with the number of items to consume. When `unit_bits` is non-zero a
/// prefix claiming more items than the remaining input can hold is rejected up front.
pub fn decode_fragmented<F>(
    cur: &mut BitCursor,
    unit_bits: usize,
    align: bool,
    mut take: F,
) -> Result<usize, CodecError>
where
    F: FnMut(&mut BitCursor, usize) -> Result<(), CodecError>,
{
    let mut total = 0usize;
    loop {
        let at = cur.offset();
        let prefix = decode_length_prefix(cur)?;
        if align && cur.align_open_content() {
            cur.align_to_byte()?;
        }
        let n = prefix.count();
        if unit_bits > 0 && n.saturating_mul(unit_bits) > cur.bits_remaining() {
            return Err(CodecError::malformed(
                at,
                format!(
                    "length {} needs {} bits, {} remain",
                    n,
                    n.saturating_mul(unit_bits),
                    cur.bits_remaining()
                ),
            ));
        }
        take(cur, n)?;
        total = total
            .checked_add(n)
            .ok_or_else(|| CodecError::malformed(at, "length overflows"))?;
        if let LengthPrefix::Complete(_) = prefix {
            return Ok(total);
        }
    }
}
