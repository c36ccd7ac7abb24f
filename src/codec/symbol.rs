// 4-bit symbol mapping for per-channel deltas.
//
//   0..=7    delta = +m            (small non-negative)
//   8        escape: exact delta follows in the side channel (i16 LE)
//   9..=15   delta = -(s & 7)      (small negative, m >= 1)
//
// Negative zero never occurs, so 8 is free to act as the escape code.

use super::decoder::FormatError;

/// Escape symbol. Never produced by the direct mapping.
pub const ESCAPE: u8 = 8;

/// Largest magnitude encoded without an escape.
pub const MAX_DIRECT: u16 = 7;

/// Bytes per side-channel entry.
pub const SIDE_ENTRY_LEN: usize = 2;

/// Map a delta to its symbol, plus the side-channel value when escaped.
#[inline]
pub fn encode_symbol(delta: i16) -> (u8, Option<i16>) {
    let m = delta.unsigned_abs();
    if m > MAX_DIRECT {
        (ESCAPE, Some(delta))
    } else if delta < 0 {
        (0x8 | m as u8, None)
    } else {
        (m as u8, None)
    }
}

/// Inverse of [`encode_symbol`]. Escapes consume one entry from `side`.
///
/// Only the low nibble of `symbol` is considered.
#[inline]
pub fn decode_symbol(symbol: u8, side: &mut SideChannelReader<'_>) -> Result<i16, FormatError> {
    let symbol = symbol & 0x0F;
    match symbol {
        ESCAPE => side.next_value(),
        0..=7 => Ok(i16::from(symbol)),
        _ => Ok(-i16::from(symbol & 0x07)),
    }
}

// ---------------------------------------------------------------------------
// Side channel
// ---------------------------------------------------------------------------

/// Appends escape values as little-endian i16.
#[inline]
pub fn push_side_value(side: &mut Vec<u8>, value: i16) {
    side.extend_from_slice(&value.to_le_bytes());
}

/// Sequential reader over a frame's side-channel bytes.
#[derive(Debug, Clone)]
pub struct SideChannelReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> SideChannelReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Next escape value; fails once fewer than two bytes remain.
    #[inline]
    pub fn next_value(&mut self) -> Result<i16, FormatError> {
        let end = self.pos + SIDE_ENTRY_LEN;
        let bytes = self
            .data
            .get(self.pos..end)
            .ok_or(FormatError::SideChannelExhausted)?;
        self.pos = end;
        Ok(i16::from_le_bytes([bytes[0], bytes[1]]))
    }

    /// Bytes consumed so far.
    pub fn consumed(&self) -> usize {
        self.pos
    }

    /// `true` once every supplied byte has been consumed.
    pub fn is_exhausted(&self) -> bool {
        self.pos == self.data.len()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
