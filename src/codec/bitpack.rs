// Nibble packing for the per-frame symbol stream.
//
// Two symbols per byte, first symbol in bits 7..4, second in bits 3..0.
// An odd trailing symbol leaves the low nibble of the last byte zero.
// Escape values travel separately in the side channel, in the order their
// escape symbols appear in the stream.

use super::decoder::FormatError;
use super::symbol::{self, ESCAPE, SideChannelReader};

/// Packed byte length for `symbols` 4-bit symbols: ceil(symbols / 2).
#[inline]
pub fn packed_len(symbols: usize) -> usize {
    symbols.div_ceil(2)
}

// ---------------------------------------------------------------------------
// Writer
// ---------------------------------------------------------------------------

/// Accumulates 4-bit symbols into bytes, high nibble first.
#[derive(Debug)]
pub struct NibbleWriter<'a> {
    out: &'a mut Vec<u8>,
    pending: Option<u8>,
    symbols: usize,
}

impl<'a> NibbleWriter<'a> {
    /// Append to `out`. Existing contents are kept.
    pub fn new(out: &'a mut Vec<u8>) -> Self {
        Self {
            out,
            pending: None,
            symbols: 0,
        }
    }

    /// Push one symbol; only its low nibble is stored.
    #[inline]
    pub fn push(&mut self, symbol: u8) {
        let symbol = symbol & 0x0F;
        match self.pending.take() {
            Some(high) => self.out.push((high << 4) | symbol),
            None => self.pending = Some(symbol),
        }
        self.symbols += 1;
    }

    /// Flush a dangling high nibble (zero-padded) and return the symbol count.
    pub fn finish(mut self) -> usize {
        if let Some(high) = self.pending.take() {
            self.out.push(high << 4);
        }
        self.symbols
    }
}

// ---------------------------------------------------------------------------
// Reader
// ---------------------------------------------------------------------------

/// Yields exactly `count` symbols from a packed bitstream.
///
/// Construction fails if the bitstream is too short for `count` symbols,
/// so iteration itself never indexes out of bounds. Bytes or pad nibbles
/// beyond `count` are never read.
#[derive(Debug, Clone)]
pub struct NibbleReader<'a> {
    data: &'a [u8],
    count: usize,
    pos: usize,
}

impl<'a> NibbleReader<'a> {
    pub fn new(data: &'a [u8], count: usize) -> Result<Self, FormatError> {
        let expected = packed_len(count);
        if data.len() < expected {
            return Err(FormatError::BitstreamLength {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            data,
            count,
            pos: 0,
        })
    }

    /// Symbols left to read.
    pub fn remaining(&self) -> usize {
        self.count - self.pos
    }
}

impl Iterator for NibbleReader<'_> {
    type Item = u8;

    #[inline]
    fn next(&mut self) -> Option<u8> {
        if self.pos >= self.count {
            return None;
        }
        let byte = self.data[self.pos >> 1];
        let symbol = if self.pos & 1 == 0 {
            byte >> 4
        } else {
            byte & 0x0F
        };
        self.pos += 1;
        Some(symbol)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.remaining();
        (n, Some(n))
    }
}

impl ExactSizeIterator for NibbleReader<'_> {}

// ---------------------------------------------------------------------------
// Frame-level pack / unpack
// ---------------------------------------------------------------------------

/// Encode and pack one frame's deltas.
///
/// Clears and refills `bitstream` and `side`. Returns the escape count;
/// `side.len()` is always twice that.
pub fn pack_deltas(deltas: &[i16], bitstream: &mut Vec<u8>, side: &mut Vec<u8>) -> usize {
    bitstream.clear();
    side.clear();
    bitstream.reserve(packed_len(deltas.len()));

    let mut escapes = 0usize;
    let mut writer = NibbleWriter::new(bitstream);
    for &delta in deltas {
        let (sym, escaped) = symbol::encode_symbol(delta);
        writer.push(sym);
        if let Some(value) = escaped {
            symbol::push_side_value(side, value);
            escapes += 1;
        }
    }
    writer.finish();
    escapes
}

/// Unpack and decode one frame's deltas into `out`.
///
/// `out.len()` is the expected symbol count. Every side-channel byte must be
/// consumed; leftovers or a shortfall are format errors. Returns the escape
/// count.
pub fn unpack_deltas(
    bitstream: &[u8],
    side: &[u8],
    out: &mut [i16],
) -> Result<usize, FormatError> {
    let reader = NibbleReader::new(bitstream, out.len())?;
    let mut side_reader = SideChannelReader::new(side);
    let mut escapes = 0usize;

    for (slot, sym) in out.iter_mut().zip(reader) {
        if sym == ESCAPE {
            escapes += 1;
        }
        *slot = symbol::decode_symbol(sym, &mut side_reader)?;
    }

    if !side_reader.is_exhausted() {
        return Err(FormatError::SideChannelLength {
            declared: side.len(),
            consumed: side_reader.consumed(),
        });
    }
    Ok(escapes)
}

/// Count escape symbols in a packed bitstream without decoding deltas.
pub fn count_escapes(bitstream: &[u8], count: usize) -> Result<usize, FormatError> {
    Ok(NibbleReader::new(bitstream, count)?
        .filter(|&s| s == ESCAPE)
        .count())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn high_nibble_first() {
        let mut out = Vec::new();
        let mut w = NibbleWriter::new(&mut out);
        for s in [1, 2, 3, 0xF] {
            w.push(s);
        }
        assert_eq!(w.finish(), 4);
        assert_eq!(out, vec![0x12, 0x3F]);
    }

    #[test]
    fn odd_count_pads_low_nibble() {
        let mut out = Vec::new();
        let mut w = NibbleWriter::new(&mut out);
        for s in [9, 8, 7] {
            w.push(s);
        }
        assert_eq!(w.finish(), 3);
        assert_eq!(out, vec![0x98, 0x70]);
    }

    #[test]
    fn reader_stops_at_count() {
        let data = [0x98, 0x7F];
        let syms: Vec<u8> = NibbleReader::new(&data, 3).unwrap().collect();
        assert_eq!(syms, vec![9, 8, 7]);
    }

    #[test]
    fn reader_rejects_short_bitstream() {
        let err = NibbleReader::new(&[0x11], 3).unwrap_err();
        assert_eq!(
            err,
            FormatError::BitstreamLength {
                expected: 2,
                actual: 1
            }
        );
    }

    #[test]
    fn packed_len_law() {
        assert_eq!(packed_len(0), 0);
        assert_eq!(packed_len(1), 1);
        assert_eq!(packed_len(2), 1);
        assert_eq!(packed_len(3), 2);
        assert_eq!(packed_len(12), 6);
    }

    #[test]
    fn pack_mixed_deltas() {
        let deltas = [1i16, 0, -3, 200, -200, 7];
        let mut bits = Vec::new();
        let mut side = Vec::new();
        let escapes = pack_deltas(&deltas, &mut bits, &mut side);
        assert_eq!(escapes, 2);
        assert_eq!(bits, vec![0x10, 0xB8, 0x87]);
        assert_eq!(side.len(), 4);
        assert_eq!(&side[..2], &200i16.to_le_bytes());
        assert_eq!(&side[2..], &(-200i16).to_le_bytes());

        let mut out = [0i16; 6];
        assert_eq!(unpack_deltas(&bits, &side, &mut out).unwrap(), 2);
        assert_eq!(out, deltas);
        assert_eq!(count_escapes(&bits, 6).unwrap(), 2);
    }

    #[test]
    fn pack_clears_previous_contents() {
        let mut bits = vec![0xAA; 8];
        let mut side = vec![0xBB; 8];
        pack_deltas(&[0, 0], &mut bits, &mut side);
        assert_eq!(bits, vec![0x00]);
        assert!(side.is_empty());
    }

    #[test]
    fn leftover_side_bytes_rejected() {
        let mut bits = Vec::new();
        let mut side = Vec::new();
        pack_deltas(&[50, 1], &mut bits, &mut side);
        side.extend_from_slice(&[0, 0]);
        let mut out = [0i16; 2];
        assert_eq!(
            unpack_deltas(&bits, &side, &mut out),
            Err(FormatError::SideChannelLength {
                declared: 4,
                consumed: 2
            })
        );
    }

    #[test]
    fn missing_side_bytes_rejected() {
        let mut bits = Vec::new();
        let mut side = Vec::new();
        pack_deltas(&[50, -60], &mut bits, &mut side);
        side.truncate(2);
        let mut out = [0i16; 2];
        assert_eq!(
            unpack_deltas(&bits, &side, &mut out),
            Err(FormatError::SideChannelExhausted)
        );
    }
}
