// 2PFX container layout.
//
//   offset 0   magic "2PFX"
//   offset 4   frame_count  u32 LE
//   offset 8   height       u32 LE
//   offset 12  width        u32 LE
//   offset 16  frame records, each:
//                bitstream_len u32 LE, side_len u32 LE,
//                bitstream bytes, side-channel bytes

use std::io::{self, Read, Write};

use super::bitpack::packed_len;
use super::decoder::{DecodeError, FormatError};
use super::symbol::SIDE_ENTRY_LEN;
use crate::frame::FrameDims;

pub const MAGIC: [u8; 4] = *b"2PFX";

/// Size of the fixed container header.
pub const HEADER_LEN: usize = 16;

/// Size of the two length fields that open every frame record.
pub const RECORD_PREFIX_LEN: usize = 8;

/// Largest per-frame sample count the format can carry: every sample could be
/// an escape, and the side-channel length must fit in a u32.
pub const MAX_SAMPLES: usize = u32::MAX as usize / SIDE_ENTRY_LEN;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// `read_exact`, with a clean end-of-file reported as `on_eof`.
fn read_exact_or<R: Read>(
    r: &mut R,
    buf: &mut [u8],
    on_eof: FormatError,
) -> Result<(), DecodeError> {
    r.read_exact(buf).map_err(|e| {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            DecodeError::Format(on_eof)
        } else {
            DecodeError::Io(e)
        }
    })
}

fn le_u32(bytes: &[u8]) -> u32 {
    u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

// ---------------------------------------------------------------------------
// Container header
// ---------------------------------------------------------------------------

/// Parsed container header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContainerHeader {
    pub frame_count: u32,
    pub dims: FrameDims,
}

impl ContainerHeader {
    pub fn new(frame_count: u32, dims: FrameDims) -> Self {
        Self { frame_count, dims }
    }

    /// Channel samples (= symbols) per frame.
    ///
    /// Only meaningful for a header that passed [`decode`](Self::decode) or
    /// was built from validated frames.
    pub fn samples_per_frame(&self) -> usize {
        self.dims.sample_count().unwrap_or(0)
    }

    pub fn encode<W: Write>(&self, w: &mut W) -> io::Result<()> {
        let mut buf = [0u8; HEADER_LEN];
        buf[..4].copy_from_slice(&MAGIC);
        buf[4..8].copy_from_slice(&self.frame_count.to_le_bytes());
        buf[8..12].copy_from_slice(&self.dims.height.to_le_bytes());
        buf[12..16].copy_from_slice(&self.dims.width.to_le_bytes());
        w.write_all(&buf)
    }

    /// Read and validate the header.
    ///
    /// Rejects a wrong magic, a short header, zero dimensions, and geometry
    /// whose per-frame sample count the format cannot represent.
    pub fn decode<R: Read>(r: &mut R) -> Result<Self, DecodeError> {
        let mut buf = [0u8; HEADER_LEN];
        read_exact_or(r, &mut buf[..4], FormatError::TruncatedHeader)?;
        if buf[..4] != MAGIC {
            return Err(FormatError::BadMagic([buf[0], buf[1], buf[2], buf[3]]).into());
        }
        read_exact_or(r, &mut buf[4..], FormatError::TruncatedHeader)?;

        let frame_count = le_u32(&buf[4..8]);
        let height = le_u32(&buf[8..12]);
        let width = le_u32(&buf[12..16]);
        let dims = FrameDims::new(width, height);

        if width == 0 || height == 0 {
            return Err(FormatError::ZeroDimension { width, height }.into());
        }
        match dims.sample_count() {
            Some(n) if n <= MAX_SAMPLES => {}
            _ => return Err(FormatError::DimensionsTooLarge { width, height }.into()),
        }

        Ok(Self { frame_count, dims })
    }
}

// ---------------------------------------------------------------------------
// Frame record
// ---------------------------------------------------------------------------

/// Declared payload lengths of one frame record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordLengths {
    pub bitstream_len: u32,
    pub side_len: u32,
}

impl RecordLengths {
    /// Total encoded size of the record, prefix included.
    pub fn record_len(&self) -> u64 {
        RECORD_PREFIX_LEN as u64 + u64::from(self.bitstream_len) + u64::from(self.side_len)
    }

    /// Escape count implied by the side-channel length.
    pub fn escapes(&self) -> usize {
        self.side_len as usize / SIDE_ENTRY_LEN
    }

    /// Check the declared lengths against the frame's symbol count.
    ///
    /// The bitstream must hold at least ceil(samples/2) bytes (bytes past
    /// the last symbol are read and ignored); the side channel must hold
    /// whole entries and at most one per sample.
    pub fn validate(&self, samples: usize) -> Result<(), FormatError> {
        let expected = packed_len(samples);
        if (self.bitstream_len as usize) < expected {
            return Err(FormatError::BitstreamLength {
                expected,
                actual: self.bitstream_len as usize,
            });
        }
        let side = self.side_len as usize;
        if side % SIDE_ENTRY_LEN != 0 || side > samples * SIDE_ENTRY_LEN {
            return Err(FormatError::InvalidSideChannelLength(self.side_len));
        }
        Ok(())
    }
}

/// Write one record. Lengths must already fit in u32 (guaranteed for
/// geometry within [`MAX_SAMPLES`]).
pub fn write_record<W: Write>(w: &mut W, bitstream: &[u8], side: &[u8]) -> io::Result<u64> {
    let bitstream_len = u32::try_from(bitstream.len())
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "bitstream exceeds u32 length"))?;
    let side_len = u32::try_from(side.len()).map_err(|_| {
        io::Error::new(io::ErrorKind::InvalidInput, "side channel exceeds u32 length")
    })?;

    let mut prefix = [0u8; RECORD_PREFIX_LEN];
    prefix[..4].copy_from_slice(&bitstream_len.to_le_bytes());
    prefix[4..].copy_from_slice(&side_len.to_le_bytes());
    w.write_all(&prefix)?;
    w.write_all(bitstream)?;
    w.write_all(side)?;

    Ok(RecordLengths {
        bitstream_len,
        side_len,
    }
    .record_len())
}

/// Read and validate one record's length prefix.
pub fn read_record_lengths<R: Read>(
    r: &mut R,
    frame: u32,
    samples: usize,
) -> Result<RecordLengths, DecodeError> {
    let mut prefix = [0u8; RECORD_PREFIX_LEN];
    read_exact_or(r, &mut prefix, FormatError::TruncatedRecord { frame })?;
    let lengths = RecordLengths {
        bitstream_len: le_u32(&prefix[..4]),
        side_len: le_u32(&prefix[4..]),
    };
    lengths.validate(samples)?;
    Ok(lengths)
}

/// Read one record into reusable buffers.
///
/// Payloads are read through `take`, so the buffers only grow as far as the
/// input actually reaches.
pub fn read_record<R: Read>(
    r: &mut R,
    frame: u32,
    samples: usize,
    bitstream: &mut Vec<u8>,
    side: &mut Vec<u8>,
) -> Result<RecordLengths, DecodeError> {
    let lengths = read_record_lengths(r, frame, samples)?;
    read_payload(r, lengths.bitstream_len, bitstream, frame)?;
    read_payload(r, lengths.side_len, side, frame)?;
    Ok(lengths)
}

/// Read one record's bitstream and skip its side channel.
pub fn read_record_bitstream<R: Read>(
    r: &mut R,
    frame: u32,
    samples: usize,
    bitstream: &mut Vec<u8>,
) -> Result<RecordLengths, DecodeError> {
    let lengths = read_record_lengths(r, frame, samples)?;
    read_payload(r, lengths.bitstream_len, bitstream, frame)?;

    let skipped = io::copy(
        &mut r.by_ref().take(u64::from(lengths.side_len)),
        &mut io::sink(),
    )?;
    if skipped != u64::from(lengths.side_len) {
        return Err(FormatError::TruncatedRecord { frame }.into());
    }
    Ok(lengths)
}

fn read_payload<R: Read>(
    r: &mut R,
    len: u32,
    buf: &mut Vec<u8>,
    frame: u32,
) -> Result<(), DecodeError> {
    buf.clear();
    let n = r.by_ref().take(u64::from(len)).read_to_end(buf)?;
    if n != len as usize {
        return Err(FormatError::TruncatedRecord { frame }.into());
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
