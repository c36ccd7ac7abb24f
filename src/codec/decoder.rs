// 2PFX sequence decoder.
//
// Reads the container header, then one frame record at a time:
// unpack nibbles -> decode symbols (+ side channel) -> add onto the
// reference -> clip to 8 bits. Frames depend on their predecessor, so
// decoding is strictly sequential.

use std::convert::Infallible;
use std::io::Read;

use super::bitpack;
use super::delta::{self, ClipPolicy};
use super::header::{self, ContainerHeader, RecordLengths};
use crate::frame::{Frame, FrameSink, ReferenceState};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Structural problems in a 2PFX stream.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FormatError {
    #[error("bad magic: expected \"2PFX\", got {0:02X?}")]
    BadMagic([u8; 4]),
    #[error("truncated container header")]
    TruncatedHeader,
    #[error("invalid frame dimensions {width}x{height}")]
    ZeroDimension { width: u32, height: u32 },
    #[error("frame dimensions {width}x{height} exceed the format limit")]
    DimensionsTooLarge { width: u32, height: u32 },
    #[error("frame {frame}: truncated record")]
    TruncatedRecord { frame: u32 },
    #[error("bitstream too short: need {expected} bytes, got {actual}")]
    BitstreamLength { expected: usize, actual: usize },
    #[error("invalid side-channel length {0}")]
    InvalidSideChannelLength(u32),
    #[error("side-channel length mismatch: declared {declared} bytes, consumed {consumed}")]
    SideChannelLength { declared: usize, consumed: usize },
    #[error("side channel exhausted before the last escape symbol")]
    SideChannelExhausted,
    #[error("frame {frame}: sample {index} reconstructs to {value}, outside 0..=255")]
    OutOfRange { frame: u32, index: usize, value: i32 },
}

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("format error: {0}")]
    Format(#[from] FormatError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl DecodeError {
    /// The format error, if this is one.
    pub fn as_format(&self) -> Option<&FormatError> {
        match self {
            Self::Format(e) => Some(e),
            Self::Io(_) => None,
        }
    }
}

impl From<Infallible> for DecodeError {
    fn from(e: Infallible) -> Self {
        match e {}
    }
}

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// Decoder configuration.
#[derive(Debug, Clone, Default)]
pub struct DecodeOptions {
    /// Handling of reconstructed samples outside [0, 255].
    pub clip_policy: ClipPolicy,
}

// ---------------------------------------------------------------------------
// SequenceDecoder
// ---------------------------------------------------------------------------

/// Decoding session over one 2PFX container.
///
/// Owns the reference frame and the per-record scratch buffers; both are
/// reused for every frame.
pub struct SequenceDecoder<R: Read> {
    reader: R,
    opts: DecodeOptions,
    header: Option<ContainerHeader>,
    reference: ReferenceState,
    deltas: Vec<i16>,
    bitstream: Vec<u8>,
    side: Vec<u8>,
    frames_decoded: u32,
    bytes_read: u64,
    escapes: u64,
    clipped: u64,
}

impl<R: Read> SequenceDecoder<R> {
    pub fn new(reader: R) -> Self {
        Self::with_options(reader, DecodeOptions::default())
    }

    pub fn with_options(reader: R, opts: DecodeOptions) -> Self {
        Self {
            reader,
            opts,
            header: None,
            reference: ReferenceState::zeroed(0),
            deltas: Vec::new(),
            bitstream: Vec::new(),
            side: Vec::new(),
            frames_decoded: 0,
            bytes_read: 0,
            escapes: 0,
            clipped: 0,
        }
    }

    /// Read the container header if it has not been read yet.
    pub fn read_header(&mut self) -> Result<ContainerHeader, DecodeError> {
        if let Some(hdr) = self.header {
            return Ok(hdr);
        }
        let hdr = ContainerHeader::decode(&mut self.reader)?;
        let samples = hdr.samples_per_frame();
        log::debug!(
            "2pfx header: {} frames, {} ({} samples/frame)",
            hdr.frame_count,
            hdr.dims,
            samples
        );
        self.bytes_read = header::HEADER_LEN as u64;
        self.header = Some(hdr);
        Ok(hdr)
    }

    /// Decode the next frame, or `None` after the last declared frame.
    pub fn decode_frame(&mut self) -> Result<Option<Frame>, DecodeError> {
        let hdr = self.read_header()?;
        if self.frames_decoded >= hdr.frame_count {
            return Ok(None);
        }
        let index = self.frames_decoded;
        let samples = hdr.samples_per_frame();

        let lengths: RecordLengths = header::read_record(
            &mut self.reader,
            index,
            samples,
            &mut self.bitstream,
            &mut self.side,
        )?;
        // Sized on the first record rather than from the header alone.
        if self.reference.len() != samples {
            self.reference = ReferenceState::zeroed(samples);
            self.deltas = vec![0; samples];
        }
        let escapes = bitpack::unpack_deltas(&self.bitstream, &self.side, &mut self.deltas)?;

        let mut pixels = vec![0u8; samples];
        let clamped = delta::reconstruct(
            self.reference.as_mut_slice(),
            &self.deltas,
            &mut pixels,
            self.opts.clip_policy,
        )
        .map_err(|e| FormatError::OutOfRange {
            frame: index,
            index: e.index,
            value: e.value,
        })?;

        if clamped > 0 {
            log::warn!("frame {index}: clamped {clamped} samples outside 0..=255");
        }
        log::debug!(
            "frame {index}: bitstream {} B, side channel {} B, {escapes} escapes",
            lengths.bitstream_len,
            lengths.side_len
        );

        self.frames_decoded += 1;
        self.bytes_read += lengths.record_len();
        self.escapes += escapes as u64;
        self.clipped += clamped as u64;

        if self.frames_decoded == hdr.frame_count {
            log::trace!("2pfx decoder: all {} frames decoded", hdr.frame_count);
        }

        Ok(Some(Frame::from_validated(hdr.dims, pixels)))
    }

    /// Decode every remaining frame into `sink`. Returns the number delivered.
    pub fn decode_to<S>(&mut self, sink: &mut S) -> Result<u32, DecodeError>
    where
        S: FrameSink,
        DecodeError: From<S::Error>,
    {
        let mut delivered = 0u32;
        while let Some(frame) = self.decode_frame()? {
            sink.accept(frame)?;
            delivered += 1;
        }
        Ok(delivered)
    }

    /// Forget the current container and expect a new header from the same
    /// reader. The reference returns to all-zero.
    pub fn reset(&mut self) {
        log::trace!("2pfx decoder: reset after {} frames", self.frames_decoded);
        self.header = None;
        self.reference.reset();
        self.frames_decoded = 0;
        self.bytes_read = 0;
        self.escapes = 0;
        self.clipped = 0;
    }

    /// Header, once read.
    pub fn header(&self) -> Option<&ContainerHeader> {
        self.header.as_ref()
    }

    pub fn frames_decoded(&self) -> u32 {
        self.frames_decoded
    }

    /// Container bytes consumed so far.
    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }

    /// Escape symbols seen so far.
    pub fn escapes(&self) -> u64 {
        self.escapes
    }

    /// Samples clamped into 0..=255 so far (always 0 under `Strict`).
    pub fn clipped_channels(&self) -> u64 {
        self.clipped
    }

    pub fn into_inner(self) -> R {
        self.reader
    }
}

// ---------------------------------------------------------------------------
// Convenience functions
// ---------------------------------------------------------------------------

/// Decode a whole container from memory.
pub fn decode_all(data: &[u8]) -> Result<Vec<Frame>, DecodeError> {
    decode_all_with(data, DecodeOptions::default())
}

/// Decode a whole container from memory with explicit options.
pub fn decode_all_with(data: &[u8], opts: DecodeOptions) -> Result<Vec<Frame>, DecodeError> {
    let mut decoder = SequenceDecoder::with_options(data, opts);
    let hdr = decoder.read_header()?;
    let mut frames = Vec::with_capacity(hdr.frame_count.min(1024) as usize);
    decoder.decode_to(&mut frames)?;
    Ok(frames)
}

// ---------------------------------------------------------------------------
// Inspection
// ---------------------------------------------------------------------------

/// Sizes of one frame record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordInfo {
    pub bitstream_len: u32,
    pub side_len: u32,
    pub escapes: usize,
}

/// Structural summary of a container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerInfo {
    pub header: ContainerHeader,
    pub records: Vec<RecordInfo>,
    /// Header plus all records.
    pub total_len: u64,
}

impl ContainerInfo {
    /// Bytes of raw RGB the container expands to.
    pub fn raw_len(&self) -> u64 {
        self.header.samples_per_frame() as u64 * u64::from(self.header.frame_count)
    }

    pub fn total_escapes(&self) -> u64 {
        self.records.iter().map(|r| r.escapes as u64).sum()
    }
}

/// Walk every record without reconstructing pixels.
///
/// Record lengths and escape counts are checked exactly as during decode, so
/// a container that inspects cleanly is structurally sound.
pub fn inspect<R: Read>(mut reader: R) -> Result<ContainerInfo, DecodeError> {
    let hdr = ContainerHeader::decode(&mut reader)?;
    let samples = hdr.samples_per_frame();
    let mut total_len = header::HEADER_LEN as u64;
    let mut records = Vec::with_capacity(hdr.frame_count.min(1024) as usize);
    let mut bitstream = Vec::new();

    for frame in 0..hdr.frame_count {
        let lengths = header::read_record_bitstream(&mut reader, frame, samples, &mut bitstream)?;
        let escapes = bitpack::count_escapes(&bitstream, samples)?;
        if escapes != lengths.escapes() {
            return Err(FormatError::SideChannelLength {
                declared: lengths.side_len as usize,
                consumed: escapes * super::symbol::SIDE_ENTRY_LEN,
            }
            .into());
        }
        total_len += lengths.record_len();
        records.push(RecordInfo {
            bitstream_len: lengths.bitstream_len,
            side_len: lengths.side_len,
            escapes,
        });
    }

    Ok(ContainerInfo {
        header: hdr,
        records,
        total_len,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::encoder;

    fn gradient(w: u32, h: u32, shift: u8) -> Frame {
        let data = (0..w * h * 3)
            .map(|i| (i as u8).wrapping_mul(7).wrapping_add(shift))
            .collect();
        Frame::new(w, h, data).unwrap()
    }

    fn encode(frames: &[Frame]) -> Vec<u8> {
        let mut out = Vec::new();
        encoder::encode_all(&mut out, frames).unwrap();
        out
    }

    #[test]
    fn frame_by_frame_decode() {
        let frames = vec![gradient(4, 3, 0), gradient(4, 3, 1), gradient(4, 3, 90)];
        let data = encode(&frames);

        let mut decoder = SequenceDecoder::new(data.as_slice());
        let hdr = decoder.read_header().unwrap();
        assert_eq!(hdr.frame_count, 3);

        let mut count = 0;
        while let Some(frame) = decoder.decode_frame().unwrap() {
            assert_eq!(frame, frames[count]);
            count += 1;
        }
        assert_eq!(count, 3);
        assert_eq!(decoder.frames_decoded(), 3);
        assert_eq!(decoder.bytes_read(), data.len() as u64);
        assert_eq!(decoder.clipped_channels(), 0);
        assert!(decoder.decode_frame().unwrap().is_none());
    }

    #[test]
    fn decode_to_vec_sink() {
        let frames = vec![gradient(2, 2, 5), gradient(2, 2, 6)];
        let data = encode(&frames);
        let mut out: Vec<Frame> = Vec::new();
        let n = SequenceDecoder::new(data.as_slice())
            .decode_to(&mut out)
            .unwrap();
        assert_eq!(n, 2);
        assert_eq!(out, frames);
    }

    #[test]
    fn reset_reads_concatenated_containers() {
        let a = vec![gradient(2, 1, 0)];
        let b = vec![gradient(1, 1, 3), gradient(1, 1, 4)];
        let mut data = encode(&a);
        data.extend_from_slice(&encode(&b));

        let mut decoder = SequenceDecoder::new(data.as_slice());
        let mut first: Vec<Frame> = Vec::new();
        decoder.decode_to(&mut first).unwrap();
        assert_eq!(first, a);

        decoder.reset();
        let mut second: Vec<Frame> = Vec::new();
        decoder.decode_to(&mut second).unwrap();
        assert_eq!(second, b);
    }

    #[test]
    fn strict_policy_flags_out_of_range_sum() {
        // One 1x1 frame whose first delta is +300 via an escape.
        let mut data = Vec::new();
        ContainerHeader::new(1, crate::frame::FrameDims::new(1, 1))
            .encode(&mut data)
            .unwrap();
        header::write_record(&mut data, &[0x80, 0x00], &300i16.to_le_bytes()).unwrap();

        let clamped = decode_all(&data).unwrap();
        assert_eq!(clamped[0].pixel(0, 0), Some([255, 0, 0]));

        let err = decode_all_with(
            &data,
            DecodeOptions {
                clip_policy: ClipPolicy::Strict,
            },
        )
        .unwrap_err();
        assert_eq!(
            err.as_format(),
            Some(&FormatError::OutOfRange {
                frame: 0,
                index: 0,
                value: 300
            })
        );
    }

    #[test]
    fn inspect_reports_record_sizes() {
        let mut second = gradient(3, 2, 0);
        second.set_pixel(1, 1, [0, 0, 0]);
        let frames = vec![gradient(3, 2, 0), second];
        let data = encode(&frames);

        let info = inspect(data.as_slice()).unwrap();
        assert_eq!(info.header.frame_count, 2);
        assert_eq!(info.records.len(), 2);
        assert_eq!(info.total_len, data.len() as u64);
        assert_eq!(info.raw_len(), 36);
        for r in &info.records {
            assert_eq!(r.bitstream_len, 9);
            assert_eq!(r.side_len as usize, r.escapes * 2);
        }
        // First frame vs zero reference: only samples 0 and 7 fit directly.
        assert_eq!(info.records[0].escapes, 16);
        // Second frame: the zeroed pixel's three channels drop by 84, 91, 98.
        assert_eq!(info.records[1].escapes, 3);
        assert_eq!(info.total_escapes(), 19);
    }

    #[test]
    fn empty_input_is_truncated_header() {
        let err = decode_all(&[]).unwrap_err();
        assert_eq!(err.as_format(), Some(&FormatError::TruncatedHeader));
    }
}
