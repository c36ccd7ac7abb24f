// 2PFX sequence encoder.
//
// For each frame: delta against the reference -> 4-bit symbols (+ side
// channel for escapes) -> nibble-packed record. The reference then becomes
// the input frame itself, so the encoder never clips.
//
// The header is written lazily with the first frame; every frame is
// validated before any of its bytes reach the writer.

use std::io::Write;

use super::bitpack;
use super::delta;
use super::header::{self, ContainerHeader, MAX_SAMPLES};
use crate::frame::{Frame, FrameDims, FrameError, ReferenceState};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    #[error("no frames to encode")]
    EmptySequence,
    #[error("invalid frame: {0}")]
    InvalidFrame(#[from] FrameError),
    #[error("frame {index}: dimensions {actual} differ from sequence dimensions {expected}")]
    DimensionMismatch {
        index: usize,
        expected: FrameDims,
        actual: FrameDims,
    },
    #[error("sequence declared {declared} frames but {written} were written")]
    FrameCountMismatch { declared: u32, written: u32 },
    #[error("too many frames: {0} exceeds the declared or representable frame count")]
    TooManyFrames(usize),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl EncodeError {
    /// `true` for errors caused by the caller's frames rather than storage.
    pub fn is_invalid_input(&self) -> bool {
        !matches!(self, Self::Io(_))
    }
}

/// Totals for a finished sequence.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EncodeSummary {
    pub frames: u32,
    /// Container bytes written, header included.
    pub bytes_written: u64,
    /// Escape symbols across all frames.
    pub escapes: u64,
}

// ---------------------------------------------------------------------------
// SequenceEncoder
// ---------------------------------------------------------------------------

/// Encoding session producing one 2PFX container.
///
/// The frame count is part of the header, so it is fixed up front;
/// [`finish`](Self::finish) fails if fewer frames arrived.
///
/// # Example
/// ```no_run
/// use twopfx::codec::encoder::SequenceEncoder;
/// use twopfx::frame::{Frame, FrameDims};
///
/// let frame = Frame::filled(4, 4, [10, 20, 30]).unwrap();
/// let mut out = Vec::new();
/// let mut enc = SequenceEncoder::new(&mut out, FrameDims::new(4, 4), 1).unwrap();
/// enc.write_frame(&frame).unwrap();
/// enc.finish().unwrap();
/// ```
pub struct SequenceEncoder<W: Write> {
    writer: W,
    header: ContainerHeader,
    header_written: bool,
    reference: ReferenceState,
    deltas: Vec<i16>,
    bitstream: Vec<u8>,
    side: Vec<u8>,
    frames_written: u32,
    bytes_written: u64,
    escapes: u64,
}

impl<W: Write> SequenceEncoder<W> {
    /// Start a sequence of `frame_count` frames of size `dims`.
    pub fn new(writer: W, dims: FrameDims, frame_count: u32) -> Result<Self, EncodeError> {
        let samples = check_geometry(dims, frame_count)?;
        Ok(Self {
            writer,
            header: ContainerHeader::new(frame_count, dims),
            header_written: false,
            reference: ReferenceState::zeroed(samples),
            deltas: vec![0; samples],
            bitstream: Vec::with_capacity(bitpack::packed_len(samples)),
            side: Vec::new(),
            frames_written: 0,
            bytes_written: 0,
            escapes: 0,
        })
    }

    /// Encode the next frame and write its record. Returns the record size.
    pub fn write_frame(&mut self, frame: &Frame) -> Result<u64, EncodeError> {
        if frame.dims() != self.header.dims {
            return Err(EncodeError::DimensionMismatch {
                index: self.frames_written as usize,
                expected: self.header.dims,
                actual: frame.dims(),
            });
        }
        if self.frames_written >= self.header.frame_count {
            return Err(EncodeError::TooManyFrames(
                self.frames_written as usize + 1,
            ));
        }

        if !self.header_written {
            self.header.encode(&mut self.writer)?;
            self.header_written = true;
            self.bytes_written += header::HEADER_LEN as u64;
            log::trace!(
                "2pfx encoder: header written ({} frames, {})",
                self.header.frame_count,
                self.header.dims
            );
        }

        let pixels = frame.as_bytes();
        delta::compute_delta(pixels, self.reference.as_slice(), &mut self.deltas);
        let escapes = bitpack::pack_deltas(&self.deltas, &mut self.bitstream, &mut self.side);
        let record_len = header::write_record(&mut self.writer, &self.bitstream, &self.side)?;
        self.reference.load_frame(pixels);

        log::debug!(
            "frame {}: bitstream {} B, side channel {} B, {escapes} escapes",
            self.frames_written,
            self.bitstream.len(),
            self.side.len()
        );

        self.frames_written += 1;
        self.bytes_written += record_len;
        self.escapes += escapes as u64;
        Ok(record_len)
    }

    /// Check that every declared frame was written, flush, and return the
    /// writer with the sequence totals.
    pub fn finish(mut self) -> Result<(W, EncodeSummary), EncodeError> {
        let summary = self.complete()?;
        Ok((self.writer, summary))
    }

    /// Close the current sequence and start another on the same writer.
    ///
    /// The current sequence must be complete. The reference returns to
    /// all-zero.
    pub fn reset(
        &mut self,
        dims: FrameDims,
        frame_count: u32,
    ) -> Result<EncodeSummary, EncodeError> {
        let samples = check_geometry(dims, frame_count)?;
        let summary = self.complete()?;
        log::trace!("2pfx encoder: reset after {} frames", summary.frames);

        self.header = ContainerHeader::new(frame_count, dims);
        self.header_written = false;
        if self.reference.len() == samples {
            self.reference.reset();
        } else {
            self.reference = ReferenceState::zeroed(samples);
            self.deltas = vec![0; samples];
        }
        self.frames_written = 0;
        self.bytes_written = 0;
        self.escapes = 0;
        Ok(summary)
    }

    fn complete(&mut self) -> Result<EncodeSummary, EncodeError> {
        if self.frames_written != self.header.frame_count {
            return Err(EncodeError::FrameCountMismatch {
                declared: self.header.frame_count,
                written: self.frames_written,
            });
        }
        self.writer.flush()?;
        Ok(EncodeSummary {
            frames: self.frames_written,
            bytes_written: self.bytes_written,
            escapes: self.escapes,
        })
    }

    pub fn dims(&self) -> FrameDims {
        self.header.dims
    }

    pub fn frames_written(&self) -> u32 {
        self.frames_written
    }

    /// Container bytes written so far.
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    /// Escape symbols emitted so far.
    pub fn escapes(&self) -> u64 {
        self.escapes
    }
}

/// Check a sequence's geometry and frame count before any output exists.
///
/// Returns the per-frame sample count.
pub fn check_geometry(dims: FrameDims, frame_count: u32) -> Result<usize, EncodeError> {
    if frame_count == 0 {
        return Err(EncodeError::EmptySequence);
    }
    let samples = dims.checked_sample_count()?;
    if samples > MAX_SAMPLES {
        return Err(FrameError::TooLarge {
            width: dims.width,
            height: dims.height,
        }
        .into());
    }
    Ok(samples)
}

// ---------------------------------------------------------------------------
// Convenience function
// ---------------------------------------------------------------------------

/// Encode a whole sequence.
///
/// The sequence is validated (non-empty, uniform dimensions) before anything
/// is written.
pub fn encode_all<W: Write>(writer: W, frames: &[Frame]) -> Result<EncodeSummary, EncodeError> {
    let (dims, frame_count) = check_sequence(frames)?;
    let mut encoder = SequenceEncoder::new(writer, dims, frame_count)?;
    for frame in frames {
        encoder.write_frame(frame)?;
    }
    let (_, summary) = encoder.finish()?;
    Ok(summary)
}

/// Validate a whole in-memory sequence: non-empty, countable in u32, uniform
/// dimensions, representable geometry. Returns the dimensions and frame count.
pub fn check_sequence(frames: &[Frame]) -> Result<(FrameDims, u32), EncodeError> {
    let first = frames.first().ok_or(EncodeError::EmptySequence)?;
    let frame_count =
        u32::try_from(frames.len()).map_err(|_| EncodeError::TooManyFrames(frames.len()))?;
    let dims = first.dims();
    if let Some((index, f)) = frames.iter().enumerate().find(|(_, f)| f.dims() != dims) {
        return Err(EncodeError::DimensionMismatch {
            index,
            expected: dims,
            actual: f.dims(),
        });
    }
    check_geometry(dims, frame_count)?;
    Ok((dims, frame_count))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::header::{HEADER_LEN, MAGIC};

    #[test]
    fn empty_sequence_rejected() {
        let mut out = Vec::new();
        let err = encode_all(&mut out, &[]).unwrap_err();
        assert!(matches!(err, EncodeError::EmptySequence));
        assert!(err.is_invalid_input());
        assert!(out.is_empty());
    }

    #[test]
    fn mismatched_dimensions_rejected_before_writing() {
        let frames = vec![
            Frame::filled(2, 2, [0, 0, 0]).unwrap(),
            Frame::filled(2, 2, [1, 1, 1]).unwrap(),
            Frame::filled(3, 2, [1, 1, 1]).unwrap(),
        ];
        let mut out = Vec::new();
        let err = encode_all(&mut out, &frames).unwrap_err();
        assert!(matches!(
            err,
            EncodeError::DimensionMismatch { index: 2, .. }
        ));
        assert!(out.is_empty());
    }

    #[test]
    fn header_written_with_first_frame() {
        let frame = Frame::filled(2, 1, [9, 9, 9]).unwrap();
        let mut out = Vec::new();
        let mut enc = SequenceEncoder::new(&mut out, frame.dims(), 1).unwrap();
        assert_eq!(enc.bytes_written(), 0);
        enc.write_frame(&frame).unwrap();
        let (_, summary) = enc.finish().unwrap();
        assert_eq!(summary.frames, 1);
        assert_eq!(summary.escapes, 6);
        assert_eq!(&out[..4], &MAGIC);
        assert_eq!(summary.bytes_written, out.len() as u64);
        // header + prefix + ceil(6/2) + 6 escapes * 2
        assert_eq!(out.len(), HEADER_LEN + 8 + 3 + 12);
    }

    #[test]
    fn finish_requires_declared_frame_count() {
        let frame = Frame::filled(1, 1, [0, 0, 0]).unwrap();
        let mut enc = SequenceEncoder::new(Vec::new(), frame.dims(), 2).unwrap();
        enc.write_frame(&frame).unwrap();
        let err = enc.finish().unwrap_err();
        assert!(matches!(
            err,
            EncodeError::FrameCountMismatch {
                declared: 2,
                written: 1
            }
        ));
    }

    #[test]
    fn extra_frame_rejected_without_output() {
        let frame = Frame::filled(1, 1, [0, 0, 0]).unwrap();
        let mut enc = SequenceEncoder::new(Vec::new(), frame.dims(), 1).unwrap();
        enc.write_frame(&frame).unwrap();
        let before = enc.bytes_written();
        assert!(matches!(
            enc.write_frame(&frame),
            Err(EncodeError::TooManyFrames(2))
        ));
        assert_eq!(enc.bytes_written(), before);
    }

    #[test]
    fn wrong_size_frame_rejected_in_session() {
        let mut enc = SequenceEncoder::new(Vec::new(), FrameDims::new(2, 2), 1).unwrap();
        let other = Frame::filled(1, 2, [0, 0, 0]).unwrap();
        assert!(matches!(
            enc.write_frame(&other),
            Err(EncodeError::DimensionMismatch { index: 0, .. })
        ));
        assert_eq!(enc.bytes_written(), 0);
    }

    #[test]
    fn zero_frame_count_rejected() {
        assert!(matches!(
            SequenceEncoder::new(Vec::new(), FrameDims::new(1, 1), 0),
            Err(EncodeError::EmptySequence)
        ));
    }

    #[test]
    fn reset_starts_fresh_container() {
        let a = Frame::filled(1, 1, [100, 100, 100]).unwrap();
        let mut enc = SequenceEncoder::new(Vec::new(), a.dims(), 1).unwrap();
        enc.write_frame(&a).unwrap();
        let first = enc.reset(a.dims(), 1).unwrap();
        enc.write_frame(&a).unwrap();
        let (out, second) = enc.finish().unwrap();

        // The reference was zeroed, so both containers are byte-identical.
        assert_eq!(first, second);
        let half = out.len() / 2;
        assert_eq!(&out[..half], &out[half..]);
    }
}
