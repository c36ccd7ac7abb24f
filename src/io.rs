// File-level I/O helpers for 2PFX containers.
//
// Provides in-memory `encode_file()` / `decode_file()` for callers that
// already hold frames, and streaming `encode_raw_file()` /
// `decode_to_raw_file()` that move one frame at a time between a raw RGB24
// file (frames concatenated, row-major) and a container. Optionally
// computes streaming SHA-256 checksums (feature-gated behind `file-io`).

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

#[cfg(feature = "file-io")]
use sha2::Digest;

use crate::codec::decoder::{DecodeError, DecodeOptions, SequenceDecoder};
use crate::codec::encoder::{self, EncodeError, EncodeSummary, SequenceEncoder};
use crate::frame::{Frame, FrameDims, FrameError, FrameSink};

// ---------------------------------------------------------------------------
// Stats
// ---------------------------------------------------------------------------

/// Statistics returned by the encode helpers.
#[derive(Debug, Clone)]
pub struct EncodeStats {
    pub frames: u32,
    pub dims: FrameDims,
    /// Raw RGB bytes consumed.
    pub raw_size: u64,
    /// Container bytes written.
    pub container_size: u64,
    /// Escape symbols across all frames.
    pub escapes: u64,
    /// SHA-256 of the container (if `file-io` feature is enabled).
    pub container_sha256: Option<[u8; 32]>,
}

impl EncodeStats {
    /// Raw size divided by container size.
    pub fn ratio(&self) -> f64 {
        if self.container_size == 0 {
            return 0.0;
        }
        self.raw_size as f64 / self.container_size as f64
    }
}

/// Statistics returned by the decode helpers.
#[derive(Debug, Clone)]
pub struct DecodeStats {
    pub frames: u32,
    pub dims: FrameDims,
    /// Container bytes consumed.
    pub container_size: u64,
    /// Raw RGB bytes produced.
    pub raw_size: u64,
    pub escapes: u64,
    /// Samples clamped into 0..=255 during reconstruction.
    pub clipped_channels: u64,
    /// SHA-256 of the decoded raw pixels (if `file-io` feature is enabled).
    pub raw_sha256: Option<[u8; 32]>,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Error type for file I/O operations.
#[derive(Debug, thiserror::Error)]
pub enum IoError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("encode error: {0}")]
    Encode(#[from] EncodeError),
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),
    #[error("raw input of {len} bytes is not a whole number of {frame_len}-byte frames")]
    RawLength { len: u64, frame_len: usize },
}

impl From<FrameError> for IoError {
    fn from(e: FrameError) -> Self {
        Self::Encode(EncodeError::InvalidFrame(e))
    }
}

// ---------------------------------------------------------------------------
// Default buffer size
// ---------------------------------------------------------------------------

const BUF_SIZE: usize = 64 * 1024; // 64 KiB

// ---------------------------------------------------------------------------
// Raw RGB24 frames
// ---------------------------------------------------------------------------

/// Read a raw RGB24 file into frames of size `dims`.
pub fn read_raw_frames(path: &Path, dims: FrameDims) -> Result<Vec<Frame>, IoError> {
    let frame_len = dims.checked_sample_count()?;
    let data = std::fs::read(path)?;
    if data.len() % frame_len != 0 {
        return Err(IoError::RawLength {
            len: data.len() as u64,
            frame_len,
        });
    }
    data.chunks_exact(frame_len)
        .map(|chunk| Frame::new(dims.width, dims.height, chunk.to_vec()).map_err(IoError::from))
        .collect()
}

/// Write frames back-to-back as raw RGB24.
pub fn write_raw_frames(path: &Path, frames: &[Frame]) -> Result<u64, IoError> {
    let file = File::create(path)?;
    let mut sink = RawFrameWriter::new(BufWriter::with_capacity(BUF_SIZE, file));
    for frame in frames {
        sink.accept(frame.clone())?;
    }
    let (mut writer, bytes) = sink.into_inner();
    writer.flush()?;
    Ok(bytes)
}

/// [`FrameSink`] that writes each frame's pixels straight to a writer.
pub struct RawFrameWriter<W: Write> {
    inner: W,
    bytes: u64,
}

impl<W: Write> RawFrameWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner, bytes: 0 }
    }

    /// Bytes written so far.
    pub fn bytes_written(&self) -> u64 {
        self.bytes
    }

    pub fn into_inner(self) -> (W, u64) {
        (self.inner, self.bytes)
    }
}

impl<W: Write> FrameSink for RawFrameWriter<W> {
    type Error = io::Error;

    fn accept(&mut self, frame: Frame) -> io::Result<()> {
        self.inner.write_all(frame.as_bytes())?;
        self.bytes += frame.as_bytes().len() as u64;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// encode
// ---------------------------------------------------------------------------

/// Encode in-memory frames into a container at `output_path`.
///
/// The sequence is validated before the output is created, and a partially
/// written output is removed on error.
pub fn encode_file(frames: &[Frame], output_path: &Path) -> Result<EncodeStats, IoError> {
    let (dims, _) = encoder::check_sequence(frames)?;
    let raw_size = frames.iter().map(|f| f.as_bytes().len() as u64).sum();

    let (summary, container_sha256) =
        discard_on_error(write_frames(frames, output_path), output_path)?;
    Ok(stats_from_summary(summary, dims, raw_size, container_sha256))
}

fn write_frames(
    frames: &[Frame],
    output_path: &Path,
) -> Result<(EncodeSummary, Option<[u8; 32]>), IoError> {
    let file = File::create(output_path)?;
    let writer = BufWriter::with_capacity(BUF_SIZE, file);

    #[cfg(feature = "file-io")]
    let written = {
        let mut hasher = sha2::Sha256::new();
        let summary = encoder::encode_all(
            HashingWriter {
                inner: writer,
                hasher: &mut hasher,
            },
            frames,
        )?;
        (summary, Some(hasher.finalize().into()))
    };
    #[cfg(not(feature = "file-io"))]
    let written = (encoder::encode_all(writer, frames)?, None);

    Ok(written)
}

/// Stream a raw RGB24 file through the encoder, one frame at a time.
///
/// The frame count comes from the input length, which must be a non-zero
/// multiple of the frame size. Nothing is created for invalid input, and a
/// partially written output is removed on error.
pub fn encode_raw_file(
    input_path: &Path,
    dims: FrameDims,
    output_path: &Path,
) -> Result<EncodeStats, IoError> {
    let frame_len = dims.checked_sample_count()?;

    let input = File::open(input_path)?;
    let raw_size = input.metadata()?.len();
    if raw_size % frame_len as u64 != 0 {
        return Err(IoError::RawLength {
            len: raw_size,
            frame_len,
        });
    }
    let count = raw_size / frame_len as u64;
    let frame_count =
        u32::try_from(count).map_err(|_| EncodeError::TooManyFrames(count as usize))?;
    encoder::check_geometry(dims, frame_count)?;
    let mut reader = BufReader::with_capacity(BUF_SIZE, input);

    let (summary, container_sha256) = discard_on_error(
        write_raw_stream(&mut reader, output_path, dims, frame_count),
        output_path,
    )?;
    Ok(stats_from_summary(summary, dims, raw_size, container_sha256))
}

fn write_raw_stream<R: Read>(
    reader: &mut R,
    output_path: &Path,
    dims: FrameDims,
    frame_count: u32,
) -> Result<(EncodeSummary, Option<[u8; 32]>), IoError> {
    let output = File::create(output_path)?;
    let writer = BufWriter::with_capacity(BUF_SIZE, output);

    #[cfg(feature = "file-io")]
    let written = {
        let mut hasher = sha2::Sha256::new();
        let summary = encode_stream(
            reader,
            HashingWriter {
                inner: writer,
                hasher: &mut hasher,
            },
            dims,
            frame_count,
        )?;
        (summary, Some(hasher.finalize().into()))
    };
    #[cfg(not(feature = "file-io"))]
    let written = (encode_stream(reader, writer, dims, frame_count)?, None);

    Ok(written)
}

fn encode_stream<R: Read, W: Write>(
    reader: &mut R,
    writer: W,
    dims: FrameDims,
    frame_count: u32,
) -> Result<EncodeSummary, IoError> {
    let mut encoder = SequenceEncoder::new(writer, dims, frame_count)?;
    let mut buf = vec![0u8; dims.checked_sample_count()?];
    for _ in 0..frame_count {
        reader.read_exact(&mut buf)?;
        let frame = Frame::new(dims.width, dims.height, std::mem::take(&mut buf))?;
        encoder.write_frame(&frame)?;
        buf = frame.into_bytes();
    }
    let (_, summary) = encoder.finish()?;
    Ok(summary)
}

fn stats_from_summary(
    summary: EncodeSummary,
    dims: FrameDims,
    raw_size: u64,
    container_sha256: Option<[u8; 32]>,
) -> EncodeStats {
    EncodeStats {
        frames: summary.frames,
        dims,
        raw_size,
        container_size: summary.bytes_written,
        escapes: summary.escapes,
        container_sha256,
    }
}

// ---------------------------------------------------------------------------
// decode
// ---------------------------------------------------------------------------

/// Decode a container file fully into memory.
pub fn decode_file(
    input_path: &Path,
    opts: DecodeOptions,
) -> Result<(Vec<Frame>, DecodeStats), IoError> {
    let input = File::open(input_path)?;
    let reader = BufReader::with_capacity(BUF_SIZE, input);
    let mut decoder = SequenceDecoder::with_options(reader, opts);
    let hdr = decoder.read_header()?;

    let mut frames: Vec<Frame> = Vec::new();
    decoder.decode_to(&mut frames)?;

    let raw_size = frames.iter().map(|f| f.as_bytes().len() as u64).sum();

    #[cfg(feature = "file-io")]
    let raw_sha256 = {
        let mut hasher = sha2::Sha256::new();
        for f in &frames {
            hasher.update(f.as_bytes());
        }
        Some(hasher.finalize().into())
    };
    #[cfg(not(feature = "file-io"))]
    let raw_sha256: Option<[u8; 32]> = None;

    let stats = DecodeStats {
        frames: decoder.frames_decoded(),
        dims: hdr.dims,
        container_size: decoder.bytes_read(),
        raw_size,
        escapes: decoder.escapes(),
        clipped_channels: decoder.clipped_channels(),
        raw_sha256,
    };
    Ok((frames, stats))
}

/// Decode a container file to raw RGB24, one frame at a time.
///
/// The output is only created once the container header is valid, and is
/// removed again if any later record fails to decode.
pub fn decode_to_raw_file(
    input_path: &Path,
    output_path: &Path,
    opts: DecodeOptions,
) -> Result<DecodeStats, IoError> {
    let input = File::open(input_path)?;
    let reader = BufReader::with_capacity(BUF_SIZE, input);
    let mut decoder = SequenceDecoder::with_options(reader, opts);
    let hdr = decoder.read_header()?;

    let (raw_size, raw_sha256) =
        discard_on_error(write_decoded(&mut decoder, output_path), output_path)?;

    Ok(DecodeStats {
        frames: decoder.frames_decoded(),
        dims: hdr.dims,
        container_size: decoder.bytes_read(),
        raw_size,
        escapes: decoder.escapes(),
        clipped_channels: decoder.clipped_channels(),
        raw_sha256,
    })
}

fn write_decoded<R: Read>(
    decoder: &mut SequenceDecoder<R>,
    output_path: &Path,
) -> Result<(u64, Option<[u8; 32]>), IoError> {
    let output = File::create(output_path)?;
    let mut output_writer = BufWriter::with_capacity(BUF_SIZE, output);

    #[cfg(feature = "file-io")]
    let (raw_size, raw_sha256) = {
        let mut hasher = sha2::Sha256::new();
        let mut sink = RawFrameWriter::new(HashingWriter {
            inner: &mut output_writer,
            hasher: &mut hasher,
        });
        decoder.decode_to(&mut sink)?;
        let raw_size = sink.bytes_written();
        drop(sink);
        (raw_size, Some(hasher.finalize().into()))
    };

    #[cfg(not(feature = "file-io"))]
    let (raw_size, raw_sha256) = {
        let mut sink = RawFrameWriter::new(&mut output_writer);
        decoder.decode_to(&mut sink)?;
        (sink.bytes_written(), None)
    };

    output_writer.flush()?;
    Ok((raw_size, raw_sha256))
}

/// Remove `path` when `result` failed. The writer has already been dropped.
fn discard_on_error<T>(result: Result<T, IoError>, path: &Path) -> Result<T, IoError> {
    if result.is_err() {
        let _ = std::fs::remove_file(path);
    }
    result
}

// ---------------------------------------------------------------------------
// Hashing writer (used with file-io feature)
// ---------------------------------------------------------------------------

#[cfg(feature = "file-io")]
struct HashingWriter<'a, W: Write> {
    inner: W,
    hasher: &'a mut sha2::Sha256,
}

#[cfg(feature = "file-io")]
impl<W: Write> Write for HashingWriter<'_, W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.hasher.update(&buf[..n]);
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
