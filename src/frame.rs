// Frame buffers and the codec's working reference.
//
// A `Frame` is a dense, row-major H×W grid of RGB pixels with one byte per
// channel. `ReferenceState` is the same grid held in i16 so reconstruction
// sums can leave the 8-bit range transiently without wrapping.

/// Number of channels per pixel. Only packed RGB is supported.
pub const CHANNELS: usize = 3;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FrameError {
    #[error("unsupported channel count {0} (frames must be 3-channel RGB)")]
    UnsupportedChannels(usize),
    #[error("frame dimensions must be non-zero")]
    ZeroDimension,
    #[error("pixel buffer length mismatch: expected {expected} bytes, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },
    #[error("frame dimensions {width}x{height} are too large")]
    TooLarge { width: u32, height: u32 },
}

// ---------------------------------------------------------------------------
// Dimensions
// ---------------------------------------------------------------------------

/// Frame geometry shared by every frame in a sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameDims {
    pub width: u32,
    pub height: u32,
}

impl FrameDims {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Number of channel samples (and therefore symbols) per frame: H×W×3.
    ///
    /// Returns `None` if the product does not fit in `usize`.
    pub fn sample_count(&self) -> Option<usize> {
        (self.width as usize)
            .checked_mul(self.height as usize)?
            .checked_mul(CHANNELS)
    }

    /// Like [`sample_count`](Self::sample_count) but rejects empty and
    /// oversized geometry.
    pub fn checked_sample_count(&self) -> Result<usize, FrameError> {
        if self.width == 0 || self.height == 0 {
            return Err(FrameError::ZeroDimension);
        }
        self.sample_count().ok_or(FrameError::TooLarge {
            width: self.width,
            height: self.height,
        })
    }
}

impl std::fmt::Display for FrameDims {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

// ---------------------------------------------------------------------------
// Frame
// ---------------------------------------------------------------------------

/// One RGB image: `height` rows of `width` pixels, channels in R,G,B order.
#[derive(Clone, PartialEq, Eq)]
pub struct Frame {
    dims: FrameDims,
    data: Vec<u8>,
}

impl Frame {
    /// Wrap an interleaved RGB buffer. `data.len()` must equal `width*height*3`.
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Result<Self, FrameError> {
        let dims = FrameDims::new(width, height);
        let expected = dims.checked_sample_count()?;
        if data.len() != expected {
            return Err(FrameError::LengthMismatch {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self { dims, data })
    }

    /// Wrap an interleaved buffer with an explicit channel count.
    ///
    /// Anything other than 3 channels is rejected.
    pub fn with_channels(
        width: u32,
        height: u32,
        channels: usize,
        data: Vec<u8>,
    ) -> Result<Self, FrameError> {
        if channels != CHANNELS {
            return Err(FrameError::UnsupportedChannels(channels));
        }
        Self::new(width, height, data)
    }

    /// A frame with every pixel set to `rgb`.
    pub fn filled(width: u32, height: u32, rgb: [u8; 3]) -> Result<Self, FrameError> {
        let dims = FrameDims::new(width, height);
        let n = dims.checked_sample_count()?;
        let data = rgb.iter().copied().cycle().take(n).collect();
        Ok(Self { dims, data })
    }

    /// Wrap a buffer whose length the caller has already checked.
    pub(crate) fn from_validated(dims: FrameDims, data: Vec<u8>) -> Self {
        debug_assert_eq!(dims.sample_count(), Some(data.len()));
        Self { dims, data }
    }

    pub fn dims(&self) -> FrameDims {
        self.dims
    }

    pub fn width(&self) -> u32 {
        self.dims.width
    }

    pub fn height(&self) -> u32 {
        self.dims.height
    }

    /// Interleaved channel samples, row-major.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    /// The RGB triple at column `x`, row `y`, or `None` when out of bounds.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 3]> {
        let i = self.pixel_offset(x, y)?;
        Some([self.data[i], self.data[i + 1], self.data[i + 2]])
    }

    /// Overwrite the pixel at (`x`, `y`). Returns `false` when out of bounds.
    pub fn set_pixel(&mut self, x: u32, y: u32, rgb: [u8; 3]) -> bool {
        match self.pixel_offset(x, y) {
            Some(i) => {
                self.data[i..i + CHANNELS].copy_from_slice(&rgb);
                true
            }
            None => false,
        }
    }

    fn pixel_offset(&self, x: u32, y: u32) -> Option<usize> {
        if x >= self.dims.width || y >= self.dims.height {
            return None;
        }
        Some((y as usize * self.dims.width as usize + x as usize) * CHANNELS)
    }
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("dims", &self.dims)
            .field("bytes", &self.data.len())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Reference state
// ---------------------------------------------------------------------------

/// The codec's working frame, one i16 per channel sample.
///
/// Starts all-zero. The encoder overwrites it with each input frame; the
/// decoder overwrites it with each unclipped reconstruction sum. The buffer
/// is allocated once per session and reused for every frame.
#[derive(Debug, Clone)]
pub struct ReferenceState {
    samples: Vec<i16>,
}

impl ReferenceState {
    /// An all-zero reference holding `len` channel samples.
    pub fn zeroed(len: usize) -> Self {
        Self {
            samples: vec![0; len],
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn as_slice(&self) -> &[i16] {
        &self.samples
    }

    pub fn as_mut_slice(&mut self) -> &mut [i16] {
        &mut self.samples
    }

    /// Zero every sample, ready for a new sequence.
    pub fn reset(&mut self) {
        self.samples.fill(0);
    }

    /// Replace the reference with an 8-bit frame widened to i16.
    ///
    /// `pixels` must have the same length as the reference.
    pub fn load_frame(&mut self, pixels: &[u8]) {
        debug_assert_eq!(pixels.len(), self.samples.len());
        for (r, &p) in self.samples.iter_mut().zip(pixels) {
            *r = i16::from(p);
        }
    }
}

// ---------------------------------------------------------------------------
// Frame sink
// ---------------------------------------------------------------------------

/// Receives decoded frames in sequence order.
///
/// `Vec<Frame>` collects everything in memory; other implementations can
/// write frames out as they arrive.
pub trait FrameSink {
    type Error;

    fn accept(&mut self, frame: Frame) -> Result<(), Self::Error>;
}

impl FrameSink for Vec<Frame> {
    type Error = std::convert::Infallible;

    fn accept(&mut self, frame: Frame) -> Result<(), Self::Error> {
        self.push(frame);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
