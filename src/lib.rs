//! twopfx: the 2PFX lossless temporal-delta codec for RGB frame sequences.
//!
//! Every frame after the first is stored as the per-channel difference from
//! the previous frame. Small differences become 4-bit symbols packed two per
//! byte; larger ones escape to a 16-bit side channel.
//!
//! The crate provides:
//! - Frame and reference buffers (`frame`)
//! - The codec itself (`codec`)
//! - File-oriented helpers (`io`)
//! - An optional CLI (`cli` feature)
//!
//! # Quick Start
//!
//! ```no_run
//! use twopfx::codec::{decode_all, encode_all};
//! use twopfx::frame::Frame;
//!
//! let first = Frame::filled(2, 2, [80, 140, 220]).unwrap();
//! let mut second = first.clone();
//! second.set_pixel(0, 0, [81, 140, 220]);
//!
//! let frames = vec![first, second];
//! let mut container = Vec::new();
//! encode_all(&mut container, &frames).unwrap();
//! assert_eq!(decode_all(&container).unwrap(), frames);
//! ```
//!
//! # Limitations
//!
//! Reconstruction clamps to `0..=255` while carrying the unclipped sum
//! forward as the reference. Streams produced by the encoder from 8-bit
//! frames never need clamping; see [`codec::ClipPolicy`] to turn any
//! clamping into a hard error instead.

pub mod codec;
pub mod frame;
pub mod io;

#[cfg(feature = "cli")]
pub mod cli;
