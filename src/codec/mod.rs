// 2PFX codec: lossless temporal deltas for RGB frame sequences.
//
// # Modules
//
// - `delta`  : Delta engine and frame reconstructor (wide i16/i32 domain)
// - `symbol` : 4-bit symbol mapping with escape + side channel
// - `bitpack`: Two-symbols-per-byte packing and bounded unpacking
// - `header` : Container header and per-frame record layout
// - `encoder`: SequenceEncoder: frame-by-frame container writer
// - `decoder`: SequenceDecoder: frame-by-frame container reader

pub mod bitpack;
pub mod decoder;
pub mod delta;
pub mod encoder;
pub mod header;
pub mod symbol;

// Re-export key types for convenience.
pub use decoder::{
    ContainerInfo, DecodeError, DecodeOptions, FormatError, RecordInfo, SequenceDecoder,
    decode_all, decode_all_with, inspect,
};
pub use delta::ClipPolicy;
pub use encoder::{EncodeError, EncodeSummary, SequenceEncoder, encode_all};
pub use header::{ContainerHeader, MAGIC};
