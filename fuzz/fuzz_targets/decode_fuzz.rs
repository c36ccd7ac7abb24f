#![no_main]
use libfuzzer_sys::fuzz_target;
use twopfx::codec::decoder::{self, DecodeOptions};
use twopfx::codec::ClipPolicy;

fuzz_target!(|data: &[u8]| {
    // Arbitrary bytes must only ever produce errors, never panics.
    let _ = decoder::decode_all(data);
    let _ = decoder::decode_all_with(
        data,
        DecodeOptions {
            clip_policy: ClipPolicy::Strict,
        },
    );
    let _ = decoder::inspect(data);
});
