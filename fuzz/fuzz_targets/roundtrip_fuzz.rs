#![no_main]
use libfuzzer_sys::fuzz_target;
use twopfx::codec::{decoder, encoder};
use twopfx::frame::Frame;

fuzz_target!(|data: &[u8]| {
    if data.len() < 3 {
        return;
    }

    // First two bytes pick the geometry; the rest is pixel data.
    let w = u32::from(data[0] % 16) + 1;
    let h = u32::from(data[1] % 16) + 1;
    let frame_len = (w * h * 3) as usize;
    let frames: Vec<Frame> = data[2..]
        .chunks_exact(frame_len)
        .map(|chunk| Frame::new(w, h, chunk.to_vec()).unwrap())
        .collect();
    if frames.is_empty() {
        return;
    }

    let mut container = Vec::new();
    encoder::encode_all(&mut container, &frames).unwrap();
    let decoded = decoder::decode_all(&container).unwrap();
    assert_eq!(decoded, frames);
});
