#![no_main]
use libfuzzer_sys::fuzz_target;
use twopfx::codec::{SequenceDecoder, SequenceEncoder};
use twopfx::frame::{Frame, FrameDims};

fuzz_target!(|data: &[u8]| {
    if data.len() < 4 {
        return;
    }

    // Two sequences of different geometry on one encoder, split by data[2].
    let dims_a = FrameDims::new(u32::from(data[0] % 8) + 1, 1);
    let dims_b = FrameDims::new(1, u32::from(data[1] % 8) + 1);
    let payload = &data[3..];
    let split = (data[2] as usize).min(payload.len());
    let (a, b) = payload.split_at(split);

    let frames = |dims: FrameDims, bytes: &[u8]| -> Vec<Frame> {
        bytes
            .chunks_exact(dims.width as usize * dims.height as usize * 3)
            .map(|c| Frame::new(dims.width, dims.height, c.to_vec()).unwrap())
            .collect()
    };
    let seq_a = frames(dims_a, a);
    let seq_b = frames(dims_b, b);
    if seq_a.is_empty() || seq_b.is_empty() {
        return;
    }

    let mut enc = SequenceEncoder::new(Vec::new(), dims_a, seq_a.len() as u32).unwrap();
    for f in &seq_a {
        enc.write_frame(f).unwrap();
    }
    enc.reset(dims_b, seq_b.len() as u32).unwrap();
    for f in &seq_b {
        enc.write_frame(f).unwrap();
    }
    let (container, _) = enc.finish().unwrap();

    let mut dec = SequenceDecoder::new(container.as_slice());
    let mut out_a: Vec<Frame> = Vec::new();
    dec.decode_to(&mut out_a).unwrap();
    dec.reset();
    let mut out_b: Vec<Frame> = Vec::new();
    dec.decode_to(&mut out_b).unwrap();
    assert_eq!(out_a, seq_a);
    assert_eq!(out_b, seq_b);
});
