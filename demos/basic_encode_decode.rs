use twopfx::codec::{SequenceDecoder, decoder, encoder};
use twopfx::frame::Frame;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // A still 64x48 scene with a small square drifting right one pixel per frame.
    let mut frames = Vec::new();
    for i in 0..10u32 {
        let mut frame = Frame::filled(64, 48, [30, 60, 90])?;
        for y in 20..28 {
            for x in 10 + i..18 + i {
                frame.set_pixel(x, y, [250, 200, 40]);
            }
        }
        frames.push(frame);
    }

    let mut container = Vec::new();
    let summary = encoder::encode_all(&mut container, &frames)?;

    let restored = decoder::decode_all(&container)?;
    assert_eq!(restored, frames);

    let raw: usize = frames.iter().map(|f| f.as_bytes().len()).sum();
    println!(
        "encoded {} frames, {raw} raw bytes -> container {} bytes ({} escapes)",
        summary.frames, summary.bytes_written, summary.escapes
    );

    // Frame-at-a-time decoding keeps one frame in memory.
    let mut dec = SequenceDecoder::new(container.as_slice());
    while let Some(frame) = dec.decode_frame()? {
        println!(
            "frame {:>2}: pixel (14,24) = {:?}",
            dec.frames_decoded() - 1,
            frame.pixel(14, 24)
        );
    }

    Ok(())
}
