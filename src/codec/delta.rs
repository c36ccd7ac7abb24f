// Delta engine and frame reconstructor.
//
// Both operate on flat channel-sample slices in scan order (row-major,
// R,G,B within a pixel). Sums are formed in i32 so nothing wraps before
// the clip to [0, 255].

/// What the reconstructor does with a sum outside [0, 255].
///
/// Inputs produced by the encoder never leave that range; an out-of-range sum
/// means the stream was not produced from valid 8-bit frames or is corrupt.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ClipPolicy {
    /// Clamp the output sample and keep the unclipped sum as the reference.
    /// Each clamped sample is counted and logged.
    #[default]
    Clamp,
    /// Treat any out-of-range sum as a decode error.
    Strict,
}

/// An out-of-range reconstruction under [`ClipPolicy::Strict`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutOfRange {
    /// Sample index within the frame (scan order).
    pub index: usize,
    /// The unclipped sum.
    pub value: i32,
}

/// `out[i] = frame[i] - reference[i]`.
///
/// All three slices must be the same length.
pub fn compute_delta(frame: &[u8], reference: &[i16], out: &mut [i16]) {
    debug_assert_eq!(frame.len(), reference.len());
    debug_assert_eq!(frame.len(), out.len());
    for ((d, &p), &r) in out.iter_mut().zip(frame).zip(reference) {
        *d = i16::from(p).saturating_sub(r);
    }
}

/// Apply `deltas` to `reference` in place and write the clipped frame to `out`.
///
/// The reference receives the unclipped sum (saturated to i16 only for
/// malformed streams whose sums drift past the i16 range). Returns the number
/// of samples that had to be clamped.
pub fn reconstruct(
    reference: &mut [i16],
    deltas: &[i16],
    out: &mut [u8],
    policy: ClipPolicy,
) -> Result<usize, OutOfRange> {
    debug_assert_eq!(reference.len(), deltas.len());
    debug_assert_eq!(reference.len(), out.len());

    let mut clamped = 0usize;
    let samples = reference.iter_mut().zip(deltas).zip(out.iter_mut());
    for (index, ((r, &d), o)) in samples.enumerate() {
        let sum = i32::from(*r) + i32::from(d);
        if !(0..=255).contains(&sum) {
            if policy == ClipPolicy::Strict {
                return Err(OutOfRange { index, value: sum });
            }
            clamped += 1;
        }
        *o = sum.clamp(0, 255) as u8;
        *r = sum.clamp(i32::from(i16::MIN), i32::from(i16::MAX)) as i16;
    }
    Ok(clamped)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delta_against_zero_reference_is_identity() {
        let frame = [0u8, 80, 255];
        let mut out = [0i16; 3];
        compute_delta(&frame, &[0, 0, 0], &mut out);
        assert_eq!(out, [0, 80, 255]);
    }

    #[test]
    fn delta_spans_full_signed_range() {
        let frame = [0u8, 255, 60];
        let mut out = [0i16; 3];
        compute_delta(&frame, &[255, 0, 260], &mut out);
        assert_eq!(out, [-255, 255, -200]);
    }

    #[test]
    fn reconstruct_in_range() {
        let mut reference = [80i16, 140, 220];
        let mut out = [0u8; 3];
        let clamped =
            reconstruct(&mut reference, &[1, 0, -200], &mut out, ClipPolicy::Clamp).unwrap();
        assert_eq!(clamped, 0);
        assert_eq!(out, [81, 140, 20]);
        assert_eq!(reference, [81, 140, 20]);
    }

    #[test]
    fn clamp_keeps_unclipped_reference() {
        let mut reference = [250i16, 5];
        let mut out = [0u8; 2];
        let clamped =
            reconstruct(&mut reference, &[10, -10], &mut out, ClipPolicy::Clamp).unwrap();
        assert_eq!(clamped, 2);
        assert_eq!(out, [255, 0]);
        assert_eq!(reference, [260, -5]);
    }

    #[test]
    fn strict_rejects_out_of_range() {
        let mut reference = [0i16, 250];
        let mut out = [0u8; 2];
        let err = reconstruct(&mut reference, &[3, 6], &mut out, ClipPolicy::Strict).unwrap_err();
        assert_eq!(err, OutOfRange { index: 1, value: 256 });
    }

    #[test]
    fn reference_saturates_instead_of_wrapping() {
        let mut reference = [i16::MAX - 1];
        let mut out = [0u8; 1];
        reconstruct(&mut reference, &[100], &mut out, ClipPolicy::Clamp).unwrap();
        assert_eq!(reference, [i16::MAX]);
        assert_eq!(out, [255]);
    }
}
