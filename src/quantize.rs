// Copyright 2025 Brian Langenberger
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! For converting 16-bit linear samples to codes and back
//!
//! Depths of 8 bits and below are uniform scalar quantization
//! of the sample's offset-binary value with no dithering:
//!
//! ```text
//! code   = floor((sample + 32768) / 65536 * 2^depth)
//! sample = code / 2^depth * 65536 - 32768
//! ```
//!
//! which reduces to keeping the top `depth` bits of
//! `sample + 32768`, so 8-bit codes are the ordinary
//! unsigned 8-bit WAVE samples.
//! The scale is `2^depth` rather than `2^depth - 1`,
//! which puts silence on code `2^(depth - 1)`.
//! A 16-bit depth stores the sample's two's-complement bits unchanged
//! and a 24-bit depth widens the sample with a zero low byte,
//! so both round-trip losslessly.

use crate::Error;
use crate::depth::BitDepth;
use crate::pack::{Code, PackedStream, pack, unpack_all};

const OFFSET: i32 = 1 << 15;

/// Quantizes a single linear sample to a code of the given depth
///
/// # Example
/// ```
/// use pcm_depth::{depth::BitDepth, quantize::quantize};
///
/// assert_eq!(quantize(0, BitDepth::Four), 8);
/// assert_eq!(quantize(i16::MIN, BitDepth::Two), 0);
/// assert_eq!(quantize(i16::MAX, BitDepth::Two), 3);
/// assert_eq!(quantize(-1, BitDepth::Sixteen), 0xFFFF);
/// assert_eq!(quantize(-1, BitDepth::TwentyFour), 0xFFFF00);
/// ```
#[inline]
pub fn quantize(sample: i16, depth: BitDepth) -> Code {
    match depth {
        BitDepth::Sixteen => u32::from(sample as u16),
        BitDepth::TwentyFour => ((i32::from(sample) << 8) as u32) & BitDepth::TwentyFour.max_code(),
        depth => ((i32::from(sample) + OFFSET) as u32) >> (16 - depth.bits()),
    }
}

/// Reconstructs a linear sample from a code of the given depth
///
/// Bits of the code above `depth` are ignored.
///
/// # Example
/// ```
/// use pcm_depth::{depth::BitDepth, quantize::dequantize};
///
/// assert_eq!(dequantize(8, BitDepth::Four), 0);
/// assert_eq!(dequantize(0, BitDepth::One), i16::MIN);
/// assert_eq!(dequantize(0xFFFF, BitDepth::Sixteen), -1);
/// assert_eq!(dequantize(0xFFFF00, BitDepth::TwentyFour), -1);
/// ```
#[inline]
pub fn dequantize(code: Code, depth: BitDepth) -> i16 {
    match depth {
        BitDepth::Sixteen => code as u16 as i16,
        // move the 24-bit sign to bit 31 and shift back down
        BitDepth::TwentyFour => (((code << 8) as i32) >> 16) as i16,
        depth => {
            let step = 1 << (16 - depth.bits());
            let value = (code & depth.max_code()) as i32 * step - OFFSET;
            value.clamp(i16::MIN.into(), i16::MAX.into()) as i16
        }
    }
}

/// Reconstructs a code as a float in the range `[-1.0, 1.0)`
///
/// This is the full-precision path used for comparisons,
/// as opposed to the 8-bit playback preview.
#[inline]
pub fn dequantize_float(code: Code, depth: BitDepth) -> f32 {
    match depth {
        BitDepth::TwentyFour => (((code << 8) as i32) >> 8) as f32 / (1 << 23) as f32,
        depth => f32::from(dequantize(code, depth)) / OFFSET as f32,
    }
}

/// Quantizes and packs a run of linear samples
///
/// # Errors
///
/// Passes through any error from [`pack`].
pub fn encode_samples(samples: &[i16], depth: BitDepth) -> Result<PackedStream, Error> {
    pack(
        &samples
            .iter()
            .map(|s| quantize(*s, depth))
            .collect::<Vec<_>>(),
        depth,
    )
}

/// Unpacks and dequantizes every whole code in a stream
///
/// # Errors
///
/// Passes through any error from [`unpack_all`].
pub fn decode_samples(stream: &PackedStream, depth: BitDepth) -> Result<Vec<i16>, Error> {
    Ok(unpack_all(stream, depth)?
        .into_iter()
        .map(|c| dequantize(c, depth))
        .collect())
}

/// Unpacks every whole code in a stream as normalized floats
///
/// # Errors
///
/// Passes through any error from [`unpack_all`].
pub fn decode_floats(stream: &PackedStream, depth: BitDepth) -> Result<Vec<f32>, Error> {
    Ok(unpack_all(stream, depth)?
        .into_iter()
        .map(|c| dequantize_float(c, depth))
        .collect())
}

#[test]
fn test_silence() {
    assert_eq!(quantize(0, BitDepth::One), 1);
    assert_eq!(quantize(0, BitDepth::Two), 2);
    assert_eq!(quantize(0, BitDepth::Four), 8);
    assert_eq!(quantize(0, BitDepth::Eight), 128);

    // one 4-bit step is 4096, so silence must come back within half of one
    assert!(dequantize(quantize(0, BitDepth::Four), BitDepth::Four).abs() <= 2048);
}

#[test]
fn test_codes_in_range() {
    for depth in BitDepth::ALL {
        for sample in i16::MIN..=i16::MAX {
            assert!(quantize(sample, depth) <= depth.max_code());
        }
    }
}

#[test]
fn test_within_one_step() {
    for depth in [BitDepth::One, BitDepth::Two, BitDepth::Four, BitDepth::Eight] {
        let step = 1i32 << (16 - depth.bits());
        for sample in i16::MIN..=i16::MAX {
            let restored = dequantize(quantize(sample, depth), depth);
            let error = i32::from(sample) - i32::from(restored);
            assert!((0..step).contains(&error));
        }
    }

    for depth in [BitDepth::Sixteen, BitDepth::TwentyFour] {
        for sample in i16::MIN..=i16::MAX {
            assert_eq!(dequantize(quantize(sample, depth), depth), sample);
        }
    }
}

#[test]
fn test_eight_bit_is_unsigned_wave() {
    for sample in i16::MIN..=i16::MAX {
        assert_eq!(
            quantize(sample, BitDepth::Eight),
            ((i32::from(sample) + 32768) / 256) as u32
        );
    }
}

#[test]
fn test_monotonic() {
    for depth in BitDepth::ALL {
        let mut previous = f32::NEG_INFINITY;
        for sample in (i16::MIN..=i16::MAX).step_by(7) {
            let f = dequantize_float(quantize(sample, depth), depth);
            assert!(f >= previous);
            assert!((-1.0..1.0).contains(&f));
            previous = f;
        }
    }
}

#[test]
fn test_float_path_matches_integer_path() {
    for depth in BitDepth::ALL {
        for sample in (i16::MIN..=i16::MAX).step_by(13) {
            let code = quantize(sample, depth);
            assert_eq!(
                dequantize_float(code, depth),
                f32::from(dequantize(code, depth)) / 32768.0
            );
        }
    }
}
