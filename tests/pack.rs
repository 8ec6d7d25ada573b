// Copyright 2025 Brian Langenberger
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use pcm_depth::{
    Error,
    depth::BitDepth,
    pack::{pack, packed_len, unpack, unpack_all},
    quantize::{decode_samples, dequantize, encode_samples, quantize},
};

#[test]
fn test_random_roundtrip() {
    for depth in BitDepth::ALL {
        for _ in 0..50 {
            let codes = std::iter::repeat_with(|| fastrand::u32(0..=depth.max_code()))
                .take(fastrand::usize(0..500))
                .collect::<Vec<_>>();

            let stream = pack(&codes, depth).unwrap();
            assert_eq!(stream.len(), packed_len(codes.len(), depth));
            assert_eq!(unpack(&stream, depth, codes.len()).unwrap(), codes);
        }
    }
}

#[test]
fn test_three_two_bit_codes() {
    let stream = pack(&[3, 0, 2], BitDepth::Two).unwrap();
    assert_eq!(stream.len(), 1);
    assert_eq!(stream.as_bytes(), [0b00_10_00_11]);
    assert_eq!(unpack_all(&stream, BitDepth::Two).unwrap(), [3, 0, 2]);
    assert!(matches!(
        unpack(&stream, BitDepth::Two, 4),
        Err(Error::TruncatedStream)
    ));
}

#[test]
fn test_random_samples_within_one_step() {
    for depth in BitDepth::ALL {
        let step = 1i32 << (16u32.saturating_sub(depth.bits()));

        let samples = std::iter::repeat_with(|| fastrand::i16(..))
            .take(1000)
            .collect::<Vec<_>>();

        let decoded = decode_samples(&encode_samples(&samples, depth).unwrap(), depth).unwrap();
        assert!(decoded.len() >= samples.len());

        for (s, d) in samples.iter().zip(&decoded) {
            assert!((i32::from(*s) - i32::from(*d)).abs() < step);
        }
    }
}

#[test]
fn test_silence_at_four_bits() {
    assert_eq!(quantize(0, BitDepth::Four), 8);
    assert!(dequantize(8, BitDepth::Four).abs() <= 2048);
}
