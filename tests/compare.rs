// Copyright 2025 Brian Langenberger
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use pcm_depth::{
    Error,
    audio::Pcm,
    compare::{compare, compare_files},
    depth::BitDepth,
    resample::{FftResampler, Passthrough, Resample},
    wave::{self, Wave},
};

fn sine(sample_rate: u32, channels: u16, frames: usize) -> Pcm {
    Pcm::new(
        sample_rate,
        channels,
        (0..frames)
            .flat_map(|i| {
                let t = i as f64 / f64::from(sample_rate);
                let s = ((t * 200.0 * std::f64::consts::TAU).sin() * 0.8 * 32767.0) as i16;
                std::iter::repeat_n(s, channels.into())
            })
            .collect(),
    )
    .unwrap()
}

#[test]
fn test_snr_falls_with_depth() {
    let raw = sine(8000, 1, 8000);
    let reference = Wave::from_pcm(&raw, BitDepth::Sixteen).unwrap();

    assert_eq!(
        compare(&reference, &reference, &Passthrough).unwrap(),
        f64::INFINITY
    );

    let snrs = [
        BitDepth::Eight,
        BitDepth::Four,
        BitDepth::Two,
        BitDepth::One,
    ]
    .map(|depth| {
        compare(
            &reference,
            &Wave::from_pcm(&raw, depth).unwrap(),
            &Passthrough,
        )
        .unwrap()
    });

    assert!(snrs.iter().all(|snr| snr.is_finite()));
    assert!(snrs.windows(2).all(|w| w[0] > w[1]), "{snrs:?}");
}

#[test]
fn test_silent_candidate() {
    let raw = sine(8000, 2, 1000);
    let reference = Wave::from_pcm(&raw, BitDepth::Sixteen).unwrap();

    for depth in [BitDepth::Sixteen, BitDepth::Eight] {
        let silence = Wave::from_pcm(&Pcm::new(8000, 2, vec![0; 2000]).unwrap(), depth).unwrap();
        assert_eq!(compare(&reference, &silence, &Passthrough).unwrap(), 0.0);
    }
}

#[test]
fn test_files_at_other_rates() {
    let dir = tempfile::tempdir().unwrap();
    let raw = sine(8000, 1, 8000);

    let reference = dir.path().join("reference.wav");
    wave::write(&reference, &Wave::from_pcm(&raw, BitDepth::Sixteen).unwrap()).unwrap();

    let resampler = FftResampler::default();
    let candidate = dir.path().join("candidate.wav");
    wave::write(
        &candidate,
        &Wave::from_pcm(&resampler.resample(&raw, 4000).unwrap(), BitDepth::Sixteen).unwrap(),
    )
    .unwrap();

    let comparison = compare_files(&reference, &candidate, &resampler).unwrap();
    assert_eq!(comparison.reference, reference);
    assert!(comparison.snr.is_finite() && comparison.snr > 10.0);

    assert!(matches!(
        compare_files(&reference, &candidate, &Passthrough),
        Err(Error::InvalidSampleRate)
    ));
    assert_eq!(
        compare_files(&reference, &reference, &Passthrough)
            .unwrap()
            .snr,
        f64::INFINITY
    );
}

#[test]
fn test_channel_mismatch() {
    let dir = tempfile::tempdir().unwrap();

    let mono = dir.path().join("mono.wav");
    wave::write(&mono, &Wave::from_pcm(&sine(8000, 1, 100), BitDepth::Four).unwrap()).unwrap();
    let stereo = dir.path().join("stereo.wav");
    wave::write(&stereo, &Wave::from_pcm(&sine(8000, 2, 100), BitDepth::Four).unwrap()).unwrap();

    assert!(matches!(
        compare_files(&mono, &stereo, &Passthrough),
        Err(Error::ChannelMismatch)
    ));
    assert!(matches!(
        compare_files(&mono, dir.path().join("missing.wav"), &Passthrough),
        Err(Error::FileNotFound(_))
    ));
}

#[test]
fn test_trailing_frame_beyond_reference() {
    let raw = sine(8000, 1, 8000);
    let reference = Wave::from_pcm(&raw, BitDepth::Sixteen).unwrap();

    let resampler = FftResampler::default();
    let candidate = resampler.resample(&raw, 4000).unwrap();
    assert_eq!(candidate.frames(), 4000);

    let mut with_tail = candidate.clone().into_samples();
    with_tail.push(i16::MIN);
    let with_tail = Pcm::new(4000, 1, with_tail).unwrap();

    assert_eq!(
        compare(
            &reference,
            &Wave::from_pcm(&with_tail, BitDepth::Sixteen).unwrap(),
            &resampler
        )
        .unwrap(),
        compare(
            &reference,
            &Wave::from_pcm(&candidate, BitDepth::Sixteen).unwrap(),
            &resampler
        )
        .unwrap()
    );
}
