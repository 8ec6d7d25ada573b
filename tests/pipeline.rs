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
    capture::{RecordingOptions, Replay, record, record_to_file},
    depth::BitDepth,
    pipeline::{MatrixOptions, Variant, run_matrix},
    resample::{FftResampler, Resample},
    wave,
};
use std::time::Duration;

fn noise(sample_rate: u32, frames: usize) -> Pcm {
    Pcm::new(
        sample_rate,
        1,
        (0..frames)
            .map(|i| {
                let t = i as f64 / f64::from(sample_rate);
                let tone = (t * 440.0 * std::f64::consts::TAU).sin() * 12000.0;
                (tone as i16).saturating_add(fastrand::i16(-500..500))
            })
            .collect(),
    )
    .unwrap()
}

// refuses to convert to one particular rate
struct Refuses(u32);

impl Resample for Refuses {
    fn resample(&self, pcm: &Pcm, sample_rate: u32) -> Result<Pcm, Error> {
        match sample_rate == self.0 {
            true => Err(Error::InvalidSampleRate),
            false => FftResampler::default().resample(pcm, sample_rate),
        }
    }
}

#[test]
fn test_matrix() {
    let dir = tempfile::tempdir().unwrap();
    let raw = noise(44100, 44100);

    let options = MatrixOptions::default()
        .rates([8000, 44100])
        .depths([BitDepth::One, BitDepth::Four, BitDepth::Sixteen])
        .output_dir(dir.path())
        .stem("take");

    let report = run_matrix(&raw, &options, &FftResampler::default()).unwrap();
    assert_eq!(report.reference, Variant::new(44100, BitDepth::Sixteen));
    assert_eq!(report.reference_path, dir.path().join("take_44100Hz_16bit.wav"));
    assert_eq!(report.variants.len(), 5);
    assert_eq!(report.failures().count(), 0);

    for variant in &report.variants {
        let format = wave::read_format(&variant.path).unwrap();
        assert_eq!(format.sample_rate(), variant.variant.sample_rate);
        assert_eq!(format.depth(), variant.variant.depth);
    }

    let snr_of = |rate, depth| {
        report
            .variants
            .iter()
            .find(|r| r.variant == Variant::new(rate, depth))
            .and_then(|r| r.snr.as_ref().ok().copied())
            .unwrap()
    };
    assert!(snr_of(44100, BitDepth::Four) > snr_of(44100, BitDepth::One));
    assert!(snr_of(8000, BitDepth::Sixteen) > snr_of(8000, BitDepth::One));

    // the reference round-trips bit for bit
    let reference = wave::read(&report.reference_path).unwrap();
    assert_eq!(reference.to_pcm().unwrap(), raw);
}

#[test]
fn test_failed_variant_continues() {
    let dir = tempfile::tempdir().unwrap();
    let raw = noise(44100, 4410);

    let options = MatrixOptions::default()
        .rates([8000, 22050, 44100])
        .depths([BitDepth::Two, BitDepth::Eight])
        .output_dir(dir.path());

    let report = run_matrix(&raw, &options, &Refuses(22050)).unwrap();
    assert_eq!(report.variants.len(), 6);

    let failed = report.failures().map(|r| r.variant).collect::<Vec<_>>();
    assert_eq!(
        failed,
        [
            Variant::new(22050, BitDepth::Two),
            Variant::new(22050, BitDepth::Eight),
        ]
    );
    for r in report.failures() {
        assert!(matches!(r.snr, Err(Error::InvalidSampleRate)));
        assert!(!r.path.exists());
    }
    assert!(dir.path().join("recording_8000Hz_2bit.wav").exists());
    assert!(dir.path().join("recording_44100Hz_8bit.wav").exists());
}

#[test]
fn test_failed_reference_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let options = MatrixOptions::default()
        .rates([8000])
        .depths([BitDepth::Four])
        .reference(Variant::new(22050, BitDepth::Sixteen))
        .output_dir(dir.path());

    assert!(matches!(
        run_matrix(&noise(44100, 4410), &options, &Refuses(22050)),
        Err(Error::InvalidSampleRate)
    ));
}

#[test]
fn test_record_then_matrix() {
    let dir = tempfile::tempdir().unwrap();
    let source = noise(22050, 11024);

    let options = RecordingOptions::default()
        .sample_rate(22050)
        .depth(BitDepth::Four)
        .path(dir.path().join("capture.wav"))
        .poll_interval(Duration::ZERO)
        .drain(Duration::ZERO);

    let mut peaks = Vec::new();
    let raw = record_to_file(
        &Replay::new(source.clone()).batch_frames(1000),
        &options,
        |session| {
            peaks.push(session.last_peak());
            session.frames() < 11024
        },
    )
    .unwrap();
    assert_eq!(raw, source);
    assert!(peaks.iter().skip(1).all(|p| *p > 0.0));

    let saved = wave::read(dir.path().join("capture.wav")).unwrap();
    assert_eq!(saved.format.depth(), BitDepth::Four);
    assert_eq!(saved.frames(), 11024);

    let report = run_matrix(
        &raw,
        &MatrixOptions::default()
            .rates([22050])
            .depths([BitDepth::Two, BitDepth::Sixteen])
            .reference(Variant::new(22050, BitDepth::Sixteen))
            .output_dir(dir.path()),
        &FftResampler::default(),
    )
    .unwrap();
    assert_eq!(report.variants.len(), 1);
    assert!(report.variants[0].snr.as_ref().is_ok_and(|snr| snr.is_finite()));
}

#[test]
fn test_capture_device_unavailable() {
    let options = RecordingOptions::default().sample_rate(8000);
    assert!(matches!(
        record(&Replay::new(noise(22050, 10)), &options, |_| false),
        Err(Error::DeviceUnavailable(_))
    ));
}
