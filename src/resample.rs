// Copyright 2025 Brian Langenberger
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! For converting 16-bit linear PCM between sample rates

use crate::Error;
use crate::audio::Pcm;

/// A sample rate converter for 16-bit linear PCM
///
/// Implementations are trusted to be correct;
/// the pipeline only supplies input and consumes output.
pub trait Resample {
    /// Returns the same audio at a new sample rate
    ///
    /// Channel count is unchanged.
    ///
    /// # Errors
    ///
    /// Returns an error if the conversion is not possible.
    fn resample(&self, pcm: &Pcm, sample_rate: u32) -> Result<Pcm, Error>;
}

impl<R: Resample + ?Sized> Resample for &R {
    fn resample(&self, pcm: &Pcm, sample_rate: u32) -> Result<Pcm, Error> {
        (**self).resample(pcm, sample_rate)
    }
}

/// A converter which only accepts audio already at the target rate
#[derive(Copy, Clone, Debug, Default)]
pub struct Passthrough;

impl Resample for Passthrough {
    fn resample(&self, pcm: &Pcm, sample_rate: u32) -> Result<Pcm, Error> {
        match pcm.sample_rate() == sample_rate {
            true => Ok(pcm.clone()),
            false => Err(Error::InvalidSampleRate),
        }
    }
}

/// An FFT-based converter built on rubato
#[derive(Copy, Clone, Debug)]
pub struct FftResampler {
    chunk_size: usize,
}

impl FftResampler {
    /// Assigns new input chunk size to converter
    pub fn chunk_size(self, chunk_size: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
        }
    }
}

impl Default for FftResampler {
    fn default() -> Self {
        Self { chunk_size: 1024 }
    }
}

impl Resample for FftResampler {
    fn resample(&self, pcm: &Pcm, sample_rate: u32) -> Result<Pcm, Error> {
        use rubato::{FftFixedIn, Resampler};

        if sample_rate == 0 {
            return Err(Error::InvalidSampleRate);
        } else if pcm.sample_rate() == sample_rate {
            return Ok(pcm.clone());
        }

        let input = pcm.to_channels();
        let frames = pcm.frames();

        // output length a perfect converter would produce
        let expected = (frames as u64 * u64::from(sample_rate))
            .div_ceil(u64::from(pcm.sample_rate())) as usize;

        let mut resampler = FftFixedIn::<f32>::new(
            pcm.sample_rate() as usize,
            sample_rate as usize,
            self.chunk_size,
            2,
            input.len(),
        )?;
        let delay = resampler.output_delay();

        let mut output: Vec<Vec<f32>> = vec![Vec::with_capacity(expected + delay); input.len()];

        let mut position = 0;
        while position < frames {
            let end = (position + resampler.input_frames_next()).min(frames);
            let chunk = input
                .iter()
                .map(|c| &c[position..end])
                .collect::<Vec<_>>();

            append(
                &mut output,
                match end - position == resampler.input_frames_next() {
                    true => resampler.process(&chunk, None)?,
                    false => resampler.process_partial(Some(chunk.as_slice()), None)?,
                },
            );
            position = end;
        }

        // flush whatever the converter still holds
        while output.first().is_some_and(|o| o.len() < expected + delay) {
            let chunk = resampler.process_partial(None::<&[&[f32]]>, None)?;
            if chunk.first().is_none_or(|c| c.is_empty()) {
                break;
            }
            append(&mut output, chunk);
        }

        for o in output.iter_mut() {
            o.drain(0..delay.min(o.len()));
            o.truncate(expected);
        }

        Pcm::from_channels(sample_rate, &output)
    }
}

fn append(output: &mut [Vec<f32>], chunk: Vec<Vec<f32>>) {
    for (o, c) in output.iter_mut().zip(chunk) {
        o.extend(c);
    }
}

#[test]
fn test_passthrough() {
    let pcm = Pcm::new(8000, 1, vec![1, 2, 3]).unwrap();
    assert_eq!(Passthrough.resample(&pcm, 8000).unwrap(), pcm);
    assert!(Passthrough.resample(&pcm, 16000).is_err());
}

#[test]
fn test_fft_length() {
    let pcm = Pcm::new(
        16000,
        2,
        (0..16000)
            .flat_map(|i| {
                let s = ((i as f32 / 16.0).sin() * 8000.0) as i16;
                [s, -s]
            })
            .collect(),
    )
    .unwrap();

    let down = FftResampler::default().resample(&pcm, 8000).unwrap();
    assert_eq!(down.sample_rate(), 8000);
    assert_eq!(down.channels(), 2);
    assert_eq!(down.frames(), 8000);

    let up = FftResampler::default().resample(&pcm, 44100).unwrap();
    assert_eq!(up.frames(), 44100);
}

#[test]
fn test_same_rate_is_unchanged() {
    let pcm = Pcm::new(22050, 1, vec![5; 100]).unwrap();
    assert_eq!(FftResampler::default().resample(&pcm, 22050).unwrap(), pcm);
}
