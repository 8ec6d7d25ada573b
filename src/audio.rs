// Copyright 2025 Brian Langenberger
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! For holding 16-bit linear PCM between stages

use crate::Error;
use std::time::Duration;

/// Interleaved 16-bit linear samples at a known rate
///
/// This is the canonical form of every capture
/// and of every resampler's input and output.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Pcm {
    // all samples, interleaved by channel
    samples: Vec<i16>,

    // total number of channels
    channels: u16,

    // samples per second, per channel
    sample_rate: u32,
}

impl Pcm {
    /// Returns empty buffer which can be filled as needed
    ///
    /// # Errors
    ///
    /// Returns an error if the channel count or sample rate is 0.
    pub fn empty(sample_rate: u32, channels: u16) -> Result<Self, Error> {
        Self::new(sample_rate, channels, Vec::new())
    }

    /// Wraps interleaved samples
    ///
    /// A trailing partial frame is dropped.
    ///
    /// # Errors
    ///
    /// Returns an error if the channel count or sample rate is 0.
    pub fn new(sample_rate: u32, channels: u16, mut samples: Vec<i16>) -> Result<Self, Error> {
        if channels == 0 {
            return Err(Error::InvalidChannels);
        } else if sample_rate == 0 {
            return Err(Error::InvalidSampleRate);
        }
        samples.truncate(samples.len() - samples.len() % usize::from(channels));

        Ok(Self {
            samples,
            channels,
            sample_rate,
        })
    }

    /// Builds buffer from little-endian signed 16-bit bytes
    ///
    /// # Errors
    ///
    /// Returns an error if the channel count or sample rate is 0.
    pub fn from_le_bytes(sample_rate: u32, channels: u16, bytes: &[u8]) -> Result<Self, Error> {
        let mut pcm = Self::empty(sample_rate, channels)?;
        pcm.extend_from_le_bytes(bytes);
        Ok(pcm)
    }

    /// Builds buffer from one float vector per channel
    ///
    /// Floats are scaled by 32768, rounded and clamped to 16 bits.
    /// Channels are cut to the length of the shortest.
    ///
    /// # Errors
    ///
    /// Returns an error if there are no channels,
    /// too many channels or a sample rate of 0.
    pub fn from_channels(sample_rate: u32, channels: &[Vec<f32>]) -> Result<Self, Error> {
        let channel_count = u16::try_from(channels.len()).map_err(|_| Error::InvalidChannels)?;
        let frames = channels.iter().map(|c| c.len()).min().unwrap_or(0);

        Self::new(
            sample_rate,
            channel_count,
            (0..frames)
                .flat_map(|f| channels.iter().map(move |c| float_to_sample(c[f])))
                .collect(),
        )
    }

    /// Returns samples per second
    #[inline]
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Returns channel count
    #[inline]
    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Returns all samples, interleaved
    #[inline]
    pub fn samples(&self) -> &[i16] {
        &self.samples
    }

    /// Returns all samples, consuming the buffer
    #[inline]
    pub fn into_samples(self) -> Vec<i16> {
        self.samples
    }

    /// Returns PCM frame count
    #[inline]
    pub fn frames(&self) -> usize {
        self.samples.len() / usize::from(self.channels)
    }

    /// Whether the buffer holds no samples
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Returns playback duration
    pub fn duration(&self) -> Duration {
        Duration::from_secs_f64(self.frames() as f64 / f64::from(self.sample_rate))
    }

    /// Appends interleaved samples
    ///
    /// Batches need not end on a frame boundary.
    #[inline]
    pub fn extend(&mut self, samples: &[i16]) {
        self.samples.extend_from_slice(samples);
    }

    /// Appends little-endian signed 16-bit bytes
    ///
    /// A trailing odd byte is ignored.
    pub fn extend_from_le_bytes(&mut self, bytes: &[u8]) {
        self.samples.extend(
            bytes
                .chunks_exact(2)
                .map(|b| i16::from_le_bytes([b[0], b[1]])),
        );
    }

    /// Returns samples as little-endian signed 16-bit bytes
    pub fn to_le_bytes(&self) -> Vec<u8> {
        self.samples.iter().flat_map(|s| s.to_le_bytes()).collect()
    }

    /// Keeps at most the first `frames` frames
    pub fn truncate(&mut self, frames: usize) {
        self.samples
            .truncate(frames.saturating_mul(usize::from(self.channels)));
    }

    /// Drops any trailing partial frame left by uneven batches
    pub fn truncate_to_frames(&mut self) {
        let whole = self.frames() * usize::from(self.channels);
        self.samples.truncate(whole);
    }

    /// Returns one vector of normalized floats per channel
    pub fn to_channels(&self) -> Vec<Vec<f32>> {
        let channels = usize::from(self.channels);
        (0..channels)
            .map(|c| {
                self.samples
                    .iter()
                    .skip(c)
                    .step_by(channels)
                    .copied()
                    .map(sample_to_float)
                    .collect()
            })
            .collect()
    }

    /// Returns interleaved normalized floats
    pub fn to_floats(&self) -> Vec<f32> {
        self.samples.iter().copied().map(sample_to_float).collect()
    }

    /// Returns the largest absolute level, from 0.0 to 1.0
    pub fn peak(&self) -> f32 {
        peak_level(&self.samples)
    }
}

/// Returns the largest absolute level of a batch, from 0.0 to 1.0
pub fn peak_level(samples: &[i16]) -> f32 {
    samples
        .iter()
        .map(|s| sample_to_float(*s).abs())
        .fold(0.0, f32::max)
}

#[inline]
fn sample_to_float(sample: i16) -> f32 {
    f32::from(sample) / 32768.0
}

#[inline]
fn float_to_sample(f: f32) -> i16 {
    (f * 32768.0).round().clamp(-32768.0, 32767.0) as i16
}

#[test]
fn test_bytes() {
    let pcm = Pcm::from_le_bytes(8000, 2, &[0x01, 0x00, 0xFF, 0xFF, 0x00, 0x80, 0xAB]).unwrap();
    assert_eq!(pcm.samples(), [1, -1, i16::MIN]);
    assert_eq!(pcm.frames(), 1);
    assert_eq!(pcm.to_le_bytes(), [0x01, 0x00, 0xFF, 0xFF, 0x00, 0x80]);
}

#[test]
fn test_partial_frames() {
    let pcm = Pcm::new(8000, 2, vec![1, 2, 3]).unwrap();
    assert_eq!(pcm.samples(), [1, 2]);

    let mut pcm = Pcm::empty(8000, 2).unwrap();
    pcm.extend(&[1, 2, 3]);
    assert_eq!(pcm.frames(), 1);
    pcm.extend(&[4]);
    assert_eq!(pcm.frames(), 2);
    pcm.extend(&[5]);
    pcm.truncate_to_frames();
    assert_eq!(pcm.samples(), [1, 2, 3, 4]);
    pcm.truncate(5);
    assert_eq!(pcm.frames(), 2);
    pcm.truncate(1);
    assert_eq!(pcm.samples(), [1, 2]);
}

#[test]
fn test_channels() {
    let pcm = Pcm::new(8000, 2, vec![16384, -16384, 0, i16::MIN]).unwrap();
    let channels = pcm.to_channels();
    assert_eq!(channels, [vec![0.5, 0.0], vec![-0.5, -1.0]]);
    assert_eq!(Pcm::from_channels(8000, &channels).unwrap(), pcm);
    assert_eq!(pcm.peak(), 1.0);
}

#[test]
fn test_invalid() {
    assert!(matches!(Pcm::empty(8000, 0), Err(Error::InvalidChannels)));
    assert!(matches!(Pcm::empty(0, 1), Err(Error::InvalidSampleRate)));
    assert!(matches!(
        Pcm::from_channels(8000, &[]),
        Err(Error::InvalidChannels)
    ));
}

#[test]
fn test_duration() {
    let pcm = Pcm::new(8000, 2, vec![0; 16000]).unwrap();
    assert_eq!(pcm.duration(), Duration::from_secs(1));
}
