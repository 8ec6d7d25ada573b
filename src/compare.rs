// Copyright 2025 Brian Langenberger
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! For measuring how far a candidate stream strays from a reference
//!
//! Both streams are decoded to normalized floats at full
//! quantization precision, the candidate is brought to the
//! reference's sample rate if needed, and the two are compared
//! sample-for-sample over their common length:
//!
//! ```text
//! SNR = 10 * log10(Σ ref² / Σ (ref - cand)²) dB
//! ```

use crate::Error;
use crate::resample::Resample;
use crate::wave::{self, Wave};
use std::path::{Path, PathBuf};

/// The outcome of comparing two files
#[derive(Clone, Debug, PartialEq)]
pub struct Comparison {
    /// The file compared against
    pub reference: PathBuf,
    /// The file being measured
    pub candidate: PathBuf,
    /// Signal-to-noise ratio in decibels
    pub snr: f64,
}

impl std::fmt::Display for Comparison {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            f,
            "{} vs {}: {}",
            self.candidate.display(),
            self.reference.display(),
            Decibels(self.snr)
        )
    }
}

/// Formats a ratio in decibels, spelling out infinities
#[derive(Copy, Clone, Debug)]
pub struct Decibels(pub f64);

impl std::fmt::Display for Decibels {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        if self.0 == f64::INFINITY {
            "identical (+inf dB)".fmt(f)
        } else if self.0 == f64::NEG_INFINITY {
            "no signal (-inf dB)".fmt(f)
        } else {
            write!(f, "{:.2} dB", self.0)
        }
    }
}

/// Returns the signal-to-noise ratio of two aligned sample runs
///
/// Only the first `min(reference.len(), candidate.len())`
/// samples are compared.
/// No aligned samples yields negative infinity
/// and a bit-exact match yields positive infinity.
///
/// # Example
/// ```
/// use pcm_depth::compare::snr;
///
/// assert_eq!(snr(&[0.5, -0.5], &[0.5, -0.5]), f64::INFINITY);
/// assert_eq!(snr(&[0.5, -0.5], &[]), f64::NEG_INFINITY);
/// assert_eq!(snr(&[0.5, -0.5], &[0.0, 0.0]), 0.0);
/// ```
pub fn snr(reference: &[f32], candidate: &[f32]) -> f64 {
    if reference.is_empty() || candidate.is_empty() {
        return f64::NEG_INFINITY;
    }

    let (signal, noise) = reference.iter().zip(candidate).fold(
        (0.0f64, 0.0f64),
        |(signal, noise), (r, c)| {
            let (r, c) = (f64::from(*r), f64::from(*c));
            (signal + r * r, noise + (r - c) * (r - c))
        },
    );

    if noise == 0.0 {
        f64::INFINITY
    } else {
        10.0 * (signal / noise).log10()
    }
}

/// Compares two decoded containers
///
/// A candidate at a different sample rate is converted
/// to the reference's rate first.
/// Only the candidate frames spanning the reference's duration
/// are converted, so a trailing padding frame
/// cannot ring back into the compared region.
///
/// # Errors
///
/// Returns [`Error::ChannelMismatch`] if the channel counts differ,
/// or any unpacking or resampling error.
pub fn compare<R: Resample + ?Sized>(
    reference: &Wave,
    candidate: &Wave,
    resampler: &R,
) -> Result<f64, Error> {
    if reference.format.channels() != candidate.format.channels() {
        return Err(Error::ChannelMismatch);
    }

    let reference_floats = reference.to_floats()?;
    let candidate_floats = match candidate.format.sample_rate() == reference.format.sample_rate() {
        true => candidate.to_floats()?,
        false => {
            let mut pcm = candidate.to_pcm()?;
            pcm.truncate(
                (reference.frames() as u64 * u64::from(candidate.format.sample_rate()))
                    .div_ceil(u64::from(reference.format.sample_rate())) as usize,
            );
            resampler
                .resample(&pcm, reference.format.sample_rate())?
                .to_floats()
        }
    };

    Ok(snr(&reference_floats, &candidate_floats))
}

/// Compares two container files on disk
///
/// # Errors
///
/// Returns an error if either file is missing or malformed,
/// or any error from [`compare`].
pub fn compare_files<P, Q, R>(reference: P, candidate: Q, resampler: &R) -> Result<Comparison, Error>
where
    P: AsRef<Path>,
    Q: AsRef<Path>,
    R: Resample + ?Sized,
{
    let snr = compare(
        &wave::read(reference.as_ref())?,
        &wave::read(candidate.as_ref())?,
        resampler,
    )?;

    tracing::debug!(
        reference = %reference.as_ref().display(),
        candidate = %candidate.as_ref().display(),
        snr,
        "compared files"
    );

    Ok(Comparison {
        reference: reference.as_ref().to_owned(),
        candidate: candidate.as_ref().to_owned(),
        snr,
    })
}

#[test]
fn test_snr_edges() {
    assert_eq!(snr(&[], &[]), f64::NEG_INFINITY);
    assert_eq!(snr(&[0.25], &[0.25, 0.5]), f64::INFINITY);

    // silence against noise has no signal at all
    assert_eq!(snr(&[0.0, 0.0], &[0.5, 0.5]), f64::NEG_INFINITY);

    // noise at a tenth of the signal's amplitude is 20 dB down
    assert!((snr(&[1.0, -1.0], &[0.9, -0.9]) - 20.0).abs() < 1e-4);
}

#[test]
fn test_channel_mismatch() {
    use crate::audio::Pcm;
    use crate::depth::BitDepth;
    use crate::resample::Passthrough;

    let mono = Wave::from_pcm(&Pcm::new(8000, 1, vec![0; 8]).unwrap(), BitDepth::Eight).unwrap();
    let stereo =
        Wave::from_pcm(&Pcm::new(8000, 2, vec![0; 8]).unwrap(), BitDepth::Eight).unwrap();
    assert!(matches!(
        compare(&mono, &stereo, &Passthrough),
        Err(Error::ChannelMismatch)
    ));
}

#[test]
fn test_decibels_display() {
    assert_eq!(Decibels(f64::INFINITY).to_string(), "identical (+inf dB)");
    assert_eq!(Decibels(12.3456).to_string(), "12.35 dB");
}
