// Copyright 2025 Brian Langenberger
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! For deriving a matrix of rate and depth variants from one capture
//!
//! The raw 16-bit capture is resampled to each target rate,
//! quantized to each target depth and written as its own container.
//! Every variant is then measured against a single reference variant.
//!
//! A failed variant is reported and skipped;
//! the remaining variants are still generated.
//! Variants are built in parallel with the "rayon" feature enabled.

use crate::Error;
use crate::audio::Pcm;
use crate::compare::{Decibels, compare_files};
use crate::depth::BitDepth;
use crate::resample::Resample;
use crate::wave::{self, Wave};
use std::path::{Path, PathBuf};

/// One sample rate and depth combination
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct Variant {
    /// Samples per second
    pub sample_rate: u32,
    /// Bits per sample
    pub depth: BitDepth,
}

impl Variant {
    /// Builds a new variant
    pub fn new(sample_rate: u32, depth: BitDepth) -> Self {
        Self { sample_rate, depth }
    }

    /// Returns the variant's file name for the given stem
    ///
    /// # Example
    /// ```
    /// use pcm_depth::{depth::BitDepth, pipeline::Variant};
    ///
    /// assert_eq!(
    ///     Variant::new(8000, BitDepth::Two).file_name("take"),
    ///     "take_8000Hz_2bit.wav",
    /// );
    /// ```
    pub fn file_name(&self, stem: &str) -> String {
        format!("{stem}_{}Hz_{}bit.wav", self.sample_rate, self.depth.bits())
    }
}

impl std::fmt::Display for Variant {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{} Hz, {}", self.sample_rate, self.depth)
    }
}

/// Parameters for a matrix run
#[derive(Clone, Debug)]
pub struct MatrixOptions {
    rates: Vec<u32>,
    depths: Vec<BitDepth>,
    reference: Variant,
    output_dir: PathBuf,
    stem: String,
}

impl Default for MatrixOptions {
    fn default() -> Self {
        Self {
            rates: vec![8000, 22050, 44100],
            depths: BitDepth::ALL.to_vec(),
            reference: Variant::new(44100, BitDepth::Sixteen),
            output_dir: PathBuf::from("."),
            stem: "recording".to_owned(),
        }
    }
}

impl MatrixOptions {
    /// Assigns new target sample rates
    pub fn rates<I: IntoIterator<Item = u32>>(self, rates: I) -> Self {
        Self {
            rates: rates.into_iter().collect(),
            ..self
        }
    }

    /// Assigns new target depths
    pub fn depths<I: IntoIterator<Item = BitDepth>>(self, depths: I) -> Self {
        Self {
            depths: depths.into_iter().collect(),
            ..self
        }
    }

    /// Assigns new reference variant
    pub fn reference(self, reference: Variant) -> Self {
        Self { reference, ..self }
    }

    /// Assigns new directory for generated files
    pub fn output_dir<P: Into<PathBuf>>(self, output_dir: P) -> Self {
        Self {
            output_dir: output_dir.into(),
            ..self
        }
    }

    /// Assigns new file name stem
    pub fn stem<S: Into<String>>(self, stem: S) -> Self {
        Self {
            stem: stem.into(),
            ..self
        }
    }

    /// Returns every distinct rate and depth combination,
    /// besides the reference, in ascending rate then depth order
    pub fn variants(&self) -> Vec<Variant> {
        let mut rates = self.rates.clone();
        rates.sort_unstable();
        rates.dedup();

        let mut depths = self.depths.clone();
        depths.sort_unstable();
        depths.dedup();

        rates
            .iter()
            .flat_map(|rate| depths.iter().map(|depth| Variant::new(*rate, *depth)))
            .filter(|v| *v != self.reference)
            .collect()
    }

    /// Returns the path a variant is written to
    pub fn path_of(&self, variant: Variant) -> PathBuf {
        self.output_dir.join(variant.file_name(&self.stem))
    }
}

/// The outcome of generating one variant
#[derive(Debug)]
pub struct VariantReport {
    /// The generated variant
    pub variant: Variant,
    /// Where the variant was written
    pub path: PathBuf,
    /// Its SNR against the reference in decibels, or why it failed
    pub snr: Result<f64, Error>,
}

impl std::fmt::Display for VariantReport {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match &self.snr {
            Ok(snr) => write!(f, "{}: {}", self.variant, Decibels(*snr)),
            Err(err) => write!(f, "{}: error - {err}", self.variant),
        }
    }
}

/// The outcome of a whole matrix run
#[derive(Debug)]
pub struct MatrixReport {
    /// The reference variant
    pub reference: Variant,
    /// Where the reference was written
    pub reference_path: PathBuf,
    /// One report per variant, in ascending rate then depth order
    pub variants: Vec<VariantReport>,
}

impl MatrixReport {
    /// Iterates over the variants which failed
    pub fn failures(&self) -> impl Iterator<Item = &VariantReport> {
        self.variants.iter().filter(|r| r.snr.is_err())
    }
}

/// Resamples and quantizes a raw capture to one variant
///
/// # Errors
///
/// Returns any resampling error,
/// or an error if the variant's format is invalid.
pub fn build_variant<R>(raw: &Pcm, variant: Variant, resampler: &R) -> Result<Wave, Error>
where
    R: Resample + ?Sized,
{
    let wave = match raw.sample_rate() == variant.sample_rate {
        true => Wave::from_pcm(raw, variant.depth)?,
        false => Wave::from_pcm(&resampler.resample(raw, variant.sample_rate)?, variant.depth)?,
    };

    tracing::debug!(
        sample_rate = variant.sample_rate,
        bits = variant.depth.bits(),
        frames = wave.frames(),
        bytes = wave.data.len(),
        "built variant"
    );
    Ok(wave)
}

/// Writes the reference and every variant, measuring each against the reference
///
/// # Errors
///
/// Returns an error only if the output directory cannot be created
/// or the reference cannot be built and written.
/// Failures of individual variants are recorded in their reports.
pub fn run_matrix<R>(raw: &Pcm, options: &MatrixOptions, resampler: &R) -> Result<MatrixReport, Error>
where
    R: Resample + Sync + ?Sized,
{
    std::fs::create_dir_all(&options.output_dir)?;

    let reference_path = options.path_of(options.reference);
    wave::write(
        &reference_path,
        &build_variant(raw, options.reference, resampler)?,
    )?;

    let variants = build_variants(raw, options, &reference_path, resampler);

    for report in &variants {
        if let Err(err) = &report.snr {
            tracing::warn!(variant = %report.variant, %err, "variant failed");
        }
    }

    tracing::info!(
        reference = %options.reference,
        variants = variants.len(),
        failed = variants.iter().filter(|r| r.snr.is_err()).count(),
        "matrix finished"
    );

    Ok(MatrixReport {
        reference: options.reference,
        reference_path,
        variants,
    })
}

#[cfg(not(feature = "rayon"))]
fn build_variants<R>(
    raw: &Pcm,
    options: &MatrixOptions,
    reference_path: &Path,
    resampler: &R,
) -> Vec<VariantReport>
where
    R: Resample + Sync + ?Sized,
{
    options
        .variants()
        .into_iter()
        .map(|v| report_variant(raw, options, v, reference_path, resampler))
        .collect()
}

#[cfg(feature = "rayon")]
fn build_variants<R>(
    raw: &Pcm,
    options: &MatrixOptions,
    reference_path: &Path,
    resampler: &R,
) -> Vec<VariantReport>
where
    R: Resample + Sync + ?Sized,
{
    use rayon::iter::{IntoParallelIterator, ParallelIterator};

    options
        .variants()
        .into_par_iter()
        .map(|v| report_variant(raw, options, v, reference_path, resampler))
        .collect()
}

fn report_variant<R>(
    raw: &Pcm,
    options: &MatrixOptions,
    variant: Variant,
    reference_path: &Path,
    resampler: &R,
) -> VariantReport
where
    R: Resample + ?Sized,
{
    let path = options.path_of(variant);
    let snr = build_variant(raw, variant, resampler)
        .and_then(|wave| wave::write(&path, &wave))
        .and_then(|()| compare_files(reference_path, &path, resampler))
        .map(|comparison| comparison.snr);

    VariantReport { variant, path, snr }
}

#[test]
fn test_variants() {
    let options = MatrixOptions::default()
        .rates([8000, 44100])
        .depths([BitDepth::Two, BitDepth::Sixteen])
        .stem("take")
        .output_dir("out");

    assert_eq!(
        options.variants(),
        [
            Variant::new(8000, BitDepth::Two),
            Variant::new(8000, BitDepth::Sixteen),
            Variant::new(44100, BitDepth::Two),
        ]
    );
    assert_eq!(
        options.path_of(Variant::new(8000, BitDepth::Two)),
        Path::new("out").join("take_8000Hz_2bit.wav")
    );
}

#[test]
fn test_build_variant_same_rate() {
    use crate::resample::Passthrough;

    let raw = Pcm::new(8000, 1, vec![0, 16384, -16384, 32767]).unwrap();
    let wave = build_variant(&raw, Variant::new(8000, BitDepth::Four), &Passthrough).unwrap();
    assert_eq!(wave.format.depth(), BitDepth::Four);
    assert_eq!(wave.data.as_bytes(), [0xC8, 0xF4]);

    assert!(matches!(
        build_variant(&raw, Variant::new(16000, BitDepth::Four), &Passthrough),
        Err(Error::InvalidSampleRate)
    ));
}

#[test]
fn test_repeated_rates_and_depths() {
    let options = MatrixOptions::default()
        .rates([44100, 8000, 8000])
        .depths([BitDepth::Four, BitDepth::One, BitDepth::Four]);

    assert_eq!(
        options.variants(),
        [
            Variant::new(8000, BitDepth::One),
            Variant::new(8000, BitDepth::Four),
            Variant::new(44100, BitDepth::One),
            Variant::new(44100, BitDepth::Four),
        ]
    );
}
