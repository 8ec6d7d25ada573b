// Copyright 2025 Brian Langenberger
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use pcm_depth::{
    depth::BitDepth,
    pipeline::{MatrixOptions, run_matrix},
    resample::FftResampler,
    wave,
};
use std::path::{Path, PathBuf};

/// Derives every sample rate and bit depth variant
/// of a 16-bit WAVE file and measures each one's SNR
/// against the 44100 Hz, 16-bit reference
///
/// "depth-matrix <input.wav> <output dir>"
///
/// Runs in parallel with the "rayon" feature enabled.

fn main() {
    // This is a CPU-heavy example which should be
    // using --release mode, or people might get confused
    // about how well it actually performs.
    if cfg!(debug_assertions) {
        eprintln!("WARNING: running in --release mode is preferred for best performance");
    }

    tracing_subscriber::fmt::init();

    match std::env::args_os().skip(1).collect::<Vec<_>>().as_slice() {
        [input, output] => {
            if let Err(err) = matrix(Path::new(input), PathBuf::from(output)) {
                eprintln!("* {}: {err}", input.display());
            }
        }
        _ => eprintln!("* usage: depth-matrix <input.wav> <output dir>"),
    }
}

fn matrix(input: &Path, output: PathBuf) -> Result<(), Error> {
    let raw = wave::read(input)?;
    if raw.format.depth() != BitDepth::Sixteen {
        return Err(Error::NotSixteenBit);
    }

    let options = MatrixOptions::default().output_dir(output).stem(
        input
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "recording".to_owned()),
    );

    let report = run_matrix(&raw.to_pcm()?, &options, &FftResampler::default())?;

    println!("reference: {}", report.reference_path.display());
    for variant in &report.variants {
        println!("  {variant}");
    }

    Ok(())
}

#[derive(Debug)]
enum Error {
    Pcm(pcm_depth::Error),
    NotSixteenBit,
}

impl From<pcm_depth::Error> for Error {
    fn from(err: pcm_depth::Error) -> Self {
        Self::Pcm(err)
    }
}

impl std::error::Error for Error {}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Self::Pcm(err) => err.fmt(f),
            Self::NotSixteenBit => "input must be 16 bits per sample".fmt(f),
        }
    }
}
