// Copyright 2025 Brian Langenberger
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use pcm_depth::compare::compare_files;
use pcm_depth::resample::FftResampler;

/// Measures the signal-to-noise ratio of WAVE files against a reference
///
/// "depth-compare <reference.wav> <candidate1.wav> <candidate2.wav> ..."
///
/// Candidates at another sample rate are resampled
/// to the reference's rate before comparison.

fn main() {
    tracing_subscriber::fmt::init();

    let mut args = std::env::args_os().skip(1);

    let Some(reference) = args.next() else {
        eprintln!("* usage: depth-compare <reference.wav> <candidate.wav> ...");
        return;
    };

    let resampler = FftResampler::default();

    for candidate in args {
        match compare_files(&reference, &candidate, &resampler) {
            Ok(comparison) => println!("{comparison}"),
            Err(err) => eprintln!("* {}: {err}", candidate.display()),
        }
    }
}
