// Copyright 2025 Brian Langenberger
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use pcm_depth::{Error, wave::WaveReader};
use std::path::Path;

/// Displays the header fields of WAVE files,
/// including ones at 1, 2 or 4 bits per sample
///
/// "depth-info <file1.wav> <file2.wav> ..."

fn main() {
    tracing_subscriber::fmt::init();

    for wave in std::env::args_os().skip(1) {
        if let Err(err) = display_header(&wave) {
            eprintln!("* {}: {err}", wave.display());
        }
    }
}

fn display_header<P: AsRef<Path>>(wave: P) -> Result<(), Error> {
    let reader = WaveReader::open(wave.as_ref())?;
    let format = reader.format();

    println!("{}:", wave.as_ref().display());
    println!("  sample rate: {} Hz", format.sample_rate());
    println!("  channels: {}", format.channels());
    println!(
        "  bits-per-sample: {}{}",
        format.depth().bits(),
        if format.depth().is_standard() {
            ""
        } else {
            " (non-standard)"
        }
    );
    println!("  block align: {} bytes", format.block_align());
    println!("  byte rate: {} bytes/sec", format.byte_rate());
    println!("  payload: {} bytes", reader.data_len());
    println!("  frames: {}", reader.frames());
    println!(
        "  duration: {:.3} sec",
        reader.frames() as f64 / f64::from(format.sample_rate())
    );

    Ok(())
}
