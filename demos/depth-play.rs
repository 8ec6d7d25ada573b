// Copyright 2025 Brian Langenberger
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

#[cfg(feature = "cpal")]
use std::path::Path;

/// Plays WAVE files to the default output device
///
/// Files at 1, 2 or 4 bits per sample are played
/// through a lossy 8-bit preview.

#[cfg(feature = "cpal")]
fn main() {
    use pcm_depth::playback::CpalPlayback;

    tracing_subscriber::fmt::init();

    let playback = CpalPlayback::new();

    for wave in std::env::args_os().skip(1) {
        if let Err(err) = play_wave(&wave, &playback) {
            eprintln!("* {}: {err}", wave.display());
        }
    }
}

#[cfg(not(feature = "cpal"))]
fn main() {
    eprintln!("* Enable the \"cpal\" feature to run this example");
}

#[cfg(feature = "cpal")]
fn play_wave<P: AsRef<Path>>(
    wave: P,
    playback: &pcm_depth::playback::CpalPlayback,
) -> Result<(), pcm_depth::Error> {
    use pcm_depth::playback::PlaybackSource;
    use std::io::Write;
    use std::time::Duration;

    let source = PlaybackSource::open(wave.as_ref())?;
    let format = source.format();
    println!(
        "{}: {} Hz, {} channels, {}{}",
        wave.as_ref().display(),
        format.sample_rate(),
        format.channels(),
        format.depth(),
        if matches!(source, PlaybackSource::Preview(_)) {
            " (8-bit preview)"
        } else {
            ""
        }
    );

    let playing = playback.play(None, source)?;
    while !playing.is_finished() {
        print!(
            "\r{:.1} / {:.1} sec",
            playing.position().as_secs_f64(),
            playing.duration().as_secs_f64()
        );
        let _ = std::io::stdout().flush();
        std::thread::sleep(Duration::from_millis(100));
    }
    println!();
    playing.wait();

    Ok(())
}
