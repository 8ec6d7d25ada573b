// Copyright 2025 Brian Langenberger
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

/// Records from an input device until Enter is pressed,
/// then writes the capture at the requested bit depth
///
/// Sample rate, channels, bit depth, device and output file
/// are asked for interactively; blank or unusable answers
/// fall back to their defaults.

#[cfg(feature = "cpal")]
fn main() {
    tracing_subscriber::fmt::init();

    if let Err(err) = record() {
        eprintln!("* {err}");
    }
}

#[cfg(not(feature = "cpal"))]
fn main() {
    eprintln!("* Enable the \"cpal\" feature to run this example");
}

#[cfg(feature = "cpal")]
fn record() -> Result<(), Error> {
    use pcm_depth::capture::{CpalCapture, RecordingOptions, record_to_file};
    use std::io::Write;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    let capture = CpalCapture::new();
    let devices = capture.devices()?;
    for (index, name) in devices.iter().enumerate() {
        println!("{index}: {name}");
    }

    let options = RecordingOptions::from_operator(
        &ask("sample rate (e.g. 44100)")?,
        &ask("channels (1 or 2)")?,
        &ask("bits per sample (1, 2, 4, 8, 16 or 24)")?,
        &ask("device number")?,
        devices.len(),
        &ask("output file (e.g. recording.wav)")?,
    );

    let stop = Arc::new(AtomicBool::new(false));
    std::thread::spawn({
        let stop = stop.clone();
        move || {
            let mut line = String::new();
            let _ = std::io::stdin().read_line(&mut line);
            stop.store(true, Ordering::Release);
        }
    });

    println!("recording, press Enter to stop");
    let pcm = record_to_file(&capture, &options, |session| {
        print!("\rlevel: {:5.1}%", session.last_peak() * 100.0);
        let _ = std::io::stdout().flush();
        !stop.load(Ordering::Acquire)
    })?;

    println!(
        "\nwrote {:.2} sec to {}",
        pcm.duration().as_secs_f64(),
        options.get_path().display()
    );
    Ok(())
}

#[cfg(feature = "cpal")]
fn ask(prompt: &str) -> Result<String, Error> {
    use std::io::Write;

    print!("{prompt}: ");
    std::io::stdout().flush()?;
    let mut answer = String::new();
    std::io::stdin().read_line(&mut answer)?;
    Ok(answer)
}

#[cfg(feature = "cpal")]
#[derive(Debug)]
enum Error {
    Pcm(pcm_depth::Error),
    Io(std::io::Error),
}

#[cfg(feature = "cpal")]
impl std::error::Error for Error {}

#[cfg(feature = "cpal")]
impl From<pcm_depth::Error> for Error {
    fn from(err: pcm_depth::Error) -> Self {
        Self::Pcm(err)
    }
}

#[cfg(feature = "cpal")]
impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

#[cfg(feature = "cpal")]
impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Self::Pcm(err) => err.fmt(f),
            Self::Io(err) => err.fmt(f),
        }
    }
}
