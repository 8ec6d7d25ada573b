// Copyright 2025 Brian Langenberger
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! For recording 16-bit linear PCM from a capture device
//!
//! A capture device delivers batches of samples at its own pace.
//! Each batch is appended to a [`CaptureSession`] which exclusively
//! owns the growing buffer and hands it back once capture stops.
//! With the `cpal` feature, [`CpalCapture`] records from
//! the system's input devices.

use crate::Error;
use crate::audio::{Pcm, peak_level};
use crate::depth::BitDepth;
use crate::wave::{self, Wave};
use std::path::PathBuf;
use std::time::Duration;

#[cfg(feature = "cpal")]
pub use device::{CpalCapture, CpalStream};

/// Recording parameters
#[derive(Clone, Debug)]
pub struct RecordingOptions {
    sample_rate: u32,
    channels: u16,
    depth: BitDepth,
    device: usize,
    path: PathBuf,
    drain: Duration,
    poll_interval: Duration,
}

impl RecordingOptions {
    /// Sample rate used when none is given
    pub const DEFAULT_SAMPLE_RATE: u32 = 44100;

    /// Output file used when none is given
    pub const DEFAULT_PATH: &str = "recording.wav";

    /// Builds options from an operator's typed answers
    ///
    /// Each unusable answer falls back to its default:
    /// 44100 Hz, mono, 16 bits, the first of `devices`
    /// and `recording.wav`.
    pub fn from_operator(
        sample_rate: &str,
        channels: &str,
        depth: &str,
        device: &str,
        devices: usize,
        path: &str,
    ) -> Self {
        let sample_rate = match sample_rate.trim().parse::<u32>() {
            Ok(rate) if rate > 0 => rate,
            _ => {
                tracing::warn!(answer = sample_rate, "using default sample rate");
                Self::DEFAULT_SAMPLE_RATE
            }
        };

        let channels = match channels.trim().parse::<u16>() {
            Ok(channels @ (1 | 2)) => channels,
            _ => {
                tracing::warn!(answer = channels, "using mono");
                1
            }
        };

        let depth = match depth.trim().parse::<u32>() {
            Ok(bits) => BitDepth::from_operator(bits),
            Err(_) => BitDepth::DEFAULT,
        };

        let device = match device.trim().parse::<usize>() {
            Ok(device) if device < devices => device,
            _ => 0,
        };

        let path = match path.trim() {
            "" => PathBuf::from(Self::DEFAULT_PATH),
            path => PathBuf::from(path),
        };

        Self {
            sample_rate,
            channels,
            depth,
            device,
            path,
            ..Self::default()
        }
    }

    /// Assigns new sample rate to options
    pub fn sample_rate(self, sample_rate: u32) -> Self {
        Self {
            sample_rate,
            ..self
        }
    }

    /// Assigns new channel count to options
    pub fn channels(self, channels: u16) -> Self {
        Self { channels, ..self }
    }

    /// Assigns new output depth to options
    pub fn depth(self, depth: BitDepth) -> Self {
        Self { depth, ..self }
    }

    /// Assigns new capture device index to options
    pub fn device(self, device: usize) -> Self {
        Self { device, ..self }
    }

    /// Assigns new output path to options
    pub fn path<P: Into<PathBuf>>(self, path: P) -> Self {
        Self {
            path: path.into(),
            ..self
        }
    }

    /// Assigns how long to wait for the device to drain after stopping
    pub fn drain(self, drain: Duration) -> Self {
        Self { drain, ..self }
    }

    /// Assigns how often delivered batches are collected
    pub fn poll_interval(self, poll_interval: Duration) -> Self {
        Self {
            poll_interval,
            ..self
        }
    }

    /// Returns the capture sample rate
    pub fn get_sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Returns the capture channel count
    pub fn get_channels(&self) -> u16 {
        self.channels
    }

    /// Returns the output depth
    pub fn get_depth(&self) -> BitDepth {
        self.depth
    }

    /// Returns the capture device index
    pub fn get_device(&self) -> usize {
        self.device
    }

    /// Returns the output path
    pub fn get_path(&self) -> &std::path::Path {
        &self.path
    }
}

impl Default for RecordingOptions {
    fn default() -> Self {
        Self {
            sample_rate: Self::DEFAULT_SAMPLE_RATE,
            channels: 1,
            depth: BitDepth::DEFAULT,
            device: 0,
            path: PathBuf::from(Self::DEFAULT_PATH),
            drain: Duration::from_millis(200),
            poll_interval: Duration::from_millis(50),
        }
    }
}

/// The accumulator for one recording
///
/// Only the code collecting batches touches the session,
/// so no locking is involved.
#[derive(Debug)]
pub struct CaptureSession {
    buffer: Pcm,
    last_peak: f32,
    batches: usize,
}

impl CaptureSession {
    /// Starts session which appends to the given buffer
    pub fn new(buffer: Pcm) -> Self {
        Self {
            buffer,
            last_peak: 0.0,
            batches: 0,
        }
    }

    /// Appends a batch of interleaved samples, returning its peak level
    pub fn push(&mut self, batch: &[i16]) -> f32 {
        self.last_peak = peak_level(batch);
        self.batches += 1;
        self.buffer.extend(batch);
        self.last_peak
    }

    /// Appends a batch of little-endian 16-bit bytes, returning its peak level
    pub fn push_le_bytes(&mut self, batch: &[u8]) -> f32 {
        let start = self.buffer.samples().len();
        self.buffer.extend_from_le_bytes(batch);
        self.last_peak = peak_level(&self.buffer.samples()[start..]);
        self.batches += 1;
        self.last_peak
    }

    /// Returns the peak level of the most recent batch, from 0.0 to 1.0
    #[inline]
    pub fn last_peak(&self) -> f32 {
        self.last_peak
    }

    /// Returns the number of batches received
    #[inline]
    pub fn batches(&self) -> usize {
        self.batches
    }

    /// Returns the number of whole frames received
    #[inline]
    pub fn frames(&self) -> usize {
        self.buffer.frames()
    }

    /// Returns the duration received so far
    #[inline]
    pub fn duration(&self) -> Duration {
        self.buffer.duration()
    }

    /// Ends the session, returning its buffer of whole frames
    pub fn finish(mut self) -> Pcm {
        self.buffer.truncate_to_frames();
        self.buffer
    }
}

/// A source of 16-bit capture batches
pub trait CaptureService {
    /// The running capture
    type Stream: CaptureStream;

    /// Starts capturing at the given rate and channel count
    ///
    /// # Errors
    ///
    /// Returns [`Error::DeviceUnavailable`] if the device
    /// is missing, busy or cannot capture in this format.
    fn start(&self, sample_rate: u32, channels: u16, device: usize)
    -> Result<Self::Stream, Error>;
}

/// A running capture
pub trait CaptureStream {
    /// Moves any batches delivered so far into the session
    ///
    /// # Errors
    ///
    /// Returns an error if the device fails mid-capture.
    fn poll(&mut self, session: &mut CaptureSession) -> Result<(), Error>;

    /// Stops capturing, waits for the device to drain
    /// and moves any remaining batches into the session
    ///
    /// # Errors
    ///
    /// Returns an error if the device cannot be stopped.
    fn stop(self, session: &mut CaptureSession, drain: Duration) -> Result<(), Error>;
}

/// Records until `keep_going` returns false
///
/// `keep_going` is consulted between polls
/// and may inspect the session's level and length.
///
/// # Errors
///
/// Returns an error if the device cannot be started or fails.
pub fn record<S, F>(service: &S, options: &RecordingOptions, mut keep_going: F) -> Result<Pcm, Error>
where
    S: CaptureService,
    F: FnMut(&CaptureSession) -> bool,
{
    let mut session = CaptureSession::new(Pcm::empty(options.sample_rate, options.channels)?);
    let mut stream = service.start(options.sample_rate, options.channels, options.device)?;

    tracing::info!(
        sample_rate = options.sample_rate,
        channels = options.channels,
        device = options.device,
        "capture started"
    );

    while keep_going(&session) {
        stream.poll(&mut session)?;
        if !options.poll_interval.is_zero() {
            std::thread::sleep(options.poll_interval);
        }
    }
    stream.stop(&mut session, options.drain)?;

    let pcm = session.finish();
    tracing::info!(
        frames = pcm.frames(),
        seconds = pcm.duration().as_secs_f64(),
        "capture stopped"
    );
    Ok(pcm)
}

/// Records, then writes the capture at the options' depth and path
///
/// Returns the raw 16-bit capture.
///
/// # Errors
///
/// Returns an error if recording fails or the file cannot be written.
pub fn record_to_file<S, F>(
    service: &S,
    options: &RecordingOptions,
    keep_going: F,
) -> Result<Pcm, Error>
where
    S: CaptureService,
    F: FnMut(&CaptureSession) -> bool,
{
    let pcm = record(service, options, keep_going)?;
    wave::write(&options.path, &Wave::from_pcm(&pcm, options.depth)?)?;
    tracing::info!(path = %options.path.display(), depth = %options.depth, "recording saved");
    Ok(pcm)
}

/// A capture service which replays an existing recording
///
/// Each poll delivers one batch, as a device would
/// once per buffer fill.
#[derive(Clone, Debug)]
pub struct Replay {
    pcm: Pcm,
    batch_frames: usize,
}

impl Replay {
    /// Replays the given samples
    pub fn new(pcm: Pcm) -> Self {
        Self {
            pcm,
            batch_frames: 1024,
        }
    }

    /// Assigns new batch size, in frames
    pub fn batch_frames(self, batch_frames: usize) -> Self {
        Self {
            batch_frames: batch_frames.max(1),
            ..self
        }
    }
}

/// A running replay
#[derive(Debug)]
pub struct ReplayStream {
    samples: Vec<i16>,
    position: usize,
    batch_len: usize,
}

impl CaptureService for Replay {
    type Stream = ReplayStream;

    fn start(
        &self,
        sample_rate: u32,
        channels: u16,
        device: usize,
    ) -> Result<ReplayStream, Error> {
        if device != 0 {
            Err(Error::DeviceUnavailable(format!("no replay device {device}")))
        } else if sample_rate != self.pcm.sample_rate() || channels != self.pcm.channels() {
            Err(Error::DeviceUnavailable(format!(
                "replay is {} Hz, {} channels",
                self.pcm.sample_rate(),
                self.pcm.channels()
            )))
        } else {
            Ok(ReplayStream {
                samples: self.pcm.samples().to_vec(),
                position: 0,
                batch_len: self.batch_frames * usize::from(channels),
            })
        }
    }
}

impl CaptureStream for ReplayStream {
    fn poll(&mut self, session: &mut CaptureSession) -> Result<(), Error> {
        let end = (self.position + self.batch_len).min(self.samples.len());
        if end > self.position {
            session.push(&self.samples[self.position..end]);
            self.position = end;
        }
        Ok(())
    }

    fn stop(self, _session: &mut CaptureSession, _drain: Duration) -> Result<(), Error> {
        Ok(())
    }
}

#[cfg(feature = "cpal")]
mod device {
    use super::{CaptureService, CaptureSession, CaptureStream};
    use crate::Error;
    use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
    use std::sync::mpsc;
    use std::time::Duration;

    /// Captures from the system's input devices
    pub struct CpalCapture {
        host: cpal::Host,
    }

    impl CpalCapture {
        /// Uses the default audio host
        pub fn new() -> Self {
            Self {
                host: cpal::default_host(),
            }
        }

        /// Returns the names of available input devices, by index
        ///
        /// # Errors
        ///
        /// Returns an error if devices cannot be enumerated.
        pub fn devices(&self) -> Result<Vec<String>, Error> {
            Ok(self
                .host
                .input_devices()
                .map_err(unavailable)?
                .map(|d| d.name().unwrap_or_else(|_| "unknown device".to_owned()))
                .collect())
        }
    }

    impl Default for CpalCapture {
        fn default() -> Self {
            Self::new()
        }
    }

    /// A running device capture
    pub struct CpalStream {
        stream: cpal::Stream,
        batches: mpsc::Receiver<Vec<i16>>,
    }

    impl CaptureService for CpalCapture {
        type Stream = CpalStream;

        fn start(&self, sample_rate: u32, channels: u16, device: usize) -> Result<CpalStream, Error> {
            let device = self
                .host
                .input_devices()
                .map_err(unavailable)?
                .nth(device)
                .ok_or_else(|| Error::DeviceUnavailable(format!("no input device {device}")))?;

            let config = cpal::StreamConfig {
                channels,
                sample_rate: cpal::SampleRate(sample_rate),
                buffer_size: cpal::BufferSize::Default,
            };

            let (sender, batches) = mpsc::channel();

            let stream = match device.default_input_config().map_err(unavailable)?.sample_format() {
                cpal::SampleFormat::I16 => build::<i16>(&device, &config, sender),
                cpal::SampleFormat::U16 => build::<u16>(&device, &config, sender),
                cpal::SampleFormat::F32 => build::<f32>(&device, &config, sender),
                format => Err(Error::DeviceUnavailable(format!(
                    "unsupported sample format {format}"
                ))),
            }?;
            stream.play().map_err(unavailable)?;

            Ok(CpalStream { stream, batches })
        }
    }

    impl CaptureStream for CpalStream {
        fn poll(&mut self, session: &mut CaptureSession) -> Result<(), Error> {
            for batch in self.batches.try_iter() {
                session.push(&batch);
            }
            Ok(())
        }

        fn stop(self, session: &mut CaptureSession, drain: Duration) -> Result<(), Error> {
            self.stream.pause().map_err(unavailable)?;
            std::thread::sleep(drain);
            drop(self.stream);
            for batch in self.batches.try_iter() {
                session.push(&batch);
            }
            Ok(())
        }
    }

    fn build<T>(
        device: &cpal::Device,
        config: &cpal::StreamConfig,
        sender: mpsc::Sender<Vec<i16>>,
    ) -> Result<cpal::Stream, Error>
    where
        T: cpal::SizedSample,
        i16: cpal::FromSample<T>,
    {
        use cpal::Sample;

        device
            .build_input_stream(
                config,
                move |data: &[T], _: &cpal::InputCallbackInfo| {
                    // a closed receiver means capture has already stopped
                    let _ = sender.send(data.iter().map(|s| s.to_sample::<i16>()).collect());
                },
                |err| tracing::error!(%err, "capture stream error"),
                None,
            )
            .map_err(unavailable)
    }

    fn unavailable<E: std::fmt::Display>(err: E) -> Error {
        Error::DeviceUnavailable(err.to_string())
    }
}

#[test]
fn test_operator_answers() {
    let options = RecordingOptions::from_operator("", "3", "12", "7", 2, "  ");
    assert_eq!(options.get_sample_rate(), 44100);
    assert_eq!(options.get_channels(), 1);
    assert_eq!(options.get_depth(), BitDepth::Sixteen);
    assert_eq!(options.get_device(), 0);
    assert_eq!(options.get_path(), std::path::Path::new("recording.wav"));

    let options = RecordingOptions::from_operator("8000", "2", "4", "1", 2, "out.wav");
    assert_eq!(options.get_sample_rate(), 8000);
    assert_eq!(options.get_channels(), 2);
    assert_eq!(options.get_depth(), BitDepth::Four);
    assert_eq!(options.get_device(), 1);
    assert_eq!(options.get_path(), std::path::Path::new("out.wav"));

    let options = RecordingOptions::from_operator("-5", "x", "x", "x", 0, "a.wav");
    assert_eq!(options.get_sample_rate(), 44100);
    assert_eq!(options.get_depth(), BitDepth::Sixteen);
}

#[test]
fn test_session_accumulates() {
    let mut session = CaptureSession::new(Pcm::empty(8000, 2).unwrap());
    assert_eq!(session.push(&[16384, 0, -8192]), 0.5);
    assert_eq!(session.push_le_bytes(&[0x00, 0x40, 0x00, 0xC0, 0x00]), 0.5);
    assert_eq!(session.batches(), 2);
    assert_eq!(session.frames(), 2);

    // the trailing partial frame is dropped
    let pcm = session.finish();
    assert_eq!(pcm.samples(), [16384, 0, -8192, 16384]);
}

#[test]
fn test_replay_record() {
    let source = Pcm::new(8000, 1, (0..5000).map(|i| (i % 100) as i16).collect()).unwrap();
    let service = Replay::new(source.clone()).batch_frames(512);
    let options = RecordingOptions::default()
        .sample_rate(8000)
        .poll_interval(Duration::ZERO)
        .drain(Duration::ZERO);

    let mut polls = 0;
    let recorded = record(&service, &options, |session| {
        polls += 1;
        session.frames() < 5000
    })
    .unwrap();
    assert_eq!(recorded, source);
    assert_eq!(polls, 11);

    assert!(matches!(
        record(&service, &options.clone().sample_rate(44100), |_| false),
        Err(Error::DeviceUnavailable(_))
    ));
    assert!(matches!(
        record(&service, &options.device(1), |_| false),
        Err(Error::DeviceUnavailable(_))
    ));
}
