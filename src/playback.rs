// Copyright 2025 Brian Langenberger
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! For feeding container files to a playback device
//!
//! Playback sinks accept only 8 or 16 bit PCM.
//! Files at standard depths decode directly,
//! while 1, 2 and 4 bit files go through a [`PreviewReader`]
//! which unpacks codes on demand and rescales them
//! to the unsigned 8-bit range.
//! The preview is lossy and only meant for listening;
//! comparisons always use the full dequantization.
//!
//! With the `cpal` feature, [`CpalPlayback`] plays
//! a [`PlaybackSource`] on the system's output devices.

use crate::Error;
use crate::depth::BitDepth;
use crate::pack::Code;
use crate::wave::{WaveFormat, WaveReader};
use bitstream_io::{BitRead, BitReader, LittleEndian};
use std::io::{BufReader, Read};
use std::path::Path;
use std::time::Duration;

#[cfg(feature = "cpal")]
pub use device::{CpalPlayback, Playing};

/// Rescales a code to the unsigned 8-bit range
///
/// # Example
/// ```
/// use pcm_depth::{depth::BitDepth, playback::preview_sample};
///
/// assert_eq!(preview_sample(0, BitDepth::Two), 0);
/// assert_eq!(preview_sample(1, BitDepth::Two), 85);
/// assert_eq!(preview_sample(3, BitDepth::Two), 255);
/// assert_eq!(preview_sample(1, BitDepth::One), 255);
/// ```
#[inline]
pub fn preview_sample(code: Code, depth: BitDepth) -> u8 {
    let max = depth.max_code();
    ((code.min(max) * 255) / max) as u8
}

/// Converts an unsigned 8-bit sample to a float
#[inline]
fn unsigned_to_float(sample: u8) -> f32 {
    (f32::from(sample) - 128.0) / 128.0
}

/// Decodes a sub-byte container as unsigned 8-bit samples
///
/// Reading yields one byte per sample, interleaved by channel.
pub struct PreviewReader<R> {
    reader: BitReader<WaveReader<R>, LittleEndian>,
    format: WaveFormat,
    // total samples in payload, whole frames only
    total: usize,
    // samples read so far
    read: usize,
}

impl PreviewReader<BufReader<std::fs::File>> {
    /// Opens container file for preview
    ///
    /// # Errors
    ///
    /// Returns any error from [`WaveReader::open`]
    /// or [`PreviewReader::new`].
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        WaveReader::open(path).and_then(Self::new)
    }
}

impl<R: Read> PreviewReader<R> {
    /// Wraps a reader positioned at its payload
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedDepth`] for depths above 8 bits,
    /// which need no preview.
    pub fn new(reader: WaveReader<R>) -> Result<Self, Error> {
        let format = reader.format();
        if format.depth().bits() > 8 {
            return Err(Error::UnsupportedDepth(format.depth().bits()));
        }

        Ok(Self {
            total: reader.frames() * usize::from(format.channels()),
            format,
            read: 0,
            reader: BitReader::endian(reader, LittleEndian),
        })
    }

    /// Returns the container's format
    #[inline]
    pub fn format(&self) -> WaveFormat {
        self.format
    }

    /// Returns the number of samples remaining
    #[inline]
    pub fn remaining(&self) -> usize {
        self.total - self.read
    }

    /// Returns how much has been played so far
    pub fn position(&self) -> Duration {
        self.time_of(self.read)
    }

    /// Returns the total playing time
    ///
    /// The count of packed samples is derived from the
    /// nominal depth, not the byte-rounded header fields.
    pub fn duration(&self) -> Duration {
        self.time_of(self.total)
    }

    fn time_of(&self, samples: usize) -> Duration {
        Duration::from_secs_f64(
            (samples / usize::from(self.format.channels())) as f64
                / f64::from(self.format.sample_rate()),
        )
    }
}

impl<R: Read> Read for PreviewReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let depth = self.format.depth();
        let to_read = buf.len().min(self.remaining());

        for b in buf[..to_read].iter_mut() {
            *b = preview_sample(self.reader.read_var::<u32>(depth.bits())?, depth);
            self.read += 1;
        }

        Ok(to_read)
    }
}

/// A decoded container ready to be played as floats
pub enum PlaybackSource<R> {
    /// An 8, 16 or 24 bit file at full precision
    Standard {
        /// The container's format
        format: WaveFormat,
        /// Interleaved samples
        samples: Vec<f32>,
        /// Samples played so far
        position: usize,
    },
    /// A 1, 2 or 4 bit file through the 8-bit preview
    Preview(PreviewReader<R>),
}

impl PlaybackSource<BufReader<std::fs::File>> {
    /// Opens container file for playback
    ///
    /// # Errors
    ///
    /// Returns [`Error::FileNotFound`] for missing files
    /// and any error from [`PlaybackSource::from_reader`].
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        WaveReader::open(path).and_then(Self::from_reader)
    }
}

impl<R: Read> PlaybackSource<R> {
    /// Picks standard or preview decoding by the file's nominal depth
    ///
    /// # Errors
    ///
    /// Returns an error if a standard-depth payload is truncated.
    pub fn from_reader(reader: WaveReader<R>) -> Result<Self, Error> {
        let depth = reader.format().depth();
        let source = match depth.is_sub_byte() {
            true => Self::Preview(PreviewReader::new(reader)?),
            false => {
                let wave = reader.into_wave()?;
                Self::Standard {
                    format: wave.format,
                    samples: wave.to_floats()?,
                    position: 0,
                }
            }
        };

        tracing::debug!(
            bits = depth.bits(),
            preview = matches!(source, Self::Preview(_)),
            "opened playback source"
        );
        Ok(source)
    }

    /// Returns the container's format
    pub fn format(&self) -> WaveFormat {
        match self {
            Self::Standard { format, .. } => *format,
            Self::Preview(preview) => preview.format(),
        }
    }

    /// Fills as much of the buffer as possible with interleaved samples
    ///
    /// Returns the number of samples written,
    /// which is 0 once the source is exhausted.
    ///
    /// # Errors
    ///
    /// Passes through any I/O error from the preview payload.
    pub fn fill(&mut self, buf: &mut [f32]) -> Result<usize, Error> {
        match self {
            Self::Standard {
                samples, position, ..
            } => {
                let remaining = &samples[*position..];
                let count = remaining.len().min(buf.len());
                buf[..count].copy_from_slice(&remaining[..count]);
                *position += count;
                Ok(count)
            }
            Self::Preview(preview) => {
                let mut bytes = vec![0; buf.len().min(preview.remaining())];
                preview
                    .read_exact(&mut bytes)
                    .map_err(|err| match err.kind() {
                        std::io::ErrorKind::UnexpectedEof => Error::TruncatedFile,
                        _ => Error::Io(err),
                    })?;
                for (o, b) in buf.iter_mut().zip(&bytes) {
                    *o = unsigned_to_float(*b);
                }
                Ok(bytes.len())
            }
        }
    }

    /// Returns how much has been played so far
    pub fn position(&self) -> Duration {
        match self {
            Self::Standard {
                format, position, ..
            } => frames_to_time(*format, *position),
            Self::Preview(preview) => preview.position(),
        }
    }

    /// Returns the total playing time
    pub fn duration(&self) -> Duration {
        match self {
            Self::Standard {
                format, samples, ..
            } => frames_to_time(*format, samples.len()),
            Self::Preview(preview) => preview.duration(),
        }
    }
}

fn frames_to_time(format: WaveFormat, samples: usize) -> Duration {
    Duration::from_secs_f64(
        (samples / usize::from(format.channels())) as f64 / f64::from(format.sample_rate()),
    )
}

#[cfg(feature = "cpal")]
mod device {
    use super::PlaybackSource;
    use crate::Error;
    use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;

    /// Plays sources on the system's output devices
    pub struct CpalPlayback {
        host: cpal::Host,
    }

    impl CpalPlayback {
        /// Uses the default audio host
        pub fn new() -> Self {
            Self {
                host: cpal::default_host(),
            }
        }

        /// Returns the names of available output devices, by index
        ///
        /// # Errors
        ///
        /// Returns an error if devices cannot be enumerated.
        pub fn devices(&self) -> Result<Vec<String>, Error> {
            Ok(self
                .host
                .output_devices()
                .map_err(unavailable)?
                .map(|d| d.name().unwrap_or_else(|_| "unknown device".to_owned()))
                .collect())
        }

        /// Starts playing source on the given device,
        /// or the default device if none is given
        ///
        /// # Errors
        ///
        /// Returns [`Error::DeviceUnavailable`] if the device
        /// is missing or cannot play the source's format.
        pub fn play<R>(
            &self,
            device: Option<usize>,
            mut source: PlaybackSource<R>,
        ) -> Result<Playing, Error>
        where
            R: std::io::Read + Send + 'static,
        {
            let device = match device {
                Some(index) => self
                    .host
                    .output_devices()
                    .map_err(unavailable)?
                    .nth(index)
                    .ok_or_else(|| Error::DeviceUnavailable(format!("no output device {index}")))?,
                None => self
                    .host
                    .default_output_device()
                    .ok_or_else(|| Error::DeviceUnavailable("no default output device".into()))?,
            };

            let format = source.format();
            let duration = source.duration();
            let played = Arc::new(AtomicUsize::new(0));
            let finished = Arc::new(AtomicBool::new(false));

            let stream = device
                .build_output_stream(
                    &cpal::StreamConfig {
                        channels: format.channels(),
                        sample_rate: cpal::SampleRate(format.sample_rate()),
                        buffer_size: cpal::BufferSize::Default,
                    },
                    {
                        let played = played.clone();
                        let finished = finished.clone();
                        move |buf: &mut [f32], _: &cpal::OutputCallbackInfo| {
                            let written = match source.fill(buf) {
                                Ok(written) => written,
                                Err(err) => {
                                    tracing::error!(%err, "playback source error");
                                    0
                                }
                            };
                            // pad out with silence once the source runs dry
                            buf[written..].fill(0.0);
                            played.fetch_add(written, Ordering::Relaxed);
                            if written < buf.len() {
                                finished.store(true, Ordering::Release);
                            }
                        }
                    },
                    |err| tracing::error!(%err, "playback stream error"),
                    None,
                )
                .map_err(unavailable)?;
            stream.play().map_err(unavailable)?;

            tracing::info!(
                sample_rate = format.sample_rate(),
                channels = format.channels(),
                bits = format.depth().bits(),
                "playback started"
            );

            Ok(Playing {
                _stream: stream,
                channels: format.channels(),
                sample_rate: format.sample_rate(),
                duration,
                played,
                finished,
            })
        }
    }

    impl Default for CpalPlayback {
        fn default() -> Self {
            Self::new()
        }
    }

    /// A source being played
    ///
    /// Dropping it stops playback.
    pub struct Playing {
        _stream: cpal::Stream,
        channels: u16,
        sample_rate: u32,
        duration: Duration,
        played: Arc<AtomicUsize>,
        finished: Arc<AtomicBool>,
    }

    impl Playing {
        /// Returns how much has been played so far
        pub fn position(&self) -> Duration {
            Duration::from_secs_f64(
                (self.played.load(Ordering::Relaxed) / usize::from(self.channels)) as f64
                    / f64::from(self.sample_rate),
            )
        }

        /// Returns the total playing time
        #[inline]
        pub fn duration(&self) -> Duration {
            self.duration
        }

        /// Whether the source has run out of samples
        #[inline]
        pub fn is_finished(&self) -> bool {
            self.finished.load(Ordering::Acquire)
        }

        /// Blocks until the source has run out of samples
        pub fn wait(self) {
            while !self.is_finished() {
                std::thread::sleep(Duration::from_millis(50));
            }
            tracing::info!("playback finished");
        }
    }

    fn unavailable<E: std::fmt::Display>(err: E) -> Error {
        Error::DeviceUnavailable(err.to_string())
    }
}

#[test]
fn test_preview_reader() {
    use crate::pack::pack;
    use crate::wave::encode;

    // 3 stereo frames at 2 bits fill 12 of 16 payload bits,
    // so the payload's 2 spare codes make a 4th frame
    let image = encode(
        &pack(&[0, 1, 2, 3, 3, 0], BitDepth::Two).unwrap(),
        4,
        2,
        BitDepth::Two,
    )
    .unwrap();

    let mut preview = PreviewReader::new(WaveReader::new(image.as_slice()).unwrap()).unwrap();
    assert_eq!(preview.duration(), Duration::from_secs(1));
    assert_eq!(preview.position(), Duration::ZERO);

    let mut bytes = Vec::new();
    preview.read_to_end(&mut bytes).unwrap();
    assert_eq!(bytes, [0, 85, 170, 255, 255, 0, 0, 0]);
    assert_eq!(preview.position(), Duration::from_secs(1));
}

#[test]
fn test_preview_rejects_wide_depths() {
    use crate::pack::pack;
    use crate::wave::encode;

    let image = encode(
        &pack(&[0, 1], BitDepth::Sixteen).unwrap(),
        8000,
        1,
        BitDepth::Sixteen,
    )
    .unwrap();
    assert!(matches!(
        PreviewReader::new(WaveReader::new(image.as_slice()).unwrap()),
        Err(Error::UnsupportedDepth(16))
    ));
}

#[test]
fn test_source_routing() {
    use crate::audio::Pcm;
    use crate::wave::Wave;

    let pcm = Pcm::new(8000, 1, vec![0, 16384, -16384, 8192]).unwrap();

    let image = Wave::from_pcm(&pcm, BitDepth::Sixteen)
        .unwrap()
        .to_bytes()
        .unwrap();
    let mut source = PlaybackSource::from_reader(WaveReader::new(image.as_slice()).unwrap()).unwrap();
    assert!(matches!(source, PlaybackSource::Standard { .. }));
    let mut buf = [1.0; 6];
    assert_eq!(source.fill(&mut buf).unwrap(), 4);
    assert_eq!(buf[..4], [0.0, 0.5, -0.5, 0.25]);
    assert_eq!(source.fill(&mut buf).unwrap(), 0);
    assert_eq!(source.position(), source.duration());

    let image = Wave::from_pcm(&pcm, BitDepth::One)
        .unwrap()
        .to_bytes()
        .unwrap();
    let mut source = PlaybackSource::from_reader(WaveReader::new(image.as_slice()).unwrap()).unwrap();
    assert!(matches!(source, PlaybackSource::Preview(_)));
    // the single payload byte holds 8 one-bit codes
    let mut buf = [0.0; 16];
    assert_eq!(source.fill(&mut buf).unwrap(), 8);
    let loud = 127.0 / 128.0;
    assert_eq!(buf[..4], [loud, loud, -1.0, loud]);
}
