// Copyright 2025 Brian Langenberger
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! A library for storing linear PCM at arbitrary bit depths
//! and measuring what each depth costs.
//!
//! Samples are captured as 16-bit linear PCM, quantized to
//! a chosen [`BitDepth`](depth::BitDepth), packed into a dense
//! little-endian bitstream and wrapped in a RIFF WAVE container
//! whose bits-per-sample field may hold values such as 1, 2 or 4
//! which standard WAVE readers do not understand.
//!
//! | Stage | Module |
//! |------:|--------|
//! | codes to octets | [`pack`] |
//! | samples to codes | [`quantize`] |
//! | octets to files | [`wave`] |
//! | signal-to-noise ratio | [`compare`] |
//! | rate × depth matrix | [`pipeline`] |
//!
//! # Example
//! ```
//! use pcm_depth::{depth::BitDepth, quantize, wave};
//!
//! let samples = [0i16, 16384, -16384, 32767];
//! let packed = quantize::encode_samples(&samples, BitDepth::Two).unwrap();
//! assert_eq!(packed.len(), 1); // four 2-bit codes in one byte
//!
//! let image = wave::encode(&packed, 8000, 1, BitDepth::Two).unwrap();
//! let decoded = wave::decode(&image).unwrap();
//! assert_eq!(decoded.format.depth(), BitDepth::Two);
//! assert_eq!(decoded.data, packed);
//! ```

pub mod audio;
pub mod capture;
pub mod compare;
pub mod depth;
pub mod pack;
pub mod pipeline;
pub mod playback;
pub mod quantize;
pub mod resample;
pub mod wave;

use std::path::PathBuf;

/// A possible error when packing, parsing or comparing audio
#[derive(Debug)]
pub enum Error {
    /// A general I/O error from the underlying stream
    Io(std::io::Error),
    /// A file to be read does not exist
    FileNotFound(PathBuf),
    /// A bit depth outside of 1, 2, 4, 8, 16 and 24
    UnsupportedDepth(u32),
    /// The RIFF or WAVE magic numbers are missing
    MalformedHeader,
    /// The "fmt " chunk describes something other than linear PCM
    UnsupportedFormat(u16),
    /// End of file reached before the "fmt " or "data" chunks
    TruncatedFile,
    /// Fewer bits in a packed stream than the codes requested
    TruncatedStream,
    /// Reference and candidate have different channel counts
    ChannelMismatch,
    /// A channel count of 0 or one too large for the container
    InvalidChannels,
    /// A sample rate of 0
    InvalidSampleRate,
    /// A payload too large for the container's 32-bit size fields
    ExcessiveData,
    /// A capture or playback device is missing or busy
    DeviceUnavailable(String),
    /// The resampler could not be built for the given rates
    Resampler(rubato::ResamplerConstructionError),
    /// The resampler failed while processing samples
    Resample(rubato::ResampleError),
}

impl From<std::io::Error> for Error {
    fn from(error: std::io::Error) -> Self {
        Self::Io(error)
    }
}

impl From<rubato::ResamplerConstructionError> for Error {
    fn from(error: rubato::ResamplerConstructionError) -> Self {
        Self::Resampler(error)
    }
}

impl From<rubato::ResampleError> for Error {
    fn from(error: rubato::ResampleError) -> Self {
        Self::Resample(error)
    }
}

impl std::error::Error for Error {}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Self::Io(e) => e.fmt(f),
            Self::FileNotFound(path) => write!(f, "file not found: {}", path.display()),
            Self::UnsupportedDepth(bits) => write!(f, "unsupported bit depth: {bits}"),
            Self::MalformedHeader => "missing RIFF WAVE header".fmt(f),
            Self::UnsupportedFormat(code) => {
                write!(f, "unsupported format code {code}, only linear PCM is supported")
            }
            Self::TruncatedFile => "file ends before its fmt or data chunk".fmt(f),
            Self::TruncatedStream => "packed stream too short for requested samples".fmt(f),
            Self::ChannelMismatch => "reference and candidate channel counts differ".fmt(f),
            Self::InvalidChannels => "invalid channel count".fmt(f),
            Self::InvalidSampleRate => "invalid sample rate".fmt(f),
            Self::ExcessiveData => "payload too large for WAVE file".fmt(f),
            Self::DeviceUnavailable(reason) => write!(f, "audio device unavailable: {reason}"),
            Self::Resampler(e) => e.fmt(f),
            Self::Resample(e) => e.fmt(f),
        }
    }
}

/// Opens a file for reading, reporting a missing file by name
pub(crate) fn open_file(path: &std::path::Path) -> Result<std::fs::File, Error> {
    std::fs::File::open(path).map_err(|err| match err.kind() {
        std::io::ErrorKind::NotFound => Error::FileNotFound(path.to_owned()),
        _ => Error::Io(err),
    })
}
