// Copyright 2025 Brian Langenberger
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! For reading and writing RIFF WAVE containers
//!
//! Files are written with a fixed 44 byte header:
//!
//! | Offset | Bytes | Field |
//! |-------:|------:|-------|
//! | 0  | 4 | `RIFF` |
//! | 4  | 4 | file size minus 8 |
//! | 8  | 4 | `WAVE` |
//! | 12 | 4 | `fmt ` |
//! | 16 | 4 | chunk size, 16 |
//! | 20 | 2 | format code, 1 for linear PCM |
//! | 22 | 2 | channel count |
//! | 24 | 4 | sample rate |
//! | 28 | 4 | byte rate |
//! | 32 | 2 | block align |
//! | 34 | 2 | bits per sample |
//! | 36 | 4 | `data` |
//! | 40 | 4 | payload length |
//!
//! followed by the packed payload.
//! All fields are little-endian.
//!
//! The bits-per-sample field holds the nominal depth,
//! which may be 1, 2 or 4, while byte rate and block align
//! count each sample as `ceil(depth / 8)` bytes.
//! Only the bits-per-sample field determines how the payload
//! is unpacked; the byte-rounded fields cannot tell
//! a 2-bit file from a 4-bit one.

use crate::Error;
use crate::audio::Pcm;
use crate::depth::BitDepth;
use crate::pack::{PackedStream, unpack};
use crate::quantize::{dequantize, dequantize_float, encode_samples};
use bitstream_io::{
    ByteRead, ByteReader, ByteWrite, ByteWriter, FromByteStream, LittleEndian, ToByteStream,
};
use std::io::{BufReader, BufWriter, Read};
use std::path::Path;
use std::time::Duration;

const RIFF: [u8; 4] = *b"RIFF";
const WAVE: [u8; 4] = *b"WAVE";
const FMT: [u8; 4] = *b"fmt ";
const DATA: [u8; 4] = *b"data";

/// Bytes preceding the payload in files we write
pub const HEADER_LEN: usize = 44;

/// The format code for linear PCM
pub const PCM_FORMAT: u16 = 0x0001;

/// The contents of a "fmt " chunk
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct WaveFormat {
    sample_rate: u32,
    channels: u16,
    depth: BitDepth,
}

impl WaveFormat {
    /// Builds a new format
    ///
    /// # Errors
    ///
    /// Returns an error if the channel count is 0
    /// or too large for the block align field,
    /// or if the sample rate is 0 or too large
    /// for the byte rate field.
    pub fn new(sample_rate: u32, channels: u16, depth: BitDepth) -> Result<Self, Error> {
        let block_align = channels
            .checked_mul(depth.bytes_per_sample())
            .filter(|b| *b > 0)
            .ok_or(Error::InvalidChannels)?;

        match sample_rate.checked_mul(u32::from(block_align)) {
            Some(rate) if rate > 0 => Ok(Self {
                sample_rate,
                channels,
                depth,
            }),
            _ => Err(Error::InvalidSampleRate),
        }
    }

    /// Returns samples per second
    #[inline]
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Returns channel count
    #[inline]
    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Returns nominal bits per sample
    #[inline]
    pub fn depth(&self) -> BitDepth {
        self.depth
    }

    /// Returns the header's byte-rounded bytes per frame
    #[inline]
    pub fn block_align(&self) -> u16 {
        // checked by new()
        self.channels * self.depth.bytes_per_sample()
    }

    /// Returns the header's byte-rounded bytes per second
    #[inline]
    pub fn byte_rate(&self) -> u32 {
        // checked by new()
        self.sample_rate * u32::from(self.block_align())
    }

    /// Returns the number of whole frames a payload holds
    ///
    /// This uses the nominal depth, not the block align.
    #[inline]
    pub fn frames_in(&self, data: &PackedStream) -> usize {
        data.capacity(self.depth) / usize::from(self.channels)
    }

    /// Returns the playback duration of a payload
    pub fn duration_of(&self, data: &PackedStream) -> Duration {
        Duration::from_secs_f64(self.frames_in(data) as f64 / f64::from(self.sample_rate))
    }
}

impl ToByteStream for WaveFormat {
    type Error = std::io::Error;

    // yields entire fmt chunk, header included
    fn to_writer<W>(&self, w: &mut W) -> std::io::Result<()>
    where
        W: ByteWrite + ?Sized,
    {
        w.write_bytes(&FMT)?; // chunk ID
        w.write::<u32>(16)?; // chunk size
        w.write::<u16>(PCM_FORMAT)?;
        w.write(self.channels)?;
        w.write(self.sample_rate)?;
        w.write(self.byte_rate())?;
        w.write(self.block_align())?;
        w.write::<u16>(self.depth.into())?;
        Ok(())
    }
}

impl FromByteStream for WaveFormat {
    type Error = Error;

    // reads the first 16 bytes of a fmt chunk's body
    fn from_reader<R>(r: &mut R) -> Result<Self, Error>
    where
        R: ByteRead + ?Sized,
    {
        let format = r.read::<u16>()?;
        if format != PCM_FORMAT {
            return Err(Error::UnsupportedFormat(format));
        }
        let channels = r.read::<u16>()?;
        let sample_rate = r.read::<u32>()?;
        let _byte_rate = r.read::<u32>()?;
        let _block_align = r.read::<u16>()?;
        let depth = BitDepth::try_from(r.read::<u16>()?)?;

        Self::new(sample_rate, channels, depth)
    }
}

/// A complete container: format plus packed payload
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Wave {
    /// The payload's format
    pub format: WaveFormat,
    /// The packed payload
    pub data: PackedStream,
}

impl Wave {
    /// Quantizes and packs 16-bit samples at the given depth
    ///
    /// # Errors
    ///
    /// Returns an error if the samples' rate and channels
    /// cannot be stored at this depth.
    pub fn from_pcm(pcm: &Pcm, depth: BitDepth) -> Result<Self, Error> {
        Ok(Self {
            format: WaveFormat::new(pcm.sample_rate(), pcm.channels(), depth)?,
            data: encode_samples(pcm.samples(), depth)?,
        })
    }

    /// Returns the number of whole frames in the payload
    #[inline]
    pub fn frames(&self) -> usize {
        self.format.frames_in(&self.data)
    }

    /// Returns playback duration
    #[inline]
    pub fn duration(&self) -> Duration {
        self.format.duration_of(&self.data)
    }

    /// Unpacks and dequantizes the payload to 16-bit samples
    ///
    /// At sub-byte depths, padding bits wide enough to hold
    /// a whole frame decode as one more frame of code 0,
    /// which is a full-scale negative sample (-1.0 as a float).
    ///
    /// # Errors
    ///
    /// Passes through any unpacking error.
    pub fn to_pcm(&self) -> Result<Pcm, Error> {
        let depth = self.format.depth;
        Pcm::new(
            self.format.sample_rate,
            self.format.channels,
            unpack(&self.data, depth, self.sample_count())?
                .into_iter()
                .map(|c| dequantize(c, depth))
                .collect(),
        )
    }

    /// Unpacks and dequantizes the payload to interleaved floats
    ///
    /// # Errors
    ///
    /// Passes through any unpacking error.
    pub fn to_floats(&self) -> Result<Vec<f32>, Error> {
        let depth = self.format.depth;
        Ok(unpack(&self.data, depth, self.sample_count())?
            .into_iter()
            .map(|c| dequantize_float(c, depth))
            .collect())
    }

    /// Returns a complete file image
    ///
    /// # Errors
    ///
    /// Returns an error if the payload is too large.
    pub fn to_bytes(&self) -> Result<Vec<u8>, Error> {
        let mut image = Vec::with_capacity(HEADER_LEN + self.data.len() + 1);
        write_to(&mut image, &self.data, self.format)?;
        Ok(image)
    }

    #[inline]
    fn sample_count(&self) -> usize {
        self.frames() * usize::from(self.format.channels)
    }
}

/// Encodes a packed payload to a complete file image
///
/// # Errors
///
/// Returns an error if the format is invalid
/// or the payload is too large for the container.
///
/// # Example
/// ```
/// use pcm_depth::{depth::BitDepth, pack::pack, wave::encode};
///
/// let packed = pack(&[1; 100], BitDepth::Two).unwrap();
/// let image = encode(&packed, 8000, 1, BitDepth::Two).unwrap();
/// assert_eq!(&image[28..32], 8000u32.to_le_bytes()); // byte rate
/// assert_eq!(&image[34..36], 2u16.to_le_bytes());    // bits per sample
/// assert_eq!(&image[40..44], 25u32.to_le_bytes());   // payload length
/// ```
pub fn encode(
    packed: &PackedStream,
    sample_rate: u32,
    channels: u16,
    depth: BitDepth,
) -> Result<Vec<u8>, Error> {
    let mut image = Vec::with_capacity(HEADER_LEN + packed.len() + 1);
    write_to(
        &mut image,
        packed,
        WaveFormat::new(sample_rate, channels, depth)?,
    )?;
    Ok(image)
}

/// Decodes a complete file image
///
/// Chunks are located by tag, in any order,
/// and unrecognized chunks are skipped.
///
/// # Errors
///
/// Returns [`Error::MalformedHeader`] if the RIFF WAVE tags are missing,
/// [`Error::UnsupportedFormat`] if the data is not linear PCM,
/// [`Error::UnsupportedDepth`] for unknown bits-per-sample values
/// and [`Error::TruncatedFile`] if the "fmt " or "data" chunk
/// is missing or cut short.
pub fn decode(image: &[u8]) -> Result<Wave, Error> {
    WaveReader::new(image)?.into_wave()
}

/// Writes a container to the given stream
///
/// An odd-sized payload is followed by a pad byte.
///
/// # Errors
///
/// Returns an error if the payload is too large for the container
/// or passes through any I/O error.
pub fn write_to<W: std::io::Write>(
    writer: W,
    packed: &PackedStream,
    format: WaveFormat,
) -> Result<(), Error> {
    let data_len = u32::try_from(packed.len()).map_err(|_| Error::ExcessiveData)?;
    let pad = data_len % 2;
    let riff_len = (4 + 24 + 8 + pad)
        .checked_add(data_len)
        .ok_or(Error::ExcessiveData)?;

    let mut w = ByteWriter::endian(writer, LittleEndian);
    w.write_bytes(&RIFF)?;
    w.write(riff_len)?;
    w.write_bytes(&WAVE)?;
    w.build(&format)?;
    w.write_bytes(&DATA)?;
    w.write(data_len)?;
    w.write_bytes(packed.as_bytes())?;
    if pad == 1 {
        w.write::<u8>(0)?;
    }
    std::io::Write::flush(w.writer())?;
    Ok(())
}

/// Writes a container to disk
///
/// # Errors
///
/// Returns an error if the file cannot be created
/// or the payload is too large.
pub fn write<P: AsRef<Path>>(path: P, wave: &Wave) -> Result<(), Error> {
    write_to(
        BufWriter::new(std::fs::File::create(path.as_ref())?),
        &wave.data,
        wave.format,
    )
}

/// Reads a complete container from disk
///
/// # Errors
///
/// Returns [`Error::FileNotFound`] for missing files
/// and any error from [`decode`].
pub fn read<P: AsRef<Path>>(path: P) -> Result<Wave, Error> {
    WaveReader::open(path)?.into_wave()
}

/// Reads only a container's format from disk
///
/// # Errors
///
/// Returns [`Error::FileNotFound`] for missing files
/// and any header error from [`decode`].
pub fn read_format<P: AsRef<Path>>(path: P) -> Result<WaveFormat, Error> {
    WaveReader::open(path).map(|r| r.format())
}

/// A reader positioned at the payload of a container
///
/// Reading yields the payload's packed bytes.
pub struct WaveReader<R> {
    format: WaveFormat,
    data_len: u32,
    payload: Payload<R>,
}

enum Payload<R> {
    Streamed(std::io::Take<R>),
    // payload found ahead of the fmt chunk
    Buffered(std::io::Cursor<Vec<u8>>),
}

impl WaveReader<BufReader<std::fs::File>> {
    /// Opens container file
    ///
    /// # Errors
    ///
    /// Returns [`Error::FileNotFound`] for missing files
    /// and any header error from [`WaveReader::new`].
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        crate::open_file(path.as_ref()).and_then(|f| Self::new(BufReader::new(f)))
    }
}

impl<R: Read> WaveReader<R> {
    /// Parses header chunks until both "fmt " and "data" are found
    ///
    /// # Errors
    ///
    /// Returns the same header errors as [`decode`].
    pub fn new(reader: R) -> Result<Self, Error> {
        let mut r = ByteReader::endian(reader, LittleEndian);

        let riff = r.read::<[u8; 4]>().map_err(eof_as(Error::MalformedHeader))?;
        let _riff_len = r.read::<u32>().map_err(eof_as(Error::MalformedHeader))?;
        let wave = r.read::<[u8; 4]>().map_err(eof_as(Error::MalformedHeader))?;
        if riff != RIFF || wave != WAVE {
            return Err(Error::MalformedHeader);
        }

        let mut format = None;
        let mut early_data: Option<Vec<u8>> = None;

        while let Some((id, size)) = read_chunk_header(&mut r)? {
            match id {
                FMT => {
                    if size < 16 {
                        return Err(Error::MalformedHeader);
                    }
                    let fmt = r.parse::<WaveFormat>().map_err(|err| match err {
                        Error::Io(err) => eof_as(Error::TruncatedFile)(err),
                        err => err,
                    })?;
                    skip(&mut r, size - 16)?;
                    skip_pad(&mut r, size)?;

                    match early_data.take() {
                        Some(data) => {
                            return Ok(Self {
                                format: fmt,
                                data_len: size_of_data(&data),
                                payload: Payload::Buffered(std::io::Cursor::new(data)),
                            });
                        }
                        None => format = Some(fmt),
                    }
                }
                DATA => match format {
                    Some(format) => {
                        tracing::debug!(
                            sample_rate = format.sample_rate,
                            channels = format.channels,
                            bits = format.depth.bits(),
                            data_len = size,
                            "found WAVE payload"
                        );
                        return Ok(Self {
                            format,
                            data_len: size,
                            payload: Payload::Streamed(r.into_reader().take(size.into())),
                        });
                    }
                    None => {
                        let mut data = Vec::with_capacity(reservation(size));
                        r.reader().take(size.into()).read_to_end(&mut data)?;
                        if data.len() < size as usize {
                            return Err(Error::TruncatedFile);
                        }
                        skip_pad(&mut r, size)?;
                        early_data = Some(data);
                    }
                },
                _ => {
                    skip(&mut r, size)?;
                    skip_pad(&mut r, size)?;
                }
            }
        }

        Err(Error::TruncatedFile)
    }

    /// Returns the container's format
    #[inline]
    pub fn format(&self) -> WaveFormat {
        self.format
    }

    /// Returns the payload length declared by the data chunk
    #[inline]
    pub fn data_len(&self) -> u32 {
        self.data_len
    }

    /// Returns the number of whole frames the declared payload holds
    pub fn frames(&self) -> usize {
        (self.data_len as usize * 8 / self.format.depth.bits() as usize)
            / usize::from(self.format.channels)
    }

    /// Reads the whole payload
    ///
    /// # Errors
    ///
    /// Returns [`Error::TruncatedFile`] if the file ends
    /// before the declared payload length.
    pub fn into_wave(mut self) -> Result<Wave, Error> {
        let mut data = Vec::with_capacity(reservation(self.data_len));
        self.read_to_end(&mut data)?;
        if data.len() < self.data_len as usize {
            return Err(Error::TruncatedFile);
        }

        Ok(Wave {
            format: self.format,
            data: PackedStream::from_bytes(data),
        })
    }
}

impl<R: Read> Read for WaveReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match &mut self.payload {
            Payload::Streamed(r) => r.read(buf),
            Payload::Buffered(r) => r.read(buf),
        }
    }
}

fn read_chunk_header<R: Read>(
    r: &mut ByteReader<R, LittleEndian>,
) -> Result<Option<([u8; 4], u32)>, Error> {
    let mut id = [0; 4];
    match r.read_bytes(&mut id) {
        Ok(()) => Ok(Some((
            id,
            r.read::<u32>().map_err(eof_as(Error::TruncatedFile))?,
        ))),
        Err(err) if err.kind() == std::io::ErrorKind::UnexpectedEof => Ok(None),
        Err(err) => Err(Error::Io(err)),
    }
}

fn skip<R: Read>(r: &mut ByteReader<R, LittleEndian>, bytes: u32) -> Result<(), Error> {
    r.skip(bytes).map_err(eof_as(Error::TruncatedFile))
}

// RIFF chunks are word-aligned
fn skip_pad<R: Read>(r: &mut ByteReader<R, LittleEndian>, size: u32) -> Result<(), Error> {
    match size % 2 {
        1 => skip(r, 1),
        _ => Ok(()),
    }
}

fn eof_as(error: Error) -> impl FnOnce(std::io::Error) -> Error {
    move |err| match err.kind() {
        std::io::ErrorKind::UnexpectedEof => error,
        _ => Error::Io(err),
    }
}

// declared sizes are untrusted until the bytes arrive
#[inline]
fn reservation(size: u32) -> usize {
    const MAX_RESERVATION: usize = 1 << 20;

    (size as usize).min(MAX_RESERVATION)
}

#[inline]
fn size_of_data(data: &[u8]) -> u32 {
    // read from a u32 length field
    data.len() as u32
}

#[test]
fn test_header_layout() {
    use crate::pack::pack;

    let packed = pack(&[2; 100], BitDepth::Two).unwrap();
    let image = encode(&packed, 8000, 1, BitDepth::Two).unwrap();

    assert_eq!(&image[0..4], b"RIFF");
    assert_eq!(&image[4..8], (36u32 + 25 + 1).to_le_bytes());
    assert_eq!(&image[8..12], b"WAVE");
    assert_eq!(&image[12..16], b"fmt ");
    assert_eq!(&image[16..20], 16u32.to_le_bytes());
    assert_eq!(&image[20..22], 1u16.to_le_bytes());
    assert_eq!(&image[22..24], 1u16.to_le_bytes());
    assert_eq!(&image[24..28], 8000u32.to_le_bytes());
    assert_eq!(&image[28..32], 8000u32.to_le_bytes());
    assert_eq!(&image[32..34], 1u16.to_le_bytes());
    assert_eq!(&image[34..36], 2u16.to_le_bytes());
    assert_eq!(&image[36..40], b"data");
    assert_eq!(&image[40..44], 25u32.to_le_bytes());
    assert_eq!(&image[44..69], packed.as_bytes());
    assert_eq!(image.len(), 44 + 25 + 1);
}

#[test]
fn test_standard_header_fields() {
    let format = WaveFormat::new(44100, 2, BitDepth::TwentyFour).unwrap();
    assert_eq!(format.block_align(), 6);
    assert_eq!(format.byte_rate(), 44100 * 6);

    let format = WaveFormat::new(22050, 2, BitDepth::Four).unwrap();
    assert_eq!(format.block_align(), 2);
    assert_eq!(format.byte_rate(), 44100);

    assert!(matches!(
        WaveFormat::new(8000, 0, BitDepth::Eight),
        Err(Error::InvalidChannels)
    ));
    assert!(matches!(
        WaveFormat::new(0, 1, BitDepth::Eight),
        Err(Error::InvalidSampleRate)
    ));
    assert!(matches!(
        WaveFormat::new(8000, u16::MAX, BitDepth::Sixteen),
        Err(Error::InvalidChannels)
    ));
    assert!(matches!(
        WaveFormat::new(u32::MAX, 2, BitDepth::Sixteen),
        Err(Error::InvalidSampleRate)
    ));
}

#[test]
fn test_nominal_depth_is_authoritative() {
    use crate::pack::pack;

    // same byte-rounded header fields, different packing
    let two = encode(&pack(&[1; 8], BitDepth::Two).unwrap(), 8000, 1, BitDepth::Two).unwrap();
    let four = encode(&pack(&[1; 4], BitDepth::Four).unwrap(), 8000, 1, BitDepth::Four).unwrap();
    assert_eq!(two[28..34], four[28..34]);

    let two = decode(&two).unwrap();
    let four = decode(&four).unwrap();
    assert_eq!(two.frames(), 8);
    assert_eq!(four.frames(), 4);
}

#[test]
fn test_pcm_roundtrip() {
    let pcm = Pcm::new(16000, 2, vec![0, -1, 1000, -1000, i16::MAX, i16::MIN]).unwrap();

    for depth in [BitDepth::Sixteen, BitDepth::TwentyFour] {
        let wave = Wave::from_pcm(&pcm, depth).unwrap();
        assert_eq!(decode(&wave.to_bytes().unwrap()).unwrap().to_pcm().unwrap(), pcm);
    }

    // the container does not record a sample count,
    // so padding bits wide enough for a frame read back as one
    let wave = Wave::from_pcm(&pcm, BitDepth::Two).unwrap();
    let expected = Pcm::new(16000, 2, vec![0, -16384, 0, -16384, 16384, -32768]).unwrap();
    let decoded = decode(&wave.to_bytes().unwrap()).unwrap().to_pcm().unwrap();
    assert_eq!(decoded.frames(), 4);
    assert_eq!(&decoded.samples()[0..6], expected.samples());
}
