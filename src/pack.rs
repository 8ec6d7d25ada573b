// Copyright 2025 Brian Langenberger
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! For packing codes into a dense bitstream and back
//!
//! Every depth follows the same convention: code `i` occupies
//! bits `i * depth` through `i * depth + depth - 1` of the stream,
//! where bit `b` lives in byte `b / 8` at position `b % 8`,
//! counting from the least-significant bit.
//! Codes are never aligned to byte boundaries,
//! so three 2-bit codes share a single byte:
//!
//! ```text
//! byte 0: [pad pad c2 c2 c1 c1 c0 c0]
//!          MSB                   LSB
//! ```

use crate::Error;
use crate::depth::BitDepth;
use bitstream_io::{BitRead, BitReader, BitWrite, BitWriter, LittleEndian};

/// An unsigned quantized sample, `0..=depth.max_code()`
pub type Code = u32;

/// Packed codes along with how many of their bits are meaningful
///
/// Streams built by [`pack`] know their exact bit length.
/// Streams read back from a container only know their byte length,
/// so every bit of their final byte counts as valid.
/// Two streams are equal when their bytes are,
/// whatever their valid bit counts.
#[derive(Clone, Debug, Default)]
pub struct PackedStream {
    bytes: Vec<u8>,
    bits: usize,
}

impl PackedStream {
    /// Wraps raw bytes whose every bit is considered valid
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self {
            bits: bytes.len() * 8,
            bytes,
        }
    }

    /// Returns the packed bytes
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Returns the packed bytes, consuming the stream
    #[inline]
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// Returns the stream's length in bytes
    #[inline]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether the stream holds no bytes
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Returns the number of valid bits
    #[inline]
    pub fn bits(&self) -> usize {
        self.bits
    }

    /// Returns the number of whole codes the valid bits hold
    #[inline]
    pub fn capacity(&self, depth: BitDepth) -> usize {
        self.bits / depth.bits() as usize
    }
}

impl PartialEq for PackedStream {
    fn eq(&self, other: &Self) -> bool {
        self.bytes == other.bytes
    }
}

impl Eq for PackedStream {}

impl AsRef<[u8]> for PackedStream {
    fn as_ref(&self) -> &[u8] {
        &self.bytes
    }
}

/// Returns the number of bytes `count` codes occupy when packed
///
/// # Example
/// ```
/// use pcm_depth::{depth::BitDepth, pack::packed_len};
///
/// assert_eq!(packed_len(3, BitDepth::Two), 1);
/// assert_eq!(packed_len(100, BitDepth::Two), 25);
/// assert_eq!(packed_len(5, BitDepth::TwentyFour), 15);
/// ```
#[inline]
pub fn packed_len(count: usize, depth: BitDepth) -> usize {
    (count * depth.bits() as usize).div_ceil(8)
}

/// Packs codes into a new stream
///
/// Bits of a code above `depth` are ignored.
/// A partially-filled final byte is padded with 0 bits.
///
/// # Errors
///
/// Packing to memory does not fail in practice;
/// the error is passed through from the bit writer.
///
/// # Example
/// ```
/// use pcm_depth::{depth::BitDepth, pack::pack};
///
/// let stream = pack(&[0b01, 0b10, 0b11], BitDepth::Two).unwrap();
/// assert_eq!(stream.as_bytes(), [0b00_11_10_01]);
/// assert_eq!(stream.bits(), 6);
///
/// let stream = pack(&[0x1, 0xF], BitDepth::Four).unwrap();
/// assert_eq!(stream.as_bytes(), [0xF1]);
/// ```
pub fn pack(codes: &[Code], depth: BitDepth) -> Result<PackedStream, Error> {
    let bits = depth.bits();
    let mask = depth.max_code();

    let mut w = BitWriter::endian(
        Vec::with_capacity(packed_len(codes.len(), depth)),
        LittleEndian,
    );
    for code in codes {
        w.write_var::<u32>(bits, code & mask)?;
    }
    w.byte_align()?;

    Ok(PackedStream {
        bytes: w.into_writer(),
        bits: codes.len() * bits as usize,
    })
}

/// Unpacks exactly `count` codes from a packed stream
///
/// Any bits beyond the final requested code are left unread.
///
/// # Errors
///
/// Returns [`Error::TruncatedStream`] if the stream holds
/// fewer than `count * depth` valid bits.
///
/// # Example
/// ```
/// use pcm_depth::{Error, depth::BitDepth, pack::{pack, unpack}};
///
/// let stream = pack(&[0b01, 0b10, 0b11], BitDepth::Two).unwrap();
/// assert_eq!(unpack(&stream, BitDepth::Two, 3).unwrap(), [0b01, 0b10, 0b11]);
/// assert!(matches!(
///     unpack(&stream, BitDepth::Two, 4),
///     Err(Error::TruncatedStream),
/// ));
/// ```
pub fn unpack(stream: &PackedStream, depth: BitDepth, count: usize) -> Result<Vec<Code>, Error> {
    if count > stream.capacity(depth) {
        return Err(Error::TruncatedStream);
    }

    let bits = depth.bits();
    let mut r = BitReader::endian(stream.as_bytes(), LittleEndian);
    (0..count)
        .map(|_| r.read_var::<u32>(bits).map_err(|_| Error::TruncatedStream))
        .collect()
}

/// Unpacks as many whole codes as the stream's valid bits hold
///
/// Trailing bits too few to form another code are ignored.
pub fn unpack_all(stream: &PackedStream, depth: BitDepth) -> Result<Vec<Code>, Error> {
    unpack(stream, depth, stream.capacity(depth))
}

#[test]
fn test_lsb_first_layout() {
    // a 1-bit stream reads like the byte's bits in reverse
    assert_eq!(
        pack(&[1, 0, 0, 0, 0, 0, 0, 1, 1], BitDepth::One)
            .unwrap()
            .as_bytes(),
        [0b1000_0001, 0b0000_0001]
    );

    // 4-bit codes fill the low nibble first
    assert_eq!(
        pack(&[0xA, 0xB, 0xC], BitDepth::Four).unwrap().as_bytes(),
        [0xBA, 0x0C]
    );

    // 24-bit codes are plain little-endian triplets
    assert_eq!(
        pack(&[0x123456, 0xABCDEF], BitDepth::TwentyFour)
            .unwrap()
            .as_bytes(),
        [0x56, 0x34, 0x12, 0xEF, 0xCD, 0xAB]
    );

    // 16-bit codes are plain little-endian pairs
    assert_eq!(
        pack(&[0x8000, 0x00FF], BitDepth::Sixteen)
            .unwrap()
            .as_bytes(),
        [0x00, 0x80, 0xFF, 0x00]
    );
}

#[test]
fn test_excess_bits_ignored() {
    assert_eq!(pack(&[0xFF], BitDepth::Two).unwrap().as_bytes(), [0b11]);
    assert_eq!(
        pack(&[0x1_0000], BitDepth::Sixteen).unwrap().as_bytes(),
        [0, 0]
    );
}

#[test]
fn test_partial_byte() {
    let stream = pack(&[3, 2, 1], BitDepth::Two).unwrap();
    assert_eq!(stream.len(), 1);
    assert_eq!(unpack(&stream, BitDepth::Two, 3).unwrap(), [3, 2, 1]);
    assert!(matches!(
        unpack(&stream, BitDepth::Two, 4),
        Err(Error::TruncatedStream)
    ));

    // the same byte read back without a known length
    // exposes its padding as one more code
    let raw = PackedStream::from_bytes(stream.into_bytes());
    assert_eq!(unpack_all(&raw, BitDepth::Two).unwrap(), [3, 2, 1, 0]);
    assert!(matches!(
        unpack(&raw, BitDepth::Two, 5),
        Err(Error::TruncatedStream)
    ));

    // five 4-bit codes leave a half-filled byte
    let stream = pack(&[1, 2, 3, 4, 5], BitDepth::Four).unwrap();
    assert_eq!(stream.len(), 3);
    assert_eq!(unpack_all(&stream, BitDepth::Four).unwrap(), [1, 2, 3, 4, 5]);
}

#[test]
fn test_empty() {
    for depth in BitDepth::ALL {
        let stream = pack(&[], depth).unwrap();
        assert!(stream.is_empty());
        assert!(unpack(&stream, depth, 0).unwrap().is_empty());
        assert!(matches!(
            unpack(&stream, depth, 1),
            Err(Error::TruncatedStream)
        ));
    }
}

#[test]
fn test_equality_ignores_valid_bits() {
    let packed = pack(&[1, 2, 3], BitDepth::Two).unwrap();
    let read_back = PackedStream::from_bytes(packed.as_bytes().to_vec());
    assert_eq!(packed.bits(), 6);
    assert_eq!(read_back.bits(), 8);
    assert_eq!(read_back, packed);
    assert_ne!(read_back, PackedStream::from_bytes(vec![0x39, 0x00]));
}
