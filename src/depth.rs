// Copyright 2025 Brian Langenberger
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! For handling the bit depths a stream may be stored at

use crate::Error;

/// A supported bits-per-sample value
///
/// | Depth | Levels | Container bytes per sample | Storage |
/// |------:|-------:|---------------------------:|---------|
/// | 1     | 2      | 1 | bit-packed, unsigned |
/// | 2     | 4      | 1 | bit-packed, unsigned |
/// | 4     | 16     | 1 | bit-packed, unsigned |
/// | 8     | 256    | 1 | unsigned |
/// | 16    | 65536  | 2 | signed, unchanged |
/// | 24    | 65536  | 3 | signed, widened from 16 bits |
///
/// # Example
/// ```
/// use pcm_depth::depth::BitDepth;
///
/// assert_eq!(BitDepth::try_from(4u32).unwrap(), BitDepth::Four);
/// assert!(BitDepth::try_from(12u32).is_err());
/// assert_eq!(BitDepth::Two.bytes_per_sample(), 1);
/// assert_eq!(BitDepth::TwentyFour.bytes_per_sample(), 3);
/// ```
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub enum BitDepth {
    /// 1 bit per sample
    One,
    /// 2 bits per sample
    Two,
    /// 4 bits per sample
    Four,
    /// 8 bits per sample
    Eight,
    /// 16 bits per sample
    Sixteen,
    /// 24 bits per sample
    TwentyFour,
}

impl BitDepth {
    /// All supported depths, from smallest to largest
    pub const ALL: [Self; 6] = [
        Self::One,
        Self::Two,
        Self::Four,
        Self::Eight,
        Self::Sixteen,
        Self::TwentyFour,
    ];

    /// Depth used when an operator asks for an unsupported one
    pub const DEFAULT: Self = Self::Sixteen;

    /// Returns our size in bits
    #[inline]
    pub fn bits(self) -> u32 {
        match self {
            Self::One => 1,
            Self::Two => 2,
            Self::Four => 4,
            Self::Eight => 8,
            Self::Sixteen => 16,
            Self::TwentyFour => 24,
        }
    }

    /// Returns bytes per sample as declared in a container header
    ///
    /// Sub-byte depths are rounded up to a whole byte,
    /// which overstates their true packed density.
    #[inline]
    pub fn bytes_per_sample(self) -> u16 {
        // bits() is at most 24
        self.bits().div_ceil(8) as u16
    }

    /// Returns the largest code representable at this depth
    #[inline]
    pub fn max_code(self) -> u32 {
        (1 << self.bits()) - 1
    }

    /// Whether samples are smaller than a byte and must be bit-packed
    #[inline]
    pub fn is_sub_byte(self) -> bool {
        self.bits() < 8
    }

    /// Whether ordinary WAVE readers understand this depth
    #[inline]
    pub fn is_standard(self) -> bool {
        !self.is_sub_byte()
    }

    /// Normalizes an operator-supplied depth
    ///
    /// Anything outside of the supported set falls back
    /// to [`BitDepth::DEFAULT`] with a warning.
    pub fn from_operator(bits: u32) -> Self {
        Self::try_from(bits).unwrap_or_else(|_| {
            tracing::warn!(bits, default = Self::DEFAULT.bits(), "unsupported bit depth");
            Self::DEFAULT
        })
    }
}

impl TryFrom<u32> for BitDepth {
    type Error = Error;

    fn try_from(bits: u32) -> Result<Self, Error> {
        match bits {
            1 => Ok(Self::One),
            2 => Ok(Self::Two),
            4 => Ok(Self::Four),
            8 => Ok(Self::Eight),
            16 => Ok(Self::Sixteen),
            24 => Ok(Self::TwentyFour),
            bits => Err(Error::UnsupportedDepth(bits)),
        }
    }
}

impl TryFrom<u16> for BitDepth {
    type Error = Error;

    #[inline]
    fn try_from(bits: u16) -> Result<Self, Error> {
        u32::from(bits).try_into()
    }
}

impl From<BitDepth> for u32 {
    #[inline]
    fn from(depth: BitDepth) -> Self {
        depth.bits()
    }
}

impl From<BitDepth> for u16 {
    #[inline]
    fn from(depth: BitDepth) -> Self {
        // bits() is at most 24
        depth.bits() as u16
    }
}

impl std::str::FromStr for BitDepth {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        s.trim()
            .parse::<u32>()
            .map_err(|_| Error::UnsupportedDepth(0))
            .and_then(Self::try_from)
    }
}

impl std::fmt::Display for BitDepth {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}-bit", self.bits())
    }
}

#[test]
fn test_supported_depths() {
    for depth in BitDepth::ALL {
        assert_eq!(BitDepth::try_from(depth.bits()).unwrap(), depth);
        assert_eq!(depth.max_code(), (1 << depth.bits()) - 1);
    }

    for bits in [0u32, 3, 5, 6, 7, 9, 12, 15, 17, 20, 23, 25, 32] {
        assert!(matches!(
            BitDepth::try_from(bits),
            Err(Error::UnsupportedDepth(b)) if b == bits
        ));
    }
}

#[test]
fn test_operator_fallback() {
    assert_eq!(BitDepth::from_operator(2), BitDepth::Two);
    assert_eq!(BitDepth::from_operator(24), BitDepth::TwentyFour);
    assert_eq!(BitDepth::from_operator(12), BitDepth::Sixteen);
    assert_eq!(BitDepth::from_operator(3), BitDepth::Sixteen);
    assert_eq!(BitDepth::from_operator(0), BitDepth::Sixteen);
}

#[test]
fn test_container_width() {
    assert_eq!(BitDepth::One.bytes_per_sample(), 1);
    assert_eq!(BitDepth::Four.bytes_per_sample(), 1);
    assert_eq!(BitDepth::Eight.bytes_per_sample(), 1);
    assert_eq!(BitDepth::Sixteen.bytes_per_sample(), 2);
    assert!(BitDepth::Four.is_sub_byte());
    assert!(BitDepth::Eight.is_standard());
    assert_eq!(" 8 ".parse::<BitDepth>().unwrap(), BitDepth::Eight);
}
