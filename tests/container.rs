// Copyright 2025 Brian Langenberger
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use pcm_depth::{
    Error,
    depth::BitDepth,
    pack::pack,
    wave::{self, HEADER_LEN, WaveReader},
};

fn chunk(id: &[u8; 4], body: &[u8]) -> Vec<u8> {
    let mut chunk = id.to_vec();
    chunk.extend((body.len() as u32).to_le_bytes());
    chunk.extend(body);
    if body.len() % 2 == 1 {
        chunk.push(0);
    }
    chunk
}

fn fmt_body(format: u16, channels: u16, sample_rate: u32, bits: u16) -> Vec<u8> {
    let width = u32::from(bits.div_ceil(8));
    let mut body = Vec::new();
    body.extend(format.to_le_bytes());
    body.extend(channels.to_le_bytes());
    body.extend(sample_rate.to_le_bytes());
    body.extend((sample_rate * u32::from(channels) * width).to_le_bytes());
    body.extend(((u32::from(channels) * width) as u16).to_le_bytes());
    body.extend(bits.to_le_bytes());
    body
}

fn riff(chunks: &[Vec<u8>]) -> Vec<u8> {
    let body = chunks.concat();
    let mut image = b"RIFF".to_vec();
    image.extend((body.len() as u32 + 4).to_le_bytes());
    image.extend(b"WAVE");
    image.extend(body);
    image
}

#[test]
fn test_every_depth_roundtrip() {
    for depth in BitDepth::ALL {
        for channels in [1, 2] {
            let codes = std::iter::repeat_with(|| fastrand::u32(0..=depth.max_code()))
                .take(fastrand::usize(1..300))
                .collect::<Vec<_>>();
            let packed = pack(&codes, depth).unwrap();

            let image = wave::encode(&packed, 22050, channels, depth).unwrap();
            assert_eq!(image.len(), HEADER_LEN + packed.len() + packed.len() % 2);

            let decoded = wave::decode(&image).unwrap();
            assert_eq!(decoded.format.sample_rate(), 22050);
            assert_eq!(decoded.format.channels(), channels);
            assert_eq!(decoded.format.depth(), depth);
            assert_eq!(decoded.data, packed);
        }
    }
}

#[test]
fn test_hundred_two_bit_codes() {
    let image = wave::encode(&pack(&[2; 100], BitDepth::Two).unwrap(), 8000, 1, BitDepth::Two)
        .unwrap();

    assert_eq!(&image[0..4], b"RIFF");
    assert_eq!(&image[4..8], (36u32 + 25 + 1).to_le_bytes());
    assert_eq!(&image[8..16], b"WAVEfmt ");
    assert_eq!(&image[16..20], 16u32.to_le_bytes());
    assert_eq!(&image[20..22], 1u16.to_le_bytes());
    assert_eq!(&image[28..32], 8000u32.to_le_bytes());
    assert_eq!(&image[32..34], 1u16.to_le_bytes());
    assert_eq!(&image[34..36], 2u16.to_le_bytes());
    assert_eq!(&image[36..40], b"data");
    assert_eq!(&image[40..44], 25u32.to_le_bytes());

    // the odd payload is padded to a word boundary
    assert_eq!(image.len(), 44 + 25 + 1);
    assert_eq!(image.last(), Some(&0));
}

#[test]
fn test_non_pcm_format() {
    let image = riff(&[
        chunk(b"fmt ", &fmt_body(2, 1, 8000, 4)),
        chunk(b"data", &[0; 4]),
    ]);
    assert!(matches!(
        wave::decode(&image),
        Err(Error::UnsupportedFormat(2))
    ));
}

#[test]
fn test_unknown_depth() {
    let image = riff(&[
        chunk(b"fmt ", &fmt_body(1, 1, 8000, 3)),
        chunk(b"data", &[0; 4]),
    ]);
    assert!(matches!(
        wave::decode(&image),
        Err(Error::UnsupportedDepth(3))
    ));
}

#[test]
fn test_chunk_order() {
    let payload = [0x1B, 0xE4, 0x55];

    // data ahead of fmt, with an odd-sized chunk of unknown type between
    let image = riff(&[
        chunk(b"data", &payload),
        chunk(b"LIST", b"abc"),
        chunk(b"fmt ", &fmt_body(1, 1, 8000, 2)),
    ]);
    let decoded = wave::decode(&image).unwrap();
    assert_eq!(decoded.format.depth(), BitDepth::Two);
    assert_eq!(decoded.data.as_bytes(), payload);
    assert_eq!(decoded.frames(), 12);

    // an extended fmt chunk and a trailing chunk after the data
    let mut fmt = fmt_body(1, 2, 8000, 4);
    fmt.extend([0, 0]);
    let image = riff(&[
        chunk(b"fact", &[1, 2, 3, 4]),
        chunk(b"fmt ", &fmt),
        chunk(b"data", &payload),
        chunk(b"LIST", b"trailing"),
    ]);
    let decoded = wave::decode(&image).unwrap();
    assert_eq!(decoded.format.channels(), 2);
    assert_eq!(decoded.format.depth(), BitDepth::Four);
    assert_eq!(decoded.data.as_bytes(), payload);
}

#[test]
fn test_truncation() {
    let image = wave::encode(
        &pack(&[1; 64], BitDepth::Four).unwrap(),
        8000,
        1,
        BitDepth::Four,
    )
    .unwrap();

    // no data chunk at all
    assert!(matches!(
        wave::decode(&image[..36]),
        Err(Error::TruncatedFile)
    ));

    // fmt chunk cut short
    assert!(matches!(
        wave::decode(&image[..30]),
        Err(Error::TruncatedFile)
    ));

    // payload shorter than declared
    assert!(matches!(
        wave::decode(&image[..image.len() - 5]),
        Err(Error::TruncatedFile)
    ));

    // too short to even hold the magic numbers
    assert!(matches!(
        wave::decode(&image[..6]),
        Err(Error::MalformedHeader)
    ));
}

#[test]
fn test_magic_corruption() {
    let image = wave::encode(
        &pack(&[5; 10], BitDepth::Eight).unwrap(),
        8000,
        1,
        BitDepth::Eight,
    )
    .unwrap();
    assert!(wave::decode(&image).is_ok());

    let magic = [0usize, 1, 2, 3, 8, 9, 10, 11];

    for _ in 0..100 {
        let mut image = image.clone();
        image[magic[fastrand::usize(..magic.len())]] ^= 1 << fastrand::u32(0..8);
        assert!(matches!(wave::decode(&image), Err(Error::MalformedHeader)));
    }
}

#[test]
fn test_files() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("take.wav");

    let wave = wave::decode(
        &wave::encode(
            &pack(&[0, 1, 0, 1, 1], BitDepth::One).unwrap(),
            8000,
            1,
            BitDepth::One,
        )
        .unwrap(),
    )
    .unwrap();

    wave::write(&path, &wave).unwrap();
    assert_eq!(wave::read(&path).unwrap(), wave);

    let format = wave::read_format(&path).unwrap();
    assert_eq!(format.depth(), BitDepth::One);
    assert_eq!(format.block_align(), 1);

    let reader = WaveReader::open(&path).unwrap();
    assert_eq!(reader.data_len(), 1);
    assert_eq!(reader.frames(), 8);

    let missing = dir.path().join("missing.wav");
    assert!(matches!(
        wave::read(&missing),
        Err(Error::FileNotFound(p)) if p == missing
    ));
}

#[test]
fn test_oversized_payload_declaration() {
    let mut huge_data = b"data".to_vec();
    huge_data.extend(0xFFFF_FFF0u32.to_le_bytes());
    huge_data.extend([0x55; 8]);

    // payload declared ahead of the fmt chunk
    let mut image = b"RIFF".to_vec();
    image.extend(100u32.to_le_bytes());
    image.extend(b"WAVE");
    image.extend(&huge_data);
    assert!(matches!(wave::decode(&image), Err(Error::TruncatedFile)));

    // payload declared after the fmt chunk
    let image = riff(&[chunk(b"fmt ", &fmt_body(1, 1, 8000, 4)), huge_data]);
    assert!(matches!(wave::decode(&image), Err(Error::TruncatedFile)));

    let reader = WaveReader::new(image.as_slice()).unwrap();
    assert_eq!(reader.data_len(), 0xFFFF_FFF0);
    assert!(matches!(reader.into_wave(), Err(Error::TruncatedFile)));
}
