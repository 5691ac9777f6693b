#![allow(missing_docs)]
use clockless_envoy::pixel::{
    ColorOrder, DitherMode, PixelController, PixelSource, Rgbw, RgbwMode, as_cells,
};
use clockless_envoy::strip::Settings;
use clockless_envoy::transposer::{LaneWord, frame_words, transpose_lanes};
use clockless_envoy::{Error, RGB8, Result};

const NO_DITHER: Settings = Settings {
    dither: DitherMode::Disabled,
    ..Settings::DEFAULT
};

fn strip_pixels(lane: u8, len: usize) -> Vec<RGB8> {
    (0..len)
        .map(|index| {
            let index = (index % 256) as u8;
            RGB8::new(index, lane * 40 + 1, 255 - index)
        })
        .collect()
}

fn expected_bytes(pixels: &[RGB8]) -> Vec<u8> {
    pixels.iter().flat_map(|pixel| [pixel.r, pixel.g, pixel.b]).collect()
}

/// Rebuild one lane's byte stream from transposed words.
fn lane_bytes<W: LaneWord>(words: &[W], lane: usize, bits: usize) -> Vec<u8> {
    words
        .chunks(bits)
        .map(|chunk| {
            let top = chunk
                .iter()
                .fold(0_u8, |byte, word| (byte << 1) | u8::from(word.lane(lane)));
            top << (8 - bits)
        })
        .collect()
}

#[test]
fn unequal_strips_pad_with_black() -> Result<()> {
    let lengths = [100, 300, 150];
    let mut buffers: Vec<Vec<RGB8>> = lengths
        .iter()
        .enumerate()
        .map(|(lane, &len)| strip_pixels(lane as u8, len))
        .collect();
    let expected: Vec<Vec<u8>> = buffers.iter().map(|pixels| expected_bytes(pixels)).collect();

    let mut sources: Vec<PixelController<'_>> = buffers
        .iter_mut()
        .map(|pixels| PixelController::new(as_cells(pixels), ColorOrder::Rgb, &NO_DITHER, 255, 0))
        .collect();
    let mut lanes: Vec<(usize, &mut dyn PixelSource)> = sources
        .iter_mut()
        .enumerate()
        .map(|(lane, source)| (lane, source as &mut dyn PixelSource))
        .collect();

    let mut out = vec![0_u8; frame_words(300, 3, 8)];
    let words = transpose_lanes(&mut lanes, 8, &mut out)?;
    assert_eq!(words, 300 * 3 * 8);

    for (lane, expected) in expected.iter().enumerate() {
        let bytes = lane_bytes(&out[..words], lane, 8);
        assert_eq!(bytes.len(), 900);
        assert_eq!(&bytes[..expected.len()], expected.as_slice(), "lane {lane}");
        assert!(bytes[expected.len()..].iter().all(|&byte| byte == 0), "lane {lane} padding");
    }
    // lanes above the last one never go high
    assert!(out.iter().all(|word| word >> 3 == 0));
    // every source was consumed
    assert!(lanes.iter().all(|(_, source)| !source.has_more()));
    Ok(())
}

#[test]
fn lane_index_selects_the_word_bit() -> Result<()> {
    let mut pixels = [RGB8::new(0xFF, 0x00, 0x81)];
    let mut source = PixelController::new(as_cells(&mut pixels), ColorOrder::Rgb, &NO_DITHER, 255, 0);
    let mut lanes: [(usize, &mut dyn PixelSource); 1] = [(13, &mut source)];

    let mut out = [0_u16; 24];
    transpose_lanes(&mut lanes, 8, &mut out)?;

    assert!(out[..8].iter().all(|&word| word == 1 << 13));
    assert!(out[8..16].iter().all(|&word| word == 0));
    assert_eq!(out[16], 1 << 13);
    assert_eq!(out[23], 1 << 13);
    assert!(out[17..23].iter().all(|&word| word == 0));
    Ok(())
}

#[test]
fn narrow_peripherals_take_the_top_bits() -> Result<()> {
    let mut pixels = [RGB8::new(0xAB, 0xCD, 0xEF)];
    let mut source = PixelController::new(as_cells(&mut pixels), ColorOrder::Rgb, &NO_DITHER, 255, 0);
    let mut lanes: [(usize, &mut dyn PixelSource); 1] = [(0, &mut source)];

    let mut out = [0_u8; 12];
    let words = transpose_lanes(&mut lanes, 4, &mut out)?;

    assert_eq!(words, frame_words(1, 3, 4));
    assert_eq!(lane_bytes(&out, 0, 4), [0xA0, 0xC0, 0xE0]);
    Ok(())
}

#[test]
fn mixed_pixel_widths_are_rejected() {
    let mut rgb = [RGB8::new(1, 1, 1)];
    let mut rgbw = [RGB8::new(1, 1, 1)];
    let rgbw_settings = Settings {
        rgbw: Rgbw::new(RgbwMode::Exact),
        ..NO_DITHER
    };
    let mut first = PixelController::new(as_cells(&mut rgb), ColorOrder::Rgb, &NO_DITHER, 255, 0);
    let mut second =
        PixelController::new(as_cells(&mut rgbw), ColorOrder::Rgb, &rgbw_settings, 255, 0);
    let mut lanes: [(usize, &mut dyn PixelSource); 2] = [(0, &mut first), (1, &mut second)];

    let mut out = [0_u8; 64];
    assert_eq!(transpose_lanes(&mut lanes, 8, &mut out), Err(Error::MixedPixelWidth));
}

#[test]
fn short_output_is_rejected() {
    let mut pixels = [RGB8::default(); 4];
    let mut source = PixelController::new(as_cells(&mut pixels), ColorOrder::Rgb, &NO_DITHER, 255, 0);
    let mut lanes: [(usize, &mut dyn PixelSource); 1] = [(0, &mut source)];

    let mut out = [0_u8; 50];
    assert_eq!(
        transpose_lanes(&mut lanes, 8, &mut out),
        Err(Error::OutputTooSmall {
            needed: 96,
            available: 50
        })
    );
}

#[test]
fn lane_beyond_the_word_is_rejected() {
    let mut pixels = [RGB8::default()];
    let mut source = PixelController::new(as_cells(&mut pixels), ColorOrder::Rgb, &NO_DITHER, 255, 0);
    let mut lanes: [(usize, &mut dyn PixelSource); 1] = [(8, &mut source)];

    let mut out = [0_u8; 24];
    assert_eq!(
        transpose_lanes(&mut lanes, 8, &mut out),
        Err(Error::ChannelsExhausted { max: 8 })
    );
}

#[test]
fn no_lanes_means_no_words() -> Result<()> {
    let mut lanes: [(usize, &mut dyn PixelSource); 0] = [];
    let mut out = [0_u32; 4];
    assert_eq!(transpose_lanes(&mut lanes, 8, &mut out)?, 0);
    Ok(())
}
