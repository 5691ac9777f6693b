//! Bit transposition for parallel (multi-lane) DMA output.
//!
//! A parallel peripheral shifts out one word per bit period; bit `i` of the word drives
//! lane `i`. [`transpose_lanes`] turns N per-strip byte streams into that word stream:
//!
//! ```text
//! for each LED index < max(len)
//!   for each byte slot of the LED
//!     gather that byte from every lane (0 once a lane is past its own length)
//!     emit one word per bit, MSB first, lane i in bit i
//! ```
//!
//! Short strips therefore read as black past their end, and strips of different lengths
//! share one transfer without per-strip padding buffers.

use core::fmt::Debug;

use crate::pixel::PixelSource;
use crate::{Error, Result};

/// An output word of a parallel peripheral, one bit per lane.
pub trait LaneWord: Copy + Debug + Default + Eq {
    /// Lanes one word can carry.
    const LANES: usize;

    /// All lanes low.
    const ZERO: Self;

    /// `self` with `lane` driven high.
    #[must_use]
    fn with_lane(self, lane: usize) -> Self;

    /// True if `lane` is high in `self`.
    fn lane(self, lane: usize) -> bool;
}

macro_rules! lane_word {
    ($($word:ty),+) => {
        $(
            impl LaneWord for $word {
                const LANES: usize = <$word>::BITS as usize;
                const ZERO: Self = 0;

                #[inline(always)]
                fn with_lane(self, lane: usize) -> Self {
                    self | (1 << lane)
                }

                #[inline(always)]
                fn lane(self, lane: usize) -> bool {
                    self & (1 << lane) != 0
                }
            }
        )+
    };
}

lane_word!(u8, u16, u32);

const MAX_LANES: usize = 32;

/// Words one frame occupies: `max_len` LEDs × `channels` bytes × `bits` per byte.
#[must_use]
pub const fn frame_words(max_len: usize, channels: usize, bits: u8) -> usize {
    max_len * channels * bits as usize
}

/// Transpose every lane's bytes into `out`, returning the number of words written.
///
/// Each entry of `lanes` is `(lane index, source)`. Only the top `bits` bits of each byte are
/// emitted (8 for a full-width peripheral). Every source is consumed to its end.
///
/// # Errors
///
/// - [`Error::MixedPixelWidth`] if lanes disagree on bytes per LED.
/// - [`Error::ChannelsExhausted`] if a lane index does not fit in `W`.
/// - [`Error::OutputTooSmall`] if `out` cannot hold [`frame_words`] words.
pub fn transpose_lanes<W: LaneWord>(
    lanes: &mut [(usize, &mut dyn PixelSource)],
    bits: u8,
    out: &mut [W],
) -> Result<usize> {
    let Some((_, first)) = lanes.first() else {
        return Ok(0);
    };
    let channels = first.channels();
    let lane_limit = W::LANES.min(MAX_LANES);
    let bits = bits.clamp(1, 8);
    if lanes.len() > lane_limit {
        return Err(Error::ChannelsExhausted { max: lane_limit });
    }

    let mut max_len = 0;
    for (lane, source) in lanes.iter() {
        if source.channels() != channels {
            return Err(Error::MixedPixelWidth);
        }
        if *lane >= lane_limit {
            return Err(Error::ChannelsExhausted { max: lane_limit });
        }
        max_len = max_len.max(source.pixel_count());
    }

    let needed = frame_words(max_len, channels, bits);
    let available = out.len();
    let out = out
        .get_mut(..needed)
        .ok_or(Error::OutputTooSmall { needed, available })?;

    let mut words = out.iter_mut();
    let mut bytes = [0_u8; MAX_LANES];
    for _ in 0..max_len {
        for slot in 0..channels {
            for ((_, source), byte) in lanes.iter().zip(bytes.iter_mut()) {
                *byte = if source.has_more() {
                    source.load_and_scale_channel(slot)
                } else {
                    0
                };
            }
            for bit in 0..bits {
                let mask = 0x80 >> bit;
                let word = lanes
                    .iter()
                    .zip(bytes)
                    .filter(|(_, byte)| byte & mask != 0)
                    .fold(W::ZERO, |word, ((lane, _), _)| word.with_lane(*lane));
                if let Some(out_word) = words.next() {
                    *out_word = word;
                }
            }
        }
        for (_, source) in lanes.iter_mut() {
            if source.has_more() {
                source.advance();
                source.step_dithering();
            }
        }
    }

    Ok(needed)
}
