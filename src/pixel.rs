//! The byte source a transmitter pulls from, and the reference implementation over RGB buffers.
//!
//! A transmitter never does color math itself. It asks a [`PixelSource`] for the next raw
//! byte, that byte's dither offset, and its 8-bit scale, then multiplies bit-serially while the
//! previous byte is on the wire. [`PixelController`] is the collaborator used by every driver in
//! this crate: it reads a caller-owned `&[Cell<RGB8>]`, applies the construction-time
//! [`ColorOrder`], folds brightness × correction × temperature into one scale per channel, and
//! runs binary temporal dithering.

use core::cell::Cell;

use smart_leds::RGB8;

use crate::math8::{ScaleStepper, dither8, scale8};
use crate::strip::Settings;

// ============================================================================
// Configuration
// ============================================================================

/// Wire order of the three color channels.
///
/// Applied as a lookup when a byte is indexed, never as a branch in the emit loop.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ColorOrder {
    /// Red, green, blue.
    Rgb,
    /// Red, blue, green.
    Rbg,
    /// Green, red, blue (WS2812 native).
    #[default]
    Grb,
    /// Green, blue, red.
    Gbr,
    /// Blue, red, green.
    Brg,
    /// Blue, green, red.
    Bgr,
}

impl ColorOrder {
    /// For each wire slot, the source channel (0 = red, 1 = green, 2 = blue) it carries.
    #[must_use]
    pub const fn permutation(self) -> [usize; 3] {
        match self {
            Self::Rgb => [0, 1, 2],
            Self::Rbg => [0, 2, 1],
            Self::Grb => [1, 0, 2],
            Self::Gbr => [1, 2, 0],
            Self::Brg => [2, 0, 1],
            Self::Bgr => [2, 1, 0],
        }
    }
}

/// Temporal dithering mode.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DitherMode {
    /// No dithering; scaled values are truncated.
    Disabled,
    /// Binary dithering over an eight-frame cycle.
    #[default]
    Binary,
}

/// How RGB values become RGBW bytes.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RgbwMode {
    /// Plain RGB strip, three bytes per LED.
    #[default]
    Disabled,
    /// Move the common component into white: `w = min(r, g, b)`, subtracted from each channel.
    Exact,
    /// Add `w = min(r, g, b)` without subtracting it.
    MaxBrightness,
    /// Four bytes per LED with white always off.
    NullWhite,
}

/// Where the white byte sits among the four wire bytes.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum WhiteSlot {
    /// `W C0 C1 C2`
    First,
    /// `C0 W C1 C2`
    Second,
    /// `C0 C1 W C2`
    Third,
    /// `C0 C1 C2 W`
    #[default]
    Last,
}

impl WhiteSlot {
    const fn index(self) -> usize {
        match self {
            Self::First => 0,
            Self::Second => 1,
            Self::Third => 2,
            Self::Last => 3,
        }
    }
}

/// RGBW output configuration of one strip.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Rgbw {
    /// Conversion mode.
    pub mode: RgbwMode,
    /// Position of the white byte.
    pub white_slot: WhiteSlot,
}

impl Rgbw {
    /// Plain RGB output.
    pub const DISABLED: Self = Self {
        mode: RgbwMode::Disabled,
        white_slot: WhiteSlot::Last,
    };

    /// RGBW output in the given mode, white byte last.
    #[must_use]
    pub const fn new(mode: RgbwMode) -> Self {
        Self {
            mode,
            white_slot: WhiteSlot::Last,
        }
    }

    /// True if the strip takes four bytes per LED.
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        !matches!(self.mode, RgbwMode::Disabled)
    }

    /// Bytes per LED on the wire.
    #[must_use]
    pub const fn channels(&self) -> usize {
        if self.is_enabled() { 4 } else { 3 }
    }

    /// Split an already scaled RGB triple into `(r, g, b, w)`.
    #[must_use]
    pub const fn split(&self, r: u8, g: u8, b: u8) -> (u8, u8, u8, u8) {
        let min = min3(r, g, b);
        match self.mode {
            RgbwMode::Disabled | RgbwMode::NullWhite => (r, g, b, 0),
            RgbwMode::Exact => (r - min, g - min, b - min, min),
            RgbwMode::MaxBrightness => (r, g, b, min),
        }
    }
}

const fn min3(a: u8, b: u8, c: u8) -> u8 {
    let ab = if a < b { a } else { b };
    if ab < c { ab } else { c }
}

// ============================================================================
// Dithering
// ============================================================================

/// Per-strip frame counter that drives binary dithering.
///
/// The counter only moves when a frame has been sent, so re-sending a frame (for example
/// after an aborted bit-bang attempt) reproduces the same dither pattern.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DitherState {
    frame: u8,
}

impl DitherState {
    /// Number of frames in one dither cycle.
    pub const CYCLE: u8 = 8;

    /// Current position in the dither cycle.
    #[must_use]
    pub const fn frame(&self) -> u8 {
        self.frame
    }

    /// Move to the next frame of the cycle.
    pub const fn advance(&mut self) {
        self.frame = (self.frame + 1) % Self::CYCLE;
    }

    /// Per-frame pre-step: derive `(d, e)` for a channel scale.
    ///
    /// `e` is the largest offset that still vanishes after scaling by `scale`; `d` starts at a
    /// frame-dependent fraction of it and toggles to `e - d` on every LED.
    #[must_use]
    pub const fn offsets(frame: u8, scale: u8) -> (u8, u8) {
        let frame = frame % Self::CYCLE;
        let mut q: u8 = 0;
        if frame & 0x01 != 0 {
            q |= 0x80;
        }
        if frame & 0x02 != 0 {
            q |= 0x40;
        }
        if frame & 0x04 != 0 {
            q |= 0x20;
        }
        q += 0x10;

        let e: u16 = if scale == 0 { 0 } else { 256 / scale as u16 + 1 };
        let e = if e > 255 { 255 } else { e as u8 };
        let mut d = scale8(q, e);
        if d != 0 {
            d -= 1;
        }
        let e = if e != 0 { e - 1 } else { 0 };
        (d, e)
    }
}

// ============================================================================
// PixelSource
// ============================================================================

/// Narrow interface a transmitter pulls output bytes from.
///
/// Slots are wire positions within one LED (`0..channels()`), already color-ordered.
pub trait PixelSource {
    /// Bytes per LED: 3 (RGB) or 4 (RGBW).
    fn channels(&self) -> usize;

    /// LEDs in this frame.
    fn pixel_count(&self) -> usize;

    /// Raw byte for `slot` of the current LED.
    fn load_channel(&self, slot: usize) -> u8;

    /// Dither offset for `slot` of the current LED.
    fn dither(&self, slot: usize) -> u8;

    /// Scale applied to `slot` (255 passes the byte through).
    fn scale(&self, slot: usize) -> u8;

    /// Load, dither, and scale `slot` of the current LED in one call.
    fn load_and_scale_channel(&self, slot: usize) -> u8 {
        let raw = dither8(self.load_channel(slot), self.dither(slot));
        ScaleStepper::new(raw, self.scale(slot)).finish()
    }

    /// Move to the next LED.
    fn advance(&mut self);

    /// True while the current LED is inside the frame.
    fn has_more(&self) -> bool;

    /// Per-LED dither toggle.
    fn step_dithering(&mut self);
}

/// Reinterpret a mutable pixel array as shared cells the caller can keep writing between frames.
///
/// ```
/// use clockless_envoy::{RGB8, pixel::as_cells};
///
/// let mut pixels = [RGB8::default(); 4];
/// let cells = as_cells(&mut pixels);
/// cells[2].set(RGB8::new(1, 2, 3));
/// assert_eq!(cells[2].get().g, 2);
/// ```
#[must_use]
pub fn as_cells(pixels: &mut [RGB8]) -> &[Cell<RGB8>] {
    Cell::from_mut(pixels).as_slice_of_cells()
}

/// [`PixelSource`] over a caller-owned RGB buffer.
///
/// Built fresh for every frame from a strip's settings; construction runs the per-frame
/// dithering pre-step.
#[derive(Clone, Debug)]
pub struct PixelController<'a> {
    pixels: &'a [Cell<RGB8>],
    index: usize,
    order: [usize; 3],
    scale: [u8; 3],
    d: [u8; 3],
    e: [u8; 3],
    rgbw: Rgbw,
}

impl<'a> PixelController<'a> {
    /// Create a controller for one frame.
    ///
    /// The per-channel scale is `brightness × correction × temperature`. `dither_frame` selects
    /// the position in the dither cycle (see [`DitherState`]).
    #[must_use]
    pub fn new(
        pixels: &'a [Cell<RGB8>],
        order: ColorOrder,
        settings: &Settings,
        brightness: u8,
        dither_frame: u8,
    ) -> Self {
        let order = order.permutation();
        let correction = [
            settings.correction.r,
            settings.correction.g,
            settings.correction.b,
        ];
        let temperature = [
            settings.temperature.r,
            settings.temperature.g,
            settings.temperature.b,
        ];

        let mut scale = [0_u8; 3];
        let mut d = [0_u8; 3];
        let mut e = [0_u8; 3];
        for (slot, &channel) in order.iter().enumerate() {
            let product = u32::from(correction[channel])
                * u32::from(temperature[channel])
                * u32::from(brightness);
            scale[slot] = u8::try_from(product / (255 * 255)).unwrap_or(u8::MAX);
            if settings.dither == DitherMode::Binary && !settings.rgbw.is_enabled() {
                (d[slot], e[slot]) = DitherState::offsets(dither_frame, scale[slot]);
            }
        }

        Self {
            pixels,
            index: 0,
            order,
            scale,
            d,
            e,
            rgbw: settings.rgbw,
        }
    }

    /// Index of the current LED.
    #[must_use]
    pub const fn index(&self) -> usize {
        self.index
    }

    /// Per-slot scale computed for this frame.
    #[must_use]
    pub const fn scales(&self) -> [u8; 3] {
        self.scale
    }

    fn current(&self) -> Option<RGB8> {
        self.pixels.get(self.index).map(Cell::get)
    }

    fn rgbw_bytes(&self, pixel: RGB8) -> [u8; 4] {
        let source = [pixel.r, pixel.g, pixel.b];
        let colors = [0, 1, 2].map(|slot| scale8(source[self.order[slot]], self.scale[slot]));
        let (c0, c1, c2, white) = self.rgbw.split(colors[0], colors[1], colors[2]);

        let white_index = self.rgbw.white_slot.index();
        let mut out = [0_u8; 4];
        let mut colors = [c0, c1, c2].into_iter();
        for (slot, byte) in out.iter_mut().enumerate() {
            *byte = if slot == white_index {
                white
            } else {
                colors.next().unwrap_or(0)
            };
        }
        out
    }
}

impl PixelSource for PixelController<'_> {
    fn channels(&self) -> usize {
        self.rgbw.channels()
    }

    fn pixel_count(&self) -> usize {
        self.pixels.len()
    }

    fn load_channel(&self, slot: usize) -> u8 {
        let Some(pixel) = self.current() else {
            return 0;
        };
        if self.rgbw.is_enabled() {
            return self.rgbw_bytes(pixel).get(slot).copied().unwrap_or(0);
        }
        let source = [pixel.r, pixel.g, pixel.b];
        self.order
            .get(slot)
            .map_or(0, |&channel| source[channel])
    }

    fn dither(&self, slot: usize) -> u8 {
        self.d.get(slot).copied().unwrap_or(0)
    }

    fn scale(&self, slot: usize) -> u8 {
        if self.rgbw.is_enabled() {
            // RGBW bytes arrive pre-scaled
            return u8::MAX;
        }
        self.scale.get(slot).copied().unwrap_or(u8::MAX)
    }

    fn advance(&mut self) {
        self.index += 1;
    }

    fn has_more(&self) -> bool {
        self.index < self.pixels.len()
    }

    fn step_dithering(&mut self) {
        for (d, e) in self.d.iter_mut().zip(self.e) {
            *d = e.wrapping_sub(*d);
        }
    }
}
