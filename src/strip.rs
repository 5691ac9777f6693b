//! One logical strip: its pin, its caller-owned pixel buffer, and its settings.
//!
//! See [`BulkController::add`](crate::controller::BulkController::add) for how descriptors are
//! created; the controller owns them and hands out borrows.

use core::cell::Cell;

use smart_leds::RGB8;

use crate::channel::Channel;
use crate::layout::StripLayout;
use crate::pixel::{ColorOrder, DitherMode, DitherState, PixelController, Rgbw};
use crate::{Error, Result};

/// Per-strip color pipeline settings.
///
/// A controller keeps one default record that is copied into each new strip.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Settings {
    /// Per-channel color correction (255 = unchanged).
    pub correction: RGB8,
    /// Per-channel color temperature (255 = unchanged).
    pub temperature: RGB8,
    /// Temporal dithering mode.
    pub dither: DitherMode,
    /// RGBW output configuration.
    pub rgbw: Rgbw,
}

impl Settings {
    /// Neutral settings: no correction, no temperature shift, binary dithering, RGB output.
    pub const DEFAULT: Self = Self {
        correction: RGB8::new(255, 255, 255),
        temperature: RGB8::new(255, 255, 255),
        dither: DitherMode::Binary,
        rgbw: Rgbw::DISABLED,
    };
}

impl Default for Settings {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// A registered strip.
///
/// The pixel buffer is borrowed, never owned: write to it through the same
/// `&[Cell<RGB8>]` between frames and the next `show` sends the new values.
#[derive(Clone, Debug)]
pub struct StripDescriptor<'a> {
    pin: u8,
    channel: Channel,
    pixels: &'a [Cell<RGB8>],
    layout: StripLayout<'a>,
    settings: Settings,
    dither: DitherState,
}

impl<'a> StripDescriptor<'a> {
    /// Describe a strip of `count` LEDs at the front of `pixels`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BufferTooShort`] if `pixels` holds fewer than `count` LEDs and
    /// [`Error::LayoutMismatch`] if a mapped `layout` does not describe `count` LEDs.
    pub fn new(
        pin: u8,
        channel: Channel,
        pixels: &'a [Cell<RGB8>],
        count: usize,
        layout: StripLayout<'a>,
        settings: Settings,
    ) -> Result<Self> {
        let pixels = pixels.get(..count).ok_or(Error::BufferTooShort {
            count,
            available: pixels.len(),
        })?;
        if !layout.fits(count) {
            return Err(Error::LayoutMismatch {
                count,
                layout: layout.len().unwrap_or(count),
            });
        }
        Ok(Self {
            pin,
            channel,
            pixels,
            layout,
            settings,
            dither: DitherState::default(),
        })
    }

    /// Data pin; the strip's identity within its controller.
    #[must_use]
    pub const fn pin(&self) -> u8 {
        self.pin
    }

    /// Hardware channel allocated to this strip.
    #[must_use]
    pub const fn channel(&self) -> Channel {
        self.channel
    }

    /// The strip's pixels.
    #[must_use]
    pub const fn pixels(&self) -> &'a [Cell<RGB8>] {
        self.pixels
    }

    /// Number of LEDs.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.pixels.len()
    }

    /// True for a zero-length strip.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.pixels.is_empty()
    }

    /// Spatial layout, carried for effects code.
    #[must_use]
    pub const fn layout(&self) -> StripLayout<'a> {
        self.layout
    }

    /// Current settings.
    #[must_use]
    pub const fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Bytes per LED on the wire.
    #[must_use]
    pub const fn bytes_per_led(&self) -> usize {
        self.settings.rgbw.channels()
    }

    /// Position in the dither cycle.
    #[must_use]
    pub const fn dither_state(&self) -> DitherState {
        self.dither
    }

    /// Replace all settings of this strip.
    pub fn set_settings(&mut self, settings: Settings) -> &mut Self {
        self.settings = settings;
        self
    }

    /// Set this strip's color correction.
    pub fn set_correction(&mut self, correction: RGB8) -> &mut Self {
        self.settings.correction = correction;
        self
    }

    /// Set this strip's color temperature.
    pub fn set_temperature(&mut self, temperature: RGB8) -> &mut Self {
        self.settings.temperature = temperature;
        self
    }

    /// Set this strip's dither mode.
    pub fn set_dither(&mut self, dither: DitherMode) -> &mut Self {
        self.settings.dither = dither;
        self
    }

    /// Set this strip's RGBW configuration.
    pub fn set_rgbw(&mut self, rgbw: Rgbw) -> &mut Self {
        self.settings.rgbw = rgbw;
        self
    }

    /// Pixel source for one frame of this strip.
    #[must_use]
    pub fn pixel_source(&self, order: ColorOrder, brightness: u8) -> PixelController<'a> {
        PixelController::new(
            self.pixels,
            order,
            &self.settings,
            brightness,
            self.dither.frame(),
        )
    }

    pub(crate) fn advance_dither(&mut self) {
        self.dither.advance();
    }
}
