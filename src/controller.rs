//! A device abstraction that owns many strips and sends them as one frame.
//!
//! See [`BulkController`] for usage.

use core::cell::Cell;

use embassy_time::{Duration, Instant, Timer};
use heapless::Vec;
use smart_leds::RGB8;

use crate::channel::ChannelTable;
use crate::driver::{FrameJob, StripDriver};
use crate::layout::StripLayout;
use crate::pixel::{ColorOrder, DitherMode, Rgbw};
use crate::strip::{Settings, StripDescriptor};
use crate::{Error, Result};

/// Lifecycle of a [`BulkController`].
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ControllerState {
    /// The driver has not been initialized yet.
    #[default]
    Uninitialized,
    /// Idle between frames; strips may be added or removed.
    Ready,
    /// A frame is being handed to the driver.
    Transmitting,
}

/// Enforces the chipset's latch gap between the end of one frame and the start of the next.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct LatchTimer {
    reset: Duration,
    ready_at: Option<Instant>,
}

impl LatchTimer {
    /// A timer for a chipset with latch gap `reset`.
    #[must_use]
    pub const fn new(reset: Duration) -> Self {
        Self {
            reset,
            ready_at: None,
        }
    }

    /// Earliest start of the next frame, if a frame has been sent.
    #[must_use]
    pub const fn ready_at(&self) -> Option<Instant> {
        self.ready_at
    }

    /// Record that the line goes idle `busy_for` from now.
    pub fn frame_sent(&mut self, busy_for: Duration) {
        self.ready_at = Some(Instant::now() + busy_for + self.reset);
    }

    /// Wait until the line has been low long enough to latch the previous frame.
    pub async fn wait(&self) {
        if let Some(ready_at) = self.ready_at {
            if Instant::now() < ready_at {
                Timer::at(ready_at).await;
            }
        }
    }
}

/// Owns up to `MAX_STRIPS` strips and sends them through one [`StripDriver`].
///
/// Strips are keyed by pin. Each new strip gets a copy of the controller's default
/// [`Settings`]; the `set_*` methods change only those defaults, while
/// [`update_all_settings`](Self::update_all_settings) changes the defaults and every strip.
///
/// `show` borrows the controller mutably, so strips cannot be added or removed while a
/// frame is on its way.
///
/// ```
/// use clockless_envoy::{RGB8, colors};
/// use clockless_envoy::controller::BulkController;
/// use clockless_envoy::driver::bitbang::BitBangDriver;
/// use clockless_envoy::layout::StripLayout;
/// use clockless_envoy::pixel::{ColorOrder, as_cells};
/// use clockless_envoy::sim::SimPort;
/// use clockless_envoy::timing::Ws2812;
/// use clockless_envoy::transmitter::InterruptMode;
///
/// let mut left = [RGB8::default(); 8];
/// let mut right = [RGB8::default(); 16];
/// let left = as_cells(&mut left);
/// let right = as_cells(&mut right);
///
/// let driver = BitBangDriver::<SimPort, Ws2812>::new(SimPort::new(), InterruptMode::Masked);
/// let mut controller = BulkController::<_, 4>::new(driver, ColorOrder::Grb);
/// controller.add(2, left, 8, StripLayout::Linear)?;
/// controller.add(5, right, 16, StripLayout::Linear)?;
/// assert_eq!(controller.size(), 24);
///
/// right[0].set(colors::RED);
/// embassy_futures::block_on(controller.show(64))?;
/// # Ok::<(), clockless_envoy::Error>(())
/// ```
pub struct BulkController<'a, D: StripDriver, const MAX_STRIPS: usize> {
    driver: D,
    strips: Vec<StripDescriptor<'a>, MAX_STRIPS>,
    channels: ChannelTable<MAX_STRIPS>,
    defaults: Settings,
    order: ColorOrder,
    state: ControllerState,
    latch: LatchTimer,
    interrupts_masked: Duration,
    frames: u32,
}

impl<'a, D: StripDriver, const MAX_STRIPS: usize> BulkController<'a, D, MAX_STRIPS> {
    /// Create a controller. The driver is initialized lazily by the first `add` or `show`.
    #[must_use]
    pub fn new(driver: D, order: ColorOrder) -> Self {
        let limit = driver.max_channels().min(MAX_STRIPS);
        let reset = driver.timing().reset();
        info!(
            "bulk controller: {} driver, {} channels, {} strip slots",
            D::KIND,
            limit,
            MAX_STRIPS
        );
        Self {
            driver,
            strips: Vec::new(),
            channels: ChannelTable::new(limit),
            defaults: Settings::DEFAULT,
            order,
            state: ControllerState::Uninitialized,
            latch: LatchTimer::new(reset),
            interrupts_masked: Duration::from_ticks(0),
            frames: 0,
        }
    }

    // ========================================================================
    // Strip lifecycle
    // ========================================================================

    /// Register a strip of `count` LEDs on `pin`, reading from the front of `pixels`.
    ///
    /// On failure nothing is registered and no channel is held.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidPin`] if the driver cannot use `pin`
    /// - [`Error::DuplicatePin`] if `pin` already has a strip
    /// - [`Error::ChannelsExhausted`] if every hardware channel is taken
    /// - [`Error::LengthMismatch`] if the driver needs uniform strips and `count` differs
    /// - [`Error::BufferTooShort`] or [`Error::LayoutMismatch`] for an inconsistent strip
    /// - any error of the driver's `begin` or `attach`
    pub fn add(
        &mut self,
        pin: u8,
        pixels: &'a [Cell<RGB8>],
        count: usize,
        layout: StripLayout<'a>,
    ) -> Result<&mut StripDescriptor<'a>> {
        let result = self.try_add(pin, pixels, count, layout);
        if let Err(error) = &result {
            warn!("add(pin {}) rejected: {}", pin, error);
        }
        let index = result?;
        self.strips.get_mut(index).ok_or(Error::StripTableFull { max: MAX_STRIPS })
    }

    fn try_add(
        &mut self,
        pin: u8,
        pixels: &'a [Cell<RGB8>],
        count: usize,
        layout: StripLayout<'a>,
    ) -> Result<usize> {
        if !self.driver.is_valid_pin(pin) {
            return Err(Error::InvalidPin(pin));
        }
        if self.has(pin) {
            return Err(Error::DuplicatePin(pin));
        }
        if self.channels.occupied() >= self.channels.limit() {
            return Err(Error::ChannelsExhausted {
                max: self.channels.limit(),
            });
        }
        if self.strips.is_full() {
            return Err(Error::StripTableFull { max: MAX_STRIPS });
        }
        if self.driver.requires_uniform_length() {
            if let Some(expected) = self.strips.first().map(StripDescriptor::len) {
                if expected != count {
                    return Err(Error::LengthMismatch {
                        expected,
                        actual: count,
                    });
                }
            }
        }
        self.ensure_ready()?;

        let channel = self.channels.allocate(pin).ok_or(Error::ChannelsExhausted {
            max: self.channels.limit(),
        })?;
        let strip = match StripDescriptor::new(pin, channel, pixels, count, layout, self.defaults) {
            Ok(strip) => strip,
            Err(error) => {
                self.channels.free(channel);
                return Err(error);
            }
        };
        if let Err(error) = self.driver.attach(channel, pin) {
            self.channels.free(channel);
            return Err(error);
        }
        if self.strips.push(strip).is_err() {
            self.driver.detach(channel, pin);
            self.channels.free(channel);
            return Err(Error::StripTableFull { max: MAX_STRIPS });
        }

        info!("strip added: pin {} on channel {}, {} LEDs", pin, channel.index(), count);
        Ok(self.strips.len() - 1)
    }

    /// Unregister the strip on `pin` and free its channel. False if `pin` has no strip.
    pub fn remove(&mut self, pin: u8) -> bool {
        let Some(index) = self.strips.iter().position(|strip| strip.pin() == pin) else {
            return false;
        };
        let strip = self.strips.remove(index);
        self.release(&strip);
        info!("strip removed: pin {}", pin);
        true
    }

    /// Unregister every strip.
    pub fn remove_all(&mut self) {
        while let Some(strip) = self.strips.pop() {
            self.release(&strip);
        }
        info!("all strips removed");
    }

    fn release(&mut self, strip: &StripDescriptor<'a>) {
        self.driver.detach(strip.channel(), strip.pin());
        self.channels.free(strip.channel());
    }

    fn ensure_ready(&mut self) -> Result<()> {
        if self.state == ControllerState::Uninitialized {
            self.driver.begin()?;
            self.state = ControllerState::Ready;
            info!("bulk controller ready");
        }
        Ok(())
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// The strip on `pin`.
    #[must_use]
    pub fn get(&self, pin: u8) -> Option<&StripDescriptor<'a>> {
        self.strips.iter().find(|strip| strip.pin() == pin)
    }

    /// The strip on `pin`, for per-strip settings.
    pub fn get_mut(&mut self, pin: u8) -> Option<&mut StripDescriptor<'a>> {
        self.strips.iter_mut().find(|strip| strip.pin() == pin)
    }

    /// True if `pin` has a strip.
    #[must_use]
    pub fn has(&self, pin: u8) -> bool {
        self.get(pin).is_some()
    }

    /// Total LEDs across all strips.
    #[must_use]
    pub fn size(&self) -> usize {
        self.strips.iter().map(StripDescriptor::len).sum()
    }

    /// Number of strips.
    #[must_use]
    pub fn strip_count(&self) -> usize {
        self.strips.len()
    }

    /// Strips in registration order.
    #[must_use]
    pub fn strips(&self) -> &[StripDescriptor<'a>] {
        &self.strips
    }

    /// Pin ↔ channel table.
    #[must_use]
    pub const fn channels(&self) -> &ChannelTable<MAX_STRIPS> {
        &self.channels
    }

    /// Lifecycle state.
    #[must_use]
    pub const fn state(&self) -> ControllerState {
        self.state
    }

    /// Settings copied into future strips.
    #[must_use]
    pub const fn defaults(&self) -> &Settings {
        &self.defaults
    }

    /// Wire color order.
    #[must_use]
    pub const fn color_order(&self) -> ColorOrder {
        self.order
    }

    /// The driver.
    #[must_use]
    pub const fn driver(&self) -> &D {
        &self.driver
    }

    /// Frames sent since construction.
    #[must_use]
    pub const fn frames_shown(&self) -> u32 {
        self.frames
    }

    /// Latch timer state.
    #[must_use]
    pub const fn latch(&self) -> &LatchTimer {
        &self.latch
    }

    /// Total time interrupts were masked on this controller's behalf.
    ///
    /// Software clocks that miss ticks while interrupts are masked can add this back.
    #[must_use]
    pub const fn interrupts_masked(&self) -> Duration {
        self.interrupts_masked
    }

    /// Return the masked time accumulated since the last call and reset it.
    pub fn take_interrupts_masked(&mut self) -> Duration {
        core::mem::replace(&mut self.interrupts_masked, Duration::from_ticks(0))
    }

    // ========================================================================
    // Default settings (future strips only)
    // ========================================================================

    /// Color correction for strips added from now on.
    pub fn set_correction(&mut self, correction: RGB8) {
        self.defaults.correction = correction;
    }

    /// Color temperature for strips added from now on.
    pub fn set_temperature(&mut self, temperature: RGB8) {
        self.defaults.temperature = temperature;
    }

    /// Dither mode for strips added from now on.
    pub fn set_dither(&mut self, dither: DitherMode) {
        self.defaults.dither = dither;
    }

    /// RGBW configuration for strips added from now on.
    pub fn set_rgbw(&mut self, rgbw: Rgbw) {
        self.defaults.rgbw = rgbw;
    }

    /// Setters that change the defaults **and** every registered strip.
    ///
    /// ```
    /// # use clockless_envoy::{RGB8, controller::BulkController, pixel::ColorOrder};
    /// # use clockless_envoy::driver::bitbang::BitBangDriver;
    /// # use clockless_envoy::{sim::SimPort, timing::Ws2812, transmitter::InterruptMode};
    /// # let driver = BitBangDriver::<SimPort, Ws2812>::new(SimPort::new(), InterruptMode::Masked);
    /// # let mut controller = BulkController::<_, 4>::new(driver, ColorOrder::Grb);
    /// controller
    ///     .update_all_settings()
    ///     .set_correction(RGB8::new(255, 176, 240))
    ///     .set_temperature(RGB8::new(255, 147, 41));
    /// ```
    pub fn update_all_settings(&mut self) -> SettingsUpdater<'_, 'a, D, MAX_STRIPS> {
        SettingsUpdater { controller: self }
    }

    // ========================================================================
    // Frames
    // ========================================================================

    /// Send one frame of every strip at `brightness`.
    ///
    /// Waits for the previous frame's latch gap, hands the frame to the driver, and advances
    /// every strip's dither cycle once the frame has gone out.
    ///
    /// # Errors
    ///
    /// Returns the error of the driver's `begin` (first use) or `transmit`.
    pub async fn show(&mut self, brightness: u8) -> Result<()> {
        self.ensure_ready()?;
        self.latch.wait().await;

        self.state = ControllerState::Transmitting;
        debug!(
            "frame {}: {} strips, {} LEDs, brightness {}",
            self.frames,
            self.strips.len(),
            self.size(),
            brightness
        );
        let job = FrameJob::new(&self.strips, self.order, brightness);
        let result = self.driver.transmit(&job).await;
        self.state = ControllerState::Ready;

        let report = match result {
            Ok(report) => report,
            Err(error) => {
                warn!("frame {} failed: {}", self.frames, error);
                // earlier strips may already be on the wire
                let timing = self.driver.timing();
                self.latch.frame_sent(job.longest_wire_time(&timing, 0));
                return Err(error);
            }
        };
        self.latch.frame_sent(report.line_busy_for);
        self.interrupts_masked += report.interrupts_masked;
        for strip in &mut self.strips {
            strip.advance_dither();
        }
        self.frames = self.frames.wrapping_add(1);
        Ok(())
    }
}

/// Returned by [`BulkController::update_all_settings`]; every setter changes the controller's
/// defaults and every registered strip.
pub struct SettingsUpdater<'c, 'a, D: StripDriver, const MAX_STRIPS: usize> {
    controller: &'c mut BulkController<'a, D, MAX_STRIPS>,
}

impl<D: StripDriver, const MAX_STRIPS: usize> SettingsUpdater<'_, '_, D, MAX_STRIPS> {
    fn apply(&mut self, update: impl Fn(&mut Settings)) -> &mut Self {
        update(&mut self.controller.defaults);
        for strip in &mut self.controller.strips {
            let mut settings = *strip.settings();
            update(&mut settings);
            strip.set_settings(settings);
        }
        self
    }

    /// Color correction everywhere.
    pub fn set_correction(&mut self, correction: RGB8) -> &mut Self {
        self.apply(|settings| settings.correction = correction)
    }

    /// Color temperature everywhere.
    pub fn set_temperature(&mut self, temperature: RGB8) -> &mut Self {
        self.apply(|settings| settings.temperature = temperature)
    }

    /// Dither mode everywhere.
    pub fn set_dither(&mut self, dither: DitherMode) -> &mut Self {
        self.apply(|settings| settings.dither = dither)
    }

    /// RGBW configuration everywhere.
    pub fn set_rgbw(&mut self, rgbw: Rgbw) -> &mut Self {
        self.apply(|settings| settings.rgbw = rgbw)
    }
}
