//! Peripheral drivers behind [`BulkController`](crate::controller::BulkController).
//!
//! A controller is generic over one [`StripDriver`], fixed at construction. Each driver
//! declares its [`PeripheralKind`] and capability limits (channel count, valid pins, uniform
//! geometry), and turns a [`FrameJob`] into wire traffic:
//!
//! - [`bitbang::BitBangDriver`]: software emitter, one strip after another.
//! - [`pool::DedicatedDriver`]: one hardware transmitter per strip.
//! - [`pool::WorkerPoolDriver`]: a few hardware transmitters shared by many strips.
//! - [`parallel::ParallelDmaDriver`]: all strips at once through one bit-transposed DMA stream.

pub mod bitbang;
pub mod parallel;
pub mod pool;

use embassy_time::Duration;

use crate::Result;
use crate::channel::Channel;
use crate::pixel::{ColorOrder, PixelController};
use crate::strip::StripDescriptor;
use crate::timing::TimingConfig;

/// Which transmission pattern a driver implements.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PeripheralKind {
    /// CPU-timed software emitter.
    BitBang,
    /// One hardware transmitter per strip.
    Dedicated,
    /// Hardware transmitters borrowed per strip and frame.
    WorkerPool,
    /// One DMA transfer drives every lane in parallel.
    ParallelDma,
}

/// One frame handed from the controller to its driver.
#[derive(Clone, Copy, Debug)]
pub struct FrameJob<'j, 'a> {
    strips: &'j [StripDescriptor<'a>],
    order: ColorOrder,
    brightness: u8,
}

impl<'j, 'a> FrameJob<'j, 'a> {
    /// Describe a frame of `strips`.
    #[must_use]
    pub const fn new(strips: &'j [StripDescriptor<'a>], order: ColorOrder, brightness: u8) -> Self {
        Self {
            strips,
            order,
            brightness,
        }
    }

    /// Strips in registration order.
    #[must_use]
    pub const fn strips(&self) -> &'j [StripDescriptor<'a>] {
        self.strips
    }

    /// Wire color order.
    #[must_use]
    pub const fn order(&self) -> ColorOrder {
        self.order
    }

    /// Global brightness.
    #[must_use]
    pub const fn brightness(&self) -> u8 {
        self.brightness
    }

    /// Fresh pixel source for `strip`.
    #[must_use]
    pub fn source(&self, strip: &StripDescriptor<'a>) -> PixelController<'a> {
        strip.pixel_source(self.order, self.brightness)
    }

    /// LEDs of the longest strip.
    #[must_use]
    pub fn max_len(&self) -> usize {
        self.strips.iter().map(StripDescriptor::len).max().unwrap_or(0)
    }

    /// Wire time of the longest strip under `timing`.
    #[must_use]
    pub fn longest_wire_time(&self, timing: &TimingConfig, extra_bits: u8) -> Duration {
        self.strips
            .iter()
            .map(|strip| timing.frame_duration(strip.len(), strip.bytes_per_led(), extra_bits))
            .max()
            .unwrap_or(Duration::from_ticks(0))
    }
}

/// What a driver reports after sending a frame.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TransmitReport {
    /// How long after `transmit` returns the line keeps sending (DMA or queued hardware).
    pub line_busy_for: Duration,
    /// Time spent with interrupts masked while sending.
    pub interrupts_masked: Duration,
}

/// Capability interface of a peripheral that can send clockless frames.
pub trait StripDriver {
    /// Transmission pattern of this driver.
    const KIND: PeripheralKind;

    /// Hardware channel limit.
    fn max_channels(&self) -> usize;

    /// True if `pin` can carry LED data on this peripheral.
    fn is_valid_pin(&self, pin: u8) -> bool;

    /// True if every strip must have the same LED count.
    fn requires_uniform_length(&self) -> bool {
        false
    }

    /// Timing of the chipset this driver emits.
    fn timing(&self) -> TimingConfig;

    /// One-time peripheral initialization, run before the first strip is attached.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PeripheralInit`](crate::Error::PeripheralInit) if the hardware cannot
    /// be brought up.
    fn begin(&mut self) -> Result<()>;

    /// Bind `pin` to `channel`.
    ///
    /// # Errors
    ///
    /// Returns an error if the pin cannot be configured.
    fn attach(&mut self, channel: Channel, pin: u8) -> Result<()>;

    /// Release `pin` from `channel`.
    fn detach(&mut self, channel: Channel, pin: u8);

    /// Send one frame.
    ///
    /// # Errors
    ///
    /// Returns an error if the peripheral rejects the frame.
    async fn transmit(&mut self, job: &FrameJob<'_, '_>) -> Result<TransmitReport>;
}
