//! A [`LanePort`] over `embedded-hal` 1.0 output pins and a free-running counter.
//!
//! Any HAL whose pins share one `OutputPin` type (for example `embassy_rp::gpio::Output`)
//! can bit-bang strips through [`HalPort`]. Pin writes go through the HAL, so the emit loop
//! overhead is larger than with raw port registers; raise `OVERHEAD` accordingly.

use embedded_hal::digital::OutputPin;
use heapless::Vec;

use crate::transmitter::LanePort;
use crate::{Error, Result};

/// A counter that increments at a fixed rate and wraps at `MASK + 1`.
pub trait FreeRunningCounter {
    /// Tick rate in Hz.
    const HZ: u32;

    /// Counter width mask (`2^n - 1`).
    const MASK: u32 = u32::MAX;

    /// Current counter value.
    fn now(&self) -> u32;
}

/// Up to `N` output pins plus a counter, driven as one 32-bit port.
///
/// Pins are identified by a caller-chosen id below 32 (usually the GPIO number).
pub struct HalPort<O: OutputPin, K: FreeRunningCounter, const N: usize, const OVERHEAD: u32 = 8> {
    pins: Vec<(u8, O), N>,
    outputs: u32,
    counter: K,
}

impl<O: OutputPin, K: FreeRunningCounter, const N: usize, const OVERHEAD: u32>
    HalPort<O, K, N, OVERHEAD>
{
    /// Create a port with no pins.
    #[must_use]
    pub const fn new(counter: K) -> Self {
        Self {
            pins: Vec::new(),
            outputs: 0,
            counter,
        }
    }

    /// Register `pin` under `id`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPin`] for ids of 32 and above, [`Error::DuplicatePin`] for an
    /// id already registered, and [`Error::ChannelsExhausted`] once `N` pins are registered.
    pub fn add_pin(&mut self, id: u8, pin: O) -> Result<()> {
        if id >= 32 {
            return Err(Error::InvalidPin(id));
        }
        if self.pins.iter().any(|(existing, _)| *existing == id) {
            return Err(Error::DuplicatePin(id));
        }
        self.pins
            .push((id, pin))
            .map_err(|_| Error::ChannelsExhausted { max: N })
    }

    /// [`add_pin`](Self::add_pin), builder style.
    ///
    /// # Errors
    ///
    /// See [`add_pin`](Self::add_pin).
    pub fn with_pin(mut self, id: u8, pin: O) -> Result<Self> {
        self.add_pin(id, pin)?;
        Ok(self)
    }

    /// The counter.
    #[must_use]
    pub const fn counter(&self) -> &K {
        &self.counter
    }

    /// Mask of pins configured as strip outputs.
    #[must_use]
    pub const fn outputs(&self) -> u32 {
        self.outputs
    }

    #[inline(always)]
    fn drive(&mut self, mask: u32, high: bool) {
        for (id, pin) in &mut self.pins {
            if mask & (1 << *id) != 0 {
                if high {
                    pin.set_high().ok();
                } else {
                    pin.set_low().ok();
                }
            }
        }
    }
}

impl<O: OutputPin, K: FreeRunningCounter, const N: usize, const OVERHEAD: u32> LanePort
    for HalPort<O, K, N, OVERHEAD>
{
    const TICK_HZ: u32 = K::HZ;
    const TICK_MASK: u32 = K::MASK;
    const OVERHEAD_TICKS: u32 = OVERHEAD;

    fn is_valid_pin(&self, pin: u8) -> bool {
        self.pins.iter().any(|(id, _)| *id == pin)
    }

    fn set_output(&mut self, pin: u8) -> Result<()> {
        let (id, output) = self
            .pins
            .iter_mut()
            .find(|(id, _)| *id == pin)
            .ok_or(Error::InvalidPin(pin))?;
        output.set_low().map_err(|_| Error::PeripheralInit)?;
        self.outputs |= 1 << *id;
        Ok(())
    }

    fn release(&mut self, pin: u8) {
        if pin < 32 {
            self.drive(1 << pin, false);
            self.outputs &= !(1 << pin);
        }
    }

    #[inline(always)]
    fn set_mask(&mut self, mask: u32) {
        self.drive(mask & self.outputs, true);
    }

    #[inline(always)]
    fn clear_mask(&mut self, mask: u32) {
        self.drive(mask & self.outputs, false);
    }

    #[inline(always)]
    fn ticks(&self) -> u32 {
        self.counter.now() & K::MASK
    }
}
