//! Recording fakes of every hardware surface, for host tests and examples.
//!
//! - [`SimPort`]: a [`LanePort`] whose clock jumps straight to each deadline and which
//!   records every line transition, with helpers that decode the waveform back to bits.
//! - [`SimWorker`]: a [`LaneWorker`] that encodes bytes into `(high, low)` pulse pairs the
//!   way RMT-style peripherals do and stays busy for a configurable number of polls.
//! - [`SimDmaEngine`]: a [`DmaEngine`] that keeps every transfer it was given.
//! - [`SimCounter`] and [`SimPin`]: a counter and `embedded-hal` pin for [`HalPort`](crate::hal::HalPort).

use core::cell::{Cell, RefCell};
use core::convert::Infallible;
use core::marker::PhantomData;
use std::rc::Rc;
use std::vec::Vec;

use embedded_hal::digital::{ErrorType, OutputPin};

use crate::channel::LaneWorker;
use crate::driver::parallel::DmaEngine;
use crate::hal::FreeRunningCounter;
use crate::pixel::PixelSource;
use crate::timing::{CycleBudget, TimingConfig, TimingProvider};
use crate::transmitter::{LanePort, deadline_reached};
use crate::transposer::LaneWord;
use crate::{Error, Result};

/// One recorded line transition.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Transition {
    /// Counter value at the transition.
    pub tick: u32,
    /// Pin that changed.
    pub pin: u8,
    /// New level.
    pub high: bool,
}

/// One high pulse on a pin.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Pulse {
    /// Counter value at the rising edge.
    pub rise: u32,
    /// Ticks the line stayed high.
    pub high: u32,
}

/// Simulated 32-pin port with a 1 GHz counter (one tick per nanosecond).
#[derive(Debug)]
pub struct SimPort {
    now: Cell<u32>,
    levels: u32,
    outputs: u32,
    valid: u32,
    rises: usize,
    stall: Cell<Option<(usize, u32)>>,
    transitions: Vec<Transition>,
}

impl Default for SimPort {
    fn default() -> Self {
        Self::new()
    }
}

impl SimPort {
    /// A port where every pin 0..32 is valid, starting at tick 0.
    #[must_use]
    pub fn new() -> Self {
        Self::starting_at(0)
    }

    /// A port whose counter starts at `tick` (useful to test wrap-around).
    #[must_use]
    pub fn starting_at(tick: u32) -> Self {
        Self {
            now: Cell::new(tick),
            levels: 0,
            outputs: 0,
            valid: u32::MAX,
            rises: 0,
            stall: Cell::new(None),
            transitions: Vec::new(),
        }
    }

    /// Restrict the valid pins to those set in `mask`.
    #[must_use]
    pub const fn with_valid_pins(mut self, mask: u32) -> Self {
        self.valid = mask;
        self
    }

    /// Simulate an interrupt: once `rises` rising edges have been recorded, the next counter
    /// read jumps forward by `ticks`.
    pub fn stall_after_rises(&mut self, rises: usize, ticks: u32) {
        self.stall.set(Some((rises, ticks)));
    }

    /// Current counter value (without triggering a pending stall).
    #[must_use]
    pub fn now(&self) -> u32 {
        self.now.get()
    }

    /// Move the counter forward.
    pub fn advance(&mut self, ticks: u32) {
        self.now.set(self.now.get().wrapping_add(ticks));
    }

    /// True if `pin` is configured as an output.
    #[must_use]
    pub const fn is_output(&self, pin: u8) -> bool {
        pin < 32 && self.outputs & (1 << pin) != 0
    }

    /// Current level of `pin`.
    #[must_use]
    pub const fn is_high(&self, pin: u8) -> bool {
        pin < 32 && self.levels & (1 << pin) != 0
    }

    /// Every recorded transition, in order.
    #[must_use]
    pub fn transitions(&self) -> &[Transition] {
        &self.transitions
    }

    /// Forget recorded transitions.
    pub fn clear(&mut self) {
        self.transitions.clear();
        self.rises = 0;
    }

    /// High pulses on `pin`, in order.
    #[must_use]
    pub fn pulses(&self, pin: u8) -> Vec<Pulse> {
        let mut pulses = Vec::new();
        let mut rise = None;
        for transition in self.transitions.iter().filter(|t| t.pin == pin) {
            match (transition.high, rise) {
                (true, _) => rise = Some(transition.tick),
                (false, Some(start)) => {
                    pulses.push(Pulse {
                        rise: start,
                        high: transition.tick.wrapping_sub(start),
                    });
                    rise = None;
                }
                (false, None) => {}
            }
        }
        pulses
    }

    /// High time of every pulse on `pin`.
    #[must_use]
    pub fn high_times(&self, pin: u8) -> Vec<u32> {
        self.pulses(pin).iter().map(|pulse| pulse.high).collect()
    }

    /// Decode `pin`'s pulses as bits: a pulse longer than halfway between `t1` and `t2` is a one.
    #[must_use]
    pub fn decode_bits(&self, pin: u8, budget: &CycleBudget) -> Vec<bool> {
        let threshold = (budget.t1 + budget.t2) / 2;
        self.pulses(pin)
            .iter()
            .map(|pulse| pulse.high > threshold)
            .collect()
    }

    /// Decode `pin`'s pulses as MSB-first bytes, skipping `extra_bits` after each byte.
    #[must_use]
    pub fn decode_bytes(&self, pin: u8, budget: &CycleBudget, extra_bits: usize) -> Vec<u8> {
        self.decode_bits(pin, budget)
            .chunks(8 + extra_bits)
            .filter(|chunk| chunk.len() >= 8)
            .map(|chunk| {
                chunk[..8]
                    .iter()
                    .fold(0_u8, |byte, &bit| (byte << 1) | u8::from(bit))
            })
            .collect()
    }

    fn drive(&mut self, mask: u32, high: bool) {
        let mask = mask & self.outputs;
        let changed = if high { mask & !self.levels } else { mask & self.levels };
        let tick = self.now.get();
        for pin in (0..32_u8).filter(|pin| changed & (1 << pin) != 0) {
            self.transitions.push(Transition { tick, pin, high });
            if high {
                self.rises += 1;
            }
        }
        if high {
            self.levels |= mask;
        } else {
            self.levels &= !mask;
        }
    }
}

impl LanePort for SimPort {
    const TICK_HZ: u32 = 1_000_000_000;
    const OVERHEAD_TICKS: u32 = 1;

    fn is_valid_pin(&self, pin: u8) -> bool {
        pin < 32 && self.valid & (1 << pin) != 0
    }

    fn set_output(&mut self, pin: u8) -> Result<()> {
        if !self.is_valid_pin(pin) {
            return Err(Error::InvalidPin(pin));
        }
        self.outputs |= 1 << pin;
        self.levels &= !(1 << pin);
        Ok(())
    }

    fn release(&mut self, pin: u8) {
        if pin < 32 {
            self.drive(1 << pin, false);
            self.outputs &= !(1 << pin);
        }
    }

    fn set_mask(&mut self, mask: u32) {
        self.drive(mask, true);
    }

    fn clear_mask(&mut self, mask: u32) {
        self.drive(mask, false);
    }

    fn ticks(&self) -> u32 {
        if let Some((rises, ticks)) = self.stall.get() {
            if self.rises >= rises {
                self.now.set(self.now.get().wrapping_add(ticks));
                self.stall.set(None);
            }
        }
        self.now.get()
    }

    fn wait_until(&mut self, deadline: u32) {
        if !deadline_reached(self.now.get(), deadline, Self::TICK_MASK) {
            self.now.set(deadline);
        }
    }
}

/// Counter that advances by a fixed step on every read.
#[derive(Debug, Default)]
pub struct SimCounter<const HZ: u32 = 1_000_000_000> {
    now: Cell<u32>,
    step: u32,
}

impl<const HZ: u32> SimCounter<HZ> {
    /// A counter starting at 0 that advances `step` ticks per read.
    #[must_use]
    pub const fn new(step: u32) -> Self {
        Self {
            now: Cell::new(0),
            step,
        }
    }
}

impl<const HZ: u32> FreeRunningCounter for SimCounter<HZ> {
    const HZ: u32 = HZ;

    fn now(&self) -> u32 {
        let now = self.now.get();
        self.now.set(now.wrapping_add(self.step));
        now
    }
}

/// `embedded-hal` output pin that records every level written to it.
#[derive(Clone, Debug, Default)]
pub struct SimPin {
    history: Rc<RefCell<Vec<bool>>>,
}

impl SimPin {
    /// A pin with an empty history.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every level written, in order. Clones share one history.
    #[must_use]
    pub fn history(&self) -> Vec<bool> {
        self.history.borrow().clone()
    }

    /// Number of low-to-high edges written.
    #[must_use]
    pub fn rising_edges(&self) -> usize {
        let history = self.history.borrow();
        let mut previous = false;
        let mut edges = 0;
        for &level in history.iter() {
            if level && !previous {
                edges += 1;
            }
            previous = level;
        }
        edges
    }
}

impl ErrorType for SimPin {
    type Error = Infallible;
}

impl OutputPin for SimPin {
    fn set_low(&mut self) -> core::result::Result<(), Self::Error> {
        self.history.borrow_mut().push(false);
        Ok(())
    }

    fn set_high(&mut self) -> core::result::Result<(), Self::Error> {
        self.history.borrow_mut().push(true);
        Ok(())
    }
}

/// A strip frame as a [`SimWorker`] sent it.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SentFrame {
    /// Pin the frame went to.
    pub pin: u8,
    /// Output bytes, in wire order.
    pub bytes: Vec<u8>,
    /// `(high, low)` ticks per bit.
    pub pulses: Vec<(u32, u32)>,
}

/// Pulse-code transmitter fake for chipset `C` at 1 GHz.
#[derive(Debug)]
pub struct SimWorker<C: TimingProvider> {
    valid: u32,
    attached: u32,
    busy_polls: u32,
    remaining: Cell<u32>,
    frames: Vec<SentFrame>,
    _chipset: PhantomData<C>,
}

impl<C: TimingProvider> Default for SimWorker<C> {
    fn default() -> Self {
        Self::new(0)
    }
}

impl<C: TimingProvider> SimWorker<C> {
    const BUDGET: CycleBudget = CycleBudget::new(C::TIMING, 1_000_000_000, 1);

    /// A worker that reports busy for `busy_polls` polls after each start.
    #[must_use]
    pub const fn new(busy_polls: u32) -> Self {
        Self {
            valid: u32::MAX,
            attached: 0,
            busy_polls,
            remaining: Cell::new(0),
            frames: Vec::new(),
            _chipset: PhantomData,
        }
    }

    /// Restrict the valid pins to those set in `mask`.
    #[must_use]
    pub const fn with_valid_pins(mut self, mask: u32) -> Self {
        self.valid = mask;
        self
    }

    /// Frames sent so far.
    #[must_use]
    pub fn frames(&self) -> &[SentFrame] {
        &self.frames
    }

    /// True if `pin` is attached.
    #[must_use]
    pub const fn is_attached(&self, pin: u8) -> bool {
        pin < 32 && self.attached & (1 << pin) != 0
    }

    /// Encode one byte as RMT-style `(high, low)` pairs, MSB first.
    #[must_use]
    pub fn encode(byte: u8) -> [(u32, u32); 8] {
        let budget = Self::BUDGET;
        core::array::from_fn(|bit| {
            if byte & (0x80 >> bit) != 0 {
                (budget.t2, budget.t3 - budget.t2)
            } else {
                (budget.t1, budget.t3 - budget.t1)
            }
        })
    }
}

impl<C: TimingProvider> LaneWorker for SimWorker<C> {
    fn is_valid_pin(&self, pin: u8) -> bool {
        pin < 32 && self.valid & (1 << pin) != 0
    }

    fn attach(&mut self, pin: u8) -> Result<()> {
        if !self.is_valid_pin(pin) {
            return Err(Error::InvalidPin(pin));
        }
        self.attached |= 1 << pin;
        Ok(())
    }

    fn detach(&mut self, pin: u8) {
        if pin < 32 {
            self.attached &= !(1 << pin);
        }
    }

    fn start(&mut self, pin: u8, source: &mut dyn PixelSource) -> Result<()> {
        if !self.is_attached(pin) {
            return Err(Error::InvalidPin(pin));
        }
        let channels = source.channels();
        let mut bytes = Vec::new();
        while source.has_more() {
            for slot in 0..channels {
                bytes.push(source.load_and_scale_channel(slot));
            }
            source.advance();
            source.step_dithering();
        }
        let pulses = bytes.iter().flat_map(|&byte| Self::encode(byte)).collect();
        self.frames.push(SentFrame { pin, bytes, pulses });
        self.remaining.set(self.busy_polls);
        Ok(())
    }

    fn is_busy(&self) -> bool {
        let remaining = self.remaining.get();
        if remaining == 0 {
            return false;
        }
        self.remaining.set(remaining - 1);
        true
    }
}

/// One transfer as a [`SimDmaEngine`] received it.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SimTransfer<W> {
    /// Bit phases the engine was asked to use.
    pub timing: TimingConfig,
    /// Pin of each lane; `None` for unused lanes.
    pub lane_pins: Vec<Option<u8>>,
    /// Transposed output words.
    pub words: Vec<W>,
}

/// Parallel DMA engine fake with `LANES` lanes of word `W`; pins 30 and above are invalid.
#[derive(Debug)]
pub struct SimDmaEngine<W: LaneWord, const LANES: usize = 8> {
    busy_polls: u32,
    remaining: Cell<u32>,
    transfers: Vec<SimTransfer<W>>,
    busy_starts: usize,
}

impl<W: LaneWord, const LANES: usize> Default for SimDmaEngine<W, LANES> {
    fn default() -> Self {
        Self::new(0)
    }
}

impl<W: LaneWord, const LANES: usize> SimDmaEngine<W, LANES> {
    /// Highest valid pin plus one.
    pub const PIN_LIMIT: u8 = 30;

    /// An engine that stays busy for `busy_polls` polls after each start.
    #[must_use]
    pub const fn new(busy_polls: u32) -> Self {
        Self {
            busy_polls,
            remaining: Cell::new(0),
            transfers: Vec::new(),
            busy_starts: 0,
        }
    }

    /// Every transfer started, oldest first.
    #[must_use]
    pub fn transfers(&self) -> &[SimTransfer<W>] {
        &self.transfers
    }

    /// Transfers started while a previous one was still in flight (must stay 0).
    #[must_use]
    pub const fn overlapping_starts(&self) -> usize {
        self.busy_starts
    }
}

impl<W: LaneWord, const LANES: usize> DmaEngine for SimDmaEngine<W, LANES> {
    type Word = W;
    const MAX_LANES: usize = LANES;

    fn is_valid_pin(pin: u8) -> bool {
        pin < Self::PIN_LIMIT
    }

    fn start(
        &mut self,
        timing: &TimingConfig,
        lane_pins: &[Option<u8>],
        words: &[W],
    ) -> Result<()> {
        if self.remaining.get() > 0 {
            self.busy_starts += 1;
        }
        self.transfers.push(SimTransfer {
            timing: *timing,
            lane_pins: lane_pins.to_vec(),
            words: words.to_vec(),
        });
        self.remaining.set(self.busy_polls);
        Ok(())
    }

    fn is_busy(&self) -> bool {
        let remaining = self.remaining.get();
        if remaining == 0 {
            return false;
        }
        self.remaining.set(remaining - 1);
        true
    }
}
