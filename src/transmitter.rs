//! Software emitter for one strip on one data line.
//!
//! Each bit follows the three-control-point contract of [`crate::timing`]: raise, drop at
//! `t1` for a zero, drop at `t2` regardless, and hold low until `t3`. All waits are
//! busy-waits to an **absolute** counter deadline, chained from the previous bit's `t3`, so
//! the loop's own overhead never accumulates.
//!
//! The next byte is prepared while the current byte is on the wire: during bit 0 the
//! transmitter loads and dithers the next byte, and every bit period (including bit 0) runs
//! one step of the bit-serial [`ScaleStepper`]. After eight bits the scaled byte is ready.
//!
//! See [`SingleLaneTransmitter`] for the entry point and [`LanePort`] for the hardware surface.

use core::marker::PhantomData;

use crate::math8::{ScaleStepper, dither8};
use crate::pixel::PixelSource;
use crate::timing::{CycleBudget, TimingProvider};
use crate::Result;

/// The narrow hardware surface a software transmitter needs.
///
/// Pins are identified by their bit in a 32-bit port mask.
pub trait LanePort {
    /// Frequency of [`ticks`](Self::ticks).
    const TICK_HZ: u32;

    /// Counter width: ticks wrap at `TICK_MASK + 1`. Must be `2^n - 1`.
    const TICK_MASK: u32 = u32::MAX;

    /// Ticks the emit loop spends between two wait points on this target.
    const OVERHEAD_TICKS: u32;

    /// True if `pin` can be driven through this port.
    fn is_valid_pin(&self, pin: u8) -> bool;

    /// Put `pin` in push-pull output mode, driven low.
    ///
    /// # Errors
    ///
    /// Returns an error if the pin cannot be claimed.
    fn set_output(&mut self, pin: u8) -> Result<()>;

    /// Return `pin` to its reset state.
    fn release(&mut self, _pin: u8) {}

    /// Drive every pin in `mask` high.
    fn set_mask(&mut self, mask: u32);

    /// Drive every pin in `mask` low.
    fn clear_mask(&mut self, mask: u32);

    /// Read the free-running counter.
    fn ticks(&self) -> u32;

    /// Busy-wait until the counter reaches `deadline`.
    #[inline(always)]
    fn wait_until(&mut self, deadline: u32) {
        while !deadline_reached(self.ticks(), deadline, Self::TICK_MASK) {}
    }
}

/// Wrap-aware "has `now` reached `deadline`" for a counter of width `mask`.
///
/// Deadlines more than half the counter range in the past read as in the future.
#[inline(always)]
#[must_use]
pub const fn deadline_reached(now: u32, deadline: u32, mask: u32) -> bool {
    now.wrapping_sub(deadline) & mask <= mask / 2
}

/// How the transmitter treats interrupts while a frame is on the wire.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum InterruptMode {
    /// Interrupts are masked for the whole strip. Output is exact; interrupt latency grows
    /// with strip length.
    #[default]
    Masked,
    /// Interrupts are masked for one LED at a time and may run between LEDs.
    ///
    /// Every interrupt handler must finish well within `max_gap_us`, and `max_gap_us` must stay
    /// below the strip's latch threshold. If a gap between two LEDs exceeds it, the strip has
    /// already latched a partial frame: the attempt is reported as
    /// [`TransmitOutcome::Aborted`]. This is a best-effort mode.
    Bounded {
        /// Longest tolerated low gap between two LEDs, in microseconds, measured from the
        /// last bit's `t2` drop to the next rise.
        max_gap_us: u32,
    },
}

/// What one attempt to send a strip did.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TransmitOutcome {
    /// Every byte was sent.
    Complete {
        /// Counter ticks from the first rise to the end of the last bit period.
        elapsed_ticks: u32,
        /// Counter ticks spent with interrupts masked.
        masked_ticks: u32,
    },
    /// An inter-LED gap exceeded the bound; the frame must be sent again after a reset gap.
    Aborted {
        /// LEDs fully sent before the gap.
        leds_sent: usize,
        /// Counter ticks from the first rise to the abort.
        elapsed_ticks: u32,
        /// Counter ticks spent with interrupts masked.
        masked_ticks: u32,
    },
}

impl TransmitOutcome {
    /// True for [`TransmitOutcome::Complete`].
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        matches!(self, Self::Complete { .. })
    }

    /// Ticks spent with interrupts masked, whatever the outcome.
    #[must_use]
    pub const fn masked_ticks(&self) -> u32 {
        match self {
            Self::Complete { masked_ticks, .. } | Self::Aborted { masked_ticks, .. } => {
                *masked_ticks
            }
        }
    }

    /// Ticks from the first rise to the end of the attempt.
    #[must_use]
    pub const fn elapsed_ticks(&self) -> u32 {
        match self {
            Self::Complete { elapsed_ticks, .. } | Self::Aborted { elapsed_ticks, .. } => {
                *elapsed_ticks
            }
        }
    }
}

/// Where the transmitter is in its per-bit state machine.
///
/// ```text
/// Idle → Armed → BitHigh → BitDecision → BitLow ─┬→ BitHigh (next bit or byte)
///                                                └→ Done
/// ```
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LanePhase {
    /// Nothing to send.
    #[default]
    Idle,
    /// First byte prepared; waiting for the first rise.
    Armed,
    /// Line raised at the start of a bit.
    BitHigh,
    /// At `t1`: a zero bit has dropped, a one bit stays high.
    BitDecision,
    /// At `t2`: line low until `t3`.
    BitLow,
    /// Last bit period complete.
    Done,
}

/// Byte pipeline state: the byte on the wire and the one being prepared.
struct Pipeline {
    current: u8,
    next: ScaleStepper,
    slot: usize,
    channels: usize,
    more: bool,
}

/// Emits one strip on one pin of `P`, with the timing of chipset `C`.
///
/// `EXTRA_BITS` zero bits follow every byte, for chipsets that need a longer idle ratio.
/// The cycle budget is an associated constant: pairing a chipset with a port whose clock
/// cannot express its timing fails the build.
///
/// A 1 MHz counter cannot place the 250 ns zero-bit drop of a WS2812:
///
/// ```compile_fail
/// use clockless_envoy::Result;
/// use clockless_envoy::timing::{CycleBudget, Ws2812};
/// use clockless_envoy::transmitter::{LanePort, SingleLaneTransmitter};
///
/// struct SlowPort;
///
/// impl LanePort for SlowPort {
///     const TICK_HZ: u32 = 1_000_000;
///     const OVERHEAD_TICKS: u32 = 1;
///
///     fn is_valid_pin(&self, pin: u8) -> bool {
///         pin < 32
///     }
///
///     fn set_output(&mut self, _pin: u8) -> Result<()> {
///         Ok(())
///     }
///
///     fn set_mask(&mut self, _mask: u32) {}
///
///     fn clear_mask(&mut self, _mask: u32) {}
///
///     fn ticks(&self) -> u32 {
///         0
///     }
/// }
///
/// const _: CycleBudget = SingleLaneTransmitter::<SlowPort, Ws2812>::BUDGET;
/// ```
pub struct SingleLaneTransmitter<P: LanePort, C: TimingProvider, const EXTRA_BITS: u8 = 0> {
    port: P,
    mode: InterruptMode,
    phase: LanePhase,
    _chipset: PhantomData<C>,
}

impl<P: LanePort, C: TimingProvider, const EXTRA_BITS: u8> SingleLaneTransmitter<P, C, EXTRA_BITS> {
    /// Counter ticks of each control point, checked at compile time.
    pub const BUDGET: CycleBudget = CycleBudget::new(C::TIMING, P::TICK_HZ, P::OVERHEAD_TICKS);

    /// Wrap `port`.
    #[must_use]
    pub fn new(port: P, mode: InterruptMode) -> Self {
        let budget = Self::BUDGET;
        debug!(
            "transmitter: t1={} t2={} t3={} ticks (overhead {})",
            budget.t1,
            budget.t2,
            budget.t3,
            budget.overhead
        );
        Self {
            port,
            mode,
            phase: LanePhase::Idle,
            _chipset: PhantomData,
        }
    }

    /// Interrupt handling mode.
    #[must_use]
    pub const fn mode(&self) -> InterruptMode {
        self.mode
    }

    /// Change the interrupt handling mode.
    pub fn set_mode(&mut self, mode: InterruptMode) {
        self.mode = mode;
    }

    /// Current state-machine phase.
    #[must_use]
    pub const fn phase(&self) -> LanePhase {
        self.phase
    }

    /// The wrapped port.
    #[must_use]
    pub const fn port(&self) -> &P {
        &self.port
    }

    /// The wrapped port, mutably.
    pub fn port_mut(&mut self) -> &mut P {
        &mut self.port
    }

    /// Unwrap the port.
    pub fn into_port(self) -> P {
        self.port
    }

    /// Send every LED of `source` on `pin`.
    ///
    /// Blocks for the whole frame. `pin` must already be an output (see
    /// [`LanePort::set_output`]).
    pub fn transmit<S: PixelSource + ?Sized>(&mut self, pin: u8, source: &mut S) -> TransmitOutcome {
        let mask = 1_u32 << (pin & 31);
        self.phase = LanePhase::Idle;
        if !source.has_more() {
            return TransmitOutcome::Complete {
                elapsed_ticks: 0,
                masked_ticks: 0,
            };
        }

        let channels = source.channels();
        let first = source.load_and_scale_channel(0);
        let mut pipeline = Pipeline {
            current: first,
            next: ScaleStepper::ready(0),
            slot: 0,
            channels,
            more: true,
        };
        self.phase = LanePhase::Armed;

        let outcome = match self.mode {
            InterruptMode::Masked => critical_section::with(|_| {
                let begin = self.port.ticks();
                let mut mark = begin;
                while pipeline.more {
                    self.emit_led(mask, source, &mut pipeline, &mut mark);
                }
                self.port.wait_until(mark);
                let elapsed = self.port.ticks().wrapping_sub(begin) & P::TICK_MASK;
                TransmitOutcome::Complete {
                    elapsed_ticks: elapsed,
                    masked_ticks: elapsed,
                }
            }),
            InterruptMode::Bounded { max_gap_us } => {
                self.transmit_bounded(mask, source, &mut pipeline, Self::BUDGET.micros_to_ticks(max_gap_us))
            }
        };

        if outcome.is_complete() {
            self.phase = LanePhase::Done;
        }
        outcome
    }

    fn transmit_bounded<S: PixelSource + ?Sized>(
        &mut self,
        mask: u32,
        source: &mut S,
        pipeline: &mut Pipeline,
        max_gap: u32,
    ) -> TransmitOutcome {
        let begin = self.port.ticks();
        let mut mark = begin;
        let mut masked: u32 = 0;
        let mut leds_sent = 0;

        while pipeline.more {
            let gap_exceeded = critical_section::with(|_| {
                let now = self.port.ticks();
                if leds_sent > 0 && deadline_reached(now, mark, P::TICK_MASK) {
                    // the line has been low since t2 of the last bit
                    let late = now.wrapping_sub(mark) & P::TICK_MASK;
                    let low = (Self::BUDGET.t3 - Self::BUDGET.t2).saturating_add(late);
                    if low > max_gap {
                        return true;
                    }
                    // Re-anchor so the next bit keeps full-width phases
                    mark = now;
                }
                let entered = mark;
                self.emit_led(mask, source, pipeline, &mut mark);
                masked = masked.wrapping_add(mark.wrapping_sub(entered) & P::TICK_MASK);
                false
            });
            if gap_exceeded {
                self.port.clear_mask(mask);
                self.phase = LanePhase::Idle;
                return TransmitOutcome::Aborted {
                    leds_sent,
                    elapsed_ticks: self.port.ticks().wrapping_sub(begin) & P::TICK_MASK,
                    masked_ticks: masked,
                };
            }
            leds_sent += 1;
        }

        self.port.wait_until(mark);
        TransmitOutcome::Complete {
            elapsed_ticks: self.port.ticks().wrapping_sub(begin) & P::TICK_MASK,
            masked_ticks: masked,
        }
    }

    /// Emit the bytes of one LED, preparing each following byte on the way.
    #[inline(always)]
    fn emit_led<S: PixelSource + ?Sized>(
        &mut self,
        mask: u32,
        source: &mut S,
        pipeline: &mut Pipeline,
        mark: &mut u32,
    ) {
        loop {
            let byte = pipeline.current;
            let next_slot = if pipeline.slot + 1 == pipeline.channels {
                0
            } else {
                pipeline.slot + 1
            };

            let mut bit = 0;
            while bit < 8 {
                let one = byte & (0x80 >> bit) != 0;
                self.emit_bit(mask, one, mark, || {
                    if bit == 0 {
                        pipeline.next = Self::load_next(source, next_slot, &mut pipeline.more);
                    }
                    pipeline.next.step();
                });
                bit += 1;
            }
            let mut extra = 0;
            while extra < EXTRA_BITS {
                self.emit_bit(mask, false, mark, || {});
                extra += 1;
            }

            pipeline.current = pipeline.next.finish();
            pipeline.slot = next_slot;
            if next_slot == 0 {
                return;
            }
        }
    }

    /// Fetch and dither the byte for `slot`, moving to the next LED when `slot` wraps to 0.
    #[inline(always)]
    fn load_next<S: PixelSource + ?Sized>(source: &mut S, slot: usize, more: &mut bool) -> ScaleStepper {
        if slot == 0 {
            source.advance();
            source.step_dithering();
            if !source.has_more() {
                *more = false;
                return ScaleStepper::ready(0);
            }
        }
        let raw = dither8(source.load_channel(slot), source.dither(slot));
        ScaleStepper::new(raw, source.scale(slot))
    }

    /// One bit period. `work` runs between the `t1` and `t2` control points.
    #[inline(always)]
    fn emit_bit(&mut self, mask: u32, one: bool, mark: &mut u32, work: impl FnOnce()) {
        let budget = Self::BUDGET;
        let start = *mark;

        self.port.wait_until(start);
        self.port.set_mask(mask);
        self.phase = LanePhase::BitHigh;
        *mark = start.wrapping_add(budget.t3);

        self.port.wait_until(start.wrapping_add(budget.t1));
        if !one {
            self.port.clear_mask(mask);
        }
        self.phase = LanePhase::BitDecision;
        work();

        self.port.wait_until(start.wrapping_add(budget.t2));
        self.port.clear_mask(mask);
        self.phase = LanePhase::BitLow;
    }
}
