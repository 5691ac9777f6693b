//! Software bit-bang driver: every strip is sent by the CPU, one after another.

use embassy_time::{Duration, Timer};

use crate::Result;
use crate::channel::Channel;
use crate::driver::{FrameJob, PeripheralKind, StripDriver, TransmitReport};
use crate::timing::{TimingConfig, TimingProvider};
use crate::transmitter::{InterruptMode, LanePort, SingleLaneTransmitter, TransmitOutcome};

/// Drives strips on pins of one [`LanePort`] with chipset `C`'s timing.
///
/// `show` blocks the calling task for the whole frame. In
/// [`InterruptMode::Bounded`] an aborted strip is re-sent once after a latch gap.
pub struct BitBangDriver<P: LanePort, C: TimingProvider, const EXTRA_BITS: u8 = 0> {
    transmitter: SingleLaneTransmitter<P, C, EXTRA_BITS>,
    max_channels: usize,
    aborted: u32,
}

impl<P: LanePort, C: TimingProvider, const EXTRA_BITS: u8> BitBangDriver<P, C, EXTRA_BITS> {
    /// Pins addressable through one port mask.
    pub const MAX_CHANNELS: usize = 32;

    /// Create a driver that owns `port`.
    #[must_use]
    pub fn new(port: P, mode: InterruptMode) -> Self {
        Self {
            transmitter: SingleLaneTransmitter::new(port, mode),
            max_channels: Self::MAX_CHANNELS,
            aborted: 0,
        }
    }

    /// Lower the number of strips this driver accepts.
    #[must_use]
    pub fn with_max_channels(mut self, max_channels: usize) -> Self {
        self.max_channels = max_channels.min(Self::MAX_CHANNELS);
        self
    }

    /// The underlying transmitter.
    #[must_use]
    pub const fn transmitter(&self) -> &SingleLaneTransmitter<P, C, EXTRA_BITS> {
        &self.transmitter
    }

    /// The underlying transmitter, mutably (for example to change its interrupt mode).
    pub fn transmitter_mut(&mut self) -> &mut SingleLaneTransmitter<P, C, EXTRA_BITS> {
        &mut self.transmitter
    }

    /// Strip transmissions that hit the inter-LED gap bound since construction.
    #[must_use]
    pub const fn aborted_transmissions(&self) -> u32 {
        self.aborted
    }

    fn ticks_to_duration(ticks: u32) -> Duration {
        Duration::from_micros(SingleLaneTransmitter::<P, C, EXTRA_BITS>::BUDGET.ticks_to_micros(ticks))
    }
}

impl<P: LanePort, C: TimingProvider, const EXTRA_BITS: u8> StripDriver
    for BitBangDriver<P, C, EXTRA_BITS>
{
    const KIND: PeripheralKind = PeripheralKind::BitBang;

    fn max_channels(&self) -> usize {
        self.max_channels
    }

    fn is_valid_pin(&self, pin: u8) -> bool {
        usize::from(pin) < Self::MAX_CHANNELS && self.transmitter.port().is_valid_pin(pin)
    }

    fn timing(&self) -> TimingConfig {
        C::TIMING
    }

    fn begin(&mut self) -> Result<()> {
        let budget = SingleLaneTransmitter::<P, C, EXTRA_BITS>::BUDGET;
        info!(
            "bit-bang driver ready: {} Hz counter, {} ticks per bit, {} ticks slack",
            budget.clock_hz,
            budget.t3,
            budget.slack()
        );
        Ok(())
    }

    fn attach(&mut self, _channel: Channel, pin: u8) -> Result<()> {
        self.transmitter.port_mut().set_output(pin)
    }

    fn detach(&mut self, _channel: Channel, pin: u8) {
        self.transmitter.port_mut().release(pin);
    }

    async fn transmit(&mut self, job: &FrameJob<'_, '_>) -> Result<TransmitReport> {
        let reset = C::TIMING.reset();
        let mut masked_ticks: u32 = 0;

        for strip in job.strips() {
            let mut source = job.source(strip);
            let mut outcome = self.transmitter.transmit(strip.pin(), &mut source);
            masked_ticks = masked_ticks.saturating_add(outcome.masked_ticks());

            if let TransmitOutcome::Aborted { leds_sent, .. } = outcome {
                self.aborted = self.aborted.saturating_add(1);
                warn!(
                    "pin {}: inter-LED gap exceeded after {} LEDs, retrying",
                    strip.pin(),
                    leds_sent
                );
                Timer::after(reset).await;
                // A fresh source replays the same bytes and dither pattern
                let mut source = job.source(strip);
                outcome = self.transmitter.transmit(strip.pin(), &mut source);
                masked_ticks = masked_ticks.saturating_add(outcome.masked_ticks());
                if !outcome.is_complete() {
                    self.aborted = self.aborted.saturating_add(1);
                    warn!("pin {}: retry aborted too, frame is partial", strip.pin());
                }
            }
        }

        Ok(TransmitReport {
            line_busy_for: Duration::from_ticks(0),
            interrupts_masked: Self::ticks_to_duration(masked_ticks),
        })
    }
}
